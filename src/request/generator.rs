//! Request Generator
//!
//! Turns user input into a finite sequence of [`Request`] values. Two sources
//! are supported:
//! 1. An **argument vector** of at least two tokens, interpreted as a single
//!    inline command `target task [params...]`.
//! 2. A **command script**: a line-oriented text file where each non-blank,
//!    non-comment line is one command.
//!
//! ## Script grammar
//! - Blank lines and lines starting with `#` are skipped.
//! - A line ending in `\` is joined with the next physical line before
//!   tokenizing.
//! - A line consisting solely of `{` switches subsequent commands to
//!   fire-and-forget (`wait = false`); the matching `}` restores waiting mode
//!   and itself yields a synthetic barrier request.
//! - A line consisting solely of `end` terminates the sequence early.
//! - Any other line is whitespace-tokenized into `target task params...`;
//!   fewer than two tokens is a hard parse error, never silently skipped.
//!
//! Unless prompting has been explicitly allowed, every generated command gets
//! the `noprompt` and `accept` tokens appended so downstream execution never
//! blocks waiting for interactive input.

use super::types::*;
use anyhow::{bail, Context, Result};
use std::path::Path;

enum Source {
    /// One inline command, already tokenized. Consumed on first `next()`.
    Inline(Option<Vec<String>>),
    /// Physical script lines, consumed front to back.
    Script {
        lines: std::vec::IntoIter<String>,
        line_no: usize,
    },
}

/// Lazily produces requests from an argument vector or a command script.
///
/// The sequence is finite (`next()` returns `Ok(None)` when exhausted) and
/// restartable only by constructing a new generator from the source.
pub struct RequestGenerator {
    submitter: String,
    source: Source,
    sequence: u64,
    wait_mode: bool,
    finished: bool,
    allow_prompt: bool,
}

impl RequestGenerator {
    /// Builds a generator over a single inline command.
    ///
    /// `argv` must hold at least `target` and `task`.
    pub fn from_args(submitter: &str, argv: &[String]) -> Result<Self> {
        if argv.len() < 2 {
            bail!(
                "inline command needs at least 'target task', got {} token(s)",
                argv.len()
            );
        }
        Ok(Self {
            submitter: submitter.to_string(),
            source: Source::Inline(Some(argv.to_vec())),
            sequence: 0,
            wait_mode: true,
            finished: false,
            allow_prompt: false,
        })
    }

    /// Builds a generator over a command script file.
    pub fn from_script(submitter: &str, path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read command script {}", path.display()))?;
        Ok(Self::from_lines(submitter, text.lines().map(String::from).collect()))
    }

    /// Builds a generator over in-memory script lines.
    pub fn from_lines(submitter: &str, lines: Vec<String>) -> Self {
        Self {
            submitter: submitter.to_string(),
            source: Source::Script {
                lines: lines.into_iter(),
                line_no: 0,
            },
            sequence: 0,
            wait_mode: true,
            finished: false,
            allow_prompt: false,
        }
    }

    /// Allows generated tasks to prompt interactively: the suppression
    /// tokens are no longer appended to each command's parameters.
    pub fn allow_prompt(mut self) -> Self {
        self.allow_prompt = true;
        self
    }

    /// Produces the next request, or `Ok(None)` when the source is exhausted.
    ///
    /// Malformed lines fail closed: the error names the offending line and no
    /// request is produced for it.
    pub fn next(&mut self) -> Result<Option<Request>> {
        if self.finished {
            return Ok(None);
        }
        if let Source::Script { .. } = self.source {
            return self.next_from_script();
        }

        let tokens = match &mut self.source {
            Source::Inline(argv) => argv.take(),
            Source::Script { .. } => None,
        };
        self.finished = true;
        match tokens {
            Some(tokens) => Ok(Some(self.build_request(&tokens, true))),
            None => Ok(None),
        }
    }

    fn next_from_script(&mut self) -> Result<Option<Request>> {
        loop {
            let Some((logical, line_no)) = self.next_logical_line() else {
                self.finished = true;
                return Ok(None);
            };

            let line = logical.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "{" {
                self.wait_mode = false;
                continue;
            }
            if line == "}" {
                self.wait_mode = true;
                let mut barrier = Request::barrier();
                barrier.id = Some(self.next_id());
                return Ok(Some(barrier));
            }
            if line == "end" {
                self.finished = true;
                return Ok(None);
            }

            let tokens: Vec<String> = line.split_whitespace().map(String::from).collect();
            if tokens.len() < 2 {
                bail!(
                    "line {}: expected 'target task [params...]', got {:?}",
                    line_no,
                    line
                );
            }
            let wait = self.wait_mode;
            return Ok(Some(self.build_request(&tokens, wait)));
        }
    }

    /// Pulls one logical line: physical lines ending in `\` are joined with
    /// their successors (backslash stripped) before any tokenizing happens.
    fn next_logical_line(&mut self) -> Option<(String, usize)> {
        let Source::Script { lines, line_no } = &mut self.source else {
            return None;
        };
        let mut logical = lines.next()?;
        *line_no += 1;
        let first_line = *line_no;
        while let Some(stripped) = logical.trim_end().strip_suffix('\\') {
            let head = stripped.to_string();
            match lines.next() {
                Some(next) => {
                    *line_no += 1;
                    logical = head + &next;
                }
                None => {
                    logical = head;
                    break;
                }
            }
        }
        Some((logical, first_line))
    }

    fn build_request(&mut self, tokens: &[String], wait: bool) -> Request {
        let mut params: Vec<String> = tokens[2..].to_vec();
        if !self.allow_prompt {
            params.push(NO_PROMPT_TOKEN.to_string());
            params.push(ACCEPT_TOKEN.to_string());
        }
        let mut request = Request::new(&tokens[0], &tokens[1], params);
        request.wait = wait;
        request.id = Some(self.next_id());
        request
    }

    fn next_id(&mut self) -> RequestId {
        self.sequence += 1;
        RequestId::new(&self.submitter, self.sequence)
    }
}
