//! Shell Executor
//!
//! Runs a task as an external subprocess. The executable is located by name
//! (filesystem path, configured script directories, or a bundled resource
//! staged into a temporary file), run with the request parameters, and its
//! output folded into a reply: stdout lines first, then stderr lines.
//!
//! A script may emit a structured reply document inline, delimited by
//! recognizable marker lines. When present, the document body (JSON with
//! `messages` and optional `results`) becomes the authoritative reply and the
//! surrounding plain text is re-attached around its messages. A malformed
//! document degrades into diagnostic messages instead of failing the task.

use crate::request::types::RequestId;
use crate::space::types::Reply;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::process::Command;

pub const REPLY_START_MARKER: &str = "--- BEGIN TASK REPLY ---";
pub const REPLY_END_MARKER: &str = "--- END TASK REPLY ---";

/// The embedded document format scripts may emit between the markers.
#[derive(Debug, Deserialize)]
struct ReplyDocument {
    #[serde(default)]
    messages: Vec<String>,
    #[serde(default)]
    results: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Locates and runs task scripts.
pub struct ShellExecutor {
    script_dirs: Vec<PathBuf>,
    bundled: HashMap<String, &'static [u8]>,
    /// Bundled scripts staged to disk; the temp paths delete on drop.
    staged: Mutex<Vec<tempfile::TempPath>>,
}

impl ShellExecutor {
    pub fn new(script_dirs: Vec<PathBuf>) -> Self {
        Self {
            script_dirs,
            bundled: HashMap::new(),
            staged: Mutex::new(Vec::new()),
        }
    }

    /// Registers a bundled script under `<target>/support/<task>`, the same
    /// resource path scheme used for loose script directories.
    pub fn bundle(&mut self, target: &str, task: &str, bytes: &'static [u8]) {
        self.bundled
            .insert(format!("{}/support/{}", target, task), bytes);
    }

    /// Resolves a task name to an executable path.
    ///
    /// Order: the name taken as a filesystem path, then
    /// `<dir>/<target>/support/<task>` for each configured script directory,
    /// then bundled resources staged into a temporary executable file.
    pub fn resolve(&self, target: &str, task: &str) -> Result<PathBuf> {
        let direct = Path::new(task);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        let resource = format!("{}/support/{}", target, task);
        for dir in &self.script_dirs {
            let candidate = dir.join(&resource);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        if let Some(bytes) = self.bundled.get(&resource) {
            return self.stage_bundled(&resource, bytes);
        }

        anyhow::bail!("no script found for task '{} {}'", target, task)
    }

    fn stage_bundled(&self, resource: &str, bytes: &[u8]) -> Result<PathBuf> {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new()
            .with_context(|| format!("failed to stage bundled script {}", resource))?;
        file.write_all(bytes)
            .with_context(|| format!("failed to write bundled script {}", resource))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = file.as_file().metadata()?.permissions();
            perms.set_mode(0o755);
            file.as_file().set_permissions(perms)?;
        }

        let temp_path = file.into_temp_path();
        let path = temp_path.to_path_buf();
        self.staged.lock().unwrap().push(temp_path);
        Ok(path)
    }

    /// Runs the task script and folds its output into a reply.
    ///
    /// A non-zero exit status appends a diagnostic message but is not a hard
    /// failure; the reply is produced either way. Spawn failures and
    /// unresolvable tasks are errors for the caller to fold into an error
    /// reply.
    pub async fn execute(
        &self,
        id: &RequestId,
        target: &str,
        task: &str,
        params: &[String],
    ) -> Result<Reply> {
        let script = self.resolve(target, task)?;
        tracing::debug!("Running {} for request {}", script.display(), id);

        let output = Command::new(&script)
            .args(params)
            .output()
            .await
            .with_context(|| format!("failed to run {}", script.display()))?;

        // stdout lines first, then stderr lines
        let mut messages: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(String::from)
            .collect();
        messages.extend(
            String::from_utf8_lossy(&output.stderr)
                .lines()
                .map(String::from),
        );

        let mut reply = assemble_reply(id.clone(), messages);

        match output.status.code() {
            Some(0) => {}
            Some(code) => {
                reply
                    .messages
                    .push(format!("task '{} {}' exited with status {}", target, task, code));
            }
            None => {
                reply
                    .messages
                    .push(format!("task '{} {}' was terminated by a signal", target, task));
            }
        }

        Ok(reply)
    }
}

/// Splits an embedded reply document out of the captured message sequence.
///
/// Without both markers the messages pass through untouched. With them, the
/// document body is parsed and its messages are re-attached between the
/// surrounding head and tail text; a parse failure degrades to diagnostics.
fn assemble_reply(id: RequestId, messages: Vec<String>) -> Reply {
    let start = messages
        .iter()
        .position(|line| line.trim() == REPLY_START_MARKER);
    let end = messages
        .iter()
        .position(|line| line.trim() == REPLY_END_MARKER);

    let (Some(start), Some(end)) = (start, end) else {
        let mut reply = Reply::new(id);
        reply.messages = messages;
        return reply;
    };
    if end <= start {
        let mut reply = Reply::new(id);
        reply.messages = messages;
        return reply;
    }

    let head = &messages[..start];
    let body = messages[start + 1..end].join("\n");
    let tail = &messages[end + 1..];

    let mut reply = Reply::new(id);
    match serde_json::from_str::<ReplyDocument>(&body) {
        Ok(document) => {
            reply.messages.extend_from_slice(head);
            reply.messages.extend(document.messages);
            reply.messages.extend_from_slice(tail);
            reply.results = document.results;
        }
        Err(e) => {
            reply.messages.extend_from_slice(head);
            reply
                .messages
                .push("reply document parse failed".to_string());
            reply.messages.extend_from_slice(tail);
            reply.messages.push(e.to_string());
        }
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_id() -> RequestId {
        RequestId {
            submitter: "tester".to_string(),
            sequence: 1,
            created_at: 1234,
        }
    }

    #[test]
    fn test_assemble_reply_without_markers_passes_through() {
        let reply = assemble_reply(
            test_id(),
            vec!["one".to_string(), "two".to_string()],
        );
        assert_eq!(reply.messages, vec!["one", "two"]);
        assert!(reply.results.is_none());
    }

    #[test]
    fn test_assemble_reply_parses_embedded_document() {
        let lines = vec![
            "head".to_string(),
            REPLY_START_MARKER.to_string(),
            r#"{"messages": ["from doc"], "results": {"mean": 4.5}}"#.to_string(),
            REPLY_END_MARKER.to_string(),
            "tail".to_string(),
        ];

        let reply = assemble_reply(test_id(), lines);

        assert_eq!(reply.messages, vec!["head", "from doc", "tail"]);
        let results = reply.results.expect("results from the document");
        assert_eq!(results["mean"], 4.5);
    }

    #[test]
    fn test_assemble_reply_degrades_on_malformed_document() {
        let lines = vec![
            "head".to_string(),
            REPLY_START_MARKER.to_string(),
            "{not json".to_string(),
            REPLY_END_MARKER.to_string(),
            "tail".to_string(),
        ];

        let reply = assemble_reply(test_id(), lines);

        assert_eq!(reply.messages[0], "head");
        assert_eq!(reply.messages[1], "reply document parse failed");
        assert_eq!(reply.messages[2], "tail");
        // The parse error text rides along at the end
        assert!(reply.messages.len() > 3);
        assert!(reply.results.is_none());
    }
}
