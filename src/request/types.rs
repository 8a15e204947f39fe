use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Parameter token that tells a task to never prompt interactively.
pub const NO_PROMPT_TOKEN: &str = "noprompt";

/// Parameter token that tells a task to accept defaults for anything it
/// would otherwise have asked about.
pub const ACCEPT_TOKEN: &str = "accept";

/// Unique identifier for one request and its eventual reply.
///
/// Built from the submitter's name, a per-submitter running sequence number,
/// and the creation timestamp. Equality is structural on all three fields.
/// This is the correlation key between a `Request`, its `Acceptance`, its
/// `DataPack`, and its `Reply`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RequestId {
    pub submitter: String,
    pub sequence: u64,
    pub created_at: u64,
}

impl RequestId {
    /// Creates an id stamped with the current wall-clock time.
    pub fn new(submitter: &str, sequence: u64) -> Self {
        Self {
            submitter: submitter.to_string(),
            sequence,
            created_at: now_ms(),
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.submitter, self.sequence)
    }
}

/// A dispatchable unit of work.
///
/// `target`/`task` select what to run (package and task name); `params` are
/// positional argument tokens. A request with `wait = false` is
/// fire-and-forget: the submitter does not block on its reply.
///
/// Never mutated after creation, except that an id may be attached once,
/// post-hoc, if the request was created without one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub id: Option<RequestId>,
    pub target: String,
    pub task: String,
    pub params: Vec<String>,
    pub wait: bool,
}

impl Request {
    pub fn new(target: &str, task: &str, params: Vec<String>) -> Self {
        Self {
            id: None,
            target: target.to_string(),
            task: task.to_string(),
            params,
            wait: true,
        }
    }

    /// A synthetic marker request closing a `{ }` fire-and-forget group.
    /// Carries no target or task; submitters treat it as "wait for all
    /// outstanding replies before continuing".
    pub fn barrier() -> Self {
        Self {
            id: None,
            target: String::new(),
            task: String::new(),
            params: Vec::new(),
            wait: true,
        }
    }

    pub fn is_barrier(&self) -> bool {
        self.target.is_empty() && self.task.is_empty()
    }

    /// Attaches an id to a request created without one.
    ///
    /// Ids are immutable once set; attaching a second id is an error and
    /// leaves the request unchanged.
    pub fn attach_id(&mut self, id: RequestId) -> Result<()> {
        if let Some(existing) = &self.id {
            anyhow::bail!("request already has id {}", existing);
        }
        self.id = Some(id);
        Ok(())
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_barrier() {
            return write!(f, "<barrier>");
        }
        write!(f, "{} {} {}", self.target, self.task, self.params.join(" "))
    }
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}
