use crate::datapack::packet::DataPack;
use crate::request::types::{Request, RequestId};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Record written by a worker the moment it claims a request.
///
/// Ephemeral: written with a short lease at claim time, removed at completion
/// time. Its presence on the board is the sole "in progress" signal; the
/// exclusivity of the claim itself comes from the `take` that removed the
/// request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Acceptance {
    pub worker: String,
    pub request: Request,
}

/// The result published for a request: an ordered message stream plus an
/// optional key/value result list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reply {
    pub id: RequestId,
    pub messages: Vec<String>,
    pub results: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Reply {
    pub fn new(id: RequestId) -> Self {
        Self {
            id,
            messages: Vec::new(),
            results: None,
        }
    }

    /// A reply carrying an error description, used when a claimed request
    /// cannot be processed but must still be answered.
    pub fn error(id: RequestId, message: String) -> Self {
        Self {
            id,
            messages: vec![format!("error: {}", message)],
            results: None,
        }
    }
}

/// Everything that can live on the board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    Request(Request),
    Acceptance(Acceptance),
    DataPack(DataPack),
    Reply(Reply),
}

/// Selects entries of one kind; `None` fields act as wildcards, `Some`
/// fields match by structural equality.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Template {
    Request { id: Option<RequestId> },
    Acceptance {
        worker: Option<String>,
        id: Option<RequestId>,
    },
    DataPack { id: Option<RequestId> },
    Reply { id: Option<RequestId> },
}

impl Template {
    /// Matches any request on the board.
    pub fn any_request() -> Self {
        Template::Request { id: None }
    }

    pub fn request(id: &RequestId) -> Self {
        Template::Request {
            id: Some(id.clone()),
        }
    }

    /// Matches the acceptance for one request regardless of worker.
    pub fn acceptance_for(id: &RequestId) -> Self {
        Template::Acceptance {
            worker: None,
            id: Some(id.clone()),
        }
    }

    pub fn acceptance(worker: &str, id: &RequestId) -> Self {
        Template::Acceptance {
            worker: Some(worker.to_string()),
            id: Some(id.clone()),
        }
    }

    pub fn data_pack(id: &RequestId) -> Self {
        Template::DataPack {
            id: Some(id.clone()),
        }
    }

    pub fn reply(id: &RequestId) -> Self {
        Template::Reply {
            id: Some(id.clone()),
        }
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        match (self, entry) {
            (Template::Request { id }, Entry::Request(request)) => {
                matches_id_option(id, &request.id)
            }
            (Template::Acceptance { worker, id }, Entry::Acceptance(acceptance)) => {
                let worker_ok = worker
                    .as_ref()
                    .map_or(true, |name| name == &acceptance.worker);
                worker_ok && matches_id_option(id, &acceptance.request.id)
            }
            (Template::DataPack { id }, Entry::DataPack(pack)) => {
                id.as_ref().map_or(true, |want| want == &pack.id)
            }
            (Template::Reply { id }, Entry::Reply(reply)) => {
                id.as_ref().map_or(true, |want| want == &reply.id)
            }
            _ => false,
        }
    }
}

fn matches_id_option(want: &Option<RequestId>, have: &Option<RequestId>) -> bool {
    match want {
        None => true,
        Some(want) => have.as_ref() == Some(want),
    }
}

/// How long a written entry stays visible on the board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Lease {
    Forever,
    Millis(u64),
}

/// How long a `take` may block waiting for a match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Timeout {
    Forever,
    Millis(u64),
}

/// The blackboard protocol.
///
/// `take` is the sole serialization point of the whole system: an entry is
/// handed to exactly one caller. No additional locking is layered on top.
#[async_trait]
pub trait Space: Send + Sync {
    /// Puts an entry on the board for the duration of `lease`.
    async fn write(&self, entry: Entry, lease: Lease) -> Result<()>;

    /// Removes and returns a matching entry, blocking up to `timeout` for one
    /// to arrive. Returns `Ok(None)` on timeout.
    async fn take(&self, template: Template, timeout: Timeout) -> Result<Option<Entry>>;

    /// Non-blocking variant: removes and returns a matching entry only if one
    /// is already present.
    async fn take_if_exists(&self, template: Template) -> Result<Option<Entry>>;
}
