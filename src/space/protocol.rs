//! Blackboard Wire Protocol
//!
//! Defines the Data Transfer Objects (DTOs) used for HTTP communication
//! between board clients (submitters, workers) and the board server.
//!
//! Constants define the specific API endpoints exposed by the server.

use super::types::*;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_SPACE_WRITE: &str = "/space/write";
pub const ENDPOINT_SPACE_TAKE: &str = "/space/take";
pub const ENDPOINT_SPACE_TAKE_IF_EXISTS: &str = "/space/take_if_exists";

/// Cap on how long the server holds one blocking-take round trip open.
/// Clients with longer (or infinite) deadlines re-issue the poll.
pub const MAX_POLL_MILLIS: u64 = 20_000;

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteRequest {
    pub entry: Entry,
    pub lease: Lease,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteResponse {
    pub accepted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TakeRequest {
    pub template: Template,
    pub timeout: Timeout,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TakeIfExistsRequest {
    pub template: Template,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TakeResponse {
    pub entry: Option<Entry>,
}
