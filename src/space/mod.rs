//! Shared Blackboard Module
//!
//! Implements the tuple-space abstraction the dispatch system is built on:
//! clients and workers exchange requests, acceptances, data packs, and replies
//! through a shared board instead of being statically paired.
//!
//! ## Responsibilities
//! - **Matching**: Templates select entries by structural equality on their
//!   set fields; unset fields act as wildcards.
//! - **Claiming**: `take` atomically removes a matching entry, so a request is
//!   handed to exactly one of any number of concurrently polling workers.
//! - **Leasing**: Every entry is written with a lease; expired entries vanish
//!   from matching. Leases provide liveness signals, not mutual exclusion.
//!
//! ## Submodules
//! - **`types`**: The `Space` trait plus entry, template, lease, and timeout types.
//! - **`memory`**: In-process board backed by a concurrent map with arrival
//!   notification for blocked takers.
//! - **`protocol`**: HTTP API contracts for sharing one board across processes.
//! - **`handlers`**: Axum handlers and router exposing a `MemorySpace` over HTTP.
//! - **`http`**: Reqwest-backed `Space` client with retry and bounded long-polls.

pub mod handlers;
pub mod http;
pub mod memory;
pub mod protocol;
pub mod types;
