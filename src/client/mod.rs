//! Client-Side Module
//!
//! The submitting side of the system: turns generated requests into board
//! entries and tracks their fate across whichever workers happen to claim
//! them.
//!
//! ## Submodules
//! - **`tracker`**: In-memory job bookkeeping. Records which worker accepted
//!   each request and whether it completed, with snapshot queries and
//!   per-worker statistics.
//! - **`submitter`**: Drives a request generator: writes requests to the
//!   board, observes acceptances, collects replies, and honors wait/no-wait
//!   and barrier semantics.

pub mod submitter;
pub mod tracker;

#[cfg(test)]
mod tests;
