//! Task Request Model
//!
//! This module defines the identity and value objects for dispatchable task
//! requests, plus the generator that produces them from user input.
//!
//! ## Submodules
//! - **`types`**: `RequestId` (correlation key across the blackboard) and the
//!   `Request` value object consumed exactly once by a worker.
//! - **`generator`**: Turns an argument vector or a line-oriented command script
//!   (with continuation, comments, and `{ }` fire-and-forget grouping) into a
//!   finite sequence of requests.

pub mod generator;
pub mod types;
