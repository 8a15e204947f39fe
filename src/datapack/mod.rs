//! Bulk Data Staging Module
//!
//! Requests often need files moved to the worker that executes them and
//! results moved back. This module implements that transfer protocol:
//! packets carry file bytes or URL references onto the worker's filesystem,
//! and a per-packet disposal policy decides each file's fate after the task
//! has run.
//!
//! ## Disposal policies
//! - **Delete**: staged input, removed after use.
//! - **Keep**: staged input that stays on the worker.
//! - **Update**: staged input the task modifies; the modified copy flows back.
//! - **Return**: a task output that exists only worker-side; flows back.
//! - **Ftp**: a task output relayed through a shared directory and fetched by
//!   URL instead of being carried inline.
//!
//! ## Submodules
//! - **`types`**: The `Disposal` policy enum and the relay configuration.
//! - **`packet`**: `DataPacket` (file/URL) and `DataPack` (ordered collection
//!   keyed by request id), with `materialize` and `dispose` operations.

pub mod packet;
pub mod types;

#[cfg(test)]
mod tests;
