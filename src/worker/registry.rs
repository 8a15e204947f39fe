//! Task Handler Registry
//!
//! A dynamic registry that maps `(target, task)` name pairs to executable
//! Rust closures. Dispatch stays a closed, testable table: anything not
//! registered here falls through to the shell executor instead of being
//! resolved reflectively.

use crate::request::types::Request;
use crate::space::types::Reply;

use anyhow::Result;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for a thread-safe, asynchronous task handler function.
/// It takes the claimed `Request` and returns a Future resolving to a `Reply`.
pub type TaskHandlerFn =
    Arc<dyn Fn(Request) -> Pin<Box<dyn Future<Output = Result<Reply>> + Send>> + Send + Sync>;

/// Registry holding the mapping between task names and their implementation.
pub struct TaskRegistry {
    handlers: DashMap<(String, String), TaskHandlerFn>,
}

impl TaskRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handlers: DashMap::new(),
        })
    }

    /// Registers a handler for one `(target, task)` pair.
    pub fn register<F, Fut>(&self, target: &str, task: &str, handler: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        // Box::pin type-erases the specific Future so different async
        // functions can share one map.
        let handler_fn: TaskHandlerFn = Arc::new(move |request: Request| {
            Box::pin(handler(request)) as Pin<Box<dyn Future<Output = Result<Reply>> + Send>>
        });

        self.handlers
            .insert((target.to_string(), task.to_string()), handler_fn);

        tracing::info!("Registered task handler: {} {}", target, task);
    }

    /// Looks up the handler for a pair, if any.
    pub fn get(&self, target: &str, task: &str) -> Option<TaskHandlerFn> {
        self.handlers
            .get(&(target.to_string(), task.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn has_handler(&self, target: &str, task: &str) -> bool {
        self.handlers
            .contains_key(&(target.to_string(), task.to_string()))
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }
}
