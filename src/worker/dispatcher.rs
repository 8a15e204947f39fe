//! Worker Dispatch Loop
//!
//! Drives the claim -> stage -> execute -> unstage -> publish -> release
//! lifecycle against a shared board. Any number of workers may run this loop
//! concurrently; the board's `take` guarantees each request is claimed by
//! exactly one of them.
//!
//! ## Failure semantics
//! - A failure while polling (board unreachable) is fatal to the worker.
//! - A failure anywhere between claim and publish is fatal to that one
//!   request only: the worker still publishes a reply carrying the error so
//!   the submitter is never left waiting forever.
//! - A failure to release the acceptance is logged and ignored; its lease
//!   expires on its own.

use super::registry::TaskRegistry;
use super::shell::ShellExecutor;
use crate::datapack::types::RelayConfig;
use crate::request::types::{Request, RequestId};
use crate::space::types::*;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub struct WorkerConfig {
    /// Name written into acceptances so observers can tell who claimed what.
    pub name: String,
    /// Root directory for materialized data packs, one subdirectory per request.
    pub staging_root: PathBuf,
    /// Relay settings for Ftp disposal, if any.
    pub relay: Option<RelayConfig>,
    /// Lease on the acceptance entry written at claim time.
    pub acceptance_lease_millis: u64,
    /// How long the release step waits for the acceptance before giving up.
    pub release_timeout_millis: u64,
    /// Timeout on URL fetches during staging.
    pub fetch_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: format!("worker-{}", uuid::Uuid::new_v4()),
            staging_root: std::env::temp_dir().join("taskboard-staging"),
            relay: None,
            acceptance_lease_millis: 60_000,
            release_timeout_millis: 2_000,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// One worker's dispatch engine.
pub struct Worker {
    config: WorkerConfig,
    space: Arc<dyn Space>,
    registry: Arc<TaskRegistry>,
    shell: ShellExecutor,
    served: AtomicU64,
}

impl Worker {
    pub fn new(
        space: Arc<dyn Space>,
        registry: Arc<TaskRegistry>,
        shell: ShellExecutor,
        config: WorkerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            space,
            registry,
            shell,
            served: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Requests completed since startup.
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    /// Runs the polling loop until `shutdown` flips to true.
    ///
    /// Polling blocks indefinitely; the select makes shutdown interrupt the
    /// blocked take instead of waiting for a match.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!("Worker {} polling for requests", self.config.name);

        loop {
            let taken = tokio::select! {
                taken = self.space.take(Template::any_request(), Timeout::Forever) => taken,
                _ = shutdown.changed() => {
                    tracing::info!("Worker {} shutting down", self.config.name);
                    return Ok(());
                }
            };

            // Board unreachable is fatal to the worker process
            let Some(entry) = taken? else { continue };
            let Entry::Request(request) = entry else {
                tracing::warn!("Worker {} took a non-request entry, ignoring", self.config.name);
                continue;
            };

            self.serve(request).await;
            self.served.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Serves one claimed request end to end. Never fails: every error path
    /// ends in a published reply.
    async fn serve(&self, request: Request) {
        let Some(id) = request.id.clone() else {
            // Without an id no reply could ever be correlated
            tracing::warn!("Worker {} dropping request without id", self.config.name);
            return;
        };

        tracing::info!("Worker {} claimed request {}", self.config.name, id);

        // Claim: the acceptance is observational; failing to write it does
        // not void the claim already made by the take.
        let acceptance = Acceptance {
            worker: self.config.name.clone(),
            request: request.clone(),
        };
        if let Err(e) = self
            .space
            .write(
                Entry::Acceptance(acceptance),
                Lease::Millis(self.config.acceptance_lease_millis),
            )
            .await
        {
            tracing::warn!("Worker {} failed to write acceptance for {}: {}", self.config.name, id, e);
        }

        let reply = match self.process(&id, &request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Request {} failed: {:#}", id, e);
                Reply::error(id.clone(), format!("{:#}", e))
            }
        };

        // Publish: a claimed request must always be answered
        if let Err(e) = self.space.write(Entry::Reply(reply), Lease::Forever).await {
            tracing::error!("Failed to publish reply for {}: {}", id, e);
        }

        // Release: best-effort removal of the acceptance
        match self
            .space
            .take(
                Template::acceptance(&self.config.name, &id),
                Timeout::Millis(self.config.release_timeout_millis),
            )
            .await
        {
            Ok(Some(_)) => tracing::debug!("Released acceptance for {}", id),
            Ok(None) => tracing::debug!("Acceptance for {} already gone", id),
            Err(e) => tracing::warn!("Failed to release acceptance for {}: {}", id, e),
        }
    }

    /// Stage, execute, unstage. Any error here is folded into an error reply
    /// by the caller.
    async fn process(&self, id: &RequestId, request: &Request) -> Result<Reply> {
        // Stage
        let staged = match self.space.take_if_exists(Template::data_pack(id)).await? {
            Some(Entry::DataPack(mut pack)) => {
                let staging_dir = self
                    .config
                    .staging_root
                    .join(format!("{}-{}", id.submitter, id.sequence));
                tracing::debug!("Staging {} packet(s) under {}", pack.packets.len(), staging_dir.display());
                pack.materialize(&staging_dir, self.config.fetch_timeout)
                    .await?;
                Some(pack)
            }
            _ => None,
        };

        // Execute
        let mut reply = self.execute(id, request).await?;
        // Replies correlate by the claimed id regardless of handler output
        reply.id = id.clone();

        // Unstage
        if let Some(pack) = staged {
            if let Some(return_pack) = pack.dispose(self.config.relay.as_ref()).await? {
                self.space
                    .write(Entry::DataPack(return_pack), Lease::Forever)
                    .await?;
            }
        }

        Ok(reply)
    }

    async fn execute(&self, id: &RequestId, request: &Request) -> Result<Reply> {
        if let Some(handler) = self.registry.get(&request.target, &request.task) {
            tracing::debug!("Executing {} {} in-process", request.target, request.task);
            return handler(request.clone()).await;
        }
        self.shell
            .execute(id, &request.target, &request.task, &request.params)
            .await
    }
}
