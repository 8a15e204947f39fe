//! Request Submitter
//!
//! Drives the client side of a dispatch session: drains a request generator,
//! writes each request to the board, and collects replies. While a job is
//! awaiting its reply the submitter also watches for its acceptance entry to
//! learn which worker claimed it.
//!
//! Acceptance observation uses take-and-put-back: the board protocol has no
//! non-destructive read, so the entry is briefly removed and rewritten with a
//! short lease. The worker's own release of the acceptance is best-effort and
//! tolerates the entry being absent.

use super::tracker::{Job, JobList};
use crate::request::generator::RequestGenerator;
use crate::request::types::{Request, RequestId};
use crate::space::types::*;

use anyhow::{Context, Result};
use std::sync::Arc;

/// Poll slice while waiting on a reply; acceptance observation happens
/// between slices.
const REPLY_POLL_MILLIS: u64 = 250;

/// Lease on an observed acceptance when it is put back on the board.
const ACCEPTANCE_PUTBACK_MILLIS: u64 = 10_000;

pub struct Submitter {
    space: Arc<dyn Space>,
    name: String,
    sequence: u64,
    jobs: JobList,
}

impl Submitter {
    pub fn new(space: Arc<dyn Space>, name: &str) -> Self {
        Self {
            space,
            name: name.to_string(),
            sequence: 0,
            jobs: JobList::new(),
        }
    }

    pub fn jobs(&self) -> &JobList {
        &self.jobs
    }

    /// Writes one request to the board and starts tracking it.
    ///
    /// Requests created without an id get one here; requests from a
    /// generator keep the id they were born with.
    pub async fn submit(&mut self, mut request: Request) -> Result<RequestId> {
        if request.id.is_none() {
            self.sequence += 1;
            request.attach_id(RequestId::new(&self.name, self.sequence))?;
        }
        let id = request.id.clone().context("request id must be set")?;

        self.space
            .write(Entry::Request(request.clone()), Lease::Forever)
            .await
            .with_context(|| format!("failed to submit request {}", id))?;

        tracing::info!("Submitted request {}: {}", id, request);
        self.jobs.add(Job::new(request));
        Ok(id)
    }

    /// Runs a whole generated sequence to completion.
    ///
    /// Wait-mode requests block for their reply before the next submission;
    /// fire-and-forget requests run ahead, and a barrier (or the end of the
    /// sequence) drains everything still outstanding.
    pub async fn run(&mut self, generator: &mut RequestGenerator) -> Result<Vec<Reply>> {
        let mut replies = Vec::new();

        while let Some(request) = generator.next()? {
            if request.is_barrier() {
                self.drain_outstanding(&mut replies).await?;
                continue;
            }

            let wait = request.wait;
            let id = self.submit(request).await?;
            if wait {
                replies.push(self.await_reply(&id).await?);
            }
        }

        self.drain_outstanding(&mut replies).await?;
        Ok(replies)
    }

    /// Blocks until the reply for `id` arrives, observing the job's
    /// acceptance while it waits.
    pub async fn await_reply(&mut self, id: &RequestId) -> Result<Reply> {
        loop {
            let taken = self
                .space
                .take(Template::reply(id), Timeout::Millis(REPLY_POLL_MILLIS))
                .await?;

            if let Some(Entry::Reply(reply)) = taken {
                self.jobs.set_done(id)?;
                tracing::info!("Collected reply for {} ({} message(s))", id, reply.messages.len());
                return Ok(reply);
            }

            self.observe_acceptance(id).await?;
        }
    }

    async fn drain_outstanding(&mut self, replies: &mut Vec<Reply>) -> Result<()> {
        for id in self.jobs.outstanding() {
            replies.push(self.await_reply(&id).await?);
        }
        Ok(())
    }

    /// Peeks at the acceptance for `id` to learn which worker claimed it.
    ///
    /// An observed entry is put back with a short lease so the "in progress"
    /// signal stays visible to other observers.
    async fn observe_acceptance(&mut self, id: &RequestId) -> Result<()> {
        let taken = self
            .space
            .take_if_exists(Template::acceptance_for(id))
            .await?;

        let Some(Entry::Acceptance(acceptance)) = taken else {
            return Ok(());
        };

        let worker = acceptance.worker.clone();
        self.space
            .write(
                Entry::Acceptance(acceptance),
                Lease::Millis(ACCEPTANCE_PUTBACK_MILLIS),
            )
            .await?;

        if let Err(e) = self.jobs.set_acceptor(id, Some(worker)) {
            // A stale claim observation must not clobber a fresher one
            tracing::debug!("Ignoring acceptance observation for {}: {}", id, e);
        }
        Ok(())
    }
}
