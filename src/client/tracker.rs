//! Job Tracker
//!
//! Purely in-memory, client-side aggregation of submitted work. Nothing here
//! touches the board; the submitter (or a test) feeds in acceptance and
//! completion observations and reads statistics back out.
//!
//! Queries return cloned snapshots rather than live views, so callers can
//! iterate freely while new observations keep arriving.

use crate::request::types::{Request, RequestId};

use anyhow::{bail, Result};

/// One submitted request and what is known about its fate.
#[derive(Debug, Clone)]
pub struct Job {
    pub request: Request,
    pub acceptor: Option<String>,
    pub done: bool,
}

impl Job {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            acceptor: None,
            done: false,
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        self.request.id.as_ref()
    }

    /// Records which worker accepted this job.
    ///
    /// Setting from nothing, clearing, and re-asserting the same worker all
    /// succeed; overwriting one worker with a different one fails without
    /// mutating, so a stale claim message cannot clobber a fresher one.
    pub fn set_acceptor(&mut self, acceptor: Option<String>) -> Result<()> {
        match (&self.acceptor, &acceptor) {
            (Some(current), Some(new)) if current != new => {
                bail!(
                    "job {} already accepted by {}, refusing {}",
                    self.request,
                    current,
                    new
                );
            }
            _ => {
                self.acceptor = acceptor;
                Ok(())
            }
        }
    }

    /// Marks the job complete. Idempotent; completion is one-way.
    pub fn set_done(&mut self) {
        self.done = true;
    }
}

/// Jobs are equal when their requests carry the same id.
impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// The waiting / in-progress / completed triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStats {
    pub completed: usize,
    pub in_progress: usize,
    pub waiting: usize,
}

/// The global triple plus the same triple per distinct observed acceptor.
#[derive(Debug, Clone)]
pub struct CompleteStats {
    pub global: JobStats,
    pub per_worker: Vec<(String, JobStats)>,
}

/// Small in-memory job repository.
pub struct JobList {
    jobs: Vec<Job>,
}

impl JobList {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    pub fn add(&mut self, job: Job) {
        self.jobs.push(job);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: &RequestId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id() == Some(id))
    }

    fn get_mut(&mut self, id: &RequestId) -> Result<&mut Job> {
        self.jobs
            .iter_mut()
            .find(|job| job.id() == Some(id))
            .ok_or_else(|| anyhow::anyhow!("no job tracked for request {}", id))
    }

    pub fn set_acceptor(&mut self, id: &RequestId, acceptor: Option<String>) -> Result<()> {
        self.get_mut(id)?.set_acceptor(acceptor)
    }

    pub fn set_done(&mut self, id: &RequestId) -> Result<()> {
        self.get_mut(id)?.set_done();
        Ok(())
    }

    pub fn all_done(&self) -> bool {
        self.jobs.iter().all(|job| job.done)
    }

    /// Ids of jobs still awaiting a reply, in submission order.
    pub fn outstanding(&self) -> Vec<RequestId> {
        self.jobs
            .iter()
            .filter(|job| !job.done)
            .filter_map(|job| job.id().cloned())
            .collect()
    }

    // --- Snapshot queries ---

    pub fn waiting(&self) -> Vec<Job> {
        self.jobs
            .iter()
            .filter(|job| !job.done && job.acceptor.is_none())
            .cloned()
            .collect()
    }

    pub fn in_progress(&self) -> Vec<Job> {
        self.jobs
            .iter()
            .filter(|job| !job.done && job.acceptor.is_some())
            .cloned()
            .collect()
    }

    pub fn completed(&self) -> Vec<Job> {
        self.jobs.iter().filter(|job| job.done).cloned().collect()
    }

    pub fn by_acceptor(&self, worker: &str) -> Vec<Job> {
        self.jobs
            .iter()
            .filter(|job| job.acceptor.as_deref() == Some(worker))
            .cloned()
            .collect()
    }

    // --- Statistics ---

    pub fn stats(&self) -> JobStats {
        stats_over(self.jobs.iter())
    }

    /// The global triple plus one triple per distinct acceptor, in order of
    /// first observation.
    pub fn complete_stats(&self) -> CompleteStats {
        let mut workers: Vec<String> = Vec::new();
        for job in &self.jobs {
            if let Some(worker) = &job.acceptor {
                if !workers.contains(worker) {
                    workers.push(worker.clone());
                }
            }
        }

        let per_worker = workers
            .into_iter()
            .map(|worker| {
                let triple = stats_over(
                    self.jobs
                        .iter()
                        .filter(|job| job.acceptor.as_deref() == Some(&worker)),
                );
                (worker, triple)
            })
            .collect();

        CompleteStats {
            global: self.stats(),
            per_worker,
        }
    }
}

impl Default for JobList {
    fn default() -> Self {
        Self::new()
    }
}

fn stats_over<'a>(jobs: impl Iterator<Item = &'a Job>) -> JobStats {
    let mut stats = JobStats {
        completed: 0,
        in_progress: 0,
        waiting: 0,
    };
    for job in jobs {
        if job.done {
            stats.completed += 1;
        } else if job.acceptor.is_some() {
            stats.in_progress += 1;
        } else {
            stats.waiting += 1;
        }
    }
    stats
}
