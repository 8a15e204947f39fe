//! Client Module Tests
//!
//! Covers job bookkeeping rules, statistics aggregation, and the submitter
//! driving a generated sequence against an in-memory board.
//!
//! ## Test Scopes
//! - **Job**: acceptor transition rules and idempotent completion.
//! - **JobList**: snapshot queries, global and per-worker statistics.
//! - **Submitter**: submission, reply collection, acceptance observation.

#[cfg(test)]
mod tests {
    use crate::client::submitter::Submitter;
    use crate::client::tracker::{Job, JobList};
    use crate::request::generator::RequestGenerator;
    use crate::request::types::{Request, RequestId};
    use crate::space::memory::MemorySpace;
    use crate::space::types::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_request(sequence: u64) -> Request {
        let mut request = Request::new("Kappa", "stats", vec!["comwest".to_string()]);
        request.id = Some(RequestId {
            submitter: "tester".to_string(),
            sequence,
            created_at: 1234,
        });
        request
    }

    fn job(sequence: u64) -> Job {
        Job::new(test_request(sequence))
    }

    // ============================================================
    // TEST 1: Job transition rules
    // ============================================================

    #[test]
    fn test_acceptor_sets_from_nil() {
        let mut job = job(1);
        job.set_acceptor(Some("w1".to_string())).unwrap();
        assert_eq!(job.acceptor.as_deref(), Some("w1"));
    }

    #[test]
    fn test_acceptor_rejects_different_worker() {
        let mut job = job(1);
        job.set_acceptor(Some("w1".to_string())).unwrap();

        let result = job.set_acceptor(Some("w2".to_string()));
        assert!(result.is_err());
        // The failed attempt must not mutate
        assert_eq!(job.acceptor.as_deref(), Some("w1"));
    }

    #[test]
    fn test_acceptor_accepts_same_worker_again_and_clearing() {
        let mut job = job(1);
        job.set_acceptor(Some("w1".to_string())).unwrap();
        job.set_acceptor(Some("w1".to_string())).unwrap();
        job.set_acceptor(None).unwrap();
        assert!(job.acceptor.is_none());
    }

    #[test]
    fn test_set_done_is_idempotent() {
        let mut job = job(1);
        job.set_done();
        job.set_done();
        assert!(job.done);
    }

    #[test]
    fn test_job_equality_is_by_request_id_only() {
        let mut left = job(1);
        let right = job(1);
        let other = job(2);

        // Differing derived state does not affect equality
        left.set_done();
        assert_eq!(left, right);
        assert_ne!(left, other);
    }

    // ============================================================
    // TEST 2: JobList queries and statistics
    // ============================================================

    fn populated_list() -> JobList {
        let mut list = JobList::new();
        for sequence in 1..=5 {
            list.add(job(sequence));
        }
        // 1, 2 done by w1; 3 in progress on w2; 4, 5 waiting
        list.set_acceptor(test_request(1).id.as_ref().unwrap(), Some("w1".to_string()))
            .unwrap();
        list.set_done(test_request(1).id.as_ref().unwrap()).unwrap();
        list.set_acceptor(test_request(2).id.as_ref().unwrap(), Some("w1".to_string()))
            .unwrap();
        list.set_done(test_request(2).id.as_ref().unwrap()).unwrap();
        list.set_acceptor(test_request(3).id.as_ref().unwrap(), Some("w2".to_string()))
            .unwrap();
        list
    }

    #[test]
    fn test_global_stats_triple() {
        let list = populated_list();
        let stats = list.stats();

        assert_eq!(stats.completed, 2);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.waiting, 2);
    }

    #[test]
    fn test_snapshot_queries() {
        let list = populated_list();

        assert_eq!(list.completed().len(), 2);
        assert_eq!(list.in_progress().len(), 1);
        assert_eq!(list.waiting().len(), 2);
        assert_eq!(list.by_acceptor("w1").len(), 2);
        assert_eq!(list.by_acceptor("w2").len(), 1);
        assert!(list.by_acceptor("w3").is_empty());
    }

    #[test]
    fn test_complete_stats_per_worker_breakdown() {
        let list = populated_list();
        let table = list.complete_stats();

        assert_eq!(table.global.completed, 2);
        assert_eq!(table.global.in_progress, 1);
        assert_eq!(table.global.waiting, 2);

        // Workers appear in order of first observation
        assert_eq!(table.per_worker.len(), 2);
        let (name, w1) = &table.per_worker[0];
        assert_eq!(name, "w1");
        assert_eq!(w1.completed, 2);
        assert_eq!(w1.in_progress, 0);
        let (name, w2) = &table.per_worker[1];
        assert_eq!(name, "w2");
        assert_eq!(w2.in_progress, 1);
    }

    #[test]
    fn test_set_done_on_unknown_job_fails() {
        let mut list = JobList::new();
        let unknown = test_request(9).id.unwrap();
        assert!(list.set_done(&unknown).is_err());
    }

    // ============================================================
    // TEST 3: Submitter against an in-memory board
    // ============================================================

    /// A minimal stand-in for the worker side: claims requests, writes an
    /// acceptance, answers after a delay, then releases the acceptance.
    fn spawn_fake_worker(space: Arc<MemorySpace>, name: &'static str, reply_delay: Duration) {
        tokio::spawn(async move {
            loop {
                let Ok(Some(Entry::Request(request))) = space
                    .take(Template::any_request(), Timeout::Millis(5_000))
                    .await
                else {
                    return;
                };
                let id = request.id.clone().unwrap();

                space
                    .write(
                        Entry::Acceptance(Acceptance {
                            worker: name.to_string(),
                            request,
                        }),
                        Lease::Millis(60_000),
                    )
                    .await
                    .unwrap();

                tokio::time::sleep(reply_delay).await;

                space
                    .write(Entry::Reply(Reply::new(id.clone())), Lease::Forever)
                    .await
                    .unwrap();
                let _ = space
                    .take(Template::acceptance(name, &id), Timeout::Millis(500))
                    .await;
            }
        });
    }

    #[tokio::test]
    async fn test_submit_attaches_id_when_missing() {
        let space = MemorySpace::new();
        let mut submitter = Submitter::new(space.clone(), "alice");

        let id = submitter
            .submit(Request::new("Kappa", "stats", vec![]))
            .await
            .unwrap();

        assert_eq!(id.submitter, "alice");
        assert_eq!(id.sequence, 1);
        assert_eq!(submitter.jobs().len(), 1);

        // The request landed on the board
        let taken = space.take_if_exists(Template::any_request()).await.unwrap();
        assert!(taken.is_some());
    }

    #[tokio::test]
    async fn test_run_collects_replies_and_tracks_acceptors() {
        let space = MemorySpace::new();
        spawn_fake_worker(space.clone(), "w-test", Duration::from_millis(600));

        let mut submitter = Submitter::new(space.clone(), "alice");
        let mut generator =
            RequestGenerator::from_lines("alice", vec!["Kappa stats comwest".to_string()]);

        let replies = submitter.run(&mut generator).await.unwrap();

        assert_eq!(replies.len(), 1);
        let stats = submitter.jobs().stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.waiting, 0);

        // The slow reply left time to observe the acceptance
        let table = submitter.jobs().complete_stats();
        assert_eq!(table.per_worker.len(), 1);
        assert_eq!(table.per_worker[0].0, "w-test");
    }

    #[tokio::test]
    async fn test_run_honors_group_and_barrier() {
        let space = MemorySpace::new();
        spawn_fake_worker(space.clone(), "w-test", Duration::from_millis(50));

        let mut submitter = Submitter::new(space.clone(), "alice");
        let mut generator = RequestGenerator::from_lines(
            "alice",
            vec![
                "{".to_string(),
                "Kappa stats a".to_string(),
                "Kappa stats b".to_string(),
                "}".to_string(),
            ],
        );

        let replies = submitter.run(&mut generator).await.unwrap();

        assert_eq!(replies.len(), 2);
        assert!(submitter.jobs().all_done());
    }
}
