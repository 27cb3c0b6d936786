#[cfg(test)]
mod tests {
    use crate::{
        AIRLINE_PIPELINE, TestEnv,
        utils::{airline_doc, at, broken_airline_doc, completed},
    };
    use engine_core::{
        lock::RunLock,
        progress::{HistoryService, RunPhase, RunStatus},
        state::sled_store::SledStateStore,
    };
    use engine_runtime::execution::coordinator::RunOutcome;
    use model::core::provenance::PROCESSING_TIME;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    const PIPELINE: &str = "merged_api_airline";

    // Scenario: another process holds the run lock.
    // Expected: the run exits without touching any collection and leaves the
    // foreign marker in place.
    #[traced_test]
    #[tokio::test]
    async fn held_lock_means_zero_operations() {
        let env = TestEnv::new(AIRLINE_PIPELINE, at(10, 0));
        env.source()
            .seed("Indigo_RQ_RS", vec![airline_doc(1, 9, 51, true, 1500)]);

        let lock = RunLock::new(env.settings.lock_dir(), PIPELINE);
        let _held = lock.try_acquire("other-run").unwrap().unwrap();

        let outcome = env.run().await;
        let RunOutcome::Skipped { holder, .. } = outcome else {
            panic!("expected a skipped run");
        };
        assert_eq!(holder.unwrap().run_id, "other-run");
        assert_eq!(env.source().operations(), 0);
        assert_eq!(env.target().operations(), 0);
        assert!(lock.is_held());
        assert!(logs_contain("Another run is in progress, exiting"));
    }

    // Scenario: a completed run followed by one that cannot read its watermark.
    // Expected: the journal holds one finished and one aborted run.
    #[tokio::test]
    async fn journal_records_finished_and_aborted_runs() {
        let env = TestEnv::new(AIRLINE_PIPELINE, at(10, 0));
        env.source().seed(
            "Indigo_RQ_RS",
            vec![airline_doc(1, 9, 51, true, 1500), broken_airline_doc(2, 9, 52)],
        );
        let first = completed(env.run().await);

        env.target().fail_collection("Merged_API_Airline");
        env.set_now(at(10, 10));
        assert!(matches!(env.run().await, RunOutcome::Aborted { .. }));

        let store = SledStateStore::open(env.settings.journal_dir(PIPELINE)).unwrap();
        let runs = HistoryService::new(Arc::new(store)).runs(PIPELINE).await.unwrap();
        assert_eq!(runs.len(), 2);

        assert_eq!(runs[0].run_id, first.run_id.as_str());
        assert_eq!(runs[0].status, RunStatus::Finished);
        assert_eq!(runs[0].window_start, Some(at(9, 50)));
        assert_eq!(runs[0].window_end, Some(at(10, 0)));
        let totals = runs[0].totals.as_ref().unwrap().overall();
        assert_eq!(totals.processed, 1);
        assert_eq!(totals.quarantined, 1);

        assert_eq!(runs[1].status, RunStatus::Aborted);
        assert!(runs[1].reason.as_deref().unwrap().contains("watermark"));
    }

    // Scenario: shutdown is requested before the first collection.
    // Expected: nothing is written, the run is aborted and the lock released.
    #[tokio::test]
    async fn cancelled_run_is_aborted_and_releases_the_lock() {
        let env = TestEnv::new(AIRLINE_PIPELINE, at(10, 0));
        env.source()
            .seed("Indigo_RQ_RS", vec![airline_doc(1, 9, 51, true, 1500)]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let executor = env.executor_with_cancel(cancel);
        let pipeline = env.settings.pipeline(PIPELINE).unwrap().clone();

        let coordinator = executor.coordinator(&pipeline).unwrap();
        assert_eq!(coordinator.phase(), RunPhase::Init);
        let outcome = coordinator.run().await.unwrap();

        let RunOutcome::Aborted { reason, report } = outcome else {
            panic!("expected an aborted run");
        };
        assert_eq!(reason, "Shutdown requested");
        assert!(report.window.is_some());
        assert_eq!(env.target().writes(), 0);
        assert!(!RunLock::new(env.settings.lock_dir(), PIPELINE).is_held());

        // The executor itself starts nothing once cancelled.
        assert!(executor.run(None).await.unwrap().is_empty());
    }

    // Scenario: one collection with two chunks.
    // Expected: the run alternates between extracting and loading per chunk
    // and finishes once the last fetch comes back empty.
    #[traced_test]
    #[tokio::test]
    async fn phases_follow_each_chunk() {
        let env = TestEnv::new(AIRLINE_PIPELINE, at(10, 0));
        env.source().seed(
            "Indigo_RQ_RS",
            vec![
                airline_doc(1, 9, 51, true, 1),
                airline_doc(2, 9, 52, true, 2),
                airline_doc(3, 9, 53, false, 3),
            ],
        );

        let report = completed(env.run().await);
        assert_eq!(report.totals.overall().batches, 2);

        assert!(logs_contain("from=WINDOW_RESOLVED to=EXTRACTING"));
        assert!(logs_contain("from=EXTRACTING to=LOADING"));
        assert!(logs_contain("from=LOADING to=EXTRACTING"));
        assert!(logs_contain("from=EXTRACTING to=DONE"));
    }

    // Scenario: a run whose only output went to quarantine.
    // Expected: the next run still starts from that run's processing time.
    #[tokio::test]
    async fn quarantine_only_run_advances_the_watermark() {
        let env = TestEnv::new(AIRLINE_PIPELINE, at(10, 0));
        env.source()
            .seed("Indigo_RQ_RS", vec![broken_airline_doc(1, 9, 55)]);

        let first = completed(env.run().await);
        assert_eq!(first.totals.overall().quarantined, 1);
        assert!(env.target().documents("Merged_API_Airline").is_empty());

        env.set_now(at(10, 30));
        let second = completed(env.run().await);
        assert_eq!(second.window.unwrap().start(), at(10, 0));
    }

    #[tokio::test]
    async fn ensure_indexes_covers_destination_and_quarantine() {
        let env = TestEnv::new(AIRLINE_PIPELINE, at(10, 0));
        let indexed = env.executor().ensure_indexes(None).await.unwrap();
        assert_eq!(
            indexed,
            vec![
                "Merged_API_Airline".to_string(),
                "Merged_API_Airline_Issue".to_string()
            ]
        );
        assert!(env.target().has_index("Merged_API_Airline", PROCESSING_TIME));
        assert!(env.target().has_index("Merged_API_Airline_Issue", PROCESSING_TIME));
    }
}
