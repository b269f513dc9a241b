#[cfg(test)]
mod tests {
    use crate::{
        FakeLocal, FakeRemote,
        utils::{Harness, fast_settings, leads},
    };
    use model::{
        core::value::Value,
        job::{JobFilters, JobStage, JobStatus},
    };
    use std::time::Duration;
    use tracing_test::traced_test;

    // Scenario: 1000 remote leads, 950 already present locally, two of the
    // missing ones disappear from the CRM before they are fetched.
    // Expected Outcome: missingCount=50, synced=48, error=2, job completed.
    #[traced_test]
    #[tokio::test]
    async fn missing_records_are_imported_and_failures_counted() {
        let remote = FakeRemote::new(leads(1000, "anna"))
            .with_page_size(100)
            .with_gone(&["960", "990"]);
        let local = FakeLocal::with_ids((1..=950).map(|i| i.to_string()), "anna");
        let h = Harness::new(remote, local);

        let handle = h.controller.start(JobFilters::default()).await.unwrap();
        let id = handle.id().to_string();
        handle.wait().await.unwrap();

        let job = h.job(&id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.stage, JobStage::Importing);
        assert_eq!(job.bitrix_total, 1000);
        assert_eq!(job.scanned_count, 1000);
        assert_eq!(job.missing_count, 50);
        assert_eq!(job.synced_count, 48);
        assert_eq!(job.error_count, 2);
        assert!(job.failure.is_none());

        let mut failed: Vec<_> = job.error_details.iter().map(|d| d.record_id.as_str()).collect();
        failed.sort();
        assert_eq!(failed, vec!["960", "990"]);

        assert_eq!(h.local.len(), 998);
        let imported = h.local.get("951").unwrap();
        assert_eq!(imported.get("title"), Some(&Value::from("Lead 951")));
        assert_eq!(imported.get("age"), Some(&Value::Int(51)));
        assert_eq!(imported.get("is_vip"), Some(&Value::Boolean(false)));

        let health = h.controller.health(&id).await.unwrap();
        assert_eq!(health.percentage, 100.0);
        assert!(health.can_delete);
        assert!(logs_contain("Record import failed"));
    }

    // Scenario: every remote id already exists locally.
    // Expected Outcome: the job completes from the comparing stage without
    // fetching anything.
    #[tokio::test]
    async fn nothing_missing_completes_without_import() {
        let remote = FakeRemote::new(leads(30, "anna"));
        let local = FakeLocal::with_ids((1..=30).map(|i| i.to_string()), "anna");
        let h = Harness::new(remote, local);

        let handle = h.controller.start(JobFilters::for_scouter("anna")).await.unwrap();
        let id = handle.id().to_string();
        handle.wait().await.unwrap();

        let job = h.job(&id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.stage, JobStage::Comparing);
        assert_eq!(job.missing_count, 0);
        assert_eq!(h.remote.fetches(), 0);
    }

    // Scenario: the CRM holds leads of two scouters; the job is scoped to one.
    // Expected Outcome: only that scouter's leads are listed and imported.
    #[tokio::test]
    async fn filters_limit_the_reconciled_scope() {
        let mut records = leads(10, "anna");
        records.extend(leads(15, "boris").into_iter().skip(10).map(|mut r| {
            r.id = format!("b{}", r.id);
            r
        }));
        let h = Harness::new(FakeRemote::new(records), FakeLocal::new());

        let handle = h.controller.start(JobFilters::for_scouter("Anna")).await.unwrap();
        let id = handle.id().to_string();
        handle.wait().await.unwrap();

        let job = h.job(&id).await;
        assert_eq!(job.bitrix_total, 10);
        assert_eq!(job.synced_count, 10);
        assert!(h.local.get("b11").is_none());
        assert_eq!(h.local.len(), 10);
    }

    // Scenario: the CRM returns the same id on more than one page.
    // Expected Outcome: scannedCount counts every id, bitrixTotal unique ones.
    #[tokio::test]
    async fn duplicate_remote_ids_are_imported_once() {
        let mut records = leads(5, "anna");
        records.extend(leads(3, "anna"));
        let h = Harness::new(FakeRemote::new(records).with_page_size(3), FakeLocal::new());

        let handle = h.controller.start(JobFilters::default()).await.unwrap();
        let id = handle.id().to_string();
        handle.wait().await.unwrap();

        let job = h.job(&id).await;
        assert_eq!(job.scanned_count, 8);
        assert_eq!(job.bitrix_total, 5);
        assert_eq!(job.missing_count, 5);
        assert_eq!(job.synced_count, 5);
        assert_eq!(h.remote.fetches(), 5);
    }

    // Scenario: one fetch fails twice with a transport error, then succeeds.
    // Expected Outcome: the retry policy absorbs the failures.
    #[tokio::test]
    async fn transient_fetch_failures_are_retried() {
        let remote = FakeRemote::new(leads(4, "anna")).with_flaky("3", 2);
        let h = Harness::new(remote, FakeLocal::new());

        let handle = h.controller.start(JobFilters::default()).await.unwrap();
        let id = handle.id().to_string();
        handle.wait().await.unwrap();

        let job = h.job(&id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.synced_count, 4);
        assert_eq!(job.error_count, 0);
        assert_eq!(h.remote.fetches(), 6);
    }

    // Scenario: a lead carries an age that is not a number.
    // Expected Outcome: the age is left out, the rest of the lead is imported
    // and the record counts as synced.
    #[tokio::test]
    async fn field_errors_do_not_fail_the_record() {
        let mut records = leads(2, "anna");
        records[1] = records[1].clone().with_field("UF_CRM_AGE", "abc");
        let h = Harness::new(FakeRemote::new(records), FakeLocal::new());

        let handle = h.controller.start(JobFilters::default()).await.unwrap();
        let id = handle.id().to_string();
        handle.wait().await.unwrap();

        let job = h.job(&id).await;
        assert_eq!(job.synced_count, 2);
        assert_eq!(job.error_count, 0);

        let lead = h.local.get("2").unwrap();
        assert!(lead.get("age").is_none());
        assert_eq!(lead.get("title"), Some(&Value::from("Lead 2")));
    }

    // Scenario: listing keeps failing with HTTP 503.
    // Expected Outcome: retries run out and the job fails with a message.
    #[traced_test]
    #[tokio::test]
    async fn exhausted_listing_retries_fail_the_job() {
        let remote = FakeRemote::new(leads(3, "anna")).with_failing_listing();
        let h = Harness::new(remote, FakeLocal::new());

        let handle = h.controller.start(JobFilters::default()).await.unwrap();
        let id = handle.id().to_string();
        handle.wait().await.unwrap();

        let job = h.job(&id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.stage, JobStage::ListingRemote);
        let failure = job.failure.unwrap();
        assert!(failure.contains("Listing remote ids failed"), "{failure}");
        assert!(failure.contains("3 attempts"), "{failure}");
        assert!(job.completed_at.is_some());
        assert!(logs_contain("Job failed"));
    }

    // Scenario: the CRM hands back the page token it was just given.
    // Expected Outcome: listing stops instead of looping and the job fails.
    #[tokio::test]
    async fn repeated_page_tokens_fail_the_job() {
        let remote = FakeRemote::new(Vec::new()).with_repeating_token();
        let h = Harness::new(remote, FakeLocal::new());

        let handle = h.controller.start(JobFilters::default()).await.unwrap();
        let id = handle.id().to_string();
        handle.wait().await.unwrap();

        let job = h.job(&id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.failure.unwrap().contains("twice"));
    }

    // Scenario: the CRM cycles through page tokens a, b, a, ...
    // Expected Outcome: the first token seen again fails the job after three
    // pages.
    #[tokio::test]
    async fn page_token_cycles_fail_the_job() {
        let remote = FakeRemote::new(Vec::new()).with_token_cycle(&["a", "b"]);
        let h = Harness::new(remote, FakeLocal::new());

        let handle = h.controller.start(JobFilters::default()).await.unwrap();
        let id = handle.id().to_string();
        tokio::time::timeout(Duration::from_secs(2), handle.wait())
            .await
            .expect("listing ends on its own")
            .unwrap();

        let job = h.job(&id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.scanned_count, 3);
        assert!(job.failure.unwrap().contains("'a' twice"));
    }

    // Scenario: more records fail than the details cap allows.
    // Expected Outcome: every failure is counted, only the first is kept.
    #[tokio::test]
    async fn error_details_are_capped_but_counted() {
        let remote = FakeRemote::new(leads(5, "anna")).with_gone(&["2", "3", "4"]);
        let settings = engine_config::settings::ReconcileSettings {
            max_error_details: 1,
            ..fast_settings()
        };
        let h = Harness::with_settings(remote, FakeLocal::new(), settings);

        let handle = h.controller.start(JobFilters::default()).await.unwrap();
        let id = handle.id().to_string();
        handle.wait().await.unwrap();

        let job = h.job(&id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.error_count, 3);
        assert_eq!(job.synced_count, 2);
        assert_eq!(job.error_details.len(), 1);
    }
}
