//! End-to-end scenario tests against the full orchestrator, exercising the
//! pipeline the way a real ingestion call would: JSON in, `Datastore` state
//! out.

use chrono::{Duration, Utc};

use perfsignal_core::artifact::ArtifactEnvelope;
use perfsignal_core::config::IngestionConfig;
use perfsignal_core::datum::{JobId, PushId};
use perfsignal_core::orchestrator::{ingest_artifact, JobContext, RepositoryContext};
use perfsignal_core::queue::test_support::RecordingAlertQueue;
use perfsignal_core::store::{Datastore, InMemoryStore};

fn job(repository: &str, push_time: chrono::DateTime<Utc>, alerts_enabled: bool, sheriffable: bool) -> JobContext {
    JobContext {
        job: JobId("job-1".into()),
        push: PushId("push-1".into()),
        push_time,
        repository: RepositoryContext {
            name: repository.to_string(),
            performance_alerts_enabled: alerts_enabled,
        },
        tier_is_sheriffable: sheriffable,
        machine_platform: "linux64".into(),
        option_collection_hash: "opt1".into(),
    }
}

fn parse(raw: &str) -> perfsignal_core::artifact::PerfArtifact {
    let envelope: ArtifactEnvelope = serde_json::from_str(raw).unwrap();
    envelope.performance_data.into_vec().remove(0)
}

#[tokio::test]
async fn scenario_1_summary_only_suite_with_alerts_disabled() {
    let store = InMemoryStore::new();
    store.seed_framework("talos", true).await;
    let queue = RecordingAlertQueue::default();
    let config = IngestionConfig::default();

    let artifact = parse(
        r#"{"performance_data": {"framework": {"name": "talos"}, "suites": [
            {"name": "s1", "value": 10.0, "subtests": []}
        ]}}"#,
    );

    let summary = ingest_artifact(&store, &queue, &config, &job("autoland", Utc::now(), false, true), &artifact)
        .await
        .unwrap();

    assert_eq!(summary.signatures_touched.len(), 1);
    assert!(summary.alerts_enqueued.is_empty());
    assert!(queue.enqueued.lock().await.is_empty());

    let signature = store.get_signature(&summary.signatures_touched[0]).await.unwrap().unwrap();
    assert!(signature.has_subtests);
    let series = store.get_series(&summary.signatures_touched[0]).await.unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].value, 10.0);
}

#[tokio::test]
async fn scenario_2_subtest_with_summary_alerts_summary_only() {
    let store = InMemoryStore::new();
    store.seed_framework("talos", true).await;
    let queue = RecordingAlertQueue::default();
    let config = IngestionConfig::default();

    let artifact = parse(
        r#"{"performance_data": {"framework": {"name": "talos"}, "suites": [
            {"name": "s1", "value": 10.0, "subtests": [
                {"name": "t1", "value": 8.0, "replicates": []}
            ]}
        ]}}"#,
    );

    let summary = ingest_artifact(&store, &queue, &config, &job("autoland", Utc::now(), true, true), &artifact)
        .await
        .unwrap();

    assert_eq!(summary.signatures_touched.len(), 2);
    assert_eq!(summary.alerts_enqueued.len(), 1, "only the summary signature should alert");

    let parent_signature_key = &summary.signatures_touched[0];
    let subtest_signature_key = &summary.signatures_touched[1];
    assert_eq!(&summary.alerts_enqueued[0], parent_signature_key);

    let subtest_signature = store.get_signature(subtest_signature_key).await.unwrap().unwrap();
    assert_eq!(subtest_signature.parent_signature.as_deref(), Some(parent_signature_key.3.as_str()));
}

#[tokio::test]
async fn scenario_4_replicate_gating_by_repository() {
    let queue = RecordingAlertQueue::default();
    let config = IngestionConfig::default();

    let artifact = parse(
        r#"{"performance_data": {"framework": {"name": "talos"}, "suites": [
            {"name": "speedometer3", "subtests": [
                {"name": "t1", "value": 8.0, "replicates": [1.0, 2.0, 3.0]}
            ]}
        ]}}"#,
    );

    let autoland_store = InMemoryStore::new();
    autoland_store.seed_framework("talos", true).await;
    let autoland_summary = ingest_artifact(&autoland_store, &queue, &config, &job("autoland", Utc::now(), true, true), &artifact)
        .await
        .unwrap();
    let subtest_key = &autoland_summary.signatures_touched[0];
    let autoland_series = autoland_store.get_series(subtest_key).await.unwrap();
    let autoland_datum_key = autoland_series[0].key();
    assert_eq!(autoland_store.replicate_count(&autoland_datum_key).await, 0);

    let mc_store = InMemoryStore::new();
    mc_store.seed_framework("talos", true).await;
    let mc_summary = ingest_artifact(&mc_store, &queue, &config, &job("mozilla-central", Utc::now(), true, true), &artifact)
        .await
        .unwrap();
    let mc_subtest_key = &mc_summary.signatures_touched[0];
    let mc_series = mc_store.get_series(mc_subtest_key).await.unwrap();
    let mc_datum_key = mc_series[0].key();
    assert_eq!(mc_store.replicate_count(&mc_datum_key).await, 3);
}

#[tokio::test]
async fn scenario_5_multi_commit_marker_created_once() {
    let store = InMemoryStore::new();
    store.seed_framework("talos", true).await;
    let queue = RecordingAlertQueue::default();
    let config = IngestionConfig {
        multidata_ingestion_enabled: true,
    };

    let push_time = Utc::now();
    let artifact_push_timestamp = (push_time - Duration::minutes(5)).timestamp();
    let raw = format!(
        r#"{{"performance_data": {{"framework": {{"name": "talos"}}, "pushTimestamp": {artifact_push_timestamp}, "suites": [
            {{"name": "s1", "value": 10.0, "subtests": []}}
        ]}}}}"#
    );
    let artifact = parse(&raw);

    let job_ctx = job("autoland", push_time, true, true);
    let summary = ingest_artifact(&store, &queue, &config, &job_ctx, &artifact).await.unwrap();
    let key = &summary.signatures_touched[0];
    let series = store.get_series(key).await.unwrap();
    let datum_key = series[0].key();
    assert!(store.is_multi_commit_marked(&datum_key).await);

    // Re-ingest: identity key unchanged, should coalesce on the existing
    // datum and not create a second marker (there's only one boolean to
    // flip, but the datum must not be recreated either).
    let second = ingest_artifact(&store, &queue, &config, &job_ctx, &artifact).await.unwrap();
    assert_eq!(&second.signatures_touched, &summary.signatures_touched);
    let series_after = store.get_series(key).await.unwrap();
    assert_eq!(series_after.len(), 1, "duplicate ingest must not create a second datum row");
}

#[tokio::test]
async fn scenario_6_unknown_job_resource_usage_framework_writes_nothing() {
    let store = InMemoryStore::new();
    let queue = RecordingAlertQueue::default();
    let config = IngestionConfig::default();

    let artifact = parse(
        r#"{"performance_data": {"framework": {"name": "job_resource_usage"}, "suites": [
            {"name": "s1", "value": 10.0, "subtests": []}
        ]}}"#,
    );

    let summary = ingest_artifact(&store, &queue, &config, &job("autoland", Utc::now(), true, true), &artifact)
        .await
        .unwrap();

    assert!(summary.skipped);
    assert!(summary.signatures_touched.is_empty());
    assert!(queue.enqueued.lock().await.is_empty());
}

#[tokio::test]
async fn duplicate_ingest_creates_zero_new_datum_rows() {
    let store = InMemoryStore::new();
    store.seed_framework("talos", true).await;
    let queue = RecordingAlertQueue::default();
    let config = IngestionConfig::default();

    let artifact = parse(
        r#"{"performance_data": {"framework": {"name": "talos"}, "suites": [
            {"name": "s1", "value": 10.0, "subtests": []}
        ]}}"#,
    );

    let job_ctx = job("autoland", Utc::now(), true, true);
    let first = ingest_artifact(&store, &queue, &config, &job_ctx, &artifact).await.unwrap();
    let second = ingest_artifact(&store, &queue, &config, &job_ctx, &artifact).await.unwrap();

    let key = &first.signatures_touched[0];
    let series = store.get_series(key).await.unwrap();
    assert_eq!(series.len(), 1);
    // Second ingest's signature is an update, not a fresh alert-eligible creation.
    assert_eq!(first.alerts_enqueued.len(), 1);
    assert!(second.alerts_enqueued.is_empty());
}
