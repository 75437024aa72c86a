//! C4 — Ingestion Orchestrator. Ties C1 (fingerprint), C2 (registry upsert),
//! C3 (datum record) and the alert queue into the per-artifact pipeline of
//! §4.4: framework gating, push-timestamp deduction, then summary-then-
//! subtests per suite in declaration order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::artifact::{first_subtest_value_by_name, PerfArtifact, Suite};
use crate::config::IngestionConfig;
use crate::datum::{self, JobId, PushId};
use crate::error::IngestError;
use crate::queue::AlertQueue;
use crate::signature::{fingerprint, order_and_concat, AlertChangeType, PropertyMap, Signature, SignatureKey};
use crate::store::Datastore;
use crate::tristate::TriState;

const JOB_RESOURCE_USAGE_FRAMEWORK: &str = "job_resource_usage";

#[derive(Debug, Clone)]
pub struct RepositoryContext {
    pub name: String,
    pub performance_alerts_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct JobContext {
    pub job: JobId,
    pub push: PushId,
    pub push_time: DateTime<Utc>,
    pub repository: RepositoryContext,
    pub tier_is_sheriffable: bool,
    pub machine_platform: String,
    pub option_collection_hash: String,
}

/// `(timestamp, is_multi_commit)` per §4.4's push-timestamp deduction.
pub fn deduce_push_timestamp(
    config: &IngestionConfig,
    artifact_push_timestamp: Option<i64>,
    job_push_time: DateTime<Utc>,
) -> (DateTime<Utc>, bool) {
    if !config.multidata_ingestion_enabled {
        return (job_push_time, false);
    }
    match artifact_push_timestamp.and_then(|secs| DateTime::from_timestamp(secs, 0)) {
        Some(ts) => (ts, true),
        None => (job_push_time, false),
    }
}

/// §4.4 summary alert-gating predicate.
pub fn suite_should_alert(
    signature: &Signature,
    datum_created: bool,
    repo: &RepositoryContext,
    tier_is_sheriffable: bool,
) -> bool {
    let primary = signature.should_alert != TriState::False
        && datum_created
        && repo.performance_alerts_enabled
        && tier_is_sheriffable;
    let monitored = signature.monitor.is_true() && repo.name != "try";
    primary || monitored
}

/// §4.4 subtest alert-gating predicate. `suite_has_summary_value` is
/// whether the parent suite carried its own summary value (the asymmetry
/// noted in §4.4: unset is opt-in only when the subtest is itself the
/// headline series).
pub fn test_should_alert(
    signature: &Signature,
    suite_has_summary_value: bool,
    datum_created: bool,
    repo: &RepositoryContext,
    tier_is_sheriffable: bool,
) -> bool {
    let alert_eligible = signature.should_alert.is_true()
        || (signature.should_alert.is_unset() && !suite_has_summary_value);
    let primary =
        alert_eligible && datum_created && repo.performance_alerts_enabled && tier_is_sheriffable;
    let monitored = signature.monitor.is_true() && repo.name != "try";
    primary || monitored
}

/// §4.4 replicate-gating matrix.
pub fn should_gather_replicates(repository_name: &str, suite_name: &str, replicates: &[f64]) -> bool {
    if replicates.is_empty() {
        return false;
    }
    const WATCHED_SUITES: [&str; 3] = ["applink-startup", "tab-restore", "homeview"];
    match repository_name {
        "try" => true,
        "mozilla-central" => {
            suite_name == "speedometer3" || WATCHED_SUITES.iter().any(|s| suite_name.contains(s))
        }
        "autoland" => WATCHED_SUITES.iter().any(|s| suite_name.contains(s)),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameworkGate {
    Proceed,
    SkipSilently,
    SkipUnknown,
    SkipDisabled,
}

async fn gate_framework(store: &dyn Datastore, framework_name: &str) -> Result<FrameworkGate, IngestError> {
    match store.get_framework_by_name(framework_name).await? {
        None if framework_name == JOB_RESOURCE_USAGE_FRAMEWORK => Ok(FrameworkGate::SkipSilently),
        None => Ok(FrameworkGate::SkipUnknown),
        Some(framework) if !framework.enabled => Ok(FrameworkGate::SkipDisabled),
        Some(_) => Ok(FrameworkGate::Proceed),
    }
}

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub signatures_touched: Vec<SignatureKey>,
    pub alerts_enqueued: Vec<SignatureKey>,
    pub skipped: bool,
}

fn extra_properties(extra_options: &[String]) -> (String, PropertyMap) {
    let mut properties = PropertyMap::new();
    let extra_options_str = if !extra_options.is_empty() {
        let mut sorted = extra_options.to_vec();
        sorted.sort();
        properties.insert(
            "test_options".to_string(),
            serde_json::to_value(&sorted).unwrap().into(),
        );
        order_and_concat(extra_options)
    } else {
        String::new()
    };
    (extra_options_str, properties)
}

/// The C4 pipeline: one call per ingested artifact.
pub async fn ingest_artifact(
    store: &dyn Datastore,
    queue: &dyn AlertQueue,
    config: &IngestionConfig,
    job: &JobContext,
    artifact: &PerfArtifact,
) -> Result<IngestSummary, IngestError> {
    let mut summary = IngestSummary::default();

    match gate_framework(store, &artifact.framework.name).await? {
        FrameworkGate::SkipSilently => {
            summary.skipped = true;
            return Ok(summary);
        }
        FrameworkGate::SkipUnknown => {
            warn!("unknown performance framework, skipping artifact: {}", artifact.framework.name);
            summary.skipped = true;
            return Ok(summary);
        }
        FrameworkGate::SkipDisabled => {
            info!("performance framework disabled, skipping artifact: {}", artifact.framework.name);
            summary.skipped = true;
            return Ok(summary);
        }
        FrameworkGate::Proceed => {}
    }

    let (push_timestamp, is_multi_commit) =
        deduce_push_timestamp(config, artifact.push_timestamp, job.push_time);

    let application = artifact.application_name();
    let application_version = artifact.application_version();

    for suite in &artifact.suites {
        ingest_suite(
            store,
            queue,
            job,
            &artifact.framework.name,
            &application,
            &application_version,
            push_timestamp,
            is_multi_commit,
            suite,
            &mut summary,
        )
        .await?;
    }

    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
async fn ingest_suite(
    store: &dyn Datastore,
    queue: &dyn AlertQueue,
    job: &JobContext,
    framework: &str,
    application: &str,
    application_version: &str,
    push_timestamp: DateTime<Utc>,
    is_multi_commit: bool,
    suite: &Suite,
    summary: &mut IngestSummary,
) -> Result<(), IngestError> {
    let (extra_options_str, suite_extra_properties) =
        extra_properties(suite.extra_options.as_deref().unwrap_or(&[]));

    let reference_data: PropertyMap = BTreeMap::from([
        (
            "option_collection_hash".to_string(),
            job.option_collection_hash.clone().into(),
        ),
        (
            "machine_platform".to_string(),
            job.machine_platform.clone().into(),
        ),
    ]);

    let mut summary_hash: Option<String> = None;
    let mut suite_has_summary_value = false;

    if let Some(summary_value) = suite.value {
        suite_has_summary_value = true;
        let mut properties = PropertyMap::new();
        properties.insert("suite".to_string(), suite.name.clone().into());
        properties.extend(reference_data.clone());
        properties.extend(suite_extra_properties.clone());

        let hash = fingerprint(&properties);
        summary_hash = Some(hash.clone());

        let key: SignatureKey = (
            job.repository.name.clone(),
            framework.to_string(),
            application.to_string(),
            hash.clone(),
        );

        let defaults = Signature {
            repository: job.repository.name.clone(),
            framework: framework.to_string(),
            application: application.to_string(),
            signature_hash: hash.clone(),
            suite: suite.name.clone(),
            suite_public_name: suite.public_name.clone(),
            test: String::new(),
            test_public_name: None,
            platform: job.machine_platform.clone(),
            option_collection: job.option_collection_hash.clone(),
            extra_options: extra_options_str.clone(),
            tags: order_and_concat(&suite.tags),
            measurement_unit: suite.unit.clone(),
            lower_is_better: suite.lower_is_better.unwrap_or(true),
            has_subtests: true,
            parent_signature: None,
            should_alert: TriState::from(suite.should_alert),
            monitor: TriState::from(suite.monitor),
            alert_notify_emails: order_and_concat(&suite.alert_notify_emails),
            alert_change_type: AlertChangeType::from_external(suite.alert_change_type.as_deref()),
            alert_threshold: suite.alert_threshold,
            min_back_window: suite.min_back_window,
            max_back_window: suite.max_back_window,
            fore_window: suite.fore_window,
            last_updated: job.push_time,
        };

        let signature = crate::registry::upsert(store, &key, defaults).await?;
        summary.signatures_touched.push(key.clone());

        let (_datum, created) = datum::record(
            store,
            &job.repository.name,
            job.job.clone(),
            job.push.clone(),
            &key,
            push_timestamp,
            summary_value,
            application_version,
            &[],
            is_multi_commit,
        )
        .await?;

        if suite_should_alert(&signature, created, &job.repository, job.tier_is_sheriffable) {
            queue.enqueue_generate_alerts(key.clone()).await;
            summary.alerts_enqueued.push(key);
        }
    }

    for subtest in &suite.subtests {
        let mut properties = PropertyMap::new();
        properties.insert("suite".to_string(), suite.name.clone().into());
        properties.insert("test".to_string(), subtest.name.clone().into());
        properties.extend(reference_data.clone());
        properties.extend(suite_extra_properties.clone());
        if let Some(hash) = &summary_hash {
            properties.insert("parent_signature".to_string(), hash.clone().into());
        }

        let hash = fingerprint(&properties);
        let key: SignatureKey = (
            job.repository.name.clone(),
            framework.to_string(),
            application.to_string(),
            hash.clone(),
        );

        let defaults = Signature {
            repository: job.repository.name.clone(),
            framework: framework.to_string(),
            application: application.to_string(),
            signature_hash: hash.clone(),
            suite: suite.name.clone(),
            suite_public_name: suite.public_name.clone(),
            test: subtest.name.clone(),
            test_public_name: subtest.public_name.clone(),
            platform: job.machine_platform.clone(),
            option_collection: job.option_collection_hash.clone(),
            extra_options: extra_options_str.clone(),
            tags: order_and_concat(&suite.tags),
            measurement_unit: subtest.unit.clone(),
            lower_is_better: subtest.lower_is_better.unwrap_or(true),
            has_subtests: false,
            parent_signature: summary_hash.clone(),
            should_alert: TriState::from(subtest.should_alert),
            monitor: TriState::from(suite.monitor),
            alert_notify_emails: order_and_concat(&suite.alert_notify_emails),
            alert_change_type: AlertChangeType::from_external(subtest.alert_change_type.as_deref()),
            alert_threshold: subtest.alert_threshold,
            min_back_window: subtest.min_back_window,
            max_back_window: subtest.max_back_window,
            fore_window: subtest.fore_window,
            last_updated: job.push_time,
        };

        let signature = crate::registry::upsert(store, &key, defaults).await?;
        summary.signatures_touched.push(key.clone());

        let subtest_value =
            first_subtest_value_by_name(&suite.subtests, &subtest.name).unwrap_or(subtest.value);

        let gathered_replicates = if should_gather_replicates(&job.repository.name, &suite.name, &subtest.replicates) {
            subtest.replicates.as_slice()
        } else {
            &[]
        };

        let (_datum, created) = datum::record(
            store,
            &job.repository.name,
            job.job.clone(),
            job.push.clone(),
            &key,
            push_timestamp,
            subtest_value,
            application_version,
            gathered_replicates,
            is_multi_commit,
        )
        .await?;

        if test_should_alert(
            &signature,
            suite_has_summary_value,
            created,
            &job.repository,
            job.tier_is_sheriffable,
        ) {
            queue.enqueue_generate_alerts(key.clone()).await;
            summary.alerts_enqueued.push(key);
        }
    }

    Ok(())
}
