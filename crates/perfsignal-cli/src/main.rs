use std::fs;
use std::process;

use chrono::Utc;
use clap::{Parser, Subcommand};

use perfsignal_core::artifact::ArtifactEnvelope;
use perfsignal_core::config::IngestionConfig;
use perfsignal_core::datum::{JobId, PushId};
use perfsignal_core::detector::{Detector, RevisionPoint};
use perfsignal_core::orchestrator::{ingest_artifact, JobContext, RepositoryContext};
use perfsignal_core::pipeline_self_check;
use perfsignal_core::queue::NullAlertQueue;
use perfsignal_core::stats::plain_variance;
use perfsignal_core::store::InMemoryStore;

#[derive(Parser, Debug)]
#[command(
    name = "perfsignal",
    about = "Debug tooling for the perfsignal performance-regression pipeline",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify the pipeline's dependency stack is wired correctly.
    SystemCheck,
    /// Ingest one performance artifact JSON file against an in-memory store
    /// and print the resulting signatures and datums.
    Ingest {
        /// Path to a JSON file shaped like `{"performance_data": ...}`
        file: String,
        /// Repository this artifact is attributed to.
        #[arg(long, default_value = "autoland")]
        repository: String,
        #[arg(long, default_value_t = true)]
        alerts_enabled: bool,
        #[arg(long, default_value_t = true)]
        tier_sheriffable: bool,
    },
    /// Run the Student change-point detector over a comma-separated list of
    /// values and print the flagged indices.
    Detect {
        /// Comma-separated numeric series, e.g. "100,101,99,140,142".
        values: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "perfsignal_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::SystemCheck => run_system_check(),
        Commands::Ingest {
            file,
            repository,
            alerts_enabled,
            tier_sheriffable,
        } => run_ingest(&file, &repository, alerts_enabled, tier_sheriffable).await,
        Commands::Detect { values } => run_detect(&values),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run_system_check() -> anyhow::Result<()> {
    let report = pipeline_self_check().map_err(|e| anyhow::anyhow!(e))?;
    println!("{report}");
    Ok(())
}

async fn run_ingest(
    file: &str,
    repository: &str,
    alerts_enabled: bool,
    tier_sheriffable: bool,
) -> anyhow::Result<()> {
    let raw = fs::read_to_string(file)?;
    let envelope: ArtifactEnvelope = serde_json::from_str(&raw)?;
    let artifacts = envelope.performance_data.into_vec();

    let store = InMemoryStore::new();
    let queue = NullAlertQueue;
    let config = IngestionConfig::default();

    for (i, artifact) in artifacts.iter().enumerate() {
        store.seed_framework(&artifact.framework.name, true).await;
        let job = JobContext {
            job: JobId(format!("cli-job-{i}")),
            push: PushId(format!("cli-push-{i}")),
            push_time: Utc::now(),
            repository: RepositoryContext {
                name: repository.to_string(),
                performance_alerts_enabled: alerts_enabled,
            },
            tier_is_sheriffable: tier_sheriffable,
            machine_platform: "linux64".to_string(),
            option_collection_hash: "opt1".to_string(),
        };

        let summary = ingest_artifact(&store, &queue, &config, &job, artifact).await?;
        println!(
            "artifact {i}: {} signatures touched, {} alerts enqueued, skipped = {}",
            summary.signatures_touched.len(),
            summary.alerts_enqueued.len(),
            summary.skipped
        );
        for key in &summary.signatures_touched {
            println!("  signature {key:?}");
        }
    }

    Ok(())
}

fn run_detect(values: &str) -> anyhow::Result<()> {
    let parsed: Vec<f64> = values
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<Result<_, _>>()?;

    let start = Utc::now();
    let mut series: Vec<RevisionPoint> = parsed
        .iter()
        .enumerate()
        .map(|(i, &v)| RevisionPoint::new(start + chrono::Duration::minutes(i as i64), vec![v]))
        .collect();

    let detector = Detector::student();
    let signature = demo_signature();
    detector.detect_changes(&mut series, &signature);

    for (i, point) in series.iter().enumerate() {
        if point.change_detected {
            let props = point.alert_properties;
            println!(
                "index {i}: change detected (pct_change={:.2}, is_regression={})",
                props.map(|p| p.pct_change).unwrap_or(0.0),
                props.map(|p| p.is_regression).unwrap_or(false)
            );
        }
    }

    println!("plain sample variance across the full series: {:.4}", plain_variance(&parsed));

    Ok(())
}

fn demo_signature() -> perfsignal_core::signature::Signature {
    use perfsignal_core::tristate::TriState;
    perfsignal_core::signature::Signature {
        repository: "autoland".into(),
        framework: "talos".into(),
        application: String::new(),
        signature_hash: "cli-demo".into(),
        suite: "demo".into(),
        suite_public_name: None,
        test: String::new(),
        test_public_name: None,
        platform: "linux64".into(),
        option_collection: "opt1".into(),
        extra_options: String::new(),
        tags: String::new(),
        measurement_unit: None,
        lower_is_better: true,
        has_subtests: true,
        parent_signature: None,
        should_alert: TriState::Unset,
        monitor: TriState::Unset,
        alert_notify_emails: String::new(),
        alert_change_type: None,
        alert_threshold: None,
        min_back_window: None,
        max_back_window: None,
        fore_window: None,
        last_updated: Utc::now(),
    }
}
