//! CostGuard simulator binary
//!
//! Submits a batch of random print jobs through the policy pipeline and logs
//! the resulting statistics.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use prometheus::{Encoder, Registry, TextEncoder};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use pressledger_common::{PressLedgerError, PrintJobSubmission, VERSION};
use pressledger_costguard::{
    config::{CacheBackend, CostGuardConfig, SimulationSettings},
    metrics::CostGuardMetrics,
    statistics::{InMemoryStatisticsCache, RedisStatisticsCache, StatisticsCache},
    store::{InMemoryRecordStore, RecordStore},
    CostGuard,
};

const PAPER_SIZES: [&str; 4] = ["A4", "A4", "A3", "PHOTO"];

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting PressLedger CostGuard simulator v{}", VERSION);

    // Load configuration
    let config = CostGuardConfig::load()?;
    info!("Loaded configuration: {:?}", config);

    let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
    let cache: Arc<dyn StatisticsCache> = match config.cache.backend {
        CacheBackend::Memory => Arc::new(InMemoryStatisticsCache::new(config.cache.max_entries)),
        CacheBackend::Redis => {
            let url = config
                .cache
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow!("cache.redis_url is not set"))?;
            Arc::new(RedisStatisticsCache::new(url).await?)
        }
    };

    let registry = Registry::new();
    let metrics = Arc::new(CostGuardMetrics::new()?);
    metrics.register(&registry)?;

    let guard = CostGuard::from_config(&config, store, cache)?.with_metrics(metrics.clone());

    let sim = &config.simulation;
    let mut rng = match sim.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let now = Utc::now();

    info!(
        "Simulating {} jobs across {} departments, {} printers",
        sim.jobs, sim.departments, sim.printers
    );

    let mut rejected = 0usize;
    for _ in 0..sim.jobs {
        let submission = random_submission(&mut rng, sim, now);
        match guard.submit_job(submission).await {
            Ok(receipt) => debug!(
                job_id = %receipt.record.job_id,
                policy = ?receipt.record.primary_policy(),
                "Job accepted"
            ),
            Err(PressLedgerError::Job(e)) => {
                rejected += 1;
                debug!(error = %e, "Job rejected");
            }
            Err(e) => return Err(e.into()),
        }
    }
    if rejected > 0 {
        warn!("{} simulated jobs were rejected by validation", rejected);
    }

    let start = now - Duration::days(i64::from(sim.days));
    let end = now + Duration::seconds(1);

    let overall = guard.overall(start, end).await?;
    info!("Overall statistics:\n{}", serde_json::to_string_pretty(&overall)?);

    let departments = guard.by_department(start, end).await?;
    info!("Department statistics:\n{}", serde_json::to_string_pretty(&departments)?);

    let printers = guard.by_printer(start, end).await?;
    info!("Printer statistics:\n{}", serde_json::to_string_pretty(&printers)?);

    if let Some(first) = departments.first() {
        let analysis = guard
            .cost_analysis(Some(first.department_id), start, end)
            .await?;
        info!(
            "Cost analysis for department {}:\n{}",
            first.department_id,
            serde_json::to_string_pretty(&analysis)?
        );
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    info!("Metrics:\n{}", String::from_utf8(buffer)?);

    Ok(())
}

/// Random job within the simulated fleet
///
/// Roughly one in fifty jobs carries an inconsistent page split so that
/// validation failures show up in the run.
fn random_submission(rng: &mut StdRng, sim: &SimulationSettings, now: DateTime<Utc>) -> PrintJobSubmission {
    let department_id = rng.gen_range(1..=sim.departments.max(1));
    let user_id = (department_id - 1) * sim.users_per_department.max(1)
        + rng.gen_range(1..=sim.users_per_department.max(1));
    let printer_id = rng.gen_range(1..=sim.printers.max(1));

    let page_count: i64 = rng.gen_range(1..=40);
    let color_page_count = match rng.gen_range(0..10) {
        0..=2 => 0,
        3..=6 => page_count / 10,
        _ => rng.gen_range(0..=page_count),
    };
    let mut bw_page_count = page_count - color_page_count;
    if rng.gen_ratio(1, 50) {
        bw_page_count += 1;
    }

    let max_age_secs = i64::from(sim.days.max(1)) * 86_400;
    let timestamp = now - Duration::seconds(rng.gen_range(0..max_age_secs));

    PrintJobSubmission::new(
        Uuid::now_v7().to_string(),
        printer_id,
        user_id,
        department_id,
        page_count,
        color_page_count,
        bw_page_count,
    )
    .with_timestamp(timestamp)
    .with_duplex(rng.gen_bool(0.3))
    .with_paper_size(PAPER_SIZES[rng.gen_range(0..PAPER_SIZES.len())])
    .with_document(format!("document-{}.pdf", rng.gen_range(1000..10000)))
}
