use std::collections::HashSet;

use futures::{stream, StreamExt};
use log::{error, info, warn};

use crate::aggregate::{aggregate_windows, AggregateMetric};
use crate::error::Result;
use crate::log_store;
use crate::metric_store::{self, MetricSet};
use crate::models::{BuildRecord, Project};

const CONCURRENCY: usize = 10;

/// Appends `record` and recomputes all six metrics for the project.
///
/// `now` is the epoch-millisecond instant every window in this pass is
/// measured against.
pub fn record_build(
    project: &Project,
    record: &BuildRecord,
    now: i64,
) -> Result<Vec<AggregateMetric>> {
    log_store::append(project, record)?;
    refresh(project, now)
}

/// Recomputes and stores all six metrics from the existing outcome log.
pub fn refresh(project: &Project, now: i64) -> Result<Vec<AggregateMetric>> {
    let records = log_store::read_all(project)?;
    let metrics = aggregate_windows(&records, now);

    metric_store::store(project, &metrics.iter().copied().collect::<MetricSet>())?;

    info!(
        "Updated metrics for {} from {} builds",
        project.name(),
        records.len()
    );

    Ok(metrics)
}

/// Entry point for a build-completion event.
///
/// Failures are logged and swallowed so the caller's completion workflow is
/// never interrupted by metrics bookkeeping.
pub fn on_build_completed(project: &Project, record: &BuildRecord, now: i64) {
    if let Err(e) = record_build(project, record, now) {
        error!(
            "Failed to update metrics for {} after build #{}: {e}",
            project.name(),
            record.build_number
        );
    }
}

/// Runs local storage work on the blocking pool.
pub async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Refreshes several projects concurrently on the blocking pool.
///
/// Each project is independent; one failing does not stop the others.
/// A project named more than once is refreshed once. Returns the names of
/// the projects that were refreshed.
pub async fn refresh_all(mut projects: Vec<Project>, now: i64) -> Vec<String> {
    let mut seen = HashSet::new();
    projects.retain(|project| seen.insert(project.name().to_string()));

    stream::iter(projects)
        .map(|project| async move {
            let name = project.name().to_string();
            let outcome = run_blocking(move || refresh(&project, now)).await;
            (name, outcome)
        })
        .buffer_unordered(CONCURRENCY)
        .filter_map(|(name, outcome)| async move {
            match outcome {
                Ok(_) => Some(name),
                Err(e) => {
                    warn!("Skipping {name}: {e}");
                    None
                }
            }
        })
        .collect()
        .await
}
