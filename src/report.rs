use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::debug;
use serde::Serialize;

use crate::error::Result;
use crate::log_store;
use crate::metric_store::{self, MetricKey, MetricSet};
use crate::models::{BuildResult, Project};

#[derive(Debug, Serialize)]
pub struct ReliabilityReport {
    pub project: String,
    pub generated_at: DateTime<Utc>,
    pub total_builds: usize,
    pub successful_builds: usize,
    pub failed_builds: usize,
    /// Milliseconds per metric name; `null` when unavailable.
    pub metrics: IndexMap<&'static str, Option<u64>>,
}

/// Snapshot of a project's log counts and stored metrics.
///
/// An unreadable metric store still produces a report, with every metric null.
pub fn build_report(project: &Project, generated_at: DateTime<Utc>) -> Result<ReliabilityReport> {
    let records = log_store::read_all(project)?;
    let stored = metric_store::read(project).unwrap_or_else(|e| {
        debug!("Reporting without stored metrics for {}: {e}", project.name());
        MetricSet::new()
    });

    let count = |result: BuildResult| records.iter().filter(|r| r.result == result).count();

    Ok(ReliabilityReport {
        project: project.name().to_string(),
        generated_at,
        total_builds: records.len(),
        successful_builds: count(BuildResult::Success),
        failed_builds: count(BuildResult::Failure),
        metrics: MetricKey::ALL
            .into_iter()
            .map(|key| (key.as_str(), stored.get(key)))
            .collect(),
    })
}
