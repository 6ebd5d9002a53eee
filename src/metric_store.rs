use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use log::{debug, warn};

use crate::aggregate::{AggregateMetric, MetricKind};
use crate::error::{MttrError, Result};
use crate::models::Project;
use crate::window::Window;

/// Names of the six persisted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKey {
    MttrLast7Days,
    MttrLast30Days,
    MttrAllBuilds,
    MttfLast7Days,
    MttfLast30Days,
    MttfAllBuilds,
}

impl MetricKey {
    pub const ALL: [MetricKey; 6] = [
        MetricKey::MttrLast7Days,
        MetricKey::MttrLast30Days,
        MetricKey::MttrAllBuilds,
        MetricKey::MttfLast7Days,
        MetricKey::MttfLast30Days,
        MetricKey::MttfAllBuilds,
    ];

    pub fn new(kind: MetricKind, window: Window) -> Self {
        match (kind, window) {
            (MetricKind::Mttr, Window::Last7Days) => MetricKey::MttrLast7Days,
            (MetricKind::Mttr, Window::Last30Days) => MetricKey::MttrLast30Days,
            (MetricKind::Mttr, Window::AllBuilds) => MetricKey::MttrAllBuilds,
            (MetricKind::Mttf, Window::Last7Days) => MetricKey::MttfLast7Days,
            (MetricKind::Mttf, Window::Last30Days) => MetricKey::MttfLast30Days,
            (MetricKind::Mttf, Window::AllBuilds) => MetricKey::MttfAllBuilds,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::MttrLast7Days => "mttrLast7days",
            MetricKey::MttrLast30Days => "mttrLast30days",
            MetricKey::MttrAllBuilds => "mttrAllBuilds",
            MetricKey::MttfLast7Days => "mttfLast7days",
            MetricKey::MttfLast30Days => "mttfLast30days",
            MetricKey::MttfAllBuilds => "mttfAllBuilds",
        }
    }
}

impl FromStr for MetricKey {
    type Err = MttrError;

    fn from_str(s: &str) -> Result<Self> {
        MetricKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| MttrError::Config(format!("Unknown metric key: {s}")))
    }
}

impl std::fmt::Display for MetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric values keyed by name, in canonical key order.
///
/// A key that is absent is unavailable, which is different from a stored 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricSet {
    values: IndexMap<MetricKey, u64>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: MetricKey, value_ms: u64) {
        self.values.insert(key, value_ms);
        self.values.sort_keys();
    }

    pub fn get(&self, key: MetricKey) -> Option<u64> {
        self.values.get(&key).copied()
    }

    /// Like [`MetricSet::get`] but reports an absent key as an error.
    pub fn value(&self, key: MetricKey) -> Result<u64> {
        self.get(key)
            .ok_or_else(|| MttrError::MissingMetric(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKey, u64)> + '_ {
        self.values.iter().map(|(&k, &v)| (k, v))
    }
}

impl FromIterator<AggregateMetric> for MetricSet {
    fn from_iter<I: IntoIterator<Item = AggregateMetric>>(iter: I) -> Self {
        let mut set = MetricSet::new();
        for metric in iter {
            set.insert(MetricKey::new(metric.kind, metric.window), metric.value_ms);
        }
        set
    }
}

/// Replaces the project's metric file with `values`.
///
/// The content is written to a temporary file in the same directory, synced,
/// and renamed over the target so readers see either the old or the new file.
pub fn store(project: &Project, values: &MetricSet) -> Result<()> {
    if values.is_empty() {
        warn!("Storing an empty metric set for {}", project.name());
    }

    let content: IndexMap<&str, String> = values
        .iter()
        .map(|(key, value)| (key.as_str(), value.to_string()))
        .collect();
    let json = serde_json::to_string_pretty(&content)?;

    fs::create_dir_all(project.root_dir())?;
    write_atomic(&project.metrics_path(), json.as_bytes())?;

    debug!(
        "Stored {} metrics for {} at {}",
        values.len(),
        project.name(),
        project.metrics_path().display()
    );

    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| MttrError::Config(format!("Path has no parent: {}", path.display())))?;
    let base = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MttrError::Config(format!("Path has no file name: {}", path.display())))?;

    // Unique per writer, so concurrent stores never share a temp file
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{base}."))
        .suffix(".tmp")
        .tempfile_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    sync_dir(parent)
}

/// Makes a rename or file creation inside `dir` durable.
#[cfg(unix)]
pub(crate) fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Loads the project's stored metrics.
///
/// A missing or unparsable file is [`MttrError::StoreUnavailable`]. Keys whose
/// value is absent or not a number are left out of the returned set.
pub fn read(project: &Project) -> Result<MetricSet> {
    let path = project.metrics_path();
    let content = fs::read_to_string(&path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            MttrError::StoreUnavailable(format!("no metric store for {}", project.name()))
        } else {
            MttrError::StoreUnavailable(format!("cannot read {}: {e}", path.display()))
        }
    })?;

    let raw: IndexMap<String, serde_json::Value> =
        serde_json::from_str(&content).map_err(|e| {
            MttrError::StoreUnavailable(format!("cannot parse {}: {e}", path.display()))
        })?;

    let mut values = MetricSet::new();
    for key in MetricKey::ALL {
        let Some(raw_value) = raw.get(key.as_str()) else {
            continue;
        };

        match parse_value(raw_value) {
            Some(value) => values.insert(key, value),
            None => warn!(
                "Ignoring malformed value for {key} in {}: {raw_value}",
                path.display()
            ),
        }
    }

    Ok(values)
}

fn parse_value(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
