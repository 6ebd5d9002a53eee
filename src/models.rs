use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MttrError, Result};

const LOG_FILE_NAME: &str = "all_builds.jsonl";
const METRICS_FILE_NAME: &str = "metrics.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    Failure,
    Unstable,
    Aborted,
    #[serde(other)]
    Other,
}

/// One completed build as it appears in the outcome log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    pub build_number: u64,
    /// Epoch milliseconds.
    pub start_time: i64,
    /// Milliseconds.
    pub duration: u64,
    pub result: BuildResult,
}

impl BuildRecord {
    pub fn new(build_number: u64, start_time: i64, duration: u64, result: BuildResult) -> Self {
        Self {
            build_number,
            start_time,
            duration,
            result,
        }
    }
}

/// A tracked project: a name resolved under a storage root.
///
/// Each project owns exactly one outcome log and one metric store, both kept
/// in its own directory so that projects never share files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    name: String,
    root_dir: PathBuf,
}

impl Project {
    pub fn new(storage_root: impl AsRef<Path>, name: &str) -> Result<Self> {
        let relative = Path::new(name);

        if name.trim().is_empty() {
            return Err(MttrError::Config("Project name must not be empty".to_string()));
        }

        let valid = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(MttrError::Config(format!(
                "Project name must be a relative path without '..': {name}"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            root_dir: storage_root.as_ref().join(relative),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.root_dir.join(LOG_FILE_NAME)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.root_dir.join(METRICS_FILE_NAME)
    }
}
