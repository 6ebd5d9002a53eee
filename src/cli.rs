use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::aggregate::MetricKind;
use crate::auth::Token;
use crate::metric_store::MetricKey;
use crate::models::{BuildRecord, BuildResult, Project};
use crate::providers::gitlab::GitLabProvider;
use crate::{pipeline, reader, report};

#[derive(Parser)]
#[command(name = "mttrlens")]
#[command(author, version, about = "Build reliability metrics (MTTR/MTTF)", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding one sub-directory per project
    #[arg(
        short,
        long,
        global = true,
        env = "MTTRLENS_STORAGE_ROOT",
        default_value = ".mttrlens"
    )]
    storage_root: PathBuf,

    /// Output file path for reports (defaults to stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Pretty print JSON output
    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a completed build and recompute metrics
    Record {
        /// Project name (e.g., "group/project")
        #[arg(short = 'P', long)]
        project: String,

        /// Build number
        #[arg(short, long)]
        build_number: u64,

        /// Build start time in epoch milliseconds (defaults to now minus duration)
        #[arg(long)]
        start_time: Option<i64>,

        /// Build duration in milliseconds
        #[arg(short, long, default_value_t = 0)]
        duration: u64,

        /// Build result
        #[arg(short, long, value_enum, ignore_case = true)]
        result: BuildResult,
    },

    /// Show the three-window summary for one metric kind
    Show {
        /// Project name
        #[arg(short = 'P', long)]
        project: String,

        /// Metric kind
        #[arg(short, long, value_enum, default_value_t = MetricKind::Mttr)]
        kind: MetricKind,
    },

    /// Print a single stored metric (e.g., "mttrLast7days")
    Get {
        /// Project name
        #[arg(short = 'P', long)]
        project: String,

        /// Metric name
        #[arg(short, long)]
        metric: MetricKey,
    },

    /// Write a JSON reliability report
    Report {
        /// Project name
        #[arg(short = 'P', long)]
        project: String,
    },

    /// Recompute metrics from existing logs
    Refresh {
        /// Project names
        #[arg(short = 'P', long = "project", required = true)]
        projects: Vec<String>,
    },

    /// Import pipeline history from GitLab
    Gitlab {
        /// GitLab API token (optional, required for private projects)
        #[arg(short, long, env = "GITLAB_TOKEN")]
        token: Option<String>,

        /// GitLab instance URL
        #[arg(short, long, default_value = "https://gitlab.com")]
        url: String,

        /// GitLab project ID or path; also used as the local project name
        #[arg(short = 'P', long)]
        project: String,

        /// Maximum number of new pipelines to import
        #[arg(short, long, default_value_t = 500)]
        limit: usize,

        /// Branch name to filter pipelines (optional)
        #[arg(short, long)]
        branch: Option<String>,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        // One instant per invocation so every window agrees
        let now = Utc::now().timestamp_millis();

        match &self.command {
            Commands::Record {
                project,
                build_number,
                start_time,
                duration,
                result,
            } => {
                let project = self.project(project)?;
                #[allow(clippy::cast_possible_wrap)]
                let start_time = start_time.unwrap_or(now - *duration as i64);
                let record = BuildRecord::new(*build_number, start_time, *duration, *result);

                info!("Recording build #{build_number} for {}", project.name());
                pipeline::on_build_completed(&project, &record, now);

                for line in reader::get_show_result(&project, MetricKind::Mttr) {
                    println!("{line}");
                }
                Ok(())
            }
            Commands::Show { project, kind } => {
                let project = self.project(project)?;
                for line in reader::get_show_result(&project, *kind) {
                    println!("{line}");
                }
                Ok(())
            }
            Commands::Get { project, metric } => {
                let project = self.project(project)?;
                println!("{}", reader::get_result(&project, *metric));
                Ok(())
            }
            Commands::Report { project } => {
                let project = self.project(project)?;
                let report = report::build_report(&project, Utc::now())?;

                let json_output = if self.pretty {
                    serde_json::to_string_pretty(&report)?
                } else {
                    serde_json::to_string(&report)?
                };
                self.write_output(&json_output)
            }
            Commands::Refresh { projects } => {
                let projects = projects
                    .iter()
                    .map(|name| self.project(name))
                    .collect::<Result<Vec<_>>>()?;
                let total = projects.len();

                let refreshed = pipeline::refresh_all(projects, now).await;
                info!("Refreshed {} of {total} projects", refreshed.len());
                for name in refreshed {
                    println!("{name}");
                }
                Ok(())
            }
            Commands::Gitlab {
                token,
                url,
                project,
                limit,
                branch,
            } => {
                info!("Importing GitLab pipelines for project: {project}");

                let local = self.project(project)?;
                let token = Token::from_optional(token.as_deref());
                let provider = GitLabProvider::new(url, project.clone(), token)?;
                let imported = provider
                    .import_history(&local, *limit, branch.as_deref(), now)
                    .await?;

                println!("Imported {imported} builds");
                for line in reader::get_show_result(&local, MetricKind::Mttr) {
                    println!("{line}");
                }
                Ok(())
            }
        }
    }

    fn project(&self, name: &str) -> Result<Project> {
        Ok(Project::new(&self.storage_root, name)?)
    }

    fn write_output(&self, content: &str) -> Result<()> {
        if let Some(output_path) = &self.output {
            std::fs::write(output_path, content)?;
            info!("Report written to: {}", output_path.display());
        } else {
            println!("{content}");
        }
        Ok(())
    }
}
