use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::auth::Token;
use crate::error::{MttrError, Result};
use crate::models::BuildResult;

pub struct GitLabClient {
    client: Client,
    api_url: Url,
    token: Option<Token>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitLabPipelineListDto {
    pub id: u64,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitLabPipelineDto {
    pub id: u64,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    /// Seconds.
    pub duration: Option<u64>,
}

impl GitLabPipelineListDto {
    pub fn is_finished(&self) -> bool {
        map_status(&self.status).is_some()
    }
}

/// Maps a finished GitLab pipeline status; unfinished statuses yield `None`.
pub fn map_status(status: &str) -> Option<BuildResult> {
    match status {
        "success" => Some(BuildResult::Success),
        "failed" => Some(BuildResult::Failure),
        "canceled" => Some(BuildResult::Aborted),
        "skipped" | "manual" => Some(BuildResult::Other),
        _ => None,
    }
}

impl GitLabClient {
    pub fn new(base_url: &str, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("MTTRLens/0.1.0")
            .build()
            .map_err(|e| MttrError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(base_url)
            .map_err(|e| MttrError::Config(format!("Invalid base URL: {e}")))?
            .join("api/v4/")
            .map_err(|e| MttrError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    /// `projects/<id>/pipelines[/<extra>]` with the project id as one encoded segment.
    fn pipelines_url(&self, project_id: &str, extra: Option<&str>) -> Result<Url> {
        let mut url = self.api_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| MttrError::Config(format!("Invalid API URL: {}", self.api_url)))?;
            segments
                .pop_if_empty()
                .extend(["projects", project_id, "pipelines"]);
            if let Some(extra) = extra {
                segments.push(extra);
            }
        }
        Ok(url)
    }

    /// Fetch a page of finished pipelines, newest first.
    pub async fn fetch_pipeline_list_page(
        &self,
        project_id: &str,
        page: u32,
        per_page: u32,
        branch: Option<&str>,
    ) -> Result<Vec<GitLabPipelineListDto>> {
        let url = self.pipelines_url(project_id, None)?;

        let mut request = self
            .client
            .get(url)
            .query(&[("page", page), ("per_page", per_page)])
            .query(&[("scope", "finished"), ("order_by", "id"), ("sort", "desc")]);
        if let Some(branch) = branch {
            request = request.query(&[("ref", branch)]);
        }
        request = self.auth_request(request);

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MttrError::Api(format!(
                "Failed to fetch pipelines: {status} - {body}"
            )));
        }

        let pipelines = response.json::<Vec<GitLabPipelineListDto>>().await?;
        Ok(pipelines)
    }

    /// Fetch a single pipeline
    pub async fn fetch_pipeline(
        &self,
        project_id: &str,
        pipeline_id: u64,
    ) -> Result<GitLabPipelineDto> {
        let url = self.pipelines_url(project_id, Some(&pipeline_id.to_string()))?;
        let request = self.auth_request(self.client.get(url));

        let response = request.send().await?.error_for_status()?;
        let pipeline = response.json::<GitLabPipelineDto>().await?;
        Ok(pipeline)
    }
}
