use futures::{stream, StreamExt, TryStreamExt};
use log::{info, warn};

use super::client::{map_status, GitLabClient, GitLabPipelineDto};
use crate::auth::Token;
use crate::error::Result;
use crate::log_store;
use crate::models::{BuildRecord, Project};
use crate::pipeline;

const CONCURRENCY: usize = 10;
const PER_PAGE: u32 = 100;

pub struct GitLabProvider {
    client: GitLabClient,
    project_id: String,
}

impl GitLabProvider {
    pub fn new(base_url: &str, project_id: String, token: Option<Token>) -> Result<Self> {
        let client = GitLabClient::new(base_url, token)?;

        Ok(Self { client, project_id })
    }

    /// Fetches finished pipelines newer than `after`, oldest first.
    ///
    /// At most `limit` of the newest such pipelines are returned.
    pub async fn fetch_builds(
        &self,
        after: Option<u64>,
        limit: usize,
        branch: Option<&str>,
    ) -> Result<Vec<BuildRecord>> {
        let is_new = |id: u64| after.map_or(true, |last| id > last);
        let mut builds = Vec::with_capacity(limit);
        let mut page = 1;

        info!("Fetching up to {limit} pipelines for {}...", self.project_id);

        while builds.len() < limit {
            let pipelines_list = self
                .client
                .fetch_pipeline_list_page(&self.project_id, page, PER_PAGE, branch)
                .await?;

            if pipelines_list.is_empty() {
                info!("No more pipelines returned by API, stopping");
                break;
            }

            let reached_known = pipelines_list.iter().any(|p| !is_new(p.id));
            let candidates: Vec<u64> = pipelines_list
                .into_iter()
                .filter(|p| is_new(p.id) && p.is_finished())
                .map(|p| p.id)
                .collect();

            // Fetch full pipeline data concurrently, keeping newest-first order
            let records: Vec<BuildRecord> = stream::iter(candidates)
                .map(|id| async move { self.client.fetch_pipeline(&self.project_id, id).await })
                .buffered(CONCURRENCY)
                .try_collect::<Vec<_>>()
                .await?
                .into_iter()
                .filter_map(to_build_record)
                .take(limit.saturating_sub(builds.len()))
                .collect();

            let fetched_count = records.len();
            builds.extend(records);

            info!(
                "Page {page}: fetched {fetched_count} pipelines (total: {})",
                builds.len()
            );

            if reached_known {
                break;
            }
            page += 1;
        }

        builds.sort_by_key(|b| b.build_number);
        Ok(builds)
    }

    /// Appends pipelines not yet in the project's log, then refreshes metrics.
    ///
    /// Returns the number of builds appended.
    pub async fn import_history(
        &self,
        project: &Project,
        limit: usize,
        branch: Option<&str>,
        now: i64,
    ) -> Result<usize> {
        let local = project.clone();
        let last_known = pipeline::run_blocking(move || log_store::read_all(&local))
            .await?
            .iter()
            .map(|r| r.build_number)
            .max();

        let builds = self.fetch_builds(last_known, limit, branch).await?;
        if builds.is_empty() {
            warn!("No new pipelines found for project: {}", self.project_id);
        }

        let imported = builds.len();
        let local = project.clone();
        pipeline::run_blocking(move || {
            for build in &builds {
                log_store::append(&local, build)?;
            }
            pipeline::refresh(&local, now)
        })
        .await?;

        info!(
            "Imported {imported} builds from {} into {}",
            self.project_id,
            project.name()
        );

        Ok(imported)
    }
}

fn to_build_record(pipeline: GitLabPipelineDto) -> Option<BuildRecord> {
    let result = map_status(&pipeline.status)?;
    let started_at = pipeline.started_at?;

    Some(BuildRecord::new(
        pipeline.id,
        started_at.timestamp_millis(),
        pipeline.duration.unwrap_or(0).saturating_mul(1_000),
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric_store::{self, MetricKey};
    use crate::models::BuildResult;
    use mockito::{Matcher, Server, ServerGuard};

    const LIST_PATH: &str = "/api/v4/projects/group%2Fapp/pipelines";
    // 2024-01-01T00:00:00Z
    const JAN_1: i64 = 1_704_067_200_000;

    fn detail_body(id: u64, status: &str, started_at: Option<&str>, duration: u64) -> String {
        serde_json::json!({
            "id": id,
            "status": status,
            "started_at": started_at,
            "duration": duration,
        })
        .to_string()
    }

    async fn mock_page(server: &mut ServerGuard, page: &str, body: &str) -> mockito::Mock {
        server
            .mock("GET", LIST_PATH)
            .match_query(Matcher::UrlEncoded("page".into(), page.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    async fn mock_detail(server: &mut ServerGuard, id: u64, body: String) -> mockito::Mock {
        server
            .mock("GET", format!("{LIST_PATH}/{id}").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_fetch_builds_maps_and_orders_pipelines() {
        let mut server = Server::new_async().await;
        let _page = mock_page(
            &mut server,
            "1",
            r#"[{"id":12,"status":"success"},{"id":11,"status":"running"},{"id":10,"status":"failed"}]"#,
        )
        .await;
        let _page = mock_page(&mut server, "2", "[]").await;
        let _detail = mock_detail(
            &mut server,
            12,
            detail_body(12, "success", Some("2024-01-01T01:00:00Z"), 90),
        )
        .await;
        let _detail = mock_detail(
            &mut server,
            10,
            detail_body(10, "failed", Some("2024-01-01T00:00:00Z"), 30),
        )
        .await;

        let provider = GitLabProvider::new(&server.url(), "group/app".to_string(), None).unwrap();
        let builds = provider.fetch_builds(None, 50, None).await.unwrap();

        assert_eq!(
            builds,
            vec![
                BuildRecord::new(10, JAN_1, 30_000, BuildResult::Failure),
                BuildRecord::new(12, JAN_1 + 3_600_000, 90_000, BuildResult::Success),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_builds_skips_pipelines_without_start_time() {
        let mut server = Server::new_async().await;
        let _page = mock_page(&mut server, "1", r#"[{"id":5,"status":"canceled"}]"#).await;
        let _page = mock_page(&mut server, "2", "[]").await;
        let _detail = mock_detail(&mut server, 5, detail_body(5, "canceled", None, 0)).await;

        let provider = GitLabProvider::new(&server.url(), "group/app".to_string(), None).unwrap();
        let builds = provider.fetch_builds(None, 50, None).await.unwrap();

        assert!(builds.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_builds_surfaces_api_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", LIST_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"404 Project Not Found"}"#)
            .create_async()
            .await;

        let provider = GitLabProvider::new(&server.url(), "group/app".to_string(), None).unwrap();
        let err = provider.fetch_builds(None, 10, None).await.unwrap_err();

        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_import_history_appends_only_new_pipelines() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new(dir.path(), "app").unwrap();
        log_store::append(
            &project,
            &BuildRecord::new(20, JAN_1, 1_000, BuildResult::Failure),
        )
        .unwrap();

        let mut server = Server::new_async().await;
        let _page = mock_page(
            &mut server,
            "1",
            r#"[{"id":22,"status":"success"},{"id":20,"status":"failed"},{"id":19,"status":"success"}]"#,
        )
        .await;
        let _detail = mock_detail(
            &mut server,
            22,
            detail_body(22, "success", Some("2024-01-01T00:10:00Z"), 60),
        )
        .await;
        let provider = GitLabProvider::new(&server.url(), "group/app".to_string(), None).unwrap();

        let imported = provider
            .import_history(&project, 100, None, JAN_1 + 3_600_000)
            .await
            .unwrap();

        assert_eq!(imported, 1);
        let numbers: Vec<u64> = log_store::read_all(&project)
            .unwrap()
            .iter()
            .map(|r| r.build_number)
            .collect();
        assert_eq!(numbers, vec![20, 22]);
        let stored = metric_store::read(&project).unwrap();
        assert_eq!(stored.get(MetricKey::MttrAllBuilds), Some(600_000));
    }

    #[tokio::test]
    async fn test_client_sends_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", LIST_PATH)
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer glpat-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let provider = GitLabProvider::new(
            &server.url(),
            "group/app".to_string(),
            Token::from_optional(Some("glpat-test")),
        )
        .unwrap();
        provider.fetch_builds(None, 10, None).await.unwrap();

        mock.assert_async().await;
    }
}
