use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::config::GitHubConfig;
use crate::errors::{AppError, AppResult};
use crate::models::PendingDeploymentCandidate;

const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of a review submission. A non-2xx `status` is a rejection even when
/// the transport succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalResponse {
    pub status: u16,
    pub deployment_urls: Vec<String>,
    pub message: Option<String>,
}

impl ApprovalResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Remote pending-deployment review API.
#[async_trait]
pub trait DeploymentApi: Send + Sync {
    async fn list_pending_deployments(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
    ) -> AppResult<Vec<PendingDeploymentCandidate>>;

    async fn submit_approval(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
        environment_ids: &[u64],
        state: &str,
        comment: &str,
    ) -> AppResult<ApprovalResponse>;
}

#[derive(Debug, Deserialize)]
struct PendingDeploymentPayload {
    #[serde(default)]
    environment: Option<EnvironmentPayload>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentPayload {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeploymentPayload {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReviewRequest<'a> {
    environment_ids: &'a [u64],
    state: &'a str,
    comment: &'a str,
}

impl From<PendingDeploymentPayload> for PendingDeploymentCandidate {
    fn from(payload: PendingDeploymentPayload) -> Self {
        let (name, id) = payload
            .environment
            .map(|env| (env.name.unwrap_or_default(), env.id.unwrap_or_default()))
            .unwrap_or_default();
        PendingDeploymentCandidate::new(name, id)
    }
}

/// GitHub REST client for the `pending_deployments` endpoints.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|_| AppError::configuration("user agent is not a valid header value"))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AppError::configuration(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn pending_deployments_url(&self, owner: &str, repo: &str, run_id: u64) -> String {
        format!(
            "{}/repos/{}/{}/actions/runs/{}/pending_deployments",
            self.api_url, owner, repo, run_id
        )
    }
}

#[async_trait]
impl DeploymentApi for GitHubClient {
    async fn list_pending_deployments(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
    ) -> AppResult<Vec<PendingDeploymentCandidate>> {
        let response = self
            .http
            .get(self.pending_deployments_url(owner, repo, run_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "listing pending deployments failed");
            return Err(AppError::upstream(status.as_u16(), body));
        }

        let payload: Vec<PendingDeploymentPayload> = response.json().await?;
        Ok(payload.into_iter().map(PendingDeploymentCandidate::from).collect())
    }

    async fn submit_approval(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
        environment_ids: &[u64],
        state: &str,
        comment: &str,
    ) -> AppResult<ApprovalResponse> {
        let response = self
            .http
            .post(self.pending_deployments_url(owner, repo, run_id))
            .bearer_auth(&self.token)
            .json(&ReviewRequest {
                environment_ids,
                state,
                comment,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(ApprovalResponse {
                status: status.as_u16(),
                deployment_urls: Vec::new(),
                message: Some(body),
            });
        }

        let deployments: Vec<DeploymentPayload> = response.json().await?;
        Ok(ApprovalResponse {
            status: status.as_u16(),
            deployment_urls: deployments
                .into_iter()
                .filter_map(|d| d.url)
                .filter(|url| !url.is_empty())
                .collect(),
            message: None,
        })
    }
}
