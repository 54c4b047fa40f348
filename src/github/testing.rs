//! In-memory `DeploymentApi` for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::client::{ApprovalResponse, DeploymentApi};
use crate::errors::{AppError, AppResult};
use crate::models::PendingDeploymentCandidate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedApproval {
    pub owner: String,
    pub repo: String,
    pub run_id: u64,
    pub environment_ids: Vec<u64>,
    pub state: String,
    pub comment: String,
}

#[derive(Default)]
struct Inner {
    list_responses: VecDeque<AppResult<Vec<PendingDeploymentCandidate>>>,
    list_calls: usize,
    approval_status: Option<(u16, Vec<String>)>,
    submitted: Vec<SubmittedApproval>,
}

/// Scripted list responses are consumed in order; once exhausted the list is
/// empty. Approvals answer 200 with no URLs unless configured otherwise.
#[derive(Default)]
pub struct FakeDeploymentApi {
    inner: Mutex<Inner>,
}

impl FakeDeploymentApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_pending(self: Arc<Self>, pending: Vec<PendingDeploymentCandidate>) -> Arc<Self> {
        self.inner.lock().unwrap().list_responses.push_back(Ok(pending));
        self
    }

    pub fn with_list_error(self: Arc<Self>, err: AppError) -> Arc<Self> {
        self.inner.lock().unwrap().list_responses.push_back(Err(err));
        self
    }

    pub fn with_approval_status(self: Arc<Self>, status: u16, urls: Vec<String>) -> Arc<Self> {
        self.inner.lock().unwrap().approval_status = Some((status, urls));
        self
    }

    pub fn list_calls(&self) -> usize {
        self.inner.lock().unwrap().list_calls
    }

    pub fn submitted(&self) -> Vec<SubmittedApproval> {
        self.inner.lock().unwrap().submitted.clone()
    }
}

#[async_trait]
impl DeploymentApi for FakeDeploymentApi {
    async fn list_pending_deployments(
        &self,
        _owner: &str,
        _repo: &str,
        _run_id: u64,
    ) -> AppResult<Vec<PendingDeploymentCandidate>> {
        let mut inner = self.inner.lock().unwrap();
        inner.list_calls += 1;
        inner.list_responses.pop_front().unwrap_or_else(|| Ok(Vec::new()))
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
        let mut inner = self.inner.lock().unwrap();
        inner.submitted.push(SubmittedApproval {
            owner: owner.to_string(),
            repo: repo.to_string(),
            run_id,
            environment_ids: environment_ids.to_vec(),
            state: state.to_string(),
            comment: comment.to_string(),
        });

        let (status, urls) = inner.approval_status.clone().unwrap_or((200, Vec::new()));
        Ok(ApprovalResponse {
            status,
            deployment_urls: urls,
            message: (status >= 300).then(|| "rejected by fake".to_string()),
        })
    }
}
