use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::client::DeploymentApi;
use super::retry::RetryPolicy;
use crate::errors::{AppError, AppResult};
use crate::models::{PendingDeploymentCandidate, WorkflowRunContext};

pub const APPROVAL_STATE: &str = "approved";
pub const APPROVAL_COMMENT: &str = "Approved via deploy-gate webhook";

#[derive(Clone)]
pub struct DeploymentApprover {
    api: Arc<dyn DeploymentApi>,
    retry: RetryPolicy,
}

impl DeploymentApprover {
    pub fn new(api: Arc<dyn DeploymentApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    /// Lists the run's pending deployments, retrying while the list is empty.
    ///
    /// Transport and status errors are returned immediately; only an empty
    /// but successful response is retried.
    pub async fn fetch_pending_approvals(
        &self,
        ctx: &WorkflowRunContext,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<PendingDeploymentCandidate>> {
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=attempts {
            let pending = self
                .api
                .list_pending_deployments(&ctx.owner, &ctx.repository, ctx.run_id)
                .await?;

            if !pending.is_empty() {
                tracing::debug!(run_id = ctx.run_id, count = pending.len(), "found pending deployments");
                return Ok(pending);
            }

            if attempt == attempts {
                break;
            }

            let delay = self.retry.delay_for(attempt);
            tracing::warn!(
                owner = %ctx.owner,
                repository = %ctx.repository,
                run_id = ctx.run_id,
                attempt,
                next_delay_ms = delay.as_millis() as u64,
                "no pending deployments found, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(AppError::cancelled("waiting for pending deployments"));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Err(AppError::no_pending_approvals(format!(
            "no pending deployments found for run {} after {} attempts",
            ctx.run_id, attempts
        )))
    }

    /// Approves one environment of the run and returns the approved
    /// deployment URLs. The response may cover fewer deployments than asked.
    pub async fn approve(&self, ctx: &WorkflowRunContext, environment_id: u64) -> AppResult<Vec<String>> {
        if environment_id == 0 {
            return Err(AppError::invalid_input("environment id is missing or zero"));
        }

        let response = self
            .api
            .submit_approval(
                &ctx.owner,
                &ctx.repository,
                ctx.run_id,
                &[environment_id],
                APPROVAL_STATE,
                APPROVAL_COMMENT,
            )
            .await?;

        if !response.is_success() {
            tracing::error!(
                run_id = ctx.run_id,
                environment_id,
                status = response.status,
                "approval rejected"
            );
            return Err(AppError::approval_rejected(
                response.status,
                response.message.unwrap_or_default(),
            ));
        }

        Ok(response.deployment_urls)
    }
}
