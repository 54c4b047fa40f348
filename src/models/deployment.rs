use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

/// One environment waiting for approval within a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PendingDeploymentCandidate {
    #[schema(example = "prod")]
    pub environment_name: String,
    #[schema(example = 161088068)]
    pub environment_id: u64,
}

impl PendingDeploymentCandidate {
    pub fn new(environment_name: impl Into<String>, environment_id: u64) -> Self {
        Self {
            environment_name: environment_name.into(),
            environment_id,
        }
    }

    /// Entries without a name or id cannot be authorized or approved.
    pub fn is_valid(&self) -> bool {
        !self.environment_name.trim().is_empty() && self.environment_id != 0
    }
}

/// Environment that was approved while handling an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ApprovedEnvironment {
    pub environment_name: String,
    pub environment_id: u64,
    pub deployment_urls: Vec<String>,
}

/// Identity of the run an event refers to. Built fresh for every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRunContext {
    pub owner: String,
    pub repository: String,
    pub run_id: u64,
    pub requester: String,
}

impl WorkflowRunContext {
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        run_id: u64,
        requester: impl Into<String>,
    ) -> Result<Self, AppError> {
        let ctx = Self {
            owner: owner.into(),
            repository: repository.into(),
            run_id,
            requester: requester.into(),
        };

        for (field, value) in [
            ("repository owner login", &ctx.owner),
            ("repository name", &ctx.repository),
            ("requester login", &ctx.requester),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::invalid_input(format!("{field} is missing or empty")));
            }
        }
        if ctx.run_id == 0 {
            return Err(AppError::invalid_input("workflow run id is missing or zero"));
        }

        Ok(ctx)
    }
}
