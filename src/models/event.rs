//! Subset of the GitHub webhook payloads the dispatcher reads.
//!
//! Every field is optional on the wire; missing identity fields are rejected
//! later by the dispatcher rather than at parse time.

use serde::Deserialize;

pub const REQUESTED_ACTION: &str = "requested";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: Option<Account>,
}

impl Repository {
    pub fn owner_login(&self) -> &str {
        self.owner.as_ref().map(|o| o.login.as_str()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowRunRef {
    #[serde(default)]
    pub id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentReviewEvent {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default, alias = "requester")]
    pub requestor: Option<Account>,
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub workflow_run: Option<WorkflowRunRef>,
}

impl DeploymentReviewEvent {
    pub fn requester_login(&self) -> &str {
        self.requestor.as_ref().map(|a| a.login.as_str()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowRunEvent {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub workflow_run: Option<WorkflowRunRef>,
    #[serde(default)]
    pub sender: Option<Account>,
}

impl WorkflowRunEvent {
    pub fn sender_login(&self) -> &str {
        self.sender.as_ref().map(|a| a.login.as_str()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PingEvent {
    #[serde(default)]
    pub zen: String,
    #[serde(default)]
    pub hook_id: Option<u64>,
}

/// A validated, typed webhook delivery.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    DeploymentReview(DeploymentReviewEvent),
    WorkflowRun(WorkflowRunEvent),
    Ping(PingEvent),
}

impl WebhookEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookEvent::DeploymentReview(_) => "deployment_review",
            WebhookEvent::WorkflowRun(_) => "workflow_run",
            WebhookEvent::Ping(_) => "ping",
        }
    }
}
