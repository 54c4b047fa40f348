//! Deployment approver backed by the GitHub Actions review API.

mod approver;
mod client;
mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use approver::{DeploymentApprover, APPROVAL_COMMENT, APPROVAL_STATE};
pub use client::{ApprovalResponse, DeploymentApi, GitHubClient};
pub use retry::RetryPolicy;
