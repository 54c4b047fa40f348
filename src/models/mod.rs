pub mod deployment;
pub mod event;

pub use deployment::{ApprovedEnvironment, PendingDeploymentCandidate, WorkflowRunContext};
pub use event::WebhookEvent;
