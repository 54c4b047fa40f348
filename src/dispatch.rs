//! Event dispatcher: turns a webhook event into authorization decisions and
//! approvals.
//!
//! Processing is fail-fast per event. A resolver or approver error stops the
//! event; environments the requester cannot deploy to are skipped silently.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::authz::AccessResolver;
use crate::errors::{AppError, AppResult};
use crate::github::DeploymentApprover;
use crate::models::event::{DeploymentReviewEvent, WorkflowRunEvent, REQUESTED_ACTION};
use crate::models::{ApprovedEnvironment, PendingDeploymentCandidate, WebhookEvent, WorkflowRunContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The event needs no action (other review actions, pings).
    Ignored { reason: String },
    /// Candidates were resolved; `skipped` lists environments without access.
    Processed {
        approved: Vec<ApprovedEnvironment>,
        skipped: Vec<String>,
    },
}

impl DispatchOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        Self::Ignored { reason: reason.into() }
    }
}

#[derive(Clone)]
pub struct EventDispatcher {
    resolver: AccessResolver,
    approver: DeploymentApprover,
}

impl EventDispatcher {
    pub fn new(resolver: AccessResolver, approver: DeploymentApprover) -> Self {
        Self { resolver, approver }
    }

    #[tracing::instrument(skip_all, fields(event = event.kind()))]
    pub async fn handle_event(
        &self,
        event: &WebhookEvent,
        cancel: &CancellationToken,
    ) -> AppResult<DispatchOutcome> {
        match event {
            WebhookEvent::DeploymentReview(review) => self.handle_deployment_review(review, cancel).await,
            WebhookEvent::WorkflowRun(run) => self.handle_workflow_run(run, cancel).await,
            WebhookEvent::Ping(ping) => {
                tracing::info!(hook_id = ?ping.hook_id, zen = %ping.zen, "received ping");
                Ok(DispatchOutcome::ignored("ping"))
            }
        }
    }

    async fn handle_deployment_review(
        &self,
        event: &DeploymentReviewEvent,
        cancel: &CancellationToken,
    ) -> AppResult<DispatchOutcome> {
        if event.action != REQUESTED_ACTION {
            tracing::debug!(action = %event.action, "deployment review was not a request");
            return Ok(DispatchOutcome::ignored(format!("action '{}' is not handled", event.action)));
        }

        let repository = event.repository.clone().unwrap_or_default();
        let ctx = WorkflowRunContext::new(
            repository.owner_login(),
            repository.name.as_str(),
            event.workflow_run.as_ref().map(|run| run.id).unwrap_or_default(),
            event.requester_login(),
        )?;
        let environment = event.environment.trim();
        if environment.is_empty() {
            return Err(AppError::invalid_input("environment is missing or empty"));
        }

        tracing::info!(
            requester = %ctx.requester,
            repository = %ctx.repository,
            environment = %environment,
            run_id = ctx.run_id,
            "processing deployment review request"
        );

        let granted = self
            .resolver
            .resolve(&ctx.requester, &ctx.repository, environment, cancel)
            .await?;
        if !granted {
            return Ok(DispatchOutcome::Processed {
                approved: Vec::new(),
                skipped: vec![environment.to_string()],
            });
        }

        let pending = self.approver.fetch_pending_approvals(&ctx, cancel).await?;
        let matching: Vec<PendingDeploymentCandidate> = pending
            .into_iter()
            .filter(|candidate| {
                candidate.is_valid() && candidate.environment_name.eq_ignore_ascii_case(environment)
            })
            .collect();
        if matching.is_empty() {
            return Err(AppError::no_pending_approvals(format!(
                "run {} has no pending deployment for environment '{}'",
                ctx.run_id, environment
            )));
        }

        let mut approved = Vec::with_capacity(matching.len());
        for candidate in matching {
            approved.push(self.approve_candidate(&ctx, candidate).await?);
        }

        Ok(DispatchOutcome::Processed {
            approved,
            skipped: Vec::new(),
        })
    }

    async fn handle_workflow_run(
        &self,
        event: &WorkflowRunEvent,
        cancel: &CancellationToken,
    ) -> AppResult<DispatchOutcome> {
        if event.action != REQUESTED_ACTION {
            tracing::debug!(action = %event.action, "workflow run event was not a request");
            return Ok(DispatchOutcome::ignored(format!("action '{}' is not handled", event.action)));
        }

        let repository = event.repository.clone().unwrap_or_default();
        let ctx = WorkflowRunContext::new(
            repository.owner_login(),
            repository.name.as_str(),
            event.workflow_run.as_ref().map(|run| run.id).unwrap_or_default(),
            event.sender_login(),
        )?;

        tracing::info!(
            requester = %ctx.requester,
            repository = %ctx.repository,
            run_id = ctx.run_id,
            "processing workflow run"
        );

        let pending = self.approver.fetch_pending_approvals(&ctx, cancel).await?;

        let mut approved = Vec::new();
        let mut skipped = Vec::new();
        for candidate in pending {
            if !candidate.is_valid() {
                tracing::debug!(?candidate, "skipping pending deployment without environment identity");
                continue;
            }

            let granted = self
                .resolver
                .resolve(&ctx.requester, &ctx.repository, &candidate.environment_name, cancel)
                .await?;

            if granted {
                approved.push(self.approve_candidate(&ctx, candidate).await?);
            } else {
                skipped.push(candidate.environment_name);
            }
        }

        Ok(DispatchOutcome::Processed { approved, skipped })
    }

    async fn approve_candidate(
        &self,
        ctx: &WorkflowRunContext,
        candidate: PendingDeploymentCandidate,
    ) -> AppResult<ApprovedEnvironment> {
        let deployment_urls = self.approver.approve(ctx, candidate.environment_id).await?;
        tracing::info!(
            run_id = ctx.run_id,
            environment = %candidate.environment_name,
            environment_id = candidate.environment_id,
            deployment_urls = ?deployment_urls,
            "approved deployments"
        );

        Ok(ApprovedEnvironment {
            environment_name: candidate.environment_name,
            environment_id: candidate.environment_id,
            deployment_urls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::PermissionKey;
    use crate::github::testing::FakeDeploymentApi;
    use crate::github::RetryPolicy;
    use crate::models::event::{Account, Repository, WorkflowRunRef};
    use crate::store::PermissionStore;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    struct MemoryStore {
        grants: HashSet<(String, String)>,
        fail: bool,
    }

    #[async_trait]
    impl PermissionStore for MemoryStore {
        async fn exists(&self, key: &PermissionKey) -> AppResult<bool> {
            if self.fail {
                return Err(AppError::store_unavailable("store offline"));
            }
            Ok(self
                .grants
                .contains(&(key.requester().to_string(), key.scope().to_string())))
        }
    }

    fn store(grants: &[(&str, &str)]) -> Arc<MemoryStore> {
        Arc::new(MemoryStore {
            grants: grants.iter().map(|(l, s)| (l.to_string(), s.to_string())).collect(),
            fail: false,
        })
    }

    fn dispatcher(store: Arc<MemoryStore>, api: Arc<FakeDeploymentApi>) -> EventDispatcher {
        EventDispatcher::new(
            AccessResolver::new(store),
            DeploymentApprover::new(
                api,
                RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)),
            ),
        )
    }

    fn repository(name: &str) -> Option<Repository> {
        Some(Repository {
            name: name.to_string(),
            owner: Some(Account { login: "acme".to_string() }),
        })
    }

    fn workflow_run(sender: &str) -> WebhookEvent {
        WebhookEvent::WorkflowRun(WorkflowRunEvent {
            action: "requested".to_string(),
            repository: repository("svc"),
            workflow_run: Some(WorkflowRunRef { id: 4242 }),
            sender: Some(Account { login: sender.to_string() }),
        })
    }

    fn deployment_review(action: &str, requester: &str, environment: &str) -> WebhookEvent {
        WebhookEvent::DeploymentReview(DeploymentReviewEvent {
            action: action.to_string(),
            environment: environment.to_string(),
            requestor: Some(Account { login: requester.to_string() }),
            repository: repository("svc"),
            workflow_run: Some(WorkflowRunRef { id: 4242 }),
        })
    }

    #[tokio::test]
    async fn test_exact_grant_approves_environment() {
        let api = FakeDeploymentApi::new()
            .with_pending(vec![PendingDeploymentCandidate::new("prod", 7)])
            .with_approval_status(200, vec!["https://api.github.com/d/1".to_string()]);
        let dispatcher = dispatcher(store(&[("alice", "svc#prod")]), api.clone());

        let outcome = dispatcher
            .handle_event(&workflow_run("alice"), &CancellationToken::new())
            .await
            .unwrap();

        let submitted = api.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].environment_ids, vec![7]);
        assert_eq!(submitted[0].owner, "acme");
        assert_eq!(submitted[0].run_id, 4242);
        assert_eq!(
            outcome,
            DispatchOutcome::Processed {
                approved: vec![ApprovedEnvironment {
                    environment_name: "prod".to_string(),
                    environment_id: 7,
                    deployment_urls: vec!["https://api.github.com/d/1".to_string()],
                }],
                skipped: vec![],
            }
        );
    }

    #[tokio::test]
    async fn test_org_grant_approves_any_environment() {
        let api = FakeDeploymentApi::new().with_pending(vec![PendingDeploymentCandidate::new("staging", 8)]);
        let dispatcher = dispatcher(store(&[("bob", "*#*")]), api.clone());

        dispatcher
            .handle_event(&workflow_run("bob"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(api.submitted()[0].environment_ids, vec![8]);
    }

    #[tokio::test]
    async fn test_no_grant_takes_no_action() {
        let api = FakeDeploymentApi::new().with_pending(vec![PendingDeploymentCandidate::new("prod", 7)]);
        let dispatcher = dispatcher(store(&[("alice", "svc#prod")]), api.clone());

        let outcome = dispatcher
            .handle_event(&workflow_run("carol"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(api.submitted().is_empty());
        assert_eq!(
            outcome,
            DispatchOutcome::Processed {
                approved: vec![],
                skipped: vec!["prod".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_candidates_are_skipped() {
        let api = FakeDeploymentApi::new().with_pending(vec![
            PendingDeploymentCandidate::new("", 0),
            PendingDeploymentCandidate::new("prod", 0),
            PendingDeploymentCandidate::new("prod", 7),
        ]);
        let dispatcher = dispatcher(store(&[("alice", "*#prod")]), api.clone());

        dispatcher
            .handle_event(&workflow_run("alice"), &CancellationToken::new())
            .await
            .unwrap();
        let submitted = api.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].environment_ids, vec![7]);
    }

    #[tokio::test]
    async fn test_blank_sender_aborts_before_any_call() {
        let api = FakeDeploymentApi::new().with_pending(vec![PendingDeploymentCandidate::new("prod", 7)]);
        let dispatcher = dispatcher(store(&[]), api.clone());

        let result = dispatcher
            .handle_event(&workflow_run(""), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(api.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_resolver_error_stops_event() {
        let api = FakeDeploymentApi::new().with_pending(vec![
            PendingDeploymentCandidate::new("prod", 7),
            PendingDeploymentCandidate::new("staging", 8),
        ]);
        let failing = Arc::new(MemoryStore {
            grants: HashSet::new(),
            fail: true,
        });
        let dispatcher = dispatcher(failing, api.clone());

        let result = dispatcher
            .handle_event(&workflow_run("alice"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
        assert!(api.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_approval_failure_stops_remaining_candidates() {
        let api = FakeDeploymentApi::new()
            .with_pending(vec![
                PendingDeploymentCandidate::new("prod", 7),
                PendingDeploymentCandidate::new("staging", 8),
            ])
            .with_approval_status(422, vec![]);
        let dispatcher = dispatcher(store(&[("alice", "svc#*")]), api.clone());

        let result = dispatcher
            .handle_event(&workflow_run("alice"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(AppError::ApprovalRejected { status: 422, .. })));
        assert_eq!(api.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_review_with_other_action_is_ignored() {
        let api = FakeDeploymentApi::new();
        let dispatcher = dispatcher(store(&[("alice", "*#*")]), api.clone());

        for action in ["approved", "rejected"] {
            let outcome = dispatcher
                .handle_event(&deployment_review(action, "alice", "prod"), &CancellationToken::new())
                .await
                .unwrap();
            assert!(matches!(outcome, DispatchOutcome::Ignored { .. }));
        }
        assert_eq!(api.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_review_approves_only_requested_environment() {
        let api = FakeDeploymentApi::new().with_pending(vec![
            PendingDeploymentCandidate::new("staging", 8),
            PendingDeploymentCandidate::new("Prod", 7),
        ]);
        let dispatcher = dispatcher(store(&[("alice", "svc#prod")]), api.clone());

        dispatcher
            .handle_event(&deployment_review("requested", "alice", "prod"), &CancellationToken::new())
            .await
            .unwrap();
        let submitted = api.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].environment_ids, vec![7]);
    }

    #[tokio::test]
    async fn test_review_without_access_skips_listing() {
        let api = FakeDeploymentApi::new();
        let dispatcher = dispatcher(store(&[]), api.clone());

        let outcome = dispatcher
            .handle_event(&deployment_review("requested", "carol", "prod"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(api.list_calls(), 0);
        assert!(matches!(outcome, DispatchOutcome::Processed { ref approved, .. } if approved.is_empty()));
    }

    #[tokio::test]
    async fn test_review_without_matching_pending_environment() {
        let api = FakeDeploymentApi::new().with_pending(vec![PendingDeploymentCandidate::new("staging", 8)]);
        let dispatcher = dispatcher(store(&[("alice", "*#*")]), api.clone());

        let result = dispatcher
            .handle_event(&deployment_review("requested", "alice", "prod"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(AppError::NoPendingApprovals(_))));
        assert!(api.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_review_with_blank_environment_is_invalid() {
        let dispatcher = dispatcher(store(&[("alice", "*#*")]), FakeDeploymentApi::new());

        let result = dispatcher
            .handle_event(&deployment_review("requested", "alice", " "), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
