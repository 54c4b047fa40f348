use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::scope::{AccessScope, PermissionKey};
use crate::errors::{AppError, AppResult};
use crate::store::PermissionStore;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Decides whether a requester may deploy to `repository`/`environment`.
///
/// All four scopes are queried concurrently. The first granted scope wins and
/// cancels the rest; otherwise the first observed lookup error is returned, and
/// only a clean sweep of denials yields `Ok(false)`.
#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn PermissionStore>,
    lookup_timeout: Duration,
}

impl AccessResolver {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self {
            store,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    pub async fn resolve(
        &self,
        requester: &str,
        repository: &str,
        environment: &str,
        cancel: &CancellationToken,
    ) -> AppResult<bool> {
        for (field, value) in [
            ("requester", requester),
            ("repository", repository),
            ("environment", environment),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::invalid_input(format!("{field} must not be empty")));
            }
        }

        let token = cancel.child_token();
        let (granted_tx, mut granted_rx) = mpsc::unbounded_channel::<AccessScope>();
        let (error_tx, mut error_rx) = mpsc::channel::<(AccessScope, AppError)>(AccessScope::ALL.len());

        for scope in AccessScope::ALL {
            let key = PermissionKey::for_scope(requester, repository, environment, scope);
            let store = Arc::clone(&self.store);
            let token = token.clone();
            let timeout = self.lookup_timeout;
            let reporter = ScopeReporter::new(scope, granted_tx.clone(), error_tx.clone());

            tokio::spawn(async move {
                let result = lookup(store.as_ref(), &key, &token, timeout).await;
                reporter.report(result);
            });
        }
        drop(granted_tx);
        drop(error_tx);

        let mut first_error: Option<AppError> = None;
        let mut granted_open = true;
        let mut errors_open = true;

        while granted_open || errors_open {
            tokio::select! {
                granted = granted_rx.recv(), if granted_open => match granted {
                    Some(scope) => {
                        token.cancel();
                        tracing::info!(
                            requester = %requester,
                            repository = %repository,
                            environment = %environment,
                            scope = %scope,
                            "requester has access"
                        );
                        return Ok(true);
                    }
                    None => granted_open = false,
                },
                failure = error_rx.recv(), if errors_open => match failure {
                    Some((scope, err)) => {
                        tracing::warn!(scope = %scope, error = %err, "scope lookup failed");
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                    }
                    None => errors_open = false,
                },
            }
        }

        if let Some(err) = first_error {
            tracing::error!(
                requester = %requester,
                repository = %repository,
                environment = %environment,
                error = %err,
                "could not determine access"
            );
            return Err(err);
        }

        tracing::info!(
            requester = %requester,
            repository = %repository,
            environment = %environment,
            "requester did not have access"
        );
        Ok(false)
    }
}

async fn lookup(
    store: &dyn PermissionStore,
    key: &PermissionKey,
    token: &CancellationToken,
    timeout: Duration,
) -> AppResult<bool> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(AppError::cancelled(format!("lookup for {key} cancelled"))),
        outcome = tokio::time::timeout(timeout, store.exists(key)) => match outcome {
            Ok(result) => result,
            Err(_) => Err(AppError::store_unavailable(format!(
                "lookup for {key} timed out after {}ms",
                timeout.as_millis()
            ))),
        },
    }
}

/// Delivers exactly one outcome per scope task.
///
/// A task that dies before reporting (panic, runtime shutdown) still produces
/// an error, so a lost lookup can never read as "not granted". The error
/// channel has one slot per scope, so `try_send` cannot hit a full buffer.
struct ScopeReporter {
    scope: AccessScope,
    granted: mpsc::UnboundedSender<AccessScope>,
    errors: mpsc::Sender<(AccessScope, AppError)>,
    reported: bool,
}

impl ScopeReporter {
    fn new(
        scope: AccessScope,
        granted: mpsc::UnboundedSender<AccessScope>,
        errors: mpsc::Sender<(AccessScope, AppError)>,
    ) -> Self {
        Self {
            scope,
            granted,
            errors,
            reported: false,
        }
    }

    fn report(mut self, result: AppResult<bool>) {
        self.reported = true;
        match result {
            Ok(true) => {
                // receiver is gone once another scope already granted access
                let _ = self.granted.send(self.scope);
            }
            Ok(false) => {
                tracing::debug!(scope = %self.scope, "no grant for scope");
            }
            Err(err) => {
                let _ = self.errors.try_send((self.scope, err));
            }
        }
    }
}

impl Drop for ScopeReporter {
    fn drop(&mut self) {
        if !self.reported {
            let _ = self.errors.try_send((
                self.scope,
                AppError::internal(format!("{} lookup ended without a result", self.scope)),
            ));
        }
    }
}
