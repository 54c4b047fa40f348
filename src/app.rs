use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::authz::AccessResolver;
use crate::config::AppConfig;
use crate::dispatch::EventDispatcher;
use crate::errors::AppError;
use crate::github::{DeploymentApprover, GitHubClient};
use crate::routes::{health, webhook};
use crate::store::SqlitePermissionStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub dispatcher: Arc<EventDispatcher>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: AppConfig) -> Result<Self, AppError> {
        let store = Arc::new(SqlitePermissionStore::new(pool.clone()));
        let resolver = AccessResolver::new(store).with_lookup_timeout(config.lookup_timeout);
        let github = Arc::new(GitHubClient::new(&config.github)?);
        let approver = DeploymentApprover::new(github, config.pending_retry);

        Ok(Self::with_dispatcher(pool, config, EventDispatcher::new(resolver, approver)))
    }

    pub fn with_dispatcher(pool: SqlitePool, config: AppConfig, dispatcher: EventDispatcher) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
        }
    }
}

pub async fn create_app(pool: SqlitePool, config: AppConfig) -> Result<Router, AppError> {
    let state = AppState::new(pool, config)?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    // GitHub posts to whatever URL the hook was registered with; accept both.
    Router::new()
        .route("/", post(webhook::receive))
        .route("/webhook", post(webhook::receive))
        .route("/api/health", get(health::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
