#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use deploy_gate::config::{AppConfig, GitHubConfig};
use deploy_gate::github::RetryPolicy;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const SECRET: &str = "integration-secret";

/// Fresh migrated database inside a temp dir; keep the dir alive for the test.
pub async fn test_pool() -> anyhow::Result<(TempDir, SqlitePool)> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok((dir, pool))
}

pub async fn grant(pool: &SqlitePool, login: &str, repo_env: &str) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO deployment_permissions (login, repo_env) VALUES (?, ?)")
        .bind(login)
        .bind(repo_env)
        .execute(pool)
        .await?;
    Ok(())
}

pub fn test_config(api_url: &str) -> AppConfig {
    AppConfig {
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        webhook_secret: Arc::new(SECRET.as_bytes().to_vec()),
        github: GitHubConfig {
            api_url: api_url.to_string(),
            token: "test-token".to_string(),
            user_agent: "deploy-gate-tests".to_string(),
        },
        lookup_timeout: Duration::from_secs(2),
        pending_retry: RetryPolicy::new(2, Duration::from_millis(5), Duration::from_millis(10)),
        allow_mock: false,
    }
}
