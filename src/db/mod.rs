use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

pub async fn init(database_url: &str) -> anyhow::Result<SqlitePool> {
	let options = SqliteConnectOptions::from_str(database_url)
		.context("invalid DATABASE_URL")?
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(10)
		.min_connections(1)
		.acquire_timeout(Duration::from_secs(10))
		.connect_with(options)
		.await
		.context("failed to connect to database")?;

	sqlx::migrate!()
		.run(&pool)
		.await
		.context("failed to run migrations")?;

	Ok(pool)
}

/// Successfully applied migration versions, newest first. Empty when the
/// `_sqlx_migrations` bookkeeping table does not exist yet.
pub async fn applied_versions(pool: &SqlitePool) -> anyhow::Result<Vec<i64>> {
	let table = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
		.fetch_optional(pool)
		.await?;
	if table.is_none() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version DESC")
		.fetch_all(pool)
		.await?;
	rows.iter()
		.map(|row| row.try_get::<i64, _>("version").map_err(anyhow::Error::from))
		.collect()
}

/// Reverts the newest applied migration and returns its version.
///
/// `Migrator::undo` takes the version to roll back *to*, so the target is the
/// next-newest applied version (0 when only one is applied).
pub async fn rollback_last(pool: &SqlitePool, migrator: &Migrator) -> anyhow::Result<i64> {
	let applied = applied_versions(pool).await?;
	let Some(&latest) = applied.first() else {
		anyhow::bail!("no applied migrations to roll back");
	};

	let reversible = migrator
		.iter()
		.any(|migration| migration.version == latest && migration.migration_type.is_down_migration());
	if !reversible {
		anyhow::bail!("migration {latest} has no down script");
	}

	let target = applied.get(1).copied().unwrap_or(0);
	migrator
		.undo(pool, target)
		.await
		.with_context(|| format!("failed to roll back migration {latest}"))?;

	Ok(latest)
}
