use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Result, schema};

/// Serializes concurrent schema bootstraps across processes sharing one database.
const SCHEMA_LOCK_ID: i64 = 7_120_115;

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &keyrank_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	/// Applies the idempotent schema inside one transaction holding the bootstrap lock.
	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema();
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)")
			.bind(SCHEMA_LOCK_ID)
			.execute(&mut *tx)
			.await?;

		for statement in statements(&sql) {
			sqlx::query(statement).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		tracing::debug!(lock_id = SCHEMA_LOCK_ID, "Ranking schema ensured.");

		Ok(())
	}
}

fn statements(sql: &str) -> impl Iterator<Item = &str> {
	sql.split(';').map(str::trim).filter(|statement| !statement.is_empty())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blank_fragments_are_skipped() {
		let parsed: Vec<&str> = statements("SELECT 1;\n\n;  SELECT 2 ;").collect();

		assert_eq!(parsed, vec!["SELECT 1", "SELECT 2"]);
	}

	#[test]
	fn rendered_schema_splits_into_table_and_index() {
		let sql = schema::render_schema();
		let parsed: Vec<&str> = statements(&sql).collect();

		assert_eq!(parsed.len(), 2);
		assert!(parsed[0].starts_with("CREATE TABLE"));
		assert!(parsed[1].starts_with("CREATE INDEX"));
	}
}
