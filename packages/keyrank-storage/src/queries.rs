use sqlx::PgExecutor;
use time::OffsetDateTime;

use crate::{
	Error, Result,
	models::{RankingSnapshotRow, SnapshotKeyRef},
};

/// Fresh snapshots for `keys` in one round trip. Keys without a fresh row are simply absent.
pub async fn fetch_fresh_snapshots<'e, E>(
	executor: E,
	keys: &[SnapshotKeyRef<'_>],
	now: OffsetDateTime,
) -> Result<Vec<RankingSnapshotRow>>
where
	E: PgExecutor<'e>,
{
	if keys.is_empty() {
		return Ok(Vec::new());
	}

	let app_ids: Vec<&str> = keys.iter().map(|key| key.app_id).collect();
	let combo_texts: Vec<&str> = keys.iter().map(|key| key.combo_text).collect();
	let markets: Vec<&str> = keys.iter().map(|key| key.market).collect();
	let platforms: Vec<&str> = keys.iter().map(|key| key.platform).collect();
	let rows = sqlx::query_as::<_, RankingSnapshotRow>(
		"\
SELECT
	s.snapshot_id,
	s.app_id,
	s.combo_text,
	s.market,
	s.platform,
	s.position,
	s.total_result_count,
	s.fetched_at,
	s.ttl_expires_at
FROM ranking_snapshots s
JOIN UNNEST($1::text[], $2::text[], $3::text[], $4::text[])
	AS k(app_id, combo_text, market, platform)
	ON s.app_id = k.app_id
	AND s.combo_text = k.combo_text
	AND s.market = k.market
	AND s.platform = k.platform
WHERE s.ttl_expires_at > $5",
	)
	.bind(app_ids)
	.bind(combo_texts)
	.bind(markets)
	.bind(platforms)
	.bind(now)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Inserts or supersedes the single row for the snapshot's identity in one statement.
pub async fn upsert_snapshot<'e, E>(executor: E, row: &RankingSnapshotRow) -> Result<()>
where
	E: PgExecutor<'e>,
{
	if row.total_result_count < 0 {
		return Err(Error::InvalidArgument(
			"total_result_count must be zero or greater.".to_string(),
		));
	}

	sqlx::query(
		"\
INSERT INTO ranking_snapshots (
	snapshot_id,
	app_id,
	combo_text,
	market,
	platform,
	position,
	total_result_count,
	fetched_at,
	ttl_expires_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
ON CONFLICT (app_id, combo_text, market, platform) DO UPDATE SET
	position = EXCLUDED.position,
	total_result_count = EXCLUDED.total_result_count,
	fetched_at = EXCLUDED.fetched_at,
	ttl_expires_at = EXCLUDED.ttl_expires_at",
	)
	.bind(row.snapshot_id)
	.bind(row.app_id.as_str())
	.bind(row.combo_text.as_str())
	.bind(row.market.as_str())
	.bind(row.platform.as_str())
	.bind(row.position)
	.bind(row.total_result_count)
	.bind(row.fetched_at)
	.bind(row.ttl_expires_at)
	.execute(executor)
	.await?;

	Ok(())
}
