use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use keyrank_config::Postgres;
use keyrank_storage::{
	db::Db,
	models::{RankingSnapshotRow, SnapshotKeyRef},
	queries,
};
use keyrank_testkit::TestDatabase;

const TTL: Duration = Duration::hours(24);

fn snapshot(
	combo_text: &str,
	position: Option<i32>,
	total_result_count: i64,
	fetched_at: OffsetDateTime,
) -> RankingSnapshotRow {
	RankingSnapshotRow {
		snapshot_id: Uuid::new_v4(),
		app_id: "123".to_string(),
		combo_text: combo_text.to_string(),
		market: "us".to_string(),
		platform: "ios".to_string(),
		position,
		total_result_count,
		fetched_at,
		ttl_expires_at: fetched_at + TTL,
	}
}

fn key(combo_text: &str) -> SnapshotKeyRef<'_> {
	SnapshotKeyRef { app_id: "123", combo_text, market: "us", platform: "ios" }
}

async fn setup(base_dsn: &str) -> (TestDatabase, Db) {
	let test_db = TestDatabase::new(base_dsn).await.expect("Failed to create test database.");
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	(test_db, db)
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEYRANK_PG_DSN to run."]
async fn upsert_supersedes_instead_of_appending() {
	let Some(base_dsn) = keyrank_testkit::env_dsn() else {
		eprintln!("Skipping upsert_supersedes_instead_of_appending; set KEYRANK_PG_DSN to run this test.");

		return;
	};
	let (test_db, db) = setup(&base_dsn).await;
	let now = OffsetDateTime::now_utc();

	queries::upsert_snapshot(&db.pool, &snapshot("sleep timer", Some(9), 245, now - Duration::hours(1)))
		.await
		.expect("Failed to insert snapshot.");
	queries::upsert_snapshot(&db.pool, &snapshot("sleep timer", None, 250, now))
		.await
		.expect("Failed to supersede snapshot.");

	let count: i64 = sqlx::query_scalar("SELECT count(*) FROM ranking_snapshots")
		.fetch_one(&db.pool)
		.await
		.expect("Failed to count snapshots.");

	assert_eq!(count, 1);

	let rows = queries::fetch_fresh_snapshots(&db.pool, &[key("sleep timer")], now)
		.await
		.expect("Failed to read snapshots.");

	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].position, None);
	assert_eq!(rows[0].total_result_count, 250);
	assert_eq!(rows[0].ttl_expires_at - rows[0].fetched_at, TTL);

	drop(db);
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEYRANK_PG_DSN to run."]
async fn batched_read_skips_expired_and_unknown_keys() {
	let Some(base_dsn) = keyrank_testkit::env_dsn() else {
		eprintln!("Skipping batched_read_skips_expired_and_unknown_keys; set KEYRANK_PG_DSN to run this test.");

		return;
	};
	let (test_db, db) = setup(&base_dsn).await;
	let now = OffsetDateTime::now_utc();

	queries::upsert_snapshot(&db.pool, &snapshot("sleep timer", Some(3), 245, now))
		.await
		.expect("Failed to insert snapshot.");
	queries::upsert_snapshot(&db.pool, &snapshot("calm zen", Some(1), 12, now - Duration::hours(25)))
		.await
		.expect("Failed to insert snapshot.");

	let rows = queries::fetch_fresh_snapshots(
		&db.pool,
		&[key("sleep timer"), key("calm zen"), key("never fetched")],
		now,
	)
	.await
	.expect("Failed to read snapshots.");

	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].combo_text, "sleep timer");
	assert_eq!(rows[0].total_result_count, 245);

	drop(db);
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEYRANK_PG_DSN to run."]
async fn negative_total_is_rejected_before_writing() {
	let Some(base_dsn) = keyrank_testkit::env_dsn() else {
		eprintln!("Skipping negative_total_is_rejected_before_writing; set KEYRANK_PG_DSN to run this test.");

		return;
	};
	let (test_db, db) = setup(&base_dsn).await;
	let err = queries::upsert_snapshot(
		&db.pool,
		&snapshot("sleep timer", None, -1, OffsetDateTime::now_utc()),
	)
	.await
	.expect_err("Expected invalid argument.");

	assert!(matches!(err, keyrank_storage::Error::InvalidArgument(_)));

	drop(db);
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
