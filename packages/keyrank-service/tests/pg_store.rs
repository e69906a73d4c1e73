use time::OffsetDateTime;

use keyrank_config::Postgres;
use keyrank_domain::{Platform, RankingKey};
use keyrank_service::{PgRankingStore, RankingSnapshot, RankingStore};
use keyrank_storage::db::Db;
use keyrank_testkit::TestDatabase;

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEYRANK_PG_DSN to run."]
async fn pg_store_serves_fresh_snapshots_in_one_batch() {
	let Some(base_dsn) = keyrank_testkit::env_dsn() else {
		eprintln!("Skipping pg_store_serves_fresh_snapshots_in_one_batch; set KEYRANK_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let store = PgRankingStore::new(db);
	let now = OffsetDateTime::now_utc();
	let ranked = RankingKey::new("123", "sleep timer", "us", Platform::Ios).expect("Invalid key.");
	let absent = RankingKey::new("123", "calm zen", "us", Platform::Ios).expect("Invalid key.");
	let unknown = RankingKey::new("123", "zen focus", "us", Platform::Android).expect("Invalid key.");
	let ranked_snapshot = RankingSnapshot::new(Some(5), 245, now);
	let absent_snapshot = RankingSnapshot::new(None, 12, now);

	store.put_one(&ranked, &ranked_snapshot).await.expect("Failed to store snapshot.");
	store.put_one(&absent, &absent_snapshot).await.expect("Failed to store snapshot.");

	let found = store
		.get_many(&[ranked.clone(), absent.clone(), unknown.clone()], now)
		.await
		.expect("Failed to read snapshots.");

	assert_eq!(found.len(), 2);
	assert_eq!(found.get(&ranked).map(|s| s.total_result_count), Some(245));
	assert_eq!(found.get(&absent).and_then(|s| s.position), None);
	assert!(!found.contains_key(&unknown));

	drop(store);
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
