use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RankingSnapshotRow {
	pub snapshot_id: Uuid,
	pub app_id: String,
	pub combo_text: String,
	pub market: String,
	pub platform: String,
	pub position: Option<i32>,
	pub total_result_count: i64,
	pub fetched_at: OffsetDateTime,
	pub ttl_expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotKeyRef<'a> {
	pub app_id: &'a str,
	pub combo_text: &'a str,
	pub market: &'a str,
	pub platform: &'a str,
}
