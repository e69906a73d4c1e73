use std::{
	collections::HashMap,
	sync::{PoisonError, RwLock},
};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{BoxFuture, Error, RankingSnapshot, RankingStore, Result};
use keyrank_domain::{Platform, RankingKey};
use keyrank_storage::{
	db::Db,
	models::{RankingSnapshotRow, SnapshotKeyRef},
	queries,
};

/// Postgres-backed store: one row per ranking key, superseded in place.
pub struct PgRankingStore {
	db: Db,
}
impl PgRankingStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	pub fn db(&self) -> &Db {
		&self.db
	}

	async fn load(
		&self,
		keys: &[RankingKey],
		now: OffsetDateTime,
	) -> Result<HashMap<RankingKey, RankingSnapshot>> {
		let refs: Vec<SnapshotKeyRef<'_>> = keys
			.iter()
			.map(|key| SnapshotKeyRef {
				app_id: key.app_id.as_str(),
				combo_text: key.combo_text.as_str(),
				market: key.market.as_str(),
				platform: key.platform.as_str(),
			})
			.collect();
		let rows = queries::fetch_fresh_snapshots(&self.db.pool, &refs, now).await?;
		let mut out = HashMap::with_capacity(rows.len());

		for row in rows {
			let (key, snapshot) = from_row(row)?;

			out.insert(key, snapshot);
		}

		Ok(out)
	}

	async fn store(&self, key: &RankingKey, snapshot: &RankingSnapshot) -> Result<()> {
		let row = to_row(key, snapshot)?;

		queries::upsert_snapshot(&self.db.pool, &row).await?;

		Ok(())
	}
}
impl RankingStore for PgRankingStore {
	fn get_many<'a>(
		&'a self,
		keys: &'a [RankingKey],
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<HashMap<RankingKey, RankingSnapshot>>> {
		Box::pin(self.load(keys, now))
	}

	fn put_one<'a>(
		&'a self,
		key: &'a RankingKey,
		snapshot: &'a RankingSnapshot,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.store(key, snapshot))
	}
}

/// In-process store for single-node deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryRankingStore {
	rows: RwLock<HashMap<RankingKey, RankingSnapshot>>,
}
impl MemoryRankingStore {
	pub fn len(&self) -> usize {
		self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Stored snapshot regardless of freshness.
	pub fn get(&self, key: &RankingKey) -> Option<RankingSnapshot> {
		self.rows.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
	}
}
impl RankingStore for MemoryRankingStore {
	fn get_many<'a>(
		&'a self,
		keys: &'a [RankingKey],
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<HashMap<RankingKey, RankingSnapshot>>> {
		let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
		let found = keys
			.iter()
			.filter_map(|key| {
				rows.get(key)
					.filter(|snapshot| snapshot.is_fresh(now))
					.map(|snapshot| (key.clone(), snapshot.clone()))
			})
			.collect();

		Box::pin(async move { Ok(found) })
	}

	fn put_one<'a>(
		&'a self,
		key: &'a RankingKey,
		snapshot: &'a RankingSnapshot,
	) -> BoxFuture<'a, Result<()>> {
		self.rows
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(key.clone(), snapshot.clone());

		Box::pin(async { Ok(()) })
	}
}

fn from_row(row: RankingSnapshotRow) -> Result<(RankingKey, RankingSnapshot)> {
	let corrupt = |what: &str| Error::Storage {
		message: format!("Stored snapshot for {:?} has an invalid {what}.", row.combo_text),
	};
	let platform: Platform = row.platform.parse().map_err(|_| corrupt("platform"))?;
	let position = row
		.position
		.map(|position| u32::try_from(position).map_err(|_| corrupt("position")))
		.transpose()?;
	let total_result_count =
		u64::try_from(row.total_result_count).map_err(|_| corrupt("total_result_count"))?;
	let snapshot = RankingSnapshot {
		position,
		total_result_count,
		fetched_at: row.fetched_at,
		ttl_expires_at: row.ttl_expires_at,
	};
	let key = RankingKey {
		app_id: row.app_id,
		combo_text: row.combo_text,
		market: row.market,
		platform,
	};

	Ok((key, snapshot))
}

fn to_row(key: &RankingKey, snapshot: &RankingSnapshot) -> Result<RankingSnapshotRow> {
	let position = snapshot
		.position
		.map(|position| {
			i32::try_from(position).map_err(|_| Error::InvalidRequest {
				message: "position does not fit the snapshot table.".to_string(),
			})
		})
		.transpose()?;
	let total_result_count = i64::try_from(snapshot.total_result_count).map_err(|_| {
		Error::InvalidRequest {
			message: "total_result_count does not fit the snapshot table.".to_string(),
		}
	})?;

	Ok(RankingSnapshotRow {
		snapshot_id: Uuid::new_v4(),
		app_id: key.app_id.clone(),
		combo_text: key.combo_text.clone(),
		market: key.market.clone(),
		platform: key.platform.as_str().to_string(),
		position,
		total_result_count,
		fetched_at: snapshot.fetched_at,
		ttl_expires_at: snapshot.ttl_expires_at,
	})
}
