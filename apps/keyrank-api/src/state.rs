use std::sync::Arc;

use color_eyre::eyre;

use keyrank_config::{Config, StorageBackend};
use keyrank_service::{KeyrankService, MemoryRankingStore, PgRankingStore, RankingStore};
use keyrank_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<KeyrankService>,
}
impl AppState {
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		let store: Arc<dyn RankingStore> = match config.storage.backend {
			StorageBackend::Postgres => {
				let postgres = config.storage.postgres.as_ref().ok_or_else(|| {
					eyre::eyre!("storage.postgres is required when storage.backend is postgres.")
				})?;
				let db = Db::connect(postgres).await?;

				db.ensure_schema().await?;

				Arc::new(PgRankingStore::new(db))
			},
			StorageBackend::Memory => {
				tracing::warn!("Using the in-memory ranking store. Snapshots are lost on restart.");

				Arc::new(MemoryRankingStore::default())
			},
		};
		let service = KeyrankService::new(config, store)?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: KeyrankService) -> Self {
		Self { service: Arc::new(service) }
	}
}
