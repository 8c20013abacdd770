use slot_sequencer::config::AppConfig;
use slot_sequencer::sequencing::{EnergyTier, StoreError};
use slot_sequencer::store::SqliteStrategyStore;
use std::sync::Arc;
use tracing::info;

pub(crate) fn open_store(config: &AppConfig) -> Result<Arc<SqliteStrategyStore>, StoreError> {
    let path = &config.store.database_path;
    info!(db = %path.display(), "opening strategy store");
    SqliteStrategyStore::open(path).map(Arc::new)
}

pub(crate) fn parse_tier(raw: &str) -> Result<EnergyTier, String> {
    raw.parse::<EnergyTier>().map_err(|err| err.to_string())
}
