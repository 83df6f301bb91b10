pub mod codec;
pub mod index;
pub mod seed;
pub mod stocks;
pub mod trading_configs;

use std::time::Duration;

pub use stocks::StockStore;
pub use trading_configs::TradingConfigStore;

#[derive(Debug, Clone, Copy)]
pub struct StorageOptions {
    /// Upper bound on one full-collection flush (temp write + fsync + rename).
    pub flush_timeout: Duration,
    /// Insert the sample watchlist when the loaded collection is empty.
    pub seed_on_empty: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            flush_timeout: Duration::from_secs(5),
            seed_on_empty: false,
        }
    }
}
