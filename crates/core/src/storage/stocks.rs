use crate::domain::stock::{StockEntry, StockInput};
use crate::domain::timestamp;
use crate::error::StoreError;
use crate::storage::codec::JsonFile;
use crate::storage::index::StockIndex;
use crate::storage::{seed, StorageOptions};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// The durable stock watchlist.
///
/// Readers share the lock. Every mutation holds the write lock across its whole
/// check-then-act sequence, applies the change to a staged copy of the index, flushes that copy
/// and only then swaps it in, so a failed flush leaves memory exactly as it was.
#[derive(Debug)]
pub struct StockStore {
    file: JsonFile,
    index: RwLock<StockIndex>,
}

impl StockStore {
    pub async fn open(path: impl Into<PathBuf>, options: StorageOptions) -> Result<Self, StoreError> {
        let file = JsonFile::new(path, options.flush_timeout);
        let entries: Vec<StockEntry> = file.load().await?;
        let index = StockIndex::from_entries(entries).map_err(|e| file.corrupt(e.to_string()))?;

        tracing::info!(
            path = %file.path().display(),
            entries = index.len(),
            "stock watchlist loaded"
        );

        let store = Self {
            file,
            index: RwLock::new(index),
        };
        if options.seed_on_empty {
            store.seed_if_empty().await?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Inserts the sample watchlist when the store holds no entries. Returns how many were added.
    pub async fn seed_if_empty(&self) -> Result<usize, StoreError> {
        let mut index = self.index.write().await;
        if !index.is_empty() {
            return Ok(0);
        }

        let mut staged = index.clone();
        let now = timestamp::now();
        let samples = seed::sample_stocks();
        let count = samples.len();
        for input in samples {
            let id = staged.allocate_id()?;
            staged.insert(StockEntry::new(id, input.validate()?, now))?;
        }
        self.commit(&mut index, staged).await?;

        tracing::warn!(count, path = %self.file.path().display(), "seeded empty watchlist with sample entries");
        Ok(count)
    }

    pub async fn create(&self, input: StockInput) -> Result<StockEntry, StoreError> {
        let input = input.validate()?;

        let mut index = self.index.write().await;
        if index.contains_code(&input.code) {
            return Err(StoreError::DuplicateCode(input.code));
        }

        let mut staged = index.clone();
        let id = staged.allocate_id()?;
        let entry = StockEntry::new(id, input, timestamp::now());
        staged.insert(entry.clone())?;
        self.commit(&mut index, staged).await?;

        tracing::info!(id, code = %entry.code, market = %entry.market, "stock entry created");
        Ok(entry)
    }

    pub async fn get(&self, id: u64) -> Result<StockEntry, StoreError> {
        self.index
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::stock_not_found(id))
    }

    pub async fn get_by_code(&self, code: &str) -> Result<StockEntry, StoreError> {
        self.index
            .read()
            .await
            .get_by_code(code)
            .cloned()
            .ok_or_else(|| StoreError::stock_not_found(code))
    }

    /// All entries in ascending id order.
    pub async fn list(&self) -> Vec<StockEntry> {
        self.index.read().await.to_vec()
    }

    pub async fn list_by_market(&self, market: &str) -> Vec<StockEntry> {
        self.index.read().await.by_market(market)
    }

    /// Filters by market when one is given. An empty market means no filter.
    pub async fn list_filtered(&self, market: Option<&str>) -> Vec<StockEntry> {
        match market.filter(|m| !m.is_empty()) {
            Some(m) => self.list_by_market(m).await,
            None => self.list().await,
        }
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }

    /// Full replace of every mutable field. `id` and `created_at` are kept.
    pub async fn update(&self, id: u64, input: StockInput) -> Result<StockEntry, StoreError> {
        let input = input.validate()?;

        let mut index = self.index.write().await;
        let current = index.get(id).ok_or_else(|| StoreError::stock_not_found(id))?;
        if index.id_for_code(&input.code).is_some_and(|owner| owner != id) {
            return Err(StoreError::DuplicateCode(input.code));
        }

        let updated = current.replaced_with(input);
        let mut staged = index.clone();
        let previous = staged.replace(updated.clone())?;
        self.commit(&mut index, staged).await?;

        if previous.code != updated.code {
            tracing::info!(id, from = %previous.code, to = %updated.code, "stock entry code changed");
        }
        tracing::info!(id, code = %updated.code, "stock entry updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: u64) -> Result<StockEntry, StoreError> {
        let mut index = self.index.write().await;
        if index.get(id).is_none() {
            return Err(StoreError::stock_not_found(id));
        }

        let mut staged = index.clone();
        let removed = staged.remove(id)?;
        self.commit(&mut index, staged).await?;

        tracing::info!(id, code = %removed.code, "stock entry deleted");
        Ok(removed)
    }

    /// Writes the current collection. Called on shutdown so the file reflects the final state.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let index = self.index.read().await;
        self.file.save(&index.to_vec()).await
    }

    async fn commit(&self, current: &mut StockIndex, staged: StockIndex) -> Result<(), StoreError> {
        if let Err(err) = self.file.save(&staged.to_vec()).await {
            tracing::error!(error = %err, "watchlist flush failed; mutation rolled back");
            return Err(err);
        }
        *current = staged;
        Ok(())
    }
}
