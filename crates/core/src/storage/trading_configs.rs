use crate::domain::timestamp;
use crate::domain::trading_config::{TradingConfig, TradingConfigInput};
use crate::error::StoreError;
use crate::storage::codec::JsonFile;
use crate::storage::StorageOptions;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct ConfigBook {
    by_id: BTreeMap<u64, TradingConfig>,
    next_id: u64,
}

impl ConfigBook {
    fn from_configs(configs: Vec<TradingConfig>) -> Result<Self, String> {
        let mut book = ConfigBook::default();
        for cfg in configs {
            if book.by_id.contains_key(&cfg.id) {
                return Err(format!("duplicate id {}", cfg.id));
            }
            if cfg.created_at > cfg.updated_at {
                return Err(format!("config {}: created_at is later than updated_at", cfg.id));
            }
            let after = cfg
                .id
                .checked_add(1)
                .ok_or_else(|| format!("config {}: id leaves no room for further ids", cfg.id))?;
            book.next_id = book.next_id.max(after);
            book.by_id.insert(cfg.id, cfg);
        }
        Ok(book)
    }

    fn allocate_id(&mut self) -> Result<u64, StoreError> {
        let id = self.next_id.max(1);
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| StoreError::Validation("no trading config ids left to allocate".into()))?;
        Ok(id)
    }

    fn active_for(&self, user_id: &str, stock_code: &str, except: Option<u64>) -> Option<&TradingConfig> {
        self.by_id
            .values()
            .find(|c| c.is_active && c.same_pair(user_id, stock_code) && Some(c.id) != except)
    }

    fn to_vec(&self) -> Vec<TradingConfig> {
        self.by_id.values().cloned().collect()
    }
}

/// Result of looking up one user's settings for one stock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStockConfig {
    pub config: TradingConfig,
    pub is_active: bool,
    pub total_configs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Durable per-user auto-trading settings. At most one config per (user, stock) is active.
#[derive(Debug)]
pub struct TradingConfigStore {
    file: JsonFile,
    book: RwLock<ConfigBook>,
}

impl TradingConfigStore {
    pub async fn open(path: impl Into<PathBuf>, options: StorageOptions) -> Result<Self, StoreError> {
        let file = JsonFile::new(path, options.flush_timeout);
        let configs: Vec<TradingConfig> = file.load().await?;
        let book = ConfigBook::from_configs(configs).map_err(|detail| file.corrupt(detail))?;

        {
            let mut seen = std::collections::HashSet::new();
            for cfg in book.by_id.values().filter(|c| c.is_active) {
                if !seen.insert((cfg.user_id.as_str(), cfg.stock_code.as_str())) {
                    tracing::warn!(
                        id = cfg.id,
                        user_id = %cfg.user_id,
                        stock_code = %cfg.stock_code,
                        "more than one active trading config for the same user and stock"
                    );
                }
            }
        }

        tracing::info!(
            path = %file.path().display(),
            configs = book.by_id.len(),
            "trading configs loaded"
        );

        Ok(Self {
            file,
            book: RwLock::new(book),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn list(&self) -> Vec<TradingConfig> {
        self.book.read().await.to_vec()
    }

    pub async fn list_by_user(&self, user_id: &str) -> Vec<TradingConfig> {
        self.book
            .read()
            .await
            .by_id
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: u64) -> Result<TradingConfig, StoreError> {
        self.book
            .read()
            .await
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::trading_config_not_found(id))
    }

    /// First active config for the stock, restricted to `user_id` when given.
    pub async fn find_active(&self, stock_code: &str, user_id: Option<&str>) -> Option<TradingConfig> {
        self.book
            .read()
            .await
            .by_id
            .values()
            .find(|c| {
                c.is_active
                    && c.stock_code == stock_code
                    && user_id.map_or(true, |u| c.user_id == u)
            })
            .cloned()
    }

    /// The user's active config for the stock, falling back to the most recently updated one.
    pub async fn find_for_user_stock(&self, user_id: &str, stock_code: &str) -> Option<UserStockConfig> {
        let book = self.book.read().await;
        let matching: Vec<&TradingConfig> = book
            .by_id
            .values()
            .filter(|c| c.same_pair(user_id, stock_code))
            .collect();

        let chosen = matching
            .iter()
            .rev()
            .find(|c| c.is_active)
            .or_else(|| matching.iter().max_by_key(|c| c.updated_at))?;

        Some(UserStockConfig {
            config: (*chosen).clone(),
            is_active: chosen.is_active,
            total_configs: matching.len(),
        })
    }

    /// Replaces the user's active config for the stock, or creates one when there is none.
    pub async fn upsert(&self, input: TradingConfigInput) -> Result<(TradingConfig, UpsertOutcome), StoreError> {
        let input = input.validate()?;

        let mut book = self.book.write().await;
        let mut staged = book.clone();
        let (cfg, outcome) = match book.active_for(&input.user_id, &input.stock_code, None) {
            Some(existing) => (existing.replaced_with(input), UpsertOutcome::Updated),
            None => {
                let id = staged.allocate_id()?;
                (TradingConfig::new(id, input, timestamp::now()), UpsertOutcome::Created)
            }
        };
        staged.by_id.insert(cfg.id, cfg.clone());
        self.commit(&mut book, staged).await?;

        tracing::info!(
            id = cfg.id,
            user_id = %cfg.user_id,
            stock_code = %cfg.stock_code,
            outcome = ?outcome,
            "trading config saved"
        );
        Ok((cfg, outcome))
    }

    pub async fn update(&self, id: u64, input: TradingConfigInput) -> Result<TradingConfig, StoreError> {
        let input = input.validate()?;

        let mut book = self.book.write().await;
        let current = book
            .by_id
            .get(&id)
            .ok_or_else(|| StoreError::trading_config_not_found(id))?;
        if input.is_active && book.active_for(&input.user_id, &input.stock_code, Some(id)).is_some() {
            return Err(StoreError::ActiveConfigConflict {
                user_id: input.user_id,
                stock_code: input.stock_code,
            });
        }

        let updated = current.replaced_with(input);
        let mut staged = book.clone();
        staged.by_id.insert(id, updated.clone());
        self.commit(&mut book, staged).await?;

        tracing::info!(id, user_id = %updated.user_id, stock_code = %updated.stock_code, "trading config updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: u64) -> Result<TradingConfig, StoreError> {
        let mut book = self.book.write().await;
        let mut staged = book.clone();
        let removed = staged
            .by_id
            .remove(&id)
            .ok_or_else(|| StoreError::trading_config_not_found(id))?;
        self.commit(&mut book, staged).await?;

        tracing::info!(id, stock_code = %removed.stock_code, "trading config deleted");
        Ok(removed)
    }

    /// Flips `is_active`. Activating fails if the pair already has another active config.
    pub async fn toggle(&self, id: u64) -> Result<TradingConfig, StoreError> {
        let mut book = self.book.write().await;
        let current = book
            .by_id
            .get(&id)
            .ok_or_else(|| StoreError::trading_config_not_found(id))?;
        if !current.is_active
            && book
                .active_for(&current.user_id, &current.stock_code, Some(id))
                .is_some()
        {
            return Err(StoreError::ActiveConfigConflict {
                user_id: current.user_id.clone(),
                stock_code: current.stock_code.clone(),
            });
        }

        let toggled = current.toggled();
        let mut staged = book.clone();
        staged.by_id.insert(id, toggled.clone());
        self.commit(&mut book, staged).await?;

        tracing::info!(id, is_active = toggled.is_active, "trading config toggled");
        Ok(toggled)
    }

    pub async fn flush(&self) -> Result<(), StoreError> {
        let book = self.book.read().await;
        self.file.save(&book.to_vec()).await
    }

    async fn commit(&self, current: &mut ConfigBook, staged: ConfigBook) -> Result<(), StoreError> {
        if let Err(err) = self.file.save(&staged.to_vec()).await {
            tracing::error!(error = %err, "trading config flush failed; mutation rolled back");
            return Err(err);
        }
        *current = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading_config::TradingMode;

    fn input(user_id: &str, stock_code: &str) -> TradingConfigInput {
        TradingConfigInput {
            stock_code: stock_code.into(),
            stock_name: format!("Name {stock_code}"),
            trading_mode: TradingMode::Manual,
            max_loss: Some(500_000.0),
            stop_loss: Some(72_000.0),
            take_profit: Some(96_000.0),
            pyramiding_count: 2,
            position_size: Some(30.0),
            pyramiding_entries: vec!["3".into(), "6".into()],
            positions: vec![30.0, 35.0, 35.0],
            user_id: user_id.into(),
            is_active: true,
        }
    }

    async fn open_in(dir: &tempfile::TempDir) -> TradingConfigStore {
        TradingConfigStore::open(dir.path().join("trading_configs.json"), StorageOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn upsert_replaces_active_config_for_pair() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;

        let (first, outcome) = store.upsert(input("u1", "005930")).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(first.id, 1);

        let mut changed = input("u1", "005930");
        changed.trading_mode = TradingMode::Turtle;
        let (second, outcome) = store.upsert(changed).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(second.trading_mode, TradingMode::Turtle);

        let (other, outcome) = store.upsert(input("u2", "005930")).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(other.id, 2);
        assert_eq!(store.list().await.len(), 2);
    }

    #[tokio::test]
    async fn toggle_refuses_second_active_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;

        let (a, _) = store.upsert(input("u1", "005930")).await.unwrap();
        let off = store.toggle(a.id).await.unwrap();
        assert!(!off.is_active);

        let (b, outcome) = store.upsert(input("u1", "005930")).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        assert!(b.is_active);

        assert!(matches!(
            store.toggle(a.id).await,
            Err(StoreError::ActiveConfigConflict { .. })
        ));
        assert!(!store.toggle(b.id).await.unwrap().is_active);
        assert!(store.toggle(a.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn update_checks_active_conflict_against_other_configs() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;
        let (a, _) = store.upsert(input("u1", "005930")).await.unwrap();
        let (b, _) = store.upsert(input("u1", "000660")).await.unwrap();

        assert!(matches!(
            store.update(b.id, input("u1", "005930")).await,
            Err(StoreError::ActiveConfigConflict { .. })
        ));

        let mut inactive = input("u1", "005930");
        inactive.is_active = false;
        let moved = store.update(b.id, inactive).await.unwrap();
        assert_eq!(moved.stock_code, "005930");

        let same = store.update(a.id, input("u1", "005930")).await.unwrap();
        assert_eq!(same.id, a.id);

        assert!(store.update(99, input("u1", "005930")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn lookups_by_user_and_stock() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;
        let (a, _) = store.upsert(input("u1", "005930")).await.unwrap();
        store.upsert(input("u2", "005930")).await.unwrap();
        store.upsert(input("u1", "000660")).await.unwrap();

        assert_eq!(store.list_by_user("u1").await.len(), 2);
        assert!(store.list_by_user("nobody").await.is_empty());

        assert_eq!(store.find_active("005930", Some("u1")).await.unwrap().id, a.id);
        assert_eq!(store.find_active("005930", None).await.unwrap().id, a.id);
        assert!(store.find_active("035420", None).await.is_none());

        let found = store.find_for_user_stock("u1", "005930").await.unwrap();
        assert!(found.is_active);
        assert_eq!(found.total_configs, 1);

        store.toggle(a.id).await.unwrap();
        let found = store.find_for_user_stock("u1", "005930").await.unwrap();
        assert!(!found.is_active);
        assert_eq!(found.config.id, a.id);
        assert!(store.find_for_user_stock("u1", "035420").await.is_none());
    }

    #[tokio::test]
    async fn delete_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trading_configs.json");
        let store = TradingConfigStore::open(&path, StorageOptions::default()).await.unwrap();
        let (a, _) = store.upsert(input("u1", "005930")).await.unwrap();
        let (b, _) = store.upsert(input("u1", "000660")).await.unwrap();

        store.delete(a.id).await.unwrap();
        assert!(store.get(a.id).await.unwrap_err().is_not_found());
        assert!(store.delete(a.id).await.unwrap_err().is_not_found());

        let reopened = TradingConfigStore::open(&path, StorageOptions::default()).await.unwrap();
        assert_eq!(reopened.list().await, vec![b]);
        let (c, _) = reopened.upsert(input("u3", "005930")).await.unwrap();
        assert_eq!(c.id, 3);
    }

    #[tokio::test]
    async fn id_at_end_of_range_is_corrupt_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trading_configs.json");
        let seeded = open_in(&dir).await;
        let (cfg, _) = seeded.upsert(input("u1", "005930")).await.unwrap();

        let mut top = serde_json::to_value(&cfg).unwrap();
        top["id"] = serde_json::json!(u64::MAX);
        std::fs::write(&path, serde_json::json!([top]).to_string()).unwrap();
        assert!(matches!(
            TradingConfigStore::open(&path, StorageOptions::default()).await,
            Err(StoreError::CorruptState { .. })
        ));

        top["id"] = serde_json::json!(u64::MAX - 1);
        std::fs::write(&path, serde_json::json!([top]).to_string()).unwrap();
        let store = TradingConfigStore::open(&path, StorageOptions::default()).await.unwrap();
        assert!(matches!(
            store.upsert(input("u2", "005930")).await,
            Err(StoreError::Validation(_))
        ));
        assert_eq!(store.list().await.len(), 1);
    }
}
