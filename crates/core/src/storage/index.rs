use crate::domain::stock::StockEntry;
use crate::error::StoreError;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    #[error("duplicate id {0}")]
    DuplicateId(u64),
    #[error("duplicate code '{0}'")]
    DuplicateCode(String),
    #[error("unknown id {0}")]
    UnknownId(u64),
    #[error("entry {id}: {reason}")]
    InvalidEntry { id: u64, reason: String },
    #[error("no ids left to allocate")]
    IdsExhausted,
}

impl From<IndexError> for StoreError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::DuplicateCode(code) => StoreError::DuplicateCode(code),
            IndexError::UnknownId(id) => StoreError::stock_not_found(id),
            other => StoreError::Validation(other.to_string()),
        }
    }
}

/// Lookup structures over the live watchlist.
///
/// `by_id` owns the entries and iterates in ascending id, which is also insertion order since
/// ids only grow. `by_code` maps each code to its owner's id and is kept in lockstep.
#[derive(Debug, Clone, Default)]
pub struct StockIndex {
    by_id: BTreeMap<u64, StockEntry>,
    by_code: HashMap<String, u64>,
    // Next id to hand out; never decreases, so deleted ids are not reissued.
    next_id: u64,
}

impl StockIndex {
    /// Rebuilds the index from a loaded collection, rejecting anything that breaks the
    /// watchlist invariants.
    pub fn from_entries(entries: Vec<StockEntry>) -> Result<Self, IndexError> {
        let mut index = StockIndex::default();
        for entry in entries {
            if entry.code.trim().is_empty() {
                return Err(IndexError::InvalidEntry {
                    id: entry.id,
                    reason: "empty code".into(),
                });
            }
            if entry.created_at > entry.updated_at {
                return Err(IndexError::InvalidEntry {
                    id: entry.id,
                    reason: "created_at is later than updated_at".into(),
                });
            }
            index.insert(entry)?;
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&StockEntry> {
        self.by_id.get(&id)
    }

    pub fn id_for_code(&self, code: &str) -> Option<u64> {
        self.by_code.get(code).copied()
    }

    pub fn get_by_code(&self, code: &str) -> Option<&StockEntry> {
        self.id_for_code(code).and_then(|id| self.by_id.get(&id))
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StockEntry> {
        self.by_id.values()
    }

    pub fn to_vec(&self) -> Vec<StockEntry> {
        self.iter().cloned().collect()
    }

    /// Linear scan; exact, case-sensitive match.
    pub fn by_market(&self, market: &str) -> Vec<StockEntry> {
        self.iter().filter(|e| e.market == market).cloned().collect()
    }

    pub fn allocate_id(&mut self) -> Result<u64, IndexError> {
        let id = self.next_id.max(1);
        self.next_id = id.checked_add(1).ok_or(IndexError::IdsExhausted)?;
        Ok(id)
    }

    pub fn insert(&mut self, entry: StockEntry) -> Result<(), IndexError> {
        if self.by_id.contains_key(&entry.id) {
            return Err(IndexError::DuplicateId(entry.id));
        }
        if self.by_code.contains_key(&entry.code) {
            return Err(IndexError::DuplicateCode(entry.code));
        }

        let after = entry.id.checked_add(1).ok_or_else(|| IndexError::InvalidEntry {
            id: entry.id,
            reason: "id leaves no room for further ids".into(),
        })?;
        self.next_id = self.next_id.max(after);
        self.by_code.insert(entry.code.clone(), entry.id);
        self.by_id.insert(entry.id, entry);
        Ok(())
    }

    /// Swaps in a new version of an existing entry, re-keying its code if it changed.
    pub fn replace(&mut self, entry: StockEntry) -> Result<StockEntry, IndexError> {
        let id = entry.id;
        let Some(previous) = self.by_id.get(&id) else {
            return Err(IndexError::UnknownId(id));
        };

        if previous.code != entry.code {
            if self.by_code.contains_key(&entry.code) {
                return Err(IndexError::DuplicateCode(entry.code));
            }
            self.by_code.remove(&previous.code);
            self.by_code.insert(entry.code.clone(), id);
        }

        self.by_id.insert(id, entry).ok_or(IndexError::UnknownId(id))
    }

    pub fn remove(&mut self, id: u64) -> Result<StockEntry, IndexError> {
        let entry = self.by_id.remove(&id).ok_or(IndexError::UnknownId(id))?;
        self.by_code.remove(&entry.code);
        Ok(entry)
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        assert_eq!(self.by_id.len(), self.by_code.len());
        for (code, id) in &self.by_code {
            assert_eq!(&self.by_id[id].code, code);
        }
    }
}
