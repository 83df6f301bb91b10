use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the watchlist and trading-config stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("stock code '{0}' already exists")]
    DuplicateCode(String),

    #[error("an active trading config already exists for user '{user_id}' and stock '{stock_code}'")]
    ActiveConfigConflict { user_id: String, stock_code: String },

    #[error("invalid input: {0}")]
    Validation(String),

    /// The state file exists but cannot be trusted. Fatal at startup.
    #[error("corrupt state file {}: {detail}", .path.display())]
    CorruptState { path: PathBuf, detail: String },

    /// The mutation was not durably committed and has been rolled back in memory.
    #[error("failed to persist {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn stock_not_found(key: impl ToString) -> Self {
        StoreError::NotFound {
            kind: "stock entry",
            key: key.to_string(),
        }
    }

    pub fn trading_config_not_found(id: u64) -> Self {
        StoreError::NotFound {
            kind: "trading config",
            key: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_key() {
        assert_eq!(
            StoreError::stock_not_found(7).to_string(),
            "stock entry not found: 7"
        );
        assert_eq!(
            StoreError::DuplicateCode("005930".into()).to_string(),
            "stock code '005930' already exists"
        );
        let err = StoreError::Persistence {
            path: PathBuf::from("/tmp/stocks.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().starts_with("failed to persist /tmp/stocks.json"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
