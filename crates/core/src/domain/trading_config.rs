use crate::domain::{ensure_finite, ensure_finite_opt, timestamp, trimmed};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_PYRAMIDING_COUNT: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Manual,
    Turtle,
}

/// Per-user auto-trading settings for one stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConfig {
    pub id: u64,
    pub stock_code: String,
    pub stock_name: String,
    pub trading_mode: TradingMode,
    #[serde(default)]
    pub max_loss: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub pyramiding_count: u8,
    #[serde(default)]
    pub position_size: Option<f64>,
    #[serde(default)]
    pub pyramiding_entries: Vec<String>,
    #[serde(default)]
    pub positions: Vec<f64>,
    pub user_id: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConfigInput {
    pub stock_code: String,
    pub stock_name: String,
    pub trading_mode: TradingMode,
    #[serde(default)]
    pub max_loss: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub pyramiding_count: u8,
    #[serde(default)]
    pub position_size: Option<f64>,
    #[serde(default)]
    pub pyramiding_entries: Vec<String>,
    #[serde(default)]
    pub positions: Vec<f64>,
    pub user_id: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl TradingConfigInput {
    pub fn validate(self) -> Result<TradingConfigInput, StoreError> {
        let stock_code = trimmed(self.stock_code);
        if stock_code.is_empty() {
            return Err(StoreError::Validation("stock_code must be non-empty".into()));
        }
        let user_id = trimmed(self.user_id);
        if user_id.is_empty() {
            return Err(StoreError::Validation("user_id must be non-empty".into()));
        }
        if self.pyramiding_count > MAX_PYRAMIDING_COUNT {
            return Err(StoreError::Validation(format!(
                "pyramiding_count must be 0..={MAX_PYRAMIDING_COUNT} (got {})",
                self.pyramiding_count
            )));
        }

        ensure_finite_opt("max_loss", self.max_loss)?;
        ensure_finite_opt("stop_loss", self.stop_loss)?;
        ensure_finite_opt("take_profit", self.take_profit)?;
        ensure_finite_opt("position_size", self.position_size)?;
        for p in &self.positions {
            ensure_finite("positions", *p)?;
        }

        Ok(TradingConfigInput {
            stock_code,
            stock_name: trimmed(self.stock_name),
            user_id,
            pyramiding_entries: self
                .pyramiding_entries
                .into_iter()
                .map(|s| s.trim().to_string())
                .collect(),
            ..self
        })
    }
}

impl TradingConfig {
    pub fn new(id: u64, input: TradingConfigInput, now: DateTime<Utc>) -> Self {
        Self {
            id,
            stock_code: input.stock_code,
            stock_name: input.stock_name,
            trading_mode: input.trading_mode,
            max_loss: input.max_loss,
            stop_loss: input.stop_loss,
            take_profit: input.take_profit,
            pyramiding_count: input.pyramiding_count,
            position_size: input.position_size,
            pyramiding_entries: input.pyramiding_entries,
            positions: input.positions,
            user_id: input.user_id,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn replaced_with(&self, input: TradingConfigInput) -> Self {
        let mut next = TradingConfig::new(self.id, input, self.created_at);
        next.updated_at = timestamp::after(self.updated_at);
        next
    }

    pub fn toggled(&self) -> Self {
        Self {
            is_active: !self.is_active,
            updated_at: timestamp::after(self.updated_at),
            ..self.clone()
        }
    }

    pub fn same_pair(&self, user_id: &str, stock_code: &str) -> bool {
        self.user_id == user_id && self.stock_code == stock_code
    }
}
