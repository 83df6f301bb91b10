use crate::domain::{ensure_finite, normalize_note, timestamp, trimmed};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A ticker on the watchlist together with its entry plan.
///
/// Older files may hold `null` for the plan numbers, or leave them out. Both load as `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEntry {
    pub id: u64,
    pub code: String,
    pub name: String,
    pub market: String,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub target_price: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub stop_loss_percent: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub target_profit_percent: f64,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

fn null_as_zero<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(0.0))
}

/// Caller-supplied fields for create and full-replace update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockInput {
    pub code: String,
    pub name: String,
    pub market: String,
    pub target_price: f64,
    pub stop_loss_percent: f64,
    pub target_profit_percent: f64,
    #[serde(default)]
    pub memo: Option<String>,
}

impl StockInput {
    pub fn validate(self) -> Result<StockInput, StoreError> {
        let code = trimmed(self.code);
        if code.is_empty() {
            return Err(StoreError::Validation("code must be non-empty".into()));
        }

        ensure_finite("target_price", self.target_price)?;
        ensure_finite("stop_loss_percent", self.stop_loss_percent)?;
        ensure_finite("target_profit_percent", self.target_profit_percent)?;

        Ok(StockInput {
            code,
            name: trimmed(self.name),
            market: trimmed(self.market),
            target_price: self.target_price,
            stop_loss_percent: self.stop_loss_percent,
            target_profit_percent: self.target_profit_percent,
            memo: normalize_note(self.memo),
        })
    }
}

impl StockEntry {
    pub fn new(id: u64, input: StockInput, now: DateTime<Utc>) -> Self {
        Self {
            id,
            code: input.code,
            name: input.name,
            market: input.market,
            target_price: input.target_price,
            stop_loss_percent: input.stop_loss_percent,
            target_profit_percent: input.target_profit_percent,
            memo: input.memo,
            created_at: now,
            updated_at: now,
        }
    }

    /// Full replace of the mutable fields; `id` and `created_at` are kept.
    pub fn replaced_with(&self, input: StockInput) -> Self {
        Self {
            id: self.id,
            code: input.code,
            name: input.name,
            market: input.market,
            target_price: input.target_price,
            stop_loss_percent: input.stop_loss_percent,
            target_profit_percent: input.target_profit_percent,
            memo: input.memo,
            created_at: self.created_at,
            updated_at: timestamp::after(self.updated_at),
        }
    }

    pub fn input(&self) -> StockInput {
        StockInput {
            code: self.code.clone(),
            name: self.name.clone(),
            market: self.market.clone(),
            target_price: self.target_price,
            stop_loss_percent: self.stop_loss_percent,
            target_profit_percent: self.target_profit_percent,
            memo: self.memo.clone(),
        }
    }
}
