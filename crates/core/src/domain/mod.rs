pub mod stock;
pub mod timestamp;
pub mod trading_config;

use crate::error::StoreError;

pub(crate) fn trimmed(s: String) -> String {
    let t = s.trim();
    if t.len() == s.len() {
        s
    } else {
        t.to_string()
    }
}

pub(crate) fn ensure_finite(field: &str, value: f64) -> Result<(), StoreError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StoreError::Validation(format!("{field} must be a finite number (got {value})")))
    }
}

pub(crate) fn ensure_finite_opt(field: &str, value: Option<f64>) -> Result<(), StoreError> {
    match value {
        Some(v) => ensure_finite(field, v),
        None => Ok(()),
    }
}

pub(crate) fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
