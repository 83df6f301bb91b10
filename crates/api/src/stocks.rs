use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use stockwatch_core::domain::stock::{StockEntry, StockInput};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    market: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<StockEntry>> {
    Json(state.stocks.list_filtered(query.market.as_deref()).await)
}

pub async fn list_by_market(
    State(state): State<AppState>,
    Path(market): Path<String>,
) -> Json<Vec<StockEntry>> {
    Json(state.stocks.list_by_market(&market).await)
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<StockEntry>, ApiError> {
    Ok(Json(state.stocks.get(id).await?))
}

pub async fn get_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<StockEntry>, ApiError> {
    Ok(Json(state.stocks.get_by_code(&code).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<StockInput>,
) -> Result<(StatusCode, Json<StockEntry>), ApiError> {
    let entry = state.stocks.create(input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(input): Json<StockInput>,
) -> Result<Json<StockEntry>, ApiError> {
    Ok(Json(state.stocks.update(id, input).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state.stocks.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use stockwatch_core::storage::{StockStore, StorageOptions, TradingConfigStore};
    use tower::ServiceExt;

    fn input(code: &str, market: &str) -> StockInput {
        StockInput {
            code: code.into(),
            name: format!("Name {code}"),
            market: market.into(),
            target_price: 10_000.0,
            stop_loss_percent: 5.0,
            target_profit_percent: 10.0,
            memo: None,
        }
    }

    async fn state_in(dir: &tempfile::TempDir) -> AppState {
        let options = StorageOptions::default();
        AppState {
            stocks: Arc::new(
                StockStore::open(dir.path().join("stocks.json"), options)
                    .await
                    .unwrap(),
            ),
            configs: Arc::new(
                TradingConfigStore::open(dir.path().join("trading_configs.json"), options)
                    .await
                    .unwrap(),
            ),
        }
    }

    async fn codes_at(state: &AppState, uri: &str) -> Vec<String> {
        let resp = crate::router(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let entries: Vec<StockEntry> = serde_json::from_slice(&body).unwrap();
        entries.into_iter().map(|e| e.code).collect()
    }

    #[tokio::test]
    async fn empty_market_query_lists_everything() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir).await;
        state.stocks.create(input("005930", "KOSPI")).await.unwrap();
        state.stocks.create(input("AAPL", "NASDAQ")).await.unwrap();

        assert_eq!(codes_at(&state, "/stocks").await, vec!["005930", "AAPL"]);
        assert_eq!(codes_at(&state, "/stocks?market=").await, vec!["005930", "AAPL"]);
        assert_eq!(codes_at(&state, "/stocks?market=NASDAQ").await, vec!["AAPL"]);
        assert!(codes_at(&state, "/stocks?market=nasdaq").await.is_empty());
    }
}
