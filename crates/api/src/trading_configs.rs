use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use stockwatch_core::domain::trading_config::{TradingConfig, TradingConfigInput};
use stockwatch_core::storage::trading_configs::UpsertOutcome;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserStockResponse {
    config: Option<TradingConfig>,
    message: &'static str,
    total_configs: usize,
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<TradingConfig>> {
    Json(state.configs.list().await)
}

pub async fn list_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<TradingConfig>> {
    Json(state.configs.list_by_user(&user_id).await)
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<TradingConfig>, ApiError> {
    Ok(Json(state.configs.get(id).await?))
}

/// `null` rather than 404 when the stock has no active config.
pub async fn find_active(
    State(state): State<AppState>,
    Path(stock_code): Path<String>,
    Query(query): Query<UserQuery>,
) -> Json<Option<TradingConfig>> {
    Json(
        state
            .configs
            .find_active(&stock_code, query.user_id.as_deref())
            .await,
    )
}

pub async fn find_for_user_stock(
    State(state): State<AppState>,
    Path((user_id, stock_code)): Path<(String, String)>,
) -> Json<UserStockResponse> {
    let resp = match state.configs.find_for_user_stock(&user_id, &stock_code).await {
        Some(found) => UserStockResponse {
            message: if found.is_active {
                "active config"
            } else {
                "inactive config"
            },
            total_configs: found.total_configs,
            config: Some(found.config),
        },
        None => UserStockResponse {
            config: None,
            message: "no config",
            total_configs: 0,
        },
    };
    Json(resp)
}

pub async fn upsert(
    State(state): State<AppState>,
    Json(input): Json<TradingConfigInput>,
) -> Result<(StatusCode, Json<TradingConfig>), ApiError> {
    let (cfg, outcome) = state.configs.upsert(input).await?;
    let status = match outcome {
        UpsertOutcome::Created => StatusCode::CREATED,
        UpsertOutcome::Updated => StatusCode::OK,
    };
    Ok((status, Json(cfg)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(input): Json<TradingConfigInput>,
) -> Result<Json<TradingConfig>, ApiError> {
    Ok(Json(state.configs.update(id, input).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state.configs.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<TradingConfig>, ApiError> {
    Ok(Json(state.configs.toggle(id).await?))
}
