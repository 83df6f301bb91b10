use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use stockwatch_core::error::StoreError;

/// Maps store errors onto HTTP statuses with a `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError(pub StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::DuplicateCode(_) | StoreError::ActiveConfigConflict { .. } => {
                StatusCode::CONFLICT
            }
            StoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::CorruptState { .. } | StoreError::Persistence { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            sentry::capture_error(&self.0);
            tracing::error!(error = %self.0, "request failed; mutation not committed");
        } else {
            tracing::debug!(error = %self.0, %status, "request rejected");
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    async fn detail_of(resp: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn every_store_error_maps_to_status_and_detail_body() {
        let cases = [
            (StoreError::stock_not_found(7), StatusCode::NOT_FOUND),
            (StoreError::trading_config_not_found(3), StatusCode::NOT_FOUND),
            (StoreError::DuplicateCode("005930".into()), StatusCode::CONFLICT),
            (
                StoreError::ActiveConfigConflict {
                    user_id: "u1".into(),
                    stock_code: "005930".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                StoreError::Validation("code must be non-empty".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                StoreError::CorruptState {
                    path: PathBuf::from("stocks.json"),
                    detail: "expected value".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                StoreError::Persistence {
                    path: PathBuf::from("stocks.json"),
                    source: std::io::Error::new(std::io::ErrorKind::TimedOut, "slow disk"),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let message = err.to_string();
            let api = ApiError::from(err);
            assert_eq!(api.status(), expected, "{message}");

            let resp = api.into_response();
            assert_eq!(resp.status(), expected);
            let body = detail_of(resp).await;
            assert_eq!(body, json!({ "detail": message }));
        }
    }
}
