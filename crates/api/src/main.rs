use anyhow::Context;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockwatch_core::storage::{StockStore, TradingConfigStore};

mod error;
mod stocks;
mod trading_configs;

#[derive(Debug, Clone)]
pub struct AppState {
    pub stocks: Arc<StockStore>,
    pub configs: Arc<TradingConfigStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockwatch_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let options = settings.storage_options();

    // A watchlist that cannot be loaded is fatal: serving from an empty store would overwrite it
    // on the first mutation.
    let stocks = match StockStore::open(&settings.stocks_file, options).await {
        Ok(store) => store,
        Err(e) => {
            let err = anyhow::Error::new(e).context("failed to open stock watchlist");
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %format!("{err:#}"), "refusing to start");
            return Err(err);
        }
    };
    let configs = TradingConfigStore::open(&settings.trading_configs_file, options)
        .await
        .context("failed to open trading configs")?;

    let state = AppState {
        stocks: Arc::new(stocks),
        configs: Arc::new(configs),
    };

    let app = router(state.clone()).layer(cors_layer(&settings.cors_allowed_origins));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, stocks_file = %settings.stocks_file.display(), "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down; flushing state files");
    if let Err(e) = state.stocks.flush().await {
        sentry::capture_error(&e);
        tracing::error!(error = %e, "final watchlist flush failed");
    }
    if let Err(e) = state.configs.flush().await {
        sentry::capture_error(&e);
        tracing::error!(error = %e, "final trading config flush failed");
    }

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/stocks", get(stocks::list).post(stocks::create))
        .route(
            "/stocks/:id",
            get(stocks::get_one)
                .put(stocks::update)
                .delete(stocks::delete),
        )
        .route("/stocks/code/:code", get(stocks::get_by_code))
        .route("/stocks/market/:market", get(stocks::list_by_market))
        .route(
            "/trading-configs",
            get(trading_configs::list).post(trading_configs::upsert),
        )
        .route(
            "/trading-configs/:id",
            get(trading_configs::get_one)
                .put(trading_configs::update)
                .delete(trading_configs::delete),
        )
        .route("/trading-configs/:id/toggle", post(trading_configs::toggle))
        .route(
            "/trading-configs/stock/:stock_code",
            get(trading_configs::find_active),
        )
        .route(
            "/trading-configs/user/:user_id",
            get(trading_configs::list_by_user),
        )
        .route(
            "/trading-configs/user/:user_id/stock/:stock_code",
            get(trading_configs::find_for_user_stock),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

/// Credentialed CORS for an explicit origin list. A wildcard cannot be combined with
/// credentials, so `*` is skipped along with malformed origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) if o != "*" => Some(v),
            _ => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &stockwatch_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn cors_preflight_allows_credentials_for_listed_origin() {
        let origins = vec![
            "http://localhost:3000".to_string(),
            "*".to_string(),
            "bad\norigin".to_string(),
        ];
        let app = Router::new()
            .route("/healthz", get(healthz))
            .layer(cors_layer(&origins));

        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/healthz")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(preflight).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "content-type");

        let foreign = Request::builder()
            .uri("/healthz")
            .header(header::ORIGIN, "http://evil.example")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(foreign).await.unwrap();
        assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
