pub mod analytics;
pub mod api;
pub mod config;
pub mod render;
pub mod series;
pub mod yahoo;

use crate::config::SharedConfig;
use crate::yahoo::YahooClient;
use axum::{Router, extract::FromRef, routing::get};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::CorsLayer;

pub type SharedMarket = Arc<YahooClient>;

#[derive(Clone)]
pub struct AppState {
    pub config: SharedConfig,
    pub market: SharedMarket,
}

impl FromRef<AppState> for SharedConfig {
    fn from_ref(app_state: &AppState) -> SharedConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for SharedMarket {
    fn from_ref(app_state: &AppState) -> SharedMarket {
        app_state.market.clone()
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(api::home_handler))
        .route("/companies", get(api::companies_handler))
        .route("/data", get(api::data_handler))
        .route("/summary", get(api::summary_handler))
        .route("/predict", get(api::predict_handler))
        .route("/correlation", get(api::correlation_handler))
        .route("/compare", get(api::compare_handler))
        .route("/volatility", get(api::volatility_handler))
        .route("/download", get(api::download_handler))
        .route("/plot", get(api::plot_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

#[tokio::main]
async fn main() {
    let app_config = config::AppConfig::load();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    tracing::info!("Starting stockpulse");
    tracing::info!(
        environment = %app_config.environment,
        port = app_config.port,
        symbols = app_config.symbols.len(),
        window_start = %app_config.window_start,
        window_end = %app_config.window_end,
        "Loaded configuration"
    );

    let market = YahooClient::new(app_config.provider_base_url.clone(), true)
        .expect("Failed to build market data client");

    let app_state = AppState {
        config: Arc::new(app_config.clone()),
        market: Arc::new(market),
    };

    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    tracing::info!(%addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
