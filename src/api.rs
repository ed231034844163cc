use crate::SharedMarket;
use crate::analytics::{self, AnalyticsError};
use crate::config::SharedConfig;
use crate::render::{self, RenderError};
use crate::series::PriceSeries;
use crate::yahoo::ProviderError;
use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::Query;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

/// Failures that are not part of the structured "no data" protocol: they map
/// to 5xx responses with a generic body, details go to the log only.
#[derive(Debug)]
pub enum ApiError {
    Upstream(ProviderError),
    Render(RenderError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Upstream(e) => {
                error!(?e, "Upstream market data request failed");
                (StatusCode::BAD_GATEWAY, "Upstream market data unavailable")
            }
            ApiError::Render(e) => {
                error!(?e, "Failed to render response body");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render response")
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SymbolParams {
    pub symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DataParams {
    pub symbol: Option<String>,
    pub period: Option<usize>,
}

/// Both symbols are required; a missing one is rejected by the extractor
/// before any upstream fetch happens.
#[derive(Debug, Deserialize)]
pub struct PairParams {
    pub symbol1: String,
    pub symbol2: String,
}

async fn fetch_series(
    market: &SharedMarket,
    config: &SharedConfig,
    symbol: &str,
) -> Result<PriceSeries, ApiError> {
    let bars = market
        .history(symbol, config.window_start, config.window_end)
        .await
        .map_err(ApiError::Upstream)?;
    debug!(symbol, bars = bars.len(), "Fetched bars from provider");
    Ok(PriceSeries::from_bars(symbol, bars))
}

#[instrument]
pub async fn home_handler() -> impl IntoResponse {
    Json(json!({ "msg": "Stock API is running." }))
}

#[instrument(skip(config))]
pub async fn companies_handler(State(config): State<SharedConfig>) -> impl IntoResponse {
    info!(count = config.symbols.len(), "Returning known symbols");
    Json(json!({ "companies": &*config.symbols }))
}

#[instrument(skip(market, config), fields(symbol))]
pub async fn data_handler(
    State(market): State<SharedMarket>,
    State(config): State<SharedConfig>,
    Query(params): Query<DataParams>,
) -> Result<Response, ApiError> {
    let symbol = params.symbol.unwrap_or_else(|| config.default_symbol.clone());
    let period = params.period.unwrap_or(config.default_period);
    tracing::Span::current().record("symbol", symbol.as_str());

    let series = fetch_series(&market, &config, &symbol).await?;
    if series.is_empty() {
        info!(symbol, "No data for symbol");
        return Ok(Json(json!([])).into_response());
    }

    info!(symbol, rows = series.len(), period, "Returning data rows");
    Ok(Json(series.tail(period)).into_response())
}

#[instrument(skip(market, config), fields(symbol))]
pub async fn summary_handler(
    State(market): State<SharedMarket>,
    State(config): State<SharedConfig>,
    Query(params): Query<SymbolParams>,
) -> Result<Response, ApiError> {
    let symbol = params.symbol.unwrap_or_else(|| config.default_symbol.clone());
    tracing::Span::current().record("symbol", symbol.as_str());

    let series = fetch_series(&market, &config, &symbol).await?;
    let Some(stats) = analytics::summarize(&series) else {
        info!(symbol, "No data for symbol");
        return Ok(no_data_response(&symbol, "No data found for this symbol"));
    };

    Ok(Json(json!({
        "symbol": symbol,
        "52w_high": stats.high,
        "52w_low": stats.low,
        "average_close": stats.mean,
    }))
    .into_response())
}

#[instrument(skip(market, config), fields(symbol))]
pub async fn predict_handler(
    State(market): State<SharedMarket>,
    State(config): State<SharedConfig>,
    Query(params): Query<SymbolParams>,
) -> Result<Response, ApiError> {
    let symbol = params.symbol.unwrap_or_else(|| config.default_symbol.clone());
    tracing::Span::current().record("symbol", symbol.as_str());

    let series = fetch_series(&market, &config, &symbol).await?;
    if series.is_empty() {
        info!(symbol, "No data for symbol");
        return Ok(no_data_response(&symbol, "No data available for prediction"));
    }

    match analytics::forecast(&series) {
        Ok(points) => Ok(Json(json!({ "symbol": symbol, "forecast": points })).into_response()),
        Err(_) => {
            warn!(symbol, rows = series.len(), "Series too short for regression");
            Ok(no_data_response(
                &symbol,
                "Not enough data points for prediction",
            ))
        }
    }
}

#[instrument(skip(market, config), fields(symbol1 = %params.symbol1, symbol2 = %params.symbol2))]
pub async fn correlation_handler(
    State(market): State<SharedMarket>,
    State(config): State<SharedConfig>,
    Query(params): Query<PairParams>,
) -> Result<Response, ApiError> {
    let series1 = fetch_series(&market, &config, &params.symbol1).await?;
    let series2 = fetch_series(&market, &config, &params.symbol2).await?;

    if series1.is_empty() || series2.is_empty() {
        info!("No data for one or both symbols");
        return Ok(Json(json!({
            "error": format!(
                "No data for one or both symbols: {}, {}",
                params.symbol1, params.symbol2
            )
        }))
        .into_response());
    }

    match analytics::correlate(&series1, &series2) {
        Ok(correlation) => Ok(Json(json!({
            "symbol1": params.symbol1,
            "symbol2": params.symbol2,
            "correlation": correlation,
        }))
        .into_response()),
        Err(AnalyticsError::NoOverlap) => {
            info!("No overlapping dates between series");
            Ok(Json(json!({
                "error": "No overlapping dates for correlation analysis."
            }))
            .into_response())
        }
        Err(AnalyticsError::NotEnoughData) => {
            info!("Overlap too small or degenerate for correlation");
            Ok(Json(json!({
                "error": "Not enough overlapping data for correlation analysis."
            }))
            .into_response())
        }
    }
}

#[instrument(skip(market, config), fields(symbol1 = %params.symbol1, symbol2 = %params.symbol2))]
pub async fn compare_handler(
    State(market): State<SharedMarket>,
    State(config): State<SharedConfig>,
    Query(params): Query<PairParams>,
) -> Result<Response, ApiError> {
    let series1 = fetch_series(&market, &config, &params.symbol1).await?;
    let series2 = fetch_series(&market, &config, &params.symbol2).await?;

    let Some(comparison) = analytics::compare(&series1, &series2) else {
        info!("No data for one or both symbols");
        return Ok(
            Json(json!({ "error": "One or both symbols returned no data" })).into_response(),
        );
    };

    Ok(Json(json!({
        "symbol1": params.symbol1,
        "average_close1": comparison.mean_a,
        "symbol2": params.symbol2,
        "average_close2": comparison.mean_b,
        "avg_diff": comparison.diff,
    }))
    .into_response())
}

#[instrument(skip(market, config), fields(symbol))]
pub async fn volatility_handler(
    State(market): State<SharedMarket>,
    State(config): State<SharedConfig>,
    Query(params): Query<SymbolParams>,
) -> Result<Response, ApiError> {
    let symbol = params.symbol.unwrap_or_else(|| config.default_symbol.clone());
    tracing::Span::current().record("symbol", symbol.as_str());

    let series = fetch_series(&market, &config, &symbol).await?;
    if series.is_empty() {
        info!(symbol, "No data for symbol");
        return Ok(no_data_response(&symbol, "No data found"));
    }

    match analytics::volatility(&series) {
        Some(volatility) => {
            Ok(Json(json!({ "symbol": symbol, "volatility": volatility })).into_response())
        }
        None => {
            warn!(symbol, rows = series.len(), "Series too short for volatility");
            Ok(no_data_response(
                &symbol,
                "Not enough data points to compute volatility",
            ))
        }
    }
}

#[instrument(skip(market, config), fields(symbol))]
pub async fn download_handler(
    State(market): State<SharedMarket>,
    State(config): State<SharedConfig>,
    Query(params): Query<SymbolParams>,
) -> Result<Response, ApiError> {
    let symbol = params.symbol.unwrap_or_else(|| config.default_symbol.clone());
    tracing::Span::current().record("symbol", symbol.as_str());

    let series = fetch_series(&market, &config, &symbol).await?;
    if series.is_empty() {
        info!(symbol, "No data for symbol");
        return Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Symbol not found or no data.",
        )
            .into_response());
    }

    let csv_text = render::to_csv(&series).map_err(ApiError::Render)?;
    info!(symbol, rows = series.len(), "Returning CSV export");
    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        csv_text,
    )
        .into_response())
}

#[instrument(skip(market, config), fields(symbol))]
pub async fn plot_handler(
    State(market): State<SharedMarket>,
    State(config): State<SharedConfig>,
    Query(params): Query<SymbolParams>,
) -> Result<Response, ApiError> {
    let symbol = params.symbol.unwrap_or_else(|| config.default_symbol.clone());
    tracing::Span::current().record("symbol", symbol.as_str());

    let series = fetch_series(&market, &config, &symbol).await?;
    // an empty series renders as a labelled placeholder image, not a failure
    let png = render::render_chart(&series).map_err(ApiError::Render)?;
    info!(symbol, bytes = png.len(), "Returning chart");
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

fn no_data_response(symbol: &str, message: &str) -> Response {
    Json(json!({ "symbol": symbol, "error": message })).into_response()
}
