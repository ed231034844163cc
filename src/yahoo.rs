use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::{Client, Error as ReqwestError};
use serde_json::Value;
use std::time::Duration as StdDuration;

#[derive(Debug)]
pub enum ProviderError {
    Http(ReqwestError),
    Serialization(serde_json::Error),
    InvalidResponse(String),
}

impl From<ReqwestError> for ProviderError {
    fn from(error: ReqwestError) -> Self {
        ProviderError::Http(error)
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(error: serde_json::Error) -> Self {
        ProviderError::Serialization(error)
    }
}

/// One daily bar as returned by the provider. Gaps in the upstream columns
/// stay `None`; dropping incomplete rows is the series layer's job.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

pub struct YahooClient {
    client: Client,
    base_url: String,
    user_agents: Vec<String>,
    random_agent: bool,
}

impl YahooClient {
    pub fn new(base_url: String, random_agent: bool) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()?;

        let user_agents = vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0".to_string(),
        ];

        Ok(YahooClient {
            client,
            base_url,
            user_agents,
            random_agent,
        })
    }

    fn get_user_agent(&self) -> String {
        if self.random_agent {
            use rand::seq::IndexedRandom;
            self.user_agents
                .choose(&mut rand::rng())
                .unwrap_or(&self.user_agents[0])
                .clone()
        } else {
            self.user_agents[0].clone()
        }
    }

    /// Fetch daily bars for `symbol` over `[start, end]`, both ends inclusive.
    ///
    /// An empty Vec means the provider answered with a genuinely empty series
    /// (unknown or delisted symbol included). Transport failures and bodies
    /// that do not match the chart shape are errors.
    pub async fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        // The chart endpoint treats period2 as exclusive, so push it one day out.
        let period1 = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        let period2 = (end + ChronoDuration::days(1))
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp();

        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ])
            .header("Accept", "application/json, text/plain, */*")
            .header("User-Agent", self.get_user_agent())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // Unknown symbols come back as a non-2xx status with a chart error
        // object in the body, which still counts as "no data".
        let value: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(e) if status.is_success() => return Err(ProviderError::Serialization(e)),
            Err(_) => {
                return Err(ProviderError::InvalidResponse(format!(
                    "upstream returned status {status}"
                )));
            }
        };

        if !status.is_success()
            && value
                .pointer("/chart/error")
                .map_or(true, |error| error.is_null())
        {
            return Err(ProviderError::InvalidResponse(format!(
                "upstream returned status {status}"
            )));
        }

        parse_chart(&value)
    }
}

/// Decode a chart response body into daily bars.
///
/// The payload carries one timestamp column plus parallel open/high/low/
/// close/volume columns; entries may be null independently of each other.
pub fn parse_chart(body: &Value) -> Result<Vec<DailyBar>, ProviderError> {
    let chart = body
        .get("chart")
        .ok_or_else(|| ProviderError::InvalidResponse("missing chart object".to_string()))?;

    if chart.get("error").is_some_and(|error| !error.is_null()) {
        return Ok(Vec::new());
    }

    let results = match chart.get("result").and_then(|r| r.as_array()) {
        Some(results) if !results.is_empty() => results,
        _ => return Ok(Vec::new()),
    };

    let item = &results[0];
    let timestamps = match item.get("timestamp").and_then(|t| t.as_array()) {
        Some(timestamps) => timestamps,
        // A result entry with no timestamp column is how the provider spells
        // "symbol exists but had no bars in this window".
        None => return Ok(Vec::new()),
    };

    let quote = item
        .pointer("/indicators/quote/0")
        .ok_or_else(|| ProviderError::InvalidResponse("missing quote block".to_string()))?;

    let required_keys = ["open", "high", "low", "close", "volume"];
    for key in &required_keys {
        if quote.get(key).and_then(|column| column.as_array()).is_none() {
            return Err(ProviderError::InvalidResponse(format!(
                "missing column: {key}"
            )));
        }
    }

    let opens = quote["open"].as_array().unwrap();
    let highs = quote["high"].as_array().unwrap();
    let lows = quote["low"].as_array().unwrap();
    let closes = quote["close"].as_array().unwrap();
    let volumes = quote["volume"].as_array().unwrap();

    let length = timestamps.len();
    if [opens.len(), highs.len(), lows.len(), closes.len(), volumes.len()]
        .iter()
        .any(|&len| len != length)
    {
        return Err(ProviderError::InvalidResponse(
            "inconsistent column lengths".to_string(),
        ));
    }

    let mut bars = Vec::with_capacity(length);
    for i in 0..length {
        let timestamp = timestamps[i].as_i64().ok_or_else(|| {
            ProviderError::InvalidResponse(format!(
                "invalid timestamp at index {i}: {:?}",
                &timestamps[i]
            ))
        })?;
        let time = DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or_else(|| {
            ProviderError::InvalidResponse(format!(
                "cannot convert timestamp {timestamp} at index {i}"
            ))
        })?;

        bars.push(DailyBar {
            date: time.date_naive(),
            open: opens[i].as_f64(),
            high: highs[i].as_f64(),
            low: lows[i].as_f64(),
            close: closes[i].as_f64(),
            volume: volumes[i].as_u64(),
        });
    }

    bars.sort_by_key(|bar| bar.date);
    bars.dedup_by_key(|bar| bar.date);
    Ok(bars)
}
