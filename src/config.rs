use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::sync::Arc;

pub type SharedConfig = Arc<AppConfig>;

/// Symbols exposed by `/companies`. Deployments override this through the
/// config file or the SYMBOLS environment variable.
pub const DEFAULT_SYMBOLS: &[&str] = &[
    "TSLA",
    "AAPL",
    "MSFT",
    "INFY.NS",
    "TCS.NS",
    "RELIANCE.NS",
    "META",
    "GOOGL",
    "AMZN",
];

const DEFAULT_PROVIDER_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_WINDOW_START: &str = "2023-01-01";
const DEFAULT_WINDOW_END: &str = "2023-12-31";

// YAML-serializable configuration structure
#[derive(Serialize, Deserialize, Debug)]
pub struct ConfigYaml {
    pub environment: String,
    pub port: u16,
    pub symbols: Option<Vec<String>>,
    pub provider_base_url: Option<String>,
    pub window_start: Option<NaiveDate>,
    pub window_end: Option<NaiveDate>,
    pub default_symbol: Option<String>,
    pub default_period: Option<usize>,
}

// Holds application-wide settings
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: String,
    pub port: u16,
    pub symbols: Arc<Vec<String>>,
    pub provider_base_url: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub default_symbol: String,
    pub default_period: usize,
}

impl AppConfig {
    // Load configuration from YAML file or environment variables
    pub fn load() -> Self {
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml(&config_file)
        } else {
            Self::from_env()
        }
    }

    // Load configuration from YAML file
    pub fn from_yaml(file_path: &str) -> Self {
        let yaml_content = fs::read_to_string(file_path)
            .unwrap_or_else(|e| panic!("Failed to read config file {}: {}", file_path, e));

        let yaml_config: ConfigYaml = serde_yaml::from_str(&yaml_content)
            .unwrap_or_else(|e| panic!("Failed to parse YAML config: {}", e));

        Self {
            environment: yaml_config.environment,
            port: yaml_config.port,
            symbols: Arc::new(
                yaml_config
                    .symbols
                    .unwrap_or_else(|| DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()),
            ),
            provider_base_url: yaml_config
                .provider_base_url
                .unwrap_or_else(|| DEFAULT_PROVIDER_BASE_URL.to_string()),
            window_start: yaml_config
                .window_start
                .unwrap_or_else(|| parse_date(DEFAULT_WINDOW_START)),
            window_end: yaml_config
                .window_end
                .unwrap_or_else(|| parse_date(DEFAULT_WINDOW_END)),
            default_symbol: yaml_config
                .default_symbol
                .unwrap_or_else(|| "TSLA".to_string()),
            default_period: yaml_config.default_period.unwrap_or(30),
        }
    }

    // Load all configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok(); // Load .env file if present

        let symbols = Arc::new(match env::var("SYMBOLS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect::<Vec<String>>(),
            Err(_) => DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        });

        let provider_base_url = env::var("PROVIDER_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_PROVIDER_BASE_URL.to_string());

        let window_start = env::var("WINDOW_START")
            .map(|s| parse_date(&s))
            .unwrap_or_else(|_| parse_date(DEFAULT_WINDOW_START));

        let window_end = env::var("WINDOW_END")
            .map(|s| parse_date(&s))
            .unwrap_or_else(|_| parse_date(DEFAULT_WINDOW_END));

        let default_symbol = env::var("DEFAULT_SYMBOL").unwrap_or_else(|_| "TSLA".to_string());

        let default_period = env::var("DEFAULT_PERIOD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8000);

        Self {
            environment,
            port,
            symbols,
            provider_base_url,
            window_start,
            window_end,
            default_symbol,
            default_period,
        }
    }

    #[cfg(test)]
    pub fn for_tests(symbols: Vec<String>) -> Self {
        Self {
            environment: "test".to_string(),
            port: 0,
            symbols: Arc::new(symbols),
            provider_base_url: "http://127.0.0.1:9".to_string(),
            window_start: parse_date(DEFAULT_WINDOW_START),
            window_end: parse_date(DEFAULT_WINDOW_END),
            default_symbol: "TSLA".to_string(),
            default_period: 30,
        }
    }
}

fn parse_date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .unwrap_or_else(|e| panic!("Invalid date {}: {}", raw, e))
}
