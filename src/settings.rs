use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::aggregate::MAX_ITEMS;
use crate::resilience::{RetryPolicy, DEFAULT_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS};
use crate::validate::{ValidationRules, DEFAULT_CURRENCY};

const CONFIG_FILE: &str = "agro_feeds";
const ENV_PREFIX: &str = "AGRO";
/// Honored on its own so existing deployments keep working.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

const DEFAULT_MARKET_URL: &str = "https://kalimatimarket.gov.np/";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub market: MarketSettings,
    pub weather: WeatherSettings,
    pub fetch: FetchSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub url: String,
    pub user_agent: String,
    pub source_label: String,
    pub max_items: usize,
    pub currency_symbol: String,
    /// Only accept names from the built-in crop vocabulary.
    pub strict_crops: bool,
    pub extra_noise_terms: Vec<String>,
}

impl Default for MarketSettings {
    fn default() -> Self {
        MarketSettings {
            url: DEFAULT_MARKET_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            source_label: "Kalimati Fruits and Vegetable Market".to_string(),
            max_items: MAX_ITEMS,
            currency_symbol: DEFAULT_CURRENCY.to_string(),
            strict_crops: false,
            extra_noise_terms: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_location: String,
    pub country_code: String,
    pub country_name: String,
    /// Forecast entries (3h each) scanned for rain.
    pub lookahead_intervals: usize,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        WeatherSettings {
            base_url: DEFAULT_WEATHER_URL.to_string(),
            api_key: None,
            default_location: "Kathmandu".to_string(),
            country_code: "NP".to_string(),
            country_name: "Nepal".to_string(),
            lookahead_intervals: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
    /// Upper bound on one whole pipeline run, retries included.
    pub deadline_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
            timeout_secs: 15,
            deadline_secs: 60,
        }
    }
}

impl FetchSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind: "127.0.0.1:8787".to_string(),
        }
    }
}

impl Settings {
    /// Defaults, then `agro_feeds.toml` if present, then `AGRO_*` env vars
    /// (`AGRO_FETCH__MAX_ATTEMPTS=5`), then `OPENWEATHER_API_KEY`.
    pub fn load() -> Result<Settings, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("weather.api_key", std::env::var(API_KEY_ENV).ok())?
            .build()?
            .try_deserialize()
    }

    pub fn validation_rules(&self) -> ValidationRules {
        let mut rules = if self.market.strict_crops {
            ValidationRules::strict()
        } else {
            ValidationRules::default()
        };
        rules.currency_symbol = self.market.currency_symbol.clone();
        rules
            .noise_terms
            .extend(self.market.extra_noise_terms.iter().cloned());
        rules
    }
}
