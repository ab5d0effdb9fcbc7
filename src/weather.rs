use std::time::Duration;

use chrono::Utc;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::info;

use crate::error::PipelineError;
use crate::fetch::Fetcher;
use crate::model::WeatherSnapshot;
use crate::resilience::{degrade, with_deadline};
use crate::settings::WeatherSettings;

const HOT_ABOVE_C: f64 = 30.0;
const COOL_BELOW_C: f64 = 15.0;
const HUMID_ABOVE_PCT: f64 = 80.0;

pub const RAIN_EXPECTED: &str = "Rain expected - postpone irrigation and field work";
pub const STORM_NOW: &str = "Stormy conditions - secure livestock and delay spraying or harvest";
pub const RAIN_NOW: &str = "Good for transplanting rice and watering crops";
pub const HOT: &str = "Hot weather - increase irrigation, work early morning";
pub const COOL: &str = "Cool weather - protect sensitive crops, reduce watering";
pub const HUMID: &str = "High humidity - watch for fungal diseases";
pub const CLEAR: &str = "Clear skies - good for harvesting and drying produce";
pub const CLOUDY: &str = "Overcast - good conditions for transplanting and spraying";
pub const GOOD: &str = "Good weather for most farming activities";

pub const UNAVAILABLE: &str = "Unable to fetch weather forecast";
pub const NOT_CONFIGURED: &str = "Weather service not configured - advisory unavailable";

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    name: String,
    main: MainBlock,
    #[serde(default)]
    wind: Wind,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Default, Deserialize)]
struct Wind {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    #[serde(default)]
    weather: Vec<Condition>,
}

/// First matching rule wins: rain ahead, severe or wet conditions now,
/// temperature, humidity, then a fair-weather message.
pub fn advisory(temp_c: f64, humidity: f64, condition: &str, upcoming: &[&str]) -> &'static str {
    let condition = condition.to_lowercase();
    if upcoming.iter().any(|c| c.to_lowercase().contains("rain")) {
        RAIN_EXPECTED
    } else if condition.contains("storm") || condition.contains("thunder") {
        STORM_NOW
    } else if condition.contains("rain") || condition.contains("drizzle") {
        RAIN_NOW
    } else if temp_c > HOT_ABOVE_C {
        HOT
    } else if temp_c < COOL_BELOW_C {
        COOL
    } else if humidity > HUMID_ABOVE_PCT {
        HUMID
    } else if condition.contains("clear") {
        CLEAR
    } else if condition.contains("cloud") {
        CLOUDY
    } else {
        GOOD
    }
}

pub struct WeatherPipeline {
    fetcher: Fetcher,
    api_key: Option<SecretString>,
    base_url: String,
    default_location: String,
    country_code: String,
    country_name: String,
    lookahead: usize,
    deadline: Duration,
}

impl WeatherPipeline {
    pub fn new(fetcher: Fetcher, settings: &WeatherSettings, deadline: Duration) -> Self {
        WeatherPipeline {
            fetcher,
            api_key: settings
                .api_key
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .map(|k| SecretString::new(k.into())),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            default_location: settings.default_location.clone(),
            country_code: settings.country_code.clone(),
            country_name: settings.country_name.clone(),
            lookahead: settings.lookahead_intervals,
            deadline,
        }
    }

    /// Current conditions plus advisory. Never fails; see [`Self::unavailable`].
    pub async fn run(&self, location: Option<&str>) -> WeatherSnapshot {
        let city = location
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.default_location);
        let live = with_deadline(self.deadline, self.live(city));
        degrade("weather pipeline", live, |e| self.unavailable(city, e)).await
    }

    async fn live(&self, city: &str) -> Result<WeatherSnapshot, PipelineError> {
        let key = self
            .api_key
            .as_ref()
            .ok_or(PipelineError::ConfigurationMissing("weather API key"))?;
        let current_url = self.endpoint("weather", city, key)?;
        let forecast_url = self.endpoint("forecast", city, key)?;

        info!("Fetching weather for {}", city);
        let (current, forecast) = tokio::try_join!(
            self.fetcher.fetch(current_url.as_str()),
            self.fetcher.fetch(forecast_url.as_str()),
        )?;

        let current: CurrentResponse = serde_json::from_str(&current.body)?;
        let forecast: ForecastResponse = serde_json::from_str(&forecast.body)?;
        Ok(self.snapshot(&current, &forecast))
    }

    fn endpoint(&self, path: &str, city: &str, key: &SecretString) -> Result<Url, PipelineError> {
        let q = format!("{},{}", city, self.country_code);
        Url::parse_with_params(
            &format!("{}/{}", self.base_url, path),
            [("q", q.as_str()), ("appid", key.expose_secret()), ("units", "metric")],
        )
        .map_err(|e| PipelineError::InvalidUrl(e.to_string()))
    }

    fn snapshot(&self, current: &CurrentResponse, forecast: &ForecastResponse) -> WeatherSnapshot {
        let (condition, description) = current
            .weather
            .first()
            .map(|c| (c.main.clone(), c.description.clone()))
            .unwrap_or_else(|| ("Unknown".to_string(), String::new()));

        let upcoming: Vec<&str> = forecast
            .list
            .iter()
            .take(self.lookahead)
            .filter_map(|e| e.weather.first().map(|c| c.main.as_str()))
            .collect();

        WeatherSnapshot {
            location: format!("{}, {}", current.name, self.country_name),
            temperature: current.main.temp.round() as i32,
            humidity: current.main.humidity.round() as i32,
            wind_speed: (current.wind.speed * 3.6).round() as i32,
            advisory: advisory(current.main.temp, current.main.humidity, &condition, &upcoming)
                .to_string(),
            condition,
            description,
            last_updated: Utc::now(),
        }
    }

    /// Zero-valued snapshot used whenever live data can't be produced.
    pub fn unavailable(&self, city: &str, err: &PipelineError) -> WeatherSnapshot {
        let advisory = match err {
            PipelineError::ConfigurationMissing(_) => NOT_CONFIGURED,
            _ => UNAVAILABLE,
        };
        WeatherSnapshot {
            location: format!("{}, {}", city, self.country_name),
            temperature: 0,
            humidity: 0,
            wind_speed: 0,
            condition: "Unknown".to_string(),
            description: "Weather data unavailable".to_string(),
            advisory: advisory.to_string(),
            last_updated: Utc::now(),
        }
    }
}
