use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One upstream document as fetched. Never mutated after retrieval.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub source: String,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl RawDocument {
    pub fn new(source: impl Into<String>, body: impl Into<String>) -> Self {
        RawDocument {
            source: source.into(),
            body: body.into(),
            fetched_at: Utc::now(),
        }
    }
}

/// An unvalidated row pulled out of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub name: String,
    pub unit: String,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub avg_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub crop: String,
    pub price: String,
    pub unit: String,
    #[serde(rename = "change")]
    pub change_percent: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    #[default]
    Live,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub prices: Vec<PriceRecord>,
    pub last_updated: DateTime<Utc>,
    pub source: String,
    pub item_count: usize,
    /// Older dashboard payloads omit this; they only ever held live data.
    #[serde(default)]
    pub provenance: Provenance,
}

impl MarketSnapshot {
    pub fn live(prices: Vec<PriceRecord>, source: &str) -> Self {
        Self::build(prices, source, Provenance::Live)
    }

    pub fn fallback(prices: Vec<PriceRecord>, source: &str) -> Self {
        Self::build(prices, source, Provenance::Fallback)
    }

    fn build(prices: Vec<PriceRecord>, source: &str, provenance: Provenance) -> Self {
        MarketSnapshot {
            item_count: prices.len(),
            prices,
            last_updated: Utc::now(),
            source: source.to_string(),
            provenance,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.provenance == Provenance::Fallback
    }

    pub fn find(&self, crop: &str) -> Option<&PriceRecord> {
        self.prices.iter().find(|p| p.crop.eq_ignore_ascii_case(crop))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub location: String,
    pub temperature: i32,
    pub humidity: i32,
    pub wind_speed: i32,
    pub condition: String,
    pub description: String,
    pub advisory: String,
    pub last_updated: DateTime<Utc>,
}
