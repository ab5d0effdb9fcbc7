use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::{CandidateRecord, PriceRecord};
use crate::parser::text::normalize_ws;

pub const DEFAULT_CURRENCY: &str = "Rs. ";
pub const DEFAULT_MAX_PLAUSIBLE: u64 = 100_000;

/// Crop vocabulary used by the strict rule set.
pub const STRICT_CROPS: &[&str] = &[
    "rice", "wheat", "maize", "potato", "onion", "tomato", "lentil", "mustard",
    "cauliflower", "cabbage", "carrot", "beans", "peas", "garlic", "ginger", "chili",
];

const NOISE_TERMS: &[&str] = &[
    "download", "app store", "google play", "play store", "copyright", "all rights reserved",
    "home", "about us", "contact", "login", "privacy", "notice", "commodity", "कृषि उपज",
    "total", "read more",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitAlias {
    pub canonical: String,
    pub aliases: Vec<String>,
}

impl UnitAlias {
    fn new(canonical: &str, aliases: &[&str]) -> Self {
        UnitAlias {
            canonical: canonical.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Everything the validator consults. Passed in explicitly so tests can pin it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    pub units: Vec<UnitAlias>,
    pub noise_terms: Vec<String>,
    /// When set, names must contain one of these (case-insensitive).
    pub allowed_crops: Option<Vec<String>>,
    pub currency_symbol: String,
    pub max_plausible: u64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        ValidationRules {
            units: vec![
                UnitAlias::new(
                    "kg",
                    &["kg", "kgs", "kg.", "kilo", "kilogram", "kilograms", "के.जी.", "के.जी", "केजी"],
                ),
                UnitAlias::new("doz", &["doz", "doz.", "dozen", "dz", "दर्जन"]),
                UnitAlias::new("pc", &["pc", "pcs", "piece", "pieces", "per piece", "प्रति गोटा", "गोटा"]),
                UnitAlias::new("ltr", &["ltr", "l", "lit", "litre", "liter", "लिटर"]),
                UnitAlias::new("bundle", &["bundle", "bunch", "मुठा"]),
            ],
            noise_terms: NOISE_TERMS.iter().map(|t| t.to_string()).collect(),
            allowed_crops: None,
            currency_symbol: DEFAULT_CURRENCY.to_string(),
            max_plausible: DEFAULT_MAX_PLAUSIBLE,
        }
    }
}

impl ValidationRules {
    pub fn strict() -> Self {
        ValidationRules {
            allowed_crops: Some(STRICT_CROPS.iter().map(|c| c.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn canonical_unit(&self, raw: &str) -> Option<&str> {
        let folded = normalize_ws(raw).to_lowercase();
        self.units
            .iter()
            .find(|u| u.canonical == folded || u.aliases.iter().any(|a| a.to_lowercase() == folded))
            .map(|u| u.canonical.as_str())
    }

    fn noise_term(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.noise_terms
            .iter()
            .find(|t| lower.contains(&t.to_lowercase()))
            .map(String::as_str)
    }

    fn crop_allowed(&self, name: &str) -> bool {
        match &self.allowed_crops {
            None => true,
            Some(list) => {
                let lower = name.to_lowercase();
                list.iter().any(|c| lower.contains(&c.to_lowercase()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("name shorter than 2 characters")]
    NameTooShort,
    #[error("name is numeric")]
    NumericName,
    #[error("name matches noise term {0:?}")]
    NoiseName(String),
    #[error("crop not in allowlist")]
    UnknownCrop,
    #[error("unknown unit {0:?}")]
    UnknownUnit(String),
    #[error("no price value")]
    MissingPrice,
    #[error("price is not positive")]
    NonPositivePrice,
    #[error("price is not a whole number")]
    NonIntegerPrice,
    #[error("price above plausible bound")]
    ImplausiblePrice,
    #[error("minimum above maximum")]
    InvertedRange,
    #[error("average outside min..max")]
    AverageOutOfRange,
}

/// A record that passed every rule, with canonical unit and formatted price.
/// `avg` is `None` when the source gave a min/max range only.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecord {
    pub crop: String,
    pub unit: String,
    pub min: u64,
    pub max: u64,
    pub avg: Option<u64>,
    pub price: String,
}

impl ValidRecord {
    pub fn into_price_record(self, change_percent: String) -> PriceRecord {
        PriceRecord {
            crop: self.crop,
            price: self.price,
            unit: self.unit,
            change_percent,
        }
    }
}

pub fn validate(c: &CandidateRecord, rules: &ValidationRules) -> Result<ValidRecord, Rejection> {
    let name = normalize_ws(&c.name);
    if name.chars().count() < 2 {
        return Err(Rejection::NameTooShort);
    }
    if name
        .chars()
        .all(|ch| ch.is_numeric() || ch.is_ascii_punctuation() || ch.is_whitespace())
    {
        return Err(Rejection::NumericName);
    }
    if let Some(term) = rules.noise_term(&name) {
        return Err(Rejection::NoiseName(term.to_string()));
    }
    if !rules.crop_allowed(&name) {
        return Err(Rejection::UnknownCrop);
    }

    let unit = rules
        .canonical_unit(&c.unit)
        .ok_or_else(|| Rejection::UnknownUnit(c.unit.clone()))?
        .to_string();

    let min = whole(c.min_price, rules)?;
    let max = whole(c.max_price, rules)?;
    let avg = whole(c.avg_price, rules)?;

    let (min, max, avg) = match (min, max, avg) {
        (None, None, None) => return Err(Rejection::MissingPrice),
        (Some(v), None, None) | (None, Some(v), None) | (None, None, Some(v)) => (v, v, Some(v)),
        (lo, hi, avg) => {
            // At least two of the three are present; a missing bound takes the average.
            let lo = lo.or(avg).or(hi).unwrap_or_default();
            let hi = hi.or(avg).or(Some(lo)).unwrap_or_default();
            if lo > hi {
                return Err(Rejection::InvertedRange);
            }
            if let Some(a) = avg {
                if a < lo || a > hi {
                    return Err(Rejection::AverageOutOfRange);
                }
            }
            (lo, hi, avg)
        }
    };

    let price = format_price(&rules.currency_symbol, min, max, avg, &unit);
    Ok(ValidRecord {
        crop: name,
        unit,
        min,
        max,
        avg,
        price,
    })
}

fn whole(v: Option<f64>, rules: &ValidationRules) -> Result<Option<u64>, Rejection> {
    let Some(v) = v else { return Ok(None) };
    if !v.is_finite() || v <= 0.0 {
        return Err(Rejection::NonPositivePrice);
    }
    if v.fract() != 0.0 {
        return Err(Rejection::NonIntegerPrice);
    }
    if v > rules.max_plausible as f64 {
        return Err(Rejection::ImplausiblePrice);
    }
    Ok(Some(v as u64))
}

/// `Rs. 55/kg` when an average was observed or the range is flat,
/// `Rs. 50-60/kg` for a bare range.
pub fn format_price(symbol: &str, min: u64, max: u64, avg: Option<u64>, unit: &str) -> String {
    match avg {
        Some(a) => format!("{}{}/{}", symbol, a, unit),
        None if min == max => format!("{}{}/{}", symbol, min, unit),
        None => format!("{}{}-{}/{}", symbol, min, max, unit),
    }
}

pub struct ValidationReport {
    pub accepted: Vec<ValidRecord>,
    pub rejected: Vec<(String, Rejection)>,
}

/// Validate a batch. Rejections never abort; each is logged and kept.
pub fn validate_all(candidates: &[CandidateRecord], rules: &ValidationRules) -> ValidationReport {
    let mut accepted = Vec::with_capacity(candidates.len());
    let mut rejected = Vec::new();
    for c in candidates {
        match validate(c, rules) {
            Ok(v) => accepted.push(v),
            Err(reason) => {
                debug!("Rejected {:?}: {}", c.name, reason);
                rejected.push((c.name.clone(), reason));
            }
        }
    }
    ValidationReport { accepted, rejected }
}
