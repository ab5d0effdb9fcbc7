use tracing::info;

use crate::model::{MarketSnapshot, PriceRecord};
use crate::validate::format_price;

/// Bumped whenever the curated rows below change.
pub const FALLBACK_VERSION: u32 = 2;
pub const FALLBACK_SOURCE: &str = "Kalimati Market (Estimated Fallback)";

// (crop, min, max, unit, change), kept in crop-name order. Prices render
// with the configured currency symbol so they match live rows.
const FALLBACK_SET: &[(&str, u64, u64, &str, &str)] = &[
    ("Lentil (Masur)", 120, 140, "kg", "+1.8%"),
    ("Maize", 35, 42, "kg", "+1.5%"),
    ("Mustard Oil", 180, 200, "ltr", "-0.5%"),
    ("Onion (Red)", 45, 55, "kg", "-2.1%"),
    ("Potato", 28, 35, "kg", "+3.2%"),
    ("Rice (Coarse)", 75, 85, "kg", "+2.1%"),
    ("Tomato", 60, 80, "kg", "+5.4%"),
    ("Wheat Flour", 42, 48, "kg", "-0.8%"),
];

pub fn fallback_prices(currency_symbol: &str) -> Vec<PriceRecord> {
    FALLBACK_SET
        .iter()
        .map(|&(crop, min, max, unit, change)| PriceRecord {
            crop: crop.to_string(),
            price: format_price(currency_symbol, min, max, None, unit),
            unit: unit.to_string(),
            change_percent: change.to_string(),
        })
        .collect()
}

pub fn fallback_snapshot(currency_symbol: &str) -> MarketSnapshot {
    info!("Serving fallback price set v{}", FALLBACK_VERSION);
    MarketSnapshot::fallback(fallback_prices(currency_symbol), FALLBACK_SOURCE)
}
