use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::{MarketSnapshot, PriceRecord};
use crate::parser::text::to_ascii_digits;
use crate::validate::ValidRecord;

/// A move larger than this share of the previous price is significant.
pub const SIGNIFICANT_PERCENT: f64 = 10.0;
pub const NOT_AVAILABLE: &str = "N/A";

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap());

/// How a change indicator is derived for one run.
#[derive(Debug, Clone, Copy)]
pub enum ChangeStrategy<'a> {
    /// Single snapshot: where the average sits within the day's min..max.
    Spread,
    /// Diff against a caller-held earlier snapshot.
    Temporal(&'a MarketSnapshot),
}

impl ChangeStrategy<'_> {
    pub fn estimate(&self, rec: &ValidRecord) -> String {
        match self {
            ChangeStrategy::Spread => spread_change(rec),
            ChangeStrategy::Temporal(previous) => previous
                .find(&rec.crop)
                .and_then(|prev| percent_change(&prev.price, &rec.price))
                .map(|pct| format_signed(pct.round() as i64))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        }
    }

    pub fn apply(&self, records: Vec<ValidRecord>) -> Vec<PriceRecord> {
        records
            .into_iter()
            .map(|r| {
                let change = self.estimate(&r);
                r.into_price_record(change)
            })
            .collect()
    }
}

/// `round((avg - mid) / mid * 100)` with `mid` the centre of min..max.
pub fn spread_change(rec: &ValidRecord) -> String {
    let Some(avg) = rec.avg else {
        return "0%".to_string();
    };
    let mid = (rec.min + rec.max) as f64 / 2.0;
    let diff = avg as f64 - mid;
    if diff.abs() < 1.0 || mid <= 0.0 {
        return "0%".to_string();
    }
    format_signed((diff / mid * 100.0).round() as i64)
}

pub fn format_signed(pct: i64) -> String {
    match pct {
        0 => "0%".to_string(),
        p if p > 0 => format!("+{}%", p),
        p => format!("{}%", p),
    }
}

/// Numeric amount of a formatted price; a range yields its midpoint.
pub fn parse_price_amount(price: &str) -> Option<f64> {
    let ascii = to_ascii_digits(price);
    let amount_part = ascii.split('/').next().unwrap_or("");
    let nums: Vec<f64> = NUMBER_RE
        .find_iter(amount_part)
        .filter_map(|m| m.as_str().replace(',', "").parse().ok())
        .collect();
    match nums.as_slice() {
        [v] => Some(*v),
        [lo, hi] => Some((lo + hi) / 2.0),
        _ => None,
    }
}

fn percent_change(previous: &str, current: &str) -> Option<f64> {
    let prev = parse_price_amount(previous)?;
    let cur = parse_price_amount(current)?;
    if prev <= 0.0 {
        return None;
    }
    Some((cur - prev) / prev * 100.0)
}

/// One crop's movement between two snapshots. `significant` is the signal
/// the alerting side keys on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceMove {
    pub crop: String,
    pub previous: f64,
    pub current: f64,
    pub percent: f64,
    pub significant: bool,
}

pub fn price_move(current: &PriceRecord, previous: &MarketSnapshot) -> Option<PriceMove> {
    let prev = previous.find(&current.crop)?;
    let prev_amount = parse_price_amount(&prev.price)?;
    let cur_amount = parse_price_amount(&current.price)?;
    if prev_amount <= 0.0 {
        return None;
    }
    let percent = (cur_amount - prev_amount) / prev_amount * 100.0;
    Some(PriceMove {
        crop: current.crop.clone(),
        previous: prev_amount,
        current: cur_amount,
        percent,
        significant: (cur_amount - prev_amount).abs() > prev_amount * SIGNIFICANT_PERCENT / 100.0,
    })
}

pub fn price_moves(current: &[PriceRecord], previous: &MarketSnapshot) -> Vec<PriceMove> {
    current.iter().filter_map(|p| price_move(p, previous)).collect()
}
