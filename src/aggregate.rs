use std::collections::HashSet;

use crate::model::{MarketSnapshot, PriceRecord};

pub const MAX_ITEMS: usize = 15;

/// Dedupe (case-insensitive, first wins), sort by crop name, cap.
pub fn aggregate(records: Vec<PriceRecord>, cap: usize) -> Vec<PriceRecord> {
    let mut seen = HashSet::new();
    let mut unique: Vec<PriceRecord> = records
        .into_iter()
        .filter(|r| seen.insert(r.crop.to_lowercase()))
        .collect();

    // Stable: equal keys keep extraction order.
    unique.sort_by_cached_key(|r| r.crop.to_lowercase());
    unique.truncate(cap);
    unique
}

pub fn assemble(records: Vec<PriceRecord>, cap: usize, source: &str) -> MarketSnapshot {
    MarketSnapshot::live(aggregate(records, cap), source)
}
