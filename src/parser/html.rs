use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::text::{clean_cell, parse_amount};
use super::{DocumentShape, ExtractError, ShapeParser};
use crate::model::CandidateRecord;

static TABLE_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<table\b").unwrap());
static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table\s*>").unwrap());
static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").unwrap());
static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<t([dh])\b[^>]*>(.*?)</t[dh]\s*>").unwrap());
static SERIAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,4}\.?$").unwrap());

/// `<table>` markup, one candidate per data row.
pub struct HtmlTableParser;

impl ShapeParser for HtmlTableParser {
    fn shape(&self) -> DocumentShape {
        DocumentShape::HtmlTable
    }

    fn probe(&self, body: &str) -> bool {
        TABLE_OPEN_RE.is_match(body)
    }

    fn parse(&self, body: &str) -> Result<Vec<CandidateRecord>, ExtractError> {
        let opened = TABLE_OPEN_RE.find_iter(body).count();
        let tables: Vec<&str> = TABLE_RE
            .captures_iter(body)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        if tables.is_empty() && opened > 0 {
            return Err(ExtractError::UnterminatedTable);
        }

        let mut records = Vec::new();
        for (t, table) in tables.iter().enumerate() {
            for (r, row) in ROW_RE.captures_iter(table).enumerate() {
                match parse_row(&row[1]) {
                    Some(rec) => records.push(rec),
                    None => debug!("table {} row {}: not a data row", t, r),
                }
            }
        }
        Ok(records)
    }
}

fn parse_row(row: &str) -> Option<CandidateRecord> {
    let raw: Vec<(bool, String)> = CELL_RE
        .captures_iter(row)
        .map(|c| (&c[1] == "h" || &c[1] == "H", clean_cell(&c[2])))
        .collect();

    // Header rows: all <th>, or no numeric price column (checked below).
    if !raw.is_empty() && raw.iter().all(|(is_th, _)| *is_th) {
        return None;
    }

    // Columns are positional; only blank padding at either edge is dropped.
    let first = raw.iter().position(|(_, text)| !text.is_empty())?;
    let last = raw.iter().rposition(|(_, text)| !text.is_empty())?;
    let mut cells: Vec<&str> = raw[first..=last].iter().map(|(_, text)| text.as_str()).collect();

    // Older layouts lead with a serial-number column.
    if cells.len() >= 4 && SERIAL_RE.is_match(cells[0]) && parse_amount(cells[1]).is_none() {
        cells.remove(0);
    }

    if cells.len() < 3 || cells[1].is_empty() {
        return None;
    }

    let prices: Vec<Option<f64>> = cells[2..].iter().take(3).map(|c| parse_amount(c)).collect();
    if prices.iter().all(Option::is_none) {
        return None;
    }

    Some(CandidateRecord {
        name: cells[0].to_string(),
        unit: cells[1].to_string(),
        min_price: prices[0],
        max_price: prices.get(1).copied().flatten(),
        avg_price: prices.get(2).copied().flatten(),
    })
}
