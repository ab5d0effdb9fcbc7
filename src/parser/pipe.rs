use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::text::{normalize_ws, parse_amount};
use super::{DocumentShape, ExtractError, ShapeParser};
use crate::model::CandidateRecord;

/// Exactly five fields: `| name | unit | min | max | avg |`.
static ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\|([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\|\s*$").unwrap()
});
static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\s:=+\-]*$").unwrap());

/// Pipe-delimited pseudo-table, as produced by markdown renderings of the
/// price board.
pub struct PipeTableParser;

impl ShapeParser for PipeTableParser {
    fn shape(&self) -> DocumentShape {
        DocumentShape::PipeTable
    }

    fn probe(&self, body: &str) -> bool {
        body.lines().any(|l| fields(l).is_some_and(|f| !is_separator(&f)))
    }

    fn parse(&self, body: &str) -> Result<Vec<CandidateRecord>, ExtractError> {
        let mut records = Vec::new();
        for (n, line) in body.lines().enumerate() {
            let Some(f) = fields(line) else { continue };
            if is_separator(&f) {
                continue;
            }
            match build(&f) {
                Some(rec) => records.push(rec),
                None => debug!("line {}: header or incomplete row", n + 1),
            }
        }
        Ok(records)
    }
}

fn fields(line: &str) -> Option<[String; 5]> {
    let caps = ROW_RE.captures(line)?;
    Some(std::array::from_fn(|i| normalize_ws(&caps[i + 1])))
}

fn is_separator(f: &[String; 5]) -> bool {
    f.iter().all(|c| SEPARATOR_RE.is_match(c))
}

fn build(f: &[String; 5]) -> Option<CandidateRecord> {
    if f[0].is_empty() || f[1].is_empty() {
        return None;
    }
    let min_price = parse_amount(&f[2]);
    let max_price = parse_amount(&f[3]);
    let avg_price = parse_amount(&f[4]);
    if min_price.is_none() && max_price.is_none() && avg_price.is_none() {
        return None;
    }
    Some(CandidateRecord {
        name: f[0].clone(),
        unit: f[1].clone(),
        min_price,
        max_price,
        avg_price,
    })
}
