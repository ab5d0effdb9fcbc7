pub mod html;
pub mod pipe;
pub mod text;

use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

use crate::model::{CandidateRecord, RawDocument};
use html::HtmlTableParser;
use pipe::PipeTableParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    HtmlTable,
    PipeTable,
    Unknown,
}

impl fmt::Display for DocumentShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentShape::HtmlTable => "html-table",
            DocumentShape::PipeTable => "pipe-table",
            DocumentShape::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("<table> opened but never closed")]
    UnterminatedTable,
}

/// One upstream layout. Registered with an [`Extractor`], which asks each
/// parser in order whether it recognizes the document.
pub trait ShapeParser: Send + Sync {
    fn shape(&self) -> DocumentShape;
    fn probe(&self, body: &str) -> bool;
    fn parse(&self, body: &str) -> Result<Vec<CandidateRecord>, ExtractError>;
}

pub struct Extractor {
    parsers: Vec<Box<dyn ShapeParser>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Extractor::with_parsers(vec![Box::new(HtmlTableParser), Box::new(PipeTableParser)])
    }
}

impl Extractor {
    pub fn with_parsers(parsers: Vec<Box<dyn ShapeParser>>) -> Self {
        Extractor { parsers }
    }

    pub fn probe(&self, body: &str) -> DocumentShape {
        self.select(body)
            .map(|p| p.shape())
            .unwrap_or(DocumentShape::Unknown)
    }

    fn select(&self, body: &str) -> Option<&dyn ShapeParser> {
        self.parsers
            .iter()
            .find(|p| p.probe(body))
            .map(|p| p.as_ref())
    }

    /// Candidate rows from a document. Never fails; anything unparseable
    /// comes back empty.
    pub fn extract(&self, doc: &RawDocument) -> Vec<CandidateRecord> {
        let Some(parser) = self.select(&doc.body) else {
            warn!("Unrecognized document shape from {}", doc.source);
            return Vec::new();
        };

        match parser.parse(&doc.body) {
            Ok(rows) => {
                info!("Extracted {} candidate rows ({}) from {}", rows.len(), parser.shape(), doc.source);
                rows
            }
            Err(e) => {
                warn!("Extraction failed ({}) for {}: {}", parser.shape(), doc.source, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> RawDocument {
        RawDocument::new("test", body)
    }

    #[test]
    fn probe_picks_shape() {
        let ex = Extractor::default();
        assert_eq!(ex.probe("<html><table></table></html>"), DocumentShape::HtmlTable);
        assert_eq!(ex.probe("| Potato | kg | 40 | 60 | 58 |"), DocumentShape::PipeTable);
        assert_eq!(ex.probe("<html><body>maintenance</body></html>"), DocumentShape::Unknown);
        assert_eq!(ex.probe(""), DocumentShape::Unknown);
    }

    #[test]
    fn html_wins_when_both_shapes_present() {
        let body = "<table><tr><td>Tomato</td><td>kg</td><td>50</td></tr></table>\n| Potato | kg | 40 | 60 | 58 |";
        let rows = Extractor::default().extract(&doc(body));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Tomato");
    }

    #[test]
    fn malformed_documents_yield_nothing() {
        let ex = Extractor::default();
        for body in [
            "",
            "not a document",
            "<table><tr><td>Tomato",
            "{\"prices\": []}",
            "<div>| broken | row |</div>",
        ] {
            assert!(ex.extract(&doc(body)).is_empty(), "{body:?}");
        }
    }

    #[test]
    fn custom_registry_order() {
        let ex = Extractor::with_parsers(vec![Box::new(PipeTableParser)]);
        assert_eq!(ex.probe("<table></table>"), DocumentShape::Unknown);
    }
}
