use std::time::Duration;

use tracing::info;

use crate::aggregate::assemble;
use crate::change::{price_moves, ChangeStrategy, PriceMove};
use crate::error::PipelineError;
use crate::fallback::fallback_snapshot;
use crate::fetch::Fetcher;
use crate::model::{MarketSnapshot, RawDocument};
use crate::parser::Extractor;
use crate::resilience::{degrade, with_deadline};
use crate::settings::MarketSettings;
use crate::validate::{validate_all, Rejection, ValidationRules};

/// Everything one run produced. Only `snapshot` crosses the HTTP boundary.
pub struct MarketRun {
    pub snapshot: MarketSnapshot,
    pub moves: Vec<PriceMove>,
    pub rejected: Vec<(String, Rejection)>,
}

impl MarketRun {
    pub fn significant_moves(&self) -> impl Iterator<Item = &PriceMove> {
        self.moves.iter().filter(|m| m.significant)
    }
}

pub struct MarketPipeline {
    fetcher: Fetcher,
    extractor: Extractor,
    rules: ValidationRules,
    url: String,
    source_label: String,
    max_items: usize,
    deadline: Duration,
}

impl MarketPipeline {
    pub fn new(
        fetcher: Fetcher,
        settings: &MarketSettings,
        rules: ValidationRules,
        deadline: Duration,
    ) -> Self {
        MarketPipeline {
            fetcher,
            extractor: Extractor::default(),
            rules,
            url: settings.url.clone(),
            source_label: settings.source_label.clone(),
            max_items: settings.max_items,
            deadline,
        }
    }

    /// Fetch → extract → validate → estimate → aggregate. Never fails: any
    /// stage error or empty result yields the fallback snapshot.
    pub async fn run(&self, previous: Option<&MarketSnapshot>) -> MarketSnapshot {
        self.run_detailed(previous).await.snapshot
    }

    pub async fn run_detailed(&self, previous: Option<&MarketSnapshot>) -> MarketRun {
        let mut rejected = Vec::new();
        let live = with_deadline(self.deadline, self.live(previous, &mut rejected));
        let snapshot = degrade("market pipeline", live, |_| {
            fallback_snapshot(&self.rules.currency_symbol)
        })
        .await;

        let moves = match previous {
            Some(prev) if !prev.is_fallback() && !snapshot.is_fallback() => {
                price_moves(&snapshot.prices, prev)
            }
            _ => Vec::new(),
        };

        MarketRun {
            snapshot,
            moves,
            rejected,
        }
    }

    async fn live(
        &self,
        previous: Option<&MarketSnapshot>,
        rejected: &mut Vec<(String, Rejection)>,
    ) -> Result<MarketSnapshot, PipelineError> {
        let doc = self.fetcher.fetch(&self.url).await?;
        self.process(&doc, previous, rejected)
    }

    /// The offline half of the pipeline, for a document already in hand.
    pub fn process(
        &self,
        doc: &RawDocument,
        previous: Option<&MarketSnapshot>,
        rejected: &mut Vec<(String, Rejection)>,
    ) -> Result<MarketSnapshot, PipelineError> {
        let candidates = self.extractor.extract(doc);
        if candidates.is_empty() {
            return Err(PipelineError::ExtractionEmpty(doc.source.clone()));
        }

        let report = validate_all(&candidates, &self.rules);
        *rejected = report.rejected;
        if report.accepted.is_empty() {
            return Err(PipelineError::ValidationAllRejected(candidates.len()));
        }

        // A fallback snapshot holds estimates; diffing against it would
        // invent movement.
        let strategy = match previous {
            Some(prev) if !prev.is_fallback() => ChangeStrategy::Temporal(prev),
            _ => ChangeStrategy::Spread,
        };
        let accepted = report.accepted.len();
        let priced = strategy.apply(report.accepted);
        let snapshot = assemble(priced, self.max_items, &self.source_label);
        if snapshot.prices.is_empty() {
            return Err(PipelineError::AggregationEmpty);
        }

        info!(
            "Market snapshot (fetched {}): {} candidates, {} accepted, {} rejected, {} published",
            doc.fetched_at.format("%Y-%m-%d %H:%M:%S"),
            candidates.len(),
            accepted,
            rejected.len(),
            snapshot.item_count
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fallback::{fallback_prices, FALLBACK_SOURCE};
    use crate::validate::DEFAULT_CURRENCY;
    use crate::fetch::testing::{instant_policy, ScriptedTransport};
    use crate::model::PriceRecord;

    fn pipeline(transport: Arc<ScriptedTransport>) -> MarketPipeline {
        pipeline_with(transport, MarketSettings::default())
    }

    fn pipeline_with(transport: Arc<ScriptedTransport>, settings: MarketSettings) -> MarketPipeline {
        MarketPipeline::new(
            Fetcher::new(transport, instant_policy()),
            &settings,
            ValidationRules::default(),
            Duration::from_secs(5),
        )
    }

    fn assert_is_fallback(snap: &MarketSnapshot) {
        assert!(snap.is_fallback());
        assert_eq!(snap.source, FALLBACK_SOURCE);
        assert_eq!(snap.prices, fallback_prices(DEFAULT_CURRENCY));
        assert_eq!(snap.item_count, snap.prices.len());
    }

    #[tokio::test]
    async fn tomato_table_scenario() {
        let html = "<table><tr><td>Tomato</td><td>kg</td><td>50</td><td>60</td><td>55</td></tr></table>";
        let snap = pipeline(Arc::new(ScriptedTransport::serving(html))).run(None).await;
        assert!(!snap.is_fallback());
        assert_eq!(
            snap.prices,
            vec![PriceRecord {
                crop: "Tomato".into(),
                price: "Rs. 55/kg".into(),
                unit: "kg".into(),
                change_percent: "0%".into(),
            }]
        );
        assert_eq!(snap.item_count, 1);
    }

    #[tokio::test]
    async fn potato_pipe_scenario() {
        let snap = pipeline(Arc::new(ScriptedTransport::serving("| Potato | kg | 40 | 60 | 58 |")))
            .run(None)
            .await;
        assert_eq!(snap.prices[0].change_percent, "+16%");
        assert_eq!(snap.prices[0].price, "Rs. 58/kg");
    }

    #[tokio::test]
    async fn exhausted_fetch_falls_back() {
        let transport = Arc::new(ScriptedTransport::failing(503));
        let snap = pipeline(transport.clone()).run(None).await;
        assert_eq!(transport.calls(), 3);
        assert_is_fallback(&snap);
    }

    #[tokio::test]
    async fn fallback_follows_configured_currency() {
        let rules = ValidationRules {
            currency_symbol: "₹".into(),
            ..ValidationRules::default()
        };
        let pipeline = MarketPipeline::new(
            Fetcher::new(Arc::new(ScriptedTransport::failing(503)), instant_policy()),
            &MarketSettings::default(),
            rules,
            Duration::from_secs(5),
        );
        let snap = pipeline.run(None).await;
        assert!(snap.is_fallback());
        assert_eq!(snap.prices, fallback_prices("₹"));
        assert!(snap.prices.iter().all(|p| p.price.starts_with('₹')));
    }

    #[tokio::test]
    async fn unrecognized_documents_fall_back() {
        for body in ["", "<html><body>Down for maintenance</body></html>", "<table><tr><td>x", "{}"] {
            let snap = pipeline(Arc::new(ScriptedTransport::serving(body))).run(None).await;
            assert_is_fallback(&snap);
        }
    }

    #[tokio::test]
    async fn all_rejected_falls_back_with_reasons() {
        let html = "<table><tr><td>Download App</td><td>kg</td><td>10</td></tr>\
                    <tr><td>Tomato</td><td>kg</td><td>50</td><td>60</td><td>90</td></tr></table>";
        let run = pipeline(Arc::new(ScriptedTransport::serving(html))).run_detailed(None).await;
        assert_is_fallback(&run.snapshot);
        assert_eq!(run.rejected.len(), 2);
        assert_eq!(run.rejected[1].1, Rejection::AverageOutOfRange);
    }

    #[tokio::test]
    async fn zero_cap_falls_back() {
        let settings = MarketSettings {
            max_items: 0,
            ..MarketSettings::default()
        };
        let snap = pipeline_with(Arc::new(ScriptedTransport::serving("| Potato | kg | 40 | 60 | 58 |")), settings)
            .run(None)
            .await;
        assert_is_fallback(&snap);
    }

    #[tokio::test]
    async fn temporal_run_reports_significant_move() {
        let previous = MarketSnapshot::live(
            vec![PriceRecord {
                crop: "Tomato".into(),
                price: "Rs. 50/kg".into(),
                unit: "kg".into(),
                change_percent: "0%".into(),
            }],
            "Kalimati",
        );
        let html = "<table><tr><td>Tomato</td><td>kg</td><td>55</td><td>65</td><td>60</td></tr>\
                    <tr><td>Garlic</td><td>kg</td><td>200</td><td>220</td><td>210</td></tr></table>";
        let run = pipeline(Arc::new(ScriptedTransport::serving(html)))
            .run_detailed(Some(&previous))
            .await;
        let tomato = run.snapshot.find("Tomato").unwrap();
        assert_eq!(tomato.change_percent, "+20%");
        assert_eq!(run.snapshot.find("Garlic").unwrap().change_percent, "N/A");
        let significant: Vec<&str> = run.significant_moves().map(|m| m.crop.as_str()).collect();
        assert_eq!(significant, vec!["Tomato"]);
    }

    #[tokio::test]
    async fn fallback_history_is_ignored() {
        let previous = fallback_snapshot(DEFAULT_CURRENCY);
        let run = pipeline(Arc::new(ScriptedTransport::serving("| Potato | kg | 40 | 60 | 58 |")))
            .run_detailed(Some(&previous))
            .await;
        assert_eq!(run.snapshot.prices[0].change_percent, "+16%");
        assert!(run.moves.is_empty());
    }

    #[tokio::test]
    async fn cap_holds_for_large_documents() {
        let body: String = (0..60)
            .map(|i| format!("| Crop {:02} | kg | 10 | 20 | 15 |\n", i))
            .collect();
        let snap = pipeline(Arc::new(ScriptedTransport::serving(&body))).run(None).await;
        assert!(snap.item_count <= 15);
        assert_eq!(snap.item_count, snap.prices.len());
    }

    #[tokio::test]
    async fn kalimati_fixture_end_to_end() {
        let html = std::fs::read_to_string("tests/fixtures/kalimati.html").unwrap();
        let run = pipeline(Arc::new(ScriptedTransport::serving(&html))).run_detailed(None).await;
        let snap = run.snapshot;
        assert!(!snap.is_fallback());
        assert!(snap.item_count <= 15);
        let names: Vec<String> = snap.prices.iter().map(|p| p.crop.to_lowercase()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(snap.prices.iter().all(|p| p.unit == "kg" || p.unit == "doz" || p.unit == "pc"));
        assert!(!run.rejected.is_empty());
    }
}
