use serde::Serialize;

use crate::change::price_move;
use crate::model::{MarketSnapshot, WeatherSnapshot};

/// Only the head of the list is scanned; it's what the dashboard shows first.
pub const ALERT_SCAN_LIMIT: usize = 5;
const NAMED_MOVES: usize = 2;
const WEATHER_TRIGGERS: &[&str] = &["rain", "storm", "thunder", "heavy"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub require_interaction: bool,
}

/// Significant moves among the first few current prices, or `None` when
/// there is nothing to compare against.
pub fn market_alert(current: &MarketSnapshot, previous: Option<&MarketSnapshot>) -> Option<Alert> {
    let previous = previous.filter(|p| !p.is_fallback() && !p.prices.is_empty())?;
    if current.is_fallback() {
        return None;
    }

    let lines: Vec<String> = current
        .prices
        .iter()
        .take(ALERT_SCAN_LIMIT)
        .filter_map(|p| price_move(p, previous))
        .filter(|m| m.significant)
        .map(|m| {
            let direction = if m.current > m.previous { "increased" } else { "decreased" };
            format!("{} {} by {}%", m.crop, direction, m.percent.abs().round() as i64)
        })
        .collect();
    if lines.is_empty() {
        return None;
    }

    let mut body = format!("Price changes: {}", lines[..lines.len().min(NAMED_MOVES)].join(", "));
    if lines.len() > NAMED_MOVES {
        body.push_str(&format!(" and {} more", lines.len() - NAMED_MOVES));
    }
    Some(Alert {
        title: "Market Price Update".to_string(),
        body,
        require_interaction: false,
    })
}

pub fn weather_alert(snapshot: &WeatherSnapshot, location: &str) -> Option<Alert> {
    let condition = snapshot.condition.to_lowercase();
    let description = snapshot.description.to_lowercase();
    let triggered = WEATHER_TRIGGERS
        .iter()
        .any(|t| condition.contains(t) || description.contains(t));
    if !triggered {
        return None;
    }
    Some(Alert {
        title: format!("Weather Alert - {}", location),
        body: format!(
            "{}: {}. Plan your farming activities accordingly.",
            snapshot.condition, snapshot.description
        ),
        require_interaction: true,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::fallback::fallback_snapshot;
    use crate::model::PriceRecord;
    use crate::validate::DEFAULT_CURRENCY;

    fn snap(rows: &[(&str, &str)]) -> MarketSnapshot {
        let prices = rows
            .iter()
            .map(|(crop, price)| PriceRecord {
                crop: crop.to_string(),
                price: price.to_string(),
                unit: "kg".into(),
                change_percent: "0%".into(),
            })
            .collect();
        MarketSnapshot::live(prices, "Kalimati")
    }

    fn weather(condition: &str, description: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            location: "Kathmandu, Nepal".into(),
            temperature: 22,
            humidity: 60,
            wind_speed: 8,
            condition: condition.into(),
            description: description.into(),
            advisory: String::new(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn names_two_moves_then_counts_the_rest() {
        let previous = snap(&[("Beans", "Rs. 100/kg"), ("Carrot", "Rs. 50/kg"), ("Ginger", "Rs. 200/kg"), ("Onion", "Rs. 80/kg")]);
        let current = snap(&[("Beans", "Rs. 120/kg"), ("Carrot", "Rs. 40/kg"), ("Ginger", "Rs. 150/kg"), ("Onion", "Rs. 82/kg")]);
        let alert = market_alert(&current, Some(&previous)).unwrap();
        assert_eq!(alert.title, "Market Price Update");
        assert_eq!(
            alert.body,
            "Price changes: Beans increased by 20%, Carrot decreased by 20% and 1 more"
        );
        assert!(!alert.require_interaction);
    }

    #[test]
    fn only_first_five_are_scanned() {
        let rows: Vec<(String, String)> = (0..6).map(|i| (format!("Crop {}", i), "Rs. 100/kg".to_string())).collect();
        let prev_rows: Vec<(&str, &str)> = rows.iter().map(|(c, p)| (c.as_str(), p.as_str())).collect();
        let previous = snap(&prev_rows);
        let mut cur_rows = prev_rows.clone();
        cur_rows[5].1 = "Rs. 200/kg";
        assert!(market_alert(&snap(&cur_rows), Some(&previous)).is_none());
    }

    #[test]
    fn exactly_ten_percent_is_quiet() {
        let previous = snap(&[("Tomato", "Rs. 50/kg")]);
        let current = snap(&[("Tomato", "Rs. 55/kg")]);
        assert!(market_alert(&current, Some(&previous)).is_none());
    }

    #[test]
    fn no_history_or_fallback_history_is_quiet() {
        let current = snap(&[("Tomato", "Rs. 90/kg")]);
        assert!(market_alert(&current, None).is_none());
        assert!(market_alert(&current, Some(&fallback_snapshot(DEFAULT_CURRENCY))).is_none());
        assert!(market_alert(&fallback_snapshot(DEFAULT_CURRENCY), Some(&current)).is_none());
    }

    #[test]
    fn weather_triggers_on_condition_or_description() {
        let alert = weather_alert(&weather("Rain", "light rain"), "Pokhara").unwrap();
        assert_eq!(alert.title, "Weather Alert - Pokhara");
        assert_eq!(alert.body, "Rain: light rain. Plan your farming activities accordingly.");
        assert!(alert.require_interaction);

        assert!(weather_alert(&weather("Clouds", "heavy clouds"), "Pokhara").is_some());
        assert!(weather_alert(&weather("Thunderstorm", ""), "Pokhara").is_some());
        assert!(weather_alert(&weather("Clear", "clear sky"), "Pokhara").is_none());
    }
}
