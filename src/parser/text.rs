use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:nrs|rs|रु)\.?|₹)?\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*/?-?$").unwrap()
});

/// Cell markup → plain text: tags stripped, entities decoded, whitespace collapsed.
pub fn clean_cell(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, " ");
    normalize_ws(&decode_entities(&stripped))
}

pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Devanagari digits (०-९) → ASCII. The market site publishes in both scripts.
pub fn to_ascii_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{0966}'..='\u{096F}' => {
                char::from_digit(c as u32 - 0x0966, 10).unwrap_or(c)
            }
            _ => c,
        })
        .collect()
}

/// Parse a price cell such as `55`, `Rs 1,200`, `रु ६०` or `₹42.50`.
pub fn parse_amount(cell: &str) -> Option<f64> {
    let ascii = to_ascii_digits(cell.trim());
    let caps = AMOUNT_RE.captures(&ascii)?;
    caps[1].replace(',', "").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_cell_strips_markup_and_entities() {
        assert_eq!(clean_cell("<b>Tomato&nbsp;Big</b>\n  (Nepali)"), "Tomato Big (Nepali)");
        assert_eq!(clean_cell("<span class=\"x\">Salt &amp; Pepper</span>"), "Salt & Pepper");
        assert_eq!(clean_cell("&nbsp;"), "");
    }

    #[test]
    fn amounts_with_currency_and_separators() {
        assert_eq!(parse_amount("55"), Some(55.0));
        assert_eq!(parse_amount("Rs 1,200"), Some(1200.0));
        assert_eq!(parse_amount("Rs. 60"), Some(60.0));
        assert_eq!(parse_amount("NRs 42.50"), Some(42.5));
        assert_eq!(parse_amount("₹75"), Some(75.0));
        assert_eq!(parse_amount("रु ६०"), Some(60.0));
    }

    #[test]
    fn non_amounts() {
        assert_eq!(parse_amount("Minimum"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("---"), None);
        assert_eq!(parse_amount("50-60"), None);
    }
}
