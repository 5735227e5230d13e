use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

fn date_label_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").ok())
        .as_ref()
}

/// Parse a trading-day label (YYYY-MM-DD)
pub fn parse_date_label(label: &str) -> anyhow::Result<NaiveDate> {
    let trimmed = label.trim();
    if !date_label_regex().map_or(true, |re| re.is_match(trimmed)) {
        anyhow::bail!("Date label {:?} is not YYYY-MM-DD", label);
    }
    Ok(NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")?)
}

/// Column order of a sequence of labels. `None` when the labels are not
/// strictly monotonic (or fail to parse).
pub fn detect_order(labels: &[String]) -> Option<DateOrder> {
    let parsed: Vec<NaiveDate> = labels
        .iter()
        .map(|l| parse_date_label(l))
        .collect::<anyhow::Result<_>>()
        .ok()?;

    if parsed.len() < 2 {
        return Some(DateOrder::Descending);
    }
    if parsed.windows(2).all(|w| w[0] < w[1]) {
        Some(DateOrder::Ascending)
    } else if parsed.windows(2).all(|w| w[0] > w[1]) {
        Some(DateOrder::Descending)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    Ascending,
    Descending,
}
