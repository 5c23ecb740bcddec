use std::collections::HashSet;

use serde::Serialize;

use crate::error::{GeneratorError, Result};
use crate::event_names::EventKind;
use crate::events::Event;

/// Label of the row that aggregates every term.
pub const ALL_TERMS: &str = "ALL";

// ── Result Struct ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsPerTerm {
    pub term: String,
    pub total_events: usize,
    pub total_searches: usize,
    pub total_clicks: usize,
    pub total_conversions: usize,
    pub mean_click_position: f64,
    pub median_click_position: f64,
    /// Clicks per 100 searches. Not clamped here, but a turn emits at most
    /// one click so runs from the pipeline stay at or below 100.
    pub click_through_rate_percent: f64,
    pub conversion_rate_percent: f64,
}

impl StatsPerTerm {
    fn from_events<'a, I>(term: &str, events: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut total_events = 0;
        let mut total_searches = 0;
        let mut total_conversions = 0;
        let mut positions = Vec::new();

        for event in events {
            total_events += 1;
            match event.kind() {
                EventKind::Search => total_searches += 1,
                EventKind::Conversion => total_conversions += 1,
                EventKind::Click => {
                    let position = event.click_position().unwrap_or(0);
                    if position == 0 {
                        return Err(GeneratorError::Statistics(format!(
                            "click on '{}' (query {}) has no 1-based position",
                            event.term(),
                            event.query_id()
                        )));
                    }
                    positions.push(f64::from(position));
                }
            }
        }

        let total_clicks = positions.len();
        Ok(Self {
            term: term.to_string(),
            total_events,
            total_searches,
            total_clicks,
            total_conversions,
            mean_click_position: mean(&positions),
            median_click_position: median(&mut positions),
            click_through_rate_percent: percent(total_clicks, total_searches),
            conversion_rate_percent: percent(total_conversions, total_searches),
        })
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Midpoint of the two central values for even lengths, 0.0 for an empty slice.
/// Sorts `values` in place.
pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

// ── Aggregation ─────────────────────────────────────────────────────

/// One "ALL" row plus one row per distinct configured term, ordered by total
/// event count ascending. Ties keep "ALL" first, then configuration order.
pub fn compute_stats<'a, T>(events: &[Event], terms: T) -> Result<Vec<StatsPerTerm>>
where
    T: IntoIterator<Item = &'a str>,
{
    let mut rows = vec![StatsPerTerm::from_events(ALL_TERMS, events)?];
    let mut seen = HashSet::new();
    for term in terms {
        if !seen.insert(term) {
            continue;
        }
        let row = StatsPerTerm::from_events(term, events.iter().filter(|e| e.term() == term))?;
        rows.push(row);
    }
    rows.sort_by_key(|r| r.total_events);
    Ok(rows)
}
