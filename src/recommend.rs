//! Historical events for training recommendation models.
//!
//! Every catalog record gets clicks from users browsing its category (related
//! items) and conversions, some of which come with a purchase from a category
//! frequently bought together with it. Timestamps are spread uniformly over a
//! trailing history window. Both event sets are written as CSV files that can
//! be imported into the Insights backend.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GeneratorError, Result};
use crate::event_names::EventKind;

pub const SIMILAR_EVENTS_FILE: &str = "events-similar.csv";
pub const FBT_EVENTS_FILE: &str = "events-fbt.csv";

const CSV_HEADER: [&str; 5] = ["userToken", "timestamp", "objectID", "eventType", "eventName"];
const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Contents of the recommend configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    /// Record attribute holding the category.
    #[serde(alias = "FacetName")]
    pub facet_name: String,
    /// Category → categories frequently bought together with it.
    #[serde(alias = "FBT")]
    pub fbt: BTreeMap<String, Vec<String>>,
}

impl RecommendConfig {
    pub fn validate(&self) -> Result<()> {
        if self.facet_name.trim().is_empty() {
            return Err(GeneratorError::Config(
                "recommend config needs a facet name".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendSettings {
    pub clicks_per_object: usize,
    pub conversions_per_object: usize,
    pub history_days: u32,
}

impl Default for RecommendSettings {
    fn default() -> Self {
        Self {
            clicks_per_object: 15,
            conversions_per_object: 50,
            history_days: 90,
        }
    }
}

impl RecommendSettings {
    pub fn validate(&self) -> Result<()> {
        if self.history_days == 0 {
            return Err(GeneratorError::Config("history_days must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub object_id: String,
    pub category: String,
}

impl CatalogRecord {
    /// `None` when the record has no `objectID` or no string category.
    /// Array-valued facets (category paths) use their deepest entry.
    pub fn from_json(record: &serde_json::Value, facet_name: &str) -> Option<Self> {
        let object_id = record.get("objectID")?.as_str()?;
        let category = match record.get(facet_name)? {
            serde_json::Value::Array(path) => path.last()?.as_str()?,
            value => value.as_str()?,
        };
        Some(Self {
            object_id: object_id.to_string(),
            category: category.to_string(),
        })
    }
}

/// Browsed records grouped by category.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<CatalogRecord>,
    by_category: BTreeMap<String, Vec<usize>>,
}

impl Catalog {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        let mut by_category: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, record) in records.iter().enumerate() {
            by_category.entry(record.category.clone()).or_default().push(i);
        }
        Self {
            records,
            by_category,
        }
    }

    /// Records without an object ID or category are skipped.
    pub fn from_json(records: &[serde_json::Value], facet_name: &str) -> Self {
        let parsed: Vec<CatalogRecord> = records
            .iter()
            .filter_map(|r| CatalogRecord::from_json(r, facet_name))
            .collect();
        let skipped = records.len() - parsed.len();
        if skipped > 0 {
            tracing::warn!(
                "[recommend] Skipped {} records without objectID or '{}'",
                skipped,
                facet_name
            );
        }
        Self::new(parsed)
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn category_size(&self, category: &str) -> usize {
        self.by_category.get(category).map_or(0, Vec::len)
    }

    pub fn random_in<R: Rng + ?Sized>(&self, category: &str, rng: &mut R) -> Option<&str> {
        let i = *self.by_category.get(category)?.choose(rng)?;
        Some(&self.records[i].object_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendEvent {
    pub user_token: String,
    pub timestamp: DateTime<Utc>,
    pub object_id: String,
    pub event_type: EventKind,
    pub event_name: String,
}

impl RecommendEvent {
    fn new(kind: EventKind, user_token: &str, object_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_token: user_token.to_string(),
            timestamp,
            object_id: object_id.to_string(),
            event_type: kind,
            event_name: kind.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendEvents {
    /// Clicks shared between records of the same category.
    pub similar: Vec<RecommendEvent>,
    /// Conversions, each optionally followed by same-user purchases from
    /// frequently-bought-together categories.
    pub fbt: Vec<RecommendEvent>,
}

fn random_token<R: Rng + ?Sized>(rng: &mut R) -> String {
    uuid::Builder::from_random_bytes(rng.gen()).into_uuid().to_string()
}

/// Uniform second-precision instant in `[start, end)`.
fn random_timestamp<R: Rng + ?Sized>(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    rng: &mut R,
) -> DateTime<Utc> {
    let (lo, hi) = (start.timestamp(), end.timestamp());
    if hi <= lo {
        return end;
    }
    Utc.timestamp_opt(rng.gen_range(lo..hi), 0)
        .single()
        .unwrap_or(end)
}

/// Build both event sets for `catalog`.
///
/// Each category gets one browsing user per record it holds; every click on
/// a record comes from one of them. Every conversion has a fresh user, who
/// also buys one random record from each FBT category of the converted
/// record (empty FBT categories are skipped).
pub fn generate<R: Rng + ?Sized>(
    catalog: &Catalog,
    config: &RecommendConfig,
    settings: &RecommendSettings,
    now: DateTime<Utc>,
    rng: &mut R,
) -> RecommendEvents {
    let start = now - chrono::Duration::days(i64::from(settings.history_days));

    let browsers: BTreeMap<&str, Vec<String>> = catalog
        .by_category
        .iter()
        .map(|(category, members)| {
            let tokens = members.iter().map(|_| random_token(rng)).collect();
            (category.as_str(), tokens)
        })
        .collect();

    let mut events = RecommendEvents {
        similar: Vec::with_capacity(catalog.len() * settings.clicks_per_object),
        fbt: Vec::with_capacity(catalog.len() * settings.conversions_per_object),
    };
    let no_fbt = Vec::new();

    for record in catalog.records() {
        if let Some(tokens) = browsers.get(record.category.as_str()) {
            for _ in 0..settings.clicks_per_object {
                if let Some(token) = tokens.choose(rng) {
                    let ts = random_timestamp(start, now, rng);
                    events
                        .similar
                        .push(RecommendEvent::new(EventKind::Click, token, &record.object_id, ts));
                }
            }
        }

        let together = config.fbt.get(&record.category).unwrap_or(&no_fbt);
        for _ in 0..settings.conversions_per_object {
            let token = random_token(rng);
            let ts = random_timestamp(start, now, rng);
            events
                .fbt
                .push(RecommendEvent::new(EventKind::Conversion, &token, &record.object_id, ts));
            for category in together {
                let Some(object_id) = catalog.random_in(category, rng) else {
                    continue;
                };
                let ts = random_timestamp(start, now, rng);
                events
                    .fbt
                    .push(RecommendEvent::new(EventKind::Conversion, &token, object_id, ts));
            }
        }
    }

    tracing::info!(
        "[recommend] Generated {} clicks and {} conversions for {} records",
        events.similar.len(),
        events.fbt.len(),
        catalog.len()
    );
    events
}

/// Write `events` as CSV with a `userToken,timestamp,objectID,eventType,eventName` header.
pub fn write_csv<W: io::Write>(writer: W, events: &[RecommendEvent]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER).map_err(csv_error)?;
    for e in events {
        let timestamp = e.timestamp.format(CSV_TIMESTAMP_FORMAT).to_string();
        csv.write_record([
            e.user_token.as_str(),
            timestamp.as_str(),
            e.object_id.as_str(),
            e.event_type.as_str(),
            e.event_name.as_str(),
        ])
        .map_err(csv_error)?;
    }
    csv.flush()?;
    Ok(())
}

fn csv_error(e: csv::Error) -> GeneratorError {
    GeneratorError::Io(format!("CSV write failed: {}", e))
}

/// Write both event sets into `dir`. Returns the similar and FBT file paths.
pub fn write_files(dir: &Path, events: &RecommendEvents) -> Result<(PathBuf, PathBuf)> {
    let similar = dir.join(SIMILAR_EVENTS_FILE);
    let fbt = dir.join(FBT_EVENTS_FILE);
    for (path, set) in [(&similar, &events.similar), (&fbt, &events.fbt)] {
        let file = std::fs::File::create(path)
            .map_err(|e| GeneratorError::Io(format!("{}: {}", path.display(), e)))?;
        write_csv(io::BufWriter::new(file), set)?;
        tracing::info!("[recommend] Wrote {} events to {}", set.len(), path.display());
    }
    Ok((similar, fbt))
}
