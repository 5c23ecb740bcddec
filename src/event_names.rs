//! Event-name tables: per event type, which `eventName` strings are sent and
//! how often.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::choice::WeightedChoice;
use crate::error::{GeneratorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Search,
    Click,
    Conversion,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Search => "search",
            EventKind::Click => "click",
            EventKind::Conversion => "conversion",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw `{ type: { name: weight } }` table as read from disk.
pub type EventNames = BTreeMap<String, BTreeMap<String, u64>>;

/// Compiled event-name table. Only clicks and conversions carry a name.
#[derive(Debug, Clone)]
pub struct EventNameTable {
    click: Option<WeightedChoice<String>>,
    conversion: Option<WeightedChoice<String>>,
}

impl EventNameTable {
    /// Compile the raw table. Types other than `click` and `conversion` are
    /// ignored; a present but empty (or all-zero) entry is an error.
    pub fn compile(names: &EventNames) -> Result<Self> {
        let entry = |kind: EventKind| -> Result<Option<WeightedChoice<String>>> {
            match names.get(kind.as_str()) {
                None => Ok(None),
                Some(values) if values.is_empty() => Ok(None),
                Some(values) => WeightedChoice::new(
                    &format!("event names for '{}'", kind),
                    values.iter().map(|(name, w)| (name.clone(), *w)),
                )
                .map(Some),
            }
        };
        Ok(Self {
            click: entry(EventKind::Click)?,
            conversion: entry(EventKind::Conversion)?,
        })
    }

    fn slot(&self, kind: EventKind) -> Option<&WeightedChoice<String>> {
        match kind {
            EventKind::Search => None,
            EventKind::Click => self.click.as_ref(),
            EventKind::Conversion => self.conversion.as_ref(),
        }
    }

    pub fn has(&self, kind: EventKind) -> bool {
        self.slot(kind).is_some()
    }

    /// Fails up front when a type the run can emit has no names.
    pub fn require_all(&self) -> Result<()> {
        for kind in [EventKind::Click, EventKind::Conversion] {
            if !self.has(kind) {
                return Err(GeneratorError::MissingEventNames(kind.to_string()));
            }
        }
        Ok(())
    }

    pub fn pick<R: Rng + ?Sized>(&self, kind: EventKind, rng: &mut R) -> Result<&str> {
        self.slot(kind)
            .map(|choice| choice.pick(rng).as_str())
            .ok_or_else(|| GeneratorError::MissingEventNames(kind.to_string()))
    }
}

impl Default for EventNameTable {
    /// `click → "click"`, `conversion → "conversion"`.
    fn default() -> Self {
        let single = |name: &str| WeightedChoice::new(name, [(name.to_string(), 1)]).ok();
        Self {
            click: single("click"),
            conversion: single("conversion"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table(json: &str) -> Result<EventNameTable> {
        let raw: EventNames = serde_json::from_str(json).unwrap();
        EventNameTable::compile(&raw)
    }

    #[test]
    fn default_table_names_events_after_their_type() {
        let names = EventNameTable::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(names.pick(EventKind::Click, &mut rng).unwrap(), "click");
        assert_eq!(
            names.pick(EventKind::Conversion, &mut rng).unwrap(),
            "conversion"
        );
        assert!(names.require_all().is_ok());
    }

    #[test]
    fn missing_type_is_reported_on_pick() {
        let names = table(r#"{"click": {"Product Clicked": 1}}"#).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let err = names.pick(EventKind::Conversion, &mut rng).unwrap_err();
        assert!(matches!(err, GeneratorError::MissingEventNames(ref t) if t == "conversion"));
    }

    #[test]
    fn require_all_names_the_missing_type() {
        let names = table(r#"{"conversion": {"Order Placed": 1}, "click": {}}"#).unwrap();
        let err = names.require_all().unwrap_err();
        assert!(err.to_string().contains("click"), "{}", err);
    }

    #[test]
    fn search_has_no_names() {
        let names = EventNameTable::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(names.pick(EventKind::Search, &mut rng).is_err());
    }

    #[test]
    fn all_zero_weights_fail_to_compile() {
        assert!(table(r#"{"click": {"a": 0, "b": 0}}"#).is_err());
    }

    #[test]
    fn unknown_types_are_ignored() {
        let names = table(r#"{"view": {"Viewed": 1}, "click": {"c": 1}, "conversion": {"v": 1}}"#)
            .unwrap();
        assert!(names.require_all().is_ok());
    }

    #[test]
    fn pick_follows_weights() {
        let names = table(r#"{"click": {"never": 0, "always": 3}}"#).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            assert_eq!(names.pick(EventKind::Click, &mut rng).unwrap(), "always");
        }
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&EventKind::Conversion).unwrap(), "\"conversion\"");
        assert_eq!(EventKind::Click.to_string(), "click");
    }
}
