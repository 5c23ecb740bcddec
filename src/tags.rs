//! Weighted analytics-tag collections.

use std::collections::BTreeMap;

use rand::Rng;

use crate::choice::WeightedChoice;
use crate::error::Result;

/// A named set of tag values. Every virtual user draws exactly one value
/// from each collection.
#[derive(Debug, Clone)]
pub struct TagsCollection {
    name: String,
    values: WeightedChoice<String>,
}

impl TagsCollection {
    pub fn new(name: impl Into<String>, values: BTreeMap<String, u64>) -> Result<Self> {
        let name = name.into();
        let values = WeightedChoice::new(&format!("tag collection '{}'", name), values)?;
        Ok(Self { name, values })
    }

    /// One collection per top-level key, in name order.
    pub fn from_map(map: BTreeMap<String, BTreeMap<String, u64>>) -> Result<Vec<Self>> {
        map.into_iter()
            .map(|(name, values)| Self::new(name, values))
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.values.pick(rng)
    }
}

/// Draw one value from every collection.
pub fn draw_tags<R: Rng + ?Sized>(collections: &[TagsCollection], rng: &mut R) -> Vec<String> {
    collections
        .iter()
        .map(|c| c.pick(rng).to_string())
        .collect()
}
