//! Search terms, their per-term overrides and the facet filters they may apply.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::choice::WeightedChoice;
use crate::error::Result;

/// Weight of the first (most popular) term; each following term gets one
/// less, down to 1.
const TOP_TERM_WEIGHT: u64 = 20;

/// Facet name → facet value → weight.
///
/// Ordered maps, so facets are always visited (and joined) by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec(pub BTreeMap<String, BTreeMap<String, u64>>);

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build the per-facet choice sets. `None` when no facet is configured.
    pub fn compile(&self) -> Result<Option<FilterSampler>> {
        if self.0.is_empty() {
            return Ok(None);
        }
        let facets = self
            .0
            .iter()
            .map(|(facet, values)| {
                WeightedChoice::new(
                    &format!("filter facet '{}'", facet),
                    values
                        .iter()
                        .map(|(value, w)| (format!("{}:\"{}\"", facet, value), *w)),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(FilterSampler { facets }))
    }
}

/// Compiled [`FilterSpec`]: one weighted choice per facet, in facet-name order.
#[derive(Debug, Clone)]
pub struct FilterSampler {
    facets: Vec<WeightedChoice<String>>,
}

impl FilterSampler {
    /// Draw one value per facet and join them with `AND`,
    /// e.g. `brand:"Apple" AND color:"red"`.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        self.facets
            .iter()
            .map(|facet| facet.pick(rng).as_str())
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// A query the simulator can issue, with optional per-term behavior overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchTerm {
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_through_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_position: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    #[serde(default, skip_serializing_if = "FilterSpec::is_empty")]
    pub filters: FilterSpec,
    #[serde(default)]
    pub no_results: bool,
}

impl SearchTerm {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Default::default()
        }
    }

    pub fn pick_synonym<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.synonyms.choose(rng).map(String::as_str)
    }
}

/// A term of the global pool together with its compiled filters.
#[derive(Debug, Clone)]
pub struct PooledTerm {
    pub term: Arc<SearchTerm>,
    pub filters: Option<FilterSampler>,
}

/// The global weighted pool of search terms.
///
/// Terms are weighted by their position in the input (popular terms first):
/// 20 for the first, decreasing by one per term down to 1. Terms flagged
/// `no_results` always get weight 1.
#[derive(Debug, Clone)]
pub struct SearchTermPool {
    choice: WeightedChoice<PooledTerm>,
}

impl SearchTermPool {
    pub fn new(terms: Vec<SearchTerm>) -> Result<Self> {
        let mut weight = TOP_TERM_WEIGHT;
        let mut pairs = Vec::with_capacity(terms.len());
        for term in terms {
            let w = if term.no_results { 1 } else { weight };
            let filters = term.filters.compile()?;
            pairs.push((
                PooledTerm {
                    term: Arc::new(term),
                    filters,
                },
                w,
            ));
            if weight > 1 {
                weight -= 1;
            }
        }
        Ok(Self {
            choice: WeightedChoice::new("search terms", pairs)?,
        })
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &PooledTerm {
        self.choice.pick(rng)
    }

    pub fn terms(&self) -> impl Iterator<Item = &SearchTerm> {
        self.choice.items().iter().map(|p| p.term.as_ref())
    }

    pub fn weight_of(&self, term: &str) -> Option<u64> {
        self.choice
            .items()
            .iter()
            .position(|p| p.term.term == term)
            .and_then(|i| self.choice.weight(i))
    }

    pub fn len(&self) -> usize {
        self.choice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choice.is_empty()
    }
}
