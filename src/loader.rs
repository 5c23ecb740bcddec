//! JSON loaders for the run inputs.
//!
//! Every loader reads the whole file and fails with `Io`/`Json` errors that
//! abort the run before any traffic is generated.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{GeneratorError, Result};
use crate::event_names::{EventNameTable, EventNames};
use crate::recommend::RecommendConfig;
use crate::tags::TagsCollection;
use crate::terms::{SearchTerm, SearchTermPool};
use crate::user::{PersonaSpec, VirtualUser};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path)
        .map_err(|e| GeneratorError::Io(format!("{}: {}", path.display(), e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| GeneratorError::Json(format!("{}: {}", path.display(), e)))
}

/// Array of search terms, most popular first.
pub fn load_search_terms(path: &Path) -> Result<SearchTermPool> {
    let terms: Vec<SearchTerm> = read_json(path)?;
    tracing::info!("[loader] Loaded {} search terms from {}", terms.len(), path.display());
    SearchTermPool::new(terms)
}

/// `{ collection: { value: weight } }`.
pub fn load_tags(path: &Path) -> Result<Vec<TagsCollection>> {
    let map: BTreeMap<String, BTreeMap<String, u64>> = read_json(path)?;
    TagsCollection::from_map(map)
}

/// `{ "click": { name: weight }, "conversion": { name: weight } }`.
/// Without a file, events are named after their type.
pub fn load_event_names(path: Option<&Path>) -> Result<EventNameTable> {
    match path {
        Some(path) => {
            let names: EventNames = read_json(path)?;
            EventNameTable::compile(&names)
        }
        None => Ok(EventNameTable::default()),
    }
}

pub fn load_personas(path: &Path) -> Result<Vec<VirtualUser>> {
    let specs: Vec<PersonaSpec> = read_json(path)?;
    tracing::info!("[loader] Loaded {} personas from {}", specs.len(), path.display());
    specs.into_iter().map(PersonaSpec::into_user).collect()
}

/// `{ "FacetName": ..., "FBT": { category: [category, ...] } }`; snake_case keys work too.
pub fn load_recommend_config(path: &Path) -> Result<RecommendConfig> {
    let config: RecommendConfig = read_json(path)?;
    config.validate()?;
    tracing::info!(
        "[loader] Recommend facet '{}' with {} FBT categories",
        config.facet_name,
        config.fbt.len()
    );
    Ok(config)
}
