use insights_generator::{
    Event, EventNameTable, EventSink, GeneratorError, Result, RunConfig, RunSettings,
    SearchOptions, SearchResponse, SearchService, SearchTerm, SearchTermPool, TagsCollection,
    VirtualUser,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Search backend answering from a fixed query → object IDs table.
/// Unknown queries return no hits.
#[derive(Default)]
pub struct InMemorySearch {
    results: HashMap<String, Vec<String>>,
    failing: HashMap<String, GeneratorError>,
    variant: Option<u32>,
    calls: AtomicUsize,
    options: Mutex<Vec<SearchOptions>>,
}

#[allow(dead_code)]
impl InMemorySearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: &str, ids: &[&str]) -> Self {
        self.results
            .insert(query.to_string(), ids.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn failing(mut self, query: &str, err: GeneratorError) -> Self {
        self.failing.insert(query.to_string(), err);
        self
    }

    pub fn served_by(mut self, variant: u32) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn options(&self) -> Vec<SearchOptions> {
        self.options.lock().unwrap().clone()
    }
}

impl SearchService for InMemorySearch {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.options.lock().unwrap().push(options.clone());
        if let Some(err) = self.failing.get(query) {
            return Err(err.clone());
        }
        let mut ids = self.results.get(query).cloned().unwrap_or_default();
        ids.truncate(options.page_size as usize);
        Ok(SearchResponse {
            result_ids: ids,
            query_id: format!("qid-{}", n),
            experiment_variant: self.variant,
        })
    }
}

/// Keeps every batch it is handed.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<Event>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn batches(&self) -> Vec<Vec<Event>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }
}

impl EventSink for RecordingSink {
    async fn send_batch(&self, events: &[Event]) -> Result<()> {
        self.batches.lock().unwrap().push(events.to_vec());
        Ok(())
    }
}

#[allow(dead_code)]
pub fn settings(users: usize, searches_per_user: usize) -> RunSettings {
    RunSettings {
        index_name: "products".to_string(),
        number_of_users: users,
        searches_per_user,
        turn_delay: Duration::ZERO,
        workers: 8,
        seed: Some(7),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn config(settings: RunSettings, terms: Vec<SearchTerm>) -> RunConfig {
    config_with_personas(settings, terms, Vec::new())
}

#[allow(dead_code)]
pub fn config_with_personas(
    settings: RunSettings,
    terms: Vec<SearchTerm>,
    personas: Vec<VirtualUser>,
) -> RunConfig {
    let tags = TagsCollection::from_map(
        [(
            "platform".to_string(),
            [("mobile".to_string(), 3u64), ("desktop".to_string(), 1)]
                .into_iter()
                .collect(),
        )]
        .into_iter()
        .collect(),
    )
    .unwrap();
    RunConfig::new(
        settings,
        SearchTermPool::new(terms).unwrap(),
        tags,
        EventNameTable::default(),
        personas,
    )
    .unwrap()
}
