//! The two backends a simulation talks to: a search service and an event sink.

use std::future::Future;

use crate::error::Result;
use crate::events::Event;

/// Per-request search parameters derived from the virtual user and the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub analytics_enabled: bool,
    pub click_analytics: bool,
    pub user_token: Option<String>,
    pub tags: Vec<String>,
    pub page_size: u32,
    pub filters: Option<String>,
    /// Ask the backend to report which experiment variant served the query.
    pub include_variant_info: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub result_ids: Vec<String>,
    pub query_id: String,
    pub experiment_variant: Option<u32>,
}

pub trait SearchService: Send + Sync + 'static {
    fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> impl Future<Output = Result<SearchResponse>> + Send;
}

pub trait EventSink: Send + Sync {
    /// Deliver one batch. Implementations either accept the whole batch or fail.
    fn send_batch(&self, events: &[Event]) -> impl Future<Output = Result<()>> + Send;
}
