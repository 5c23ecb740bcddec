//! HTTP transports for an Algolia-compatible backend: a [`HttpSearchClient`]
//! for queries and a [`HttpInsightsSink`] for click and conversion events.

pub mod credentials;
pub mod insights;
pub mod search;

pub use credentials::AlgoliaCredentials;
pub use insights::HttpInsightsSink;
pub use search::HttpSearchClient;

use std::time::Duration;

use insights_generator::{GeneratorError, Result};

/// Request timeout for both clients unless configured otherwise.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_client(
    credentials: &AlgoliaCredentials,
    timeout: Duration,
) -> Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    for (name, value) in [
        ("x-algolia-application-id", credentials.app_id.as_str()),
        ("x-algolia-api-key", credentials.api_key.as_str()),
    ] {
        let value = reqwest::header::HeaderValue::from_str(value)
            .map_err(|e| GeneratorError::Config(format!("invalid {} header: {}", name, e)))?;
        headers.insert(name, value);
    }
    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| GeneratorError::Config(format!("failed to build HTTP client: {}", e)))
}
