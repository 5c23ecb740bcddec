use std::time::Duration;

use insights_generator::{GeneratorError, Result, SearchOptions, SearchResponse, SearchService};
use serde::{Deserialize, Serialize};

use crate::credentials::AlgoliaCredentials;
use crate::{build_client, DEFAULT_HTTP_TIMEOUT};

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    query: &'a str,
    hits_per_page: u32,
    analytics: bool,
    click_analytics: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_token: Option<&'a str>,
    #[serde(skip_serializing_if = "no_tags")]
    analytics_tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    get_ranking_info: bool,
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

impl<'a> QueryBody<'a> {
    fn new(query: &'a str, options: &'a SearchOptions) -> Self {
        Self {
            query,
            hits_per_page: options.page_size,
            analytics: options.analytics_enabled,
            click_analytics: options.click_analytics,
            user_token: options.user_token.as_deref(),
            analytics_tags: &options.tags,
            filters: options.filters.as_deref(),
            get_ranking_info: options.include_variant_info,
        }
    }
}

#[derive(Deserialize, Debug)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
}

#[derive(Deserialize, Debug)]
struct QueryResponse {
    #[serde(default)]
    hits: Vec<Hit>,
    #[serde(rename = "queryID", default)]
    query_id: Option<String>,
    #[serde(rename = "abTestVariantID", default)]
    ab_test_variant_id: Option<u32>,
}

impl From<QueryResponse> for SearchResponse {
    fn from(r: QueryResponse) -> Self {
        SearchResponse {
            result_ids: r.hits.into_iter().map(|h| h.object_id).collect(),
            query_id: r.query_id.unwrap_or_default(),
            experiment_variant: r.ab_test_variant_id.filter(|v| *v != 0),
        }
    }
}

#[derive(Serialize, Debug)]
struct BrowseBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct BrowsePage {
    #[serde(default)]
    hits: Vec<serde_json::Value>,
    #[serde(default)]
    cursor: Option<String>,
}

/// Queries one index through `POST /1/indexes/{index}/query` and reads its
/// records through `POST /1/indexes/{index}/browse`.
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: reqwest::Client,
    url: String,
    browse_url: String,
}

impl HttpSearchClient {
    pub fn new(credentials: &AlgoliaCredentials) -> Result<Self> {
        Self::with_timeout(credentials, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(credentials: &AlgoliaCredentials, timeout: Duration) -> Result<Self> {
        credentials.validate()?;
        let index_url = format!(
            "{}/1/indexes/{}",
            credentials.search_base_url(),
            credentials.index_name
        );
        Ok(Self {
            client: build_client(credentials, timeout)?,
            url: format!("{}/query", index_url),
            browse_url: format!("{}/browse", index_url),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Every record of the index, following browse cursors until the last page.
    pub async fn browse(&self) -> Result<Vec<serde_json::Value>> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let response = self
                .client
                .post(&self.browse_url)
                .json(&BrowseBody {
                    cursor: cursor.as_deref(),
                })
                .send()
                .await
                .map_err(|e| GeneratorError::Search(format!("browse request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GeneratorError::Search(format!(
                    "browse returned {}: {}",
                    status, body
                )));
            }

            let page: BrowsePage = response
                .json()
                .await
                .map_err(|e| GeneratorError::Search(format!("invalid browse response: {}", e)))?;
            tracing::debug!("[browse] Page with {} records", page.hits.len());
            records.extend(page.hits);

            match page.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        tracing::info!("[browse] Fetched {} records from {}", records.len(), self.browse_url);
        Ok(records)
    }
}

impl SearchService for HttpSearchClient {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        let response = self
            .client
            .post(&self.url)
            .json(&QueryBody::new(query, options))
            .send()
            .await
            .map_err(|e| GeneratorError::Search(format!("request for '{}' failed: {}", query, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Search(format!(
                "query '{}' returned {}: {}",
                query, status, body
            )));
        }

        let parsed: QueryResponse = response.json().await.map_err(|e| {
            GeneratorError::Search(format!("invalid response for '{}': {}", query, e))
        })?;
        Ok(parsed.into())
    }
}
