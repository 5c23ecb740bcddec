use std::time::Duration;

use insights_generator::{Event, EventSink, GeneratorError, Result};
use serde::Serialize;

use crate::credentials::AlgoliaCredentials;
use crate::{build_client, DEFAULT_HTTP_TIMEOUT};

/// One event in Insights API wire format.
#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent<'a> {
    pub event_type: &'static str,
    pub event_name: &'a str,
    pub index: &'a str,
    pub user_token: &'a str,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(rename = "objectIDs")]
    pub object_ids: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<[u32; 1]>,
    #[serde(rename = "queryID", skip_serializing_if = "str::is_empty")]
    pub query_id: &'a str,
}

impl<'a> WireEvent<'a> {
    /// `None` for search markers, which the Insights API has no type for.
    pub fn from_event(event: &'a Event) -> Option<Self> {
        match event {
            Event::Search(_) => None,
            Event::Click(c) => Some(Self {
                event_type: "click",
                event_name: &c.event_name,
                index: &c.index_name,
                user_token: &c.user_token,
                timestamp: c.timestamp.timestamp_millis(),
                object_ids: [c.object_id.as_str()],
                positions: Some([c.position]),
                query_id: &c.query_id,
            }),
            Event::Conversion(c) => Some(Self {
                event_type: "conversion",
                event_name: &c.event_name,
                index: &c.index_name,
                user_token: &c.user_token,
                timestamp: c.timestamp.timestamp_millis(),
                object_ids: [c.object_id.as_str()],
                positions: None,
                query_id: &c.query_id,
            }),
        }
    }
}

#[derive(Serialize)]
struct EventsBody<'a> {
    events: Vec<WireEvent<'a>>,
}

/// Sends event batches to `POST /1/events`.
#[derive(Debug, Clone)]
pub struct HttpInsightsSink {
    client: reqwest::Client,
    url: String,
}

impl HttpInsightsSink {
    pub fn new(credentials: &AlgoliaCredentials) -> Result<Self> {
        Self::with_timeout(credentials, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(credentials: &AlgoliaCredentials, timeout: Duration) -> Result<Self> {
        credentials.validate()?;
        Ok(Self {
            client: build_client(credentials, timeout)?,
            url: format!("{}/1/events", credentials.insights_base_url()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl EventSink for HttpInsightsSink {
    async fn send_batch(&self, events: &[Event]) -> Result<()> {
        let body = EventsBody {
            events: events.iter().filter_map(WireEvent::from_event).collect(),
        };
        if body.events.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeneratorError::Insights(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Insights(format!("{}: {}", status, text)));
        }
        tracing::debug!("[insights] Sent {} events", body.events.len());
        Ok(())
    }
}
