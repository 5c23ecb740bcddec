use crate::error::{GeneratorError, Result};
use crate::events::Event;
use crate::service::EventSink;

/// Maximum number of events per Insights API request.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Deliver `events` to `sink` in contiguous chunks of at most `chunk_size`,
/// one request at a time and in order.
///
/// Stops at the first failed chunk; chunks already delivered stay delivered.
/// Returns the number of events delivered.
pub async fn dispatch<S: EventSink + ?Sized>(
    events: &[Event],
    sink: &S,
    chunk_size: usize,
) -> Result<usize> {
    if chunk_size == 0 {
        return Err(GeneratorError::Config("chunk_size must be > 0".to_string()));
    }

    let total_chunks = events.len().div_ceil(chunk_size);
    let mut delivered = 0;
    for (i, chunk) in events.chunks(chunk_size).enumerate() {
        if let Err(e) = sink.send_batch(chunk).await {
            tracing::error!(
                "[dispatch] Chunk {}/{} failed after {} events: {}",
                i + 1,
                total_chunks,
                delivered,
                e
            );
            return Err(GeneratorError::Delivery {
                delivered,
                message: e.to_string(),
            });
        }
        delivered += chunk.len();
        tracing::debug!("[dispatch] Sent chunk {}/{} ({} events)", i + 1, total_chunks, chunk.len());
    }

    tracing::info!("[dispatch] Delivered {} events in {} chunks", delivered, total_chunks);
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventContext, SearchEvent};
    use crate::terms::SearchTerm;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recording {
        batches: Mutex<Vec<Vec<String>>>,
        fail_on: Option<usize>,
    }

    impl EventSink for Recording {
        async fn send_batch(&self, events: &[Event]) -> Result<()> {
            let mut batches = self.batches.lock().unwrap();
            if self.fail_on == Some(batches.len()) {
                return Err(GeneratorError::Insights("HTTP 422".to_string()));
            }
            batches.push(events.iter().map(|e| e.object_id().unwrap_or("").to_string()).collect());
            Ok(())
        }
    }

    fn clicks(n: usize) -> Vec<Event> {
        let ids: Vec<String> = (0..n).map(|i| i.to_string()).collect();
        let search = SearchEvent {
            term: Arc::new(SearchTerm::new("shoes")),
            result_ids: ids,
            query_id: "q".to_string(),
            filters_applied: Vec::new(),
            experiment_variant: None,
        };
        let ctx = EventContext {
            index_name: "products",
            user_token: "1",
            timestamp: Utc::now(),
        };
        (0..n)
            .map(|i| Event::Click(search.click(&ctx, "click", i).unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn chunks_are_contiguous_and_ordered() {
        let sink = Recording::default();
        let events = clicks(2_500);
        let delivered = dispatch(&events, &sink, DEFAULT_CHUNK_SIZE).await.unwrap();
        assert_eq!(delivered, 2_500);

        let batches = sink.batches.lock().unwrap();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
        let flat: Vec<String> = batches.iter().flatten().cloned().collect();
        let expected: Vec<String> = (0..2_500).map(|i| i.to_string()).collect();
        assert_eq!(flat, expected);
    }

    #[tokio::test]
    async fn no_events_means_no_requests() {
        let sink = Recording::default();
        assert_eq!(dispatch(&[], &sink, 10).await.unwrap(), 0);
        assert!(sink.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_chunk_size_is_a_config_error() {
        let sink = Recording::default();
        let err = dispatch(&clicks(1), &sink, 0).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Config(_)));
    }

    #[tokio::test]
    async fn stops_at_first_failure_and_reports_progress() {
        let sink = Recording {
            fail_on: Some(1),
            ..Default::default()
        };
        let err = dispatch(&clicks(25), &sink, 10).await.unwrap_err();
        match err {
            GeneratorError::Delivery { delivered, message } => {
                assert_eq!(delivered, 10);
                assert!(message.contains("422"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(sink.batches.lock().unwrap().len(), 1);
    }
}
