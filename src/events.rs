//! Events produced by virtual users.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::event_names::EventKind;
use crate::terms::SearchTerm;

/// One executed search: the term that was picked and what the service returned.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchEvent {
    pub term: Arc<SearchTerm>,
    pub result_ids: Vec<String>,
    pub query_id: String,
    pub filters_applied: Vec<String>,
    /// Experiment variant that served the search, `None` outside an experiment.
    pub experiment_variant: Option<u32>,
}

impl SearchEvent {
    pub fn has_results(&self) -> bool {
        !self.result_ids.is_empty()
    }

    /// Click on the result at 0-based `position`.
    ///
    /// Returns `None` if `position` is outside the result list.
    pub fn click(
        &self,
        user: &EventContext<'_>,
        event_name: &str,
        position: usize,
    ) -> Option<ClickEvent> {
        let object_id = self.result_ids.get(position)?.clone();
        Some(ClickEvent {
            term: self.term.clone(),
            event_name: event_name.to_string(),
            index_name: user.index_name.to_string(),
            user_token: user.user_token.to_string(),
            timestamp: user.timestamp,
            object_id,
            position: u32::try_from(position + 1).ok()?,
            query_id: self.query_id.clone(),
            filters: self.filters_applied.clone(),
        })
    }

    /// Conversion on the result at 0-based `position`.
    pub fn conversion(
        &self,
        user: &EventContext<'_>,
        event_name: &str,
        position: usize,
    ) -> Option<ConversionEvent> {
        let object_id = self.result_ids.get(position)?.clone();
        Some(ConversionEvent {
            term: self.term.clone(),
            event_name: event_name.to_string(),
            index_name: user.index_name.to_string(),
            user_token: user.user_token.to_string(),
            timestamp: user.timestamp,
            object_id,
            query_id: self.query_id.clone(),
            filters: self.filters_applied.clone(),
        })
    }
}

/// Who emitted an event, where and when.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    pub index_name: &'a str,
    pub user_token: &'a str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClickEvent {
    pub term: Arc<SearchTerm>,
    pub event_name: String,
    pub index_name: String,
    pub user_token: String,
    pub timestamp: DateTime<Utc>,
    pub object_id: String,
    /// 1-based.
    pub position: u32,
    pub query_id: String,
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionEvent {
    pub term: Arc<SearchTerm>,
    pub event_name: String,
    pub index_name: String,
    pub user_token: String,
    pub timestamp: DateTime<Utc>,
    pub object_id: String,
    pub query_id: String,
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Search(SearchEvent),
    Click(ClickEvent),
    Conversion(ConversionEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Search(_) => EventKind::Search,
            Event::Click(_) => EventKind::Click,
            Event::Conversion(_) => EventKind::Conversion,
        }
    }

    /// The search-term string the event originates from.
    pub fn term(&self) -> &str {
        match self {
            Event::Search(e) => &e.term.term,
            Event::Click(e) => &e.term.term,
            Event::Conversion(e) => &e.term.term,
        }
    }

    pub fn click_position(&self) -> Option<u32> {
        match self {
            Event::Click(e) => Some(e.position),
            _ => None,
        }
    }

    pub fn object_id(&self) -> Option<&str> {
        match self {
            Event::Search(_) => None,
            Event::Click(e) => Some(&e.object_id),
            Event::Conversion(e) => Some(&e.object_id),
        }
    }

    pub fn query_id(&self) -> &str {
        match self {
            Event::Search(e) => &e.query_id,
            Event::Click(e) => &e.query_id,
            Event::Conversion(e) => &e.query_id,
        }
    }

    /// Search markers only feed statistics; clicks and conversions are
    /// the events an insights backend accepts.
    pub fn is_deliverable(&self) -> bool {
        !matches!(self, Event::Search(_))
    }
}

impl From<SearchEvent> for Event {
    fn from(e: SearchEvent) -> Self {
        Event::Search(e)
    }
}

impl From<ClickEvent> for Event {
    fn from(e: ClickEvent) -> Self {
        Event::Click(e)
    }
}

impl From<ConversionEvent> for Event {
    fn from(e: ConversionEvent) -> Self {
        Event::Conversion(e)
    }
}
