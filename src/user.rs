//! Virtual users and the single-turn search → click → conversion step.

use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::behavior::{decide, effective_rate, pick_position, resolve_click_position};
use crate::config::RunConfig;
use crate::error::{GeneratorError, Result};
use crate::event_names::EventKind;
use crate::events::{Event, EventContext, SearchEvent};
use crate::service::{SearchOptions, SearchService};
use crate::tags::draw_tags;
use crate::terms::{FilterSampler, FilterSpec, SearchTerm};

/// A simulated user. Random users only carry a token and tags; personas may
/// also restrict the terms they search for and the filters they apply.
#[derive(Debug, Clone)]
pub struct VirtualUser {
    pub token: String,
    pub tags: Vec<String>,
    pub terms: Vec<String>,
    pub filters: Option<FilterSampler>,
}

impl VirtualUser {
    /// New anonymous user with a random 63-bit token and one tag per collection.
    pub fn random<R: Rng + ?Sized>(config: &RunConfig, rng: &mut R) -> Self {
        Self {
            token: rng.gen_range(0..=i64::MAX).to_string(),
            tags: draw_tags(&config.tags, rng),
            terms: Vec::new(),
            filters: None,
        }
    }

    pub fn is_persona(&self) -> bool {
        !self.terms.is_empty() || self.filters.is_some()
    }

    /// Request options for this user. Dry runs turn analytics off so the
    /// backend does not record the simulated traffic.
    pub fn search_options(&self, config: &RunConfig, filters: Option<String>) -> SearchOptions {
        let settings = &config.settings;
        let (analytics_enabled, user_token, tags) = if settings.dry_run {
            (false, None, Vec::new())
        } else {
            (true, Some(self.token.clone()), self.tags.clone())
        };
        SearchOptions {
            analytics_enabled,
            click_analytics: analytics_enabled,
            user_token,
            tags,
            page_size: settings.hits_per_page,
            filters,
            include_variant_info: settings.ab_test.is_enabled(),
        }
    }
}

/// A persona as written in the personas file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSpec {
    #[serde(alias = "Token")]
    pub token: Option<String>,
    #[serde(alias = "Tags")]
    pub tags: Vec<String>,
    #[serde(alias = "Terms")]
    pub terms: Vec<String>,
    #[serde(alias = "Filters")]
    pub filters: FilterSpec,
}

impl PersonaSpec {
    pub fn into_user(self) -> Result<VirtualUser> {
        let filters = self.filters.compile()?;
        Ok(VirtualUser {
            token: self
                .token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            tags: self.tags,
            terms: self.terms,
            filters,
        })
    }
}

/// Outcome of one turn: the search and whatever it led to.
#[derive(Debug, Clone)]
pub struct Turn {
    pub search: SearchEvent,
    /// Clicks and conversions, in that order.
    pub events: Vec<Event>,
}

impl Turn {
    /// The search marker followed by its clicks and conversions.
    pub fn into_events(self) -> Vec<Event> {
        let mut out = Vec::with_capacity(self.events.len() + 1);
        out.push(Event::Search(self.search));
        out.extend(self.events);
        out
    }
}

/// Run one search for `user` and decide on a click and a conversion.
///
/// # Errors
///
/// Search failures and timeouts come back as transient errors. A missing
/// event-name table is a configuration error.
pub async fn execute_turn<S, R>(
    user: &VirtualUser,
    config: &RunConfig,
    service: &S,
    rng: &mut R,
) -> Result<Turn>
where
    S: SearchService,
    R: Rng + Send,
{
    let settings = &config.settings;

    // Persona term pools replace the global pool; those terms carry no overrides.
    let (term, term_filters) = match user.terms.choose(rng) {
        Some(t) => (Arc::new(SearchTerm::new(t.clone())), None),
        None => {
            let pooled = config.search_terms.pick(rng);
            (pooled.term.clone(), pooled.filters.as_ref())
        }
    };

    let filter = user
        .filters
        .as_ref()
        .or(term_filters)
        .map(|sampler| sampler.pick(rng));
    let options = user.search_options(config, filter.clone());

    let response = tokio::time::timeout(
        settings.search_timeout,
        service.search(&term.term, &options),
    )
    .await
    .map_err(|_| GeneratorError::SearchTimeout(settings.search_timeout))??;

    if let Some(synonym) = term.pick_synonym(rng) {
        // Only issued so the backend sees the synonym; the results are ignored.
        match tokio::time::timeout(settings.search_timeout, service.search(synonym, &options)).await
        {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!("[turn] Synonym search '{}' failed: {}", synonym, e),
            Err(_) => tracing::warn!("[turn] Synonym search '{}' timed out", synonym),
        }
    }

    let search = SearchEvent {
        term: term.clone(),
        result_ids: response.result_ids,
        query_id: response.query_id,
        filters_applied: filter.into_iter().collect(),
        experiment_variant: response.experiment_variant.filter(|v| *v != 0),
    };

    if !search.has_results() {
        tracing::warn!("[turn] No results for search term '{}'", term.term);
        return Ok(Turn {
            search,
            events: Vec::new(),
        });
    }

    let ab = &settings.ab_test;
    let favored = ab.favors(search.experiment_variant);
    let click_position = resolve_click_position(term.click_position, config.click_position());
    let ctx = EventContext {
        index_name: &settings.index_name,
        user_token: &user.token,
        timestamp: Utc::now(),
    };
    let mut events = Vec::new();

    let ctr = effective_rate(
        settings.click_through_rate,
        term.click_through_rate,
        ab.click_through_rate_boost,
        favored,
    );
    if decide(rng, ctr) {
        let position = pick_position(rng, search.result_ids.len(), click_position)?;
        let name = config.event_names.pick(EventKind::Click, rng)?;
        events.extend(search.click(&ctx, name, position).map(Event::Click));
    }

    let cvr = effective_rate(
        settings.conversion_rate,
        term.conversion_rate,
        ab.conversion_rate_boost,
        favored,
    );
    if decide(rng, cvr) {
        let position = pick_position(rng, search.result_ids.len(), click_position)?;
        let name = config.event_names.pick(EventKind::Conversion, rng)?;
        events.extend(search.conversion(&ctx, name, position).map(Event::Conversion));
    }

    tracing::debug!(
        "[turn] user={} term='{}' results={} events={}",
        user.token,
        term.term,
        search.result_ids.len(),
        events.len()
    );

    Ok(Turn { search, events })
}
