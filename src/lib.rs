//! Simulated search traffic for Algolia-compatible search and insights backends.
//!
//! A run spins up virtual users, drives each through weighted-random
//! search → click → conversion turns against a [`SearchService`], aggregates
//! per-term statistics and delivers the click/conversion events to an
//! [`EventSink`] in fixed-size batches.
//!
//! [`recommend`] builds a separate, historical event set for training
//! recommendation models from the records of an index.

pub mod behavior;
pub mod choice;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event_names;
pub mod events;
pub mod loader;
pub mod pipeline;
pub mod recommend;
pub mod service;
pub mod stats;
pub mod tags;
pub mod terms;
pub mod user;

pub use choice::WeightedChoice;
pub use config::{ABTestConfig, RunConfig, RunSettings};
pub use dispatch::{dispatch, DEFAULT_CHUNK_SIZE};
pub use error::{GeneratorError, Result};
pub use event_names::{EventKind, EventNameTable, EventNames};
pub use events::{ClickEvent, ConversionEvent, Event, EventContext, SearchEvent};
pub use pipeline::{run, run_until, Generated, RunReport, Simulation};
pub use recommend::{Catalog, CatalogRecord, RecommendConfig, RecommendEvent, RecommendEvents, RecommendSettings};
pub use service::{EventSink, SearchOptions, SearchResponse, SearchService};
pub use stats::{compute_stats, StatsPerTerm, ALL_TERMS};
pub use tags::TagsCollection;
pub use terms::{FilterSampler, FilterSpec, SearchTerm, SearchTermPool};
pub use user::{execute_turn, PersonaSpec, Turn, VirtualUser};
