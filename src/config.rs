use std::num::NonZeroU32;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::DEFAULT_CHUNK_SIZE;
use crate::error::{GeneratorError, Result};
use crate::event_names::EventNameTable;
use crate::tags::TagsCollection;
use crate::terms::SearchTermPool;
use crate::user::VirtualUser;

/// Experiment settings. The favored variant gets its click-through and
/// conversion rates boosted by the given percentages.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ABTestConfig {
    /// 0 disables experiment handling.
    pub variant_id: u32,
    pub click_through_rate_boost: f64,
    pub conversion_rate_boost: f64,
}

impl ABTestConfig {
    pub fn is_enabled(&self) -> bool {
        self.variant_id != 0
    }

    /// True when the search was served by the favored variant.
    pub fn favors(&self, served_by: Option<u32>) -> bool {
        self.is_enabled() && served_by == Some(self.variant_id)
    }
}

/// Scalar knobs of a run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RunSettings {
    pub index_name: String,
    pub number_of_users: usize,
    pub searches_per_user: usize,
    pub hits_per_page: u32,
    /// Percent.
    pub click_through_rate: f64,
    /// Percent.
    pub conversion_rate: f64,
    pub click_position: u32,
    #[serde(with = "duration_ms")]
    pub turn_delay: Duration,
    pub dry_run: bool,
    pub workers: usize,
    #[serde(with = "duration_ms")]
    pub search_timeout: Duration,
    pub chunk_size: usize,
    pub seed: Option<u64>,
    pub ab_test: ABTestConfig,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            index_name: String::new(),
            number_of_users: 100,
            searches_per_user: 5,
            hits_per_page: 20,
            click_through_rate: 20.0,
            conversion_rate: 10.0,
            click_position: 1,
            turn_delay: Duration::from_secs(2),
            dry_run: false,
            workers: 200,
            search_timeout: Duration::from_secs(10),
            chunk_size: DEFAULT_CHUNK_SIZE,
            seed: None,
            ab_test: ABTestConfig::default(),
        }
    }
}

impl RunSettings {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(GeneratorError::Config("workers must be > 0".to_string()));
        }
        if self.click_position == 0 {
            return Err(GeneratorError::Config(
                "click_position must be >= 1 (positions are 1-based)".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(GeneratorError::Config("chunk_size must be > 0".to_string()));
        }
        if self.hits_per_page == 0 {
            return Err(GeneratorError::Config("hits_per_page must be > 0".to_string()));
        }
        if self.search_timeout.is_zero() {
            return Err(GeneratorError::Config("search_timeout must be > 0".to_string()));
        }
        let rates = [
            ("click_through_rate", self.click_through_rate),
            ("conversion_rate", self.conversion_rate),
            ("ab_test.click_through_rate_boost", self.ab_test.click_through_rate_boost),
            ("ab_test.conversion_rate_boost", self.ab_test.conversion_rate_boost),
        ];
        for (name, value) in rates {
            if !value.is_finite() || value < 0.0 {
                return Err(GeneratorError::Config(format!(
                    "{} must be a non-negative percentage, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Validated default click position.
    pub fn default_click_position(&self) -> Result<NonZeroU32> {
        NonZeroU32::new(self.click_position).ok_or_else(|| {
            GeneratorError::Config("click_position must be >= 1 (positions are 1-based)".to_string())
        })
    }

    pub fn total_users(&self, personas: usize) -> usize {
        self.number_of_users + personas
    }
}

/// Everything a run needs, compiled and immutable. Shared between workers
/// behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub settings: RunSettings,
    pub search_terms: SearchTermPool,
    pub tags: Vec<TagsCollection>,
    pub event_names: EventNameTable,
    pub personas: Vec<VirtualUser>,
    click_position: NonZeroU32,
}

impl RunConfig {
    pub fn new(
        settings: RunSettings,
        search_terms: SearchTermPool,
        tags: Vec<TagsCollection>,
        event_names: EventNameTable,
        personas: Vec<VirtualUser>,
    ) -> Result<Self> {
        settings.validate()?;
        event_names.require_all()?;
        let click_position = settings.default_click_position()?;
        Ok(Self {
            settings,
            search_terms,
            tags,
            event_names,
            personas,
            click_position,
        })
    }

    pub fn click_position(&self) -> NonZeroU32 {
        self.click_position
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
