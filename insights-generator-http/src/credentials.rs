use insights_generator::{GeneratorError, Result};

const DEFAULT_INSIGHTS_URL: &str = "https://insights.algolia.io";

/// Application credentials plus optional host overrides, for pointing the
/// clients at a self-hosted Algolia-compatible server or a mock.
#[derive(Debug, Clone, Default)]
pub struct AlgoliaCredentials {
    pub app_id: String,
    pub api_key: String,
    pub index_name: String,
    pub search_url: Option<String>,
    pub insights_url: Option<String>,
}

impl AlgoliaCredentials {
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            index_name: index_name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("application ID", &self.app_id),
            ("API key", &self.api_key),
            ("index name", &self.index_name),
        ] {
            if value.trim().is_empty() {
                return Err(GeneratorError::Config(format!("missing {}", name)));
            }
        }
        Ok(())
    }

    pub fn search_base_url(&self) -> String {
        match &self.search_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}-dsn.algolia.net", self.app_id.to_lowercase()),
        }
    }

    pub fn insights_base_url(&self) -> String {
        self.insights_url
            .as_deref()
            .unwrap_or(DEFAULT_INSIGHTS_URL)
            .trim_end_matches('/')
            .to_string()
    }
}
