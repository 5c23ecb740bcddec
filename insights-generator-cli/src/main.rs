mod report;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use insights_generator::{
    loader, recommend, run_until, ABTestConfig, Catalog, GeneratorError, RecommendSettings,
    RunConfig, RunSettings,
};
use insights_generator_http::{AlgoliaCredentials, HttpInsightsSink, HttpSearchClient};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "insights-generator", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Simulate users searching, clicking and converting, then send the events
    Events(EventsArgs),
    /// Generate historical click and conversion CSV files for recommendation models
    Recommend(RecommendArgs),
}

#[derive(Args, Debug)]
struct AlgoliaArgs {
    #[arg(long, env = "ALGOLIA_APP_ID")]
    app_id: Option<String>,
    #[arg(long, env = "ALGOLIA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "ALGOLIA_INDEX_NAME")]
    index_name: Option<String>,

    /// Search host override (e.g. a self-hosted Algolia-compatible server)
    #[arg(long)]
    search_url: Option<String>,
    /// Insights host override
    #[arg(long)]
    insights_url: Option<String>,
}

impl AlgoliaArgs {
    fn credentials(&self) -> AlgoliaCredentials {
        AlgoliaCredentials {
            app_id: self.app_id.clone().unwrap_or_default(),
            api_key: self.api_key.clone().unwrap_or_default(),
            index_name: self.index_name.clone().unwrap_or_default(),
            search_url: self.search_url.clone(),
            insights_url: self.insights_url.clone(),
        }
    }
}

#[derive(Args, Debug)]
struct EventsArgs {
    #[command(flatten)]
    algolia: AlgoliaArgs,

    /// JSON array of search terms, most popular first
    #[arg(long)]
    search_terms: PathBuf,
    /// JSON object of weighted user tag collections
    #[arg(long)]
    user_tags: Option<PathBuf>,
    /// JSON object of weighted event names per event type
    #[arg(long)]
    event_names: Option<PathBuf>,
    /// JSON array of predefined users
    #[arg(long)]
    personas: Option<PathBuf>,

    #[arg(long, default_value_t = 100)]
    users: usize,
    #[arg(long, default_value_t = 5)]
    searches_per_user: usize,
    #[arg(long, default_value_t = 20)]
    hits_per_page: u32,
    /// Percent of searches followed by a click
    #[arg(long, default_value_t = 20.0)]
    click_through_rate: f64,
    /// Percent of searches followed by a conversion
    #[arg(long, default_value_t = 10.0)]
    conversion_rate: f64,
    /// Preferred (1-based) result position of clicks
    #[arg(long, default_value_t = 1)]
    click_position: u32,
    /// Pause between two searches of the same user (e.g. "2s", "500ms", "1m30s")
    #[arg(long, default_value = "2s")]
    delay: humantime::Duration,
    #[arg(long, default_value_t = 200)]
    workers: usize,
    #[arg(long, default_value = "10s")]
    search_timeout: humantime::Duration,

    /// Favored A/B test variant (0 = no A/B test)
    #[arg(long, default_value_t = 0)]
    ab_test_variant_id: u32,
    /// Click-through rate boost (percent) for the favored variant
    #[arg(long, default_value_t = 0.0)]
    ab_test_click_through_rate: f64,
    /// Conversion rate boost (percent) for the favored variant
    #[arg(long, default_value_t = 0.0)]
    ab_test_conversion_rate: f64,

    /// Seed the random generators
    #[arg(long)]
    seed: Option<u64>,
    /// Search without analytics and do not send any event
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct RecommendArgs {
    #[command(flatten)]
    algolia: AlgoliaArgs,

    /// JSON object with the category facet name and FBT category pairs
    #[arg(long, default_value = "recommend.json")]
    config: PathBuf,
    /// Directory receiving events-similar.csv and events-fbt.csv
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    #[arg(long, default_value_t = 15)]
    clicks_per_object: usize,
    #[arg(long, default_value_t = 50)]
    conversions_per_object: usize,
    /// Events are spread over this many trailing days
    #[arg(long, default_value_t = 90)]
    history_days: u32,
    /// Seed the random generator
    #[arg(long)]
    seed: Option<u64>,
}

impl RecommendArgs {
    fn settings(&self) -> RecommendSettings {
        RecommendSettings {
            clicks_per_object: self.clicks_per_object,
            conversions_per_object: self.conversions_per_object,
            history_days: self.history_days,
        }
    }
}

impl EventsArgs {
    fn settings(&self) -> RunSettings {
        RunSettings {
            index_name: self.algolia.index_name.clone().unwrap_or_default(),
            number_of_users: self.users,
            searches_per_user: self.searches_per_user,
            hits_per_page: self.hits_per_page,
            click_through_rate: self.click_through_rate,
            conversion_rate: self.conversion_rate,
            click_position: self.click_position,
            turn_delay: self.delay.into(),
            dry_run: self.dry_run,
            workers: self.workers,
            search_timeout: self.search_timeout.into(),
            seed: self.seed,
            ab_test: ABTestConfig {
                variant_id: self.ab_test_variant_id,
                click_through_rate_boost: self.ab_test_click_through_rate,
                conversion_rate_boost: self.ab_test_conversion_rate,
            },
            ..RunSettings::default()
        }
    }

    fn run_config(&self) -> insights_generator::Result<RunConfig> {
        let terms = loader::load_search_terms(&self.search_terms)?;
        let tags = match &self.user_tags {
            Some(path) => loader::load_tags(path)?,
            None => Vec::new(),
        };
        let event_names = loader::load_event_names(self.event_names.as_deref())?;
        let personas = match &self.personas {
            Some(path) => loader::load_personas(path)?,
            None => Vec::new(),
        };
        RunConfig::new(self.settings(), terms, tags, event_names, personas)
    }
}

async fn run_events(args: EventsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = args.algolia.credentials();
    credentials.validate()?;
    let config = args.run_config()?;
    let dry_run = config.settings.dry_run;

    let service = HttpSearchClient::new(&credentials)?;
    let sink = HttpInsightsSink::new(&credentials)?;
    tracing::info!(
        "[cli] Searching {} and sending events to {}{}",
        service.url(),
        sink.url(),
        if dry_run { " (dry run)" } else { "" }
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("[cli] Ctrl-C received, finishing current turns");
            shutdown_tx.send_replace(true);
        }
    });

    let report = run_until(config, service, &sink, shutdown_rx).await?;
    report::print_report(&report, dry_run);
    Ok(())
}

async fn run_recommend(args: RecommendArgs) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = args.algolia.credentials();
    credentials.validate()?;
    let config = loader::load_recommend_config(&args.config)?;
    let settings = args.settings();
    settings.validate()?;

    let client = HttpSearchClient::new(&credentials)?;
    let records = client.browse().await?;
    let catalog = Catalog::from_json(&records, &config.facet_name);
    if catalog.is_empty() {
        return Err(GeneratorError::Config(format!(
            "no record of index '{}' has an objectID and a '{}' value",
            credentials.index_name, config.facet_name
        ))
        .into());
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let events = recommend::generate(&catalog, &config, &settings, chrono::Utc::now(), &mut rng);
    let (similar, fbt) = recommend::write_files(&args.output_dir, &events)?;
    report::print_recommend_summary(catalog.len(), &events, &similar, &fbt);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Events(args) => run_events(args).await,
        Command::Recommend(args) => run_recommend(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::Duration;

    static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn parse_cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("args should parse")
    }

    fn events(cli: Cli) -> EventsArgs {
        match cli.command {
            Command::Events(args) => args,
            Command::Recommend(_) => panic!("expected the events command"),
        }
    }

    fn recommend(cli: Cli) -> RecommendArgs {
        match cli.command {
            Command::Recommend(args) => args,
            Command::Events(_) => panic!("expected the recommend command"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_run_settings() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let args = events(parse_cli(&[
            "insights-generator",
            "events",
            "--search-terms",
            "terms.json",
        ]));
        let settings = args.settings();
        let defaults = RunSettings::default();
        assert_eq!(settings.number_of_users, defaults.number_of_users);
        assert_eq!(settings.searches_per_user, defaults.searches_per_user);
        assert_eq!(settings.hits_per_page, defaults.hits_per_page);
        assert_eq!(settings.click_through_rate, defaults.click_through_rate);
        assert_eq!(settings.conversion_rate, defaults.conversion_rate);
        assert_eq!(settings.click_position, defaults.click_position);
        assert_eq!(settings.turn_delay, defaults.turn_delay);
        assert_eq!(settings.workers, defaults.workers);
        assert_eq!(settings.search_timeout, defaults.search_timeout);
        assert!(!settings.ab_test.is_enabled());
        assert!(!settings.dry_run);
    }

    #[test]
    fn flags_map_onto_settings() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let args = events(parse_cli(&[
            "insights-generator",
            "events",
            "--search-terms",
            "terms.json",
            "--index-name",
            "products",
            "--users",
            "3",
            "--delay",
            "250ms",
            "--ab-test-variant-id",
            "2",
            "--ab-test-click-through-rate",
            "15",
            "--seed",
            "9",
            "--dry-run",
        ]));
        let settings = args.settings();
        assert_eq!(settings.index_name, "products");
        assert_eq!(settings.number_of_users, 3);
        assert_eq!(settings.turn_delay, Duration::from_millis(250));
        assert_eq!(settings.ab_test.variant_id, 2);
        assert_eq!(settings.ab_test.click_through_rate_boost, 15.0);
        assert_eq!(settings.seed, Some(9));
        assert!(settings.dry_run);
    }

    #[test]
    fn credentials_come_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("ALGOLIA_APP_ID", "ENVAPP");
        std::env::set_var("ALGOLIA_API_KEY", "envkey");
        std::env::set_var("ALGOLIA_INDEX_NAME", "envindex");
        let args = events(parse_cli(&[
            "insights-generator",
            "events",
            "--search-terms",
            "terms.json",
        ]));
        std::env::remove_var("ALGOLIA_APP_ID");
        std::env::remove_var("ALGOLIA_API_KEY");
        std::env::remove_var("ALGOLIA_INDEX_NAME");

        let credentials = args.algolia.credentials();
        assert_eq!(credentials.app_id, "ENVAPP");
        assert_eq!(credentials.api_key, "envkey");
        assert_eq!(credentials.index_name, "envindex");
        assert!(credentials.validate().is_ok());
    }

    #[test]
    fn search_terms_flag_is_required() {
        assert!(Cli::try_parse_from(["insights-generator", "events"]).is_err());
    }

    #[test]
    fn compound_durations_are_accepted() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let args = events(parse_cli(&[
            "insights-generator",
            "events",
            "--search-terms",
            "terms.json",
            "--delay",
            "1m30s",
            "--search-timeout",
            "1h",
        ]));
        let settings = args.settings();
        assert_eq!(settings.turn_delay, Duration::from_secs(90));
        assert_eq!(settings.search_timeout, Duration::from_secs(3600));
    }

    #[test]
    fn malformed_duration_is_rejected() {
        assert!(Cli::try_parse_from([
            "insights-generator",
            "events",
            "--search-terms",
            "terms.json",
            "--delay",
            "fast",
        ])
        .is_err());
    }

    #[test]
    fn recommend_defaults_follow_recommend_settings() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let args = recommend(parse_cli(&["insights-generator", "recommend"]));
        assert_eq!(args.config, PathBuf::from("recommend.json"));
        assert_eq!(args.output_dir, PathBuf::from("."));
        assert_eq!(args.settings(), RecommendSettings::default());
    }

    #[test]
    fn recommend_shares_credential_flags() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let args = recommend(parse_cli(&[
            "insights-generator",
            "recommend",
            "--app-id",
            "app",
            "--api-key",
            "key",
            "--index-name",
            "catalog",
            "--history-days",
            "30",
        ]));
        let credentials = args.algolia.credentials();
        assert_eq!(credentials.index_name, "catalog");
        assert!(credentials.validate().is_ok());
        assert_eq!(args.settings().history_days, 30);
    }
}
