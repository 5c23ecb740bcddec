//! Event generation pipeline.
//!
//! ```text
//! producer ──users──▶ [bounded queue] ──▶ worker × N ──events──▶ collector
//! ```
//!
//! The producer streams random users followed by personas. Workers share the
//! user queue, run every turn of one user before taking the next, and push
//! events to the collector, the only owner of the event list. When all
//! workers have finished, the last event sender is dropped and the collector
//! returns.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;

use crate::config::RunConfig;
use crate::dispatch::dispatch;
use crate::error::{GeneratorError, Result};
use crate::events::Event;
use crate::service::{EventSink, SearchService};
use crate::stats::{compute_stats, StatsPerTerm};
use crate::user::{execute_turn, VirtualUser};

const EVENT_QUEUE_CAPACITY: usize = 1000;

/// Events collected by one generation pass.
#[derive(Debug, Clone, Default)]
pub struct Generated {
    pub events: Vec<Event>,
    /// Shutdown was requested before every user finished.
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub events: Vec<Event>,
    pub stats: Vec<StatsPerTerm>,
    /// Events accepted by the sink. 0 for dry and cancelled runs.
    pub delivered: usize,
    pub cancelled: bool,
}

pub struct Simulation<S> {
    config: Arc<RunConfig>,
    service: Arc<S>,
}

impl<S> Clone for Simulation<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            service: self.service.clone(),
        }
    }
}

impl<S: SearchService> Simulation<S> {
    pub fn new(config: RunConfig, service: S) -> Self {
        Self::from_shared(Arc::new(config), Arc::new(service))
    }

    pub fn from_shared(config: Arc<RunConfig>, service: Arc<S>) -> Self {
        Self { config, service }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub async fn generate(&self) -> Result<Generated> {
        let (_keep, shutdown) = watch::channel(false);
        self.generate_until(shutdown).await
    }

    /// Run every user through the pipeline until done or until `shutdown`
    /// flips to `true`.
    ///
    /// # Errors
    ///
    /// Fatal errors from any worker cancel the others and are returned as is.
    /// A panicked task surfaces as [`GeneratorError::Worker`].
    pub async fn generate_until(&self, mut shutdown: watch::Receiver<bool>) -> Result<Generated> {
        let settings = &self.config.settings;
        let total_users = settings.total_users(self.config.personas.len());
        let workers = settings.workers.min(total_users).max(1);
        tracing::info!(
            "[pipeline] Starting: users={} personas={} searches_per_user={} workers={}",
            settings.number_of_users,
            self.config.personas.len(),
            settings.searches_per_user,
            workers
        );

        let (cancel_tx, cancel_rx) = watch::channel(*shutdown.borrow());
        let cancel_tx = Arc::new(cancel_tx);

        let forwarder = {
            let cancel_tx = cancel_tx.clone();
            tokio::spawn(async move {
                if shutdown.wait_for(|stop| *stop).await.is_ok() {
                    tracing::warn!("[pipeline] Shutdown requested, stopping workers");
                    cancel_tx.send_replace(true);
                }
            })
        };

        let (user_tx, user_rx) = mpsc::channel::<VirtualUser>(workers);
        let user_rx = Arc::new(Mutex::new(user_rx));
        let (event_tx, mut event_rx) = mpsc::channel::<Event>(EVENT_QUEUE_CAPACITY);

        let producer = tokio::spawn(produce_users(
            self.config.clone(),
            user_tx,
            cancel_rx.clone(),
            rng_for(settings.seed, 0),
        ));

        let collector = tokio::spawn(async move {
            let mut events = Vec::new();
            while let Some(event) = event_rx.recv().await {
                events.push(event);
            }
            events
        });

        let mut join_set = JoinSet::new();
        for id in 0..workers {
            join_set.spawn(run_worker(
                id,
                self.config.clone(),
                self.service.clone(),
                user_rx.clone(),
                event_tx.clone(),
                cancel_rx.clone(),
                rng_for(settings.seed, id as u64 + 1),
            ));
        }
        drop(event_tx);

        let mut failure: Option<GeneratorError> = None;
        while let Some(joined) = join_set.join_next().await {
            let outcome = joined
                .map_err(|e| GeneratorError::Worker(format!("task join error: {}", e)))
                .and_then(|r| r);
            if let Err(e) = outcome {
                if failure.is_none() {
                    tracing::error!("[pipeline] Aborting run ({}): {}", e.category(), e);
                    cancel_tx.send_replace(true);
                    failure = Some(e);
                }
            }
        }

        forwarder.abort();
        let produced = producer
            .await
            .map_err(|e| GeneratorError::Worker(format!("producer join error: {}", e)))?;
        let events = collector
            .await
            .map_err(|e| GeneratorError::Worker(format!("collector join error: {}", e)))?;

        if let Some(e) = failure {
            return Err(e);
        }

        let cancelled = *cancel_tx.borrow();
        tracing::info!(
            "[pipeline] Finished: users={}/{} events={}{}",
            produced,
            total_users,
            events.len(),
            if cancelled { " (cancelled)" } else { "" }
        );
        Ok(Generated { events, cancelled })
    }
}

fn rng_for(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
        None => StdRng::from_entropy(),
    }
}

/// Resolves once `rx` reads `true`. Never resolves if the sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Returns the number of users handed to workers.
async fn produce_users(
    config: Arc<RunConfig>,
    users: mpsc::Sender<VirtualUser>,
    mut cancel: watch::Receiver<bool>,
    mut rng: StdRng,
) -> usize {
    let randoms = (0..config.settings.number_of_users).map(|_| VirtualUser::random(&config, &mut rng));
    let personas = config.personas.iter().cloned();
    let mut sent = 0;
    for user in randoms.chain(personas) {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            res = users.send(user) => {
                if res.is_err() {
                    break;
                }
                sent += 1;
            }
        }
    }
    sent
}

async fn run_worker<S: SearchService>(
    id: usize,
    config: Arc<RunConfig>,
    service: Arc<S>,
    users: Arc<Mutex<mpsc::Receiver<VirtualUser>>>,
    events: mpsc::Sender<Event>,
    mut cancel: watch::Receiver<bool>,
    mut rng: StdRng,
) -> Result<()> {
    loop {
        let next = {
            let mut rx = users.lock().await;
            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => None,
                user = rx.recv() => user,
            }
        };
        let Some(user) = next else {
            break;
        };
        tracing::debug!("[worker {}] user={} persona={}", id, user.token, user.is_persona());
        if !simulate_user(&user, &config, service.as_ref(), &events, &mut cancel, &mut rng).await? {
            break;
        }
    }
    Ok(())
}

/// Run every turn of one user. Returns `false` when the worker should stop.
async fn simulate_user<S: SearchService>(
    user: &VirtualUser,
    config: &RunConfig,
    service: &S,
    events: &mpsc::Sender<Event>,
    cancel: &mut watch::Receiver<bool>,
    rng: &mut StdRng,
) -> Result<bool> {
    let delay = config.settings.turn_delay;
    for turn in 0..config.settings.searches_per_user {
        if turn > 0 && !delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancelled(cancel) => return Ok(false),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if *cancel.borrow() {
            return Ok(false);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancelled(cancel) => return Ok(false),
            outcome = execute_turn(user, config, service, rng) => outcome,
        };
        match outcome {
            Ok(turn) => {
                for event in turn.into_events() {
                    if events.send(event).await.is_err() {
                        return Ok(false);
                    }
                }
            }
            Err(e) if e.is_transient() => {
                tracing::warn!("[worker] Turn {} for user {} failed: {}", turn + 1, user.token, e);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Generate, aggregate and (unless dry-run or cancelled) deliver.
pub async fn run<S, K>(config: RunConfig, service: S, sink: &K) -> Result<RunReport>
where
    S: SearchService,
    K: EventSink,
{
    let (_keep, shutdown) = watch::channel(false);
    run_until(config, service, sink, shutdown).await
}

pub async fn run_until<S, K>(
    config: RunConfig,
    service: S,
    sink: &K,
    shutdown: watch::Receiver<bool>,
) -> Result<RunReport>
where
    S: SearchService,
    K: EventSink,
{
    let simulation = Simulation::new(config, service);
    let Generated { events, cancelled } = simulation.generate_until(shutdown).await?;
    let config = simulation.config();

    let stats = compute_stats(&events, config.search_terms.terms().map(|t| t.term.as_str()))?;

    let delivered = if config.settings.dry_run {
        tracing::info!("[pipeline] Dry run, {} events not sent", events.len());
        0
    } else if cancelled {
        tracing::warn!("[pipeline] Run cancelled, {} events not sent", events.len());
        0
    } else {
        let deliverable: Vec<Event> = events.iter().filter(|e| e.is_deliverable()).cloned().collect();
        dispatch(&deliverable, sink, config.settings.chunk_size).await?
    };

    Ok(RunReport {
        events,
        stats,
        delivered,
        cancelled,
    })
}
