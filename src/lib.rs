pub mod config;
pub mod error;
/// Relevo - failover-aware request routing for replicated document store clients
///
/// Given a primary node and the replicas it advertises, relevo decides for
/// every outgoing operation which node to contact, in which order to fail
/// over, and when a failing node deserves another probe.
///
/// The pieces, leaf first:
/// 1. `core`: endpoint identity and time source
/// 2. `health`: per-endpoint failure records and probe scheduling
/// 3. `topology`: the cached replica list, refreshed from the primary
/// 4. `routing`: failover policy, candidate ordering and the executor
pub mod core;
pub mod health;
pub mod logging;
pub mod routing;
pub mod topology;
pub mod utils;

pub use crate::config::Config;
pub use crate::core::{Credentials, Endpoint, OperationKind};
pub use crate::error::{OperationError, RelevoError, RelevoResult};
pub use crate::health::{HealthTracker, StatusChange};
pub use crate::routing::{FailoverBehavior, FailoverPolicy, ReadStripeCounter, RequestExecutor};
pub use crate::topology::{RefreshOutcome, Topology, TopologyCache, TopologySource, TopologyStore};

use crate::core::{SharedClock, SystemClock};
use crate::topology::NoopTopologyStore;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Replicated-store client router
///
/// Owns the health tracker, topology cache and counters for one primary.
/// Every `execute` call refreshes the topology if it is stale, takes the
/// next request sequence number (and a stripe value for striped reads) and
/// hands the operation to the executor.
pub struct Relevo {
    primary: Endpoint,
    tracker: Arc<HealthTracker>,
    topology: Arc<TopologyCache>,
    executor: RequestExecutor,
    stripes: Arc<ReadStripeCounter>,
    requests: AtomicU64,
}

pub struct RelevoBuilder {
    primary: Endpoint,
    source: Arc<dyn TopologySource>,
    config: Config,
    store: Arc<dyn TopologyStore>,
    clock: SharedClock,
    stripes: Option<Arc<ReadStripeCounter>>,
}

impl RelevoBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn TopologyStore>) -> Self {
        self.store = store;
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Share one stripe counter between several clients
    pub fn stripe_counter(mut self, stripes: Arc<ReadStripeCounter>) -> Self {
        self.stripes = Some(stripes);
        self
    }

    pub fn build(self) -> RelevoResult<Relevo> {
        self.config.validate()?;

        let policy = self.config.failover_policy();
        let settings = self.config.topology_settings();
        let tracker = Arc::new(HealthTracker::with_clock(
            self.config.max_failover_check_period(),
            Arc::clone(&self.clock),
        ));

        tracing::info!(
            "Routing for primary {} with failover behavior {}, topology refresh every {}",
            self.primary,
            policy,
            utils::format_duration(settings.refresh_interval)
        );

        let topology = Arc::new(TopologyCache::new(
            policy,
            settings,
            self.source,
            self.store,
            Arc::clone(&tracker),
            self.clock,
        ));
        let executor = RequestExecutor::new(policy, Arc::clone(&tracker), Arc::clone(&topology));

        Ok(Relevo {
            primary: self.primary,
            tracker,
            topology,
            executor,
            stripes: self.stripes.unwrap_or_default(),
            requests: AtomicU64::new(0),
        })
    }
}

impl Relevo {
    pub fn builder(primary: Endpoint, source: Arc<dyn TopologySource>) -> RelevoBuilder {
        RelevoBuilder {
            primary,
            source,
            config: Config::default(),
            store: Arc::new(NoopTopologyStore),
            clock: Arc::new(SystemClock),
            stripes: None,
        }
    }

    pub async fn execute<T, F, Fut>(&self, kind: OperationKind, operation: F) -> RelevoResult<T>
    where
        F: FnMut(Endpoint) -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        self.topology.refresh_if_stale(&self.primary).await;
        let (request_seq, stripe_value) = self.next_dispatch(kind);
        self.executor
            .execute(kind, &self.primary, stripe_value, request_seq, operation)
            .await
    }

    pub fn execute_blocking<T, F>(&self, kind: OperationKind, operation: F) -> RelevoResult<T>
    where
        F: FnMut(Endpoint) -> Result<T, OperationError>,
    {
        self.topology.refresh_if_stale_blocking(&self.primary);
        let (request_seq, stripe_value) = self.next_dispatch(kind);
        self.executor
            .execute_blocking(kind, &self.primary, stripe_value, request_seq, operation)
    }

    /// Start refreshing the topology in the background; needs a tokio runtime
    pub fn spawn_topology_refresh(&self) -> tokio::task::JoinHandle<()> {
        let topology = Arc::clone(&self.topology);
        tokio::spawn(topology.run_refresh_loop(self.primary.clone()))
    }

    fn next_dispatch(&self, kind: OperationKind) -> (u64, usize) {
        let request_seq = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        let stripe_value = if self.executor.policy().stripes_reads(kind) {
            self.stripes.next()
        } else {
            0
        };
        (request_seq, stripe_value)
    }

    pub fn primary(&self) -> &Endpoint {
        &self.primary
    }

    pub fn policy(&self) -> &FailoverPolicy {
        self.executor.policy()
    }

    pub fn tracker(&self) -> &Arc<HealthTracker> {
        &self.tracker
    }

    pub fn topology(&self) -> &Arc<TopologyCache> {
        &self.topology
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.tracker.subscribe()
    }

    pub fn force_check(&self, address: &str, enabled: bool) {
        self.tracker.force_check(address, enabled);
    }

    pub fn failure_count(&self, address: &str) -> u64 {
        self.tracker.failure_count(address)
    }
}
