/// Replica topology discovery and caching
///
/// The cache holds the current list of secondaries as an immutable
/// snapshot. Refreshing builds a new list from the primary's destinations
/// document and swaps it in whole, so readers never see a half-updated list.
/// Refreshes are lazy, rate limited to one attempt per refresh interval,
/// and collapsed so that only one is in flight per cache.
pub mod document;
pub mod store;

pub use document::{ReplicationDestination, ReplicationDocument};
pub use store::{MemoryTopologyStore, NoopTopologyStore, TopologySource, TopologyStore};

use crate::core::{Endpoint, SharedClock};
use crate::health::HealthTracker;
use crate::routing::FailoverPolicy;
use crate::utils::server_hash;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, Runtime};

/// Default minimum time between two refresh attempts
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Document key the primary stores its replication destinations under
pub const REPLICATION_DESTINATIONS_KEY: &str = "Raven/Replication/Destinations";

/// Known secondaries at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    destinations: Vec<Endpoint>,
    refreshed_at: Option<Instant>,
}

impl Topology {
    pub fn new(destinations: Vec<Endpoint>, refreshed_at: Option<Instant>) -> Self {
        Self {
            destinations,
            refreshed_at,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn destinations(&self) -> &[Endpoint] {
        &self.destinations
    }

    pub fn refreshed_at(&self) -> Option<Instant> {
        self.refreshed_at
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TopologySettings {
    pub refresh_interval: Duration,
    pub document_key: String,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            document_key: REPLICATION_DESTINATIONS_KEY.to_string(),
        }
    }
}

/// What a call to `refresh_if_stale` ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Not due yet, or the policy never uses secondaries
    NotDue,
    /// Another caller holds the refresh gate
    InFlight,
    /// A new topology was published
    Refreshed,
    /// The primary answered without a usable document
    Unchanged,
    /// The primary could not be reached
    Failed,
}

struct RefreshState {
    seeded: bool,
}

pub struct TopologyCache {
    policy: FailoverPolicy,
    settings: TopologySettings,
    current: ArcSwap<Topology>,
    empty: Arc<Topology>,
    last_attempt: Mutex<Option<Instant>>,
    refresh_gate: tokio::sync::Mutex<RefreshState>,
    source: Arc<dyn TopologySource>,
    store: Arc<dyn TopologyStore>,
    tracker: Arc<HealthTracker>,
    clock: SharedClock,
    blocking: BlockingRuntime,
}

/// Runtime that drives refreshes for blocking callers, started on first use
#[derive(Default)]
struct BlockingRuntime {
    runtime: Mutex<Option<Runtime>>,
}

impl BlockingRuntime {
    fn handle(&self) -> io::Result<Handle> {
        let mut slot = self.runtime.lock();
        if let Some(runtime) = slot.as_ref() {
            return Ok(runtime.handle().clone());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("relevo-refresh")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        *slot = Some(runtime);
        Ok(handle)
    }
}

impl Drop for BlockingRuntime {
    fn drop(&mut self) {
        // The last client handle may go away inside an async context.
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

impl TopologyCache {
    pub fn new(
        policy: FailoverPolicy,
        settings: TopologySettings,
        source: Arc<dyn TopologySource>,
        store: Arc<dyn TopologyStore>,
        tracker: Arc<HealthTracker>,
        clock: SharedClock,
    ) -> Self {
        Self {
            policy,
            settings,
            current: ArcSwap::from_pointee(Topology::empty()),
            empty: Arc::new(Topology::empty()),
            last_attempt: Mutex::new(None),
            refresh_gate: tokio::sync::Mutex::new(RefreshState { seeded: false }),
            source,
            store,
            tracker,
            clock,
            blocking: BlockingRuntime::default(),
        }
    }

    /// Current topology; never blocks
    pub fn snapshot(&self) -> Arc<Topology> {
        if self.policy.fails_immediately() {
            return Arc::clone(&self.empty);
        }
        self.current.load_full()
    }

    /// Replace the snapshot wholesale
    pub fn replace(&self, destinations: Vec<Endpoint>) {
        for destination in &destinations {
            self.tracker.get_or_create(destination.address());
        }
        tracing::info!("Replication topology updated: {} destinations", destinations.len());
        self.current
            .store(Arc::new(Topology::new(destinations, Some(self.clock.now()))));
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        *self.last_attempt.lock()
    }

    pub fn is_stale(&self) -> bool {
        match self.last_attempt() {
            None => true,
            Some(last) => self.clock.now().saturating_duration_since(last) >= self.settings.refresh_interval,
        }
    }

    /// Refresh from the primary if the last attempt is older than the refresh interval
    pub async fn refresh_if_stale(&self, primary: &Endpoint) -> RefreshOutcome {
        if self.policy.fails_immediately() || !self.is_stale() {
            return RefreshOutcome::NotDue;
        }

        let mut gate = match self.refresh_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => return RefreshOutcome::InFlight,
        };
        // Someone may have finished a refresh between the check and the lock.
        if !self.is_stale() {
            return RefreshOutcome::NotDue;
        }

        let server_hash = server_hash(primary.address());

        if !gate.seeded {
            gate.seeded = true;
            let cached = self.store.load(&server_hash);
            if let Some(document) = cached.as_ref().and_then(ReplicationDocument::from_value) {
                tracing::debug!("Seeding replication topology from local cache for {}", primary);
                self.replace(document.endpoints());
            }
        }

        let outcome = match self
            .source
            .fetch_document(primary, &self.settings.document_key)
            .await
        {
            Ok(raw) => {
                // We just reached the primary.
                self.tracker.record_success(primary.address());
                let parsed = raw
                    .as_ref()
                    .and_then(|value| ReplicationDocument::from_value(value).map(|document| (value, document)));
                match parsed {
                    Some((value, document)) => {
                        self.replace(document.endpoints());
                        self.store.save(&server_hash, value);
                        RefreshOutcome::Refreshed
                    }
                    None => {
                        tracing::debug!("Primary {} has no replication destinations", primary);
                        RefreshOutcome::Unchanged
                    }
                }
            }
            Err(e) => {
                tracing::error!(
                    "Could not contact primary {} for new replication information: {}",
                    primary,
                    e
                );
                RefreshOutcome::Failed
            }
        };

        *self.last_attempt.lock() = Some(self.clock.now());
        outcome
    }

    /// Blocking variant of `refresh_if_stale`
    ///
    /// The fetch runs on a runtime owned by the cache, so sources may use
    /// tokio I/O and timers and the caller may be any thread, including one
    /// that belongs to another runtime.
    pub fn refresh_if_stale_blocking(self: &Arc<Self>, primary: &Endpoint) -> RefreshOutcome {
        if self.policy.fails_immediately() || !self.is_stale() {
            return RefreshOutcome::NotDue;
        }

        let handle = match self.blocking.handle() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Could not start the topology refresh runtime: {}", e);
                return RefreshOutcome::Failed;
            }
        };
        let cache = Arc::clone(self);
        let primary = primary.clone();
        let task = handle.spawn(async move { cache.refresh_if_stale(&primary).await });

        futures::executor::block_on(task).unwrap_or_else(|e| {
            tracing::error!("Topology refresh task failed: {}", e);
            RefreshOutcome::Failed
        })
    }

    /// Keep the topology fresh in the background
    pub async fn run_refresh_loop(self: Arc<Self>, primary: Endpoint) {
        let mut interval = tokio::time::interval(self.settings.refresh_interval);

        loop {
            interval.tick().await;
            let outcome = self.refresh_if_stale(&primary).await;
            tracing::debug!("Background topology refresh for {}: {:?}", primary, outcome);
        }
    }
}
