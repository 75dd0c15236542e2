/// Failover-aware request execution
///
/// One algorithm serves both concurrency models. `execute` is async and
/// treats each call to the operation as a suspension point;
/// `execute_blocking` drives the same future to completion on the calling
/// thread with an operation whose futures are always ready. Both therefore
/// produce the same candidate order and the same health side effects.
use crate::core::{Endpoint, OperationKind};
use crate::error::{FailureClass, OperationError, RelevoError, RelevoResult};
use crate::health::HealthTracker;
use crate::routing::{CandidatePlan, FailoverPolicy};
use crate::topology::TopologyCache;
use std::future::Future;
use std::sync::Arc;

/// Outcome of a single attempt that did not propagate an error
enum Attempt<T> {
    Succeeded(T),
    /// The node looks down and the caller may fail over
    ServerDown { timed_out: bool },
}

pub struct RequestExecutor {
    policy: FailoverPolicy,
    tracker: Arc<HealthTracker>,
    topology: Arc<TopologyCache>,
}

impl RequestExecutor {
    pub fn new(policy: FailoverPolicy, tracker: Arc<HealthTracker>, topology: Arc<TopologyCache>) -> Self {
        Self {
            policy,
            tracker,
            topology,
        }
    }

    pub fn policy(&self) -> &FailoverPolicy {
        &self.policy
    }

    /// Run `operation` against the primary and its secondaries, failing over
    /// on server-down errors
    pub async fn execute<T, F, Fut>(
        &self,
        kind: OperationKind,
        primary: &Endpoint,
        stripe_value: usize,
        request_seq: u64,
        mut operation: F,
    ) -> RelevoResult<T>
    where
        F: FnMut(Endpoint) -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let topology = self.topology.snapshot();
        let plan = CandidatePlan::build(&self.policy, kind, primary, &topology, stripe_value);
        // A lone candidate's error is the caller's to see.
        let allow_swallow = plan.len() > 1;

        for (position, candidate) in plan.iter().enumerate() {
            let address = candidate.endpoint.address();
            let has_fallback = position + 1 < plan.len();

            if !self.tracker.should_attempt(address, request_seq, candidate.is_primary()) {
                // Presumed-down primary and the only alternatives are forbidden.
                if candidate.is_primary() && plan.withheld_secondaries() > 0 {
                    self.policy.ensure_secondary_allowed(kind)?;
                }
                continue;
            }

            let primary_ctx = if candidate.is_primary() { None } else { Some(primary) };
            let attempt = self
                .try_operation(&mut operation, &candidate.endpoint, primary_ctx, allow_swallow)
                .await?;

            match attempt {
                Attempt::Succeeded(value) => return Ok(value),
                Attempt::ServerDown { timed_out } => {
                    // A fresh node gets one more chance, unless it already
                    // burned a whole timeout or nothing is left to fall back to.
                    if !timed_out && has_fallback && self.tracker.is_first_failure(address) {
                        tracing::debug!("Retrying {} once before failing over", address);
                        let retry = self
                            .try_operation(&mut operation, &candidate.endpoint, primary_ctx, true)
                            .await?;
                        if let Attempt::Succeeded(value) = retry {
                            return Ok(value);
                        }
                    }
                    self.tracker.record_failure(address);
                }
            }
        }

        Err(RelevoError::Exhausted {
            attempted: plan.len(),
        })
    }

    /// Blocking variant of `execute`
    pub fn execute_blocking<T, F>(
        &self,
        kind: OperationKind,
        primary: &Endpoint,
        stripe_value: usize,
        request_seq: u64,
        mut operation: F,
    ) -> RelevoResult<T>
    where
        F: FnMut(Endpoint) -> Result<T, OperationError>,
    {
        futures::executor::block_on(self.execute(kind, primary, stripe_value, request_seq, move |endpoint| {
            futures::future::ready(operation(endpoint))
        }))
    }

    async fn try_operation<T, F, Fut>(
        &self,
        operation: &mut F,
        endpoint: &Endpoint,
        primary: Option<&Endpoint>,
        allow_swallow: bool,
    ) -> RelevoResult<Attempt<T>>
    where
        F: FnMut(Endpoint) -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let address = endpoint.address();
        // Secondaries advertised without credentials usually accept the primary's.
        let lender = primary.filter(|primary| primary.has_credentials() && !endpoint.has_credentials());
        let mut borrowing = lender.is_some();

        loop {
            let target = match lender {
                Some(primary) if borrowing => endpoint.with_credentials_of(primary),
                _ => endpoint.clone(),
            };

            let error = match operation(target).await {
                Ok(value) => {
                    self.tracker.record_success(address);
                    return Ok(Attempt::Succeeded(value));
                }
                Err(error) => error,
            };

            // One more try as advertised; the node is up, so nothing is counted.
            if borrowing && error.is_unauthorized() {
                tracing::warn!(
                    "{} rejected the primary's credentials, retrying once without them",
                    address
                );
                borrowing = false;
                continue;
            }

            if !allow_swallow {
                return Err(error.into());
            }

            return match error.classify() {
                FailureClass::ServerDown { timed_out } => {
                    tracing::debug!("{} looks down: {}", address, error);
                    Ok(Attempt::ServerDown { timed_out })
                }
                FailureClass::Unauthorized | FailureClass::Fatal => Err(error.into()),
            };
        }
    }
}
