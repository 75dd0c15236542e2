/// Candidate ordering for a single dispatch
use crate::core::{Endpoint, OperationKind};
use crate::routing::FailoverPolicy;
use crate::topology::Topology;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin counter for read striping
///
/// Shared by every caller of one client; contention on it is what spreads
/// reads evenly across threads.
#[derive(Debug, Default)]
pub struct ReadStripeCounter {
    counter: AtomicUsize,
}

impl ReadStripeCounter {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    /// Take the next stripe value
    pub fn next(&self) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    pub fn current(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }
}

/// Index of the secondary a striped read should start with, `None` for the primary
pub fn stripe_index(stripe_value: usize, secondaries: usize) -> Option<usize> {
    let index = stripe_value % (secondaries + 1);
    (index < secondaries).then_some(index)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateRole {
    /// Secondary chosen by read striping, tried before the primary
    StripedSecondary,
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub endpoint: Endpoint,
    pub role: CandidateRole,
}

impl Candidate {
    pub fn is_primary(&self) -> bool {
        self.role == CandidateRole::Primary
    }
}

/// Ordered endpoints one dispatch may try
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePlan {
    candidates: Vec<Candidate>,
    withheld: usize,
}

impl CandidatePlan {
    pub fn build(
        policy: &FailoverPolicy,
        kind: OperationKind,
        primary: &Endpoint,
        topology: &Topology,
        stripe_value: usize,
    ) -> Self {
        // Secondaries the policy forbids for this kind are left out entirely.
        let (secondaries, withheld) = if policy.allows_secondary(kind) {
            (topology.destinations(), 0)
        } else {
            (&[][..], topology.len())
        };
        let striped = if policy.stripes_reads(kind) {
            stripe_index(stripe_value, secondaries.len())
        } else {
            None
        };

        let mut candidates = Vec::with_capacity(secondaries.len() + 1);
        if let Some(index) = striped {
            candidates.push(Candidate {
                endpoint: secondaries[index].clone(),
                role: CandidateRole::StripedSecondary,
            });
        }
        candidates.push(Candidate {
            endpoint: primary.clone(),
            role: CandidateRole::Primary,
        });
        candidates.extend(
            secondaries
                .iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != striped)
                .map(|(_, endpoint)| Candidate {
                    endpoint: endpoint.clone(),
                    role: CandidateRole::Secondary,
                }),
        );

        Self { candidates, withheld }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Known secondaries left out because the policy forbids them
    pub fn withheld_secondaries(&self) -> usize {
        self.withheld
    }

    pub fn addresses(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.endpoint.address()).collect()
    }
}
