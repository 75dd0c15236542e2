/// Request routing: failover policy, candidate ordering and execution
pub mod executor;
pub mod plan;
pub mod policy;

pub use executor::RequestExecutor;
pub use plan::{stripe_index, Candidate, CandidatePlan, CandidateRole, ReadStripeCounter};
pub use policy::{FailoverBehavior, FailoverPolicy};
