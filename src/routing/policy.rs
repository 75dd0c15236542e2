/// Failover policy: which operations may reach secondaries

use crate::core::OperationKind;
use crate::error::{RelevoError, RelevoResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base failover behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverBehavior {
    /// Never use secondaries
    FailImmediately,
    /// Reads may fail over to secondaries, writes may not
    AllowReadsFromSecondaries,
    /// Reads and writes may fail over to secondaries
    AllowReadsFromSecondariesAndWritesToSecondaries,
}

impl fmt::Display for FailoverBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailoverBehavior::FailImmediately => write!(f, "FailImmediately"),
            FailoverBehavior::AllowReadsFromSecondaries => write!(f, "AllowReadsFromSecondaries"),
            FailoverBehavior::AllowReadsFromSecondariesAndWritesToSecondaries => {
                write!(f, "AllowReadsFromSecondariesAndWritesToSecondaries")
            }
        }
    }
}

/// Behavior plus the orthogonal read-striping flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverPolicy {
    behavior: FailoverBehavior,
    read_from_all_servers: bool,
}

impl FailoverPolicy {
    pub fn new(behavior: FailoverBehavior, read_from_all_servers: bool) -> Self {
        Self {
            behavior,
            read_from_all_servers,
        }
    }

    pub fn behavior(&self) -> FailoverBehavior {
        self.behavior
    }

    pub fn read_from_all_servers(&self) -> bool {
        self.read_from_all_servers
    }

    /// Plain `FailImmediately`: secondaries are never considered at all
    pub fn fails_immediately(&self) -> bool {
        self.behavior == FailoverBehavior::FailImmediately && !self.read_from_all_servers
    }

    /// Whether reads of this kind are striped round-robin across all nodes
    pub fn stripes_reads(&self, kind: OperationKind) -> bool {
        self.read_from_all_servers && kind.is_read()
    }

    pub fn allows_secondary(&self, kind: OperationKind) -> bool {
        match self.behavior {
            FailoverBehavior::AllowReadsFromSecondariesAndWritesToSecondaries => true,
            FailoverBehavior::AllowReadsFromSecondaries => kind.is_read(),
            FailoverBehavior::FailImmediately => self.read_from_all_servers && kind.is_read(),
        }
    }

    pub fn ensure_secondary_allowed(&self, kind: OperationKind) -> RelevoResult<()> {
        if self.allows_secondary(kind) {
            return Ok(());
        }
        Err(RelevoError::PolicyViolation {
            kind,
            policy: self.to_string(),
        })
    }
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self::new(FailoverBehavior::AllowReadsFromSecondaries, false)
    }
}

impl fmt::Display for FailoverPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.behavior)?;
        if self.read_from_all_servers {
            write!(f, ", ReadFromAllServers")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OperationKind::{Read, Write};

    #[test]
    fn test_secondary_eligibility() {
        let reads = FailoverPolicy::new(FailoverBehavior::AllowReadsFromSecondaries, false);
        assert!(reads.allows_secondary(Read));
        assert!(!reads.allows_secondary(Write));

        let all = FailoverPolicy::new(
            FailoverBehavior::AllowReadsFromSecondariesAndWritesToSecondaries,
            false,
        );
        assert!(all.allows_secondary(Read));
        assert!(all.allows_secondary(Write));

        let none = FailoverPolicy::new(FailoverBehavior::FailImmediately, false);
        assert!(none.fails_immediately());
        assert!(!none.allows_secondary(Read));
        assert!(!none.allows_secondary(Write));
    }

    #[test]
    fn test_read_striping_flag_on_fail_immediately() {
        let striped = FailoverPolicy::new(FailoverBehavior::FailImmediately, true);
        assert!(!striped.fails_immediately());
        assert!(striped.stripes_reads(Read));
        assert!(!striped.stripes_reads(Write));
        assert!(striped.allows_secondary(Read));
        assert!(!striped.allows_secondary(Write));
    }

    #[test]
    fn test_policy_violation_names_policy() {
        let reads = FailoverPolicy::new(FailoverBehavior::AllowReadsFromSecondaries, true);
        let error = reads.ensure_secondary_allowed(Write).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Could not send write operation to secondary node, failover behavior is: \
             AllowReadsFromSecondaries, ReadFromAllServers"
        );
        assert!(reads.ensure_secondary_allowed(Read).is_ok());
    }
}
