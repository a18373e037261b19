//! Core traits for abayes
//!
//! Decision policies (ab-inference) consume trial streams through
//! `TrialSource` and never depend on a concrete simulator or live
//! traffic splitter.

use crate::Result;
use crate::types::LegStats;

/// A stream of Bernoulli trial outcomes spread over named legs.
pub trait TrialSource {
    /// Run one trial on some leg and return its outcome.
    fn trial(&mut self) -> bool;

    /// Total trials across all legs.
    fn trials(&self) -> u64;

    /// Total successes across all legs.
    fn successes(&self) -> u64;

    /// Per-leg counters, in leg order (control first by convention).
    fn legs(&self) -> Vec<LegStats>;
}

/// A stopping rule that drives a `TrialSource` until it can name a winner.
pub trait DecisionPolicy {
    /// Policy name used in logs and reports.
    fn name(&self) -> &str;

    /// Consume trials from `source` until the policy is done (or its trial cap is hit).
    fn run(&mut self, source: &mut dyn TrialSource) -> Result<()>;

    /// Whether the policy has reached a terminal decision.
    fn done(&self) -> bool;

    /// Winning leg name, `None` while running or when no leg won.
    fn winner(&self) -> Option<&str>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alternating {
        n: u64,
    }

    impl TrialSource for Alternating {
        fn trial(&mut self) -> bool {
            self.n += 1;
            self.n % 2 == 0
        }

        fn trials(&self) -> u64 {
            self.n
        }

        fn successes(&self) -> u64 {
            self.n / 2
        }

        fn legs(&self) -> Vec<LegStats> {
            vec![LegStats::new("control", self.n, self.n / 2)]
        }
    }

    struct FirstSuccess {
        done: bool,
    }

    impl DecisionPolicy for FirstSuccess {
        fn name(&self) -> &str {
            "first-success"
        }

        fn run(&mut self, source: &mut dyn TrialSource) -> Result<()> {
            while !source.trial() {}
            self.done = true;
            Ok(())
        }

        fn done(&self) -> bool {
            self.done
        }

        fn winner(&self) -> Option<&str> {
            if self.done { Some("control") } else { None }
        }
    }

    #[test]
    fn test_policy_drives_source() {
        let mut source = Alternating { n: 0 };
        let mut policy = FirstSuccess { done: false };
        policy.run(&mut source).unwrap();
        assert!(policy.done());
        assert_eq!(policy.winner(), Some("control"));
        assert_eq!(source.trials(), 2);
        assert_eq!(source.successes(), 1);
        assert_eq!(source.legs()[0].trials, 2);
    }
}
