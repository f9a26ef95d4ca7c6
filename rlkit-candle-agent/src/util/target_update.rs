use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Schedule of target network synchronization.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum TargetUpdate {
    /// Polyak averaging with coefficient `tau` every `interval` policy updates.
    Soft { tau: f64, interval: usize },

    /// Copies the online parameters every `period` policy updates.
    Hard { period: usize },
}

impl TargetUpdate {
    /// Fails on a zero interval or period, or `tau` outside `(0, 1]`.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Soft { tau, interval } => {
                anyhow::ensure!(*interval > 0, "interval of soft target update must be positive");
                anyhow::ensure!(
                    *tau > 0.0 && *tau <= 1.0,
                    "tau must be in (0, 1], got {}",
                    tau
                );
            }
            Self::Hard { period } => {
                anyhow::ensure!(*period > 0, "period of hard target update must be positive");
            }
        }
        Ok(())
    }

    /// Coefficient of a single synchronization.
    pub fn tau(&self) -> f64 {
        match self {
            Self::Soft { tau, .. } => *tau,
            Self::Hard { .. } => 1.0,
        }
    }

    /// Whether the schedule asks for a sync after `policy_updates` updates.
    pub fn is_due(&self, policy_updates: usize) -> bool {
        let interval = match self {
            Self::Soft { interval, .. } => *interval,
            Self::Hard { period } => *period,
        };
        interval > 0 && policy_updates % interval == 0
    }

    /// Resolves an explicit request against the schedule.
    pub fn should_update(&self, policy_updates: usize, update_target: Option<bool>) -> bool {
        update_target.unwrap_or_else(|| self.is_due(policy_updates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule() {
        let soft = TargetUpdate::Soft {
            tau: 0.005,
            interval: 2,
        };
        assert!(!soft.is_due(1));
        assert!(soft.is_due(2));
        assert_eq!(soft.tau(), 0.005);

        let hard = TargetUpdate::Hard { period: 3 };
        assert_eq!(hard.tau(), 1.0);
        assert!(hard.is_due(6));
        assert!(!hard.is_due(7));

        assert!(soft.should_update(1, Some(true)));
        assert!(!soft.should_update(2, Some(false)));
        assert!(soft.should_update(4, None));
    }

    #[test]
    fn test_validate() {
        assert!(TargetUpdate::Soft {
            tau: 1.0,
            interval: 1
        }
        .validate()
        .is_ok());
        assert!(TargetUpdate::Hard { period: 1 }.validate().is_ok());

        assert!(TargetUpdate::Soft {
            tau: 0.005,
            interval: 0
        }
        .validate()
        .is_err());
        assert!(TargetUpdate::Hard { period: 0 }.validate().is_err());
        for tau in [0.0, -0.1, 1.5, f64::NAN] {
            assert!(TargetUpdate::Soft { tau, interval: 1 }.validate().is_err());
        }
    }
}
