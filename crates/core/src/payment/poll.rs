use std::time::Duration;

use crate::types::PaymentStatus;

/// How often and how long the status page polls a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

/// Outcome of [`PollPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// Poll again after the given delay.
    Continue(Duration),
    /// Stop polling.
    Stop,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 40,
        }
    }
}

impl PollPolicy {
    /// Decide whether to poll again after `attempts` checks.
    ///
    /// Only pending attempts are polled; awaiting verification waits on an
    /// admin, not on a provider.
    #[must_use]
    pub const fn decide(&self, attempts: u32, status: PaymentStatus) -> PollDecision {
        match status {
            PaymentStatus::Pending if attempts < self.max_attempts => {
                PollDecision::Continue(self.interval)
            }
            _ => PollDecision::Stop,
        }
    }

    /// True once `attempts` has reached the limit.
    #[must_use]
    pub const fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// Interval in whole seconds, for `hx-trigger="every Ns"`.
    #[must_use]
    pub const fn interval_secs(&self) -> u64 {
        let secs = self.interval.as_secs();
        if secs == 0 { 1 } else { secs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continues_while_pending() {
        let policy = PollPolicy::default();
        assert_eq!(
            policy.decide(0, PaymentStatus::Pending),
            PollDecision::Continue(Duration::from_secs(3))
        );
        assert_eq!(policy.decide(40, PaymentStatus::Pending), PollDecision::Stop);
        assert!(policy.is_exhausted(40));
    }

    #[test]
    fn test_stops_for_settled_statuses() {
        let policy = PollPolicy::default();
        for status in [
            PaymentStatus::Confirmed,
            PaymentStatus::Rejected,
            PaymentStatus::Expired,
            PaymentStatus::Error,
            PaymentStatus::AwaitingVerification,
        ] {
            assert_eq!(policy.decide(0, status), PollDecision::Stop);
        }
    }

    #[test]
    fn test_interval_secs_never_zero() {
        let policy = PollPolicy {
            interval: Duration::from_millis(200),
            max_attempts: 1,
        };
        assert_eq!(policy.interval_secs(), 1);
    }
}
