use crate::types::PaymentStatus;

/// Something we learned about a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The provider reports the payment as approved.
    ProviderApproved,
    /// The provider reports the payment as declined or canceled.
    ProviderDeclined,
    /// The provider has no final answer yet.
    ProviderPending,
    /// The customer uploaded a deposit proof.
    CustomerSubmittedProof,
    /// An admin confirmed the deposit arrived.
    AdminVerified,
    /// An admin found no matching deposit.
    AdminRejected,
    /// We could not reach the provider or could not read its answer.
    CheckFailed,
    /// The attempt ran out of time.
    TimedOut,
}

impl Observation {
    const fn is_provider_result(self) -> bool {
        matches!(
            self,
            Self::ProviderApproved | Self::ProviderDeclined | Self::ProviderPending
        )
    }
}

/// Result of applying an [`Observation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The attempt moves to a new status.
    Changed(PaymentStatus),
    /// Nothing to do.
    Unchanged,
    /// The observation contradicts a settled outcome. The status is kept.
    Conflict,
}

impl Transition {
    /// The status after applying the transition to `current`.
    #[must_use]
    pub const fn resolve(self, current: PaymentStatus) -> PaymentStatus {
        match self {
            Self::Changed(next) => next,
            Self::Unchanged | Self::Conflict => current,
        }
    }
}

/// Apply an observation to the current status.
///
/// Confirmed and rejected are final. A provider result that contradicts
/// them is reported as [`Transition::Conflict`] so the caller can log it;
/// anything else is ignored. Errors give way to any provider result. An
/// expired attempt still accepts a late approval since the money was taken.
#[must_use]
pub const fn transition(current: PaymentStatus, observation: Observation) -> Transition {
    use Observation as O;
    use PaymentStatus as S;

    match (current, observation) {
        (S::Confirmed, O::ProviderDeclined) | (S::Rejected, O::ProviderApproved) => {
            Transition::Conflict
        }
        (S::Confirmed | S::Rejected, _) => Transition::Unchanged,

        (S::Pending | S::Error | S::Expired, O::ProviderApproved)
        | (S::AwaitingVerification, O::AdminVerified) => Transition::Changed(S::Confirmed),

        (S::Pending | S::Error, O::ProviderDeclined)
        | (S::AwaitingVerification, O::AdminRejected) => Transition::Changed(S::Rejected),

        (S::Error, O::ProviderPending) => Transition::Changed(S::Pending),

        (S::Pending, O::CustomerSubmittedProof) => {
            Transition::Changed(S::AwaitingVerification)
        }
        (S::Pending, O::CheckFailed) => Transition::Changed(S::Error),
        (S::Pending, O::TimedOut) => Transition::Changed(S::Expired),

        _ => Transition::Unchanged,
    }
}

/// Which branch the payment status page renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentPhase {
    Pending,
    Confirmed,
    Rejected,
    Error,
}

impl PaymentPhase {
    #[must_use]
    pub const fn of(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending | PaymentStatus::AwaitingVerification => Self::Pending,
            PaymentStatus::Confirmed => Self::Confirmed,
            PaymentStatus::Rejected => Self::Rejected,
            PaymentStatus::Error | PaymentStatus::Expired => Self::Error,
        }
    }

    /// Customer-facing message for a status.
    #[must_use]
    pub const fn message(status: PaymentStatus) -> &'static str {
        match status {
            PaymentStatus::Pending => "We are waiting for the payment to be completed.",
            PaymentStatus::AwaitingVerification => {
                "We received your proof of payment. We will confirm it shortly."
            }
            PaymentStatus::Confirmed => "Your payment was confirmed. Thank you for your order!",
            PaymentStatus::Rejected => "Your payment was declined. You can try again.",
            PaymentStatus::Error => {
                "We could not confirm your payment. You can check again or retry."
            }
            PaymentStatus::Expired => {
                "This payment expired before it was completed. You can try again."
            }
        }
    }
}
