//! Payment reconciliation.
//!
//! A checkout creates one payment attempt per [`ClientTransactionId`]. The
//! attempt's [`PaymentStatus`](crate::PaymentStatus) only ever moves through
//! [`transition`], whatever the source of the observation: a provider
//! redirect, a poll, a webhook, a customer proof upload or an admin review.
//! Because every source funnels through the same pure function, duplicate
//! redirects, replayed webhooks and reloaded status pages cannot move an
//! attempt backwards.

mod client_tx;
mod poll;
mod state;

pub use client_tx::{ClientTransactionId, ClientTransactionIdError};
pub use poll::{PollDecision, PollPolicy};
pub use state::{Observation, PaymentPhase, Transition, transition};
