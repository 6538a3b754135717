//! Rejection reasons for ticket operations.
//!
//! Every failure is reported to the caller with its specific kind. A rejected
//! operation leaves the ticket book, the ledger, and balances unchanged, except
//! for [`TicketError::RefundFailed`]: the payment moved and could not be sent
//! back. None of these are retried by the engine.

use crate::ledger::LedgerError;
use crate::payment::PaymentError;
use crate::types::{AccountId, Money, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a ticket operation was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketError {
    /// No ticket was issued under this identifier
    #[error("ticket {ticket_id} not found")]
    NotFound {
        /// The unknown identifier
        ticket_id: TicketId,
    },

    /// The actor lacks the required authority (admin for issuance, holder or delegate for trades)
    #[error("{actor} is not authorized for this operation")]
    Unauthorized {
        /// Who attempted the operation
        actor: AccountId,
    },

    /// The claimed identity does not match the identity bound to the ticket
    #[error("claimed identity does not match the bound identity")]
    IdentityMismatch,

    /// The waiting period since original issuance has not elapsed
    #[error("resale not allowed before {available_at}")]
    CooldownNotElapsed {
        /// Earliest time a resale may be requested
        available_at: DateTime<Utc>,
    },

    /// The resale cap is exhausted
    #[error("ticket already resold {trade_count} times (limit {limit})")]
    TradeLimitReached {
        /// Completed resales
        trade_count: u8,
        /// Maximum resales allowed
        limit: u8,
    },

    /// The proposed price exceeds the ticket's ceiling
    #[error("proposed price {proposed} exceeds ceiling {ceiling}")]
    PriceAboveCeiling {
        /// Price asked for
        proposed: Money,
        /// Current ceiling
        ceiling: Money,
    },

    /// The attached payment is below the ticket's price
    #[error("paid {paid}, ticket requires {required}")]
    InsufficientFunds {
        /// Amount attached
        paid: Money,
        /// Current price
        required: Money,
    },

    /// Every identifier has been assigned
    #[error("ticket identifier space exhausted")]
    IdentifierSpaceExhausted,

    /// The ownership ledger refused the change
    #[error("ledger rejected the operation: {0}")]
    Ledger(#[from] LedgerError),

    /// The payment primitive refused the transfer
    #[error("payment failed: {0}")]
    Payment(#[from] PaymentError),

    /// The ownership transfer failed after payment, and returning the payment failed too
    ///
    /// The ticket record and ownership are unchanged but `amount` stays with the
    /// previous holder; `transaction_id` identifies the payment to reconcile.
    #[error("ownership transfer failed ({transfer}); refund of {amount} for {transaction_id} failed ({refund})")]
    RefundFailed {
        /// Why the ledger refused the transfer
        transfer: LedgerError,
        /// Why the refund did not go through
        refund: PaymentError,
        /// Amount left with the previous holder
        amount: Money,
        /// Reference of the original payment
        transaction_id: String,
    },
}

impl TicketError {
    /// Stable label used for metrics and logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Unauthorized { .. } => "unauthorized",
            Self::IdentityMismatch => "identity_mismatch",
            Self::CooldownNotElapsed { .. } => "cooldown_not_elapsed",
            Self::TradeLimitReached { .. } => "trade_limit_reached",
            Self::PriceAboveCeiling { .. } => "price_above_ceiling",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::IdentifierSpaceExhausted => "identifier_space_exhausted",
            Self::Ledger(_) => "ledger",
            Self::Payment(_) => "payment",
            Self::RefundFailed { .. } => "refund_failed",
        }
    }
}
