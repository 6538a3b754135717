//! Payment primitive interface and an in-memory implementation.
//!
//! Settlement forwards the whole attached payment to the current holder through
//! [`PaymentPrimitive::pay`]. A failed transfer aborts the settlement.

use crate::types::{AccountId, Money};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Payment result
pub type PaymentResult<T> = Result<T, PaymentError>;

/// Why a transfer did not happen
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentError {
    /// The payment provider refused the transfer
    #[error("transfer declined: {reason}")]
    Declined {
        /// Provider's reason
        reason: String,
    },

    /// The payer cannot cover the amount
    #[error("{account} holds {available}, needs {required}")]
    InsufficientBalance {
        /// Paying account
        account: AccountId,
        /// Balance at the time of the transfer
        available: Money,
        /// Amount requested
        required: Money,
    },

    /// Funds cannot be sent to an empty account
    #[error("invalid payment recipient")]
    InvalidRecipient,

    /// The recipient's balance would overflow
    #[error("recipient balance overflow")]
    Overflow,
}

/// A completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// Provider transaction reference
    pub transaction_id: String,
    /// Who paid
    pub payer: AccountId,
    /// Who was paid
    pub recipient: AccountId,
    /// Amount moved
    pub amount: Money,
}

/// Atomic transfer of an attached amount to a recipient
pub trait PaymentPrimitive: Send + Sync {
    /// Move `amount` from `payer` to `recipient`
    ///
    /// Either the full amount moves or nothing does.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError`] if the transfer cannot be completed.
    fn pay(
        &self,
        payer: &AccountId,
        recipient: &AccountId,
        amount: Money,
    ) -> PaymentResult<PaymentReceipt>;
}

/// In-memory balances for development and tests
///
/// Clones share the same balances. [`decline_all`](Self::decline_all) makes every
/// subsequent transfer fail, for exercising abort paths.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPayments {
    balances: Arc<RwLock<HashMap<AccountId, Money>>>,
    declining: Arc<AtomicBool>,
}

impl InMemoryPayments {
    /// Creates an empty set of balances
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `account`
    pub fn deposit(&self, account: &AccountId, amount: Money) {
        let mut balances = self.balances.write().unwrap_or_else(PoisonError::into_inner);
        let balance = balances.entry(account.clone()).or_default();
        *balance = balance.checked_add(amount).unwrap_or(Money::new(u64::MAX));
    }

    /// Current balance of `account`
    #[must_use]
    pub fn balance_of(&self, account: &AccountId) -> Money {
        let balances = self.balances.read().unwrap_or_else(PoisonError::into_inner);
        balances.get(account).copied().unwrap_or_default()
    }

    /// Switch declining of every transfer on or off
    pub fn decline_all(&self, declining: bool) {
        self.declining.store(declining, Ordering::SeqCst);
    }
}

impl PaymentPrimitive for InMemoryPayments {
    fn pay(
        &self,
        payer: &AccountId,
        recipient: &AccountId,
        amount: Money,
    ) -> PaymentResult<PaymentReceipt> {
        if self.declining.load(Ordering::SeqCst) {
            return Err(PaymentError::Declined {
                reason: "transfers are being declined".to_string(),
            });
        }
        if recipient.is_empty() {
            return Err(PaymentError::InvalidRecipient);
        }

        let mut balances = self.balances.write().unwrap_or_else(PoisonError::into_inner);
        let available = balances.get(payer).copied().unwrap_or_default();
        let remaining = available
            .checked_sub(amount)
            .ok_or_else(|| PaymentError::InsufficientBalance {
                account: payer.clone(),
                available,
                required: amount,
            })?;

        if payer != recipient {
            let credited = balances
                .get(recipient)
                .copied()
                .unwrap_or_default()
                .checked_add(amount)
                .ok_or(PaymentError::Overflow)?;
            balances.insert(payer.clone(), remaining);
            balances.insert(recipient.clone(), credited);
        }

        let transaction_id = format!("txn_{}", uuid::Uuid::new_v4());
        tracing::info!(
            %payer,
            %recipient,
            amount = amount.units(),
            transaction_id = %transaction_id,
            "Payment transferred"
        );

        Ok(PaymentReceipt {
            transaction_id,
            payer: payer.clone(),
            recipient: recipient.clone(),
            amount,
        })
    }
}
