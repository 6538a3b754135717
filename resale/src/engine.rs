//! The ticket engine: the store-backed entry point for every operation.
//!
//! Each command goes through the [`Store`], which applies it under its write lock
//! and broadcasts the outcome event. The engine waits for the outcome carrying
//! the command's [`RequestId`] and turns it into a `Result`.
//!
//! Two calls are never atomic as a pair: a successful
//! [`validate_trade_request`](TicketEngine::validate_trade_request) reserves
//! nothing, and a later [`settle_trade`](TicketEngine::settle_trade) runs its own
//! checks against whatever the state is by then.

use crate::admin::AdministrativeGate;
use crate::aggregates::{NewTicket, TicketAction, TicketEnvironment, TicketReducer};
use crate::config::RuntimeConfig;
use crate::error::TicketError;
use crate::ledger::OwnershipLedger;
use crate::notifications::{BroadcastSink, TicketNotification};
use crate::payment::PaymentPrimitive;
use crate::policy::ResalePolicy;
use crate::types::{AccountId, Money, RequestId, TicketId, TicketRecord, TicketState};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use ticket_resale_core::environment::Clock;
use ticket_resale_runtime::{Store, StoreConfig, StoreError};
use tokio::sync::broadcast;

/// Errors returned by [`TicketEngine`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The command was refused; nothing changed
    #[error(transparent)]
    Rejected(#[from] TicketError),

    /// The store could not process the command or its outcome was not observed
    ///
    /// On [`StoreError::Timeout`] the command may still have been applied.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The outcome event did not match the command
    #[error("unexpected outcome for request {0}")]
    UnexpectedOutcome(RequestId),
}

impl EngineError {
    /// The rejection reason, if the command was refused
    #[must_use]
    pub const fn rejection(&self) -> Option<&TicketError> {
        match self {
            Self::Rejected(error) => Some(error),
            Self::Store(_) | Self::UnexpectedOutcome(_) => None,
        }
    }
}

type TicketStore = Store<TicketState, TicketAction, TicketEnvironment, TicketReducer>;

/// Issuance, trade validation, settlement, and queries over one ticket book
pub struct TicketEngine {
    store: TicketStore,
    request_timeout: Duration,
    notifications: Option<BroadcastSink>,
}

impl TicketEngine {
    /// Creates an engine over an empty ticket book
    #[must_use]
    pub fn new(environment: TicketEnvironment, runtime: &RuntimeConfig) -> Self {
        let config = StoreConfig::default().with_broadcast_capacity(runtime.broadcast_capacity);
        Self {
            store: Store::with_config(TicketState::new(), TicketReducer::new(), environment, config),
            request_timeout: runtime.request_timeout(),
            notifications: None,
        }
    }

    /// Creates an engine that publishes notifications on a broadcast channel
    ///
    /// Observers attach with [`subscribe_notifications`](Self::subscribe_notifications).
    #[must_use]
    pub fn broadcasting(
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn OwnershipLedger>,
        payments: Arc<dyn PaymentPrimitive>,
        admin: Arc<dyn AdministrativeGate>,
        policy: ResalePolicy,
        runtime: &RuntimeConfig,
    ) -> Self {
        let sink = BroadcastSink::new(runtime.broadcast_capacity);
        let environment =
            TicketEnvironment::new(clock, ledger, payments, admin, Arc::new(sink.clone()))
                .with_policy(policy);
        Self {
            notifications: Some(sink),
            ..Self::new(environment, runtime)
        }
    }

    /// Issue a ticket to `ticket.buyer`
    ///
    /// # Errors
    ///
    /// [`TicketError::Unauthorized`] if `caller` is not an administrator;
    /// [`TicketError::Ledger`] if the ledger refuses the mint.
    pub async fn issue(&self, caller: &AccountId, ticket: NewTicket) -> Result<TicketId, EngineError> {
        let request_id = RequestId::new();
        let command = TicketAction::IssueTicket {
            request_id,
            caller: caller.clone(),
            ticket,
        };

        match self.execute(command).await? {
            TicketAction::TicketIssued { ticket_id, .. } => Ok(ticket_id),
            _ => Err(EngineError::UnexpectedOutcome(request_id)),
        }
    }

    /// Advisory resale check; changes nothing and reserves nothing
    ///
    /// # Errors
    ///
    /// The first failing check: `NotFound`, `Unauthorized`, `IdentityMismatch`,
    /// `CooldownNotElapsed`, `TradeLimitReached`, `PriceAboveCeiling`.
    pub async fn validate_trade_request(
        &self,
        ticket_id: TicketId,
        proposed_price: Money,
        claimed_identity: &str,
        requester: &AccountId,
    ) -> Result<(), EngineError> {
        let request_id = RequestId::new();
        let command = TicketAction::RequestTrade {
            request_id,
            ticket_id,
            proposed_price,
            claimed_identity: claimed_identity.to_string(),
            requester: requester.clone(),
        };

        match self.execute(command).await? {
            TicketAction::TradeRequestAccepted { .. } => Ok(()),
            _ => Err(EngineError::UnexpectedOutcome(request_id)),
        }
    }

    /// Pay `paid_amount` from `caller` to the current holder and move the
    /// ticket to `new_holder`
    ///
    /// Returns the record after the resale.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Unauthorized`, `TradeLimitReached`, `InsufficientFunds`, or
    /// the ledger or payment failure that aborted the settlement.
    pub async fn settle_trade(
        &self,
        ticket_id: TicketId,
        new_holder: &AccountId,
        paid_amount: Money,
        caller: &AccountId,
    ) -> Result<TicketRecord, EngineError> {
        let request_id = RequestId::new();
        let command = TicketAction::SettleTrade {
            request_id,
            ticket_id,
            new_holder: new_holder.clone(),
            paid_amount,
            caller: caller.clone(),
        };

        match self.execute(command).await? {
            TicketAction::TradeSettled { record, .. } => Ok(record),
            _ => Err(EngineError::UnexpectedOutcome(request_id)),
        }
    }

    /// Full record of a ticket
    ///
    /// # Errors
    ///
    /// [`TicketError::NotFound`] for an identifier that was never issued.
    pub async fn get_details(&self, ticket_id: TicketId) -> Result<TicketRecord, EngineError> {
        let record = self.store.state(|state| state.record(ticket_id).cloned()).await?;
        Ok(record)
    }

    /// Tickets whose recorded holder is `holder`, in identifier order
    pub async fn tickets_held_by(&self, holder: &AccountId) -> Vec<(TicketId, TicketRecord)> {
        self.store
            .state(|state| {
                state
                    .held_by(holder)
                    .into_iter()
                    .map(|(id, record)| (id, record.clone()))
                    .collect()
            })
            .await
    }

    /// Number of tickets issued so far
    pub async fn total_issued(&self) -> u64 {
        self.store.state(TicketState::issued_count).await
    }

    /// Subscribe to notifications published from now on
    ///
    /// `None` unless the engine was built with [`broadcasting`](Self::broadcasting).
    #[must_use]
    pub fn subscribe_notifications(&self) -> Option<broadcast::Receiver<TicketNotification>> {
        self.notifications.as_ref().map(BroadcastSink::subscribe)
    }

    /// Stop accepting commands and wait for pending deliveries
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownTimeout`] if deliveries are still running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), EngineError> {
        self.store.shutdown(timeout).await?;
        Ok(())
    }

    async fn execute(&self, command: TicketAction) -> Result<TicketAction, EngineError> {
        let request_id = command.request_id();
        let outcome = self
            .store
            .send_and_wait_for(
                command,
                move |action| action.is_event() && action.request_id() == request_id,
                self.request_timeout,
            )
            .await?;

        match outcome {
            TicketAction::CommandRejected { error, .. } => Err(EngineError::Rejected(error)),
            accepted => Ok(accepted),
        }
    }
}
