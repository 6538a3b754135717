//! Ticket aggregate.
//!
//! Every command is applied in full inside `reduce`: checks, collaborator calls,
//! and the record change all happen while the store holds its write lock, so no
//! two commands interleave and a rejected command leaves nothing behind.
//!
//! The reducer answers each command with exactly one outcome event carrying the
//! command's [`RequestId`]. Outcome events are applied when they are produced;
//! when they come back through the store as feedback they are already facts and
//! change nothing.
//!
//! Observer notifications are returned as fire-and-forget effects and delivered
//! only after the state change is complete.

use crate::admin::AdministrativeGate;
use crate::error::TicketError;
use crate::ledger::{LedgerError, OwnershipLedger};
use crate::metrics;
use crate::notifications::{NotificationSink, TicketNotification};
use crate::payment::{PaymentPrimitive, PaymentReceipt};
use crate::policy::ResalePolicy;
use crate::types::{
    AccountId, EventDetails, Money, RequestId, TicketId, TicketRecord, TicketState,
    VerifiedIdentity,
};
use crate::validation::{self, TradeRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ticket_resale_core::{effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Everything needed to issue a ticket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    /// First holder
    pub buyer: AccountId,
    /// Identity token bound to the first purchase
    pub verified_identity: VerifiedIdentity,
    /// Issue price, the first resale ceiling
    pub price: Money,
    /// Event metadata
    pub event: EventDetails,
    /// Buyer name printed on the ticket
    pub buyer_name: String,
}

/// Actions for the ticket aggregate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketAction {
    // Commands
    /// Issue a new ticket (administrators only)
    IssueTicket {
        /// Correlation for the outcome
        request_id: RequestId,
        /// Who asks for the issuance
        caller: AccountId,
        /// The ticket to create
        ticket: NewTicket,
    },

    /// Check whether a resale may be coordinated; changes nothing
    RequestTrade {
        /// Correlation for the outcome
        request_id: RequestId,
        /// Ticket to resell
        ticket_id: TicketId,
        /// Price asked for
        proposed_price: Money,
        /// Identity token presented by the requester
        claimed_identity: String,
        /// Who is asking
        requester: AccountId,
    },

    /// Pay the current holder and hand the ticket to `new_holder`
    SettleTrade {
        /// Correlation for the outcome
        request_id: RequestId,
        /// Ticket to resell
        ticket_id: TicketId,
        /// Holder after the resale
        new_holder: AccountId,
        /// Payment attached by the caller
        paid_amount: Money,
        /// Who pays and settles
        caller: AccountId,
    },

    // Events
    /// A ticket was issued
    TicketIssued {
        /// Correlation of the command
        request_id: RequestId,
        /// Identifier assigned
        ticket_id: TicketId,
        /// Stored record
        record: TicketRecord,
    },

    /// A trade request passed every check
    TradeRequestAccepted {
        /// Correlation of the command
        request_id: RequestId,
        /// Ticket concerned
        ticket_id: TicketId,
        /// Who asked
        requester: AccountId,
        /// Price asked for
        proposed_price: Money,
    },

    /// A resale was settled
    TradeSettled {
        /// Correlation of the command
        request_id: RequestId,
        /// Ticket concerned
        ticket_id: TicketId,
        /// Holder that was paid
        previous_holder: AccountId,
        /// Record after the resale
        record: TicketRecord,
        /// Payment that went to the previous holder
        receipt: PaymentReceipt,
    },

    /// A command was refused; nothing changed
    CommandRejected {
        /// Correlation of the command
        request_id: RequestId,
        /// Why
        error: TicketError,
    },
}

impl TicketAction {
    /// Correlation identifier carried by every action
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        match self {
            Self::IssueTicket { request_id, .. }
            | Self::RequestTrade { request_id, .. }
            | Self::SettleTrade { request_id, .. }
            | Self::TicketIssued { request_id, .. }
            | Self::TradeRequestAccepted { request_id, .. }
            | Self::TradeSettled { request_id, .. }
            | Self::CommandRejected { request_id, .. } => *request_id,
        }
    }

    /// Whether this is a command
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(
            self,
            Self::IssueTicket { .. } | Self::RequestTrade { .. } | Self::SettleTrade { .. }
        )
    }

    /// Whether this is an outcome event
    #[must_use]
    pub const fn is_event(&self) -> bool {
        !self.is_command()
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Collaborators of the ticket reducer
#[derive(Clone)]
pub struct TicketEnvironment {
    /// Time source for issuance and cooldown checks
    pub clock: Arc<dyn Clock>,
    /// Ownership facts and transfer authorizations
    pub ledger: Arc<dyn OwnershipLedger>,
    /// Moves settlement payments
    pub payments: Arc<dyn PaymentPrimitive>,
    /// Decides who may issue
    pub admin: Arc<dyn AdministrativeGate>,
    /// Receives observer notifications
    pub notifications: Arc<dyn NotificationSink>,
    /// Resale limits
    pub policy: ResalePolicy,
}

impl TicketEnvironment {
    /// Creates an environment with the default [`ResalePolicy`]
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn OwnershipLedger>,
        payments: Arc<dyn PaymentPrimitive>,
        admin: Arc<dyn AdministrativeGate>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            clock,
            ledger,
            payments,
            admin,
            notifications,
            policy: ResalePolicy::default(),
        }
    }

    /// Replace the resale policy
    #[must_use]
    pub const fn with_policy(mut self, policy: ResalePolicy) -> Self {
        self.policy = policy;
        self
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the ticket aggregate
#[derive(Clone, Debug, Default)]
pub struct TicketReducer;

type Effects = SmallVec<[Effect<TicketAction>; 4]>;

impl TicketReducer {
    /// Creates a new `TicketReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn issue(
        state: &mut TicketState,
        caller: &AccountId,
        ticket: NewTicket,
        env: &TicketEnvironment,
    ) -> Result<(TicketId, TicketRecord), TicketError> {
        if !env.admin.is_admin(caller) {
            return Err(TicketError::Unauthorized {
                actor: caller.clone(),
            });
        }

        let ticket_id = state.next_id()?;
        env.ledger.mint(&ticket.buyer, ticket_id)?;

        let record = TicketRecord::issued(
            ticket.buyer,
            ticket.verified_identity,
            ticket.price,
            ticket.event,
            ticket.buyer_name,
            env.clock.now(),
        );
        Ok((ticket_id, record))
    }

    fn request_trade(
        state: &TicketState,
        request: &TradeRequest<'_>,
        env: &TicketEnvironment,
    ) -> Result<(), TicketError> {
        let record = state.record(request.ticket_id)?;
        validation::validate_trade_request(
            record,
            request,
            env.ledger.as_ref(),
            &env.policy,
            env.clock.now(),
        )
    }

    /// Pay the holder, then move ownership. If the ledger refuses the move the
    /// payment is sent back, so either both happen or neither does.
    fn settle(
        state: &TicketState,
        ticket_id: TicketId,
        new_holder: AccountId,
        paid_amount: Money,
        caller: &AccountId,
        env: &TicketEnvironment,
    ) -> Result<(AccountId, TicketRecord, PaymentReceipt), TicketError> {
        let record = state.record(ticket_id)?;
        validation::validate_settlement(
            record,
            ticket_id,
            caller,
            paid_amount,
            env.ledger.as_ref(),
            &env.policy,
        )?;

        if new_holder.is_empty() {
            return Err(LedgerError::InvalidRecipient.into());
        }
        let previous_holder = env.ledger.owner_of(ticket_id)?;

        let receipt = env.payments.pay(caller, &previous_holder, paid_amount)?;

        if let Err(error) = env
            .ledger
            .transfer_ownership(&previous_holder, &new_holder, ticket_id)
        {
            if let Err(refund_error) = env.payments.pay(&previous_holder, caller, paid_amount) {
                tracing::error!(
                    %ticket_id,
                    transaction_id = %receipt.transaction_id,
                    %refund_error,
                    "Refund after failed ownership transfer did not go through"
                );
                return Err(TicketError::RefundFailed {
                    transfer: error,
                    refund: refund_error,
                    amount: paid_amount,
                    transaction_id: receipt.transaction_id,
                });
            }
            return Err(error.into());
        }

        let updated = TicketRecord {
            price: paid_amount,
            holder: new_holder,
            bound_identity: VerifiedIdentity::unbound(),
            trade_count: record.trade_count.saturating_add(1),
            ..record.clone()
        };
        Ok((previous_holder, updated, receipt))
    }

    /// Applies an outcome event produced by a command
    fn apply_event(state: &mut TicketState, action: &TicketAction) {
        match action {
            TicketAction::TicketIssued {
                ticket_id, record, ..
            }
            | TicketAction::TradeSettled {
                ticket_id, record, ..
            } => {
                state.put(*ticket_id, record.clone());
            },

            // Nothing to store
            TicketAction::TradeRequestAccepted { .. }
            | TicketAction::CommandRejected { .. }
            | TicketAction::IssueTicket { .. }
            | TicketAction::RequestTrade { .. }
            | TicketAction::SettleTrade { .. } => {},
        }
    }

    fn accepted(
        state: &mut TicketState,
        outcome: TicketAction,
        notification: TicketNotification,
        env: &TicketEnvironment,
    ) -> Effects {
        Self::apply_event(state, &outcome);

        let sink = Arc::clone(&env.notifications);
        smallvec![
            Effect::fire_and_forget(move || sink.publish(notification)),
            Effect::send(outcome),
        ]
    }

    fn rejected(request_id: RequestId, error: TicketError) -> Effects {
        tracing::warn!(%request_id, reason = error.kind(), %error, "Command rejected");
        metrics::record_rejection(error.kind());
        smallvec![Effect::send(TicketAction::CommandRejected { request_id, error })]
    }
}

impl Reducer for TicketReducer {
    type State = TicketState;
    type Action = TicketAction;
    type Environment = TicketEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects {
        match action {
            // ========== Issue ==========
            TicketAction::IssueTicket {
                request_id,
                caller,
                ticket,
            } => match Self::issue(state, &caller, ticket, env) {
                Ok((ticket_id, record)) => {
                    tracing::info!(%ticket_id, holder = %record.holder, price = record.price.units(), "Ticket issued");
                    metrics::record_ticket_issued();

                    let notification = TicketNotification::Issued {
                        ticket_id,
                        buyer: record.holder.clone(),
                        price: record.price,
                    };
                    let outcome = TicketAction::TicketIssued {
                        request_id,
                        ticket_id,
                        record,
                    };
                    Self::accepted(state, outcome, notification, env)
                },
                Err(error) => Self::rejected(request_id, error),
            },

            // ========== Advisory trade check ==========
            TicketAction::RequestTrade {
                request_id,
                ticket_id,
                proposed_price,
                claimed_identity,
                requester,
            } => {
                let request = TradeRequest {
                    ticket_id,
                    proposed_price,
                    claimed_identity: &claimed_identity,
                    requester: &requester,
                };
                match Self::request_trade(state, &request, env) {
                    Ok(()) => {
                        tracing::debug!(%ticket_id, %requester, proposed_price = proposed_price.units(), "Trade request accepted");
                        metrics::record_trade_requested();

                        let notification = TicketNotification::TradeRequested {
                            ticket_id,
                            requester: requester.clone(),
                            proposed_price,
                        };
                        let outcome = TicketAction::TradeRequestAccepted {
                            request_id,
                            ticket_id,
                            requester,
                            proposed_price,
                        };
                        Self::accepted(state, outcome, notification, env)
                    },
                    Err(error) => Self::rejected(request_id, error),
                }
            },

            // ========== Settle ==========
            TicketAction::SettleTrade {
                request_id,
                ticket_id,
                new_holder,
                paid_amount,
                caller,
            } => match Self::settle(state, ticket_id, new_holder, paid_amount, &caller, env) {
                Ok((previous_holder, record, receipt)) => {
                    tracing::info!(
                        %ticket_id,
                        %previous_holder,
                        new_holder = %record.holder,
                        paid = paid_amount.units(),
                        trade_count = record.trade_count,
                        "Trade settled"
                    );
                    metrics::record_trade_settled(paid_amount.units());

                    let notification = TicketNotification::TradeCompleted {
                        ticket_id,
                        new_holder: record.holder.clone(),
                        paid_amount,
                    };
                    let outcome = TicketAction::TradeSettled {
                        request_id,
                        ticket_id,
                        previous_holder,
                        record,
                        receipt,
                    };
                    Self::accepted(state, outcome, notification, env)
                },
                Err(error) => Self::rejected(request_id, error),
            },

            // ========== Outcome events ==========
            // Applied when produced; feedback is a no-op
            TicketAction::TicketIssued { .. }
            | TicketAction::TradeRequestAccepted { .. }
            | TicketAction::TradeSettled { .. }
            | TicketAction::CommandRejected { .. } => SmallVec::new(),
        }
    }
}
