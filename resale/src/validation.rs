//! Checks applied before a ticket changes hands.
//!
//! These functions read the ticket book and the ledger but never mutate
//! anything. The first failing check wins.

use crate::error::TicketError;
use crate::identity::identity_matches;
use crate::ledger::OwnershipLedger;
use crate::policy::ResalePolicy;
use crate::types::{AccountId, Money, TicketId, TicketRecord};
use chrono::{DateTime, Utc};

/// A resale the requester wants to coordinate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRequest<'a> {
    /// Ticket to resell
    pub ticket_id: TicketId,
    /// Price asked for
    pub proposed_price: Money,
    /// Identity token presented by the requester
    pub claimed_identity: &'a str,
    /// Who is asking
    pub requester: &'a AccountId,
}

/// Fails with [`TicketError::Unauthorized`] unless `actor` owns the ticket or
/// holds a delegate or operator approval for it
///
/// # Errors
///
/// Returns [`TicketError::Unauthorized`] when the ledger does not authorize `actor`.
pub fn authorize(
    ledger: &dyn OwnershipLedger,
    ticket_id: TicketId,
    actor: &AccountId,
) -> Result<(), TicketError> {
    if ledger.is_authorized(ticket_id, actor) {
        Ok(())
    } else {
        Err(TicketError::Unauthorized {
            actor: actor.clone(),
        })
    }
}

/// Advisory resale check
///
/// In order: authorization, identity, cooldown from original issuance,
/// resale cap, price ceiling.
///
/// # Errors
///
/// Returns the first failing check as a [`TicketError`].
pub fn validate_trade_request(
    record: &TicketRecord,
    request: &TradeRequest<'_>,
    ledger: &dyn OwnershipLedger,
    policy: &ResalePolicy,
    now: DateTime<Utc>,
) -> Result<(), TicketError> {
    authorize(ledger, request.ticket_id, request.requester)?;

    if !identity_matches(&record.bound_identity, request.claimed_identity) {
        return Err(TicketError::IdentityMismatch);
    }

    let available_at = policy.resale_opens_at(record.purchase_time);
    if now < available_at {
        return Err(TicketError::CooldownNotElapsed { available_at });
    }

    check_trade_cap(record, policy)?;

    if request.proposed_price > record.price {
        return Err(TicketError::PriceAboveCeiling {
            proposed: request.proposed_price,
            ceiling: record.price,
        });
    }

    Ok(())
}

/// Settlement check: authorization, resale cap, attached payment
///
/// Cooldown and price ceiling are left to [`validate_trade_request`].
///
/// # Errors
///
/// Returns the first failing check as a [`TicketError`].
pub fn validate_settlement(
    record: &TicketRecord,
    ticket_id: TicketId,
    caller: &AccountId,
    paid_amount: Money,
    ledger: &dyn OwnershipLedger,
    policy: &ResalePolicy,
) -> Result<(), TicketError> {
    authorize(ledger, ticket_id, caller)?;
    check_trade_cap(record, policy)?;

    if paid_amount < record.price {
        return Err(TicketError::InsufficientFunds {
            paid: paid_amount,
            required: record.price,
        });
    }

    Ok(())
}

fn check_trade_cap(record: &TicketRecord, policy: &ResalePolicy) -> Result<(), TicketError> {
    if record.trade_count >= policy.max_resales {
        return Err(TicketError::TradeLimitReached {
            trade_count: record.trade_count,
            limit: policy.max_resales,
        });
    }
    Ok(())
}
