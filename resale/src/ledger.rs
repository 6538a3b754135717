//! Ownership ledger interface and an in-memory implementation.
//!
//! The ledger is the source of truth for who holds which ticket and who may move
//! it on the holder's behalf. The engine only consumes the four operations on
//! [`OwnershipLedger`]; any conforming implementation is substitutable.

use crate::types::{AccountId, TicketId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Ledger operation result
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Why the ledger refused an operation
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerError {
    /// The identifier already has an owner
    #[error("ticket {ticket_id} already minted")]
    AlreadyMinted {
        /// Identifier being minted
        ticket_id: TicketId,
    },

    /// The identifier was never minted
    #[error("ticket {ticket_id} does not exist on the ledger")]
    UnknownTicket {
        /// Identifier looked up
        ticket_id: TicketId,
    },

    /// Tickets cannot be assigned to an empty account
    #[error("invalid recipient")]
    InvalidRecipient,

    /// `from` does not own the ticket
    #[error("{account} does not own ticket {ticket_id}")]
    NotOwner {
        /// Claimed owner
        account: AccountId,
        /// Ticket being moved
        ticket_id: TicketId,
    },

    /// The actor may not manage approvals for this ticket
    #[error("{actor} may not approve transfers of ticket {ticket_id}")]
    ApprovalDenied {
        /// Who tried to approve
        actor: AccountId,
        /// Ticket concerned
        ticket_id: TicketId,
    },
}

/// Ownership ledger consumed by issuance and settlement
pub trait OwnershipLedger: Send + Sync {
    /// Create the ownership fact for a new ticket
    ///
    /// # Errors
    ///
    /// Fails if the identifier is already owned or `owner` is empty.
    fn mint(&self, owner: &AccountId, ticket_id: TicketId) -> LedgerResult<()>;

    /// Move a ticket from `from` to `to`
    ///
    /// # Errors
    ///
    /// Fails if `from` is not the current owner or `to` is empty.
    fn transfer_ownership(
        &self,
        from: &AccountId,
        to: &AccountId,
        ticket_id: TicketId,
    ) -> LedgerResult<()>;

    /// Current owner of a ticket
    ///
    /// # Errors
    ///
    /// Fails if the ticket was never minted.
    fn owner_of(&self, ticket_id: TicketId) -> LedgerResult<AccountId>;

    /// Whether `actor` owns the ticket, is its approved delegate, or is an
    /// operator approved for all of the owner's tickets
    fn is_authorized(&self, ticket_id: TicketId, actor: &AccountId) -> bool;
}

#[derive(Debug, Default)]
struct LedgerBook {
    owners: HashMap<TicketId, AccountId>,
    approvals: HashMap<TicketId, AccountId>,
    operators: HashSet<(AccountId, AccountId)>,
}

impl LedgerBook {
    fn is_owner_or_operator(&self, owner: &AccountId, actor: &AccountId) -> bool {
        owner == actor || self.operators.contains(&(owner.clone(), actor.clone()))
    }
}

/// In-memory ledger for development and tests
///
/// Clones share the same book. Single-ticket approvals are cleared whenever the
/// ticket changes hands; operator approvals stay with the owner.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedger {
    book: Arc<RwLock<LedgerBook>>,
}

impl InMemoryLedger {
    /// Creates an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Approve `delegate` to transfer one ticket
    ///
    /// # Errors
    ///
    /// Fails if the ticket does not exist or `actor` is neither its owner nor
    /// an operator for the owner.
    pub fn approve(
        &self,
        actor: &AccountId,
        ticket_id: TicketId,
        delegate: &AccountId,
    ) -> LedgerResult<()> {
        let mut book = self.book.write().unwrap_or_else(PoisonError::into_inner);
        let owner = book
            .owners
            .get(&ticket_id)
            .cloned()
            .ok_or(LedgerError::UnknownTicket { ticket_id })?;

        if !book.is_owner_or_operator(&owner, actor) {
            return Err(LedgerError::ApprovalDenied {
                actor: actor.clone(),
                ticket_id,
            });
        }

        book.approvals.insert(ticket_id, delegate.clone());
        tracing::debug!(%ticket_id, %delegate, "Ticket delegate approved");
        Ok(())
    }

    /// Grant or revoke `operator` authority over every ticket of `owner`
    pub fn set_approval_for_all(&self, owner: &AccountId, operator: &AccountId, approved: bool) {
        let mut book = self.book.write().unwrap_or_else(PoisonError::into_inner);
        let key = (owner.clone(), operator.clone());
        if approved {
            book.operators.insert(key);
        } else {
            book.operators.remove(&key);
        }
    }

    /// Single-ticket delegate, if any
    #[must_use]
    pub fn approved_for(&self, ticket_id: TicketId) -> Option<AccountId> {
        let book = self.book.read().unwrap_or_else(PoisonError::into_inner);
        book.approvals.get(&ticket_id).cloned()
    }

    /// Number of tickets held by `owner`
    #[must_use]
    pub fn balance_of(&self, owner: &AccountId) -> usize {
        let book = self.book.read().unwrap_or_else(PoisonError::into_inner);
        book.owners.values().filter(|held| *held == owner).count()
    }

    /// Tickets held by `owner`, in identifier order
    #[must_use]
    pub fn tickets_of(&self, owner: &AccountId) -> Vec<TicketId> {
        let book = self.book.read().unwrap_or_else(PoisonError::into_inner);
        book.owners
            .iter()
            .filter(|(_, held)| *held == owner)
            .map(|(id, _)| *id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl OwnershipLedger for InMemoryLedger {
    fn mint(&self, owner: &AccountId, ticket_id: TicketId) -> LedgerResult<()> {
        if owner.is_empty() {
            return Err(LedgerError::InvalidRecipient);
        }

        let mut book = self.book.write().unwrap_or_else(PoisonError::into_inner);
        if book.owners.contains_key(&ticket_id) {
            return Err(LedgerError::AlreadyMinted { ticket_id });
        }
        book.owners.insert(ticket_id, owner.clone());
        Ok(())
    }

    fn transfer_ownership(
        &self,
        from: &AccountId,
        to: &AccountId,
        ticket_id: TicketId,
    ) -> LedgerResult<()> {
        if to.is_empty() {
            return Err(LedgerError::InvalidRecipient);
        }

        let mut book = self.book.write().unwrap_or_else(PoisonError::into_inner);
        match book.owners.get(&ticket_id) {
            None => return Err(LedgerError::UnknownTicket { ticket_id }),
            Some(owner) if owner != from => {
                return Err(LedgerError::NotOwner {
                    account: from.clone(),
                    ticket_id,
                });
            },
            Some(_) => {},
        }

        book.owners.insert(ticket_id, to.clone());
        book.approvals.remove(&ticket_id);
        Ok(())
    }

    fn owner_of(&self, ticket_id: TicketId) -> LedgerResult<AccountId> {
        let book = self.book.read().unwrap_or_else(PoisonError::into_inner);
        book.owners
            .get(&ticket_id)
            .cloned()
            .ok_or(LedgerError::UnknownTicket { ticket_id })
    }

    fn is_authorized(&self, ticket_id: TicketId, actor: &AccountId) -> bool {
        let book = self.book.read().unwrap_or_else(PoisonError::into_inner);
        let Some(owner) = book.owners.get(&ticket_id) else {
            return false;
        };
        book.is_owner_or_operator(owner, actor) || book.approvals.get(&ticket_id) == Some(actor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn alice() -> AccountId {
        AccountId::new("alice")
    }

    fn bob() -> AccountId {
        AccountId::new("bob")
    }

    fn carol() -> AccountId {
        AccountId::new("carol")
    }

    #[test]
    fn test_mint_assigns_owner() {
        let ledger = InMemoryLedger::new();
        ledger.mint(&alice(), TicketId::FIRST).unwrap();

        assert_eq!(ledger.owner_of(TicketId::FIRST).unwrap(), alice());
        assert_eq!(ledger.balance_of(&alice()), 1);
        assert!(ledger.is_authorized(TicketId::FIRST, &alice()));
        assert!(!ledger.is_authorized(TicketId::FIRST, &bob()));
    }

    #[test]
    fn test_mint_twice_fails() {
        let ledger = InMemoryLedger::new();
        ledger.mint(&alice(), TicketId::FIRST).unwrap();
        assert_eq!(
            ledger.mint(&bob(), TicketId::FIRST).unwrap_err(),
            LedgerError::AlreadyMinted {
                ticket_id: TicketId::FIRST
            }
        );
        assert_eq!(ledger.owner_of(TicketId::FIRST).unwrap(), alice());
    }

    #[test]
    fn test_mint_to_empty_account_fails() {
        let ledger = InMemoryLedger::new();
        assert_eq!(
            ledger.mint(&AccountId::new(""), TicketId::FIRST).unwrap_err(),
            LedgerError::InvalidRecipient
        );
    }

    #[test]
    fn test_delegate_approval_is_cleared_on_transfer() {
        let ledger = InMemoryLedger::new();
        ledger.mint(&alice(), TicketId::FIRST).unwrap();
        ledger.approve(&alice(), TicketId::FIRST, &bob()).unwrap();
        assert!(ledger.is_authorized(TicketId::FIRST, &bob()));

        ledger
            .transfer_ownership(&alice(), &carol(), TicketId::FIRST)
            .unwrap();

        assert_eq!(ledger.owner_of(TicketId::FIRST).unwrap(), carol());
        assert!(ledger.approved_for(TicketId::FIRST).is_none());
        assert!(!ledger.is_authorized(TicketId::FIRST, &bob()));
    }

    #[test]
    fn test_operator_covers_every_ticket_of_owner() {
        let ledger = InMemoryLedger::new();
        ledger.mint(&alice(), TicketId::new(1)).unwrap();
        ledger.mint(&alice(), TicketId::new(2)).unwrap();
        ledger.set_approval_for_all(&alice(), &bob(), true);

        assert!(ledger.is_authorized(TicketId::new(1), &bob()));
        assert!(ledger.is_authorized(TicketId::new(2), &bob()));

        ledger.set_approval_for_all(&alice(), &bob(), false);
        assert!(!ledger.is_authorized(TicketId::new(1), &bob()));
    }

    #[test]
    fn test_stranger_cannot_approve() {
        let ledger = InMemoryLedger::new();
        ledger.mint(&alice(), TicketId::FIRST).unwrap();
        assert!(matches!(
            ledger.approve(&bob(), TicketId::FIRST, &carol()),
            Err(LedgerError::ApprovalDenied { .. })
        ));
    }

    #[test]
    fn test_transfer_from_non_owner_fails() {
        let ledger = InMemoryLedger::new();
        ledger.mint(&alice(), TicketId::FIRST).unwrap();
        assert!(matches!(
            ledger.transfer_ownership(&bob(), &carol(), TicketId::FIRST),
            Err(LedgerError::NotOwner { .. })
        ));
        assert_eq!(ledger.owner_of(TicketId::FIRST).unwrap(), alice());
    }

    #[test]
    fn test_tickets_of_lists_in_order() {
        let ledger = InMemoryLedger::new();
        for id in [3, 1, 2] {
            ledger.mint(&alice(), TicketId::new(id)).unwrap();
        }
        assert_eq!(
            ledger.tickets_of(&alice()),
            vec![TicketId::new(1), TicketId::new(2), TicketId::new(3)]
        );
    }
}
