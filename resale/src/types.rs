//! Domain types for the ticket resale engine.
//!
//! Value objects, the ticket record, and the record store that owns every record.

use crate::error::TicketError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Ticket identifier
///
/// Assigned densely from 1 at issuance, permanent, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(u64);

impl TicketId {
    /// The first identifier ever issued
    pub const FIRST: Self = Self(1);

    /// Wrap a raw identifier
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw identifier
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque handle of a party that can hold tickets and receive payments
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Creates an `AccountId` from any string-like handle
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The raw handle
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty handle never names a real party
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlates a command with the single outcome event it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new request ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// An amount in whole currency units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero currency units
    pub const ZERO: Self = Self(0);

    /// Creates an amount
    #[must_use]
    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    /// Get the amount in currency units
    #[must_use]
    pub const fn units(&self) -> u64 {
        self.0
    }

    /// Checked addition
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Checked subtraction
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(diff) => Some(Self(diff)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} units", self.0)
    }
}

/// Verified-identity token bound to the current purchase cycle
///
/// The empty token means no binding; settlement resets every ticket to it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerifiedIdentity(String);

impl VerifiedIdentity {
    /// Wraps a caller-supplied identity token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The empty binding
    #[must_use]
    pub const fn unbound() -> Self {
        Self(String::new())
    }

    /// True for the empty binding
    #[must_use]
    pub fn is_unbound(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw token
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VerifiedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbound() {
            f.write_str("<unbound>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Descriptive metadata of the event a ticket admits to
///
/// Set at issuance and never changed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    /// Event name
    pub name: String,
    /// Where the event takes place
    pub location: String,
    /// When the event takes place, as printed on the ticket
    pub date: String,
}

impl EventDetails {
    /// Creates event metadata
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            date: date.into(),
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// One issued ticket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Current resale ceiling; after a resale, the settlement price
    pub price: Money,
    /// Time of original issuance (never updated)
    pub purchase_time: DateTime<Utc>,
    /// Current holder, mirrors the ownership ledger
    pub holder: AccountId,
    /// Identity bound to the current purchase
    pub bound_identity: VerifiedIdentity,
    /// Completed resales
    pub trade_count: u8,
    /// Immutable event metadata
    pub event: EventDetails,
    /// Name captured at issuance
    pub buyer_name: String,
}

impl TicketRecord {
    /// Record for a freshly issued ticket
    #[must_use]
    pub const fn issued(
        holder: AccountId,
        bound_identity: VerifiedIdentity,
        price: Money,
        event: EventDetails,
        buyer_name: String,
        purchase_time: DateTime<Utc>,
    ) -> Self {
        Self {
            price,
            purchase_time,
            holder,
            bound_identity,
            trade_count: 0,
            event,
            buyer_name,
        }
    }
}

// ============================================================================
// Record Store
// ============================================================================

/// The ticket book: every record ever issued, keyed by identifier
///
/// Records are created by issuance, mutated by settlement, and never removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketState {
    records: BTreeMap<TicketId, TicketRecord>,
}

impl TicketState {
    /// Creates an empty ticket book
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Look up a record
    #[must_use]
    pub fn get(&self, id: &TicketId) -> Option<&TicketRecord> {
        self.records.get(id)
    }

    /// Look up a record, failing with [`TicketError::NotFound`]
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::NotFound`] when no ticket was issued under `id`.
    pub fn record(&self, id: TicketId) -> Result<&TicketRecord, TicketError> {
        self.records.get(&id).ok_or(TicketError::NotFound { ticket_id: id })
    }

    /// Store a record under `id`, replacing any previous version
    pub fn put(&mut self, id: TicketId, record: TicketRecord) {
        self.records.insert(id, record);
    }

    /// Whether a ticket was issued under `id`
    #[must_use]
    pub fn exists(&self, id: &TicketId) -> bool {
        self.records.contains_key(id)
    }

    /// Number of tickets issued so far
    #[must_use]
    pub fn issued_count(&self) -> u64 {
        // usize always fits u64 on supported targets
        u64::try_from(self.records.len()).unwrap_or(u64::MAX)
    }

    /// The identifier the next issuance will receive
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::IdentifierSpaceExhausted`] once `u64::MAX` tickets exist.
    pub fn next_id(&self) -> Result<TicketId, TicketError> {
        self.issued_count()
            .checked_add(1)
            .map(TicketId)
            .ok_or(TicketError::IdentifierSpaceExhausted)
    }

    /// Tickets whose recorded holder is `holder`, in identifier order
    #[must_use]
    pub fn held_by(&self, holder: &AccountId) -> Vec<(TicketId, &TicketRecord)> {
        self.records
            .iter()
            .filter(|(_, record)| &record.holder == holder)
            .map(|(id, record)| (*id, record))
            .collect()
    }

    /// Iterate over every record in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (&TicketId, &TicketRecord)> {
        self.records.iter()
    }
}
