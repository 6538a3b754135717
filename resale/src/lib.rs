//! Ticket Resale Engine - issuance and controlled resale of event tickets
//!
//! Tickets are issued by an administrator, bound to a verified identity, and may
//! be resold a limited number of times under price and timing rules:
//!
//! - **Issuance**: dense identifiers from 1, ownership minted on an external ledger
//! - **Advisory trade validation**: authorization, identity, cooldown, resale cap,
//!   and price ceiling, checked in that order without reserving anything
//! - **Settlement**: payment to the current holder and ownership transfer, both or
//!   neither; the settlement price becomes the next ceiling
//! - **Queries**: full record by identifier, holdings by account
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   command    ┌─────────────────────────────────────────┐
//! │ TicketEngine │ ───────────▶ │ Store (serial, write-locked)            │
//! │              │ ◀─────────── │   TicketReducer ──▶ TicketState         │
//! └──────────────┘   outcome    │         │                               │
//!                               │         ├── OwnershipLedger             │
//!                               │         ├── PaymentPrimitive            │
//!                               │         ├── AdministrativeGate          │
//!                               │         └── Clock                       │
//!                               └─────────────────────────────────────────┘
//!                                         │ effects
//!                                         ▼
//!                                 NotificationSink (fire and forget)
//! ```
//!
//! Every operation is applied in full before the next begins. A rejected operation
//! leaves the ticket book, the ledger, and balances unchanged.

pub mod admin;
pub mod aggregates;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod metrics;
pub mod notifications;
pub mod payment;
pub mod policy;
pub mod types;
pub mod validation;

pub use admin::{AdministrativeGate, StaticAdminGate};
pub use aggregates::{NewTicket, TicketAction, TicketEnvironment, TicketReducer};
pub use config::Config;
pub use engine::{EngineError, TicketEngine};
pub use error::TicketError;
pub use ledger::{InMemoryLedger, LedgerError, OwnershipLedger};
pub use notifications::{BroadcastSink, NotificationSink, RecordingSink, TicketNotification};
pub use payment::{InMemoryPayments, PaymentError, PaymentPrimitive, PaymentReceipt};
pub use policy::ResalePolicy;
pub use types::{
    AccountId, EventDetails, Money, RequestId, TicketId, TicketRecord, TicketState,
    VerifiedIdentity,
};
