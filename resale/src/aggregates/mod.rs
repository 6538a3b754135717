//! Aggregate reducers for the ticket resale engine.
//!
//! - Ticket: issuance, advisory trade validation, and settlement

pub mod ticket;

pub use ticket::{NewTicket, TicketAction, TicketEnvironment, TicketReducer};
