//! Business metrics for the resale engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `resale_tickets_issued_total` - Tickets issued
//! - `resale_trade_requests_total` - Trade requests that passed validation
//! - `resale_trades_settled_total` - Resales settled
//! - `resale_settlement_volume_units_total` - Currency units forwarded to sellers
//! - `resale_commands_rejected_total{reason}` - Rejected commands by reason

use metrics::describe_counter;

/// Register all business metric descriptions.
///
/// Call once at startup, after the recorder is installed.
pub fn register_business_metrics() {
    describe_counter!("resale_tickets_issued_total", "Total number of tickets issued");
    describe_counter!(
        "resale_trade_requests_total",
        "Total number of trade requests that passed validation"
    );
    describe_counter!("resale_trades_settled_total", "Total number of resales settled");
    describe_counter!(
        "resale_settlement_volume_units_total",
        "Total currency units forwarded to sellers by settlements"
    );
    describe_counter!(
        "resale_commands_rejected_total",
        "Total number of rejected commands by reason"
    );
}

/// Record a ticket issuance.
pub fn record_ticket_issued() {
    metrics::counter!("resale_tickets_issued_total").increment(1);
}

/// Record a trade request that passed validation.
pub fn record_trade_requested() {
    metrics::counter!("resale_trade_requests_total").increment(1);
}

/// Record a settled resale and the amount forwarded.
pub fn record_trade_settled(paid_units: u64) {
    metrics::counter!("resale_trades_settled_total").increment(1);
    metrics::counter!("resale_settlement_volume_units_total").increment(paid_units);
}

/// Record a rejected command.
pub fn record_rejection(reason: &'static str) {
    metrics::counter!("resale_commands_rejected_total", "reason" => reason).increment(1);
}
