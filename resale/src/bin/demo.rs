//! Ticket Resale Demo
//!
//! Runs one ticket through issuance and two resales against in-memory
//! collaborators, with a controllable clock:
//! - Issue at price 100 and try to resell immediately (cooldown)
//! - Advance 25 hours, validate an asking price of 90, settle at the recorded 100
//! - Settle again at once for 110 (settlement does not re-check the cooldown)
//! - A third validation hits the resale cap
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin demo
//! ```

use chrono::Duration;
use std::sync::Arc;
use ticket_resale::{
    AccountId, Config, EventDetails, InMemoryLedger, InMemoryPayments, Money, NewTicket,
    StaticAdminGate, TicketEngine, VerifiedIdentity, metrics::register_business_metrics,
};
use ticket_resale_runtime::metrics::MetricsRecorder;
use ticket_resale_testing::test_clock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut recorder = MetricsRecorder::new();
    recorder.install()?;
    register_business_metrics();

    println!("\n🎫 ============================================");
    println!("   Ticket Resale - Live Demo");
    println!("============================================\n");

    let clock = test_clock();
    let ledger = InMemoryLedger::new();
    let payments = InMemoryPayments::new();
    let admins = config.resale.admin_accounts();
    let issuer = admins
        .first()
        .cloned()
        .unwrap_or_else(|| AccountId::new("issuer"));

    let engine = TicketEngine::broadcasting(
        Arc::new(clock.clone()),
        Arc::new(ledger.clone()),
        Arc::new(payments.clone()),
        Arc::new(StaticAdminGate::new(admins)),
        config.resale.policy(),
        &config.runtime,
    );

    if let Some(mut rx) = engine.subscribe_notifications() {
        tokio::spawn(async move {
            while let Ok(notification) = rx.recv().await {
                println!("   📣 {notification:?}");
            }
        });
    }

    let bob = AccountId::new("bob");
    let carol = AccountId::new("carol");
    let dave = AccountId::new("dave");
    payments.deposit(&carol, Money::new(500));
    payments.deposit(&dave, Money::new(500));

    // Step 1: Issue
    println!("1️⃣  Issuing a ticket to bob at 100 units...");
    let ticket_id = engine
        .issue(
            &issuer,
            NewTicket {
                buyer: bob.clone(),
                verified_identity: VerifiedIdentity::new("did:1"),
                price: Money::new(100),
                event: EventDetails::new("Summer Finals", "Main Arena", "2025-06-01"),
                buyer_name: "Bob".to_string(),
            },
        )
        .await?;
    println!("   ✓ Issued ticket {ticket_id}\n");

    // Step 2: Too early
    println!("2️⃣  Requesting a resale right away...");
    if let Err(error) = engine
        .validate_trade_request(ticket_id, Money::new(90), "did:1", &bob)
        .await
    {
        println!("   ✗ Rejected: {error}\n");
    }

    // Step 3: After the cooldown
    println!("3️⃣  25 hours later, bob asks 90; carol settles at the recorded price...");
    clock.advance(Duration::hours(25));
    engine
        .validate_trade_request(ticket_id, Money::new(90), "did:1", &bob)
        .await?;
    ledger.approve(&bob, ticket_id, &carol)?;
    let record = engine
        .settle_trade(ticket_id, &carol, Money::new(100), &carol)
        .await?;
    println!(
        "   ✓ Holder {}, identity {}, resales {}, price {}\n",
        record.holder, record.bound_identity, record.trade_count, record.price
    );

    // Step 4: Immediate second settlement
    println!("4️⃣  Carol resells to dave immediately...");
    ledger.approve(&carol, ticket_id, &dave)?;
    let record = engine
        .settle_trade(ticket_id, &dave, Money::new(110), &dave)
        .await?;
    println!(
        "   ✓ Holder {}, resales {}, price {}\n",
        record.holder, record.trade_count, record.price
    );

    // Step 5: Cap reached
    println!("5️⃣  Dave asks for a third resale...");
    if let Err(error) = engine
        .validate_trade_request(ticket_id, Money::new(80), "", &dave)
        .await
    {
        println!("   ✗ Rejected: {error}\n");
    }

    println!(
        "📊 Balances: bob {}, carol {}, dave {}",
        payments.balance_of(&bob),
        payments.balance_of(&carol),
        payments.balance_of(&dave)
    );
    println!("📄 Final record: {:#?}\n", engine.get_details(ticket_id).await?);

    engine.shutdown(std::time::Duration::from_secs(1)).await?;

    if let Some(text) = recorder.render() {
        println!("📈 Metrics\n{text}");
    }

    Ok(())
}
