//! End-to-end resale scenarios.
//!
//! Drives `TicketEngine` against in-memory collaborators and a fixed clock:
//! issuance → advisory validation → settlement, plus the rejection paths.
//!
//! Run with: `cargo test --test resale_scenarios_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use chrono::Duration;
use std::sync::Arc;
use ticket_resale::config::RuntimeConfig;
use ticket_resale::{
    AccountId, EngineError, EventDetails, InMemoryLedger, InMemoryPayments, LedgerError, Money,
    NewTicket, OwnershipLedger, PaymentError, ResalePolicy, StaticAdminGate, TicketEngine,
    TicketError, TicketId, TicketNotification, VerifiedIdentity,
};
use ticket_resale_testing::{test_clock, FixedClock};

struct World {
    engine: TicketEngine,
    clock: FixedClock,
    ledger: InMemoryLedger,
    payments: InMemoryPayments,
}

fn world() -> World {
    let clock = test_clock();
    let ledger = InMemoryLedger::new();
    let payments = InMemoryPayments::new();
    let engine = TicketEngine::broadcasting(
        Arc::new(clock.clone()),
        Arc::new(ledger.clone()),
        Arc::new(payments.clone()),
        Arc::new(StaticAdminGate::single(issuer())),
        ResalePolicy::default(),
        &RuntimeConfig {
            broadcast_capacity: 256,
            request_timeout_ms: 2_000,
        },
    );

    for account in [bob(), carol(), dave()] {
        payments.deposit(&account, Money::new(1_000));
    }

    World {
        engine,
        clock,
        ledger,
        payments,
    }
}

fn issuer() -> AccountId {
    AccountId::new("issuer")
}

fn bob() -> AccountId {
    AccountId::new("bob")
}

fn carol() -> AccountId {
    AccountId::new("carol")
}

fn dave() -> AccountId {
    AccountId::new("dave")
}

fn ticket(buyer: AccountId, price: u64) -> NewTicket {
    NewTicket {
        buyer,
        verified_identity: VerifiedIdentity::new("did:1"),
        price: Money::new(price),
        event: EventDetails::new("Summer Finals", "Main Arena", "2025-06-01"),
        buyer_name: "Bob".to_string(),
    }
}

fn rejection(result: Result<impl std::fmt::Debug, EngineError>) -> TicketError {
    match result {
        Err(EngineError::Rejected(error)) => error,
        other => panic!("expected a rejection, got {other:?}"),
    }
}

/// Issue to bob at 100 and wait out the cooldown
async fn issued_and_aged(world: &World) -> TicketId {
    let id = world.engine.issue(&issuer(), ticket(bob(), 100)).await.unwrap();
    world.clock.advance(Duration::hours(25));
    id
}

/// Test 1: Headline resale
///
/// Issue at 100 to bob, wait 25h, validate an asking price of 90. Settlement
/// still requires the recorded price, so carol settles at 100.
#[tokio::test]
async fn test_resale_after_cooldown() {
    let world = world();
    let id = issued_and_aged(&world).await;

    world
        .engine
        .validate_trade_request(id, Money::new(90), "did:1", &bob())
        .await
        .unwrap();

    world.ledger.approve(&bob(), id, &carol()).unwrap();
    let record = world
        .engine
        .settle_trade(id, &carol(), Money::new(100), &carol())
        .await
        .unwrap();

    assert_eq!(record.holder, carol());
    assert_eq!(record.bound_identity, VerifiedIdentity::unbound());
    assert_eq!(record.trade_count, 1);
    assert_eq!(record.price, Money::new(100));

    assert_eq!(world.engine.get_details(id).await.unwrap(), record);
    assert_eq!(world.ledger.owner_of(id).unwrap(), carol());
    assert_eq!(world.payments.balance_of(&bob()), Money::new(1_100));
    assert_eq!(world.payments.balance_of(&carol()), Money::new(900));
}

/// Test 2: Validation right after issuance is too early
#[tokio::test]
async fn test_immediate_request_hits_cooldown() {
    let world = world();
    let id = world.engine.issue(&issuer(), ticket(bob(), 100)).await.unwrap();

    let error = rejection(
        world
            .engine
            .validate_trade_request(id, Money::new(90), "did:1", &bob())
            .await,
    );
    assert!(matches!(error, TicketError::CooldownNotElapsed { .. }));
}

/// Test 3: Wrong identity is rejected for an otherwise valid request
#[tokio::test]
async fn test_identity_mismatch() {
    let world = world();
    let id = issued_and_aged(&world).await;

    for claimed in ["did:2", "", "did:1\n"] {
        let error = rejection(
            world
                .engine
                .validate_trade_request(id, Money::new(90), claimed, &bob())
                .await,
        );
        assert_eq!(error, TicketError::IdentityMismatch, "claimed {claimed:?}");
    }
}

/// Test 4: After a resale only an empty claim matches
#[tokio::test]
async fn test_identity_cleared_after_resale() {
    let world = world();
    let id = issued_and_aged(&world).await;
    world.ledger.approve(&bob(), id, &carol()).unwrap();
    world
        .engine
        .settle_trade(id, &carol(), Money::new(100), &carol())
        .await
        .unwrap();

    let error = rejection(
        world
            .engine
            .validate_trade_request(id, Money::new(90), "did:1", &carol())
            .await,
    );
    assert_eq!(error, TicketError::IdentityMismatch);

    world
        .engine
        .validate_trade_request(id, Money::new(90), "", &carol())
        .await
        .unwrap();
}

/// Test 5: A second settlement right away succeeds; a third validation hits the cap
#[tokio::test]
async fn test_second_settlement_then_cap() {
    let world = world();
    let id = issued_and_aged(&world).await;

    world.ledger.approve(&bob(), id, &carol()).unwrap();
    world
        .engine
        .settle_trade(id, &carol(), Money::new(100), &carol())
        .await
        .unwrap();

    // No clock advance: settlement does not re-check the cooldown
    world.ledger.approve(&carol(), id, &dave()).unwrap();
    let record = world
        .engine
        .settle_trade(id, &dave(), Money::new(110), &dave())
        .await
        .unwrap();
    assert_eq!(record.trade_count, 2);
    assert_eq!(record.holder, dave());
    assert_eq!(record.price, Money::new(110));

    let error = rejection(
        world
            .engine
            .validate_trade_request(id, Money::new(50), "", &dave())
            .await,
    );
    assert_eq!(
        error,
        TicketError::TradeLimitReached {
            trade_count: 2,
            limit: 2
        }
    );

    // Settlement refuses a third resale as well
    let error = rejection(
        world
            .engine
            .settle_trade(id, &bob(), Money::new(110), &dave())
            .await,
    );
    assert!(matches!(error, TicketError::TradeLimitReached { .. }));
    assert_eq!(world.engine.get_details(id).await.unwrap().trade_count, 2);
}

/// Test 6: Underpaying leaves everything untouched
#[tokio::test]
async fn test_insufficient_funds_changes_nothing() {
    let world = world();
    let id = issued_and_aged(&world).await;
    world.ledger.approve(&bob(), id, &carol()).unwrap();
    let before = world.engine.get_details(id).await.unwrap();

    let error = rejection(
        world
            .engine
            .settle_trade(id, &carol(), Money::new(80), &carol())
            .await,
    );
    assert_eq!(
        error,
        TicketError::InsufficientFunds {
            paid: Money::new(80),
            required: Money::new(100)
        }
    );

    assert_eq!(world.engine.get_details(id).await.unwrap(), before);
    assert_eq!(world.ledger.owner_of(id).unwrap(), bob());
    assert_eq!(world.payments.balance_of(&carol()), Money::new(1_000));
    assert_eq!(world.payments.balance_of(&bob()), Money::new(1_000));
}

/// Test 7: Settlement ignores the cooldown and the price ceiling
#[tokio::test]
async fn test_settlement_is_independent_of_validation() {
    let world = world();
    let id = world.engine.issue(&issuer(), ticket(bob(), 100)).await.unwrap();
    world.ledger.approve(&bob(), id, &carol()).unwrap();

    let record = world
        .engine
        .settle_trade(id, &carol(), Money::new(150), &carol())
        .await
        .unwrap();
    assert_eq!(record.price, Money::new(150));
    assert_eq!(world.payments.balance_of(&bob()), Money::new(1_150));
}

/// Test 8: Only administrators issue
#[tokio::test]
async fn test_unauthorized_issuance() {
    let world = world();

    let error = rejection(world.engine.issue(&bob(), ticket(bob(), 100)).await);
    assert_eq!(error, TicketError::Unauthorized { actor: bob() });
    assert_eq!(world.engine.total_issued().await, 0);

    // The failed attempt did not consume an identifier
    let id = world.engine.issue(&issuer(), ticket(bob(), 100)).await.unwrap();
    assert_eq!(id, TicketId::FIRST);
}

/// Test 9: Strangers may neither request nor settle
#[tokio::test]
async fn test_trade_operations_require_authorization() {
    let world = world();
    let id = issued_and_aged(&world).await;

    let error = rejection(
        world
            .engine
            .validate_trade_request(id, Money::new(90), "did:1", &dave())
            .await,
    );
    assert_eq!(error, TicketError::Unauthorized { actor: dave() });

    let error = rejection(
        world
            .engine
            .settle_trade(id, &dave(), Money::new(100), &dave())
            .await,
    );
    assert_eq!(error, TicketError::Unauthorized { actor: dave() });
}

/// Test 10: An operator approved for all of bob's tickets may settle
#[tokio::test]
async fn test_operator_approval_authorizes() {
    let world = world();
    let id = issued_and_aged(&world).await;
    world.ledger.set_approval_for_all(&bob(), &dave(), true);

    let record = world
        .engine
        .settle_trade(id, &carol(), Money::new(100), &dave())
        .await
        .unwrap();
    assert_eq!(record.holder, carol());
    // dave paid, bob was paid
    assert_eq!(world.payments.balance_of(&dave()), Money::new(900));
    assert_eq!(world.payments.balance_of(&bob()), Money::new(1_100));
}

/// Test 11: Unknown identifiers
#[tokio::test]
async fn test_unknown_ticket() {
    let world = world();
    let missing = TicketId::new(42);
    let not_found = TicketError::NotFound { ticket_id: missing };

    assert_eq!(rejection(world.engine.get_details(missing).await), not_found);
    assert_eq!(
        rejection(
            world
                .engine
                .validate_trade_request(missing, Money::new(1), "", &bob())
                .await
        ),
        not_found
    );
    assert_eq!(
        rejection(
            world
                .engine
                .settle_trade(missing, &carol(), Money::new(1), &bob())
                .await
        ),
        not_found
    );
}

/// Test 12: A declined payment aborts the settlement
#[tokio::test]
async fn test_declined_payment_rolls_back() {
    let world = world();
    let id = issued_and_aged(&world).await;
    world.ledger.approve(&bob(), id, &carol()).unwrap();
    world.payments.decline_all(true);

    let error = rejection(
        world
            .engine
            .settle_trade(id, &carol(), Money::new(100), &carol())
            .await,
    );
    assert!(matches!(error, TicketError::Payment(PaymentError::Declined { .. })));

    let record = world.engine.get_details(id).await.unwrap();
    assert_eq!(record.holder, bob());
    assert_eq!(record.trade_count, 0);
    assert_eq!(world.ledger.owner_of(id).unwrap(), bob());
    assert_eq!(world.ledger.approved_for(id), Some(carol()));
}

/// Test 13: A payer without the funds aborts the settlement
#[tokio::test]
async fn test_payer_balance_too_low() {
    let world = world();
    let id = issued_and_aged(&world).await;
    world.ledger.approve(&bob(), id, &carol()).unwrap();

    let error = rejection(
        world
            .engine
            .settle_trade(id, &carol(), Money::new(5_000), &carol())
            .await,
    );
    assert!(matches!(
        error,
        TicketError::Payment(PaymentError::InsufficientBalance { .. })
    ));
    assert_eq!(world.engine.get_details(id).await.unwrap().holder, bob());
}

/// Test 14: Settling to an empty account is refused
#[tokio::test]
async fn test_settle_to_empty_account() {
    let world = world();
    let id = issued_and_aged(&world).await;

    let error = rejection(
        world
            .engine
            .settle_trade(id, &AccountId::new(""), Money::new(100), &bob())
            .await,
    );
    assert_eq!(error, TicketError::Ledger(LedgerError::InvalidRecipient));
    assert_eq!(world.payments.balance_of(&bob()), Money::new(1_000));
}

/// Test 15: Holdings follow settlements
#[tokio::test]
async fn test_tickets_held_by() {
    let world = world();
    let first = world.engine.issue(&issuer(), ticket(bob(), 100)).await.unwrap();
    let second = world.engine.issue(&issuer(), ticket(bob(), 60)).await.unwrap();
    world.ledger.approve(&bob(), first, &carol()).unwrap();
    world
        .engine
        .settle_trade(first, &carol(), Money::new(100), &carol())
        .await
        .unwrap();

    let held: Vec<_> = world
        .engine
        .tickets_held_by(&bob())
        .await
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(held, vec![second]);
    assert_eq!(world.engine.tickets_held_by(&carol()).await.len(), 1);
    assert_eq!(world.ledger.tickets_of(&carol()), vec![first]);
}

/// Test 16: Observers receive one notification per accepted operation
///
/// Each notification is delivered by its own effect, so arrival order is not
/// asserted.
#[tokio::test]
async fn test_one_notification_per_accepted_operation() {
    let world = world();
    let mut rx = world.engine.subscribe_notifications().unwrap();

    let id = issued_and_aged(&world).await;
    world
        .engine
        .validate_trade_request(id, Money::new(90), "did:1", &bob())
        .await
        .unwrap();
    // Rejections publish nothing
    let _ = world
        .engine
        .validate_trade_request(id, Money::new(900), "did:1", &bob())
        .await;
    world
        .engine
        .settle_trade(id, &carol(), Money::new(100), &bob())
        .await
        .unwrap();

    let mut seen = Vec::new();
    while seen.len() < 3 {
        let notification = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("notification not delivered")
            .unwrap();
        seen.push(notification);
    }

    assert!(seen.contains(&TicketNotification::Issued {
        ticket_id: id,
        buyer: bob(),
        price: Money::new(100),
    }));
    assert!(seen.contains(&TicketNotification::TradeRequested {
        ticket_id: id,
        requester: bob(),
        proposed_price: Money::new(90),
    }));
    assert!(seen.contains(&TicketNotification::TradeCompleted {
        ticket_id: id,
        new_holder: carol(),
        paid_amount: Money::new(100),
    }));
    assert!(rx.try_recv().is_err());

    let json = serde_json::to_value(&seen[0]).unwrap();
    assert!(json.is_object());
}

/// Test 17: Concurrent issuance assigns every identifier exactly once
#[tokio::test]
async fn test_concurrent_issuance() {
    let world = Arc::new(world());

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let world = Arc::clone(&world);
            tokio::spawn(async move { world.engine.issue(&issuer(), ticket(bob(), 10)).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.sort();

    let expected: Vec<_> = (1..=20).map(TicketId::new).collect();
    assert_eq!(ids, expected);
    assert_eq!(world.engine.total_issued().await, 20);
    assert_eq!(world.ledger.balance_of(&bob()), 20);
}

/// Test 18: An overpayment becomes the price the next buyer must meet
#[tokio::test]
async fn test_overpayment_raises_next_price() {
    let world = world();
    let id = issued_and_aged(&world).await;
    world.ledger.approve(&bob(), id, &carol()).unwrap();

    let record = world
        .engine
        .settle_trade(id, &carol(), Money::new(130), &carol())
        .await
        .unwrap();
    assert_eq!(record.price, Money::new(130));

    // The advisory ceiling follows the new price
    world
        .engine
        .validate_trade_request(id, Money::new(130), "", &carol())
        .await
        .unwrap();

    world.ledger.approve(&carol(), id, &dave()).unwrap();
    let error = rejection(
        world
            .engine
            .settle_trade(id, &dave(), Money::new(120), &dave())
            .await,
    );
    assert_eq!(
        error,
        TicketError::InsufficientFunds {
            paid: Money::new(120),
            required: Money::new(130)
        }
    );
    assert_eq!(world.engine.get_details(id).await.unwrap().holder, carol());
}
