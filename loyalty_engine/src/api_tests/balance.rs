use std::time::Duration;

use accrual_client::{AccrualApiError, AccrualOutcome, AccrualStatus};
use futures_util::future::join_all;
use loyalty_common::Points;

use super::{cleanup, new_db, new_user, ORDER_A, ORDER_B, ORDER_C};
use crate::{
    test_utils::ScriptedLookup,
    AccrualFanout,
    Balance,
    BalanceApi,
    BalanceApiError,
    FanoutError,
    FanoutPolicy,
    LedgerManagement,
    OrderRegistryApi,
    OwnerLocks,
    SqliteDatabase,
    WithdrawalResult,
};

fn points(p: i64) -> Points {
    Points::from_points(p)
}

fn accrual_service() -> ScriptedLookup {
    ScriptedLookup::new()
        .with_script(ORDER_A, vec![Ok(AccrualOutcome::processed(ORDER_A, points(500)))])
        .with_script(ORDER_B, vec![Ok(AccrualOutcome::new(ORDER_B, AccrualStatus::Processing, None))])
        .with_script(ORDER_C, vec![Ok(AccrualOutcome::new(ORDER_C, AccrualStatus::Invalid, None))])
}

async fn register_all(db: &SqliteDatabase, owner: i64, orders: &[&str]) {
    let registry = OrderRegistryApi::new(db.clone());
    for order in orders {
        registry.register(order, owner).await.unwrap();
    }
}

#[tokio::test]
async fn balance_counts_only_processed_orders() {
    let db = new_db().await;
    let alice = new_user(&db, "alice").await;
    register_all(&db, alice, &[ORDER_A, ORDER_B, ORDER_C]).await;
    let api = BalanceApi::new(db.clone(), AccrualFanout::new(accrual_service(), FanoutPolicy::default()));

    let balance = api.compute_balance(alice).await.unwrap();
    assert_eq!(balance, Balance { current: points(500), withdrawn: Points::default() });
    // Recomputing without any change gives the same answer
    assert_eq!(api.compute_balance(alice).await.unwrap(), balance);
    cleanup(db).await;
}

#[tokio::test]
async fn user_without_orders_has_zero_balance() {
    let db = new_db().await;
    let alice = new_user(&db, "alice").await;
    let lookup = ScriptedLookup::new();
    let api = BalanceApi::new(db.clone(), AccrualFanout::new(lookup.clone(), FanoutPolicy::default()));
    assert_eq!(api.compute_balance(alice).await.unwrap(), Balance::default());
    assert_eq!(lookup.call_count(), 0);
    cleanup(db).await;
}

#[tokio::test]
async fn withdrawals_reduce_the_balance() {
    let db = new_db().await;
    let alice = new_user(&db, "alice").await;
    register_all(&db, alice, &[ORDER_A]).await;
    let api = BalanceApi::new(db.clone(), AccrualFanout::new(accrual_service(), FanoutPolicy::default()));

    let result = api.withdraw(alice, "2377225624", points(200)).await.unwrap();
    let withdrawal = match result {
        WithdrawalResult::Authorized(w) => w,
        other => panic!("Expected withdrawal to be authorized, got {other:?}"),
    };
    assert_eq!(withdrawal.amount, points(200));
    assert_eq!(withdrawal.order_tag, "2377225624");
    assert_eq!(api.compute_balance(alice).await.unwrap(), Balance { current: points(300), withdrawn: points(200) });

    let result = api.withdraw(alice, "2377225624", points(400)).await.unwrap();
    assert_eq!(result, WithdrawalResult::InsufficientFunds { available: points(300), requested: points(400) });
    assert_eq!(api.compute_balance(alice).await.unwrap(), Balance { current: points(300), withdrawn: points(200) });

    let result = api.withdraw(alice, "other", Points::from(30_000)).await.unwrap();
    assert!(matches!(result, WithdrawalResult::Authorized(_)));
    assert_eq!(api.compute_balance(alice).await.unwrap(), Balance { current: Points::default(), withdrawn: points(500) });

    let history = api.withdrawals(alice).await.unwrap();
    let tags = history.iter().map(|w| w.order_tag.as_str()).collect::<Vec<_>>();
    assert_eq!(tags, vec!["2377225624", "other"]);
    cleanup(db).await;
}

#[tokio::test]
async fn invalid_withdrawals_are_rejected_before_any_work() {
    let db = new_db().await;
    let alice = new_user(&db, "alice").await;
    let lookup = accrual_service();
    register_all(&db, alice, &[ORDER_A]).await;
    let api = BalanceApi::new(db.clone(), AccrualFanout::new(lookup.clone(), FanoutPolicy::default()));

    let err = api.withdraw(alice, "tag", Points::default()).await.unwrap_err();
    assert!(matches!(err, BalanceApiError::InvalidAmount(_)));
    let err = api.withdraw(alice, "tag", Points::from(-100)).await.unwrap_err();
    assert!(matches!(err, BalanceApiError::InvalidAmount(_)));
    let err = api.withdraw(alice, "  ", points(1)).await.unwrap_err();
    assert!(matches!(err, BalanceApiError::MissingOrderTag));
    assert_eq!(lookup.call_count(), 0);
    assert_eq!(db.total_withdrawn(alice).await.unwrap(), Points::default());
    cleanup(db).await;
}

#[tokio::test]
async fn concurrent_withdrawals_cannot_overdraw() {
    let db = new_db().await;
    let alice = new_user(&db, "alice").await;
    register_all(&db, alice, &[ORDER_A]).await;
    let lookup = accrual_service().with_latency(Duration::from_millis(20));
    let locks = OwnerLocks::new();
    // Two API instances sharing one lock registry behave like two server workers
    let api1 = BalanceApi::with_locks(db.clone(), AccrualFanout::new(lookup.clone(), FanoutPolicy::default()), locks.clone());
    let api2 = BalanceApi::with_locks(db.clone(), AccrualFanout::new(lookup, FanoutPolicy::default()), locks.clone());

    let attempts = (0..4).map(|i| {
        let api = if i % 2 == 0 { &api1 } else { &api2 };
        api.withdraw(alice, "tag", points(300))
    });
    let results = join_all(attempts).await;
    let authorized = results.iter().filter(|r| matches!(r, Ok(WithdrawalResult::Authorized(_)))).count();
    let refused = results.iter().filter(|r| matches!(r, Ok(WithdrawalResult::InsufficientFunds { .. }))).count();
    assert_eq!((authorized, refused), (1, 3));
    assert_eq!(api1.compute_balance(alice).await.unwrap(), Balance { current: points(200), withdrawn: points(300) });
    assert!(locks.is_empty());
    cleanup(db).await;
}

#[tokio::test]
async fn owner_locks_are_released_by_the_last_holder() {
    let locks = OwnerLocks::new();
    let first = locks.lock(1).await;
    let other_user = locks.lock(2).await;
    assert_eq!(locks.len(), 2);

    let waiter = {
        let locks = locks.clone();
        tokio::spawn(async move {
            let _guard = locks.lock(1).await;
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());
    drop(first);
    // The waiter still needs the entry, so it survives until the waiter is done
    waiter.await.unwrap();
    assert_eq!(locks.len(), 1);
    drop(other_user);
    assert!(locks.is_empty());
}

#[tokio::test]
async fn unresolved_orders_fail_closed() {
    let db = new_db().await;
    let alice = new_user(&db, "alice").await;
    register_all(&db, alice, &[ORDER_A, ORDER_B]).await;
    let lookup = accrual_service()
        .with_script(ORDER_B, vec![Err(AccrualApiError::UnexpectedStatus { status: 418, message: "teapot".into() })]);
    let api = BalanceApi::new(db.clone(), AccrualFanout::new(lookup, FanoutPolicy::default()));

    let err = api.compute_balance(alice).await.unwrap_err();
    assert!(matches!(err, BalanceApiError::UnresolvedOrder(ref u) if u.order == ORDER_B), "{err:?}");
    let err = api.withdraw(alice, "tag", points(1)).await.unwrap_err();
    assert!(matches!(err, BalanceApiError::UnresolvedOrder(_)));
    assert!(api.order_statuses(alice).await.is_err());
    assert!(api.withdrawals(alice).await.unwrap().is_empty());
    cleanup(db).await;
}

#[tokio::test]
async fn oversized_accruals_fail_closed() {
    let db = new_db().await;
    let alice = new_user(&db, "alice").await;
    register_all(&db, alice, &[ORDER_A, ORDER_B]).await;
    let huge = Points::try_from(5e16).unwrap();
    let lookup = ScriptedLookup::new()
        .with_script(ORDER_A, vec![Ok(AccrualOutcome::processed(ORDER_A, huge))])
        .with_script(ORDER_B, vec![Ok(AccrualOutcome::processed(ORDER_B, huge))]);
    let api = BalanceApi::new(db.clone(), AccrualFanout::new(lookup, FanoutPolicy::default()));

    let err = api.compute_balance(alice).await.unwrap_err();
    assert!(matches!(err, BalanceApiError::Overflow(_)), "{err:?}");
    let err = api.withdraw(alice, "2377225624", points(1)).await.unwrap_err();
    assert!(matches!(err, BalanceApiError::Overflow(_)), "{err:?}");
    assert!(api.withdrawals(alice).await.unwrap().is_empty());
    cleanup(db).await;
}

#[test]
fn balance_refuses_to_wrap() {
    let err = Balance::new(Points::from(i64::MIN), Points::from(1)).unwrap_err();
    assert!(matches!(err, BalanceApiError::Overflow(_)));
    let balance = Balance::new(points(500), points(200)).unwrap();
    assert_eq!(balance, Balance { current: points(300), withdrawn: points(200) });
}

#[tokio::test]
async fn slow_accrual_service_exceeds_the_deadline() {
    let db = new_db().await;
    let alice = new_user(&db, "alice").await;
    register_all(&db, alice, &[ORDER_A]).await;
    let lookup = accrual_service().with_latency(Duration::from_secs(2));
    let policy = FanoutPolicy::default().with_deadline(Duration::from_millis(100));
    let api = BalanceApi::new(db.clone(), AccrualFanout::new(lookup, policy));

    let err = api.compute_balance(alice).await.unwrap_err();
    assert!(matches!(err, BalanceApiError::AccrualUnavailable(FanoutError::DeadlineExceeded(_))));
    cleanup(db).await;
}

#[tokio::test]
async fn order_statuses_follow_registration_order() {
    let db = new_db().await;
    let alice = new_user(&db, "alice").await;
    register_all(&db, alice, &[ORDER_C, ORDER_A, ORDER_B]).await;
    let api = BalanceApi::new(db.clone(), AccrualFanout::new(accrual_service(), FanoutPolicy::default()));

    let statuses = api.order_statuses(alice).await.unwrap();
    let summary = statuses
        .iter()
        .map(|e| (e.order.number.as_str(), e.outcome.status, e.outcome.accrual))
        .collect::<Vec<_>>();
    assert_eq!(summary, vec![
        (ORDER_C, AccrualStatus::Invalid, None),
        (ORDER_A, AccrualStatus::Processed, Some(points(500))),
        (ORDER_B, AccrualStatus::Processing, None),
    ]);
    cleanup(db).await;
}
