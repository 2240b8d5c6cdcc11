use accrual_client::{AccrualApiError, AccrualOutcome, AccrualStatus};
use actix_web::{http::StatusCode, web, web::ServiceConfig};
use loyalty_common::Points;
use loyalty_engine::{
    test_utils::ScriptedLookup,
    AccrualFanout,
    BalanceApi,
    FanoutPolicy,
    InsertOrderResult,
    OrderRegistryApi,
};

use super::{
    helpers::{bearer, get_request, issue_token, order, post_request, ORDER_A, ORDER_B},
    mocks::MockDatabase,
};
use crate::routes::{MyOrdersRoute, SubmitOrderRoute};

fn configure_submit(db: MockDatabase, lookup: ScriptedLookup) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let fanout = AccrualFanout::new(lookup, FanoutPolicy::default());
        cfg.service(SubmitOrderRoute::<MockDatabase, ScriptedLookup>::new())
            .app_data(web::Data::new(OrderRegistryApi::new(db)))
            .app_data(web::Data::new(fanout));
    }
}

fn configure_list(db: MockDatabase, lookup: ScriptedLookup) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let fanout = AccrualFanout::new(lookup, FanoutPolicy::default());
        cfg.service(MyOrdersRoute::<MockDatabase, ScriptedLookup>::new())
            .app_data(web::Data::new(BalanceApi::new(db, fanout)));
    }
}

fn alice_token() -> String {
    bearer(&issue_token(1, "alice"))
}

#[actix_web::test]
async fn submit_new_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockDatabase::new();
    db.expect_insert_order_if_absent()
        .withf(|number, owner| number.as_str() == ORDER_A && *owner == 1)
        .times(1)
        .returning(|_, _| Ok(InsertOrderResult::Inserted(order(ORDER_A, 1, 0))));
    let lookup = ScriptedLookup::new();
    let reply = post_request(&alice_token(), "/orders", ORDER_A, configure_submit(db, lookup.clone())).await;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(lookup.calls_for(ORDER_A).len(), 1);
}

#[actix_web::test]
async fn submit_order_twice() {
    let _ = env_logger::try_init().ok();
    let mut db = MockDatabase::new();
    db.expect_insert_order_if_absent().returning(|_, _| Ok(InsertOrderResult::AlreadyExists(order(ORDER_A, 1, 0))));
    let reply = post_request(&alice_token(), "/orders", ORDER_A, configure_submit(db, ScriptedLookup::new())).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[actix_web::test]
async fn submit_order_owned_by_someone_else() {
    let _ = env_logger::try_init().ok();
    let mut db = MockDatabase::new();
    db.expect_insert_order_if_absent().returning(|_, _| Ok(InsertOrderResult::AlreadyExists(order(ORDER_A, 2, 0))));
    let reply = post_request(&alice_token(), "/orders", ORDER_A, configure_submit(db, ScriptedLookup::new())).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.json()["error"], "Order 79927398713 was already uploaded by another user");
}

#[actix_web::test]
async fn submit_order_failing_the_checksum() {
    let _ = env_logger::try_init().ok();
    let lookup = ScriptedLookup::new();
    for body in ["79927398710", "", "abc", "7992 7398 713"] {
        // No storage expectations, and the accrual service must not be asked
        let reply = post_request(&alice_token(), "/orders", body, configure_submit(MockDatabase::new(), lookup.clone()))
            .await;
        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    }
    assert_eq!(lookup.call_count(), 0);
}

#[actix_web::test]
async fn submit_order_rejected_by_the_accrual_service() {
    let _ = env_logger::try_init().ok();
    let lookup = ScriptedLookup::new()
        .with_script(ORDER_A, vec![Ok(AccrualOutcome::new(ORDER_A, AccrualStatus::Invalid, None))]);
    let reply = post_request(&alice_token(), "/orders", ORDER_A, configure_submit(MockDatabase::new(), lookup)).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn submit_order_when_the_accrual_service_fails() {
    let _ = env_logger::try_init().ok();
    let lookup = ScriptedLookup::new()
        .with_script(ORDER_A, vec![Err(AccrualApiError::UnexpectedStatus { status: 404, message: "".into() })]);
    let reply = post_request(&alice_token(), "/orders", ORDER_A, configure_submit(MockDatabase::new(), lookup)).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn list_orders() {
    let _ = env_logger::try_init().ok();
    let mut db = MockDatabase::new();
    db.expect_fetch_orders_for_user().returning(|_| Ok(vec![order(ORDER_B, 1, 0), order(ORDER_A, 1, 5)]));
    let lookup = ScriptedLookup::new()
        .with_script(ORDER_A, vec![Ok(AccrualOutcome::processed(ORDER_A, Points::from(50_050)))])
        .with_script(ORDER_B, vec![Ok(AccrualOutcome::new(ORDER_B, AccrualStatus::Processing, None))]);
    let reply = get_request(&alice_token(), "/orders", configure_list(db, lookup)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.body,
        r#"[{"number":"12345678903","status":"PROCESSING","uploaded_at":"2024-06-01T12:00:00Z"},{"number":"79927398713","status":"PROCESSED","accrual":500.5,"uploaded_at":"2024-06-01T12:05:00Z"}]"#
    );
}

#[actix_web::test]
async fn list_orders_when_there_are_none() {
    let _ = env_logger::try_init().ok();
    let mut db = MockDatabase::new();
    db.expect_fetch_orders_for_user().returning(|_| Ok(vec![]));
    let reply = get_request(&alice_token(), "/orders", configure_list(db, ScriptedLookup::new())).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert!(reply.body.is_empty());
}

#[actix_web::test]
async fn list_orders_fails_closed() {
    let _ = env_logger::try_init().ok();
    let mut db = MockDatabase::new();
    db.expect_fetch_orders_for_user().returning(|_| Ok(vec![order(ORDER_A, 1, 0)]));
    let lookup = ScriptedLookup::new()
        .with_script(ORDER_A, vec![Err(AccrualApiError::UnexpectedStatus { status: 418, message: "".into() })]);
    let reply = get_request(&alice_token(), "/orders", configure_list(db, lookup)).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
}
