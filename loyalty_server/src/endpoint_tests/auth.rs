use actix_web::{
    http::{header::AUTHORIZATION, StatusCode},
    web,
    web::ServiceConfig,
};
use chrono::{Duration, Utc};
use loyalty_engine::{
    db_types::UserAccount,
    test_utils::ScriptedLookup,
    AccrualFanout,
    AuthApi,
    BalanceApi,
    FanoutPolicy,
};
use mockall::predicate::eq;

use super::{
    helpers::{bearer, get_auth_config, get_request, issue_token, issue_token_with_expiry, post_request},
    mocks::MockDatabase,
};
use crate::{
    auth::{Principal, TokenIssuer},
    config::AuthConfig,
    routes::{BalanceRoute, LoginRoute, RegisterRoute},
};

fn alice(password_hash: String) -> UserAccount {
    UserAccount { id: 7, login: "alice".into(), password_hash, created_at: Utc::now() }
}

fn configure_auth(db: MockDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(RegisterRoute::<MockDatabase>::new())
            .service(LoginRoute::<MockDatabase>::new())
            .app_data(web::Data::new(AuthApi::new(db).with_cost(4)));
    }
}

fn token_in(headers: &actix_web::http::header::HeaderMap) -> Principal {
    let value = headers.get(AUTHORIZATION).expect("No Authorization header").to_str().unwrap();
    let token = value.strip_prefix("Bearer ").expect("Not a bearer token");
    TokenIssuer::new(&get_auth_config()).validate(token).expect("Issued token is invalid")
}

#[actix_web::test]
async fn register_issues_a_token() {
    let _ = env_logger::try_init().ok();
    let mut db = MockDatabase::new();
    db.expect_fetch_user_by_login().with(eq("alice")).returning(|_| Ok(None));
    db.expect_insert_user()
        .withf(|login, hash| login == "alice" && bcrypt::verify("s3cret", hash).unwrap())
        .returning(|_, hash| Ok(Some(alice(hash.to_string()))));
    let reply =
        post_request("", "/register", r#"{"login":"alice","password":"s3cret"}"#, configure_auth(db)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(token_in(&reply.headers), Principal { user_id: 7, login: "alice".into() });
    assert_eq!(reply.json()["success"], true);
}

#[actix_web::test]
async fn register_with_a_taken_login() {
    let _ = env_logger::try_init().ok();
    let mut db = MockDatabase::new();
    db.expect_fetch_user_by_login().returning(|_| Ok(Some(alice("hash".into()))));
    let reply = post_request("", "/register", r#"{"login":"alice","password":"other"}"#, configure_auth(db)).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.json()["error"], "Login alice is already taken");
    assert!(reply.headers.get(AUTHORIZATION).is_none());
}

#[actix_web::test]
async fn register_with_a_bad_body() {
    let _ = env_logger::try_init().ok();
    // No expectations: storage must not be touched
    let db = MockDatabase::new();
    let reply = post_request("", "/register", r#"{"login":"alice"}"#, configure_auth(db)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json()["error"].as_str().unwrap().starts_with("Could not read request body"));

    let db = MockDatabase::new();
    let reply = post_request("", "/register", r#"{"login":"","password":"x"}"#, configure_auth(db)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn login_with_valid_credentials() {
    let _ = env_logger::try_init().ok();
    let hash = bcrypt::hash("s3cret", 4).unwrap();
    let mut db = MockDatabase::new();
    db.expect_fetch_user_by_login().with(eq("alice")).returning(move |_| Ok(Some(alice(hash.clone()))));
    let reply = post_request("", "/login", r#"{"login":"alice","password":"s3cret"}"#, configure_auth(db)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(token_in(&reply.headers).user_id, 7);
}

#[actix_web::test]
async fn login_failures_are_indistinguishable() {
    let _ = env_logger::try_init().ok();
    let hash = bcrypt::hash("s3cret", 4).unwrap();
    let mut db = MockDatabase::new();
    db.expect_fetch_user_by_login().with(eq("alice")).returning(move |_| Ok(Some(alice(hash.clone()))));
    let wrong_password =
        post_request("", "/login", r#"{"login":"alice","password":"guess"}"#, configure_auth(db)).await;

    let mut db = MockDatabase::new();
    db.expect_fetch_user_by_login().returning(|_| Ok(None));
    let unknown_user = post_request("", "/login", r#"{"login":"bob","password":"guess"}"#, configure_auth(db)).await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_user.body);
}

//----------------------------------------   Bearer middleware   ------------------------------------------------

// The handler must never run for unauthenticated requests, so the mock has no expectations.
fn configure_protected(cfg: &mut ServiceConfig) {
    let fanout = AccrualFanout::new(ScriptedLookup::new(), FanoutPolicy::default());
    let api = BalanceApi::new(MockDatabase::new(), fanout);
    cfg.service(BalanceRoute::<MockDatabase, ScriptedLookup>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn missing_token() {
    let _ = env_logger::try_init().ok();
    let reply = get_request("", "/balance", configure_protected).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["error"], "Authentication Error. No access token was provided.");
}

#[actix_web::test]
async fn not_a_bearer_token() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, "alice");
    let reply = get_request(&format!("Basic {token}"), "/balance", configure_protected).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    let reply = get_request("Bearer not-a-token", "/balance", configure_protected).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn expired_token() {
    let _ = env_logger::try_init().ok();
    let token = issue_token_with_expiry(7, "alice", Utc::now() - Duration::minutes(1));
    let reply = get_request(&bearer(&token), "/balance", configure_protected).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["error"], "Authentication Error. Access token has expired.");
}

#[actix_web::test]
async fn token_signed_by_someone_else() {
    let _ = env_logger::try_init().ok();
    let forger = TokenIssuer::new(&AuthConfig::new("not the server's secret", Duration::hours(1)));
    let token = forger.issue_token(7, "alice").unwrap();
    let reply = get_request(&bearer(&token), "/balance", configure_protected).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(reply.json()["error"].as_str().unwrap().contains("Access token is invalid"));
}
