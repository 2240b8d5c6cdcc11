//! Request handler definitions
//!
//! Define each route and its handler here. Handlers stay thin: they parse the request, call into the
//! `loyalty_engine` APIs, and turn the result into a response. Anything more involved belongs in the engine.
//!
//! All the user routes live under the `/api/user` scope (see [`crate::server`]). Routes declared with
//! `where authenticated` are wrapped in the bearer-auth middleware and receive the caller as a [`Principal`].
//!
//! Every handler is async. Storage access and accrual lookups are futures, so a slow accrual service never blocks a
//! worker thread.
use std::str::FromStr;

use accrual_client::{AccrualLookup, AccrualStatus};
use actix_web::{get, http::header::AUTHORIZATION, web, HttpResponse, Responder};
use log::*;
use loyalty_engine::{
    db_types::OrderNumber,
    AccrualFanout,
    AuthApi,
    BalanceApi,
    LoyaltyDatabase,
    OrderManagement,
    OrderRegistryApi,
    RegistrationResult,
    UserManagement,
    WithdrawalResult,
};

use crate::{
    auth::{Principal, TokenIssuer},
    data_objects::{Credentials, JsonResponse, OrderResponse, WithdrawRequest, WithdrawalResponse},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where authenticated) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::BearerAuthFactory::new());
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Credentials  ----------------------------------------------------
route!(register => Post "/register" impl UserManagement);
/// Creates a new user account and logs the user in.
///
/// The body is `{"login": "...", "password": "..."}`. On success, the access token is returned in the `Authorization`
/// header as `Bearer <token>`.
pub async fn register<B: UserManagement>(
    body: web::Bytes,
    api: web::Data<AuthApi<B>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received registration request");
    let credentials = parse_credentials(&body)?;
    let user = api.register(&credentials.login, &credentials.password).await?;
    debug!("💻️ Registered user #{} ({})", user.id, user.login);
    token_response(&signer, user.id, &user.login, format!("User {} registered", user.login))
}

route!(login => Post "/login" impl UserManagement);
/// Checks the user's credentials and issues an access token in the `Authorization` header.
pub async fn login<B: UserManagement>(
    body: web::Bytes,
    api: web::Data<AuthApi<B>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received login request");
    let credentials = parse_credentials(&body)?;
    let user = api.authenticate(&credentials.login, &credentials.password).await?;
    token_response(&signer, user.id, &user.login, format!("User {} logged in", user.login))
}

fn parse_credentials(body: &[u8]) -> Result<Credentials, ServerError> {
    serde_json::from_slice::<Credentials>(body).map_err(|e| {
        debug!("💻️ Could not deserialize credentials. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })
}

fn token_response(
    signer: &TokenIssuer,
    user_id: i64,
    login: &str,
    message: String,
) -> Result<HttpResponse, ServerError> {
    let token = signer.issue_token(user_id, login)?;
    trace!("💻️ Issued access token for user #{user_id}");
    Ok(HttpResponse::Ok()
        .insert_header((AUTHORIZATION, format!("Bearer {token}")))
        .json(JsonResponse::success(message)))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(submit_order => Post "/orders" impl OrderManagement, AccrualLookup where authenticated);
/// Registers an order number to the caller.
///
/// The body is the bare order number as text. The number must pass the Luhn check, and the accrual service must not
/// have rejected it. Returns `202 Accepted` for a new order and `200 OK` if the caller already uploaded it.
pub async fn submit_order<B, L>(
    principal: Principal,
    body: web::Bytes,
    registry: web::Data<OrderRegistryApi<B>>,
    fanout: web::Data<AccrualFanout<L>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement,
    L: AccrualLookup,
{
    let text = std::str::from_utf8(&body).map_err(|e| ServerError::InvalidOrderNumber(e.to_string()))?;
    trace!("💻️ User #{} submitted order {}", principal.user_id, text.trim());
    let number = OrderNumber::from_str(text).map_err(|e| ServerError::InvalidOrderNumber(e.to_string()))?;
    let snapshot = fanout.resolve(&[number.as_str()]).await?;
    let outcome = snapshot.outcome(number.as_str()).map_err(|e| {
        warn!("💻️ Could not check order {number} with the accrual service. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    if outcome.status == AccrualStatus::Invalid {
        debug!("💻️ The accrual service rejected order {number}");
        return Err(ServerError::InvalidOrderNumber(format!("Order {number} was rejected by the accrual service")));
    }
    match registry.register(number.as_str(), principal.user_id).await? {
        RegistrationResult::Accepted(order) => {
            Ok(HttpResponse::Accepted().json(JsonResponse::success(format!("Order {} accepted", order.number))))
        },
        RegistrationResult::AlreadyOwnedBySelf(order) => {
            Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Order {} was already uploaded", order.number))))
        },
        RegistrationResult::ConflictOtherOwner => Err(ServerError::OrderOwnedByAnotherUser(number.to_string())),
        RegistrationResult::Invalid(n) => Err(ServerError::InvalidOrderNumber(format!("Invalid order number: {n}"))),
    }
}

route!(my_orders => Get "/orders" impl LoyaltyDatabase, AccrualLookup where authenticated);
/// The caller's orders, oldest first, with their current accrual state. `204 No Content` if there are none.
pub async fn my_orders<B, L>(
    principal: Principal,
    api: web::Data<BalanceApi<B, L>>,
) -> Result<HttpResponse, ServerError>
where
    B: LoyaltyDatabase,
    L: AccrualLookup,
{
    trace!("💻️ Fetching orders for user #{}", principal.user_id);
    let entries = api.order_statuses(principal.user_id).await?;
    if entries.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    let orders = entries.into_iter().map(OrderResponse::from).collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------   Balance  ----------------------------------------------------
route!(balance => Get "/balance" impl LoyaltyDatabase, AccrualLookup where authenticated);
pub async fn balance<B, L>(principal: Principal, api: web::Data<BalanceApi<B, L>>) -> Result<HttpResponse, ServerError>
where
    B: LoyaltyDatabase,
    L: AccrualLookup,
{
    trace!("💻️ Fetching balance for user #{}", principal.user_id);
    let balance = api.compute_balance(principal.user_id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

route!(withdraw => Post "/balance/withdraw" impl LoyaltyDatabase, AccrualLookup where authenticated);
/// Spends points from the caller's balance against an order. The body is `{"order": "...", "sum": 751.5}`.
///
/// Returns `402 Payment Required` if the balance does not cover the sum. A malformed body is a validation failure
/// (`422`), the same as a non-positive sum.
pub async fn withdraw<B, L>(
    principal: Principal,
    body: web::Bytes,
    api: web::Data<BalanceApi<B, L>>,
) -> Result<HttpResponse, ServerError>
where
    B: LoyaltyDatabase,
    L: AccrualLookup,
{
    let request = serde_json::from_slice::<WithdrawRequest>(&body).map_err(|e| {
        debug!("💻️ Could not deserialize withdrawal request. {e}");
        ServerError::ValidationError(format!("Invalid withdrawal request. {e}"))
    })?;
    trace!("💻️ User #{} wants to withdraw {} for order {}", principal.user_id, request.sum, request.order);
    match api.withdraw(principal.user_id, &request.order, request.sum).await? {
        WithdrawalResult::Authorized(withdrawal) => Ok(HttpResponse::Ok().json(WithdrawalResponse::from(withdrawal))),
        WithdrawalResult::InsufficientFunds { available, requested } => {
            Err(ServerError::InsufficientFunds { available, requested })
        },
    }
}

route!(withdrawals => Get "/withdrawals" impl LoyaltyDatabase, AccrualLookup where authenticated);
/// The caller's withdrawals, oldest first. `204 No Content` if there are none.
pub async fn withdrawals<B, L>(
    principal: Principal,
    api: web::Data<BalanceApi<B, L>>,
) -> Result<HttpResponse, ServerError>
where
    B: LoyaltyDatabase,
    L: AccrualLookup,
{
    trace!("💻️ Fetching withdrawals for user #{}", principal.user_id);
    let history = api.withdrawals(principal.user_id).await?;
    if history.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    let history = history.into_iter().map(WithdrawalResponse::from).collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(history))
}
