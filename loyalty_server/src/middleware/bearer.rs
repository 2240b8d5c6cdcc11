//! Bearer token middleware for the loyalty server.
//! This middleware can be placed on any route or service.
//!
//! It reads the `Authorization: Bearer <token>` header, validates the token with the [`TokenIssuer`] registered as app
//! data, and inserts the resulting [`Principal`] into the request extensions. Requests without a valid token are
//! answered with `401 Unauthorized` and never reach the handler.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    web,
    Error,
    HttpMessage,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use log::*;

use crate::{
    auth::{Principal, TokenIssuer},
    errors::{AuthError, ServerError},
};

#[derive(Default)]
pub struct BearerAuthFactory;

impl BearerAuthFactory {
    pub fn new() -> Self {
        Self
    }
}

impl<S, B> Transform<S, ServiceRequest> for BearerAuthFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = BearerAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(BearerAuthService { service: Rc::new(service) })
    }
}

pub struct BearerAuthService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for BearerAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            match principal_from_request(&req) {
                Ok(principal) => {
                    trace!("🔑️ Request to {} authenticated for user #{}", req.path(), principal.user_id);
                    req.extensions_mut().insert(principal);
                    service.call(req).await.map(|res| res.map_into_left_body())
                },
                Err(e) => {
                    debug!("🔑️ Rejecting request to {}. {e}", req.path());
                    Ok(req.error_response(e).map_into_right_body())
                },
            }
        })
    }
}

fn principal_from_request(req: &ServiceRequest) -> Result<Principal, ServerError> {
    let issuer = req.app_data::<web::Data<TokenIssuer>>().ok_or_else(|| {
        error!("🔑️ No token issuer has been registered with the app. Authenticated routes cannot be served.");
        ServerError::Unspecified("Token issuer is not configured".into())
    })?;
    let header = req.headers().get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected a bearer token".into()))?;
    let principal = issuer.validate(token.trim())?;
    Ok(principal)
}
