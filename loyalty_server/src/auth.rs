//! Access tokens.
//!
//! Successful `register` and `login` calls are answered with an HS256 JWT in the `Authorization` header. The token
//! carries the user id (`sub`) and login, and expires after the configured lifetime. Authenticated routes validate it
//! in [`crate::middleware::BearerAuthFactory`], which attaches a [`Principal`] to the request.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id
    pub sub: i64,
    pub login: String,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub login: String,
}

impl From<JwtClaims> for Principal {
    fn from(claims: JwtClaims) -> Self {
        Self { user_id: claims.sub, login: claims.login }
    }
}

impl FromRequest for Principal {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let principal = req.extensions().get::<Principal>().cloned().ok_or_else(|| {
            warn!("🔑️ No principal found in request extensions. Is the route missing the bearer-auth middleware?");
            ServerError::AuthenticationError(AuthError::MissingToken)
        });
        ready(principal)
    }
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry: chrono::Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenIssuer(HS256, expiry: {}s)", self.expiry.num_seconds())
    }
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.reveal().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            expiry: config.token_expiry,
        }
    }

    /// Issue a new access token for the given user. The caller must have checked the user's credentials already.
    pub fn issue_token(&self, user_id: i64, login: &str) -> Result<String, AuthError> {
        self.issue_token_with_expiry(user_id, login, Utc::now() + self.expiry)
    }

    pub fn issue_token_with_expiry(
        &self,
        user_id: i64,
        login: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims =
            JwtClaims { sub: user_id, login: login.to_string(), iat: Utc::now().timestamp(), exp: expires_at.timestamp() };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::CouldNotIssueToken(e.to_string()))
    }

    /// Checks the token's signature and expiry, and returns the caller it was issued to.
    pub fn validate(&self, token: &str) -> Result<Principal, AuthError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::PoorlyFormattedToken(e.to_string())
            },
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        trace!("🔑️ Access token validated for user #{}", data.claims.sub);
        Ok(data.claims.into())
    }
}
