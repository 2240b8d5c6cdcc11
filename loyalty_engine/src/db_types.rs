use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use loyalty_common::Points;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::helpers::luhn_valid;

//--------------------------------------     UserAccount       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct UserAccount {
    pub id: i64,
    pub login: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     OrderNumber       ---------------------------------------------------------
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid order number: {0}")]
pub struct InvalidOrderNumber(pub String);

/// A checksum-validated order number. The only way to construct one from untrusted input is through [`FromStr`],
/// which accepts non-empty strings of ASCII digits that pass the Luhn check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl FromStr for OrderNumber {
    type Err = InvalidOrderNumber;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if luhn_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidOrderNumber(s.to_string()))
        }
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub number: OrderNumber,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     Withdrawal        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWithdrawal {
    pub user_id: i64,
    pub order_tag: String,
    pub amount: Points,
}

impl NewWithdrawal {
    pub fn new<S: Into<String>>(user_id: i64, order_tag: S, amount: Points) -> Self {
        Self { user_id, order_tag: order_tag.into(), amount }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    pub order_tag: String,
    pub amount: Points,
    pub created_at: DateTime<Utc>,
}
