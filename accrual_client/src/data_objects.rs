use std::fmt::Display;

use loyalty_common::Points;
use serde::{Deserialize, Serialize};

/// Processing state of an order as reported by the accrual service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    /// The service does not know the order yet.
    New,
    /// The order is registered with the service, but no calculation has started.
    Registered,
    /// The service rejected the order. No points will be awarded.
    Invalid,
    /// The accrual is being calculated.
    Processing,
    /// The accrual is final.
    Processed,
}

impl AccrualStatus {
    /// Terminal states never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }
}

impl Display for AccrualStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::Registered => "REGISTERED",
            Self::Invalid => "INVALID",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualOutcome {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Points>,
}

impl AccrualOutcome {
    pub fn new<S: Into<String>>(order: S, status: AccrualStatus, accrual: Option<Points>) -> Self {
        Self { order: order.into(), status, accrual }.normalized()
    }

    /// The outcome reported for orders the service has never seen (HTTP 204).
    pub fn unregistered<S: Into<String>>(order: S) -> Self {
        Self { order: order.into(), status: AccrualStatus::New, accrual: None }
    }

    pub fn processed<S: Into<String>>(order: S, accrual: Points) -> Self {
        Self { order: order.into(), status: AccrualStatus::Processed, accrual: Some(accrual) }
    }

    /// The points that count towards a balance. Only processed orders award anything.
    pub fn awarded(&self) -> Points {
        match self.status {
            AccrualStatus::Processed => self.accrual.unwrap_or_default(),
            _ => Points::default(),
        }
    }

    /// Drops any accrual value attached to a non-processed state.
    pub fn normalized(mut self) -> Self {
        if self.status != AccrualStatus::Processed {
            self.accrual = None;
        }
        self
    }
}
