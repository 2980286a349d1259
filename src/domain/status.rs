use crate::error::BookingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a payment order.
///
/// Legal transitions:
///
/// | from         | to                                      |
/// |--------------|-----------------------------------------|
/// | `Created`    | `Pending`, `Successful`, `Failed`, `Cancelled` |
/// | `Pending`    | `Successful`, `Failed`, `Cancelled`     |
/// | `Successful` | `Refunded`                              |
///
/// `Failed`, `Cancelled` and `Refunded` accept nothing. Repeating the current
/// status is not a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Pending,
    Successful,
    Failed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn legal_targets(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Created => &[Pending, Successful, Failed, Cancelled],
            Pending => &[Successful, Failed, Cancelled],
            Successful => &[Refunded],
            Failed | Cancelled | Refunded => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.legal_targets().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.legal_targets().is_empty()
    }

    /// The only state whose arrival issues a verification artifact.
    pub fn issues_artifact(self) -> bool {
        self == OrderStatus::Successful
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Pending => "pending",
            OrderStatus::Successful => "successful",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = BookingError;

    /// Parses the status vocabulary used by payment gateway notifications.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(OrderStatus::Created),
            "pending" => Ok(OrderStatus::Pending),
            "successful" | "success" | "paid" => Ok(OrderStatus::Successful),
            "failed" => Ok(OrderStatus::Failed),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(BookingError::ValidationError(format!(
                "Unknown order status '{}'",
                other
            ))),
        }
    }
}
