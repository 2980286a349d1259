use super::artifact::ArtifactToken;
use super::money::{Amount, Currency};
use super::payment::PaymentLink;
use super::status::OrderStatus;
use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Globally unique order identifier, never reused.
    OrderId
);
opaque_id!(
    /// Key handed to the payment gateway so a retried request cannot charge twice.
    IdempotencyKey
);
opaque_id!(UserId);
opaque_id!(
    /// Opaque reference into the workshop discovery catalog.
    WorkshopRef
);

impl OrderId {
    /// Draws a fresh identifier from the OS random source (UUID v4).
    pub fn generate() -> Self {
        Self(format!("ord_{}", Uuid::new_v4().simple()))
    }
}

impl IdempotencyKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// One applied status change. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The fields fixed when an order is opened.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub idempotency_key: IdempotencyKey,
    pub user_id: UserId,
    pub workshop: WorkshopRef,
    pub amount: Amount,
    pub currency: Currency,
    pub payment_link: PaymentLink,
}

/// A single booking/payment attempt and the durable record of its payment.
///
/// `status` always equals the status of the last `status_history` entry. The
/// history is append-only with non-decreasing timestamps. Mutations never edit
/// an `Order` in place: [`Order::transition`] and [`Order::with_artifact`] return
/// the next snapshot with `version` bumped, which stores persist with a
/// compare-and-swap against the previous version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub idempotency_key: IdempotencyKey,
    pub user_id: UserId,
    pub workshop: WorkshopRef,
    pub amount: Amount,
    pub currency: Currency,
    pub status: OrderStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub payment_link: PaymentLink,
    #[serde(default)]
    pub verification_artifact: Option<ArtifactToken>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Order {
    pub fn new(draft: NewOrder, now: DateTime<Utc>) -> Self {
        Self {
            order_id: draft.order_id,
            idempotency_key: draft.idempotency_key,
            user_id: draft.user_id,
            workshop: draft.workshop,
            amount: draft.amount,
            currency: draft.currency,
            status: OrderStatus::Created,
            status_history: vec![StatusHistoryEntry {
                status: OrderStatus::Created,
                at: now,
                note: None,
            }],
            payment_link: draft.payment_link,
            verification_artifact: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Returns the snapshot after moving to `next`, or `InvalidTransition` when
    /// the state machine forbids it. `self` is left untouched either way.
    pub fn transition(
        &self,
        next: OrderStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        if !self.status.can_transition_to(next) {
            return Err(BookingError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let at = self.monotonic(now);
        let mut updated = self.clone();
        updated.status_history.push(StatusHistoryEntry {
            status: next,
            at,
            note,
        });
        updated.status = next;
        updated.updated_at = at;
        updated.version += 1;
        Ok(updated)
    }

    /// Returns the snapshot carrying `token`, replacing any earlier artifact.
    pub fn with_artifact(&self, token: ArtifactToken, now: DateTime<Utc>) -> Order {
        let mut updated = self.clone();
        updated.verification_artifact = Some(token);
        updated.updated_at = self.monotonic(now);
        updated.version += 1;
        updated
    }

    pub fn has_artifact(&self) -> bool {
        self.verification_artifact.is_some()
    }

    /// Successful but still without an artifact: the reconciliation target.
    pub fn awaits_artifact(&self) -> bool {
        self.status.issues_artifact() && !self.has_artifact()
    }

    // Wall clocks can step backwards; history timestamps must not.
    fn monotonic(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.status_history.last() {
            Some(last) if last.at > now => last.at,
            _ => now,
        }
    }
}
