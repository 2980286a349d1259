use super::money::{Amount, Currency};
use super::order::{IdempotencyKey, OrderId, WorkshopRef};
use crate::error::BookingError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally redirectable URL where the customer completes payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentLink(String);

impl PaymentLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the gateway reaches the customer about the payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl UserContact {
    pub fn new(
        name: impl Into<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> Result<Self, BookingError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BookingError::ValidationError(
                "Contact name must not be empty".to_string(),
            ));
        }
        if email.is_none() && phone.is_none() {
            return Err(BookingError::ValidationError(
                "Contact needs an email or a phone number".to_string(),
            ));
        }
        if let Some(email) = &email
            && !email.contains('@')
        {
            return Err(BookingError::ValidationError(format!(
                "Invalid contact email '{}'",
                email
            )));
        }
        Ok(Self { name, email, phone })
    }
}

/// Everything the gateway needs to open a payment link for one order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentLinkRequest {
    pub order_id: OrderId,
    pub amount: Amount,
    pub currency: Currency,
    pub contact: UserContact,
    pub idempotency_key: IdempotencyKey,
    pub description: String,
}

/// A workshop as seen through the discovery catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub reference: WorkshopRef,
    pub title: String,
    pub price: Amount,
    pub currency: Currency,
    pub bookable: bool,
}
