use crate::domain::payment::{PaymentLink, PaymentLinkRequest};
use crate::domain::ports::PaymentGateway;
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, instrument};

/// Stand-in for the hosted payment-link provider.
///
/// Links are deterministic (`<base_url>/pay/<order_id>`), so replays and tests can
/// predict them. Requests are recorded, which lets callers assert what the
/// gateway was asked to do, idempotency keys included.
#[derive(Clone)]
pub struct SimulatedGateway {
    base_url: String,
    latency: Option<Duration>,
    outage: Option<String>,
    requests: Arc<Mutex<Vec<PaymentLinkRequest>>>,
}

impl SimulatedGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            latency: None,
            outage: None,
            requests: Arc::default(),
        }
    }

    /// Delays every response, simulating network latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every request fail as if the provider were unavailable.
    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.outage = Some(reason.into());
        self
    }

    pub async fn requests(&self) -> Vec<PaymentLinkRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    #[instrument(skip_all, fields(order_id = %request.order_id, amount = %request.amount))]
    async fn create_payment_link(&self, request: PaymentLinkRequest) -> Result<PaymentLink> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(reason) = &self.outage {
            return Err(BookingError::UpstreamFailure(format!(
                "payment gateway unavailable: {}",
                reason
            )));
        }

        let link = PaymentLink::new(format!("{}/pay/{}", self.base_url, request.order_id));
        info!(link = %link, "Simulated payment link issued");
        self.requests.lock().await.push(request);
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::{Amount, Currency};
    use crate::domain::order::{IdempotencyKey, OrderId};
    use crate::domain::payment::UserContact;
    use rust_decimal_macros::dec;

    fn request() -> PaymentLinkRequest {
        PaymentLinkRequest {
            order_id: OrderId::from("ord_gw"),
            amount: Amount::new(dec!(500)).unwrap(),
            currency: Currency::new("INR").unwrap(),
            contact: UserContact::new("Asha", Some("asha@example.com".into()), None).unwrap(),
            idempotency_key: IdempotencyKey::from("key-1"),
            description: "Booking: Pottery".to_string(),
        }
    }

    #[tokio::test]
    async fn test_link_is_derived_from_order_id() {
        let gateway = SimulatedGateway::new("https://pay.example.com/");
        let link = gateway.create_payment_link(request()).await.unwrap();
        assert_eq!(link.as_str(), "https://pay.example.com/pay/ord_gw");

        let seen = gateway.requests().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].idempotency_key, IdempotencyKey::from("key-1"));
    }

    #[tokio::test]
    async fn test_outage_is_an_upstream_failure() {
        let gateway = SimulatedGateway::new("https://pay.example.com").unavailable("maintenance");
        let result = gateway.create_payment_link(request()).await;
        assert!(matches!(result, Err(BookingError::UpstreamFailure(_))));
        assert!(gateway.requests().await.is_empty());
    }
}
