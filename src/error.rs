use crate::domain::order::OrderId;
use crate::domain::status::OrderStatus;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Artifact generation already in progress for order {0}")]
    GenerationInProgress(OrderId),
    #[error("Order {order_id} is {status}; artifacts are only issued for successful orders")]
    NotEligible {
        order_id: OrderId,
        status: OrderStatus,
    },
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),
    #[error("Artifact for order {order_id} expired at {expired_at}")]
    ExpiredArtifact {
        order_id: OrderId,
        expired_at: DateTime<Utc>,
    },
    #[error("Artifact for order {order_id} revoked: {reason}")]
    ArtifactRevoked { order_id: OrderId, reason: String },
    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
    #[error("Order {0} was modified concurrently")]
    ConcurrentModification(OrderId),
    #[error("Generated order id {0} already exists")]
    IdentifierCollision(OrderId),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl BookingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the caller may retry the same request later (with backoff).
    ///
    /// Domain rejections and malformed input are final; contention, deadlines and
    /// upstream outages are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GenerationInProgress(_)
                | Self::UpstreamFailure(_)
                | Self::Timeout { .. }
                | Self::ConcurrentModification(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let id = OrderId::from("ord_1");
        assert!(BookingError::GenerationInProgress(id.clone()).is_retryable());
        assert!(BookingError::Timeout { operation: "gateway" }.is_retryable());
        assert!(!BookingError::IdentifierCollision(id).is_retryable());
        assert!(
            !BookingError::InvalidTransition {
                from: OrderStatus::Created,
                to: OrderStatus::Refunded,
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = BookingError::not_found("order", "ord_42");
        assert_eq!(err.to_string(), "order not found: ord_42");
    }
}
