use super::money::{Amount, Currency};
use super::order::{Order, OrderId, UserId, WorkshopRef};
use super::status::OrderStatus;
use crate::error::{BookingError, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version tag prefixed to every encoded token.
pub const TOKEN_PREFIX: &str = "wp1.";

const VERIFICATION_KEY_BYTES: usize = 32;

/// Random, unguessable key that makes each artifact unique (256 bits, base64url).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationKey(String);

impl VerificationKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; VERIFICATION_KEY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn check(&self) -> Result<()> {
        match URL_SAFE_NO_PAD.decode(&self.0) {
            Ok(bytes) if bytes.len() == VERIFICATION_KEY_BYTES => Ok(()),
            _ => Err(BookingError::InvalidArtifact(
                "verification key is not 256 bits of base64url".to_string(),
            )),
        }
    }
}

/// Decoded contents of a verification token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPayload {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub workshop: WorkshopRef,
    pub amount: Amount,
    pub currency: Currency,
    pub status_at_generation: OrderStatus,
    pub generated_at: DateTime<Utc>,
    /// `None` means the artifact never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub verification_key: VerificationKey,
}

impl ArtifactPayload {
    /// Builds a payload from the order snapshot with a fresh verification key.
    pub fn for_order(order: &Order, generated_at: DateTime<Utc>, ttl: Option<TimeDelta>) -> Self {
        Self {
            order_id: order.order_id.clone(),
            user_id: order.user_id.clone(),
            workshop: order.workshop.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            status_at_generation: order.status,
            generated_at,
            expires_at: ttl.map(|ttl| generated_at + ttl),
            verification_key: VerificationKey::generate(),
        }
    }

    pub fn encode(&self) -> Result<ArtifactToken> {
        let json = serde_json::to_vec(self)?;
        Ok(ArtifactToken(format!(
            "{}{}",
            TOKEN_PREFIX,
            URL_SAFE_NO_PAD.encode(json)
        )))
    }

    /// Fails with `ExpiredArtifact` once `expires_at` is reached.
    pub fn ensure_unexpired(&self, now: DateTime<Utc>) -> Result<()> {
        match self.expires_at {
            Some(expires_at) if expires_at <= now => Err(BookingError::ExpiredArtifact {
                order_id: self.order_id.clone(),
                expired_at: expires_at,
            }),
            _ => Ok(()),
        }
    }
}

/// Self-contained bearer token embedded in the scannable code.
///
/// Format: `wp1.` followed by the base64url (unpadded) JSON payload. The token is
/// signed by nothing and encrypted by nothing; holders prove possession, and
/// check-in cross-checks it against the stored order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactToken(String);

impl ArtifactToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<ArtifactPayload> {
        let body = self
            .0
            .trim()
            .strip_prefix(TOKEN_PREFIX)
            .ok_or_else(|| BookingError::InvalidArtifact("unknown token prefix".to_string()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| BookingError::InvalidArtifact(format!("token is not base64url: {}", e)))?;
        let payload: ArtifactPayload = serde_json::from_slice(&bytes).map_err(|e| {
            BookingError::InvalidArtifact(format!("token payload is malformed: {}", e))
        })?;
        payload.verification_key.check()?;
        Ok(payload)
    }
}

impl From<&str> for ArtifactToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ArtifactToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ArtifactToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
