use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::application::ledger::RegistrationLedger;
use crate::domain::ports::GatewayNotification;
use crate::error::{FestError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Gateway webhook envelope. Only the fields this core consumes are modeled;
/// everything else in the delivery is ignored.
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Deserialize, Default)]
struct Payload {
    payment: Option<Wrapped<PaymentEntity>>,
    refund: Option<Wrapped<RefundEntity>>,
}

#[derive(Debug, Deserialize)]
struct Wrapped<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
    amount: Option<u64>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundEntity {
    id: String,
    payment_id: String,
}

/// Computes the hex-encoded HMAC-SHA256 signature the gateway attaches to a
/// delivery. Exposed so tests and the script driver can play the gateway.
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies the signature over the raw body in constant time. An invalid
/// signature rejects the delivery before anything is parsed or mutated.
pub fn verify_signature(body: &[u8], signature: &str, secret: &str) -> Result<()> {
    let provided = hex::decode(signature).map_err(|_| FestError::InvalidSignature)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| FestError::InvalidSignature)?;
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    if expected.len() != provided.len() {
        return Err(FestError::InvalidSignature);
    }
    if bool::from(expected.as_slice().ct_eq(&provided)) {
        Ok(())
    } else {
        Err(FestError::InvalidSignature)
    }
}

/// Parses a verified webhook body into a gateway notification.
pub fn parse(body: &[u8]) -> Result<GatewayNotification> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    match envelope.event.as_str() {
        "payment.captured" => {
            let payment = require_payment(envelope.payload)?;
            let order_id = payment.order_id.ok_or_else(|| {
                FestError::Validation("payment.captured without an order id".to_string())
            })?;
            let amount_minor = payment.amount.ok_or_else(|| {
                FestError::Validation("payment.captured without an amount".to_string())
            })?;
            Ok(GatewayNotification::PaymentCaptured {
                order_id,
                payment_id: payment.id,
                amount_minor,
            })
        }
        "payment.failed" => {
            let payment = require_payment(envelope.payload)?;
            let order_id = payment.order_id.ok_or_else(|| {
                FestError::Validation("payment.failed without an order id".to_string())
            })?;
            Ok(GatewayNotification::PaymentFailed {
                order_id,
                payment_id: Some(payment.id),
                error: payment.error_description,
            })
        }
        "refund.created" => {
            let refund = envelope
                .payload
                .refund
                .map(|w| w.entity)
                .ok_or_else(|| {
                    FestError::Validation("refund.created without a refund entity".to_string())
                })?;
            Ok(GatewayNotification::RefundCreated {
                payment_id: refund.payment_id,
                refund_id: refund.id,
            })
        }
        other => Err(FestError::Validation(format!(
            "unsupported webhook event: {other}"
        ))),
    }
}

fn require_payment(payload: Payload) -> Result<PaymentEntity> {
    payload
        .payment
        .map(|w| w.entity)
        .ok_or_else(|| FestError::Validation("webhook without a payment entity".to_string()))
}

/// Full inbound path for one delivery: verify, parse, apply. Rejections are
/// logged; the gateway's own retry policy governs redelivery.
pub async fn process(
    ledger: &RegistrationLedger,
    body: &[u8],
    signature: &str,
    secret: &str,
) -> Result<()> {
    if let Err(e) = verify_signature(body, signature, secret) {
        warn!("webhook rejected: invalid signature");
        return Err(e);
    }
    let notification = parse(body)?;
    ledger.apply_notification(notification).await
}
