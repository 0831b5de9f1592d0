//! Payment gateway port and a simulated gateway for local runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Checkout request handed to the gateway. `amount_minor` is in minor units (paise, cents).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub merchant_name: String,
    pub description: String,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: String,
    /// Opaque to the gateway; returned untouched on success.
    pub metadata: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub payment_ref: String,
    pub metadata: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("payment failed ({code}): {message}")]
pub struct PaymentFailure {
    pub code: i32,
    pub message: String,
}

impl PaymentFailure {
    pub const CANCELLED: i32 = 0;
    pub const DECLINED: i32 = 2;
    pub const INVALID_REQUEST: i32 = 3;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn open_checkout(&self, request: PaymentRequest) -> Result<PaymentConfirmation, PaymentFailure>;
}

/// Stands in for the hosted checkout. Declines amounts whose minor units end in `123`.
pub struct SimulatedGateway {
    latency: Duration,
}

impl Default for SimulatedGateway {
    fn default() -> Self { Self { latency: Duration::from_millis(50) } }
}

impl SimulatedGateway {
    pub fn new() -> Self { Self::default() }

    pub fn with_latency(latency: Duration) -> Self { Self { latency } }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    #[instrument(skip_all, fields(amount_minor = request.amount_minor, currency = %request.currency))]
    async fn open_checkout(&self, request: PaymentRequest) -> Result<PaymentConfirmation, PaymentFailure> {
        if request.amount_minor <= 0 {
            return Err(PaymentFailure { code: PaymentFailure::INVALID_REQUEST, message: "Amount must be greater than zero".to_string() });
        }
        tokio::time::sleep(self.latency).await;
        if request.amount_minor % 1000 == 123 {
            info!("Simulated payment declined");
            return Err(PaymentFailure { code: PaymentFailure::DECLINED, message: "Payment declined by issuer".to_string() });
        }
        let payment_ref = format!("pay_{}", Uuid::new_v4().simple());
        info!(%payment_ref, "Simulated payment succeeded");
        Ok(PaymentConfirmation { payment_ref, metadata: request.metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount_minor: i64) -> PaymentRequest {
        PaymentRequest {
            amount_minor, currency: "INR".into(), merchant_name: "Baby Dino".into(), description: "Payment for order".into(),
            buyer_name: "Asha".into(), buyer_email: "a@x.in".into(), buyer_phone: "9999999999".into(), metadata: serde_json::json!({"k": 1}),
        }
    }

    #[tokio::test]
    async fn test_simulated_gateway() {
        let gateway = SimulatedGateway::with_latency(Duration::ZERO);
        let ok = gateway.open_checkout(request(45000)).await.unwrap();
        assert!(ok.payment_ref.starts_with("pay_"));
        assert_eq!(ok.metadata["k"], 1);
        assert_eq!(gateway.open_checkout(request(1123)).await.unwrap_err().code, PaymentFailure::DECLINED);
        assert_eq!(gateway.open_checkout(request(0)).await.unwrap_err().code, PaymentFailure::INVALID_REQUEST);
    }
}
