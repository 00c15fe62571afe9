use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::GatewayError;
use crate::config::GatewayConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: OrderNotes<'a>,
}

/// Free-form notes attached to the gateway order, echoed back in webhooks.
#[derive(Debug, Serialize)]
pub struct OrderNotes<'a> {
    pub booking_id: &'a str,
    pub user_id: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRefundRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<RefundNotes<'a>>,
}

#[derive(Debug, Serialize)]
struct RefundNotes<'a> {
    reason: &'a str,
}

/// Gateway order entity.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub receipt: Option<String>,
}

/// Gateway payment entity.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    pub status: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl GatewayPayment {
    pub fn is_captured(&self) -> bool {
        self.status == "captured"
    }

    /// Human-readable failure reason, if the gateway gave one.
    pub fn failure_reason(&self) -> Option<&str> {
        self.error_description
            .as_deref()
            .or(self.error_code.as_deref())
    }
}

/// Gateway refund entity.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub payment_id: String,
    pub amount: i64,
    pub status: String,
}

/// REST client for the payment gateway (orders, refunds, payment lookups).
///
/// Authenticates with HTTP basic auth `key_id:key_secret`.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    key_id: String,
    key_secret: String,
    api_base: String,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build gateway HTTP client, falling back to defaults");
                Client::new()
            });

        Self {
            client,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Public key ID, handed to the client-side checkout widget.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Verify a checkout signature with this client's key secret.
    pub fn verify_checkout_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        super::verify_checkout_signature(&self.key_secret, order_id, payment_id, signature)
    }

    /// Create an order for `amount` minor units.
    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
        notes: OrderNotes<'_>,
    ) -> Result<GatewayOrder, GatewayError> {
        let request = CreateOrderRequest {
            amount,
            currency,
            receipt,
            notes,
        };

        let response = self
            .client
            .post(self.url(&["orders"])?)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await
            .map_err(GatewayError::Unreachable)?;

        let order: GatewayOrder = read_json(response).await?;
        if order.id.trim().is_empty() {
            return Err(GatewayError::InvalidResponse("order without id".into()));
        }
        Ok(order)
    }

    /// Refund a captured payment. `amount` in minor units; None refunds in full.
    pub async fn create_refund(
        &self,
        payment_id: &str,
        amount: Option<i64>,
        reason: Option<&str>,
    ) -> Result<GatewayRefund, GatewayError> {
        let request = CreateRefundRequest {
            amount,
            notes: reason.map(|reason| RefundNotes { reason }),
        };

        let response = self
            .client
            .post(self.url(&["payments", payment_id, "refund"])?)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await
            .map_err(GatewayError::Unreachable)?;

        read_json(response).await
    }

    pub async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let response = self
            .client
            .get(self.url(&["payments", payment_id])?)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(GatewayError::Unreachable)?;

        read_json(response).await
    }

    /// Build an API URL, percent-encoding each path segment.
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| GatewayError::InvalidResponse(format!("invalid gateway base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidResponse("gateway base URL cannot have a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

// ============ Webhook payloads ============

/// Webhook envelope: `{id?, event, payload: {payment?, order?, refund?}}`.
#[derive(Debug, Deserialize)]
pub struct GatewayWebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub event: String,
    #[serde(default)]
    pub payload: GatewayEventPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct GatewayEventPayload {
    #[serde(default)]
    pub payment: Option<EntityWrapper<GatewayPayment>>,
    #[serde(default)]
    pub order: Option<EntityWrapper<GatewayOrder>>,
    #[serde(default)]
    pub refund: Option<EntityWrapper<GatewayRefund>>,
}

/// Entities arrive wrapped as `{"entity": {...}}`.
#[derive(Debug, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

impl GatewayWebhookEvent {
    pub fn payment(&self) -> Option<&GatewayPayment> {
        self.payload.payment.as_ref().map(|w| &w.entity)
    }

    pub fn order(&self) -> Option<&GatewayOrder> {
        self.payload.order.as_ref().map(|w| &w.entity)
    }

    pub fn refund(&self) -> Option<&GatewayRefund> {
        self.payload.refund.as_ref().map(|w| &w.entity)
    }
}
