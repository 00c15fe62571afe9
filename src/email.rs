//! Booking confirmation delivery.
//!
//! Supports three modes:
//! 1. Send via Resend API (when `RESEND_API_KEY` is set)
//! 2. POST to a notification webhook URL (`NOTIFY_WEBHOOK_URL`, takes precedence)
//! 3. Disabled (no message sent, log only)

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EmailConfig;
use crate::error::{AppError, Result};
use crate::models::{Booking, Payment};
use crate::notifier::ConfirmationSender;
use crate::util::to_major_units;

/// Retry delays in seconds (exponential backoff: 1s, 4s, 16s)
const RETRY_DELAYS: &[u64] = &[1, 4, 16];

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Result of attempting to deliver a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    /// Email was sent successfully via Resend
    Sent,
    /// Data was POSTed to the notification webhook
    WebhookCalled,
    /// Delivery is disabled
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    Resend { api_key: String },
    Webhook { url: String },
    Disabled,
}

/// Webhook payload sent when `NOTIFY_WEBHOOK_URL` is configured.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationWebhookPayload<'a> {
    pub event: &'static str,
    pub booking_id: &'a str,
    pub customer_name: &'a str,
    pub customer_email: &'a str,
    pub customer_phone: &'a str,
    pub tour_name: Option<&'a str>,
    pub start_date: String,
    pub end_date: String,
    pub participants: u32,
    pub pickup_location: &'a str,
    /// Major units
    pub amount: f64,
    pub currency: &'a str,
    pub order_id: &'a str,
    pub payment_id: Option<&'a str>,
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
    html: String,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

/// Rendered confirmation message.
#[derive(Debug, Clone)]
pub struct ConfirmationMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Email service using Resend API.
#[derive(Clone)]
pub struct EmailService {
    mode: DeliveryMode,
    from_email: String,
    resend_api_url: String,
    http_client: Client,
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> Self {
        let mode = if let Some(url) = &config.webhook_url {
            DeliveryMode::Webhook { url: url.clone() }
        } else if let Some(api_key) = &config.resend_api_key {
            DeliveryMode::Resend {
                api_key: api_key.clone(),
            }
        } else {
            DeliveryMode::Disabled
        };

        Self {
            mode,
            from_email: config.from.clone(),
            resend_api_url: RESEND_API_URL.to_string(),
            http_client: Client::new(),
        }
    }

    /// Point the Resend mode at a different endpoint.
    pub fn with_resend_api_url(mut self, url: impl Into<String>) -> Self {
        self.resend_api_url = url.into();
        self
    }

    pub fn mode(&self) -> &DeliveryMode {
        &self.mode
    }

    /// Deliver a booking confirmation (or call the webhook, or skip if disabled).
    pub async fn send_booking_confirmation(
        &self,
        booking: &Booking,
        payment: &Payment,
    ) -> Result<EmailSendResult> {
        match &self.mode {
            DeliveryMode::Disabled => {
                tracing::info!(
                    booking_id = %booking.id,
                    to = %booking.customer_email,
                    "Notifications disabled, skipping booking confirmation"
                );
                Ok(EmailSendResult::Disabled)
            }
            DeliveryMode::Webhook { url } => {
                let payload = webhook_payload(booking, payment);
                self.call_webhook_with_retry(url, payload.event, &payload, &booking.id)
                    .await
            }
            DeliveryMode::Resend { api_key } => {
                let message = render_confirmation(booking, payment);
                let request = ResendEmailRequest {
                    from: &self.from_email,
                    to: vec![booking.customer_email.as_str()],
                    subject: message.subject,
                    text: message.text,
                    html: message.html,
                };
                self.send_request_with_retry(api_key, &request, &booking.customer_email, &booking.id)
                    .await
            }
        }
    }

    /// Send a request to Resend API with exponential backoff retry.
    ///
    /// Retries on transient errors (network issues, 5xx, 429 rate limit).
    /// Fails immediately on non-transient errors (4xx except 429).
    async fn send_request_with_retry(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
        to_email: &str,
        booking_id: &str,
    ) -> Result<EmailSendResult> {
        let mut last_error: Option<AppError> = None;

        for (attempt, delay_secs) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
            if *delay_secs > 0 {
                tracing::warn!(
                    attempt,
                    delay_secs,
                    "Retrying email send after transient failure"
                );
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }

            match self.send_resend_request(api_key, request).await {
                Ok(()) => {
                    tracing::info!(
                        attempt,
                        to = %to_email,
                        booking_id = %booking_id,
                        "Booking confirmation email sent via Resend"
                    );
                    return Ok(EmailSendResult::Sent);
                }
                Err((error, true)) => last_error = Some(error),
                Err((error, false)) => return Err(error),
            }
        }

        tracing::error!(
            to = %to_email,
            booking_id = %booking_id,
            attempts = RETRY_DELAYS.len() + 1,
            "Email send failed after all retries"
        );
        Err(last_error.unwrap_or_else(|| {
            AppError::Internal("Email service error: all retries exhausted".into())
        }))
    }

    /// Send a single request to Resend API.
    ///
    /// Returns Ok(()) on success, or Err((AppError, is_transient)) on failure.
    async fn send_resend_request(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
    ) -> std::result::Result<(), (AppError, bool)> {
        let response = self
            .http_client
            .post(&self.resend_api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to Resend API");
                (
                    AppError::Internal(format!("Email service error: {}", e)),
                    true,
                )
            })?;

        let status = response.status();

        if status.is_success() {
            let _result: ResendEmailResponse = response.json().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to parse Resend API response");
                (AppError::Internal("Email service response error".into()), false)
            })?;
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            let is_transient = is_transient_status(status);

            if is_transient {
                tracing::warn!(status = %status, body = %body, "Resend API returned transient error");
            } else {
                tracing::error!(status = %status, body = %body, "Resend API returned non-transient error");
            }

            Err((
                AppError::Internal(format!("Email service error: {} - {}", status, body)),
                is_transient,
            ))
        }
    }

    /// Call the notification webhook with exponential backoff retry.
    ///
    /// A 4xx from the receiver is not retried. Both a 4xx and exhausted
    /// retries are returned as errors.
    async fn call_webhook_with_retry<T: Serialize>(
        &self,
        webhook_url: &str,
        event_name: &str,
        payload: &T,
        booking_id: &str,
    ) -> Result<EmailSendResult> {
        for (attempt, delay_secs) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
            if *delay_secs > 0 {
                tracing::warn!(
                    attempt,
                    delay_secs,
                    webhook_url = %webhook_url,
                    "Retrying webhook call after transient failure"
                );
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }

            match self.send_webhook_request(webhook_url, event_name, payload).await {
                Ok(()) => {
                    tracing::info!(
                        attempt,
                        webhook_url = %webhook_url,
                        booking_id = %booking_id,
                        "Confirmation webhook called successfully"
                    );
                    return Ok(EmailSendResult::WebhookCalled);
                }
                Err(false) => {
                    tracing::warn!(
                        webhook_url = %webhook_url,
                        booking_id = %booking_id,
                        "Webhook returned non-transient error, not retrying"
                    );
                    return Err(AppError::Internal(
                        "Notification webhook rejected the confirmation".into(),
                    ));
                }
                Err(true) => {}
            }
        }

        tracing::error!(
            webhook_url = %webhook_url,
            booking_id = %booking_id,
            attempts = RETRY_DELAYS.len() + 1,
            "Webhook call failed after all retries, confirmation not delivered"
        );
        Err(AppError::Internal(
            "Notification webhook failed after all retries".into(),
        ))
    }

    /// Send a single webhook request.
    ///
    /// Returns Ok(()) on success, or Err(is_transient) on failure.
    async fn send_webhook_request<T: Serialize>(
        &self,
        webhook_url: &str,
        event_name: &str,
        payload: &T,
    ) -> std::result::Result<(), bool> {
        let response = self
            .http_client
            .post(webhook_url)
            .header("X-Tourpay-Event", event_name)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, webhook_url = %webhook_url, "Failed to send webhook request");
                true
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            status = %status,
            body = %body,
            webhook_url = %webhook_url,
            "Webhook returned error"
        );
        Err(is_transient_status(status))
    }
}

impl ConfirmationSender for EmailService {
    async fn send_confirmation(&self, booking: &Booking, payment: &Payment) -> Result<()> {
        self.send_booking_confirmation(booking, payment)
            .await
            .map(|_| ())
    }
}

fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

fn webhook_payload<'a>(booking: &'a Booking, payment: &'a Payment) -> ConfirmationWebhookPayload<'a> {
    ConfirmationWebhookPayload {
        event: "booking_confirmed",
        booking_id: &booking.id,
        customer_name: &booking.customer_name,
        customer_email: &booking.customer_email,
        customer_phone: &booking.customer_phone,
        tour_name: booking.tour_name.as_deref(),
        start_date: booking.start_date.to_string(),
        end_date: booking.end_date.to_string(),
        participants: booking.participants,
        pickup_location: &booking.pickup_location,
        amount: to_major_units(payment.amount),
        currency: &payment.currency,
        order_id: &payment.id,
        payment_id: payment.payment_id.as_deref(),
    }
}

/// Render the confirmation email (text and HTML).
pub fn render_confirmation(booking: &Booking, payment: &Payment) -> ConfirmationMessage {
    let tour = booking.tour_name.as_deref().unwrap_or("your trip");
    let start = booking.start_date.format("%b %d, %Y").to_string();
    let end = booking.end_date.format("%b %d, %Y").to_string();
    let amount = format!("{} {:.2}", payment.currency, to_major_units(payment.amount));
    let payment_ref = payment.payment_id.as_deref().unwrap_or(&payment.id);

    let subject = format!("Booking confirmed: {}", tour);
    let text = format!(
        "Hi {},\n\nYour booking for {} is confirmed.\n\nBooking ID: {}\nDates: {} to {}\nParticipants: {}\nPickup: {}\nAmount paid: {}\nPayment reference: {}\n\nSee you soon!",
        booking.customer_name,
        tour,
        booking.id,
        start,
        end,
        booking.participants,
        booking.pickup_location,
        amount,
        payment_ref
    );
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">Your booking for {} is confirmed</h2>
<p>Hi {},</p>
<table style="border-collapse: collapse; width: 100%;">
<tr><td style="color: #666; padding: 4px 0;">Booking ID</td><td><code>{}</code></td></tr>
<tr><td style="color: #666; padding: 4px 0;">Dates</td><td>{} to {}</td></tr>
<tr><td style="color: #666; padding: 4px 0;">Participants</td><td>{}</td></tr>
<tr><td style="color: #666; padding: 4px 0;">Pickup</td><td>{}</td></tr>
<tr><td style="color: #666; padding: 4px 0;">Amount paid</td><td><strong>{}</strong></td></tr>
<tr><td style="color: #666; padding: 4px 0;">Payment reference</td><td><code>{}</code></td></tr>
</table>
<hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
<p style="color: #999; font-size: 12px;">Keep this email for your records.</p>
</body>
</html>"#,
        escape_html(tour),
        escape_html(&booking.customer_name),
        booking.id,
        start,
        end,
        booking.participants,
        escape_html(&booking.pickup_location),
        amount,
        escape_html(payment_ref)
    );

    ConfirmationMessage {
        subject,
        text,
        html,
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
