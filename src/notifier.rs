//! Best-effort booking confirmation notifications.
//!
//! Handlers enqueue a [`ConfirmationNotice`] without waiting; a background
//! worker drains the queue and hands each notice to a [`ConfirmationSender`].
//! Nothing here can fail a request: a full queue drops the notice, and sender
//! errors or panics are logged and swallowed.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::{Booking, Payment};

/// Snapshot of a freshly confirmed booking and its payment.
#[derive(Debug, Clone)]
pub struct ConfirmationNotice {
    pub booking: Booking,
    pub payment: Payment,
}

/// Delivers a confirmation to the customer.
pub trait ConfirmationSender: Send + Sync + 'static {
    fn send_confirmation(
        &self,
        booking: &Booking,
        payment: &Payment,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Non-blocking handle onto the notification queue.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<ConfirmationNotice>,
}

impl Notifier {
    /// Create a notifier and the receiving end for [`spawn_worker`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ConfirmationNotice>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a confirmation. Never blocks and never fails the caller.
    pub fn dispatch(&self, booking: Booking, payment: Payment) {
        let booking_id = booking.id.clone();
        match self.tx.try_send(ConfirmationNotice { booking, payment }) {
            Ok(()) => {
                tracing::debug!(booking_id = %booking_id, "Confirmation notice queued");
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    booking_id = %booking_id,
                    "Notification queue full, dropping confirmation notice"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::error!(
                    booking_id = %booking_id,
                    "Notification worker is gone, dropping confirmation notice"
                );
            }
        }
    }
}

/// Drain the queue until every [`Notifier`] handle is dropped.
pub fn spawn_worker<S: ConfirmationSender>(
    mut rx: mpsc::Receiver<ConfirmationNotice>,
    sender: S,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notice) = rx.recv().await {
            deliver(&sender, &notice).await;
        }
        tracing::info!("Notification queue closed, worker exiting");
    })
}

async fn deliver<S: ConfirmationSender>(sender: &S, notice: &ConfirmationNotice) {
    let booking_id = &notice.booking.id;
    let result = AssertUnwindSafe(sender.send_confirmation(&notice.booking, &notice.payment))
        .catch_unwind()
        .await;

    match result {
        Ok(Ok(())) => {
            tracing::info!(booking_id = %booking_id, "Booking confirmation sent");
        }
        Ok(Err(e)) => {
            tracing::error!(
                booking_id = %booking_id,
                error = %e,
                "Failed to send booking confirmation"
            );
        }
        Err(panic) => {
            let panic_msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(
                "Confirmation sender panicked for booking '{}': {}",
                booking_id,
                panic_msg
            );
        }
    }
}
