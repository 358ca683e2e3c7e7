//! Background delivery worker for notifications.
//!
//! Lifecycle handlers queue notifications on a channel and return at once.
//! The worker batches whatever arrives within a short window, drops exact
//! duplicates, and hands each one to the configured [`Notifier`].

use std::sync::Arc;

use tokio::sync::mpsc;

use super::{Notification, Notifier};

const DEBOUNCE_MS: u64 = 100;

/// Starts the background notification worker. Runs until every sender is dropped.
pub async fn start_notification_worker(
    mut receiver: mpsc::Receiver<Notification>,
    notifier: Arc<dyn Notifier>,
) {
    log::info!("Notification worker started");

    while let Some(first) = receiver.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = receiver.try_recv() {
            batch.push(next);
        }

        // Small delay to collect bursts, e.g. a reviewer accepting several applicants
        tokio::time::sleep(tokio::time::Duration::from_millis(DEBOUNCE_MS)).await;

        while let Ok(next) = receiver.try_recv() {
            log::debug!("Batching notification after debounce delay");
            batch.push(next);
        }

        let mut pending: Vec<Notification> = Vec::with_capacity(batch.len());
        for notification in batch {
            if !pending.contains(&notification) {
                pending.push(notification);
            }
        }

        for notification in &pending {
            if let Err(e) = notifier.deliver(notification).await {
                log::error!(
                    "Failed to deliver {:?} notification for position {}: {}",
                    notification.kind,
                    notification.pid,
                    e
                );
            }
        }
        log::debug!("Delivered {} notification(s)", pending.len());
    }

    log::info!("Notification worker stopped");
}
