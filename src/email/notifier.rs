use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Notification, NotificationKind, Transport};

/// Handle for queueing notifications. Cloning shares the same queue.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Start the delivery task. It runs until every `Notifier` clone is dropped.
    pub fn spawn(transport: Arc<dyn Transport>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();

        let handle = tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(e) = transport.deliver(&notification).await {
                    tracing::error!(
                        recipient = %notification.recipient,
                        kind = ?notification.kind,
                        "Failed to deliver notification: {e}"
                    );
                }
            }
            tracing::debug!("Notifier queue closed");
        });

        (Self { tx }, handle)
    }

    /// Queue a link for delivery. Never blocks on the transport.
    pub fn send(&self, recipient: &str, kind: NotificationKind, link: String) {
        let notification = Notification {
            recipient: recipient.to_string(),
            kind,
            link,
        };
        if self.tx.send(notification).is_err() {
            tracing::error!("Notifier queue closed, dropping {kind:?} notification");
        }
    }
}
