use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Notification, NotificationKind, Transport};

/// Records every notification instead of sending it.
#[derive(Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn sent_to(&self, recipient: &str, kind: NotificationKind) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.recipient == recipient && n.kind == kind)
            .collect()
    }

    /// Wait up to two seconds for the `count`-th matching notification.
    pub async fn wait_for(
        &self,
        recipient: &str,
        kind: NotificationKind,
        count: usize,
    ) -> Option<Notification> {
        let count = count.max(1);
        for _ in 0..200 {
            let matching = self.sent_to(recipient, kind);
            if matching.len() >= count {
                return matching.into_iter().nth(count - 1);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn deliver(&self, notification: &Notification) -> Result<(), String> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification.clone());
        Ok(())
    }
}
