//! In-process change bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use synhub_domain::change::Change;

use crate::ports::ChangePublisher;

/// In-process change bus using a tokio [`broadcast`] channel.
///
/// Sending does not need a runtime, so engine threads publish directly.
/// Publishing succeeds even when there are no active subscribers
/// (the change is simply dropped).
pub struct ChangeBus {
    sender: broadcast::Sender<Change>,
}

impl ChangeBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to changes on this bus.
    ///
    /// Returns a receiver that will get all changes published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.sender.subscribe()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ChangePublisher for ChangeBus {
    fn publish(&self, change: Change) {
        // fails only when there are zero receivers
        let _ = self.sender.send(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synhub_domain::id::ActionId;

    #[tokio::test]
    async fn should_deliver_change_to_subscriber() {
        let bus = ChangeBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(Change::ActionAdded {
            action: ActionId::from_raw(1),
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.action(), Some(ActionId::from_raw(1)));
    }

    #[tokio::test]
    async fn should_deliver_change_to_multiple_subscribers() {
        let bus = ChangeBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(Change::EventsChanged);

        assert_eq!(rx1.recv().await.unwrap(), Change::EventsChanged);
        assert_eq!(rx2.recv().await.unwrap(), Change::EventsChanged);
    }

    #[test]
    fn should_publish_without_runtime_or_subscribers() {
        let bus = ChangeBus::default();
        bus.publish(Change::EventsChanged);
        let mut rx = bus.subscribe();
        bus.publish(Change::ActionRemoved {
            action: ActionId::from_raw(2),
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            Change::ActionRemoved {
                action: ActionId::from_raw(2)
            }
        );
    }
}
