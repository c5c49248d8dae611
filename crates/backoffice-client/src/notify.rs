//! Process-wide notification sink for server-pushed messages.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use backoffice_api_models::Message;

/// Shared queue of notifications awaiting display.
///
/// Every response envelope routes its messages here; renderers drain the
/// queue when they are ready to show them.
#[derive(Debug, Clone, Default)]
pub struct NotificationBus {
    queue: Arc<Mutex<VecDeque<Message>>>,
}

impl NotificationBus {
    /// Empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one notification.
    pub fn push(&self, message: Message) {
        self.lock().push_back(message);
    }

    /// Queue several notifications in order.
    pub fn extend(&self, messages: impl IntoIterator<Item = Message>) {
        self.lock().extend(messages);
    }

    /// Take every queued notification.
    #[must_use]
    pub fn drain(&self) -> Vec<Message> {
        self.lock().drain(..).collect()
    }

    /// Number of queued notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_queue() {
        let bus = NotificationBus::new();
        let other = bus.clone();
        bus.push(Message::success("saved"));
        other.extend([Message {
            message: "careful".into(),
            level: 30,
        }]);

        assert_eq!(bus.len(), 2);
        let drained = other.drain();
        assert_eq!(drained[0].message, "saved");
        assert_eq!(drained[1].message, "careful");
        assert!(bus.is_empty());
    }
}
