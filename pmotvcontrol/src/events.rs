//! Fan-out of controller notifications to observers over crossbeam channels.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Payload-free notifications; observers re-read the controller afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlayerEvent {
    VideoStateUpdate,
    TrackingUpdate,
    InfoUpdate,
    LockUpdate,
    PlaylistUpdate,
    VideoReady,
    SourceChanged,
}

struct Subscriber {
    topic: Option<PlayerEvent>,
    tx: Sender<PlayerEvent>,
}

#[derive(Clone, Default)]
pub struct PlayerEventBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl PlayerEventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Receives every topic.
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.register(None)
    }

    /// Receives only `topic`.
    pub fn subscribe_to(&self, topic: PlayerEvent) -> Receiver<PlayerEvent> {
        self.register(Some(topic))
    }

    fn register(&self, topic: Option<PlayerEvent>) -> Receiver<PlayerEvent> {
        let (tx, rx) = unbounded::<PlayerEvent>();
        {
            let mut subscribers = self.subscribers.lock().unwrap();
            subscribers.push(Subscriber { topic, tx });
        }
        rx
    }

    pub(crate) fn broadcast(&self, event: PlayerEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|s| match s.topic {
            Some(topic) if topic != event => true,
            _ => s.tx.send(event).is_ok(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_filtering() {
        let bus = PlayerEventBus::new();
        let all = bus.subscribe();
        let locks = bus.subscribe_to(PlayerEvent::LockUpdate);
        bus.broadcast(PlayerEvent::VideoReady);
        bus.broadcast(PlayerEvent::LockUpdate);
        assert_eq!(
            all.try_iter().collect::<Vec<_>>(),
            vec![PlayerEvent::VideoReady, PlayerEvent::LockUpdate]
        );
        assert_eq!(locks.try_iter().collect::<Vec<_>>(), vec![PlayerEvent::LockUpdate]);
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let bus = PlayerEventBus::new();
        let rx = bus.subscribe();
        drop(rx);
        bus.broadcast(PlayerEvent::InfoUpdate);
        assert!(bus.subscribers.lock().unwrap().is_empty());
    }
}
