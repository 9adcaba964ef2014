use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc;

use badcards_core::net::messages::ServerMessage;
use badcards_core::net::protocol::encode_server_message;
use badcards_core::player::PlayerGuid;

/// Per-subscriber sender for outbound binary frames. Bounded so a slow
/// client cannot grow server memory; `Bytes` gives zero-copy cloning when
/// fanning one snapshot out to many subscribers.
pub type SubscriberSender = mpsc::Sender<Bytes>;

/// Identifies one subscriber connection within a session.
pub type ConnectionId = u64;

struct Subscriber {
    guid: PlayerGuid,
    sender: SubscriberSender,
}

/// Fan-out registry for one session's subscribers. Owned by the session's
/// store entry, so every push happens under the store lock and each
/// subscriber's channel observes commits in order.
#[derive(Default)]
pub struct SessionSubscribers {
    next_connection_id: ConnectionId,
    subscribers: HashMap<ConnectionId, Subscriber>,
}

impl SessionSubscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber channel; returns its connection id.
    pub fn attach(&mut self, guid: PlayerGuid, sender: SubscriberSender) -> ConnectionId {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        self.subscribers.insert(id, Subscriber { guid, sender });
        id
    }

    /// Drop a subscriber. In-flight frames queued to it are dropped with
    /// the receiver, not retried.
    pub fn detach(&mut self, id: ConnectionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Send a frame to every subscriber. A full channel is skipped (slow
    /// client, never blocks the rest); a closed channel is detached.
    pub fn push(&mut self, session_id: &str, frame: &Bytes) {
        let mut closed = Vec::new();
        for (&id, sub) in &self.subscribers {
            match sub.sender.try_send(frame.clone()) {
                Ok(()) => {},
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!(
                        connection_id = id,
                        session_id,
                        "Skipping push to slow subscriber (channel full)"
                    );
                },
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push(id);
                },
            }
        }
        for id in closed {
            self.subscribers.remove(&id);
            tracing::debug!(connection_id = id, session_id, "Detached dead subscriber");
        }
    }

    /// Send a frame only to subscribers registered under the given guid.
    pub fn send_to_guid(&self, session_id: &str, guid: PlayerGuid, frame: &Bytes) {
        for (&id, sub) in &self.subscribers {
            if sub.guid == guid && sub.sender.try_send(frame.clone()).is_err() {
                tracing::debug!(
                    connection_id = id,
                    session_id,
                    %guid,
                    "Skipping targeted send to slow or closed subscriber"
                );
            }
        }
    }
}

/// Encode a server message to a shareable frame, logging on failure.
pub fn encode_frame(msg: &ServerMessage) -> Option<Bytes> {
    match encode_server_message(msg) {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server message");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use badcards_core::net::messages::{SessionClosedMsg, SubscribeErrorMsg};
    use uuid::Uuid;

    fn frame() -> Bytes {
        encode_frame(&ServerMessage::SessionClosed(SessionClosedMsg {
            session_id: "ABCD-1234".to_string(),
            reason: "test".to_string(),
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn push_reaches_all_subscribers() {
        let mut subs = SessionSubscribers::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        subs.attach(Uuid::new_v4(), tx1);
        subs.attach(Uuid::new_v4(), tx2);

        subs.push("ABCD-1234", &frame());
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn full_channel_is_skipped_not_blocked() {
        let mut subs = SessionSubscribers::new();
        let (tx_full, _rx_full) = mpsc::channel(1);
        let (tx_ok, mut rx_ok) = mpsc::channel(4);
        subs.attach(Uuid::new_v4(), tx_full);
        subs.attach(Uuid::new_v4(), tx_ok);

        subs.push("ABCD-1234", &frame()); // fills the 1-slot channel
        subs.push("ABCD-1234", &frame()); // second push skips it

        assert_eq!(subs.len(), 2);
        assert!(rx_ok.try_recv().is_ok());
        assert!(rx_ok.try_recv().is_ok());
    }

    #[tokio::test]
    async fn closed_channel_is_detached() {
        let mut subs = SessionSubscribers::new();
        let (tx, rx) = mpsc::channel(4);
        subs.attach(Uuid::new_v4(), tx);
        drop(rx);

        subs.push("ABCD-1234", &frame());
        assert!(subs.is_empty());
    }

    #[tokio::test]
    async fn targeted_send_filters_by_guid() {
        let mut subs = SessionSubscribers::new();
        let target = Uuid::new_v4();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        subs.attach(target, tx1);
        subs.attach(Uuid::new_v4(), tx2);

        let frame = encode_frame(&ServerMessage::SubscribeError(SubscribeErrorMsg {
            reason: "x".to_string(),
        }))
        .unwrap();
        subs.send_to_guid("ABCD-1234", target, &frame);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn detach_removes_subscriber() {
        let mut subs = SessionSubscribers::new();
        let (tx, mut rx) = mpsc::channel(4);
        let id = subs.attach(Uuid::new_v4(), tx);
        assert!(subs.detach(id));
        assert!(!subs.detach(id));

        subs.push("ABCD-1234", &frame());
        assert!(rx.try_recv().is_err());
    }
}
