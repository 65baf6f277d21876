//! Best effort fan-out of live auction events to connected clients.
//!
//! Every auction has its own topic, keyed by auction id. Publishing is fire
//! and forget: events reach the subscribers connected at publish time and
//! nobody else. A client that was disconnected (or lagged behind) reconciles
//! by re-reading the auction state, so nothing here is durable.

use {
    dashmap::DashMap,
    model::{auction::AuctionId, event::AuctionEvent},
    std::sync::Arc,
    tokio::sync::{broadcast, mpsc},
};

/// Capacity of a topic channel. Subscribers that fall further behind than
/// this miss events instead of applying backpressure to publishers.
const TOPIC_CAPACITY: usize = 64;

#[derive(Clone, Default)]
pub struct Broadcaster {
    topics: Arc<DashMap<AuctionId, broadcast::Sender<AuctionEvent>>>,
    relay: Option<mpsc::UnboundedSender<(AuctionId, AuctionEvent)>>,
}

impl Broadcaster {
    /// A broadcaster that additionally hands every published event to the
    /// returned feed, for a relay that forwards them to the other instances
    /// of the service.
    pub fn with_relay() -> (Self, mpsc::UnboundedReceiver<(AuctionId, AuctionEvent)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let broadcaster = Self {
            topics: Default::default(),
            relay: Some(sender),
        };
        (broadcaster, receiver)
    }

    /// Joins the topic of the given auction, creating it if this is the first
    /// subscriber. Dropping the returned subscription leaves the topic.
    pub fn subscribe(&self, auction_id: AuctionId) -> Subscription {
        let receiver = self
            .topics
            .entry(auction_id)
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe();
        Subscription {
            receiver,
            topics: self.topics.clone(),
            auction_id,
        }
    }

    /// Delivers the event to everybody currently subscribed to the auction's
    /// topic, and to the relay feed when one is attached. Never blocks and
    /// never fails; publishing to an auction nobody watches does nothing.
    pub fn publish(&self, auction_id: AuctionId, event: &AuctionEvent) {
        self.deliver(auction_id, event);
        if let Some(relay) = &self.relay
            && relay.send((auction_id, event.clone())).is_err()
        {
            tracing::warn!(auction_id, "relay is gone, other instances miss this event");
        }
    }

    /// Local fan-out only. The relay injects events originating on other
    /// instances through this, which keeps them from echoing back out.
    pub fn deliver(&self, auction_id: AuctionId, event: &AuctionEvent) {
        let Some(topic) = self.topics.get(&auction_id) else {
            tracing::trace!(auction_id, kind = event.kind(), "no live subscribers");
            return;
        };
        let receivers = topic.send(event.clone()).unwrap_or(0);
        tracing::debug!(auction_id, kind = event.kind(), receivers, "published event");
    }

    /// Number of currently live topics. Diagnostic only.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<AuctionEvent>,
    topics: Arc<DashMap<AuctionId, broadcast::Sender<AuctionEvent>>>,
    auction_id: AuctionId,
}

impl Subscription {
    /// The next event on the topic, or `None` once the topic is gone. A
    /// lagged subscriber skips the missed events and keeps receiving.
    pub async fn recv(&mut self) -> Option<AuctionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(
                        auction_id = self.auction_id,
                        missed,
                        "subscriber lagged, events dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Prune the topic when the last subscriber leaves. Our own receiver
        // still counts at this point.
        self.topics
            .remove_if(&self.auction_id, |_, sender| sender.receiver_count() <= 1);
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        model::{auction::AuctionStatus, event::NewBid, money::Amount},
    };

    fn new_bid(amount: i64) -> AuctionEvent {
        AuctionEvent::NewBid {
            new_bid: NewBid {
                username: "alice".to_string(),
                amount_cents: Amount(amount),
                amount_display: Amount(amount).display(),
                offer_time: "2026-08-29T12:00:00+00:00".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn delivers_to_all_topic_subscribers() {
        let broadcaster = Broadcaster::default();
        let mut first = broadcaster.subscribe(1);
        let mut second = broadcaster.subscribe(1);
        let mut other_topic = broadcaster.subscribe(2);

        broadcaster.publish(1, &new_bid(1500));
        assert_eq!(first.recv().await, Some(new_bid(1500)));
        assert_eq!(second.recv().await, Some(new_bid(1500)));

        broadcaster.publish(
            2,
            &AuctionEvent::AuctionStatusUpdate {
                auction_id: 2,
                status: AuctionStatus::Closed,
            },
        );
        let received = other_topic.recv().await.unwrap();
        assert_eq!(received.kind(), "auction_status_update");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let broadcaster = Broadcaster::default();
        broadcaster.publish(1, &new_bid(1500));
        assert_eq!(broadcaster.topic_count(), 0);
    }

    #[tokio::test]
    async fn disconnected_subscriber_misses_events() {
        let broadcaster = Broadcaster::default();
        let subscription = broadcaster.subscribe(1);
        drop(subscription);
        // The topic is gone and the event goes nowhere.
        assert_eq!(broadcaster.topic_count(), 0);
        broadcaster.publish(1, &new_bid(1500));

        let mut late = broadcaster.subscribe(1);
        broadcaster.publish(1, &new_bid(2000));
        assert_eq!(late.recv().await, Some(new_bid(2000)));
    }

    #[tokio::test]
    async fn publish_feeds_the_relay() {
        let (broadcaster, mut relay) = Broadcaster::with_relay();
        let mut subscription = broadcaster.subscribe(1);
        broadcaster.publish(1, &new_bid(1500));
        assert_eq!(subscription.recv().await, Some(new_bid(1500)));
        assert_eq!(relay.try_recv().unwrap(), (1, new_bid(1500)));
    }

    #[tokio::test]
    async fn delivered_events_do_not_echo_into_the_relay() {
        let (broadcaster, mut relay) = Broadcaster::with_relay();
        let mut subscription = broadcaster.subscribe(1);
        broadcaster.deliver(1, &new_bid(2000));
        assert_eq!(subscription.recv().await, Some(new_bid(2000)));
        assert!(relay.try_recv().is_err());
    }

    #[tokio::test]
    async fn topic_survives_while_other_subscribers_remain() {
        let broadcaster = Broadcaster::default();
        let first = broadcaster.subscribe(1);
        let mut second = broadcaster.subscribe(1);
        drop(first);
        assert_eq!(broadcaster.topic_count(), 1);
        broadcaster.publish(1, &new_bid(1500));
        assert_eq!(second.recv().await, Some(new_bid(1500)));
    }
}
