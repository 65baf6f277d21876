//! Cross-instance relay for broadcast events.
//!
//! Each instance fans events out to its own in-process topics only, so a
//! bid handled by one instance would never reach WebSocket clients
//! connected to another. The relay closes that gap over postgres: every
//! locally published event is NOTIFYed on a shared channel and every
//! instance listens, delivering foreign events into its local topics. The
//! origin tag keeps an instance from echoing its own events back to its
//! subscribers. Delivery stays best effort, matching the topics themselves.

use {
    anyhow::{Context, Result, bail},
    broadcast::Broadcaster,
    chrono::Utc,
    model::{auction::AuctionId, event::AuctionEvent},
    serde::{Deserialize, Serialize},
    sqlx::{PgPool, postgres::PgListener},
    tokio::sync::mpsc,
};

const CHANNEL: &str = "auction_events";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Envelope {
    origin: String,
    auction_id: AuctionId,
    event: AuctionEvent,
}

pub struct Relay {
    db: PgPool,
    broadcast: Broadcaster,
    outbound: mpsc::UnboundedReceiver<(AuctionId, AuctionEvent)>,
    origin: String,
}

impl Relay {
    pub fn new(
        db: PgPool,
        broadcast: Broadcaster,
        outbound: mpsc::UnboundedReceiver<(AuctionId, AuctionEvent)>,
    ) -> Self {
        // Unique per instance; a collision would only suppress an echo.
        let origin = format!(
            "{}:{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        Self {
            db,
            broadcast,
            outbound,
            origin,
        }
    }

    pub async fn run_forever(mut self) -> ! {
        loop {
            if let Err(err) = self.run().await {
                tracing::error!(?err, "event relay failed, reconnecting");
            }
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }

    async fn run(&mut self) -> Result<()> {
        let mut listener = PgListener::connect_with(&self.db)
            .await
            .context("connect listener")?;
        listener.listen(CHANNEL).await.context("listen")?;
        loop {
            tokio::select! {
                outbound = self.outbound.recv() => {
                    let Some((auction_id, event)) = outbound else {
                        // The broadcaster holding the sender lives as long
                        // as the process.
                        bail!("event feed closed");
                    };
                    self.notify(auction_id, event).await?;
                }
                notification = listener.recv() => {
                    self.dispatch(notification.context("recv notification")?.payload());
                }
            }
        }
    }

    async fn notify(&self, auction_id: AuctionId, event: AuctionEvent) -> Result<()> {
        let envelope = Envelope {
            origin: self.origin.clone(),
            auction_id,
            event,
        };
        let payload = serde_json::to_string(&envelope).context("encode envelope")?;
        sqlx::query("SELECT pg_notify($1, $2);")
            .bind(CHANNEL)
            .bind(payload)
            .execute(&self.db)
            .await
            .context("pg_notify")?;
        Ok(())
    }

    fn dispatch(&self, payload: &str) {
        let envelope: Envelope = match serde_json::from_str(payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(?err, "malformed relay payload");
                return;
            }
        };
        if envelope.origin == self.origin {
            return;
        }
        self.broadcast.deliver(envelope.auction_id, &envelope.event);
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        model::auction::AuctionStatus,
        std::time::Duration,
    };

    fn relay() -> Relay {
        let (broadcast, outbound) = Broadcaster::with_relay();
        let db = PgPool::connect_lazy("postgresql://").unwrap();
        Relay::new(db, broadcast, outbound)
    }

    fn status_update() -> AuctionEvent {
        AuctionEvent::AuctionStatusUpdate {
            auction_id: 1,
            status: AuctionStatus::Closed,
        }
    }

    fn envelope(origin: &str) -> String {
        serde_json::to_string(&Envelope {
            origin: origin.to_string(),
            auction_id: 1,
            event: status_update(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn foreign_events_reach_local_subscribers() {
        let relay = relay();
        let mut subscription = relay.broadcast.subscribe(1);
        relay.dispatch(&envelope("other-instance"));
        assert_eq!(subscription.recv().await, Some(status_update()));
    }

    #[tokio::test(start_paused = true)]
    async fn own_events_are_not_echoed() {
        let relay = relay();
        let mut subscription = relay.broadcast.subscribe(1);
        let origin = relay.origin.clone();
        relay.dispatch(&envelope(&origin));
        assert!(
            tokio::time::timeout(Duration::from_millis(50), subscription.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_payloads_are_dropped() {
        let relay = relay();
        let mut subscription = relay.broadcast.subscribe(1);
        relay.dispatch("not json");
        assert!(
            tokio::time::timeout(Duration::from_millis(50), subscription.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_relay_round_trip() {
        let db = PgPool::connect("postgresql://").await.unwrap();
        let (local, local_feed) = Broadcaster::with_relay();
        let (remote, remote_feed) = Broadcaster::with_relay();
        tokio::spawn(Relay::new(db.clone(), local.clone(), local_feed).run_forever());
        tokio::spawn(Relay::new(db.clone(), remote.clone(), remote_feed).run_forever());
        // Give the listeners a moment to attach.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut subscription = remote.subscribe(1);
        local.publish(1, &status_update());
        let received = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
            .await
            .unwrap();
        assert_eq!(received, Some(status_update()));
    }
}
