use {
    crate::{
        auction::{AuctionId, AuctionStatus},
        money::Amount,
    },
    chrono::{DateTime, SecondsFormat, Utc},
    serde::{Deserialize, Serialize},
};

/// Payload of a `new_bid` broadcast frame.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NewBid {
    pub username: String,
    pub amount_cents: Amount,
    pub amount_display: String,
    pub offer_time: String,
}

/// Payload of a `buy_now` broadcast frame.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BuyNow {
    pub username: String,
    pub amount_display: String,
    pub offer_time: String,
}

/// An event published to an auction's broadcast topic. The serialized form is
/// the exact frame connected clients receive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuctionEvent {
    NewBid {
        new_bid: NewBid,
    },
    BuyNow {
        buy_now: BuyNow,
    },
    AuctionStatusUpdate {
        auction_id: AuctionId,
        status: AuctionStatus,
    },
}

impl AuctionEvent {
    /// The wire name of the event, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewBid { .. } => "new_bid",
            Self::BuyNow { .. } => "buy_now",
            Self::AuctionStatusUpdate { .. } => "auction_status_update",
        }
    }
}

/// ISO-8601 at second precision with offset, e.g. `2026-08-29T12:00:00+00:00`.
pub fn format_offer_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, false)
}

#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeZone, serde_json::json};

    #[test]
    fn new_bid_frame_matches_consumer_payload() {
        let event = AuctionEvent::NewBid {
            new_bid: NewBid {
                username: "alice".to_string(),
                amount_cents: Amount(1500),
                amount_display: Amount(1500).display(),
                offer_time: "2026-08-29T12:00:00+00:00".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "new_bid",
                "new_bid": {
                    "username": "alice",
                    "amount_cents": 1500,
                    "amount_display": "15.00",
                    "offer_time": "2026-08-29T12:00:00+00:00",
                },
            })
        );
    }

    #[test]
    fn buy_now_frame_matches_consumer_payload() {
        let event = AuctionEvent::BuyNow {
            buy_now: BuyNow {
                username: "bob".to_string(),
                amount_display: Amount(5000).display(),
                offer_time: "2026-08-29T12:00:00+00:00".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "buy_now",
                "buy_now": {
                    "username": "bob",
                    "amount_display": "50.00",
                    "offer_time": "2026-08-29T12:00:00+00:00",
                },
            })
        );
    }

    #[test]
    fn status_update_frame_matches_consumer_payload() {
        let event = AuctionEvent::AuctionStatusUpdate {
            auction_id: 42,
            status: AuctionStatus::Closed,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "auction_status_update",
                "auction_id": 42,
                "status": "CLOSED",
            })
        );
    }

    #[test]
    fn offer_time_has_second_precision() {
        let time = Utc.with_ymd_and_hms(2026, 8, 29, 12, 0, 0).unwrap()
            + chrono::TimeDelta::milliseconds(123);
        assert_eq!(format_offer_time(time), "2026-08-29T12:00:00+00:00");
    }
}
