use {
    crate::{auction::AuctionId, money::Amount, role::RoleId},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

pub type OfferId = i64;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferKind {
    Bid,
    BuyNow,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Active,
    Cancelled,
}

/// A committed bid or buy now purchase. Offers are immutable after insertion
/// except for status cancellation, which the core flows never exercise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub auction_id: AuctionId,
    pub buyer_role_id: RoleId,
    pub kind: OfferKind,
    pub status: OfferStatus,
    pub amount_cents: Amount,
    pub offer_time: DateTime<Utc>,
}

/// The one offer that won a closed auction. Its existence implies the
/// auction's status is CLOSED.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WinnerOffer {
    pub auction_id: AuctionId,
    pub offer_id: OfferId,
    pub created_at: DateTime<Utc>,
}
