//! The persistence seam of the offer engine and the auction closer.
//!
//! Advisory validation runs on plain reads; the mutating operations are
//! coarse on purpose: each one is a single transaction that re-checks the
//! racy preconditions while holding the auction row lock, so concurrent
//! bids, buy nows and closes serialize per auction.

use {
    chrono::{DateTime, Utc},
    model::{
        auction::{Auction, AuctionId},
        money::Amount,
        offer::{Offer, WinnerOffer},
        role::{Buyer, RoleId, Seller, UserId},
    },
    thiserror::Error,
};

/// A validated bid about to be persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct BidCandidate {
    pub auction_id: AuctionId,
    pub buyer_role_id: RoleId,
    pub amount: Amount,
    pub offer_time: DateTime<Utc>,
}

/// A validated buy now purchase about to be persisted. The price is read
/// from the auction row under the lock.
#[derive(Clone, Debug, PartialEq)]
pub struct BuyNowCandidate {
    pub auction_id: AuctionId,
    pub buyer_role_id: RoleId,
    pub offer_time: DateTime<Utc>,
}

/// A new listing as provided by a seller.
#[derive(Clone, Debug, PartialEq)]
pub struct NewAuction {
    pub title: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub min_price_cents: Amount,
    pub buy_now_price_cents: Option<Amount>,
    pub seller_role_id: RoleId,
    pub category: Option<String>,
}

/// What [`AuctionStoring::close_auction`] did.
#[derive(Clone, Debug, PartialEq)]
pub enum CloseOutcome {
    /// The auction was already in a terminal state (or gone); nothing
    /// changed. Duplicate close triggers end up here.
    AlreadyFinal,
    /// Transitioned to CLOSED. `winner` is the winning bid, or `None` when
    /// the auction went unsold.
    Closed { winner: Option<Offer> },
}

#[derive(Debug, Error)]
pub enum InsertBidError {
    #[error("auction does not exist")]
    AuctionNotFound,
    #[error("auction is no longer open")]
    NotOpen,
    #[error("a higher or equal bid was committed concurrently")]
    NotHighestBid,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum BuyNowStoreError {
    #[error("auction does not exist")]
    AuctionNotFound,
    #[error("auction is no longer open")]
    NotOpen,
    #[error("auction has no buy now price")]
    BuyNowDisabled,
    #[error("bids exist for this auction")]
    BidsExist,
    #[error("auction already has a winner")]
    AlreadyHasWinner,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AuctionStoring: Send + Sync {
    /// Unlocked display read of an auction.
    async fn auction(&self, id: AuctionId) -> Result<Option<Auction>, sqlx::Error>;

    /// The ACTIVE buyer capability of a user, if they hold one.
    async fn buyer(&self, user_id: UserId) -> Result<Option<Buyer>, sqlx::Error>;

    /// The ACTIVE seller capability of a user, if they hold one.
    async fn seller(&self, user_id: UserId) -> Result<Option<Seller>, sqlx::Error>;

    /// Current highest ACTIVE BID amount. Unlocked advisory read.
    async fn highest_bid(&self, auction_id: AuctionId) -> Result<Option<Amount>, sqlx::Error>;

    /// All ACTIVE BIDs, highest first. Display read.
    async fn active_bids(&self, auction_id: AuctionId) -> Result<Vec<Offer>, sqlx::Error>;

    async fn winner_offer(
        &self,
        auction_id: AuctionId,
    ) -> Result<Option<WinnerOffer>, sqlx::Error>;

    async fn insert_auction(&self, auction: &NewAuction) -> Result<AuctionId, sqlx::Error>;

    /// Re-checks status and the strict higher-than condition under the
    /// auction row lock, then inserts the ACTIVE BID.
    async fn insert_bid(&self, bid: &BidCandidate) -> Result<Offer, InsertBidError>;

    /// One transaction under the row lock: insert the BUY_NOW offer at the
    /// configured price, bind the winner and transition to CLOSED.
    async fn execute_buy_now(&self, purchase: &BuyNowCandidate)
    -> Result<Offer, BuyNowStoreError>;

    /// One transaction under the row lock: pick the winner (if any bid
    /// exists), bind it and transition to CLOSED.
    async fn close_auction(
        &self,
        id: AuctionId,
        now: DateTime<Utc>,
    ) -> Result<CloseOutcome, sqlx::Error>;

    /// Whether the auction is currently OPEN. The scheduled open job uses
    /// this to decide if the start announcement should still go out.
    async fn open_auction(&self, id: AuctionId) -> Result<bool, sqlx::Error>;
}
