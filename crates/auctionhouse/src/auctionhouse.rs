//! The offer engine and auction ledger: validates and records bids and buy
//! now purchases, transitions auctions between states and announces every
//! accepted change on the auction's broadcast topic.

use {
    crate::{
        scheduler::{JobPayload, Scheduler, close_job_key, open_job_key},
        storage::{
            AuctionStoring,
            BidCandidate,
            BuyNowCandidate,
            BuyNowStoreError,
            CloseOutcome,
            InsertBidError,
            NewAuction,
        },
    },
    broadcast::Broadcaster,
    chrono::{DateTime, Utc},
    database::auction_jobs::JobKind,
    model::{
        auction::{Auction, AuctionId, AuctionStatus, Window},
        event::{AuctionEvent, BuyNow, NewBid, format_offer_time},
        money::Amount,
        offer::{Offer, WinnerOffer},
        role::UserId,
    },
    std::sync::Arc,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum PlaceBidError {
    #[error("auction was not found")]
    AuctionNotFound,
    #[error("sellers cannot bid on their own auction")]
    SellerSelfBid,
    #[error("user is not a buyer")]
    NotABuyer,
    #[error("bid must be greater than zero")]
    InvalidAmount,
    #[error("bid must be higher than the current highest bid")]
    NotHighestBid,
    #[error("bid must be higher than the minimum price")]
    BelowMinPrice,
    #[error("auction is not active")]
    NotOpen,
    #[error("auction has not started yet")]
    NotStarted,
    #[error("auction has already ended")]
    AlreadyEnded,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<InsertBidError> for PlaceBidError {
    fn from(err: InsertBidError) -> Self {
        match err {
            InsertBidError::AuctionNotFound => Self::AuctionNotFound,
            InsertBidError::NotOpen => Self::NotOpen,
            InsertBidError::NotHighestBid => Self::NotHighestBid,
            InsertBidError::Database(err) => Self::Database(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum BuyNowError {
    #[error("auction was not found")]
    AuctionNotFound,
    #[error("auction is not active")]
    NotOpen,
    #[error("buy now is not available for this auction")]
    BuyNowDisabled,
    #[error("buy now is disabled because bids already exist")]
    BidsExist,
    #[error("sellers cannot buy their own auction")]
    SellerSelfPurchase,
    #[error("user is not a buyer")]
    NotABuyer,
    #[error("auction has not started yet")]
    NotStarted,
    #[error("auction has already ended")]
    AlreadyEnded,
    #[error("auction already has a winner")]
    AlreadyHasWinner,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<BuyNowStoreError> for BuyNowError {
    fn from(err: BuyNowStoreError) -> Self {
        match err {
            BuyNowStoreError::AuctionNotFound => Self::AuctionNotFound,
            BuyNowStoreError::NotOpen => Self::NotOpen,
            BuyNowStoreError::BuyNowDisabled => Self::BuyNowDisabled,
            BuyNowStoreError::BidsExist => Self::BidsExist,
            BuyNowStoreError::AlreadyHasWinner => Self::AlreadyHasWinner,
            BuyNowStoreError::Database(err) => Self::Database(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum CreateAuctionError {
    #[error("user is not a seller")]
    NotASeller,
    #[error("end date must be after the start date")]
    InvalidWindow,
    #[error("minimum price must be greater than zero")]
    InvalidMinPrice,
    #[error("buy now price must not be below the minimum price")]
    BuyNowBelowMin,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to schedule auction jobs: {0}")]
    Scheduling(anyhow::Error),
}

/// A new listing as submitted by a seller. A missing start date means the
/// auction starts immediately.
#[derive(Clone, Debug, PartialEq)]
pub struct AuctionListing {
    pub title: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: DateTime<Utc>,
    pub min_price_cents: Amount,
    pub buy_now_price_cents: Option<Amount>,
    pub category: Option<String>,
}

/// Everything the auction detail page needs, read without locks.
#[derive(Clone, Debug, PartialEq)]
pub struct AuctionSummary {
    pub auction: Auction,
    pub highest_bid: Option<Amount>,
    pub bids: Vec<Offer>,
    pub winner_offer: Option<WinnerOffer>,
}

pub struct Auctionhouse {
    store: Arc<dyn AuctionStoring>,
    scheduler: Arc<dyn Scheduler>,
    broadcast: Broadcaster,
}

impl Auctionhouse {
    pub fn new(
        store: Arc<dyn AuctionStoring>,
        scheduler: Arc<dyn Scheduler>,
        broadcast: Broadcaster,
    ) -> Self {
        Self {
            store,
            scheduler,
            broadcast,
        }
    }

    /// Validates and records a bid. The checks short-circuit in order; the
    /// status and highest-bid conditions are re-verified by the store under
    /// the auction row lock, so concurrent equal bids cannot both commit.
    pub async fn place_bid(
        &self,
        auction_id: AuctionId,
        user_id: UserId,
        amount: Amount,
    ) -> Result<NewBid, PlaceBidError> {
        let auction = self
            .store
            .auction(auction_id)
            .await?
            .ok_or(PlaceBidError::AuctionNotFound)?;
        if auction.seller_user_id == user_id {
            return Err(PlaceBidError::SellerSelfBid);
        }
        let buyer = self
            .store
            .buyer(user_id)
            .await?
            .ok_or(PlaceBidError::NotABuyer)?;
        if !amount.is_positive() {
            return Err(PlaceBidError::InvalidAmount);
        }
        if let Some(highest) = self.store.highest_bid(auction_id).await?
            && amount <= highest
        {
            return Err(PlaceBidError::NotHighestBid);
        }
        if amount <= auction.min_price_cents {
            return Err(PlaceBidError::BelowMinPrice);
        }
        if auction.status != AuctionStatus::Open {
            return Err(PlaceBidError::NotOpen);
        }
        let now = Utc::now();
        match auction.window(now) {
            Window::NotStarted => return Err(PlaceBidError::NotStarted),
            Window::Ended => return Err(PlaceBidError::AlreadyEnded),
            Window::Within => (),
        }

        let offer = self
            .store
            .insert_bid(&BidCandidate {
                auction_id,
                buyer_role_id: buyer.role_id,
                amount,
                offer_time: now,
            })
            .await?;
        tracing::debug!(auction_id, offer_id = offer.id, amount = %amount, "bid accepted");

        let payload = NewBid {
            username: buyer.username,
            amount_cents: amount,
            amount_display: amount.display(),
            offer_time: format_offer_time(offer.offer_time),
        };
        self.broadcast.publish(
            auction_id,
            &AuctionEvent::NewBid {
                new_bid: payload.clone(),
            },
        );
        Ok(payload)
    }

    /// Validates and executes a buy now purchase: offer, winner binding and
    /// the CLOSED transition commit as one transaction, so this can never
    /// race a scheduled close (or another buy now) into a double sale.
    pub async fn buy_now(
        &self,
        auction_id: AuctionId,
        user_id: UserId,
    ) -> Result<BuyNow, BuyNowError> {
        let auction = self
            .store
            .auction(auction_id)
            .await?
            .ok_or(BuyNowError::AuctionNotFound)?;
        if auction.status != AuctionStatus::Open {
            return Err(BuyNowError::NotOpen);
        }
        if !auction.is_buy_now_enabled() {
            return Err(BuyNowError::BuyNowDisabled);
        }
        if self.store.highest_bid(auction_id).await?.is_some() {
            return Err(BuyNowError::BidsExist);
        }
        if auction.seller_user_id == user_id {
            return Err(BuyNowError::SellerSelfPurchase);
        }
        let buyer = self
            .store
            .buyer(user_id)
            .await?
            .ok_or(BuyNowError::NotABuyer)?;
        let now = Utc::now();
        match auction.window(now) {
            Window::NotStarted => return Err(BuyNowError::NotStarted),
            Window::Ended => return Err(BuyNowError::AlreadyEnded),
            Window::Within => (),
        }
        if self.store.winner_offer(auction_id).await?.is_some() {
            return Err(BuyNowError::AlreadyHasWinner);
        }

        let offer = self
            .store
            .execute_buy_now(&BuyNowCandidate {
                auction_id,
                buyer_role_id: buyer.role_id,
                offer_time: now,
            })
            .await?;
        tracing::info!(auction_id, offer_id = offer.id, amount = %offer.amount_cents, "auction bought");

        let payload = BuyNow {
            username: buyer.username,
            amount_display: offer.amount_cents.display(),
            offer_time: format_offer_time(offer.offer_time),
        };
        self.broadcast.publish(
            auction_id,
            &AuctionEvent::BuyNow {
                buy_now: payload.clone(),
            },
        );
        Ok(payload)
    }

    /// Persists a new listing and registers its scheduled jobs: always the
    /// close job at the end date, plus an open announcement when the start
    /// lies in the future.
    pub async fn create_auction(
        &self,
        user_id: UserId,
        listing: AuctionListing,
    ) -> Result<AuctionId, CreateAuctionError> {
        let seller = self
            .store
            .seller(user_id)
            .await?
            .ok_or(CreateAuctionError::NotASeller)?;
        let now = Utc::now();
        let start_date = listing.start_date.unwrap_or(now);
        if listing.end_date <= start_date {
            return Err(CreateAuctionError::InvalidWindow);
        }
        if !listing.min_price_cents.is_positive() {
            return Err(CreateAuctionError::InvalidMinPrice);
        }
        if let Some(buy_now) = listing.buy_now_price_cents
            && buy_now < listing.min_price_cents
        {
            return Err(CreateAuctionError::BuyNowBelowMin);
        }

        let id = self
            .store
            .insert_auction(&NewAuction {
                title: listing.title,
                start_date,
                end_date: listing.end_date,
                min_price_cents: listing.min_price_cents,
                buy_now_price_cents: listing.buy_now_price_cents,
                seller_role_id: seller.role_id,
                category: listing.category,
            })
            .await?;
        tracing::info!(auction_id = id, seller_role_id = seller.role_id, "auction created");

        self.scheduler
            .schedule(
                listing.end_date,
                &close_job_key(id),
                JobPayload {
                    kind: JobKind::CloseAuction,
                    auction_id: id,
                },
            )
            .await
            .map_err(CreateAuctionError::Scheduling)?;
        if start_date > now {
            self.scheduler
                .schedule(
                    start_date,
                    &open_job_key(id),
                    JobPayload {
                        kind: JobKind::OpenAuction,
                        auction_id: id,
                    },
                )
                .await
                .map_err(CreateAuctionError::Scheduling)?;
        }
        Ok(id)
    }

    /// Closes an expired auction: picks the winner, transitions to CLOSED
    /// and announces the new status. Safe to invoke any number of times;
    /// everything after the first successful close is a benign no-op.
    pub async fn close_auction(&self, auction_id: AuctionId) -> anyhow::Result<()> {
        match self.store.close_auction(auction_id, Utc::now()).await? {
            CloseOutcome::AlreadyFinal => {
                tracing::debug!(auction_id, "close requested for an auction that is not open");
            }
            CloseOutcome::Closed { winner } => {
                match &winner {
                    Some(offer) => tracing::info!(
                        auction_id,
                        offer_id = offer.id,
                        amount = %offer.amount_cents,
                        "auction closed with winner"
                    ),
                    None => tracing::info!(auction_id, "auction closed unsold"),
                }
                self.broadcast.publish(
                    auction_id,
                    &AuctionEvent::AuctionStatusUpdate {
                        auction_id,
                        status: AuctionStatus::Closed,
                    },
                );
            }
        }
        Ok(())
    }

    /// Announces the start of an auction. A no-op when the auction already
    /// left the OPEN state, which absorbs duplicate scheduler deliveries.
    pub async fn open_auction(&self, auction_id: AuctionId) -> anyhow::Result<()> {
        if self.store.open_auction(auction_id).await? {
            self.broadcast.publish(
                auction_id,
                &AuctionEvent::AuctionStatusUpdate {
                    auction_id,
                    status: AuctionStatus::Open,
                },
            );
        } else {
            tracing::debug!(auction_id, "open requested for an auction that is not open");
        }
        Ok(())
    }

    /// Unlocked display read for the auction detail endpoint.
    pub async fn auction_summary(
        &self,
        auction_id: AuctionId,
    ) -> Result<Option<AuctionSummary>, sqlx::Error> {
        let Some(auction) = self.store.auction(auction_id).await? else {
            return Ok(None);
        };
        let bids = self.store.active_bids(auction_id).await?;
        let winner_offer = if auction.status == AuctionStatus::Closed {
            self.store.winner_offer(auction_id).await?
        } else {
            None
        };
        let highest_bid = bids.iter().map(|offer| offer.amount_cents).max();
        Ok(Some(AuctionSummary {
            auction,
            highest_bid,
            bids,
            winner_offer,
        }))
    }
}
