//! [`AuctionStoring`] backed by postgres. Each mutating operation is one
//! transaction that starts by locking the auction row, which serializes all
//! writers of a given auction.

use {
    crate::storage::{
        AuctionStoring,
        BidCandidate,
        BuyNowCandidate,
        BuyNowStoreError,
        CloseOutcome,
        InsertBidError,
        NewAuction,
    },
    anyhow::{Context, Result},
    chrono::{DateTime, Utc},
    database::{auctions, offers, roles, winner_offers},
    model::{
        auction::{Auction, AuctionId, AuctionStatus},
        money::Amount,
        offer::{Offer, OfferKind, OfferStatus, WinnerOffer},
        role::{Buyer, Seller, UserId},
    },
    sqlx::PgPool,
};

#[derive(Clone)]
pub struct Postgres(pub PgPool);

impl Postgres {
    pub fn new(url: &str) -> Result<Self> {
        let pool = PgPool::connect_lazy(url).context("failed to create database pool")?;
        Ok(Self(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.0
    }
}

fn auction_status(status: auctions::AuctionStatus) -> AuctionStatus {
    match status {
        auctions::AuctionStatus::Open => AuctionStatus::Open,
        auctions::AuctionStatus::Closed => AuctionStatus::Closed,
        auctions::AuctionStatus::Cancelled => AuctionStatus::Cancelled,
    }
}

fn auction_from_row(row: auctions::Auction) -> Auction {
    Auction {
        id: row.id,
        title: row.title,
        start_date: row.start_date,
        end_date: row.end_date,
        min_price_cents: Amount(row.min_price_cents),
        buy_now_price_cents: row.buy_now_price_cents.map(Amount),
        status: auction_status(row.status),
        seller_role_id: row.seller_role_id,
        seller_user_id: row.seller_user_id,
        category: row.category,
    }
}

fn offer_from_row(row: offers::Offer) -> Offer {
    Offer {
        id: row.id,
        auction_id: row.auction_id,
        buyer_role_id: row.buyer_role_id,
        kind: match row.kind {
            offers::OfferKind::Bid => OfferKind::Bid,
            offers::OfferKind::BuyNow => OfferKind::BuyNow,
        },
        status: match row.status {
            offers::OfferStatus::Active => OfferStatus::Active,
            offers::OfferStatus::Cancelled => OfferStatus::Cancelled,
        },
        amount_cents: Amount(row.amount_cents),
        offer_time: row.offer_time,
    }
}

#[async_trait::async_trait]
impl AuctionStoring for Postgres {
    async fn auction(&self, id: AuctionId) -> Result<Option<Auction>, sqlx::Error> {
        let mut ex = self.0.acquire().await?;
        Ok(auctions::fetch(&mut ex, id).await?.map(auction_from_row))
    }

    async fn buyer(&self, user_id: UserId) -> Result<Option<Buyer>, sqlx::Error> {
        let mut ex = self.0.acquire().await?;
        Ok(roles::active_buyer(&mut ex, user_id).await?.map(|buyer| Buyer {
            role_id: buyer.role_id,
            user_id: buyer.user_id,
            username: buyer.username,
            shipping_address: buyer.shipping_address,
        }))
    }

    async fn seller(&self, user_id: UserId) -> Result<Option<Seller>, sqlx::Error> {
        let mut ex = self.0.acquire().await?;
        Ok(roles::active_seller(&mut ex, user_id)
            .await?
            .map(|seller| Seller {
                role_id: seller.role_id,
                user_id: seller.user_id,
                username: seller.username,
                collection_address: seller.collection_address,
            }))
    }

    async fn highest_bid(&self, auction_id: AuctionId) -> Result<Option<Amount>, sqlx::Error> {
        let mut ex = self.0.acquire().await?;
        Ok(offers::highest_active_bid_amount(&mut ex, auction_id)
            .await?
            .map(Amount))
    }

    async fn active_bids(&self, auction_id: AuctionId) -> Result<Vec<Offer>, sqlx::Error> {
        let mut ex = self.0.acquire().await?;
        Ok(offers::active_bids(&mut ex, auction_id)
            .await?
            .into_iter()
            .map(offer_from_row)
            .collect())
    }

    async fn winner_offer(
        &self,
        auction_id: AuctionId,
    ) -> Result<Option<WinnerOffer>, sqlx::Error> {
        let mut ex = self.0.acquire().await?;
        Ok(winner_offers::fetch(&mut ex, auction_id)
            .await?
            .map(|winner| WinnerOffer {
                auction_id: winner.auction_id,
                offer_id: winner.offer_id,
                created_at: winner.created_at,
            }))
    }

    async fn insert_auction(&self, auction: &NewAuction) -> Result<AuctionId, sqlx::Error> {
        let mut ex = self.0.acquire().await?;
        auctions::insert(
            &mut ex,
            &auctions::AuctionData {
                title: auction.title.clone(),
                start_date: auction.start_date,
                end_date: auction.end_date,
                min_price_cents: auction.min_price_cents.0,
                buy_now_price_cents: auction.buy_now_price_cents.map(|amount| amount.0),
                seller_role_id: auction.seller_role_id,
                category: auction.category.clone(),
            },
        )
        .await
    }

    async fn insert_bid(&self, bid: &BidCandidate) -> Result<Offer, InsertBidError> {
        let mut tx = self.0.begin().await.map_err(InsertBidError::Database)?;
        let Some(auction) = auctions::fetch_for_update(&mut tx, bid.auction_id).await? else {
            return Err(InsertBidError::AuctionNotFound);
        };
        if auction.status != auctions::AuctionStatus::Open {
            return Err(InsertBidError::NotOpen);
        }
        // The advisory check already ran; this one holds the lock and is
        // what actually guarantees strict monotonicity of committed bids.
        if let Some(highest) = offers::highest_active_bid_amount(&mut tx, bid.auction_id).await?
            && bid.amount.0 <= highest
        {
            return Err(InsertBidError::NotHighestBid);
        }
        let data = offers::OfferData {
            auction_id: bid.auction_id,
            buyer_role_id: bid.buyer_role_id,
            kind: offers::OfferKind::Bid,
            amount_cents: bid.amount.0,
            offer_time: bid.offer_time,
        };
        let id = offers::insert(&mut tx, &data).await?;
        tx.commit().await.map_err(InsertBidError::Database)?;
        Ok(Offer {
            id,
            auction_id: bid.auction_id,
            buyer_role_id: bid.buyer_role_id,
            kind: OfferKind::Bid,
            status: OfferStatus::Active,
            amount_cents: bid.amount,
            offer_time: bid.offer_time,
        })
    }

    async fn execute_buy_now(
        &self,
        purchase: &BuyNowCandidate,
    ) -> Result<Offer, BuyNowStoreError> {
        let mut tx = self.0.begin().await.map_err(BuyNowStoreError::Database)?;
        let Some(auction) = auctions::fetch_for_update(&mut tx, purchase.auction_id).await?
        else {
            return Err(BuyNowStoreError::AuctionNotFound);
        };
        // Winner before status: the loser of a buy now race learns the
        // specific reason, not just that the auction closed under it.
        if winner_offers::exists(&mut tx, purchase.auction_id).await? {
            return Err(BuyNowStoreError::AlreadyHasWinner);
        }
        if auction.status != auctions::AuctionStatus::Open {
            return Err(BuyNowStoreError::NotOpen);
        }
        let Some(price) = auction.buy_now_price_cents else {
            return Err(BuyNowStoreError::BuyNowDisabled);
        };
        if offers::count_active_bids(&mut tx, purchase.auction_id).await? > 0 {
            return Err(BuyNowStoreError::BidsExist);
        }
        let data = offers::OfferData {
            auction_id: purchase.auction_id,
            buyer_role_id: purchase.buyer_role_id,
            kind: offers::OfferKind::BuyNow,
            amount_cents: price,
            offer_time: purchase.offer_time,
        };
        let id = offers::insert(&mut tx, &data).await?;
        let bound = winner_offers::insert(
            &mut tx,
            &winner_offers::WinnerOffer {
                auction_id: purchase.auction_id,
                offer_id: id,
                created_at: purchase.offer_time,
            },
        )
        .await?;
        if !bound {
            // Cannot happen while we hold the row lock, but losing the race
            // must never produce a second winner.
            return Err(BuyNowStoreError::AlreadyHasWinner);
        }
        if !auctions::set_status(&mut tx, purchase.auction_id, auctions::AuctionStatus::Closed)
            .await?
        {
            return Err(BuyNowStoreError::NotOpen);
        }
        tx.commit().await.map_err(BuyNowStoreError::Database)?;
        Ok(Offer {
            id,
            auction_id: purchase.auction_id,
            buyer_role_id: purchase.buyer_role_id,
            kind: OfferKind::BuyNow,
            status: OfferStatus::Active,
            amount_cents: Amount(price),
            offer_time: purchase.offer_time,
        })
    }

    async fn close_auction(
        &self,
        id: AuctionId,
        now: DateTime<Utc>,
    ) -> Result<CloseOutcome, sqlx::Error> {
        let mut tx = self.0.begin().await?;
        let Some(auction) = auctions::fetch_for_update(&mut tx, id).await? else {
            // A stale job for a deleted auction; there is nothing to close.
            return Ok(CloseOutcome::AlreadyFinal);
        };
        if auction.status != auctions::AuctionStatus::Open {
            return Ok(CloseOutcome::AlreadyFinal);
        }
        let winner = offers::winning_bid(&mut tx, id).await?;
        if let Some(offer) = &winner {
            let bound = winner_offers::insert(
                &mut tx,
                &winner_offers::WinnerOffer {
                    auction_id: id,
                    offer_id: offer.id,
                    created_at: now,
                },
            )
            .await?;
            // A winner on an OPEN auction cannot exist while we hold the
            // row lock; buy now binds the winner and closes in one
            // transaction.
            if !bound {
                tracing::error!(auction_id = id, "winner already bound on an open auction");
            }
        }
        auctions::set_status(&mut tx, id, auctions::AuctionStatus::Closed).await?;
        tx.commit().await?;
        Ok(CloseOutcome::Closed {
            winner: winner.map(offer_from_row),
        })
    }

    async fn open_auction(&self, id: AuctionId) -> Result<bool, sqlx::Error> {
        let mut ex = self.0.acquire().await?;
        Ok(auctions::fetch(&mut ex, id)
            .await?
            .is_some_and(|auction| auction.status == auctions::AuctionStatus::Open))
    }
}
