use {
    crate::{AuctionId, OfferId, RoleId},
    sqlx::{
        PgConnection,
        types::chrono::{DateTime, Utc},
    },
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "OfferKind", rename_all = "snake_case")]
pub enum OfferKind {
    Bid,
    BuyNow,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "OfferStatus", rename_all = "lowercase")]
pub enum OfferStatus {
    Active,
    Cancelled,
}

/// One row in the `offers` table. Rows are never updated by the core flows.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Offer {
    pub id: OfferId,
    pub auction_id: AuctionId,
    pub buyer_role_id: RoleId,
    pub kind: OfferKind,
    pub status: OfferStatus,
    pub amount_cents: i64,
    pub offer_time: DateTime<Utc>,
}

/// The fields of an offer before it has an id.
#[derive(Clone, Debug, PartialEq)]
pub struct OfferData {
    pub auction_id: AuctionId,
    pub buyer_role_id: RoleId,
    pub kind: OfferKind,
    pub amount_cents: i64,
    pub offer_time: DateTime<Utc>,
}

/// Stores the offer in ACTIVE status and returns its id.
pub async fn insert(ex: &mut PgConnection, offer: &OfferData) -> sqlx::Result<OfferId> {
    const QUERY: &str = r#"
INSERT INTO offers (auction_id, buyer_role_id, kind, status, amount_cents, offer_time)
VALUES ($1, $2, $3, $4, $5, $6)
RETURNING id
"#;
    sqlx::query_scalar(QUERY)
        .bind(offer.auction_id)
        .bind(offer.buyer_role_id)
        .bind(offer.kind)
        .bind(OfferStatus::Active)
        .bind(offer.amount_cents)
        .bind(offer.offer_time)
        .fetch_one(ex)
        .await
}

/// The current highest ACTIVE BID amount, if any bids exist.
pub async fn highest_active_bid_amount(
    ex: &mut PgConnection,
    auction_id: AuctionId,
) -> sqlx::Result<Option<i64>> {
    const QUERY: &str = r#"
SELECT MAX(amount_cents)
FROM offers
WHERE auction_id = $1 AND kind = 'bid' AND status = 'active'
"#;
    sqlx::query_scalar(QUERY).bind(auction_id).fetch_one(ex).await
}

/// The winning candidate when closing: highest amount, ties broken by the
/// earliest offer. Ties can only exist in data that predates the strict
/// higher-than check.
pub async fn winning_bid(
    ex: &mut PgConnection,
    auction_id: AuctionId,
) -> sqlx::Result<Option<Offer>> {
    const QUERY: &str = r#"
SELECT id, auction_id, buyer_role_id, kind, status, amount_cents, offer_time
FROM offers
WHERE auction_id = $1 AND kind = 'bid' AND status = 'active'
ORDER BY amount_cents DESC, offer_time ASC
LIMIT 1
"#;
    sqlx::query_as(QUERY).bind(auction_id).fetch_optional(ex).await
}

pub async fn count_active_bids(
    ex: &mut PgConnection,
    auction_id: AuctionId,
) -> sqlx::Result<i64> {
    const QUERY: &str = r#"
SELECT COUNT(*)
FROM offers
WHERE auction_id = $1 AND kind = 'bid' AND status = 'active'
"#;
    sqlx::query_scalar(QUERY).bind(auction_id).fetch_one(ex).await
}

/// All ACTIVE BIDs of an auction, highest first. Display read, no lock.
pub async fn active_bids(
    ex: &mut PgConnection,
    auction_id: AuctionId,
) -> sqlx::Result<Vec<Offer>> {
    const QUERY: &str = r#"
SELECT id, auction_id, buyer_role_id, kind, status, amount_cents, offer_time
FROM offers
WHERE auction_id = $1 AND kind = 'bid' AND status = 'active'
ORDER BY amount_cents DESC, offer_time DESC
"#;
    sqlx::query_as(QUERY).bind(auction_id).fetch_all(ex).await
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{auctions, clear_DANGER, roles},
        sqlx::Connection,
    };

    #[tokio::test]
    #[ignore]
    async fn postgres_bid_ordering() {
        let mut db = sqlx::PgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        clear_DANGER(&mut db).await.unwrap();

        let seller_role = roles::testing::insert_seller(&mut db, "seller").await;
        let buyer_role = roles::testing::insert_buyer(&mut db, "buyer").await;
        let now = Utc::now();
        let auction_id = auctions::insert(
            &mut db,
            &auctions::AuctionData {
                title: "lot".to_string(),
                start_date: now,
                end_date: now + chrono::TimeDelta::days(1),
                min_price_cents: 100,
                buy_now_price_cents: None,
                seller_role_id: seller_role,
                category: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(highest_active_bid_amount(&mut db, auction_id).await.unwrap(), None);
        assert_eq!(count_active_bids(&mut db, auction_id).await.unwrap(), 0);

        for (amount, seconds) in [(1500, 0), (2000, 10), (2000, 5)] {
            insert(
                &mut db,
                &OfferData {
                    auction_id,
                    buyer_role_id: buyer_role,
                    kind: OfferKind::Bid,
                    amount_cents: amount,
                    offer_time: now + chrono::TimeDelta::seconds(seconds),
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(
            highest_active_bid_amount(&mut db, auction_id).await.unwrap(),
            Some(2000)
        );
        assert_eq!(count_active_bids(&mut db, auction_id).await.unwrap(), 3);

        // Highest amount wins, equal amounts resolve to the earliest offer.
        let winner = winning_bid(&mut db, auction_id).await.unwrap().unwrap();
        assert_eq!(winner.amount_cents, 2000);
        assert_eq!(winner.offer_time, now + chrono::TimeDelta::seconds(5));
    }
}
