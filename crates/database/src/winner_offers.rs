use {
    crate::{AuctionId, OfferId},
    sqlx::{
        PgConnection,
        types::chrono::{DateTime, Utc},
    },
};

/// One row in the `winner_offers` table: the one-to-one binding of a closed
/// auction to the offer that won it.
#[derive(Clone, Copy, Debug, PartialEq, sqlx::FromRow)]
pub struct WinnerOffer {
    pub auction_id: AuctionId,
    pub offer_id: OfferId,
    pub created_at: DateTime<Utc>,
}

/// Stores the winner binding. Returns whether the row was inserted; `false`
/// means another writer won the race and the auction already has a winner.
pub async fn insert(ex: &mut PgConnection, winner: &WinnerOffer) -> sqlx::Result<bool> {
    const QUERY: &str = r#"
INSERT INTO winner_offers (auction_id, offer_id, created_at)
VALUES ($1, $2, $3)
ON CONFLICT DO NOTHING
"#;
    let result = sqlx::query(QUERY)
        .bind(winner.auction_id)
        .bind(winner.offer_id)
        .bind(winner.created_at)
        .execute(ex)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn fetch(
    ex: &mut PgConnection,
    auction_id: AuctionId,
) -> sqlx::Result<Option<WinnerOffer>> {
    const QUERY: &str = r#"
SELECT auction_id, offer_id, created_at
FROM winner_offers
WHERE auction_id = $1
"#;
    sqlx::query_as(QUERY).bind(auction_id).fetch_optional(ex).await
}

pub async fn exists(ex: &mut PgConnection, auction_id: AuctionId) -> sqlx::Result<bool> {
    const QUERY: &str = "SELECT EXISTS (SELECT 1 FROM winner_offers WHERE auction_id = $1);";
    sqlx::query_scalar(QUERY).bind(auction_id).fetch_one(ex).await
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{auctions, clear_DANGER, offers, roles},
        sqlx::Connection,
    };

    #[tokio::test]
    #[ignore]
    async fn postgres_at_most_one_winner_per_auction() {
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
        let offer_id = offers::insert(
            &mut db,
            &offers::OfferData {
                auction_id,
                buyer_role_id: buyer_role,
                kind: offers::OfferKind::Bid,
                amount_cents: 1500,
                offer_time: now,
            },
        )
        .await
        .unwrap();

        assert!(!exists(&mut db, auction_id).await.unwrap());
        let winner = WinnerOffer {
            auction_id,
            offer_id,
            created_at: now,
        };
        assert!(insert(&mut db, &winner).await.unwrap());
        // The duplicate insert loses the race and reports it.
        assert!(!insert(&mut db, &winner).await.unwrap());
        assert!(exists(&mut db, auction_id).await.unwrap());
        assert_eq!(fetch(&mut db, auction_id).await.unwrap().unwrap().offer_id, offer_id);
    }
}
