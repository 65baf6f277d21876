use {
    crate::{api::AppState, auctionhouse::AuctionSummary},
    axum::{
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Json, Response},
    },
    model::{
        auction::{Auction, AuctionId},
        money::Amount,
        offer::{Offer, WinnerOffer},
    },
    serde::Serialize,
    std::sync::Arc,
};

/// The auction detail page: the auction itself plus its live bidding state.
#[derive(Debug, Serialize)]
pub struct AuctionReply {
    #[serde(flatten)]
    pub auction: Auction,
    pub highest_bid_cents: Option<Amount>,
    pub bids: Vec<Offer>,
    pub winner_offer: Option<WinnerOffer>,
}

impl From<AuctionSummary> for AuctionReply {
    fn from(summary: AuctionSummary) -> Self {
        Self {
            auction: summary.auction,
            highest_bid_cents: summary.highest_bid,
            bids: summary.bids,
            winner_offer: summary.winner_offer,
        }
    }
}

pub async fn get_auction_handler(
    State(state): State<Arc<AppState>>,
    Path(auction_id): Path<AuctionId>,
) -> Response {
    let result = state.auctionhouse.auction_summary(auction_id).await;
    get_auction_response(result)
}

fn get_auction_response(result: Result<Option<AuctionSummary>, sqlx::Error>) -> Response {
    let summary = match result {
        Ok(summary) => summary,
        Err(err) => {
            tracing::error!(?err, "get_auction_response");
            return crate::api::internal_error_reply();
        }
    };
    match summary {
        Some(summary) => (StatusCode::OK, Json(AuctionReply::from(summary))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            super::error("NotFound", "Auction was not found"),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::api::response_body,
        chrono::{TimeDelta, Utc},
        model::auction::AuctionStatus,
    };

    fn summary() -> AuctionSummary {
        let now = Utc::now();
        AuctionSummary {
            auction: Auction {
                id: 1,
                title: "vintage camera".to_string(),
                start_date: now - TimeDelta::hours(1),
                end_date: now + TimeDelta::days(7),
                min_price_cents: Amount(1000),
                buy_now_price_cents: Some(Amount(5000)),
                status: AuctionStatus::Open,
                seller_role_id: 100,
                seller_user_id: 1,
                category: None,
            },
            highest_bid: Some(Amount(1500)),
            bids: vec![],
            winner_offer: None,
        }
    }

    #[tokio::test]
    async fn get_auction_response_ok() {
        let response = get_auction_response(Ok(Some(summary())));
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_body(response).await;
        let reply: serde_json::Value = serde_json::from_slice(&body).unwrap();
        // The auction fields are flattened into the reply.
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["status"], "OPEN");
        assert_eq!(reply["highest_bid_cents"], 1500);
        assert!(reply["winner_offer"].is_null());
    }

    #[tokio::test]
    async fn get_auction_response_non_existent() {
        let response = get_auction_response(Ok(None));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response_body(response).await;
        let err: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["errorType"], "NotFound");
    }
}
