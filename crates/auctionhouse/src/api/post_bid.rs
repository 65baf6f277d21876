use {
    crate::{
        api::{AppState, error, internal_error_reply},
        auctionhouse::PlaceBidError,
    },
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    model::{auction::AuctionId, money::Amount},
    serde::Deserialize,
    std::sync::Arc,
};

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct BidRequest {
    pub amount_cents: Amount,
}

pub async fn post_bid_handler(
    State(state): State<Arc<AppState>>,
    user: super::AuthenticatedUser,
    Path(auction_id): Path<AuctionId>,
    Json(request): Json<BidRequest>,
) -> Response {
    match state
        .auctionhouse
        .place_bid(auction_id, user.0, request.amount_cents)
        .await
    {
        Ok(payload) => (StatusCode::CREATED, Json(payload)).into_response(),
        Err(err) => {
            tracing::debug!(auction_id, ?err, "bid rejected");
            PlaceBidErrorWrapper(err).into_response()
        }
    }
}

pub struct PlaceBidErrorWrapper(pub PlaceBidError);
impl IntoResponse for PlaceBidErrorWrapper {
    fn into_response(self) -> Response {
        match self.0 {
            PlaceBidError::AuctionNotFound => (
                StatusCode::NOT_FOUND,
                error("NotFound", "Auction was not found"),
            )
                .into_response(),
            PlaceBidError::SellerSelfBid => (
                StatusCode::FORBIDDEN,
                error("SellerSelfBid", "You cannot bid on your own auction"),
            )
                .into_response(),
            PlaceBidError::NotABuyer => (
                StatusCode::FORBIDDEN,
                error("NotABuyer", "Only buyers can place bids"),
            )
                .into_response(),
            PlaceBidError::InvalidAmount => (
                StatusCode::BAD_REQUEST,
                error("InvalidAmount", "Bid must be greater than zero"),
            )
                .into_response(),
            PlaceBidError::NotHighestBid => (
                StatusCode::BAD_REQUEST,
                error(
                    "NotHighestBid",
                    "Your bid must be higher than the current highest bid",
                ),
            )
                .into_response(),
            PlaceBidError::BelowMinPrice => (
                StatusCode::BAD_REQUEST,
                error(
                    "BelowMinPrice",
                    "Your bid must be higher than the minimum price",
                ),
            )
                .into_response(),
            PlaceBidError::NotOpen => (
                StatusCode::BAD_REQUEST,
                error("AuctionNotActive", "This auction is not active"),
            )
                .into_response(),
            PlaceBidError::NotStarted => (
                StatusCode::BAD_REQUEST,
                error("AuctionNotStarted", "This auction has not started yet"),
            )
                .into_response(),
            PlaceBidError::AlreadyEnded => (
                StatusCode::BAD_REQUEST,
                error("AuctionEnded", "This auction has already ended"),
            )
                .into_response(),
            PlaceBidError::Database(err) => {
                tracing::error!(?err, "post_bid");
                internal_error_reply()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::api::response_body};

    #[tokio::test]
    async fn rejections_carry_error_type_and_description() {
        let response = PlaceBidErrorWrapper(PlaceBidError::NotHighestBid).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response_body(response).await;
        let err: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["errorType"], "NotHighestBid");
        assert_eq!(
            err["description"],
            "Your bid must be higher than the current highest bid"
        );
    }

    #[tokio::test]
    async fn seller_self_bid_is_forbidden() {
        let response = PlaceBidErrorWrapper(PlaceBidError::SellerSelfBid).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
