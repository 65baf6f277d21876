use {
    crate::{
        api::{AppState, error, internal_error_reply},
        auctionhouse::BuyNowError,
    },
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    model::auction::AuctionId,
    std::sync::Arc,
};

pub async fn post_buy_now_handler(
    State(state): State<Arc<AppState>>,
    user: super::AuthenticatedUser,
    Path(auction_id): Path<AuctionId>,
) -> Response {
    match state.auctionhouse.buy_now(auction_id, user.0).await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(err) => {
            tracing::debug!(auction_id, ?err, "buy now rejected");
            BuyNowErrorWrapper(err).into_response()
        }
    }
}

pub struct BuyNowErrorWrapper(pub BuyNowError);
impl IntoResponse for BuyNowErrorWrapper {
    fn into_response(self) -> Response {
        match self.0 {
            BuyNowError::AuctionNotFound => (
                StatusCode::NOT_FOUND,
                error("NotFound", "Auction was not found"),
            )
                .into_response(),
            BuyNowError::NotOpen => (
                StatusCode::BAD_REQUEST,
                error("AuctionNotActive", "This auction is not active"),
            )
                .into_response(),
            BuyNowError::BuyNowDisabled => (
                StatusCode::BAD_REQUEST,
                error(
                    "BuyNowDisabled",
                    "Buy now is not available for this auction",
                ),
            )
                .into_response(),
            BuyNowError::BidsExist => (
                StatusCode::CONFLICT,
                error(
                    "BidsExist",
                    "Buy now is disabled because bids already exist",
                ),
            )
                .into_response(),
            BuyNowError::SellerSelfPurchase => (
                StatusCode::FORBIDDEN,
                error("SellerSelfPurchase", "You cannot buy your own auction"),
            )
                .into_response(),
            BuyNowError::NotABuyer => (
                StatusCode::FORBIDDEN,
                error("NotABuyer", "Only buyers can buy now"),
            )
                .into_response(),
            BuyNowError::NotStarted => (
                StatusCode::BAD_REQUEST,
                error("AuctionNotStarted", "This auction has not started yet"),
            )
                .into_response(),
            BuyNowError::AlreadyEnded => (
                StatusCode::BAD_REQUEST,
                error("AuctionEnded", "This auction has already ended"),
            )
                .into_response(),
            BuyNowError::AlreadyHasWinner => (
                StatusCode::CONFLICT,
                error("AlreadyHasWinner", "This auction already has a winner"),
            )
                .into_response(),
            BuyNowError::Database(err) => {
                tracing::error!(?err, "post_buy_now");
                internal_error_reply()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::api::response_body};

    #[tokio::test]
    async fn race_loser_gets_conflict() {
        let response = BuyNowErrorWrapper(BuyNowError::AlreadyHasWinner).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = response_body(response).await;
        let err: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["errorType"], "AlreadyHasWinner");
    }
}
