use {
    crate::{
        api::{AppState, error, internal_error_reply},
        auctionhouse::{AuctionListing, CreateAuctionError},
    },
    axum::{
        Json,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    chrono::{DateTime, Utc},
    model::money::Amount,
    serde::Deserialize,
    std::sync::Arc,
};

#[derive(Clone, Debug, Deserialize)]
pub struct AuctionCreation {
    pub title: String,
    /// Missing start date means the auction starts immediately.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: DateTime<Utc>,
    pub min_price_cents: Amount,
    #[serde(default)]
    pub buy_now_price_cents: Option<Amount>,
    #[serde(default)]
    pub category: Option<String>,
}

pub async fn post_auction_handler(
    State(state): State<Arc<AppState>>,
    user: super::AuthenticatedUser,
    Json(creation): Json<AuctionCreation>,
) -> Response {
    let listing = AuctionListing {
        title: creation.title,
        start_date: creation.start_date,
        end_date: creation.end_date,
        min_price_cents: creation.min_price_cents,
        buy_now_price_cents: creation.buy_now_price_cents,
        category: creation.category,
    };
    match state.auctionhouse.create_auction(user.0, listing).await {
        Ok(auction_id) => {
            tracing::debug!(auction_id, "auction created");
            (StatusCode::CREATED, Json(auction_id)).into_response()
        }
        Err(err) => {
            tracing::debug!(?err, "error creating auction");
            CreateAuctionErrorWrapper(err).into_response()
        }
    }
}

pub struct CreateAuctionErrorWrapper(pub CreateAuctionError);
impl IntoResponse for CreateAuctionErrorWrapper {
    fn into_response(self) -> Response {
        match self.0 {
            CreateAuctionError::NotASeller => (
                StatusCode::FORBIDDEN,
                error("NotASeller", "Only sellers can create auctions"),
            )
                .into_response(),
            CreateAuctionError::InvalidWindow => (
                StatusCode::BAD_REQUEST,
                error("InvalidWindow", "End date must be after the start date"),
            )
                .into_response(),
            CreateAuctionError::InvalidMinPrice => (
                StatusCode::BAD_REQUEST,
                error("InvalidMinPrice", "Minimum price must be greater than zero"),
            )
                .into_response(),
            CreateAuctionError::BuyNowBelowMin => (
                StatusCode::BAD_REQUEST,
                error(
                    "BuyNowBelowMin",
                    "Buy now price must not be below the minimum price",
                ),
            )
                .into_response(),
            CreateAuctionError::Database(err) => {
                tracing::error!(?err, "create_auction");
                internal_error_reply()
            }
            CreateAuctionError::Scheduling(err) => {
                tracing::error!(?err, "create_auction scheduling");
                internal_error_reply()
            }
        }
    }
}
