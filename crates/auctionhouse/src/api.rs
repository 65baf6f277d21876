use {
    crate::auctionhouse::Auctionhouse,
    axum::{
        Router,
        extract::{DefaultBodyLimit, FromRequestParts},
        http::{StatusCode, request::Parts},
        response::{IntoResponse, Json, Response},
    },
    broadcast::Broadcaster,
    model::role::UserId,
    serde::{Deserialize, Serialize},
    std::{borrow::Cow, sync::Arc},
    tower_http::{cors::CorsLayer, trace::TraceLayer},
};

mod get_auction;
mod post_auction;
mod post_bid;
mod post_buy_now;
mod ws;

/// Centralized application state shared across all API handlers
#[derive(Clone)]
pub struct AppState {
    pub auctionhouse: Arc<Auctionhouse>,
    pub broadcast: Broadcaster,
}

/// Header carrying the id of the authenticated user. Set by the auth proxy
/// in front of this service, which strips any client-supplied value.
pub const USER_HEADER: &str = "x-graba-user";

pub struct AuthenticatedUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .map(Self)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    error("Unauthorized", "missing or malformed user header"),
                )
                    .into_response()
            })
    }
}

const MAX_JSON_BODY_PAYLOAD: u64 = 1024 * 16;

pub fn handle_all_routes(auctionhouse: Arc<Auctionhouse>, broadcast: Broadcaster) -> Router {
    let state = Arc::new(AppState {
        auctionhouse,
        broadcast,
    });

    let router = Router::new()
        .route(
            "/v1/auctions",
            axum::routing::post(post_auction::post_auction_handler),
        )
        .route(
            "/v1/auctions/{auction_id}",
            axum::routing::get(get_auction::get_auction_handler),
        )
        .route(
            "/v1/auctions/{auction_id}/bids",
            axum::routing::post(post_bid::post_bid_handler),
        )
        .route(
            "/v1/auctions/{auction_id}/buy_now",
            axum::routing::post(post_buy_now::post_buy_now_handler),
        )
        .route("/ws/auctions/{auction_id}", axum::routing::get(ws::ws_handler))
        .with_state(state);

    finalize_router(router)
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    pub error_type: Cow<'static, str>,
    pub description: Cow<'static, str>,
}

pub fn error(error_type: &'static str, description: impl AsRef<str>) -> Json<Error> {
    Json(Error {
        error_type: error_type.into(),
        description: Cow::Owned(description.as_ref().to_owned()),
    })
}

pub fn internal_error_reply() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        error("InternalServerError", ""),
    )
        .into_response()
}

/// Applies cors and log tracing for all routes.
fn finalize_router(router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(vec![
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(vec![
            axum::http::header::ORIGIN,
            axum::http::header::CONTENT_TYPE,
            // Must be lower case due to the HTTP-2 spec
            axum::http::HeaderName::from_static(USER_HEADER),
        ]);

    router
        .layer(DefaultBodyLimit::max(MAX_JSON_BODY_PAYLOAD as usize))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub async fn response_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}
