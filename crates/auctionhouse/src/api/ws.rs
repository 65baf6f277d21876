use {
    super::AppState,
    axum::{
        extract::{
            Path,
            State,
            ws::{Message, WebSocket, WebSocketUpgrade},
        },
        response::Response,
    },
    model::auction::AuctionId,
    std::sync::Arc,
};

pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Path(auction_id): Path<AuctionId>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| serve_events(socket, state, auction_id))
}

/// Forwards every event on the auction's topic to the client as a JSON text
/// frame, until either side disconnects. The feed carries no history; a
/// client reconciles missed events by re-reading the auction.
async fn serve_events(mut socket: WebSocket, state: Arc<AppState>, auction_id: AuctionId) {
    let mut subscription = state.broadcast.subscribe(auction_id);
    tracing::debug!(auction_id, "websocket client joined");
    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let frame = match serde_json::to_string(&event) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::error!(?err, "failed to encode event");
                        continue;
                    }
                };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                // Clients only listen; inbound frames other than close are
                // ignored.
                match message {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => (),
                }
            }
        }
    }
    tracing::debug!(auction_id, "websocket client left");
}
