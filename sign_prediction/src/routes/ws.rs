use crate::{error::InferenceError, model_service::ModelService, server::SharedState};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use sign_proto::{decode_image, Classification, ClientMessage, ServerMessage};
use tracing::instrument;

#[instrument(skip(ws, state))]
pub async fn websocket<M: ModelService>(
    ws: WebSocketUpgrade,
    State(state): State<SharedState<M>>,
) -> Response {
    ws.on_upgrade(|socket| handle_connection(socket, state))
}

/// One long-lived connection: receive, decode, infer, reply, repeat.
/// A failing request is answered with an error envelope and the loop keeps
/// serving; only peer disconnect or a dead socket ends it.
async fn handle_connection<M: ModelService>(mut socket: WebSocket, state: SharedState<M>) {
    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("Client disconnected: {}", e);
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let reply = match handle_request(text.as_str(), &state) {
                    Ok(classification) => ServerMessage::Prediction {
                        class: classification.class,
                        score: classification.score,
                    },
                    Err(e) => {
                        tracing::warn!("Request failed: {}", e);
                        ServerMessage::Error {
                            message: e.to_string(),
                        }
                    }
                };

                let payload = match serde_json::to_string(&reply) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!("Failed to encode reply: {}", e);
                        break;
                    }
                };

                if socket.send(Message::Text(payload.into())).await.is_err() {
                    tracing::debug!("Client went away before the reply was sent");
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

fn handle_request<M: ModelService>(
    text: &str,
    state: &SharedState<M>,
) -> Result<Classification, InferenceError> {
    let request: ClientMessage = serde_json::from_str(text)?;
    let ClientMessage::Predict { data } = request;
    let image_data = decode_image(&data)?;

    state.model.classify(&image_data)
}
