use crate::config::PredictionServiceConfig;
use futures::{SinkExt, StreamExt};
use sign_proto::{encode_image, Classification, ClientMessage, ServerMessage};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::instrument;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Websocket transport failed: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Connection closed before a reply arrived")]
    ConnectionClosed,
    #[error("Server reported a prediction failure")]
    ErrorReply,
}

pub struct PredictionClient {
    url: String,
}

impl PredictionClient {
    pub fn new(prediction_config: &PredictionServiceConfig) -> Self {
        Self {
            url: prediction_config.get_url(),
        }
    }

    /// One fresh connection per request: send the predict envelope, block
    /// until exactly one reply arrives, then drop the connection.
    #[instrument(skip(self, image_data))]
    pub async fn predict(&self, image_data: Vec<u8>) -> Result<Classification, PredictionError> {
        let (mut socket, _) = connect_async(&self.url).await?;

        let envelope = ClientMessage::Predict {
            data: encode_image(&image_data),
        };
        socket
            .send(tungstenite::Message::Text(serde_json::to_string(&envelope)?))
            .await?;

        let reply = loop {
            match socket.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => break text,
                Some(Ok(tungstenite::Message::Close(_))) | None => {
                    return Err(PredictionError::ConnectionClosed)
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        };

        let _ = socket.close(None).await;

        // anything that does not parse as a prediction envelope is a failure
        match serde_json::from_str::<ServerMessage>(&reply) {
            Ok(ServerMessage::Prediction { class, score }) => Ok(Classification { class, score }),
            _ => Err(PredictionError::ErrorReply),
        }
    }
}
