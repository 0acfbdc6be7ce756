use serde::{Deserialize, Serialize};

/// Envelope sent by the client over the websocket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Predict { data: String },
}

/// Envelope sent back by the server. Clients key off the `type` tag and
/// treat anything other than `"prediction"` as a failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Prediction {
        class: u32,
        score: f32,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

/// Result of one forward pass: the winning class index and its softmax
/// probability scaled to 0-100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub class: u32,
    pub score: f32,
}

/// Body of the one-shot `POST /predict` reply. Unlike the websocket
/// envelopes it carries no `type` tag; consumers of that route depend on
/// the bare shape, so the two schemas are deliberately not unified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadPrediction {
    pub class: u32,
    pub score: f32,
}
