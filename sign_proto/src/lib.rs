//! Wire protocol shared by the prediction server and the viewer client.
//!
//! Messages travel as UTF-8 JSON text frames; image bytes are carried inside
//! the envelope as a standard-alphabet base64 string.

mod encoding;
mod message;

pub use encoding::{decode_image, encode_image};
pub use message::{Classification, ClientMessage, ServerMessage, UploadPrediction};
