use crate::error::InferenceError;
use sign_proto::Classification;

/// One classification backend shared by every connection. Inference is
/// synchronous: a forward pass runs to completion inside the calling task.
pub trait ModelService: Send + Sync + Clone + 'static {
    fn classify(&self, image_data: &[u8]) -> Result<Classification, InferenceError>;
}
