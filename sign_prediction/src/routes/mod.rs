mod health;
mod predict_image;
mod ws;

use crate::{model_service::ModelService, server::SharedState};
use axum::{
    routing::{any, get, post},
    Router,
};

pub fn api_routes<M: ModelService>() -> Router<SharedState<M>> {
    Router::new()
        .route("/health", get(health::healthcheck))
        .route("/predict", post(predict_image::predict_image::<M>))
        .route("/ws", any(ws::websocket::<M>))
}
