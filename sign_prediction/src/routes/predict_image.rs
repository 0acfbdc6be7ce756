use crate::{error::InferenceError, model_service::ModelService, server::SharedState};
use axum::{
    extract::{Multipart, State},
    Json,
};
use sign_proto::UploadPrediction;
use tracing::instrument;

/// One-shot upload variant of the websocket flow. Shares the decode,
/// preprocess and inference steps through the model service; the reply body
/// is the bare `{"class","score"}` shape, without the `type` tag the
/// websocket replies carry.
#[instrument(skip(state, multipart))]
pub async fn predict_image<M: ModelService>(
    State(state): State<SharedState<M>>,
    mut multipart: Multipart,
) -> Result<Json<UploadPrediction>, InferenceError> {
    let mut image_data: Vec<u8> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| InferenceError::MalformedUpload(e.to_string()))?
    {
        if field.name() == Some("file") {
            image_data = field
                .bytes()
                .await
                .map_err(|e| InferenceError::MalformedUpload(e.to_string()))?
                .to_vec();
            break;
        }
    }

    if image_data.is_empty() {
        return Err(InferenceError::MalformedUpload(
            "no file field in upload".to_string(),
        ));
    }

    let classification = state.model.classify(&image_data)?;

    Ok(Json(UploadPrediction {
        class: classification.class,
        score: classification.score,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::api_routes;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use image::{ImageBuffer, Rgb};
    use sign_proto::Classification;
    use std::io::Cursor;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[derive(Clone)]
    struct FixedStub;

    impl ModelService for FixedStub {
        fn classify(&self, image_data: &[u8]) -> Result<Classification, InferenceError> {
            image::load_from_memory(image_data)?;
            Ok(Classification {
                class: 42,
                score: 87.5,
            })
        }
    }

    const BOUNDARY: &str = "test-boundary";

    fn multipart_body(image_data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"sign.png\"\r\nContent-Type: image/png\r\n\r\n",
                BOUNDARY
            )
            .as_bytes(),
        );
        body.extend_from_slice(image_data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(24, 24, Rgb([10, 20, 30]));
        let mut image_data: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut image_data);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        image_data
    }

    fn test_router() -> axum::Router {
        api_routes()
            .with_state(SharedState {
                model: Arc::new(FixedStub),
            })
    }

    #[tokio::test]
    async fn test_upload_returns_bare_prediction_body() {
        let response = test_router()
            .oneshot(upload_request(multipart_body(&png_bytes())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let prediction: UploadPrediction = serde_json::from_slice(&body).unwrap();

        assert_eq!(prediction.class, 42);
        assert_eq!(prediction.score, 87.5);
    }

    #[tokio::test]
    async fn test_upload_without_file_field_is_bad_request() {
        let body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{}--\r\n",
            BOUNDARY, BOUNDARY
        );

        let response = test_router()
            .oneshot(upload_request(body.into_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_with_corrupt_image_is_bad_request() {
        let response = test_router()
            .oneshot(upload_request(multipart_body(b"not an image")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_healthcheck_is_available() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
