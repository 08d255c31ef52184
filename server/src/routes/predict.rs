//! Prediction endpoint
//!
//! Accepts either a multipart upload with a `file` image field or a JSON
//! body `{ "features": [...] }` holding a flat `H x W x 3` array in [0, 1].

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::header,
    Json,
};
use serde::Deserialize;
use tracing::info;

use tomato_leaf::PredictionResult;

use crate::error::ApiError;
use crate::state::SharedState;

/// JSON prediction request
#[derive(Debug, Deserialize)]
pub struct FeaturesRequest {
    pub features: Vec<f32>,
}

/// Payload of a prediction request
#[derive(Debug)]
pub enum PredictInput {
    /// Encoded image bytes from the `file` field
    Image(Bytes),
    /// Flat channel-last feature vector
    Features(Vec<f32>),
}

#[async_trait]
impl<S> FromRequest<S> for PredictInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?
            {
                if field.name() != Some("file") {
                    continue;
                }

                if let Some(file_type) = field.content_type() {
                    if !file_type.starts_with("image/") {
                        return Err(ApiError::BadRequest(format!(
                            "File must be an image, got content type '{}'",
                            file_type
                        )));
                    }
                }

                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                if bytes.is_empty() {
                    return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
                }
                return Ok(PredictInput::Image(bytes));
            }

            Err(ApiError::BadRequest("Missing multipart field 'file'".to_string()))
        } else if content_type.starts_with("application/json") {
            let Json(body) = Json::<FeaturesRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Ok(PredictInput::Features(body.features))
        } else {
            Err(ApiError::BadRequest(format!(
                "Unsupported content type '{}': send multipart/form-data with a 'file' field or application/json with 'features'",
                content_type
            )))
        }
    }
}

/// POST /predict - Classify one leaf
///
/// Without a model every request is a 503, whatever its body.
pub async fn predict(
    State(state): State<SharedState>,
    input: Result<PredictInput, ApiError>,
) -> Result<Json<PredictionResult>, ApiError> {
    let model = state.model.clone().ok_or(ApiError::ModelNotLoaded)?;
    let input = input?;

    let result = tokio::task::spawn_blocking(move || {
        let predictor = model.predictor.blocking_lock();
        match input {
            PredictInput::Image(bytes) => predictor.predict_bytes(&bytes),
            PredictInput::Features(features) => predictor.predict_features(&features),
        }
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Inference task failed: {}", e)))??;

    info!(
        label = %result.label,
        confidence = result.confidence,
        "Predicted in {:.2} ms",
        result.inference_time_ms
    );

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    use crate::routes::test_support::{send, state_with_model, state_without_model, TEST_INPUT_SIZE};

    const BOUNDARY: &str = "leafboundary";

    fn leaf_png() -> Vec<u8> {
        let img = RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 5) as u8, 140, (y * 7) as u8]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn multipart_request(field: &str, file_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"leaf.png\"\r\nContent-Type: {t}\r\n\r\n",
                b = BOUNDARY,
                f = field,
                t = file_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::post("/predict")
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    fn features_request(features: &[f32]) -> Request<Body> {
        let json = serde_json::json!({ "features": features });
        Request::post("/predict")
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    fn valid_features() -> Vec<f32> {
        let len = TEST_INPUT_SIZE * TEST_INPUT_SIZE * 3;
        (0..len).map(|i| (i % 255) as f32 / 255.0).collect()
    }

    #[tokio::test]
    async fn test_predict_image_upload() {
        let (status, body) = send(state_with_model(), multipart_request("file", "image/png", &leaf_png())).await;
        assert_eq!(status, StatusCode::OK);

        let confidence = body["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));

        let probabilities = body["probabilities"].as_object().unwrap();
        assert_eq!(probabilities.len(), 10);
        let sum: f64 = probabilities.values().map(|v| v.as_f64().unwrap()).sum();
        assert!((sum - 1.0).abs() < 1e-4);

        let label = body["label"].as_str().unwrap();
        assert!((probabilities[label].as_f64().unwrap() - confidence).abs() < 1e-6);
        assert_eq!(body["is_healthy"], label == "Healthy");
    }

    #[tokio::test]
    async fn test_same_image_gives_same_answer() {
        let state = state_with_model();
        let png = leaf_png();
        let (_, first) = send(state.clone(), multipart_request("file", "image/png", &png)).await;
        let (_, second) = send(state, multipart_request("file", "image/png", &png)).await;
        assert_eq!(first["label"], second["label"]);
        assert_eq!(first["confidence"], second["confidence"]);
    }

    #[tokio::test]
    async fn test_predict_features() {
        let (status, body) = send(state_with_model(), features_request(&valid_features())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["label"].is_string());
        assert!(body["class_index"].as_u64().unwrap() < 10);
    }

    #[tokio::test]
    async fn test_wrong_length_features_is_400_and_server_survives() {
        let state = state_with_model();
        let (status, body) = send(state.clone(), features_request(&[0.5; 10])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert!(body["detail"].as_str().unwrap().contains("768"));

        let (status, _) = send(state, features_request(&valid_features())).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_out_of_range_features_is_400() {
        let mut features = valid_features();
        features[3] = 1.5;
        let (status, _) = send(state_with_model(), features_request(&features)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_garbage_image_is_400() {
        let (status, _) = send(
            state_with_model(),
            multipart_request("file", "image/jpeg", b"definitely not a jpeg"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_image_file_type_is_400() {
        let (status, body) = send(
            state_with_model(),
            multipart_request("file", "text/plain", b"hello"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("image"));
    }

    #[tokio::test]
    async fn test_missing_file_field_is_400() {
        let (status, _) = send(
            state_with_model(),
            multipart_request("upload", "image/png", &leaf_png()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unsupported_content_type_is_400() {
        let request = Request::post("/predict")
            .header("content-type", "text/plain")
            .body(Body::from("leaf"))
            .unwrap();
        let (status, _) = send(state_with_model(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_without_model_is_503() {
        let (status, body) = send(state_without_model(), features_request(&valid_features())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "model_not_loaded");
    }

    #[tokio::test]
    async fn test_malformed_body_without_model_is_503() {
        let request = Request::post("/predict")
            .header("content-type", "application/json")
            .body(Body::from("{ not json"))
            .unwrap();
        let (status, body) = send(state_without_model(), request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "model_not_loaded");

        let (status, _) = send(
            state_without_model(),
            multipart_request("upload", "text/plain", b"hello"),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
