//! HTTP routes

pub mod health;
pub mod model_info;
pub mod predict;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// Largest accepted request body (image uploads)
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Build the application router
pub fn router(state: SharedState) -> Router {
    Router::new()
        // Service info
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/model-info", get(model_info::model_info))

        // Inference
        .route("/predict", post(predict::predict))

        // Add state
        .with_state(state)

        // Add middleware
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use tomato_leaf::backend::{default_device, InferenceBackend};
    use tomato_leaf::dataset::CLASS_NAMES;
    use tomato_leaf::{ModelArtifact, ModelMetadata, Predictor, TomatoClassifier, TomatoClassifierConfig};

    use crate::state::{AppState, LoadedModel, ServerConfig, SharedState};

    pub const TEST_INPUT_SIZE: usize = 16;

    fn config() -> ServerConfig {
        ServerConfig {
            model_path: "missing/best_tomato_model".into(),
        }
    }

    pub fn state_with_model() -> SharedState {
        let device = default_device();
        let model_config = TomatoClassifierConfig::new()
            .with_input_size(TEST_INPUT_SIZE)
            .with_base_filters(2)
            .with_dense_units(4);
        let model = TomatoClassifier::<InferenceBackend>::new(&model_config, &device);
        let labels = CLASS_NAMES.iter().map(|s| s.to_string()).collect();
        let metadata = ModelMetadata::new(&model, &model_config, labels);
        let predictor = Predictor::from_artifact(ModelArtifact::new(model, metadata), &device);

        let loaded = LoadedModel::new(predictor, Path::new("test/best_tomato_model"));
        Arc::new(AppState::with_model(config(), Some(Arc::new(loaded))))
    }

    pub fn state_without_model() -> SharedState {
        Arc::new(AppState::load(config()))
    }

    pub async fn send(state: SharedState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = super::router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    pub async fn get_json(state: SharedState, uri: &str) -> (StatusCode, serde_json::Value) {
        send(state, Request::get(uri).body(Body::empty()).unwrap()).await
    }
}
