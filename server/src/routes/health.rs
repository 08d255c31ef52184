//! Service root and health check endpoints

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::{ModelSummary, SharedState};

#[derive(Serialize)]
pub struct HealthResponse {
    /// `healthy` with a model, `degraded` without
    pub status: String,
    pub model_loaded: bool,
    pub model_params: Option<usize>,
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub version: String,
}

#[derive(Serialize)]
pub struct RootResponse {
    pub service: String,
    pub version: String,
    pub endpoints: Vec<String>,
    /// Configured artifact path
    pub model_path: String,
    pub model: Option<ModelSummary>,
}

/// GET / - Service description
pub async fn root(State(state): State<SharedState>) -> Json<RootResponse> {
    Json(RootResponse {
        service: "Tomato Leaf Disease Classifier".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec![
            "GET /".to_string(),
            "GET /health".to_string(),
            "GET /model-info".to_string(),
            "POST /predict".to_string(),
        ],
        model_path: state.config.model_path.display().to_string(),
        model: state.model.as_ref().map(|m| m.summary.clone()),
    })
}

/// GET /health - Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let model_params = state.model.as_ref().map(|m| m.summary.total_params);

    Json(HealthResponse {
        status: if state.model_loaded() { "healthy" } else { "degraded" }.to_string(),
        model_loaded: state.model_loaded(),
        model_params,
        uptime_seconds: state.uptime_seconds(),
        started_at: state.started_at_utc,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::test_support::{get_json, state_with_model, state_without_model};

    #[tokio::test]
    async fn test_health_without_model_is_degraded() {
        let (status, body) = get_json(state_without_model(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["model_loaded"], false);
        assert!(body["model_params"].is_null());
    }

    #[tokio::test]
    async fn test_health_with_model() {
        let (status, body) = get_json(state_with_model(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model_loaded"], true);
        assert!(body["model_params"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_root_lists_endpoints() {
        let (status, body) = get_json(state_with_model(), "/").await;
        assert_eq!(status, StatusCode::OK);
        let endpoints = body["endpoints"].as_array().unwrap();
        assert!(endpoints.iter().any(|e| e == "POST /predict"));
        assert_eq!(body["model"]["num_classes"], 10);
    }
}
