//! Model metadata endpoint

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use tomato_leaf::model::LayerSpec;

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Serialize)]
pub struct ModelInfoResponse {
    pub architecture: String,
    /// `[height, width, channels]`
    pub input_shape: [usize; 3],
    /// Length of the flat `features` array accepted by `/predict`
    pub feature_length: usize,
    pub output_shape: [usize; 1],
    pub total_params: usize,
    pub labels: Vec<String>,
    pub layers: Vec<LayerSpec>,
    pub val_accuracy: Option<f64>,
    pub epoch: Option<usize>,
    pub created_at: DateTime<Utc>,
}

/// GET /model-info - Architecture of the loaded model
pub async fn model_info(State(state): State<SharedState>) -> Result<Json<ModelInfoResponse>, ApiError> {
    let model = state.model.as_ref().ok_or(ApiError::ModelNotLoaded)?;
    let metadata = &model.metadata;

    Ok(Json(ModelInfoResponse {
        architecture: metadata.architecture.clone(),
        input_shape: metadata.input_shape,
        feature_length: metadata.feature_len(),
        output_shape: metadata.output_shape(),
        total_params: model.summary.total_params,
        labels: metadata.labels.clone(),
        layers: metadata.layers.clone(),
        val_accuracy: metadata.val_accuracy,
        epoch: metadata.epoch,
        created_at: metadata.created_at,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::test_support::{get_json, state_with_model, state_without_model, TEST_INPUT_SIZE};

    #[tokio::test]
    async fn test_model_info_describes_network() {
        let (status, body) = get_json(state_with_model(), "/model-info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["input_shape"][0], TEST_INPUT_SIZE);
        assert_eq!(body["input_shape"][2], 3);
        assert_eq!(body["feature_length"], TEST_INPUT_SIZE * TEST_INPUT_SIZE * 3);
        assert_eq!(body["output_shape"][0], 10);
        assert_eq!(body["labels"].as_array().unwrap().len(), 10);
        assert_eq!(body["layers"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_model_info_without_model_is_503() {
        let (status, body) = get_json(state_without_model(), "/model-info").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "model_not_loaded");
    }
}
