use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response for a single strip image, as produced by `POST /api/predict`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictionResponse {
    pub ph_class: String,
    pub ph_value: f32,
    pub confidence: f32,
    pub all_probabilities: BTreeMap<String, f32>,
    pub top2_weighted_ph: f32,
    pub health_advice: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
