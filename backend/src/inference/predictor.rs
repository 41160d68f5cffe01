//! Turns raw classifier logits into a structured pH prediction: stable
//! softmax, argmax class, full probability table and the top-2 weighted
//! continuous estimate.

use crate::error::PhError;
use crate::inference::classes;
use crate::inference::model::PhModel;
use std::collections::BTreeMap;
use tch::Tensor;

// Guards the top-2 blend against float underflow; softmax output cannot
// actually be all-zero.
const TOP2_EPSILON: f32 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub top_label: &'static str,
    pub top_value: f32,
    pub confidence: f32,
    pub probabilities: BTreeMap<String, f32>,
    pub top2_weighted_value: f32,
}

/// Runs one inference pass on a preprocessed tensor. Model-load and device
/// errors propagate unchanged; no retries happen here.
pub fn predict(model: &PhModel, tensor: &Tensor) -> Result<Prediction, PhError> {
    let logits = model.infer(tensor)?;
    if logits.len() != classes::NUM_CLASSES {
        return Err(PhError::Prediction(format!(
            "expected {} logits, got {}",
            classes::NUM_CLASSES,
            logits.len()
        )));
    }
    Ok(from_logits(&logits))
}

pub(crate) fn from_logits(logits: &[f32]) -> Prediction {
    let probs = softmax(logits);
    let (i1, i2) = top2_indices(&probs);
    let (p1, p2) = (probs[i1], probs[i2]);
    let (v1, v2) = (classes::value_of(i1), classes::value_of(i2));

    let probabilities = probs
        .iter()
        .enumerate()
        .map(|(i, p)| (classes::label_of(i).to_string(), *p))
        .collect();

    Prediction {
        top_label: classes::label_of(i1),
        top_value: v1,
        confidence: p1,
        probabilities,
        top2_weighted_value: (p1 * v1 + p2 * v2) / (p1 + p2 + TOP2_EPSILON),
    }
}

/// Softmax with the max subtracted before exponentiating, so large logits
/// cannot overflow to infinity.
pub(crate) fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

// Highest and second-highest probability indices, ties resolved to the
// lower index in both places.
fn top2_indices(probs: &[f32]) -> (usize, usize) {
    let mut i1 = 0;
    for i in 1..probs.len() {
        if probs[i] > probs[i1] {
            i1 = i;
        }
    }
    let mut i2 = if i1 == 0 { 1 } else { 0 };
    for i in 0..probs.len() {
        if i != i1 && probs[i] > probs[i2] {
            i2 = i;
        }
    }
    (i1, i2)
}
