//! Loaded classifier handle: a TorchScript EfficientNetV2-S export plus a
//! JSON metadata sidecar (`<model>.meta.json`) carrying the backbone name,
//! training epoch and the ordered class table the weights were trained
//! against. The sidecar travels with the weight file so the label order is
//! a versioned artifact instead of an unchecked assumption.

use crate::error::PhError;
use crate::inference::classes;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tch::{CModule, Device, Kind, Tensor};

#[derive(Debug, Deserialize)]
pub struct CheckpointMeta {
    pub backbone: String,
    pub epoch: i64,
    pub classes: Vec<ClassEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ClassEntry {
    pub label: String,
    pub ph: f32,
}

#[derive(Clone, Debug)]
pub struct PhModel {
    module: Arc<Mutex<CModule>>,
    device: Device,
    img_size: i64,
}

impl PhModel {
    /// Loads the classifier once; the returned handle is cloned into every
    /// request worker and never mutated again. Device binding happens here
    /// and is fixed for the handle's lifetime.
    pub fn load(model_path: &Path, img_size: u32) -> Result<Self, PhError> {
        if !model_path.exists() {
            return Err(PhError::ModelNotFound(model_path.to_path_buf()));
        }
        let meta_path = meta_path_for(model_path);
        if !meta_path.exists() {
            return Err(PhError::ModelNotFound(meta_path));
        }
        let meta = read_meta(&meta_path)?;
        validate_class_table(&meta)?;

        let device = Device::cuda_if_available();
        log::info!("Using device: {:?}", device);
        log::info!("Loading model from: {}", model_path.display());

        let mut module = CModule::load_on_device(model_path, device)?;
        // Dropout/batchnorm must stay frozen for concurrent inference.
        module.set_eval();

        log::info!(
            "Loaded checkpoint - backbone: {}, epoch: {}",
            meta.backbone,
            meta.epoch
        );

        let model = Self {
            module: Arc::new(Mutex::new(module)),
            device,
            img_size: i64::from(img_size),
        };
        model.verify_output_width()?;
        log::info!("Model loaded successfully on {:?}", device);
        Ok(model)
    }

    /// Runs one forward pass and returns the raw length-7 logit vector.
    /// Read-only with respect to the module; safe to call from any number
    /// of request handlers.
    pub fn infer(&self, tensor: &Tensor) -> Result<Vec<f32>, PhError> {
        let input = tensor.to_device(self.device);
        let module = self.module.lock().unwrap();
        let logits = tch::no_grad(|| module.forward_ts(&[input]))?;
        let flat = logits
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .view([-1]);
        let num_elements = flat.size()[0] as usize;
        let mut out = vec![0.0f32; num_elements];
        flat.copy_data(&mut out, num_elements);
        Ok(out)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    // Probe with a zero tensor so an output-width drift against the class
    // table fails the load instead of corrupting predictions later.
    fn verify_output_width(&self) -> Result<(), PhError> {
        let probe = Tensor::zeros(
            [1, 3, self.img_size, self.img_size],
            (Kind::Float, self.device),
        );
        check_probe_output(self.infer(&probe))
    }
}

// A forward pass that rejects the expected input shape at load time means
// the stored structure is not the architecture this service was built
// for, so probe failures surface as incompatibility alongside a wrong
// output width.
fn check_probe_output(result: Result<Vec<f32>, PhError>) -> Result<(), PhError> {
    let logits =
        result.map_err(|e| PhError::ModelIncompatible(format!("probe forward failed: {e}")))?;
    if logits.len() != classes::NUM_CLASSES {
        return Err(PhError::ModelIncompatible(format!(
            "classifier produces {} outputs, expected {}",
            logits.len(),
            classes::NUM_CLASSES
        )));
    }
    Ok(())
}

fn meta_path_for(model_path: &Path) -> PathBuf {
    model_path.with_extension("meta.json")
}

fn read_meta(meta_path: &Path) -> Result<CheckpointMeta, PhError> {
    let raw = std::fs::read_to_string(meta_path)
        .map_err(|e| PhError::ModelIncompatible(format!("unreadable checkpoint metadata: {e}")))?;
    serde_json::from_str(&raw)
        .map_err(|e| PhError::ModelIncompatible(format!("invalid checkpoint metadata: {e}")))
}

/// The checkpoint's class table must match the built-in mapping entry by
/// entry; any drift means the weights were trained against a different
/// label order and every prediction would be silently wrong.
fn validate_class_table(meta: &CheckpointMeta) -> Result<(), PhError> {
    if meta.classes.len() != classes::NUM_CLASSES {
        return Err(PhError::ModelIncompatible(format!(
            "checkpoint declares {} classes, service expects {}",
            meta.classes.len(),
            classes::NUM_CLASSES
        )));
    }
    for (i, entry) in meta.classes.iter().enumerate() {
        if entry.label != classes::label_of(i) || entry.ph != classes::value_of(i) {
            return Err(PhError::ModelIncompatible(format!(
                "class table drift at index {i}: checkpoint has {} ({}), service expects {} ({})",
                entry.label,
                entry.ph,
                classes::label_of(i),
                classes::value_of(i)
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_weight_file_is_model_not_found() {
        let err = PhModel::load(Path::new("/nonexistent/best_efficientnet_ph.pt"), 224)
            .unwrap_err();
        assert!(matches!(err, PhError::ModelNotFound(_)));
    }

    #[test]
    fn meta_path_sits_next_to_the_weights() {
        assert_eq!(
            meta_path_for(Path::new("models/cnn/best_efficientnet_ph.pt")),
            PathBuf::from("models/cnn/best_efficientnet_ph.meta.json")
        );
    }

    fn meta_with(classes: Vec<ClassEntry>) -> CheckpointMeta {
        CheckpointMeta {
            backbone: "efficientnet_v2_s".into(),
            epoch: 42,
            classes,
        }
    }

    fn well_formed_table() -> Vec<ClassEntry> {
        classes::entries()
            .map(|(label, ph)| ClassEntry {
                label: label.to_string(),
                ph,
            })
            .collect()
    }

    #[test]
    fn matching_class_table_passes_validation() {
        assert!(validate_class_table(&meta_with(well_formed_table())).is_ok());
    }

    #[test]
    fn wrong_class_count_is_incompatible() {
        let mut table = well_formed_table();
        table.pop();
        let err = validate_class_table(&meta_with(table)).unwrap_err();
        assert!(matches!(err, PhError::ModelIncompatible(_)));
    }

    #[test]
    fn reordered_class_table_is_incompatible() {
        let mut table = well_formed_table();
        table.swap(0, 1);
        let err = validate_class_table(&meta_with(table)).unwrap_err();
        assert!(matches!(err, PhError::ModelIncompatible(_)));
    }

    #[test]
    fn drifted_ph_value_is_incompatible() {
        let mut table = well_formed_table();
        table[3].ph = 6.5;
        let err = validate_class_table(&meta_with(table)).unwrap_err();
        assert!(matches!(err, PhError::ModelIncompatible(_)));
    }

    #[test]
    fn rejected_probe_forward_is_incompatible() {
        let err = check_probe_output(Err(PhError::Prediction(
            "forward expects 5 input channels".into(),
        )))
        .unwrap_err();
        assert!(matches!(err, PhError::ModelIncompatible(_)));

        // Device exhaustion during the load-time probe is still a defect
        // in the deployed artifact, not a retryable request failure.
        let err = check_probe_output(Err(PhError::InferenceResource("out of memory".into())))
            .unwrap_err();
        assert!(matches!(err, PhError::ModelIncompatible(_)));
    }

    #[test]
    fn wrong_probe_output_width_is_incompatible() {
        let err = check_probe_output(Ok(vec![0.0; 1000])).unwrap_err();
        assert!(matches!(err, PhError::ModelIncompatible(_)));
    }

    #[test]
    fn expected_probe_output_width_passes() {
        assert!(check_probe_output(Ok(vec![0.0; classes::NUM_CLASSES])).is_ok());
    }

    #[test]
    fn metadata_parses_from_json() {
        let raw = r#"{
            "backbone": "efficientnet_v2_s",
            "epoch": 17,
            "classes": [
                {"label": "pH_10", "ph": 10.0},
                {"label": "pH_4", "ph": 4.0},
                {"label": "pH_5", "ph": 5.0},
                {"label": "pH_6", "ph": 6.0},
                {"label": "pH_7", "ph": 7.0},
                {"label": "pH_8", "ph": 8.0},
                {"label": "pH_9", "ph": 9.0}
            ]
        }"#;
        let meta: CheckpointMeta = serde_json::from_str(raw).unwrap();
        assert_eq!(meta.backbone, "efficientnet_v2_s");
        assert_eq!(meta.epoch, 17);
        assert!(validate_class_table(&meta).is_ok());
    }
}
