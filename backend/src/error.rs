use actix_web::{HttpResponse, http::StatusCode};
use shared::ErrorResponse;
use std::path::PathBuf;
use thiserror::Error;

/// Failure taxonomy for the prediction pipeline. Client-correctable
/// failures (bad image bytes) are kept apart from deployment defects
/// (missing/incompatible checkpoint) and from transient device exhaustion,
/// so the HTTP boundary can answer each differently.
#[derive(Debug, Error)]
pub enum PhError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("model artifact not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("model is incompatible with this service: {0}")]
    ModelIncompatible(String),

    #[error("inference device out of resources: {0}")]
    InferenceResource(String),

    #[error("prediction failed: {0}")]
    Prediction(String),
}

impl From<tch::TchError> for PhError {
    fn from(err: tch::TchError) -> Self {
        let msg = err.to_string();
        // libtorch reports both CPU and CUDA allocation failures with an
        // "out of memory" message; everything else is an unexpected failure.
        if msg.to_ascii_lowercase().contains("out of memory") {
            PhError::InferenceResource(msg)
        } else {
            PhError::Prediction(msg)
        }
    }
}

impl actix_web::ResponseError for PhError {
    fn status_code(&self) -> StatusCode {
        match self {
            PhError::Decode(_) => StatusCode::BAD_REQUEST,
            PhError::InferenceResource(_) => StatusCode::SERVICE_UNAVAILABLE,
            PhError::ModelNotFound(_) | PhError::ModelIncompatible(_) | PhError::Prediction(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            PhError::Decode(_) => self.to_string(),
            PhError::InferenceResource(_) => {
                "The inference device is out of resources. Please try again shortly.".to_string()
            }
            PhError::ModelNotFound(_) | PhError::ModelIncompatible(_) | PhError::Prediction(_) => {
                log::error!("prediction pipeline failure: {self}");
                "Prediction failed due to an internal error.".to_string()
            }
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse { error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn decode_errors_are_client_errors() {
        let err = PhError::Decode(image::ImageError::Unsupported(
            image::error::UnsupportedError::from_format_and_kind(
                image::error::ImageFormatHint::Unknown,
                image::error::UnsupportedErrorKind::GenericFeature("bad".into()),
            ),
        ));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn resource_exhaustion_is_retryable() {
        let err = PhError::from(tch::TchError::Torch("CUDA out of memory".into()));
        assert!(matches!(err, PhError::InferenceResource(_)));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn other_torch_errors_are_generic_server_errors() {
        let err = PhError::from(tch::TchError::Torch("shape mismatch".into()));
        assert!(matches!(err, PhError::Prediction(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn deployment_defects_are_server_errors() {
        let err = PhError::ModelNotFound(PathBuf::from("/missing/model.pt"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let err = PhError::ModelIncompatible("wrong output width".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
