use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::info;
use serde_json::json;
use shared::PredictionResponse;
use std::path::PathBuf;

use crate::advisor::HealthAdvisor;
use crate::config::Settings;
use crate::inference::model::PhModel;
use crate::inference::{predictor, preprocess};

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: PathBuf) {
    cfg.service(web::resource("/api/predict").route(web::post().to(handle_predict)))
        .service(web::resource("/api/health").route(web::get().to(health_check)))
        .service(web::resource("/").route(web::get().to(index)))
        .service(Files::new("/static", static_dir));
}

/// Accepts a multipart image upload, runs the prediction pipeline and
/// attaches the generated care advice. Upload validation happens before
/// any preprocessing; pipeline errors map to HTTP statuses through
/// `PhError`'s `ResponseError` impl.
async fn handle_predict(
    model: web::Data<PhModel>,
    advisor: web::Data<HealthAdvisor>,
    settings: web::Data<Settings>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let image_data = read_image_field(&mut payload, settings.max_upload_size).await?;

    let tensor = preprocess::preprocess(&image_data, settings.img_size)?;
    let prediction = predictor::predict(&model, &tensor)?;

    let health_advice = advisor
        .advise(
            prediction.top_value,
            prediction.top_label,
            prediction.confidence,
        )
        .await;

    info!(
        "predicted {} (confidence {:.3}, top-2 weighted {:.2})",
        prediction.top_label, prediction.confidence, prediction.top2_weighted_value
    );

    Ok(HttpResponse::Ok().json(PredictionResponse {
        ph_class: prediction.top_label.to_string(),
        ph_value: prediction.top_value,
        confidence: prediction.confidence,
        all_probabilities: prediction.probabilities,
        top2_weighted_ph: prediction.top2_weighted_value,
        health_advice,
    }))
}

/// Reads the first image part of the multipart payload, enforcing the
/// content-type and size limits before any bytes reach the preprocessor.
async fn read_image_field(payload: &mut Multipart, max_size: usize) -> Result<Vec<u8>, Error> {
    while let Ok(Some(mut field)) = payload.try_next().await {
        let is_image = field
            .content_type()
            .map(|mime| mime.essence_str().starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(actix_web::error::ErrorBadRequest(
                "Only image uploads are accepted.",
            ));
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if data.len() + chunk.len() > max_size {
                return Err(actix_web::error::ErrorBadRequest(format!(
                    "Upload exceeds the {:.1} MiB limit.",
                    max_size as f64 / (1024.0 * 1024.0)
                )));
            }
            data.extend_from_slice(&chunk);
        }
        if !data.is_empty() {
            return Ok(data);
        }
    }
    Err(actix_web::error::ErrorBadRequest(
        "No image file found in the request.",
    ))
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "message": "pH prediction API is running"
    }))
}

async fn index(settings: web::Data<Settings>) -> actix_web::Result<HttpResponse> {
    let index_path = settings.static_dir.join("index.html");
    if index_path.exists() {
        let body = std::fs::read(index_path)?;
        return Ok(HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(body));
    }
    Ok(HttpResponse::Ok().json(json!({
        "message": "Pet urine pH analysis API",
        "health": "/api/health",
        "predict": "/api/predict"
    })))
}
