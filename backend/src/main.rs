mod advisor;
mod config;
mod error;
mod inference;
mod routes;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use advisor::HealthAdvisor;
use config::Settings;
use inference::model::PhModel;
use routes::configure_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::from_env();
    log::info!("Model path: {}", settings.model_path.display());

    // Eager load: a missing or incompatible checkpoint is a deployment
    // defect and should fail startup, not the first request.
    let model = match PhModel::load(&settings.model_path, settings.img_size) {
        Ok(model) => model,
        Err(e) => {
            log::error!("Failed to preload model at startup: {e}");
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Model loading failed: {e}"),
            ));
        }
    };

    let advisor = HealthAdvisor::new(&settings);
    if settings.openai_api_key.is_none() {
        log::warn!("OPENAI_API_KEY is not set; health advice will use the local fallback templates.");
    }

    let bind_address = format!("0.0.0.0:{}", settings.port);
    log::info!("Starting server on {}", bind_address);

    let static_dir = settings.static_dir.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(model.clone()))
            .app_data(web::Data::new(advisor.clone()))
            .app_data(web::Data::new(settings.clone()))
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
