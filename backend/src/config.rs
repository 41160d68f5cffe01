//! Environment-backed service configuration, loaded once at startup after
//! `dotenv` has populated the process environment.

use std::env;
use std::path::PathBuf;

const DEFAULT_MODEL_PATH: &str = "models/cnn/best_efficientnet_ph.pt";
const DEFAULT_IMG_SIZE: u32 = 224;
const DEFAULT_MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;
const DEFAULT_PORT: u16 = 8081;
const DEFAULT_STATIC_DIR: &str = "static";
const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct Settings {
    pub model_path: PathBuf,
    pub img_size: u32,
    pub max_upload_size: usize,
    pub port: u16,
    pub static_dir: PathBuf,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            img_size: DEFAULT_IMG_SIZE,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            port: DEFAULT_PORT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();
        Self {
            model_path: env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            img_size: parsed_env("IMG_SIZE").unwrap_or(defaults.img_size),
            max_upload_size: parsed_env("MAX_UPLOAD_SIZE").unwrap_or(defaults.max_upload_size),
            port: parsed_env("PORT").unwrap_or(defaults.port),
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai_base_url),
        }
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring unparseable {key}={raw}");
            None
        }
    }
}
