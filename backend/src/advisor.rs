//! Care-advice generation. Sends the prediction to an OpenAI-compatible
//! chat-completions endpoint and falls back to local templates keyed by the
//! pH bucket when the call fails or no API key is configured. Advice
//! generation never fails the request.

use crate::config::Settings;
use reqwest::Client;
use serde_json::{Value, json};

const SYSTEM_PROMPT: &str = "You are a veterinary expert. Explain how to care for a dog \
based on its urine pH reading, in a friendly and professional tone.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhStatus {
    Acidic,
    Normal,
    Alkaline,
}

impl PhStatus {
    pub fn description(self) -> &'static str {
        match self {
            PhStatus::Acidic => "acidic",
            PhStatus::Normal => "within the normal range",
            PhStatus::Alkaline => "alkaline",
        }
    }

    fn concern(self) -> &'static str {
        match self {
            PhStatus::Acidic => {
                "Acidic urine can be a sign of urinary tract infection or kidney problems."
            }
            PhStatus::Normal => "The pH value is within the normal range.",
            PhStatus::Alkaline => {
                "Alkaline urine can be caused by urinary tract infection or certain medications."
            }
        }
    }
}

pub fn status_for(ph_value: f32) -> PhStatus {
    if ph_value <= 6.0 {
        PhStatus::Acidic
    } else if ph_value >= 8.0 {
        PhStatus::Alkaline
    } else {
        PhStatus::Normal
    }
}

#[derive(Clone)]
pub struct HealthAdvisor {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl HealthAdvisor {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: Client::new(),
            api_key: settings.openai_api_key.clone(),
            model: settings.openai_model.clone(),
            base_url: settings.openai_base_url.clone(),
        }
    }

    pub async fn advise(&self, ph_value: f32, ph_class: &str, confidence: f32) -> String {
        let Some(api_key) = self.api_key.clone() else {
            return fallback_advice(ph_value);
        };
        match self
            .request_advice(&api_key, ph_value, ph_class, confidence)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                log::warn!("advice generation failed, using local fallback: {e}");
                fallback_advice(ph_value)
            }
        }
    }

    async fn request_advice(
        &self,
        api_key: &str,
        ph_value: f32,
        ph_class: &str,
        confidence: f32,
    ) -> Result<String, String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(ph_value, ph_class, confidence)}
            ],
            "max_tokens": 500,
            "temperature": 0.7
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;

        let payload: Value = response.json().await.map_err(|e| e.to_string())?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| "completion response had no message content".to_string())
    }
}

fn user_prompt(ph_value: f32, ph_class: &str, confidence: f32) -> String {
    let status = status_for(ph_value);
    format!(
        "A dog's urine pH was measured as {ph_value} ({ph_class}) with {:.1}% prediction \
confidence.\n\nCurrent status: {}\nConcern: {}\n\nPlease give concrete care guidance for \
this pH value, covering:\n1. What the current pH value means\n2. Symptoms to watch for\n\
3. Recommended care (diet, water intake, etc.)\n4. When a vet visit is needed\n\
5. Day-to-day care tips\n\nKeep the advice concise and practical.",
        confidence * 100.0,
        status.description(),
        status.concern()
    )
}

/// Deterministic local advice used whenever the text service is
/// unavailable, keyed by the same buckets as `status_for`.
pub fn fallback_advice(ph_value: f32) -> String {
    match status_for(ph_value) {
        PhStatus::Acidic => format!(
            "pH {ph_value} - Acidic\n\n\
The urine measured acidic, below the normal range.\n\n\
Watch for: urinary tract infection, signs of kidney disease, effects of \
current medication.\n\n\
Recommended care:\n\
1. Encourage plenty of water intake.\n\
2. Consult a veterinarian for a proper diagnosis.\n\
3. Watch for infection symptoms such as frequent or painful urination.\n\
4. Continue any prescribed medication.\n\n\
See a veterinarian if the pH stays low, other symptoms appear (loss of \
appetite, lethargy), or the urine's color or smell changes."
        ),
        PhStatus::Alkaline => format!(
            "pH {ph_value} - Alkaline\n\n\
The urine measured alkaline, above the normal range.\n\n\
Watch for: urinary tract infection, certain bacterial infections, effects \
of medication.\n\n\
Recommended care:\n\
1. Consult a veterinarian to find the cause.\n\
2. Encourage plenty of water intake.\n\
3. Watch for infection symptoms.\n\
4. Finish any prescribed antibiotics completely.\n\n\
See a veterinarian if the pH stays high, the urine is bloody or cloudy, \
or urination appears painful."
        ),
        PhStatus::Normal => format!(
            "pH {ph_value} - Normal\n\n\
The urine pH is within the healthy range (6.5-7.5).\n\n\
Daily care:\n\
1. Provide plenty of clean water.\n\
2. Feed a balanced diet.\n\
3. Keep up regular walks and exercise.\n\
4. Schedule routine checkups (once or twice a year).\n\n\
Tips: check water intake daily, keep an eye on urine color and smell, and \
note any change in urination frequency."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_follow_the_fallback_contract() {
        assert_eq!(status_for(4.0), PhStatus::Acidic);
        assert_eq!(status_for(6.0), PhStatus::Acidic);
        assert_eq!(status_for(6.5), PhStatus::Normal);
        assert_eq!(status_for(7.0), PhStatus::Normal);
        assert_eq!(status_for(7.9), PhStatus::Normal);
        assert_eq!(status_for(8.0), PhStatus::Alkaline);
        assert_eq!(status_for(10.0), PhStatus::Alkaline);
    }

    #[test]
    fn fallback_text_matches_the_bucket() {
        assert!(fallback_advice(5.0).contains("Acidic"));
        assert!(fallback_advice(7.0).contains("Normal"));
        assert!(fallback_advice(9.0).contains("Alkaline"));
        assert!(fallback_advice(6.9).contains("6.9"));
    }

    #[actix_web::test]
    async fn advise_without_api_key_uses_the_fallback() {
        let settings = Settings {
            openai_api_key: None,
            ..Settings::default()
        };
        let advisor = HealthAdvisor::new(&settings);
        let advice = advisor.advise(7.0, "pH_7", 0.9).await;
        assert_eq!(advice, fallback_advice(7.0));
    }
}
