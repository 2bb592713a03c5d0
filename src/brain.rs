use reqwest::Client;
use serde_json::{Value, json};
use std::future::Future;
use tracing::{debug, error};

use crate::error::ModelError;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A black-box text completion service: one prompt in, one reply out.
pub trait Model: Send + Sync {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, ModelError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Provider {
    #[value(name = "openai")]
    OpenAi,
    Gemini,
}

impl Provider {
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Gemini => "gemini-2.0-flash",
        }
    }

    pub fn api_key_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }

    fn default_base(self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_API_BASE,
            Provider::Gemini => GEMINI_API_BASE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrainConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    pub api_base: Option<String>,
}

/// HTTP client for the planning model.
pub struct Brain {
    client: Client,
    provider: Provider,
    model: String,
    api_key: String,
    api_base: String,
}

impl Brain {
    pub fn new(config: BrainConfig) -> Self {
        let api_base = config
            .api_base
            .as_deref()
            .unwrap_or(config.provider.default_base())
            .trim_end_matches('/')
            .to_string();
        Self {
            client: Client::new(),
            provider: config.provider,
            model: config.model,
            api_key: config.api_key,
            api_base,
        }
    }

    async fn post(&self, request: reqwest::RequestBuilder, body: Value) -> Result<Value, ModelError> {
        let response = request.json(&body).send().await?;
        let status = response.status();
        let json_resp: Value = response.json().await?;

        if !status.is_success() {
            let message = json_resp["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error")
                .to_string();
            error!(status = status.as_u16(), %message, "model API error");
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(json_resp)
    }

    async fn complete_openai(&self, prompt: &str) -> Result<String, ModelError> {
        let request = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key));
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.2,
        });
        let json_resp = self.post(request, body).await?;
        extract_text(&json_resp, &["choices", "0", "message", "content"])
    }

    fn gemini_url(&self) -> String {
        let model = self.model.strip_prefix("gemini/").unwrap_or(&self.model);
        format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, model, self.api_key
        )
    }

    async fn complete_gemini(&self, prompt: &str) -> Result<String, ModelError> {
        let request = self.client.post(self.gemini_url());
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {"temperature": 0.2},
        });
        let json_resp = self.post(request, body).await?;
        extract_text(&json_resp, &["candidates", "0", "content", "parts", "0", "text"])
    }
}

impl Model for Brain {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let text = match self.provider {
            Provider::OpenAi => self.complete_openai(prompt).await?,
            Provider::Gemini => self.complete_gemini(prompt).await?,
        };
        debug!(reply = %text, "model replied");
        Ok(text)
    }
}

/// Walk `path` (object keys or array indices) down to a string.
fn extract_text(json_resp: &Value, path: &[&str]) -> Result<String, ModelError> {
    let mut node = json_resp;
    for key in path {
        node = match key.parse::<usize>() {
            Ok(idx) => &node[idx],
            Err(_) => &node[*key],
        };
    }
    node.as_str()
        .map(str::to_string)
        .ok_or_else(|| ModelError::MissingContent(json_resp.to_string()))
}
