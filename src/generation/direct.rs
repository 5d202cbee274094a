use std::sync::Arc;

use serde_json::json;

use super::{
    endpoint, now_timestamp_ms, redact_json, send_json, settle, GenerationClient,
    GenerationError, GenerationRequest, GenerationResponse,
};
use crate::config::{TransportKind, DEFAULT_MODEL};
use crate::key_store::{Credential, KeyStore};
use crate::notifications::Notifier;

/// Calls `{base_url}/{model}:generateContent?key=...` with the user's own key.
pub struct DirectProviderClient {
    http: reqwest::Client,
    base_url: String,
    default_model: String,
    key_store: Arc<dyn KeyStore>,
    notifier: Notifier,
}

impl DirectProviderClient {
    pub fn new(http: reqwest::Client, key_store: Arc<dyn KeyStore>, notifier: Notifier) -> Self {
        Self {
            http,
            base_url: TransportKind::Direct.default_base_url().to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            key_store,
            notifier,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn require_api_key(&self) -> Result<Credential, GenerationError> {
        self.key_store
            .get_key()
            .filter(|key| !key.is_blank())
            .ok_or(GenerationError::MissingCredential)
    }

    async fn send(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let api_key = self.require_api_key()?;
        let model = request.resolved_model(&self.default_model);
        let payload = json!({
            "contents": [
                { "parts": [ { "text": request.prompt } ] }
            ]
        });
        tracing::debug!(
            request_id = %request.request_id,
            model,
            payload = %redact_json(&payload),
            "sending generateContent request"
        );

        let builder = self
            .http
            .post(endpoint(&self.base_url, &format!("{model}:generateContent")))
            .query(&[("key", api_key.expose())])
            .header("Content-Type", "application/json")
            .json(&payload);
        let response: GenerationResponse = send_json(builder, "Gemini").await?;
        Ok(response.first_text())
    }
}

#[async_trait::async_trait]
impl GenerationClient for DirectProviderClient {
    fn transport(&self) -> TransportKind {
        TransportKind::Direct
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let started_at = now_timestamp_ms();
        let result = self.send(request).await;
        settle(&self.notifier, self.transport(), request, started_at, result)
    }
}
