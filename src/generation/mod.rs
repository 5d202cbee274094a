use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{AssistantConfig, TransportKind};
use crate::error::GenerationError;
use crate::key_store::KeyStore;
use crate::notifications::{Notification, Notifier};

pub mod direct;
pub mod proxied;

pub use direct::DirectProviderClient;
pub use proxied::ProxiedBackendClient;

/// Which dashboard surface a request comes from. The proxied backend routes
/// on it; the direct provider ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPurpose {
    Chat,
    TaskPlan,
    EodReport,
}

impl GenerationPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationPurpose::Chat => "chat",
            GenerationPurpose::TaskPlan => "task_plan",
            GenerationPurpose::EodReport => "eod_report",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub request_id: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub purpose: GenerationPurpose,
    /// The user-authored text the prompt was built from.
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self {
            request_id: Uuid::new_v4().to_string(),
            input: prompt.clone(),
            prompt,
            model: None,
            purpose: GenerationPurpose::Chat,
            user_id: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_purpose(mut self, purpose: GenerationPurpose) -> Self {
        self.purpose = purpose;
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn resolved_model<'a>(&'a self, default_model: &'a str) -> &'a str {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(default_model)
    }
}

/// `generateContent` response envelope. Every level is optional so a
/// truncated or empty envelope still deserializes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerationResponse {
    /// Text of the first part of the first candidate, or `""`.
    ///
    /// Additional candidates and parts are ignored.
    pub fn first_text(&self) -> String {
        self.candidates
            .as_deref()
            .and_then(<[Candidate]>::first)
            .and_then(|candidate| candidate.content.as_ref())
            .and_then(|content| content.parts.as_deref())
            .and_then(<[CandidatePart]>::first)
            .and_then(|part| part.text.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    fn transport(&self) -> TransportKind;

    fn default_model(&self) -> &str;

    /// One attempt, no retries. Failures have already been logged and
    /// surfaced as a notification when this returns `Err`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    async fn generate_text(
        &self,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<String, GenerationError> {
        let mut request = GenerationRequest::new(prompt);
        if let Some(model) = model {
            request = request.with_model(model);
        }
        self.generate(&request).await
    }
}

pub fn build_http_client(config: &AssistantConfig) -> Result<reqwest::Client, GenerationError> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|err| {
            GenerationError::request_failed(None, format!("Unable to build HTTP client: {err}"))
        })
}

pub fn build_generation_client(
    config: &AssistantConfig,
    http: reqwest::Client,
    key_store: Arc<dyn KeyStore>,
    notifier: Notifier,
) -> Arc<dyn GenerationClient> {
    match config.transport {
        TransportKind::Direct => Arc::new(
            DirectProviderClient::new(http, key_store, notifier)
                .with_base_url(&config.provider_base_url)
                .with_default_model(&config.default_model),
        ),
        TransportKind::Proxied => Arc::new(
            ProxiedBackendClient::new(http, notifier)
                .with_base_url(&config.backend_base_url)
                .with_default_model(&config.default_model),
        ),
    }
}

pub fn now_timestamp_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Sends a prepared request and decodes a 2xx JSON body. Non-2xx bodies are
/// not read.
pub(crate) async fn send_json<T: DeserializeOwned>(
    builder: reqwest::RequestBuilder,
    backend: &str,
) -> Result<T, GenerationError> {
    let response = builder.send().await.map_err(|err| {
        let message = if err.is_timeout() {
            format!("{backend} request timed out")
        } else {
            // without_url keeps the `key` query parameter out of the message.
            format!("{backend} request failed: {}", err.without_url())
        };
        GenerationError::request_failed(None, message)
    })?;

    let status = response.status().as_u16();
    if !response.status().is_success() {
        return Err(GenerationError::request_failed(
            Some(status),
            format!("{backend} request failed with status {status}"),
        ));
    }

    response.json::<T>().await.map_err(|err| {
        GenerationError::request_failed(
            Some(status),
            format!(
                "Unable to parse {backend} response JSON: {}",
                err.without_url()
            ),
        )
    })
}

/// Logs the outcome of one call and raises the matching toast on failure.
pub(crate) fn settle(
    notifier: &Notifier,
    transport: TransportKind,
    request: &GenerationRequest,
    started_at: i64,
    result: Result<String, GenerationError>,
) -> Result<String, GenerationError> {
    let duration_ms = (now_timestamp_ms() - started_at).max(0);
    match &result {
        Ok(text) => tracing::debug!(
            request_id = %request.request_id,
            transport = transport.as_str(),
            purpose = request.purpose.as_str(),
            duration_ms,
            output_chars = text.chars().count(),
            "generation completed"
        ),
        Err(GenerationError::MissingCredential) => {
            tracing::warn!(
                request_id = %request.request_id,
                transport = transport.as_str(),
                purpose = request.purpose.as_str(),
                "generation skipped: no API key configured"
            );
            notifier.notify(Notification::missing_credential());
        }
        Err(err) => {
            tracing::warn!(
                request_id = %request.request_id,
                transport = transport.as_str(),
                purpose = request.purpose.as_str(),
                status = ?err.status(),
                duration_ms,
                error = %err,
                "generation request failed"
            );
            notifier.notify(Notification::request_failed());
        }
    }
    result
}

pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut next = serde_json::Map::new();
            for (key, item) in map {
                if is_secret_key(key) {
                    next.insert(key.clone(), Value::String("[REDACTED]".to_string()));
                } else {
                    next.insert(key.clone(), redact_json(item));
                }
            }
            Value::Object(next)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        _ => value.clone(),
    }
}

fn is_secret_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    normalized == "key"
        || normalized.contains("authorization")
        || normalized.contains("api_key")
        || normalized.contains("apikey")
        || normalized.contains("token")
        || normalized.contains("secret")
}
