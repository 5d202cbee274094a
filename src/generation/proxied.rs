use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    endpoint, now_timestamp_ms, redact_json, send_json, settle, GenerationClient,
    GenerationError, GenerationPurpose, GenerationRequest,
};
use crate::config::{TransportKind, DEFAULT_MODEL};
use crate::notifications::Notifier;

const CHAT_PATH: &str = "/api/chat";
const EOD_PATH: &str = "/api/eod/generate";

#[derive(Debug, Default, Deserialize)]
struct BackendReply {
    #[serde(default)]
    content: Option<String>,
}

/// Routes generation through the dashboard's own server, which holds the
/// provider key. No credential is read on this side.
pub struct ProxiedBackendClient {
    http: reqwest::Client,
    base_url: String,
    default_model: String,
    notifier: Notifier,
}

impl ProxiedBackendClient {
    pub fn new(http: reqwest::Client, notifier: Notifier) -> Self {
        Self {
            http,
            base_url: TransportKind::Proxied.default_base_url().to_string(),
            default_model: DEFAULT_MODEL.to_string(),
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

    async fn send(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let (path, payload) = backend_payload(request);
        tracing::debug!(
            request_id = %request.request_id,
            path,
            payload = %redact_json(&payload),
            "sending backend generation request"
        );

        let builder = self
            .http
            .post(endpoint(&self.base_url, path))
            .header("Content-Type", "application/json")
            .json(&payload);
        let reply: BackendReply = send_json(builder, "Assistant backend").await?;
        Ok(reply.content.unwrap_or_default())
    }
}

/// The backend builds its own prompt for chat and EOD, so those carry the raw
/// user text. Task plans have no dedicated route and go through chat with the
/// full prompt.
fn backend_payload(request: &GenerationRequest) -> (&'static str, Value) {
    match request.purpose {
        GenerationPurpose::Chat => (
            CHAT_PATH,
            json!({ "user_id": request.user_id, "message": request.input }),
        ),
        GenerationPurpose::TaskPlan => (
            CHAT_PATH,
            json!({ "user_id": request.user_id, "message": request.prompt }),
        ),
        GenerationPurpose::EodReport => (
            EOD_PATH,
            json!({ "user_id": request.user_id, "activities": request.input }),
        ),
    }
}

#[async_trait::async_trait]
impl GenerationClient for ProxiedBackendClient {
    fn transport(&self) -> TransportKind {
        TransportKind::Proxied
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::{drain, NotificationKind};
    use httpmock::{Method::POST, MockServer};

    fn test_client(server: &MockServer, notifier: Notifier) -> ProxiedBackendClient {
        ProxiedBackendClient::new(reqwest::Client::new(), notifier).with_base_url(server.base_url())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn chat_sends_raw_message_with_user_id() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path(CHAT_PATH).json_body(serde_json::json!({
                "user_id": "emp-7",
                "message": "hello"
            }));
            then.status(200)
                .json_body(serde_json::json!({ "content": "Hi from the backend" }));
        });

        let client = test_client(&server, Notifier::silent());
        let request = GenerationRequest::new("hello\n\nContext: user emp-7")
            .with_input("hello")
            .with_user_id("emp-7");
        let text = client
            .generate(&request)
            .await
            .expect("backend chat should succeed");

        assert_eq!(text, "Hi from the backend");
        mock.assert();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn eod_report_posts_activities_to_eod_route() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path(EOD_PATH).json_body(serde_json::json!({
                "user_id": "emp-7",
                "activities": "Fixed bug\nWrote docs"
            }));
            then.status(200)
                .json_body(serde_json::json!({ "content": "1. Fixed bug\n2. Wrote docs" }));
        });

        let client = test_client(&server, Notifier::silent());
        let request = GenerationRequest::new("full EOD prompt")
            .with_purpose(GenerationPurpose::EodReport)
            .with_input("Fixed bug\nWrote docs")
            .with_user_id("emp-7");
        let text = client
            .generate(&request)
            .await
            .expect("backend eod should succeed");

        assert_eq!(text, "1. Fixed bug\n2. Wrote docs");
        mock.assert();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_content_field_yields_empty_text() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(POST).path(CHAT_PATH);
            then.status(200).json_body(serde_json::json!({}));
        });

        let client = test_client(&server, Notifier::silent());
        let text = client
            .generate_text("hello", None)
            .await
            .expect("empty reply is not an error");
        assert_eq!(text, "");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn gateway_error_is_reported_once() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path(CHAT_PATH);
            then.status(502).body("bad gateway");
        });

        let (notifier, mut notifications) = Notifier::channel();
        let client = test_client(&server, notifier);
        let err = client
            .generate_text("hello", None)
            .await
            .expect_err("502 must fail");

        assert_eq!(err.status(), Some(502));
        assert_eq!(mock.hits(), 1);
        let received = drain(&mut notifications);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, NotificationKind::RequestFailed);
    }
}
