use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::error::GenerationError;
use crate::generation::{GenerationClient, GenerationRequest};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvocationState {
    pub is_loading: bool,
    pub error: Option<String>,
}

/// `generate` plus observable `is_loading` / `error`, for UI binding.
///
/// Overlapping calls are neither queued nor cancelled: whichever settles last
/// decides the final state.
pub struct AsyncInvocation {
    client: Arc<dyn GenerationClient>,
    state: watch::Sender<InvocationState>,
}

impl AsyncInvocation {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        let (state, _) = watch::channel(InvocationState::default());
        Self { client, state }
    }

    pub fn client(&self) -> &Arc<dyn GenerationClient> {
        &self.client
    }

    pub fn state(&self) -> InvocationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<InvocationState> {
        self.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.state.send_replace(InvocationState {
            is_loading: true,
            error: None,
        });

        match self.client.generate(request).await {
            Ok(text) => {
                self.state.send_replace(InvocationState {
                    is_loading: false,
                    error: None,
                });
                Ok(text)
            }
            Err(err) => {
                self.state.send_replace(InvocationState {
                    is_loading: false,
                    error: Some(err.to_string()),
                });
                Err(err)
            }
        }
    }

    pub async fn generate_prompt(&self, prompt: &str) -> Result<String, GenerationError> {
        self.generate(&GenerationRequest::new(prompt)).await
    }

    /// Clears a stuck loading flag, e.g. after the owning view aborted the
    /// call mid-flight.
    pub fn reset(&self) {
        self.state.send_replace(InvocationState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedClient;
    use tokio::sync::Notify;

    #[tokio::test(flavor = "current_thread")]
    async fn success_clears_loading_and_error() {
        let client = Arc::new(ScriptedClient::new().reply("done"));
        let invocation = AsyncInvocation::new(client);

        let text = invocation
            .generate_prompt("plan my day")
            .await
            .expect("scripted reply should succeed");

        assert_eq!(text, "done");
        assert_eq!(invocation.state(), InvocationState::default());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failure_records_message_and_returns_error() {
        let client = Arc::new(
            ScriptedClient::new().fail(GenerationError::request_failed(Some(500), "boom")),
        );
        let invocation = AsyncInvocation::new(client);

        let err = invocation
            .generate_prompt("plan my day")
            .await
            .expect_err("scripted failure should surface");

        assert_eq!(err.status(), Some(500));
        assert!(!invocation.is_loading());
        assert_eq!(invocation.error().as_deref(), Some("boom"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn new_call_resets_previous_error_and_reports_loading() {
        let gate = Arc::new(Notify::new());
        let client = Arc::new(
            ScriptedClient::new()
                .gated(gate.clone())
                .fail(GenerationError::MissingCredential)
                .reply("second"),
        );
        let invocation = AsyncInvocation::new(client);
        let mut states = invocation.subscribe();

        gate.notify_one();
        let _ = invocation.generate_prompt("first").await;
        assert!(invocation.error().is_some());

        let pending = invocation.generate_prompt("second");
        let observe = async {
            states
                .wait_for(|state| state.is_loading)
                .await
                .expect("sender alive");
            assert_eq!(invocation.error(), None);
            gate.notify_one();
        };
        let (result, ()) = tokio::join!(pending, observe);

        assert_eq!(result.expect("second call should succeed"), "second");
        assert_eq!(invocation.state(), InvocationState::default());
    }
}
