use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use tokio::sync::Notify;

use crate::config::TransportKind;
use crate::error::GenerationError;
use crate::generation::{now_timestamp_ms, settle, GenerationClient, GenerationRequest};
use crate::notifications::Notifier;

/// In-process client that replays queued outcomes. With a gate, every call
/// parks until the test releases it.
pub(crate) struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: Mutex<Vec<GenerationRequest>>,
    gate: Option<Arc<Notify>>,
    notifier: Notifier,
}

impl ScriptedClient {
    pub(crate) fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
            notifier: Notifier::silent(),
        }
    }

    pub(crate) fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn reply(self, text: &str) -> Self {
        self.replies
            .lock()
            .expect("replies lock")
            .push_back(Ok(text.to_string()));
        self
    }

    pub(crate) fn fail(self, error: GenerationError) -> Self {
        self.replies
            .lock()
            .expect("replies lock")
            .push_back(Err(error));
        self
    }

    pub(crate) fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }
}

#[async_trait::async_trait]
impl GenerationClient for ScriptedClient {
    fn transport(&self) -> TransportKind {
        TransportKind::Direct
    }

    fn default_model(&self) -> &str {
        crate::config::DEFAULT_MODEL
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let started_at = now_timestamp_ms();
        self.calls
            .lock()
            .expect("calls lock")
            .push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let result = self
            .replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()));
        settle(&self.notifier, self.transport(), request, started_at, result)
    }
}
