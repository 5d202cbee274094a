pub mod chat_panel;
pub mod config;
pub mod drafts;
pub mod error;
pub mod generation;
pub mod invocation;
pub mod key_store;
pub mod markdown;
pub mod notifications;
pub mod settings;
pub mod telemetry;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

pub use chat_panel::{ChatPanel, Message, PanelLayout, Role, SubmitOutcome, UserContext};
pub use config::{AssistantConfig, TransportKind};
pub use drafts::{DraftContext, DraftGenerator, DraftKind};
pub use error::{DraftError, GenerationError, KeyStoreError, SettingsError};
pub use generation::{GenerationClient, GenerationPurpose, GenerationRequest};
pub use invocation::{AsyncInvocation, InvocationState};
pub use key_store::{Credential, KeyStore, KeyringKeyStore, MemoryKeyStore};
pub use markdown::{plain_text, render_markdown, RenderedMarkdown};
pub use notifications::{Notification, NotificationKind, NotificationLevel, Notifier};
pub use settings::SettingsStore;

/// Composition root: one HTTP client and one generation client shared by every
/// panel and generator the dashboard opens.
pub struct Assistant {
    config: AssistantConfig,
    client: Arc<dyn GenerationClient>,
    notifier: Notifier,
}

impl Assistant {
    pub fn bootstrap(
        config: AssistantConfig,
        key_store: Arc<dyn KeyStore>,
        notifier: Notifier,
    ) -> Result<Self, GenerationError> {
        let http = generation::build_http_client(&config)?;
        let client =
            generation::build_generation_client(&config, http, key_store, notifier.clone());
        tracing::info!(
            transport = config.transport.as_str(),
            base_url = config.base_url(),
            model = %config.default_model,
            timeout_secs = config.request_timeout().as_secs(),
            "assistant ready"
        );
        Ok(Self {
            config,
            client,
            notifier,
        })
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn client(&self) -> Arc<dyn GenerationClient> {
        Arc::clone(&self.client)
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn chat_panel(&self, layout: PanelLayout) -> ChatPanel {
        ChatPanel::new(self.client(), layout)
    }

    pub fn task_plan_generator(&self) -> DraftGenerator {
        DraftGenerator::task_plan(self.client(), self.notifier.clone())
    }

    pub fn eod_report_generator(&self) -> DraftGenerator {
        DraftGenerator::eod_report(self.client(), self.notifier.clone())
    }

    pub fn invocation(&self) -> AsyncInvocation {
        AsyncInvocation::new(self.client())
    }
}
