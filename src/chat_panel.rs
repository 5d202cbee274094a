use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use futures_util::future::{AbortHandle, Abortable};
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::error::GenerationError;
use crate::generation::{now_timestamp_ms, GenerationClient, GenerationPurpose, GenerationRequest};
use crate::invocation::{AsyncInvocation, InvocationState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: None,
        }
    }

    fn stamped(mut self, enabled: bool) -> Self {
        if enabled {
            self.timestamp = Some(now_iso8601());
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelLayout {
    /// Summary card; transcript hidden until expanded.
    Collapsed,
    Expanded,
    /// Dedicated assistant page; never collapses.
    FullScreen,
}

impl PanelLayout {
    pub fn shows_transcript(self) -> bool {
        !matches!(self, PanelLayout::Collapsed)
    }
}

/// The signed-in user the panel talks on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
        }
    }
}

/// Scroll hook for whatever renders the transcript.
pub trait TranscriptView: Send + Sync {
    fn scroll_to_bottom(&self, message_count: usize);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input, no user, or a disposed panel. Nothing changed.
    Ignored,
    Replied(String),
    /// The user turn stays in the transcript without an answer.
    Failed(GenerationError),
    /// The panel was torn down while the call was in flight.
    Disposed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelSnapshot {
    pub transcript: Vec<Message>,
    pub draft_input: String,
    pub is_loading: bool,
    pub layout: PanelLayout,
}

#[derive(Default)]
struct PanelState {
    transcript: Vec<Message>,
    draft_input: String,
    is_loading: bool,
    user: Option<UserContext>,
    in_flight: HashMap<u64, AbortHandle>,
}

pub struct ChatPanel {
    invocation: AsyncInvocation,
    layout: Mutex<PanelLayout>,
    timestamps: bool,
    view: Option<Arc<dyn TranscriptView>>,
    state: Mutex<PanelState>,
    next_call_id: AtomicU64,
    disposed: AtomicBool,
}

impl ChatPanel {
    pub fn new(client: Arc<dyn GenerationClient>, layout: PanelLayout) -> Self {
        Self {
            invocation: AsyncInvocation::new(client),
            layout: Mutex::new(layout),
            timestamps: false,
            view: None,
            state: Mutex::new(PanelState::default()),
            next_call_id: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    /// Stamp every message with an RFC 3339 time (AI-chat page variant).
    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    pub fn with_view(mut self, view: Arc<dyn TranscriptView>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn with_user(self, user: UserContext) -> Self {
        self.set_user(Some(user));
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_layout(&self) -> MutexGuard<'_, PanelLayout> {
        self.layout.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_user(&self, user: Option<UserContext>) {
        self.lock_state().user = user;
    }

    pub fn set_draft_input(&self, text: impl Into<String>) {
        self.lock_state().draft_input = text.into();
    }

    pub fn draft_input(&self) -> String {
        self.lock_state().draft_input.clone()
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.lock_state().transcript.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock_state().is_loading
    }

    pub fn invocation_state(&self) -> InvocationState {
        self.invocation.state()
    }

    pub fn layout(&self) -> PanelLayout {
        *self.lock_layout()
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        let layout = self.layout();
        let state = self.lock_state();
        PanelSnapshot {
            transcript: state.transcript.clone(),
            draft_input: state.draft_input.clone(),
            is_loading: state.is_loading,
            layout,
        }
    }

    pub fn expand(&self) {
        let mut layout = self.lock_layout();
        if *layout == PanelLayout::Collapsed {
            *layout = PanelLayout::Expanded;
        }
    }

    pub fn collapse(&self) {
        let mut layout = self.lock_layout();
        if *layout == PanelLayout::Expanded {
            *layout = PanelLayout::Collapsed;
        }
    }

    pub fn toggle(&self) {
        let mut layout = self.lock_layout();
        *layout = match *layout {
            PanelLayout::Collapsed => PanelLayout::Expanded,
            PanelLayout::Expanded => PanelLayout::Collapsed,
            PanelLayout::FullScreen => PanelLayout::FullScreen,
        };
    }

    pub fn clear_transcript(&self) {
        self.lock_state().transcript.clear();
        self.scroll_to_bottom(0);
    }

    /// Submits whatever is in the draft input.
    pub async fn submit_draft(&self) -> SubmitOutcome {
        let text = self.draft_input();
        self.submit(&text).await
    }

    /// Appends the user turn right away, then asks the assistant. On failure
    /// the user turn stays without an answer; the client has already raised
    /// the toast.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        if self.is_disposed() || text.trim().is_empty() {
            return SubmitOutcome::Ignored;
        }

        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let (abort_handle, registration) = AbortHandle::new_pair();
        let (user, message_count) = {
            let mut state = self.lock_state();
            let Some(user) = state.user.clone() else {
                return SubmitOutcome::Ignored;
            };
            state
                .transcript
                .push(Message::user(text).stamped(self.timestamps));
            state.draft_input.clear();
            state.is_loading = true;
            state.in_flight.insert(call_id, abort_handle);
            (user, state.transcript.len())
        };
        self.scroll_to_bottom(message_count);

        let request = GenerationRequest::new(build_chat_prompt(text, &user))
            .with_purpose(GenerationPurpose::Chat)
            .with_input(text)
            .with_user_id(user.user_id.clone());
        let started_at = now_timestamp_ms();
        let result = Abortable::new(self.invocation.generate(&request), registration).await;

        let mut state = self.lock_state();
        state.in_flight.remove(&call_id);
        let result = match result {
            Ok(result) if !self.is_disposed() => result,
            _ => {
                tracing::debug!(
                    request_id = %request.request_id,
                    "chat reply dropped: panel disposed"
                );
                return SubmitOutcome::Disposed;
            }
        };

        state.is_loading = false;
        match result {
            Ok(reply) => {
                state
                    .transcript
                    .push(Message::assistant(reply.clone()).stamped(self.timestamps));
                let message_count = state.transcript.len();
                drop(state);
                self.scroll_to_bottom(message_count);
                tracing::debug!(
                    request_id = %request.request_id,
                    duration_ms = (now_timestamp_ms() - started_at).max(0),
                    "chat reply appended"
                );
                SubmitOutcome::Replied(reply)
            }
            Err(err) => SubmitOutcome::Failed(err),
        }
    }

    /// Aborts in-flight calls. Nothing mutates the panel afterwards.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let handles: Vec<AbortHandle> = {
            let mut state = self.lock_state();
            state.is_loading = false;
            state.in_flight.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            handle.abort();
        }
        self.invocation.reset();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn scroll_to_bottom(&self, message_count: usize) {
        if let Some(view) = &self.view {
            view.scroll_to_bottom(message_count);
        }
    }
}

impl Drop for ChatPanel {
    fn drop(&mut self) {
        self.dispose();
    }
}

pub fn build_chat_prompt(text: &str, user: &UserContext) -> String {
    match &user.display_name {
        Some(name) => format!(
            "{text}\n\nContext: this message was sent by {name} (user id {}).",
            user.user_id
        ),
        None => format!(
            "{text}\n\nContext: this message was sent by user id {}.",
            user.user_id
        ),
    }
}

fn now_iso8601() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| format!("{}", now_timestamp_ms()))
}
