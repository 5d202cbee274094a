//! Task-plan and EOD-report generation.
//!
//! Both take a block of free text plus team/date context, turn it into one
//! prompt and write the reply into a single editable draft. A successful
//! generation replaces the draft; a failed one leaves it alone.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use futures_util::future::{AbortHandle, Abortable};
use serde::{Deserialize, Serialize};

use crate::error::DraftError;
use crate::generation::{GenerationClient, GenerationPurpose, GenerationRequest};
use crate::invocation::{AsyncInvocation, InvocationState};
use crate::notifications::{Notification, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftKind {
    TaskPlan,
    EodReport,
}

impl DraftKind {
    pub fn purpose(self) -> GenerationPurpose {
        match self {
            DraftKind::TaskPlan => GenerationPurpose::TaskPlan,
            DraftKind::EodReport => GenerationPurpose::EodReport,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DraftKind::TaskPlan => "task plan",
            DraftKind::EodReport => "EOD report",
        }
    }

    fn empty_input_message(self) -> &'static str {
        match self {
            DraftKind::TaskPlan => "Describe the requirements before generating a task plan.",
            DraftKind::EodReport => "Add at least one activity before generating your EOD report.",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    /// Report or planning date as shown in the dashboard, e.g. `2024-05-14`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftSnapshot {
    pub kind: DraftKind,
    pub input: String,
    pub draft: String,
    pub is_generating: bool,
}

#[derive(Default)]
struct DraftState {
    input: String,
    draft: String,
    is_generating: bool,
    context: DraftContext,
    in_flight: Option<AbortHandle>,
}

pub struct DraftGenerator {
    kind: DraftKind,
    invocation: AsyncInvocation,
    notifier: Notifier,
    state: Mutex<DraftState>,
    disposed: AtomicBool,
}

impl DraftGenerator {
    pub fn new(kind: DraftKind, client: Arc<dyn GenerationClient>, notifier: Notifier) -> Self {
        Self {
            kind,
            invocation: AsyncInvocation::new(client),
            notifier,
            state: Mutex::new(DraftState::default()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn task_plan(client: Arc<dyn GenerationClient>, notifier: Notifier) -> Self {
        Self::new(DraftKind::TaskPlan, client, notifier)
    }

    pub fn eod_report(client: Arc<dyn GenerationClient>, notifier: Notifier) -> Self {
        Self::new(DraftKind::EodReport, client, notifier)
    }

    pub fn with_context(self, context: DraftContext) -> Self {
        self.set_context(context);
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, DraftState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn kind(&self) -> DraftKind {
        self.kind
    }

    pub fn set_context(&self, context: DraftContext) {
        self.lock_state().context = context;
    }

    pub fn set_input(&self, input: impl Into<String>) {
        self.lock_state().input = input.into();
    }

    /// Hand edits to the generated text.
    pub fn set_draft(&self, draft: impl Into<String>) {
        self.lock_state().draft = draft.into();
    }

    pub fn clear_draft(&self) {
        self.lock_state().draft.clear();
    }

    pub fn draft(&self) -> String {
        self.lock_state().draft.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.lock_state().is_generating
    }

    pub fn invocation_state(&self) -> InvocationState {
        self.invocation.state()
    }

    pub fn snapshot(&self) -> DraftSnapshot {
        let state = self.lock_state();
        DraftSnapshot {
            kind: self.kind,
            input: state.input.clone(),
            draft: state.draft.clone(),
            is_generating: state.is_generating,
        }
    }

    pub async fn generate(&self) -> Result<String, DraftError> {
        if self.is_disposed() {
            return Err(DraftError::Disposed);
        }

        let (abort_handle, registration) = AbortHandle::new_pair();
        let request = {
            let mut state = self.lock_state();
            if state.input.trim().is_empty() {
                drop(state);
                let message = self.kind.empty_input_message();
                self.notifier.notify(Notification::validation(message));
                return Err(DraftError::Validation(message.to_string()));
            }
            state.is_generating = true;
            state.in_flight = Some(abort_handle);
            build_request(self.kind, &state.input, &state.context)
        };

        let result = Abortable::new(self.invocation.generate(&request), registration).await;

        let mut state = self.lock_state();
        let result = match result {
            Ok(result) if !self.is_disposed() => result,
            _ => return Err(DraftError::Disposed),
        };
        state.is_generating = false;
        state.in_flight = None;

        let text = result?;
        state.draft = text.clone();
        drop(state);
        self.notifier.notify(Notification::generated(format!(
            "{} generated. Review and edit before submitting.",
            capitalize(self.kind.label())
        )));
        Ok(text)
    }

    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let handle = {
            let mut state = self.lock_state();
            state.is_generating = false;
            state.in_flight.take()
        };
        if let Some(handle) = handle {
            handle.abort();
        }
        self.invocation.reset();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for DraftGenerator {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn build_request(kind: DraftKind, input: &str, context: &DraftContext) -> GenerationRequest {
    let prompt = match kind {
        DraftKind::TaskPlan => build_task_plan_prompt(input, context),
        DraftKind::EodReport => build_eod_report_prompt(input, context),
    };
    let mut request = GenerationRequest::new(prompt)
        .with_purpose(kind.purpose())
        .with_input(input);
    if let Some(user_id) = &context.user_id {
        request = request.with_user_id(user_id.clone());
    }
    request
}

/// Non-empty, trimmed lines as a markdown bullet list.
fn bullet_lines(input: &str) -> String {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("- {}", line.trim_start_matches(['-', '*', '•']).trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn context_lines(context: &DraftContext) -> String {
    let mut lines = Vec::new();
    if let Some(name) = &context.user_name {
        lines.push(format!("Employee: {name}"));
    }
    match (&context.team_name, &context.team_id) {
        (Some(name), Some(id)) => lines.push(format!("Team: {name} ({id})")),
        (Some(name), None) => lines.push(format!("Team: {name}")),
        (None, Some(id)) => lines.push(format!("Team: {id}")),
        (None, None) => {}
    }
    if let Some(date) = &context.date {
        lines.push(format!("Date: {date}"));
    }
    lines.join("\n")
}

pub fn build_eod_report_prompt(activities: &str, context: &DraftContext) -> String {
    let mut prompt = String::from(
        "Write a concise end-of-day report from the activities below. \
         Use a numbered list of completed work, then short sections for blockers \
         and plans for tomorrow if the activities mention them. \
         Do not invent work that is not listed.\n",
    );
    let context = context_lines(context);
    if !context.is_empty() {
        prompt.push('\n');
        prompt.push_str(&context);
        prompt.push('\n');
    }
    prompt.push_str("\nActivities:\n");
    prompt.push_str(&bullet_lines(activities));
    prompt
}

pub fn build_task_plan_prompt(requirements: &str, context: &DraftContext) -> String {
    let mut prompt = String::from(
        "Break the requirements below into a task plan for the team. \
         For each task give a title, a one-line description, a priority \
         (high, medium or low) and a rough estimate in hours. \
         Answer in markdown.\n",
    );
    let context = context_lines(context);
    if !context.is_empty() {
        prompt.push('\n');
        prompt.push_str(&context);
        prompt.push('\n');
    }
    prompt.push_str("\nRequirements:\n");
    prompt.push_str(requirements.trim());
    prompt
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
