//! Generic operator workflow engine.
//!
//! One reusable step-sequencer drives every analytical operator. An operator
//! is pure configuration: an ordered list of [`StepConfig`] descriptors plus
//! generation functions, consumed by this engine. The engine orchestrates
//! progression only; it never inspects the content of generated or selected
//! data, which is what makes a single engine sufficient for four
//! semantically different tools.
//!
//! All transitions are pure: [`OperatorWorkflow::apply`] maps (state,
//! action) to a new state with no hidden mutation.
//!
//! Contract: the engine does NOT gate `NextStep` on step completion or
//! validation. [`OperatorWorkflow::can_proceed_to_next`] is the advisory
//! check, and gating on it is the caller's responsibility. Callers that
//! invoke `NextStep` directly will mechanically advance past incomplete
//! steps; the UI layer decides whether to allow that.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::operators::OperatorType;
use crate::session::HypothesisCard;

/// Predicate over workflow state (visibility, completion).
pub type StepPredicate = fn(&OperatorWorkflow) -> bool;

/// Validation hook run before advancing past a step.
pub type StepValidator = fn(&OperatorWorkflow) -> StepValidation;

/// Static description of one workflow step.
#[derive(Debug, Clone)]
pub struct StepConfig {
    /// Opaque step identifier; keys `generated_content`/`user_selections`.
    pub id: String,
    /// Display text.
    pub title: String,
    /// Optional help text.
    pub help: Option<String>,
    /// Whether the step may be skipped.
    pub can_skip: bool,
    /// Optional visibility predicate.
    pub should_show: Option<StepPredicate>,
    /// Optional completion predicate, evaluated against content/selections.
    pub is_complete: Option<StepPredicate>,
    /// Optional validation gate, advisory only.
    pub validate: Option<StepValidator>,
}

impl StepConfig {
    /// Create a step with the given id and display text.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            help: None,
            can_skip: false,
            should_show: None,
            is_complete: None,
            validate: None,
        }
    }

    /// Set the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Allow this step to be skipped.
    pub fn skippable(mut self) -> Self {
        self.can_skip = true;
        self
    }

    /// Set the visibility predicate.
    pub fn with_should_show(mut self, predicate: StepPredicate) -> Self {
        self.should_show = Some(predicate);
        self
    }

    /// Set the completion predicate.
    pub fn with_is_complete(mut self, predicate: StepPredicate) -> Self {
        self.is_complete = Some(predicate);
        self
    }

    /// Set the validation hook.
    pub fn with_validate(mut self, validator: StepValidator) -> Self {
        self.validate = Some(validator);
        self
    }
}

/// Runtime state of one step: its config plus progression flags.
#[derive(Debug, Clone)]
pub struct StepState {
    /// Static configuration.
    pub config: StepConfig,
    /// Marked complete by `NextStep` or `Complete`.
    pub complete: bool,
    /// Marked skipped by `SkipStep`.
    pub skipped: bool,
    /// When the step was completed or skipped.
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepState {
    fn new(config: StepConfig) -> Self {
        Self {
            config,
            complete: false,
            skipped: false,
            completed_at: None,
        }
    }

    /// Whether the step counts toward progress.
    pub fn finished(&self) -> bool {
        self.complete || self.skipped
    }
}

/// Outcome of a step validation hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepValidation {
    /// Whether advancing is advisable.
    pub valid: bool,
    /// Blocking problems to show the user.
    pub errors: Vec<String>,
    /// Non-blocking observations.
    pub warnings: Vec<String>,
}

impl StepValidation {
    /// A passing validation with no messages.
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A failing validation with one error.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![message.into()],
            warnings: Vec::new(),
        }
    }

    /// Attach a warning.
    pub fn with_warning(mut self, message: impl Into<String>) -> Self {
        self.warnings.push(message.into());
        self
    }
}

/// An observation captured while working through a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    /// Unique insight identifier.
    pub id: String,
    /// Free-text category (e.g. "confound", "scope").
    pub category: String,
    /// Short title.
    pub title: String,
    /// Insight body.
    pub content: String,
    /// Step the insight was captured on.
    pub step_id: String,
    /// When the insight was recorded.
    pub created_at: DateTime<Utc>,
}

/// Workflow lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created, no action applied yet.
    #[default]
    Initializing,
    /// At least one action applied.
    InProgress,
    /// Terminal: finished normally.
    Completed,
    /// Terminal: abandoned explicitly.
    Abandoned,
}

impl WorkflowStatus {
    /// Whether the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Abandoned)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Initializing => write!(f, "initializing"),
            WorkflowStatus::InProgress => write!(f, "in_progress"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Actions accepted by [`OperatorWorkflow::apply`].
#[derive(Debug, Clone)]
pub enum WorkflowAction {
    /// Mark the current step complete and advance. No-op at the last step.
    NextStep,
    /// Step back without altering completion flags. No-op at index 0.
    PrevStep,
    /// Skip the current step if its config allows and a next step exists.
    SkipStep,
    /// Jump to an earlier (or the current) step. Forward jumps are no-ops.
    GoToStep(usize),
    /// Store system-generated content under a step id.
    SetContent {
        /// Step id key.
        step_id: String,
        /// Generated content.
        content: Value,
    },
    /// Store a user selection under a step id.
    SetSelection {
        /// Step id key.
        step_id: String,
        /// Selected content.
        selection: Value,
    },
    /// Remove a user selection.
    ClearSelection {
        /// Step id key.
        step_id: String,
    },
    /// Append an insight attributed to the current step.
    AddInsight {
        /// Free-text category.
        category: String,
        /// Short title.
        title: String,
        /// Insight body.
        content: String,
    },
    /// Back-fill unfinished steps up to the current index and finish.
    Complete,
    /// Mark the workflow abandoned.
    Abandon,
}

/// Duration summary of a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    /// Elapsed wall-clock duration in seconds.
    pub elapsed_seconds: i64,
    /// Total number of steps.
    pub steps_total: usize,
    /// Steps marked complete.
    pub steps_complete: usize,
    /// Steps marked skipped.
    pub steps_skipped: usize,
    /// Insights captured.
    pub insight_count: usize,
    /// Current status.
    pub status: WorkflowStatus,
}

/// A short-lived multi-step workflow scoped to one input hypothesis.
#[derive(Debug, Clone)]
pub struct OperatorWorkflow {
    /// Unique workflow identifier.
    pub id: String,
    /// Which operator this workflow instantiates.
    pub operator_type: OperatorType,
    /// Read-only snapshot of the hypothesis under analysis.
    pub input_hypothesis: HypothesisCard,
    /// Ordered step states.
    pub steps: Vec<StepState>,
    /// Index of the step the user is on.
    pub current_step_index: usize,
    /// System-generated content keyed by step id.
    pub generated_content: HashMap<String, Value>,
    /// User selections keyed by step id.
    pub user_selections: HashMap<String, Value>,
    /// Append-only insight list.
    pub insights: Vec<Insight>,
    /// Lifecycle status.
    pub status: WorkflowStatus,
    /// When the workflow was created.
    pub started_at: DateTime<Utc>,
    /// When the last action was applied.
    pub updated_at: DateTime<Utc>,
    /// When a terminal status was reached.
    pub completed_at: Option<DateTime<Utc>>,
}

impl OperatorWorkflow {
    /// Create a workflow over the given steps and input hypothesis.
    pub fn new(
        operator_type: OperatorType,
        input_hypothesis: HypothesisCard,
        steps: Vec<StepConfig>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            operator_type,
            input_hypothesis,
            steps: steps.into_iter().map(StepState::new).collect(),
            current_step_index: 0,
            generated_content: HashMap::new(),
            user_selections: HashMap::new(),
            insights: Vec::new(),
            status: WorkflowStatus::Initializing,
            started_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Apply an action, returning the resulting workflow state.
    ///
    /// Guarded actions that do not apply (e.g. `NextStep` at the last step)
    /// return the state unchanged apart from `updated_at`.
    pub fn apply(&self, action: WorkflowAction) -> Self {
        let mut next = self.clone();
        let now = Utc::now();
        next.updated_at = now;

        if next.status == WorkflowStatus::Initializing
            && !matches!(action, WorkflowAction::Complete | WorkflowAction::Abandon)
        {
            next.status = WorkflowStatus::InProgress;
        }

        match action {
            WorkflowAction::NextStep => {
                if next.current_step_index + 1 < next.steps.len() {
                    let step = &mut next.steps[next.current_step_index];
                    step.complete = true;
                    step.completed_at = Some(now);
                    next.current_step_index += 1;
                }
            }
            WorkflowAction::PrevStep => {
                if next.current_step_index > 0 {
                    next.current_step_index -= 1;
                }
            }
            WorkflowAction::SkipStep => {
                let has_next = next.current_step_index + 1 < next.steps.len();
                let can_skip = next
                    .steps
                    .get(next.current_step_index)
                    .map(|s| s.config.can_skip)
                    .unwrap_or(false);
                if can_skip && has_next {
                    let step = &mut next.steps[next.current_step_index];
                    step.skipped = true;
                    step.completed_at = Some(now);
                    next.current_step_index += 1;
                }
            }
            WorkflowAction::GoToStep(index) => {
                if index <= next.current_step_index {
                    next.current_step_index = index;
                } else {
                    debug!(
                        workflow_id = %next.id,
                        target = index,
                        current = next.current_step_index,
                        "Refusing forward jump"
                    );
                }
            }
            WorkflowAction::SetContent { step_id, content } => {
                next.generated_content.insert(step_id, content);
            }
            WorkflowAction::SetSelection { step_id, selection } => {
                next.user_selections.insert(step_id, selection);
            }
            WorkflowAction::ClearSelection { step_id } => {
                next.user_selections.remove(&step_id);
            }
            WorkflowAction::AddInsight {
                category,
                title,
                content,
            } => {
                let step_id = next
                    .steps
                    .get(next.current_step_index)
                    .map(|s| s.config.id.clone())
                    .unwrap_or_default();
                next.insights.push(Insight {
                    id: Uuid::new_v4().to_string(),
                    category,
                    title,
                    content,
                    step_id,
                    created_at: now,
                });
            }
            WorkflowAction::Complete => {
                for step in next.steps.iter_mut().take(next.current_step_index + 1) {
                    if !step.finished() {
                        step.complete = true;
                        step.completed_at = Some(now);
                    }
                }
                next.status = WorkflowStatus::Completed;
                next.completed_at = Some(now);
            }
            WorkflowAction::Abandon => {
                next.status = WorkflowStatus::Abandoned;
                next.completed_at = Some(now);
            }
        }

        next
    }

    /// The step the user is currently on.
    pub fn current_step(&self) -> Option<&StepState> {
        self.steps.get(self.current_step_index)
    }

    /// Advisory gate for advancing: evaluates the current step's
    /// `is_complete` predicate, then its `validate` hook.
    ///
    /// The engine itself never consults this inside `NextStep`; callers are
    /// expected to gate on it before advancing.
    pub fn can_proceed_to_next(&self) -> StepValidation {
        let Some(step) = self.current_step() else {
            return StepValidation::error("no current step");
        };

        if let Some(is_complete) = step.config.is_complete {
            if !is_complete(self) {
                return StepValidation::error(format!(
                    "step '{}' is not complete",
                    step.config.id
                ));
            }
        }

        if let Some(validate) = step.config.validate {
            return validate(self);
        }

        StepValidation::ok()
    }

    /// Whether `PrevStep` would move.
    pub fn can_go_back(&self) -> bool {
        self.current_step_index > 0
    }

    /// Whether `SkipStep` would move.
    pub fn can_skip_current(&self) -> bool {
        self.steps
            .get(self.current_step_index)
            .map(|s| s.config.can_skip)
            .unwrap_or(false)
            && self.current_step_index + 1 < self.steps.len()
    }

    /// Fraction of steps complete-or-skipped, in [0.0, 1.0].
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        let finished = self.steps.iter().filter(|s| s.finished()).count();
        finished as f64 / self.steps.len() as f64
    }

    /// Indices of steps whose `should_show` predicate passes (or is absent).
    pub fn visible_step_indices(&self) -> Vec<usize> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.config.should_show.map(|p| p(self)).unwrap_or(true))
            .map(|(i, _)| i)
            .collect()
    }

    /// Duration and progress summary. Elapsed time runs to `now` while the
    /// workflow is live and freezes at `completed_at` once terminal.
    pub fn session_summary(&self, now: DateTime<Utc>) -> WorkflowSummary {
        let end = if self.status.is_terminal() {
            self.completed_at.unwrap_or(now)
        } else {
            now
        };
        let elapsed: Duration = end - self.started_at;
        WorkflowSummary {
            elapsed_seconds: elapsed.num_seconds().max(0),
            steps_total: self.steps.len(),
            steps_complete: self.steps.iter().filter(|s| s.complete).count(),
            steps_skipped: self.steps.iter().filter(|s| s.skipped).count(),
            insight_count: self.insights.len(),
            status: self.status,
        }
    }
}
