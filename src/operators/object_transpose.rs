//! Object Transpose operator: probe whether the claim is specific to its
//! subject and object.
//!
//! Transposes the hypothesis - reversing cause and effect, substituting
//! the subject, nulling the object - and asks which transposed statements
//! are just as plausible. A transposition the researcher cannot dismiss
//! becomes a competing hypothesis in its own right.

use serde::{Deserialize, Serialize};

use crate::error::{WorkflowError, WorkflowResult};
use crate::session::{HypothesisCard, HypothesisDraft};
use crate::workflow::{OperatorWorkflow, StepConfig};

use super::{OperatorOutcome, OperatorType};

/// Step id for the generated transpositions.
pub const STEP_TRANSPOSITIONS: &str = "transpositions";
/// Step id for the user's selection.
pub const STEP_SELECT: &str = "select";
/// Step id for the final review.
pub const STEP_REVIEW: &str = "review";

/// Kind of transposition applied to the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranspositionKind {
    /// Swap the direction of causation.
    ReverseCausality,
    /// Replace the subject with a neutral stand-in.
    SubstituteSubject,
    /// Replace the object with a neutral stand-in.
    SubstituteObject,
    /// A third factor drives both sides.
    CommonCause,
}

impl std::fmt::Display for TranspositionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranspositionKind::ReverseCausality => write!(f, "reverse-causality"),
            TranspositionKind::SubstituteSubject => write!(f, "substitute-subject"),
            TranspositionKind::SubstituteObject => write!(f, "substitute-object"),
            TranspositionKind::CommonCause => write!(f, "common-cause"),
        }
    }
}

/// One generated transposition of the claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transposition {
    /// Which transform was applied.
    pub kind: TranspositionKind,
    /// The transposed statement.
    pub statement: String,
    /// Why this transposition is worth considering.
    pub rationale: String,
}

/// Step configuration for the Object Transpose workflow.
pub fn steps() -> Vec<StepConfig> {
    vec![
        StepConfig::new(STEP_TRANSPOSITIONS, "Review transposed claims")
            .with_is_complete(|wf| wf.generated_content.contains_key(STEP_TRANSPOSITIONS)),
        StepConfig::new(STEP_SELECT, "Mark transpositions you cannot dismiss")
            .with_help("An undismissable transposition is a live rival to your hypothesis.")
            .with_is_complete(|wf| wf.user_selections.contains_key(STEP_SELECT)),
        StepConfig::new(STEP_REVIEW, "Review and finish"),
    ]
}

/// Generate the transposed variants of a hypothesis statement.
pub fn generate_transpositions(card: &HypothesisCard) -> Vec<Transposition> {
    let statement = card.statement.as_str();
    vec![
        Transposition {
            kind: TranspositionKind::ReverseCausality,
            statement: format!("The causation in '{}' runs the other way", statement),
            rationale: "If the reversed claim predicts the same observations, the original \
                        direction is unestablished."
                .to_string(),
        },
        Transposition {
            kind: TranspositionKind::SubstituteSubject,
            statement: format!(
                "'{}' holds just as well with an unrelated subject in place of the original",
                statement
            ),
            rationale: "If any subject produces the effect, the named subject is incidental."
                .to_string(),
        },
        Transposition {
            kind: TranspositionKind::SubstituteObject,
            statement: format!(
                "'{}' holds just as well with an unrelated object in place of the original",
                statement
            ),
            rationale: "If any object shows the effect, the mechanism is not object-specific."
                .to_string(),
        },
        Transposition {
            kind: TranspositionKind::CommonCause,
            statement: format!("A third factor produces both sides of '{}'", statement),
            rationale: "A shared driver would produce the observed association with no direct \
                        link at all."
                .to_string(),
        },
    ]
}

/// Build a workflow seeded with transpositions.
pub fn new_workflow(input: HypothesisCard) -> OperatorWorkflow {
    let transpositions = generate_transpositions(&input);
    let workflow = OperatorWorkflow::new(OperatorType::ObjectTranspose, input, steps());
    workflow.apply(crate::workflow::WorkflowAction::SetContent {
        step_id: STEP_TRANSPOSITIONS.to_string(),
        content: serde_json::to_value(&transpositions).unwrap_or_default(),
    })
}

/// Typed result of an Object Transpose workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTransposeResult {
    /// Hypothesis the transpositions ran against.
    pub source_hypothesis_id: String,
    /// Transpositions the researcher could not dismiss.
    pub undismissed: Vec<Transposition>,
}

/// Assemble the typed result from the workflow's final-step state.
///
/// An empty selection is a legitimate outcome here: dismissing every
/// transposition is the strongest possible pass.
pub fn build_result(workflow: &OperatorWorkflow) -> WorkflowResult<ObjectTransposeResult> {
    let at_final = workflow.current_step_index + 1 == workflow.steps.len();
    if !at_final && !workflow.status.is_terminal() {
        return Err(WorkflowError::NotAtFinalStep {
            current: workflow.current_step_index,
            total: workflow.steps.len(),
        });
    }

    let undismissed: Vec<Transposition> = workflow
        .user_selections
        .get(STEP_SELECT)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();

    Ok(ObjectTransposeResult {
        source_hypothesis_id: workflow.input_hypothesis.id.clone(),
        undismissed,
    })
}

impl ObjectTransposeResult {
    /// Convert into a mergeable operator outcome. The first undismissed
    /// transposition becomes a competing hypothesis.
    pub fn into_outcome(self, workflow: &OperatorWorkflow) -> OperatorOutcome {
        let summary = if self.undismissed.is_empty() {
            "all transpositions dismissed".to_string()
        } else {
            format!("{} transposition(s) survive", self.undismissed.len())
        };
        let competing = self.undismissed.first().map(|t| {
            HypothesisDraft::new(t.statement.clone())
                .with_mechanism(format!("raised by object-transpose ({})", t.kind))
        });
        OperatorOutcome {
            operator_type: OperatorType::ObjectTranspose,
            source_hypothesis_id: self.source_hypothesis_id,
            refined: None,
            competing,
            test_proposals: Vec::new(),
            insights: workflow.insights.clone(),
            summary,
        }
    }
}
