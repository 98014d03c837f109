//! Level Split operator: test whether the claim survives a change in the
//! level of analysis.
//!
//! A claim that is true of individuals is routinely false of groups or
//! systems (and vice versa). The operator generates one probe per level,
//! asks the researcher to assess where the claim actually holds, and can
//! emit a refined, level-scoped statement.

use serde::{Deserialize, Serialize};

use crate::error::{WorkflowError, WorkflowResult};
use crate::session::{HypothesisCard, HypothesisDraft};
use crate::workflow::{OperatorWorkflow, StepConfig};

use super::{OperatorOutcome, OperatorType};

/// Step id for the generated level probes.
pub const STEP_LEVELS: &str = "levels";
/// Step id for the per-level assessments.
pub const STEP_ASSESS: &str = "assess";
/// Step id for optional per-level implications.
pub const STEP_IMPLICATIONS: &str = "implications";
/// Step id for the final review.
pub const STEP_REVIEW: &str = "review";

/// Levels of analysis probed, from narrowest to broadest.
pub const LEVELS: &[(&str, &str)] = &[
    ("individual", "a single person or unit"),
    ("group", "a small interacting group"),
    ("population", "a whole population or market"),
    ("system", "the surrounding system over time"),
];

/// One generated level probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProbe {
    /// Level name from [`LEVELS`].
    pub level: String,
    /// Question posed to the researcher.
    pub prompt: String,
}

/// The researcher's verdict for one level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelAssessment {
    /// Level name.
    pub level: String,
    /// Whether the claim holds at this level.
    pub holds: bool,
    /// Why.
    #[serde(default)]
    pub rationale: String,
}

/// Step configuration for the Level Split workflow.
pub fn steps() -> Vec<StepConfig> {
    vec![
        StepConfig::new(STEP_LEVELS, "Review level probes")
            .with_help("Each probe restates the claim at a different level of analysis.")
            .with_is_complete(|wf| wf.generated_content.contains_key(STEP_LEVELS)),
        StepConfig::new(STEP_ASSESS, "Assess each level")
            .with_is_complete(|wf| wf.user_selections.contains_key(STEP_ASSESS)),
        StepConfig::new(STEP_IMPLICATIONS, "Capture implications").skippable(),
        StepConfig::new(STEP_REVIEW, "Review and finish"),
    ]
}

/// Generate one probe per level of analysis.
pub fn generate_level_probes(card: &HypothesisCard) -> Vec<LevelProbe> {
    LEVELS
        .iter()
        .map(|(level, gloss)| LevelProbe {
            level: (*level).to_string(),
            prompt: format!(
                "At the {} level ({}): does '{}' still hold?",
                level, gloss, card.statement
            ),
        })
        .collect()
}

/// Build a workflow seeded with level probes.
pub fn new_workflow(input: HypothesisCard) -> OperatorWorkflow {
    let probes = generate_level_probes(&input);
    let workflow = OperatorWorkflow::new(OperatorType::LevelSplit, input, steps());
    workflow.apply(crate::workflow::WorkflowAction::SetContent {
        step_id: STEP_LEVELS.to_string(),
        content: serde_json::to_value(&probes).unwrap_or_default(),
    })
}

/// Typed result of a Level Split workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSplitResult {
    /// Hypothesis the probes ran against.
    pub source_hypothesis_id: String,
    /// Per-level verdicts.
    pub assessments: Vec<LevelAssessment>,
    /// Level-scoped restatement, when the claim narrowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refined_statement: Option<String>,
}

/// Assemble the typed result from the workflow's final-step state.
pub fn build_result(workflow: &OperatorWorkflow) -> WorkflowResult<LevelSplitResult> {
    let at_final = workflow.current_step_index + 1 == workflow.steps.len();
    if !at_final && !workflow.status.is_terminal() {
        return Err(WorkflowError::NotAtFinalStep {
            current: workflow.current_step_index,
            total: workflow.steps.len(),
        });
    }

    let assessments: Vec<LevelAssessment> = workflow
        .user_selections
        .get(STEP_ASSESS)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();
    if assessments.is_empty() {
        return Err(WorkflowError::IncompleteResult {
            message: "no level assessments were recorded".to_string(),
        });
    }

    // A claim that fails at some levels narrows to the levels it survives.
    let holding: Vec<&str> = assessments
        .iter()
        .filter(|a| a.holds)
        .map(|a| a.level.as_str())
        .collect();
    let refined_statement = if !holding.is_empty() && holding.len() < assessments.len() {
        Some(format!(
            "{} (at the {} level)",
            workflow.input_hypothesis.statement,
            holding.join(" and ")
        ))
    } else {
        None
    };

    Ok(LevelSplitResult {
        source_hypothesis_id: workflow.input_hypothesis.id.clone(),
        assessments,
        refined_statement,
    })
}

impl LevelSplitResult {
    /// Convert into a mergeable operator outcome.
    pub fn into_outcome(self, workflow: &OperatorWorkflow) -> OperatorOutcome {
        let holds = self.assessments.iter().filter(|a| a.holds).count();
        let summary = format!(
            "claim holds at {} of {} levels",
            holds,
            self.assessments.len()
        );
        OperatorOutcome {
            operator_type: OperatorType::LevelSplit,
            source_hypothesis_id: self.source_hypothesis_id,
            refined: self.refined_statement.map(HypothesisDraft::new),
            competing: None,
            test_proposals: Vec::new(),
            insights: workflow.insights.clone(),
            summary,
        }
    }
}
