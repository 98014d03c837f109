//! Scale Check operator: probe whether the claimed effect survives changes
//! of scale - time horizon, magnitude, population size, duration.
//!
//! Each surviving scale widens the claim's reach; each failing scale is a
//! boundary condition worth writing down as an explicit assumption.

use serde::{Deserialize, Serialize};

use crate::error::{WorkflowError, WorkflowResult};
use crate::session::{HypothesisCard, HypothesisDraft};
use crate::workflow::{OperatorWorkflow, StepConfig};

use super::{OperatorOutcome, OperatorType};

/// Step id for the generated scale probes.
pub const STEP_SCALES: &str = "scales";
/// Step id for the per-scale assessments.
pub const STEP_ASSESS: &str = "assess";
/// Step id for the final review.
pub const STEP_REVIEW: &str = "review";

/// Scale dimensions probed.
pub const SCALE_DIMENSIONS: &[(&str, &str)] = &[
    ("time-horizon", "minutes versus months"),
    ("magnitude", "a small push versus a large one"),
    ("population-size", "ten cases versus ten thousand"),
    ("duration", "one exposure versus sustained exposure"),
];

/// One generated scale probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleProbe {
    /// Dimension name from [`SCALE_DIMENSIONS`].
    pub dimension: String,
    /// Question posed to the researcher.
    pub prompt: String,
}

/// The researcher's verdict for one scale dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleAssessment {
    /// Dimension name.
    pub dimension: String,
    /// Whether the effect survives across this dimension.
    pub survives: bool,
    /// Boundary condition when it does not.
    #[serde(default)]
    pub boundary: String,
}

/// Step configuration for the Scale Check workflow.
pub fn steps() -> Vec<StepConfig> {
    vec![
        StepConfig::new(STEP_SCALES, "Review scale probes")
            .with_is_complete(|wf| wf.generated_content.contains_key(STEP_SCALES)),
        StepConfig::new(STEP_ASSESS, "Assess each scale")
            .with_is_complete(|wf| wf.user_selections.contains_key(STEP_ASSESS)),
        StepConfig::new(STEP_REVIEW, "Review and finish"),
    ]
}

/// Generate one probe per scale dimension.
pub fn generate_scale_probes(card: &HypothesisCard) -> Vec<ScaleProbe> {
    SCALE_DIMENSIONS
        .iter()
        .map(|(dimension, gloss)| ScaleProbe {
            dimension: (*dimension).to_string(),
            prompt: format!(
                "Across {} ({}): does the effect in '{}' persist?",
                dimension, gloss, card.statement
            ),
        })
        .collect()
}

/// Build a workflow seeded with scale probes.
pub fn new_workflow(input: HypothesisCard) -> OperatorWorkflow {
    let probes = generate_scale_probes(&input);
    let workflow = OperatorWorkflow::new(OperatorType::ScaleCheck, input, steps());
    workflow.apply(crate::workflow::WorkflowAction::SetContent {
        step_id: STEP_SCALES.to_string(),
        content: serde_json::to_value(&probes).unwrap_or_default(),
    })
}

/// Typed result of a Scale Check workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleCheckResult {
    /// Hypothesis the probes ran against.
    pub source_hypothesis_id: String,
    /// Per-dimension verdicts.
    pub assessments: Vec<ScaleAssessment>,
    /// Boundary conditions harvested from failing dimensions.
    pub boundary_conditions: Vec<String>,
}

/// Assemble the typed result from the workflow's final-step state.
pub fn build_result(workflow: &OperatorWorkflow) -> WorkflowResult<ScaleCheckResult> {
    let at_final = workflow.current_step_index + 1 == workflow.steps.len();
    if !at_final && !workflow.status.is_terminal() {
        return Err(WorkflowError::NotAtFinalStep {
            current: workflow.current_step_index,
            total: workflow.steps.len(),
        });
    }

    let assessments: Vec<ScaleAssessment> = workflow
        .user_selections
        .get(STEP_ASSESS)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();
    if assessments.is_empty() {
        return Err(WorkflowError::IncompleteResult {
            message: "no scale assessments were recorded".to_string(),
        });
    }

    let boundary_conditions = assessments
        .iter()
        .filter(|a| !a.survives && !a.boundary.is_empty())
        .map(|a| format!("{}: {}", a.dimension, a.boundary))
        .collect();

    Ok(ScaleCheckResult {
        source_hypothesis_id: workflow.input_hypothesis.id.clone(),
        assessments,
        boundary_conditions,
    })
}

impl ScaleCheckResult {
    /// Convert into a mergeable operator outcome. Boundary conditions
    /// become explicit assumptions on a refined card.
    pub fn into_outcome(self, workflow: &OperatorWorkflow) -> OperatorOutcome {
        let surviving = self.assessments.iter().filter(|a| a.survives).count();
        let summary = format!(
            "effect survives {} of {} scale dimensions",
            surviving,
            self.assessments.len()
        );

        // Only refine when there is something new to pin down.
        let refined = if self.boundary_conditions.is_empty() {
            None
        } else {
            let mut draft = HypothesisDraft::new(workflow.input_hypothesis.statement.clone());
            draft.mechanism = workflow.input_hypothesis.mechanism.clone();
            draft.assumptions = self.boundary_conditions.clone();
            Some(draft)
        };

        let mut outcome = OperatorOutcome {
            operator_type: OperatorType::ScaleCheck,
            source_hypothesis_id: self.source_hypothesis_id,
            refined,
            competing: None,
            test_proposals: Vec::new(),
            insights: workflow.insights.clone(),
            summary,
        };
        // Boundary conditions ride along as insights so they reach the
        // session even without a refinement.
        for boundary in &self.boundary_conditions {
            outcome.insights.push(crate::workflow::Insight {
                id: uuid::Uuid::new_v4().to_string(),
                category: "boundary-condition".to_string(),
                title: "Scale boundary".to_string(),
                content: boundary.clone(),
                step_id: STEP_ASSESS.to_string(),
                created_at: chrono::Utc::now(),
            });
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowAction;
    use serde_json::json;

    fn card() -> HypothesisCard {
        HypothesisCard::new("sess", 1, "Price cuts raise total revenue")
    }

    fn assessed_workflow() -> OperatorWorkflow {
        new_workflow(card())
            .apply(WorkflowAction::NextStep)
            .apply(WorkflowAction::SetSelection {
                step_id: STEP_ASSESS.to_string(),
                selection: json!([
                    {"dimension": "time-horizon", "survives": false,
                     "boundary": "competitors match the cut within a quarter"},
                    {"dimension": "magnitude", "survives": true, "boundary": ""},
                    {"dimension": "population-size", "survives": true, "boundary": ""},
                    {"dimension": "duration", "survives": false,
                     "boundary": "reference prices reset under sustained discounts"}
                ]),
            })
            .apply(WorkflowAction::NextStep)
    }

    #[test]
    fn test_probes_cover_all_dimensions() {
        let probes = generate_scale_probes(&card());
        assert_eq!(probes.len(), SCALE_DIMENSIONS.len());
        assert!(probes[0].prompt.contains("time-horizon"));
    }

    #[test]
    fn test_boundary_conditions_harvested_from_failures() {
        let result = build_result(&assessed_workflow()).unwrap();
        assert_eq!(result.boundary_conditions.len(), 2);
        assert!(result.boundary_conditions[0].contains("time-horizon"));
    }

    #[test]
    fn test_outcome_carries_boundaries_as_insights() {
        let wf = assessed_workflow();
        let outcome = build_result(&wf).unwrap().into_outcome(&wf);
        assert!(outcome.summary.contains("2 of 4"));
        let boundary_insights = outcome
            .insights
            .iter()
            .filter(|i| i.category == "boundary-condition")
            .count();
        assert_eq!(boundary_insights, 2);
        assert!(outcome.refined.is_some());
    }

    #[test]
    fn test_clean_survival_leaves_card_untouched() {
        let wf = new_workflow(card())
            .apply(WorkflowAction::NextStep)
            .apply(WorkflowAction::SetSelection {
                step_id: STEP_ASSESS.to_string(),
                selection: json!([
                    {"dimension": "magnitude", "survives": true, "boundary": ""}
                ]),
            })
            .apply(WorkflowAction::NextStep);
        let outcome = build_result(&wf).unwrap().into_outcome(&wf);
        assert!(outcome.refined.is_none());
        assert!(outcome.insights.is_empty());
    }
}
