//! Exclusion Test operator: design tests that could rule the claim out.
//!
//! Generates candidate discriminative tests from fixed design templates,
//! ranked by a static category-to-power table, and walks the researcher
//! through selecting the tests worth running. Selected tests merge back
//! into the session as [`crate::session::DesignedTest`] records.

use serde::{Deserialize, Serialize};

use crate::error::{WorkflowError, WorkflowResult};
use crate::session::HypothesisCard;
use crate::workflow::{OperatorWorkflow, StepConfig, StepValidation};

use super::{OperatorOutcome, OperatorType, TestProposal};

/// Step id for the generated candidate list.
pub const STEP_CANDIDATES: &str = "candidates";
/// Step id for the user's test selection.
pub const STEP_SELECT: &str = "select-tests";
/// Step id for the optional expected-outcome notes.
pub const STEP_PREDICTIONS: &str = "predictions";
/// Step id for the final review.
pub const STEP_REVIEW: &str = "review";

/// Fixed ranking of test design categories by discriminative power.
///
/// Power is how sharply a well-executed test of that design separates the
/// hypothesis from its rivals, on a 1-10 scale.
pub const TEST_POWER: &[(&str, u8)] = &[
    ("direct-manipulation", 9),
    ("natural-experiment", 8),
    ("dose-response", 7),
    ("temporal-precedence", 7),
    ("mechanism-probe", 6),
    ("cross-population", 5),
    ("correlational", 3),
];

/// A generated candidate test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTest {
    /// Design category from [`TEST_POWER`].
    pub category: String,
    /// Discriminative power from [`TEST_POWER`].
    pub power: u8,
    /// Template-filled description of the test.
    pub description: String,
}

/// Step configuration for the Exclusion Test workflow.
pub fn steps() -> Vec<StepConfig> {
    vec![
        StepConfig::new(STEP_CANDIDATES, "Review candidate tests")
            .with_help("Tests are ranked by how sharply they could exclude the hypothesis.")
            .with_is_complete(|wf| wf.generated_content.contains_key(STEP_CANDIDATES)),
        StepConfig::new(STEP_SELECT, "Select tests to design")
            .with_is_complete(|wf| wf.user_selections.contains_key(STEP_SELECT))
            .with_validate(validate_selection),
        StepConfig::new(STEP_PREDICTIONS, "Note expected outcomes").skippable(),
        StepConfig::new(STEP_REVIEW, "Review and finish"),
    ]
}

fn validate_selection(workflow: &OperatorWorkflow) -> StepValidation {
    let selected = selected_tests(workflow);
    if selected.is_empty() {
        return StepValidation::error("select at least one test");
    }
    let mut validation = StepValidation::ok();
    if selected.iter().all(|t| t.power <= 4) {
        validation = validation
            .with_warning("every selected test is low-power; consider a stronger design");
    }
    validation
}

/// Generate candidate tests for a hypothesis, ranked by power (descending).
pub fn generate_candidate_tests(card: &HypothesisCard) -> Vec<CandidateTest> {
    let statement = card.statement.as_str();
    let mechanism = if card.mechanism.is_empty() {
        "the stated mechanism"
    } else {
        card.mechanism.as_str()
    };

    TEST_POWER
        .iter()
        .map(|(category, power)| {
            let description = match *category {
                "direct-manipulation" => format!(
                    "Directly manipulate the proposed cause and observe whether the effect tracks it: {}",
                    statement
                ),
                "natural-experiment" => format!(
                    "Find a setting where the cause in '{}' varies for reasons unrelated to the outcome, and compare exposed and unexposed groups",
                    statement
                ),
                "dose-response" => format!(
                    "Vary the intensity of the proposed cause and check whether the effect in '{}' scales with it",
                    statement
                ),
                "temporal-precedence" => format!(
                    "Establish that the proposed cause reliably precedes the effect in '{}'",
                    statement
                ),
                "mechanism-probe" => format!(
                    "Block or bypass {} and check whether the effect disappears",
                    mechanism
                ),
                "cross-population" => format!(
                    "Repeat the observation behind '{}' in a population where the usual confounds are absent",
                    statement
                ),
                _ => format!(
                    "Measure covariation between the cause and effect in '{}' in observational data",
                    statement
                ),
            };
            CandidateTest {
                category: (*category).to_string(),
                power: *power,
                description,
            }
        })
        .collect()
}

/// Build a workflow seeded with generated candidates.
pub fn new_workflow(input: HypothesisCard) -> OperatorWorkflow {
    let candidates = generate_candidate_tests(&input);
    let workflow = OperatorWorkflow::new(OperatorType::ExclusionTest, input, steps());
    workflow.apply(crate::workflow::WorkflowAction::SetContent {
        step_id: STEP_CANDIDATES.to_string(),
        content: serde_json::to_value(&candidates).unwrap_or_default(),
    })
}

fn selected_tests(workflow: &OperatorWorkflow) -> Vec<CandidateTest> {
    workflow
        .user_selections
        .get(STEP_SELECT)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

/// Typed result of an Exclusion Test workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionTestResult {
    /// Hypothesis the tests target.
    pub source_hypothesis_id: String,
    /// Tests the researcher committed to designing.
    pub selected_tests: Vec<CandidateTest>,
    /// Free-form expected-outcome notes, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_outcomes: Option<String>,
}

/// Assemble the typed result from the workflow's final-step state.
///
/// Fails unless the workflow is at its final step or already completed.
pub fn build_result(workflow: &OperatorWorkflow) -> WorkflowResult<ExclusionTestResult> {
    let at_final = workflow.current_step_index + 1 == workflow.steps.len();
    if !at_final && !workflow.status.is_terminal() {
        return Err(WorkflowError::NotAtFinalStep {
            current: workflow.current_step_index,
            total: workflow.steps.len(),
        });
    }

    let selected = selected_tests(workflow);
    if selected.is_empty() {
        return Err(WorkflowError::IncompleteResult {
            message: "no tests were selected".to_string(),
        });
    }

    let expected_outcomes = workflow
        .user_selections
        .get(STEP_PREDICTIONS)
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok(ExclusionTestResult {
        source_hypothesis_id: workflow.input_hypothesis.id.clone(),
        selected_tests: selected,
        expected_outcomes,
    })
}

impl ExclusionTestResult {
    /// Convert into a mergeable operator outcome.
    pub fn into_outcome(self, workflow: &OperatorWorkflow) -> OperatorOutcome {
        let summary = format!("{} test(s) selected", self.selected_tests.len());
        OperatorOutcome {
            operator_type: OperatorType::ExclusionTest,
            source_hypothesis_id: self.source_hypothesis_id,
            refined: None,
            competing: None,
            test_proposals: self
                .selected_tests
                .into_iter()
                .map(|t| TestProposal {
                    description: t.description,
                    category: t.category,
                    power: t.power,
                })
                .collect(),
            insights: workflow.insights.clone(),
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowAction;
    use serde_json::json;

    fn card() -> HypothesisCard {
        HypothesisCard::new("sess", 1, "Caffeine improves recall")
            .with_mechanism("adenosine receptor antagonism")
    }

    #[test]
    fn test_candidates_ranked_by_power_descending() {
        let candidates = generate_candidate_tests(&card());
        assert_eq!(candidates.len(), TEST_POWER.len());
        for pair in candidates.windows(2) {
            assert!(pair[0].power >= pair[1].power);
        }
        assert_eq!(candidates[0].category, "direct-manipulation");
        assert!(candidates[0].description.contains("Caffeine improves recall"));
    }

    #[test]
    fn test_mechanism_probe_uses_card_mechanism() {
        let candidates = generate_candidate_tests(&card());
        let probe = candidates
            .iter()
            .find(|c| c.category == "mechanism-probe")
            .unwrap();
        assert!(probe.description.contains("adenosine receptor antagonism"));
    }

    #[test]
    fn test_new_workflow_seeds_candidates() {
        let wf = new_workflow(card());
        assert!(wf.generated_content.contains_key(STEP_CANDIDATES));
        assert!(wf.can_proceed_to_next().valid);
    }

    #[test]
    fn test_selection_validation() {
        let wf = new_workflow(card()).apply(WorkflowAction::NextStep);
        // No selection yet: gate fails on is_complete.
        assert!(!wf.can_proceed_to_next().valid);

        let wf = wf.apply(WorkflowAction::SetSelection {
            step_id: STEP_SELECT.to_string(),
            selection: json!([]),
        });
        // Empty selection: is_complete passes, validate rejects.
        let validation = wf.can_proceed_to_next();
        assert!(!validation.valid);
        assert!(validation.errors[0].contains("at least one"));

        let wf = wf.apply(WorkflowAction::SetSelection {
            step_id: STEP_SELECT.to_string(),
            selection: json!([{
                "category": "correlational",
                "power": 3,
                "description": "observational sweep"
            }]),
        });
        let validation = wf.can_proceed_to_next();
        assert!(validation.valid);
        assert!(!validation.warnings.is_empty());
    }

    #[test]
    fn test_build_result_requires_final_step() {
        let wf = new_workflow(card());
        let err = build_result(&wf).unwrap_err();
        assert!(matches!(err, WorkflowError::NotAtFinalStep { .. }));
    }

    #[test]
    fn test_build_result_and_outcome() {
        let wf = new_workflow(card())
            .apply(WorkflowAction::NextStep)
            .apply(WorkflowAction::SetSelection {
                step_id: STEP_SELECT.to_string(),
                selection: json!([{
                    "category": "direct-manipulation",
                    "power": 9,
                    "description": "Randomized decaf substitution"
                }]),
            })
            .apply(WorkflowAction::NextStep)
            .apply(WorkflowAction::SkipStep);
        // 4 steps: after next, next, skip we sit at the review step.
        let result = build_result(&wf).unwrap();
        assert_eq!(result.selected_tests.len(), 1);

        let outcome = result.into_outcome(&wf);
        assert_eq!(outcome.operator_type, OperatorType::ExclusionTest);
        assert_eq!(outcome.test_proposals.len(), 1);
        assert_eq!(outcome.test_proposals[0].power, 9);
    }
}
