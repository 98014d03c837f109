//! Analytical operator implementations.
//!
//! Four operators probe a hypothesis from different angles:
//! - [`level_split`]: does the claim hold across levels of analysis?
//! - [`exclusion_test`]: which tests could rule the claim out?
//! - [`object_transpose`]: is the claim specific to its subject and object?
//! - [`scale_check`]: does the claimed effect survive changes of scale?
//!
//! Each operator is pure configuration consumed by the shared workflow
//! engine: a step list, generation functions over the input hypothesis,
//! and a `build_result` that assembles a typed result from the workflow's
//! content and selection maps. The engine never inspects that content.

pub mod exclusion_test;
pub mod level_split;
pub mod object_transpose;
pub mod scale_check;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SessionResult, SessionError};
use crate::session::{
    CommitTrigger, DesignedTest, EvolutionTrigger, HypothesisDraft, HypothesisRole, Session,
};
use crate::workflow::Insight;

/// The four analytical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperatorType {
    /// Split the claim across levels of analysis.
    LevelSplit,
    /// Design tests that could exclude the claim.
    ExclusionTest,
    /// Transpose the claim's subject and object.
    ObjectTranspose,
    /// Probe the claim across scales.
    ScaleCheck,
}

impl OperatorType {
    /// Get the operator name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorType::LevelSplit => "level-split",
            OperatorType::ExclusionTest => "exclusion-test",
            OperatorType::ObjectTranspose => "object-transpose",
            OperatorType::ScaleCheck => "scale-check",
        }
    }
}

impl std::fmt::Display for OperatorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OperatorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "level-split" => Ok(OperatorType::LevelSplit),
            "exclusion-test" => Ok(OperatorType::ExclusionTest),
            "object-transpose" => Ok(OperatorType::ObjectTranspose),
            "scale-check" => Ok(OperatorType::ScaleCheck),
            _ => Err(format!("Unknown operator type: {}", s)),
        }
    }
}

/// A designed test proposal carried inside an operator outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestProposal {
    /// What the test does.
    pub description: String,
    /// Design category.
    pub category: String,
    /// Discriminative power, 1-10.
    pub power: u8,
}

/// Structured result of a completed operator workflow, ready to merge
/// back into a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorOutcome {
    /// Which operator produced this.
    pub operator_type: OperatorType,
    /// The hypothesis the workflow ran against.
    pub source_hypothesis_id: String,
    /// Revised content for the source hypothesis, if the operator refined it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refined: Option<HypothesisDraft>,
    /// A new competing hypothesis, if the operator surfaced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub competing: Option<HypothesisDraft>,
    /// Discriminative tests to record against the hypothesis.
    #[serde(default)]
    pub test_proposals: Vec<TestProposal>,
    /// Insights captured during the workflow.
    #[serde(default)]
    pub insights: Vec<Insight>,
    /// One-line summary for the commit message.
    pub summary: String,
}

impl Session {
    /// Merge a completed operator workflow's outcome into the session.
    ///
    /// A refinement archives the source card and puts its next version in
    /// the same role; a competing draft joins the alternatives. Either way
    /// the lineage gains an operator-application edge and the commit log
    /// gains an operator-trigger entry. Fails before mutating if the
    /// source hypothesis is unknown.
    pub fn apply_operator_outcome(&self, outcome: OperatorOutcome) -> SessionResult<Session> {
        let source_id = outcome.source_hypothesis_id.clone();
        let Some(source_card) = self.hypothesis_cards.get(&source_id).cloned() else {
            return Err(SessionError::HypothesisNotFound {
                hypothesis_id: source_id,
            });
        };
        let source_role = self.role_of(&source_id);

        let mut next = self.clone();
        let mut test_target = source_id.clone();

        if let Some(refined) = outcome.refined {
            let mut new_card = source_card.next_version(&next.id);
            new_card.statement = refined.statement;
            if !refined.mechanism.is_empty() {
                new_card.mechanism = refined.mechanism;
            }
            for tag in refined.domain {
                new_card = new_card.with_domain_tag(tag);
            }
            if !refined.predictions_if_true.is_empty() {
                new_card.predictions_if_true = refined.predictions_if_true;
            }
            if !refined.predictions_if_false.is_empty() {
                new_card.predictions_if_false = refined.predictions_if_false;
            }
            if !refined.impossible_if_true.is_empty() {
                new_card.impossible_if_true = refined.impossible_if_true;
            }
            for assumption in refined.assumptions {
                if !new_card.assumptions.contains(&assumption) {
                    new_card.assumptions.push(assumption);
                }
            }
            if let Some(confidence) = refined.confidence {
                new_card.confidence = confidence.min(100);
            }
            let new_id = new_card.id.clone();

            next.record_evolution(
                &source_id,
                &new_id,
                format!("Refined by {} operator", outcome.operator_type),
                EvolutionTrigger::OperatorApplication,
            )?;
            next.hypothesis_cards.insert(new_id.clone(), new_card);

            // The new version takes the source's role; the source retires.
            match source_role {
                Some(HypothesisRole::Primary) => {
                    next.primary_hypothesis_id = Some(new_id.clone());
                }
                Some(HypothesisRole::Alternative) => {
                    for id in next.alternative_hypothesis_ids.iter_mut() {
                        if *id == source_id {
                            *id = new_id.clone();
                        }
                    }
                }
                _ => {
                    next.alternative_hypothesis_ids.push(new_id.clone());
                }
            }
            if !next.archived_hypothesis_ids.iter().any(|id| *id == source_id) {
                next.archived_hypothesis_ids.push(source_id.clone());
            }
            if let Some(card) = next.hypothesis_cards.get_mut(&source_id) {
                card.notes.push(format!("Superseded by {}", new_id));
            }
            test_target = new_id;
        }

        if let Some(competing) = outcome.competing {
            let seq = next.max_hypothesis_seq() + 1;
            let card = competing.into_card(&next.id, seq);
            let card_id = card.id.clone();
            next.record_evolution(
                &test_target,
                &card_id,
                format!("Raised by {} operator", outcome.operator_type),
                EvolutionTrigger::OperatorApplication,
            )?;
            next.hypothesis_cards.insert(card_id.clone(), card);
            next.alternative_hypothesis_ids.push(card_id);
        }

        for proposal in outcome.test_proposals {
            next.designed_tests.push(DesignedTest::new(
                &test_target,
                proposal.description,
                proposal.category,
                proposal.power,
            ));
        }
        next.insights.extend(outcome.insights);

        next.updated_at = chrono::Utc::now();
        info!(
            session_id = %next.id,
            operator = %outcome.operator_type,
            hypothesis_id = %test_target,
            "Operator outcome merged"
        );
        Ok(next.append_commit(
            CommitTrigger::Operator,
            format!("{}: {}", outcome.operator_type, outcome.summary),
        ))
    }
}
