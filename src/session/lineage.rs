//! Hypothesis lineage and competition model.
//!
//! Manages the competing hypotheses inside one session as a small evolving
//! graph with exactly one primary slot. After any sequence of operations,
//! every id in the card store holds exactly one of the three roles
//! (primary, alternative, archived). All transforms are copy-on-write and
//! raise before mutating on any precondition violation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SessionError, SessionResult};

use super::{
    CommitTrigger, EvolutionEdge, EvolutionTrigger, HypothesisCard, Session,
};

/// The role a hypothesis currently holds in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisRole {
    /// The working hypothesis.
    Primary,
    /// A live competitor.
    Alternative,
    /// Retired from active consideration.
    Archived,
}

impl std::fmt::Display for HypothesisRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HypothesisRole::Primary => write!(f, "primary"),
            HypothesisRole::Alternative => write!(f, "alternative"),
            HypothesisRole::Archived => write!(f, "archived"),
        }
    }
}

/// Field values for a hypothesis card about to be created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisDraft {
    /// The hypothesis statement.
    pub statement: String,
    /// Proposed causal mechanism.
    #[serde(default)]
    pub mechanism: String,
    /// Free-text domain tags.
    #[serde(default)]
    pub domain: Vec<String>,
    /// Observations expected if true.
    #[serde(default)]
    pub predictions_if_true: Vec<String>,
    /// Observations expected if false.
    #[serde(default)]
    pub predictions_if_false: Vec<String>,
    /// Falsification conditions.
    #[serde(default)]
    pub impossible_if_true: Vec<String>,
    /// Stated assumptions.
    #[serde(default)]
    pub assumptions: Vec<String>,
    /// Researcher confidence, 0-100.
    #[serde(default)]
    pub confidence: Option<u8>,
}

impl HypothesisDraft {
    /// Create a draft with just a statement.
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            ..Default::default()
        }
    }

    /// Set the mechanism.
    pub fn with_mechanism(mut self, mechanism: impl Into<String>) -> Self {
        self.mechanism = mechanism.into();
        self
    }

    /// Set the confidence.
    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = Some(confidence.min(100));
        self
    }

    /// Add a domain tag.
    pub fn with_domain_tag(mut self, tag: impl Into<String>) -> Self {
        self.domain.push(tag.into());
        self
    }

    /// Add an if-true prediction.
    pub fn with_prediction_if_true(mut self, text: impl Into<String>) -> Self {
        self.predictions_if_true.push(text.into());
        self
    }

    /// Materialize the draft into a card under the given id parts.
    pub(crate) fn into_card(self, session_id: &str, seq: u32) -> HypothesisCard {
        let mut card = HypothesisCard::new(session_id, seq, self.statement);
        card.mechanism = self.mechanism;
        for tag in self.domain {
            card = card.with_domain_tag(tag);
        }
        card.predictions_if_true = self.predictions_if_true;
        card.predictions_if_false = self.predictions_if_false;
        card.impossible_if_true = self.impossible_if_true;
        card.assumptions = self.assumptions;
        if let Some(confidence) = self.confidence {
            card.confidence = confidence.min(100);
        }
        card
    }
}

/// Lineage neighborhood of one hypothesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedHypotheses {
    /// Ids with an edge pointing *to* the hypothesis.
    pub ancestors: Vec<String>,
    /// Ids with an edge pointing *from* the hypothesis.
    pub descendants: Vec<String>,
    /// The other active hypotheses, computed from current roles.
    pub siblings: Vec<String>,
}

impl Session {
    /// Role currently held by a hypothesis id, if any.
    pub fn role_of(&self, hypothesis_id: &str) -> Option<HypothesisRole> {
        if self.primary_hypothesis_id.as_deref() == Some(hypothesis_id) {
            Some(HypothesisRole::Primary)
        } else if self
            .alternative_hypothesis_ids
            .iter()
            .any(|id| id == hypothesis_id)
        {
            Some(HypothesisRole::Alternative)
        } else if self
            .archived_hypothesis_ids
            .iter()
            .any(|id| id == hypothesis_id)
        {
            Some(HypothesisRole::Archived)
        } else {
            None
        }
    }

    fn require_card(&self, hypothesis_id: &str) -> SessionResult<&HypothesisCard> {
        self.hypothesis_cards
            .get(hypothesis_id)
            .ok_or_else(|| SessionError::HypothesisNotFound {
                hypothesis_id: hypothesis_id.to_string(),
            })
    }

    /// Append an evolution edge, refusing edges that would create a cycle.
    pub(crate) fn record_evolution(
        &mut self,
        from: &str,
        to: &str,
        reason: impl Into<String>,
        trigger: EvolutionTrigger,
    ) -> SessionResult<EvolutionEdge> {
        // A cycle would form iff `to` is already an ancestor of `from`.
        if to == from || self.ancestor_set(from).contains(&to.to_string()) {
            return Err(SessionError::EvolutionCycle {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let edge = EvolutionEdge {
            from_version_id: from.to_string(),
            to_version_id: to.to_string(),
            reason: reason.into(),
            trigger,
            timestamp: Utc::now(),
        };
        self.hypothesis_evolution.push(edge.clone());
        Ok(edge)
    }

    /// Add a hypothesis to the session: becomes primary if the primary
    /// slot is empty, otherwise joins the alternatives.
    pub fn add_hypothesis(&self, draft: HypothesisDraft) -> SessionResult<Session> {
        let mut next = self.clone();
        let seq = next.max_hypothesis_seq() + 1;
        let card = draft.into_card(&next.id, seq);
        let card_id = card.id.clone();
        next.hypothesis_cards.insert(card_id.clone(), card);
        if next.primary_hypothesis_id.is_none() {
            next.primary_hypothesis_id = Some(card_id.clone());
        } else {
            next.alternative_hypothesis_ids.push(card_id.clone());
        }
        next.updated_at = Utc::now();
        info!(session_id = %next.id, hypothesis_id = %card_id, "Hypothesis added");
        Ok(next.append_commit(CommitTrigger::Manual, format!("Hypothesis added: {}", card_id)))
    }

    /// Promote a hypothesis to the primary slot.
    ///
    /// The displaced primary (if any) moves to the front of the
    /// alternatives. No-op if the id is already primary.
    pub fn set_primary_hypothesis(&self, hypothesis_id: &str) -> SessionResult<Session> {
        self.require_card(hypothesis_id)?;
        match self.role_of(hypothesis_id) {
            Some(HypothesisRole::Archived) => {
                return Err(SessionError::HypothesisArchived {
                    hypothesis_id: hypothesis_id.to_string(),
                })
            }
            Some(HypothesisRole::Primary) => return Ok(self.clone()),
            _ => {}
        }

        let mut next = self.clone();
        next.alternative_hypothesis_ids
            .retain(|id| id != hypothesis_id);
        if let Some(old_primary) = next.primary_hypothesis_id.take() {
            next.alternative_hypothesis_ids.insert(0, old_primary);
        }
        next.primary_hypothesis_id = Some(hypothesis_id.to_string());
        next.updated_at = Utc::now();
        Ok(next.append_commit(
            CommitTrigger::Manual,
            format!("Primary hypothesis: {}", hypothesis_id),
        ))
    }

    /// Create a new hypothesis competing with an existing one.
    ///
    /// Allocates the next sequence number, appends the card to the
    /// alternatives, and records a manual-trigger evolution edge from the
    /// challenged hypothesis to the new one.
    pub fn add_competing_hypothesis(
        &self,
        competing_with: &str,
        draft: HypothesisDraft,
    ) -> SessionResult<(Session, HypothesisCard, EvolutionEdge)> {
        self.require_card(competing_with)?;

        let mut next = self.clone();
        let seq = next.max_hypothesis_seq() + 1;
        let card = draft.into_card(&next.id, seq);
        let card_id = card.id.clone();

        next.hypothesis_cards.insert(card_id.clone(), card.clone());
        next.alternative_hypothesis_ids.push(card_id.clone());
        let edge = next.record_evolution(
            competing_with,
            &card_id,
            format!("Competing hypothesis raised against {}", competing_with),
            EvolutionTrigger::Manual,
        )?;
        next.updated_at = Utc::now();

        debug!(
            session_id = %next.id,
            competing_with,
            new_hypothesis = %card_id,
            "Competing hypothesis added"
        );
        let next = next.append_commit(
            CommitTrigger::Manual,
            format!("Competing hypothesis: {} vs {}", card_id, competing_with),
        );
        Ok((next, card, edge))
    }

    /// Declare a competition winner.
    ///
    /// The loser receives a supersession note and is archived; an
    /// evidence-trigger edge `loser -> winner` is recorded. If the loser
    /// held the primary slot the winner is promoted into it; either way
    /// the winner ends up primary or among the alternatives.
    pub fn resolve_competition(
        &self,
        winner_id: &str,
        loser_id: &str,
        reason: &str,
    ) -> SessionResult<Session> {
        self.require_card(winner_id)?;
        self.require_card(loser_id)?;
        if self.role_of(loser_id) == Some(HypothesisRole::Archived) {
            return Err(SessionError::HypothesisArchived {
                hypothesis_id: loser_id.to_string(),
            });
        }

        let loser_was_primary = self.role_of(loser_id) == Some(HypothesisRole::Primary);

        let mut next = self.clone();
        // When the winner is already an ancestor of the loser the lineage
        // records the relation and a supersession edge would close a loop;
        // the edge list must stay acyclic, so it is skipped in that case.
        match next.record_evolution(
            loser_id,
            winner_id,
            format!("Superseded by {}: {}", winner_id, reason),
            EvolutionTrigger::Evidence,
        ) {
            Ok(_) | Err(SessionError::EvolutionCycle { .. }) => {}
            Err(e) => return Err(e),
        }

        // Supersession note is additive; the loser's substantive fields
        // stay intact.
        if let Some(card) = next.hypothesis_cards.get_mut(loser_id) {
            card.notes
                .push(format!("Superseded by {}: {}", winner_id, reason));
            card.updated_at = Utc::now();
        }

        // Loser always ends up archived.
        next.alternative_hypothesis_ids.retain(|id| id != loser_id);
        if next.primary_hypothesis_id.as_deref() == Some(loser_id) {
            next.primary_hypothesis_id = None;
        }
        if !next.archived_hypothesis_ids.iter().any(|id| id == loser_id) {
            next.archived_hypothesis_ids.push(loser_id.to_string());
        }

        // Winner ends up primary or alternative, never orphaned.
        next.archived_hypothesis_ids.retain(|id| id != winner_id);
        if loser_was_primary {
            next.alternative_hypothesis_ids.retain(|id| id != winner_id);
            next.primary_hypothesis_id = Some(winner_id.to_string());
        } else if next.primary_hypothesis_id.as_deref() != Some(winner_id)
            && !next
                .alternative_hypothesis_ids
                .iter()
                .any(|id| id == winner_id)
        {
            next.alternative_hypothesis_ids.push(winner_id.to_string());
        }

        next.updated_at = Utc::now();
        info!(
            session_id = %next.id,
            winner = winner_id,
            loser = loser_id,
            "Competition resolved"
        );
        Ok(next.append_commit(
            CommitTrigger::Evidence,
            format!("Competition resolved: {} over {}", winner_id, loser_id),
        ))
    }

    /// Archive a hypothesis.
    ///
    /// Refuses to archive the sole remaining active hypothesis. When the
    /// primary is archived, the first alternative is promoted.
    pub fn archive_hypothesis(&self, hypothesis_id: &str, reason: &str) -> SessionResult<Session> {
        self.require_card(hypothesis_id)?;
        let role = self.role_of(hypothesis_id);
        if role == Some(HypothesisRole::Archived) {
            return Err(SessionError::HypothesisArchived {
                hypothesis_id: hypothesis_id.to_string(),
            });
        }
        if role == Some(HypothesisRole::Primary) && self.alternative_hypothesis_ids.is_empty() {
            return Err(SessionError::SoleActiveHypothesis {
                hypothesis_id: hypothesis_id.to_string(),
            });
        }

        let mut next = self.clone();
        if next.primary_hypothesis_id.as_deref() == Some(hypothesis_id) {
            // Guard above guarantees an alternative exists.
            let promoted = next.alternative_hypothesis_ids.remove(0);
            next.primary_hypothesis_id = Some(promoted);
        } else {
            next.alternative_hypothesis_ids
                .retain(|id| id != hypothesis_id);
        }
        next.archived_hypothesis_ids.push(hypothesis_id.to_string());
        if let Some(card) = next.hypothesis_cards.get_mut(hypothesis_id) {
            card.notes.push(format!("Archived: {}", reason));
            card.updated_at = Utc::now();
        }
        next.updated_at = Utc::now();
        Ok(next.append_commit(
            CommitTrigger::Manual,
            format!("Hypothesis archived: {}", hypothesis_id),
        ))
    }

    /// Bring an archived hypothesis back as an alternative.
    pub fn restore_hypothesis(&self, hypothesis_id: &str) -> SessionResult<Session> {
        self.require_card(hypothesis_id)?;
        if self.role_of(hypothesis_id) != Some(HypothesisRole::Archived) {
            return Err(SessionError::HypothesisNotArchived {
                hypothesis_id: hypothesis_id.to_string(),
            });
        }

        let mut next = self.clone();
        next.archived_hypothesis_ids
            .retain(|id| id != hypothesis_id);
        next.alternative_hypothesis_ids
            .push(hypothesis_id.to_string());
        if let Some(card) = next.hypothesis_cards.get_mut(hypothesis_id) {
            card.notes.push("Restored from archive".to_string());
            card.updated_at = Utc::now();
        }
        next.updated_at = Utc::now();
        Ok(next.append_commit(
            CommitTrigger::Manual,
            format!("Hypothesis restored: {}", hypothesis_id),
        ))
    }

    /// Direct lineage neighborhood plus role-based siblings.
    pub fn related_hypotheses(&self, hypothesis_id: &str) -> SessionResult<RelatedHypotheses> {
        self.require_card(hypothesis_id)?;
        let ancestors = self
            .hypothesis_evolution
            .iter()
            .filter(|e| e.to_version_id == hypothesis_id)
            .map(|e| e.from_version_id.clone())
            .collect();
        let descendants = self
            .hypothesis_evolution
            .iter()
            .filter(|e| e.from_version_id == hypothesis_id)
            .map(|e| e.to_version_id.clone())
            .collect();
        let siblings = self
            .active_hypothesis_ids()
            .into_iter()
            .filter(|id| id != hypothesis_id)
            .collect();
        Ok(RelatedHypotheses {
            ancestors,
            descendants,
            siblings,
        })
    }

    /// Walk edges backward from `hypothesis_id` to its root, following the
    /// first matching incoming edge each step. Returns ids ordered
    /// root-first, ending with the given id.
    pub fn evolution_chain(&self, hypothesis_id: &str) -> SessionResult<Vec<String>> {
        self.require_card(hypothesis_id)?;
        let mut chain = vec![hypothesis_id.to_string()];
        let mut visited = std::collections::HashSet::new();
        visited.insert(hypothesis_id.to_string());

        let mut current = hypothesis_id.to_string();
        while let Some(edge) = self
            .hypothesis_evolution
            .iter()
            .find(|e| e.to_version_id == current)
        {
            if !visited.insert(edge.from_version_id.clone()) {
                break; // corrupted (cyclic) edge list
            }
            current = edge.from_version_id.clone();
            chain.push(current.clone());
        }
        chain.reverse();
        Ok(chain)
    }

    /// All ids reachable backwards from `hypothesis_id` over any incoming
    /// edge (the full ancestor set, not just the first-edge chain).
    fn ancestor_set(&self, hypothesis_id: &str) -> Vec<String> {
        let mut ancestors = Vec::new();
        let mut frontier = vec![hypothesis_id.to_string()];
        let mut visited = std::collections::HashSet::new();
        visited.insert(hypothesis_id.to_string());

        while let Some(current) = frontier.pop() {
            for edge in self
                .hypothesis_evolution
                .iter()
                .filter(|e| e.to_version_id == current)
            {
                if visited.insert(edge.from_version_id.clone()) {
                    ancestors.push(edge.from_version_id.clone());
                    frontier.push(edge.from_version_id.clone());
                }
            }
        }
        ancestors
    }

    /// Earliest shared lineage point of two hypotheses: intersect one
    /// side's full ancestor set with the other's root-first chain and
    /// return the first shared id walking forward from the root.
    pub fn find_common_ancestor(&self, a: &str, b: &str) -> SessionResult<Option<String>> {
        self.require_card(a)?;
        self.require_card(b)?;

        let mut a_lineage: std::collections::HashSet<String> =
            self.ancestor_set(a).into_iter().collect();
        a_lineage.insert(a.to_string());

        let b_chain = self.evolution_chain(b)?;
        Ok(b_chain.into_iter().find(|id| a_lineage.contains(id)))
    }
}
