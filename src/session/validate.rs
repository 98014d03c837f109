//! Invariant re-validation for decoded session payloads.
//!
//! Import paths must not trust the file: every structural invariant is
//! re-checked here. Recoverable defects (dangling back-references, stale
//! schema versions) surface as warnings; structurally unrecoverable
//! payloads (missing identifying fields, broken commit chains) surface as
//! fatal errors.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Session;

/// Outcome of re-validating a decoded session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionValidation {
    /// Recoverable defects; the session is usable after defaulting.
    pub warnings: Vec<String>,
    /// Structurally unrecoverable defects.
    pub errors: Vec<String>,
}

impl SessionValidation {
    /// Whether the payload must be rejected.
    pub fn is_fatal(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether the payload passed with no findings at all.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Re-check every structural invariant of a decoded session.
pub fn validate_session(session: &Session) -> SessionValidation {
    let mut validation = SessionValidation::default();

    if session.id.is_empty() {
        validation.error("session id is missing");
    }

    if session.schema_version != super::SCHEMA_VERSION {
        validation.warn(format!(
            "schema version {} differs from current {}",
            session.schema_version,
            super::SCHEMA_VERSION
        ));
    }

    // Role back-references must point at owned cards.
    if let Some(primary) = &session.primary_hypothesis_id {
        if !session.hypothesis_cards.contains_key(primary) {
            validation.error(format!("primary hypothesis {} has no card", primary));
        }
    }
    for id in &session.alternative_hypothesis_ids {
        if !session.hypothesis_cards.contains_key(id) {
            validation.warn(format!("alternative hypothesis {} has no card", id));
        }
    }
    for id in &session.archived_hypothesis_ids {
        if !session.hypothesis_cards.contains_key(id) {
            validation.warn(format!("archived hypothesis {} has no card", id));
        }
    }

    // No id may hold two roles at once, and every card must hold one.
    for id in session.hypothesis_cards.keys() {
        let mut roles = 0usize;
        if session.primary_hypothesis_id.as_deref() == Some(id.as_str()) {
            roles += 1;
        }
        roles += session
            .alternative_hypothesis_ids
            .iter()
            .filter(|i| *i == id)
            .count();
        roles += session
            .archived_hypothesis_ids
            .iter()
            .filter(|i| *i == id)
            .count();
        match roles {
            0 => validation.warn(format!("hypothesis {} holds no role", id)),
            1 => {}
            n => validation.warn(format!("hypothesis {} holds {} roles", id, n)),
        }
    }

    // Evolution edges must reference owned cards and stay acyclic.
    for edge in &session.hypothesis_evolution {
        if !session.hypothesis_cards.contains_key(&edge.from_version_id) {
            validation.warn(format!(
                "evolution edge references unknown source {}",
                edge.from_version_id
            ));
        }
        if !session.hypothesis_cards.contains_key(&edge.to_version_id) {
            validation.warn(format!(
                "evolution edge references unknown target {}",
                edge.to_version_id
            ));
        }
    }
    if has_evolution_cycle(session) {
        validation.error("evolution graph contains a cycle");
    }

    // The commit chain must reach the root from the head without cycles.
    if session.commits.is_empty() {
        validation.warn("session has no commits");
    } else {
        match session.verify_commit_chain() {
            Ok(_) => {}
            Err(e) => validation.error(format!("commit chain invalid: {}", e)),
        }
    }

    // Locked predictions must reference owned cards.
    for prediction in &session.locked_predictions {
        if !session
            .hypothesis_cards
            .contains_key(&prediction.hypothesis_id)
        {
            validation.warn(format!(
                "locked prediction {} references unknown hypothesis {}",
                prediction.id, prediction.hypothesis_id
            ));
        }
    }

    if !validation.is_clean() {
        warn!(
            session_id = %session.id,
            warnings = validation.warnings.len(),
            errors = validation.errors.len(),
            "Session validation found defects"
        );
    }

    validation
}

/// Detect a cycle anywhere in the evolution edge list.
fn has_evolution_cycle(session: &Session) -> bool {
    // DFS from every node over forward edges; small graphs, linear scans.
    let nodes: Vec<&String> = session
        .hypothesis_evolution
        .iter()
        .map(|e| &e.from_version_id)
        .collect();

    for start in nodes {
        let mut stack = vec![start.clone()];
        let mut seen = std::collections::HashSet::new();
        while let Some(current) = stack.pop() {
            for edge in session
                .hypothesis_evolution
                .iter()
                .filter(|e| e.from_version_id == current)
            {
                if edge.to_version_id == *start {
                    return true;
                }
                if seen.insert(edge.to_version_id.clone()) {
                    stack.push(edge.to_version_id.clone());
                }
            }
        }
    }
    false
}
