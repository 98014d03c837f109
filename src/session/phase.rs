//! Session phase state machine.
//!
//! Eleven phases, linear with optional operator branches. The transition
//! table is pure data: [`SessionPhase::is_valid_transition`] answers from
//! the exhaustive per-phase list in [`SessionPhase::valid_next_phases`],
//! and callers reject anything else.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SessionError, SessionResult};

use super::{CommitTrigger, Session};

/// Phase of the falsification methodology a session is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    /// Initial hypothesis capture.
    Intake,
    /// Refining the statement, mechanism, and predictions.
    Sharpening,
    /// Level Split operator branch.
    LevelSplit,
    /// Exclusion Test operator branch.
    ExclusionTest,
    /// Object Transpose operator branch.
    ObjectTranspose,
    /// Scale Check operator branch.
    ScaleCheck,
    /// Waiting on adversarial review agents.
    AgentDispatch,
    /// Synthesizing agent feedback and operator results.
    Synthesis,
    /// Collecting evidence against locked predictions.
    EvidenceGathering,
    /// Revising the hypothesis set in light of findings.
    Revision,
    /// Terminal: the session is closed.
    Complete,
}

impl SessionPhase {
    /// Get the phase name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Intake => "intake",
            SessionPhase::Sharpening => "sharpening",
            SessionPhase::LevelSplit => "level-split",
            SessionPhase::ExclusionTest => "exclusion-test",
            SessionPhase::ObjectTranspose => "object-transpose",
            SessionPhase::ScaleCheck => "scale-check",
            SessionPhase::AgentDispatch => "agent-dispatch",
            SessionPhase::Synthesis => "synthesis",
            SessionPhase::EvidenceGathering => "evidence-gathering",
            SessionPhase::Revision => "revision",
            SessionPhase::Complete => "complete",
        }
    }

    /// The exhaustive set of phases legally reachable from this one.
    ///
    /// The four operator branches are commutative and independently
    /// optional: each exits directly to agent-dispatch.
    pub fn valid_next_phases(&self) -> &'static [SessionPhase] {
        match self {
            SessionPhase::Intake => &[SessionPhase::Sharpening],
            SessionPhase::Sharpening => &[
                SessionPhase::LevelSplit,
                SessionPhase::ExclusionTest,
                SessionPhase::ObjectTranspose,
                SessionPhase::ScaleCheck,
                SessionPhase::AgentDispatch,
            ],
            SessionPhase::LevelSplit
            | SessionPhase::ExclusionTest
            | SessionPhase::ObjectTranspose
            | SessionPhase::ScaleCheck => &[SessionPhase::AgentDispatch],
            SessionPhase::AgentDispatch => {
                &[SessionPhase::Synthesis, SessionPhase::EvidenceGathering]
            }
            SessionPhase::Synthesis => &[SessionPhase::Revision],
            SessionPhase::EvidenceGathering => &[SessionPhase::Revision],
            SessionPhase::Revision => &[
                SessionPhase::AgentDispatch,
                SessionPhase::Synthesis,
                SessionPhase::Complete,
            ],
            SessionPhase::Complete => &[],
        }
    }

    /// Whether `from -> to` is a legal transition.
    pub fn is_valid_transition(from: SessionPhase, to: SessionPhase) -> bool {
        from.valid_next_phases().contains(&to)
    }

    /// Whether this phase has no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        self.valid_next_phases().is_empty()
    }

    /// Whether this phase is one of the four operator branches.
    pub fn is_operator_phase(&self) -> bool {
        matches!(
            self,
            SessionPhase::LevelSplit
                | SessionPhase::ExclusionTest
                | SessionPhase::ObjectTranspose
                | SessionPhase::ScaleCheck
        )
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "intake" => Ok(SessionPhase::Intake),
            "sharpening" => Ok(SessionPhase::Sharpening),
            "level-split" => Ok(SessionPhase::LevelSplit),
            "exclusion-test" => Ok(SessionPhase::ExclusionTest),
            "object-transpose" => Ok(SessionPhase::ObjectTranspose),
            "scale-check" => Ok(SessionPhase::ScaleCheck),
            "agent-dispatch" => Ok(SessionPhase::AgentDispatch),
            "synthesis" => Ok(SessionPhase::Synthesis),
            "evidence-gathering" => Ok(SessionPhase::EvidenceGathering),
            "revision" => Ok(SessionPhase::Revision),
            "complete" => Ok(SessionPhase::Complete),
            _ => Err(format!("Unknown session phase: {}", s)),
        }
    }
}

impl Session {
    /// Move the session to a new phase, appending a phase-change commit.
    ///
    /// Rejects transitions outside the table with no mutation.
    pub fn transition_phase(&self, to: SessionPhase) -> SessionResult<Session> {
        if !SessionPhase::is_valid_transition(self.phase, to) {
            return Err(SessionError::InvalidPhaseTransition {
                from: self.phase.to_string(),
                to: to.to_string(),
            });
        }

        info!(session_id = %self.id, from = %self.phase, to = %to, "Phase transition");

        let mut next = self.clone();
        next.phase = to;
        next.updated_at = chrono::Utc::now();
        Ok(next.append_commit(
            CommitTrigger::PhaseChange,
            format!("Phase: {} -> {}", self.phase, to),
        ))
    }
}
