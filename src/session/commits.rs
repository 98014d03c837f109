//! Append-only session commit log.
//!
//! A git-like snapshot chain: each commit links to its parent by id, the
//! session's `head_commit_id` names the latest entry, and walking parent
//! links from head must reach the root commit (null parent) with no
//! cycles. Commits carry a compact snapshot of audit-relevant state plus
//! an integrity hash so edits to the chain are detectable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};
use crate::integrity::{canonical_timestamp, hash_value};

use super::{Session, SessionPhase};

/// What caused a commit to be appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitTrigger {
    /// Explicit user action.
    Manual,
    /// An operator workflow merged its result.
    Operator,
    /// An external review agent responded.
    AgentResponse,
    /// Evidence was recorded.
    Evidence,
    /// The session moved to a new phase.
    PhaseChange,
    /// Periodic background save.
    AutoSave,
}

impl std::fmt::Display for CommitTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitTrigger::Manual => write!(f, "manual"),
            CommitTrigger::Operator => write!(f, "operator"),
            CommitTrigger::AgentResponse => write!(f, "agent-response"),
            CommitTrigger::Evidence => write!(f, "evidence"),
            CommitTrigger::PhaseChange => write!(f, "phase-change"),
            CommitTrigger::AutoSave => write!(f, "auto-save"),
        }
    }
}

impl std::str::FromStr for CommitTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(CommitTrigger::Manual),
            "operator" => Ok(CommitTrigger::Operator),
            "agent-response" => Ok(CommitTrigger::AgentResponse),
            "evidence" => Ok(CommitTrigger::Evidence),
            "phase-change" => Ok(CommitTrigger::PhaseChange),
            "auto-save" => Ok(CommitTrigger::AutoSave),
            _ => Err(format!("Unknown commit trigger: {}", s)),
        }
    }
}

/// Compact state snapshot embedded in each commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Phase at commit time.
    pub phase: SessionPhase,
    /// All hypothesis ids present in the card store.
    pub hypothesis_ids: Vec<String>,
    /// Primary hypothesis id, if assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_id: Option<String>,
    /// Primary hypothesis confidence at commit time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    /// Evidence records at commit time.
    pub evidence_count: usize,
    /// Designed tests at commit time.
    pub test_count: usize,
}

impl SessionSnapshot {
    /// Capture the audit-relevant state of a session.
    pub fn capture(session: &Session) -> Self {
        let confidence = session
            .primary_hypothesis_id
            .as_ref()
            .and_then(|id| session.hypothesis_cards.get(id))
            .map(|card| card.confidence);
        Self {
            phase: session.phase,
            hypothesis_ids: session.hypothesis_cards.keys().cloned().collect(),
            primary_id: session.primary_hypothesis_id.clone(),
            confidence,
            evidence_count: session.evidence.len(),
            test_count: session.designed_tests.len(),
        }
    }
}

/// One immutable entry in the session audit chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCommit {
    /// Unique commit identifier.
    pub id: String,
    /// Parent commit id; null only for the root commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// When the commit was made.
    pub timestamp: DateTime<Utc>,
    /// What caused it.
    pub trigger: CommitTrigger,
    /// Human-readable message.
    pub message: String,
    /// Compact state snapshot.
    pub snapshot: SessionSnapshot,
    /// Integrity hash over the commit's audit-relevant fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl SessionCommit {
    /// Recompute this commit's integrity hash from its fields.
    pub fn compute_hash(&self) -> String {
        hash_value(&json!({
            "parentId": self.parent_id,
            "trigger": self.trigger.to_string(),
            "message": self.message,
            "snapshot": serde_json::to_value(&self.snapshot).unwrap_or(serde_json::Value::Null),
            "timestamp": canonical_timestamp(self.timestamp),
        }))
    }
}

impl Session {
    /// Append a commit capturing current state and re-point the head.
    ///
    /// Infallible by construction: the new commit's parent is the current
    /// head (or null for the first commit ever).
    pub fn append_commit(mut self, trigger: CommitTrigger, message: impl Into<String>) -> Session {
        let snapshot = SessionSnapshot::capture(&self);
        let mut commit = SessionCommit {
            id: Uuid::new_v4().to_string(),
            parent_id: self.head_commit_id.clone(),
            timestamp: Utc::now(),
            trigger,
            message: message.into(),
            snapshot,
            hash: None,
        };
        commit.hash = Some(commit.compute_hash());
        self.head_commit_id = Some(commit.id.clone());
        self.commits.push(commit);
        self
    }

    /// Look up a commit by id.
    pub fn get_commit(&self, commit_id: &str) -> SessionResult<&SessionCommit> {
        self.commits
            .iter()
            .find(|c| c.id == commit_id)
            .ok_or_else(|| SessionError::CommitNotFound {
                commit_id: commit_id.to_string(),
            })
    }

    /// Walk the chain from head to root, checking linkage, acyclicity,
    /// and per-commit integrity hashes. Returns the chain length.
    pub fn verify_commit_chain(&self) -> SessionResult<usize> {
        let Some(head) = &self.head_commit_id else {
            return Err(SessionError::CorruptCommitChain {
                message: "session has no head commit".to_string(),
            });
        };

        let mut visited = std::collections::HashSet::new();
        let mut current = Some(head.clone());
        let mut length = 0usize;

        while let Some(commit_id) = current {
            if !visited.insert(commit_id.clone()) {
                return Err(SessionError::CorruptCommitChain {
                    message: format!("cycle detected at commit {}", commit_id),
                });
            }
            let commit = self.get_commit(&commit_id)?;
            if let Some(stored) = &commit.hash {
                let recomputed = commit.compute_hash();
                if *stored != recomputed {
                    return Err(SessionError::CorruptCommitChain {
                        message: format!("hash mismatch at commit {}", commit_id),
                    });
                }
            }
            length += 1;
            current = commit.parent_id.clone();
        }

        Ok(length)
    }

    /// Commit history from root to head.
    pub fn commit_history(&self) -> SessionResult<Vec<&SessionCommit>> {
        let mut chain = Vec::new();
        let mut visited = std::collections::HashSet::new();
        let mut current = self.head_commit_id.clone();
        while let Some(commit_id) = current {
            if !visited.insert(commit_id.clone()) {
                return Err(SessionError::CorruptCommitChain {
                    message: format!("cycle detected at commit {}", commit_id),
                });
            }
            let commit = self.get_commit(&commit_id)?;
            chain.push(commit);
            current = commit.parent_id.clone();
        }
        chain.reverse();
        Ok(chain)
    }
}
