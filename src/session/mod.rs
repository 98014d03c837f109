//! Session aggregate and hypothesis versioning model.
//!
//! A [`Session`] is the root aggregate: it owns hypothesis cards (keyed by
//! id; ids elsewhere are back-references, never ownership), the evolution
//! edge list, the commit log, and the evidence/test/prediction records that
//! operators and the commitment protocol feed back into it.
//!
//! Every session transform is copy-on-write: "read old session, compute new
//! session". Precondition violations raise a named error before anything is
//! mutated, so a failed call leaves the old value untouched and the commit
//! log meaningful.

mod commits;
mod lineage;
mod phase;
mod validate;

pub use commits::{CommitTrigger, SessionCommit, SessionSnapshot};
pub use lineage::{HypothesisDraft, HypothesisRole, RelatedHypotheses};
pub use phase::SessionPhase;
pub use validate::{validate_session, SessionValidation};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::commitment::LockedPrediction;
use crate::workflow::Insight;

/// Current session schema version, stamped on creation and compared on
/// decode. Migration between versions belongs to the persistence layer.
pub const SCHEMA_VERSION: u32 = 1;

/// What caused an evolution edge to be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvolutionTrigger {
    /// An operator workflow produced a new version.
    OperatorApplication,
    /// Evidence forced a revision or settled a competition.
    Evidence,
    /// An external review agent suggested the change.
    AgentFeedback,
    /// The researcher made the change by hand.
    Manual,
}

impl std::fmt::Display for EvolutionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvolutionTrigger::OperatorApplication => write!(f, "operator-application"),
            EvolutionTrigger::Evidence => write!(f, "evidence"),
            EvolutionTrigger::AgentFeedback => write!(f, "agent-feedback"),
            EvolutionTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// Directed lineage relation between two hypothesis versions.
///
/// Kept as a plain id-pair edge list so it serializes trivially and
/// ancestor queries are linear scans over small graphs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionEdge {
    /// Source (earlier) hypothesis version id.
    pub from_version_id: String,
    /// Target (later) hypothesis version id.
    pub to_version_id: String,
    /// Why the evolution happened.
    pub reason: String,
    /// What caused it.
    pub trigger: EvolutionTrigger,
    /// When the edge was recorded.
    pub timestamp: DateTime<Utc>,
}

/// A single versioned hypothesis.
///
/// Cards are immutable in spirit: revisions produce a new card under a new
/// id; the old card is retained for history and never deleted in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisCard {
    /// Identifier `{session_id}:h{seq}:v{version}`; sorts by sequence then
    /// version.
    pub id: String,
    /// The hypothesis statement.
    pub statement: String,
    /// Proposed causal mechanism.
    pub mechanism: String,
    /// Free-text domain tags (insertion-ordered, no duplicates).
    pub domain: Vec<String>,
    /// Observations expected if the hypothesis is true.
    pub predictions_if_true: Vec<String>,
    /// Observations expected if the hypothesis is false.
    pub predictions_if_false: Vec<String>,
    /// Observations that would falsify the hypothesis outright.
    pub impossible_if_true: Vec<String>,
    /// Researcher confidence, 0-100.
    pub confidence: u8,
    /// Known confounds.
    pub confounds: Vec<String>,
    /// Stated assumptions.
    pub assumptions: Vec<String>,
    /// Append-only annotations (supersession, archive, restore notes).
    #[serde(default)]
    pub notes: Vec<String>,
    /// When the card was created.
    pub created_at: DateTime<Utc>,
    /// When the card was last annotated.
    pub updated_at: DateTime<Utc>,
}

impl HypothesisCard {
    /// Create a card with defaults for everything but the statement.
    pub fn new(session_id: &str, seq: u32, statement: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Self::compose_id(session_id, seq, 1),
            statement: statement.into(),
            mechanism: String::new(),
            domain: Vec::new(),
            predictions_if_true: Vec::new(),
            predictions_if_false: Vec::new(),
            impossible_if_true: Vec::new(),
            confidence: 50,
            confounds: Vec::new(),
            assumptions: Vec::new(),
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Compose a card id from its parts.
    pub fn compose_id(session_id: &str, seq: u32, version: u32) -> String {
        format!("{}:h{}:v{}", session_id, seq, version)
    }

    /// Sequence number parsed out of the id, if well-formed.
    pub fn seq(&self) -> Option<u32> {
        parse_card_id(&self.id).map(|(seq, _)| seq)
    }

    /// Version number parsed out of the id, if well-formed.
    pub fn version(&self) -> Option<u32> {
        parse_card_id(&self.id).map(|(_, version)| version)
    }

    /// Produce the next version of this card: same sequence, version + 1,
    /// fresh timestamps. The caller fills in the revised fields.
    pub fn next_version(&self, session_id: &str) -> Self {
        let (seq, version) = parse_card_id(&self.id).unwrap_or((0, 0));
        let now = Utc::now();
        let mut next = self.clone();
        next.id = Self::compose_id(session_id, seq, version + 1);
        next.created_at = now;
        next.updated_at = now;
        next.notes = Vec::new();
        next
    }

    /// Set the mechanism.
    pub fn with_mechanism(mut self, mechanism: impl Into<String>) -> Self {
        self.mechanism = mechanism.into();
        self
    }

    /// Add a domain tag, ignoring duplicates.
    pub fn with_domain_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.domain.contains(&tag) {
            self.domain.push(tag);
        }
        self
    }

    /// Add an if-true prediction.
    pub fn with_prediction_if_true(mut self, text: impl Into<String>) -> Self {
        self.predictions_if_true.push(text.into());
        self
    }

    /// Add an if-false prediction.
    pub fn with_prediction_if_false(mut self, text: impl Into<String>) -> Self {
        self.predictions_if_false.push(text.into());
        self
    }

    /// Add a falsification condition.
    pub fn with_impossible_if_true(mut self, text: impl Into<String>) -> Self {
        self.impossible_if_true.push(text.into());
        self
    }

    /// Set the confidence, clamped to 0-100.
    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = confidence.min(100);
        self
    }

    /// Add a confound.
    pub fn with_confound(mut self, text: impl Into<String>) -> Self {
        self.confounds.push(text.into());
        self
    }

    /// Add an assumption.
    pub fn with_assumption(mut self, text: impl Into<String>) -> Self {
        self.assumptions.push(text.into());
        self
    }

    /// Append an annotation and refresh `updated_at`.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self.updated_at = Utc::now();
        self
    }
}

/// Parse `{session}:h{seq}:v{version}` into (seq, version).
pub(crate) fn parse_card_id(id: &str) -> Option<(u32, u32)> {
    let mut parts = id.rsplit(':');
    let version = parts.next()?.strip_prefix('v')?.parse().ok()?;
    let seq = parts.next()?.strip_prefix('h')?.parse().ok()?;
    Some((seq, version))
}

/// Direction of an evidence record relative to its hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceDirection {
    /// The evidence supports the hypothesis.
    Supports,
    /// The evidence refutes the hypothesis.
    Refutes,
    /// The evidence does not settle it.
    Inconclusive,
}

impl std::fmt::Display for EvidenceDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceDirection::Supports => write!(f, "supports"),
            EvidenceDirection::Refutes => write!(f, "refutes"),
            EvidenceDirection::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

/// A piece of collected evidence tied to a hypothesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    /// Unique evidence identifier.
    pub id: String,
    /// Hypothesis the evidence bears on.
    pub hypothesis_id: String,
    /// Summary of the observation.
    pub summary: String,
    /// Direction relative to the hypothesis.
    pub direction: EvidenceDirection,
    /// Optional provenance (citation, dataset, lab notebook ref).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// When the evidence was recorded.
    pub added_at: DateTime<Utc>,
}

impl EvidenceRecord {
    /// Create an evidence record.
    pub fn new(
        hypothesis_id: impl Into<String>,
        summary: impl Into<String>,
        direction: EvidenceDirection,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            hypothesis_id: hypothesis_id.into(),
            summary: summary.into(),
            direction,
            source: None,
            added_at: Utc::now(),
        }
    }

    /// Set the provenance.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Lifecycle status of a designed test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Generated or sketched, not yet committed to.
    #[default]
    Proposed,
    /// Scheduled to be run.
    Planned,
    /// Executed; outcome recorded as evidence.
    Run,
    /// Rejected as impractical or uninformative.
    Discarded,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestStatus::Proposed => write!(f, "proposed"),
            TestStatus::Planned => write!(f, "planned"),
            TestStatus::Run => write!(f, "run"),
            TestStatus::Discarded => write!(f, "discarded"),
        }
    }
}

/// A discriminative test designed against a hypothesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignedTest {
    /// Unique test identifier.
    pub id: String,
    /// Hypothesis the test discriminates on.
    pub hypothesis_id: String,
    /// What the test does.
    pub description: String,
    /// Design category (e.g. "direct-manipulation").
    pub category: String,
    /// Discriminative power, 1-10.
    pub power: u8,
    /// Lifecycle status.
    pub status: TestStatus,
    /// When the test was designed.
    pub created_at: DateTime<Utc>,
}

impl DesignedTest {
    /// Create a proposed test.
    pub fn new(
        hypothesis_id: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        power: u8,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            hypothesis_id: hypothesis_id.into(),
            description: description.into(),
            category: category.into(),
            power: power.clamp(1, 10),
            status: TestStatus::Proposed,
            created_at: Utc::now(),
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: TestStatus) -> Self {
        self.status = status;
        self
    }
}

/// Root aggregate: one research session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    /// Schema version stamped at creation.
    pub schema_version: u32,
    /// Current methodology phase.
    pub phase: SessionPhase,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last mutated.
    pub updated_at: DateTime<Utc>,
    /// Id of the primary hypothesis; empty only in a fresh session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_hypothesis_id: Option<String>,
    /// Competing hypotheses, insertion-ordered.
    pub alternative_hypothesis_ids: Vec<String>,
    /// Archived hypotheses.
    pub archived_hypothesis_ids: Vec<String>,
    /// Owning store of all hypothesis cards, keyed by id.
    pub hypothesis_cards: BTreeMap<String, HypothesisCard>,
    /// Append-only lineage edge list.
    pub hypothesis_evolution: Vec<EvolutionEdge>,
    /// Append-only audit commit log.
    pub commits: Vec<SessionCommit>,
    /// Id of the latest commit; always present in `commits`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_commit_id: Option<String>,
    /// Collected evidence records.
    #[serde(default)]
    pub evidence: Vec<EvidenceRecord>,
    /// Designed discriminative tests.
    #[serde(default)]
    pub designed_tests: Vec<DesignedTest>,
    /// Predictions locked through the commitment protocol.
    #[serde(default)]
    pub locked_predictions: Vec<LockedPrediction>,
    /// Insights merged back from operator workflows.
    #[serde(default)]
    pub insights: Vec<Insight>,
}

impl Session {
    /// Create a fresh session with a root commit and no hypotheses.
    pub fn new() -> Self {
        let now = Utc::now();
        let session = Self {
            id: Uuid::new_v4().to_string(),
            schema_version: SCHEMA_VERSION,
            phase: SessionPhase::Intake,
            created_at: now,
            updated_at: now,
            primary_hypothesis_id: None,
            alternative_hypothesis_ids: Vec::new(),
            archived_hypothesis_ids: Vec::new(),
            hypothesis_cards: BTreeMap::new(),
            hypothesis_evolution: Vec::new(),
            commits: Vec::new(),
            head_commit_id: None,
            evidence: Vec::new(),
            designed_tests: Vec::new(),
            locked_predictions: Vec::new(),
            insights: Vec::new(),
        };
        session.append_commit(CommitTrigger::Manual, "Session created")
    }

    /// Highest hypothesis sequence number currently allocated.
    pub fn max_hypothesis_seq(&self) -> u32 {
        self.hypothesis_cards
            .values()
            .filter_map(|card| card.seq())
            .max()
            .unwrap_or(0)
    }

    /// Ids of all active (non-archived) hypotheses: primary first, then
    /// alternatives in insertion order.
    pub fn active_hypothesis_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        if let Some(primary) = &self.primary_hypothesis_id {
            ids.push(primary.clone());
        }
        ids.extend(self.alternative_hypothesis_ids.iter().cloned());
        ids
    }

    /// Record a piece of evidence, bump the evidence count in a new commit.
    ///
    /// Fails if the referenced hypothesis does not exist.
    pub fn add_evidence(
        &self,
        record: EvidenceRecord,
    ) -> crate::error::SessionResult<Session> {
        if !self.hypothesis_cards.contains_key(&record.hypothesis_id) {
            return Err(crate::error::SessionError::HypothesisNotFound {
                hypothesis_id: record.hypothesis_id,
            });
        }
        let mut next = self.clone();
        let message = format!("Evidence recorded: {}", record.direction);
        next.evidence.push(record);
        next.updated_at = Utc::now();
        Ok(next.append_commit(CommitTrigger::Evidence, message))
    }

    /// Record a designed test against an existing hypothesis.
    pub fn add_designed_test(
        &self,
        test: DesignedTest,
    ) -> crate::error::SessionResult<Session> {
        if !self.hypothesis_cards.contains_key(&test.hypothesis_id) {
            return Err(crate::error::SessionError::HypothesisNotFound {
                hypothesis_id: test.hypothesis_id,
            });
        }
        let mut next = self.clone();
        let message = format!("Test designed: {}", test.category);
        next.designed_tests.push(test);
        next.updated_at = Utc::now();
        Ok(next.append_commit(CommitTrigger::Manual, message))
    }

    /// Record a locked prediction against an existing hypothesis.
    pub fn record_locked_prediction(
        &self,
        prediction: LockedPrediction,
    ) -> crate::error::SessionResult<Session> {
        if !self.hypothesis_cards.contains_key(&prediction.hypothesis_id) {
            return Err(crate::error::SessionError::HypothesisNotFound {
                hypothesis_id: prediction.hypothesis_id,
            });
        }
        debug!(
            session_id = %self.id,
            prediction_id = %prediction.id,
            "Locked prediction recorded"
        );
        let mut next = self.clone();
        let message = format!("Prediction locked ({})", prediction.prediction_type);
        next.locked_predictions.push(prediction);
        next.updated_at = Utc::now();
        Ok(next.append_commit(CommitTrigger::Manual, message))
    }

    /// Replace a stored prediction with a later state (revealed/amended)
    /// of the same prediction id.
    pub fn update_locked_prediction(
        &self,
        prediction: LockedPrediction,
    ) -> crate::error::SessionResult<Session> {
        let Some(position) = self
            .locked_predictions
            .iter()
            .position(|p| p.id == prediction.id)
        else {
            return Err(crate::error::SessionError::HypothesisNotFound {
                hypothesis_id: prediction.hypothesis_id,
            });
        };
        let mut next = self.clone();
        let message = format!("Prediction {}", prediction.state);
        next.locked_predictions[position] = prediction;
        next.updated_at = Utc::now();
        Ok(next.append_commit(CommitTrigger::Evidence, message))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::{lock_prediction, PredictionType};

    #[test]
    fn test_new_session_has_root_commit_and_no_primary() {
        let session = Session::new();
        assert_eq!(session.schema_version, SCHEMA_VERSION);
        assert_eq!(session.phase, SessionPhase::Intake);
        assert!(session.primary_hypothesis_id.is_none());
        assert_eq!(session.commits.len(), 1);
        assert!(session.commits[0].parent_id.is_none());
        assert_eq!(
            session.head_commit_id.as_deref(),
            Some(session.commits[0].id.as_str())
        );
    }

    #[test]
    fn test_card_id_compose_and_parse() {
        let id = HypothesisCard::compose_id("sess", 3, 2);
        assert_eq!(id, "sess:h3:v2");
        assert_eq!(parse_card_id(&id), Some((3, 2)));
        assert_eq!(parse_card_id("garbage"), None);
    }

    #[test]
    fn test_card_next_version_bumps_version() {
        let card = HypothesisCard::new("sess", 1, "X causes Y");
        let next = card.next_version("sess");
        assert_eq!(next.id, "sess:h1:v2");
        assert_eq!(next.statement, card.statement);
        assert!(next.notes.is_empty());
    }

    #[test]
    fn test_card_builder_clamps_and_dedups() {
        let card = HypothesisCard::new("sess", 1, "X")
            .with_confidence(120)
            .with_domain_tag("memory")
            .with_domain_tag("memory")
            .with_prediction_if_true("faster recall");
        assert_eq!(card.confidence, 100);
        assert_eq!(card.domain, vec!["memory".to_string()]);
        assert_eq!(card.predictions_if_true.len(), 1);
    }

    #[test]
    fn test_max_hypothesis_seq() {
        let mut session = Session::new();
        assert_eq!(session.max_hypothesis_seq(), 0);
        let sid = session.id.clone();
        for seq in [1u32, 4, 2] {
            let card = HypothesisCard::new(&sid, seq, "x");
            session.hypothesis_cards.insert(card.id.clone(), card);
        }
        assert_eq!(session.max_hypothesis_seq(), 4);
    }

    #[test]
    fn test_add_evidence_requires_known_hypothesis() {
        let session = Session::new();
        let record =
            EvidenceRecord::new("missing", "saw nothing", EvidenceDirection::Inconclusive);
        assert!(session.add_evidence(record).is_err());
    }

    #[test]
    fn test_add_evidence_appends_commit() {
        let session = Session::new();
        let draft = HypothesisDraft::new("X causes Y");
        let session = session.add_hypothesis(draft).unwrap();
        let hid = session.primary_hypothesis_id.clone().unwrap();

        let before = session.commits.len();
        let record = EvidenceRecord::new(&hid, "observed X then Y", EvidenceDirection::Supports)
            .with_source("lab notebook p.12");
        let session = session.add_evidence(record).unwrap();
        assert_eq!(session.evidence.len(), 1);
        assert_eq!(session.commits.len(), before + 1);
        assert_eq!(
            session.commits.last().unwrap().trigger,
            CommitTrigger::Evidence
        );
    }

    #[test]
    fn test_record_and_update_locked_prediction() {
        let session = Session::new()
            .add_hypothesis(HypothesisDraft::new("X causes Y"))
            .unwrap();
        let hid = session.primary_hypothesis_id.clone().unwrap();

        let locked = lock_prediction(&hid, PredictionType::IfTrue, 0, "We expect X").unwrap();
        let session = session.record_locked_prediction(locked.clone()).unwrap();
        assert_eq!(session.locked_predictions.len(), 1);

        let revealed = crate::commitment::reveal_prediction(
            &locked,
            "X observed",
            crate::commitment::OutcomeMatch::Confirmed,
        )
        .unwrap();
        let session = session.update_locked_prediction(revealed).unwrap();
        assert_eq!(session.locked_predictions.len(), 1);
        assert_eq!(
            session.locked_predictions[0].state,
            crate::commitment::PredictionState::Revealed
        );
    }
}
