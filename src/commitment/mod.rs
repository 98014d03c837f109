//! Prediction commitment protocol.
//!
//! Models scientific pre-registration: a prediction's exact wording is
//! locked (hashed) before its outcome is known, revealed exactly once
//! against an observed outcome, and afterwards only amendable through an
//! append-only annex that never touches the original commitment. The state
//! machine is strictly forward: draft -> locked -> revealed -> amended
//! (self-loop); no transition regresses.
//!
//! The lock hash is tamper *evidence*, not a trust boundary: a determined
//! user can rewrite history, but doing so becomes detectable and auditable
//! instead of silent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CommitmentError, CommitmentResult};
use crate::integrity::{canonical_timestamp, hash_value, normalize_whitespace};

/// Default integrity penalty per amendment, out of 100.
pub const DEFAULT_AMENDMENT_PENALTY: u32 = 15;

/// Which prediction list of the hypothesis the commitment was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PredictionType {
    /// Expected observation if the hypothesis is true.
    IfTrue,
    /// Expected observation if the hypothesis is false.
    IfFalse,
    /// Observation that would falsify the hypothesis outright.
    ImpossibleIfTrue,
}

impl PredictionType {
    /// Get the type name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionType::IfTrue => "if-true",
            PredictionType::IfFalse => "if-false",
            PredictionType::ImpossibleIfTrue => "impossible-if-true",
        }
    }
}

impl std::fmt::Display for PredictionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PredictionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "if-true" => Ok(PredictionType::IfTrue),
            "if-false" => Ok(PredictionType::IfFalse),
            "impossible-if-true" => Ok(PredictionType::ImpossibleIfTrue),
            _ => Err(format!("Unknown prediction type: {}", s)),
        }
    }
}

/// Lifecycle state of a locked prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionState {
    /// Created but not yet hashed.
    #[default]
    Draft,
    /// Wording committed; hash and timestamp are now immutable.
    Locked,
    /// Outcome recorded; revealed exactly once.
    Revealed,
    /// Annotated after reveal; may recur.
    Amended,
}

impl std::fmt::Display for PredictionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictionState::Draft => write!(f, "draft"),
            PredictionState::Locked => write!(f, "locked"),
            PredictionState::Revealed => write!(f, "revealed"),
            PredictionState::Amended => write!(f, "amended"),
        }
    }
}

impl std::str::FromStr for PredictionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PredictionState::Draft),
            "locked" => Ok(PredictionState::Locked),
            "revealed" => Ok(PredictionState::Revealed),
            "amended" => Ok(PredictionState::Amended),
            _ => Err(format!("Unknown prediction state: {}", s)),
        }
    }
}

/// How the observed outcome relates to the committed prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeMatch {
    /// The observation matched the prediction.
    Confirmed,
    /// The observation contradicted the prediction.
    Refuted,
    /// The observation did not settle the prediction.
    Inconclusive,
}

impl std::fmt::Display for OutcomeMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeMatch::Confirmed => write!(f, "confirmed"),
            OutcomeMatch::Refuted => write!(f, "refuted"),
            OutcomeMatch::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

impl std::str::FromStr for OutcomeMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "confirmed" => Ok(OutcomeMatch::Confirmed),
            "refuted" => Ok(OutcomeMatch::Refuted),
            "inconclusive" => Ok(OutcomeMatch::Inconclusive),
            _ => Err(format!("Unknown outcome match: {}", s)),
        }
    }
}

/// Category of a post-reveal amendment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmendmentType {
    /// The prediction is withdrawn.
    Retraction,
    /// Scope or conditions are narrowed after the fact.
    Qualification,
    /// The wording is reinterpreted against the outcome.
    Reinterpretation,
    /// A factual error in the surrounding record is corrected.
    Correction,
}

impl std::fmt::Display for AmendmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmendmentType::Retraction => write!(f, "retraction"),
            AmendmentType::Qualification => write!(f, "qualification"),
            AmendmentType::Reinterpretation => write!(f, "reinterpretation"),
            AmendmentType::Correction => write!(f, "correction"),
        }
    }
}

/// One append-only annotation made after reveal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amendment {
    /// Category of the amendment.
    pub amendment_type: AmendmentType,
    /// Amendment text.
    pub text: String,
    /// Optional stated reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When the amendment was recorded.
    pub amended_at: DateTime<Utc>,
}

/// A prediction whose wording has been committed before its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedPrediction {
    /// Unique prediction identifier.
    pub id: String,
    /// Hypothesis the prediction was extracted from.
    pub hypothesis_id: String,
    /// Which prediction list it came from.
    pub prediction_type: PredictionType,
    /// Position in the source list, for traceability.
    pub original_index: usize,
    /// Whitespace-normalized committed wording. Immutable once locked.
    pub original_text: String,
    /// Content hash of the commitment. Immutable once locked.
    pub lock_hash: String,
    /// When the commitment was taken. Immutable once locked.
    pub lock_timestamp: DateTime<Utc>,
    /// Lifecycle state.
    pub state: PredictionState,
    /// Observed outcome text, set at reveal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_outcome: Option<String>,
    /// Relation of the outcome to the prediction, set at reveal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_match: Option<OutcomeMatch>,
    /// When the prediction was revealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revealed_at: Option<DateTime<Utc>>,
    /// Append-only annex of post-reveal annotations.
    #[serde(default)]
    pub amendments: Vec<Amendment>,
}

/// Result of verifying a locked prediction against its hash.
///
/// A boolean-plus-reason value rather than an error: callers routinely need
/// to display "tampered" without halting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    /// Whether the recomputed hash matched the stored one.
    pub valid: bool,
    /// Human-readable reason when invalid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl VerificationOutcome {
    fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn tampered(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Aggregate statistics over a set of locked predictions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionLockStats {
    /// Total number of predictions counted.
    pub total: usize,
    /// Count in `draft` state.
    pub draft_count: usize,
    /// Count in `locked` state.
    pub locked_count: usize,
    /// Count in `revealed` state.
    pub revealed_count: usize,
    /// Count in `amended` state.
    pub amended_count: usize,
    /// Revealed predictions whose outcome confirmed them.
    pub confirmed_count: usize,
    /// Revealed predictions whose outcome refuted them.
    pub refuted_count: usize,
    /// Revealed predictions with an inconclusive outcome.
    pub inconclusive_count: usize,
    /// Total amendments across all predictions.
    pub amendment_count: usize,
    /// Integrity score in [0, 100]; 100 when nothing was amended.
    pub integrity_score: u32,
}

/// Compute the commitment hash for a prediction's identifying fields.
fn commitment_hash(
    hypothesis_id: &str,
    prediction_type: PredictionType,
    index: usize,
    normalized_text: &str,
    timestamp: DateTime<Utc>,
) -> String {
    hash_value(&json!({
        "hypothesisId": hypothesis_id,
        "predictionType": prediction_type.as_str(),
        "index": index,
        "normalizedText": normalized_text,
        "timestamp": canonical_timestamp(timestamp),
    }))
}

/// Lock a prediction's wording before its outcome is known.
///
/// The text is trimmed and internal whitespace runs are collapsed; an empty
/// normalized text is rejected. On success the returned prediction is in
/// `locked` state with an empty amendment annex.
pub fn lock_prediction(
    hypothesis_id: &str,
    prediction_type: PredictionType,
    index: usize,
    text: &str,
) -> CommitmentResult<LockedPrediction> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Err(CommitmentError::EmptyPrediction);
    }

    let timestamp = Utc::now();
    let lock_hash = commitment_hash(hypothesis_id, prediction_type, index, &normalized, timestamp);

    debug!(
        hypothesis_id,
        prediction_type = %prediction_type,
        index,
        "Prediction locked"
    );

    Ok(LockedPrediction {
        id: Uuid::new_v4().to_string(),
        hypothesis_id: hypothesis_id.to_string(),
        prediction_type,
        original_index: index,
        original_text: normalized,
        lock_hash,
        lock_timestamp: timestamp,
        state: PredictionState::Locked,
        observed_outcome: None,
        outcome_match: None,
        revealed_at: None,
        amendments: Vec::new(),
    })
}

/// Recompute the hash from the prediction's current fields and compare it
/// to the stored `lock_hash`.
///
/// Any mutation of a hashed field outside the defined transition functions
/// is detectable here.
pub fn verify_prediction(prediction: &LockedPrediction) -> VerificationOutcome {
    let recomputed = commitment_hash(
        &prediction.hypothesis_id,
        prediction.prediction_type,
        prediction.original_index,
        &prediction.original_text,
        prediction.lock_timestamp,
    );

    if recomputed == prediction.lock_hash {
        VerificationOutcome::valid()
    } else {
        VerificationOutcome::tampered(format!(
            "prediction {} appears tampered: stored hash does not match its content",
            prediction.id
        ))
    }
}

/// Record the observed outcome of a locked prediction.
///
/// Allowed only from `locked` state; reveal is single-use. All locked
/// fields (hash, timestamp, text) are carried over unchanged.
pub fn reveal_prediction(
    prediction: &LockedPrediction,
    observed_outcome: impl Into<String>,
    outcome_match: OutcomeMatch,
) -> CommitmentResult<LockedPrediction> {
    if prediction.state != PredictionState::Locked {
        return Err(CommitmentError::NotLocked {
            prediction_id: prediction.id.clone(),
            state: prediction.state.to_string(),
        });
    }

    let mut revealed = prediction.clone();
    revealed.state = PredictionState::Revealed;
    revealed.observed_outcome = Some(observed_outcome.into());
    revealed.outcome_match = Some(outcome_match);
    revealed.revealed_at = Some(Utc::now());

    debug!(
        prediction_id = %revealed.id,
        outcome = %outcome_match,
        "Prediction revealed"
    );

    Ok(revealed)
}

/// Append an amendment to a revealed prediction.
///
/// Allowed only from `revealed` or `amended` state. Amendments never alter
/// `original_text` or `lock_hash`; the original commitment is permanent.
pub fn amend_prediction(
    prediction: &LockedPrediction,
    amendment_type: AmendmentType,
    text: impl Into<String>,
    reason: Option<String>,
) -> CommitmentResult<LockedPrediction> {
    match prediction.state {
        PredictionState::Revealed | PredictionState::Amended => {}
        _ => {
            return Err(CommitmentError::NotRevealed {
                prediction_id: prediction.id.clone(),
                state: prediction.state.to_string(),
            });
        }
    }

    let mut amended = prediction.clone();
    amended.amendments.push(Amendment {
        amendment_type,
        text: text.into(),
        reason,
        amended_at: Utc::now(),
    });
    amended.state = PredictionState::Amended;

    debug!(
        prediction_id = %amended.id,
        amendment_type = %amendment_type,
        amendment_count = amended.amendments.len(),
        "Prediction amended"
    );

    Ok(amended)
}

/// Aggregate lock statistics with the default amendment penalty.
pub fn prediction_lock_stats(predictions: &[LockedPrediction]) -> PredictionLockStats {
    prediction_lock_stats_with_penalty(predictions, DEFAULT_AMENDMENT_PENALTY)
}

/// Aggregate counts by state and outcome, plus an integrity score that
/// starts at 100 and loses `penalty` points per amendment (floor 0).
/// An empty input scores 100.
pub fn prediction_lock_stats_with_penalty(
    predictions: &[LockedPrediction],
    penalty: u32,
) -> PredictionLockStats {
    let mut stats = PredictionLockStats {
        total: predictions.len(),
        integrity_score: 100,
        ..Default::default()
    };

    for prediction in predictions {
        match prediction.state {
            PredictionState::Draft => stats.draft_count += 1,
            PredictionState::Locked => stats.locked_count += 1,
            PredictionState::Revealed => stats.revealed_count += 1,
            PredictionState::Amended => stats.amended_count += 1,
        }
        match prediction.outcome_match {
            Some(OutcomeMatch::Confirmed) => stats.confirmed_count += 1,
            Some(OutcomeMatch::Refuted) => stats.refuted_count += 1,
            Some(OutcomeMatch::Inconclusive) => stats.inconclusive_count += 1,
            None => {}
        }
        stats.amendment_count += prediction.amendments.len();
    }

    let total_penalty = penalty.saturating_mul(stats.amendment_count as u32);
    stats.integrity_score = 100u32.saturating_sub(total_penalty);
    stats
}

/// Map an integrity score to a confidence discount multiplier.
///
/// 1.0 at score 100 falling linearly to a 0.5 floor at score 0; an empty
/// prediction set yields 1.0. Never exceeds 1.0.
pub fn robustness_multiplier(stats: &PredictionLockStats) -> f64 {
    if stats.total == 0 {
        return 1.0;
    }
    0.5 + f64::from(stats.integrity_score) / 200.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locked() -> LockedPrediction {
        lock_prediction("s1:h1:v1", PredictionType::IfTrue, 0, "We expect X").unwrap()
    }

    #[test]
    fn test_lock_normalizes_whitespace() {
        let p = lock_prediction("s1:h1:v1", PredictionType::IfTrue, 0, "  We expect X  ").unwrap();
        assert_eq!(p.original_text, "We expect X");
        assert_eq!(p.state, PredictionState::Locked);
        assert!(p.amendments.is_empty());
    }

    #[test]
    fn test_lock_rejects_empty_text() {
        let err = lock_prediction("s1:h1:v1", PredictionType::IfFalse, 0, "   \t\n").unwrap_err();
        assert!(matches!(err, CommitmentError::EmptyPrediction));
    }

    #[test]
    fn test_identical_inputs_same_moment_hash_equal() {
        let ts = Utc::now();
        let a = commitment_hash("h", PredictionType::IfTrue, 1, "We expect X", ts);
        let b = commitment_hash("h", PredictionType::IfTrue, 1, "We expect X", ts);
        assert_eq!(a, b);
    }

    #[test]
    fn test_one_character_change_hashes_differently() {
        let ts = Utc::now();
        let a = commitment_hash("h", PredictionType::IfTrue, 1, "We expect X", ts);
        let b = commitment_hash("h", PredictionType::IfTrue, 1, "We expect Y", ts);
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_untampered_is_valid() {
        let p = locked();
        let outcome = verify_prediction(&p);
        assert!(outcome.valid);
        assert!(outcome.reason.is_none());
    }

    #[test]
    fn test_verify_detects_text_tampering() {
        let mut p = locked();
        p.original_text = "We expect Y".to_string();
        let outcome = verify_prediction(&p);
        assert!(!outcome.valid);
        assert!(outcome.reason.unwrap().contains("tampered"));
    }

    #[test]
    fn test_verify_detects_timestamp_tampering() {
        let mut p = locked();
        p.lock_timestamp = p.lock_timestamp + chrono::Duration::seconds(1);
        assert!(!verify_prediction(&p).valid);
    }

    #[test]
    fn test_verify_detects_identity_tampering() {
        let mut p = locked();
        p.hypothesis_id = "s1:h2:v1".to_string();
        assert!(!verify_prediction(&p).valid);
    }

    #[test]
    fn test_reveal_from_locked_succeeds() {
        let p = locked();
        let r = reveal_prediction(&p, "X was observed", OutcomeMatch::Confirmed).unwrap();
        assert_eq!(r.state, PredictionState::Revealed);
        assert_eq!(r.observed_outcome.as_deref(), Some("X was observed"));
        assert_eq!(r.outcome_match, Some(OutcomeMatch::Confirmed));
        assert!(r.revealed_at.is_some());
        // Locked fields preserved.
        assert_eq!(r.lock_hash, p.lock_hash);
        assert_eq!(r.lock_timestamp, p.lock_timestamp);
        assert_eq!(r.original_text, p.original_text);
    }

    #[test]
    fn test_reveal_is_single_use() {
        let p = locked();
        let r = reveal_prediction(&p, "seen", OutcomeMatch::Refuted).unwrap();
        let err = reveal_prediction(&r, "again", OutcomeMatch::Confirmed).unwrap_err();
        assert!(matches!(err, CommitmentError::NotLocked { .. }));
    }

    #[test]
    fn test_reveal_rejects_draft() {
        let mut p = locked();
        p.state = PredictionState::Draft;
        let err = reveal_prediction(&p, "seen", OutcomeMatch::Confirmed).unwrap_err();
        assert!(matches!(err, CommitmentError::NotLocked { .. }));
    }

    #[test]
    fn test_amend_requires_reveal() {
        let p = locked();
        let err =
            amend_prediction(&p, AmendmentType::Qualification, "only on Tuesdays", None)
                .unwrap_err();
        assert!(matches!(err, CommitmentError::NotRevealed { .. }));
    }

    #[test]
    fn test_amend_appends_and_preserves_commitment() {
        let p = locked();
        let r = reveal_prediction(&p, "partial X", OutcomeMatch::Inconclusive).unwrap();
        let a1 = amend_prediction(
            &r,
            AmendmentType::Qualification,
            "holds only above threshold",
            Some("sample too small".to_string()),
        )
        .unwrap();
        assert_eq!(a1.state, PredictionState::Amended);
        assert_eq!(a1.amendments.len(), 1);

        // Amended is a self-loop.
        let a2 = amend_prediction(&a1, AmendmentType::Correction, "typo in outcome", None).unwrap();
        assert_eq!(a2.amendments.len(), 2);
        assert_eq!(a2.state, PredictionState::Amended);

        // The original commitment never moves.
        assert_eq!(a2.original_text, p.original_text);
        assert_eq!(a2.lock_hash, p.lock_hash);
        assert_eq!(a2.lock_timestamp, p.lock_timestamp);
        assert!(verify_prediction(&a2).valid);
    }

    #[test]
    fn test_stats_empty_input_scores_100() {
        let stats = prediction_lock_stats(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.integrity_score, 100);
    }

    #[test]
    fn test_stats_counts_states_and_outcomes() {
        let p1 = locked();
        let p2 = reveal_prediction(&locked(), "seen", OutcomeMatch::Confirmed).unwrap();
        let p3 = reveal_prediction(&locked(), "not seen", OutcomeMatch::Refuted).unwrap();
        let p3 = amend_prediction(&p3, AmendmentType::Reinterpretation, "hedge", None).unwrap();

        let stats = prediction_lock_stats(&[p1, p2, p3]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.locked_count, 1);
        assert_eq!(stats.revealed_count, 1);
        assert_eq!(stats.amended_count, 1);
        assert_eq!(stats.confirmed_count, 1);
        assert_eq!(stats.refuted_count, 1);
        assert_eq!(stats.amendment_count, 1);
        assert_eq!(stats.integrity_score, 85);
    }

    #[test]
    fn test_integrity_score_floors_at_zero() {
        let mut p = reveal_prediction(&locked(), "seen", OutcomeMatch::Refuted).unwrap();
        for _ in 0..10 {
            p = amend_prediction(&p, AmendmentType::Qualification, "more hedging", None).unwrap();
        }
        let stats = prediction_lock_stats(&[p]);
        assert_eq!(stats.integrity_score, 0);
    }

    #[test]
    fn test_robustness_multiplier_bounds() {
        let empty = prediction_lock_stats(&[]);
        assert_eq!(robustness_multiplier(&empty), 1.0);

        let pristine = prediction_lock_stats(&[locked()]);
        assert_eq!(robustness_multiplier(&pristine), 1.0);

        let mut worst = reveal_prediction(&locked(), "seen", OutcomeMatch::Refuted).unwrap();
        for _ in 0..10 {
            worst =
                amend_prediction(&worst, AmendmentType::Qualification, "hedge", None).unwrap();
        }
        let stats = prediction_lock_stats(&[worst]);
        let multiplier = robustness_multiplier(&stats);
        assert!((multiplier - 0.5).abs() < f64::EPSILON);
        assert!(multiplier <= 1.0);
    }

    #[test]
    fn test_prediction_type_round_trip() {
        for t in [
            PredictionType::IfTrue,
            PredictionType::IfFalse,
            PredictionType::ImpossibleIfTrue,
        ] {
            assert_eq!(t.as_str().parse::<PredictionType>().unwrap(), t);
        }
        assert!("maybe-true".parse::<PredictionType>().is_err());
    }

    #[test]
    fn test_prediction_state_round_trip() {
        for s in [
            PredictionState::Draft,
            PredictionState::Locked,
            PredictionState::Revealed,
            PredictionState::Amended,
        ] {
            assert_eq!(s.to_string().parse::<PredictionState>().unwrap(), s);
        }
    }
}
