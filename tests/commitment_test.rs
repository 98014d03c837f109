//! Integration tests for the prediction commitment protocol.
//!
//! Covers the pre-registration properties end to end: irreversibility of
//! locked fields, tamper detection, single-use reveal, and the integrity
//! score feeding the robustness multiplier.

use pretty_assertions::assert_eq;

use hypothesis_lab::commitment::{
    amend_prediction, lock_prediction, prediction_lock_stats, reveal_prediction,
    robustness_multiplier, verify_prediction, AmendmentType, OutcomeMatch, PredictionState,
    PredictionType,
};
use hypothesis_lab::session::{HypothesisDraft, Session};

#[test]
fn lock_normalizes_and_commits_exact_wording() {
    let locked =
        lock_prediction("s1:h1:v1", PredictionType::IfTrue, 0, "  We expect X  ").unwrap();
    assert_eq!(locked.original_text, "We expect X");
    assert_eq!(locked.state, PredictionState::Locked);
    assert_eq!(locked.lock_hash.len(), 64);
}

#[test]
fn single_character_change_produces_different_hash() {
    let a = lock_prediction("s1:h1:v1", PredictionType::IfTrue, 0, "We expect X").unwrap();
    let b = lock_prediction("s1:h1:v1", PredictionType::IfTrue, 0, "We expect Y").unwrap();
    assert_ne!(a.lock_hash, b.lock_hash);
}

#[test]
fn locked_fields_survive_reveal_and_amendment() {
    let locked = lock_prediction(
        "s1:h1:v1",
        PredictionType::ImpossibleIfTrue,
        2,
        "No effect above 40mg",
    )
    .unwrap();
    let original_hash = locked.lock_hash.clone();
    let original_text = locked.original_text.clone();
    let original_ts = locked.lock_timestamp;

    let revealed =
        reveal_prediction(&locked, "effect seen at 60mg", OutcomeMatch::Refuted).unwrap();
    let amended = amend_prediction(
        &revealed,
        AmendmentType::Qualification,
        "assay may have been contaminated",
        Some("lab notes".to_string()),
    )
    .unwrap();

    assert_eq!(amended.lock_hash, original_hash);
    assert_eq!(amended.original_text, original_text);
    assert_eq!(amended.lock_timestamp, original_ts);
    assert!(verify_prediction(&amended).valid);
}

#[test]
fn tampering_any_hashed_field_is_detected() {
    let locked = lock_prediction("s1:h1:v1", PredictionType::IfFalse, 1, "No change").unwrap();

    let mut tampered = locked.clone();
    tampered.original_text = "Large change".to_string();
    assert!(!verify_prediction(&tampered).valid);

    let mut tampered = locked.clone();
    tampered.original_index = 5;
    assert!(!verify_prediction(&tampered).valid);

    let mut tampered = locked.clone();
    tampered.prediction_type = PredictionType::IfTrue;
    assert!(!verify_prediction(&tampered).valid);

    assert!(verify_prediction(&locked).valid);
}

#[test]
fn reveal_is_single_use_across_all_states() {
    let locked = lock_prediction("s1:h1:v1", PredictionType::IfTrue, 0, "We expect X").unwrap();

    let revealed = reveal_prediction(&locked, "seen", OutcomeMatch::Confirmed).unwrap();
    assert_eq!(revealed.state, PredictionState::Revealed);
    assert!(reveal_prediction(&revealed, "again", OutcomeMatch::Confirmed).is_err());

    let amended =
        amend_prediction(&revealed, AmendmentType::Correction, "typo", None).unwrap();
    assert!(reveal_prediction(&amended, "again", OutcomeMatch::Confirmed).is_err());

    let mut draft = locked.clone();
    draft.state = PredictionState::Draft;
    assert!(reveal_prediction(&draft, "early", OutcomeMatch::Confirmed).is_err());
}

#[test]
fn amendments_discount_robustness() {
    let locked = lock_prediction("s1:h1:v1", PredictionType::IfTrue, 0, "We expect X").unwrap();
    let revealed = reveal_prediction(&locked, "unclear", OutcomeMatch::Inconclusive).unwrap();

    let pristine_stats = prediction_lock_stats(&[revealed.clone()]);
    assert_eq!(pristine_stats.integrity_score, 100);
    assert_eq!(robustness_multiplier(&pristine_stats), 1.0);

    let amended = amend_prediction(
        &revealed,
        AmendmentType::Reinterpretation,
        "X partially present",
        None,
    )
    .unwrap();
    let stats = prediction_lock_stats(&[amended]);
    assert_eq!(stats.integrity_score, 85);
    let multiplier = robustness_multiplier(&stats);
    assert!(multiplier < 1.0);
    assert!(multiplier >= 0.5);
}

#[test]
fn session_records_prediction_lifecycle_with_commits() {
    let session = Session::new()
        .add_hypothesis(
            HypothesisDraft::new("Caffeine improves recall")
                .with_prediction_if_true("treated group recalls more words"),
        )
        .unwrap();
    let hid = session.primary_hypothesis_id.clone().unwrap();

    let locked = lock_prediction(
        &hid,
        PredictionType::IfTrue,
        0,
        "treated group recalls more words",
    )
    .unwrap();
    let session = session.record_locked_prediction(locked.clone()).unwrap();

    let revealed = reveal_prediction(&locked, "12% more words", OutcomeMatch::Confirmed).unwrap();
    let session = session.update_locked_prediction(revealed).unwrap();

    assert_eq!(session.locked_predictions.len(), 1);
    assert_eq!(
        session.locked_predictions[0].state,
        PredictionState::Revealed
    );
    // Both mutations audited, chain intact.
    assert!(session.verify_commit_chain().unwrap() >= 4);
    assert!(verify_prediction(&session.locked_predictions[0]).valid);
}
