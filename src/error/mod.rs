use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Commitment error: {0}")]
    Commitment(#[from] CommitmentError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Conflicting write for session {session_id}: stored revision {stored}, expected {expected}")]
    Conflict {
        session_id: String,
        stored: i64,
        expected: i64,
    },

    #[error("Corrupted session payload for {session_id}: {message}")]
    CorruptPayload { session_id: String, message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Session and lineage precondition errors.
///
/// Every variant is raised synchronously before any mutation takes place;
/// a failed operation leaves the session value untouched.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Hypothesis not found: {hypothesis_id}")]
    HypothesisNotFound { hypothesis_id: String },

    #[error("Hypothesis is archived: {hypothesis_id}")]
    HypothesisArchived { hypothesis_id: String },

    #[error("Hypothesis is not archived: {hypothesis_id}")]
    HypothesisNotArchived { hypothesis_id: String },

    #[error("Cannot archive the sole active hypothesis: {hypothesis_id}")]
    SoleActiveHypothesis { hypothesis_id: String },

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidPhaseTransition { from: String, to: String },

    #[error("Evolution edge {from} -> {to} would create a cycle")]
    EvolutionCycle { from: String, to: String },

    #[error("Commit not found: {commit_id}")]
    CommitNotFound { commit_id: String },

    #[error("Commit chain is corrupt: {message}")]
    CorruptCommitChain { message: String },
}

/// Prediction commitment protocol errors
#[derive(Debug, Error)]
pub enum CommitmentError {
    #[error("Prediction text is empty after normalization")]
    EmptyPrediction,

    #[error("Prediction {prediction_id} is not locked or already revealed (state: {state})")]
    NotLocked { prediction_id: String, state: String },

    #[error("Prediction {prediction_id} has not been revealed yet (state: {state})")]
    NotRevealed { prediction_id: String, state: String },
}

/// Operator workflow errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Step not found: {step_id}")]
    StepNotFound { step_id: String },

    #[error("Cannot jump forward to step {target} from step {current}")]
    ForwardJump { target: usize, current: usize },

    #[error("Workflow is not at its final step (at {current} of {total})")]
    NotAtFinalStep { current: usize, total: usize },

    #[error("Workflow result incomplete: {message}")]
    IncompleteResult { message: String },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type alias for commitment operations
pub type CommitmentResult<T> = Result<T, CommitmentError>;

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;
