//! # Hypothesis Lab
//!
//! A structured hypothesis falsification core: research sessions move
//! through defined phases (refinement, discriminative-test design,
//! adversarial review, evidence collection, revision) and leave an
//! auditable trail of how each hypothesis changed and why.
//!
//! ## Features
//!
//! - **Session Versioning**: append-only, git-like commit chain recording
//!   phase transitions and major mutations for audit and rollback
//! - **Hypothesis Lineage**: primary/alternative/archived roles, evolution
//!   edges, and competition resolution across hypothesis versions
//! - **Operator Workflow Engine**: one generic step-sequencer instantiated
//!   by four analytical operators (Level Split, Exclusion Test, Object
//!   Transpose, Scale Check) as pure configuration
//! - **Prediction Commitment Protocol**: commit-reveal-amend scheme that
//!   makes rewriting a forecast after the fact detectable
//! - **Integrity Primitives**: canonical serialization and SHA-256
//!   tamper-evidence hashing
//!
//! ## Architecture
//!
//! ```text
//! CLI / caller → Session transforms (pure, copy-on-write)
//!                      ↓
//!                SQLite (one blob per session, revision-checked)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use hypothesis_lab::config::Config;
//! use hypothesis_lab::session::{HypothesisDraft, Session};
//! use hypothesis_lab::storage::{SqliteStorage, Storage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!
//!     let session = Session::new()
//!         .add_hypothesis(HypothesisDraft::new("Caffeine improves recall"))?;
//!     storage.save(&session, None).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Prediction commitment protocol (lock, verify, reveal, amend).
pub mod commitment;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Canonical serialization and content hashing.
pub mod integrity;
/// Analytical operator implementations (four operators as configuration).
pub mod operators;
/// Session aggregate, phases, commit log, and hypothesis lineage.
pub mod session;
/// SQLite storage layer for persistence.
pub mod storage;
/// Generic operator workflow engine.
pub mod workflow;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use session::{Session, SessionPhase};
