//! State snapshots.
//!
//! Serializable copies of the catalog and every attempt record, used for the
//! admin export/import endpoints and for the on-disk snapshot file.

use super::AppState;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Schema version for snapshot format compatibility
/// Version 1: quizzes + attempts
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Schema version for forward compatibility
    pub schema_version: u32,
    pub exported_at: DateTime<Utc>,
    /// All quizzes (keyed by quiz ID)
    pub quizzes: HashMap<QuizId, QuizDefinition>,
    pub attempts: Vec<AttemptRecord>,
}

impl StateSnapshot {
    /// Validate the snapshot before import
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(format!(
                "Snapshot schema version {} is newer than supported version {}. \
                 Please update the server.",
                self.schema_version, SNAPSHOT_SCHEMA_VERSION
            ));
        }

        for (id, quiz) in &self.quizzes {
            if *id != quiz.id {
                return Err(format!("Quiz stored under '{}' has id '{}'", id, quiz.id));
            }
        }

        let mut seen = HashSet::new();
        for attempt in &self.attempts {
            if !self.quizzes.contains_key(&attempt.quiz_id) {
                return Err(format!(
                    "Attempt by '{}' references quiz '{}' which doesn't exist",
                    attempt.participant_id, attempt.quiz_id
                ));
            }
            if !seen.insert(attempt.key()) {
                return Err(format!(
                    "Duplicate attempt for quiz '{}' by '{}'",
                    attempt.quiz_id, attempt.participant_id
                ));
            }
            if attempt.state == LifecycleState::Submitted
                && (attempt.score.is_none() || attempt.submitted_at.is_none())
            {
                return Err(format!(
                    "Submitted attempt for quiz '{}' by '{}' has no score",
                    attempt.quiz_id, attempt.participant_id
                ));
            }
            if attempt.state == LifecycleState::NotStarted {
                return Err(format!(
                    "Attempt for quiz '{}' by '{}' is stored as not started",
                    attempt.quiz_id, attempt.participant_id
                ));
            }
        }

        Ok(())
    }
}

impl AppState {
    /// Take a snapshot of the entire state
    pub async fn export_state(&self) -> Result<StateSnapshot, crate::error::AttemptError> {
        let quizzes = self.quizzes.read().await.clone();
        let attempts = self.attempts.all().await?;

        Ok(StateSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            exported_at: self.now(),
            quizzes,
            attempts,
        })
    }

    /// Replace all current state with a snapshot
    pub async fn import_state(&self, snapshot: StateSnapshot) -> Result<(), String> {
        snapshot.validate()?;

        let quiz_count = snapshot.quizzes.len();
        let attempt_count = snapshot.attempts.len();

        *self.quizzes.write().await = snapshot.quizzes;
        self.attempts
            .replace_all(snapshot.attempts)
            .await
            .map_err(|e| e.to_string())?;

        tracing::info!(
            "Imported snapshot: {} quizzes, {} attempts",
            quiz_count,
            attempt_count
        );
        Ok(())
    }
}
