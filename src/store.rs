//! Attempt record store.
//!
//! The store is the only writer of [`AttemptRecord`]s. Every mutation is a
//! compare-and-swap on the record's lifecycle state, performed under that
//! record's own lock, so different participants never contend with each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::AttemptError;
use crate::types::*;

/// Outcome of a single-key answer upsert
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerWrite {
    Written(AttemptRecord),
    /// Record is past `Active`; nothing was written
    NotActive(AttemptRecord),
    /// Write arrived at or after the deadline; nothing was written
    PastDeadline(AttemptRecord),
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Return the participant's record, creating it if the quiz window is open
    async fn get_or_create(
        &self,
        quiz: &QuizDefinition,
        participant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(AttemptRecord, bool), AttemptError>;

    async fn load(&self, key: &AttemptKey) -> Result<Option<AttemptRecord>, AttemptError>;

    /// Upsert one answer while the record is `Active` and `now` is before the deadline
    async fn upsert_answer(
        &self,
        key: &AttemptKey,
        question_id: &str,
        option: OptionNumber,
        now: DateTime<Utc>,
    ) -> Result<AnswerWrite, AttemptError>;

    /// `Active -> Ended`. Returns false if the record was already past `Active`.
    async fn transition_to_ended(
        &self,
        key: &AttemptKey,
        reason: FinalizeReason,
        now: DateTime<Utc>,
    ) -> Result<bool, AttemptError>;

    /// `Active | Ended -> Submitted`. An already submitted record is returned unchanged.
    async fn transition_to_submitted(
        &self,
        key: &AttemptKey,
        score: u32,
        reason: FinalizeReason,
        now: DateTime<Utc>,
    ) -> Result<AttemptRecord, AttemptError>;

    async fn list_for_quiz(&self, quiz_id: &str) -> Result<Vec<AttemptRecord>, AttemptError>;

    async fn list_for_participant(
        &self,
        participant_id: &str,
    ) -> Result<Vec<AttemptRecord>, AttemptError>;

    async fn all(&self) -> Result<Vec<AttemptRecord>, AttemptError>;

    /// Replace the full contents (snapshot restore)
    async fn replace_all(&self, records: Vec<AttemptRecord>) -> Result<(), AttemptError>;
}

type Slot = Arc<RwLock<AttemptRecord>>;

/// In-process store: an index of per-record locks
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<AttemptKey, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, key: &AttemptKey) -> Option<Slot> {
        self.records.read().await.get(key).cloned()
    }

    async fn collect<F>(&self, filter: F) -> Vec<AttemptRecord>
    where
        F: Fn(&AttemptKey) -> bool,
    {
        let slots: Vec<Slot> = self
            .records
            .read()
            .await
            .iter()
            .filter(|(key, _)| filter(key))
            .map(|(_, slot)| slot.clone())
            .collect();

        let mut records = Vec::with_capacity(slots.len());
        for slot in slots {
            records.push(slot.read().await.clone());
        }
        records.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        records
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn get_or_create(
        &self,
        quiz: &QuizDefinition,
        participant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(AttemptRecord, bool), AttemptError> {
        let key = AttemptKey::new(quiz.id.clone(), participant_id);

        if let Some(slot) = self.slot(&key).await {
            return Ok((slot.read().await.clone(), false));
        }

        if now < quiz.opens_at {
            return Err(AttemptError::QuizNotOpen {
                opens_at: quiz.opens_at,
            });
        }
        if now >= quiz.closes_at || quiz.is_stopped() {
            return Err(AttemptError::QuizClosed);
        }

        let mut records = self.records.write().await;
        // Another request for the same key may have won the race
        if let Some(slot) = records.get(&key) {
            return Ok((slot.read().await.clone(), false));
        }

        let record = AttemptRecord::start(quiz, participant_id, now);
        records.insert(key, Arc::new(RwLock::new(record.clone())));
        Ok((record, true))
    }

    async fn load(&self, key: &AttemptKey) -> Result<Option<AttemptRecord>, AttemptError> {
        match self.slot(key).await {
            Some(slot) => Ok(Some(slot.read().await.clone())),
            None => Ok(None),
        }
    }

    async fn upsert_answer(
        &self,
        key: &AttemptKey,
        question_id: &str,
        option: OptionNumber,
        now: DateTime<Utc>,
    ) -> Result<AnswerWrite, AttemptError> {
        let slot = self.slot(key).await.ok_or(AttemptError::AttemptNotFound)?;
        let mut record = slot.write().await;

        if record.state != LifecycleState::Active {
            return Ok(AnswerWrite::NotActive(record.clone()));
        }
        if record.is_past_deadline(now) {
            return Ok(AnswerWrite::PastDeadline(record.clone()));
        }

        record.answers.insert(question_id.to_string(), option);
        record.version += 1;
        Ok(AnswerWrite::Written(record.clone()))
    }

    async fn transition_to_ended(
        &self,
        key: &AttemptKey,
        reason: FinalizeReason,
        now: DateTime<Utc>,
    ) -> Result<bool, AttemptError> {
        let slot = self.slot(key).await.ok_or(AttemptError::AttemptNotFound)?;
        let mut record = slot.write().await;

        if !record.state.can_transition_to(LifecycleState::Ended) {
            return Ok(false);
        }

        record.state = LifecycleState::Ended;
        record.ended_at = Some(now);
        record.ended_reason = Some(reason);
        record.version += 1;
        Ok(true)
    }

    async fn transition_to_submitted(
        &self,
        key: &AttemptKey,
        score: u32,
        reason: FinalizeReason,
        now: DateTime<Utc>,
    ) -> Result<AttemptRecord, AttemptError> {
        let slot = self.slot(key).await.ok_or(AttemptError::AttemptNotFound)?;
        let mut record = slot.write().await;

        if !record.state.can_transition_to(LifecycleState::Submitted) {
            // Already submitted: the first finalize wins
            return Ok(record.clone());
        }

        record.state = LifecycleState::Submitted;
        record.score = Some(score);
        record.submitted_at = Some(now);
        record.submit_reason = Some(reason);
        record.version += 1;
        Ok(record.clone())
    }

    async fn list_for_quiz(&self, quiz_id: &str) -> Result<Vec<AttemptRecord>, AttemptError> {
        Ok(self.collect(|key| key.quiz_id == quiz_id).await)
    }

    async fn list_for_participant(
        &self,
        participant_id: &str,
    ) -> Result<Vec<AttemptRecord>, AttemptError> {
        Ok(self.collect(|key| key.participant_id == participant_id).await)
    }

    async fn all(&self) -> Result<Vec<AttemptRecord>, AttemptError> {
        Ok(self.collect(|_| true).await)
    }

    async fn replace_all(&self, records: Vec<AttemptRecord>) -> Result<(), AttemptError> {
        let index: HashMap<AttemptKey, Slot> = records
            .into_iter()
            .map(|r| (r.key(), Arc::new(RwLock::new(r))))
            .collect();
        *self.records.write().await = index;
        Ok(())
    }
}
