//! Timed attempt session state machine.
//!
//! ```text
//! NotStarted --begin (inside window)--> Active
//! Active     --deadline or stop-------> Ended
//! Active     --finalize---------------> Submitted
//! Ended      --finalize---------------> Submitted
//! Submitted  --anything---------------> Submitted
//! ```
//!
//! There is no background timer per attempt. Each inbound call re-reads the
//! clock and enforces the deadline before doing anything else.

use super::AppState;
use crate::error::AttemptError;
use crate::scoring;
use crate::store::AnswerWrite;
use crate::types::*;
use chrono::{DateTime, Utc};

impl AppState {
    /// Start an attempt, or resume the existing one.
    pub async fn begin(
        &self,
        quiz_id: &str,
        participant_id: &str,
    ) -> Result<SessionView, AttemptError> {
        let now = self.now();
        let (_, record) = self.begin_at(quiz_id, participant_id, now).await?;
        Ok(self.view(&record, now))
    }

    /// Same as [`AppState::begin`], bundled with the questions and saved answers
    pub async fn begin_sheet(
        &self,
        quiz_id: &str,
        participant_id: &str,
    ) -> Result<AttemptSheet, AttemptError> {
        let now = self.now();
        let (quiz, record) = self.begin_at(quiz_id, participant_id, now).await?;

        let questions = if record.state == LifecycleState::Active {
            quiz.questions.iter().map(PublicQuestion::from).collect()
        } else {
            Vec::new()
        };

        Ok(AttemptSheet {
            session: self.view(&record, now),
            title: quiz.title,
            questions,
            answers: record.answers,
        })
    }

    async fn begin_at(
        &self,
        quiz_id: &str,
        participant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(QuizDefinition, AttemptRecord), AttemptError> {
        // Catalog read lock held across creation so a quiz cannot be deleted
        // between the lookup and the new record
        let quizzes = self.quizzes.read().await;
        let quiz = quizzes
            .get(quiz_id)
            .cloned()
            .ok_or(AttemptError::QuizNotFound)?;
        let (record, created) = self
            .attempts
            .get_or_create(&quiz, participant_id, now)
            .await?;
        drop(quizzes);

        if created {
            tracing::info!(
                "Attempt started: quiz={} participant={} deadline={}",
                quiz_id,
                participant_id,
                record.deadline
            );
        }

        let record = match record.state {
            LifecycleState::Ended => {
                let reason = record.ended_reason.unwrap_or(FinalizeReason::Timeout);
                self.finalize_record(&quiz, &record.key(), reason, now)
                    .await?
            }
            _ => self.enforce_deadline(&quiz, record, now).await?,
        };

        Ok((quiz, record))
    }

    /// Save one answer. Rejected once the deadline has passed.
    pub async fn record_answer(
        &self,
        quiz_id: &str,
        participant_id: &str,
        question_id: &str,
        option: OptionNumber,
    ) -> Result<SessionView, AttemptError> {
        let now = self.now();
        let quiz = self.get_quiz(quiz_id).await?;

        if quiz.question(question_id).is_none() {
            return Err(AttemptError::UnknownQuestion(question_id.to_string()));
        }
        if !Question::is_valid_option(option) {
            return Err(AttemptError::InvalidOption {
                question_id: question_id.to_string(),
                option,
            });
        }

        let key = AttemptKey::new(quiz_id, participant_id);

        if quiz.is_stopped() {
            let record = self
                .attempts
                .load(&key)
                .await?
                .ok_or(AttemptError::AttemptNotFound)?;
            let record = self.enforce_deadline(&quiz, record, now).await?;
            return Ok(self.view(&record, now));
        }

        match self
            .attempts
            .upsert_answer(&key, question_id, option, now)
            .await?
        {
            AnswerWrite::Written(record) => {
                tracing::debug!(
                    "Answer saved: quiz={} participant={} question={} option={}",
                    quiz_id,
                    participant_id,
                    question_id,
                    option
                );
                Ok(self.view(&record, now))
            }
            AnswerWrite::PastDeadline(record) => {
                tracing::warn!(
                    "Late answer rejected: quiz={} participant={} deadline={} now={}",
                    quiz_id,
                    participant_id,
                    record.deadline,
                    now
                );
                if self
                    .attempts
                    .transition_to_ended(&key, FinalizeReason::Timeout, now)
                    .await?
                {
                    tracing::info!(
                        "Attempt ended on late write: quiz={} participant={}",
                        quiz_id,
                        participant_id
                    );
                }
                Err(AttemptError::DeadlinePassed {
                    deadline: record.deadline,
                })
            }
            AnswerWrite::NotActive(record) if record.state == LifecycleState::Submitted => {
                Ok(self.view(&record, now))
            }
            AnswerWrite::NotActive(record) => Err(AttemptError::DeadlinePassed {
                deadline: record.deadline,
            }),
        }
    }

    /// Re-evaluate the attempt against the clock.
    ///
    /// An `Active` attempt found past its deadline is ended and finalized here.
    pub async fn poll(
        &self,
        quiz_id: &str,
        participant_id: &str,
    ) -> Result<SessionView, AttemptError> {
        let now = self.now();
        let quiz = self.get_quiz(quiz_id).await?;
        let key = AttemptKey::new(quiz_id, participant_id);

        let Some(record) = self.attempts.load(&key).await? else {
            return Ok(SessionView::not_started(now, self.poll_interval_secs));
        };

        let record = self.enforce_deadline(&quiz, record, now).await?;
        tracing::debug!(
            "Poll: quiz={} participant={} state={:?} remaining={}s",
            quiz_id,
            participant_id,
            record.state,
            record.remaining_seconds(now)
        );
        Ok(self.view(&record, now))
    }

    /// Submit the attempt. Repeated calls return the stored result unchanged.
    pub async fn finalize(
        &self,
        quiz_id: &str,
        participant_id: &str,
        reason: FinalizeReason,
    ) -> Result<SessionView, AttemptError> {
        let now = self.now();
        let quiz = self.get_quiz(quiz_id).await?;
        let key = AttemptKey::new(quiz_id, participant_id);

        let record = self
            .attempts
            .load(&key)
            .await?
            .ok_or(AttemptError::AttemptNotFound)?;

        if record.state == LifecycleState::Submitted {
            tracing::debug!(
                "Duplicate finalize ignored: quiz={} participant={} reason={:?}",
                quiz_id,
                participant_id,
                reason
            );
            return Ok(self.view(&record, now));
        }

        let record = self.finalize_record(&quiz, &key, reason, now).await?;
        Ok(self.view(&record, now))
    }

    /// Stop a quiz early. Every unfinished attempt is ended and scored.
    pub async fn force_stop(
        &self,
        creator_id: &str,
        quiz_id: &str,
    ) -> Result<QuizDefinition, AttemptError> {
        let now = self.now();
        let quiz = {
            let mut quizzes = self.quizzes.write().await;
            let quiz = quizzes.get_mut(quiz_id).ok_or(AttemptError::QuizNotFound)?;
            if quiz.creator_id != creator_id {
                return Err(AttemptError::Forbidden);
            }
            if quiz.stopped_at.is_none() {
                quiz.stopped_at = Some(now);
            }
            quiz.clone()
        };

        let mut finalized = 0;
        for record in self.attempts.list_for_quiz(quiz_id).await? {
            if record.state != LifecycleState::Submitted {
                self.finalize_record(&quiz, &record.key(), FinalizeReason::AdminStop, now)
                    .await?;
                finalized += 1;
            }
        }

        tracing::info!(
            "Quiz {} stopped by creator, {} attempts finalized",
            quiz_id,
            finalized
        );
        Ok(quiz)
    }

    /// End and finalize an `Active` attempt that is past its deadline or whose
    /// quiz was stopped. Anything else is returned untouched.
    pub(super) async fn enforce_deadline(
        &self,
        quiz: &QuizDefinition,
        record: AttemptRecord,
        now: DateTime<Utc>,
    ) -> Result<AttemptRecord, AttemptError> {
        if record.state != LifecycleState::Active {
            return Ok(record);
        }

        let reason = if record.is_past_deadline(now) {
            FinalizeReason::Timeout
        } else if quiz.is_stopped() {
            FinalizeReason::StatusDetectedEnd
        } else {
            return Ok(record);
        };

        self.finalize_record(quiz, &record.key(), reason, now).await
    }

    /// Freeze answers, score them and lock the record.
    ///
    /// Answers are frozen by the `Active -> Ended` swap before scoring, so the
    /// score always matches the answers stored on the submitted record. When
    /// two finalizations race, the store keeps the first and both callers see it.
    async fn finalize_record(
        &self,
        quiz: &QuizDefinition,
        key: &AttemptKey,
        reason: FinalizeReason,
        now: DateTime<Utc>,
    ) -> Result<AttemptRecord, AttemptError> {
        if self.attempts.transition_to_ended(key, reason, now).await? {
            tracing::info!(
                "Attempt ended: quiz={} participant={} reason={:?}",
                key.quiz_id,
                key.participant_id,
                reason
            );
        }

        let frozen = self
            .attempts
            .load(key)
            .await?
            .ok_or(AttemptError::AttemptNotFound)?;
        if frozen.state == LifecycleState::Submitted {
            return Ok(frozen);
        }

        let score = scoring::score(&frozen.answers, quiz);
        let record = self
            .attempts
            .transition_to_submitted(key, score, reason, now)
            .await?;

        tracing::info!(
            "Attempt submitted: quiz={} participant={} score={:?} reason={:?}",
            key.quiz_id,
            key.participant_id,
            record.score,
            record.submit_reason
        );
        self.persist_nudge.notify_one();
        Ok(record)
    }
}
