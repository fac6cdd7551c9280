use super::AppState;
use crate::error::AttemptError;
use crate::scoring;
use crate::types::*;

impl AppState {
    /// Results of a quiz for the caller.
    ///
    /// The quiz creator gets every submitted attempt; anyone else gets their own
    /// attempt, which must already be submitted.
    pub async fn attempt_result(
        &self,
        quiz_id: &str,
        caller_id: &str,
    ) -> Result<AttemptResult, AttemptError> {
        let now = self.now();
        let quiz = self.get_quiz(quiz_id).await?;

        if quiz.creator_id == caller_id {
            let attempts = self
                .attempts
                .list_for_quiz(quiz_id)
                .await?
                .iter()
                .filter(|r| r.state == LifecycleState::Submitted)
                .map(|r| scoring::summarize(r, &quiz))
                .collect();
            return Ok(AttemptResult::AttemptsList { attempts });
        }

        let key = AttemptKey::new(quiz_id, caller_id);
        let record = self
            .attempts
            .load(&key)
            .await?
            .ok_or(AttemptError::AttemptNotFound)?;
        // Looking at results counts as an interaction: settle an expired attempt first
        let record = self.enforce_deadline(&quiz, record, now).await?;

        if record.state != LifecycleState::Submitted {
            return Err(AttemptError::NotSubmitted);
        }

        Ok(AttemptResult::OwnAttempt {
            attempt: scoring::summarize(&record, &quiz),
        })
    }

    /// All attempts made by one participant, oldest first
    pub async fn attempted_quizzes(
        &self,
        participant_id: &str,
    ) -> Result<Vec<AttemptSummary>, AttemptError> {
        let records = self.attempts.list_for_participant(participant_id).await?;
        let quizzes = self.quizzes.read().await;

        Ok(records
            .iter()
            .filter_map(|r| {
                let quiz = quizzes.get(&r.quiz_id);
                if quiz.is_none() {
                    tracing::warn!("Attempt references missing quiz {}", r.quiz_id);
                }
                quiz.map(|q| scoring::summarize(r, q))
            })
            .collect())
    }
}
