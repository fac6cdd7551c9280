//! Quiz catalog: creation, lookup, schedule edits and early stop.

use super::AppState;
use crate::error::AttemptError;
use crate::types::*;

/// Upper bound on the marks a single question can carry
pub const MAX_QUESTION_WEIGHT: u32 = 1000;

/// Check a quiz schedule for consistency
fn validate_schedule(quiz: &QuizDefinition) -> Result<(), AttemptError> {
    if quiz.closes_at <= quiz.opens_at {
        return Err(AttemptError::InvalidQuiz(
            "closes_at must be after opens_at".to_string(),
        ));
    }
    if quiz.duration_limit_secs == 0 {
        return Err(AttemptError::InvalidQuiz(
            "duration limit must be positive".to_string(),
        ));
    }
    Ok(())
}

fn build_question(index: usize, input: NewQuestion) -> Result<Question, AttemptError> {
    let number = index + 1;

    if input.prompt.trim().is_empty() {
        return Err(AttemptError::InvalidQuiz(format!(
            "question {} has an empty prompt",
            number
        )));
    }
    if input.options.iter().any(|o| o.trim().is_empty()) {
        return Err(AttemptError::InvalidQuiz(format!(
            "question {} has an empty option",
            number
        )));
    }
    let options: [String; OPTIONS_PER_QUESTION] = input.options.try_into().map_err(|_| {
        AttemptError::InvalidQuiz(format!(
            "question {} must have exactly {} options",
            number, OPTIONS_PER_QUESTION
        ))
    })?;
    if !Question::is_valid_option(input.correct_option) {
        return Err(AttemptError::InvalidQuiz(format!(
            "question {} has correct option {} out of range",
            number, input.correct_option
        )));
    }
    if input.weight == 0 {
        return Err(AttemptError::InvalidQuiz(format!(
            "question {} must be worth at least one mark",
            number
        )));
    }
    if input.weight > MAX_QUESTION_WEIGHT {
        return Err(AttemptError::InvalidQuiz(format!(
            "question {} is worth more than {} marks",
            number, MAX_QUESTION_WEIGHT
        )));
    }

    Ok(Question {
        id: ulid::Ulid::new().to_string(),
        prompt: input.prompt,
        options,
        correct_option: input.correct_option,
        weight: input.weight,
    })
}

impl AppState {
    /// Publish a new quiz owned by `creator_id`
    pub async fn create_quiz(
        &self,
        creator_id: &str,
        input: NewQuiz,
    ) -> Result<QuizDefinition, AttemptError> {
        if input.title.trim().is_empty() {
            return Err(AttemptError::InvalidQuiz("title is required".to_string()));
        }
        if input.questions.is_empty() {
            return Err(AttemptError::InvalidQuiz(
                "a quiz needs at least one question".to_string(),
            ));
        }

        let questions = input
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| build_question(i, q))
            .collect::<Result<Vec<_>, _>>()?;

        let quiz = QuizDefinition {
            id: ulid::Ulid::new().to_string(),
            title: input.title.trim().to_string(),
            creator_id: creator_id.to_string(),
            questions,
            opens_at: input.opens_at,
            closes_at: input.closes_at,
            duration_limit_secs: input.duration_limit_secs,
            stopped_at: None,
            created_at: self.now(),
        };
        validate_schedule(&quiz)?;

        self.quizzes
            .write()
            .await
            .insert(quiz.id.clone(), quiz.clone());

        tracing::info!(
            "Created quiz {} ({} questions) for creator {}",
            quiz.id,
            quiz.questions.len(),
            creator_id
        );
        Ok(quiz)
    }

    /// Get a quiz by ID
    pub async fn get_quiz(&self, quiz_id: &str) -> Result<QuizDefinition, AttemptError> {
        self.quizzes
            .read()
            .await
            .get(quiz_id)
            .cloned()
            .ok_or(AttemptError::QuizNotFound)
    }

    /// Quizzes created by one user, newest first
    pub async fn quizzes_by_creator(&self, creator_id: &str) -> Vec<QuizDefinition> {
        let mut quizzes: Vec<_> = self
            .quizzes
            .read()
            .await
            .values()
            .filter(|q| q.creator_id == creator_id)
            .cloned()
            .collect();
        quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        quizzes
    }

    /// Edit a quiz schedule. Attempts already in progress keep their deadline.
    pub async fn reschedule(
        &self,
        creator_id: &str,
        quiz_id: &str,
        change: ScheduleChange,
    ) -> Result<QuizDefinition, AttemptError> {
        let mut quizzes = self.quizzes.write().await;
        let quiz = quizzes.get_mut(quiz_id).ok_or(AttemptError::QuizNotFound)?;
        if quiz.creator_id != creator_id {
            return Err(AttemptError::Forbidden);
        }

        let mut updated = quiz.clone();
        if let Some(opens_at) = change.opens_at {
            updated.opens_at = opens_at;
        }
        if let Some(closes_at) = change.closes_at {
            updated.closes_at = closes_at;
        }
        if let Some(secs) = change.duration_limit_secs {
            updated.duration_limit_secs = secs;
        }
        validate_schedule(&updated)?;

        *quiz = updated.clone();
        tracing::info!(
            "Rescheduled quiz {}: {} .. {}, limit {}s",
            quiz_id,
            updated.opens_at,
            updated.closes_at,
            updated.duration_limit_secs
        );
        Ok(updated)
    }

    /// Remove a quiz nobody has attempted yet. Quizzes with attempts are kept
    /// so their records stay resolvable.
    pub async fn delete_quiz(&self, creator_id: &str, quiz_id: &str) -> Result<(), AttemptError> {
        let mut quizzes = self.quizzes.write().await;
        let quiz = quizzes.get(quiz_id).ok_or(AttemptError::QuizNotFound)?;
        if quiz.creator_id != creator_id {
            return Err(AttemptError::Forbidden);
        }
        if !self.attempts.list_for_quiz(quiz_id).await?.is_empty() {
            tracing::warn!("Refused to delete quiz {} with attempts", quiz_id);
            return Err(AttemptError::QuizHasAttempts);
        }

        quizzes.remove(quiz_id);
        tracing::info!("Deleted quiz {} for creator {}", quiz_id, creator_id);
        Ok(())
    }

    /// Status of a quiz as seen by one participant before (or instead of) attempting it
    pub async fn quiz_info(
        &self,
        quiz_id: &str,
        participant_id: &str,
    ) -> Result<QuizInfo, AttemptError> {
        let now = self.now();
        let quiz = self.get_quiz(quiz_id).await?;
        let key = AttemptKey::new(quiz_id, participant_id);
        let already_submitted = self
            .attempts
            .load(&key)
            .await?
            .is_some_and(|r| r.state == LifecycleState::Submitted);

        Ok(QuizInfo {
            quiz_id: quiz.id.clone(),
            title: quiz.title.clone(),
            question_count: quiz.questions.len(),
            opens_at: quiz.opens_at,
            closes_at: quiz.closes_at,
            duration_limit_secs: quiz.duration_limit_secs,
            started: now >= quiz.opens_at,
            ended: now >= quiz.closes_at || quiz.is_stopped(),
            already_submitted,
            seconds_until_open: u64::try_from((quiz.opens_at - now).num_seconds()).unwrap_or(0),
            server_now: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_create_quiz_assigns_ids() {
        let (state, _clock, quiz) = setup().await;

        assert_eq!(quiz.questions.len(), 2);
        assert_ne!(quiz.questions[0].id, quiz.questions[1].id);
        assert_eq!(quiz.creator_id, "creator");
        assert!(state.get_quiz(&quiz.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_quiz_validation() {
        let (state, _clock, _quiz) = setup().await;

        let mut no_questions = new_quiz();
        no_questions.questions.clear();
        assert!(matches!(
            state.create_quiz("creator", no_questions).await,
            Err(AttemptError::InvalidQuiz(_))
        ));

        let mut three_options = new_quiz();
        three_options.questions[0].options.pop();
        let err = state.create_quiz("creator", three_options).await.unwrap_err();
        assert!(err.to_string().contains("exactly 4 options"));

        let mut bad_correct = new_quiz();
        bad_correct.questions[1].correct_option = 5;
        assert!(state.create_quiz("creator", bad_correct).await.is_err());

        let mut zero_weight = new_quiz();
        zero_weight.questions[0].weight = 0;
        assert!(state.create_quiz("creator", zero_weight).await.is_err());

        let mut heavy = new_quiz();
        heavy.questions[0].weight = MAX_QUESTION_WEIGHT + 1;
        let err = state.create_quiz("creator", heavy).await.unwrap_err();
        assert!(err.to_string().contains("more than 1000 marks"));

        let mut inverted = new_quiz();
        inverted.closes_at = inverted.opens_at;
        assert!(state.create_quiz("creator", inverted).await.is_err());

        let mut no_limit = new_quiz();
        no_limit.duration_limit_secs = 0;
        assert!(state.create_quiz("creator", no_limit).await.is_err());
    }

    #[tokio::test]
    async fn test_get_quiz_not_found() {
        let (state, _clock, _quiz) = setup().await;
        assert!(matches!(
            state.get_quiz("missing").await,
            Err(AttemptError::QuizNotFound)
        ));
    }

    #[tokio::test]
    async fn test_quizzes_by_creator() {
        let (state, clock, first) = setup().await;
        clock.advance(Duration::seconds(1));
        let second = state.create_quiz("creator", new_quiz()).await.unwrap();
        state.create_quiz("someone-else", new_quiz()).await.unwrap();

        let mine = state.quizzes_by_creator("creator").await;
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, second.id);
        assert_eq!(mine[1].id, first.id);
    }

    #[tokio::test]
    async fn test_reschedule_requires_creator() {
        let (state, _clock, quiz) = setup().await;

        let change = ScheduleChange {
            duration_limit_secs: Some(60),
            ..Default::default()
        };
        assert!(matches!(
            state.reschedule("intruder", &quiz.id, change.clone()).await,
            Err(AttemptError::Forbidden)
        ));

        let updated = state.reschedule("creator", &quiz.id, change).await.unwrap();
        assert_eq!(updated.duration_limit_secs, 60);
    }

    #[tokio::test]
    async fn test_reschedule_rejects_inverted_window() {
        let (state, _clock, quiz) = setup().await;

        let change = ScheduleChange {
            closes_at: Some(quiz.opens_at - Duration::minutes(1)),
            ..Default::default()
        };
        assert!(state.reschedule("creator", &quiz.id, change).await.is_err());
        assert_eq!(
            state.get_quiz(&quiz.id).await.unwrap().closes_at,
            quiz.closes_at
        );
    }

    #[tokio::test]
    async fn test_quiz_info_phases() {
        let (state, clock, quiz) = setup().await;

        clock.set(t0() - Duration::seconds(90));
        let info = state.quiz_info(&quiz.id, "p1").await.unwrap();
        assert!(!info.started);
        assert!(!info.ended);
        assert_eq!(info.seconds_until_open, 90);
        assert_eq!(info.question_count, 2);

        clock.set(t0() + Duration::minutes(5));
        let info = state.quiz_info(&quiz.id, "p1").await.unwrap();
        assert!(info.started);
        assert_eq!(info.seconds_until_open, 0);

        clock.set(t0() + Duration::minutes(60));
        let info = state.quiz_info(&quiz.id, "p1").await.unwrap();
        assert!(info.ended);
        assert!(!info.already_submitted);
    }

    #[tokio::test]
    async fn test_oversized_weights_rejected_and_max_weights_finalize() {
        let (state, _clock, _quiz) = setup().await;

        let mut overflowing = new_quiz();
        overflowing.questions[0].weight = u32::MAX;
        overflowing.questions[1].weight = u32::MAX;
        assert!(matches!(
            state.create_quiz("creator", overflowing).await,
            Err(AttemptError::InvalidQuiz(_))
        ));

        let mut heaviest = new_quiz();
        heaviest.questions[0].weight = MAX_QUESTION_WEIGHT;
        heaviest.questions[1].weight = MAX_QUESTION_WEIGHT;
        let quiz = state.create_quiz("creator", heaviest).await.unwrap();

        state.begin(&quiz.id, "p1").await.unwrap();
        state
            .record_answer(&quiz.id, "p1", &quiz.questions[0].id, 1)
            .await
            .unwrap();
        state
            .record_answer(&quiz.id, "p1", &quiz.questions[1].id, 2)
            .await
            .unwrap();
        let view = state
            .finalize(&quiz.id, "p1", FinalizeReason::Manual)
            .await
            .unwrap();
        assert_eq!(view.score, Some(2 * MAX_QUESTION_WEIGHT));
    }

    #[tokio::test]
    async fn test_delete_quiz() {
        let (state, _clock, quiz) = setup().await;
        let untouched = state.create_quiz("creator", new_quiz()).await.unwrap();

        assert!(matches!(
            state.delete_quiz("someone-else", &untouched.id).await,
            Err(AttemptError::Forbidden)
        ));
        state.delete_quiz("creator", &untouched.id).await.unwrap();
        assert!(matches!(
            state.get_quiz(&untouched.id).await,
            Err(AttemptError::QuizNotFound)
        ));

        state.begin(&quiz.id, "p1").await.unwrap();
        assert!(matches!(
            state.delete_quiz("creator", &quiz.id).await,
            Err(AttemptError::QuizHasAttempts)
        ));
        assert!(state.get_quiz(&quiz.id).await.is_ok());
    }
}
