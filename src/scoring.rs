//! Finalization scoring. Pure functions over an answer map and a quiz definition.

use crate::types::{
    AttemptRecord, AttemptSummary, LifecycleState, OptionNumber, QuestionId, QuizDefinition, Tally,
};
use std::collections::BTreeMap;

/// Sum of weights of correctly answered questions.
///
/// Answers for questions that are not part of the quiz are ignored. The sum
/// saturates, so scoring never panics on an oversized imported quiz.
pub fn score(answers: &BTreeMap<QuestionId, OptionNumber>, quiz: &QuizDefinition) -> u32 {
    quiz.questions
        .iter()
        .filter(|q| answers.get(&q.id) == Some(&q.correct_option))
        .fold(0u32, |acc, q| acc.saturating_add(q.weight))
}

/// Highest reachable score for a quiz
pub fn max_score(quiz: &QuizDefinition) -> u32 {
    quiz.questions
        .iter()
        .fold(0u32, |acc, q| acc.saturating_add(q.weight))
}

/// Correct / wrong / unanswered counts
pub fn tally(answers: &BTreeMap<QuestionId, OptionNumber>, quiz: &QuizDefinition) -> Tally {
    let mut tally = Tally {
        total: quiz.questions.len(),
        ..Tally::default()
    };

    for question in &quiz.questions {
        match answers.get(&question.id) {
            Some(selected) if *selected == question.correct_option => tally.correct += 1,
            Some(_) => tally.wrong += 1,
            None => tally.unanswered += 1,
        }
    }

    tally
}

/// Summarize a record against its quiz for result listings.
///
/// Correctness is withheld until the record is `Submitted`.
pub fn summarize(record: &AttemptRecord, quiz: &QuizDefinition) -> AttemptSummary {
    let graded = (record.state == LifecycleState::Submitted).then(|| tally(&record.answers, quiz));

    AttemptSummary {
        quiz_id: record.quiz_id.clone(),
        participant_id: record.participant_id.clone(),
        state: record.state,
        started_at: record.started_at,
        submitted_at: record.submitted_at,
        submit_reason: record.submit_reason,
        score: record.score,
        max_score: max_score(quiz),
        tally: graded,
        answers: record.answers.clone(),
    }
}
