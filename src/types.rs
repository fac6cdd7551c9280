use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque ID types for type safety
pub type QuizId = String;
pub type QuestionId = String;
pub type ParticipantId = String;

/// Selected option number, 1-based (1..=4)
pub type OptionNumber = u8;

/// Every question offers exactly this many options
pub const OPTIONS_PER_QUESTION: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    pub options: [String; OPTIONS_PER_QUESTION],
    pub correct_option: OptionNumber,
    pub weight: u32,
}

impl Question {
    pub fn is_valid_option(option: OptionNumber) -> bool {
        (1..=OPTIONS_PER_QUESTION as OptionNumber).contains(&option)
    }
}

/// Immutable quiz definition as published by the catalog.
///
/// Schedule fields can still be edited by the creator, but attempts that have
/// already started keep the deadline they were issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDefinition {
    pub id: QuizId,
    pub title: String,
    pub creator_id: ParticipantId,
    pub questions: Vec<Question>,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub duration_limit_secs: u32,
    /// Set when the creator stops the quiz early
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl QuizDefinition {
    pub fn duration_limit(&self) -> Duration {
        Duration::seconds(i64::from(self.duration_limit_secs))
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }

    /// Personal deadline for an attempt starting at `started_at`
    pub fn deadline_for(&self, started_at: DateTime<Utc>) -> DateTime<Utc> {
        (started_at + self.duration_limit()).min(self.closes_at)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    NotStarted,
    Active,
    Ended,
    Submitted,
}

impl LifecycleState {
    /// Transitions only ever move forward
    pub fn can_transition_to(self, to: LifecycleState) -> bool {
        use LifecycleState::*;

        matches!(
            (self, to),
            (NotStarted, Active) | (Active, Ended) | (Active, Submitted) | (Ended, Submitted)
        )
    }
}

/// Why an attempt was ended or finalized. Audit only, never changes the outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeReason {
    Manual,
    Timeout,
    AdminStop,
    StatusDetectedEnd,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptKey {
    pub quiz_id: QuizId,
    pub participant_id: ParticipantId,
}

impl AttemptKey {
    pub fn new(quiz_id: impl Into<QuizId>, participant_id: impl Into<ParticipantId>) -> Self {
        Self {
            quiz_id: quiz_id.into(),
            participant_id: participant_id.into(),
        }
    }
}

/// One participant's single attempt at a quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptRecord {
    pub quiz_id: QuizId,
    pub participant_id: ParticipantId,
    pub started_at: DateTime<Utc>,
    /// Fixed at creation, never recomputed
    pub deadline: DateTime<Utc>,
    pub answers: BTreeMap<QuestionId, OptionNumber>,
    pub state: LifecycleState,
    pub ended_at: Option<DateTime<Utc>>,
    pub ended_reason: Option<FinalizeReason>,
    pub score: Option<u32>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub submit_reason: Option<FinalizeReason>,
    /// Bumped on every successful write
    pub version: u64,
}

impl AttemptRecord {
    pub fn start(quiz: &QuizDefinition, participant_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            quiz_id: quiz.id.clone(),
            participant_id: participant_id.to_string(),
            started_at: now,
            deadline: quiz.deadline_for(now),
            answers: BTreeMap::new(),
            state: LifecycleState::Active,
            ended_at: None,
            ended_reason: None,
            score: None,
            submitted_at: None,
            submit_reason: None,
            version: 1,
        }
    }

    pub fn key(&self) -> AttemptKey {
        AttemptKey::new(self.quiz_id.clone(), self.participant_id.clone())
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// Whole seconds left before the deadline, floored at zero
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((self.deadline - now).num_seconds()).unwrap_or(0)
    }
}

/// What the presentation client sees after every session call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionView {
    pub lifecycle_state: LifecycleState,
    pub remaining_seconds: u64,
    pub already_submitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub server_now: DateTime<Utc>,
    pub poll_interval_seconds: u64,
}

impl SessionView {
    pub fn from_record(
        record: &AttemptRecord,
        now: DateTime<Utc>,
        poll_interval_seconds: u64,
    ) -> Self {
        let remaining_seconds = match record.state {
            LifecycleState::Active => record.remaining_seconds(now),
            _ => 0,
        };

        Self {
            lifecycle_state: record.state,
            remaining_seconds,
            already_submitted: record.state == LifecycleState::Submitted,
            score: record.score,
            deadline: Some(record.deadline),
            server_now: now,
            poll_interval_seconds,
        }
    }

    /// View for a participant that has no attempt yet
    pub fn not_started(now: DateTime<Utc>, poll_interval_seconds: u64) -> Self {
        Self {
            lifecycle_state: LifecycleState::NotStarted,
            remaining_seconds: 0,
            already_submitted: false,
            score: None,
            deadline: None,
            server_now: now,
            poll_interval_seconds,
        }
    }
}

/// Question as shown to a participant (answer key and weight hidden)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: QuestionId,
    pub prompt: String,
    pub options: [String; OPTIONS_PER_QUESTION],
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            prompt: q.prompt.clone(),
            options: q.options.clone(),
        }
    }
}

/// Payload returned when a participant begins (or resumes) an attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSheet {
    pub session: SessionView,
    pub title: String,
    /// Only populated while the attempt is active
    pub questions: Vec<PublicQuestion>,
    pub answers: BTreeMap<QuestionId, OptionNumber>,
}

/// Pre-attempt status of a quiz for one participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizInfo {
    pub quiz_id: QuizId,
    pub title: String,
    pub question_count: usize,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub duration_limit_secs: u32,
    pub started: bool,
    pub ended: bool,
    pub already_submitted: bool,
    pub seconds_until_open: u64,
    pub server_now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tally {
    pub correct: usize,
    pub wrong: usize,
    pub unanswered: usize,
    pub total: usize,
}

/// One attempt as listed in results.
///
/// Grading (`score` and `tally`) is only present once the attempt is
/// `Submitted`; an unfinished attempt shows its saved answers and nothing
/// about their correctness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub quiz_id: QuizId,
    pub participant_id: ParticipantId,
    pub state: LifecycleState,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub submit_reason: Option<FinalizeReason>,
    pub score: Option<u32>,
    pub max_score: u32,
    pub tally: Option<Tally>,
    pub answers: BTreeMap<QuestionId, OptionNumber>,
}

/// Results for a quiz, shaped by the caller's role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptResult {
    OwnAttempt { attempt: AttemptSummary },
    AttemptsList { attempts: Vec<AttemptSummary> },
}

/// Input for creating a quiz question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: OptionNumber,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Input for creating a quiz
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuiz {
    pub title: String,
    pub questions: Vec<NewQuestion>,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub duration_limit_secs: u32,
}

/// Creator edit of a quiz schedule; absent fields keep their value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleChange {
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub duration_limit_secs: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn quiz(opens_at: DateTime<Utc>, minutes_open: i64, limit_secs: u32) -> QuizDefinition {
        QuizDefinition {
            id: "quiz".to_string(),
            title: "Quiz".to_string(),
            creator_id: "creator".to_string(),
            questions: vec![],
            opens_at,
            closes_at: opens_at + Duration::minutes(minutes_open),
            duration_limit_secs: limit_secs,
            stopped_at: None,
            created_at: opens_at,
        }
    }

    #[test]
    fn test_deadline_truncated_by_close() {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let q = quiz(t0, 60, 20 * 60);

        assert_eq!(q.deadline_for(t0 + Duration::minutes(50)), t0 + Duration::minutes(60));
        assert_eq!(q.deadline_for(t0 + Duration::minutes(10)), t0 + Duration::minutes(30));
    }

    #[test]
    fn test_remaining_seconds_floors_at_zero() {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let q = quiz(t0, 60, 90);
        let record = AttemptRecord::start(&q, "p1", t0);

        assert_eq!(record.remaining_seconds(t0), 90);
        assert_eq!(record.remaining_seconds(t0 + Duration::milliseconds(1500)), 88);
        assert_eq!(record.remaining_seconds(t0 + Duration::seconds(90)), 0);
        assert_eq!(record.remaining_seconds(t0 + Duration::hours(2)), 0);
    }

    #[test]
    fn test_lifecycle_transitions_are_forward_only() {
        use LifecycleState::*;

        assert!(NotStarted.can_transition_to(Active));
        assert!(Active.can_transition_to(Ended));
        assert!(Active.can_transition_to(Submitted));
        assert!(Ended.can_transition_to(Submitted));

        assert!(!Ended.can_transition_to(Active));
        assert!(!Submitted.can_transition_to(Active));
        assert!(!Submitted.can_transition_to(Ended));
        assert!(!Active.can_transition_to(NotStarted));
    }

    #[test]
    fn test_option_range() {
        assert!(!Question::is_valid_option(0));
        assert!(Question::is_valid_option(1));
        assert!(Question::is_valid_option(4));
        assert!(!Question::is_valid_option(5));
    }

    #[test]
    fn test_attempt_result_is_tagged_by_kind() {
        let json = serde_json::to_value(AttemptResult::AttemptsList { attempts: vec![] }).unwrap();
        assert_eq!(json["kind"], "attempts_list");
        assert!(json["attempts"].as_array().unwrap().is_empty());
    }
}
