mod catalog;
pub mod export;
mod results;
mod session;

pub use catalog::MAX_QUESTION_WEIGHT;

use crate::clock::{Clock, SystemClock};
use crate::store::{AttemptStore, MemoryStore};
use crate::types::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

/// Advisory interval at which clients should poll attempt status
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 4;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub clock: Arc<dyn Clock>,
    pub quizzes: Arc<RwLock<HashMap<QuizId, QuizDefinition>>>,
    pub attempts: Arc<dyn AttemptStore>,
    pub poll_interval_secs: u64,
    /// Signalled after every submission so the snapshot writer persists it promptly
    pub persist_nudge: Arc<Notify>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_parts(clock, Arc::new(MemoryStore::new()))
    }

    pub fn with_parts(clock: Arc<dyn Clock>, attempts: Arc<dyn AttemptStore>) -> Self {
        Self {
            clock,
            quizzes: Arc::new(RwLock::new(HashMap::new())),
            attempts,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            persist_nudge: Arc::new(Notify::new()),
        }
    }

    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Authoritative "now" for every time comparison
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn view(&self, record: &AttemptRecord, now: DateTime<Utc>) -> SessionView {
        SessionView::from_record(record, now, self.poll_interval_secs)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    pub fn question(prompt: &str, correct_option: OptionNumber, weight: u32) -> NewQuestion {
        NewQuestion {
            prompt: prompt.to_string(),
            options: vec![
                "first".to_string(),
                "second".to_string(),
                "third".to_string(),
                "fourth".to_string(),
            ],
            correct_option,
            weight,
        }
    }

    /// Quiz open T0..T0+60m with a 20 minute limit, two questions (A:1, B:2)
    pub fn new_quiz() -> NewQuiz {
        NewQuiz {
            title: "Ownership and borrowing".to_string(),
            questions: vec![question("A", 1, 1), question("B", 2, 1)],
            opens_at: t0(),
            closes_at: t0() + Duration::minutes(60),
            duration_limit_secs: 20 * 60,
        }
    }

    pub async fn setup() -> (AppState, ManualClock, QuizDefinition) {
        let clock = ManualClock::new(t0());
        let state = AppState::with_clock(Arc::new(clock.clone()));
        let quiz = state.create_quiz("creator", new_quiz()).await.unwrap();
        (state, clock, quiz)
    }
}
