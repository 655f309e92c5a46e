//! Violation accounting and lifecycle for a single exam attempt.
//!
//! The machine performs no I/O. Every transition returns the list of
//! [`Effect`]s the caller has to carry out, in order.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::activity_log::ActivityType;
use crate::models::answer::Answer;
use crate::models::exam_session::{ExamSession, Score, SessionState};
use crate::models::question::{sample_questions, Question};
use crate::models::scheduled_exam::ScheduledExam;
use crate::models::violation::{Violation, ViolationType};
use crate::services::behavior_service::{BehaviorVerdict, ClassifierError};
use crate::services::grading_service::GradingService;

pub const MAX_VIOLATIONS: u32 = 3;
pub const DEFAULT_DURATION_SECONDS: u32 = 1800;
pub const CAMERA_UNAVAILABLE_REASON: &str =
    "Camera access denied or unavailable. Exam cannot be proctored.";

#[derive(Debug, Clone)]
pub struct ExamDescriptor {
    pub exam_id: Uuid,
    pub name: String,
    pub duration_seconds: Option<u32>,
    pub questions: Vec<Question>,
}

impl ExamDescriptor {
    pub fn from_scheduled(exam: &ScheduledExam) -> Self {
        let questions = exam
            .questions
            .clone()
            .and_then(|v| serde_json::from_value::<Vec<Question>>(v).ok())
            .filter(|q| !q.is_empty())
            .unwrap_or_else(sample_questions);

        Self {
            exam_id: exam.id,
            name: exam.name.clone(),
            duration_seconds: exam
                .duration_minutes
                .filter(|m| *m > 0)
                .map(|m| (m as u32).saturating_mul(60)),
            questions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitCause {
    Manual,
    TimeExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ScheduleTimers,
    CancelTimers,
    ReleaseCamera,
    LogActivity {
        activity_type: ActivityType,
        details: String,
        timestamp: DateTime<Utc>,
    },
    Warn {
        message: String,
        violation: Violation,
    },
    RecordDisqualification {
        reason: String,
        timestamp: DateTime<Utc>,
    },
    RecordResult {
        score: Score,
        cause: SubmitCause,
    },
}

/// Inputs handed to the behavior classifier for one capture round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub round: u64,
    pub elapsed_seconds: u32,
    pub question_number: usize,
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    session: ExamSession,
    questions: Vec<Question>,
    question_started_at: u32,
    capture_round: u64,
    capture_in_flight: bool,
}

impl SessionMachine {
    pub fn new(exam_id: Uuid, user_id: impl Into<String>, user_email: Option<String>) -> Self {
        Self {
            session: ExamSession::new(exam_id, user_id, user_email),
            questions: Vec::new(),
            question_started_at: 0,
            capture_round: 0,
            capture_in_flight: false,
        }
    }

    pub fn session(&self) -> &ExamSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn capture_in_flight(&self) -> bool {
        self.capture_in_flight
    }

    pub fn start(&mut self, exam: &ExamDescriptor, now: DateTime<Utc>) -> Vec<Effect> {
        if self.session.state != SessionState::NotStarted {
            return Vec::new();
        }

        let s = &mut self.session;
        s.state = SessionState::InProgress;
        s.started_at = Some(now);
        s.ended_at = None;
        s.time_remaining_seconds = exam
            .duration_seconds
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_DURATION_SECONDS);
        s.total_time_spent_seconds = 0;
        s.violation_count = 0;
        s.disqualification_reason = None;
        s.current_question_index = 0;
        s.answers.clear();
        s.score = None;

        self.questions = exam.questions.clone();
        self.question_started_at = 0;
        self.capture_in_flight = false;

        vec![
            Effect::ScheduleTimers,
            Effect::LogActivity {
                activity_type: ActivityType::ExamStart,
                details: format!("Exam started: {}", exam.name),
                timestamp: now,
            },
        ]
    }

    /// One second of exam time. Reaching zero submits on the same call.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        if self.session.state != SessionState::InProgress {
            return Vec::new();
        }

        self.session.time_remaining_seconds = self.session.time_remaining_seconds.saturating_sub(1);
        self.session.total_time_spent_seconds += 1;

        if self.session.time_remaining_seconds == 0 {
            return self.finish(SubmitCause::TimeExpired, now);
        }
        Vec::new()
    }

    /// Opens a capture round unless one is already outstanding.
    pub fn begin_capture(&mut self) -> Option<CaptureRequest> {
        if self.session.state != SessionState::InProgress || self.capture_in_flight {
            return None;
        }
        self.capture_in_flight = true;
        self.capture_round += 1;
        Some(CaptureRequest {
            round: self.capture_round,
            elapsed_seconds: self.session.total_time_spent_seconds,
            question_number: self.session.current_question_index + 1,
        })
    }

    /// Closes a round without a verdict (no frame was available).
    pub fn abandon_capture(&mut self, round: u64) {
        if self.capture_in_flight && round == self.capture_round {
            self.capture_in_flight = false;
        }
    }

    pub fn complete_capture(
        &mut self,
        round: u64,
        outcome: std::result::Result<BehaviorVerdict, ClassifierError>,
        now: DateTime<Utc>,
    ) -> Vec<Effect> {
        if !self.capture_in_flight || round != self.capture_round {
            return Vec::new();
        }
        self.capture_in_flight = false;

        if self.session.state != SessionState::InProgress {
            return Vec::new();
        }

        match outcome {
            Ok(verdict) if verdict.is_suspicious => {
                self.record_violation(&verdict.reason, ViolationType::Behavior, now)
            }
            Ok(_) => Vec::new(),
            Err(err) => vec![Effect::LogActivity {
                activity_type: ActivityType::ClassifierError,
                details: format!("Behavior analysis unavailable: {}", err),
                timestamp: now,
            }],
        }
    }

    pub fn record_violation(
        &mut self,
        reason: &str,
        violation_type: ViolationType,
        now: DateTime<Utc>,
    ) -> Vec<Effect> {
        if self.session.state != SessionState::InProgress {
            return Vec::new();
        }

        self.session.violation_count += 1;
        let count = self.session.violation_count;

        let mut effects = vec![Effect::LogActivity {
            activity_type: violation_type.activity_type(),
            details: reason.to_string(),
            timestamp: now,
        }];

        if count >= MAX_VIOLATIONS {
            let message = format!(
                "Exceeded maximum violations ({}). Last violation: {}",
                count, reason
            );
            effects.extend(self.disqualify(&message, now));
        } else {
            effects.push(Effect::Warn {
                message: format!("{} (violation {}/{})", reason, count, MAX_VIOLATIONS),
                violation: Violation {
                    violation_type,
                    reason: reason.to_string(),
                    timestamp: now,
                },
            });
        }
        effects
    }

    pub fn disqualify(&mut self, reason: &str, now: DateTime<Utc>) -> Vec<Effect> {
        if self.session.state != SessionState::InProgress {
            return Vec::new();
        }

        self.session.state = SessionState::Disqualified;
        self.session.disqualification_reason = Some(reason.to_string());
        self.session.ended_at = Some(now);
        self.capture_in_flight = false;

        vec![
            Effect::CancelTimers,
            Effect::ReleaseCamera,
            Effect::LogActivity {
                activity_type: ActivityType::Disqualification,
                details: reason.to_string(),
                timestamp: now,
            },
            Effect::RecordDisqualification {
                reason: reason.to_string(),
                timestamp: now,
            },
        ]
    }

    pub fn camera_unavailable(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        self.disqualify(CAMERA_UNAVAILABLE_REASON, now)
    }

    pub fn submit(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        self.finish(SubmitCause::Manual, now)
    }

    fn finish(&mut self, cause: SubmitCause, now: DateTime<Utc>) -> Vec<Effect> {
        if self.session.state != SessionState::InProgress {
            return Vec::new();
        }

        let score = GradingService::grade(&self.questions, &self.session.answers);
        self.session.state = SessionState::Submitted;
        self.session.score = Some(score);
        self.session.ended_at = Some(now);
        self.capture_in_flight = false;

        let details = match cause {
            SubmitCause::Manual => format!("Exam submitted. Score: {}/{}", score.correct, score.total),
            SubmitCause::TimeExpired => format!(
                "Exam auto-submitted (time expired). Score: {}/{}",
                score.correct, score.total
            ),
        };

        vec![
            Effect::CancelTimers,
            Effect::ReleaseCamera,
            Effect::RecordResult { score, cause },
            Effect::LogActivity {
                activity_type: ActivityType::ExamSubmit,
                details,
                timestamp: now,
            },
        ]
    }

    /// Stores an answer and moves on to the following question.
    /// Returns `false` when the session is not running or the question is unknown.
    pub fn answer(&mut self, question_id: &str, selected_answer: &str) -> bool {
        if self.session.state != SessionState::InProgress {
            return false;
        }
        let Some(position) = self.questions.iter().position(|q| q.id == question_id) else {
            return false;
        };

        let elapsed = self.session.total_time_spent_seconds;
        let spent = elapsed.saturating_sub(self.question_started_at);
        match self
            .session
            .answers
            .iter_mut()
            .find(|a| a.question_id == question_id)
        {
            // Revisits add to the time already spent on the question.
            Some(existing) => {
                existing.selected_answer = selected_answer.to_string();
                existing.time_spent_seconds = existing.time_spent_seconds.saturating_add(spent);
            }
            None => self.session.answers.push(Answer {
                question_id: question_id.to_string(),
                selected_answer: selected_answer.to_string(),
                time_spent_seconds: spent,
            }),
        }

        let last = self.questions.len().saturating_sub(1);
        self.session.current_question_index = (position + 1).min(last);
        self.question_started_at = elapsed;
        true
    }

    /// Back to exam selection. A running session is torn down without a terminal record.
    pub fn reset(&mut self) -> Vec<Effect> {
        let effects = if self.session.state == SessionState::InProgress {
            vec![Effect::CancelTimers, Effect::ReleaseCamera]
        } else {
            Vec::new()
        };

        self.session = ExamSession::new(
            self.session.exam_id,
            self.session.user_id.clone(),
            self.session.user_email.clone(),
        );
        self.questions.clear();
        self.question_started_at = 0;
        self.capture_in_flight = false;
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exam(duration_seconds: Option<u32>) -> ExamDescriptor {
        ExamDescriptor {
            exam_id: Uuid::new_v4(),
            name: "Midterm".to_string(),
            duration_seconds,
            questions: sample_questions(),
        }
    }

    fn started(duration_seconds: Option<u32>) -> SessionMachine {
        let exam = exam(duration_seconds);
        let mut m = SessionMachine::new(exam.exam_id, "user-1", Some("u@example.com".into()));
        m.start(&exam, Utc::now());
        m
    }

    fn count_disqualification_records(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::RecordDisqualification { .. }))
            .count()
    }

    #[test]
    fn start_initializes_counters_and_schedules_timers() {
        let exam = exam(Some(600));
        let mut m = SessionMachine::new(exam.exam_id, "user-1", None);
        let effects = m.start(&exam, Utc::now());

        assert_eq!(m.state(), SessionState::InProgress);
        assert_eq!(m.session().time_remaining_seconds, 600);
        assert_eq!(m.session().violation_count, 0);
        assert!(m.session().started_at.is_some());
        assert_eq!(effects[0], Effect::ScheduleTimers);
        assert!(matches!(
            &effects[1],
            Effect::LogActivity { activity_type: ActivityType::ExamStart, details, .. } if details.contains("Midterm")
        ));
    }

    #[test]
    fn missing_or_zero_duration_falls_back_to_default() {
        assert_eq!(started(None).session().time_remaining_seconds, DEFAULT_DURATION_SECONDS);
        assert_eq!(started(Some(0)).session().time_remaining_seconds, DEFAULT_DURATION_SECONDS);
    }

    #[test]
    fn start_is_a_noop_unless_not_started() {
        let mut m = started(Some(60));
        assert!(m.start(&exam(Some(120)), Utc::now()).is_empty());
        assert_eq!(m.session().time_remaining_seconds, 60);
    }

    #[test]
    fn second_violation_warns_third_disqualifies() {
        let mut m = started(None);
        let now = Utc::now();

        let first = m.record_violation("looking away", ViolationType::Behavior, now);
        assert!(first.iter().any(|e| matches!(e, Effect::Warn { message, .. } if message.contains("1/3"))));

        let second = m.record_violation("tab hidden", ViolationType::Visibility, now);
        assert!(second.iter().any(|e| matches!(e, Effect::Warn { message, .. } if message.contains("2/3"))));
        assert_eq!(m.state(), SessionState::InProgress);

        let third = m.record_violation("talking", ViolationType::Behavior, now);
        assert_eq!(m.state(), SessionState::Disqualified);
        assert_eq!(count_disqualification_records(&third), 1);
        assert!(!third.iter().any(|e| matches!(e, Effect::Warn { .. })));
    }

    #[test]
    fn violation_log_entries_carry_the_mapped_activity_type() {
        let mut m = started(None);
        let effects = m.record_violation("copied text", ViolationType::Clipboard, Utc::now());
        assert!(matches!(
            &effects[0],
            Effect::LogActivity { activity_type: ActivityType::CopyPaste, details, .. } if details == "copied text"
        ));
    }

    #[test]
    fn three_behavior_violations_disqualify_with_summary_reason() {
        let mut m = started(None);
        for _ in 0..3 {
            m.record_violation("talking", ViolationType::Behavior, Utc::now());
        }
        assert_eq!(m.state(), SessionState::Disqualified);
        let reason = m.session().disqualification_reason.clone().unwrap();
        assert!(reason.contains("Exceeded maximum violations (3)"));
        assert!(reason.contains("talking"));
    }

    #[test]
    fn violation_count_is_frozen_after_disqualification() {
        let mut m = started(None);
        for i in 0..10 {
            m.record_violation(&format!("signal {}", i), ViolationType::Visibility, Utc::now());
        }
        assert_eq!(m.session().violation_count, MAX_VIOLATIONS);
    }

    #[test]
    fn disqualify_twice_yields_one_record() {
        let mut m = started(None);
        let now = Utc::now();
        let mut effects = m.disqualify("manual test", now);
        effects.extend(m.disqualify("manual test", now));

        assert_eq!(count_disqualification_records(&effects), 1);
        let log_entries = effects
            .iter()
            .filter(|e| matches!(e, Effect::LogActivity { activity_type: ActivityType::Disqualification, .. }))
            .count();
        assert_eq!(log_entries, 1);
    }

    #[test]
    fn late_violation_after_disqualify_is_ignored() {
        let mut m = started(None);
        m.disqualify("manual test", Utc::now());
        let effects = m.record_violation("late signal", ViolationType::Behavior, Utc::now());

        assert!(effects.is_empty());
        assert_eq!(m.session().violation_count, 0);
        assert_eq!(m.session().disqualification_reason.as_deref(), Some("manual test"));
    }

    #[test]
    fn terminal_states_ignore_ticks_and_captures() {
        let mut m = started(Some(100));
        m.submit(Utc::now());
        let before = m.session().clone();

        assert!(m.tick(Utc::now()).is_empty());
        assert!(m.record_violation("x", ViolationType::Clipboard, Utc::now()).is_empty());
        assert!(m.begin_capture().is_none());
        assert_eq!(m.session().time_remaining_seconds, before.time_remaining_seconds);
        assert_eq!(m.session().total_time_spent_seconds, before.total_time_spent_seconds);
        assert_eq!(m.state(), SessionState::Submitted);
    }

    #[test]
    fn tick_at_one_second_submits_on_the_same_call() {
        let mut m = started(Some(2));
        assert!(m.tick(Utc::now()).is_empty());
        assert_eq!(m.session().time_remaining_seconds, 1);

        let effects = m.tick(Utc::now());
        assert_eq!(m.session().time_remaining_seconds, 0);
        assert_eq!(m.state(), SessionState::Submitted);
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::RecordResult { cause: SubmitCause::TimeExpired, .. }
        )));
    }

    #[test]
    fn full_duration_without_violations_submits() {
        let mut m = started(Some(600));
        for _ in 0..600 {
            m.tick(Utc::now());
        }
        assert_eq!(m.state(), SessionState::Submitted);
        assert_eq!(m.session().time_remaining_seconds, 0);
        assert_eq!(m.session().total_time_spent_seconds, 600);
    }

    #[test]
    fn disqualification_wins_over_expiring_timer() {
        let mut m = started(Some(1));
        m.record_violation("a", ViolationType::Visibility, Utc::now());
        m.record_violation("b", ViolationType::Visibility, Utc::now());
        m.record_violation("c", ViolationType::Behavior, Utc::now());

        assert!(m.tick(Utc::now()).is_empty());
        assert_eq!(m.state(), SessionState::Disqualified);
        assert!(m.session().score.is_none());
    }

    #[test]
    fn overlapping_capture_rounds_are_skipped() {
        let mut m = started(None);
        let first = m.begin_capture().expect("first round");
        assert!(m.begin_capture().is_none());

        m.complete_capture(
            first.round,
            Ok(BehaviorVerdict { is_suspicious: false, reason: "ok".into() }),
            Utc::now(),
        );
        assert!(m.begin_capture().is_some());
    }

    #[test]
    fn capture_request_reports_elapsed_time_and_question_number() {
        let mut m = started(None);
        m.tick(Utc::now());
        m.tick(Utc::now());
        m.answer("q1", "Paris");

        let req = m.begin_capture().unwrap();
        assert_eq!(req.elapsed_seconds, 2);
        assert_eq!(req.question_number, 2);
    }

    #[test]
    fn suspicious_verdict_counts_as_behavior_violation() {
        let mut m = started(None);
        let req = m.begin_capture().unwrap();
        let effects = m.complete_capture(
            req.round,
            Ok(BehaviorVerdict { is_suspicious: true, reason: "Multiple faces detected".into() }),
            Utc::now(),
        );
        assert_eq!(m.session().violation_count, 1);
        assert!(matches!(
            &effects[0],
            Effect::LogActivity { activity_type: ActivityType::AiWarning, .. }
        ));
    }

    #[test]
    fn classifier_failure_is_logged_but_not_counted() {
        let mut m = started(None);
        let req = m.begin_capture().unwrap();
        let effects = m.complete_capture(
            req.round,
            Err(ClassifierError::Timeout),
            Utc::now(),
        );

        assert_eq!(m.session().violation_count, 0);
        assert_eq!(m.state(), SessionState::InProgress);
        assert_eq!(effects.len(), 1);
        assert!(matches!(
            &effects[0],
            Effect::LogActivity { activity_type: ActivityType::ClassifierError, .. }
        ));
        assert!(!m.capture_in_flight());
    }

    #[test]
    fn verdict_arriving_after_submission_is_discarded() {
        let mut m = started(None);
        let req = m.begin_capture().unwrap();
        m.submit(Utc::now());

        let effects = m.complete_capture(
            req.round,
            Ok(BehaviorVerdict { is_suspicious: true, reason: "phone".into() }),
            Utc::now(),
        );
        assert!(effects.is_empty());
        assert_eq!(m.session().violation_count, 0);
    }

    #[test]
    fn stale_round_results_are_ignored() {
        let mut m = started(None);
        let req = m.begin_capture().unwrap();
        m.abandon_capture(req.round);
        let next = m.begin_capture().unwrap();

        let effects = m.complete_capture(
            req.round,
            Ok(BehaviorVerdict { is_suspicious: true, reason: "phone".into() }),
            Utc::now(),
        );
        assert!(effects.is_empty());
        assert!(m.capture_in_flight());
        assert_ne!(req.round, next.round);
    }

    #[test]
    fn camera_failure_disqualifies_with_fixed_reason() {
        let mut m = started(None);
        let effects = m.camera_unavailable(Utc::now());
        assert_eq!(m.state(), SessionState::Disqualified);
        assert_eq!(
            m.session().disqualification_reason.as_deref(),
            Some(CAMERA_UNAVAILABLE_REASON)
        );
        assert!(effects.contains(&Effect::ReleaseCamera));
    }

    #[test]
    fn submit_scores_answers_and_releases_resources() {
        let mut m = started(None);
        assert!(m.answer("q1", "Paris"));
        assert!(m.answer("q2", "Earth"));
        let effects = m.submit(Utc::now());

        let score = m.session().score.unwrap();
        assert_eq!(score.correct, 1);
        assert_eq!(score.total, sample_questions().len() as u32);
        assert_eq!(effects[0], Effect::CancelTimers);
        assert_eq!(effects[1], Effect::ReleaseCamera);
        assert!(m.submit(Utc::now()).is_empty());
    }

    #[test]
    fn answers_to_unknown_questions_are_rejected() {
        let mut m = started(None);
        assert!(!m.answer("q404", "x"));
        assert!(m.session().answers.is_empty());
    }

    #[test]
    fn reanswering_keeps_the_time_already_spent() {
        let mut m = started(None);
        for _ in 0..5 {
            m.tick(Utc::now());
        }
        assert!(m.answer("q1", "London"));
        for _ in 0..4 {
            m.tick(Utc::now());
        }
        assert!(m.answer("q1", "Paris"));

        let answers = &m.session().answers;
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].selected_answer, "Paris");
        assert_eq!(answers[0].time_spent_seconds, 9);
    }

    #[test]
    fn reset_returns_to_not_started() {
        let mut m = started(None);
        m.record_violation("a", ViolationType::Visibility, Utc::now());
        let effects = m.reset();

        assert_eq!(effects, vec![Effect::CancelTimers, Effect::ReleaseCamera]);
        assert_eq!(m.state(), SessionState::NotStarted);
        assert_eq!(m.session().violation_count, 0);
        assert!(m.reset().is_empty());
    }
}
