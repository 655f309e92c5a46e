use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::dto::session_dto::SessionSnapshot;
use crate::models::activity_log::{ActivityType, NewActivity};
use crate::models::disqualification::NewDisqualification;
use crate::models::exam_session::{ExamSession, SessionState};
use crate::models::question::Question;
use crate::models::violation::ViolationType;
use crate::services::activity_service::ActivitySink;
use crate::services::behavior_service::BehaviorClassifier;
use crate::services::disqualification_service::DisqualificationStore;
use crate::session::camera::{Camera, CameraError, CameraStream};
use crate::session::clock::{Clock, TimerFuture, TimerHandle, TimerTask};
use crate::session::machine::{Effect, ExamDescriptor, SessionMachine, MAX_VIOLATIONS};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct Collaborators {
    pub classifier: Arc<dyn BehaviorClassifier>,
    pub activity: Arc<dyn ActivitySink>,
    pub disqualifications: Arc<dyn DisqualificationStore>,
    pub clock: Arc<dyn Clock>,
    pub capture_interval: Duration,
}

/// Drives one [`SessionMachine`] against the outside world.
///
/// Every transition happens under the machine lock, and the effects it
/// produces are carried out before the lock is released. The classifier
/// call is the only collaborator call made without the lock.
pub struct SessionRunner {
    machine: Mutex<SessionMachine>,
    camera: Arc<dyn Camera>,
    stream: StdMutex<Option<CameraStream>>,
    timers: StdMutex<Vec<TimerHandle>>,
    warnings: StdMutex<Vec<String>>,
    deps: Collaborators,
    me: Weak<SessionRunner>,
}

impl SessionRunner {
    pub fn new(machine: SessionMachine, camera: Arc<dyn Camera>, deps: Collaborators) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            machine: Mutex::new(machine),
            camera,
            stream: StdMutex::new(None),
            timers: StdMutex::new(Vec::new()),
            warnings: StdMutex::new(Vec::new()),
            deps,
            me: me.clone(),
        })
    }

    pub async fn start(&self, exam: &ExamDescriptor) -> SessionState {
        let mut machine = self.machine.lock().await;
        let now = Utc::now();
        let mut effects = machine.start(exam, now);
        if effects.is_empty() {
            return machine.state();
        }

        match self.camera.acquire().await {
            Ok(stream) => {
                *self.stream.lock().expect("stream mutex poisoned") = Some(stream);
            }
            Err(err) => {
                tracing::warn!(
                    session_id = %machine.session().session_id,
                    error = %err,
                    "Camera unavailable at session start"
                );
                effects.extend(machine.camera_unavailable(now));
            }
        }

        tracing::info!(
            session_id = %machine.session().session_id,
            time_remaining = machine.session().time_remaining_seconds,
            "Exam session started"
        );
        self.apply(machine.session(), effects).await;
        machine.state()
    }

    pub async fn tick(&self) {
        let mut machine = self.machine.lock().await;
        let effects = machine.tick(Utc::now());
        self.apply(machine.session(), effects).await;
    }

    /// One capture round. Skipped when a previous round is still outstanding.
    pub async fn capture_and_classify(&self) {
        let request = {
            let mut machine = self.machine.lock().await;
            match machine.begin_capture() {
                Some(request) => request,
                None => return,
            }
        };

        let stream = self.stream.lock().expect("stream mutex poisoned").clone();
        let Some(stream) = stream else {
            self.machine.lock().await.abandon_capture(request.round);
            return;
        };

        let frame = match self.camera.capture_frame(&stream).await {
            Ok(frame) => frame,
            Err(CameraError::PermissionDenied) => {
                let mut machine = self.machine.lock().await;
                machine.abandon_capture(request.round);
                let effects = machine.camera_unavailable(Utc::now());
                self.apply(machine.session(), effects).await;
                return;
            }
            Err(err) => {
                tracing::debug!(error = %err, round = request.round, "Skipping capture round");
                self.machine.lock().await.abandon_capture(request.round);
                return;
            }
        };

        let outcome = self
            .deps
            .classifier
            .classify(&frame.to_data_uri(), request.elapsed_seconds, request.question_number)
            .await;
        if let Err(err) = &outcome {
            tracing::warn!(error = %err, round = request.round, "Behavior classifier failed");
        }

        let mut machine = self.machine.lock().await;
        let effects = machine.complete_capture(request.round, outcome, Utc::now());
        self.apply(machine.session(), effects).await;
    }

    pub async fn record_violation(&self, reason: &str, violation_type: ViolationType) -> SessionState {
        let mut machine = self.machine.lock().await;
        let effects = machine.record_violation(reason, violation_type, Utc::now());
        self.apply(machine.session(), effects).await;
        machine.state()
    }

    pub async fn disqualify(&self, reason: &str) -> SessionState {
        let mut machine = self.machine.lock().await;
        let effects = machine.disqualify(reason, Utc::now());
        self.apply(machine.session(), effects).await;
        machine.state()
    }

    pub async fn camera_denied(&self) -> SessionState {
        let mut machine = self.machine.lock().await;
        let effects = machine.camera_unavailable(Utc::now());
        self.apply(machine.session(), effects).await;
        machine.state()
    }

    pub async fn submit(&self) -> SessionState {
        let mut machine = self.machine.lock().await;
        let effects = machine.submit(Utc::now());
        self.apply(machine.session(), effects).await;
        machine.state()
    }

    /// Returns the new question index, or `None` when the answer was rejected.
    pub async fn answer(&self, question_id: &str, selected_answer: &str) -> Option<usize> {
        let mut machine = self.machine.lock().await;
        if machine.answer(question_id, selected_answer) {
            Some(machine.session().current_question_index)
        } else {
            None
        }
    }

    /// Leaves the exam: stops timers, releases the camera and resets the machine.
    pub async fn teardown(&self) {
        let mut machine = self.machine.lock().await;
        let effects = machine.reset();
        self.apply(machine.session(), effects).await;
        self.cancel_timers();
    }

    pub async fn state(&self) -> SessionState {
        self.machine.lock().await.state()
    }

    pub async fn session(&self) -> ExamSession {
        self.machine.lock().await.session().clone()
    }

    pub async fn questions(&self) -> Vec<Question> {
        self.machine.lock().await.questions().to_vec()
    }

    pub async fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.machine.lock().await.session().ended_at
    }

    /// Current state for display. Pending warnings are handed out once.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let machine = self.machine.lock().await;
        let s = machine.session();
        let warnings = std::mem::take(&mut *self.warnings.lock().expect("warnings mutex poisoned"));
        SessionSnapshot {
            session_id: s.session_id.clone(),
            exam_id: s.exam_id,
            state: s.state,
            started_at: s.started_at,
            time_remaining_seconds: s.time_remaining_seconds,
            total_time_spent_seconds: s.total_time_spent_seconds,
            violation_count: s.violation_count,
            max_violations: MAX_VIOLATIONS,
            disqualification_reason: s.disqualification_reason.clone(),
            current_question_index: s.current_question_index,
            score: s.score,
            warnings,
        }
    }

    pub fn has_camera(&self) -> bool {
        self.stream.lock().expect("stream mutex poisoned").is_some()
    }

    pub fn active_timers(&self) -> usize {
        self.timers.lock().expect("timers mutex poisoned").len()
    }

    async fn apply(&self, session: &ExamSession, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::ScheduleTimers => self.schedule_timers(),
                Effect::CancelTimers => self.cancel_timers(),
                Effect::ReleaseCamera => self.release_camera().await,
                Effect::LogActivity {
                    activity_type,
                    details,
                    timestamp,
                } => self.log_activity(session, activity_type, details, timestamp).await,
                Effect::Warn { message, violation } => {
                    tracing::info!(
                        session_id = %session.session_id,
                        violation_type = ?violation.violation_type,
                        count = session.violation_count,
                        "Proctoring warning issued"
                    );
                    self.warnings
                        .lock()
                        .expect("warnings mutex poisoned")
                        .push(message);
                }
                Effect::RecordDisqualification { reason, timestamp } => {
                    self.record_disqualification(session, reason, timestamp).await
                }
                Effect::RecordResult { score, cause } => {
                    tracing::info!(
                        session_id = %session.session_id,
                        correct = score.correct,
                        total = score.total,
                        cause = ?cause,
                        "Exam submitted"
                    );
                }
            }
        }
    }

    fn schedule_timers(&self) {
        let tick_task: TimerTask = {
            let me = self.me.clone();
            Arc::new(move || {
                let me = me.clone();
                let fut: TimerFuture = Box::pin(async move {
                    if let Some(runner) = me.upgrade() {
                        runner.tick().await;
                    }
                });
                fut
            })
        };

        // Capture rounds run detached so a slow classifier never holds up the tick.
        let capture_task: TimerTask = {
            let me = self.me.clone();
            Arc::new(move || {
                let me = me.clone();
                let fut: TimerFuture = Box::pin(async move {
                    if let Some(runner) = me.upgrade() {
                        tokio::spawn(async move {
                            runner.capture_and_classify().await;
                        });
                    }
                });
                fut
            })
        };

        let clock = &self.deps.clock;
        let mut timers = self.timers.lock().expect("timers mutex poisoned");
        timers.push(clock.every(TICK_PERIOD, TICK_PERIOD, tick_task));
        // First round goes out as soon as the exam starts.
        timers.push(clock.every(Duration::ZERO, self.deps.capture_interval, capture_task));
    }

    fn cancel_timers(&self) {
        let handles = std::mem::take(&mut *self.timers.lock().expect("timers mutex poisoned"));
        for handle in handles {
            self.deps.clock.cancel(handle);
        }
    }

    async fn release_camera(&self) {
        let stream = self.stream.lock().expect("stream mutex poisoned").take();
        if let Some(stream) = stream {
            self.camera.release(stream).await;
        }
    }

    async fn log_activity(
        &self,
        session: &ExamSession,
        activity_type: ActivityType,
        details: String,
        timestamp: DateTime<Utc>,
    ) {
        let entry = NewActivity {
            session_id: Some(session.session_id.clone()),
            user_id: session.user_id.clone(),
            user_email: session.user_email.clone(),
            exam_id: session.exam_id,
            activity_type,
            details,
            admin_id: None,
            timestamp,
        };
        if let Err(e) = self.deps.activity.append(entry).await {
            tracing::warn!(
                session_id = %session.session_id,
                activity = activity_type.as_str(),
                error = ?e,
                "Failed to write activity log"
            );
        }
    }

    async fn record_disqualification(&self, session: &ExamSession, reason: String, timestamp: DateTime<Utc>) {
        let store = &self.deps.disqualifications;
        match store.exists(&session.user_id, session.exam_id).await {
            Ok(true) => {
                tracing::info!(session_id = %session.session_id, "Disqualification already recorded");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(session_id = %session.session_id, error = ?e, "Disqualification lookup failed");
            }
        }

        let record = NewDisqualification {
            user_id: session.user_id.clone(),
            user_email: session.user_email.clone(),
            exam_id: session.exam_id,
            reason,
            timestamp,
        };
        match store.create(record).await {
            Ok(()) => tracing::warn!(session_id = %session.session_id, "User disqualified"),
            Err(e) => tracing::error!(
                session_id = %session.session_id,
                error = ?e,
                "Failed to store disqualification"
            ),
        }
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        if let Ok(timers) = self.timers.get_mut() {
            for handle in timers.drain(..) {
                self.deps.clock.cancel(handle);
            }
        }
    }
}
