use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use log::{debug, error, info, o, Logger};
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::errors::{SubmissionError, ValidationError};
use crate::participant::ParticipantNumber;
use crate::response::FormData;
use crate::store::{ResponseId, Store};
use crate::submission::{SubmissionController, SubmissionState};
use crate::validation::{ValidationController, ValidationState};

/// One participant filling in the questionnaire: the controllers plus
/// the form state they depend on.
pub struct FormSession {
    id: Uuid,
    created_at: Instant,
    validation: ValidationController,
    submission: SubmissionController,
    participant_input: Mutex<String>,
    self_reported_intervention: Mutex<bool>,
    logger: Logger,
}

impl FormSession {
    fn new(id: Uuid, store: Arc<dyn Store>, logger: Logger, debounce: Duration) -> Self {
        let validation = ValidationController::new(store.clone(), logger.clone(), debounce);
        let submission = SubmissionController::new(store, validation.clone(), logger.clone());

        FormSession {
            id,
            created_at: Instant::now(),
            validation,
            submission,
            participant_input: Mutex::new(String::new()),
            self_reported_intervention: Mutex::new(false),
            logger,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Records a keystroke in the participant number field.
    pub fn input_participant_number(&self, raw: &str) {
        *self.participant_input.lock().unwrap() = raw.to_owned();

        self.validation.on_participant_number_changed(raw);
        self.validation.schedule_validation(raw);
    }

    /// Validates `raw` immediately. Returns `None` for blank input, which
    /// still clears the result for any previous number.
    pub async fn check_participant_number(
        &self,
        raw: &str,
    ) -> Option<Result<(), ValidationError>> {
        let changed = {
            let mut input = self.participant_input.lock().unwrap();
            let changed = *input != raw;
            *input = raw.to_owned();
            changed
        };

        if changed {
            self.validation.on_participant_number_changed(raw);
        }

        self.validation
            .check_now(raw)
            .await
            .map(|result| result.map(|_| ()))
    }

    pub fn set_self_reported_intervention(&self, value: bool) {
        *self.self_reported_intervention.lock().unwrap() = value;
        debug!(self.logger, "Self-reported intervention changed"; "value" => value);
    }

    /// Submits `form`. A self-reported intervention recorded on the
    /// session counts even if the form leaves it unset.
    pub async fn submit(self: &Arc<Self>, mut form: FormData) -> Result<ResponseId, SubmissionError> {
        form.self_reported_intervention |= *self.self_reported_intervention.lock().unwrap();

        // detached: a dropped request must not leave the controller in Submitting
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move { session.submission.submit(form).await });

        handle.await.unwrap_or_else(|e| {
            error!(self.logger, "Submission task failed"; "error" => %e);
            self.submission.abandon(SubmissionError::SaveFailed);
            Err(SubmissionError::SaveFailed)
        })
    }

    pub fn view(&self) -> SessionView {
        let input = self.participant_input.lock().unwrap().clone();
        let self_reported = *self.self_reported_intervention.lock().unwrap();
        let validation = self.validation.snapshot();
        let submission = self.submission.state();

        let (status, message) = match validation.state {
            ValidationState::Unvalidated => ("unvalidated", None),
            ValidationState::Checking => ("checking", None),
            ValidationState::Valid => ("valid", None),
            ValidationState::Invalid(e) => ("invalid", Some(e.to_string())),
        };

        let participant = ParticipantView {
            input,
            status,
            message,
            participant_number: validation.participant_number,
            intervention_group: validation.intervention_group,
        };

        let submission_view = match &submission {
            SubmissionState::Idle => SubmissionView::new("idle", None, None),
            SubmissionState::Submitting => SubmissionView::new("submitting", None, None),
            SubmissionState::Submitted { id } => SubmissionView::new("submitted", None, Some(*id)),
            SubmissionState::Failed(e) => SubmissionView::new("failed", Some(e.to_string()), None),
        };

        SessionView {
            id: self.id,
            can_submit: self.submission.can_submit(&participant.input),
            app_feedback_required: validation.intervention_group || self_reported,
            self_reported_intervention: self_reported,
            participant,
            submission: submission_view,
        }
    }
}

/// What the front end renders for a session.
#[derive(Clone, Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub participant: ParticipantView,
    pub submission: SubmissionView,
    pub self_reported_intervention: bool,
    pub can_submit: bool,
    pub app_feedback_required: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ParticipantView {
    pub input: String,
    pub status: &'static str,
    pub message: Option<String>,
    pub participant_number: Option<ParticipantNumber>,
    pub intervention_group: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubmissionView {
    pub status: &'static str,
    pub message: Option<String>,
    pub response_id: Option<ResponseId>,
}

impl SubmissionView {
    fn new(status: &'static str, message: Option<String>, response_id: Option<ResponseId>) -> Self {
        SubmissionView {
            status,
            message,
            response_id,
        }
    }
}

/// The live form sessions, keyed by ID.
pub struct Sessions {
    store: Arc<dyn Store>,
    logger: Logger,
    debounce: Duration,
    ttl: Duration,
    sessions: RwLock<HashMap<Uuid, Arc<FormSession>>>,
}

impl Sessions {
    pub fn new(store: Arc<dyn Store>, logger: Logger, debounce: Duration, ttl: Duration) -> Self {
        Sessions {
            store,
            logger,
            debounce,
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Starts a new session, evicting expired ones first.
    pub fn create(&self) -> Arc<FormSession> {
        let id = Uuid::new_v4();
        let logger = self.logger.new(o!("session" => id.to_string()));
        let session = Arc::new(FormSession::new(
            id,
            self.store.clone(),
            logger.clone(),
            self.debounce,
        ));

        let mut sessions = self.sessions.write().unwrap();
        let before = sessions.len();
        let ttl = self.ttl;
        sessions.retain(|_, session| session.created_at.elapsed() < ttl);

        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(self.logger, "Evicted expired sessions"; "count" => evicted);
        }

        sessions.insert(id, session.clone());
        info!(logger, "Created session"; "live_sessions" => sessions.len());

        session
    }

    /// Finds a live session. Expired sessions are treated as missing.
    pub fn get(&self, id: Uuid) -> Option<Arc<FormSession>> {
        self.sessions
            .read()
            .unwrap()
            .get(&id)
            .filter(|session| session.created_at.elapsed() < self.ttl)
            .cloned()
    }

    /// How many sessions are held, expired ones included until the
    /// next eviction.
    pub fn count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }
}
