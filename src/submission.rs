use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, o, warn, Logger};
use time::OffsetDateTime;

use crate::errors::{SubmissionError, ValidationError};
use crate::participant::ParticipantNumber;
use crate::response::{FormData, PosttestResponse};
use crate::store::{ResponseId, Store};
use crate::validation::{ValidationController, ValidationState};

/// Where the form’s submission stands. `Failed` behaves like `Idle`
/// except that it remembers the last error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Submitted { id: ResponseId },
    Failed(SubmissionError),
}

/// Owns submission of one form and keeps it from being submitted twice.
pub struct SubmissionController {
    store: Arc<dyn Store>,
    validation: ValidationController,
    logger: Logger,
    state: Mutex<SubmissionState>,
}

impl SubmissionController {
    pub fn new(store: Arc<dyn Store>, validation: ValidationController, logger: Logger) -> Self {
        SubmissionController {
            store,
            validation,
            logger,
            state: Mutex::new(SubmissionState::Idle),
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        *self.lock() == SubmissionState::Submitting
    }

    /// Whether the submit button should be enabled for the participant
    /// number currently typed into the form.
    pub fn can_submit(&self, participant_input: &str) -> bool {
        match *self.lock() {
            SubmissionState::Submitting | SubmissionState::Submitted { .. } => return false,
            SubmissionState::Idle | SubmissionState::Failed(_) => {}
        }

        if participant_input.trim().is_empty() {
            return true;
        }

        let snapshot = self.validation.snapshot();

        match ParticipantNumber::parse(participant_input) {
            Some(Ok(number)) => {
                snapshot.state == ValidationState::Valid
                    && snapshot.participant_number == Some(number)
            }
            _ => false,
        }
    }

    /// Validates, assembles and stores the form. The outcome is also
    /// kept as the controller’s state.
    pub async fn submit(&self, form: FormData) -> Result<ResponseId, SubmissionError> {
        self.begin()?;

        let result = self.run(&form).await;

        *self.lock() = match &result {
            Ok(id) => SubmissionState::Submitted { id: *id },
            Err(e) => SubmissionState::Failed(e.clone()),
        };

        result
    }

    async fn run(&self, form: &FormData) -> Result<ResponseId, SubmissionError> {
        let number = participant_number(form)?;
        let logger = match number {
            Some(number) => self.logger.new(o!("participant_number" => number.get())),
            None => self.logger.new(o!("participant_number" => "anonymous")),
        };

        let intervention = match number {
            Some(number) => match self.validation.validated(number) {
                Some(validated) => validated.intervention,
                None => {
                    debug!(logger, "Validating participant number before submitting...");
                    self.validation.validate(i64::from(number.get())).await?.intervention
                }
            },
            None => false,
        };

        let include_app_feedback = intervention || form.self_reported_intervention;
        let response = PosttestResponse::assemble(
            form,
            number,
            include_app_feedback,
            OffsetDateTime::now_utc(),
        )?;

        if let Some(number) = number {
            match self.store.find_response(number).await {
                Ok(None) => {}
                Ok(Some(id)) => {
                    warn!(logger, "Response appeared after validation"; "response_id" => id);
                    return Err(SubmissionError::AlreadySubmitted);
                }
                Err(e) => {
                    error!(logger, "Existing response lookup failed"; "error" => %e);
                    return Err(SubmissionError::CheckFailed);
                }
            }
        }

        let id = self.store.insert_response(response).await.map_err(|e| {
            error!(logger, "Failed to save response"; "error" => %e);
            SubmissionError::SaveFailed
        })?;

        info!(logger, "Post-test submitted"; "response_id" => id, "app_feedback" => include_app_feedback);

        Ok(id)
    }

    fn begin(&self) -> Result<(), SubmissionError> {
        let mut state = self.lock();

        match *state {
            SubmissionState::Submitting => return Err(SubmissionError::InProgress),
            SubmissionState::Submitted { .. } => return Err(SubmissionError::AlreadyCompleted),
            SubmissionState::Idle | SubmissionState::Failed(_) => {}
        }

        *state = SubmissionState::Submitting;
        Ok(())
    }

    /// Fails a submission whose task died before recording an outcome.
    pub(crate) fn abandon(&self, error: SubmissionError) {
        let mut state = self.lock();

        if *state == SubmissionState::Submitting {
            *state = SubmissionState::Failed(error);
        }
    }

    fn lock(&self) -> MutexGuard<SubmissionState> {
        // a panicking submission leaves nothing half-written behind this lock
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Blank means anonymous; anything else has to be a valid number.
fn participant_number(form: &FormData) -> Result<Option<ParticipantNumber>, ValidationError> {
    if form.participant_number.trim().is_empty() {
        return Ok(None);
    }

    match ParticipantNumber::parse(&form.participant_number) {
        Some(parsed) => parsed.map(Some),
        None => Err(ValidationError::InvalidInput),
    }
}
