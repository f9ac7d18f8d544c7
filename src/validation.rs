use std::convert::TryFrom;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, error, o, trace, warn, Logger};

use crate::debounce::Debouncer;
use crate::errors::ValidationError;
use crate::normalization::parse_leading_integer;
use crate::participant::ParticipantNumber;
use crate::store::Store;

/// Where validation of the current participant number stands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationState {
    Unvalidated,
    Checking,
    Valid,
    Invalid(ValidationError),
}

/// A participant number that passed validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Validated {
    pub number: ParticipantNumber,
    pub intervention: bool,
}

/// A consistent copy of the controller’s state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ValidationSnapshot {
    pub state: ValidationState,
    pub intervention_group: bool,
    pub participant_number: Option<ParticipantNumber>,
}

struct Inner {
    state: ValidationState,
    intervention_group: bool,
    number: Option<ParticipantNumber>,
    /// Stamped on every validation request and bumped on every input
    /// change; results carrying an older value are dropped.
    generation: u64,
}

struct Shared {
    store: Arc<dyn Store>,
    logger: Logger,
    debouncer: Debouncer,
    inner: Mutex<Inner>,
}

/// Owns participant-number validation for one form. Cloning yields
/// another handle to the same state.
#[derive(Clone)]
pub struct ValidationController {
    shared: Arc<Shared>,
}

impl ValidationController {
    pub fn new(store: Arc<dyn Store>, logger: Logger, debounce: Duration) -> Self {
        ValidationController {
            shared: Arc::new(Shared {
                store,
                logger,
                debouncer: Debouncer::new(debounce),
                inner: Mutex::new(Inner {
                    state: ValidationState::Unvalidated,
                    intervention_group: false,
                    number: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Forgets any previous result. Pending debounced checks are
    /// cancelled and lookups still in flight are superseded.
    pub fn on_participant_number_changed(&self, raw: &str) {
        self.shared.debouncer.cancel();

        let mut inner = self.lock();
        inner.generation += 1;
        inner.state = ValidationState::Unvalidated;
        inner.intervention_group = false;
        inner.number = None;

        trace!(self.shared.logger, "Participant number changed"; "raw" => raw, "generation" => inner.generation);
    }

    /// Validates `raw` once the debounce delay passes without further
    /// input. Blank or non-numeric input is ignored.
    pub fn schedule_validation(&self, raw: &str) {
        let number = match parse_leading_integer(raw) {
            Some(number) => number,
            None => {
                self.shared.debouncer.cancel();
                return;
            }
        };

        let controller = self.clone();

        self.shared.debouncer.schedule(async move {
            // the outcome lands in the shared state
            let _ = controller.validate(number).await;
        });
    }

    /// Validates `raw` right away, as the “Check” button and leaving the
    /// field do. Returns `None` without doing anything for blank input.
    pub async fn check_now(&self, raw: &str) -> Option<Result<Validated, ValidationError>> {
        self.shared.debouncer.cancel();

        if raw.trim().is_empty() {
            return None;
        }

        let result = match parse_leading_integer(raw) {
            Some(number) => self.validate(number).await,
            None => {
                let generation = self.begin();
                self.finish(generation, Err(ValidationError::InvalidInput))
            }
        };

        Some(result)
    }

    /// Checks that `number` was issued and has no post-test yet. The
    /// caller always gets this invocation’s outcome, but the shared
    /// state only takes it if no newer request or input arrived
    /// meanwhile.
    pub async fn validate(&self, number: i64) -> Result<Validated, ValidationError> {
        let generation = self.begin();
        let logger = self
            .shared
            .logger
            .new(o!("participant_number" => number, "generation" => generation));

        let result = self.run(&logger, generation, number).await;

        self.finish(generation, result)
    }

    pub fn state(&self) -> ValidationState {
        self.lock().state
    }

    pub fn is_intervention_group(&self) -> bool {
        self.lock().intervention_group
    }

    /// Returns the stored result if the state is `Valid` for `number`.
    pub fn validated(&self, number: ParticipantNumber) -> Option<Validated> {
        let inner = self.lock();

        match (inner.state, inner.number) {
            (ValidationState::Valid, Some(n)) if n == number => Some(Validated {
                number,
                intervention: inner.intervention_group,
            }),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> ValidationSnapshot {
        let inner = self.lock();

        ValidationSnapshot {
            state: inner.state,
            intervention_group: inner.intervention_group,
            participant_number: inner.number,
        }
    }

    async fn run(
        &self,
        logger: &Logger,
        generation: u64,
        number: i64,
    ) -> Result<Validated, ValidationError> {
        let number = ParticipantNumber::try_from(number)?;

        self.apply(generation, |inner| {
            inner.state = ValidationState::Checking;
            inner.number = Some(number);
        });

        debug!(logger, "Looking up participant...");
        let participant = match self.shared.store.find_issued_participant(number).await {
            Ok(Some(participant)) => participant,
            Ok(None) => {
                debug!(logger, "No issued participant with this number");
                return Err(ValidationError::NotFound);
            }
            Err(e) => {
                warn!(logger, "Participant lookup failed"; "error" => %e);
                return Err(ValidationError::NotFound);
            }
        };

        let intervention = participant.is_intervention();

        self.apply(generation, |inner| inner.intervention_group = intervention);

        debug!(logger, "Checking for an existing response..."; "intervention" => intervention);
        match self.shared.store.find_response(number).await {
            Ok(None) => Ok(Validated {
                number,
                intervention,
            }),
            Ok(Some(id)) => {
                debug!(logger, "Participant already submitted"; "response_id" => id);
                Err(ValidationError::AlreadySubmitted)
            }
            Err(e) => {
                error!(logger, "Existing response lookup failed"; "error" => %e);
                Err(ValidationError::BackendUnavailable)
            }
        }
    }

    fn begin(&self) -> u64 {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.generation
    }

    fn finish(
        &self,
        generation: u64,
        result: Result<Validated, ValidationError>,
    ) -> Result<Validated, ValidationError> {
        let applied = self.apply(generation, |inner| match result {
            Ok(validated) => {
                inner.state = ValidationState::Valid;
                inner.number = Some(validated.number);
                inner.intervention_group = validated.intervention;
            }
            Err(e) => {
                inner.state = ValidationState::Invalid(e);

                if e == ValidationError::InvalidInput {
                    inner.number = None;
                    inner.intervention_group = false;
                }
            }
        });

        if !applied {
            debug!(self.shared.logger, "Ignoring stale validation result"; "generation" => generation, "result" => ?result);
        }

        result
    }

    /// Runs `update` only if `generation` is still the latest.
    fn apply(&self, generation: u64, update: impl FnOnce(&mut Inner)) -> bool {
        let mut inner = self.lock();

        if inner.generation != generation {
            return false;
        }

        update(&mut inner);
        true
    }

    fn lock(&self) -> MutexGuard<Inner> {
        self.shared.inner.lock().unwrap()
    }
}
