use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, o};
use uuid::Uuid;
use warp::{
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::environment::Environment;
use crate::errors::{BackendError, SubmissionError};
use crate::response::FormData;
use crate::routes::{
    rejection::{Context, Rejection},
    request::{ParticipantNumberInput, SelfReportedInterventionInput},
    response::SuccessResponse,
};
use crate::session::FormSession;

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($expression:stmt);+) => {
        let start = Instant::now();

        // TODO when `try` blocks are stabilized, we can wrap the body
        // and return the headers even on errors
        let result = { $($expression)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    };
}

pub async fn create_session(environment: Environment) -> RouteResult {
    timed! {
        let session = environment.sessions.create();

        with_status(json(&SuccessResponse::Session(session.view())), StatusCode::CREATED)
    }
}

pub async fn view_session(environment: Environment, id: Uuid) -> RouteResult {
    timed! {
        let session = find_session(&environment, id, || Context::session(id))?;

        json(&SuccessResponse::Session(session.view()))
    }
}

pub async fn input_participant_number(
    environment: Environment,
    id: Uuid,
    input: ParticipantNumberInput,
) -> RouteResult {
    timed! {
        let session = find_session(&environment, id, || {
            Context::participant_number(id, input.value.clone())
        })?;

        session.input_participant_number(&input.value);

        with_status(json(&SuccessResponse::Session(session.view())), StatusCode::ACCEPTED)
    }
}

pub async fn check_participant_number(
    environment: Environment,
    id: Uuid,
    input: ParticipantNumberInput,
) -> RouteResult {
    timed! {
        let session = find_session(&environment, id, || {
            Context::participant_number(id, input.value.clone())
        })?;

        // validation failures are part of the view, not HTTP errors
        let _ = session.check_participant_number(&input.value).await;

        json(&SuccessResponse::Session(session.view()))
    }
}

pub async fn set_self_reported_intervention(
    environment: Environment,
    id: Uuid,
    input: SelfReportedInterventionInput,
) -> RouteResult {
    timed! {
        let session = find_session(&environment, id, || Context::session(id))?;

        session.set_self_reported_intervention(input.value);

        json(&SuccessResponse::Session(session.view()))
    }
}

pub async fn submit(environment: Environment, id: Uuid, form: FormData) -> RouteResult {
    timed! {
        let participant_number = form.participant_number.clone();
        let error_handler = |e: SubmissionError| Rejection::new(Context::submission(id, participant_number.clone()), e);

        let session = find_session(&environment, id, || {
            Context::submission(id, participant_number.clone())
        })?;

        let logger = environment.logger.new(o!("session" => id.to_string()));
        debug!(logger, "Submitting post-test..."; "participant_number" => &participant_number);

        let response_id = session.submit(form).await.map_err(error_handler)?;

        with_status(
            json(&SuccessResponse::Submission { response_id }),
            StatusCode::CREATED,
        )
    }
}

fn find_session(
    environment: &Environment,
    id: Uuid,
    context: impl FnOnce() -> Context,
) -> Result<Arc<FormSession>, Rejection> {
    environment
        .sessions
        .get(id)
        .ok_or_else(|| Rejection::new(context(), BackendError::UnknownSession(id)))
}

fn format_server_timing(duration: Duration) -> String {
    format!("handler;dur={}", duration.as_secs_f64() * 1000.0)
}
