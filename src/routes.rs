use std::sync::Arc;

use log::{debug, error, Logger};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, Reply, WithStatus};
use warp::Filter;

use crate::environment::Environment;
use crate::errors::{BackendError, SubmissionError, ValidationError};

pub mod admin;
mod handlers;
mod rejection;
mod request;
mod response;

pub use internal::*;

/// The largest request body to accept. A complete questionnaire is a
/// few kilobytes.
const MAX_CONTENT_LENGTH: u64 = 64 * 1024;

/// Combines every questionnaire route and turns backend errors into
/// JSON replies.
pub fn make_api_routes(
    environment: Environment,
) -> impl Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    let logger = environment.logger.clone();

    make_create_session_route(environment.clone())
        .or(make_view_session_route(environment.clone()))
        .or(make_participant_number_route(environment.clone()))
        .or(make_check_participant_number_route(environment.clone()))
        .or(make_self_reported_intervention_route(environment.clone()))
        .or(make_submission_route(environment))
        .recover(move |r| format_rejection(logger.clone(), r))
}

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        if status.is_server_error() {
            error!(logger, "Backend error"; "context" => ?r.context, "error" => ?r.error, "status" => %status, "message" => %r.error);
        } else {
            debug!(logger, "Request refused"; "context" => ?r.context, "error" => ?r.error, "status" => %status, "message" => %r.error);
        }

        let flattened = r.flatten();

        return Ok(with_status(json(&flattened), status));
    }

    Err(rej)
}

fn status_code_for(e: &BackendError) -> StatusCode {
    use SubmissionError::*;

    match e {
        BackendError::UnknownSession(..) => StatusCode::NOT_FOUND,
        BackendError::Submission(e) => match e {
            Participant(ValidationError::InvalidInput) | Form(..) => StatusCode::BAD_REQUEST,
            Participant(ValidationError::NotFound) => StatusCode::UNPROCESSABLE_ENTITY,
            Participant(ValidationError::AlreadySubmitted) | AlreadySubmitted | AlreadyCompleted => {
                StatusCode::CONFLICT
            }
            InProgress => StatusCode::TOO_MANY_REQUESTS,
            Participant(ValidationError::BackendUnavailable) | CheckFailed | SaveFailed => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        },
    }
}

mod internal {
    use uuid::Uuid;
    use warp::body::{content_length_limit, json};
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{get as g, path as p, path::param as par, post, put};

    use super::{handlers, MAX_CONTENT_LENGTH};
    use crate::environment::Environment;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
        pub fn $name(environment: Environment) -> Route {
            let b = environment.config.base_path.clone();

            let $route_variable = warp::any()
                .map(move || environment.clone())
                .and(p(b));

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    route!(make_create_session_route => create_session, rt; p("sessions"), end(), post());
    route!(make_view_session_route => view_session, rt; p("sessions"), par::<Uuid>(), end(), g());
    route!(make_participant_number_route => input_participant_number, rt; p!("sessions" / Uuid / "participant-number"), end(), put(), content_length_limit(MAX_CONTENT_LENGTH), json());
    route!(make_check_participant_number_route => check_participant_number, rt; p!("sessions" / Uuid / "participant-number" / "check"), end(), post(), content_length_limit(MAX_CONTENT_LENGTH), json());
    route!(make_self_reported_intervention_route => set_self_reported_intervention, rt; p!("sessions" / Uuid / "self-reported-intervention"), end(), put(), content_length_limit(MAX_CONTENT_LENGTH), json());
    route!(make_submission_route => submit, rt; p!("sessions" / Uuid / "submission"), end(), post(), content_length_limit(MAX_CONTENT_LENGTH), json());
}
