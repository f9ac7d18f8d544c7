use serde::Serialize;
use uuid::Uuid;
use warp::reject;

use crate::errors::BackendError;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Rejection {
    pub fn new(context: Context, error: impl Into<BackendError>) -> Self {
        Rejection {
            context,
            error: error.into(),
        }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection {
            context: self.context.clone(),
            message: format!("{}", self.error),
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) message: String,
}

// `From<Rejection> for reject::Rejection` is provided by warp's blanket
// `impl<T: Reject> From<T> for Rejection`, which calls `reject::custom`.

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Context {
    ParticipantNumber { session: Uuid, input: String },
    Submission { session: Uuid, participant_number: String },
    Session { session: Uuid },
}

impl Context {
    pub fn participant_number(session: Uuid, input: String) -> Context {
        Context::ParticipantNumber { session, input }
    }

    pub fn submission(session: Uuid, participant_number: String) -> Context {
        Context::Submission {
            session,
            participant_number,
        }
    }

    pub fn session(session: Uuid) -> Context {
        Context::Session { session }
    }
}
