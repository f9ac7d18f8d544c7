use serde::Serialize;

use crate::session::SessionView;
use crate::store::ResponseId;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
        sessions: usize,
    },
    Session(SessionView),
    Submission {
        response_id: ResponseId,
    },
}
