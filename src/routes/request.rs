use serde::Deserialize;

use crate::normalization;

/// The raw contents of the participant number field.
#[derive(Debug, Deserialize)]
pub struct ParticipantNumberInput {
    #[serde(deserialize_with = "normalization::deserialize_lenient_text")]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct SelfReportedInterventionInput {
    pub value: bool,
}
