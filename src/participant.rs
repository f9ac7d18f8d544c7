use std::convert::TryFrom;
use std::fmt;

use serde::Serialize;

use crate::errors::ValidationError;
use crate::normalization::parse_leading_integer;

/// The `group` value that marks the intervention cohort.
pub const INTERVENTION_GROUP: &str = "Intervention";

/// An externally issued participant number. Always positive.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParticipantNumber(i32);

impl ParticipantNumber {
    /// Reads a participant number from raw form input. Returns `None`
    /// for blank or non-numeric input, which callers treat as “nothing
    /// to validate yet”; a number that is present but not positive is
    /// an error.
    pub fn parse(raw: &str) -> Option<Result<Self, ValidationError>> {
        parse_leading_integer(raw).map(Self::try_from)
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<i64> for ParticipantNumber {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match i32::try_from(value) {
            Ok(n) if n > 0 => Ok(ParticipantNumber(n)),
            _ => Err(ValidationError::InvalidInput),
        }
    }
}

impl fmt::Display for ParticipantNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An issued participant, as read from the `participants` collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub(crate) group: String,
}

impl Participant {
    pub fn new(group: impl Into<String>) -> Self {
        Participant {
            group: group.into(),
        }
    }

    pub fn is_intervention(&self) -> bool {
        self.group == INTERVENTION_GROUP
    }
}
