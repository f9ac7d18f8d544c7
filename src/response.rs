use std::collections::HashMap;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::errors::FormError;
use crate::normalization::{self, optional_text, parse_leading_integer};
use crate::participant::ParticipantNumber;

/// The questionnaire as posted by the front end. Values arrive the way
/// an HTML form produces them, so answers are kept raw until
/// [`PosttestResponse::assemble`] checks them.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FormData {
    /// May be blank: the participant number is optional.
    #[serde(deserialize_with = "normalization::deserialize_lenient_text")]
    pub participant_number: String,

    /// Set by respondents without a participant number who used the app.
    pub self_reported_intervention: bool,

    pub burnout_level: String,

    pub additional_comments: String,

    pub app_helpful_features: String,

    pub app_technical_issues: String,

    pub app_suggestions: String,

    /// The scale items, keyed by column name.
    #[serde(flatten)]
    pub answers: HashMap<String, Value>,
}

impl FormData {
    /// Reads one scale answer and checks it against the scale’s range.
    fn scale(&self, field: &'static str, min: i16, max: i16) -> Result<i16, FormError> {
        let not_a_number = |raw: String| FormError::NotANumber { field, raw };

        let value = match self.answers.get(field) {
            None | Some(Value::Null) => return Err(FormError::MissingAnswer { field }),
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(FormError::MissingAnswer { field })
            }
            Some(Value::String(s)) => {
                parse_leading_integer(s).ok_or_else(|| not_a_number(s.clone()))?
            }
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| not_a_number(n.to_string()))?,
            Some(other) => return Err(not_a_number(other.to_string())),
        };

        if value < i64::from(min) || value > i64::from(max) {
            return Err(FormError::OutOfRange {
                field,
                value,
                min,
                max,
            });
        }

        Ok(value as i16)
    }
}

macro_rules! instrument {
    ($(#[$meta:meta])* $name:ident ($min:literal..=$max:literal) { $($field:ident => $column:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq)]
        pub struct $name {
            $(pub $field: i16,)+
        }

        impl $name {
            pub const MIN: i16 = $min;
            pub const MAX: i16 = $max;

            /// The column names of the items, in declaration order.
            pub const COLUMNS: &'static [&'static str] = &[$($column),+];

            fn from_form(form: &FormData) -> Result<Self, FormError> {
                Ok($name {
                    $($field: form.scale($column, Self::MIN, Self::MAX)?,)+
                })
            }

            /// Pairs each column name with its answer.
            pub fn columns(&self) -> Vec<(&'static str, i16)> {
                vec![$(($column, self.$field)),+]
            }
        }
    };
}

instrument! {
    /// WHO-5 Well-Being Index, from “at no time” (0) to “all of the time” (5).
    Who5 (0..=5) {
        cheerful => "who5_cheerful",
        calm => "who5_calm",
        active => "who5_active",
        rested => "who5_rested",
        interested => "who5_interested",
    }
}

instrument! {
    /// PSS-4 perceived stress over the past month, from “never” (0) to
    /// “very often” (4).
    Pss4 (0..=4) {
        unable_control => "pss4_unable_control",
        confident_handle => "pss4_confident_handle",
        going_your_way => "pss4_going_your_way",
        difficulties_piling => "pss4_difficulties_piling",
    }
}

instrument! {
    /// The Brief COPE subscales used by the study, from “not at all” (1)
    /// to “a lot” (4).
    BriefCope (1..=4) {
        concentrating_efforts => "cope_concentrating_efforts",
        taking_action => "cope_taking_action",
        strategy => "cope_strategy",
        thinking_steps => "cope_thinking_steps",
        different_light => "cope_different_light",
        looking_good => "cope_looking_good",
        accepting_reality => "cope_accepting_reality",
        learning_live => "cope_learning_live",
        emotional_support => "cope_emotional_support",
        comfort_understanding => "cope_comfort_understanding",
        work_activities => "cope_work_activities",
        movies_tv_reading => "cope_movies_tv_reading",
        criticizing_myself => "cope_criticizing_myself",
        blaming_myself => "cope_blaming_myself",
    }
}

/// The single-item burnout measure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BurnoutLevel {
    NoBurnout,
    OccasionalStress,
    BurningOut,
    SymptomsPersist,
    CompletelyBurned,
}

impl BurnoutLevel {
    pub const ALL: [BurnoutLevel; 5] = [
        BurnoutLevel::NoBurnout,
        BurnoutLevel::OccasionalStress,
        BurnoutLevel::BurningOut,
        BurnoutLevel::SymptomsPersist,
        BurnoutLevel::CompletelyBurned,
    ];

    pub fn as_str(self) -> &'static str {
        use BurnoutLevel::*;

        match self {
            NoBurnout => "no_burnout",
            OccasionalStress => "occasional_stress",
            BurningOut => "burning_out",
            SymptomsPersist => "symptoms_persist",
            CompletelyBurned => "completely_burned",
        }
    }
}

impl FromStr for BurnoutLevel {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(FormError::MissingBurnoutLevel);
        }

        BurnoutLevel::ALL
            .iter()
            .copied()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| FormError::UnknownBurnoutLevel(s.to_owned()))
    }
}

/// Feedback about the app, collected from the intervention group only.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AppFeedback {
    pub helpful_features: String,
    pub technical_issues: String,
    pub suggestions: String,
}

impl AppFeedback {
    fn from_form(form: &FormData) -> Result<Self, FormError> {
        let required = |field: &'static str, raw: &str| {
            optional_text(raw).ok_or(FormError::MissingAppFeedback { field })
        };

        Ok(AppFeedback {
            helpful_features: required("app_helpful_features", &form.app_helpful_features)?,
            technical_issues: required("app_technical_issues", &form.app_technical_issues)?,
            suggestions: required("app_suggestions", &form.app_suggestions)?,
        })
    }
}

/// A complete post-test, ready to insert into `posttest_responses`.
#[derive(Clone, Debug, PartialEq)]
pub struct PosttestResponse {
    /// Absent for anonymous submissions.
    pub participant_number: Option<ParticipantNumber>,

    pub who5: Who5,

    pub pss4: Pss4,

    pub cope: BriefCope,

    pub burnout_level: BurnoutLevel,

    pub additional_comments: Option<String>,

    /// Present exactly when app feedback was required.
    pub app_feedback: Option<AppFeedback>,

    pub submitted_at: OffsetDateTime,
}

impl PosttestResponse {
    /// Checks the form and builds the record to insert. App feedback is
    /// required, and kept, only when `include_app_feedback` is set;
    /// otherwise whatever the form holds for it is dropped.
    pub fn assemble(
        form: &FormData,
        participant_number: Option<ParticipantNumber>,
        include_app_feedback: bool,
        submitted_at: OffsetDateTime,
    ) -> Result<Self, FormError> {
        let who5 = Who5::from_form(form)?;
        let pss4 = Pss4::from_form(form)?;
        let cope = BriefCope::from_form(form)?;
        let burnout_level = form.burnout_level.parse()?;

        let app_feedback = if include_app_feedback {
            Some(AppFeedback::from_form(form)?)
        } else {
            None
        };

        Ok(PosttestResponse {
            participant_number,
            who5,
            pss4,
            cope,
            burnout_level,
            additional_comments: optional_text(&form.additional_comments),
            app_feedback,
            submitted_at,
        })
    }

    /// Every scale answer paired with its column name, in insertion order.
    pub fn scale_columns(&self) -> Vec<(&'static str, i16)> {
        let mut columns = self.who5.columns();
        columns.extend(self.pss4.columns());
        columns.extend(self.cope.columns());
        columns
    }
}
