use futures::future::BoxFuture;
use futures::FutureExt;
use sqlx::{
    self,
    postgres::{PgPool, PgRow},
    Row,
};

use super::ResponseId;
use crate::errors::StoreError;
use crate::participant::{Participant, ParticipantNumber};
use crate::response::PosttestResponse;

/// A store backed by the study’s Postgres database.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

// these can be simplified once async functions in traits are stabilized
impl super::Store for PgStore {
    fn find_issued_participant(
        &self,
        number: ParticipantNumber,
    ) -> BoxFuture<Result<Option<Participant>, StoreError>> {
        async move {
            let query = sqlx::query(include_str!("../queries/find_issued_participant.sql"));

            let participant = query
                .bind(number.get())
                .try_map(|row: PgRow| {
                    let group: String = row.try_get("group")?;

                    Ok(Participant::new(group))
                })
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            Ok(participant)
        }
        .boxed()
    }

    fn find_response(
        &self,
        number: ParticipantNumber,
    ) -> BoxFuture<Result<Option<ResponseId>, StoreError>> {
        async move {
            let query = sqlx::query_as(include_str!("../queries/find_response.sql"));

            let id: Option<ResponseId> = query
                .bind(number.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?
                .map(|(id,)| id);

            Ok(id)
        }
        .boxed()
    }

    fn insert_response(
        &self,
        response: PosttestResponse,
    ) -> BoxFuture<Result<ResponseId, StoreError>> {
        async move {
            let mut query = sqlx::query_as::<_, (ResponseId,)>(include_str!(
                "../queries/insert_response.sql"
            ))
                .bind(response.participant_number.map(ParticipantNumber::get));

            for (_, answer) in response.scale_columns() {
                query = query.bind(answer);
            }

            let feedback = response.app_feedback;

            let (id,): (ResponseId,) = query
                .bind(response.burnout_level.as_str())
                .bind(response.additional_comments)
                .bind(feedback.as_ref().map(|f| f.helpful_features.clone()))
                .bind(feedback.as_ref().map(|f| f.technical_issues.clone()))
                .bind(feedback.as_ref().map(|f| f.suggestions.clone()))
                .bind(response.submitted_at)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            Ok(id)
        }
        .boxed()
    }
}

fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    use sqlx::Error;

    match error {
        Error::PoolTimedOut | Error::PoolClosed => StoreError::Unavailable {
            reason: format!("{}", error),
        },
        _ => StoreError::Sqlx { source: error },
    }
}
