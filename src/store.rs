use futures::future::BoxFuture;

use crate::errors::StoreError;
use crate::participant::{Participant, ParticipantNumber};
use crate::response::PosttestResponse;

pub mod mock;
mod postgres;

pub use self::postgres::PgStore;

/// The ID the store assigns to an inserted response.
pub type ResponseId = i64;

/// The remote data store holding issued participants and submitted
/// post-tests. Lookups that find nothing return `Ok(None)`; every other
/// failure is a [`StoreError`].
pub trait Store: Send + Sync {
    /// Finds the participant with the given number, provided the number
    /// has actually been issued (`id_used`).
    fn find_issued_participant(
        &self,
        number: ParticipantNumber,
    ) -> BoxFuture<Result<Option<Participant>, StoreError>>;

    /// Finds the response already submitted for the given number, if any.
    fn find_response(
        &self,
        number: ParticipantNumber,
    ) -> BoxFuture<Result<Option<ResponseId>, StoreError>>;

    /// Inserts a response. Does not check for duplicates.
    fn insert_response(
        &self,
        response: PosttestResponse,
    ) -> BoxFuture<Result<ResponseId, StoreError>>;
}
