use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};

use super::{ResponseId, Store};
use crate::errors::StoreError;
use crate::participant::{Participant, ParticipantNumber};
use crate::response::PosttestResponse;

#[derive(Clone, Debug)]
struct MockParticipant {
    group: String,
    id_used: bool,
}

/// An in-memory store for tests, with switches to make calls slow or
/// failing.
#[derive(Default)]
pub struct MockStore {
    participants: RwLock<HashMap<i32, MockParticipant>>,
    responses: RwLock<Vec<(ResponseId, PosttestResponse)>>,
    existing_responses: RwLock<HashMap<i32, ResponseId>>,
    lookup_delays: RwLock<HashMap<i32, Duration>>,
    next_id: AtomicUsize,
    calls: AtomicUsize,
    failing_lookups: AtomicBool,
    failing_response_lookups: AtomicBool,
    failing_inserts: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        MockStore::default()
    }

    /// Adds a participant row.
    pub fn with_participant(self, number: i32, group: &str, id_used: bool) -> Self {
        self.participants.write().unwrap().insert(
            number,
            MockParticipant {
                group: group.to_owned(),
                id_used,
            },
        );

        self
    }

    /// Records a response for `number` as though it had been submitted
    /// from another session.
    pub fn add_existing_response(&self, number: i32) -> ResponseId {
        let id = self.allocate_id();
        self.existing_responses.write().unwrap().insert(number, id);
        id
    }

    /// Makes participant lookups for `number` take `delay` to complete.
    pub fn set_lookup_delay(&self, number: i32, delay: Duration) {
        self.lookup_delays.write().unwrap().insert(number, delay);
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.failing_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn fail_response_lookups(&self, fail: bool) {
        self.failing_response_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.failing_inserts.store(fail, Ordering::SeqCst);
    }

    /// How many store calls have been made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The responses inserted through [`Store::insert_response`].
    pub fn responses(&self) -> Vec<(ResponseId, PosttestResponse)> {
        self.responses.read().unwrap().clone()
    }

    fn allocate_id(&self) -> ResponseId {
        self.next_id.fetch_add(1, Ordering::SeqCst) as ResponseId + 1
    }

    fn unavailable() -> StoreError {
        StoreError::Unavailable {
            reason: "mock store failure".to_owned(),
        }
    }
}

impl Store for MockStore {
    fn find_issued_participant(
        &self,
        number: ParticipantNumber,
    ) -> BoxFuture<Result<Option<Participant>, StoreError>> {
        mock_find_issued_participant(self, number).boxed()
    }

    fn find_response(
        &self,
        number: ParticipantNumber,
    ) -> BoxFuture<Result<Option<ResponseId>, StoreError>> {
        mock_find_response(self, number).boxed()
    }

    fn insert_response(
        &self,
        response: PosttestResponse,
    ) -> BoxFuture<Result<ResponseId, StoreError>> {
        mock_insert_response(self, response).boxed()
    }
}

async fn mock_find_issued_participant(
    store: &MockStore,
    number: ParticipantNumber,
) -> Result<Option<Participant>, StoreError> {
    store.calls.fetch_add(1, Ordering::SeqCst);

    let delay = store
        .lookup_delays
        .read()
        .unwrap()
        .get(&number.get())
        .copied();

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    if store.failing_lookups.load(Ordering::SeqCst) {
        return Err(MockStore::unavailable());
    }

    let participants = store.participants.read().unwrap();

    Ok(participants
        .get(&number.get())
        .filter(|p| p.id_used)
        .map(|p| Participant::new(p.group.clone())))
}

async fn mock_find_response(
    store: &MockStore,
    number: ParticipantNumber,
) -> Result<Option<ResponseId>, StoreError> {
    store.calls.fetch_add(1, Ordering::SeqCst);

    if store.failing_response_lookups.load(Ordering::SeqCst) {
        return Err(MockStore::unavailable());
    }

    if let Some(id) = store.existing_responses.read().unwrap().get(&number.get()) {
        return Ok(Some(*id));
    }

    Ok(store
        .responses
        .read()
        .unwrap()
        .iter()
        .find(|(_, r)| r.participant_number == Some(number))
        .map(|(id, _)| *id))
}

async fn mock_insert_response(
    store: &MockStore,
    response: PosttestResponse,
) -> Result<ResponseId, StoreError> {
    store.calls.fetch_add(1, Ordering::SeqCst);

    if store.failing_inserts.load(Ordering::SeqCst) {
        return Err(MockStore::unavailable());
    }

    let id = store.allocate_id();
    store.responses.write().unwrap().push((id, response));

    Ok(id)
}
