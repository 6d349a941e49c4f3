use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;

use crate::workflows::allocation::{
    AdvisoryError, AdvisoryOracle, AdvisoryRequest, AllocationEngine, ApplicantId,
    CandidatePartition, DisabledAdvisory, Partition, Room,
};
use crate::workflows::dorm::domain::{
    Dorm, DormId, DormSnapshot, JoinRequest, JoinRequestId, JoinRequestStatus, JoinSubmission,
    OccupancyRecord,
};
use crate::workflows::dorm::layout::DormLayout;
use crate::workflows::dorm::repository::{DormRepository, RepositoryError};
use crate::workflows::dorm::DormAllocationService;

pub(super) const CREATOR: ApplicantId = ApplicantId(900);

#[derive(Default)]
struct Store {
    dorms: BTreeMap<DormId, Dorm>,
    rooms: BTreeMap<DormId, Vec<Room>>,
    requests: BTreeMap<JoinRequestId, JoinRequest>,
    occupancy: BTreeMap<DormId, Vec<OccupancyRecord>>,
    next_room_id: u64,
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    store: Arc<Mutex<Store>>,
}

impl MemoryRepository {
    /// Pretend `occupants` beds of the labelled room were filled elsewhere.
    pub(super) fn set_occupants(&self, dorm_id: DormId, label: &str, occupants: u32) {
        let mut store = self.store.lock().expect("store mutex poisoned");
        let room = store
            .rooms
            .get_mut(&dorm_id)
            .and_then(|rooms| rooms.iter_mut().find(|room| room.label == label))
            .expect("room exists");
        room.current_occupants = occupants;
    }

    pub(super) fn rooms(&self, dorm_id: DormId) -> Vec<Room> {
        let store = self.store.lock().expect("store mutex poisoned");
        store.rooms.get(&dorm_id).cloned().unwrap_or_default()
    }
}

impl DormRepository for MemoryRepository {
    fn register_dorm(
        &self,
        name: &str,
        creator: ApplicantId,
        layout: DormLayout,
    ) -> Result<Dorm, RepositoryError> {
        let mut store = self.store.lock().expect("store mutex poisoned");
        let dorm = Dorm {
            id: DormId(store.dorms.len() as u64 + 1),
            name: name.to_string(),
            creator,
            layout,
        };
        let rooms = layout.rooms(store.next_room_id + 1);
        store.next_room_id += rooms.len() as u64;
        store.rooms.insert(dorm.id, rooms);
        store.dorms.insert(dorm.id, dorm.clone());
        Ok(dorm)
    }

    fn fetch_dorm(&self, id: DormId) -> Result<Option<Dorm>, RepositoryError> {
        let store = self.store.lock().expect("store mutex poisoned");
        Ok(store.dorms.get(&id).cloned())
    }

    fn insert_request(&self, request: JoinRequest) -> Result<JoinRequest, RepositoryError> {
        let mut store = self.store.lock().expect("store mutex poisoned");
        let duplicate = store.requests.values().any(|existing| {
            existing.dorm_id == request.dorm_id
                && existing.applicant.id == request.applicant.id
                && existing.is_pending()
        });
        if duplicate || store.requests.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        store.requests.insert(request.id, request.clone());
        Ok(request)
    }

    fn fetch_request(&self, id: JoinRequestId) -> Result<Option<JoinRequest>, RepositoryError> {
        let store = self.store.lock().expect("store mutex poisoned");
        Ok(store.requests.get(&id).cloned())
    }

    fn update_request(&self, request: JoinRequest) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().expect("store mutex poisoned");
        match store.requests.get_mut(&request.id) {
            Some(slot) => {
                *slot = request;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn pending(&self, dorm_id: DormId) -> Result<Vec<JoinRequest>, RepositoryError> {
        let store = self.store.lock().expect("store mutex poisoned");
        Ok(store
            .requests
            .values()
            .filter(|request| request.dorm_id == dorm_id && request.is_pending())
            .cloned()
            .collect())
    }

    fn latest_request(
        &self,
        dorm_id: DormId,
        applicant: ApplicantId,
    ) -> Result<Option<JoinRequest>, RepositoryError> {
        let store = self.store.lock().expect("store mutex poisoned");
        Ok(store
            .requests
            .values()
            .rev()
            .find(|request| request.dorm_id == dorm_id && request.applicant.id == applicant)
            .cloned())
    }

    fn snapshot(&self, dorm_id: DormId) -> Result<DormSnapshot, RepositoryError> {
        let dorm = self.fetch_dorm(dorm_id)?.ok_or(RepositoryError::NotFound)?;
        let applicants = self
            .pending(dorm_id)?
            .into_iter()
            .map(|request| request.applicant)
            .collect();
        Ok(DormSnapshot {
            dorm,
            rooms: self.rooms(dorm_id),
            applicants,
        })
    }

    fn commit_allocation(
        &self,
        dorm_id: DormId,
        partition: &Partition,
    ) -> Result<Vec<OccupancyRecord>, RepositoryError> {
        let mut store = self.store.lock().expect("store mutex poisoned");
        let rooms = store.rooms.get(&dorm_id).ok_or(RepositoryError::NotFound)?;

        for (room_id, applicants) in partition.iter() {
            let room = rooms
                .iter()
                .find(|room| room.id == room_id)
                .ok_or(RepositoryError::NotFound)?;
            if room.current_occupants + applicants.len() as u32 > room.capacity {
                return Err(RepositoryError::CapacityExceeded { room: room_id });
            }
        }
        let pending: HashMap<ApplicantId, JoinRequestId> = store
            .requests
            .values()
            .filter(|request| request.dorm_id == dorm_id && request.is_pending())
            .map(|request| (request.applicant.id, request.id))
            .collect();
        if partition
            .iter()
            .flat_map(|(_, applicants)| applicants.iter())
            .any(|applicant| !pending.contains_key(applicant))
        {
            return Err(RepositoryError::Conflict);
        }

        let mut records = Vec::new();
        for (room_id, applicants) in partition.iter() {
            let room = store
                .rooms
                .get_mut(&dorm_id)
                .and_then(|rooms| rooms.iter_mut().find(|room| room.id == room_id))
                .ok_or(RepositoryError::NotFound)?;
            for applicant in applicants {
                room.current_occupants += 1;
                records.push(OccupancyRecord {
                    room_id,
                    applicant_id: *applicant,
                    bed_number: room.current_occupants,
                });
            }
        }
        for record in &records {
            if let Some(request) = store.requests.get_mut(&pending[&record.applicant_id]) {
                request.status = JoinRequestStatus::Fulfilled;
            }
        }
        store
            .occupancy
            .entry(dorm_id)
            .or_default()
            .extend(records.iter().copied());
        Ok(records)
    }

    fn occupancy(&self, dorm_id: DormId) -> Result<Vec<OccupancyRecord>, RepositoryError> {
        let store = self.store.lock().expect("store mutex poisoned");
        Ok(store.occupancy.get(&dorm_id).cloned().unwrap_or_default())
    }
}

/// Repository whose storage is always down.
pub(super) struct UnavailableRepository;

impl DormRepository for UnavailableRepository {
    fn register_dorm(
        &self,
        _name: &str,
        _creator: ApplicantId,
        _layout: DormLayout,
    ) -> Result<Dorm, RepositoryError> {
        Err(unavailable())
    }

    fn fetch_dorm(&self, _id: DormId) -> Result<Option<Dorm>, RepositoryError> {
        Err(unavailable())
    }

    fn insert_request(&self, _request: JoinRequest) -> Result<JoinRequest, RepositoryError> {
        Err(unavailable())
    }

    fn fetch_request(&self, _id: JoinRequestId) -> Result<Option<JoinRequest>, RepositoryError> {
        Err(unavailable())
    }

    fn update_request(&self, _request: JoinRequest) -> Result<(), RepositoryError> {
        Err(unavailable())
    }

    fn pending(&self, _dorm_id: DormId) -> Result<Vec<JoinRequest>, RepositoryError> {
        Err(unavailable())
    }

    fn latest_request(
        &self,
        _dorm_id: DormId,
        _applicant: ApplicantId,
    ) -> Result<Option<JoinRequest>, RepositoryError> {
        Err(unavailable())
    }

    fn snapshot(&self, _dorm_id: DormId) -> Result<DormSnapshot, RepositoryError> {
        Err(unavailable())
    }

    fn commit_allocation(
        &self,
        _dorm_id: DormId,
        _partition: &Partition,
    ) -> Result<Vec<OccupancyRecord>, RepositoryError> {
        Err(unavailable())
    }

    fn occupancy(&self, _dorm_id: DormId) -> Result<Vec<OccupancyRecord>, RepositoryError> {
        Err(unavailable())
    }
}

fn unavailable() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

/// Repository that dawdles before reads and inserts, widening race windows.
pub(super) struct SlowRepository {
    inner: MemoryRepository,
    delay: Duration,
}

impl SlowRepository {
    pub(super) fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryRepository::default(),
            delay,
        }
    }
}

impl DormRepository for SlowRepository {
    fn register_dorm(
        &self,
        name: &str,
        creator: ApplicantId,
        layout: DormLayout,
    ) -> Result<Dorm, RepositoryError> {
        self.inner.register_dorm(name, creator, layout)
    }

    fn fetch_dorm(&self, id: DormId) -> Result<Option<Dorm>, RepositoryError> {
        std::thread::sleep(self.delay);
        self.inner.fetch_dorm(id)
    }

    fn insert_request(&self, request: JoinRequest) -> Result<JoinRequest, RepositoryError> {
        std::thread::sleep(self.delay);
        self.inner.insert_request(request)
    }

    fn fetch_request(&self, id: JoinRequestId) -> Result<Option<JoinRequest>, RepositoryError> {
        self.inner.fetch_request(id)
    }

    fn update_request(&self, request: JoinRequest) -> Result<(), RepositoryError> {
        self.inner.update_request(request)
    }

    fn pending(&self, dorm_id: DormId) -> Result<Vec<JoinRequest>, RepositoryError> {
        std::thread::sleep(self.delay);
        self.inner.pending(dorm_id)
    }

    fn latest_request(
        &self,
        dorm_id: DormId,
        applicant: ApplicantId,
    ) -> Result<Option<JoinRequest>, RepositoryError> {
        self.inner.latest_request(dorm_id, applicant)
    }

    fn snapshot(&self, dorm_id: DormId) -> Result<DormSnapshot, RepositoryError> {
        self.inner.snapshot(dorm_id)
    }

    fn commit_allocation(
        &self,
        dorm_id: DormId,
        partition: &Partition,
    ) -> Result<Vec<OccupancyRecord>, RepositoryError> {
        self.inner.commit_allocation(dorm_id, partition)
    }

    fn occupancy(&self, dorm_id: DormId) -> Result<Vec<OccupancyRecord>, RepositoryError> {
        self.inner.occupancy(dorm_id)
    }
}

/// Oracle that takes a while and then gives up.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct SlowAdvisory;

impl AdvisoryOracle for SlowAdvisory {
    async fn suggest(
        &self,
        _request: &AdvisoryRequest,
    ) -> Result<CandidatePartition, AdvisoryError> {
        tokio::time::sleep(Duration::from_millis(250)).await;
        Err(AdvisoryError::Disabled)
    }
}

pub(super) type MemoryService = DormAllocationService<MemoryRepository, DisabledAdvisory>;

pub(super) fn build_service() -> (Arc<MemoryService>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let engine = Arc::new(AllocationEngine::new(DisabledAdvisory, Duration::from_secs(30)));
    let service = Arc::new(DormAllocationService::new(repository.clone(), engine));
    (service, repository)
}

pub(super) fn register(
    service: &MemoryService,
    floors: u32,
    rooms_per_floor: u32,
    space: u32,
) -> Dorm {
    let layout = DormLayout::new(floors, rooms_per_floor, space).expect("valid layout");
    service
        .register_dorm("Maple Hall", CREATOR, layout)
        .expect("dorm registers")
}

pub(super) fn submission(user_id: u64) -> JoinSubmission {
    JoinSubmission {
        user_id,
        display_name: format!("student-{user_id}"),
        tags: "quiet early-riser".to_string(),
    }
}

pub(super) fn submit_all(
    service: &MemoryService,
    dorm_id: DormId,
    users: impl IntoIterator<Item = u64>,
) {
    for user in users {
        service
            .submit(dorm_id, submission(user))
            .expect("submission accepted");
    }
}

pub(super) async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}
