use metrics_exporter_prometheus::PrometheusHandle;
use roommate_ai::workflows::allocation::{ApplicantId, Partition, Room};
use roommate_ai::workflows::dorm::{
    Dorm, DormId, DormLayout, DormRepository, DormSnapshot, JoinRequest, JoinRequestId,
    JoinRequestStatus, OccupancyRecord, RepositoryError, SUPPORTED_SPACES,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct DormStore {
    dorms: HashMap<DormId, Dorm>,
    rooms: HashMap<DormId, Vec<Room>>,
    requests: HashMap<JoinRequestId, JoinRequest>,
    /// Request ids in submission order.
    submissions: Vec<JoinRequestId>,
    occupancy: HashMap<DormId, Vec<OccupancyRecord>>,
    next_dorm_id: u64,
    next_room_id: u64,
}

impl DormStore {
    fn pending(&self, dorm_id: DormId) -> Vec<JoinRequest> {
        self.submissions
            .iter()
            .filter_map(|id| self.requests.get(id))
            .filter(|request| request.dorm_id == dorm_id && request.is_pending())
            .cloned()
            .collect()
    }
}

/// Process-local dorm store. Every operation runs under one lock, so
/// snapshots are consistent and commits are all-or-nothing.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDormRepository {
    store: Arc<Mutex<DormStore>>,
}

impl InMemoryDormRepository {
    fn lock(&self) -> Result<MutexGuard<'_, DormStore>, RepositoryError> {
        self.store
            .lock()
            .map_err(|_| RepositoryError::Unavailable("dorm store lock poisoned".to_string()))
    }
}

impl DormRepository for InMemoryDormRepository {
    fn register_dorm(
        &self,
        name: &str,
        creator: ApplicantId,
        layout: DormLayout,
    ) -> Result<Dorm, RepositoryError> {
        let mut store = self.lock()?;
        store.next_dorm_id += 1;
        let dorm = Dorm {
            id: DormId(store.next_dorm_id),
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
        Ok(self.lock()?.dorms.get(&id).cloned())
    }

    fn insert_request(&self, request: JoinRequest) -> Result<JoinRequest, RepositoryError> {
        let mut store = self.lock()?;
        let duplicate = store.pending(request.dorm_id).iter().any(|existing| {
            existing.applicant.id == request.applicant.id
        });
        if duplicate || store.requests.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        store.submissions.push(request.id);
        store.requests.insert(request.id, request.clone());
        Ok(request)
    }

    fn fetch_request(&self, id: JoinRequestId) -> Result<Option<JoinRequest>, RepositoryError> {
        Ok(self.lock()?.requests.get(&id).cloned())
    }

    fn update_request(&self, request: JoinRequest) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        match store.requests.get_mut(&request.id) {
            Some(slot) => {
                *slot = request;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn pending(&self, dorm_id: DormId) -> Result<Vec<JoinRequest>, RepositoryError> {
        Ok(self.lock()?.pending(dorm_id))
    }

    fn latest_request(
        &self,
        dorm_id: DormId,
        applicant: ApplicantId,
    ) -> Result<Option<JoinRequest>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .submissions
            .iter()
            .rev()
            .filter_map(|id| store.requests.get(id))
            .find(|request| request.dorm_id == dorm_id && request.applicant.id == applicant)
            .cloned())
    }

    fn snapshot(&self, dorm_id: DormId) -> Result<DormSnapshot, RepositoryError> {
        let store = self.lock()?;
        let dorm = store
            .dorms
            .get(&dorm_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        Ok(DormSnapshot {
            dorm,
            rooms: store.rooms.get(&dorm_id).cloned().unwrap_or_default(),
            applicants: store
                .pending(dorm_id)
                .into_iter()
                .map(|request| request.applicant)
                .collect(),
        })
    }

    fn commit_allocation(
        &self,
        dorm_id: DormId,
        partition: &Partition,
    ) -> Result<Vec<OccupancyRecord>, RepositoryError> {
        let mut store = self.lock()?;
        let store = &mut *store;

        let pending: HashMap<ApplicantId, JoinRequestId> = store
            .pending(dorm_id)
            .into_iter()
            .map(|request| (request.applicant.id, request.id))
            .collect();
        let rooms = store
            .rooms
            .get_mut(&dorm_id)
            .ok_or(RepositoryError::NotFound)?;

        let mut targets = Vec::new();
        for (room_id, applicants) in partition.iter() {
            let index = rooms
                .iter()
                .position(|room| room.id == room_id)
                .ok_or(RepositoryError::NotFound)?;
            let room = &rooms[index];
            if room.current_occupants as usize + applicants.len() > room.capacity as usize {
                return Err(RepositoryError::CapacityExceeded { room: room_id });
            }
            if applicants.iter().any(|applicant| !pending.contains_key(applicant)) {
                return Err(RepositoryError::Conflict);
            }
            targets.push((index, applicants));
        }

        let mut records = Vec::with_capacity(partition.len());
        for (index, applicants) in targets {
            let room = &mut rooms[index];
            for applicant in applicants {
                room.current_occupants += 1;
                records.push(OccupancyRecord {
                    room_id: room.id,
                    applicant_id: *applicant,
                    bed_number: room.current_occupants,
                });
                if let Some(request) = pending
                    .get(applicant)
                    .and_then(|id| store.requests.get_mut(id))
                {
                    request.status = JoinRequestStatus::Fulfilled;
                }
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
        Ok(self
            .lock()?
            .occupancy
            .get(&dorm_id)
            .cloned()
            .unwrap_or_default())
    }
}

pub(crate) fn parse_space(raw: &str) -> Result<u32, String> {
    let space = raw
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("failed to parse '{raw}' as a room size ({err})"))?;
    if SUPPORTED_SPACES.contains(&space) {
        Ok(space)
    } else {
        Err(format!("room size must be one of {SUPPORTED_SPACES:?}, got {space}"))
    }
}
