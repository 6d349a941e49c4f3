use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{
    AllocationSummary, Dorm, DormId, DormSnapshot, JoinRequest, JoinRequestId, JoinRequestStatus,
    JoinSubmission, OccupancyMap, RequestStatusView, RoomAssignmentView,
};
use super::layout::{occupancy_key, DormError, DormLayout};
use super::repository::{DormRepository, RepositoryError};
use crate::workflows::allocation::{
    AdvisoryOracle, AllocationEngine, AllocationResult, Applicant, ApplicantId,
};

/// Service composing the dorm repository and the allocation engine.
pub struct DormAllocationService<R, O> {
    repository: Arc<R>,
    engine: Arc<AllocationEngine<O>>,
    run_locks: Mutex<HashMap<DormId, Arc<tokio::sync::Mutex<()>>>>,
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> JoinRequestId {
    JoinRequestId(REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

impl<R, O> DormAllocationService<R, O>
where
    R: DormRepository + 'static,
    O: AdvisoryOracle + 'static,
{
    pub fn new(repository: Arc<R>, engine: Arc<AllocationEngine<O>>) -> Self {
        Self {
            repository,
            engine,
            run_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &AllocationEngine<O> {
        &self.engine
    }

    pub fn register_dorm(
        &self,
        name: &str,
        creator: ApplicantId,
        layout: DormLayout,
    ) -> Result<Dorm, DormServiceError> {
        layout.validate()?;
        let dorm = self.repository.register_dorm(name, creator, layout)?;
        info!(
            dorm = %dorm.id,
            rooms = layout.room_count(),
            space = layout.space,
            "registered dorm"
        );
        Ok(dorm)
    }

    pub fn dorm(&self, dorm_id: DormId) -> Result<Dorm, DormServiceError> {
        self.repository
            .fetch_dorm(dorm_id)?
            .ok_or(DormServiceError::DormNotFound(dorm_id))
    }

    /// Record a pending join request for `dorm_id`.
    pub fn submit(
        &self,
        dorm_id: DormId,
        submission: JoinSubmission,
    ) -> Result<JoinRequest, DormServiceError> {
        let dorm = self.dorm(dorm_id)?;
        let applicant = Applicant::new(
            submission.user_id,
            submission.display_name.trim(),
            &submission.tags,
        );

        if applicant.id == dorm.creator {
            return Err(DormServiceError::CreatorCannotApply);
        }

        let request = JoinRequest {
            id: next_request_id(),
            dorm_id,
            applicant,
            status: JoinRequestStatus::Pending,
            submitted_at: Utc::now(),
        };
        match self.repository.insert_request(request) {
            Ok(request) => Ok(request),
            Err(RepositoryError::Conflict) => Err(DormServiceError::DuplicatePendingRequest),
            Err(err) => Err(err.into()),
        }
    }

    /// Reject a pending request on behalf of the dorm creator.
    pub fn reject(
        &self,
        request_id: JoinRequestId,
        acting_user: ApplicantId,
    ) -> Result<JoinRequest, DormServiceError> {
        let mut request = self
            .repository
            .fetch_request(request_id)?
            .ok_or(DormServiceError::RequestNotFound(request_id))?;
        let dorm = self.dorm(request.dorm_id)?;

        if dorm.creator != acting_user {
            return Err(DormServiceError::NotDormCreator);
        }
        if !request.is_pending() {
            return Err(DormServiceError::RequestNotPending(request_id));
        }

        request.status = JoinRequestStatus::Rejected;
        self.repository.update_request(request.clone())?;
        Ok(request)
    }

    /// Pending requests in submission order, visible to the dorm creator only.
    pub fn pending(
        &self,
        dorm_id: DormId,
        acting_user: ApplicantId,
    ) -> Result<Vec<JoinRequest>, DormServiceError> {
        let dorm = self.dorm(dorm_id)?;
        if dorm.creator != acting_user {
            return Err(DormServiceError::NotDormCreator);
        }
        Ok(self.repository.pending(dorm_id)?)
    }

    /// Latest request `user` made for the dorm, if any.
    pub fn request_status(
        &self,
        dorm_id: DormId,
        user: ApplicantId,
    ) -> Result<RequestStatusView, DormServiceError> {
        self.dorm(dorm_id)?;
        let latest = self.repository.latest_request(dorm_id, user)?;
        Ok(RequestStatusView::new(dorm_id, user, latest.as_ref()))
    }

    /// Allocate every pending applicant of the dorm and commit the placements.
    ///
    /// Runs for the same dorm are serialized from snapshot to commit.
    /// Applicants that do not fit stay pending and are listed as unplaced.
    pub async fn allocate(&self, dorm_id: DormId) -> Result<AllocationSummary, DormServiceError> {
        let lock = self.run_lock(dorm_id);
        let _guard = lock.lock().await;

        let snapshot = self.snapshot(dorm_id)?;
        if snapshot.applicants.is_empty() {
            return Err(DormServiceError::NoPendingRequests(dorm_id));
        }

        let result = self
            .engine
            .allocate(
                &snapshot.applicants,
                &snapshot.rooms,
                snapshot.dorm.layout.space,
            )
            .await;

        let committed = if result.partition.is_empty() {
            0
        } else {
            self.repository
                .commit_allocation(dorm_id, &result.partition)?
                .len()
        };

        if !result.is_complete() {
            warn!(
                dorm = %dorm_id,
                unplaced = result.unplaced.len(),
                "dorm ran out of beds; unplaced applicants stay pending"
            );
        }
        info!(dorm = %dorm_id, committed, "committed allocation");

        Ok(summarize(&snapshot, &result))
    }

    /// Occupied bed numbers per room.
    pub fn occupancy(&self, dorm_id: DormId) -> Result<OccupancyMap, DormServiceError> {
        let snapshot = self.snapshot(dorm_id)?;
        let labels: HashMap<_, _> = snapshot
            .rooms
            .iter()
            .map(|room| (room.id, room.label.as_str()))
            .collect();

        let mut map = OccupancyMap::new();
        for record in self.repository.occupancy(dorm_id)? {
            let key = match labels.get(&record.room_id) {
                Some(label) => occupancy_key(label),
                None => record.room_id.to_string(),
            };
            map.entry(key).or_default().push(record.bed_number);
        }
        for beds in map.values_mut() {
            beds.sort_unstable();
        }
        Ok(map)
    }

    fn snapshot(&self, dorm_id: DormId) -> Result<DormSnapshot, DormServiceError> {
        self.repository.snapshot(dorm_id).map_err(|err| match err {
            RepositoryError::NotFound => DormServiceError::DormNotFound(dorm_id),
            other => DormServiceError::Repository(other),
        })
    }

    fn run_lock(&self, dorm_id: DormId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .run_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(dorm_id).or_default().clone()
    }
}

fn summarize(snapshot: &DormSnapshot, result: &AllocationResult) -> AllocationSummary {
    let rooms = result
        .partition
        .iter()
        .map(|(room_id, applicants)| RoomAssignmentView {
            room_id,
            label: snapshot
                .rooms
                .iter()
                .find(|room| room.id == room_id)
                .map(|room| room.label.clone())
                .unwrap_or_else(|| room_id.to_string()),
            applicants: applicants.to_vec(),
        })
        .collect();

    AllocationSummary {
        dorm_id: snapshot.dorm.id,
        advisory: result.advisory.clone(),
        corrections: result.corrections,
        placed: result.partition.len(),
        rooms,
        unplaced: result.unplaced.clone(),
    }
}

/// Error raised by the dorm allocation service.
#[derive(Debug, thiserror::Error)]
pub enum DormServiceError {
    #[error(transparent)]
    Layout(#[from] DormError),
    #[error("dorm {0} not found")]
    DormNotFound(DormId),
    #[error("join request {0} not found")]
    RequestNotFound(JoinRequestId),
    #[error("the dorm creator cannot apply to their own dorm")]
    CreatorCannotApply,
    #[error("a pending join request already exists for this user")]
    DuplicatePendingRequest,
    #[error("only the dorm creator may manage join requests")]
    NotDormCreator,
    #[error("join request {0} is no longer pending")]
    RequestNotPending(JoinRequestId),
    #[error("dorm {0} has no pending join requests")]
    NoPendingRequests(DormId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
