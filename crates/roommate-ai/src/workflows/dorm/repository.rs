use super::domain::{Dorm, DormId, DormSnapshot, JoinRequest, JoinRequestId, OccupancyRecord};
use super::layout::DormLayout;
use crate::workflows::allocation::{ApplicantId, Partition, RoomId};

/// Storage abstraction so the service module can be exercised in isolation.
pub trait DormRepository: Send + Sync {
    /// Store a dorm and create its rooms from `layout`.
    fn register_dorm(
        &self,
        name: &str,
        creator: ApplicantId,
        layout: DormLayout,
    ) -> Result<Dorm, RepositoryError>;
    fn fetch_dorm(&self, id: DormId) -> Result<Option<Dorm>, RepositoryError>;
    /// Store a new pending request.
    ///
    /// Fails with `Conflict` when the id is taken or the applicant already
    /// has a pending request in the same dorm. The check and the insert
    /// happen atomically.
    fn insert_request(&self, request: JoinRequest) -> Result<JoinRequest, RepositoryError>;
    fn fetch_request(&self, id: JoinRequestId) -> Result<Option<JoinRequest>, RepositoryError>;
    fn update_request(&self, request: JoinRequest) -> Result<(), RepositoryError>;
    /// Pending requests for a dorm in submission order.
    fn pending(&self, dorm_id: DormId) -> Result<Vec<JoinRequest>, RepositoryError>;
    /// Most recent request `applicant` made for the dorm, whatever its status.
    fn latest_request(
        &self,
        dorm_id: DormId,
        applicant: ApplicantId,
    ) -> Result<Option<JoinRequest>, RepositoryError>;
    fn snapshot(&self, dorm_id: DormId) -> Result<DormSnapshot, RepositoryError>;
    /// Apply every placement in `partition` or none of them.
    ///
    /// Fails with `NotFound` for a room outside the dorm, `CapacityExceeded`
    /// when a room would overflow and `Conflict` when a placed applicant has
    /// no pending request in the dorm.
    fn commit_allocation(
        &self,
        dorm_id: DormId,
        partition: &Partition,
    ) -> Result<Vec<OccupancyRecord>, RepositoryError>;
    fn occupancy(&self, dorm_id: DormId) -> Result<Vec<OccupancyRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists or changed underneath the caller")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("room {room} has no bed left for this allocation")]
    CapacityExceeded { room: RoomId },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
