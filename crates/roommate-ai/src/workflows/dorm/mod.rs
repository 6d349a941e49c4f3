//! Dorm join requests and the allocation runs that turn them into beds.

pub mod domain;
pub mod layout;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    AllocationSummary, Dorm, DormId, DormSnapshot, JoinRequest, JoinRequestId, JoinRequestStatus,
    JoinRequestView, JoinSubmission, OccupancyMap, OccupancyRecord, RequestStatusView,
    RoomAssignmentView,
};
pub use layout::{
    decode_label, occupancy_key, room_label, DormError, DormLayout, MAX_FLOORS,
    MAX_ROOMS_PER_FLOOR, SUPPORTED_SPACES,
};
pub use repository::{DormRepository, RepositoryError};
pub use router::{dorm_router, status_for, ActingUser, RegisterDormPayload, RejectPayload};
pub use service::{DormAllocationService, DormServiceError};
