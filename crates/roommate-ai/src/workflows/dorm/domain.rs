use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::layout::DormLayout;
use crate::workflows::allocation::{AdvisoryStatus, Applicant, ApplicantId, Room, RoomId};

/// Identifier wrapper for dorms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DormId(pub u64);

/// Identifier wrapper for join requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JoinRequestId(pub u64);

impl std::fmt::Display for DormId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for JoinRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A shared dorm. Its creator manages join requests and never applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dorm {
    pub id: DormId,
    pub name: String,
    pub creator: ApplicantId,
    pub layout: DormLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinRequestStatus {
    Pending,
    Rejected,
    Fulfilled,
}

impl JoinRequestStatus {
    pub fn label(&self) -> &'static str {
        match self {
            JoinRequestStatus::Pending => "pending",
            JoinRequestStatus::Rejected => "rejected",
            JoinRequestStatus::Fulfilled => "fulfilled",
        }
    }
}

/// A user's request for a bed in a dorm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: JoinRequestId,
    pub dorm_id: DormId,
    pub applicant: Applicant,
    pub status: JoinRequestStatus,
    pub submitted_at: DateTime<Utc>,
}

impl JoinRequest {
    pub fn is_pending(&self) -> bool {
        self.status == JoinRequestStatus::Pending
    }

    pub fn view(&self) -> JoinRequestView {
        JoinRequestView {
            request_id: self.id,
            dorm_id: self.dorm_id,
            user_id: self.applicant.id,
            display_name: self.applicant.display_name.clone(),
            tags: self.applicant.tags.clone(),
            status: self.status.label(),
            submitted_at: self.submitted_at,
        }
    }
}

/// Payload for a new join request. `tags` is free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSubmission {
    pub user_id: u64,
    pub display_name: String,
    #[serde(default)]
    pub tags: String,
}

/// Exposed shape of a join request.
#[derive(Debug, Clone, Serialize)]
pub struct JoinRequestView {
    pub request_id: JoinRequestId,
    pub dorm_id: DormId,
    pub user_id: ApplicantId,
    pub display_name: String,
    pub tags: Vec<String>,
    pub status: &'static str,
    pub submitted_at: DateTime<Utc>,
}

/// Where one user stands with one dorm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestStatusView {
    pub dorm_id: DormId,
    pub user_id: ApplicantId,
    pub has_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<JoinRequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl RequestStatusView {
    pub fn new(dorm_id: DormId, user_id: ApplicantId, latest: Option<&JoinRequest>) -> Self {
        Self {
            dorm_id,
            user_id,
            has_applied: latest.is_some(),
            request_id: latest.map(|request| request.id),
            status: latest.map(|request| request.status.label()),
            submitted_at: latest.map(|request| request.submitted_at),
        }
    }
}

/// One committed bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyRecord {
    pub room_id: RoomId,
    pub applicant_id: ApplicantId,
    /// 1-based, continuing from the room's occupancy at commit time.
    pub bed_number: u32,
}

/// Consistent read of everything an allocation run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DormSnapshot {
    pub dorm: Dorm,
    pub rooms: Vec<Room>,
    /// Pending applicants in submission order.
    pub applicants: Vec<Applicant>,
}

/// Outcome of an allocation run as reported to callers.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationSummary {
    pub dorm_id: DormId,
    pub advisory: AdvisoryStatus,
    pub corrections: usize,
    pub placed: usize,
    pub rooms: Vec<RoomAssignmentView>,
    pub unplaced: Vec<ApplicantId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomAssignmentView {
    pub room_id: RoomId,
    pub label: String,
    pub applicants: Vec<ApplicantId>,
}

/// Occupied beds keyed `"{floor}-{index}"`.
pub type OccupancyMap = BTreeMap<String, Vec<u32>>;
