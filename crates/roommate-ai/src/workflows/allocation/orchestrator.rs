use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use super::advisory::{AdvisoryAdapter, AdvisoryOracle, CandidatePartition};
use super::domain::{AdvisoryStatus, AllocationResult, Applicant, Room};
use super::packer::pack;
use super::validator::validate;

/// Public entry point composing the advisory adapter, validator and packer.
#[derive(Debug, Clone)]
pub struct AllocationEngine<O> {
    advisory: AdvisoryAdapter<O>,
}

impl<O> AllocationEngine<O>
where
    O: AdvisoryOracle,
{
    pub fn new(oracle: O, advisory_timeout: Duration) -> Self {
        Self {
            advisory: AdvisoryAdapter::new(oracle, advisory_timeout),
        }
    }

    pub fn advisory(&self) -> &AdvisoryAdapter<O> {
        &self.advisory
    }

    /// Allocate `applicants` across `rooms`. Never fails; shortfalls land in `unplaced`.
    pub async fn allocate(
        &self,
        applicants: &[Applicant],
        rooms: &[Room],
        nominal_capacity: u32,
    ) -> AllocationResult {
        self.allocate_until(applicants, rooms, nominal_capacity, std::future::pending::<()>())
            .await
    }

    /// Like [`allocate`](Self::allocate), abandoning the advisory call once `cancel` resolves.
    /// The packer still completes the run.
    pub async fn allocate_until<C>(
        &self,
        applicants: &[Applicant],
        rooms: &[Room],
        nominal_capacity: u32,
        cancel: C,
    ) -> AllocationResult
    where
        C: Future<Output = ()>,
    {
        let applicants = distinct_applicants(applicants);
        let rooms = eligible_rooms(rooms);
        let nominal_capacity = nominal_capacity.max(1);

        let outcome = self
            .advisory
            .candidate(&applicants, &rooms, nominal_capacity, cancel)
            .await;

        complete(
            &outcome.candidate,
            outcome.status,
            &applicants,
            &rooms,
            nominal_capacity,
        )
    }
}

/// Deterministic allocation with the advisory step skipped entirely.
pub fn allocate_deterministic(
    applicants: &[Applicant],
    rooms: &[Room],
    nominal_capacity: u32,
) -> AllocationResult {
    let applicants = distinct_applicants(applicants);
    let rooms = eligible_rooms(rooms);
    complete(
        &CandidatePartition::empty(),
        AdvisoryStatus::Bypassed,
        &applicants,
        &rooms,
        nominal_capacity.max(1),
    )
}

fn complete(
    candidate: &CandidatePartition,
    advisory: AdvisoryStatus,
    applicants: &[Applicant],
    rooms: &[Room],
    nominal_capacity: u32,
) -> AllocationResult {
    let validated = validate(candidate, applicants, rooms);
    let packed = pack(
        &validated.partition,
        &validated.unplaced,
        rooms,
        nominal_capacity,
    );

    let result = AllocationResult {
        partition: packed.partition,
        unplaced: packed.unplaced,
        advisory,
        corrections: validated.corrections.len(),
    };

    info!(
        placed = result.partition.len(),
        unplaced = result.unplaced.len(),
        corrections = result.corrections,
        advisory = result.advisory.label(),
        "allocation run complete"
    );
    result
}

/// First occurrence of each applicant id wins.
fn distinct_applicants(applicants: &[Applicant]) -> Vec<Applicant> {
    let mut seen = HashSet::new();
    let mut distinct = Vec::with_capacity(applicants.len());
    for applicant in applicants {
        if seen.insert(applicant.id) {
            distinct.push(applicant.clone());
        } else {
            warn!(applicant = %applicant.id, "ignoring repeated applicant in allocation input");
        }
    }
    distinct
}

/// Rooms with free beds, first occurrence of each id.
fn eligible_rooms(rooms: &[Room]) -> Vec<Room> {
    let mut seen = HashSet::new();
    rooms
        .iter()
        .filter(|room| room.remaining_capacity() > 0)
        .filter(|room| seen.insert(room.id))
        .cloned()
        .collect()
}
