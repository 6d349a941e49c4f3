use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::warn;

use super::advisory::CandidatePartition;
use super::capacity::RoomCapacity;
use super::domain::{Applicant, ApplicantId, Partition, Room, RoomId};

/// One adjustment made while sanitizing a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correction {
    UnknownRoom {
        room: RoomId,
        dropped: usize,
    },
    UnknownApplicant {
        room: RoomId,
        applicant: ApplicantId,
    },
    DuplicateApplicant {
        room: RoomId,
        applicant: ApplicantId,
        kept_in: RoomId,
    },
    CapacityOverflow {
        room: RoomId,
        dropped: Vec<ApplicantId>,
    },
}

/// Safe subset of a candidate plus who is still waiting for a bed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPartition {
    pub partition: Partition,
    /// Ground-truth applicants not kept, in input order.
    pub unplaced: Vec<ApplicantId>,
    pub corrections: Vec<Correction>,
}

/// Strip `candidate` down to placements that respect the known rooms,
/// the known applicants, uniqueness and remaining capacity.
///
/// Entries are processed in candidate order; within a room the first listed
/// applicants are kept. Never fails.
pub fn validate(
    candidate: &CandidatePartition,
    applicants: &[Applicant],
    rooms: &[Room],
) -> ValidatedPartition {
    let capacities: HashMap<RoomId, RoomCapacity> = rooms
        .iter()
        .map(RoomCapacity::from_room)
        .filter(RoomCapacity::is_eligible)
        .map(|capacity| (capacity.room_id, capacity))
        .collect();
    let known: HashSet<ApplicantId> = applicants.iter().map(|applicant| applicant.id).collect();

    let mut partition = Partition::new();
    let mut corrections = Vec::new();

    for entry in &candidate.entries {
        let Some(capacity) = capacities.get(&entry.room) else {
            corrections.push(Correction::UnknownRoom {
                room: entry.room,
                dropped: entry.applicants.len(),
            });
            continue;
        };

        let mut free = capacity
            .remaining()
            .saturating_sub(partition.placed_in(entry.room));
        let mut overflow = Vec::new();

        for applicant in &entry.applicants {
            if !known.contains(applicant) {
                corrections.push(Correction::UnknownApplicant {
                    room: entry.room,
                    applicant: *applicant,
                });
                continue;
            }
            if let Some(kept_in) = partition.room_of(*applicant) {
                corrections.push(Correction::DuplicateApplicant {
                    room: entry.room,
                    applicant: *applicant,
                    kept_in,
                });
                continue;
            }
            if overflow.contains(applicant) {
                continue;
            }
            if free == 0 {
                overflow.push(*applicant);
                continue;
            }
            partition.assign(entry.room, *applicant);
            free -= 1;
        }

        if !overflow.is_empty() {
            corrections.push(Correction::CapacityOverflow {
                room: entry.room,
                dropped: overflow,
            });
        }
    }

    for correction in &corrections {
        warn!(?correction, "corrected advisory candidate");
    }

    let unplaced = applicants
        .iter()
        .map(|applicant| applicant.id)
        .filter(|id| !partition.contains(*id))
        .collect();

    ValidatedPartition {
        partition,
        unplaced,
        corrections,
    }
}
