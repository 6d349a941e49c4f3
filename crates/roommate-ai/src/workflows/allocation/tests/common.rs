use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::workflows::allocation::advisory::{
    parse_candidate, AdvisoryError, AdvisoryOracle, AdvisoryRequest, CandidatePartition,
};
use crate::workflows::allocation::domain::{
    AllocationResult, Applicant, ApplicantId, Room, RoomId,
};
use crate::workflows::allocation::AllocationEngine;

pub(super) fn applicants(count: u64) -> Vec<Applicant> {
    (1..=count)
        .map(|id| Applicant::new(id, format!("applicant-{id}"), "quiet, early-riser"))
        .collect()
}

pub(super) fn room(id: u64, capacity: u32, current_occupants: u32) -> Room {
    Room {
        id: RoomId(id),
        label: format!("1{id:02}"),
        capacity,
        current_occupants,
    }
}

pub(super) fn ids(raw: &[u64]) -> Vec<ApplicantId> {
    raw.iter().copied().map(ApplicantId).collect()
}

pub(super) fn occupants(result: &AllocationResult, room: u64) -> Vec<u64> {
    result
        .partition
        .occupants(RoomId(room))
        .iter()
        .map(|applicant| applicant.0)
        .collect()
}

/// Uniqueness, capacity safety and completeness of the input accounting.
pub(super) fn assert_partition_invariants(
    result: &AllocationResult,
    applicants: &[Applicant],
    rooms: &[Room],
) {
    let mut seen = HashSet::new();
    for (room_id, assigned) in result.partition.iter() {
        let room = rooms
            .iter()
            .find(|room| room.id == room_id)
            .unwrap_or_else(|| panic!("partition references unknown room {room_id}"));
        assert!(
            room.current_occupants + assigned.len() as u32 <= room.capacity,
            "room {room_id} overfilled: {} + {} > {}",
            room.current_occupants,
            assigned.len(),
            room.capacity
        );
        for applicant in assigned {
            assert!(seen.insert(*applicant), "applicant {applicant} placed twice");
        }
    }
    for applicant in &result.unplaced {
        assert!(
            !seen.contains(applicant),
            "applicant {applicant} is both placed and unplaced"
        );
    }
    assert_eq!(
        seen.len() + result.unplaced.len(),
        applicants.len(),
        "every applicant is either placed or reported unplaced"
    );
}

/// Rooms that end the run holding exactly one person.
pub(super) fn singleton_rooms(result: &AllocationResult, rooms: &[Room]) -> Vec<u64> {
    result
        .partition
        .iter()
        .filter(|(room_id, assigned)| {
            let current = rooms
                .iter()
                .find(|room| room.id == *room_id)
                .map(|room| room.current_occupants)
                .unwrap_or_default();
            current + assigned.len() as u32 == 1
        })
        .map(|(room_id, _)| room_id.0)
        .collect()
}

#[derive(Debug, Clone)]
pub(super) enum Script {
    Reply(CandidatePartition),
    Text(String),
    Fail,
    Hang,
}

/// Oracle returning a fixed script and counting calls.
#[derive(Debug, Clone)]
pub(super) struct ScriptedOracle {
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl ScriptedOracle {
    pub(super) fn new(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AdvisoryOracle for ScriptedOracle {
    async fn suggest(
        &self,
        _request: &AdvisoryRequest,
    ) -> Result<CandidatePartition, AdvisoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Reply(candidate) => Ok(candidate.clone()),
            Script::Text(text) => parse_candidate(text),
            Script::Fail => Err(AdvisoryError::Transport("connection refused".to_string())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AdvisoryError::Transport("unreachable".to_string()))
            }
        }
    }
}

pub(super) fn engine(script: Script) -> (AllocationEngine<ScriptedOracle>, ScriptedOracle) {
    let oracle = ScriptedOracle::new(script);
    (
        AllocationEngine::new(oracle.clone(), Duration::from_secs(30)),
        oracle,
    )
}
