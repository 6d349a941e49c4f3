//! Roommate allocation engine.
//!
//! An allocation run takes a snapshot of pending applicants and rooms with
//! free beds and returns a [`Partition`] that never overfills a room, never
//! places anyone twice, prefers finishing partly filled rooms and avoids
//! rooms with a single occupant. An external oracle may propose the grouping;
//! whatever it returns is sanitized and completed by a deterministic packer,
//! so the outcome is the same shape whether the oracle helps, lies or is down.

pub mod advisory;
pub mod capacity;
pub mod domain;
pub mod orchestrator;
pub mod packer;
pub mod validator;

#[cfg(test)]
mod tests;

pub use advisory::{
    AdvisoryAdapter, AdvisoryBackend, AdvisoryError, AdvisoryOracle, AdvisoryRequest,
    CandidateEntry, CandidatePartition, DisabledAdvisory, HttpAdvisoryOracle,
};
pub use capacity::RoomCapacity;
pub use domain::{
    normalize_tags, AdvisoryStatus, AllocationResult, Applicant, ApplicantId, Partition, Room,
    RoomId,
};
pub use orchestrator::{allocate_deterministic, AllocationEngine};
pub use packer::{pack, PackedPartition};
pub use validator::{validate, Correction, ValidatedPartition};
