//! Advisory adapter: asks an external oracle for a candidate grouping.
//!
//! The adapter never fails. Timeouts, cancellation, transport errors and
//! replies that do not match the expected shape all collapse into an empty
//! candidate, which leaves the whole run to the deterministic packer.

pub mod client;
mod prompt;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use super::capacity::RoomCapacity;
use super::domain::{AdvisoryStatus, Applicant, ApplicantId, Room, RoomId};

pub use client::{AdvisoryBackend, DisabledAdvisory, HttpAdvisoryOracle};
pub use prompt::render_prompt;

pub const DEFAULT_ADVISORY_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome rules handed to the oracle alongside the room and applicant summaries.
pub const ALLOCATION_POLICY: [&str; 4] = [
    "group applicants whose tags are similar or compatible",
    "separate applicants whose tags conflict",
    "fill partially occupied rooms before opening empty ones",
    "avoid leaving a room with exactly one occupant unless no alternative exists",
];

/// Typed payload describing one allocation problem to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvisoryRequest {
    pub applicants: Vec<ApplicantSummary>,
    pub rooms: Vec<RoomSummary>,
    pub nominal_capacity: u32,
    pub policy: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicantSummary {
    pub id: ApplicantId,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub label: String,
    pub remaining_capacity: u32,
    pub current_occupants: u32,
}

impl AdvisoryRequest {
    pub fn new(applicants: &[Applicant], rooms: &[Room], nominal_capacity: u32) -> Self {
        Self {
            applicants: applicants
                .iter()
                .map(|applicant| ApplicantSummary {
                    id: applicant.id,
                    tags: applicant.tags.clone(),
                })
                .collect(),
            rooms: rooms
                .iter()
                .filter(|room| room.remaining_capacity() > 0)
                .map(|room| RoomSummary {
                    id: room.id,
                    label: room.label.clone(),
                    remaining_capacity: room.remaining_capacity(),
                    current_occupants: room.current_occupants,
                })
                .collect(),
            nominal_capacity,
            policy: ALLOCATION_POLICY.iter().map(|rule| rule.to_string()).collect(),
        }
    }
}

/// Unvalidated room-to-applicants suggestion, kept in reply order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidatePartition {
    pub entries: Vec<CandidateEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEntry {
    pub room: RoomId,
    pub applicants: Vec<ApplicantId>,
}

impl CandidatePartition {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(room: RoomId, applicants: Vec<ApplicantId>) -> Self {
        Self {
            entries: vec![CandidateEntry { room, applicants }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse the oracle's reply text. The reply must be exactly one JSON object
/// mapping room ids to arrays of applicant ids; ids may be integers or
/// integer strings.
pub fn parse_candidate(text: &str) -> Result<CandidatePartition, AdvisoryError> {
    serde_json::from_str::<CandidatePartition>(text.trim())
        .map_err(|err| AdvisoryError::Malformed(err.to_string()))
}

impl<'de> Deserialize<'de> for CandidatePartition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CandidateVisitor;

        impl<'de> Visitor<'de> for CandidateVisitor {
            type Value = CandidatePartition;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping room ids to applicant id arrays")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some(room) = map.next_key::<IdToken>()? {
                    let applicants = map.next_value::<IdList>()?;
                    entries.push(CandidateEntry {
                        room: RoomId(room.0),
                        applicants: applicants.0.into_iter().map(ApplicantId).collect(),
                    });
                }
                Ok(CandidatePartition { entries })
            }
        }

        deserializer.deserialize_map(CandidateVisitor)
    }
}

/// Integer id given either as a JSON number or as a string of digits.
struct IdToken(u64);

impl<'de> Deserialize<'de> for IdToken {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;

        impl<'de> Visitor<'de> for IdVisitor {
            type Value = IdToken;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer id")
            }

            fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<IdToken, E> {
                Ok(IdToken(value))
            }

            fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<IdToken, E> {
                u64::try_from(value)
                    .map(IdToken)
                    .map_err(|_| E::custom(format!("negative id {value}")))
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<IdToken, E> {
                value
                    .trim()
                    .parse::<u64>()
                    .map(IdToken)
                    .map_err(|_| E::custom(format!("'{value}' is not an integer id")))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

struct IdList(Vec<u64>);

impl<'de> Deserialize<'de> for IdList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ListVisitor;

        impl<'de> Visitor<'de> for ListVisitor {
            type Value = IdList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array of applicant ids")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<IdList, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut ids = Vec::new();
                while let Some(token) = seq.next_element::<IdToken>()? {
                    ids.push(token.0);
                }
                Ok(IdList(ids))
            }
        }

        deserializer.deserialize_seq(ListVisitor)
    }
}

/// Failure modes of an oracle call. Absorbed by [`AdvisoryAdapter`].
#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("advisory oracle is not configured")]
    Disabled,
    #[error("advisory oracle did not answer within {0:?}")]
    Timeout(Duration),
    #[error("advisory call cancelled")]
    Cancelled,
    #[error("advisory endpoint unsupported: {0}")]
    UnsupportedEndpoint(String),
    #[error("advisory transport failed: {0}")]
    Transport(String),
    #[error("advisory oracle responded with HTTP {0}")]
    HttpStatus(u16),
    #[error("advisory oracle reported status {status}: {message}")]
    OracleStatus { status: i64, message: String },
    #[error("advisory reply malformed: {0}")]
    Malformed(String),
}

/// Source of candidate partitions. Implementations may be slow or wrong.
pub trait AdvisoryOracle: Send + Sync {
    fn suggest(
        &self,
        request: &AdvisoryRequest,
    ) -> impl Future<Output = Result<CandidatePartition, AdvisoryError>> + Send;
}

/// Candidate produced by the adapter plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryOutcome {
    pub candidate: CandidatePartition,
    pub status: AdvisoryStatus,
}

/// Wraps an oracle with the small-group shortcut and a hard deadline.
#[derive(Debug, Clone)]
pub struct AdvisoryAdapter<O> {
    oracle: O,
    timeout: Duration,
}

impl<O> AdvisoryAdapter<O>
where
    O: AdvisoryOracle,
{
    pub fn new(oracle: O, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Produce a candidate partition. Resolving `cancel` abandons the oracle call only.
    pub async fn candidate<C>(
        &self,
        applicants: &[Applicant],
        rooms: &[Room],
        nominal_capacity: u32,
        cancel: C,
    ) -> AdvisoryOutcome
    where
        C: Future<Output = ()>,
    {
        if applicants.len() <= nominal_capacity as usize {
            return AdvisoryOutcome {
                candidate: small_group_candidate(applicants, rooms),
                status: AdvisoryStatus::ShortCircuit,
            };
        }

        let request = AdvisoryRequest::new(applicants, rooms, nominal_capacity);
        debug!(
            applicants = request.applicants.len(),
            rooms = request.rooms.len(),
            nominal_capacity,
            "requesting advisory partition"
        );

        let call = tokio::time::timeout(self.timeout, self.oracle.suggest(&request));
        let reply = tokio::select! {
            biased;
            _ = cancel => Err(AdvisoryError::Cancelled),
            result = call => match result {
                Ok(reply) => reply,
                Err(_) => Err(AdvisoryError::Timeout(self.timeout)),
            },
        };

        match reply {
            Ok(candidate) => AdvisoryOutcome {
                candidate,
                status: AdvisoryStatus::Suggested,
            },
            Err(err) => {
                warn!(error = %err, "advisory unavailable, falling back to deterministic packing");
                AdvisoryOutcome {
                    candidate: CandidatePartition::empty(),
                    status: AdvisoryStatus::Fallback {
                        reason: err.to_string(),
                    },
                }
            }
        }
    }
}

/// Everyone into the room with the most remaining capacity, lowest id on ties.
fn small_group_candidate(applicants: &[Applicant], rooms: &[Room]) -> CandidatePartition {
    if applicants.is_empty() {
        return CandidatePartition::empty();
    }

    let target = rooms
        .iter()
        .map(RoomCapacity::from_room)
        .filter(RoomCapacity::is_eligible)
        .max_by(|a, b| {
            a.remaining()
                .cmp(&b.remaining())
                .then(b.room_id.cmp(&a.room_id))
        });

    match target {
        Some(room) => CandidatePartition::single(
            room.room_id,
            applicants.iter().map(|applicant| applicant.id).collect(),
        ),
        None => CandidatePartition::empty(),
    }
}
