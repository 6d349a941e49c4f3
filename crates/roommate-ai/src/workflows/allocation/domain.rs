use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Identifier wrapper for applicants awaiting placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicantId(pub u64);

/// Identifier wrapper for rooms in a dorm inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl std::fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of a person requesting a bed, taken at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: ApplicantId,
    pub display_name: String,
    pub tags: Vec<String>,
}

impl Applicant {
    pub fn new(id: u64, display_name: impl Into<String>, raw_tags: &str) -> Self {
        Self {
            id: ApplicantId(id),
            display_name: display_name.into(),
            tags: normalize_tags(raw_tags),
        }
    }
}

/// Snapshot of a room row as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub label: String,
    pub capacity: u32,
    pub current_occupants: u32,
}

impl Room {
    pub fn remaining_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.current_occupants)
    }
}

pub const TAG_MARKER: char = '#';

/// Split free-text tags on whitespace or commas and give each the `#` marker.
///
/// Empty fragments are dropped and repeated tags keep their first position.
pub fn normalize_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for fragment in raw.split(|c: char| c.is_whitespace() || c == ',') {
        let body = fragment.trim().trim_start_matches(TAG_MARKER);
        if body.is_empty() {
            continue;
        }
        let tag = format!("{TAG_MARKER}{body}");
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Assignment of applicants to rooms.
///
/// An applicant id appears under at most one room; `assign` refuses a second
/// placement. Rooms keep their occupants in placement order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    rooms: BTreeMap<RoomId, Vec<ApplicantId>>,
    placed: HashMap<ApplicantId, RoomId>,
}

impl Partition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `applicant` in `room`. Returns false when already placed anywhere.
    pub fn assign(&mut self, room: RoomId, applicant: ApplicantId) -> bool {
        if self.placed.contains_key(&applicant) {
            return false;
        }
        self.placed.insert(applicant, room);
        self.rooms.entry(room).or_default().push(applicant);
        true
    }

    pub fn room_of(&self, applicant: ApplicantId) -> Option<RoomId> {
        self.placed.get(&applicant).copied()
    }

    pub fn contains(&self, applicant: ApplicantId) -> bool {
        self.placed.contains_key(&applicant)
    }

    pub fn occupants(&self, room: RoomId) -> &[ApplicantId] {
        self.rooms.get(&room).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn placed_in(&self, room: RoomId) -> u32 {
        self.occupants(room).len() as u32
    }

    /// Rooms in ascending id order with their assigned applicants.
    pub fn iter(&self) -> impl Iterator<Item = (RoomId, &[ApplicantId])> {
        self.rooms
            .iter()
            .map(|(room, applicants)| (*room, applicants.as_slice()))
    }

    pub fn rooms(&self) -> impl Iterator<Item = RoomId> + '_ {
        self.rooms.keys().copied()
    }

    /// Total number of placed applicants.
    pub fn len(&self) -> usize {
        self.placed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }

    /// Fold every placement of `other` into `self`, skipping applicants already placed.
    pub fn merge(&mut self, other: &Partition) {
        for (room, applicants) in other.iter() {
            for applicant in applicants {
                self.assign(room, *applicant);
            }
        }
    }
}

impl Serialize for Partition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.rooms.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Partition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let rooms = BTreeMap::<RoomId, Vec<ApplicantId>>::deserialize(deserializer)?;
        let mut partition = Partition::new();
        for (room, applicants) in rooms {
            for applicant in applicants {
                if !partition.assign(room, applicant) {
                    return Err(serde::de::Error::custom(format!(
                        "applicant {applicant} assigned to more than one room"
                    )));
                }
            }
        }
        Ok(partition)
    }
}

/// Where the starting candidate for a run came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdvisoryStatus {
    /// The group fit the nominal capacity and the oracle was never consulted.
    ShortCircuit,
    /// The oracle replied with a parseable candidate.
    Suggested,
    /// The oracle failed and the packer produced the whole allocation.
    Fallback { reason: String },
    /// The caller asked for the deterministic path only.
    Bypassed,
}

impl AdvisoryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AdvisoryStatus::ShortCircuit => "short_circuit",
            AdvisoryStatus::Suggested => "suggested",
            AdvisoryStatus::Fallback { .. } => "fallback",
            AdvisoryStatus::Bypassed => "bypassed",
        }
    }
}

/// Final outcome of one allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationResult {
    pub partition: Partition,
    /// Applicants left without a bed, in input order. Non-empty only on a capacity shortfall.
    pub unplaced: Vec<ApplicantId>,
    pub advisory: AdvisoryStatus,
    /// Number of candidate entries the validator had to discard or truncate.
    pub corrections: usize,
}

impl AllocationResult {
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }
}
