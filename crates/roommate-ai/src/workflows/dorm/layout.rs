use serde::{Deserialize, Serialize};

use crate::workflows::allocation::{Room, RoomId};

/// Room sizes a dorm may be built with.
pub const SUPPORTED_SPACES: [u32; 4] = [2, 4, 6, 8];

/// Two-digit room index within a floor.
pub const MAX_ROOMS_PER_FLOOR: u32 = 99;

/// Tallest dorm that can be registered.
pub const MAX_FLOORS: u32 = 99;

/// Shape of a dorm: every room holds `space` beds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DormLayout {
    pub floors: u32,
    pub rooms_per_floor: u32,
    pub space: u32,
}

impl DormLayout {
    pub fn new(floors: u32, rooms_per_floor: u32, space: u32) -> Result<Self, DormError> {
        let layout = Self {
            floors,
            rooms_per_floor,
            space,
        };
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<(), DormError> {
        if !SUPPORTED_SPACES.contains(&self.space) {
            return Err(DormError::UnsupportedSpace(self.space));
        }
        if self.floors == 0 {
            return Err(DormError::NoFloors);
        }
        if self.floors > MAX_FLOORS {
            return Err(DormError::TooManyFloors(self.floors));
        }
        if self.rooms_per_floor == 0 {
            return Err(DormError::NoRoomsPerFloor);
        }
        if self.rooms_per_floor > MAX_ROOMS_PER_FLOOR {
            return Err(DormError::TooManyRoomsPerFloor(self.rooms_per_floor));
        }
        Ok(())
    }

    pub fn room_count(&self) -> u64 {
        u64::from(self.floors) * u64::from(self.rooms_per_floor)
    }

    pub fn bed_count(&self) -> u64 {
        self.room_count() * u64::from(self.space)
    }

    /// Empty rooms floor by floor, ids counting up from `first_room_id`.
    pub fn rooms(&self, first_room_id: u64) -> Vec<Room> {
        let mut next_id = first_room_id;
        let mut rooms = Vec::with_capacity(self.room_count() as usize);
        for floor in 1..=self.floors {
            for index in 1..=self.rooms_per_floor {
                rooms.push(Room {
                    id: RoomId(next_id),
                    label: room_label(floor, index),
                    capacity: self.space,
                    current_occupants: 0,
                });
                next_id += 1;
            }
        }
        rooms
    }
}

pub fn room_label(floor: u32, index: u32) -> String {
    format!("{floor}{index:02}")
}

/// Inverse of [`room_label`].
pub fn decode_label(label: &str) -> Option<(u32, u32)> {
    if label.len() < 3 || !label.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let (floor, index) = label.split_at(label.len() - 2);
    let floor = floor.parse::<u32>().ok()?;
    let index = index.parse::<u32>().ok()?;
    (floor > 0 && index > 0).then_some((floor, index))
}

/// Occupancy map key, `"{floor}-{index}"`.
pub fn occupancy_key(label: &str) -> String {
    match decode_label(label) {
        Some((floor, index)) => format!("{floor}-{index}"),
        None => label.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DormError {
    #[error("room space {0} is not supported (expected 2, 4, 6 or 8)")]
    UnsupportedSpace(u32),
    #[error("a dorm needs at least one floor")]
    NoFloors,
    #[error("{0} floors exceeds the limit of {max}", max = MAX_FLOORS)]
    TooManyFloors(u32),
    #[error("a floor needs at least one room")]
    NoRoomsPerFloor,
    #[error("{0} rooms per floor exceeds the two-digit room index")]
    TooManyRoomsPerFloor(u32),
}
