use std::cmp::Ordering;

use super::domain::{Room, RoomId};

/// How many more applicants a room can take during one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomCapacity {
    pub room_id: RoomId,
    pub capacity: u32,
    pub current_occupants: u32,
}

impl RoomCapacity {
    pub fn from_room(room: &Room) -> Self {
        Self {
            room_id: room.id,
            capacity: room.capacity,
            current_occupants: room.current_occupants.min(room.capacity),
        }
    }

    pub fn remaining(&self) -> u32 {
        self.capacity - self.current_occupants
    }

    pub fn is_partially_occupied(&self) -> bool {
        self.current_occupants > 0
    }

    pub fn is_eligible(&self) -> bool {
        self.remaining() > 0
    }

    /// Same room after `placed` more applicants move in.
    pub fn with_placed(self, placed: u32) -> Self {
        Self {
            current_occupants: (self.current_occupants + placed).min(self.capacity),
            ..self
        }
    }

    /// Fullest first: compares occupancy ratios without leaving integer math.
    pub fn cmp_fill_desc(&self, other: &Self) -> Ordering {
        let lhs = u64::from(self.current_occupants) * u64::from(other.capacity);
        let rhs = u64::from(other.current_occupants) * u64::from(self.capacity);
        rhs.cmp(&lhs).then(self.room_id.cmp(&other.room_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: u64, capacity: u32, current: u32) -> RoomCapacity {
        RoomCapacity {
            room_id: RoomId(id),
            capacity,
            current_occupants: current,
        }
    }

    #[test]
    fn remaining_and_occupancy_flags() {
        let partial = room(1, 4, 1);
        assert_eq!(partial.remaining(), 3);
        assert!(partial.is_partially_occupied());
        assert!(partial.is_eligible());

        let full = room(2, 4, 4);
        assert!(!full.is_eligible());
        assert!(!room(3, 4, 0).is_partially_occupied());
    }

    #[test]
    fn from_room_clamps_overfull_rows() {
        let capacity = RoomCapacity::from_room(&Room {
            id: RoomId(9),
            label: "101".to_string(),
            capacity: 2,
            current_occupants: 5,
        });
        assert_eq!(capacity.remaining(), 0);
    }

    #[test]
    fn fill_ordering_prefers_fuller_rooms_then_lower_ids() {
        let mut rooms = vec![room(3, 4, 1), room(1, 4, 0), room(2, 2, 1), room(4, 4, 2)];
        rooms.sort_by(RoomCapacity::cmp_fill_desc);
        let order: Vec<u64> = rooms.iter().map(|r| r.room_id.0).collect();
        assert_eq!(order, vec![2, 4, 3, 1]);
    }
}
