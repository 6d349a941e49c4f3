//! Deterministic completion of a partially filled partition.
//!
//! Three passes over the rooms:
//!
//! 1. top up rooms that already hold someone, fullest first, holding one
//!    bed back in the last of them when an empty room can take a pair;
//! 2. open as few empty rooms as the remainder needs, lowest id first,
//!    never opening a room for a lone applicant and holding one bed back
//!    when filling a room to the brim would strand a single person;
//! 3. sweep whatever capacity is left in ascending id order with no
//!    singleton rule, so nobody is left out while a bed is free.

use std::collections::VecDeque;

use tracing::debug;

use super::capacity::RoomCapacity;
use super::domain::{ApplicantId, Partition, Room};

/// Completed partition and anyone who did not fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedPartition {
    pub partition: Partition,
    pub unplaced: Vec<ApplicantId>,
}

/// Place every applicant in `unplaced` on top of `seed`.
///
/// `seed` must already respect capacity for `rooms`; placements in it are
/// kept untouched. The result is a pure function of the inputs.
pub fn pack(
    seed: &Partition,
    unplaced: &[ApplicantId],
    rooms: &[Room],
    nominal_capacity: u32,
) -> PackedPartition {
    let nominal_capacity = nominal_capacity.max(1);
    let mut partition = seed.clone();
    let mut queue: VecDeque<ApplicantId> = unplaced
        .iter()
        .copied()
        .filter(|applicant| !seed.contains(*applicant))
        .collect();

    let mut slots: Vec<RoomCapacity> = rooms
        .iter()
        .map(|room| RoomCapacity::from_room(room).with_placed(seed.placed_in(room.id)))
        .filter(RoomCapacity::is_eligible)
        .collect();
    slots.sort_by_key(|slot| slot.room_id);
    slots.dedup_by_key(|slot| slot.room_id);

    top_up_occupied(&mut slots, &mut queue, &mut partition);
    open_empty_rooms(&mut slots, &mut queue, &mut partition, nominal_capacity);
    sweep_remaining(&mut slots, &mut queue, &mut partition);

    if !queue.is_empty() {
        debug!(unplaced = queue.len(), "capacity exhausted before every applicant was placed");
    }

    PackedPartition {
        partition,
        unplaced: queue.into_iter().collect(),
    }
}

fn fill(
    slot: &mut RoomCapacity,
    count: u32,
    queue: &mut VecDeque<ApplicantId>,
    partition: &mut Partition,
) -> u32 {
    let mut placed = 0;
    while placed < count {
        let Some(applicant) = queue.pop_front() else {
            break;
        };
        partition.assign(slot.room_id, applicant);
        placed += 1;
    }
    *slot = slot.with_placed(placed);
    placed
}

/// Pass A.
fn top_up_occupied(
    slots: &mut [RoomCapacity],
    queue: &mut VecDeque<ApplicantId>,
    partition: &mut Partition,
) {
    let mut order: Vec<usize> = (0..slots.len())
        .filter(|&index| slots[index].is_partially_occupied())
        .collect();
    order.sort_by(|&a, &b| slots[a].cmp_fill_desc(&slots[b]));

    let empty_room_can_pair = slots
        .iter()
        .any(|slot| !slot.is_partially_occupied() && slot.remaining() >= 2);

    let mut placed = 0;
    for (position, &index) in order.iter().enumerate() {
        if queue.is_empty() {
            break;
        }

        let waiting = queue.len() as u32;
        let mut take = waiting.min(slots[index].remaining());
        let last_occupied = order[position + 1..]
            .iter()
            .all(|&later| !slots[later].is_eligible());
        if waiting - take == 1 && last_occupied && empty_room_can_pair {
            take -= 1;
        }

        placed += fill(&mut slots[index], take, queue, partition);
    }
    debug!(placed, "topped up occupied rooms");
}

/// Pass B.
fn open_empty_rooms(
    slots: &mut [RoomCapacity],
    queue: &mut VecDeque<ApplicantId>,
    partition: &mut Partition,
    nominal_capacity: u32,
) {
    if queue.is_empty() {
        return;
    }

    let empty: Vec<usize> = (0..slots.len())
        .filter(|&index| !slots[index].is_partially_occupied() && slots[index].is_eligible())
        .collect();
    let needed = (queue.len() as u32).div_ceil(nominal_capacity) as usize;

    let mut opened = 0;
    for (position, &index) in empty.iter().enumerate() {
        if queue.is_empty() || opened == needed {
            break;
        }

        let waiting = queue.len() as u32;
        let mut take = waiting.min(slots[index].remaining());
        if take == 1 {
            continue;
        }

        let strands_one = waiting - take == 1;
        let next_room_can_pair = empty[position + 1..]
            .iter()
            .any(|&later| slots[later].remaining() >= 2);
        if strands_one && take > 2 && next_room_can_pair && opened + 1 < needed {
            take -= 1;
        }

        fill(&mut slots[index], take, queue, partition);
        opened += 1;
    }
    debug!(opened, needed, "opened empty rooms");
}

/// Pass C.
fn sweep_remaining(
    slots: &mut [RoomCapacity],
    queue: &mut VecDeque<ApplicantId>,
    partition: &mut Partition,
) {
    for slot in slots.iter_mut() {
        if queue.is_empty() {
            break;
        }
        let free = slot.remaining();
        fill(slot, free, queue, partition);
    }
}
