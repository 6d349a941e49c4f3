use super::common::*;
use crate::workflows::allocation::advisory::{CandidateEntry, CandidatePartition};
use crate::workflows::allocation::domain::{ApplicantId, RoomId};
use crate::workflows::allocation::validator::{validate, Correction};

fn candidate(entries: &[(u64, &[u64])]) -> CandidatePartition {
    CandidatePartition {
        entries: entries
            .iter()
            .map(|(room, applicants)| CandidateEntry {
                room: RoomId(*room),
                applicants: ids(applicants),
            })
            .collect(),
    }
}

#[test]
fn keeps_a_clean_candidate_untouched() {
    let applicants = applicants(4);
    let rooms = vec![room(1, 2, 0), room(2, 2, 0)];

    let validated = validate(&candidate(&[(1, &[1, 2]), (2, &[3, 4])]), &applicants, &rooms);

    assert!(validated.corrections.is_empty());
    assert!(validated.unplaced.is_empty());
    assert_eq!(validated.partition.occupants(RoomId(1)), ids(&[1, 2]).as_slice());
    assert_eq!(validated.partition.occupants(RoomId(2)), ids(&[3, 4]).as_slice());
}

#[test]
fn discards_unknown_and_full_rooms() {
    let applicants = applicants(3);
    let rooms = vec![room(1, 4, 0), room(2, 2, 2)];

    let validated = validate(
        &candidate(&[(99, &[1, 2]), (2, &[3]), (1, &[3])]),
        &applicants,
        &rooms,
    );

    assert_eq!(
        validated.corrections[..2],
        [
            Correction::UnknownRoom {
                room: RoomId(99),
                dropped: 2
            },
            Correction::UnknownRoom {
                room: RoomId(2),
                dropped: 1
            },
        ]
    );
    assert_eq!(validated.partition.occupants(RoomId(1)), ids(&[3]).as_slice());
    assert_eq!(validated.unplaced, ids(&[1, 2]));
}

#[test]
fn first_occurrence_wins_for_duplicates() {
    let applicants = applicants(3);
    let rooms = vec![room(1, 4, 0), room(2, 4, 0)];

    let validated = validate(
        &candidate(&[(1, &[1, 2, 1]), (2, &[2, 3])]),
        &applicants,
        &rooms,
    );

    assert_eq!(validated.partition.occupants(RoomId(1)), ids(&[1, 2]).as_slice());
    assert_eq!(validated.partition.occupants(RoomId(2)), ids(&[3]).as_slice());
    assert!(validated.corrections.contains(&Correction::DuplicateApplicant {
        room: RoomId(1),
        applicant: ApplicantId(1),
        kept_in: RoomId(1),
    }));
    assert!(validated.corrections.contains(&Correction::DuplicateApplicant {
        room: RoomId(2),
        applicant: ApplicantId(2),
        kept_in: RoomId(1),
    }));
}

#[test]
fn drops_applicants_outside_ground_truth() {
    let applicants = applicants(2);
    let rooms = vec![room(1, 4, 0)];

    let validated = validate(&candidate(&[(1, &[1, 42, 2])]), &applicants, &rooms);

    assert_eq!(validated.partition.occupants(RoomId(1)), ids(&[1, 2]).as_slice());
    assert_eq!(
        validated.corrections,
        vec![Correction::UnknownApplicant {
            room: RoomId(1),
            applicant: ApplicantId(42),
        }]
    );
}

#[test]
fn truncates_to_remaining_capacity_keeping_first_listed() {
    let applicants = applicants(5);
    let rooms = vec![room(1, 4, 2)];

    let validated = validate(&candidate(&[(1, &[5, 4, 3, 2])]), &applicants, &rooms);

    assert_eq!(validated.partition.occupants(RoomId(1)), ids(&[5, 4]).as_slice());
    assert_eq!(
        validated.corrections,
        vec![Correction::CapacityOverflow {
            room: RoomId(1),
            dropped: ids(&[3, 2]),
        }]
    );
    assert_eq!(validated.unplaced, ids(&[1, 2, 3]));
}

#[test]
fn repeated_room_keys_share_one_capacity_budget() {
    let applicants = applicants(4);
    let rooms = vec![room(1, 3, 0)];

    let validated = validate(&candidate(&[(1, &[1, 2]), (1, &[3, 4])]), &applicants, &rooms);

    assert_eq!(validated.partition.occupants(RoomId(1)), ids(&[1, 2, 3]).as_slice());
    assert_eq!(validated.unplaced, ids(&[4]));
}

#[test]
fn empty_candidate_leaves_everyone_unplaced() {
    let applicants = applicants(3);
    let validated = validate(&CandidatePartition::empty(), &applicants, &[room(1, 4, 0)]);

    assert!(validated.partition.is_empty());
    assert_eq!(validated.unplaced, ids(&[1, 2, 3]));
    assert!(validated.corrections.is_empty());
}
