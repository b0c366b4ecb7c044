//! Fuzz target for queue operation sequences
//!
//! # Strategy
//!
//! - Operation sequences: Joins, serves, gate toggles and resets over a small
//!   id space so collisions are common
//! - Clock abuse: Time moves forward and also jumps backwards
//! - Restarts: The store is reopened from its own persisted document
//!
//! # Invariants
//!
//! - At most one unserved ticket per student
//! - `served_at` never precedes `joined_at`
//! - Positions are exactly the ranks in `unserved_entries()`
//! - `times_helped` never exceeds the number of served tickets
//! - A restart restores exactly the in-memory state
//! - NEVER panic

#![no_main]

use std::{collections::HashSet, num::NonZeroUsize};

use arbitrary::Arbitrary;
use chrono::TimeDelta;
use helpline_core::{ManualClock, MemoryStorage, QueuePolicy, QueueStore};
use libfuzzer_sys::fuzz_target;

const IDS: [&str; 8] = ["a1a1", "b2b2", "c3c3", "d4d4", "e5e5f", "f6f6g", "g7g7", "h8h8"];

#[derive(Debug, Clone, Arbitrary)]
enum QueueOp {
    Join { id: u8 },
    Serve { id: u8 },
    Advance { minutes: u16 },
    Rewind { minutes: u8 },
    SetOpen(bool),
    Restart,
    Reset,
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    cap: u8,
    ops: Vec<QueueOp>,
}

fn id(raw: u8) -> &'static str {
    IDS[usize::from(raw) % IDS.len()]
}

fuzz_target!(|input: FuzzInput| {
    let clock = ManualClock::at_epoch();
    let storage = MemoryStorage::new();
    let cap = NonZeroUsize::new(usize::from(input.cap % 6)).unwrap_or(NonZeroUsize::MIN);
    let policy = QueuePolicy::with_max_times_helped(cap);
    let mut store = QueueStore::new(clock.clone(), storage.clone(), policy);

    for op in input.ops {
        match op {
            QueueOp::Join { id: raw } => {
                let _ = store.join(id(raw), "Student", "");
            },
            QueueOp::Serve { id: raw } => {
                store.serve(id(raw));
                assert!(!store.has_open_ticket(id(raw)));
            },
            QueueOp::Advance { minutes } => clock.advance(TimeDelta::minutes(i64::from(minutes))),
            QueueOp::Rewind { minutes } => clock.advance(-TimeDelta::minutes(i64::from(minutes))),
            QueueOp::SetOpen(open) => {
                store.set_open(open);
                assert_eq!(store.is_open(), open);
            },
            QueueOp::Restart => {
                let before = store.snapshot();
                store = QueueStore::open(clock.clone(), storage.clone(), policy);
                assert_eq!(store.snapshot(), before);
            },
            QueueOp::Reset => {
                store.reset();
                assert!(store.unserved_entries().is_empty());
                assert!(store.is_open());
            },
        }

        let snapshot = store.snapshot();
        let mut waiting = HashSet::new();
        for ticket in &snapshot.tickets {
            if let Some(served_at) = ticket.served_at() {
                assert!(served_at >= ticket.joined_at);
            } else {
                assert!(waiting.insert(ticket.student_id.clone()), "duplicate waiting ticket");
            }
        }

        for (rank, ticket) in store.unserved_entries().iter().enumerate() {
            assert_eq!(store.position_of(&ticket.student_id), Some(rank));
        }

        for raw in 0..IDS.len() {
            let helped = store.times_helped(IDS[raw]);
            let served = snapshot
                .tickets
                .iter()
                .filter(|t| t.student_id == IDS[raw] && t.is_served())
                .count();
            assert!(helped <= served);
        }
    }
});
