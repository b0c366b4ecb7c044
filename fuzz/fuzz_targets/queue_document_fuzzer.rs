//! Fuzz target for persisted queue documents
//!
//! The document on disk can be truncated, hand-edited or garbage. Loading it
//! must never take the server down.
//!
//! # Strategy
//!
//! - Raw bytes: Arbitrary input fed to the decoder and to `QueueStore::open`
//! - Valid prefix: Input is also appended to a real document so the decoder
//!   gets past the first byte
//! - Follow-up operations: A restored store is joined, served and queried
//!
//! # Invariants
//!
//! - NEVER panic on any input
//! - A document that decodes re-encodes to an equal state
//! - A document that fails to decode restores an empty, open queue
//! - Queries on a restored store agree with its snapshot

#![no_main]

use helpline_core::{ManualClock, MemoryStorage, QueuePolicy, QueueState, QueueStore};
use libfuzzer_sys::fuzz_target;

const SEED_DOCUMENT: &str = r#"{"tickets":[{"student_id":"a1b2","name":"Ada","task_info":"","joined_at":"1970-01-01T00:00:00Z","served":false,"served_at":null}],"is_open":"#;

fuzz_target!(|data: &[u8]| {
    check_document(data);

    let mut prefixed = SEED_DOCUMENT.as_bytes().to_vec();
    prefixed.extend_from_slice(data);
    check_document(&prefixed);
});

fn check_document(document: &[u8]) {
    let decoded = QueueState::decode(document).ok();

    if let Some(state) = &decoded {
        let encoded = state.encode().expect("decoded state must encode");
        let again = QueueState::decode(&encoded).expect("encoded state must decode");
        assert_eq!(&again, state);
    }

    let store = QueueStore::open(
        ManualClock::at_epoch(),
        MemoryStorage::with_document(document),
        QueuePolicy::default(),
    );

    match &decoded {
        Some(state) => assert_eq!(&store.snapshot(), state),
        None => {
            let snapshot = store.snapshot();
            assert!(snapshot.tickets.is_empty());
            assert!(snapshot.is_open);
        },
    }

    let waiting = store.unserved_entries();
    for ticket in &waiting {
        assert!(store.has_open_ticket(&ticket.student_id));
        assert!(store.position_of(&ticket.student_id).is_some());
    }
    let _ = store.estimated_wait();

    for ticket in &waiting {
        let _ = store.join(&ticket.student_id, &ticket.name, "again");
        store.serve(&ticket.student_id);
        assert!(!store.has_open_ticket(&ticket.student_id));
    }
    assert!(store.unserved_entries().is_empty());
}
