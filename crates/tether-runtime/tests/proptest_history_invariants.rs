#![forbid(unsafe_code)]

//! Property tests for [`History`] invariants.
//!
//! Validates:
//! - Undoing every push returns to the first snapshot.
//! - Undo then redo is the identity.
//! - The depth bound is never exceeded and the cursor stays in range.
//! - Pushing the current state never grows the history.
//! - A push after undo leaves nothing to redo.

use proptest::prelude::*;

use tether_runtime::history::{History, HistoryConfig};

// ============================================================================
// Strategy helpers
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Push(u8),
    Undo,
    Redo,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u8>().prop_map(Op::Push),
        2 => Just(Op::Undo),
        2 => Just(Op::Redo),
    ]
}

fn ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 1..=max_len)
}

fn apply(history: &mut History<u8>, op: &Op) {
    match op {
        Op::Push(v) => {
            history.push(*v);
        }
        Op::Undo => {
            history.undo();
        }
        Op::Redo => {
            history.redo();
        }
    }
}

// ============================================================================
// Invariant 1: undo N times returns to the initial snapshot
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn undo_all_returns_to_initial(values in prop::collection::vec(any::<u32>(), 1..40)) {
        let mut history = History::new(HistoryConfig::unlimited());
        let mut recorded = Vec::new();
        for v in values {
            if history.push(v).recorded() {
                recorded.push(v);
            }
        }
        for expected in recorded.iter().rev().skip(1) {
            let restored = history.undo().unwrap();
            prop_assert_eq!(*restored, *expected);
        }
        prop_assert!(history.undo().is_none());
        prop_assert_eq!(history.cursor(), Some(0));
        prop_assert_eq!(**history.current().unwrap(), recorded[0]);
    }
}

// ============================================================================
// Invariant 2: undo followed by redo is the identity
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn undo_then_redo_is_identity(ops in ops_strategy(60)) {
        let mut history = History::new(HistoryConfig::new(20));
        for op in &ops {
            apply(&mut history, op);
        }
        if history.can_undo() {
            let before = history.current().cloned();
            let cursor = history.cursor();
            history.undo();
            let redone = history.redo();
            prop_assert_eq!(redone, before);
            prop_assert_eq!(history.cursor(), cursor);
        }
    }
}

// ============================================================================
// Invariant 3: bound and cursor range
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn bound_and_cursor_hold_after_every_op(
        depth in 1usize..12,
        ops in ops_strategy(120),
    ) {
        let mut history = History::new(HistoryConfig::new(depth));
        for op in &ops {
            apply(&mut history, op);
            prop_assert!(history.len() <= depth);
            prop_assert!(history.is_well_formed());
            match history.cursor() {
                None => prop_assert!(history.is_empty()),
                Some(c) => prop_assert!(c < history.len()),
            }
        }
    }
}

// ============================================================================
// Invariant 4: dedup and redo pruning
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn pushing_current_state_is_noop(ops in ops_strategy(60)) {
        let mut history = History::new(HistoryConfig::default());
        for op in &ops {
            apply(&mut history, op);
        }
        if let Some(current) = history.current().map(|c| **c) {
            let len = history.len();
            let cursor = history.cursor();
            prop_assert!(!history.push(current).recorded());
            prop_assert_eq!(history.len(), len);
            prop_assert_eq!(history.cursor(), cursor);
        }
    }

    #[test]
    fn push_after_undo_clears_redo(ops in ops_strategy(60), fresh in any::<u8>()) {
        let mut history = History::new(HistoryConfig::default());
        for op in &ops {
            apply(&mut history, op);
        }
        history.undo();
        if history.push(fresh).recorded() {
            prop_assert!(!history.can_redo());
            prop_assert_eq!(history.cursor(), Some(history.len() - 1));
        }
    }
}
