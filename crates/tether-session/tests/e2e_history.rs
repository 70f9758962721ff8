#![forbid(unsafe_code)]

//! End-to-end tests for undo/redo through the session.
//!
//! # Invariants
//!
//! 1. **Round trip**: N distinct mutations undone N times restore the
//!    initial document.
//! 2. **Inverse**: an undo/redo pair leaves the document unchanged.
//! 3. **Bound**: history never exceeds the configured depth.
//! 4. **Pruning**: a new mutation after undo discards the redo branch.
//! 5. **Selection**: restore keeps the selection if its node survives and
//!    clears it otherwise; the scroll offset is kept.
//! 6. **Repair**: a malformed history is reset, reseeded and logged.
//! 7. **No divergence**: a snapshot the tree refuses to show leaves the
//!    cursor on the displayed document.
//!
//! # Failure Modes
//!
//! | Scenario | Expected Behavior |
//! |----------|-------------------|
//! | Undo at the oldest entry | Returns false, no change |
//! | Redo at the newest entry | Returns false, no change |
//! | Read-only map | Undo and redo refused |
//! | Tree rejects the snapshot | Step reverted, returns false, warning logged |

use tether_core::collab::{Layout, TreeView};
use serde_json::json;
use tether_core::document::{Document, TreeSnapshot};
use tether_core::event::{Event, KeyCode, KeyEvent, Modifiers};
use tether_core::geometry::Point;
use tether_harness::{
    FixedLayout, MemoryTree, RecordingHost, RecordingPersistence, SAMPLE_MAP, sample_layout,
    with_log_capture,
};
use tether_runtime::{History, HistoryConfig, SessionConfig};
use tether_session::Session;
use web_time::Instant;

type Harness = Session<MemoryTree, FixedLayout, RecordingPersistence, RecordingHost>;

fn open_with(config: SessionConfig) -> Harness {
    let mut session = Session::new(
        MemoryTree::new("root", ""),
        sample_layout(),
        RecordingPersistence::default(),
        RecordingHost::default(),
        config,
    )
    .expect("config is valid");
    session.init(SAMPLE_MAP).expect("sample map loads");
    session
}

fn open() -> Harness {
    open_with(SessionConfig::default())
}

fn ctrl(c: char, extra: Modifiers) -> Event {
    Event::Key(KeyEvent::new(KeyCode::Char(c)).with_modifiers(Modifiers::CTRL | extra))
}

/// Five distinct mutations of different kinds.
fn mutate(s: &mut Harness, now: Instant) {
    s.focus_node("r2", now);
    s.add_child(now).expect("child added");
    s.add_sibling(now).expect("sibling added");
    s.create_floating_at(Point::new(600.0, 700.0), now)
        .expect("floating created");
    s.focus_node("l2", now);
    assert!(s.remove_selected(now));
    assert!(s.reparent("r1b", "l1", now));
}

#[test]
fn undo_all_returns_to_initial_document() {
    let mut s = open();
    let now = Instant::now();
    let initial = s.document();
    mutate(&mut s, now);
    assert_eq!(s.history().len(), 6);

    for _ in 0..5 {
        assert!(s.undo(now));
    }
    assert!(!s.undo(now), "oldest entry reached");
    assert_eq!(s.document(), initial);
}

#[test]
fn undo_redo_pair_is_identity() {
    let mut s = open();
    let now = Instant::now();
    mutate(&mut s, now);
    s.undo(now);
    s.undo(now);
    let before: Document = s.document();
    assert!(s.undo(now));
    assert!(s.redo(now));
    assert_eq!(s.document(), before);
}

#[test]
fn redo_walks_forward_to_latest() {
    let mut s = open();
    let now = Instant::now();
    mutate(&mut s, now);
    let latest = s.document();
    while s.undo(now) {}
    while s.redo(now) {}
    assert_eq!(s.document(), latest);
    assert!(!s.redo(now));
}

#[test]
fn history_is_bounded() {
    let mut s = open_with(SessionConfig {
        history_depth: 5,
        ..SessionConfig::default()
    });
    let now = Instant::now();
    for _ in 0..8 {
        s.focus_root(now);
        s.add_child(now).expect("child added");
    }
    assert_eq!(s.history().len(), 5);
    let undone = std::iter::from_fn(|| s.undo(now).then_some(())).count();
    assert_eq!(undone, 4);
    assert_eq!(s.tree().children_of("root").len(), 4 + 4, "oldest states evicted");
}

#[test]
fn new_mutation_prunes_redo() {
    let mut s = open();
    let now = Instant::now();
    mutate(&mut s, now);
    s.undo(now);
    s.undo(now);
    s.focus_root(now);
    s.add_child(now).expect("child added");
    assert!(!s.history().can_redo());
    assert!(!s.redo(now));
    assert_eq!(s.history().len(), 5);
}

#[test]
fn keyboard_undo_and_redo() {
    let mut s = open();
    let now = Instant::now();
    s.dispatch(&Event::Key(KeyEvent::new(KeyCode::Tab)), now);
    assert_eq!(s.tree().len(), 8);

    assert!(s.dispatch(&ctrl('z', Modifiers::NONE), now));
    assert_eq!(s.tree().len(), 7);
    assert!(s.dispatch(&ctrl('Z', Modifiers::SHIFT), now));
    assert_eq!(s.tree().len(), 8);
    s.dispatch(&ctrl('z', Modifiers::NONE), now);
    assert!(s.dispatch(&ctrl('y', Modifiers::NONE), now));
    assert_eq!(s.tree().len(), 8);
}

#[test]
fn restore_keeps_surviving_selection_and_scroll() {
    let mut s = open();
    let now = Instant::now();
    s.focus_node("r2", now);
    s.add_child(now).expect("child added");
    s.focus_node("l1", now);
    s.layout_mut().set_scroll_offset(Point::new(40.0, 25.0));

    assert!(s.undo(now));
    assert_eq!(s.tree().selected().map(|n| n.id).as_deref(), Some("l1"));
    assert_eq!(s.layout().scroll_offset(), Point::new(40.0, 25.0));
}

#[test]
fn restore_clears_stale_selection() {
    let mut s = open();
    let now = Instant::now();
    let child = s.add_child(now).expect("child added");
    assert_eq!(s.tree().selected().map(|n| n.id), Some(child));
    assert!(s.undo(now));
    assert_eq!(s.tree().selected(), None);
}

#[test]
fn restore_rebuilds_floating_nodes() {
    let mut s = open();
    let now = Instant::now();
    let id = s
        .create_floating_at(Point::new(600.0, 700.0), now)
        .expect("floating created");
    assert_eq!(s.layout().floating_elements().len(), 2);
    s.undo(now);
    assert!(!s.registry().contains(&id));
    assert_eq!(s.layout().floating_elements().len(), 1);
    s.redo(now);
    assert!(s.registry().contains(&id));
    assert_eq!(s.layout().floating_elements().len(), 2);
}

#[test]
fn read_only_refuses_history_steps() {
    let mut s = open();
    let now = Instant::now();
    s.add_child(now).expect("child added");
    s.tree_mut().set_read_only(true);
    assert!(!s.undo(now));
    assert!(!s.dispatch(&ctrl('z', Modifiers::NONE), now));
    assert_eq!(s.tree().len(), 8);
}

#[test]
fn malformed_history_is_repaired_and_logged() {
    let mut s = open();
    let now = Instant::now();
    let broken = History::from_parts(vec![s.document()], Some(3), HistoryConfig::default());
    s.replace_history(broken);

    let (added, events) = with_log_capture(|| s.add_child(now));
    assert!(added.is_some());
    assert!(s.history().is_well_formed());
    assert_eq!(s.history().len(), 1, "reseeded from the current document");
    assert!(!s.history().can_undo());
    assert!(events.iter().any(|e| {
        e.level == tracing::Level::WARN
            && e.message.as_deref().is_some_and(|m| m.contains("reseeding"))
    }));
}

#[test]
fn rejected_snapshot_keeps_cursor_on_displayed_document() {
    let mut s = open();
    let now = Instant::now();
    let current = s.document();
    let duplicate_ids = Document {
        tree: TreeSnapshot::new(json!({
            "meta": {}, "format": "node_tree", "data": {
                "id": "root", "topic": "R", "children": [
                    {"id": "x", "topic": "a"}, {"id": "x", "topic": "b"}
                ]
            }
        })),
        floating: Vec::new(),
    };
    s.replace_history(History::from_parts(
        vec![duplicate_ids, current.clone()],
        Some(1),
        HistoryConfig::default(),
    ));

    let (stepped, events) = with_log_capture(|| s.undo(now));
    assert!(!stepped);
    assert_eq!(s.history().cursor(), Some(1));
    assert_eq!(s.document(), current);
    assert_eq!(s.history().current().map(|d| d.as_ref()), Some(&current));
    assert!(!s.autosave_pending());
    assert!(events.iter().any(|e| {
        e.level == tracing::Level::WARN
            && e.message.as_deref().is_some_and(|m| m.contains("reverted"))
    }));

    // The displayed entry survives the next mutation.
    s.add_child(now).expect("child added");
    assert_eq!(s.history().len(), 3);
    assert!(s.undo(now));
    assert_eq!(s.document(), current);
}

#[test]
fn persisted_payload_restores_equivalent_document() {
    let mut s = open();
    let now = Instant::now();
    mutate(&mut s, now);
    s.save(now).expect("save succeeds");
    let saved = s.persistence().payloads()[0].clone();

    let mut reopened = Session::new(
        MemoryTree::new("root", ""),
        sample_layout(),
        RecordingPersistence::default(),
        RecordingHost::default(),
        SessionConfig::default(),
    )
    .expect("default config is valid");
    reopened.init(&saved).expect("saved payload loads");
    assert_eq!(reopened.document(), s.document());
}
