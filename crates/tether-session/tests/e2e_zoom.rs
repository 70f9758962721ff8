#![forbid(unsafe_code)]

//! End-to-end tests on a zoomed, scrolled canvas.
//!
//! The sample map is shown at zoom 2 with the scroll offset at canvas
//! (100, 50), so a canvas point `c` is drawn at `(c - (100, 50)) * 2`.
//!
//! # Invariants
//!
//! 1. **Centering**: navigation eases the target's screen center onto the
//!    viewport center, and the scroll offset stays in canvas units.
//! 2. **Pointer mapping**: nodes created at a pointer are centered under
//!    it; detached nodes keep their on-screen position.
//! 3. **Attach distance**: drag and drop attach the same way as at zoom 1
//!    when the pointer path is scaled.

use std::time::Duration;

use tether_core::collab::{ElementRef, Layout, TreeView};
use tether_core::event::{Event, KeyCode, KeyEvent, PointerEvent};
use tether_core::geometry::Point;
use tether_harness::{
    FixedLayout, MemoryTree, RecordingHost, RecordingPersistence, SAMPLE_MAP, sample_layout,
};
use tether_runtime::SessionConfig;
use tether_session::Session;
use web_time::Instant;

type Harness = Session<MemoryTree, FixedLayout, RecordingPersistence, RecordingHost>;

const ZOOM: f64 = 2.0;
const SCROLL: Point = Point::new(100.0, 50.0);
const VIEWPORT_CENTER: Point = Point::new(500.0, 400.0);

fn open_zoomed() -> Harness {
    let mut session = Session::new(
        MemoryTree::new("root", ""),
        sample_layout().with_zoom(ZOOM),
        RecordingPersistence::default(),
        RecordingHost::default(),
        SessionConfig::default(),
    )
    .expect("default config is valid");
    session.init(SAMPLE_MAP).expect("sample map loads");
    session.layout_mut().set_scroll_offset(SCROLL);
    session
}

fn pointer(event: PointerEvent) -> Event {
    Event::Pointer(event)
}

fn floating_screen_center(s: &Harness, id: &str) -> Option<Point> {
    let node = s.registry().get(id)?;
    s.layout().floating_rect(node.handle).map(|r| r.center())
}

#[test]
fn navigation_centers_target_on_screen() {
    let mut s = open_zoomed();
    let now = Instant::now();
    // r1 is 85 canvas px above root, r2 is 95 below.
    assert!(s.dispatch(&Event::Key(KeyEvent::new(KeyCode::Right)), now));
    assert_eq!(s.tree().selected().map(|n| n.id).as_deref(), Some("r1"));
    assert!(s.is_scrolling());

    s.tick(now + Duration::from_millis(400));
    assert!(!s.is_scrolling());
    assert_eq!(s.layout().screen_center("r1"), Some(VIEWPORT_CENTER));
    assert_eq!(s.layout().scroll_offset(), Point::new(440.0, 115.0));

    // Already centered: nothing to animate.
    assert!(s.focus_node("r1", now + Duration::from_millis(500)));
    assert!(!s.is_scrolling());
}

#[test]
fn focus_root_centers_root_on_screen() {
    let mut s = open_zoomed();
    let now = Instant::now();
    assert!(s.focus_root(now));
    s.tick(now + Duration::from_millis(400));
    assert_eq!(s.layout().screen_center("root"), Some(VIEWPORT_CENTER));
}

#[test]
fn double_click_creates_node_under_pointer() {
    let mut s = open_zoomed();
    let now = Instant::now();
    // Screen (600, 700) is canvas (400, 400).
    assert!(s.dispatch(&pointer(PointerEvent::double_click(600.0, 700.0)), now));
    let id = s.registry().selected().map(|n| n.id.clone()).expect("created");
    assert_eq!(
        s.registry().get(&id).map(|n| n.position),
        Some(Point::new(360.0, 380.0))
    );
    assert_eq!(floating_screen_center(&s, &id), Some(Point::new(600.0, 700.0)));
}

#[test]
fn detach_keeps_screen_position() {
    let mut s = open_zoomed();
    let now = Instant::now();
    let before = s.layout().node_rect("r1a").expect("rendered").origin();
    let id = s.detach("r1a", now).expect("leaf detaches");

    let node = s.registry().get(&id).expect("registered");
    assert_eq!(node.position, Point::new(800.0, 280.0));
    let after = s.layout().floating_rect(node.handle).expect("mounted").origin();
    assert_eq!(after, before);
}

#[test]
fn drop_attaches_on_zoomed_canvas() {
    let mut s = open_zoomed();
    let now = Instant::now();
    // floating_1 is drawn at screen (0, 1100); grab it 20px in.
    assert!(s.dispatch(&pointer(PointerEvent::down(20.0, 1120.0)), now));
    assert!(s.is_dragging());

    // Pointer at screen (320, 790) puts floating_1's center on l2's.
    for _ in 0..5 {
        assert!(s.dispatch(&pointer(PointerEvent::moved(320.0, 790.0)), now));
    }
    assert_eq!(
        s.registry().get("floating_1").map(|n| n.position),
        Some(Point::new(250.0, 435.0))
    );
    assert_eq!(
        floating_screen_center(&s, "floating_1"),
        s.layout().screen_center("l2")
    );
    assert!(
        s.layout()
            .is_highlighted(&ElementRef::TreeNode("l2".to_string()))
    );

    assert!(s.dispatch(&pointer(PointerEvent::up(320.0, 790.0)), now));
    assert!(s.registry().is_empty());
    let child = s.tree().selected().expect("attached node selected");
    assert_eq!(child.parent.as_deref(), Some("l2"));
    assert_eq!(child.topic, "Loose idea");
    assert_eq!(s.layout().highlight_count(), 0);
}
