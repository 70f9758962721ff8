#![forbid(unsafe_code)]

//! Floating-node drag and attachment.
//!
//! While a floating node is dragged, every Nth pointer-move sample probes
//! for the nearest rendered tree node (center to center, screen space). A
//! candidate within the threshold is highlighted together with the dragged
//! node; the highlight moves when a different candidate becomes nearest and
//! clears when none is in range. On release the session probes once more
//! and, if a candidate is in range, turns the floating node into a child of
//! it.
//!
//! Drag positions follow the pointer in canvas space:
//! `position = pointer / zoom - grab_offset`, with the grab offset fixed at
//! drag start.

use tether_core::collab::{ElementHandle, ElementRef, Layout, TreeView};
use tether_core::geometry::Point;

use crate::query::GeometryQuery;

/// An in-progress drag.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub floating_id: String,
    pub handle: ElementHandle,
    grab_offset: Point,
    samples: u32,
    candidate: Option<String>,
}

impl DragSession {
    /// Currently highlighted tree node.
    #[must_use]
    pub fn candidate(&self) -> Option<&str> {
        self.candidate.as_deref()
    }

    /// Pointer-move samples seen so far.
    #[must_use]
    pub fn samples(&self) -> u32 {
        self.samples
    }
}

/// Result of one pointer-move sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DragStep {
    pub floating_id: String,
    /// New canvas-space position of the dragged node.
    pub position: Point,
    /// Whether this sample should probe for attach candidates.
    pub probe: bool,
}

/// Tracks one floating-node drag at a time.
#[derive(Debug, Clone)]
pub struct AttachmentResolver {
    threshold: f64,
    probe_interval: u32,
    drag: Option<DragSession>,
}

impl AttachmentResolver {
    #[must_use]
    pub fn new(threshold: f64, probe_interval: u32) -> Self {
        Self {
            threshold,
            probe_interval: probe_interval.max(1),
            drag: None,
        }
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    #[must_use]
    pub fn drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Start dragging the floating node currently at `position`.
    pub fn begin(
        &mut self,
        floating_id: &str,
        handle: ElementHandle,
        pointer: Point,
        zoom: f64,
        position: Point,
    ) {
        tracing::debug!(floating_id, "drag started");
        self.drag = Some(DragSession {
            floating_id: floating_id.to_string(),
            handle,
            grab_offset: pointer.unscale(zoom) - position,
            samples: 0,
            candidate: None,
        });
    }

    /// Feed a pointer-move sample.
    pub fn drag_to(&mut self, pointer: Point, zoom: f64) -> Option<DragStep> {
        let drag = self.drag.as_mut()?;
        drag.samples += 1;
        Some(DragStep {
            floating_id: drag.floating_id.clone(),
            position: pointer.unscale(zoom) - drag.grab_offset,
            probe: drag.samples % self.probe_interval == 0,
        })
    }

    /// Nearest tree node within the threshold of the dragged node's center.
    #[must_use]
    pub fn probe<T, L>(&self, tree: &T, layout: &L) -> Option<String>
    where
        T: TreeView + ?Sized,
        L: Layout + ?Sized,
    {
        let drag = self.drag.as_ref()?;
        let center = layout.floating_rect(drag.handle)?.center();
        GeometryQuery::new(tree, layout)
            .nearest_within(center, self.threshold)
            .map(|(id, _)| id)
    }

    /// Move the highlight to `candidate`.
    pub fn set_candidate<L: Layout + ?Sized>(&mut self, layout: &mut L, candidate: Option<String>) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        if drag.candidate == candidate {
            return;
        }
        if let Some(previous) = drag.candidate.take() {
            layout.set_highlight(&ElementRef::TreeNode(previous), false);
        }
        if let Some(next) = &candidate {
            layout.set_highlight(&ElementRef::TreeNode(next.clone()), true);
        }
        layout.set_highlight(&ElementRef::Floating(drag.handle), candidate.is_some());
        drag.candidate = candidate;
    }

    /// End the drag, clearing every highlight it set.
    pub fn finish<L: Layout + ?Sized>(&mut self, layout: &mut L) -> Option<DragSession> {
        self.set_candidate(layout, None);
        let drag = self.drag.take()?;
        tracing::debug!(floating_id = %drag.floating_id, samples = drag.samples, "drag finished");
        Some(drag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_harness::{FixedLayout, MemoryTree};

    fn fixture() -> (MemoryTree, FixedLayout, ElementHandle) {
        let tree = MemoryTree::new("root", "Root").with_child("root", "a", "A");
        let mut layout = FixedLayout::default()
            .with_node("root", 100.0, 100.0, 100.0, 40.0)
            .with_node("a", 400.0, 100.0, 100.0, 40.0);
        let handle = layout.mount_floating("floating_1", "f", Point::new(600.0, 600.0));
        (tree, layout, handle)
    }

    #[test]
    fn drag_follows_pointer_with_grab_offset() {
        let (_, _, handle) = fixture();
        let mut r = AttachmentResolver::new(80.0, 5);
        r.begin("floating_1", handle, Point::new(610.0, 620.0), 1.0, Point::new(600.0, 600.0));
        let step = r.drag_to(Point::new(710.0, 640.0), 1.0).unwrap();
        assert_eq!(step.position, Point::new(700.0, 620.0));
        assert!(!step.probe);
    }

    #[test]
    fn drag_respects_zoom() {
        let mut r = AttachmentResolver::new(80.0, 5);
        r.begin("floating_1", ElementHandle(1), Point::new(200.0, 200.0), 2.0, Point::new(90.0, 90.0));
        let step = r.drag_to(Point::new(220.0, 200.0), 2.0).unwrap();
        assert_eq!(step.position, Point::new(100.0, 90.0));
    }

    #[test]
    fn probes_every_fifth_sample() {
        let mut r = AttachmentResolver::new(80.0, 5);
        r.begin("floating_1", ElementHandle(1), Point::ORIGIN, 1.0, Point::ORIGIN);
        let probes: Vec<bool> = (0..10)
            .map(|_| r.drag_to(Point::ORIGIN, 1.0).unwrap().probe)
            .collect();
        assert_eq!(
            probes,
            vec![false, false, false, false, true, false, false, false, false, true]
        );
        assert_eq!(r.drag().unwrap().samples(), 10);
    }

    #[test]
    fn no_drag_no_step() {
        let mut r = AttachmentResolver::new(80.0, 5);
        assert!(r.drag_to(Point::ORIGIN, 1.0).is_none());
        let mut layout = FixedLayout::default();
        assert!(r.finish(&mut layout).is_none());
    }

    #[test]
    fn highlight_tracks_candidate() {
        let (tree, mut layout, handle) = fixture();
        let mut r = AttachmentResolver::new(80.0, 5);
        r.begin("floating_1", handle, Point::ORIGIN, 1.0, Point::new(600.0, 600.0));

        // floating center (640, 620): nothing within 80px
        assert_eq!(r.probe(&tree, &layout), None);

        // floating center (450, 140) -> "a" center (450, 120) at 20px
        layout.place_floating(handle, Point::new(410.0, 120.0));
        let candidate = r.probe(&tree, &layout);
        assert_eq!(candidate.as_deref(), Some("a"));
        r.set_candidate(&mut layout, candidate);
        assert!(layout.is_highlighted(&ElementRef::TreeNode("a".into())));
        assert!(layout.is_highlighted(&ElementRef::Floating(handle)));

        // move near root: highlight moves
        layout.place_floating(handle, Point::new(110.0, 110.0));
        let candidate = r.probe(&tree, &layout);
        assert_eq!(candidate.as_deref(), Some("root"));
        r.set_candidate(&mut layout, candidate);
        assert!(!layout.is_highlighted(&ElementRef::TreeNode("a".into())));
        assert!(layout.is_highlighted(&ElementRef::TreeNode("root".into())));

        let done = r.finish(&mut layout).unwrap();
        assert_eq!(done.floating_id, "floating_1");
        assert_eq!(layout.highlight_count(), 0);
        assert!(!r.is_dragging());
    }
}
