#![forbid(unsafe_code)]

//! Directional keyboard navigation and smooth scrolling.
//!
//! Navigation works on two axes of the rendered tree:
//!
//! - **Up/Down** stay at the same depth and on the same side of the root,
//!   moving to the vertically adjacent node. No wraparound.
//! - **Left/Right** move inward or outward depending on the side. On the
//!   right side, Right goes to the nearest child and Left to the parent; on
//!   the left side it is mirrored. From the root, Left/Right pick the
//!   nearest child on that side.
//!
//! After a move, [`SmoothScroller`] brings the target to the viewport
//! center with an ease-out-cubic animation, unless it is already within a
//! few pixels of centered.

use std::time::Duration;

use tether_core::animation::ScrollAnimation;
use tether_core::collab::{Layout, TreeNode, TreeView};
use tether_core::geometry::Point;
use web_time::Instant;

use crate::query::{GeometryQuery, Side};

/// Arrow-key direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Resolve the node `direction` leads to from `selected`.
///
/// Returns `None` at the ends of a column, at leaves going outward, and when
/// geometry for the move is unavailable.
pub fn resolve<T, L>(
    query: &GeometryQuery<'_, T, L>,
    selected: &TreeNode,
    direction: Direction,
) -> Option<String>
where
    T: TreeView + ?Sized,
    L: Layout + ?Sized,
{
    match direction {
        Direction::Up | Direction::Down => {
            let depth = query.depth(selected);
            let column = query.nodes_at_depth(depth, query.side(selected));
            let index = column.iter().position(|p| p.id == selected.id)?;
            let target = match direction {
                Direction::Up => index.checked_sub(1)?,
                _ => index + 1,
            };
            column.get(target).map(|p| p.id.clone())
        }
        Direction::Left | Direction::Right => {
            let toward = if direction == Direction::Left {
                Side::Left
            } else {
                Side::Right
            };
            if selected.is_root() {
                return query.closest_child(selected, Some(toward));
            }
            // Unrendered nodes behave as if drawn on the right.
            let side = query.side(selected).unwrap_or(Side::Right);
            if side == toward {
                query.closest_child(selected, None)
            } else {
                selected.parent.clone()
            }
        }
    }
}

/// What a scroll request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollPlan {
    /// An animation was started.
    Started,
    /// Already within the skip distance of centered.
    Skipped,
    /// The node is not rendered.
    Unrendered,
}

/// Scroll offset that centers `id` in the viewport.
///
/// The node and viewport centers are compared in screen space; the
/// difference is converted to canvas units before it is applied to the
/// canvas-space scroll offset.
pub fn centering_offset<L: Layout + ?Sized>(layout: &L, id: &str) -> Option<Point> {
    let node = layout.node_rect(id)?.center();
    let viewport = layout.viewport().center();
    Some(layout.scroll_offset() + (node - viewport).unscale(layout.zoom()))
}

/// Drives eased scroll animations on the layout.
#[derive(Debug, Clone)]
pub struct SmoothScroller {
    duration: Duration,
    skip_px: f64,
    active: Option<ScrollAnimation>,
}

impl SmoothScroller {
    #[must_use]
    pub fn new(duration: Duration, skip_px: f64) -> Self {
        Self {
            duration,
            skip_px,
            active: None,
        }
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }

    /// Start scrolling `id` to the viewport center. Replaces any scroll in
    /// flight.
    pub fn scroll_to<L: Layout + ?Sized>(&mut self, layout: &L, id: &str, now: Instant) -> ScrollPlan {
        let Some(target) = centering_offset(layout, id) else {
            return ScrollPlan::Unrendered;
        };
        let from = layout.scroll_offset();
        // Skip distance is in screen pixels.
        let delta = (target - from).scale(layout.zoom());
        if delta.x.abs() < self.skip_px && delta.y.abs() < self.skip_px {
            self.active = None;
            return ScrollPlan::Skipped;
        }
        tracing::trace!(node_id = id, to_x = target.x, to_y = target.y, "smooth scroll started");
        self.active = Some(ScrollAnimation::new(from, target, now, self.duration));
        ScrollPlan::Started
    }

    /// Advance the animation. Returns `true` while still running.
    pub fn tick<L: Layout + ?Sized>(&mut self, layout: &mut L, now: Instant) -> bool {
        let Some(anim) = self.active else {
            return false;
        };
        layout.set_scroll_offset(anim.sample(now));
        if anim.is_complete(now) {
            self.active = None;
            return false;
        }
        true
    }
}
