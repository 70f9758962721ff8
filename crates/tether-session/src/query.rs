#![forbid(unsafe_code)]

//! Geometry queries over the rendered tree.
//!
//! Everything here reads live layout: centers come from
//! [`Layout::node_rect`] in screen space, structure comes from the tree.
//! Nodes that are not rendered are skipped rather than treated as errors.

use tether_core::collab::{Layout, TreeNode, TreeView};
use tether_core::geometry::Point;

/// Which side of the root a node is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    /// The root itself.
    Center,
}

/// A rendered node and its screen-space center.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedNode {
    pub id: String,
    pub center: Point,
}

/// Read-only view combining tree structure with rendered geometry.
pub struct GeometryQuery<'a, T: ?Sized, L: ?Sized> {
    tree: &'a T,
    layout: &'a L,
}

impl<'a, T: TreeView + ?Sized, L: Layout + ?Sized> GeometryQuery<'a, T, L> {
    pub fn new(tree: &'a T, layout: &'a L) -> Self {
        Self { tree, layout }
    }

    /// Screen-space center of a rendered tree node.
    #[must_use]
    pub fn center(&self, id: &str) -> Option<Point> {
        self.layout.node_rect(id).map(|r| r.center())
    }

    /// Distance from the root along parent links.
    #[must_use]
    pub fn depth(&self, node: &TreeNode) -> usize {
        let mut depth = 0;
        let mut parent = node.parent.clone();
        while let Some(id) = parent {
            depth += 1;
            parent = self.tree.node(&id).and_then(|n| n.parent);
        }
        depth
    }

    /// Side of the root the node is drawn on; `None` if either is unrendered.
    ///
    /// A node level with the root counts as Right, here and in the side
    /// filters below.
    #[must_use]
    pub fn side(&self, node: &TreeNode) -> Option<Side> {
        if node.is_root() {
            return Some(Side::Center);
        }
        let root = self.tree.root()?;
        let root_x = self.center(&root.id)?.x;
        let node_x = self.center(&node.id)?.x;
        Some(if node_x < root_x { Side::Left } else { Side::Right })
    }

    /// Rendered nodes at `depth`, optionally restricted to one side, ordered
    /// top to bottom.
    #[must_use]
    pub fn nodes_at_depth(&self, depth: usize, side: Option<Side>) -> Vec<PlacedNode> {
        let Some(root) = self.tree.root() else {
            return Vec::new();
        };
        let mut level = vec![root.clone()];
        for _ in 0..depth {
            level = level
                .iter()
                .flat_map(|n| n.children.iter())
                .filter_map(|id| self.tree.node(id))
                .collect();
        }

        let root_x = self.center(&root.id).map(|c| c.x);
        let mut placed: Vec<PlacedNode> = level
            .into_iter()
            .filter_map(|n| {
                let center = self.center(&n.id)?;
                Some(PlacedNode { id: n.id, center })
            })
            .filter(|p| match (side, root_x) {
                (Some(Side::Left), Some(rx)) => p.center.x < rx,
                (Some(Side::Right), Some(rx)) => p.center.x >= rx,
                (Some(Side::Center), Some(_)) => p.id == root.id,
                _ => true,
            })
            .collect();
        placed.sort_by(|a, b| a.center.y.total_cmp(&b.center.y));
        placed
    }

    /// Rendered child nearest to `parent` by vertical distance between
    /// centers, optionally restricted to one side of the root.
    ///
    /// Ties go to the earlier child in display order.
    #[must_use]
    pub fn closest_child(&self, parent: &TreeNode, side: Option<Side>) -> Option<String> {
        let parent_center = self.center(&parent.id)?;
        let root_x = match side {
            Some(Side::Left | Side::Right) => Some(self.center(&self.tree.root()?.id)?.x),
            _ => None,
        };
        let mut best: Option<(f64, &String)> = None;
        for child_id in &parent.children {
            if self.tree.node(child_id).is_none() {
                continue;
            }
            let Some(center) = self.center(child_id) else {
                continue;
            };
            let on_side = match (side, root_x) {
                (Some(Side::Left), Some(rx)) => center.x < rx,
                (Some(Side::Right), Some(rx)) => center.x >= rx,
                _ => true,
            };
            if !on_side {
                continue;
            }
            let dist = (center.y - parent_center.y).abs();
            if best.is_none_or(|(d, _)| dist < d) {
                best = Some((dist, child_id));
            }
        }
        best.map(|(_, id)| id.clone())
    }

    /// Tree node whose center is nearest to `point`, if within `threshold`.
    #[must_use]
    pub fn nearest_within(&self, point: Point, threshold: f64) -> Option<(String, f64)> {
        let root = self.tree.root()?;
        let mut stack = vec![root];
        let mut best: Option<(String, f64)> = None;
        while let Some(node) = stack.pop() {
            if let Some(center) = self.center(&node.id) {
                let dist = center.distance_to(point);
                if dist < threshold && best.as_ref().is_none_or(|(_, d)| dist < *d) {
                    best = Some((node.id.clone(), dist));
                }
            }
            stack.extend(node.children.iter().rev().filter_map(|id| self.tree.node(id)));
        }
        best
    }
}
