#![forbid(unsafe_code)]

//! Floating node registry.
//!
//! Floating nodes live outside the tree. The registry owns their ids,
//! labels, and canvas positions, and keeps each one mounted in the layout
//! through an [`ElementHandle`]. Ids are minted as `floating_<n>` and never
//! collide with an id already present.

use tether_core::collab::{ElementHandle, Layout};
use tether_core::document::FloatingNodeSnapshot;
use tether_core::geometry::Point;

/// Prefix of every floating node id.
pub const FLOATING_ID_PREFIX: &str = "floating_";

/// A floating node and its mounted element.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatingNode {
    pub id: String,
    /// Plain-text label.
    pub label: String,
    /// Canvas-space top-left corner.
    pub position: Point,
    pub handle: ElementHandle,
}

impl FloatingNode {
    #[must_use]
    pub fn snapshot(&self) -> FloatingNodeSnapshot {
        FloatingNodeSnapshot {
            id: self.id.clone(),
            label: self.label.clone(),
            x: self.position.x,
            y: self.position.y,
        }
    }
}

/// Ordered set of floating nodes plus the floating selection.
#[derive(Debug, Clone, Default)]
pub struct FloatingRegistry {
    nodes: Vec<FloatingNode>,
    selected: Option<String>,
    serial: u64,
}

impl FloatingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh id not used by any registered node.
    pub fn mint_id(&mut self) -> String {
        loop {
            self.serial += 1;
            let id = format!("{FLOATING_ID_PREFIX}{}", self.serial);
            if !self.contains(&id) {
                return id;
            }
        }
    }

    /// Create and mount a new floating node. Returns its id.
    pub fn create<L: Layout + ?Sized>(&mut self, layout: &mut L, label: &str, position: Point) -> String {
        let id = self.mint_id();
        let handle = layout.mount_floating(&id, label, position);
        tracing::debug!(floating_id = %id, x = position.x, y = position.y, "floating node created");
        self.nodes.push(FloatingNode {
            id: id.clone(),
            label: label.to_string(),
            position,
            handle,
        });
        id
    }

    /// Replace every node with `snapshots`, keeping their ids.
    ///
    /// The selection survives when its id is still present.
    pub fn restore<L: Layout + ?Sized>(&mut self, layout: &mut L, snapshots: &[FloatingNodeSnapshot]) {
        let selected = self.selected.take();
        self.unmount_all(layout);
        for snap in snapshots {
            if self.contains(&snap.id) {
                tracing::warn!(floating_id = %snap.id, "duplicate floating id skipped");
                continue;
            }
            let handle = layout.mount_floating(&snap.id, &snap.label, snap.position());
            self.nodes.push(FloatingNode {
                id: snap.id.clone(),
                label: snap.label.clone(),
                position: snap.position(),
                handle,
            });
        }
        self.selected = selected.filter(|id| self.contains(id));
    }

    /// Unmount and forget a node.
    pub fn remove<L: Layout + ?Sized>(&mut self, layout: &mut L, id: &str) -> Option<FloatingNode> {
        let index = self.nodes.iter().position(|n| n.id == id)?;
        let node = self.nodes.remove(index);
        layout.unmount_floating(node.handle);
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        tracing::debug!(floating_id = %id, "floating node removed");
        Some(node)
    }

    pub fn move_to<L: Layout + ?Sized>(&mut self, layout: &mut L, id: &str, position: Point) -> bool {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        node.position = position;
        layout.place_floating(node.handle, position);
        true
    }

    pub fn set_label<L: Layout + ?Sized>(&mut self, layout: &mut L, id: &str, label: &str) -> bool {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        node.label = label.to_string();
        layout.set_floating_label(node.handle, label);
        true
    }

    /// Unmount everything and clear the selection.
    pub fn clear<L: Layout + ?Sized>(&mut self, layout: &mut L) {
        self.unmount_all(layout);
        self.selected = None;
    }

    fn unmount_all<L: Layout + ?Sized>(&mut self, layout: &mut L) {
        for node in self.nodes.drain(..) {
            layout.unmount_floating(node.handle);
        }
    }

    // ====================================================================
    // Queries
    // ====================================================================

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&FloatingNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    #[must_use]
    pub fn by_handle(&self, handle: ElementHandle) -> Option<&FloatingNode> {
        self.nodes.iter().find(|n| n.handle == handle)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FloatingNode> {
        self.nodes.iter()
    }

    /// Serializable form, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<FloatingNodeSnapshot> {
        self.nodes.iter().map(FloatingNode::snapshot).collect()
    }

    // ====================================================================
    // Selection
    // ====================================================================

    pub fn select(&mut self, id: &str) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.selected = Some(id.to_string());
        true
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    #[must_use]
    pub fn selected(&self) -> Option<&FloatingNode> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_harness::FixedLayout;

    #[test]
    fn ids_are_prefixed_and_unique() {
        let mut layout = FixedLayout::default();
        let mut reg = FloatingRegistry::new();
        reg.restore(
            &mut layout,
            &[FloatingNodeSnapshot {
                id: "floating_1".into(),
                label: "kept".into(),
                x: 0.0,
                y: 0.0,
            }],
        );
        let id = reg.create(&mut layout, "", Point::new(5.0, 5.0));
        assert_eq!(id, "floating_2");
        assert_eq!(reg.len(), 2);
        assert_eq!(layout.floating_elements().len(), 2);
    }

    #[test]
    fn remove_unmounts_and_clears_selection() {
        let mut layout = FixedLayout::default();
        let mut reg = FloatingRegistry::new();
        let id = reg.create(&mut layout, "x", Point::ORIGIN);
        assert!(reg.select(&id));
        let removed = reg.remove(&mut layout, &id).unwrap();
        assert_eq!(removed.label, "x");
        assert!(reg.selected().is_none());
        assert!(layout.floating_elements().is_empty());
        assert!(reg.remove(&mut layout, &id).is_none());
    }

    #[test]
    fn move_and_relabel_reach_layout() {
        let mut layout = FixedLayout::default();
        let mut reg = FloatingRegistry::new();
        let id = reg.create(&mut layout, "a", Point::ORIGIN);
        assert!(reg.move_to(&mut layout, &id, Point::new(30.0, 40.0)));
        assert!(reg.set_label(&mut layout, &id, "b"));
        let (_, el) = layout.floating_by_id(&id).unwrap();
        assert_eq!(el.position, Point::new(30.0, 40.0));
        assert_eq!(el.label, "b");
        assert_eq!(reg.snapshot()[0].x, 30.0);
        assert!(!reg.move_to(&mut layout, "floating_99", Point::ORIGIN));
    }

    #[test]
    fn restore_replaces_and_keeps_selection_when_present() {
        let mut layout = FixedLayout::default();
        let mut reg = FloatingRegistry::new();
        let a = reg.create(&mut layout, "a", Point::ORIGIN);
        let b = reg.create(&mut layout, "b", Point::ORIGIN);
        reg.select(&a);
        let snaps = vec![reg.get(&a).unwrap().snapshot()];
        reg.restore(&mut layout, &snaps);
        assert_eq!(reg.len(), 1);
        assert!(!reg.contains(&b));
        assert_eq!(reg.selected().map(|n| n.id.as_str()), Some(a.as_str()));
        assert_eq!(layout.floating_elements().len(), 1);

        reg.restore(&mut layout, &[]);
        assert!(reg.selected().is_none());
    }

    #[test]
    fn handle_lookup() {
        let mut layout = FixedLayout::default();
        let mut reg = FloatingRegistry::new();
        let id = reg.create(&mut layout, "a", Point::ORIGIN);
        let handle = reg.get(&id).unwrap().handle;
        assert_eq!(reg.by_handle(handle).unwrap().id, id);
    }
}
