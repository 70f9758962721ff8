#![forbid(unsafe_code)]

//! A small map with known geometry.
//!
//! ```text
//!                 l1 (card-1)          r1 ── r1a
//!   loose idea         root                  r1b
//!                 l2                   r2
//! ```
//!
//! Centers (screen space, zoom 1, no scroll):
//!
//! | id   | center     |
//! |------|------------|
//! | root | (500, 400) |
//! | r1   | (690, 315) |
//! | r2   | (690, 495) |
//! | r1a  | (840, 295) |
//! | r1b  | (840, 345) |
//! | l1   | (290, 335) |
//! | l2   | (290, 455) |
//!
//! The floating node `floating_1` sits at (100, 600) with the default
//! 80x40 floating size, so its center is (140, 620).

use tether_core::geometry::Rect;

use crate::layout::FixedLayout;

/// Persisted-shape payload for the sample map.
pub const SAMPLE_MAP: &str = r#"{
    "treeData": {
        "meta": {"name": "sample", "author": "tests", "version": "1"},
        "format": "node_tree",
        "data": {
            "id": "root",
            "topic": "Project",
            "children": [
                {"id": "r1", "topic": "Design", "direction": "right", "children": [
                    {"id": "r1a", "topic": "Sketches"},
                    {"id": "r1b", "topic": "Review<br>notes"}
                ]},
                {"id": "r2", "topic": "Build", "direction": "right"},
                {"id": "l1", "topic": "Research", "direction": "left", "linkId": "card-1"},
                {"id": "l2", "topic": "Budget", "direction": "left"}
            ]
        }
    },
    "renderedHTML": "",
    "arrows": [{"from": "r1", "to": "l2"}],
    "floatingNodes": [
        {"id": "floating_1", "label": "Loose idea", "x": 100.0, "y": 600.0}
    ]
}"#;

/// Layout matching [`SAMPLE_MAP`] in a 1000x800 viewport.
#[must_use]
pub fn sample_layout() -> FixedLayout {
    FixedLayout::new(Rect::new(0.0, 0.0, 1000.0, 800.0))
        .with_node("root", 450.0, 380.0, 100.0, 40.0)
        .with_node("r1", 650.0, 300.0, 80.0, 30.0)
        .with_node("r2", 650.0, 480.0, 80.0, 30.0)
        .with_node("r1a", 800.0, 280.0, 80.0, 30.0)
        .with_node("r1b", 800.0, 330.0, 80.0, 30.0)
        .with_node("l1", 250.0, 320.0, 80.0, 30.0)
        .with_node("l2", 250.0, 440.0, 80.0, 30.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::collab::Layout;
    use tether_core::document::ReloadPayload;
    use tether_core::geometry::Point;

    #[test]
    fn sample_map_parses_and_matches_layout() {
        let (document, arrows) = ReloadPayload::from_json(SAMPLE_MAP)
            .expect("sample map parses")
            .into_parts();
        assert_eq!(document.tree.node_count(), 7);
        assert_eq!(document.floating.len(), 1);
        assert_eq!(arrows.len(), 1);

        let layout = sample_layout();
        for node in document.tree.nodes() {
            assert!(layout.node_rect(node.id).is_some(), "{} has a rect", node.id);
        }
        assert_eq!(layout.screen_center("l2"), Some(Point::new(290.0, 455.0)));
    }
}
