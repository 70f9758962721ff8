#![forbid(unsafe_code)]

//! Document model and the payloads exchanged with the host.
//!
//! A [`Document`] is the unit of undo and persistence: the tree as exported
//! by the tree collaborator plus the ordered floating nodes. Tree snapshots
//! are kept as opaque `node_tree` JSON so that fields the session does not
//! interpret (layout direction, styling, custom data) survive a round trip.
//!
//! # Shapes
//!
//! ```text
//! node_tree:   { "meta": {..}, "format": "node_tree",
//!                "data": { "id", "topic", "linkId"?, "children": [..] } }
//! persisted:   { "treeData", "renderedHTML", "arrows", "floatingNodes",
//!                "changedNodes" }
//! initial:     { "nodeData": { "topic": .. } }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::geometry::Point;

/// Id given to the root when building a tree from the initial shape.
pub const INITIAL_ROOT_ID: &str = "root";

/// Field on a tree node that carries an external link reference.
pub const LINK_FIELD: &str = "linkId";

// ============================================================================
// Tree snapshot
// ============================================================================

/// Exported tree in `node_tree` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeSnapshot(Value);

/// A node visited while walking a [`TreeSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotNode<'a> {
    pub id: &'a str,
    pub topic: &'a str,
    pub link_id: Option<&'a str>,
    pub depth: usize,
}

impl TreeSnapshot {
    /// Wrap an exported `node_tree` value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// A tree with a single root node.
    #[must_use]
    pub fn single_root(id: &str, topic: &str) -> Self {
        Self(json!({
            "meta": { "name": "tether", "author": "tether", "version": "1" },
            "format": "node_tree",
            "data": { "id": id, "topic": topic },
        }))
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// The root node object, if the snapshot has one.
    ///
    /// Accepts both the wrapped form (`{"data": {...}}`) and a bare node.
    #[must_use]
    pub fn root(&self) -> Option<&Map<String, Value>> {
        let node = match self.0.get("data") {
            Some(data) => data,
            None => &self.0,
        };
        node.as_object().filter(|obj| obj.get("id").is_some_and(Value::is_string))
    }

    /// All nodes in depth-first pre-order.
    #[must_use]
    pub fn nodes(&self) -> Vec<SnapshotNode<'_>> {
        let mut out = Vec::new();
        if let Some(root) = self.root() {
            collect(root, 0, &mut out);
        }
        out
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes().len()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes().iter().any(|n| n.id == id)
    }
}

fn collect<'a>(node: &'a Map<String, Value>, depth: usize, out: &mut Vec<SnapshotNode<'a>>) {
    let Some(id) = node.get("id").and_then(Value::as_str) else {
        return;
    };
    out.push(SnapshotNode {
        id,
        topic: node.get("topic").and_then(Value::as_str).unwrap_or_default(),
        link_id: node
            .get(LINK_FIELD)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty()),
        depth,
    });
    if let Some(children) = node.get("children").and_then(Value::as_array) {
        for child in children.iter().filter_map(Value::as_object) {
            collect(child, depth + 1, out);
        }
    }
}

// ============================================================================
// Floating nodes and documents
// ============================================================================

/// A free-floating node as persisted: id, plain-text label, canvas position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatingNodeSnapshot {
    pub id: String,
    #[serde(alias = "topic", default)]
    pub label: String,
    pub x: f64,
    pub y: f64,
}

impl FloatingNodeSnapshot {
    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Tree plus floating nodes; the unit stored in history.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub tree: TreeSnapshot,
    pub floating: Vec<FloatingNodeSnapshot>,
}

// ============================================================================
// Outbound payload
// ============================================================================

/// A tree node whose label changed since the last flush and which carries a
/// link reference the host must keep in sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedNode {
    pub id: String,
    pub label: String,
    pub external_link_id: String,
}

/// The payload handed to the persistence collaborator on every flush.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistPayload {
    pub tree_data: TreeSnapshot,
    #[serde(rename = "renderedHTML", default)]
    pub rendered_html: String,
    #[serde(default)]
    pub arrows: Vec<Value>,
    #[serde(default)]
    pub floating_nodes: Vec<FloatingNodeSnapshot>,
    #[serde(default)]
    pub changed_nodes: Vec<ChangedNode>,
}

impl PersistPayload {
    /// The document carried by this payload.
    #[must_use]
    pub fn document(&self) -> Document {
        Document {
            tree: self.tree_data.clone(),
            floating: self.floating_nodes.clone(),
        }
    }
}

// ============================================================================
// Inbound payload
// ============================================================================

/// Error decoding an inbound document payload.
#[derive(Debug)]
pub enum PayloadError {
    /// The text is not valid JSON or a field has the wrong type.
    Json(serde_json::Error),
    /// Valid JSON that matches none of the accepted shapes.
    UnrecognizedShape,
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "invalid payload JSON: {e}"),
            Self::UnrecognizedShape => write!(f, "payload matches no known document shape"),
        }
    }
}

impl std::error::Error for PayloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::UnrecognizedShape => None,
        }
    }
}

impl From<serde_json::Error> for PayloadError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// A document handed to the session by the host on load or refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum ReloadPayload {
    /// A payload previously produced by a flush.
    Persisted(PersistPayload),
    /// A node_tree document with embedded `floatingNodes` / `arrows`.
    Stored {
        tree: TreeSnapshot,
        floating: Vec<FloatingNodeSnapshot>,
        arrows: Vec<Value>,
    },
    /// First load: only the root label is known.
    Initial { root_topic: String },
}

impl ReloadPayload {
    /// Decode any of the accepted shapes.
    pub fn from_json(text: &str) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Decode any of the accepted shapes from a parsed value.
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        let Value::Object(mut obj) = value else {
            return Err(PayloadError::UnrecognizedShape);
        };

        if obj.contains_key("treeData") {
            let payload: PersistPayload = serde_json::from_value(Value::Object(obj))?;
            if payload.tree_data.root().is_none() {
                return Err(PayloadError::UnrecognizedShape);
            }
            return Ok(Self::Persisted(payload));
        }

        if let Some(node_data) = obj.get("nodeData") {
            let root_topic = node_data
                .get("topic")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Ok(Self::Initial { root_topic });
        }

        let floating = match obj.remove("floatingNodes") {
            Some(v) => serde_json::from_value(v)?,
            None => Vec::new(),
        };
        let arrows = match obj.remove("arrows") {
            Some(v) => serde_json::from_value(v)?,
            None => Vec::new(),
        };
        let tree = TreeSnapshot::new(Value::Object(obj));
        if tree.root().is_none() {
            return Err(PayloadError::UnrecognizedShape);
        }
        Ok(Self::Stored {
            tree,
            floating,
            arrows,
        })
    }

    /// Split into the document to show and the opaque arrow list.
    #[must_use]
    pub fn into_parts(self) -> (Document, Vec<Value>) {
        match self {
            Self::Persisted(p) => (
                Document {
                    tree: p.tree_data,
                    floating: p.floating_nodes,
                },
                p.arrows,
            ),
            Self::Stored {
                tree,
                floating,
                arrows,
            } => (Document { tree, floating }, arrows),
            Self::Initial { root_topic } => (
                Document {
                    tree: TreeSnapshot::single_root(INITIAL_ROOT_ID, &root_topic),
                    floating: Vec::new(),
                },
                Vec::new(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> TreeSnapshot {
        TreeSnapshot::new(json!({
            "meta": {"name": "m"},
            "format": "node_tree",
            "data": {
                "id": "root", "topic": "Root",
                "children": [
                    {"id": "a", "topic": "A", "linkId": "card-1",
                     "children": [{"id": "a1", "topic": "A1"}]},
                    {"id": "b", "topic": "B", "linkId": ""}
                ]
            }
        }))
    }

    #[test]
    fn walk_is_preorder_with_depth() {
        let tree = sample_tree();
        let ids: Vec<_> = tree.nodes().iter().map(|n| (n.id, n.depth)).collect();
        assert_eq!(ids, vec![("root", 0), ("a", 1), ("a1", 2), ("b", 1)]);
        assert_eq!(tree.node_count(), 4);
        assert!(tree.contains("a1"));
        assert!(!tree.contains("zz"));
    }

    #[test]
    fn empty_link_ids_are_ignored() {
        let tree = sample_tree();
        let linked: Vec<_> = tree.nodes().into_iter().filter_map(|n| n.link_id).collect();
        assert_eq!(linked, vec!["card-1"]);
    }

    #[test]
    fn payload_serializes_with_host_field_names() {
        let payload = PersistPayload {
            tree_data: TreeSnapshot::single_root("root", "R"),
            rendered_html: "<div/>".into(),
            arrows: vec![],
            floating_nodes: vec![FloatingNodeSnapshot {
                id: "floating_1".into(),
                label: "note".into(),
                x: 10.0,
                y: 20.0,
            }],
            changed_nodes: vec![ChangedNode {
                id: "a".into(),
                label: "A".into(),
                external_link_id: "card-1".into(),
            }],
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert!(v.get("treeData").is_some());
        assert_eq!(v["renderedHTML"], "<div/>");
        assert_eq!(v["floatingNodes"][0]["label"], "note");
        assert_eq!(v["changedNodes"][0]["externalLinkId"], "card-1");
    }

    #[test]
    fn persisted_payload_reloads_to_same_document() {
        let payload = PersistPayload {
            tree_data: sample_tree(),
            rendered_html: String::new(),
            arrows: vec![json!({"from": "a", "to": "b"})],
            floating_nodes: vec![FloatingNodeSnapshot {
                id: "floating_3".into(),
                label: "two\nlines".into(),
                x: -4.5,
                y: 100.25,
            }],
            changed_nodes: vec![],
        };
        let text = serde_json::to_string(&payload).unwrap();
        let reloaded = ReloadPayload::from_json(&text).unwrap();
        let (doc, arrows) = reloaded.into_parts();
        assert_eq!(doc, payload.document());
        assert_eq!(arrows.len(), 1);
    }

    #[test]
    fn stored_shape_splits_floating_nodes_out() {
        let text = r#"{"format":"node_tree","data":{"id":"root","topic":"R"},
            "floatingNodes":[{"id":"floating_1","topic":"legacy","x":1,"y":2}]}"#;
        let (doc, _) = ReloadPayload::from_json(text).unwrap().into_parts();
        assert_eq!(doc.floating[0].label, "legacy");
        assert!(doc.tree.as_value().get("floatingNodes").is_none());
        assert_eq!(doc.tree.node_count(), 1);
    }

    #[test]
    fn initial_shape_builds_root() {
        let (doc, _) = ReloadPayload::from_json(r#"{"nodeData":{"topic":"Biology"}}"#)
            .unwrap()
            .into_parts();
        let root = doc.tree.root().unwrap();
        assert_eq!(root["id"], INITIAL_ROOT_ID);
        assert_eq!(root["topic"], "Biology");
        assert!(doc.floating.is_empty());
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        assert!(matches!(
            ReloadPayload::from_json("[1,2]"),
            Err(PayloadError::UnrecognizedShape)
        ));
        assert!(matches!(
            ReloadPayload::from_json(r#"{"hello":"world"}"#),
            Err(PayloadError::UnrecognizedShape)
        ));
        assert!(matches!(
            ReloadPayload::from_json("{not json"),
            Err(PayloadError::Json(_))
        ));
    }
}
