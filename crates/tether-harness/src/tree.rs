#![forbid(unsafe_code)]

//! In-memory tree collaborator.

use std::collections::HashMap;
use std::sync::mpsc;

use serde_json::{Map, Value, json};
use tether_core::collab::{TreeChange, TreeImportError, TreeNode, TreeView};
use tether_core::document::{LINK_FIELD, TreeSnapshot};

#[derive(Debug, Clone)]
struct Slot {
    topic: String,
    parent: Option<String>,
    children: Vec<String>,
    /// Fields other than id/topic/children, kept verbatim.
    extra: Map<String, Value>,
}

/// A `node_tree` tree held in memory.
///
/// Behaves like a real tree widget: ids are unique, the root cannot be
/// removed or moved, moves that would create a cycle are rejected, and every
/// mutation is reported to subscribers.
#[derive(Debug, Default)]
pub struct MemoryTree {
    meta: Value,
    root: Option<String>,
    nodes: HashMap<String, Slot>,
    selected: Option<String>,
    read_only: bool,
    sinks: Vec<mpsc::Sender<TreeChange>>,
}

impl MemoryTree {
    /// A tree with a single root.
    #[must_use]
    pub fn new(root_id: &str, topic: &str) -> Self {
        let mut tree = Self::default();
        // A single-root snapshot always imports.
        let _ = tree.import(&TreeSnapshot::single_root(root_id, topic));
        tree
    }

    /// Builder: add a child without notifying anyone.
    #[must_use]
    pub fn with_child(mut self, parent_id: &str, id: &str, topic: &str) -> Self {
        self.insert(parent_id, id, topic);
        self
    }

    /// Attach (or clear) an external link reference.
    pub fn set_link(&mut self, id: &str, link_id: Option<&str>) {
        if let Some(slot) = self.nodes.get_mut(id) {
            match link_id {
                Some(link) => {
                    slot.extra.insert(LINK_FIELD.into(), Value::String(link.into()));
                }
                None => {
                    slot.extra.remove(LINK_FIELD);
                }
            }
        }
    }

    /// Builder form of [`set_link`](Self::set_link).
    #[must_use]
    pub fn with_link(mut self, id: &str, link_id: &str) -> Self {
        self.set_link(id, Some(link_id));
        self
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    #[must_use]
    pub fn topic(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).map(|s| s.topic.as_str())
    }

    #[must_use]
    pub fn children_of(&self, id: &str) -> Vec<String> {
        self.nodes
            .get(id)
            .map(|s| s.children.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Notify subscribers of an external mutation (as a widget would when
    /// the user edits it directly).
    pub fn notify(&mut self, change: TreeChange) {
        self.emit(change);
    }

    fn emit(&mut self, change: TreeChange) {
        self.sinks.retain(|sink| sink.send(change.clone()).is_ok());
    }

    fn insert(&mut self, parent_id: &str, id: &str, topic: &str) -> bool {
        if self.nodes.contains_key(id) {
            return false;
        }
        let Some(parent) = self.nodes.get_mut(parent_id) else {
            return false;
        };
        parent.children.push(id.to_string());
        self.nodes.insert(
            id.to_string(),
            Slot {
                topic: topic.to_string(),
                parent: Some(parent_id.to_string()),
                children: Vec::new(),
                extra: Map::new(),
            },
        );
        true
    }

    fn is_descendant(&self, id: &str, ancestor: &str) -> bool {
        let mut cursor = self.nodes.get(id).and_then(|s| s.parent.clone());
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|s| s.parent.clone());
        }
        false
    }

    fn import(&mut self, snapshot: &TreeSnapshot) -> Result<(), TreeImportError> {
        let root = snapshot
            .root()
            .ok_or_else(|| TreeImportError::new("snapshot has no root node"))?;
        let mut nodes = HashMap::new();
        let root_id = load(root, None, &mut nodes)?;
        self.meta = snapshot
            .as_value()
            .get("meta")
            .cloned()
            .unwrap_or(Value::Null);
        self.nodes = nodes;
        self.root = Some(root_id);
        if self
            .selected
            .as_ref()
            .is_some_and(|id| !self.nodes.contains_key(id))
        {
            self.selected = None;
        }
        Ok(())
    }

    fn dump(&self, id: &str) -> Value {
        let Some(slot) = self.nodes.get(id) else {
            return Value::Null;
        };
        let mut obj = slot.extra.clone();
        obj.insert("id".into(), Value::String(id.to_string()));
        obj.insert("topic".into(), Value::String(slot.topic.clone()));
        if !slot.children.is_empty() {
            let children = slot.children.iter().map(|c| self.dump(c)).collect();
            obj.insert("children".into(), Value::Array(children));
        }
        Value::Object(obj)
    }

    fn describe(&self, id: &str) -> Option<TreeNode> {
        let slot = self.nodes.get(id)?;
        Some(TreeNode {
            id: id.to_string(),
            topic: slot.topic.clone(),
            parent: slot.parent.clone(),
            children: slot.children.clone(),
            link_id: slot
                .extra
                .get(LINK_FIELD)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }
}

fn load(
    node: &Map<String, Value>,
    parent: Option<&str>,
    out: &mut HashMap<String, Slot>,
) -> Result<String, TreeImportError> {
    let id = node
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| TreeImportError::new("node without string id"))?
        .to_string();
    if out.contains_key(&id) {
        return Err(TreeImportError::new(format!("duplicate node id {id}")));
    }

    let mut extra = node.clone();
    extra.remove("id");
    extra.remove("children");
    let topic = extra
        .remove("topic")
        .and_then(|t| t.as_str().map(str::to_string))
        .unwrap_or_default();

    out.insert(
        id.clone(),
        Slot {
            topic,
            parent: parent.map(str::to_string),
            children: Vec::new(),
            extra,
        },
    );

    let mut children = Vec::new();
    if let Some(list) = node.get("children").and_then(Value::as_array) {
        for child in list {
            let child = child
                .as_object()
                .ok_or_else(|| TreeImportError::new("child is not an object"))?;
            children.push(load(child, Some(&id), out)?);
        }
    }
    if let Some(slot) = out.get_mut(&id) {
        slot.children = children;
    }
    Ok(id)
}

impl TreeView for MemoryTree {
    fn show(&mut self, snapshot: &TreeSnapshot) -> Result<(), TreeImportError> {
        self.import(snapshot)?;
        self.emit(TreeChange::Reloaded);
        Ok(())
    }

    fn export(&self) -> TreeSnapshot {
        let data = self.root.as_deref().map_or(Value::Null, |r| self.dump(r));
        TreeSnapshot::new(json!({
            "meta": self.meta,
            "format": "node_tree",
            "data": data,
        }))
    }

    fn add_node(&mut self, parent_id: &str, id: &str, topic: &str) -> bool {
        if !self.insert(parent_id, id, topic) {
            return false;
        }
        self.emit(TreeChange::Added { id: id.to_string() });
        true
    }

    fn update_node(&mut self, id: &str, topic: &str) -> bool {
        let Some(slot) = self.nodes.get_mut(id) else {
            return false;
        };
        slot.topic = topic.to_string();
        self.emit(TreeChange::Updated { id: id.to_string() });
        true
    }

    fn remove_node(&mut self, id: &str) -> bool {
        if self.root.as_deref() == Some(id) {
            return false;
        }
        let Some(slot) = self.nodes.get(id) else {
            return false;
        };
        if let Some(parent) = slot.parent.clone()
            && let Some(p) = self.nodes.get_mut(&parent)
        {
            p.children.retain(|c| c != id);
        }
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(removed) = self.nodes.remove(&current) {
                stack.extend(removed.children);
            }
            if self.selected.as_deref() == Some(current.as_str()) {
                self.selected = None;
            }
        }
        self.emit(TreeChange::Removed { id: id.to_string() });
        true
    }

    fn move_node(&mut self, id: &str, new_parent_id: &str) -> bool {
        if self.root.as_deref() == Some(id)
            || id == new_parent_id
            || !self.nodes.contains_key(new_parent_id)
            || self.is_descendant(new_parent_id, id)
        {
            return false;
        }
        let Some(old_parent) = self.nodes.get(id).and_then(|s| s.parent.clone()) else {
            return false;
        };
        if let Some(p) = self.nodes.get_mut(&old_parent) {
            p.children.retain(|c| c != id);
        }
        if let Some(p) = self.nodes.get_mut(new_parent_id) {
            p.children.push(id.to_string());
        }
        if let Some(slot) = self.nodes.get_mut(id) {
            slot.parent = Some(new_parent_id.to_string());
        }
        self.emit(TreeChange::Moved { id: id.to_string() });
        true
    }

    fn select_node(&mut self, id: &str) -> bool {
        if !self.nodes.contains_key(id) {
            return false;
        }
        self.selected = Some(id.to_string());
        true
    }

    fn clear_selection(&mut self) {
        self.selected = None;
    }

    fn selected(&self) -> Option<TreeNode> {
        self.selected.as_deref().and_then(|id| self.describe(id))
    }

    fn root(&self) -> Option<TreeNode> {
        self.root.as_deref().and_then(|id| self.describe(id))
    }

    fn node(&self, id: &str) -> Option<TreeNode> {
        self.describe(id)
    }

    fn is_editable(&self) -> bool {
        !self.read_only
    }

    fn subscribe(&mut self, sink: mpsc::Sender<TreeChange>) {
        self.sinks.push(sink);
    }
}
