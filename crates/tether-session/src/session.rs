#![forbid(unsafe_code)]

//! Session orchestrator.
//!
//! [`Session`] owns every piece of per-map state (history, the edit slot,
//! the floating registry, the drag, the autosave timer, the scroll
//! animation) and routes input to them. Collaborators are held by value;
//! tests reach them through the accessors.
//!
//! # Input routing
//!
//! While an edit is active the arbiter owns the keyboard: every key goes to
//! it and nothing reaches navigation or hotkeys. A pointer-down outside the
//! edited element commits the edit and is then routed as if idle.
//!
//! Idle keys resolve in a fixed order: floating-node delete, arrows,
//! configured hotkeys, undo/redo, then tree-node and floating-node editing
//! keys.
//!
//! # Change tracking
//!
//! The session subscribes to the tree once at construction. Every committed
//! change drains the notification channel into the autosave scheduler's
//! changed-id set, pushes a history snapshot and arms the autosave timer.
//! Notifications caused by restoring a document (init, reload, undo, redo)
//! are discarded. Notifications nobody committed (edits made directly in
//! the tree widget) are picked up on the next [`Session::dispatch`] or
//! [`Session::tick`].

use std::collections::HashMap;
use std::sync::{Arc, mpsc};

use serde_json::Value;
use tether_core::collab::{
    ElementRef, HostChannel, HostCommand, Layout, Persistence, TreeChange, TreeImportError,
    TreeView,
};
use tether_core::document::{ChangedNode, Document, PersistPayload, ReloadPayload, TreeSnapshot};
use tether_core::event::{Event, KeyCode, KeyEvent, PointerButton, PointerEvent, PointerEventKind};
use tether_core::geometry::Point;
use tether_core::hotkey::Hotkey;
use tether_core::label::{is_blank, markup_to_plain, plain_to_markup};
use tether_runtime::{
    AutosaveScheduler, History, HotkeyAction, PushOutcome, SaveTrigger, SessionConfig,
};
use web_time::Instant;

use crate::arbiter::{EditArbiter, EditKeyOutcome, EditMode, EditTarget, Resolution};
use crate::attach::AttachmentResolver;
use crate::error::Result;
use crate::navigation::{self, Direction, SmoothScroller};
use crate::query::GeometryQuery;
use crate::registry::FloatingRegistry;
use crate::status::{StatusIndicator, StatusKind};

/// Topic given to nodes created with Tab.
pub const NEW_CHILD_TOPIC: &str = "New Child";
/// Topic given to nodes created with Enter.
pub const NEW_SIBLING_TOPIC: &str = "New Sibling";

const TREE_ID_PREFIX: &str = "node_";

/// One open mind map.
pub struct Session<T, L, P, H> {
    tree: T,
    layout: L,
    persistence: P,
    host: H,
    config: SessionConfig,
    bindings: Vec<(HotkeyAction, Hotkey)>,
    history: History<Document>,
    arbiter: EditArbiter,
    registry: FloatingRegistry,
    attach: AttachmentResolver,
    scroller: SmoothScroller,
    autosave: AutosaveScheduler,
    status: StatusIndicator,
    changes: mpsc::Receiver<TreeChange>,
    arrows: Vec<Value>,
    tree_serial: u64,
}

impl<T, L, P, H> Session<T, L, P, H>
where
    T: TreeView,
    L: Layout,
    P: Persistence,
    H: HostChannel,
{
    /// Wire a session to its collaborators.
    ///
    /// Fails if `config` does not validate. The tree is subscribed to here,
    /// once, for the life of the session.
    pub fn new(mut tree: T, layout: L, persistence: P, host: H, config: SessionConfig) -> Result<Self> {
        let config = config.validated()?;
        let (sink, changes) = mpsc::channel();
        tree.subscribe(sink);
        Ok(Self {
            bindings: config.hotkeys.bindings(),
            history: History::new(config.history_config()),
            attach: AttachmentResolver::new(config.attach_threshold_px, config.attach_probe_interval),
            scroller: SmoothScroller::new(config.scroll_duration(), config.scroll_skip_px),
            autosave: AutosaveScheduler::new(config.autosave_config()),
            arbiter: EditArbiter::new(),
            registry: FloatingRegistry::new(),
            status: StatusIndicator::default(),
            arrows: Vec::new(),
            tree_serial: 0,
            changes,
            tree,
            layout,
            persistence,
            host,
            config,
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load the first document and seed history with it.
    ///
    /// A payload that cannot be loaded raises a blocking alert.
    pub fn init(&mut self, payload_json: &str) -> Result<()> {
        let _span = tracing::info_span!("session_init").entered();
        if let Err(err) = self.load(payload_json) {
            tracing::error!(error = %err, "map load failed");
            self.host.alert(&err.alert_text("Failed to load map"));
            return Err(err);
        }
        self.autosave.take_changed();
        self.history.clear();
        self.snapshot();
        if let Some(root) = self.tree.root() {
            self.select_tree(&root.id);
        }
        self.mark_linked();
        tracing::info!(
            nodes = self.tree.export().node_count(),
            floating = self.registry.len(),
            "session initialized"
        );
        Ok(())
    }

    /// Replace the document with one pushed by the host.
    ///
    /// An active edit is committed and a pending autosave flushed first.
    /// Scroll offset and selection survive when the selected id still
    /// exists.
    pub fn reload(&mut self, payload_json: &str, now: Instant) -> Result<()> {
        let _span = tracing::info_span!("session_reload").entered();
        self.commit_edit(now);
        self.end_drag();
        self.flush_pending(now);

        let scroll = self.layout.scroll_offset();
        let selected = self.tree.selected().map(|n| n.id);
        if let Err(err) = self.load(payload_json) {
            tracing::error!(error = %err, "map reload failed");
            self.host.alert(&err.alert_text("Failed to refresh map"));
            return Err(err);
        }
        self.layout.set_scroll_offset(scroll);
        self.reselect(selected);
        self.snapshot();
        self.mark_linked();
        self.status
            .show(StatusKind::Refreshed, now, self.config.status_duration());
        tracing::info!(
            nodes = self.tree.export().node_count(),
            floating = self.registry.len(),
            "session reloaded"
        );
        Ok(())
    }

    /// End the session: commit any edit, flush any pending autosave and
    /// unmount floating nodes.
    pub fn teardown(&mut self, now: Instant) {
        self.commit_edit(now);
        self.end_drag();
        self.scroller.cancel();
        self.sync_external_changes(now);
        self.flush_pending(now);
        self.registry.clear(&mut self.layout);
        self.status.clear();
        tracing::info!("session torn down");
    }

    fn load(&mut self, payload_json: &str) -> Result<()> {
        let (document, arrows) = ReloadPayload::from_json(payload_json)?.into_parts();
        self.tree.show(&document.tree)?;
        self.registry.restore(&mut self.layout, &document.floating);
        self.arrows = arrows;
        self.discard_changes();
        Ok(())
    }

    // ========================================================================
    // Input routing
    // ========================================================================

    /// Route one input event. Returns `true` if the session consumed it.
    pub fn dispatch(&mut self, event: &Event, now: Instant) -> bool {
        let consumed = match event {
            Event::Key(key) if self.arbiter.is_editing() => self.route_edit_key(key, now),
            Event::Key(key) => self.route_idle_key(key, now),
            Event::Pointer(pointer) if self.arbiter.is_editing() => {
                self.route_edit_pointer(pointer, now)
            }
            Event::Pointer(pointer) => self.route_idle_pointer(pointer, now),
            Event::Paste(text) => self.route_paste(text, now),
            Event::Blur => self.commit_edit(now),
        };
        self.sync_external_changes(now);
        consumed
    }

    /// Advance timers: the scroll animation and the autosave debounce.
    ///
    /// Returns `true` while either still needs future ticks. A due autosave
    /// waits until no edit is active.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.sync_external_changes(now);
        let animating = self.scroller.tick(&mut self.layout, now);
        if !self.arbiter.is_editing() && self.autosave.poll(now) {
            self.autosave_flush(now);
        }
        animating || self.autosave.is_pending()
    }

    fn route_edit_key(&mut self, key: &KeyEvent, now: Instant) -> bool {
        match self.arbiter.handle_key(key) {
            EditKeyOutcome::Commit => {
                self.commit_edit(now);
            }
            EditKeyOutcome::Cancel => {
                self.cancel_edit();
            }
            EditKeyOutcome::Edited => self.sync_editor(),
            EditKeyOutcome::Ignored => {}
        }
        true
    }

    fn route_idle_key(&mut self, key: &KeyEvent, now: Instant) -> bool {
        if !key.is_press() {
            return false;
        }
        let editable = self.tree.is_editable();

        if matches!(key.code, KeyCode::Delete | KeyCode::Backspace)
            && let Some(id) = self.registry.selected().map(|n| n.id.clone())
        {
            if editable {
                self.remove_floating(&id, now);
            }
            return editable;
        }

        let direction = match key.code {
            KeyCode::Up => Some(Direction::Up),
            KeyCode::Down => Some(Direction::Down),
            KeyCode::Left => Some(Direction::Left),
            KeyCode::Right => Some(Direction::Right),
            _ => None,
        };
        if let Some(direction) = direction {
            self.navigate(direction, now);
            return true;
        }

        if let Some(action) = self.hotkey_action(key) {
            self.run_hotkey(action, now);
            return true;
        }

        if key.command() && !key.alt() {
            let redo = key.is_char_ignore_case('y') || (key.is_char_ignore_case('z') && key.shift());
            if redo || key.is_char_ignore_case('z') {
                if editable {
                    if redo {
                        self.redo(now);
                    } else {
                        self.undo(now);
                    }
                }
                return editable;
            }
        }

        if !editable || key.command() || key.alt() {
            return false;
        }

        if let Some(selected) = self.tree.selected() {
            return match key.code {
                KeyCode::Char(' ') => self.begin_edit(EditTarget::TreeNode(selected.id)),
                KeyCode::Enter => {
                    self.add_sibling(now);
                    true
                }
                KeyCode::Tab => {
                    self.add_child(now);
                    true
                }
                KeyCode::Delete | KeyCode::Backspace => {
                    self.remove_selected(now);
                    true
                }
                _ => false,
            };
        }

        if let Some(id) = self.registry.selected().map(|n| n.id.clone()) {
            return match key.code {
                KeyCode::Char(' ') => self.begin_edit(EditTarget::Floating(id)),
                KeyCode::Tab => {
                    self.promote_floating(&id, now);
                    true
                }
                _ => false,
            };
        }
        false
    }

    fn hotkey_action(&self, key: &KeyEvent) -> Option<HotkeyAction> {
        self.bindings
            .iter()
            .find(|(_, hotkey)| hotkey.matches(key))
            .map(|(action, _)| *action)
    }

    fn run_hotkey(&mut self, action: HotkeyAction, now: Instant) {
        tracing::debug!(?action, "hotkey");
        match action {
            HotkeyAction::Save => {
                // Failures are alerted and logged inside.
                let _ = self.save(now);
            }
            HotkeyAction::Refresh => self.refresh(),
            HotkeyAction::FocusRoot => {
                self.focus_root(now);
            }
            HotkeyAction::Detach => {
                if let Some(selected) = self.tree.selected() {
                    self.detach(&selected.id, now);
                }
            }
            HotkeyAction::ToggleFullscreen => self.toggle_fullscreen(),
        }
    }

    fn route_edit_pointer(&mut self, pointer: &PointerEvent, now: Instant) -> bool {
        match pointer.kind {
            PointerEventKind::Down(_) | PointerEventKind::DoubleClick(_) => {
                if self.inside_edited_element(pointer.position) {
                    return true;
                }
                self.commit_edit(now);
                self.route_idle_pointer(pointer, now);
                true
            }
            PointerEventKind::Moved | PointerEventKind::Up(_) => false,
        }
    }

    fn inside_edited_element(&self, point: Point) -> bool {
        let rect = match self.arbiter.target() {
            Some(EditTarget::TreeNode(id)) => self.layout.node_rect(id),
            Some(EditTarget::Floating(id)) => self
                .registry
                .get(id)
                .and_then(|n| self.layout.floating_rect(n.handle)),
            None => None,
        };
        rect.is_some_and(|r| r.contains(point))
    }

    fn route_idle_pointer(&mut self, pointer: &PointerEvent, now: Instant) -> bool {
        match pointer.kind {
            PointerEventKind::Down(PointerButton::Primary) => self.pointer_down(pointer.position),
            PointerEventKind::Moved => self.pointer_moved(pointer.position),
            PointerEventKind::Up(PointerButton::Primary) => self.release_drag(now),
            PointerEventKind::DoubleClick(PointerButton::Primary) => {
                self.double_click(pointer.position, now)
            }
            _ => false,
        }
    }

    fn pointer_down(&mut self, position: Point) -> bool {
        match self.layout.hit_test(position) {
            Some(ElementRef::Floating(handle)) => {
                let Some(node) = self.registry.by_handle(handle) else {
                    return false;
                };
                let (id, origin) = (node.id.clone(), node.position);
                self.select_floating(&id);
                if self.tree.is_editable() {
                    self.attach
                        .begin(&id, handle, position, self.layout.zoom(), origin);
                }
                true
            }
            Some(ElementRef::TreeNode(id)) => {
                self.select_tree(&id);
                true
            }
            None => {
                self.registry.deselect();
                false
            }
        }
    }

    fn pointer_moved(&mut self, position: Point) -> bool {
        let Some(step) = self.attach.drag_to(position, self.layout.zoom()) else {
            return false;
        };
        self.registry
            .move_to(&mut self.layout, &step.floating_id, step.position);
        if step.probe {
            let candidate = self.attach.probe(&self.tree, &self.layout);
            self.attach.set_candidate(&mut self.layout, candidate);
        }
        true
    }

    /// Drop the dragged floating node, attaching it when a tree node is in
    /// range.
    fn release_drag(&mut self, now: Instant) -> bool {
        if !self.attach.is_dragging() {
            return false;
        }
        let target = self.attach.probe(&self.tree, &self.layout);
        let Some(drag) = self.attach.finish(&mut self.layout) else {
            return false;
        };
        if let Some(target) = target {
            self.attach_floating(&drag.floating_id, &target);
        }
        self.commit_change(now, SaveTrigger::Mutation);
        true
    }

    fn end_drag(&mut self) {
        self.attach.finish(&mut self.layout);
    }

    fn attach_floating(&mut self, floating_id: &str, parent_id: &str) -> Option<String> {
        let label = self.registry.get(floating_id)?.label.clone();
        let id = self.mint_tree_id();
        if !self.tree.add_node(parent_id, &id, &plain_to_markup(&label)) {
            tracing::debug!(floating_id, parent_id, "attach rejected by tree");
            return None;
        }
        self.registry.remove(&mut self.layout, floating_id);
        self.select_tree(&id);
        tracing::info!(floating_id, parent_id, node_id = %id, "floating node attached");
        Some(id)
    }

    fn double_click(&mut self, position: Point, now: Instant) -> bool {
        match self.layout.hit_test(position) {
            Some(ElementRef::Floating(handle)) => {
                let Some(id) = self.registry.by_handle(handle).map(|n| n.id.clone()) else {
                    return false;
                };
                self.select_floating(&id);
                self.begin_edit(EditTarget::Floating(id))
            }
            Some(ElementRef::TreeNode(id)) => {
                self.select_tree(&id);
                self.begin_edit(EditTarget::TreeNode(id))
            }
            None => self.create_floating_at(position, now).is_some(),
        }
    }

    fn route_paste(&mut self, text: &str, now: Instant) -> bool {
        if self.arbiter.insert_text(text) {
            self.sync_editor();
            return true;
        }
        self.paste_text(text, now).is_some()
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Enter inline edit on a tree or floating node.
    ///
    /// Refused while another edit is active, in read-only mode, or when the
    /// target does not exist.
    pub fn begin_edit(&mut self, target: EditTarget) -> bool {
        if !self.tree.is_editable() {
            tracing::debug!(node_id = target.id(), "edit refused; map is read-only");
            return false;
        }
        let (element, original, text) = match &target {
            EditTarget::TreeNode(id) => {
                let Some(node) = self.tree.node(id) else {
                    return false;
                };
                let text = markup_to_plain(&node.topic);
                (ElementRef::TreeNode(id.clone()), node.topic, text)
            }
            EditTarget::Floating(id) => {
                let Some(node) = self.registry.get(id) else {
                    return false;
                };
                (
                    ElementRef::Floating(node.handle),
                    node.label.clone(),
                    node.label.clone(),
                )
            }
        };
        if !self.arbiter.begin(target, original, text.clone()) {
            return false;
        }
        self.end_drag();
        self.layout.open_editor(&element, &text);
        true
    }

    /// Commit the active edit, if any.
    ///
    /// A blank tree label keeps the previous one; floating labels may be
    /// empty.
    pub fn commit_edit(&mut self, now: Instant) -> bool {
        let Some(done) = self.arbiter.finish(Resolution::Commit) else {
            return false;
        };
        self.layout.close_editor();
        match &done.target {
            EditTarget::TreeNode(id) => {
                if is_blank(&done.text) {
                    tracing::debug!(node_id = %id, "blank label discarded");
                } else {
                    let markup = plain_to_markup(&done.text);
                    if markup != done.original {
                        self.tree.update_node(id, &markup);
                    }
                }
            }
            EditTarget::Floating(id) => {
                if done.text != done.original {
                    self.registry.set_label(&mut self.layout, id, &done.text);
                }
            }
        }
        self.commit_change(now, SaveTrigger::LabelEdit);
        true
    }

    /// Discard the active edit, leaving the label as it was.
    pub fn cancel_edit(&mut self) -> bool {
        let Some(done) = self.arbiter.finish(Resolution::Cancel) else {
            return false;
        };
        self.layout.close_editor();
        if let EditTarget::Floating(id) = &done.target
            && let Some(node) = self.registry.get(id)
        {
            self.layout.set_floating_label(node.handle, &node.label);
        }
        true
    }

    fn sync_editor(&mut self) {
        if let Some(text) = self.arbiter.text() {
            self.layout.sync_editor(text);
        }
    }

    // ========================================================================
    // Structural operations
    // ========================================================================

    fn can_mutate(&self, op: &'static str) -> bool {
        if !self.tree.is_editable() {
            tracing::debug!(op, "ignored; map is read-only");
            return false;
        }
        if self.arbiter.is_editing() {
            tracing::debug!(op, "ignored; an edit is active");
            return false;
        }
        true
    }

    /// Add a "New Child" under the selected tree node and select it.
    pub fn add_child(&mut self, now: Instant) -> Option<String> {
        if !self.can_mutate("add_child") {
            return None;
        }
        let Some(parent) = self.tree.selected() else {
            tracing::debug!("add_child ignored; nothing selected");
            return None;
        };
        self.insert_node(&parent.id, NEW_CHILD_TOPIC, now)
    }

    /// Add a "New Sibling" after the selected tree node and select it.
    /// The root has no siblings.
    pub fn add_sibling(&mut self, now: Instant) -> Option<String> {
        if !self.can_mutate("add_sibling") {
            return None;
        }
        let Some(parent_id) = self.tree.selected().and_then(|n| n.parent) else {
            tracing::debug!("add_sibling ignored; no selection or root selected");
            return None;
        };
        self.insert_node(&parent_id, NEW_SIBLING_TOPIC, now)
    }

    fn insert_node(&mut self, parent_id: &str, topic: &str, now: Instant) -> Option<String> {
        let id = self.mint_tree_id();
        if !self.tree.add_node(parent_id, &id, topic) {
            tracing::debug!(parent_id, "node insert rejected by tree");
            return None;
        }
        self.select_tree(&id);
        self.commit_change(now, SaveTrigger::Mutation);
        Some(id)
    }

    /// Remove the selected tree node and its subtree, selecting the parent.
    pub fn remove_selected(&mut self, now: Instant) -> bool {
        if !self.can_mutate("remove_selected") {
            return false;
        }
        let Some(selected) = self.tree.selected() else {
            return false;
        };
        let Some(parent_id) = selected.parent else {
            tracing::debug!("root cannot be removed");
            return false;
        };
        if !self.tree.remove_node(&selected.id) {
            return false;
        }
        self.select_tree(&parent_id);
        self.commit_change(now, SaveTrigger::Mutation);
        true
    }

    /// Move `id` under `new_parent_id`.
    ///
    /// The root cannot move, and a node cannot move under itself or one of
    /// its descendants.
    pub fn reparent(&mut self, id: &str, new_parent_id: &str, now: Instant) -> bool {
        if !self.can_mutate("reparent") {
            return false;
        }
        let Some(node) = self.tree.node(id) else {
            return false;
        };
        if node.is_root()
            || id == new_parent_id
            || node.parent.as_deref() == Some(new_parent_id)
            || self.tree.node(new_parent_id).is_none()
            || self.is_descendant(new_parent_id, id)
        {
            tracing::debug!(node_id = id, new_parent_id, "reparent rejected");
            return false;
        }
        if !self.tree.move_node(id, new_parent_id) {
            return false;
        }
        self.commit_change(now, SaveTrigger::Mutation);
        true
    }

    fn is_descendant(&self, candidate: &str, ancestor: &str) -> bool {
        let mut cursor = self.tree.node(candidate).and_then(|n| n.parent);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.tree.node(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Turn a non-root leaf into a floating node at the same canvas
    /// position. Returns the new floating id.
    pub fn detach(&mut self, id: &str, now: Instant) -> Option<String> {
        if !self.can_mutate("detach") {
            return None;
        }
        let node = self.tree.node(id)?;
        if node.is_root() || !node.is_leaf() {
            tracing::debug!(node_id = id, "only non-root leaves detach");
            return None;
        }
        let Some(rect) = self.layout.node_rect(id) else {
            tracing::debug!(node_id = id, "detach ignored; node not rendered");
            return None;
        };
        let position = self.screen_to_canvas(rect.origin());
        if !self.tree.remove_node(id) {
            return None;
        }
        let floating_id =
            self.registry
                .create(&mut self.layout, &markup_to_plain(&node.topic), position);
        self.select_floating(&floating_id);
        self.commit_change(now, SaveTrigger::Mutation);
        tracing::info!(node_id = id, floating_id = %floating_id, "node detached");
        Some(floating_id)
    }

    /// Add the pasted text as a child of the selected tree node.
    pub fn paste_text(&mut self, text: &str, now: Instant) -> Option<String> {
        if !self.can_mutate("paste") || is_blank(text) {
            return None;
        }
        let parent = self.tree.selected()?;
        self.insert_node(&parent.id, &plain_to_markup(text), now)
    }

    /// Plain-text label of the selected tree or floating node.
    #[must_use]
    pub fn copy_selection(&self) -> Option<String> {
        if let Some(node) = self.tree.selected() {
            return Some(markup_to_plain(&node.topic));
        }
        self.registry.selected().map(|n| n.label.clone())
    }

    // ========================================================================
    // Floating nodes
    // ========================================================================

    /// Create an empty floating node centered on a screen point, select it,
    /// and record the change.
    pub fn create_floating_at(&mut self, screen: Point, now: Instant) -> Option<String> {
        if !self.config.floating_nodes_enabled {
            tracing::debug!("floating nodes disabled");
            return None;
        }
        if !self.can_mutate("create_floating") {
            return None;
        }
        let canvas = self.screen_to_canvas(screen);
        let id = self.registry.create(&mut self.layout, "", canvas);
        let handle = self.registry.get(&id)?.handle;
        if let Some(rect) = self.layout.floating_rect(handle) {
            let half = Point::new(rect.width / 2.0, rect.height / 2.0).unscale(self.layout.zoom());
            self.registry.move_to(&mut self.layout, &id, canvas - half);
        }
        self.select_floating(&id);
        self.commit_change(now, SaveTrigger::Mutation);
        Some(id)
    }

    /// Delete a floating node.
    pub fn remove_floating(&mut self, id: &str, now: Instant) -> bool {
        if !self.can_mutate("remove_floating") {
            return false;
        }
        if self.registry.remove(&mut self.layout, id).is_none() {
            return false;
        }
        self.commit_change(now, SaveTrigger::Mutation);
        true
    }

    /// Make a floating node a child of root and add a "New Child" beneath
    /// it. Returns the id of the new child, which ends up selected.
    pub fn promote_floating(&mut self, id: &str, now: Instant) -> Option<String> {
        if !self.can_mutate("promote_floating") {
            return None;
        }
        let root = self.tree.root()?;
        let label = self.registry.get(id)?.label.clone();
        let promoted = self.mint_tree_id();
        if !self.tree.add_node(&root.id, &promoted, &plain_to_markup(&label)) {
            return None;
        }
        self.registry.remove(&mut self.layout, id);
        let child = self.mint_tree_id();
        if self.tree.add_node(&promoted, &child, NEW_CHILD_TOPIC) {
            self.select_tree(&child);
        } else {
            self.select_tree(&promoted);
        }
        self.commit_change(now, SaveTrigger::Mutation);
        Some(child)
    }

    fn screen_to_canvas(&self, screen: Point) -> Point {
        let viewport = self.layout.viewport();
        (screen - viewport.origin()).unscale(self.layout.zoom()) + self.layout.scroll_offset()
    }

    // ========================================================================
    // Selection and navigation
    // ========================================================================

    fn select_tree(&mut self, id: &str) -> bool {
        self.registry.deselect();
        self.tree.select_node(id)
    }

    fn select_floating(&mut self, id: &str) -> bool {
        self.tree.clear_selection();
        self.registry.select(id)
    }

    fn reselect(&mut self, previous: Option<String>) {
        match previous {
            Some(id) if self.tree.node(&id).is_some() => {
                self.tree.select_node(&id);
            }
            Some(id) => {
                tracing::debug!(node_id = %id, "previous selection gone; clearing");
                self.tree.clear_selection();
            }
            None => {}
        }
    }

    /// Move the selection one step and scroll it to the viewport center.
    pub fn navigate(&mut self, direction: Direction, now: Instant) -> bool {
        let Some(selected) = self.tree.selected() else {
            tracing::trace!(?direction, "navigation ignored; nothing selected");
            return false;
        };
        let target = navigation::resolve(
            &GeometryQuery::new(&self.tree, &self.layout),
            &selected,
            direction,
        );
        let Some(target) = target else {
            tracing::trace!(?direction, from = %selected.id, "no navigation target");
            return false;
        };
        tracing::debug!(?direction, from = %selected.id, to = %target, "navigated");
        self.select_tree(&target);
        self.scroller.scroll_to(&self.layout, &target, now);
        true
    }

    /// Select the root and smooth-scroll it into the center.
    pub fn focus_root(&mut self, now: Instant) -> bool {
        let Some(root) = self.tree.root() else {
            return false;
        };
        self.focus_node(&root.id, now)
    }

    /// Select the root and center on it immediately.
    pub fn center_root(&mut self) -> bool {
        let Some(root) = self.tree.root() else {
            return false;
        };
        self.scroller.cancel();
        self.select_tree(&root.id);
        self.layout.center_on(&root.id);
        true
    }

    /// Select a node by id and smooth-scroll it into the center.
    pub fn focus_node(&mut self, id: &str, now: Instant) -> bool {
        if self.tree.node(id).is_none() {
            tracing::debug!(node_id = id, "focus ignored; unknown node");
            return false;
        }
        self.select_tree(id);
        self.scroller.scroll_to(&self.layout, id, now);
        true
    }

    /// Ask the host to open the item linked from a tree node.
    pub fn jump_to_link(&mut self, id: &str) -> bool {
        let Some(link_id) = self.tree.node(id).and_then(|n| n.link_id) else {
            return false;
        };
        self.host.send(HostCommand::JumpToLinked { link_id });
        true
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Step back one snapshot.
    ///
    /// If the tree rejects the snapshot, the cursor returns to the displayed
    /// document and this returns `false`. The same holds for [`redo`](Self::redo).
    pub fn undo(&mut self, now: Instant) -> bool {
        self.step_history(now, "undo", History::undo, History::redo)
    }

    /// Step forward one snapshot.
    pub fn redo(&mut self, now: Instant) -> bool {
        self.step_history(now, "redo", History::redo, History::undo)
    }

    fn step_history(
        &mut self,
        now: Instant,
        op: &'static str,
        step: impl FnOnce(&mut History<Document>) -> Option<Arc<Document>>,
        revert: impl FnOnce(&mut History<Document>) -> Option<Arc<Document>>,
    ) -> bool {
        if !self.tree.is_editable() {
            tracing::debug!(op, "ignored; map is read-only");
            return false;
        }
        self.commit_edit(now);
        self.end_drag();
        self.sync_external_changes(now);
        let Some(document) = step(&mut self.history) else {
            tracing::trace!(op, "nothing to step to");
            return false;
        };
        if let Err(err) = self.restore(&document) {
            revert(&mut self.history);
            tracing::warn!(op, error = %err, cursor = ?self.history.cursor(), "history step reverted");
            return false;
        }
        self.autosave.schedule(now, SaveTrigger::Mutation);
        tracing::debug!(op, cursor = ?self.history.cursor(), len = self.history.len(), "history stepped");
        true
    }

    /// Show `document`, keeping scroll offset and selection where they still
    /// resolve. On error the display is unchanged.
    fn restore(&mut self, document: &Document) -> std::result::Result<(), TreeImportError> {
        let scroll = self.layout.scroll_offset();
        let selected = self.tree.selected().map(|n| n.id);
        let before = self.tree.export();
        if let Err(err) = self.tree.show(&document.tree) {
            self.discard_changes();
            return Err(err);
        }
        self.registry.restore(&mut self.layout, &document.floating);
        self.discard_changes();
        self.note_label_changes(&before, &document.tree);
        self.layout.set_scroll_offset(scroll);
        self.reselect(selected);
        self.mark_linked();
        Ok(())
    }

    /// Linked nodes whose label differs across a restore still need a sync.
    fn note_label_changes(&mut self, before: &TreeSnapshot, after: &TreeSnapshot) {
        let previous: HashMap<&str, &str> = before.nodes().iter().map(|n| (n.id, n.topic)).collect();
        for node in after.nodes() {
            if node.link_id.is_some() && previous.get(node.id) != Some(&node.topic) {
                self.autosave.note_changed(node.id);
            }
        }
    }

    /// Install a history handed over from elsewhere. It is checked, and
    /// repaired if needed, before the next snapshot.
    pub fn replace_history(&mut self, history: History<Document>) {
        self.history = history;
    }

    // ========================================================================
    // Change tracking and persistence
    // ========================================================================

    /// The current document.
    #[must_use]
    pub fn document(&self) -> Document {
        Document {
            tree: self.tree.export(),
            floating: self.registry.snapshot(),
        }
    }

    fn commit_change(&mut self, now: Instant, trigger: SaveTrigger) {
        self.drain_changes();
        self.snapshot();
        self.autosave.schedule(now, trigger);
    }

    /// Record changes the tree reported without going through the session.
    fn sync_external_changes(&mut self, now: Instant) -> bool {
        if self.drain_changes() == 0 {
            return false;
        }
        tracing::debug!("recording changes made directly in the tree");
        self.snapshot();
        self.autosave.schedule(now, SaveTrigger::Mutation);
        true
    }

    fn snapshot(&mut self) -> PushOutcome {
        if self.history.ensure_well_formed() {
            tracing::warn!("reseeding history from the current document");
        }
        let outcome = self.history.push(self.document());
        tracing::trace!(?outcome, len = self.history.len(), "history snapshot");
        outcome
    }

    fn drain_changes(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(change) = self.changes.try_recv() {
            drained += 1;
            match (&change, change.node_id()) {
                (TreeChange::Removed { .. }, Some(id)) => self.autosave.forget(id),
                (_, Some(id)) => self.autosave.note_changed(id),
                (_, None) => {}
            }
        }
        drained
    }

    fn discard_changes(&mut self) {
        while self.changes.try_recv().is_ok() {}
    }

    fn mark_linked(&mut self) {
        let tree = self.tree.export();
        for node in tree.nodes() {
            self.layout.mark_linked(node.id, node.link_id.is_some());
        }
    }

    fn mint_tree_id(&mut self) -> String {
        loop {
            self.tree_serial += 1;
            let id = format!("{TREE_ID_PREFIX}{}", self.tree_serial);
            if self.tree.node(&id).is_none() {
                return id;
            }
        }
    }

    /// Serialize the current state and hand it to persistence.
    fn flush(&mut self) -> Result<()> {
        let changed_ids = self.autosave.take_changed();
        let changed_nodes: Vec<ChangedNode> = changed_ids
            .iter()
            .filter_map(|id| {
                let node = self.tree.node(id)?;
                let external_link_id = node.link_id?;
                Some(ChangedNode {
                    id: id.clone(),
                    label: node.topic,
                    external_link_id,
                })
            })
            .collect();
        let payload = PersistPayload {
            tree_data: self.tree.export(),
            rendered_html: self.layout.rendered_html(),
            arrows: self.arrows.clone(),
            floating_nodes: self.registry.snapshot(),
            changed_nodes,
        };
        let json = match serde_json::to_string(&payload) {
            Ok(json) => json,
            Err(err) => {
                for id in &changed_ids {
                    self.autosave.note_changed(id);
                }
                return Err(err.into());
            }
        };
        self.persistence.persist(&json);
        tracing::info!(
            nodes = payload.tree_data.node_count(),
            floating = payload.floating_nodes.len(),
            changed = payload.changed_nodes.len(),
            "document persisted"
        );
        Ok(())
    }

    fn autosave_flush(&mut self, now: Instant) {
        match self.flush() {
            Ok(()) => self
                .status
                .show(StatusKind::AutoSaved, now, self.config.status_duration()),
            Err(err) => tracing::error!(error = %err, "autosave failed"),
        }
    }

    fn flush_pending(&mut self, now: Instant) {
        if self.autosave.cancel() {
            self.autosave_flush(now);
        }
    }

    /// Save now: commit any edit, cancel the pending autosave, persist and
    /// tell the host. A failure raises a blocking alert.
    pub fn save(&mut self, now: Instant) -> Result<()> {
        self.commit_edit(now);
        self.sync_external_changes(now);
        self.autosave.cancel();
        if let Err(err) = self.flush() {
            tracing::error!(error = %err, "save failed");
            self.host.alert(&err.alert_text("Error saving"));
            return Err(err);
        }
        self.status
            .show(StatusKind::Saved, now, self.config.saved_status_duration());
        self.host.send(HostCommand::Save);
        Ok(())
    }

    /// Ask the host to push fresh data through [`Session::reload`].
    pub fn refresh(&mut self) {
        self.host.send(HostCommand::RefreshData);
    }

    pub fn toggle_fullscreen(&mut self) {
        self.host.send(HostCommand::ToggleFullscreen);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Transient status text, if one is showing.
    #[must_use]
    pub fn status(&self, now: Instant) -> Option<&'static str> {
        self.status.visible(now).map(StatusKind::text)
    }

    #[must_use]
    pub fn edit_mode(&self) -> EditMode {
        self.arbiter.mode()
    }

    #[must_use]
    pub fn editing(&self) -> Option<&EditTarget> {
        self.arbiter.target()
    }

    /// Text in the active editor.
    #[must_use]
    pub fn editor_text(&self) -> Option<&str> {
        self.arbiter.text()
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.attach.is_dragging()
    }

    #[must_use]
    pub fn is_scrolling(&self) -> bool {
        self.scroller.is_animating()
    }

    #[must_use]
    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    #[must_use]
    pub fn history(&self) -> &History<Document> {
        &self.history
    }

    #[must_use]
    pub fn registry(&self) -> &FloatingRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn tree(&self) -> &T {
        &self.tree
    }

    /// Direct tree access. Mutations made here are recorded on the next
    /// dispatch or tick.
    pub fn tree_mut(&mut self) -> &mut T {
        &mut self.tree
    }

    #[must_use]
    pub fn layout(&self) -> &L {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut L {
        &mut self.layout
    }

    #[must_use]
    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tether_core::event::Modifiers;
    use tether_harness::{FixedLayout, MemoryTree, RecordingHost, RecordingPersistence};

    type TestSession = Session<MemoryTree, FixedLayout, RecordingPersistence, RecordingHost>;

    const MAP: &str = r#"{
        "meta": {"name": "t", "author": "t", "version": "1"},
        "format": "node_tree",
        "data": {"id": "root", "topic": "Root", "children": [
            {"id": "a", "topic": "A", "direction": "right"},
            {"id": "b", "topic": "B<br>two", "direction": "left", "linkId": "card-7"}
        ]}
    }"#;

    fn session() -> TestSession {
        let layout = FixedLayout::default()
            .with_node("root", 450.0, 380.0, 100.0, 40.0)
            .with_node("a", 650.0, 380.0, 80.0, 30.0)
            .with_node("b", 250.0, 380.0, 80.0, 30.0);
        let mut session = Session::new(
            MemoryTree::new("root", "placeholder"),
            layout,
            RecordingPersistence::default(),
            RecordingHost::default(),
            SessionConfig::default(),
        )
        .expect("default config is valid");
        session.init(MAP).expect("map loads");
        session
    }

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code))
    }

    fn ctrl(c: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(c)).with_modifiers(Modifiers::CTRL))
    }

    #[test]
    fn init_selects_root_seeds_history_and_marks_links() {
        let s = session();
        assert_eq!(s.tree().selected().map(|n| n.id), Some("root".to_string()));
        assert_eq!(s.history().len(), 1);
        assert!(!s.history().can_undo());
        assert!(s.layout().linked().contains("b"));
        assert!(!s.layout().linked().contains("a"));
        assert!(!s.autosave_pending());
    }

    #[test]
    fn bad_init_payload_alerts() {
        let mut s = Session::new(
            MemoryTree::new("root", "r"),
            FixedLayout::default(),
            RecordingPersistence::default(),
            RecordingHost::default(),
            SessionConfig::default(),
        )
        .expect("default config is valid");
        assert!(s.init("{not json").is_err());
        assert_eq!(s.host().alerts().len(), 1);
        assert!(s.host().alerts()[0].starts_with("Failed to load map"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SessionConfig {
            history_depth: 0,
            ..SessionConfig::default()
        };
        let result = Session::new(
            MemoryTree::new("root", "r"),
            FixedLayout::default(),
            RecordingPersistence::default(),
            RecordingHost::default(),
            config,
        );
        assert!(result.is_err());
    }

    #[test]
    fn tab_and_enter_add_nodes() {
        let mut s = session();
        let now = Instant::now();
        assert!(s.dispatch(&press(KeyCode::Tab), now));
        let child = s.tree().selected().expect("new child selected");
        assert_eq!(child.topic, NEW_CHILD_TOPIC);
        assert_eq!(child.parent.as_deref(), Some("root"));

        assert!(s.dispatch(&press(KeyCode::Enter), now));
        let sibling = s.tree().selected().expect("new sibling selected");
        assert_eq!(sibling.topic, NEW_SIBLING_TOPIC);
        assert_eq!(sibling.parent.as_deref(), Some("root"));
        assert_eq!(s.history().len(), 3);
    }

    #[test]
    fn enter_on_root_adds_nothing() {
        let mut s = session();
        s.dispatch(&press(KeyCode::Enter), Instant::now());
        assert_eq!(s.history().len(), 1);
        assert_eq!(s.tree().len(), 3);
    }

    #[test]
    fn root_is_never_removed() {
        let mut s = session();
        assert!(!s.remove_selected(Instant::now()));
        assert!(s.tree().node("root").is_some());
    }

    #[test]
    fn remove_selects_parent() {
        let mut s = session();
        let now = Instant::now();
        s.focus_node("a", now);
        assert!(s.dispatch(&press(KeyCode::Delete), now));
        assert!(s.tree().node("a").is_none());
        assert_eq!(s.tree().selected().map(|n| n.id), Some("root".to_string()));
    }

    #[test]
    fn reparent_rejects_cycles() {
        let mut s = session();
        let now = Instant::now();
        s.focus_node("a", now);
        let child = s.add_child(now).expect("child added");
        assert!(!s.reparent("a", &child, now));
        assert!(!s.reparent("a", "a", now));
        assert!(!s.reparent("root", "a", now));
        assert!(s.reparent(&child, "b", now));
        assert_eq!(s.tree().node(&child).and_then(|n| n.parent), Some("b".to_string()));
    }

    #[test]
    fn copy_and_paste_convert_line_breaks() {
        let mut s = session();
        let now = Instant::now();
        s.focus_node("b", now);
        assert_eq!(s.copy_selection().as_deref(), Some("B\ntwo"));

        assert!(s.dispatch(&Event::Paste("x\ny".into()), now));
        let id = s.tree().selected().map(|n| n.id).expect("pasted node selected");
        assert_eq!(s.tree().topic(&id), Some("x<br>y"));
        assert_eq!(s.tree().node(&id).and_then(|n| n.parent), Some("b".to_string()));

        assert!(s.paste_text("   ", now).is_none());
    }

    #[test]
    fn hotkeys_reach_host() {
        let mut s = session();
        let now = Instant::now();
        assert!(s.dispatch(&press(KeyCode::F(5)), now));
        assert!(s.dispatch(&press(KeyCode::F(11)), now));
        assert_eq!(
            s.host().commands(),
            [HostCommand::RefreshData, HostCommand::ToggleFullscreen]
        );
    }

    #[test]
    fn explicit_save_persists_and_notifies() {
        let mut s = session();
        let now = Instant::now();
        s.dispatch(&press(KeyCode::Tab), now);
        assert!(s.autosave_pending());
        assert!(s.dispatch(&ctrl('s'), now));
        assert!(!s.autosave_pending());
        assert_eq!(s.persistence().count(), 1);
        assert_eq!(s.host().commands(), [HostCommand::Save]);
        assert_eq!(s.status(now), Some("Saved!"));
        assert_eq!(s.status(now + Duration::from_millis(2001)), None);
    }

    #[test]
    fn jump_to_link_needs_a_link() {
        let mut s = session();
        assert!(!s.jump_to_link("a"));
        assert!(s.jump_to_link("b"));
        assert_eq!(
            s.host().commands(),
            [HostCommand::JumpToLinked {
                link_id: "card-7".into()
            }]
        );
    }

    #[test]
    fn center_root_is_immediate() {
        let mut s = session();
        s.focus_node("a", Instant::now());
        assert!(s.center_root());
        assert_eq!(s.layout().centered(), ["root".to_string()]);
        assert!(!s.is_scrolling());
    }

    #[test]
    fn read_only_blocks_mutation_but_not_navigation() {
        let mut s = session();
        s.tree_mut().set_read_only(true);
        let now = Instant::now();
        assert!(!s.dispatch(&press(KeyCode::Tab), now));
        assert!(s.add_child(now).is_none());
        assert!(!s.begin_edit(EditTarget::TreeNode("root".into())));
        assert!(!s.undo(now));
        assert!(s.dispatch(&press(KeyCode::Right), now));
        assert_eq!(s.tree().selected().map(|n| n.id), Some("a".to_string()));
        assert_eq!(s.copy_selection().as_deref(), Some("A"));
    }
}
