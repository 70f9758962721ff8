#![forbid(unsafe_code)]

//! Deterministic layout collaborator.
//!
//! Tree node rects are given explicitly in canvas space. Screen space is
//! derived as `viewport.origin + (canvas - scroll) * zoom`, the inverse of
//! the conversion the session applies to pointer positions.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tether_core::collab::{ElementHandle, ElementRef, Layout};
use tether_core::geometry::{Point, Rect, Size};

/// A mounted floating element.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatingElement {
    pub id: String,
    pub label: String,
    /// Canvas-space top-left corner.
    pub position: Point,
}

/// Layout with fixed, test-supplied geometry.
#[derive(Debug, Clone)]
pub struct FixedLayout {
    viewport: Rect,
    zoom: f64,
    scroll: Point,
    node_rects: BTreeMap<String, Rect>,
    floating: BTreeMap<ElementHandle, FloatingElement>,
    floating_size: Size,
    next_handle: u64,
    highlights: HashSet<ElementRef>,
    linked: BTreeSet<String>,
    editor: Option<(ElementRef, String)>,
    centered: Vec<String>,
    scroll_log: Vec<Point>,
}

impl Default for FixedLayout {
    fn default() -> Self {
        Self::new(Rect::new(0.0, 0.0, 1000.0, 800.0))
    }
}

impl FixedLayout {
    #[must_use]
    pub fn new(viewport: Rect) -> Self {
        Self {
            viewport,
            zoom: 1.0,
            scroll: Point::ORIGIN,
            node_rects: BTreeMap::new(),
            floating: BTreeMap::new(),
            floating_size: Size::new(80.0, 40.0),
            next_handle: 1,
            highlights: HashSet::new(),
            linked: BTreeSet::new(),
            editor: None,
            centered: Vec::new(),
            scroll_log: Vec::new(),
        }
    }

    /// Builder: place a tree node at a canvas rect.
    #[must_use]
    pub fn with_node(mut self, id: &str, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.place_node(id, Rect::new(x, y, width, height));
        self
    }

    #[must_use]
    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }

    #[must_use]
    pub fn with_floating_size(mut self, size: Size) -> Self {
        self.floating_size = size;
        self
    }

    pub fn place_node(&mut self, id: &str, canvas_rect: Rect) {
        self.node_rects.insert(id.to_string(), canvas_rect);
    }

    pub fn remove_node(&mut self, id: &str) {
        self.node_rects.remove(id);
    }

    #[must_use]
    pub fn floating_elements(&self) -> Vec<&FloatingElement> {
        self.floating.values().collect()
    }

    #[must_use]
    pub fn floating_by_id(&self, id: &str) -> Option<(ElementHandle, &FloatingElement)> {
        self.floating
            .iter()
            .find(|(_, el)| el.id == id)
            .map(|(h, el)| (*h, el))
    }

    #[must_use]
    pub fn is_highlighted(&self, target: &ElementRef) -> bool {
        self.highlights.contains(target)
    }

    #[must_use]
    pub fn highlight_count(&self) -> usize {
        self.highlights.len()
    }

    #[must_use]
    pub fn linked(&self) -> &BTreeSet<String> {
        &self.linked
    }

    /// The open editor target and its mirrored text.
    #[must_use]
    pub fn editor(&self) -> Option<&(ElementRef, String)> {
        self.editor.as_ref()
    }

    #[must_use]
    pub fn centered(&self) -> &[String] {
        &self.centered
    }

    /// Every offset passed to `set_scroll_offset`, in order.
    #[must_use]
    pub fn scroll_log(&self) -> &[Point] {
        &self.scroll_log
    }

    /// Screen-space rect of a canvas-space rect.
    #[must_use]
    pub fn to_screen(&self, canvas: Rect) -> Rect {
        Rect::new(
            self.viewport.x + (canvas.x - self.scroll.x) * self.zoom,
            self.viewport.y + (canvas.y - self.scroll.y) * self.zoom,
            canvas.width * self.zoom,
            canvas.height * self.zoom,
        )
    }

    /// Screen-space center of a tree node.
    #[must_use]
    pub fn screen_center(&self, id: &str) -> Option<Point> {
        self.node_rect(id).map(|r| r.center())
    }
}

impl Layout for FixedLayout {
    fn node_rect(&self, id: &str) -> Option<Rect> {
        self.node_rects.get(id).map(|r| self.to_screen(*r))
    }

    fn floating_rect(&self, handle: ElementHandle) -> Option<Rect> {
        let el = self.floating.get(&handle)?;
        Some(self.to_screen(Rect::from_origin_size(el.position, self.floating_size)))
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn scroll_offset(&self) -> Point {
        self.scroll
    }

    fn set_scroll_offset(&mut self, offset: Point) {
        self.scroll = offset;
        self.scroll_log.push(offset);
    }

    fn center_on(&mut self, id: &str) {
        let Some(rect) = self.node_rects.get(id) else {
            return;
        };
        let center = rect.center();
        let half = Point::new(self.viewport.width / 2.0, self.viewport.height / 2.0).unscale(self.zoom);
        self.scroll = center - half;
        self.centered.push(id.to_string());
    }

    fn hit_test(&self, point: Point) -> Option<ElementRef> {
        let floating = self
            .floating
            .keys()
            .rev()
            .find(|h| self.floating_rect(**h).is_some_and(|r| r.contains(point)));
        if let Some(handle) = floating {
            return Some(ElementRef::Floating(*handle));
        }
        self.node_rects
            .iter()
            .find(|(_, r)| self.to_screen(**r).contains(point))
            .map(|(id, _)| ElementRef::TreeNode(id.clone()))
    }

    fn rendered_html(&self) -> String {
        let mut html = String::from("<jmnodes>");
        for id in self.node_rects.keys() {
            html.push_str(&format!("<jmnode nodeid=\"{id}\"></jmnode>"));
        }
        html.push_str("</jmnodes>");
        html
    }

    fn mount_floating(&mut self, id: &str, label: &str, position: Point) -> ElementHandle {
        let handle = ElementHandle(self.next_handle);
        self.next_handle += 1;
        self.floating.insert(
            handle,
            FloatingElement {
                id: id.to_string(),
                label: label.to_string(),
                position,
            },
        );
        handle
    }

    fn unmount_floating(&mut self, handle: ElementHandle) {
        self.floating.remove(&handle);
        self.highlights.remove(&ElementRef::Floating(handle));
    }

    fn place_floating(&mut self, handle: ElementHandle, position: Point) {
        if let Some(el) = self.floating.get_mut(&handle) {
            el.position = position;
        }
    }

    fn set_floating_label(&mut self, handle: ElementHandle, label: &str) {
        if let Some(el) = self.floating.get_mut(&handle) {
            el.label = label.to_string();
        }
    }

    fn set_highlight(&mut self, target: &ElementRef, on: bool) {
        if on {
            self.highlights.insert(target.clone());
        } else {
            self.highlights.remove(target);
        }
    }

    fn mark_linked(&mut self, id: &str, linked: bool) {
        if linked {
            self.linked.insert(id.to_string());
        } else {
            self.linked.remove(id);
        }
    }

    fn open_editor(&mut self, target: &ElementRef, text: &str) {
        self.editor = Some((target.clone(), text.to_string()));
    }

    fn sync_editor(&mut self, text: &str) {
        if let Some((_, current)) = self.editor.as_mut() {
            *current = text.to_string();
        }
    }

    fn close_editor(&mut self) {
        self.editor = None;
    }
}
