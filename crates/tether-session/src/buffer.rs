#![forbid(unsafe_code)]

//! Grapheme-aware text buffer backing the inline label editor.
//!
//! The buffer holds plain text (line breaks as `'\n'`), a cursor measured in
//! grapheme clusters, and an optional selection anchor. Entering an edit
//! selects everything so the first keystroke replaces the old label.

use tether_core::event::{KeyCode, KeyEvent};
use unicode_segmentation::UnicodeSegmentation;

/// Editable plain text with cursor and selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditBuffer {
    value: String,
    /// Cursor position (grapheme index).
    cursor: usize,
    /// Selection anchor (grapheme index). Selection spans anchor..cursor.
    selection_anchor: Option<usize>,
}

impl EditBuffer {
    /// A buffer holding `text` with everything selected.
    #[must_use]
    pub fn selecting_all(text: impl Into<String>) -> Self {
        let mut buffer = Self {
            value: text.into(),
            cursor: 0,
            selection_anchor: None,
        };
        buffer.select_all();
        buffer
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cursor position (grapheme index).
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn selected_text(&self) -> Option<&str> {
        let anchor = self.selection_anchor?;
        let (start, end) = self.selection_range(anchor);
        let byte_start = self.grapheme_byte_offset(start);
        let byte_end = self.grapheme_byte_offset(end);
        Some(&self.value[byte_start..byte_end])
    }

    pub fn select_all(&mut self) {
        self.selection_anchor = Some(0);
        self.cursor = self.grapheme_count();
    }

    /// Insert text at the cursor, replacing the selection.
    pub fn insert_text(&mut self, text: &str) {
        let clean: String = text
            .replace("\r\n", "\n")
            .chars()
            .filter(|c| *c == '\n' || !c.is_control())
            .collect();
        if clean.is_empty() {
            return;
        }
        self.delete_selection();
        let byte_offset = self.grapheme_byte_offset(self.cursor);
        let old_count = self.grapheme_count();
        self.value.insert_str(byte_offset, &clean);
        let new_count = self.grapheme_count();
        self.cursor += new_count.saturating_sub(old_count);
    }

    /// Apply an editing key. Returns `true` if the buffer consumed it.
    ///
    /// Enter and Escape are not handled here; the arbiter owns them.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        let ctrl = key.command();
        let shift = key.shift();

        match key.code {
            KeyCode::Char('a' | 'A') if ctrl => {
                self.select_all();
                true
            }
            KeyCode::Char(c) if !ctrl => {
                let mut tmp = [0u8; 4];
                self.insert_text(c.encode_utf8(&mut tmp));
                true
            }
            KeyCode::Backspace => {
                if self.selection_anchor.is_some() {
                    self.delete_selection();
                } else {
                    self.delete_char_back();
                }
                true
            }
            KeyCode::Delete => {
                if self.selection_anchor.is_some() {
                    self.delete_selection();
                } else {
                    self.delete_char_forward();
                }
                true
            }
            KeyCode::Left => {
                if shift {
                    self.ensure_selection_anchor();
                    self.cursor = self.cursor.saturating_sub(1);
                } else if let Some(anchor) = self.selection_anchor.take() {
                    self.cursor = self.cursor.min(anchor);
                } else {
                    self.cursor = self.cursor.saturating_sub(1);
                }
                true
            }
            KeyCode::Right => {
                let count = self.grapheme_count();
                if shift {
                    self.ensure_selection_anchor();
                    self.cursor = (self.cursor + 1).min(count);
                } else if let Some(anchor) = self.selection_anchor.take() {
                    self.cursor = self.cursor.max(anchor);
                } else {
                    self.cursor = (self.cursor + 1).min(count);
                }
                true
            }
            KeyCode::Home => {
                if shift {
                    self.ensure_selection_anchor();
                } else {
                    self.selection_anchor = None;
                }
                self.cursor = 0;
                true
            }
            KeyCode::End => {
                if shift {
                    self.ensure_selection_anchor();
                } else {
                    self.selection_anchor = None;
                }
                self.cursor = self.grapheme_count();
                true
            }
            _ => false,
        }
    }

    fn delete_char_back(&mut self) {
        if self.cursor > 0 {
            let byte_start = self.grapheme_byte_offset(self.cursor - 1);
            let byte_end = self.grapheme_byte_offset(self.cursor);
            self.value.drain(byte_start..byte_end);
            self.cursor -= 1;
        }
    }

    fn delete_char_forward(&mut self) {
        if self.cursor < self.grapheme_count() {
            let byte_start = self.grapheme_byte_offset(self.cursor);
            let byte_end = self.grapheme_byte_offset(self.cursor + 1);
            self.value.drain(byte_start..byte_end);
        }
    }

    fn delete_selection(&mut self) {
        if let Some(anchor) = self.selection_anchor.take() {
            let (start, end) = self.selection_range(anchor);
            let byte_start = self.grapheme_byte_offset(start);
            let byte_end = self.grapheme_byte_offset(end);
            self.value.drain(byte_start..byte_end);
            self.cursor = start;
        }
    }

    fn ensure_selection_anchor(&mut self) {
        if self.selection_anchor.is_none() {
            self.selection_anchor = Some(self.cursor);
        }
    }

    fn selection_range(&self, anchor: usize) -> (usize, usize) {
        if anchor <= self.cursor {
            (anchor, self.cursor)
        } else {
            (self.cursor, anchor)
        }
    }

    fn grapheme_count(&self) -> usize {
        self.value.graphemes(true).count()
    }

    fn grapheme_byte_offset(&self, grapheme_idx: usize) -> usize {
        self.value
            .grapheme_indices(true)
            .nth(grapheme_idx)
            .map_or(self.value.len(), |(i, _)| i)
    }
}
