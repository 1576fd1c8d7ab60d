use ropey::Rope;

use super::cursor::{CursorState, Direction};

/// Scroll state for fields larger than their widget.
#[derive(Debug, Clone)]
pub struct Viewport {
    pub top_line: usize,
    pub left_col: usize,
    pub height: u16,
    /// Visible columns; 0 means lines are never clipped.
    pub width: u16,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            top_line: 0,
            left_col: 0,
            height: 8,
            width: 0,
        }
    }
}

/// An editable form field backed by a Rope.
///
/// Single-line fields ignore newlines, so pasted text stays on one line.
#[derive(Debug, Clone)]
pub struct TextField {
    rope: Rope,
    multiline: bool,
    pub cursor: CursorState,
    pub viewport: Viewport,
}

impl TextField {
    pub fn single_line() -> Self {
        Self::new(false)
    }

    pub fn multi_line() -> Self {
        Self::new(true)
    }

    fn new(multiline: bool) -> Self {
        Self {
            rope: Rope::new(),
            multiline,
            cursor: CursorState::default(),
            viewport: Viewport::default(),
        }
    }

    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Replace the whole content and put the cursor at its end.
    pub fn set_text(&mut self, text: &str) {
        let text = if self.multiline {
            text.to_string()
        } else {
            text.replace(['\r', '\n'], "")
        };
        self.rope = Rope::from_str(&text);

        let last_row = self.line_count().saturating_sub(1);
        let last_len = self.line_len(last_row);
        self.cursor.move_to(last_row, last_len);
        self.viewport.top_line = 0;
        self.viewport.left_col = 0;
        self.scroll_to_cursor();
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Text of a line without its line ending.
    pub fn line_text(&self, idx: usize) -> Option<String> {
        if idx >= self.rope.len_lines() {
            return None;
        }
        let mut s: String = self.rope.line(idx).chunks().collect();
        if s.ends_with('\n') {
            s.pop();
        }
        if s.ends_with('\r') {
            s.pop();
        }
        Some(s)
    }

    fn line_len(&self, idx: usize) -> usize {
        self.line_text(idx).map(|l| l.chars().count()).unwrap_or(0)
    }

    pub fn insert_char(&mut self, ch: char) {
        if ch == '\n' || ch == '\r' {
            self.insert_newline();
            return;
        }
        let idx = self.cursor_char_offset();
        self.rope.insert_char(idx, ch);
        self.cursor.col += 1;
        self.cursor.desired_col = self.cursor.col;
        self.scroll_to_cursor();
    }

    pub fn insert_newline(&mut self) {
        if !self.multiline {
            return;
        }
        let idx = self.cursor_char_offset();
        self.rope.insert_char(idx, '\n');
        self.cursor.move_to(self.cursor.row + 1, 0);
        self.scroll_to_cursor();
    }

    /// Backspace.
    pub fn delete_char_before(&mut self) {
        if self.cursor.col == 0 && self.cursor.row == 0 {
            return;
        }

        let idx = self.cursor_char_offset();
        if self.cursor.col == 0 {
            // join with previous line
            let prev_len = self.line_len(self.cursor.row - 1);
            self.rope.remove(idx - 1..idx);
            self.cursor.move_to(self.cursor.row - 1, prev_len);
        } else {
            self.rope.remove(idx - 1..idx);
            self.cursor.col -= 1;
            self.cursor.desired_col = self.cursor.col;
        }
        self.scroll_to_cursor();
    }

    /// Delete key.
    pub fn delete_char_at(&mut self) {
        let idx = self.cursor_char_offset();
        if idx < self.rope.len_chars() {
            self.rope.remove(idx..idx + 1);
        }
    }

    pub fn move_cursor(&mut self, dir: Direction) {
        match dir {
            Direction::Up => {
                if self.cursor.row > 0 {
                    self.cursor.row -= 1;
                    self.cursor.col = self.cursor.desired_col;
                }
            }
            Direction::Down => {
                if self.cursor.row < self.line_count().saturating_sub(1) {
                    self.cursor.row += 1;
                    self.cursor.col = self.cursor.desired_col;
                }
            }
            Direction::Left => {
                if self.cursor.col > 0 {
                    self.cursor.col -= 1;
                    self.cursor.desired_col = self.cursor.col;
                }
            }
            Direction::Right => {
                if self.cursor.col < self.line_len(self.cursor.row) {
                    self.cursor.col += 1;
                    self.cursor.desired_col = self.cursor.col;
                }
            }
            Direction::LineStart => {
                self.cursor.col = 0;
                self.cursor.desired_col = 0;
            }
            Direction::LineEnd => {
                let len = self.line_len(self.cursor.row);
                self.cursor.col = len;
                self.cursor.desired_col = len;
            }
        }
        self.clamp_cursor();
        self.scroll_to_cursor();
    }

    fn cursor_char_offset(&self) -> usize {
        self.rope.line_to_char(self.cursor.row) + self.cursor.col
    }

    fn clamp_cursor(&mut self) {
        let max_row = self.rope.len_lines().saturating_sub(1);
        self.cursor.row = self.cursor.row.min(max_row);
        self.cursor.col = self.cursor.col.min(self.line_len(self.cursor.row));
    }

    /// Keep the cursor inside the visible window.
    pub fn scroll_to_cursor(&mut self) {
        let height = (self.viewport.height as usize).max(1);

        if self.cursor.row < self.viewport.top_line {
            self.viewport.top_line = self.cursor.row;
        }
        if self.cursor.row >= self.viewport.top_line + height {
            self.viewport.top_line = self.cursor.row + 1 - height;
        }

        let width = self.viewport.width as usize;
        if width == 0 {
            self.viewport.left_col = 0;
            return;
        }
        if self.cursor.col < self.viewport.left_col {
            self.viewport.left_col = self.cursor.col;
        }
        if self.cursor.col >= self.viewport.left_col + width {
            self.viewport.left_col = self.cursor.col + 1 - width;
        }
    }

    /// Cursor position relative to the viewport's top-left corner.
    pub fn cursor_in_viewport(&self) -> (u16, u16) {
        let col = self.cursor.col.saturating_sub(self.viewport.left_col);
        let row = self.cursor.row.saturating_sub(self.viewport.top_line);
        (col as u16, row as u16)
    }

    /// Lines currently inside the viewport, clipped to its columns.
    pub fn visible_lines(&self) -> Vec<String> {
        let height = self.viewport.height as usize;
        let width = match self.viewport.width {
            0 => usize::MAX,
            w => w as usize,
        };
        let bottom = (self.viewport.top_line + height).min(self.line_count());
        (self.viewport.top_line..bottom)
            .map(|i| {
                self.line_text(i)
                    .unwrap_or_default()
                    .chars()
                    .skip(self.viewport.left_col)
                    .take(width)
                    .collect()
            })
            .collect()
    }
}
