//! Single-line editor bound to a one-row pane
//!
//! The editor owns the text, the cursor index and the horizontal display
//! offset. It renders on the bottom row of whatever pane it is given.
//! When the cursor gets within `reposition_threshold` columns of either
//! edge the line is scrolled and repainted in full; every other edit is
//! repainted incrementally.

use crate::ui::keymapper::Key;
use crate::wm::pane::PaneOps;

/// Editor knobs, normally filled from the `[editor]` config section
#[derive(Debug, Clone)]
pub struct EditorSettings {
    /// Columns from either pane edge that trigger a horizontal scroll
    pub reposition_threshold: u16,
    pub prompt: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            reposition_threshold: 5,
            prompt: "> ".to_string(),
        }
    }
}

/// What an accepted key changed, and therefore what to repaint
enum Edit {
    Nothing,
    Moved,
    /// One character inserted just left of the cursor
    Inserted,
    /// Last character of the line removed
    Rubout,
    /// Everything from this text index onwards changed
    From(usize),
}

pub struct LineEditor {
    prompt: Vec<char>,
    text: Vec<char>,
    /// Insertion point, 0..=text.len()
    cursor_pos: usize,
    /// Index into prompt+text of the first visible character
    display_offset: usize,
    echo: bool,
    threshold: usize,
}

impl LineEditor {
    pub fn new(settings: &EditorSettings) -> Self {
        Self {
            prompt: settings.prompt.chars().collect(),
            text: Vec::new(),
            cursor_pos: 0,
            display_offset: 0,
            echo: true,
            threshold: settings.reposition_threshold as usize,
        }
    }

    pub fn prompt(&self) -> String {
        self.prompt.iter().collect()
    }

    pub fn text(&self) -> String {
        self.text.iter().collect()
    }

    pub fn cursor_pos(&self) -> usize {
        self.cursor_pos
    }

    pub fn display_offset(&self) -> usize {
        self.display_offset
    }

    pub fn is_echo_enabled(&self) -> bool {
        self.echo
    }

    pub fn set_prompt_text(&mut self, prompt: &str) {
        self.prompt = prompt.chars().collect();
    }

    /// Replace the buffer; the cursor is clipped to the new length
    pub fn set_line_text(&mut self, text: &str) {
        self.text = text.chars().collect();
        self.cursor_pos = self.cursor_pos.min(self.text.len());
    }

    /// With echo off only the prompt is ever drawn (password entry)
    pub fn set_echo_enabled(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Hand back the finished line and start a fresh one
    pub fn take_line(&mut self) -> String {
        let line = self.text();
        self.text.clear();
        self.cursor_pos = 0;
        self.display_offset = 0;
        line
    }

    /// Apply an editing key. Returns false for keys the editor doesn't handle.
    pub fn accept(&mut self, key: Key, pane: &mut dyn PaneOps) -> bool {
        let edit = match key {
            Key::Char(byte) if key.is_printable() => {
                self.text.insert(self.cursor_pos, char::from(byte));
                self.cursor_pos += 1;
                Edit::Inserted
            }
            Key::Backspace => {
                if self.cursor_pos == 0 {
                    Edit::Nothing
                } else {
                    self.cursor_pos -= 1;
                    self.text.remove(self.cursor_pos);
                    if self.cursor_pos == self.text.len() {
                        Edit::Rubout
                    } else {
                        Edit::From(self.cursor_pos)
                    }
                }
            }
            Key::Delete => {
                if self.cursor_pos < self.text.len() {
                    self.text.remove(self.cursor_pos);
                    Edit::From(self.cursor_pos)
                } else {
                    Edit::Nothing
                }
            }
            Key::Left => self.move_cursor_to(self.cursor_pos.saturating_sub(1)),
            Key::Right => self.move_cursor_to((self.cursor_pos + 1).min(self.text.len())),
            Key::Home => self.move_cursor_to(0),
            Key::End => self.move_cursor_to(self.text.len()),
            Key::ClearLine => {
                if self.text.is_empty() {
                    Edit::Nothing
                } else {
                    self.text.clear();
                    self.cursor_pos = 0;
                    Edit::From(0)
                }
            }
            _ => return false,
        };

        if !self.echo || matches!(edit, Edit::Nothing) {
            return true;
        }

        if self.reposition(pane.width()) {
            self.render(pane);
            return true;
        }

        match edit {
            Edit::Nothing => {}
            Edit::Moved => self.place_cursor(pane),
            Edit::Inserted => {
                if self.cursor_pos == self.text.len() {
                    let ch = self.text[self.cursor_pos - 1];
                    pane.print(ch.encode_utf8(&mut [0; 4]));
                } else {
                    self.repaint_from(self.cursor_pos - 1, pane);
                }
            }
            Edit::Rubout => pane.backspace_rubout(),
            Edit::From(index) => self.repaint_from(index, pane),
        }
        true
    }

    fn move_cursor_to(&mut self, pos: usize) -> Edit {
        if pos == self.cursor_pos {
            Edit::Nothing
        } else {
            self.cursor_pos = pos;
            Edit::Moved
        }
    }

    /// Full repaint of the editor row
    pub fn render(&mut self, pane: &mut dyn PaneOps) {
        let width = pane.width() as usize;
        let row = pane.height();

        if !self.echo {
            let shown: String = self.prompt.iter().take(width).collect();
            pane.set_cursor(row, 1);
            pane.erase_line();
            pane.print(&shown);
            self.place_cursor(pane);
            return;
        }

        self.reposition(width as u16);
        let visible = self.visible_from(self.display_offset, width);
        pane.set_cursor(row, 1);
        pane.print(&visible);
        if visible.chars().count() < width {
            pane.erase_to_eol();
        }
        self.place_cursor(pane);
    }

    /// Put the pane cursor where the editor cursor is
    pub fn place_cursor(&self, pane: &mut dyn PaneOps) {
        let width = pane.width();
        let row = pane.height();
        if !self.echo {
            pane.set_cursor(row, (self.prompt.len().min(width.saturating_sub(1) as usize) + 1) as u16);
            return;
        }
        let col = self.screen_column().max(0) as u16 + 1;
        pane.set_cursor(row, col.clamp(1, width.max(1)));
    }

    /// 0-based screen column of the cursor; negative when scrolled past
    fn screen_column(&self) -> isize {
        (self.prompt.len() + self.cursor_pos) as isize - self.display_offset as isize
    }

    /// Recompute the display offset when the cursor is near an edge.
    /// Returns true if the line must be repainted in full.
    fn reposition(&mut self, width: u16) -> bool {
        let width = width as isize;
        let threshold = self.threshold as isize;
        let column = self.screen_column();

        let target = if column > width - threshold {
            width / 3
        } else if column < threshold && self.display_offset > 0 {
            2 * width / 3
        } else {
            return false;
        };

        let absolute = (self.prompt.len() + self.cursor_pos) as isize;
        self.display_offset = (absolute - target).max(0) as usize;
        true
    }

    /// Visible part of prompt+text starting at `start`, up to the right edge
    fn visible_from(&self, start: usize, width: usize) -> String {
        let end = self.display_offset + width;
        self.prompt
            .iter()
            .chain(self.text.iter())
            .enumerate()
            .filter(|(index, _)| *index >= start && *index < end)
            .map(|(_, ch)| *ch)
            .collect()
    }

    /// Redraw from text index `index` to the end of the line
    fn repaint_from(&self, index: usize, pane: &mut dyn PaneOps) {
        let width = pane.width() as usize;
        let row = pane.height();
        let start = (self.prompt.len() + index).max(self.display_offset);
        let column = start - self.display_offset;

        let visible = self.visible_from(start, width);
        pane.set_cursor(row, column as u16 + 1);
        pane.print(&visible);
        if column + visible.chars().count() < width {
            pane.erase_to_eol();
        }
        self.place_cursor(pane);
    }
}
