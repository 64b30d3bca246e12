//! Scrollback for one output pane
//!
//! Keeps a bounded log of display lines, already wrapped to the pane width
//! when they were appended, plus a page anchor. While live (no anchor) new
//! output scrolls the pane; PageUp/PageDown move the anchor and repaint.

use std::collections::VecDeque;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::wm::pane::PaneOps;

/// Default cap on retained display lines
pub const MAX_LINES: usize = 1000;

pub struct Backscroller {
    lines: VecDeque<String>,
    max_lines: usize,
    /// Index of the top line shown, `None` while following live output
    anchor: Option<usize>,
}

impl Default for Backscroller {
    fn default() -> Self {
        Self::new(MAX_LINES)
    }
}

impl Backscroller {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: max_lines.max(1),
            anchor: None,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    pub fn is_live(&self) -> bool {
        self.anchor.is_none()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Drop everything and return to live
    pub fn clear(&mut self) {
        self.lines.clear();
        self.anchor = None;
    }

    /// Wrap and store `raw_lines`. When live they are also written to the
    /// pane, scrolling it.
    pub fn append<I>(&mut self, raw_lines: I, pane: &mut dyn PaneOps)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let width = pane.width() as usize;
        let wrapped: Vec<String> = raw_lines
            .into_iter()
            .flat_map(|line| wrap_line(line.as_ref(), width))
            .collect();
        if wrapped.is_empty() {
            return;
        }

        self.lines.extend(wrapped.iter().cloned());
        let excess = self.lines.len().saturating_sub(self.max_lines);
        if excess > 0 {
            self.lines.drain(..excess);
            self.anchor = self.anchor.map(|anchor| anchor.saturating_sub(excess));
        }

        if self.is_live() {
            pane.set_cursor(pane.height(), 1);
            for line in &wrapped {
                pane.print("\r\n");
                pane.print(line);
            }
        }
    }

    fn page_step(rows: usize) -> usize {
        ((2 * rows + 1) / 3).max(1)
    }

    /// Move back two thirds of a page. No-op while everything fits.
    pub fn page_up(&mut self, pane: &mut dyn PaneOps) {
        let rows = pane.height() as usize;
        let total = self.lines.len();
        if total <= rows {
            return;
        }
        let top = self.anchor.unwrap_or(total - rows);
        self.anchor = Some(top.saturating_sub(Self::page_step(rows)));
        tracing::trace!(anchor = ?self.anchor, total, "scrollback page up");
        self.redraw(pane);
    }

    /// Move forward two thirds of a page, going live at the last page
    pub fn page_down(&mut self, pane: &mut dyn PaneOps) {
        let Some(top) = self.anchor else {
            return;
        };
        let rows = pane.height() as usize;
        let next = top + Self::page_step(rows);
        self.anchor = if next >= self.lines.len().saturating_sub(rows) {
            None
        } else {
            Some(next)
        };
        self.redraw(pane);
    }

    /// Repaint the pane from the log. Live output is bottom-aligned.
    pub fn redraw(&self, pane: &mut dyn PaneOps) {
        let rows = pane.height() as usize;
        let total = self.lines.len();
        let (start, first_row) = match self.anchor {
            Some(anchor) => (anchor, 1),
            None => {
                let shown = total.min(rows);
                (total - shown, rows - shown + 1)
            }
        };

        for row in 1..=rows {
            pane.set_cursor(row as u16, 1);
            pane.erase_line();
            if row < first_row {
                continue;
            }
            if let Some(line) = self.lines.get(start + row - first_row) {
                pane.print(line);
            }
        }
    }
}

/// Greedy word wrap to `width` display columns. Words wider than a row are
/// broken; tabs become spaces and other control characters are dropped.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let clean: String = line
        .chars()
        .map(|ch| if ch == '\t' { ' ' } else { ch })
        .filter(|ch| !ch.is_control())
        .collect();

    let mut rows = Vec::new();
    let mut current = String::new();
    let mut used = 0;
    // Nothing placed on the current row yet
    let mut fresh = true;

    for word in clean.split(' ') {
        let word_width = word.width();
        let gap = usize::from(!fresh);
        if used + gap + word_width <= width {
            if !fresh {
                current.push(' ');
            }
            current.push_str(word);
            used += gap + word_width;
            fresh = false;
            continue;
        }

        if !fresh {
            rows.push(std::mem::take(&mut current));
            used = 0;
        }

        for ch in word.chars() {
            let ch_width = ch.width().unwrap_or(0);
            if used + ch_width > width && !current.is_empty() {
                rows.push(std::mem::take(&mut current));
                used = 0;
            }
            current.push(ch);
            used += ch_width;
        }
        fresh = false;
    }

    rows.push(current);
    rows
}
