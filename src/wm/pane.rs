//! Pane - the output surface editors and scrollback render into
//!
//! `PaneOps` is the whole interface a pane offers. `RegionPane` implements it
//! on top of a `WindowedTerminal` region (activating the region before every
//! operation), `FullscreenPane` straight on a `TerminalIO`.

use super::manager::WindowedTerminal;
use super::region::RegionId;
use crate::core::term::Attributes;
use crate::core::TerminalIO;

/// Operations available on a pane. Coordinates are 1-based and relative to
/// the pane's top-left corner.
pub trait PaneOps {
    fn width(&self) -> u16;
    fn height(&self) -> u16;
    /// Pane-relative (row, col)
    fn cursor(&self) -> (u16, u16);

    fn print(&mut self, text: &str);
    fn set_cursor(&mut self, row: u16, col: u16);
    fn set_color(&mut self, attrs: Attributes);
    /// Erase the current row and return to column 1
    fn erase_line(&mut self);
    fn erase_to_eol(&mut self);
    /// Blank every row and home the cursor
    fn clear(&mut self);
    /// Blank from the current row to the bottom; the cursor stays on its row
    fn clear_down(&mut self);
    fn cursor_left(&mut self, n: u16);
    fn cursor_right(&mut self, n: u16);
    fn cursor_up(&mut self, n: u16);
    fn cursor_down(&mut self, n: u16);
    /// Step back one column and blank it
    fn backspace_rubout(&mut self);

    fn home(&mut self) {
        self.set_cursor(1, 1);
    }
}

/// Paint rows `from..=to` blank. A glyph is drawn first because some
/// terminals only apply the background color once something is printed.
fn paint_blank_rows(io: &mut TerminalIO, from: u16, to: u16) {
    for row in from..=to {
        io.move_to(row, 1);
        io.print(" ");
        io.erase_to_eol();
    }
}

/// A pane bound to one region of a `WindowedTerminal`
pub struct RegionPane<'a> {
    term: &'a mut WindowedTerminal,
    id: RegionId,
}

impl<'a> RegionPane<'a> {
    pub(crate) fn new(term: &'a mut WindowedTerminal, id: RegionId) -> Self {
        Self { term, id }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    /// Absolute (top, bottom) rows
    fn bounds(&self) -> (u16, u16) {
        let rows = self.term.size().0;
        self.term
            .region(self.id)
            .map_or((1, rows), |region| region.bounds(rows))
    }

    fn io(&mut self) -> &mut TerminalIO {
        self.term.activate(self.id);
        self.term.io_mut()
    }
}

impl PaneOps for RegionPane<'_> {
    fn width(&self) -> u16 {
        self.term.size().1
    }

    fn height(&self) -> u16 {
        let (top, bottom) = self.bounds();
        bottom - top + 1
    }

    fn cursor(&self) -> (u16, u16) {
        let (top, bottom) = self.bounds();
        let (row, col) = if self.term.active_region() == self.id {
            let cursor = self.term.io().cursor();
            (cursor.row, cursor.col)
        } else {
            self.term
                .region(self.id)
                .map_or((top, 1), |region| (region.saved_row, region.saved_col))
        };
        (row.clamp(top, bottom) - top + 1, col)
    }

    fn print(&mut self, text: &str) {
        self.io().print(text);
    }

    fn set_cursor(&mut self, row: u16, col: u16) {
        let (top, bottom) = self.bounds();
        let cols = self.width();
        let abs_row = top.saturating_add(row.max(1) - 1).min(bottom);
        self.io().move_to(abs_row, col.clamp(1, cols));
    }

    fn set_color(&mut self, attrs: Attributes) {
        self.io().set_attributes(attrs);
    }

    fn erase_line(&mut self) {
        self.io().erase_line();
    }

    fn erase_to_eol(&mut self) {
        self.io().erase_to_eol();
    }

    fn clear(&mut self) {
        let (top, bottom) = self.bounds();
        let io = self.io();
        paint_blank_rows(io, top, bottom);
        io.move_to(top, 1);
    }

    fn clear_down(&mut self) {
        let (_, bottom) = self.bounds();
        let io = self.io();
        let row = io.cursor().row;
        paint_blank_rows(io, row, bottom);
        io.move_to(row, 1);
    }

    fn cursor_left(&mut self, n: u16) {
        self.io().cursor_left(n);
    }

    fn cursor_right(&mut self, n: u16) {
        self.io().cursor_right(n);
    }

    fn cursor_up(&mut self, n: u16) {
        self.io().cursor_up(n);
    }

    fn cursor_down(&mut self, n: u16) {
        self.io().cursor_down(n);
    }

    fn backspace_rubout(&mut self) {
        self.io().backspace_rubout();
    }
}

/// Whole-terminal passthrough, used when windowing is unavailable
pub struct FullscreenPane<'a> {
    io: &'a mut TerminalIO,
}

impl<'a> FullscreenPane<'a> {
    pub fn new(io: &'a mut TerminalIO) -> Self {
        Self { io }
    }
}

impl PaneOps for FullscreenPane<'_> {
    fn width(&self) -> u16 {
        self.io.size().1
    }

    fn height(&self) -> u16 {
        self.io.size().0
    }

    fn cursor(&self) -> (u16, u16) {
        let cursor = self.io.cursor();
        (cursor.row, cursor.col)
    }

    fn print(&mut self, text: &str) {
        self.io.print(text);
    }

    fn set_cursor(&mut self, row: u16, col: u16) {
        self.io.move_to(row, col);
    }

    fn set_color(&mut self, attrs: Attributes) {
        self.io.set_attributes(attrs);
    }

    fn erase_line(&mut self) {
        self.io.erase_line();
    }

    fn erase_to_eol(&mut self) {
        self.io.erase_to_eol();
    }

    fn clear(&mut self) {
        let rows = self.height();
        paint_blank_rows(self.io, 1, rows);
        self.io.move_to(1, 1);
    }

    fn clear_down(&mut self) {
        let rows = self.height();
        let row = self.io.cursor().row;
        paint_blank_rows(self.io, row, rows);
        self.io.move_to(row, 1);
    }

    fn cursor_left(&mut self, n: u16) {
        self.io.cursor_left(n);
    }

    fn cursor_right(&mut self, n: u16) {
        self.io.cursor_right(n);
    }

    fn cursor_up(&mut self, n: u16) {
        self.io.cursor_up(n);
    }

    fn cursor_down(&mut self, n: u16) {
        self.io.cursor_down(n);
    }

    fn backspace_rubout(&mut self) {
        self.io.backspace_rubout();
    }
}
