//! Scroll region - a contiguous row range with its own saved cursor

use crate::core::term::{Attributes, CursorState, MAX_COORD};

/// Unique identifier for a region
pub type RegionId = u64;

/// The sentinel region covering the whole terminal
pub const FULLSCREEN: RegionId = 0;

/// A row range plus the cursor state to restore when it becomes active
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrollRegion {
    pub row_start: u16,
    pub row_end: u16,
    pub saved_row: u16,
    pub saved_col: u16,
    pub saved_attrs: Attributes,
    pub fullscreen: bool,
}

impl ScrollRegion {
    /// Region over rows `row_start..=row_end`, cursor parked at its top-left
    pub fn new(row_start: u16, row_end: u16) -> Self {
        let row_start = row_start.clamp(1, MAX_COORD);
        let row_end = row_end.clamp(row_start, MAX_COORD);
        Self {
            row_start,
            row_end,
            saved_row: row_start,
            saved_col: 1,
            saved_attrs: Attributes::empty(),
            fullscreen: false,
        }
    }

    /// Whole-terminal sentinel; the cursor starts on the bottom row
    pub fn fullscreen() -> Self {
        Self {
            row_start: 1,
            row_end: MAX_COORD,
            saved_row: MAX_COORD,
            saved_col: 1,
            saved_attrs: Attributes::empty(),
            fullscreen: true,
        }
    }

    /// Row bounds clipped to a terminal of `rows` rows
    pub fn bounds(&self, rows: u16) -> (u16, u16) {
        let top = self.row_start.min(rows);
        let bottom = self.row_end.clamp(top, rows.max(top));
        (top, bottom)
    }

    pub fn height(&self, rows: u16) -> u16 {
        let (top, bottom) = self.bounds(rows);
        bottom - top + 1
    }

    /// Record the outgoing cursor
    pub fn save(&mut self, cursor: &CursorState) {
        self.saved_row = cursor.row;
        self.saved_col = cursor.col;
        self.saved_attrs = cursor.attrs;
    }

    /// Saved position clamped into the region and the terminal
    pub fn restore_position(&self, rows: u16, cols: u16) -> (u16, u16) {
        let (top, bottom) = self.bounds(rows);
        (
            self.saved_row.clamp(top, bottom),
            self.saved_col.clamp(1, cols.max(1)),
        )
    }

    pub fn set_bounds(&mut self, row_start: u16, row_end: u16) {
        let row_start = row_start.clamp(1, MAX_COORD);
        self.row_start = row_start;
        self.row_end = row_end.clamp(row_start, MAX_COORD);
        self.saved_row = self.saved_row.clamp(self.row_start, self.row_end);
    }
}
