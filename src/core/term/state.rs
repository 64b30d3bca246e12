//! Emulated terminal state
//!
//! Tracks what the remote terminal's cursor, colors and scroll region must be,
//! given every byte we have sent it. There is no screen buffer: only the
//! state needed to position output without asking the terminal.

use bitflags::bitflags;

/// Largest coordinate the model accepts; also the fullscreen region's bottom
pub const MAX_COORD: u16 = 255;

/// Tab stop interval
const TAB_WIDTH: u16 = 8;

/// The eight ANSI colors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
}

impl Color {
    pub const ALL: [Color; 8] = [
        Color::Black,
        Color::Red,
        Color::Green,
        Color::Yellow,
        Color::Blue,
        Color::Magenta,
        Color::Cyan,
        Color::White,
    ];

    pub fn from_index(n: u16) -> Option<Self> {
        Self::ALL.get(usize::from(n)).copied()
    }
}

bitflags! {
    /// Active rendition tags.
    ///
    /// Foreground colors are mutually exclusive with each other, as are
    /// background colors; `BRIGHT` is independent of both.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Attributes: u32 {
        const BRIGHT     = 1 << 0;

        const FG_BLACK   = 1 << 1;
        const FG_RED     = 1 << 2;
        const FG_GREEN   = 1 << 3;
        const FG_YELLOW  = 1 << 4;
        const FG_BLUE    = 1 << 5;
        const FG_MAGENTA = 1 << 6;
        const FG_CYAN    = 1 << 7;
        const FG_WHITE   = 1 << 8;

        const BG_BLACK   = 1 << 9;
        const BG_RED     = 1 << 10;
        const BG_GREEN   = 1 << 11;
        const BG_YELLOW  = 1 << 12;
        const BG_BLUE    = 1 << 13;
        const BG_MAGENTA = 1 << 14;
        const BG_CYAN    = 1 << 15;
        const BG_WHITE   = 1 << 16;
    }
}

impl Attributes {
    pub const FG_MASK: Self = Self::from_bits_retain(0xFF << 1);
    pub const BG_MASK: Self = Self::from_bits_retain(0xFF << 9);

    pub const fn fg(color: Color) -> Self {
        Self::from_bits_retain(1 << (1 + color as u32))
    }

    pub const fn bg(color: Color) -> Self {
        Self::from_bits_retain(1 << (9 + color as u32))
    }

    /// Replace any foreground color
    pub fn set_fg(&mut self, color: Color) {
        self.remove(Self::FG_MASK);
        self.insert(Self::fg(color));
    }

    /// Replace any background color
    pub fn set_bg(&mut self, color: Color) {
        self.remove(Self::BG_MASK);
        self.insert(Self::bg(color));
    }

    pub fn foreground(&self) -> Option<Color> {
        Color::ALL
            .iter()
            .copied()
            .find(|&c| self.contains(Self::fg(c)))
    }

    pub fn background(&self) -> Option<Color> {
        Color::ALL
            .iter()
            .copied()
            .find(|&c| self.contains(Self::bg(c)))
    }

    /// Apply one SGR parameter. Unknown codes are ignored.
    pub fn apply_sgr(&mut self, code: u16) {
        match code {
            0 => *self = Self::empty(),
            1 => self.insert(Self::BRIGHT),
            22 => self.remove(Self::BRIGHT),
            30..=37 => {
                if let Some(c) = Color::from_index(code - 30) {
                    self.set_fg(c);
                }
            }
            39 => self.remove(Self::FG_MASK),
            40..=47 => {
                if let Some(c) = Color::from_index(code - 40) {
                    self.set_bg(c);
                }
            }
            49 => self.remove(Self::BG_MASK),
            _ => {}
        }
    }

    /// SGR sequence that resets and then re-establishes exactly this set
    pub fn to_sgr(&self) -> Vec<u8> {
        let mut codes = vec![0u16];
        if self.contains(Self::BRIGHT) {
            codes.push(1);
        }
        if let Some(c) = self.foreground() {
            codes.push(30 + c as u16);
        }
        if let Some(c) = self.background() {
            codes.push(40 + c as u16);
        }
        let params: Vec<String> = codes.iter().map(u16::to_string).collect();
        format!("\x1b[{}m", params.join(";")).into_bytes()
    }
}

/// Cursor state (1-based coordinates)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorState {
    pub row: u16,
    pub col: u16,
    pub attrs: Attributes,
    /// Cursor hangs at the last column until the next printable byte
    pub pending_wrap: bool,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            row: 1,
            col: 1,
            attrs: Attributes::empty(),
            pending_wrap: false,
        }
    }
}

/// Model of the remote terminal
#[derive(Clone, Debug)]
pub struct EmulatorState {
    pub rows: u16,
    pub cols: u16,
    pub cursor: CursorState,
    /// Active scroll region (top, bottom), inclusive; `None` means fullscreen
    pub scroll_region: Option<(u16, u16)>,
    /// Position stored by `ESC [ s`
    pub saved: Option<(u16, u16)>,
}

impl EmulatorState {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows: rows.clamp(1, MAX_COORD),
            cols: cols.clamp(1, MAX_COORD),
            cursor: CursorState::default(),
            scroll_region: None,
            saved: None,
        }
    }

    /// Adopt a new terminal size, re-clamping cursor and region
    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.rows = rows.clamp(1, MAX_COORD);
        self.cols = cols.clamp(1, MAX_COORD);
        self.cursor.row = self.cursor.row.clamp(1, self.rows);
        self.cursor.col = self.cursor.col.clamp(1, self.cols);
        if let Some((top, bottom)) = self.scroll_region {
            let top = top.min(self.rows);
            let bottom = bottom.min(self.rows);
            self.scroll_region = if top < bottom { Some((top, bottom)) } else { None };
        }
    }

    /// Bottom row a downward move may reach from `row`.
    ///
    /// The region only applies while the cursor is not below it.
    fn lower_bound_for(&self, row: u16) -> u16 {
        match self.scroll_region {
            Some((_, bottom)) if row <= bottom => bottom,
            _ => self.rows,
        }
    }

    /// Top row an upward move may reach from `row`
    fn upper_bound_for(&self, row: u16) -> u16 {
        match self.scroll_region {
            Some((top, bottom)) if row >= top && row <= bottom => top,
            _ => 1,
        }
    }

    /// Printable byte
    pub fn put_char(&mut self) {
        if self.cursor.pending_wrap {
            self.cursor.pending_wrap = false;
            self.advance_row();
            // The wrapped glyph lands in column 1
            self.cursor.col = 2.min(self.cols);
            if self.cols == 1 {
                self.cursor.pending_wrap = true;
            }
            return;
        }

        if self.cursor.col < self.cols {
            self.cursor.col += 1;
        } else {
            self.cursor.pending_wrap = true;
        }
    }

    fn advance_row(&mut self) {
        let limit = self.lower_bound_for(self.cursor.row);
        self.cursor.row = (self.cursor.row + 1).min(limit);
    }

    pub fn linefeed(&mut self) {
        self.advance_row();
        self.cursor.pending_wrap = false;
    }

    pub fn carriage_return(&mut self) {
        self.cursor.col = 1;
        self.cursor.pending_wrap = false;
    }

    pub fn backspace(&mut self) {
        self.cursor.col = self.cursor.col.saturating_sub(1).max(1);
        self.cursor.pending_wrap = false;
    }

    pub fn horizontal_tab(&mut self) {
        let next = ((self.cursor.col - 1) / TAB_WIDTH + 1) * TAB_WIDTH + 1;
        self.cursor.col = next.min(self.cols);
        self.cursor.pending_wrap = false;
    }

    /// Absolute position (1-based), clamped to the terminal
    pub fn cursor_position(&mut self, row: u16, col: u16) {
        self.cursor.row = row.clamp(1, self.rows);
        self.cursor.col = col.clamp(1, self.cols);
        self.cursor.pending_wrap = false;
    }

    pub fn cursor_up(&mut self, n: u16) {
        let limit = self.upper_bound_for(self.cursor.row);
        self.cursor.row = self.cursor.row.saturating_sub(n).max(limit);
        self.cursor.pending_wrap = false;
    }

    pub fn cursor_down(&mut self, n: u16) {
        let limit = self.lower_bound_for(self.cursor.row);
        self.cursor.row = self.cursor.row.saturating_add(n).min(limit);
        self.cursor.pending_wrap = false;
    }

    pub fn cursor_forward(&mut self, n: u16) {
        self.cursor.col = self.cursor.col.saturating_add(n).min(self.cols);
        self.cursor.pending_wrap = false;
    }

    pub fn cursor_backward(&mut self, n: u16) {
        self.cursor.col = self.cursor.col.saturating_sub(n).max(1);
        self.cursor.pending_wrap = false;
    }

    /// Set the scroll region (1-based, inclusive). Homes the cursor like
    /// DECSTBM does. A range that clamps to fewer than two rows is ignored,
    /// as real terminals ignore it.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let top = top.clamp(1, self.rows);
        let bottom = bottom.clamp(1, self.rows);
        if top >= bottom {
            return;
        }
        self.scroll_region = if top == 1 && bottom == self.rows {
            None
        } else {
            Some((top, bottom))
        };
        self.cursor_position(1, 1);
    }

    pub fn reset_scroll_region(&mut self) {
        self.scroll_region = None;
        self.cursor_position(1, 1);
    }

    pub fn save_cursor(&mut self) {
        self.saved = Some((self.cursor.row, self.cursor.col));
    }

    pub fn restore_cursor(&mut self) {
        if let Some((row, col)) = self.saved {
            self.cursor_position(row, col);
        }
    }

    /// Erase in display; only "entire screen" moves the cursor
    pub fn erase_in_display(&mut self, mode: u16) {
        if mode == 2 {
            self.cursor_position(1, 1);
        }
    }
}
