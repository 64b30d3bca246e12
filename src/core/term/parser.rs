//! ANSI emulator
//!
//! Replays the bytes we write to the wire and keeps `EmulatorState` in step
//! with the real terminal. Pure state machine, no I/O.

use unicode_width::UnicodeWidthChar;

use super::state::{Attributes, CursorState, EmulatorState};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ParserState {
    #[default]
    Ground,
    /// ESC seen
    Escape,
    /// ESC [ seen, no parameter bytes yet
    CsiEntry,
    /// Inside the numeric parameter list
    CsiParam,
}

/// Cursor/attribute tracking state machine
#[derive(Clone, Debug)]
pub struct AnsiEmulator {
    state: EmulatorState,
    parser: ParserState,
    /// Completed parameters; `None` marks an omitted argument
    params: Vec<Option<u16>>,
    current_param: Option<u16>,
    /// Bytes of a UTF-8 sequence still being collected
    utf8: Vec<u8>,
    utf8_len: usize,
}

impl AnsiEmulator {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            state: EmulatorState::new(rows, cols),
            parser: ParserState::Ground,
            params: Vec::with_capacity(8),
            current_param: None,
            utf8: Vec::with_capacity(4),
            utf8_len: 0,
        }
    }

    pub fn state(&self) -> &EmulatorState {
        &self.state
    }

    pub fn cursor(&self) -> &CursorState {
        &self.state.cursor
    }

    pub fn attributes(&self) -> Attributes {
        self.state.cursor.attrs
    }

    pub fn scroll_region(&self) -> Option<(u16, u16)> {
        self.state.scroll_region
    }

    /// (rows, cols)
    pub fn size(&self) -> (u16, u16) {
        (self.state.rows, self.state.cols)
    }

    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.state.resize(rows, cols);
    }

    /// Adopt a cursor position reported by the real terminal
    pub fn sync_cursor(&mut self, row: u16, col: u16) {
        self.state.cursor_position(row, col);
    }

    /// Whether a partially received escape sequence is pending
    pub fn in_sequence(&self) -> bool {
        self.parser != ParserState::Ground
    }

    pub fn feed_all(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.feed(byte);
        }
    }

    /// Feed a single byte
    pub fn feed(&mut self, byte: u8) {
        match self.parser {
            ParserState::Ground => self.ground(byte),
            ParserState::Escape => self.escape(byte),
            ParserState::CsiEntry | ParserState::CsiParam => self.csi(byte),
        }
    }

    fn enter_escape(&mut self) {
        self.parser = ParserState::Escape;
        self.params.clear();
        self.current_param = None;
    }

    fn ground(&mut self, byte: u8) {
        if self.utf8_len > 0 {
            if (0x80..=0xBF).contains(&byte) {
                self.utf8.push(byte);
                if self.utf8.len() == self.utf8_len {
                    self.finish_utf8();
                }
                return;
            }
            // Truncated sequence, the terminal shows one replacement glyph
            self.utf8.clear();
            self.utf8_len = 0;
            self.state.put_char();
        }

        match byte {
            0x1B => self.enter_escape(),
            b'\n' => self.state.linefeed(),
            b'\r' => self.state.carriage_return(),
            0x08 => self.state.backspace(),
            b'\t' => self.state.horizontal_tab(),
            // Other C0 controls and DEL don't move the cursor
            0x00..=0x1F | 0x7F => {}
            0xC2..=0xDF => self.start_utf8(byte, 2),
            0xE0..=0xEF => self.start_utf8(byte, 3),
            0xF0..=0xF4 => self.start_utf8(byte, 4),
            _ => self.state.put_char(),
        }
    }

    fn start_utf8(&mut self, lead: u8, len: usize) {
        self.utf8.clear();
        self.utf8.push(lead);
        self.utf8_len = len;
    }

    /// Advance by the display width of the collected character
    fn finish_utf8(&mut self) {
        let width = std::str::from_utf8(&self.utf8)
            .ok()
            .and_then(|text| text.chars().next())
            .map_or(1, |ch| ch.width().unwrap_or(0));
        for _ in 0..width {
            self.state.put_char();
        }
        self.utf8.clear();
        self.utf8_len = 0;
    }

    fn escape(&mut self, byte: u8) {
        if byte == b'[' {
            self.parser = ParserState::CsiEntry;
        } else {
            // Unsupported escape: the byte is swallowed
            self.parser = ParserState::Ground;
        }
    }

    fn csi(&mut self, byte: u8) {
        match byte {
            0x1B => self.enter_escape(),
            b'0'..=b'9' => {
                let digit = u16::from(byte - b'0');
                self.current_param = Some(
                    self.current_param
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
                self.parser = ParserState::CsiParam;
            }
            b';' => {
                self.params.push(self.current_param.take());
                self.parser = ParserState::CsiParam;
            }
            // C0 controls execute in the middle of a sequence
            b'\n' | b'\r' | 0x08 | b'\t' => self.ground(byte),
            // Private markers and intermediates: tolerated, no effect
            0x20..=0x3F => {}
            0x40..=0x7E => {
                if self.parser == ParserState::CsiParam {
                    self.params.push(self.current_param.take());
                }
                self.execute_csi(byte);
                self.parser = ParserState::Ground;
            }
            _ => {
                self.parser = ParserState::Ground;
            }
        }
    }

    fn param(&self, index: usize) -> Option<u16> {
        self.params.get(index).copied().flatten()
    }

    fn count(&self) -> u16 {
        self.param(0).unwrap_or(1).max(1)
    }

    fn execute_csi(&mut self, final_byte: u8) {
        match final_byte {
            b'H' | b'f' => {
                let row = self.param(0).unwrap_or(1);
                let col = self.param(1).unwrap_or(1);
                self.state.cursor_position(row, col);
            }
            b'm' => self.execute_sgr(),
            b'r' => {
                if self.params.iter().all(Option::is_none) {
                    self.state.reset_scroll_region();
                } else {
                    let top = self.param(0).unwrap_or(1);
                    let bottom = self.param(1).unwrap_or(self.state.rows);
                    self.state.set_scroll_region(top, bottom);
                }
            }
            b's' => self.state.save_cursor(),
            b'u' => self.state.restore_cursor(),
            b'A' => self.state.cursor_up(self.count()),
            b'B' => self.state.cursor_down(self.count()),
            b'C' => self.state.cursor_forward(self.count()),
            b'D' => self.state.cursor_backward(self.count()),
            // Erase line: no cursor motion
            b'K' => {}
            b'J' => self.state.erase_in_display(self.param(0).unwrap_or(0)),
            _ => {
                tracing::trace!(
                    params = ?self.params,
                    final_byte = ?(final_byte as char),
                    "untracked CSI"
                );
            }
        }
    }

    fn execute_sgr(&mut self) {
        let attrs = &mut self.state.cursor.attrs;
        if self.params.is_empty() {
            *attrs = Attributes::empty();
            return;
        }
        for param in &self.params {
            attrs.apply_sgr(param.unwrap_or(0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emulator() -> AnsiEmulator {
        AnsiEmulator::new(24, 80)
    }

    fn position(emu: &AnsiEmulator) -> (u16, u16) {
        (emu.cursor().row, emu.cursor().col)
    }

    #[test]
    fn test_cursor_position_is_clamped() {
        let mut emu = AnsiEmulator::new(10, 20);
        for row in [0u16, 1, 5, 10, 11, 255, 999] {
            for col in [0u16, 1, 7, 20, 21, 255] {
                emu.feed_all(format!("\x1b[{};{}H", row, col).as_bytes());
                assert_eq!(position(&emu), (row.clamp(1, 10), col.clamp(1, 20)));
            }
        }
    }

    #[test]
    fn test_missing_arguments_default() {
        let mut emu = emulator();
        emu.feed_all(b"\x1b[5;10H");
        emu.feed_all(b"\x1b[;7H");
        assert_eq!(position(&emu), (1, 7));
        emu.feed_all(b"\x1b[H");
        assert_eq!(position(&emu), (1, 1));
    }

    #[test]
    fn test_f_positions_like_h() {
        let mut emu = emulator();
        emu.feed_all(b"\x1b[4;9f");
        assert_eq!(position(&emu), (4, 9));
        emu.feed_all(b"\x1b[f");
        assert_eq!(position(&emu), (1, 1));
    }

    #[test]
    fn test_deferred_wrap() {
        let mut emu = emulator();
        emu.feed_all(&[b'x'; 80]);
        assert_eq!(position(&emu), (1, 80));
        assert!(emu.cursor().pending_wrap);

        emu.feed(b'y');
        assert_eq!(position(&emu), (2, 2));
        assert!(!emu.cursor().pending_wrap);
    }

    #[test]
    fn test_utf8_advances_by_display_width() {
        let mut emu = emulator();
        emu.feed_all("é".as_bytes());
        assert_eq!(position(&emu), (1, 2));
        emu.feed_all("日本".as_bytes());
        assert_eq!(position(&emu), (1, 6));
        // Combining accent takes no column
        emu.feed_all("e\u{301}".as_bytes());
        assert_eq!(position(&emu), (1, 7));

        // Lead byte cut short by an escape still counts as one glyph
        emu.feed_all(b"\xe6\x1b[C");
        assert_eq!(position(&emu), (1, 9));
    }

    #[test]
    fn test_carriage_return_clears_pending_wrap() {
        let mut emu = emulator();
        emu.feed_all(&[b'x'; 80]);
        emu.feed(b'\r');
        emu.feed(b'y');
        assert_eq!(position(&emu), (1, 2));
    }

    #[test]
    fn test_backspace_stops_at_column_one() {
        let mut emu = emulator();
        emu.feed_all(b"ab\x08\x08\x08\x08");
        assert_eq!(position(&emu), (1, 1));
    }

    #[test]
    fn test_sgr_classes_are_independent() {
        let mut emu = emulator();
        emu.feed_all(b"\x1b[33;44;1m");
        emu.feed_all(b"\x1b[31m");
        assert_eq!(
            emu.attributes(),
            Attributes::BG_BLUE | Attributes::BRIGHT | Attributes::FG_RED
        );

        // Bright twice is the same as once
        emu.feed_all(b"\x1b[1m");
        assert_eq!(
            emu.attributes(),
            Attributes::BG_BLUE | Attributes::BRIGHT | Attributes::FG_RED
        );
    }

    #[test]
    fn test_sgr_embedded_reset() {
        let mut emu = emulator();
        emu.feed_all(b"\x1b[1;33m");
        emu.feed_all(b"\x1b[0;32;41m");
        assert_eq!(emu.attributes(), Attributes::FG_GREEN | Attributes::BG_RED);

        emu.feed_all(b"\x1b[m");
        assert_eq!(emu.attributes(), Attributes::empty());
    }

    #[test]
    fn test_linefeed_honors_region_from_inside() {
        let mut emu = emulator();
        emu.feed_all(b"\x1b[5;10r");
        assert_eq!(emu.scroll_region(), Some((5, 10)));

        emu.feed_all(b"\x1b[9;1H\n\n\n");
        assert_eq!(position(&emu), (10, 1));
    }

    #[test]
    fn test_linefeed_ignores_region_from_below() {
        let mut emu = emulator();
        emu.feed_all(b"\x1b[5;10r\x1b[12;1H\n\n");
        assert_eq!(position(&emu), (14, 1));

        emu.feed_all(b"\x1b[24;1H\n");
        assert_eq!(position(&emu), (24, 1));
    }

    #[test]
    fn test_single_row_region_is_ignored() {
        let mut emu = emulator();
        emu.feed_all(b"\x1b[5;10r\x1b[7;3H");
        emu.feed_all(b"\x1b[7;7r");
        assert_eq!(emu.scroll_region(), Some((5, 10)));
        assert_eq!(position(&emu), (7, 3));

        // Clamps to 24;24 on a 24 row terminal
        emu.feed_all(b"\x1b[30;40r");
        assert_eq!(emu.scroll_region(), Some((5, 10)));
    }

    #[test]
    fn test_region_reset() {
        let mut emu = emulator();
        emu.feed_all(b"\x1b[2;4r");
        emu.feed_all(b"\x1b[r");
        assert_eq!(emu.scroll_region(), None);
        assert_eq!(position(&emu), (1, 1));
    }

    #[test]
    fn test_relative_moves() {
        let mut emu = emulator();
        emu.feed_all(b"\x1b[10;10H\x1b[3A\x1b[C\x1b[2D\x1b[B");
        assert_eq!(position(&emu), (8, 9));

        emu.feed_all(b"\x1b[99A\x1b[99D");
        assert_eq!(position(&emu), (1, 1));
    }

    #[test]
    fn test_save_restore() {
        let mut emu = emulator();
        emu.feed_all(b"\x1b[7;12H\x1b[s\x1b[255;255H");
        assert_eq!(position(&emu), (24, 80));
        emu.feed_all(b"\x1b[u");
        assert_eq!(position(&emu), (7, 12));
    }

    #[test]
    fn test_erase_variants() {
        let mut emu = emulator();
        emu.feed_all(b"\x1b[5;5H\x1b[K\x1b[J\x1b[1J");
        assert_eq!(position(&emu), (5, 5));
        emu.feed_all(b"\x1b[2J");
        assert_eq!(position(&emu), (1, 1));
    }

    #[test]
    fn test_non_csi_escape_is_swallowed() {
        let mut emu = emulator();
        emu.feed_all(b"\x1b(ab");
        // '(' swallowed, "ab" printed
        assert_eq!(position(&emu), (1, 3));
        assert!(!emu.in_sequence());
    }

    #[test]
    fn test_private_sequences_have_no_effect() {
        let mut emu = emulator();
        emu.feed_all(b"\x1b[3;3H\x1b[?25l\x1b[6n");
        assert_eq!(position(&emu), (3, 3));
    }
}
