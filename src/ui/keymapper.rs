//! Key decoding for terminal input
//!
//! Converts the raw byte stream a telnet client sends into logical keys.
//! Named keys travel through byte-oriented APIs as reserved out-of-band
//! values (0x80..=0xFF), so a decoded stream is still a `Vec<u8>`.

const ESC: u8 = 0x1B;

// Telnet command bytes
const IAC: u8 = 255;
const SB: u8 = 250;
const SE: u8 = 240;
const WILL: u8 = 251;
const DONT: u8 = 254;

/// Longest numeric argument accepted inside a key or report sequence
const MAX_DIGITS: u8 = 4;

/// A logical key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// Any byte without a named meaning
    Char(u8),
    Enter,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    /// Erase the whole input line (Ctrl-U)
    ClearLine,
    /// Function key F1..=F12
    F(u8),
}

impl Key {
    /// Out-of-band byte for named keys, the byte itself for `Char`
    pub fn to_byte(self) -> u8 {
        match self {
            Key::Char(b) => b,
            Key::Enter => 0x80,
            Key::Backspace => 0x81,
            Key::Delete => 0x82,
            Key::Up => 0x83,
            Key::Down => 0x84,
            Key::Right => 0x85,
            Key::Left => 0x86,
            Key::Home => 0x87,
            Key::End => 0x88,
            Key::PageUp => 0x89,
            Key::PageDown => 0x8A,
            Key::Insert => 0x8B,
            Key::ClearLine => 0x8C,
            Key::F(n) => 0x90 + n.clamp(1, 12),
        }
    }

    /// Inverse of `to_byte`, also naming the usual control bytes
    pub fn from_byte(byte: u8) -> Key {
        match byte {
            0x80 | b'\r' => Key::Enter,
            0x81 | 0x08 | 0x7F => Key::Backspace,
            0x82 | 0x04 => Key::Delete,
            0x83 => Key::Up,
            0x84 => Key::Down,
            0x85 => Key::Right,
            0x86 => Key::Left,
            0x87 => Key::Home,
            0x88 => Key::End,
            0x89 => Key::PageUp,
            0x8A => Key::PageDown,
            0x8B => Key::Insert,
            0x8C | 0x15 => Key::ClearLine,
            0x91..=0x9C => Key::F(byte - 0x90),
            _ => Key::Char(byte),
        }
    }

    /// Printable ASCII
    pub fn is_printable(self) -> bool {
        matches!(self, Key::Char(b) if (0x20..0x7F).contains(&b))
    }

    /// Key for the `N` of `ESC [ N ~`
    fn from_tilde_code(code: u16) -> Option<Key> {
        let key = match code {
            1 => Key::Insert,
            2 => Key::Home,
            3 => Key::PageUp,
            5 => Key::End,
            6 => Key::PageDown,
            11..=15 => Key::F((code - 10) as u8),
            17..=21 => Key::F((code - 11) as u8),
            23 => Key::F(11),
            24 => Key::F(12),
            _ => return None,
        };
        Some(key)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum TelnetState {
    #[default]
    Data,
    Iac,
    /// WILL/WONT/DO/DONT: one option byte follows
    Option,
    Subnegotiation,
    SubnegotiationIac,
}

/// First decoding stage: strips telnet commands, drops NUL, and folds
/// CR/LF variants into a single Enter.
#[derive(Clone, Debug, Default)]
pub struct InputFilter {
    telnet: TelnetState,
    last_was_cr: bool,
}

impl InputFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(&mut self, byte: u8) -> Option<u8> {
        match self.telnet {
            TelnetState::Data => {}
            TelnetState::Iac => {
                self.telnet = TelnetState::Data;
                match byte {
                    // Escaped 0xFF is data
                    IAC => return self.translate(IAC),
                    WILL..=DONT => self.telnet = TelnetState::Option,
                    SB => self.telnet = TelnetState::Subnegotiation,
                    _ => {}
                }
                return None;
            }
            TelnetState::Option => {
                self.telnet = TelnetState::Data;
                return None;
            }
            TelnetState::Subnegotiation => {
                if byte == IAC {
                    self.telnet = TelnetState::SubnegotiationIac;
                }
                return None;
            }
            TelnetState::SubnegotiationIac => {
                self.telnet = if byte == SE {
                    TelnetState::Data
                } else {
                    TelnetState::Subnegotiation
                };
                return None;
            }
        }

        if byte == IAC {
            self.telnet = TelnetState::Iac;
            return None;
        }
        self.translate(byte)
    }

    fn translate(&mut self, byte: u8) -> Option<u8> {
        match byte {
            0x00 => None,
            b'\r' => {
                self.last_was_cr = true;
                Some(Key::Enter.to_byte())
            }
            b'\n' => {
                let folded = self.last_was_cr;
                self.last_was_cr = false;
                if folded {
                    None
                } else {
                    Some(Key::Enter.to_byte())
                }
            }
            _ => {
                self.last_was_cr = false;
                Some(byte)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ScanState {
    #[default]
    Idle,
    /// ESC
    Escape,
    /// ESC [
    Bracket,
    /// ESC [ digits
    Number { value: u16, digits: u8 },
    /// ESC [ row ; digits
    ReportCol { row: u16, col: u16, digits: u8 },
}

/// Outcome of feeding one byte
#[derive(Clone, Debug, PartialEq, Eq)]
enum Step {
    /// Not part of any sequence
    Pass(u8),
    /// Valid prefix, need more bytes
    Pending,
    Key(Key),
    CursorReport(u16, u16),
    /// Cannot be a recognized sequence; bytes go through unmodified
    Reject,
}

/// Second decoding stage: a prefix automaton over inbound escape sequences.
///
/// Every byte either passes through, extends a still-ambiguous prefix, or
/// completes/rejects one. Rejected prefixes are flushed verbatim.
#[derive(Clone, Debug, Default)]
pub struct KeyScanner {
    state: ScanState,
    pending: Vec<u8>,
}

impl KeyScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a partial sequence is buffered
    pub fn is_pending(&self) -> bool {
        self.state != ScanState::Idle
    }

    /// Feed one byte. Decoded output is appended to `out`; a cursor
    /// position report is returned instead of being delivered.
    pub fn push(&mut self, byte: u8, out: &mut Vec<u8>) -> Option<(u16, u16)> {
        match self.step(byte) {
            Step::Pass(b) => out.push(b),
            Step::Pending => self.pending.push(byte),
            Step::Key(key) => {
                self.reset();
                out.push(key.to_byte());
            }
            Step::CursorReport(row, col) => {
                self.reset();
                return Some((row, col));
            }
            Step::Reject => {
                tracing::trace!(prefix = ?self.pending, byte, "rejected escape prefix");
                out.append(&mut self.pending);
                self.state = ScanState::Idle;
                if byte == ESC {
                    // A fresh sequence starts here
                    self.state = ScanState::Escape;
                    self.pending.push(byte);
                } else {
                    out.push(byte);
                }
            }
        }
        None
    }

    fn reset(&mut self) {
        self.state = ScanState::Idle;
        self.pending.clear();
    }

    fn step(&mut self, byte: u8) -> Step {
        let (next, step) = match (self.state, byte) {
            (ScanState::Idle, ESC) => (ScanState::Escape, Step::Pending),
            (ScanState::Idle, b) => (ScanState::Idle, Step::Pass(b)),

            (ScanState::Escape, b'[') => (ScanState::Bracket, Step::Pending),

            (ScanState::Bracket, b'A') => (ScanState::Idle, Step::Key(Key::Up)),
            (ScanState::Bracket, b'B') => (ScanState::Idle, Step::Key(Key::Down)),
            (ScanState::Bracket, b'C') => (ScanState::Idle, Step::Key(Key::Right)),
            (ScanState::Bracket, b'D') => (ScanState::Idle, Step::Key(Key::Left)),
            (ScanState::Bracket, b'0'..=b'9') => (
                ScanState::Number {
                    value: u16::from(byte - b'0'),
                    digits: 1,
                },
                Step::Pending,
            ),

            (ScanState::Number { value, digits }, b'0'..=b'9') if digits < MAX_DIGITS => (
                ScanState::Number {
                    value: value * 10 + u16::from(byte - b'0'),
                    digits: digits + 1,
                },
                Step::Pending,
            ),
            (ScanState::Number { value, .. }, b'~') => match Key::from_tilde_code(value) {
                Some(key) => (ScanState::Idle, Step::Key(key)),
                None => (ScanState::Idle, Step::Reject),
            },
            (ScanState::Number { value, .. }, b';') => (
                ScanState::ReportCol {
                    row: value,
                    col: 0,
                    digits: 0,
                },
                Step::Pending,
            ),

            (ScanState::ReportCol { row, col, digits }, b'0'..=b'9') if digits < MAX_DIGITS => (
                ScanState::ReportCol {
                    row,
                    col: col * 10 + u16::from(byte - b'0'),
                    digits: digits + 1,
                },
                Step::Pending,
            ),
            (ScanState::ReportCol { row, col, digits }, b'R') if digits > 0 => {
                (ScanState::Idle, Step::CursorReport(row, col))
            }

            _ => (ScanState::Idle, Step::Reject),
        };
        self.state = next;
        step
    }
}

/// Inbound bytes after both decoding stages
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Keys and raw bytes in arrival order
    pub bytes: Vec<u8>,
    /// Cursor position reports (row, col), consumed from the stream
    pub reports: Vec<(u16, u16)>,
}

/// Full inbound pipeline: `InputFilter` then `KeyScanner`
#[derive(Clone, Debug, Default)]
pub struct KeyDecoder {
    filter: InputFilter,
    scanner: KeyScanner,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, input: &[u8]) -> Decoded {
        let mut decoded = Decoded::default();
        for &byte in input {
            if let Some(byte) = self.filter.filter(byte) {
                if let Some(report) = self.scanner.push(byte, &mut decoded.bytes) {
                    decoded.reports.push(report);
                }
            }
        }
        decoded
    }

    pub fn is_pending(&self) -> bool {
        self.scanner.is_pending()
    }
}
