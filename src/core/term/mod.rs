//! VT100 subset emulation: terminal state and the byte-level parser.

pub mod parser;
pub mod state;

pub use parser::AnsiEmulator;
pub use state::{Attributes, Color, CursorState, EmulatorState, MAX_COORD};
