//! Core terminal components.
//!
//! This module contains the low-level pieces of a telnet console:
//!
//! - **signal**: wait/notify primitive shared by the connection threads
//! - **connection**: socket ownership with background reader/writer threads
//! - **term**: ANSI emulator tracking the remote cursor and attributes
//! - **terminal_io**: byte mirroring, key decoding and terminal queries
//!
//! # Architecture
//!
//! ```text
//! TerminalIO
//! ├── BufferedConnection (socket + reader/writer threads)
//! ├── AnsiEmulator (cursor, attributes, scroll region)
//! └── KeyScanner (inbound escape sequences -> keys)
//! ```

pub mod connection;
pub mod error;
pub mod signal;
pub mod term;
pub mod terminal_io;

pub use connection::BufferedConnection;
pub use error::{Result, TermError};
pub use terminal_io::TerminalIO;
