//! telpane - multi-pane text consoles for telnet clients
//!
//! A server accepts a raw TCP connection from a telnet client and drives the
//! client's VT100/ANSI terminal directly. The library keeps an emulated copy
//! of the remote cursor and attributes, carves the screen into scroll
//! regions, and provides a line editor and scrollback on top.
//!
//! - **core**: connection threads, the ANSI emulator, `TerminalIO`
//! - **wm**: scroll regions and the panes that render into them
//! - **ui**: key decoding, `LineEditor`, `Backscroller`
//! - **console**: the assembled per-client screen
//!
//! ```no_run
//! use std::net::TcpListener;
//! use telpane::{Config, Console};
//!
//! let config = Config::default();
//! let listener = TcpListener::bind(&config.listen)?;
//! let (stream, _) = listener.accept()?;
//! let mut console = Console::start(stream, &config)?;
//! console.print("hello");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod console;
pub mod core;
pub mod ui;
pub mod wm;

pub use config::Config;
pub use console::Console;
pub use crate::core::{BufferedConnection, Result, TermError, TerminalIO};
pub use wm::{PaneOps, WindowedTerminal};
