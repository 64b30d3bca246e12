//! Input decoding and the text widgets drawn into panes.
//!
//! - **keymapper**: telnet prefilter and escape-sequence scanner producing `Key`s
//! - **line_editor**: single-line input with horizontal scrolling
//! - **backscroller**: bounded scrollback with page up/down

pub mod backscroller;
pub mod keymapper;
pub mod line_editor;

pub use backscroller::Backscroller;
pub use keymapper::{Key, KeyDecoder};
pub use line_editor::{EditorSettings, LineEditor};
