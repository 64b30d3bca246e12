//! Window Manager - scroll regions multiplexed onto one remote terminal.
//!
//! - **region**: `ScrollRegion`, a row range with its own saved cursor
//! - **manager**: `WindowedTerminal`, owns the regions and switches between them
//! - **pane**: `PaneOps` and its region-backed and fullscreen implementations
//! - **layout**: row assignment for the console
//!
//! ```text
//! wm/
//! ├── mod.rs      - Module exports
//! ├── region.rs   - ScrollRegion
//! ├── manager.rs  - WindowedTerminal
//! ├── pane.rs     - PaneOps, RegionPane, FullscreenPane
//! └── layout.rs   - ConsoleLayout
//! ```

pub mod layout;
pub mod manager;
pub mod pane;
pub mod region;

pub use layout::ConsoleLayout;
pub use manager::WindowedTerminal;
pub use pane::{FullscreenPane, PaneOps, RegionPane};
pub use region::{RegionId, ScrollRegion, FULLSCREEN};
