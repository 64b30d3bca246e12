//! Layout - splits the terminal into the console's output and input rows

/// Smallest terminal the windowed console can be laid out on
pub const MIN_ROWS: u16 = 4;

/// Row assignment for a windowed console.
///
/// ```text
/// 1 .. rows-2   output (scrolls)
/// rows-1        separator
/// rows          input line
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConsoleLayout {
    pub output: (u16, u16),
    pub separator: u16,
    pub input: u16,
    pub cols: u16,
}

impl ConsoleLayout {
    /// `None` when the terminal is too small to split
    pub fn compute(rows: u16, cols: u16) -> Option<Self> {
        if rows < MIN_ROWS || cols == 0 {
            return None;
        }
        Some(Self {
            output: (1, rows - 2),
            separator: rows - 1,
            input: rows,
            cols,
        })
    }

    pub fn output_height(&self) -> u16 {
        self.output.1 - self.output.0 + 1
    }
}
