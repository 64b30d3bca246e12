//! Console - one remote user's screen: scrolling output above, a
//! separator, and an editable input line at the bottom.
//!
//! ```text
//! 1 .. rows-2   output pane (Backscroller)
//! rows-1        separator  \  input region
//! rows          input line /  (LineEditor)
//! ```
//!
//! If the terminal never answers the size query the console runs
//! unwindowed: output is written straight to the screen and the input line
//! is redrawn on the bottom row after every print.

use std::collections::VecDeque;
use std::net::TcpStream;
use std::time::Duration;

use crate::config::Config;
use crate::core::term::{Attributes, Color};
use crate::core::{Result, TerminalIO};
use crate::ui::backscroller::Backscroller;
use crate::ui::keymapper::Key;
use crate::ui::line_editor::{EditorSettings, LineEditor};
use crate::wm::{ConsoleLayout, PaneOps, RegionId, WindowedTerminal, FULLSCREEN};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Windowed {
        layout: ConsoleLayout,
        output: RegionId,
        input: RegionId,
    },
    Plain,
}

pub struct Console {
    term: WindowedTerminal,
    mode: Mode,
    editor: LineEditor,
    scrollback: Backscroller,
    /// Keys received but not yet consumed by `read_line`
    pending: VecDeque<Key>,
}

impl Console {
    /// Negotiate with a freshly accepted client and lay out its screen
    pub fn start(stream: TcpStream, config: &Config) -> Result<Self> {
        let mut io = TerminalIO::new(stream, config.terminal_settings())?;
        io.negotiate();
        Ok(Self::with_terminal(
            io,
            &config.editor_settings(),
            config.backscroll.max_lines,
        ))
    }

    /// Build on an already negotiated terminal
    pub fn with_terminal(io: TerminalIO, editor: &EditorSettings, max_lines: usize) -> Self {
        let mut console = Self {
            term: WindowedTerminal::new(io),
            mode: Mode::Plain,
            editor: LineEditor::new(editor),
            scrollback: Backscroller::new(max_lines),
            pending: VecDeque::new(),
        };
        console.relayout();
        console
    }

    pub fn terminal(&self) -> &WindowedTerminal {
        &self.term
    }

    pub fn editor(&self) -> &LineEditor {
        &self.editor
    }

    pub fn scrollback(&self) -> &Backscroller {
        &self.scrollback
    }

    pub fn is_windowed(&self) -> bool {
        matches!(self.mode, Mode::Windowed { .. })
    }

    /// (rows, cols) as last learned from the terminal
    pub fn terminal_size(&self) -> (u16, u16) {
        self.term.size()
    }

    pub fn is_closed(&self) -> bool {
        self.term.io().is_closed()
    }

    /// Re-ask the terminal size and rebuild the layout. Returns whether the
    /// console ended up windowed.
    pub fn relayout(&mut self) -> bool {
        // Queries run with the scroll region reset
        self.term.activate(FULLSCREEN);

        let layout = match self.term.io_mut().ask_terminal_size() {
            Ok((rows, cols)) => {
                let layout = ConsoleLayout::compute(rows, cols);
                if layout.is_none() {
                    tracing::info!(rows, cols, "terminal too small for windowing");
                }
                layout
            }
            Err(e) => {
                tracing::warn!(error = %e, "size query failed, running unwindowed");
                None
            }
        };

        self.mode = match (self.mode, layout) {
            (Mode::Windowed { output, input, .. }, Some(layout)) => {
                self.term
                    .set_region_bounds(output, layout.output.0, layout.output.1);
                self.term.set_region_bounds(input, layout.separator, layout.input);
                Mode::Windowed {
                    layout,
                    output,
                    input,
                }
            }
            (Mode::Plain, Some(layout)) => {
                let output = self.term.create_region(layout.output.0, layout.output.1);
                let input = self.term.create_region(layout.separator, layout.input);
                Mode::Windowed {
                    layout,
                    output,
                    input,
                }
            }
            (Mode::Windowed { output, input, .. }, None) => {
                self.term.remove_region(output);
                self.term.remove_region(input);
                Mode::Plain
            }
            (Mode::Plain, None) => Mode::Plain,
        };

        self.repaint();
        self.is_windowed()
    }

    /// Redraw everything we own
    fn repaint(&mut self) {
        match self.mode {
            Mode::Windowed {
                layout,
                output,
                input,
            } => {
                if let Some(mut pane) = self.term.pane(output) {
                    self.scrollback.redraw(&mut pane);
                }
                if let Some(mut pane) = self.term.pane(input) {
                    pane.set_cursor(1, 1);
                    pane.set_color(Attributes::fg(Color::Blue) | Attributes::BRIGHT);
                    pane.print(&"-".repeat(layout.cols as usize));
                    pane.set_color(Attributes::empty());
                    self.editor.render(&mut pane);
                }
            }
            Mode::Plain => {
                let mut pane = self.term.passthrough();
                pane.clear();
                self.editor.render(&mut pane);
            }
        }
    }

    fn render_input(&mut self) {
        match self.mode {
            Mode::Windowed { input, .. } => {
                if let Some(mut pane) = self.term.pane(input) {
                    self.editor.render(&mut pane);
                }
            }
            Mode::Plain => {
                let mut pane = self.term.passthrough();
                self.editor.render(&mut pane);
            }
        }
    }

    /// Leave the visible cursor on the input line
    fn park_cursor(&mut self) {
        if let Mode::Windowed { input, .. } = self.mode {
            if let Some(mut pane) = self.term.pane(input) {
                self.editor.place_cursor(&mut pane);
            }
        }
    }

    /// Append text to the output pane. Lines are split on `\n`.
    pub fn print(&mut self, text: &str) {
        let lines: Vec<&str> = text.lines().collect();
        match self.mode {
            Mode::Windowed { output, .. } => {
                if let Some(mut pane) = self.term.pane(output) {
                    self.scrollback.append(lines, &mut pane);
                }
                self.park_cursor();
            }
            Mode::Plain => {
                let mut pane = self.term.passthrough();
                let bottom = pane.height();
                pane.set_cursor(bottom, 1);
                pane.erase_line();
                for line in lines {
                    pane.print(line);
                    pane.print("\r\n");
                }
                self.editor.render(&mut pane);
            }
        }
    }

    /// Blank the output pane and forget its scrollback
    pub fn clear_output(&mut self) {
        self.scrollback.clear();
        match self.mode {
            Mode::Windowed { output, .. } => {
                if let Some(mut pane) = self.term.pane(output) {
                    pane.clear();
                }
                self.park_cursor();
            }
            Mode::Plain => {
                let mut pane = self.term.passthrough();
                pane.clear();
                self.editor.render(&mut pane);
            }
        }
    }

    pub fn set_prompt(&mut self, prompt: &str) {
        self.editor.set_prompt_text(prompt);
        self.render_input();
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.editor.set_echo_enabled(echo);
        self.render_input();
    }

    /// Block until input is available, the connection closes, or `timeout`
    pub fn wait_input(&mut self, timeout: Duration) -> Result<()> {
        if !self.pending.is_empty() {
            return Ok(());
        }
        self.term.io_mut().wait_receive_ready(timeout)
    }

    /// Non-blocking. Feeds received keys to the editor and returns the line
    /// once Enter is seen.
    pub fn read_line(&mut self) -> Option<String> {
        self.pending.extend(self.term.io_mut().receive_keys());

        while let Some(key) = self.pending.pop_front() {
            match key {
                Key::Enter => {
                    let line = self.editor.take_line();
                    self.render_input();
                    return Some(line);
                }
                Key::PageUp | Key::PageDown => self.scroll(key),
                _ => self.edit(key),
            }
        }
        None
    }

    fn edit(&mut self, key: Key) {
        let handled = match self.mode {
            Mode::Windowed { input, .. } => match self.term.pane(input) {
                Some(mut pane) => self.editor.accept(key, &mut pane),
                None => false,
            },
            Mode::Plain => {
                let mut pane = self.term.passthrough();
                self.editor.accept(key, &mut pane)
            }
        };
        if !handled {
            tracing::trace!(?key, "key ignored");
        }
    }

    fn scroll(&mut self, key: Key) {
        let Mode::Windowed { output, .. } = self.mode else {
            return;
        };
        if let Some(mut pane) = self.term.pane(output) {
            if key == Key::PageUp {
                self.scrollback.page_up(&mut pane);
            } else {
                self.scrollback.page_down(&mut pane);
            }
        }
        self.park_cursor();
    }

    /// Restore the terminal to a plain screen and drop the connection
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.term.activate(FULLSCREEN);
        let bottom = self.term.size().0;
        let io = self.term.io_mut();
        io.move_to(bottom, 1);
        io.print("\r\n");
        if let Err(e) = io.flush() {
            tracing::debug!(error = %e, "flush on close failed");
        }
        io.close();
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.close();
    }
}
