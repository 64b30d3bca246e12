//! Terminal I/O facade
//!
//! Wraps a `BufferedConnection` and an `AnsiEmulator`. Every outgoing byte is
//! replayed through the emulator before it is queued, so the emulator always
//! describes what was actually transmitted. Inbound bytes go through the
//! `KeyDecoder`; cursor position reports are consumed here to answer
//! `ask_cursor_position`/`ask_terminal_size`.

use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use super::connection::BufferedConnection;
use super::error::{Result, TermError};
use super::term::{AnsiEmulator, Attributes, CursorState, MAX_COORD};
use crate::ui::keymapper::{Key, KeyDecoder};

/// WILL ECHO, DO SUPPRESS-GO-AHEAD, DO LINEMODE
pub const NEGOTIATION: [u8; 9] = [255, 251, 1, 255, 253, 3, 255, 253, 34];

/// Timing and sizing knobs for a `TerminalIO`
#[derive(Debug, Clone)]
pub struct TerminalSettings {
    /// Bound on `ask_cursor_position`/`ask_terminal_size`
    pub ask_timeout: Duration,
    /// Wait before discarding the client's negotiation replies
    pub negotiate_settle: Duration,
    pub flush_timeout: Duration,
    /// Size assumed until the terminal answers a size query
    pub default_rows: u16,
    pub default_cols: u16,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            ask_timeout: Duration::from_secs(3),
            negotiate_settle: Duration::from_millis(250),
            flush_timeout: Duration::from_secs(1),
            default_rows: 24,
            default_cols: 80,
        }
    }
}

/// A remote terminal reached over a socket
pub struct TerminalIO {
    conn: BufferedConnection,
    emulator: AnsiEmulator,
    decoder: KeyDecoder,
    /// Decoded input not yet handed to the caller
    inbox: Vec<u8>,
    awaiting_report: bool,
    last_report: Option<(u16, u16)>,
    settings: TerminalSettings,
}

impl TerminalIO {
    pub fn new(stream: TcpStream, settings: TerminalSettings) -> Result<Self> {
        Ok(Self::with_connection(BufferedConnection::new(stream)?, settings))
    }

    pub fn with_connection(conn: BufferedConnection, settings: TerminalSettings) -> Self {
        Self {
            conn,
            emulator: AnsiEmulator::new(settings.default_rows, settings.default_cols),
            decoder: KeyDecoder::new(),
            inbox: Vec::new(),
            awaiting_report: false,
            last_report: None,
            settings,
        }
    }

    pub fn connection(&self) -> &BufferedConnection {
        &self.conn
    }

    pub fn emulator(&self) -> &AnsiEmulator {
        &self.emulator
    }

    pub fn cursor(&self) -> &CursorState {
        self.emulator.cursor()
    }

    /// Cached (rows, cols)
    pub fn size(&self) -> (u16, u16) {
        self.emulator.size()
    }

    pub fn settings(&self) -> &TerminalSettings {
        &self.settings
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_eof()
    }

    pub fn close(&mut self) {
        self.conn.close();
    }

    /// Coax a line-buffered telnet client into character mode. Whatever the
    /// client answers within the settle delay is discarded unparsed.
    pub fn negotiate(&mut self) {
        // Telnet commands are not display bytes; the emulator never sees them
        self.conn.send_nonblocking(&NEGOTIATION);
        thread::sleep(self.settings.negotiate_settle);
        let discarded = self.conn.receive_nonblocking();
        tracing::debug!(discarded = discarded.len(), "telnet negotiation settled");
    }

    // ---- Output ----

    /// Mirror `bytes` through the emulator and queue them. No-op once closed.
    pub fn send(&mut self, bytes: &[u8]) {
        if bytes.is_empty() || self.conn.is_eof() {
            return;
        }
        self.emulator.feed_all(bytes);
        self.conn.send_nonblocking(bytes);
    }

    pub fn print(&mut self, text: &str) {
        self.send(text.as_bytes());
    }

    /// Absolute move (1-based)
    pub fn move_to(&mut self, row: u16, col: u16) {
        self.send(format!("\x1b[{};{}H", row, col).as_bytes());
    }

    pub fn cursor_up(&mut self, n: u16) {
        self.relative_move(n, b'A');
    }

    pub fn cursor_down(&mut self, n: u16) {
        self.relative_move(n, b'B');
    }

    pub fn cursor_right(&mut self, n: u16) {
        self.relative_move(n, b'C');
    }

    pub fn cursor_left(&mut self, n: u16) {
        self.relative_move(n, b'D');
    }

    fn relative_move(&mut self, n: u16, final_byte: u8) {
        match n {
            0 => {}
            1 => self.send(&[0x1B, b'[', final_byte]),
            n => self.send(format!("\x1b[{}{}", n, final_byte as char).as_bytes()),
        }
    }

    /// Replace the active attributes with exactly `attrs`
    pub fn set_attributes(&mut self, attrs: Attributes) {
        self.send(&attrs.to_sgr());
    }

    pub fn erase_to_eol(&mut self) {
        self.send(b"\x1b[K");
    }

    /// Return to column 1 and erase the whole line
    pub fn erase_line(&mut self) {
        self.send(b"\r\x1b[K");
    }

    pub fn erase_screen(&mut self) {
        self.send(b"\x1b[2J");
    }

    pub fn backspace_rubout(&mut self) {
        self.send(b"\x08 \x08");
    }

    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        self.send(format!("\x1b[{};{}r", top, bottom).as_bytes());
    }

    pub fn reset_scroll_region(&mut self) {
        self.send(b"\x1b[r");
    }

    pub fn save_cursor(&mut self) {
        self.send(b"\x1b[s");
    }

    pub fn restore_cursor(&mut self) {
        self.send(b"\x1b[u");
    }

    pub fn suspend_output(&self, suspend: bool) {
        self.conn.suspend_output(suspend);
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.flush(self.settings.flush_timeout)
    }

    // ---- Input ----

    /// Decode everything the connection has received so far
    fn pump(&mut self) {
        let raw = self.conn.receive_nonblocking();
        if raw.is_empty() {
            return;
        }
        let decoded = self.decoder.decode(&raw);
        self.inbox.extend_from_slice(&decoded.bytes);
        for report in decoded.reports {
            if self.awaiting_report {
                self.awaiting_report = false;
                self.last_report = Some(report);
            } else {
                tracing::trace!(?report, "unsolicited cursor report dropped");
            }
        }
    }

    /// Non-blocking: decoded bytes, named keys as out-of-band values
    pub fn receive(&mut self) -> Vec<u8> {
        self.pump();
        std::mem::take(&mut self.inbox)
    }

    pub fn receive_keys(&mut self) -> Vec<Key> {
        self.receive().into_iter().map(Key::from_byte).collect()
    }

    pub fn is_receive_ready(&mut self) -> bool {
        self.pump();
        !self.inbox.is_empty()
    }

    /// Block until decoded input is available or the connection closes
    pub fn wait_receive_ready(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if !self.inbox.is_empty() || self.conn.is_eof() {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TermError::Timeout(timeout));
            }
            // Raw bytes may decode to nothing (a partial sequence), so loop
            if let Err(e) = self.conn.wait_receive_ready(deadline - now) {
                if !e.is_timeout() {
                    return Err(e);
                }
            }
        }
    }

    // ---- Queries ----

    /// Ask the real terminal where its cursor is, and adopt the answer
    pub fn ask_cursor_position(&mut self) -> Result<(u16, u16)> {
        let (row, col) = self.query_cursor()?;
        self.emulator.sync_cursor(row, col);
        Ok((row, col))
    }

    /// Ask the real terminal for its size by parking the cursor past the
    /// bottom-right corner and reading back where it was clamped to.
    pub fn ask_terminal_size(&mut self) -> Result<(u16, u16)> {
        self.save_cursor();
        self.move_to(MAX_COORD, MAX_COORD);
        let answer = self.query_cursor();
        self.restore_cursor();

        let (rows, cols) = answer?;
        self.emulator.resize(rows, cols);
        tracing::debug!(rows, cols, "terminal size");
        Ok((rows, cols))
    }

    /// Shared body of both queries; does not touch the emulator on failure
    fn query_cursor(&mut self) -> Result<(u16, u16)> {
        if self.conn.is_eof() {
            return Err(TermError::Closed);
        }

        self.send(b"\x1b[6n");
        self.awaiting_report = true;
        self.last_report = None;

        let timeout = self.settings.ask_timeout;
        let deadline = Instant::now() + timeout;

        loop {
            self.pump();
            if !self.awaiting_report {
                if let Some(report) = self.last_report {
                    return Ok(report);
                }
            }
            if self.conn.is_eof() {
                self.awaiting_report = false;
                return Err(TermError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                self.awaiting_report = false;
                tracing::warn!(?timeout, "terminal did not answer cursor query");
                return Err(TermError::Timeout(timeout));
            }
            if let Err(e) = self.conn.wait_receive_ready(deadline - now) {
                if !e.is_timeout() {
                    return Err(e);
                }
            }
        }
    }
}

/// Test double for the remote end: a thread that tracks what it receives
/// with its own emulator and answers cursor queries like a real terminal.
#[cfg(test)]
pub(crate) mod fake {
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::sync::{Arc, Mutex};
    use std::thread::{self, JoinHandle};

    use crate::core::term::AnsiEmulator;

    pub struct FakeTerminal {
        received: Arc<Mutex<Vec<u8>>>,
        handle: Option<JoinHandle<()>>,
    }

    impl FakeTerminal {
        pub fn spawn(mut stream: TcpStream, rows: u16, cols: u16) -> Self {
            let received = Arc::new(Mutex::new(Vec::new()));
            let log = received.clone();
            let handle = thread::spawn(move || {
                let mut emulator = AnsiEmulator::new(rows, cols);
                let mut window: Vec<u8> = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    let n = match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    for &byte in &buf[..n] {
                        log.lock().unwrap().push(byte);
                        emulator.feed(byte);
                        window.push(byte);
                        if window.len() > 4 {
                            window.remove(0);
                        }
                        if window == b"\x1b[6n" {
                            let cursor = emulator.cursor();
                            let report = format!("\x1b[{};{}R", cursor.row, cursor.col);
                            if stream.write_all(report.as_bytes()).is_err() {
                                return;
                            }
                        }
                    }
                }
            });
            Self {
                received,
                handle: Some(handle),
            }
        }

        pub fn received(&self) -> Vec<u8> {
            self.received.lock().unwrap().clone()
        }

        pub fn join(mut self) {
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection::loopback_pair;
    use std::io::{Read, Write};

    fn fast_settings() -> TerminalSettings {
        TerminalSettings {
            ask_timeout: Duration::from_millis(300),
            negotiate_settle: Duration::from_millis(200),
            flush_timeout: Duration::from_secs(5),
            ..TerminalSettings::default()
        }
    }

    #[test]
    fn test_output_is_mirrored() {
        let (server, mut client) = loopback_pair();
        let mut io = TerminalIO::new(server, fast_settings()).unwrap();

        io.move_to(3, 5);
        io.print("hello");
        assert_eq!((io.cursor().row, io.cursor().col), (3, 10));
        io.flush().unwrap();

        let expected = b"\x1b[3;5Hhello";
        let mut buf = vec![0u8; expected.len()];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(buf, expected.to_vec());
    }

    #[test]
    fn test_receive_keys() {
        let (server, mut client) = loopback_pair();
        let mut io = TerminalIO::new(server, fast_settings()).unwrap();

        client.write_all(b"ab\x1b[A\r\n").unwrap();

        let mut keys = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while keys.len() < 4 && Instant::now() < deadline {
            io.wait_receive_ready(Duration::from_secs(5)).unwrap();
            keys.extend(io.receive_keys());
        }
        assert_eq!(
            keys,
            vec![Key::Char(b'a'), Key::Char(b'b'), Key::Up, Key::Enter]
        );
    }

    #[test]
    fn test_ask_cursor_position() {
        let (server, client) = loopback_pair();
        let fake = fake::FakeTerminal::spawn(client, 40, 100);
        let mut io = TerminalIO::new(server, fast_settings()).unwrap();

        io.move_to(12, 34);
        assert_eq!(io.ask_cursor_position().unwrap(), (12, 34));

        io.close();
        fake.join();
    }

    #[test]
    fn test_ask_terminal_size() {
        let (server, client) = loopback_pair();
        let fake = fake::FakeTerminal::spawn(client, 40, 100);
        let mut io = TerminalIO::new(server, fast_settings()).unwrap();

        io.move_to(5, 6);
        assert_eq!(io.ask_terminal_size().unwrap(), (40, 100));
        assert_eq!(io.size(), (40, 100));
        assert_eq!((io.cursor().row, io.cursor().col), (5, 6));

        io.close();
        fake.join();
    }

    #[test]
    fn test_query_timeout_leaves_state() {
        let (server, _client) = loopback_pair();
        let mut io = TerminalIO::new(server, fast_settings()).unwrap();

        io.move_to(7, 8);
        let err = io.ask_terminal_size().unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(io.size(), (24, 80));
        assert_eq!((io.cursor().row, io.cursor().col), (7, 8));
    }

    #[test]
    fn test_keys_survive_query() {
        let (server, mut client) = loopback_pair();
        let mut io = TerminalIO::new(server, fast_settings()).unwrap();

        let responder = thread::spawn(move || {
            let mut buf = [0u8; 64];
            let _ = client.read(&mut buf).unwrap();
            client.write_all(b"x\x1b[2;3Ry").unwrap();
            client
        });

        assert_eq!(io.ask_cursor_position().unwrap(), (2, 3));
        let _client = responder.join().unwrap();
        assert_eq!(io.receive(), b"xy".to_vec());
    }

    #[test]
    fn test_negotiation_replies_discarded() {
        let (server, mut client) = loopback_pair();
        let mut io = TerminalIO::new(server, fast_settings()).unwrap();

        let peer = thread::spawn(move || {
            let mut buf = [0u8; NEGOTIATION.len()];
            client.read_exact(&mut buf).unwrap();
            client.write_all(&[255, 253, 1, 255, 251, 3]).unwrap();
            (buf, client)
        });

        io.negotiate();
        let (sent, _client) = peer.join().unwrap();
        assert_eq!(sent, NEGOTIATION);
        assert!(io.receive().is_empty());
        // Negotiation bytes are invisible to the emulator
        assert_eq!((io.cursor().row, io.cursor().col), (1, 1));
    }

    #[test]
    fn test_closed_terminal_is_inert() {
        let (server, client) = loopback_pair();
        let mut io = TerminalIO::new(server, fast_settings()).unwrap();

        drop(client);
        io.wait_receive_ready(Duration::from_secs(5)).unwrap();
        assert!(io.is_closed());

        io.print("ignored");
        assert_eq!((io.cursor().row, io.cursor().col), (1, 1));
        assert!(matches!(io.ask_cursor_position(), Err(TermError::Closed)));
        assert!(io.receive().is_empty());
    }
}
