//! Buffered socket connection
//!
//! Owns one TCP stream and runs two background threads: a reader that
//! appends inbound bytes to a receive queue, and a writer that drains an
//! outbound queue. Callers only ever touch the queues, never the socket, so
//! no public operation holds the lock across a network call.

use std::io::{ErrorKind, Read, Write};
use std::mem;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::error::{Result, TermError};
use super::signal::Signal;

const READ_CHUNK: usize = 4096;

/// State shared with the background threads
#[derive(Debug, Default)]
struct Queues {
    rx: Vec<u8>,
    tx: Vec<u8>,
    /// Writer has taken a batch and is inside `write_all`
    writing: bool,
    /// Output paused by `suspend_output`
    suspended: bool,
    /// Sticky end-of-stream flag
    eof: bool,
}

#[derive(Debug, Default)]
struct Shared {
    queues: Mutex<Queues>,
    signal: Signal,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_eof(&self) {
        self.lock().eof = true;
        self.signal.notify();
    }
}

/// A duplex socket with background reader/writer threads
pub struct BufferedConnection {
    shared: Arc<Shared>,
    stream: TcpStream,
    peer: Option<SocketAddr>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl BufferedConnection {
    /// Take ownership of `stream` and start the I/O threads
    pub fn new(stream: TcpStream) -> Result<Self> {
        let peer = stream.peer_addr().ok();
        let shared = Arc::new(Shared::default());

        let reader_stream = stream.try_clone()?;
        let writer_stream = stream.try_clone()?;

        let reader = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("telpane-reader".to_string())
                .spawn(move || reader_loop(reader_stream, &shared))?
        };
        let spawned = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("telpane-writer".to_string())
                .spawn(move || writer_loop(writer_stream, &shared))
        };
        let writer = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                stop_io_threads(&shared, &stream, vec![reader]);
                return Err(e.into());
            }
        };

        tracing::debug!(?peer, "connection opened");

        Ok(Self {
            shared,
            stream,
            peer,
            threads: Mutex::new(vec![reader, writer]),
        })
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Queue bytes for the writer thread. Dropped silently after EOF.
    pub fn send_nonblocking(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut queues = self.shared.lock();
        if queues.eof {
            return;
        }
        queues.tx.extend_from_slice(bytes);
        drop(queues);
        self.shared.signal.notify();
    }

    /// Swap out everything received so far
    pub fn receive_nonblocking(&self) -> Vec<u8> {
        mem::take(&mut self.shared.lock().rx)
    }

    pub fn is_eof(&self) -> bool {
        self.shared.lock().eof
    }

    pub fn is_receive_ready(&self) -> bool {
        !self.shared.lock().rx.is_empty()
    }

    /// Block until inbound data is queued or EOF is reached
    pub fn wait_receive_ready(&self, timeout: Duration) -> Result<()> {
        let queues = self.shared.lock();
        let (_queues, ready) = self
            .shared
            .signal
            .wait_while(queues, timeout, |q| q.rx.is_empty() && !q.eof);
        if ready {
            Ok(())
        } else {
            Err(TermError::Timeout(timeout))
        }
    }

    /// Block until the writer has drained the outbound queue or EOF
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        let queues = self.shared.lock();
        let (_queues, drained) = self.shared.signal.wait_while(queues, timeout, |q| {
            (!q.tx.is_empty() || q.writing) && !q.eof
        });
        if drained {
            Ok(())
        } else {
            Err(TermError::Timeout(timeout))
        }
    }

    /// Pause or resume the writer without closing the connection
    pub fn suspend_output(&self, suspend: bool) {
        self.shared.lock().suspended = suspend;
        self.shared.signal.notify();
    }

    /// Stop both threads and close the socket. Safe to call repeatedly.
    pub fn close(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
            threads.drain(..).collect()
        };
        if !handles.is_empty() {
            tracing::debug!(peer = ?self.peer, "connection closed");
        }
        stop_io_threads(&self.shared, &self.stream, handles);
    }
}

/// Set EOF, shut the socket down and join the I/O threads
fn stop_io_threads(shared: &Shared, stream: &TcpStream, handles: Vec<JoinHandle<()>>) {
    shared.mark_eof();
    // Unblocks the reader's pending read
    let _ = stream.shutdown(Shutdown::Both);

    let current = thread::current().id();
    for handle in handles {
        if handle.thread().id() != current {
            let _ = handle.join();
        }
    }
}

impl Drop for BufferedConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn reader_loop(mut stream: TcpStream, shared: &Shared) {
    let mut buffer = vec![0u8; READ_CHUNK];

    loop {
        match stream.read(&mut buffer) {
            Ok(0) => {
                tracing::debug!("reader: peer closed");
                break;
            }
            Ok(n) => {
                let mut queues = shared.lock();
                if queues.eof {
                    break;
                }
                queues.rx.extend_from_slice(&buffer[..n]);
                drop(queues);
                shared.signal.notify();
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(error = %e, "reader: read failed");
                break;
            }
        }
    }

    shared.mark_eof();
}

fn writer_loop(mut stream: TcpStream, shared: &Shared) {
    loop {
        let queues = shared.lock();
        let mut queues = shared
            .signal
            .wait_forever(queues, |q| !q.eof && (q.tx.is_empty() || q.suspended));
        if queues.eof {
            break;
        }

        let batch = mem::take(&mut queues.tx);
        queues.writing = true;
        drop(queues);

        let result = stream.write_all(&batch).and_then(|()| stream.flush());

        let mut queues = shared.lock();
        queues.writing = false;
        if let Err(e) = result {
            tracing::debug!(error = %e, "writer: write failed");
            queues.eof = true;
        }
        drop(queues);
        shared.signal.notify();
    }
}

/// Connected loopback socket pair for tests
#[cfg(test)]
pub(crate) fn loopback_pair() -> (TcpStream, TcpStream) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();
    (server, client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_send_reaches_peer() {
        let (server, mut client) = loopback_pair();
        let conn = BufferedConnection::new(server).unwrap();

        conn.send_nonblocking(b"hello");
        conn.flush(Duration::from_secs(5)).unwrap();

        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_receive_swaps_buffer() {
        let (server, mut client) = loopback_pair();
        let conn = BufferedConnection::new(server).unwrap();

        client.write_all(b"abc").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut received = Vec::new();
        while received.len() < 3 && Instant::now() < deadline {
            conn.wait_receive_ready(Duration::from_secs(5)).unwrap();
            received.extend(conn.receive_nonblocking());
        }

        assert_eq!(received, b"abc");
        assert!(!conn.is_receive_ready());
        assert!(conn.receive_nonblocking().is_empty());
    }

    #[test]
    fn test_wait_times_out_without_data() {
        let (server, _client) = loopback_pair();
        let conn = BufferedConnection::new(server).unwrap();

        let err = conn.wait_receive_ready(Duration::from_millis(30)).unwrap_err();
        assert!(err.is_timeout());
        assert!(!conn.is_eof());
    }

    #[test]
    fn test_stop_io_threads_ends_reader() {
        let (server, mut client) = loopback_pair();
        let shared = Arc::new(Shared::default());
        let reader = {
            let shared = shared.clone();
            let stream = server.try_clone().unwrap();
            thread::spawn(move || reader_loop(stream, &shared))
        };

        stop_io_threads(&shared, &server, vec![reader]);
        assert!(shared.lock().eof);

        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_peer_close_sets_eof() {
        let (server, client) = loopback_pair();
        let conn = BufferedConnection::new(server).unwrap();

        drop(client);
        conn.wait_receive_ready(Duration::from_secs(5)).unwrap();
        assert!(conn.is_eof());

        // Sticky, and sends become no-ops
        conn.send_nonblocking(b"ignored");
        assert!(conn.is_eof());
        conn.flush(Duration::from_millis(10)).unwrap();
    }

    #[test]
    fn test_concurrent_sends_keep_order() {
        let (server, mut client) = loopback_pair();
        let conn = Arc::new(BufferedConnection::new(server).unwrap());

        let sender = conn.clone();
        let handle = thread::spawn(move || {
            for i in 0..2000u32 {
                sender.send_nonblocking(format!("{};", i).as_bytes());
            }
        });

        let expected: String = (0..2000u32).map(|i| format!("{};", i)).collect();
        let reader = thread::spawn(move || {
            let mut received = vec![0u8; expected.len()];
            client.read_exact(&mut received).unwrap();
            (received, expected)
        });

        handle.join().unwrap();
        conn.flush(Duration::from_secs(5)).unwrap();

        let (received, expected) = reader.join().unwrap();
        assert_eq!(String::from_utf8(received).unwrap(), expected);
    }

    #[test]
    fn test_close_wakes_blocked_waiter() {
        let (server, _client) = loopback_pair();
        let conn = Arc::new(BufferedConnection::new(server).unwrap());

        let waiter = conn.clone();
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let result = waiter.wait_receive_ready(Duration::from_secs(30));
            (result.is_ok(), waiter.is_eof(), start.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        conn.close();
        conn.close();

        let (ok, eof, elapsed) = handle.join().unwrap();
        assert!(ok);
        assert!(eof);
        assert!(elapsed < Duration::from_secs(10));
    }

    #[test]
    fn test_suspended_output_is_held() {
        let (server, mut client) = loopback_pair();
        let conn = BufferedConnection::new(server).unwrap();

        conn.suspend_output(true);
        conn.send_nonblocking(b"later");
        assert!(conn.flush(Duration::from_millis(50)).unwrap_err().is_timeout());

        conn.suspend_output(false);
        conn.flush(Duration::from_secs(5)).unwrap();

        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"later");
    }
}
