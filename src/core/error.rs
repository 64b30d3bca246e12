//! Error taxonomy for the terminal stack.

use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TermError {
    /// A bounded wait expired before the condition was met
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The connection reached EOF (peer closed or I/O failure)
    #[error("Connection closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TermError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TermError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, TermError>;
