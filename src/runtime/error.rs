//! Per-channel failures and how they are reported.
//!
//! Nothing a single connection or listener does may stop the reactor. Every
//! failure is turned into a [`DispatchError`] at the point it happens and
//! handed to [`DispatchError::report`], which logs it with structured fields
//! and lets the cycle continue.

use std::io;
use thiserror::Error;
use tracing::warn;

/// A failure isolated to one channel.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("accept failed on port {port}")]
    Accept { port: u16, source: io::Error },
    #[error("read failed on port {port}")]
    Read { port: u16, source: io::Error },
    #[error("write failed on port {port}")]
    Write { port: u16, source: io::Error },
    #[error("interest change failed on port {port}")]
    Register { port: u16, source: io::Error },
}

impl DispatchError {
    /// Local port of the channel that failed.
    pub fn port(&self) -> u16 {
        match self {
            DispatchError::Accept { port, .. }
            | DispatchError::Read { port, .. }
            | DispatchError::Write { port, .. }
            | DispatchError::Register { port, .. } => *port,
        }
    }

    fn cause(&self) -> &io::Error {
        match self {
            DispatchError::Accept { source, .. }
            | DispatchError::Read { source, .. }
            | DispatchError::Write { source, .. }
            | DispatchError::Register { source, .. } => source,
        }
    }

    /// Log the failure. `conn_id` is absent for listener failures.
    pub fn report(&self, conn_id: Option<usize>) {
        warn!(
            port = self.port(),
            conn_id = ?conn_id,
            kind = ?self.cause().kind(),
            cause = %self.cause(),
            error = %self,
            "Channel failure"
        );
    }
}
