//! Stopping the reactor.
//!
//! Two ways in: a [`ShutdownHandle`] triggered from another thread, or a
//! SIGINT/SIGTERM delivered to the process. Signals are collected by
//! `signal-hook` on a listener thread, which triggers the same handle, so
//! both paths wake the poll through its `mio::Waker`. The request is only
//! observed by the reactor between poll waits, so a handler in progress
//! always finishes.

use mio::{Registry, Waker};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

use super::token;

/// Clone-able handle that asks a running reactor to stop.
#[derive(Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    pub(crate) fn new(registry: &Registry) -> io::Result<Self> {
        Ok(Self {
            requested: Arc::new(AtomicBool::new(false)),
            waker: Arc::new(Waker::new(registry, token::WAKER)?),
        })
    }

    /// Request shutdown and wake the poll.
    pub fn trigger(&self) -> io::Result<()> {
        self.requested.store(true, Ordering::SeqCst);
        self.waker.wake()
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Trigger `handle` on the first SIGINT or SIGTERM.
///
/// Handlers are installed before this returns; waiting happens on a
/// dedicated thread so a signal is never missed while the reactor is busy
/// dispatching.
pub fn install_signal_handlers(handle: ShutdownHandle) -> io::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    thread::Builder::new()
        .name("signal-listener".into())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "Shutdown signal received");
                if let Err(e) = handle.trigger() {
                    warn!(error = %e, "Failed to wake reactor for shutdown");
                }
            }
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::{Events, Poll};
    use std::time::Duration;

    #[test]
    fn test_trigger_wakes_poll() {
        let mut poll = Poll::new().unwrap();
        let mut events = Events::with_capacity(8);
        let handle = ShutdownHandle::new(poll.registry()).unwrap();
        assert!(!handle.is_requested());

        let remote = handle.clone();
        std::thread::spawn(move || remote.trigger().unwrap());

        poll.poll(&mut events, Some(Duration::from_secs(5))).unwrap();
        assert!(events.iter().any(|e| e.token() == token::WAKER));
        assert!(handle.is_requested());
    }
}
