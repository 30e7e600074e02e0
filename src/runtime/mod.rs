//! Single-threaded readiness runtime.
//!
//! One mio poll services both listeners and every accepted connection:
//! - `Reactor`: the event loop and per-port dispatch
//! - `ConnectionRegistry`: connections grouped by local port, sole owner of
//!   read interest
//! - `TransferBuffer`: the one read buffer, lent out per message
//! - `DispatchError`: per-channel failures, reported and absorbed

mod buffer;
mod connection;
mod error;
mod event_loop;
mod listener;
mod shutdown;
mod token;

pub(crate) use connection::{PortRole, ReadInterest};
pub(crate) use event_loop::Reactor;
pub(crate) use shutdown::install_signal_handlers;

use crate::config::Config;

/// Bind both ports and serve until SIGINT/SIGTERM.
pub fn run(config: Config) -> std::io::Result<()> {
    let mut reactor = Reactor::bind(&config)?;
    install_signal_handlers(reactor.shutdown_handle())?;
    reactor.run()
}
