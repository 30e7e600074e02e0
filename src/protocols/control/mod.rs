//! Control protocol.
//!
//! Each readiness event's bytes are one command, decoded as UTF-8, trimmed
//! and compared case-insensitively:
//!
//! ```text
//! stop-read\n   -> no reply; every echo-port connection stops being read
//! START-READ    -> no reply; echo-port connections are read again
//! anything else -> "Supported commands:\nstop-read\nstart-read\n"
//! ```
//!
//! The handler never touches the poll itself. It returns a [`ControlAction`]
//! and the reactor applies it through the connection registry, which is the
//! only owner of interest state.

pub mod handler;
pub mod parser;

pub use handler::{handle, ControlAction};
