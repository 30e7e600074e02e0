//! Echo protocol.
//!
//! No framing: whatever one read delivers is uppercased in place and written
//! straight back to the same connection, byte for byte.
//!
//! ```text
//! Request:  hello, world!\n
//! Response: HELLO, WORLD!\n
//! ```
//!
//! Bytes are case-folded as Latin-1 code points, so multi-byte UTF-8
//! sequences are not uppercased as characters.
//!
//! Whether a connection is read at all is decided by the control port; a
//! connection whose reads are disabled simply sits idle with its unread
//! bytes queued in the kernel.

pub mod handler;

pub use handler::handle;
