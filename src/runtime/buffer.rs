//! Reusable transfer buffer for the reactor.
//!
//! One fixed-capacity buffer is allocated up front and reused for every
//! read. Access follows a fill / flip / clear cursor discipline, but the
//! discipline is carried by the borrow checker instead of by convention:
//!
//! - [`TransferBuffer::fill`] performs one read and hands out a [`Message`]
//!   borrowing the buffer mutably, so no second fill can start while a
//!   message is alive.
//! - The `Message` derefs to exactly the readable range (the "flipped" view)
//!   and may be mutated in place.
//! - Dropping the `Message` clears the buffer for the next read.

use std::io::{self, Read};
use std::ops::{Deref, DerefMut};

/// Fixed-capacity byte buffer reused across read cycles.
pub struct TransferBuffer {
    /// Backing storage, allocated once.
    buf: Vec<u8>,
    /// Bytes filled by the last read; zero when clear.
    filled: usize,
}

/// Outcome of a single read into the buffer.
pub enum Fill<'a> {
    /// The peer closed its side of the stream.
    Eof,
    /// Bytes were read and are ready for a handler.
    Message(Message<'a>),
}

impl TransferBuffer {
    /// Allocate a buffer holding at most `capacity` bytes per read.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            filled: 0,
        }
    }

    /// Check that no message is currently held.
    pub fn is_clear(&self) -> bool {
        self.filled == 0
    }

    /// Issue one read from `reader` into the buffer.
    ///
    /// `WouldBlock` and other errors are returned unchanged; the buffer is
    /// left clear in every non-`Message` outcome.
    pub fn fill<R: Read>(&mut self, reader: &mut R) -> io::Result<Fill<'_>> {
        debug_assert!(self.is_clear(), "fill on a buffer holding a message");

        match reader.read(&mut self.buf) {
            Ok(0) => Ok(Fill::Eof),
            Ok(n) => {
                self.filled = n;
                Ok(Fill::Message(Message { owner: self }))
            }
            Err(e) => Err(e),
        }
    }
}

/// Readable view over the bytes delivered by one read.
///
/// Clears the owning buffer when dropped.
pub struct Message<'a> {
    owner: &'a mut TransferBuffer,
}

impl Deref for Message<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.owner.buf[..self.owner.filled]
    }
}

impl DerefMut for Message<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        let filled = self.owner.filled;
        &mut self.owner.buf[..filled]
    }
}

impl Drop for Message<'_> {
    fn drop(&mut self) {
        self.owner.filled = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_flip_clear() {
        let mut buffer = TransferBuffer::new(16);
        let mut input: &[u8] = b"hello";

        match buffer.fill(&mut input).unwrap() {
            Fill::Message(mut msg) => {
                assert_eq!(&*msg, b"hello");
                msg[0] = b'j';
                assert_eq!(&*msg, b"jello");
            }
            Fill::Eof => panic!("unexpected eof"),
        }

        assert!(buffer.is_clear());
        assert!(matches!(buffer.fill(&mut input).unwrap(), Fill::Eof));
    }

    #[test]
    fn test_read_is_bounded_by_capacity() {
        let mut buffer = TransferBuffer::new(4);
        let mut input: &[u8] = b"abcdefgh";

        for expected in [&b"abcd"[..], &b"efgh"[..]] {
            match buffer.fill(&mut input).unwrap() {
                Fill::Message(msg) => assert_eq!(&*msg, expected),
                Fill::Eof => panic!("unexpected eof"),
            }
        }
        assert!(buffer.is_clear());
    }

    #[test]
    fn test_error_leaves_buffer_clear() {
        struct Blocked;

        impl Read for Blocked {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::ErrorKind::WouldBlock.into())
            }
        }

        let mut buffer = TransferBuffer::new(8);
        let err = buffer.fill(&mut Blocked).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        assert!(buffer.is_clear());
    }
}
