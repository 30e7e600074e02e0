//! Port protocol implementations.
//!
//! Each listening port speaks one protocol, chosen by the local port a
//! connection was accepted on:
//! - `control`: text commands that switch reads on the echo port on and off
//! - `echo`: uppercases each received chunk and writes it back

pub mod control;
pub mod echo;
