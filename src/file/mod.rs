//! Byte-level output primitives.
//!
//! - [`io`] - Endian-aware conversion of primitive values
//! - [`writer`] - Sequential writer with bounded back-patch reservations
//! - [`output`] - Memory-mapped file output with atomic finalization

pub mod io;
pub mod output;
pub mod writer;
