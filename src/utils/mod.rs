//! Small helpers shared by the writer and the tables.

pub mod crc;
pub mod math;

pub use crc::crc32;
