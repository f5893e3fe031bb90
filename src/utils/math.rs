//! Mathematical utility functions.

use crate::{Error, Result};

/// Converts a `usize` to `u16` for a fixed-width image field, returning a capacity error naming
/// `what` if the value exceeds `u16::MAX`.
///
/// # Errors
///
/// Returns [`Error::CapacityOverflow`] if `value` exceeds `u16::MAX`.
pub fn to_u16(value: usize, what: &'static str) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::CapacityOverflow {
        what,
        value: value as u64,
        limit: u64::from(u16::MAX),
    })
}

/// Converts a `usize` to `u8` for a fixed-width image field.
///
/// # Errors
///
/// Returns [`Error::CapacityOverflow`] if `value` exceeds `u8::MAX`.
pub fn to_u8(value: usize, what: &'static str) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::CapacityOverflow {
        what,
        value: value as u64,
        limit: u64::from(u8::MAX),
    })
}

/// Converts a `u64` to `u32` for image serialization.
///
/// # Errors
///
/// Returns [`Error::CapacityOverflow`] if `value` exceeds `u32::MAX`.
pub fn to_u32(value: u64, what: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::CapacityOverflow {
        what,
        value,
        limit: u64::from(u32::MAX),
    })
}

/// Checks that `id` fits below `limit` (exclusive upper bound of an ID space whose high bits are
/// used as tags) and returns it.
///
/// # Errors
///
/// Returns [`Error::CapacityOverflow`] if `id >= limit`.
pub fn check_id(id: usize, limit: u16, what: &'static str) -> Result<u16> {
    if id >= usize::from(limit) {
        return Err(Error::CapacityOverflow {
            what,
            value: id as u64,
            limit: u64::from(limit) - 1,
        });
    }

    to_u16(id, what)
}

/// Number of zero bytes needed to advance `position` to the next multiple of `alignment`.
///
/// `alignment` of 0 or 1 never requires padding.
#[must_use]
pub fn padding_for(position: u64, alignment: u64) -> usize {
    if alignment <= 1 {
        return 0;
    }

    #[allow(clippy::cast_possible_truncation)] // result < alignment, which is tiny
    {
        ((alignment - position % alignment) % alignment) as usize
    }
}
