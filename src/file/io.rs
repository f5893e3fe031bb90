//! Endian-aware, bounds-checked conversion of primitive values to and from bytes.
//!
//! Every multi-byte value in an image is written in the single [`ByteOrder`] chosen for the
//! build. This module provides the [`ImageIO`] trait that abstracts the per-type conversion and a
//! small set of helpers that read or write a value at an offset inside a byte slice, returning
//! [`crate::Error::OutOfBounds`] instead of panicking when the slice is too short.
//!
//! # Key Components
//!
//! - [`ByteOrder`] - The byte order of one image
//! - [`ImageIO`] - Conversion trait implemented for all fixed-width primitives
//! - [`read_at`] / [`write_at`] - Offset-advancing helpers parameterised by byte order
//! - [`read_le_at`] / [`write_le_at`] / [`read_be_at`] / [`write_be_at`] - Fixed-order shorthands
//! - [`push`] - Append a value to a growable buffer
//!
//! # Examples
//!
//! ```rust
//! use cilpack::file::io::{read_at, write_at, ByteOrder};
//!
//! let mut data = [0u8; 6];
//! let mut offset = 0;
//! write_at(&mut data, &mut offset, 0x1234u16, ByteOrder::Big)?;
//! write_at(&mut data, &mut offset, 7u32, ByteOrder::Little)?;
//! assert_eq!(data, [0x12, 0x34, 7, 0, 0, 0]);
//!
//! let mut offset = 0;
//! let first: u16 = read_at(&data, &mut offset, ByteOrder::Big)?;
//! assert_eq!(first, 0x1234);
//! # Ok::<(), cilpack::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// The byte order used for every multi-byte value of one image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Least significant byte first
    #[default]
    Little,
    /// Most significant byte first
    Big,
}

impl ByteOrder {
    /// Returns `true` for [`ByteOrder::Big`].
    #[must_use]
    pub fn is_big(self) -> bool {
        self == ByteOrder::Big
    }
}

/// Trait for type-specific conversion between primitive values and their byte representation.
///
/// Each implementation defines a `Bytes` associated type that represents the fixed-size byte
/// array of the type (e.g. `[u8; 4]` for `u32`).
pub trait ImageIO: Sized + Copy {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;

    /// Converts `self` to bytes in the requested order.
    fn to_bytes(self, order: ByteOrder) -> Self::Bytes {
        match order {
            ByteOrder::Little => self.to_le_bytes(),
            ByteOrder::Big => self.to_be_bytes(),
        }
    }

    /// Converts bytes in the requested order to a value.
    fn from_bytes(bytes: Self::Bytes, order: ByteOrder) -> Self {
        match order {
            ByteOrder::Little => Self::from_le_bytes(bytes),
            ByteOrder::Big => Self::from_be_bytes(bytes),
        }
    }
}

macro_rules! impl_image_io {
    ($($ty:ty => $len:literal),* $(,)?) => {
        $(
            impl ImageIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_image_io! {
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f32 => 4,
    f64 => 8,
}

/// Reads a `T` at `offset` in the given byte order and advances `offset` by its size.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the slice is too short.
pub fn read_at<T: ImageIO>(data: &[u8], offset: &mut usize, order: ByteOrder) -> Result<T> {
    let size = std::mem::size_of::<T>();
    let end = offset.checked_add(size).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(bytes) = T::Bytes::try_from(&data[*offset..end]) else {
        return Err(OutOfBounds);
    };

    *offset = end;
    Ok(T::from_bytes(bytes, order))
}

/// Writes `value` at `offset` in the given byte order and advances `offset` by its size.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the slice is too short.
pub fn write_at<T: ImageIO>(
    data: &mut [u8],
    offset: &mut usize,
    value: T,
    order: ByteOrder,
) -> Result<()> {
    let bytes = value.to_bytes(order);
    let bytes = bytes.as_ref();
    let end = offset.checked_add(bytes.len()).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}

/// Little-endian shorthand for [`read_at`].
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the slice is too short.
pub fn read_le_at<T: ImageIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    read_at(data, offset, ByteOrder::Little)
}

/// Big-endian shorthand for [`read_at`].
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the slice is too short.
pub fn read_be_at<T: ImageIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    read_at(data, offset, ByteOrder::Big)
}

/// Little-endian shorthand for [`write_at`].
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the slice is too short.
pub fn write_le_at<T: ImageIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    write_at(data, offset, value, ByteOrder::Little)
}

/// Big-endian shorthand for [`write_at`].
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the slice is too short.
pub fn write_be_at<T: ImageIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    write_at(data, offset, value, ByteOrder::Big)
}

/// Appends `value` to `buffer` in the given byte order.
pub fn push<T: ImageIO>(buffer: &mut Vec<u8>, value: T, order: ByteOrder) {
    buffer.extend_from_slice(value.to_bytes(order).as_ref());
}
