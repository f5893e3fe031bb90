//! Byte-order aware binary writer with bounded back-patching.
//!
//! [`BinaryWriter`] wraps any `Write + Seek` sink and writes primitives in the [`ByteOrder`]
//! chosen for the image. Values that are only known after later data has been written (table
//! offsets, CRCs) are handled with reservations: [`BinaryWriter::reserve`] writes a zeroed
//! placeholder and returns a [`Reservation`], and [`BinaryWriter::patch`] later overwrites that
//! region through a [`PatchBuffer`] that refuses to grow past the reserved size.
//!
//! ```text
//! ┌──────────────┐  reserve()   ┌──────────────────────────────┐
//! │ header (0s)  │ ───────────► │ tables written sequentially  │
//! └──────┬───────┘              └──────────────┬───────────────┘
//!        │            patch(&slot, ..)         │
//!        └◄────────────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust
//! use cilpack::file::{io::ByteOrder, writer::BinaryWriter};
//! use std::io::Cursor;
//!
//! let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), ByteOrder::Little);
//! let slot = writer.reserve(4)?;
//! writer.write_bytes(b"data")?;
//! writer.patch(&slot, |buf| buf.write(4u32))?;
//!
//! assert_eq!(writer.into_inner().into_inner(), [4, 0, 0, 0, b'd', b'a', b't', b'a']);
//! # Ok::<(), cilpack::Error>(())
//! ```

use std::io::{Seek, SeekFrom, Write};

use crate::{
    file::io::{ByteOrder, ImageIO},
    utils::math::{padding_for, to_u16},
    Error, Result,
};

/// A reserved, fixed-size region of the output that can be back-patched once.
///
/// Reservations are only created by [`BinaryWriter::reserve`]; sub-regions are carved out with
/// [`Reservation::field`], which is bounds-checked against the parent region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    offset: u64,
    len: usize,
}

impl Reservation {
    /// Absolute stream position of the first reserved byte.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Size of the reserved region in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the reservation covers zero bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the sub-region `[offset, offset + len)` relative to this reservation.
    ///
    /// # Arguments
    ///
    /// * `offset` - Start of the sub-region, relative to the start of `self`
    /// * `len` - Length of the sub-region
    ///
    /// # Errors
    ///
    /// Returns [`Error::PatchOverflow`] if the sub-region does not lie within `self`.
    pub fn field(&self, offset: usize, len: usize) -> Result<Reservation> {
        let end = offset.saturating_add(len);
        if end > self.len {
            return Err(Error::PatchOverflow {
                reserved: self.len,
                attempted: end,
            });
        }

        Ok(Reservation {
            offset: self.offset + offset as u64,
            len,
        })
    }
}

/// Bounded buffer handed to patch closures.
///
/// Writes beyond the capacity of the underlying [`Reservation`] fail with
/// [`Error::PatchOverflow`]; nothing is written to the sink in that case.
pub struct PatchBuffer {
    data: Vec<u8>,
    capacity: usize,
    order: ByteOrder,
}

impl PatchBuffer {
    fn new(capacity: usize, order: ByteOrder) -> Self {
        PatchBuffer {
            data: Vec::with_capacity(capacity),
            capacity,
            order,
        }
    }

    /// Appends `value` in the image byte order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PatchOverflow`] if the value does not fit into the reservation.
    pub fn write<T: ImageIO>(&mut self, value: T) -> Result<()> {
        self.write_bytes(value.to_bytes(self.order).as_ref())
    }

    /// Appends raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PatchOverflow`] if the bytes do not fit into the reservation.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let attempted = self.data.len() + bytes.len();
        if attempted > self.capacity {
            return Err(Error::PatchOverflow {
                reserved: self.capacity,
                attempted,
            });
        }

        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Sequential writer over a seekable sink.
///
/// All typed writes use the byte order given at construction. The writer never seeks backwards
/// except inside [`BinaryWriter::patch`], which restores the end-of-stream position afterwards.
pub struct BinaryWriter<W> {
    sink: W,
    order: ByteOrder,
}

impl<W: Write + Seek> BinaryWriter<W> {
    /// Creates a writer over `sink` using `order` for all multi-byte values.
    pub fn new(sink: W, order: ByteOrder) -> Self {
        BinaryWriter { sink, order }
    }

    /// The byte order of this writer.
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Writes a single value in the writer's byte order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn write_value<T: ImageIO>(&mut self, value: T) -> Result<()> {
        self.write_bytes(value.to_bytes(self.order).as_ref())
    }

    /// Writes a `u8`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_value(value)
    }

    /// Writes an `i8`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_value(value)
    }

    /// Writes a `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_value(value)
    }

    /// Writes an `i16`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_value(value)
    }

    /// Writes a `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_value(value)
    }

    /// Writes an `i32`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_value(value)
    }

    /// Writes a `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_value(value)
    }

    /// Writes an `i64`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_value(value)
    }

    /// Writes an `f32` by its IEEE-754 bit pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_value(value)
    }

    /// Writes an `f64` by its IEEE-754 bit pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_value(value)
    }

    /// Writes raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_all(bytes)?;
        Ok(())
    }

    /// Writes a UTF-8 string prefixed by its byte length as `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if the string is longer than `u16::MAX` bytes, or
    /// [`Error::Io`] if the sink fails.
    pub fn write_length_prefixed_string(&mut self, value: &str) -> Result<()> {
        let len = to_u16(value.len(), "length-prefixed string")?;
        self.write_u16(len)?;
        self.write_bytes(value.as_bytes())
    }

    /// Current stream position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink cannot report its position.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.sink.stream_position()?)
    }

    /// Moves the stream position to the absolute offset `position`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink cannot seek.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.sink.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    /// Writes zero bytes until the position is a multiple of `alignment`.
    ///
    /// # Returns
    ///
    /// The number of padding bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn align(&mut self, alignment: u64) -> Result<u8> {
        let position = self.position()?;
        let padding = padding_for(position, alignment);
        if padding > 0 {
            self.write_bytes(&vec![0u8; padding])?;
        }

        u8::try_from(padding).map_err(|_| malformed_error!("Padding {padding} exceeds u8"))
    }

    /// Reserves `len` zeroed bytes at the current position for a later [`BinaryWriter::patch`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the sink fails.
    pub fn reserve(&mut self, len: usize) -> Result<Reservation> {
        let offset = self.position()?;
        self.write_bytes(&vec![0u8; len])?;
        Ok(Reservation { offset, len })
    }

    /// Overwrites (part of) a reserved region.
    ///
    /// The closure fills a [`PatchBuffer`] bounded by the reservation size; the produced bytes
    /// are written at the start of the reservation and the stream position is restored
    /// afterwards. Bytes of the reservation not covered by the patch are left unchanged.
    ///
    /// # Arguments
    ///
    /// * `slot` - The region to overwrite
    /// * `fill` - Closure producing the patch content
    ///
    /// # Errors
    ///
    /// Returns [`Error::PatchOverflow`] if the closure writes past the reservation, or
    /// [`Error::Io`] if the sink fails. On error nothing is written.
    pub fn patch<F>(&mut self, slot: &Reservation, fill: F) -> Result<()>
    where
        F: FnOnce(&mut PatchBuffer) -> Result<()>,
    {
        let mut buffer = PatchBuffer::new(slot.len, self.order);
        fill(&mut buffer)?;

        let resume = self.position()?;
        self.seek(slot.offset)?;
        self.write_bytes(&buffer.data)?;
        self.seek(resume)
    }

    /// Shared access to the sink.
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Consumes the writer and returns the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }
}
