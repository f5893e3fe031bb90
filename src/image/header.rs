//! The fixed image header.
//!
//! ```text
//! offset  size  field
//! 0       8     magic "NFMRK2\0\0"
//! 8       4     header CRC
//! 12      4     payload CRC
//! 16      4     flags (ImageFlags)
//! 20      4     native method checksum
//! 24      8     version (major, minor, build, revision as u16)
//! 32      2     assembly name string ID
//! 34      2     string table version
//! 36      64    table start offsets, 16 x u32, indexed by TableKind
//! 100     16    table padding, 16 x u8, indexed by TableKind
//! ```
//!
//! All values use the byte order of the image. The big-endian flag is a palindrome, so a reader
//! can detect the byte order from the flags word before knowing it.

use bitflags::bitflags;
use strum::EnumCount;

use crate::{
    file::{
        io::{read_at, read_le_at, ByteOrder},
        writer::PatchBuffer,
    },
    model::Version,
    tables::{constants::STRING_TABLE_VERSION, TableKind, EMISSION_ORDER},
    Error, Result,
};

/// Image signature.
pub const MAGIC: [u8; 8] = *b"NFMRK2\0\0";

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 116;

/// Position of the header CRC.
pub const HEADER_CRC_OFFSET: usize = 8;
/// Position of the payload CRC.
pub const PAYLOAD_CRC_OFFSET: usize = 12;
/// Position of the flags word.
pub const FLAGS_OFFSET: usize = 16;
/// Position of the first table offset.
pub const TABLE_OFFSETS_OFFSET: usize = 36;
/// Position of the first table padding byte.
pub const TABLE_PADDING_OFFSET: usize = TABLE_OFFSETS_OFFSET + 4 * TableKind::COUNT;

bitflags! {
    /// Image-wide flags.
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default)]
    pub struct ImageFlags: u32 {
        /// Values are stored most significant byte first
        const BIG_ENDIAN = 0x8000_0080;
        /// The device must reboot after deploying this image
        const NEED_REBOOT = 0x0000_0001;
    }
}

impl ImageFlags {
    /// The byte order these flags announce.
    #[must_use]
    pub fn byte_order(self) -> ByteOrder {
        if self.contains(ImageFlags::BIG_ENDIAN) {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

/// A decoded image header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    /// CRC-32 of the header with both CRC fields zeroed
    pub header_crc: u32,
    /// CRC-32 of everything after the header
    pub payload_crc: u32,
    /// Image flags
    pub flags: ImageFlags,
    /// Checksum over the internal-call method stubs
    pub native_checksum: u32,
    /// Assembly version
    pub version: Version,
    /// String ID of the assembly name
    pub name: u16,
    /// Version of the constant string list the image was built against
    pub string_table_version: u16,
    /// Start offset of every table, indexed by [`TableKind::index`]
    pub offsets: [u32; TableKind::COUNT],
    /// Padding after every table, indexed by [`TableKind::index`]
    pub padding: [u8; TableKind::COUNT],
}

impl ImageHeader {
    /// Creates a header with the fixed fields set and an empty table directory.
    #[must_use]
    pub fn new(flags: ImageFlags, native_checksum: u32, version: Version, name: u16) -> Self {
        ImageHeader {
            header_crc: 0,
            payload_crc: 0,
            flags,
            native_checksum,
            version,
            name,
            string_table_version: STRING_TABLE_VERSION,
            offsets: [0; TableKind::COUNT],
            padding: [0; TableKind::COUNT],
        }
    }

    /// Writes the fields in front of the table directory, CRCs included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PatchOverflow`] if `buffer` is smaller than those fields.
    pub fn write_fixed(&self, buffer: &mut PatchBuffer) -> Result<()> {
        buffer.write_bytes(&MAGIC)?;
        buffer.write(self.header_crc)?;
        buffer.write(self.payload_crc)?;
        buffer.write(self.flags.bits())?;
        buffer.write(self.native_checksum)?;
        buffer.write(self.version.major)?;
        buffer.write(self.version.minor)?;
        buffer.write(self.version.build)?;
        buffer.write(self.version.revision)?;
        buffer.write(self.name)?;
        buffer.write(self.string_table_version)?;
        Ok(())
    }

    /// Decodes the header at the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if `data` is shorter than a header and
    /// [`Error::Malformed`] if the magic does not match.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::OutOfBounds);
        }
        if data[..MAGIC.len()] != MAGIC {
            return Err(malformed_error!("Invalid image magic"));
        }

        let mut offset = FLAGS_OFFSET;
        let raw: u32 = read_le_at(data, &mut offset)?;
        let order = ImageFlags::from_bits_retain(raw).byte_order();

        let mut offset = HEADER_CRC_OFFSET;
        let header_crc = read_at(data, &mut offset, order)?;
        let payload_crc = read_at(data, &mut offset, order)?;
        let flags = ImageFlags::from_bits_retain(read_at(data, &mut offset, order)?);
        let native_checksum = read_at(data, &mut offset, order)?;
        let version = Version {
            major: read_at(data, &mut offset, order)?,
            minor: read_at(data, &mut offset, order)?,
            build: read_at(data, &mut offset, order)?,
            revision: read_at(data, &mut offset, order)?,
        };
        let name = read_at(data, &mut offset, order)?;
        let string_table_version = read_at(data, &mut offset, order)?;

        let mut offsets = [0u32; TableKind::COUNT];
        for slot in &mut offsets {
            *slot = read_at(data, &mut offset, order)?;
        }
        let mut padding = [0u8; TableKind::COUNT];
        for slot in &mut padding {
            *slot = read_at(data, &mut offset, order)?;
        }

        Ok(ImageHeader {
            header_crc,
            payload_crc,
            flags,
            native_checksum,
            version,
            name,
            string_table_version,
            offsets,
            padding,
        })
    }

    /// Byte order of the image.
    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.flags.byte_order()
    }

    /// Start offset of table `kind`.
    #[must_use]
    pub fn offset(&self, kind: TableKind) -> u32 {
        self.offsets[kind.index()]
    }

    /// Total image length, which is the offset of the end marker.
    #[must_use]
    pub fn image_len(&self) -> u32 {
        self.offset(TableKind::EndOfAssembly)
    }

    /// Payload length of table `kind`, derived from the start of the table that follows it in
    /// emission order minus the padding.
    #[must_use]
    pub fn table_size(&self, kind: TableKind) -> u32 {
        let Some(position) = EMISSION_ORDER.iter().position(|k| *k == kind) else {
            return 0;
        };
        let Some(next) = EMISSION_ORDER.get(position + 1) else {
            return 0;
        };

        self.offset(*next)
            .saturating_sub(self.offset(kind))
            .saturating_sub(u32::from(self.padding[kind.index()]))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::file::writer::BinaryWriter;

    fn encode(header: &ImageHeader, order: ByteOrder) -> Vec<u8> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), order);
        let slot = writer.reserve(HEADER_SIZE).unwrap();
        writer.patch(&slot, |buf| header.write_fixed(buf)).unwrap();
        let mut bytes = writer.into_inner().into_inner();

        let mut offset = TABLE_OFFSETS_OFFSET;
        for value in header.offsets {
            crate::file::io::write_at(&mut bytes, &mut offset, value, order).unwrap();
        }
        for value in header.padding {
            crate::file::io::write_at(&mut bytes, &mut offset, value, order).unwrap();
        }
        bytes
    }

    #[test]
    fn test_layout_constants() {
        assert_eq!(TABLE_PADDING_OFFSET, 100);
        assert_eq!(TABLE_PADDING_OFFSET + TableKind::COUNT, HEADER_SIZE);
    }

    #[test]
    fn test_big_endian_flag_is_palindromic() {
        let bits = ImageFlags::BIG_ENDIAN.bits();
        assert_eq!(bits.to_le_bytes(), bits.to_be_bytes());
    }

    #[test]
    fn test_parse_detects_byte_order() {
        let mut header = ImageHeader::new(
            ImageFlags::BIG_ENDIAN | ImageFlags::NEED_REBOOT,
            0xDEAD_BEEF,
            Version::new(1, 2, 3, 4),
            7,
        );
        header.offsets[TableKind::AssemblyRef.index()] = 116;
        header.padding[TableKind::TypeDef.index()] = 2;

        let bytes = encode(&header, ByteOrder::Big);
        assert_eq!(&bytes[..8], b"NFMRK2\0\0");
        assert_eq!(&bytes[20..24], &[0xDE, 0xAD, 0xBE, 0xEF]);

        let parsed = ImageHeader::parse(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.byte_order(), ByteOrder::Big);
    }

    #[test]
    fn test_table_size_uses_emission_order() {
        let mut header = ImageHeader::new(ImageFlags::empty(), 0, Version::default(), 0);
        header.offsets[TableKind::MethodRef.index()] = 200;
        header.offsets[TableKind::Signatures.index()] = 216;
        header.offsets[TableKind::TypeDef.index()] = 240;
        header.padding[TableKind::Signatures.index()] = 3;

        assert_eq!(header.table_size(TableKind::MethodRef), 16);
        assert_eq!(header.table_size(TableKind::Signatures), 21);
        assert_eq!(header.table_size(TableKind::EndOfAssembly), 0);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(ImageHeader::parse(&[0; 10]), Err(Error::OutOfBounds)));
        assert!(matches!(
            ImageHeader::parse(&[0; HEADER_SIZE]),
            Err(Error::Malformed { .. })
        ));
    }
}
