//! Image orchestration.
//!
//! [`ImageBuilder::build`] runs the two phases of a build:
//!
//! 1. **Construction**: a [`TablesContext`] resolves every symbol, assigns every ID and encodes
//!    every method body.
//! 2. **Serialization**: a zeroed header is reserved, its fixed fields are patched, and every
//!    table is written in [`EMISSION_ORDER`], aligned to 4 bytes, with its start offset and
//!    padding patched into the header directory as soon as they are known. The two CRCs are
//!    patched last.

use std::{fmt, io::Cursor, path::Path, sync::Arc};

use crate::{
    file::{io::ByteOrder, output::write_file, writer::BinaryWriter},
    image::{
        debugmap::DebugMap,
        header::{
            ImageFlags, ImageHeader, HEADER_CRC_OFFSET, HEADER_SIZE, PAYLOAD_CRC_OFFSET,
            TABLE_OFFSETS_OFFSET, TABLE_PADDING_OFFSET,
        },
        native::native_checksum,
    },
    model::Assembly,
    tables::{
        resources::{PassthroughTranscoder, ResourceTranscoder},
        strings::{IdentitySorter, StringSorter, StringTable},
        TableKind, TablesContext, EMISSION_ORDER,
    },
    utils::{crc::crc32, math::to_u32},
    Result,
};

/// Alignment of every table in the image.
pub const TABLE_ALIGNMENT: u64 = 4;

/// Build configuration.
///
/// ```rust
/// use cilpack::{file::io::ByteOrder, image::{BuildOptions, ImageFlags}};
///
/// let options = BuildOptions::default()
///     .byte_order(ByteOrder::Big)
///     .flags(ImageFlags::NEED_REBOOT);
/// ```
#[derive(Clone)]
pub struct BuildOptions {
    order: ByteOrder,
    string_constants: bool,
    string_sorter: Arc<dyn StringSorter>,
    transcoder: Arc<dyn ResourceTranscoder>,
    flags: ImageFlags,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            order: ByteOrder::Little,
            string_constants: true,
            string_sorter: Arc::new(IdentitySorter),
            transcoder: Arc::new(PassthroughTranscoder),
            flags: ImageFlags::empty(),
        }
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("order", &self.order)
            .field("string_constants", &self.string_constants)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl BuildOptions {
    /// Byte order of the image; little-endian by default.
    #[must_use]
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    /// Whether framework names resolve to the runtime's constant strings; on by default.
    #[must_use]
    pub fn string_constants(mut self, enabled: bool) -> Self {
        self.string_constants = enabled;
        self
    }

    /// Order of strings appended when string tables are merged.
    #[must_use]
    pub fn string_sorter(mut self, sorter: Arc<dyn StringSorter>) -> Self {
        self.string_sorter = sorter;
        self
    }

    /// Converter for bitmap and font resources.
    #[must_use]
    pub fn transcoder(mut self, transcoder: Arc<dyn ResourceTranscoder>) -> Self {
        self.transcoder = transcoder;
        self
    }

    /// Additional image flags; the byte-order flag is always derived from
    /// [`BuildOptions::byte_order`].
    #[must_use]
    pub fn flags(mut self, flags: ImageFlags) -> Self {
        self.flags = flags;
        self
    }

    fn image_flags(&self) -> ImageFlags {
        let flags = self.flags - ImageFlags::BIG_ENDIAN;
        if self.order.is_big() {
            flags | ImageFlags::BIG_ENDIAN
        } else {
            flags
        }
    }
}

/// A finished image.
#[derive(Debug, Clone)]
pub struct Image {
    /// The complete image
    pub bytes: Vec<u8>,
    /// The header as written
    pub header: ImageHeader,
    /// Token to ID correlation
    pub debug_map: DebugMap,
}

impl Image {
    /// Writes the image to `path`, replacing any existing file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] or [`crate::Error::MmapFailed`] if the file cannot be
    /// written.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_file(path, &self.bytes)
    }

    /// Renders the debug map as XML.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DebugMap`] if rendering fails.
    pub fn debug_map_xml(&self) -> Result<String> {
        self.debug_map.to_xml()
    }
}

/// Packs one assembly into an image.
pub struct ImageBuilder<'a> {
    assembly: &'a Assembly,
    options: BuildOptions,
}

impl<'a> ImageBuilder<'a> {
    /// Creates a builder for `assembly`.
    #[must_use]
    pub fn new(assembly: &'a Assembly, options: BuildOptions) -> Self {
        ImageBuilder { assembly, options }
    }

    /// Builds the image.
    ///
    /// # Errors
    ///
    /// Returns the first construction or serialization failure, wrapped with the table (and
    /// method or resource) that caused it. No partial image is returned.
    pub fn build(&self) -> Result<Image> {
        let strings = StringTable::new(
            self.options.string_constants,
            Arc::clone(&self.options.string_sorter),
        );
        let tables = TablesContext::build(
            self.assembly,
            self.options.order,
            strings,
            self.options.transcoder.as_ref(),
        )?;

        let bytes = self.serialize(&tables)?;
        let header = ImageHeader::parse(&bytes)?;
        log::info!(
            "image {}: {} bytes, {} types, {} methods, payload crc 0x{:08X}",
            self.assembly.name,
            bytes.len(),
            tables.type_defs.len(),
            tables.method_defs.len(),
            header.payload_crc
        );

        Ok(Image {
            bytes,
            header,
            debug_map: DebugMap::from_tables(&tables),
        })
    }

    fn serialize(&self, tables: &TablesContext<'_>) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), self.options.order);
        let header_slot = writer.reserve(HEADER_SIZE)?;

        let header = ImageHeader::new(
            self.options.image_flags(),
            native_checksum(self.assembly, &tables.symbols.plan),
            self.assembly.version,
            tables.name,
        );
        writer.patch(&header_slot, |buf| header.write_fixed(buf))?;

        for kind in EMISSION_ORDER {
            let start = to_u32(writer.position()?, "table offset")?;
            tables
                .write(kind, &mut writer)
                .map_err(|e| e.in_table(kind))?;
            let padding = writer.align(TABLE_ALIGNMENT)?;

            let index = kind.index();
            let offset_slot = header_slot.field(TABLE_OFFSETS_OFFSET + 4 * index, 4)?;
            let padding_slot = header_slot.field(TABLE_PADDING_OFFSET + index, 1)?;
            writer.patch(&offset_slot, |buf| buf.write(start))?;
            writer.patch(&padding_slot, |buf| buf.write(padding))?;

            if kind != TableKind::EndOfAssembly {
                log::debug!(
                    "{kind:?}: offset 0x{start:X}, {} bytes, padding {padding}",
                    tables.byte_size(kind)
                );
            }
        }

        let (header_crc, payload_crc) = {
            let bytes = writer.get_ref().get_ref();
            (
                crc32(&bytes[..HEADER_SIZE], 0),
                crc32(&bytes[HEADER_SIZE..], 0),
            )
        };
        let payload_slot = header_slot.field(PAYLOAD_CRC_OFFSET, 4)?;
        let header_crc_slot = header_slot.field(HEADER_CRC_OFFSET, 4)?;
        writer.patch(&payload_slot, |buf| buf.write(payload_crc))?;
        writer.patch(&header_crc_slot, |buf| buf.write(header_crc))?;

        Ok(writer.into_inner().into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::{hello_world, minimal_app},
        Error,
    };

    #[test]
    fn test_header_crc_covers_zeroed_crc_fields() {
        let assembly = hello_world();
        let image = ImageBuilder::new(&assembly, BuildOptions::default())
            .build()
            .unwrap();

        let mut header = image.bytes[..HEADER_SIZE].to_vec();
        header[HEADER_CRC_OFFSET..PAYLOAD_CRC_OFFSET + 4].fill(0);
        assert_eq!(image.header.header_crc, crc32(&header, 0));
        assert_eq!(
            image.header.payload_crc,
            crc32(&image.bytes[HEADER_SIZE..], 0)
        );
    }

    #[test]
    fn test_every_table_is_aligned() {
        let assembly = hello_world();
        let image = ImageBuilder::new(&assembly, BuildOptions::default())
            .build()
            .unwrap();

        for kind in EMISSION_ORDER {
            assert_eq!(image.header.offset(kind) % 4, 0, "{kind:?}");
        }
        assert_eq!(image.header.offset(TableKind::AssemblyRef), HEADER_SIZE as u32);
        assert_eq!(image.header.image_len() as usize, image.bytes.len());
    }

    #[test]
    fn test_byte_order_flag_follows_options() {
        let assembly = hello_world();
        let options = BuildOptions::default()
            .byte_order(ByteOrder::Big)
            .flags(ImageFlags::NEED_REBOOT);
        let image = ImageBuilder::new(&assembly, options).build().unwrap();

        assert_eq!(image.header.byte_order(), ByteOrder::Big);
        assert!(image.header.flags.contains(ImageFlags::NEED_REBOOT));

        let little = BuildOptions::default().flags(ImageFlags::BIG_ENDIAN);
        let image = ImageBuilder::new(&assembly, little).build().unwrap();
        assert_eq!(image.header.byte_order(), ByteOrder::Little);
    }

    #[test]
    fn test_failure_returns_no_image() {
        let mut assembly = hello_world();
        assembly.types.push(assembly.types[0].clone());

        let result = ImageBuilder::new(&assembly, BuildOptions::default()).build();
        assert!(matches!(
            result.map(|image| image.bytes.len()).unwrap_err().root_cause(),
            Error::InconsistentModel(_)
        ));
    }

    #[test]
    fn test_minimal_image() {
        let assembly = minimal_app();
        let image = ImageBuilder::new(&assembly, BuildOptions::default())
            .build()
            .unwrap();

        assert!(image.header.offsets.iter().all(|&offset| offset != 0));
        assert_eq!(image.header.table_size(TableKind::FieldDef), 8);
        assert_eq!(image.header.table_size(TableKind::MethodDef), 16);
        assert_eq!(image.header.table_size(TableKind::Resources), 16);
        assert_ne!(image.header.payload_crc, 0);
        assert_eq!(image.header.native_checksum, 0);
    }
}
