//! The resource table set: directory, data heap and resource files.
//!
//! Resources are addressed at runtime by a 16-bit hash of their name. The directory holds one
//! row per resource, sorted by signed ID so a runtime can binary-search it, and ends with a
//! sentinel row whose offset is the heap length. Payloads are stored in the data heap after
//! stripping the framing of the source format:
//!
//! | Kind | Source framing | Stored as |
//! |------|----------------|-----------|
//! | [`ResourceKind::String`] | 7-bit encoded length prefix | UTF-8 bytes plus a NUL |
//! | [`ResourceKind::Binary`] | 4-byte little-endian length | raw bytes |
//! | [`ResourceKind::Bitmap`] / [`ResourceKind::Font`] | none | transcoded, 4-byte aligned |
//!
//! Pixel and glyph conversion is not part of the linker; it is delegated to a
//! [`ResourceTranscoder`], which by default passes the data through.

use std::{
    collections::HashMap,
    io::{Seek, Write},
};

use crate::{
    file::{io::ByteOrder, writer::BinaryWriter},
    model::{Resource, ResourceFile},
    tables::{strings::StringTable, TableRow},
    utils::math::{padding_for, to_u32, to_u8},
    Result,
};

/// ID of the directory sentinel row.
pub const SENTINEL_ID: i16 = 0x7FFF;

/// Runtime kind of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResourceKind {
    /// Bitmap image
    Bitmap = 1,
    /// Font
    Font = 2,
    /// String
    String = 3,
    /// Opaque bytes
    Binary = 4,
}

impl ResourceKind {
    /// Classifies a resource by its declared type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unsupported`] for unknown type hints.
    pub fn from_type_hint(hint: &str) -> Result<Self> {
        match hint {
            "System.String" | "text/plain" => Ok(ResourceKind::String),
            "System.Drawing.Bitmap" | "nanoFramework.UI.Bitmap" => Ok(ResourceKind::Bitmap),
            "nanoFramework.UI.Font" | "application/x-font" => Ok(ResourceKind::Font),
            "System.Byte[]" | "application/octet-stream" => Ok(ResourceKind::Binary),
            image if image.starts_with("image/") => Ok(ResourceKind::Bitmap),
            other => Err(unsupported_error!("resource type {:?}", other)),
        }
    }

    /// The kind byte of a directory row.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// `true` for kinds whose payload is aligned to 4 bytes in the heap.
    #[must_use]
    pub const fn is_aligned(self) -> bool {
        matches!(self, ResourceKind::Bitmap | ResourceKind::Font)
    }
}

/// Converts bitmap and font payloads into the runtime's native format.
pub trait ResourceTranscoder: Send + Sync {
    /// Returns the payload to store for a resource of `kind`, with multi-byte fields in the
    /// image's byte `order`.
    ///
    /// # Errors
    ///
    /// Implementations report payloads they cannot convert.
    fn transcode(&self, kind: ResourceKind, data: &[u8], order: ByteOrder) -> Result<Vec<u8>>;
}

/// Stores bitmap and font payloads unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranscoder;

impl ResourceTranscoder for PassthroughTranscoder {
    fn transcode(&self, _kind: ResourceKind, data: &[u8], _order: ByteOrder) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// The 16-bit runtime ID of a resource name.
///
/// The UTF-16 code units of `name` feed two interleaved accumulators; their combination is
/// folded to 16 bits. Distinct names may collide.
#[must_use]
pub fn resource_id(name: &str) -> i16 {
    const SEED: i32 = (5381 << 16) + 5381;

    let mut accumulators = [SEED, SEED];
    for (position, unit) in name.encode_utf16().enumerate() {
        let h = &mut accumulators[position % 2];
        *h = (h.wrapping_shl(5).wrapping_add(*h)) ^ i32::from(unit);
    }

    let hash = accumulators[0].wrapping_add(accumulators[1].wrapping_mul(1_566_083_941));
    #[allow(clippy::cast_possible_truncation)]
    {
        ((hash >> 16) ^ hash) as i16
    }
}

/// One row of the resource directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRow {
    /// Hash of the resource name
    pub id: i16,
    /// [`ResourceKind`] byte, 0 for the sentinel
    pub kind: u8,
    /// Zero bytes inserted in the heap before the payload
    pub padding: u8,
    /// Heap offset before the padding
    pub offset: u32,
}

impl TableRow for ResourceRow {
    const SIZE: usize = 8;

    fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_i16(self.id)?;
        writer.write_u8(self.kind)?;
        writer.write_u8(self.padding)?;
        writer.write_u32(self.offset)?;
        Ok(())
    }
}

/// One row of the resource-file table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceFileRow {
    /// String ID of the file name
    pub name: u16,
    /// Number of resources in the file
    pub count: u32,
}

impl TableRow for ResourceFileRow {
    const SIZE: usize = 8;

    fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_u16(self.name)?;
        writer.write_u16(0)?;
        writer.write_u32(self.count)?;
        Ok(())
    }
}

/// The directory, data heap and file rows of an assembly's resources.
#[derive(Debug, Default)]
pub struct ResourceTables {
    rows: Vec<ResourceRow>,
    data: Vec<u8>,
    files: Vec<ResourceFileRow>,
}

impl ResourceTables {
    /// Builds the resource tables of `files`.
    ///
    /// # Arguments
    ///
    /// * `files` - Resource files in declaration order
    /// * `strings` - Receives the file names
    /// * `transcoder` - Converts bitmap and font payloads
    /// * `order` - Byte order of the image, handed to the transcoder
    ///
    /// # Errors
    ///
    /// Returns the first failure, wrapped with the name of the offending resource.
    pub fn build(
        files: &[ResourceFile],
        strings: &mut StringTable,
        transcoder: &dyn ResourceTranscoder,
        order: ByteOrder,
    ) -> Result<Self> {
        let mut tables = ResourceTables::default();

        for file in files {
            tables.files.push(ResourceFileRow {
                name: strings.intern(&file.name)?,
                count: to_u32(file.resources.len() as u64, "resources per file")?,
            });
            for resource in &file.resources {
                tables
                    .add(resource, transcoder, order)
                    .map_err(|e| e.in_resource(&resource.name))?;
            }
        }

        if !tables.rows.is_empty() {
            tables.rows.sort_by_key(|row| row.id);
            tables.rows.push(ResourceRow {
                id: SENTINEL_ID,
                kind: 0,
                padding: 0,
                offset: to_u32(tables.data.len() as u64, "resource data size")?,
            });
        }

        log::debug!(
            "resources: {} files, {} entries, {} data bytes",
            tables.files.len(),
            tables.rows.len().saturating_sub(1),
            tables.data.len()
        );
        Ok(tables)
    }

    fn add(
        &mut self,
        resource: &Resource,
        transcoder: &dyn ResourceTranscoder,
        order: ByteOrder,
    ) -> Result<()> {
        let kind = ResourceKind::from_type_hint(&resource.type_hint)?;
        let offset = to_u32(self.data.len() as u64, "resource data offset")?;
        let padding = if kind.is_aligned() {
            padding_for(u64::from(offset), 4)
        } else {
            0
        };
        self.data.resize(self.data.len() + padding, 0);

        match kind {
            ResourceKind::String => {
                let text = strip_7bit_prefix(&resource.data)?;
                self.data.extend_from_slice(text);
                self.data.push(0);
            }
            ResourceKind::Binary => {
                let bytes = strip_u32_prefix(&resource.data)?;
                self.data.extend_from_slice(bytes);
            }
            ResourceKind::Bitmap | ResourceKind::Font => {
                let converted = transcoder.transcode(kind, &resource.data, order)?;
                self.data.extend_from_slice(&converted);
            }
        }

        self.rows.push(ResourceRow {
            id: resource_id(&resource.name),
            kind: kind.value(),
            padding: to_u8(padding, "resource padding")?,
            offset,
        });
        Ok(())
    }

    /// Rewrites the file name IDs after their string table was merged into another one.
    pub fn remap_names(&mut self, remap: &HashMap<u16, u16>) {
        for file in &mut self.files {
            if let Some(&id) = remap.get(&file.name) {
                file.name = id;
            }
        }
    }

    /// Directory rows, sorted by ID, sentinel last.
    #[must_use]
    pub fn rows(&self) -> &[ResourceRow] {
        &self.rows
    }

    /// The data heap.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Resource-file rows in declaration order.
    #[must_use]
    pub fn files(&self) -> &[ResourceFileRow] {
        &self.files
    }

    /// Writes the directory.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the sink fails.
    pub fn write_directory<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        crate::tables::write_rows(&self.rows, writer)
    }

    /// Writes the data heap.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the sink fails.
    pub fn write_data<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_bytes(&self.data)
    }

    /// Writes the resource-file rows.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the sink fails.
    pub fn write_files<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        crate::tables::write_rows(&self.files, writer)
    }
}

/// Strips a 7-bit encoded length prefix and checks it against the remaining bytes.
fn strip_7bit_prefix(data: &[u8]) -> Result<&[u8]> {
    let mut length: u64 = 0;
    let mut shift = 0;
    let mut consumed = 0;

    loop {
        let byte = *data
            .get(consumed)
            .ok_or_else(|| malformed_error!("Truncated string length prefix"))?;
        consumed += 1;
        length |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 28 {
            return Err(malformed_error!("String length prefix longer than 5 bytes"));
        }
    }

    let payload = &data[consumed..];
    if payload.len() as u64 != length {
        return Err(malformed_error!(
            "String length prefix says {} bytes, payload has {}",
            length,
            payload.len()
        ));
    }
    Ok(payload)
}

/// Strips a 4-byte little-endian length prefix and checks it against the remaining bytes.
fn strip_u32_prefix(data: &[u8]) -> Result<&[u8]> {
    let (prefix, payload) = data
        .split_first_chunk::<4>()
        .ok_or_else(|| malformed_error!("Truncated binary length prefix"))?;
    let length = u32::from_le_bytes(*prefix);
    if payload.len() as u64 != u64::from(length) {
        return Err(malformed_error!(
            "Binary length prefix says {} bytes, payload has {}",
            length,
            payload.len()
        ));
    }
    Ok(payload)
}
