//! The byte-code table.
//!
//! Every method body is encoded up front, in method ID order, into one contiguous heap. The
//! heap offset of a body becomes the `rva` of its method row, so the method table can only be
//! built once this table exists. Methods without a body (abstract, runtime and internal-call
//! methods) occupy no space and keep an absent `rva`.

use std::io::{Seek, Write};

use crate::{
    codegen::encode_body,
    file::writer::BinaryWriter,
    tables::{members::BodyInfo, symbols::SymbolTables, NONE},
    utils::math::check_id,
    Result,
};

/// Encoded method bodies plus the per-method placement and offset maps.
#[derive(Debug, Default)]
pub struct ByteCodeTable {
    heap: Vec<u8>,
    bodies: Vec<Option<BodyInfo>>,
    il_maps: Vec<Vec<(u32, u32)>>,
}

impl ByteCodeTable {
    /// Encodes the body of every planned method.
    ///
    /// # Errors
    ///
    /// Returns the first encoding error, wrapped with the name of the failing method, or
    /// [`crate::Error::CapacityOverflow`] once a body starts beyond the 16-bit `rva` range.
    pub fn build(symbols: &mut SymbolTables<'_>) -> Result<Self> {
        let assembly = symbols.assembly;
        let methods = symbols.plan.methods.clone();
        let mut table = ByteCodeTable {
            heap: Vec::new(),
            bodies: Vec::with_capacity(methods.len()),
            il_maps: Vec::with_capacity(methods.len()),
        };

        for (type_index, method_index) in methods {
            let owner = &assembly.types[type_index];
            let method = &owner.methods[method_index];
            let Some(body) = method.body.as_ref() else {
                table.bodies.push(None);
                table.il_maps.push(Vec::new());
                continue;
            };

            let qualified = || format!("{}::{}", owner.name, method.name);
            let rva = check_id(table.heap.len(), NONE, "byte code offset")
                .map_err(|e| e.in_method(qualified()))?;
            let encoded =
                encode_body(symbols, method, body).map_err(|e| e.in_method(qualified()))?;

            log::trace!(
                "{}: {} instructions, {} bytes at 0x{:04X}, max stack {}",
                qualified(),
                body.instructions.len(),
                encoded.bytes.len(),
                rva,
                encoded.max_stack
            );

            table.heap.extend_from_slice(&encoded.bytes);
            table.bodies.push(Some(BodyInfo {
                rva,
                max_stack: encoded.max_stack,
            }));
            table.il_maps.push(encoded.offsets);
        }

        Ok(table)
    }

    /// Placement of every method body, indexed by method ID.
    #[must_use]
    pub fn bodies(&self) -> &[Option<BodyInfo>] {
        &self.bodies
    }

    /// `(input offset, output offset)` pairs of the method with ID `method`.
    #[must_use]
    pub fn il_map(&self, method: usize) -> &[(u32, u32)] {
        self.il_maps.get(method).map_or(&[], Vec::as_slice)
    }

    /// Size of the heap in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// `true` if no method has a body.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The encoded heap.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.heap
    }

    /// Writes the heap.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the sink fails.
    pub fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_bytes(&self.heap)
    }
}
