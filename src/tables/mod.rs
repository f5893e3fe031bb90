//! The output tables of an image.
//!
//! An image consists of sixteen tables, addressed by [`TableKind`]. Every table is built
//! completely before the first byte of the image is written: IDs are stable once assigned, all
//! strings are interned and every method body is pre-encoded. Serialization is then a pure
//! function of the built tables, dispatched through [`TablesContext::write`].
//!
//! # Table Kinds
//!
//! | Slot | Kind | Row |
//! |------|------|-----|
//! | 0 | [`TableKind::AssemblyRef`] | [`references::AssemblyRefRow`] |
//! | 1 | [`TableKind::TypeRef`] | [`references::TypeRefRow`] |
//! | 2 | [`TableKind::FieldRef`] | [`references::MemberRefRow`] |
//! | 3 | [`TableKind::MethodRef`] | [`references::MemberRefRow`] |
//! | 4 | [`TableKind::TypeDef`] | [`typedefs::TypeDefRow`] |
//! | 5 | [`TableKind::FieldDef`] | [`members::FieldDefRow`] |
//! | 6 | [`TableKind::MethodDef`] | [`members::MethodDefRow`] |
//! | 7 | [`TableKind::Attributes`] | [`attributes::AttributeRow`] |
//! | 8 | [`TableKind::TypeSpec`] | [`typespecs::TypeSpecRow`] |
//! | 9 | [`TableKind::Resources`] | [`resources::ResourceRow`] |
//! | 10 | [`TableKind::ResourcesData`] | byte heap |
//! | 11 | [`TableKind::Strings`] | NUL-terminated strings |
//! | 12 | [`TableKind::Signatures`] | byte pool |
//! | 13 | [`TableKind::ByteCode`] | encoded method bodies |
//! | 14 | [`TableKind::ResourcesFiles`] | [`resources::ResourceFileRow`] |
//! | 15 | [`TableKind::EndOfAssembly`] | empty marker |
//!
//! # Handles
//!
//! Rows refer to each other through 16-bit handles. A definition handle is its plain ID; a
//! reference handle sets [`EXTERNAL_TAG`]. Type operands in byte code use a two-bit tag
//! ([`TypeHandle::encode_token`]) so type specifications can be addressed too. [`NONE`] marks
//! an absent handle.

pub mod attributes;
pub mod bytecode;
pub mod constants;
pub mod context;
pub mod layout;
pub mod members;
pub mod references;
pub mod resources;
pub mod signatures;
pub mod strings;
pub mod symbols;
pub mod typedefs;
pub mod typespecs;

pub use context::TablesContext;

use std::io::{Seek, Write};

use strum::{EnumCount, EnumIter};

use crate::{file::writer::BinaryWriter, Result};

/// The sixteen table slots of an image; the discriminant is the header slot index.
#[derive(Clone, Copy, PartialEq, Debug, EnumIter, EnumCount, Eq, Hash)]
pub enum TableKind {
    /// Referenced assemblies
    AssemblyRef = 0,
    /// Referenced external types
    TypeRef = 1,
    /// Referenced external fields
    FieldRef = 2,
    /// Referenced external methods
    MethodRef = 3,
    /// Type definitions
    TypeDef = 4,
    /// Field definitions
    FieldDef = 5,
    /// Method definitions
    MethodDef = 6,
    /// Custom attributes
    Attributes = 7,
    /// Type specifications
    TypeSpec = 8,
    /// Resource directory
    Resources = 9,
    /// Resource data heap
    ResourcesData = 10,
    /// String table
    Strings = 11,
    /// Signature pool
    Signatures = 12,
    /// Encoded method bodies
    ByteCode = 13,
    /// Resource files
    ResourcesFiles = 14,
    /// End marker; its offset is the image length
    EndOfAssembly = 15,
}

impl TableKind {
    /// The header slot of this table.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// The order in which tables are laid out in an image.
///
/// This order is part of the image format; readers locate tables through the header but derive
/// table sizes from the start of the next table in this order.
pub const EMISSION_ORDER: [TableKind; TableKind::COUNT] = [
    TableKind::AssemblyRef,
    TableKind::TypeRef,
    TableKind::FieldRef,
    TableKind::MethodRef,
    TableKind::Signatures,
    TableKind::TypeDef,
    TableKind::FieldDef,
    TableKind::MethodDef,
    TableKind::Attributes,
    TableKind::TypeSpec,
    TableKind::ResourcesData,
    TableKind::Resources,
    TableKind::ResourcesFiles,
    TableKind::Strings,
    TableKind::ByteCode,
    TableKind::EndOfAssembly,
];

/// Marks an absent handle, string or signature.
pub const NONE: u16 = 0xFFFF;

/// Set on handles that refer to a reference table instead of a definition table.
pub const EXTERNAL_TAG: u16 = 0x8000;

/// Exclusive upper bound of definition and reference IDs.
pub const MAX_ID: u16 = EXTERNAL_TAG;

/// A fixed-size table row.
pub trait TableRow {
    /// Encoded size of one row in bytes.
    const SIZE: usize;

    /// Serializes the row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the sink fails.
    fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()>;
}

/// Writes every row of `rows` in order.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if the sink fails.
pub fn write_rows<'a, R, W, I>(rows: I, writer: &mut BinaryWriter<W>) -> Result<()>
where
    R: TableRow + 'a,
    W: Write + Seek,
    I: IntoIterator<Item = &'a R>,
{
    for row in rows {
        row.write(writer)?;
    }
    Ok(())
}

/// Handle to a definition or a reference of the same kind (type, field or method).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    /// Row of a definition table
    Def(u16),
    /// Row of a reference table
    Ref(u16),
}

impl Handle {
    /// The 16-bit encoding: definitions as-is, references with [`EXTERNAL_TAG`].
    #[must_use]
    pub const fn encode(self) -> u16 {
        match self {
            Handle::Def(id) => id,
            Handle::Ref(id) => id | EXTERNAL_TAG,
        }
    }
}

/// Handle to any type: definition, reference or specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeHandle {
    /// Row of the type definition table
    Def(u16),
    /// Row of the type reference table
    Ref(u16),
    /// Row of the type specification table
    Spec(u16),
}

impl TypeHandle {
    /// Two-bit tagged encoding used by byte-code type operands: `00` definition, `01`
    /// reference, `10` specification, followed by a 14-bit ID.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CapacityOverflow`] if the ID does not fit into 14 bits.
    pub fn encode_token(self) -> Result<u16> {
        let (tag, id) = match self {
            TypeHandle::Def(id) => (0x0000, id),
            TypeHandle::Ref(id) => (0x4000, id),
            TypeHandle::Spec(id) => (0x8000, id),
        };
        if id >= 0x4000 {
            return Err(crate::Error::CapacityOverflow {
                what: "type operand id",
                value: u64::from(id),
                limit: 0x3FFF,
            });
        }
        Ok(tag | id)
    }
}

impl From<Handle> for TypeHandle {
    fn from(handle: Handle) -> Self {
        match handle {
            Handle::Def(id) => TypeHandle::Def(id),
            Handle::Ref(id) => TypeHandle::Ref(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_emission_order_covers_every_kind_once() {
        let ordered: HashSet<TableKind> = EMISSION_ORDER.iter().copied().collect();
        assert_eq!(ordered.len(), TableKind::COUNT);
        for kind in TableKind::iter() {
            assert!(ordered.contains(&kind));
        }
        assert_eq!(EMISSION_ORDER[TableKind::COUNT - 1], TableKind::EndOfAssembly);
    }

    #[test]
    fn test_slot_indices() {
        let indices: Vec<usize> = TableKind::iter().map(TableKind::index).collect();
        assert_eq!(indices, (0..16).collect::<Vec<_>>());
        assert_eq!(TableKind::Strings.index(), 11);
    }

    #[test]
    fn test_handle_encoding() {
        assert_eq!(Handle::Def(5).encode(), 5);
        assert_eq!(Handle::Ref(5).encode(), 0x8005);
    }

    #[test]
    fn test_type_token_encoding() {
        assert_eq!(TypeHandle::Def(3).encode_token().unwrap(), 0x0003);
        assert_eq!(TypeHandle::Ref(3).encode_token().unwrap(), 0x4003);
        assert_eq!(TypeHandle::Spec(3).encode_token().unwrap(), 0x8003);
        assert!(TypeHandle::Ref(0x4000).encode_token().is_err());
    }
}
