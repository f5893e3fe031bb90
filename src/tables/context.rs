//! The table arena of one build.
//!
//! [`TablesContext`] owns every table of an image. Construction runs the whole symbol
//! resolution in a fixed order:
//!
//! 1. plan definition IDs and create the symbol tables
//! 2. encode every method body (creating references, strings and signatures on the way)
//! 3. build the method, field and type definition rows
//! 4. build the attribute rows
//! 5. build the resource tables against a secondary string table, then merge it into the
//!    main one (the merge order is the string table's sorter) and remap the file names
//!
//! After construction no ID changes any more, so the image writer can serialize tables in any
//! order through [`TablesContext::write`].

use std::{
    io::{Seek, Write},
    sync::Arc,
};

use crate::{
    file::{io::ByteOrder, writer::BinaryWriter},
    model::Assembly,
    tables::{
        attributes::{self, AttributeRow},
        bytecode::ByteCodeTable,
        members::{self, FieldDefRow, MethodDefRow},
        references::{AssemblyRefRow, MemberRefRow, TypeRefRow},
        resources::{ResourceFileRow, ResourceRow, ResourceTables, ResourceTranscoder},
        strings::{IdentitySorter, StringTable},
        symbols::SymbolTables,
        typedefs::{self, TypeDefRow},
        typespecs::TypeSpecRow,
        write_rows, TableKind, TableRow,
    },
    Result,
};

/// All tables of one image, fully resolved.
pub struct TablesContext<'a> {
    /// Strings, signatures, reference tables and the definition plan
    pub symbols: SymbolTables<'a>,
    /// String ID of the assembly name
    pub name: u16,
    /// Type definition rows
    pub type_defs: Vec<TypeDefRow>,
    /// Field definition rows
    pub field_defs: Vec<FieldDefRow>,
    /// Method definition rows
    pub method_defs: Vec<MethodDefRow>,
    /// Custom attribute rows
    pub attributes: Vec<AttributeRow>,
    /// Encoded method bodies
    pub byte_code: ByteCodeTable,
    /// Resource directory, data and files
    pub resources: ResourceTables,
}

impl<'a> TablesContext<'a> {
    /// Builds every table of `assembly`.
    ///
    /// # Arguments
    ///
    /// * `assembly` - The assembly to pack
    /// * `order` - Byte order of the image
    /// * `strings` - The (possibly pre-seeded) string table to intern into
    /// * `transcoder` - Converter for bitmap and font resources
    ///
    /// # Errors
    ///
    /// Returns the first failure, wrapped with the table that was being built.
    pub fn build(
        assembly: &'a Assembly,
        order: ByteOrder,
        strings: StringTable,
        transcoder: &dyn ResourceTranscoder,
    ) -> Result<Self> {
        let mut symbols = SymbolTables::new(assembly, order, strings)
            .map_err(|e| e.in_table(TableKind::TypeDef))?;
        let name = symbols
            .string(&assembly.name)
            .map_err(|e| e.in_table(TableKind::Strings))?;

        let byte_code =
            ByteCodeTable::build(&mut symbols).map_err(|e| e.in_table(TableKind::ByteCode))?;
        let method_defs = members::build_method_rows(&mut symbols, byte_code.bodies())
            .map_err(|e| e.in_table(TableKind::MethodDef))?;
        let field_defs = members::build_field_rows(&mut symbols)
            .map_err(|e| e.in_table(TableKind::FieldDef))?;
        let type_defs =
            typedefs::build_rows(&mut symbols).map_err(|e| e.in_table(TableKind::TypeDef))?;
        let attributes =
            attributes::build_rows(&mut symbols).map_err(|e| e.in_table(TableKind::Attributes))?;
        let mut resource_names = StringTable::new(false, Arc::new(IdentitySorter));
        let mut resources =
            ResourceTables::build(
                &assembly.resource_files,
                &mut resource_names,
                transcoder,
                order,
            )
                .map_err(|e| e.in_table(TableKind::Resources))?;
        let remap = symbols
            .strings
            .merge(&resource_names)
            .map_err(|e| e.in_table(TableKind::Strings))?;
        resources.remap_names(&remap);

        Ok(TablesContext {
            symbols,
            name,
            type_defs,
            field_defs,
            method_defs,
            attributes,
            byte_code,
            resources,
        })
    }

    /// Number of rows of a fixed-row table, `None` for heaps and the end marker.
    #[must_use]
    pub fn row_count(&self, kind: TableKind) -> Option<usize> {
        let count = match kind {
            TableKind::AssemblyRef => self.symbols.assembly_refs.len(),
            TableKind::TypeRef => self.symbols.type_refs.len(),
            TableKind::FieldRef => self.symbols.field_refs.len(),
            TableKind::MethodRef => self.symbols.method_refs.len(),
            TableKind::TypeDef => self.type_defs.len(),
            TableKind::FieldDef => self.field_defs.len(),
            TableKind::MethodDef => self.method_defs.len(),
            TableKind::Attributes => self.attributes.len(),
            TableKind::TypeSpec => self.symbols.type_specs.len(),
            TableKind::Resources => self.resources.rows().len(),
            TableKind::ResourcesFiles => self.resources.files().len(),
            TableKind::ResourcesData
            | TableKind::Strings
            | TableKind::Signatures
            | TableKind::ByteCode
            | TableKind::EndOfAssembly => return None,
        };
        Some(count)
    }

    /// Serialized size of a table in bytes, without alignment padding.
    #[must_use]
    pub fn byte_size(&self, kind: TableKind) -> usize {
        let row_size = match kind {
            TableKind::AssemblyRef => AssemblyRefRow::SIZE,
            TableKind::TypeRef => TypeRefRow::SIZE,
            TableKind::FieldRef | TableKind::MethodRef => MemberRefRow::SIZE,
            TableKind::TypeDef => TypeDefRow::SIZE,
            TableKind::FieldDef => FieldDefRow::SIZE,
            TableKind::MethodDef => MethodDefRow::SIZE,
            TableKind::Attributes => AttributeRow::SIZE,
            TableKind::TypeSpec => TypeSpecRow::SIZE,
            TableKind::Resources => ResourceRow::SIZE,
            TableKind::ResourcesFiles => ResourceFileRow::SIZE,
            TableKind::ResourcesData => return self.resources.data().len(),
            TableKind::Strings => return self.symbols.strings.byte_len(),
            TableKind::Signatures => return self.symbols.signatures.len(),
            TableKind::ByteCode => return self.byte_code.len(),
            TableKind::EndOfAssembly => return 0,
        };
        row_size * self.row_count(kind).unwrap_or_default()
    }

    /// Serializes the table `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the sink fails.
    pub fn write<W: Write + Seek>(
        &self,
        kind: TableKind,
        writer: &mut BinaryWriter<W>,
    ) -> Result<()> {
        match kind {
            TableKind::AssemblyRef => self.symbols.assembly_refs.write(writer),
            TableKind::TypeRef => self.symbols.type_refs.write(writer),
            TableKind::FieldRef => self.symbols.field_refs.write(writer),
            TableKind::MethodRef => self.symbols.method_refs.write(writer),
            TableKind::TypeDef => write_rows(&self.type_defs, writer),
            TableKind::FieldDef => write_rows(&self.field_defs, writer),
            TableKind::MethodDef => write_rows(&self.method_defs, writer),
            TableKind::Attributes => write_rows(&self.attributes, writer),
            TableKind::TypeSpec => self.symbols.type_specs.write(writer),
            TableKind::Resources => self.resources.write_directory(writer),
            TableKind::ResourcesData => self.resources.write_data(writer),
            TableKind::Strings => self.symbols.strings.write(writer),
            TableKind::Signatures => self.symbols.signatures.write(writer),
            TableKind::ByteCode => self.byte_code.write(writer),
            TableKind::ResourcesFiles => self.resources.write_files(writer),
            TableKind::EndOfAssembly => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use strum::IntoEnumIterator;

    use super::*;
    use crate::{tables::resources::PassthroughTranscoder, test::hello_world, Error};

    fn build(assembly: &Assembly) -> Result<TablesContext<'_>> {
        TablesContext::build(
            assembly,
            ByteOrder::Little,
            StringTable::default(),
            &PassthroughTranscoder,
        )
    }

    #[test]
    fn test_builds_every_table() {
        let assembly = hello_world();
        let context = build(&assembly).unwrap();

        assert_eq!(context.row_count(TableKind::AssemblyRef), Some(1));
        assert_eq!(context.row_count(TableKind::TypeRef), Some(2));
        assert_eq!(context.row_count(TableKind::MethodRef), Some(1));
        assert_eq!(context.row_count(TableKind::TypeDef), Some(1));
        assert_eq!(context.row_count(TableKind::FieldDef), Some(1));
        assert_eq!(context.row_count(TableKind::MethodDef), Some(1));
        assert_eq!(context.row_count(TableKind::Resources), Some(2));
        assert_eq!(context.row_count(TableKind::Strings), None);
        assert_eq!(context.symbols.strings.try_get("App"), Some(context.name));
        assert_eq!(context.method_defs[0].rva, 0);
    }

    #[test]
    fn test_written_size_matches_byte_size() {
        let assembly = hello_world();
        let context = build(&assembly).unwrap();

        for kind in TableKind::iter() {
            let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), ByteOrder::Little);
            context.write(kind, &mut writer).unwrap();
            let written = writer.into_inner().into_inner().len();
            assert_eq!(written, context.byte_size(kind), "{kind:?}");
        }
    }

    #[test]
    fn test_resource_names_are_merged() {
        let assembly = hello_world();
        let context = build(&assembly).unwrap();

        let id = context
            .symbols
            .strings
            .try_get("App.Strings.resources")
            .unwrap();
        assert_ne!(id, 0);
        assert_eq!(context.resources.files()[0].name, id);
    }

    #[test]
    fn test_errors_name_the_table() {
        let mut assembly = hello_world();
        assembly.references.clear();

        match build(&assembly) {
            Err(Error::InTable { table, source }) => {
                assert_eq!(table, TableKind::ByteCode);
                assert!(matches!(*source, Error::InMethod { .. }));
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}
