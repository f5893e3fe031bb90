//! The custom attribute table.
//!
//! Rows are grouped by owner table (types, then fields, then methods) and ordered by owner ID
//! inside each group, so a runtime can binary-search the attributes of a given owner. Several
//! attributes on one owner keep their declaration order.

use std::io::{Seek, Write};

use crate::{
    file::writer::BinaryWriter,
    model::CustomAttribute,
    tables::{symbols::SymbolTables, TableKind, TableRow},
    utils::math::to_u16,
    Result,
};

/// One custom attribute instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRow {
    /// Owner table: [`TableKind::TypeDef`], [`TableKind::FieldDef`] or [`TableKind::MethodDef`]
    pub owner_kind: TableKind,
    /// Row ID of the owner
    pub owner: u16,
    /// Constructor handle: a method definition ID, or `EXTERNAL_TAG | method reference ID`
    pub constructor: u16,
    /// Signature ID of the argument data
    pub data: u16,
}

impl TableRow for AttributeRow {
    const SIZE: usize = 8;

    fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_u16(to_u16(self.owner_kind.index(), "attribute owner kind")?)?;
        writer.write_u16(self.owner)?;
        writer.write_u16(self.constructor)?;
        writer.write_u16(self.data)?;
        Ok(())
    }
}

fn push_rows(
    symbols: &mut SymbolTables<'_>,
    rows: &mut Vec<AttributeRow>,
    owner_kind: TableKind,
    owner: usize,
    attributes: &[CustomAttribute],
) -> Result<()> {
    let owner = to_u16(owner, "attribute owner")?;
    for attribute in attributes {
        let constructor = symbols.method_handle(&attribute.constructor)?.encode();
        let data = symbols.attribute_signature(attribute)?;
        rows.push(AttributeRow {
            owner_kind,
            owner,
            constructor,
            data,
        });
    }
    Ok(())
}

/// Builds the attribute rows of every type, field and method.
///
/// # Errors
///
/// Returns resolution errors for constructors and the encoding errors of the argument data.
pub fn build_rows(symbols: &mut SymbolTables<'_>) -> Result<Vec<AttributeRow>> {
    let assembly = symbols.assembly;
    let types: Vec<usize> = symbols.plan.types.iter().map(|t| t.index).collect();
    let fields = symbols.plan.fields.clone();
    let methods = symbols.plan.methods.clone();
    let mut rows = Vec::new();

    for (id, index) in types.into_iter().enumerate() {
        let ty = &assembly.types[index];
        push_rows(symbols, &mut rows, TableKind::TypeDef, id, &ty.attributes)?;
    }
    for (id, (t, f)) in fields.into_iter().enumerate() {
        let field = &assembly.types[t].fields[f];
        push_rows(symbols, &mut rows, TableKind::FieldDef, id, &field.attributes)?;
    }
    for (id, (t, m)) in methods.into_iter().enumerate() {
        let method = &assembly.types[t].methods[m];
        push_rows(symbols, &mut rows, TableKind::MethodDef, id, &method.attributes)?;
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{
        file::io::ByteOrder,
        model::{
            Assembly, AssemblyName, AttributeValue, FieldAttributes, FieldDefinition,
            MethodAttributes, MethodDefinition, MethodRef, MethodSig, TypeDefinition, TypeName,
            TypeSig, Version,
        },
        tables::strings::StringTable,
    };

    fn obsolete() -> MethodRef {
        MethodRef::new(
            TypeName::new("mscorlib", "System", "ObsoleteAttribute"),
            ".ctor",
            MethodSig::instance(TypeSig::Void, vec![TypeSig::String]),
        )
    }

    fn attribute(message: &str) -> CustomAttribute {
        CustomAttribute::new(
            obsolete(),
            vec![AttributeValue::String(Some(message.to_string()))],
        )
    }

    #[test]
    fn test_grouping_and_order() {
        let mut assembly = Assembly::new("App");
        assembly
            .references
            .push(AssemblyName::new("mscorlib", Version::new(1, 0, 0, 0)));

        let mut b = TypeDefinition::new(TypeName::new("App", "App", "B"));
        let mut method = MethodDefinition::new(
            "Old",
            MethodAttributes::STATIC,
            MethodSig::static_(TypeSig::Void, vec![]),
        );
        method.attributes.push(attribute("m"));
        b.methods.push(method);
        b.attributes.push(attribute("b1"));
        b.attributes.push(attribute("b2"));

        let mut a = TypeDefinition::new(TypeName::new("App", "App", "A"));
        let mut field = FieldDefinition::new("f", FieldAttributes::STATIC, TypeSig::I4);
        field.attributes.push(attribute("f"));
        a.fields.push(field);
        a.attributes.push(attribute("a"));

        assembly.types.extend([b, a]);

        let mut symbols =
            SymbolTables::new(&assembly, ByteOrder::Little, StringTable::default()).unwrap();
        let rows = build_rows(&mut symbols).unwrap();
        let owners: Vec<(TableKind, u16)> = rows.iter().map(|r| (r.owner_kind, r.owner)).collect();
        assert_eq!(
            owners,
            [
                (TableKind::TypeDef, 0),
                (TableKind::TypeDef, 1),
                (TableKind::TypeDef, 1),
                (TableKind::FieldDef, 0),
                (TableKind::MethodDef, 0),
            ]
        );
        assert!(rows.iter().all(|r| r.constructor == 0x8000));
        assert_ne!(rows[1].data, rows[2].data);

        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), ByteOrder::Little);
        rows[3].write(&mut writer).unwrap();
        let bytes = writer.into_inner().into_inner();
        assert_eq!(&bytes[..6], &[5, 0, 0, 0, 0, 0x80]);
    }
}
