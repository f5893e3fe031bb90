//! The field and method definition tables.
//!
//! Rows are built in the ID order fixed by [`crate::tables::layout::LayoutPlan`]. Method rows
//! need the byte-code offset and maximum stack depth of their body, so they are built after the
//! byte-code table has encoded every body (see [`BodyInfo`]).

use std::io::{Seek, Write};

use bitflags::bitflags;

use crate::{
    file::writer::BinaryWriter,
    model::{
        FieldAttributes, FieldDefinition, MethodAttributes, MethodDefinition,
        MethodImplAttributes, TypeDefinition,
    },
    tables::{symbols::SymbolTables, typedefs::DataType, TableRow, NONE},
    utils::math::to_u8,
    Result,
};

bitflags! {
    /// Field flags as stored in the image.
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default)]
    pub struct FieldDefFlags: u16 {
        /// Mask for the accessibility bits, same values as the source metadata
        const SCOPE_MASK = 0x0007;
        /// Not serialized
        const NOT_SERIALIZED = 0x0008;
        /// Static
        const STATIC = 0x0010;
        /// Set only during initialization
        const INIT_ONLY = 0x0020;
        /// Compile-time constant
        const LITERAL = 0x0040;
        /// Special name
        const SPECIAL_NAME = 0x0100;
        /// Has a default value
        const HAS_DEFAULT = 0x0200;
        /// Has an RVA
        const HAS_FIELD_RVA = 0x0400;
        /// Hidden from reflection
        const NO_REFLECTION = 0x0800;
        /// Has custom attributes
        const HAS_ATTRIBUTES = 0x1000;
    }
}

impl FieldDefFlags {
    /// Derives the image flags of `field`.
    #[must_use]
    pub fn from_definition(field: &FieldDefinition) -> Self {
        let source = field.flags;
        let mut flags = FieldDefFlags::from_bits_retain(source.access());
        let pairs = [
            (FieldAttributes::NOT_SERIALIZED, FieldDefFlags::NOT_SERIALIZED),
            (FieldAttributes::STATIC, FieldDefFlags::STATIC),
            (FieldAttributes::INIT_ONLY, FieldDefFlags::INIT_ONLY),
            (FieldAttributes::LITERAL, FieldDefFlags::LITERAL),
            (FieldAttributes::SPECIAL_NAME, FieldDefFlags::SPECIAL_NAME),
            (FieldAttributes::HAS_FIELD_RVA, FieldDefFlags::HAS_FIELD_RVA),
        ];
        for (from, to) in pairs {
            if source.contains(from) {
                flags |= to;
            }
        }
        if field.default_value.is_some() {
            flags |= FieldDefFlags::HAS_DEFAULT;
        }
        if !field.attributes.is_empty() {
            flags |= FieldDefFlags::HAS_ATTRIBUTES;
        }
        flags
    }
}

bitflags! {
    /// Method flags as stored in the image.
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default)]
    pub struct MethodDefFlags: u32 {
        /// Mask for the accessibility bits, same values as the source metadata
        const SCOPE_MASK = 0x0000_0007;
        /// Static
        const STATIC = 0x0000_0010;
        /// Cannot be overridden
        const FINAL = 0x0000_0020;
        /// Virtual
        const VIRTUAL = 0x0000_0040;
        /// Hidden by name and signature
        const HIDE_BY_SIG = 0x0000_0080;
        /// Always gets a new vtable slot
        const NEW_SLOT = 0x0000_0100;
        /// Abstract
        const ABSTRACT = 0x0000_0200;
        /// Special name
        const SPECIAL_NAME = 0x0000_0400;
        /// Native code is profiled
        const NATIVE_PROFILED = 0x0000_0800;
        /// Instance constructor
        const CONSTRUCTOR = 0x0000_1000;
        /// Type initializer
        const STATIC_CONSTRUCTOR = 0x0000_2000;
        /// Finalizer
        const FINALIZER = 0x0000_4000;
        /// Constructor of a delegate type
        const DELEGATE_CONSTRUCTOR = 0x0001_0000;
        /// `Invoke` of a delegate type
        const DELEGATE_INVOKE = 0x0002_0000;
        /// `BeginInvoke` of a delegate type
        const DELEGATE_BEGIN_INVOKE = 0x0004_0000;
        /// `EndInvoke` of a delegate type
        const DELEGATE_END_INVOKE = 0x0008_0000;
        /// Synchronized on the instance
        const SYNCHRONIZED = 0x0100_0000;
        /// Synchronized on the type
        const GLOBALLY_SYNCHRONIZED = 0x0200_0000;
        /// Reserved for the runtime
        const PATCHED = 0x0400_0000;
        /// Assembly entry point
        const ENTRY_POINT = 0x0800_0000;
        /// Needs a security object
        const REQUIRE_SEC_OBJECT = 0x1000_0000;
        /// Has security declarations
        const HAS_SECURITY = 0x2000_0000;
        /// Body has exception handlers
        const HAS_EXCEPTION_HANDLERS = 0x4000_0000;
        /// Has custom attributes
        const HAS_ATTRIBUTES = 0x8000_0000;
    }
}

impl MethodDefFlags {
    /// Derives the image flags of `method`, declared by `owner`.
    #[must_use]
    pub fn from_definition(
        owner: &TypeDefinition,
        method: &MethodDefinition,
        entry_point: bool,
    ) -> Self {
        let source = method.flags;
        let mut flags = MethodDefFlags::from_bits_retain(u32::from(source.access()));
        let pairs = [
            (MethodAttributes::STATIC, MethodDefFlags::STATIC),
            (MethodAttributes::FINAL, MethodDefFlags::FINAL),
            (MethodAttributes::VIRTUAL, MethodDefFlags::VIRTUAL),
            (MethodAttributes::HIDE_BY_SIG, MethodDefFlags::HIDE_BY_SIG),
            (MethodAttributes::NEW_SLOT, MethodDefFlags::NEW_SLOT),
            (MethodAttributes::ABSTRACT, MethodDefFlags::ABSTRACT),
            (MethodAttributes::SPECIAL_NAME, MethodDefFlags::SPECIAL_NAME),
        ];
        for (from, to) in pairs {
            if source.contains(from) {
                flags |= to;
            }
        }

        match method.name.as_str() {
            ".ctor" => flags |= MethodDefFlags::CONSTRUCTOR,
            ".cctor" => flags |= MethodDefFlags::STATIC_CONSTRUCTOR,
            "Finalize" if method.is_virtual() && method.signature.params.is_empty() => {
                flags |= MethodDefFlags::FINALIZER;
            }
            _ => {}
        }

        if owner.is_delegate() {
            match method.name.as_str() {
                ".ctor" => flags |= MethodDefFlags::DELEGATE_CONSTRUCTOR,
                "Invoke" => flags |= MethodDefFlags::DELEGATE_INVOKE,
                "BeginInvoke" => flags |= MethodDefFlags::DELEGATE_BEGIN_INVOKE,
                "EndInvoke" => flags |= MethodDefFlags::DELEGATE_END_INVOKE,
                _ => {}
            }
        }

        if method.impl_flags.contains(MethodImplAttributes::SYNCHRONIZED) {
            flags |= if method.is_static() {
                MethodDefFlags::GLOBALLY_SYNCHRONIZED
            } else {
                MethodDefFlags::SYNCHRONIZED
            };
        }
        if entry_point {
            flags |= MethodDefFlags::ENTRY_POINT;
        }
        if method
            .body
            .as_ref()
            .is_some_and(|body| !body.exception_handlers.is_empty())
        {
            flags |= MethodDefFlags::HAS_EXCEPTION_HANDLERS;
        }
        if !method.attributes.is_empty() {
            flags |= MethodDefFlags::HAS_ATTRIBUTES;
        }
        flags
    }
}

/// One field definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefRow {
    /// String ID of the name
    pub name: u16,
    /// Signature ID of the field type
    pub signature: u16,
    /// Signature ID of the default value blob, or [`NONE`]
    pub default_value: u16,
    /// Flags
    pub flags: FieldDefFlags,
}

impl TableRow for FieldDefRow {
    const SIZE: usize = 8;

    fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_u16(self.name)?;
        writer.write_u16(self.signature)?;
        writer.write_u16(self.default_value)?;
        writer.write_u16(self.flags.bits())?;
        Ok(())
    }
}

/// One method definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDefRow {
    /// String ID of the name
    pub name: u16,
    /// Offset of the body in the byte-code table, or [`NONE`]
    pub rva: u16,
    /// Flags
    pub flags: MethodDefFlags,
    /// Data type of the return value
    pub return_type: DataType,
    /// Number of arguments, including `this`
    pub arguments: u8,
    /// Number of locals
    pub locals: u8,
    /// Maximum evaluation stack depth
    pub max_stack: u8,
    /// Signature ID of the local list, or [`NONE`]
    pub locals_signature: u16,
    /// Signature ID of the method signature
    pub signature: u16,
}

impl TableRow for MethodDefRow {
    const SIZE: usize = 16;

    fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_u16(self.name)?;
        writer.write_u16(self.rva)?;
        writer.write_u32(self.flags.bits())?;
        writer.write_u8(self.return_type.value())?;
        writer.write_u8(self.arguments)?;
        writer.write_u8(self.locals)?;
        writer.write_u8(self.max_stack)?;
        writer.write_u16(self.locals_signature)?;
        writer.write_u16(self.signature)?;
        Ok(())
    }
}

/// Placement of an encoded method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyInfo {
    /// Offset in the byte-code table
    pub rva: u16,
    /// Maximum evaluation stack depth
    pub max_stack: u8,
}

/// Builds one row per planned field, in field ID order.
///
/// # Errors
///
/// Returns signature encoding and capacity errors.
pub fn build_field_rows(symbols: &mut SymbolTables<'_>) -> Result<Vec<FieldDefRow>> {
    let assembly = symbols.assembly;
    let fields = symbols.plan.fields.clone();
    let mut rows = Vec::with_capacity(fields.len());

    for (type_index, field_index) in fields {
        let field = &assembly.types[type_index].fields[field_index];
        let default_value = match &field.default_value {
            Some(data) => symbols.blob_signature(data)?,
            None => NONE,
        };
        rows.push(FieldDefRow {
            name: symbols.string(&field.name)?,
            signature: symbols.field_signature(&field.ty)?,
            default_value,
            flags: FieldDefFlags::from_definition(field),
        });
    }
    Ok(rows)
}

/// Builds one row per planned method, in method ID order. `bodies` holds the placement of each
/// method's body, indexed by method ID.
///
/// # Errors
///
/// Returns signature encoding and capacity errors, wrapped with the method name.
pub fn build_method_rows(
    symbols: &mut SymbolTables<'_>,
    bodies: &[Option<BodyInfo>],
) -> Result<Vec<MethodDefRow>> {
    let assembly = symbols.assembly;
    let methods = symbols.plan.methods.clone();
    let mut rows = Vec::with_capacity(methods.len());

    for (id, (type_index, method_index)) in methods.into_iter().enumerate() {
        let owner = &assembly.types[type_index];
        let method = &owner.methods[method_index];
        let entry_point = assembly
            .entry_point
            .as_ref()
            .is_some_and(|entry| entry == &method.to_ref(&owner.name));

        let row = build_method_row(
            symbols,
            owner,
            method,
            bodies.get(id).copied().flatten(),
            entry_point,
        )
        .map_err(|e| e.in_method(format!("{}::{}", owner.name, method.name)))?;
        rows.push(row);
    }
    Ok(rows)
}

fn build_method_row(
    symbols: &mut SymbolTables<'_>,
    owner: &TypeDefinition,
    method: &MethodDefinition,
    body: Option<BodyInfo>,
    entry_point: bool,
) -> Result<MethodDefRow> {
    let locals = method.body.as_ref().map_or(&[][..], |b| b.locals.as_slice());
    let locals_signature = if locals.is_empty() {
        NONE
    } else {
        symbols.locals_signature(locals)?
    };

    Ok(MethodDefRow {
        name: symbols.string(&method.name)?,
        rva: body.map_or(NONE, |b| b.rva),
        flags: MethodDefFlags::from_definition(owner, method, entry_point),
        return_type: DataType::from_sig(&method.signature.ret),
        arguments: to_u8(method.signature.argument_count(), "argument count")?,
        locals: to_u8(locals.len(), "local count")?,
        max_stack: body.map_or(0, |b| b.max_stack),
        locals_signature,
        signature: symbols.method_signature(&method.signature)?,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{
        file::io::ByteOrder,
        model::{
            Assembly, MethodBody, MethodSig, OpCode, Operand, TypeName, TypeSig,
        },
        tables::strings::StringTable,
    };

    fn delegate_type() -> TypeDefinition {
        let mut ty = TypeDefinition::new(TypeName::new("App", "App", "Callback"));
        ty.base = Some(TypeName::new("mscorlib", "System", "MulticastDelegate"));
        ty
    }

    #[test]
    fn test_method_flags() {
        let owner = delegate_type();
        let ctor = MethodDefinition::new(
            ".ctor",
            MethodAttributes::PUBLIC | MethodAttributes::SPECIAL_NAME,
            MethodSig::instance(TypeSig::Void, vec![TypeSig::Object, TypeSig::I]),
        );
        let flags = MethodDefFlags::from_definition(&owner, &ctor, false);
        assert!(flags.contains(
            MethodDefFlags::CONSTRUCTOR
                | MethodDefFlags::DELEGATE_CONSTRUCTOR
                | MethodDefFlags::SPECIAL_NAME
        ));
        assert_eq!((flags & MethodDefFlags::SCOPE_MASK).bits(), 6);

        let mut main = MethodDefinition::new(
            "Main",
            MethodAttributes::STATIC,
            MethodSig::static_(TypeSig::Void, vec![]),
        );
        main.impl_flags = MethodImplAttributes::SYNCHRONIZED;
        let flags = MethodDefFlags::from_definition(&owner, &main, true);
        assert!(flags.contains(
            MethodDefFlags::STATIC
                | MethodDefFlags::ENTRY_POINT
                | MethodDefFlags::GLOBALLY_SYNCHRONIZED
        ));
        assert!(!flags.contains(MethodDefFlags::SYNCHRONIZED));
    }

    #[test]
    fn test_field_flags() {
        let mut field = FieldDefinition::new(
            "Max",
            FieldAttributes::PUBLIC | FieldAttributes::STATIC | FieldAttributes::LITERAL,
            TypeSig::I4,
        );
        field.default_value = Some(vec![1, 0, 0, 0]);
        let flags = FieldDefFlags::from_definition(&field);
        assert_eq!(
            flags,
            FieldDefFlags::from_bits_retain(6)
                | FieldDefFlags::STATIC
                | FieldDefFlags::LITERAL
                | FieldDefFlags::HAS_DEFAULT
        );
    }

    #[test]
    fn test_build_rows() {
        let mut assembly = Assembly::new("App");
        let name = TypeName::new("App", "App", "Program");
        let mut ty = TypeDefinition::new(name.clone());
        ty.methods.push(
            MethodDefinition::new(
                "Main",
                MethodAttributes::STATIC,
                MethodSig::static_(TypeSig::I4, vec![TypeSig::String]),
            )
            .with_body(MethodBody::from_instructions(
                vec![TypeSig::I4],
                vec![(OpCode::LDC_I4_0, Operand::None), (OpCode::RET, Operand::None)],
            )),
        );
        ty.methods.push(MethodDefinition::new(
            "Native",
            MethodAttributes::STATIC,
            MethodSig::static_(TypeSig::Void, vec![]),
        ));
        let mut field = FieldDefinition::new("Answer", FieldAttributes::STATIC, TypeSig::I4);
        field.default_value = Some(vec![42, 0, 0, 0]);
        ty.fields.push(field);
        assembly.entry_point = Some(ty.methods[0].to_ref(&name));
        assembly.types.push(ty);

        let mut symbols =
            SymbolTables::new(&assembly, ByteOrder::Little, StringTable::default()).unwrap();
        let bodies = [
            Some(BodyInfo {
                rva: 0,
                max_stack: 1,
            }),
            None,
        ];
        let methods = build_method_rows(&mut symbols, &bodies).unwrap();
        assert_eq!(methods[0].arguments, 1);
        assert_eq!(methods[0].locals, 1);
        assert_eq!(methods[0].max_stack, 1);
        assert_eq!(methods[0].return_type, DataType::I4);
        assert!(methods[0].flags.contains(MethodDefFlags::ENTRY_POINT));
        assert_ne!(methods[0].locals_signature, NONE);
        assert_eq!(methods[1].rva, NONE);
        assert_eq!(methods[1].locals_signature, NONE);

        let fields = build_field_rows(&mut symbols).unwrap();
        assert_ne!(fields[0].default_value, NONE);

        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), ByteOrder::Little);
        methods[1].write(&mut writer).unwrap();
        fields[0].write(&mut writer).unwrap();
        let bytes = writer.into_inner().into_inner();
        assert_eq!(bytes.len(), MethodDefRow::SIZE + FieldDefRow::SIZE);
        assert_eq!(&bytes[2..4], &[0xff, 0xff]);
    }
}
