//! The type definition table.

use std::io::{Seek, Write};

use bitflags::bitflags;

use crate::{
    file::writer::BinaryWriter,
    model::{TypeAttributes, TypeDefinition, TypeName, TypeSig},
    tables::{symbols::SymbolTables, TableRow, NONE},
    Result,
};

bitflags! {
    /// Type flags as stored in the image.
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default)]
    pub struct TypeDefFlags: u16 {
        /// Mask for the visibility bits, same values as the source metadata
        const SCOPE_MASK = 0x0007;
        /// Serializable
        const SERIALIZABLE = 0x0008;
        /// Mask for the semantics bits
        const SEMANTICS_MASK = 0x0030;
        /// Value type semantics
        const VALUE_TYPE = 0x0010;
        /// Interface semantics
        const INTERFACE = 0x0020;
        /// Enum semantics
        const ENUM = 0x0030;
        /// Abstract
        const ABSTRACT = 0x0040;
        /// Sealed
        const SEALED = 0x0080;
        /// Special name
        const SPECIAL_NAME = 0x0100;
        /// Derives from `System.Delegate`
        const DELEGATE = 0x0200;
        /// Derives from `System.MulticastDelegate`
        const MULTICAST_DELEGATE = 0x0400;
        /// Reserved for the runtime
        const PATCHED = 0x0800;
        /// Static initializer may run lazily
        const BEFORE_FIELD_INIT = 0x1000;
        /// Has security declarations
        const HAS_SECURITY = 0x2000;
        /// Declares a finalizer
        const HAS_FINALIZER = 0x4000;
        /// Has custom attributes
        const HAS_ATTRIBUTES = 0x8000;
    }
}

impl TypeDefFlags {
    /// Derives the image flags of `ty`.
    #[must_use]
    pub fn from_definition(ty: &TypeDefinition) -> Self {
        let source = ty.flags;
        let mut flags =
            TypeDefFlags::from_bits_retain((source & TypeAttributes::VISIBILITY_MASK).bits() as u16);

        if ty.is_enum() {
            flags |= TypeDefFlags::ENUM;
        } else if source.contains(TypeAttributes::INTERFACE) {
            flags |= TypeDefFlags::INTERFACE;
        } else if ty.is_value_type() {
            flags |= TypeDefFlags::VALUE_TYPE;
        }

        let pairs = [
            (TypeAttributes::SERIALIZABLE, TypeDefFlags::SERIALIZABLE),
            (TypeAttributes::ABSTRACT, TypeDefFlags::ABSTRACT),
            (TypeAttributes::SEALED, TypeDefFlags::SEALED),
            (TypeAttributes::SPECIAL_NAME, TypeDefFlags::SPECIAL_NAME),
            (TypeAttributes::BEFORE_FIELD_INIT, TypeDefFlags::BEFORE_FIELD_INIT),
            (TypeAttributes::HAS_SECURITY, TypeDefFlags::HAS_SECURITY),
        ];
        for (from, to) in pairs {
            if source.contains(from) {
                flags |= to;
            }
        }

        if let Some(base) = &ty.base {
            if base.namespace == "System" && base.name == "MulticastDelegate" {
                flags |= TypeDefFlags::MULTICAST_DELEGATE;
            } else if base.namespace == "System" && base.name == "Delegate" {
                flags |= TypeDefFlags::DELEGATE;
            }
        }

        if ty.methods.iter().any(|m| {
            m.name == "Finalize" && m.is_virtual() && m.signature.params.is_empty()
        }) {
            flags |= TypeDefFlags::HAS_FINALIZER;
        }
        if !ty.attributes.is_empty() {
            flags |= TypeDefFlags::HAS_ATTRIBUTES;
        }
        flags
    }
}

/// The runtime's compact classification of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
#[repr(u8)]
pub enum DataType {
    Void = 0,
    Boolean = 1,
    I1 = 2,
    U1 = 3,
    Char = 4,
    I2 = 5,
    U2 = 6,
    I4 = 7,
    U4 = 8,
    R4 = 9,
    I8 = 10,
    U8 = 11,
    R8 = 12,
    DateTime = 13,
    TimeSpan = 14,
    String = 15,
    Object = 16,
    Class = 17,
    ValueType = 18,
    SzArray = 19,
    ByRef = 20,
}

impl DataType {
    /// The encoded byte.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Built-in data type of a `System` type, if the runtime treats it specially.
    #[must_use]
    pub fn from_system_type(name: &TypeName) -> Option<DataType> {
        if name.namespace != "System" || name.declaring.is_some() {
            return None;
        }
        Some(match name.name.as_str() {
            "Void" => DataType::Void,
            "Boolean" => DataType::Boolean,
            "SByte" => DataType::I1,
            "Byte" => DataType::U1,
            "Char" => DataType::Char,
            "Int16" => DataType::I2,
            "UInt16" => DataType::U2,
            "Int32" | "IntPtr" => DataType::I4,
            "UInt32" | "UIntPtr" => DataType::U4,
            "Single" => DataType::R4,
            "Int64" => DataType::I8,
            "UInt64" => DataType::U8,
            "Double" => DataType::R8,
            "DateTime" => DataType::DateTime,
            "TimeSpan" => DataType::TimeSpan,
            "String" => DataType::String,
            "Object" => DataType::Object,
            _ => return None,
        })
    }

    /// Data type of a value of type `ty`.
    #[must_use]
    pub fn from_sig(ty: &TypeSig) -> DataType {
        match ty {
            TypeSig::Void => DataType::Void,
            TypeSig::Boolean => DataType::Boolean,
            TypeSig::Char => DataType::Char,
            TypeSig::I1 => DataType::I1,
            TypeSig::U1 => DataType::U1,
            TypeSig::I2 => DataType::I2,
            TypeSig::U2 => DataType::U2,
            TypeSig::I4 | TypeSig::I => DataType::I4,
            TypeSig::U4 | TypeSig::U | TypeSig::Ptr(_) => DataType::U4,
            TypeSig::I8 => DataType::I8,
            TypeSig::U8 => DataType::U8,
            TypeSig::R4 => DataType::R4,
            TypeSig::R8 => DataType::R8,
            TypeSig::String => DataType::String,
            TypeSig::Object | TypeSig::Var(_) | TypeSig::MVar(_) => DataType::Object,
            TypeSig::Class(name) => match DataType::from_system_type(name) {
                Some(builtin @ (DataType::String | DataType::Object)) => builtin,
                _ => DataType::Class,
            },
            TypeSig::ValueType(name) => match DataType::from_system_type(name) {
                Some(builtin) => builtin,
                None => DataType::ValueType,
            },
            TypeSig::SzArray(_) => DataType::SzArray,
            TypeSig::ByRef(_) => DataType::ByRef,
            TypeSig::GenericInst(base, _) => DataType::from_sig(base),
        }
    }

    /// Data type of instances of a defined type. Enums take the type of their `value__`
    /// field.
    #[must_use]
    pub fn from_definition(ty: &TypeDefinition) -> DataType {
        if let Some(builtin) = DataType::from_system_type(&ty.name) {
            return builtin;
        }
        if ty.is_enum() {
            if let Some(underlying) = ty.fields.iter().find(|f| !f.is_static()) {
                return DataType::from_sig(&underlying.ty);
            }
        }
        if ty.is_value_type() {
            DataType::ValueType
        } else {
            DataType::Class
        }
    }
}

/// One type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDefRow {
    /// String ID of the simple name
    pub name: u16,
    /// String ID of the namespace
    pub namespace: u16,
    /// TypeDefOrRef handle of the base type, or [`NONE`]
    pub extends: u16,
    /// Type ID of the enclosing type, or [`NONE`]
    pub enclosing: u16,
    /// Signature ID of the interface list, or [`NONE`]
    pub interfaces: u16,
    /// ID of the first method
    pub first_method: u16,
    /// Number of virtual methods
    pub virtual_methods: u8,
    /// Number of non-virtual instance methods
    pub instance_methods: u8,
    /// Number of static methods
    pub static_methods: u8,
    /// Data type of instances
    pub data_type: DataType,
    /// ID of the first static field
    pub first_static_field: u16,
    /// ID of the first instance field
    pub first_instance_field: u16,
    /// Number of static fields
    pub static_fields: u8,
    /// Number of instance fields
    pub instance_fields: u8,
    /// Flags
    pub flags: TypeDefFlags,
}

impl TableRow for TypeDefRow {
    const SIZE: usize = 24;

    fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_u16(self.name)?;
        writer.write_u16(self.namespace)?;
        writer.write_u16(self.extends)?;
        writer.write_u16(self.enclosing)?;
        writer.write_u16(self.interfaces)?;
        writer.write_u16(self.first_method)?;
        writer.write_u8(self.virtual_methods)?;
        writer.write_u8(self.instance_methods)?;
        writer.write_u8(self.static_methods)?;
        writer.write_u8(self.data_type.value())?;
        writer.write_u16(self.first_static_field)?;
        writer.write_u16(self.first_instance_field)?;
        writer.write_u8(self.static_fields)?;
        writer.write_u8(self.instance_fields)?;
        writer.write_u16(self.flags.bits())?;
        Ok(())
    }
}

/// Builds one row per planned type, in type ID order.
///
/// # Errors
///
/// Returns resolution errors for base types, enclosing types and interfaces.
pub fn build_rows(symbols: &mut SymbolTables<'_>) -> Result<Vec<TypeDefRow>> {
    let assembly = symbols.assembly;
    let plans = symbols.plan.types.clone();
    let mut rows = Vec::with_capacity(plans.len());

    for plan in plans {
        let ty = &assembly.types[plan.index];

        let extends = match &ty.base {
            Some(base) => symbols.type_handle(base)?.encode(),
            None => NONE,
        };
        let enclosing = match ty.name.declaring.as_deref() {
            Some(outer) => symbols.plan.type_id(outer).ok_or_else(|| {
                inconsistent_error!("enclosing type of {} is not defined", ty.name)
            })?,
            None => NONE,
        };
        let interfaces = if ty.interfaces.is_empty() {
            NONE
        } else {
            symbols.interfaces_signature(&ty.interfaces)?
        };

        rows.push(TypeDefRow {
            name: symbols.string(&ty.name.name)?,
            namespace: symbols.string(&ty.name.namespace)?,
            extends,
            enclosing,
            interfaces,
            first_method: plan.first_method,
            virtual_methods: plan.virtual_methods,
            instance_methods: plan.instance_methods,
            static_methods: plan.static_methods,
            data_type: DataType::from_definition(ty),
            first_static_field: plan.first_static_field(),
            first_instance_field: plan.first_field,
            static_fields: plan.static_fields,
            instance_fields: plan.instance_fields,
            flags: TypeDefFlags::from_definition(ty),
        });
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
            AssemblyName, Assembly, FieldAttributes, FieldDefinition, MethodAttributes,
            MethodDefinition, MethodSig, Version,
        },
        tables::strings::StringTable,
    };

    fn system(name: &str) -> TypeName {
        TypeName::new("mscorlib", "System", name)
    }

    #[test]
    fn test_enum_takes_underlying_type() {
        let mut ty = TypeDefinition::new(TypeName::new("App", "App", "Mode"));
        ty.base = Some(system("Enum"));
        ty.fields.push(FieldDefinition::new(
            "value__",
            FieldAttributes::PUBLIC,
            TypeSig::U1,
        ));
        ty.fields.push(FieldDefinition::new(
            "On",
            FieldAttributes::STATIC | FieldAttributes::LITERAL,
            TypeSig::ValueType(TypeName::new("App", "App", "Mode")),
        ));
        assert_eq!(DataType::from_definition(&ty), DataType::U1);
        assert!(TypeDefFlags::from_definition(&ty).contains(TypeDefFlags::ENUM));
    }

    #[test]
    fn test_data_type_mapping() {
        assert_eq!(DataType::from_sig(&TypeSig::I), DataType::I4);
        assert_eq!(DataType::from_sig(&TypeSig::U), DataType::U4);
        assert_eq!(
            DataType::from_sig(&TypeSig::ValueType(system("DateTime"))),
            DataType::DateTime
        );
        assert_eq!(
            DataType::from_sig(&TypeSig::Class(TypeName::new("App", "App", "C"))),
            DataType::Class
        );
        assert_eq!(
            DataType::from_sig(&TypeSig::array(TypeSig::I4)),
            DataType::SzArray
        );
        assert_eq!(DataType::Class.value(), 17);
    }

    #[test]
    fn test_flags() {
        let mut ty = TypeDefinition::new(TypeName::new("App", "App", "Handler"));
        ty.flags = TypeAttributes::PUBLIC | TypeAttributes::SEALED;
        ty.base = Some(system("MulticastDelegate"));
        let flags = TypeDefFlags::from_definition(&ty);
        assert_eq!(
            flags,
            TypeDefFlags::from_bits_retain(1)
                | TypeDefFlags::SEALED
                | TypeDefFlags::MULTICAST_DELEGATE
        );

        let mut iface = TypeDefinition::new(TypeName::new("App", "App", "IThing"));
        iface.flags = TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT;
        iface.methods.push(MethodDefinition::new(
            "Finalize",
            MethodAttributes::VIRTUAL,
            MethodSig::instance(TypeSig::Void, vec![]),
        ));
        let flags = TypeDefFlags::from_definition(&iface);
        assert!(flags.contains(TypeDefFlags::INTERFACE | TypeDefFlags::ABSTRACT));
        assert!(flags.contains(TypeDefFlags::HAS_FINALIZER));
    }

    #[test]
    fn test_build_and_write_rows() {
        let mut assembly = Assembly::new("App");
        assembly
            .references
            .push(AssemblyName::new("mscorlib", Version::new(1, 0, 0, 0)));
        let outer_name = TypeName::new("App", "App", "Outer");
        let mut outer = TypeDefinition::new(outer_name.clone());
        outer.base = Some(system("Object"));
        outer.fields.push(FieldDefinition::new(
            "count",
            FieldAttributes::STATIC,
            TypeSig::I4,
        ));
        assembly.types.push(outer);
        assembly
            .types
            .push(TypeDefinition::new(TypeName::nested(&outer_name, "Inner")));

        let mut symbols =
            SymbolTables::new(&assembly, ByteOrder::Little, StringTable::default()).unwrap();
        let rows = build_rows(&mut symbols).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].extends, 0x8000);
        assert_eq!(rows[0].enclosing, NONE);
        assert_eq!((rows[0].first_static_field, rows[0].static_fields), (0, 1));
        assert_eq!(rows[1].enclosing, 0);
        assert_eq!(rows[1].extends, NONE);
        assert_eq!(rows[1].first_instance_field, 1);

        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), ByteOrder::Little);
        rows[0].write(&mut writer).unwrap();
        let bytes = writer.into_inner().into_inner();
        assert_eq!(bytes.len(), TypeDefRow::SIZE);
        assert_eq!(&bytes[4..8], &[0x00, 0x80, 0xff, 0xff]);
        assert_eq!(bytes[15], DataType::Class.value());
    }
}
