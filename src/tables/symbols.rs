//! Symbol resolution.
//!
//! [`SymbolTables`] owns every table that hands out IDs for symbols: strings, signatures, the
//! four reference tables and the type specifications, together with the [`LayoutPlan`] of the
//! local definitions. Resolving a symbol may create rows in several of these tables at once (a
//! method reference interns its name, its declaring type reference, that type's assembly
//! reference and its signature), so they live behind one `&mut self`.
//!
//! Method and field symbols resolve in this order:
//!
//! 1. an existing reference row,
//! 2. a local definition,
//! 3. a new reference row, if the declaring type belongs to another assembly.
//!
//! Anything else is a dangling symbol and fails with [`crate::Error::InconsistentModel`].

use crate::{
    file::io::ByteOrder,
    model::{Assembly, CustomAttribute, FieldRef, MethodRef, MethodSig, TypeName, TypeSig},
    tables::{
        layout::LayoutPlan,
        references::{AssemblyRefRow, MemberRefRow, ReferenceTable, TypeRefRow},
        signatures::{
            encode_attribute_data, encode_blob, encode_field_signature, encode_interfaces,
            encode_locals_signature, encode_method_signature, encode_type_signature,
            SignatureResolver, SignatureTable,
        },
        strings::StringTable,
        typespecs::{needs_spec, TypeSpecRow},
        Handle, TypeHandle, EXTERNAL_TAG,
    },
    Result,
};

/// The ID-issuing tables of one build.
pub struct SymbolTables<'a> {
    /// The assembly being linked
    pub assembly: &'a Assembly,
    /// Byte order of the image
    pub order: ByteOrder,
    /// IDs of the local definitions
    pub plan: LayoutPlan,
    /// String table
    pub strings: StringTable,
    /// Signature pool
    pub signatures: SignatureTable,
    /// Referenced assemblies, keyed by simple name
    pub assembly_refs: ReferenceTable<String, AssemblyRefRow>,
    /// Referenced types
    pub type_refs: ReferenceTable<TypeName, TypeRefRow>,
    /// Referenced fields
    pub field_refs: ReferenceTable<FieldRef, MemberRefRow>,
    /// Referenced methods
    pub method_refs: ReferenceTable<MethodRef, MemberRefRow>,
    /// Type specifications
    pub type_specs: ReferenceTable<TypeSig, TypeSpecRow>,
}

impl<'a> SymbolTables<'a> {
    /// Plans the definitions of `assembly` and creates empty symbol tables.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`LayoutPlan::new`].
    pub fn new(assembly: &'a Assembly, order: ByteOrder, strings: StringTable) -> Result<Self> {
        Ok(SymbolTables {
            assembly,
            order,
            plan: LayoutPlan::new(assembly)?,
            strings,
            signatures: SignatureTable::new(),
            assembly_refs: ReferenceTable::new("assembly reference"),
            type_refs: ReferenceTable::new("type reference"),
            field_refs: ReferenceTable::new("field reference"),
            method_refs: ReferenceTable::new("method reference"),
            type_specs: ReferenceTable::new("type specification"),
        })
    }

    /// Interns a string.
    ///
    /// # Errors
    ///
    /// See [`StringTable::intern`].
    pub fn string(&mut self, value: &str) -> Result<u16> {
        self.strings.intern(value)
    }

    fn is_external(&self, name: &TypeName) -> bool {
        !self.plan.type_ids.contains_key(name) && name.assembly != self.assembly.name
    }

    /// ID of the referenced assembly `name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InconsistentModel`] if the assembly does not list `name` among
    /// its references.
    pub fn assembly_ref(&mut self, name: &str) -> Result<u16> {
        let key = name.to_string();
        if let Some(id) = self.assembly_refs.try_get_id(&key) {
            return Ok(id);
        }

        let reference = self
            .assembly
            .find_reference(name)
            .ok_or_else(|| inconsistent_error!("assembly {} is not referenced", name))?;
        let version = reference.version;
        let name_id = self.strings.intern(name)?;

        self.assembly_refs.get_or_create_id(&key, || {
            Ok(AssemblyRefRow {
                name: name_id,
                version,
            })
        })
    }

    /// ID of the type reference for the external type `name`.
    ///
    /// Nested types are scoped by their declaring type's reference, which is created first.
    ///
    /// # Errors
    ///
    /// Returns an error if the defining assembly is not referenced or a table is full.
    pub fn type_ref(&mut self, name: &TypeName) -> Result<u16> {
        if let Some(id) = self.type_refs.try_get_id(name) {
            return Ok(id);
        }

        let scope = match name.declaring.as_deref() {
            Some(outer) => EXTERNAL_TAG | self.type_ref(outer)?,
            None => self.assembly_ref(&name.assembly)?,
        };
        let name_id = self.strings.intern(&name.name)?;
        let namespace = self.strings.intern(&name.namespace)?;

        self.type_refs.get_or_create_id(name, || {
            Ok(TypeRefRow {
                name: name_id,
                namespace,
                scope,
            })
        })
    }

    /// Handle of a named type: its definition if local, otherwise its reference.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InconsistentModel`] for a type that claims to belong to this
    /// assembly but is not defined by it.
    pub fn type_handle(&mut self, name: &TypeName) -> Result<Handle> {
        if let Some(id) = self.plan.type_id(name) {
            return Ok(Handle::Def(id));
        }
        if !self.is_external(name) {
            return Err(inconsistent_error!("type {} is not defined", name));
        }
        Ok(Handle::Ref(self.type_ref(name)?))
    }

    /// Tagged type operand for byte code: definition, reference or type specification.
    ///
    /// # Errors
    ///
    /// Returns resolution and capacity errors.
    pub fn type_token(&mut self, ty: &TypeSig) -> Result<u16> {
        if !needs_spec(ty) {
            if let Some(name) = ty.type_name() {
                return TypeHandle::from(self.type_handle(name)?).encode_token();
            }
        }

        if let Some(id) = self.type_specs.try_get_id(ty) {
            return TypeHandle::Spec(id).encode_token();
        }

        let bytes = encode_type_signature(ty, self)?;
        let signature = self.signatures.get_or_create_signature_id(&bytes)?;
        let id = self
            .type_specs
            .get_or_create_id(ty, || Ok(TypeSpecRow { signature }))?;
        TypeHandle::Spec(id).encode_token()
    }

    /// Handle of a method: a reference if one exists, the local definition, or a new
    /// reference for methods of external types.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InconsistentModel`] for a method of a local type that is not
    /// defined.
    pub fn method_handle(&mut self, method: &MethodRef) -> Result<Handle> {
        if let Some(id) = self.method_refs.try_get_id(method) {
            return Ok(Handle::Ref(id));
        }
        if let Some(&id) = self.plan.method_ids.get(method) {
            return Ok(Handle::Def(id));
        }
        if !self.is_external(&method.declaring) {
            return Err(inconsistent_error!("method {} is not defined", method));
        }

        let container = self.type_ref(&method.declaring)?;
        let name = self.strings.intern(&method.name)?;
        let signature = self.method_signature(&method.signature)?;
        let id = self.method_refs.get_or_create_id(method, || {
            Ok(MemberRefRow {
                name,
                container,
                signature,
            })
        })?;
        Ok(Handle::Ref(id))
    }

    /// Handle of a field, resolved like [`SymbolTables::method_handle`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InconsistentModel`] for a field of a local type that is not
    /// defined.
    pub fn field_handle(&mut self, field: &FieldRef) -> Result<Handle> {
        if let Some(id) = self.field_refs.try_get_id(field) {
            return Ok(Handle::Ref(id));
        }
        if let Some(&id) = self.plan.field_ids.get(field) {
            return Ok(Handle::Def(id));
        }
        if !self.is_external(&field.declaring) {
            return Err(inconsistent_error!("field {} is not defined", field));
        }

        let container = self.type_ref(&field.declaring)?;
        let name = self.strings.intern(&field.name)?;
        let signature = self.field_signature(&field.ty)?;
        let id = self.field_refs.get_or_create_id(field, || {
            Ok(MemberRefRow {
                name,
                container,
                signature,
            })
        })?;
        Ok(Handle::Ref(id))
    }

    fn intern_signature(&mut self, bytes: &[u8]) -> Result<u16> {
        self.signatures.get_or_create_signature_id(bytes)
    }

    /// Signature ID of a method signature.
    ///
    /// # Errors
    ///
    /// Returns encoding and capacity errors.
    pub fn method_signature(&mut self, signature: &MethodSig) -> Result<u16> {
        let bytes = encode_method_signature(signature, self)?;
        self.intern_signature(&bytes)
    }

    /// Signature ID of a field type.
    ///
    /// # Errors
    ///
    /// Returns encoding and capacity errors.
    pub fn field_signature(&mut self, ty: &TypeSig) -> Result<u16> {
        let bytes = encode_field_signature(ty, self)?;
        self.intern_signature(&bytes)
    }

    /// Signature ID of a local variable list.
    ///
    /// # Errors
    ///
    /// Returns encoding and capacity errors.
    pub fn locals_signature(&mut self, locals: &[TypeSig]) -> Result<u16> {
        let bytes = encode_locals_signature(locals, self)?;
        self.intern_signature(&bytes)
    }

    /// Signature ID of an interface list.
    ///
    /// # Errors
    ///
    /// Returns encoding and capacity errors.
    pub fn interfaces_signature(&mut self, interfaces: &[TypeName]) -> Result<u16> {
        let bytes = encode_interfaces(interfaces, self)?;
        self.intern_signature(&bytes)
    }

    /// Signature ID of a length-prefixed blob.
    ///
    /// # Errors
    ///
    /// Returns capacity errors.
    pub fn blob_signature(&mut self, data: &[u8]) -> Result<u16> {
        let bytes = encode_blob(data, self.order)?;
        self.intern_signature(&bytes)
    }

    /// Signature ID of a custom attribute's argument data.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unsupported`] for argument shapes without an encoding, and
    /// resolution errors.
    pub fn attribute_signature(&mut self, attribute: &CustomAttribute) -> Result<u16> {
        let bytes = encode_attribute_data(attribute, self)?;
        self.intern_signature(&bytes)
    }
}

impl SignatureResolver for SymbolTables<'_> {
    fn byte_order(&self) -> ByteOrder {
        self.order
    }

    fn type_def_or_ref(&mut self, name: &TypeName) -> Result<u16> {
        Ok(self.type_handle(name)?.encode())
    }

    fn string_id(&mut self, value: &str) -> Result<u16> {
        self.strings.intern(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{AssemblyName, MethodAttributes, MethodDefinition, TypeDefinition, Version},
        Error,
    };

    fn assembly() -> Assembly {
        let mut assembly = Assembly::new("App");
        assembly
            .references
            .push(AssemblyName::new("mscorlib", Version::new(1, 0, 0, 0)));
        let mut program = TypeDefinition::new(TypeName::new("App", "App", "Program"));
        program.methods.push(MethodDefinition::new(
            "Run",
            MethodAttributes::STATIC,
            MethodSig::static_(TypeSig::Void, vec![]),
        ));
        assembly.types.push(program);
        assembly
    }

    fn tables(assembly: &Assembly) -> SymbolTables<'_> {
        SymbolTables::new(assembly, ByteOrder::Little, StringTable::default()).unwrap()
    }

    #[test]
    fn test_local_and_external_types() {
        let assembly = assembly();
        let mut symbols = tables(&assembly);

        let local = TypeName::new("App", "App", "Program");
        assert_eq!(symbols.type_handle(&local).unwrap(), Handle::Def(0));

        let object = TypeName::new("mscorlib", "System", "Object");
        assert_eq!(symbols.type_handle(&object).unwrap(), Handle::Ref(0));
        assert_eq!(symbols.type_handle(&object).unwrap(), Handle::Ref(0));
        assert_eq!(symbols.type_refs.len(), 1);
        assert_eq!(symbols.assembly_refs.len(), 1);
    }

    #[test]
    fn test_dangling_local_type() {
        let assembly = assembly();
        let mut symbols = tables(&assembly);
        let missing = TypeName::new("App", "App", "Missing");
        assert!(matches!(
            symbols.type_handle(&missing),
            Err(Error::InconsistentModel(_))
        ));
    }

    #[test]
    fn test_unreferenced_assembly() {
        let assembly = assembly();
        let mut symbols = tables(&assembly);
        let foreign = TypeName::new("Other", "Other", "Thing");
        assert!(matches!(
            symbols.type_handle(&foreign),
            Err(Error::InconsistentModel(_))
        ));
        assert!(symbols.type_refs.is_empty());
    }

    #[test]
    fn test_nested_type_ref_scope() {
        let assembly = assembly();
        let mut symbols = tables(&assembly);
        let outer = TypeName::new("mscorlib", "System", "Environment");
        let inner = TypeName::nested(&outer, "SpecialFolder");

        let inner_id = symbols.type_ref(&inner).unwrap();
        let outer_id = symbols.type_refs.try_get_id(&outer).unwrap();
        assert_eq!((outer_id, inner_id), (0, 1));

        let rows: Vec<&TypeRefRow> = symbols.type_refs.rows().collect();
        assert_eq!(rows[0].scope, 0);
        assert_eq!(rows[1].scope, EXTERNAL_TAG);
    }

    #[test]
    fn test_method_resolution_order() {
        let assembly = assembly();
        let mut symbols = tables(&assembly);

        let local = MethodRef::new(
            TypeName::new("App", "App", "Program"),
            "Run",
            MethodSig::static_(TypeSig::Void, vec![]),
        );
        assert_eq!(symbols.method_handle(&local).unwrap(), Handle::Def(0));

        let external = MethodRef::new(
            TypeName::new("mscorlib", "System", "Console"),
            "WriteLine",
            MethodSig::static_(TypeSig::Void, vec![TypeSig::String]),
        );
        assert_eq!(symbols.method_handle(&external).unwrap(), Handle::Ref(0));
        let same = MethodRef::new(
            TypeName::new("mscorlib", "System", "Console"),
            "WriteLine",
            MethodSig::static_(TypeSig::Void, vec![TypeSig::String]),
        );
        assert_eq!(symbols.method_handle(&same).unwrap(), Handle::Ref(0));
        assert_eq!(symbols.method_refs.len(), 1);

        let missing = MethodRef::new(
            TypeName::new("App", "App", "Program"),
            "Gone",
            MethodSig::static_(TypeSig::Void, vec![]),
        );
        assert!(symbols.method_handle(&missing).is_err());
    }

    #[test]
    fn test_type_tokens() {
        let assembly = assembly();
        let mut symbols = tables(&assembly);

        let local = TypeSig::Class(TypeName::new("App", "App", "Program"));
        assert_eq!(symbols.type_token(&local).unwrap(), 0x0000);

        let object = TypeSig::Class(TypeName::new("mscorlib", "System", "Object"));
        assert_eq!(symbols.type_token(&object).unwrap(), 0x4000);

        let array = TypeSig::array(TypeSig::I4);
        assert_eq!(symbols.type_token(&array).unwrap(), 0x8000);
        assert_eq!(symbols.type_token(&array).unwrap(), 0x8000);
        assert_eq!(symbols.type_token(&TypeSig::String).unwrap(), 0x8001);
        assert_eq!(symbols.type_specs.len(), 2);
    }

    #[test]
    fn test_signature_sharing() {
        let assembly = assembly();
        let mut symbols = tables(&assembly);
        let a = symbols.field_signature(&TypeSig::I4).unwrap();
        let b = symbols.field_signature(&TypeSig::I4).unwrap();
        assert_eq!(a, b);
        assert_eq!(symbols.signatures.len(), 2);
    }
}
