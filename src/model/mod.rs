//! Read-only model of a fully linked managed assembly.
//!
//! The model is produced by the caller (typically a metadata reader) and only borrowed by the
//! linker. It describes exactly what ends up in the image: every type with its fields, methods,
//! attributes and instruction bodies, the referenced assemblies and the embedded resources.
//! All cross references are structural ([`TypeName`], [`MethodRef`], [`FieldRef`]); the
//! original metadata [`Token`]s are carried along for the debug map only.
//!
//! # Examples
//!
//! ```rust
//! use cilpack::model::*;
//!
//! let mut assembly = Assembly::new("Demo");
//! assembly.references.push(AssemblyName::new("mscorlib", Version::new(1, 0, 0, 0)));
//!
//! let object = TypeName::new("mscorlib", "System", "Object");
//! let mut program = TypeDefinition::new(TypeName::new("Demo", "Demo", "Program"));
//! program.base = Some(object);
//! program.methods.push(MethodDefinition::new(
//!     "Main",
//!     MethodAttributes::PUBLIC | MethodAttributes::STATIC,
//!     MethodSig::static_(TypeSig::Void, vec![]),
//! ).with_body(MethodBody::from_instructions(vec![], vec![(OpCode::RET, Operand::None)])));
//! assembly.types.push(program);
//! ```

pub mod attribute;
pub mod flags;
pub mod instruction;
pub mod opcodes;
pub mod resource;
pub mod signature;
pub mod token;

pub use attribute::{AttributeValue, CustomAttribute, NamedArgument, NamedArgumentKind};
pub use flags::{FieldAttributes, MethodAttributes, MethodImplAttributes, TypeAttributes};
pub use instruction::{
    ExceptionHandler, HandlerKind, Instruction, MethodBody, Operand, ParameterRef,
};
pub use opcodes::{FlowType, OpCode, OpCodeInfo, OperandType, StackPop, StackPush};
pub use resource::{Resource, ResourceFile};
pub use signature::{FieldRef, MethodRef, MethodSig, TypeName, TypeSig};
pub use token::Token;

/// A four-part version number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build number
    pub build: u16,
    /// Revision number
    pub revision: u16,
}

impl Version {
    /// Creates a version.
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Version {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// Name and version of a referenced assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyName {
    /// Simple name
    pub name: String,
    /// Version
    pub version: Version,
}

impl AssemblyName {
    /// Creates an assembly name.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        AssemblyName {
            name: name.into(),
            version,
        }
    }
}

/// A field defined by the assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    /// Original token
    pub token: Token,
    /// Field name
    pub name: String,
    /// Attributes
    pub flags: FieldAttributes,
    /// Field type
    pub ty: TypeSig,
    /// Serialized default value (literal fields)
    pub default_value: Option<Vec<u8>>,
    /// Custom attributes
    pub attributes: Vec<CustomAttribute>,
}

impl FieldDefinition {
    /// Creates a field without default value or attributes.
    pub fn new(name: impl Into<String>, flags: FieldAttributes, ty: TypeSig) -> Self {
        FieldDefinition {
            token: Token::default(),
            name: name.into(),
            flags,
            ty,
            default_value: None,
            attributes: Vec::new(),
        }
    }

    /// `true` for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldAttributes::STATIC)
    }

    /// The structural reference to this field as a member of `declaring`.
    #[must_use]
    pub fn to_ref(&self, declaring: &TypeName) -> FieldRef {
        FieldRef::new(declaring.clone(), self.name.clone(), self.ty.clone())
    }
}

/// A method defined by the assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDefinition {
    /// Original token
    pub token: Token,
    /// Method name
    pub name: String,
    /// Attributes
    pub flags: MethodAttributes,
    /// Implementation attributes
    pub impl_flags: MethodImplAttributes,
    /// Signature
    pub signature: MethodSig,
    /// Body; `None` for abstract, runtime and internal-call methods
    pub body: Option<MethodBody>,
    /// Custom attributes
    pub attributes: Vec<CustomAttribute>,
}

impl MethodDefinition {
    /// Creates a method without body or attributes.
    pub fn new(name: impl Into<String>, flags: MethodAttributes, signature: MethodSig) -> Self {
        MethodDefinition {
            token: Token::default(),
            name: name.into(),
            flags,
            impl_flags: MethodImplAttributes::empty(),
            signature,
            body: None,
            attributes: Vec::new(),
        }
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the original token.
    #[must_use]
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = token;
        self
    }

    /// `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodAttributes::STATIC)
    }

    /// `true` for virtual methods.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.flags.contains(MethodAttributes::VIRTUAL)
    }

    /// `true` for methods implemented by the runtime's native code.
    #[must_use]
    pub fn is_internal_call(&self) -> bool {
        self.impl_flags.contains(MethodImplAttributes::INTERNAL_CALL)
    }

    /// The structural reference to this method as a member of `declaring`.
    #[must_use]
    pub fn to_ref(&self, declaring: &TypeName) -> MethodRef {
        MethodRef::new(declaring.clone(), self.name.clone(), self.signature.clone())
    }
}

/// A type defined by the assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    /// Original token
    pub token: Token,
    /// Structural name; `declaring` is set for nested types
    pub name: TypeName,
    /// Attributes
    pub flags: TypeAttributes,
    /// Base type
    pub base: Option<TypeName>,
    /// Directly implemented interfaces
    pub interfaces: Vec<TypeName>,
    /// Fields in declaration order
    pub fields: Vec<FieldDefinition>,
    /// Methods in declaration order
    pub methods: Vec<MethodDefinition>,
    /// Custom attributes
    pub attributes: Vec<CustomAttribute>,
}

impl TypeDefinition {
    /// Creates an empty type.
    #[must_use]
    pub fn new(name: TypeName) -> Self {
        TypeDefinition {
            token: Token::default(),
            name,
            flags: TypeAttributes::empty(),
            base: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// `true` if the base type is `System.Enum`.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.base
            .as_ref()
            .is_some_and(|b| b.namespace == "System" && b.name == "Enum")
    }

    /// `true` if the base type is `System.ValueType` or `System.Enum`.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.is_enum()
            || self
                .base
                .as_ref()
                .is_some_and(|b| b.namespace == "System" && b.name == "ValueType")
    }

    /// `true` if the base type is `System.Delegate` or `System.MulticastDelegate`.
    #[must_use]
    pub fn is_delegate(&self) -> bool {
        self.base.as_ref().is_some_and(|b| {
            b.namespace == "System" && (b.name == "MulticastDelegate" || b.name == "Delegate")
        })
    }
}

/// A fully linked assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    /// Original assembly token
    pub token: Token,
    /// Simple name
    pub name: String,
    /// Version
    pub version: Version,
    /// Assemblies whose types may be referenced
    pub references: Vec<AssemblyName>,
    /// Types defined by the assembly
    pub types: Vec<TypeDefinition>,
    /// Embedded resource files
    pub resource_files: Vec<ResourceFile>,
    /// Entry point method
    pub entry_point: Option<MethodRef>,
}

impl Assembly {
    /// Creates an empty assembly.
    pub fn new(name: impl Into<String>) -> Self {
        Assembly {
            token: Token::new(0x2000_0001),
            name: name.into(),
            version: Version::default(),
            references: Vec::new(),
            types: Vec::new(),
            resource_files: Vec::new(),
            entry_point: None,
        }
    }

    /// Finds a type defined by this assembly.
    #[must_use]
    pub fn find_type(&self, name: &TypeName) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| &t.name == name)
    }

    /// `true` if `name` denotes a type defined by this assembly.
    #[must_use]
    pub fn defines(&self, name: &TypeName) -> bool {
        self.find_type(name).is_some()
    }

    /// Finds a referenced assembly by simple name.
    #[must_use]
    pub fn find_reference(&self, name: &str) -> Option<&AssemblyName> {
        self.references.iter().find(|r| r.name == name)
    }
}
