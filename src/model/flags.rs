//! ECMA-335 attribute flags of the input model.
//!
//! These carry the raw values of the source metadata. The image uses its own, narrower flag words
//! (see [`crate::tables::typedefs::TypeDefFlags`] and [`crate::tables::members`]), derived from
//! these during table construction.

use bitflags::bitflags;

bitflags! {
    /// Type attributes (ECMA-335 §II.23.1.15).
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default)]
    pub struct TypeAttributes: u32 {
        /// Mask for the visibility bits
        const VISIBILITY_MASK = 0x0000_0007;
        /// Visible outside the assembly
        const PUBLIC = 0x0000_0001;
        /// Nested, public
        const NESTED_PUBLIC = 0x0000_0002;
        /// Nested, private
        const NESTED_PRIVATE = 0x0000_0003;
        /// Nested, family
        const NESTED_FAMILY = 0x0000_0004;
        /// Nested, assembly
        const NESTED_ASSEMBLY = 0x0000_0005;
        /// Nested, family and assembly
        const NESTED_FAM_AND_ASSEM = 0x0000_0006;
        /// Nested, family or assembly
        const NESTED_FAM_OR_ASSEM = 0x0000_0007;
        /// Sequential layout
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Explicit layout
        const EXPLICIT_LAYOUT = 0x0000_0010;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type is abstract
        const ABSTRACT = 0x0000_0080;
        /// Type cannot be derived from
        const SEALED = 0x0000_0100;
        /// Name is special
        const SPECIAL_NAME = 0x0000_0400;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x0000_0800;
        /// Type is imported
        const IMPORT = 0x0000_1000;
        /// Type is serializable
        const SERIALIZABLE = 0x0000_2000;
        /// Type has security declarations
        const HAS_SECURITY = 0x0004_0000;
        /// Static initializer may run lazily
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

bitflags! {
    /// Field attributes (ECMA-335 §II.23.1.5).
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default)]
    pub struct FieldAttributes: u16 {
        /// Mask for the accessibility bits
        const ACCESS_MASK = 0x0007;
        /// Private
        const PRIVATE = 0x0001;
        /// Family and assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Assembly
        const ASSEMBLY = 0x0003;
        /// Family
        const FAMILY = 0x0004;
        /// Family or assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Public
        const PUBLIC = 0x0006;
        /// Field is static
        const STATIC = 0x0010;
        /// Field can only be set during initialization
        const INIT_ONLY = 0x0020;
        /// Compile-time constant
        const LITERAL = 0x0040;
        /// Not serialized
        const NOT_SERIALIZED = 0x0080;
        /// Field has an RVA
        const HAS_FIELD_RVA = 0x0100;
        /// Name is special
        const SPECIAL_NAME = 0x0200;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x0400;
        /// Field has a default value
        const HAS_DEFAULT = 0x8000;
    }
}

bitflags! {
    /// Method attributes (ECMA-335 §II.23.1.10).
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default)]
    pub struct MethodAttributes: u16 {
        /// Mask for the accessibility bits
        const ACCESS_MASK = 0x0007;
        /// Private
        const PRIVATE = 0x0001;
        /// Family and assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Assembly
        const ASSEMBLY = 0x0003;
        /// Family
        const FAMILY = 0x0004;
        /// Family or assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Public
        const PUBLIC = 0x0006;
        /// Method is static
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Hidden by name and signature
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new vtable slot
        const NEW_SLOT = 0x0100;
        /// Method is abstract
        const ABSTRACT = 0x0400;
        /// Name is special
        const SPECIAL_NAME = 0x0800;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
    }
}

bitflags! {
    /// Method implementation attributes (ECMA-335 §II.23.1.11).
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default)]
    pub struct MethodImplAttributes: u16 {
        /// Native code
        const NATIVE = 0x0001;
        /// Provided by the runtime
        const RUNTIME = 0x0003;
        /// Method may not be inlined
        const NO_INLINING = 0x0008;
        /// Single-threaded through the body
        const SYNCHRONIZED = 0x0020;
        /// Implemented inside the runtime
        const INTERNAL_CALL = 0x1000;
    }
}

impl TypeAttributes {
    /// `true` if the visibility bits mark a nested type.
    #[must_use]
    pub fn is_nested(self) -> bool {
        (self & Self::VISIBILITY_MASK).bits() >= Self::NESTED_PUBLIC.bits()
    }
}

impl FieldAttributes {
    /// The accessibility bits alone.
    #[must_use]
    pub fn access(self) -> u16 {
        (self & Self::ACCESS_MASK).bits()
    }
}

impl MethodAttributes {
    /// The accessibility bits alone.
    #[must_use]
    pub fn access(self) -> u16 {
        (self & Self::ACCESS_MASK).bits()
    }
}
