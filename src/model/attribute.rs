//! Custom attributes of the input model.

use crate::model::signature::{MethodRef, TypeName};

/// A decoded custom attribute argument.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum AttributeValue {
    Bool(bool),
    Char(u16),
    I1(i8),
    U1(u8),
    I2(i16),
    U2(u16),
    I4(i32),
    U4(u32),
    I8(i64),
    U8(u64),
    R4(f32),
    R8(f64),
    /// A string, `None` for a null reference
    String(Option<String>),
    /// A `System.Type` argument
    Type(TypeName),
    /// An array argument
    Array(Vec<AttributeValue>),
    /// A boxed `object` argument
    Boxed(Box<AttributeValue>),
}

/// Whether a named argument sets a field or a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedArgumentKind {
    /// Sets a field
    Field,
    /// Sets a property
    Property,
}

/// A named attribute argument.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArgument {
    /// Field or property
    pub kind: NamedArgumentKind,
    /// Member name
    pub name: String,
    /// Value
    pub value: AttributeValue,
}

/// A custom attribute instance applied to a type, field or method.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttribute {
    /// The attribute's constructor
    pub constructor: MethodRef,
    /// Positional arguments
    pub arguments: Vec<AttributeValue>,
    /// Named arguments
    pub named: Vec<NamedArgument>,
}

impl CustomAttribute {
    /// An attribute with positional arguments only.
    #[must_use]
    pub fn new(constructor: MethodRef, arguments: Vec<AttributeValue>) -> Self {
        CustomAttribute {
            constructor,
            arguments,
            named: Vec::new(),
        }
    }
}
