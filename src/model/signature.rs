//! Type names and signatures of the input model.
//!
//! Identity is structural everywhere: two [`TypeName`]s denote the same type if all their parts
//! are equal, and two [`MethodRef`]s denote the same method if declaring type, name and
//! signature are equal. The reference tables rely on this to deduplicate.

use std::fmt;

/// The structural identity of a type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName {
    /// Simple name of the defining assembly
    pub assembly: String,
    /// Namespace; empty for nested types and the global namespace
    pub namespace: String,
    /// Simple type name
    pub name: String,
    /// Enclosing type for nested types
    pub declaring: Option<Box<TypeName>>,
}

impl TypeName {
    /// A top-level type.
    pub fn new(
        assembly: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        TypeName {
            assembly: assembly.into(),
            namespace: namespace.into(),
            name: name.into(),
            declaring: None,
        }
    }

    /// A type nested in `declaring`, defined in the same assembly.
    pub fn nested(declaring: &TypeName, name: impl Into<String>) -> Self {
        TypeName {
            assembly: declaring.assembly.clone(),
            namespace: String::new(),
            name: name.into(),
            declaring: Some(Box::new(declaring.clone())),
        }
    }

    /// `Namespace.Outer/Inner` style name, used for ordering and diagnostics.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.declaring {
            Some(outer) => format!("{}/{}", outer.full_name(), self.name),
            None if self.namespace.is_empty() => self.name.clone(),
            None => format!("{}.{}", self.namespace, self.name),
        }
    }

    /// Namespace of the outermost declaring type.
    #[must_use]
    pub fn root_namespace(&self) -> &str {
        match &self.declaring {
            Some(outer) => outer.root_namespace(),
            None => &self.namespace,
        }
    }

    /// `true` for `System.Object` of any assembly.
    #[must_use]
    pub fn is_system_object(&self) -> bool {
        self.declaring.is_none() && self.namespace == "System" && self.name == "Object"
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// A type as it appears in signatures.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum TypeSig {
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    I,
    U,
    String,
    Object,
    /// A reference type
    Class(TypeName),
    /// A value type
    ValueType(TypeName),
    /// Single-dimensional, zero-based array
    SzArray(Box<TypeSig>),
    /// Managed reference
    ByRef(Box<TypeSig>),
    /// Unmanaged pointer
    Ptr(Box<TypeSig>),
    /// Instantiated generic type
    GenericInst(Box<TypeSig>, Vec<TypeSig>),
    /// Generic parameter of the enclosing type
    Var(u8),
    /// Generic parameter of the enclosing method
    MVar(u8),
}

impl TypeSig {
    /// Shorthand for `SzArray(Box::new(element))`.
    #[must_use]
    pub fn array(element: TypeSig) -> Self {
        TypeSig::SzArray(Box::new(element))
    }

    /// Shorthand for `ByRef(Box::new(element))`.
    #[must_use]
    pub fn by_ref(element: TypeSig) -> Self {
        TypeSig::ByRef(Box::new(element))
    }

    /// The named type, for `Class` and `ValueType` signatures.
    #[must_use]
    pub fn type_name(&self) -> Option<&TypeName> {
        match self {
            TypeSig::Class(name) | TypeSig::ValueType(name) => Some(name),
            _ => None,
        }
    }

    /// Calls `visit` for every type name mentioned anywhere inside this signature.
    pub fn visit_type_names<'a>(&'a self, visit: &mut impl FnMut(&'a TypeName)) {
        match self {
            TypeSig::Class(name) | TypeSig::ValueType(name) => visit(name),
            TypeSig::SzArray(inner) | TypeSig::ByRef(inner) | TypeSig::Ptr(inner) => {
                inner.visit_type_names(visit);
            }
            TypeSig::GenericInst(base, args) => {
                base.visit_type_names(visit);
                for arg in args {
                    arg.visit_type_names(visit);
                }
            }
            _ => {}
        }
    }
}

/// A method signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodSig {
    /// Instance method (takes `this`)
    pub has_this: bool,
    /// Return type
    pub ret: TypeSig,
    /// Parameter types, excluding `this`
    pub params: Vec<TypeSig>,
}

impl MethodSig {
    /// An instance method signature.
    #[must_use]
    pub fn instance(ret: TypeSig, params: Vec<TypeSig>) -> Self {
        MethodSig {
            has_this: true,
            ret,
            params,
        }
    }

    /// A static method signature.
    #[must_use]
    pub fn static_(ret: TypeSig, params: Vec<TypeSig>) -> Self {
        MethodSig {
            has_this: false,
            ret,
            params,
        }
    }

    /// Number of stack slots the arguments occupy, including `this`.
    #[must_use]
    pub fn argument_count(&self) -> usize {
        self.params.len() + usize::from(self.has_this)
    }

    /// `true` if the method returns a value.
    #[must_use]
    pub fn returns_value(&self) -> bool {
        self.ret != TypeSig::Void
    }
}

/// Structural reference to a method.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// The type that declares the method
    pub declaring: TypeName,
    /// Method name
    pub name: String,
    /// Method signature
    pub signature: MethodSig,
}

impl MethodRef {
    /// Creates a method reference.
    pub fn new(declaring: TypeName, name: impl Into<String>, signature: MethodSig) -> Self {
        MethodRef {
            declaring,
            name: name.into(),
            signature,
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring, self.name)
    }
}

/// Structural reference to a field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// The type that declares the field
    pub declaring: TypeName,
    /// Field name
    pub name: String,
    /// Field type
    pub ty: TypeSig,
}

impl FieldRef {
    /// Creates a field reference.
    pub fn new(declaring: TypeName, name: impl Into<String>, ty: TypeSig) -> Self {
        FieldRef {
            declaring,
            name: name.into(),
            ty,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_nested() {
        let outer = TypeName::new("App", "Demo.Core", "Outer");
        let inner = TypeName::nested(&outer, "Inner");
        let deepest = TypeName::nested(&inner, "Deepest");

        assert_eq!(outer.full_name(), "Demo.Core.Outer");
        assert_eq!(deepest.full_name(), "Demo.Core.Outer/Inner/Deepest");
        assert_eq!(deepest.root_namespace(), "Demo.Core");
        assert_eq!(deepest.assembly, "App");
    }

    #[test]
    fn test_structural_equality() {
        let a = TypeName::new("mscorlib", "System", "Object");
        let b = TypeName::new("mscorlib", "System", "Object");
        assert_eq!(a, b);
        assert!(a.is_system_object());
        assert_ne!(a, TypeName::new("other", "System", "Object"));
    }

    #[test]
    fn test_visit_type_names() {
        let list = TypeName::new("mscorlib", "System.Collections", "List`1");
        let item = TypeName::new("App", "Demo", "Item");
        let sig = TypeSig::array(TypeSig::GenericInst(
            Box::new(TypeSig::Class(list.clone())),
            vec![TypeSig::ValueType(item.clone()), TypeSig::I4],
        ));

        let mut seen = Vec::new();
        sig.visit_type_names(&mut |name| seen.push(name.clone()));
        assert_eq!(seen, vec![list, item]);
    }

    #[test]
    fn test_argument_count() {
        let sig = MethodSig::instance(TypeSig::Void, vec![TypeSig::I4, TypeSig::String]);
        assert_eq!(sig.argument_count(), 3);
        assert!(!sig.returns_value());
        let sig = MethodSig::static_(TypeSig::I4, vec![]);
        assert_eq!(sig.argument_count(), 0);
        assert!(sig.returns_value());
    }
}
