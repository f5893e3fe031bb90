//! # cilpack Prelude
//!
//! Convenient re-exports of the types needed to describe an assembly and pack it into an
//! image. Import this module to get quick access to the model and the builder.
//!
//! ```rust
//! use cilpack::prelude::*;
//!
//! let assembly = Assembly::new("Empty");
//! let image = ImageBuilder::new(&assembly, BuildOptions::default()).build()?;
//! assert_eq!(image.header.byte_order(), ByteOrder::Little);
//! # Ok::<(), cilpack::Error>(())
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilpack operations
pub use crate::Error;

/// The result type used throughout cilpack
pub use crate::Result;

/// Builds an image with default options
pub use crate::build_image;

// ================================================================================================
// Input Model
// ================================================================================================

/// Assembly, type and member definitions
pub use crate::model::{
    Assembly, AssemblyName, FieldDefinition, MethodDefinition, TypeDefinition, Version,
};

/// Attribute flags
pub use crate::model::{FieldAttributes, MethodAttributes, MethodImplAttributes, TypeAttributes};

/// Signatures and structural references
pub use crate::model::{FieldRef, MethodRef, MethodSig, Token, TypeName, TypeSig};

/// Method bodies
pub use crate::model::{ExceptionHandler, HandlerKind, MethodBody, OpCode, Operand, ParameterRef};

/// Custom attributes and resources
pub use crate::model::{AttributeValue, CustomAttribute, Resource, ResourceFile};

// ================================================================================================
// Image Construction
// ================================================================================================

/// Builder, options and the finished image
pub use crate::image::{BuildOptions, DebugMap, Image, ImageBuilder, ImageFlags, ImageHeader};

/// Table slots and their emission order
pub use crate::tables::{TableKind, EMISSION_ORDER};

/// Extension points for string ordering and resource conversion
pub use crate::tables::{
    resources::{PassthroughTranscoder, ResourceKind, ResourceTranscoder},
    strings::{AlphabeticalSorter, IdentitySorter, StringSorter},
};

/// Output byte order
pub use crate::file::io::ByteOrder;
