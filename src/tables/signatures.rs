//! The signature pool and the signature encoders.
//!
//! Every blob an image needs (field types, method signatures, local lists, interface lists,
//! default values and attribute data) lives in a single byte pool and is referred to by its
//! offset. The pool deduplicates aggressively: an identical signature returns the existing ID,
//! and a signature whose bytes already occur anywhere in the pool, for example as the tail of a
//! longer one, reuses that occurrence. Signatures are self-describing, so a reader starting at
//! any offset decodes exactly the bytes that were requested.
//!
//! The encoders only produce bytes. Symbols mentioned inside a signature are resolved through a
//! [`SignatureResolver`], which the symbol tables implement.
//!
//! # Encodings
//!
//! | Signature | Layout |
//! |-----------|--------|
//! | type | element byte, then `u16` TypeDefOrRef / element type / generic arguments |
//! | field | `0x06`, type |
//! | method | `0x20` if `this` else `0x00`, `u8` parameter count, return type, parameters |
//! | locals | `0x07`, `u8` count, types |
//! | interfaces | `u8` count, `u16` TypeDefOrRef each |
//! | blob | `u16` length, bytes |
//! | attribute | fixed arguments, `u8` named count, named arguments |

use std::{
    collections::HashMap,
    io::{Seek, Write},
};

use crate::{
    file::{
        io::{push, ByteOrder},
        writer::BinaryWriter,
    },
    model::{
        AttributeValue, CustomAttribute, MethodSig, NamedArgumentKind, TypeName, TypeSig,
    },
    tables::NONE,
    utils::math::{to_u16, to_u8},
    Result,
};

#[allow(non_snake_case, dead_code, missing_docs)]
/// Element type bytes used by type signatures
pub mod ELEMENT_TYPE {
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    pub const PTR: u8 = 0x0f;
    pub const BYREF: u8 = 0x10;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    pub const GENERICINST: u8 = 0x15;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const OBJECT: u8 = 0x1c;
    pub const SZARRAY: u8 = 0x1d;
    pub const MVAR: u8 = 0x1e;
}

#[allow(non_snake_case, dead_code, missing_docs)]
/// Leading bytes of the non-type signatures
pub mod SIGNATURE_HEADER {
    pub const DEFAULT: u8 = 0x00;
    pub const HAS_THIS: u8 = 0x20;
    pub const FIELD: u8 = 0x06;
    pub const LOCAL_SIG: u8 = 0x07;
    pub const NAMED_FIELD: u8 = 0x53;
    pub const NAMED_PROPERTY: u8 = 0x54;
}

/// Resolves the symbols mentioned inside a signature.
pub trait SignatureResolver {
    /// Byte order of multi-byte values embedded in signatures.
    fn byte_order(&self) -> ByteOrder;

    /// TypeDefOrRef handle of a named type: a definition ID, or `EXTERNAL_TAG | reference ID`.
    ///
    /// # Errors
    ///
    /// Returns an error if the type cannot be resolved.
    fn type_def_or_ref(&mut self, name: &TypeName) -> Result<u16>;

    /// String table ID of `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be interned.
    fn string_id(&mut self, value: &str) -> Result<u16>;
}

/// Encodes a type signature, appending to `buffer`.
///
/// # Errors
///
/// Returns an error if a named type cannot be resolved or a generic instantiation has more than
/// 255 arguments.
pub fn encode_type<R: SignatureResolver + ?Sized>(
    ty: &TypeSig,
    resolver: &mut R,
    buffer: &mut Vec<u8>,
) -> Result<()> {
    let order = resolver.byte_order();
    match ty {
        TypeSig::Void => buffer.push(ELEMENT_TYPE::VOID),
        TypeSig::Boolean => buffer.push(ELEMENT_TYPE::BOOLEAN),
        TypeSig::Char => buffer.push(ELEMENT_TYPE::CHAR),
        TypeSig::I1 => buffer.push(ELEMENT_TYPE::I1),
        TypeSig::U1 => buffer.push(ELEMENT_TYPE::U1),
        TypeSig::I2 => buffer.push(ELEMENT_TYPE::I2),
        TypeSig::U2 => buffer.push(ELEMENT_TYPE::U2),
        TypeSig::I4 => buffer.push(ELEMENT_TYPE::I4),
        TypeSig::U4 => buffer.push(ELEMENT_TYPE::U4),
        TypeSig::I8 => buffer.push(ELEMENT_TYPE::I8),
        TypeSig::U8 => buffer.push(ELEMENT_TYPE::U8),
        TypeSig::R4 => buffer.push(ELEMENT_TYPE::R4),
        TypeSig::R8 => buffer.push(ELEMENT_TYPE::R8),
        TypeSig::I => buffer.push(ELEMENT_TYPE::I),
        TypeSig::U => buffer.push(ELEMENT_TYPE::U),
        TypeSig::String => buffer.push(ELEMENT_TYPE::STRING),
        TypeSig::Object => buffer.push(ELEMENT_TYPE::OBJECT),
        TypeSig::Class(name) => {
            buffer.push(ELEMENT_TYPE::CLASS);
            let handle = resolver.type_def_or_ref(name)?;
            push(buffer, handle, order);
        }
        TypeSig::ValueType(name) => {
            buffer.push(ELEMENT_TYPE::VALUETYPE);
            let handle = resolver.type_def_or_ref(name)?;
            push(buffer, handle, order);
        }
        TypeSig::SzArray(element) => {
            buffer.push(ELEMENT_TYPE::SZARRAY);
            encode_type(element, resolver, buffer)?;
        }
        TypeSig::ByRef(element) => {
            buffer.push(ELEMENT_TYPE::BYREF);
            encode_type(element, resolver, buffer)?;
        }
        TypeSig::Ptr(element) => {
            buffer.push(ELEMENT_TYPE::PTR);
            encode_type(element, resolver, buffer)?;
        }
        TypeSig::GenericInst(base, args) => {
            buffer.push(ELEMENT_TYPE::GENERICINST);
            encode_type(base, resolver, buffer)?;
            buffer.push(to_u8(args.len(), "generic argument count")?);
            for arg in args {
                encode_type(arg, resolver, buffer)?;
            }
        }
        TypeSig::Var(index) => {
            buffer.push(ELEMENT_TYPE::VAR);
            buffer.push(*index);
        }
        TypeSig::MVar(index) => {
            buffer.push(ELEMENT_TYPE::MVAR);
            buffer.push(*index);
        }
    }
    Ok(())
}

/// Encodes a stand-alone type signature.
///
/// # Errors
///
/// See [`encode_type`].
pub fn encode_type_signature<R: SignatureResolver + ?Sized>(
    ty: &TypeSig,
    resolver: &mut R,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    encode_type(ty, resolver, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a field signature.
///
/// # Errors
///
/// See [`encode_type`].
pub fn encode_field_signature<R: SignatureResolver + ?Sized>(
    ty: &TypeSig,
    resolver: &mut R,
) -> Result<Vec<u8>> {
    let mut buffer = vec![SIGNATURE_HEADER::FIELD];
    encode_type(ty, resolver, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a method signature.
///
/// # Errors
///
/// Returns [`crate::Error::CapacityOverflow`] for more than 255 parameters, or the errors of
/// [`encode_type`].
pub fn encode_method_signature<R: SignatureResolver + ?Sized>(
    signature: &MethodSig,
    resolver: &mut R,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(3 + signature.params.len());
    buffer.push(if signature.has_this {
        SIGNATURE_HEADER::HAS_THIS
    } else {
        SIGNATURE_HEADER::DEFAULT
    });
    buffer.push(to_u8(signature.params.len(), "parameter count")?);
    encode_type(&signature.ret, resolver, &mut buffer)?;
    for param in &signature.params {
        encode_type(param, resolver, &mut buffer)?;
    }
    Ok(buffer)
}

/// Encodes a local variable list.
///
/// # Errors
///
/// Returns [`crate::Error::CapacityOverflow`] for more than 255 locals, or the errors of
/// [`encode_type`].
pub fn encode_locals_signature<R: SignatureResolver + ?Sized>(
    locals: &[TypeSig],
    resolver: &mut R,
) -> Result<Vec<u8>> {
    let mut buffer = vec![SIGNATURE_HEADER::LOCAL_SIG, to_u8(locals.len(), "local count")?];
    for local in locals {
        encode_type(local, resolver, &mut buffer)?;
    }
    Ok(buffer)
}

/// Encodes the list of directly implemented interfaces.
///
/// # Errors
///
/// Returns [`crate::Error::CapacityOverflow`] for more than 255 interfaces, or any resolution
/// error.
pub fn encode_interfaces<R: SignatureResolver + ?Sized>(
    interfaces: &[TypeName],
    resolver: &mut R,
) -> Result<Vec<u8>> {
    let order = resolver.byte_order();
    let mut buffer = Vec::with_capacity(1 + interfaces.len() * 2);
    buffer.push(to_u8(interfaces.len(), "interface count")?);
    for interface in interfaces {
        let handle = resolver.type_def_or_ref(interface)?;
        push(&mut buffer, handle, order);
    }
    Ok(buffer)
}

/// Encodes a raw blob with its `u16` length prefix.
///
/// # Errors
///
/// Returns [`crate::Error::CapacityOverflow`] if the blob is longer than 65535 bytes.
pub fn encode_blob(data: &[u8], order: ByteOrder) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(2 + data.len());
    push(&mut buffer, to_u16(data.len(), "blob length")?, order);
    buffer.extend_from_slice(data);
    Ok(buffer)
}

fn encode_attribute_value<R: SignatureResolver + ?Sized>(
    value: &AttributeValue,
    resolver: &mut R,
    buffer: &mut Vec<u8>,
) -> Result<()> {
    let order = resolver.byte_order();
    match value {
        AttributeValue::Bool(v) => buffer.push(u8::from(*v)),
        AttributeValue::Char(v) | AttributeValue::U2(v) => push(buffer, *v, order),
        AttributeValue::I1(v) => push(buffer, *v, order),
        AttributeValue::U1(v) => buffer.push(*v),
        AttributeValue::I2(v) => push(buffer, *v, order),
        AttributeValue::I4(v) => push(buffer, *v, order),
        AttributeValue::U4(v) => push(buffer, *v, order),
        AttributeValue::I8(v) => push(buffer, *v, order),
        AttributeValue::U8(v) => push(buffer, *v, order),
        AttributeValue::R4(v) => push(buffer, *v, order),
        AttributeValue::R8(v) => push(buffer, *v, order),
        AttributeValue::String(None) => push(buffer, NONE, order),
        AttributeValue::String(Some(s)) => {
            let id = resolver.string_id(s)?;
            push(buffer, id, order);
        }
        AttributeValue::Type(name) => {
            let handle = resolver.type_def_or_ref(name)?;
            push(buffer, handle, order);
        }
        AttributeValue::Array(_) => {
            return Err(unsupported_error!("array-valued attribute arguments"));
        }
        AttributeValue::Boxed(_) => {
            return Err(unsupported_error!("boxed attribute arguments"));
        }
    }
    Ok(())
}

/// Encodes the arguments of a custom attribute.
///
/// # Errors
///
/// Returns [`crate::Error::Unsupported`] for array and boxed values, or any resolution error.
pub fn encode_attribute_data<R: SignatureResolver + ?Sized>(
    attribute: &CustomAttribute,
    resolver: &mut R,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    for argument in &attribute.arguments {
        encode_attribute_value(argument, resolver, &mut buffer)?;
    }

    buffer.push(to_u8(attribute.named.len(), "named argument count")?);
    let order = resolver.byte_order();
    for named in &attribute.named {
        buffer.push(match named.kind {
            NamedArgumentKind::Field => SIGNATURE_HEADER::NAMED_FIELD,
            NamedArgumentKind::Property => SIGNATURE_HEADER::NAMED_PROPERTY,
        });
        let name = resolver.string_id(&named.name)?;
        push(&mut buffer, name, order);
        encode_attribute_value(&named.value, resolver, &mut buffer)?;
    }
    Ok(buffer)
}

/// Append-only, deduplicating signature pool.
#[derive(Debug, Default)]
pub struct SignatureTable {
    pool: Vec<u8>,
    ids: HashMap<Vec<u8>, u16>,
}

impl SignatureTable {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the offset of `signature` in the pool, appending it if it does not occur yet.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for an empty signature and
    /// [`crate::Error::CapacityOverflow`] once offsets exceed 16 bits.
    pub fn get_or_create_signature_id(&mut self, signature: &[u8]) -> Result<u16> {
        if signature.is_empty() {
            return Err(malformed_error!("Empty signature"));
        }

        if let Some(&id) = self.ids.get(signature) {
            return Ok(id);
        }

        let offset = match self
            .pool
            .windows(signature.len())
            .position(|window| window == signature)
        {
            Some(existing) => existing,
            None => {
                let offset = self.pool.len();
                self.pool.extend_from_slice(signature);
                offset
            }
        };

        let id = to_u16(offset, "signature offset")?;
        self.ids.insert(signature.to_vec(), id);
        Ok(id)
    }

    /// Size of the pool in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// `true` if no signature has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// The raw pool.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.pool
    }

    /// Writes the pool.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the sink fails.
    pub fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_bytes(&self.pool)
    }
}
