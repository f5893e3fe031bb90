//! Checksum over the internal-call methods of an assembly.
//!
//! Methods flagged `InternalCall` are implemented by native code compiled into the firmware.
//! The firmware carries the same checksum, computed from the stub names of its native table,
//! and refuses to load an image whose checksum differs. A stub name has the shape
//!
//! ```text
//! {Namespace_Type}::{Method}___{RETURN}__{PARAM1}__{PARAM2}
//! ```
//!
//! where dots and nesting separators in the type name become underscores and every type is
//! spelled by [`type_name`].

use crate::{
    model::{Assembly, MethodDefinition, TypeName, TypeSig},
    tables::layout::LayoutPlan,
    utils::crc::crc32,
};

/// Spelling of a signature type in a stub name.
#[must_use]
pub fn type_name(ty: &TypeSig) -> String {
    let name = match ty {
        TypeSig::Void => "VOID",
        TypeSig::Boolean => "BOOLEAN",
        TypeSig::Char => "CHAR",
        TypeSig::I1 => "I1",
        TypeSig::U1 => "U1",
        TypeSig::I2 => "I2",
        TypeSig::U2 => "U2",
        TypeSig::I4 => "I4",
        TypeSig::U4 => "U4",
        TypeSig::I8 => "I8",
        TypeSig::U8 => "U8",
        TypeSig::R4 => "R4",
        TypeSig::R8 => "R8",
        TypeSig::I => "I",
        TypeSig::U => "U",
        TypeSig::String => "STRING",
        TypeSig::Object => "OBJECT",
        TypeSig::Var(_) => "VAR",
        TypeSig::MVar(_) => "MVAR",
        TypeSig::Class(name) | TypeSig::ValueType(name) => return mangle(name),
        TypeSig::SzArray(element) => return format!("SZARRAY_{}", type_name(element)),
        TypeSig::ByRef(element) => return format!("BYREF_{}", type_name(element)),
        TypeSig::Ptr(element) => return format!("PTR_{}", type_name(element)),
        TypeSig::GenericInst(base, _) => return format!("GENERICINST_{}", type_name(base)),
    };
    name.to_string()
}

fn mangle(name: &TypeName) -> String {
    name.full_name().replace(['.', '/'], "_")
}

/// The native stub name of `method`, declared by `owner`.
#[must_use]
pub fn stub_name(owner: &TypeName, method: &MethodDefinition) -> String {
    let mut stub = format!(
        "{}::{}___{}",
        mangle(owner),
        method.name.replace('.', "_"),
        type_name(&method.signature.ret)
    );
    for param in &method.signature.params {
        stub.push_str("__");
        stub.push_str(&type_name(param));
    }
    stub
}

/// Folds the stub names of every internal-call method, in method ID order, into one CRC-32.
///
/// Returns 0 if the assembly has no internal-call methods.
#[must_use]
pub fn native_checksum(assembly: &Assembly, plan: &LayoutPlan) -> u32 {
    plan.methods
        .iter()
        .map(|&(t, m)| (&assembly.types[t], &assembly.types[t].methods[m]))
        .filter(|(_, method)| method.is_internal_call())
        .fold(0, |checksum, (owner, method)| {
            let stub = stub_name(&owner.name, method);
            log::trace!("native stub {stub}");
            crc32(stub.as_bytes(), checksum)
        })
}
