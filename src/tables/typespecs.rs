//! Type specifications.
//!
//! Type operands that cannot be expressed as a plain definition or reference (arrays, generic
//! instantiations, generic parameters and primitives) are recorded once per distinct signature
//! in the type-specification table. The table itself is a
//! [`crate::tables::references::ReferenceTable`] keyed by [`crate::model::TypeSig`].

use std::io::{Seek, Write};

use crate::{file::writer::BinaryWriter, model::TypeSig, tables::TableRow, Result};

/// One type specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSpecRow {
    /// Signature ID of the encoded type
    pub signature: u16,
}

impl TableRow for TypeSpecRow {
    const SIZE: usize = 4;

    fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_u16(self.signature)?;
        writer.write_u16(0)?;
        Ok(())
    }
}

/// `true` if a type operand of this shape needs a type specification.
#[must_use]
pub fn needs_spec(ty: &TypeSig) -> bool {
    !matches!(ty, TypeSig::Class(_) | TypeSig::ValueType(_))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{file::io::ByteOrder, model::TypeName};

    #[test]
    fn test_row_layout() {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), ByteOrder::Big);
        TypeSpecRow { signature: 0x0102 }.write(&mut writer).unwrap();
        assert_eq!(writer.into_inner().into_inner(), [1, 2, 0, 0]);
    }

    #[test]
    fn test_needs_spec() {
        let name = TypeName::new("App", "App", "Thing");
        assert!(!needs_spec(&TypeSig::Class(name.clone())));
        assert!(!needs_spec(&TypeSig::ValueType(name.clone())));
        assert!(needs_spec(&TypeSig::array(TypeSig::Class(name))));
        assert!(needs_spec(&TypeSig::I4));
        assert!(needs_spec(&TypeSig::Var(0)));
    }
}
