//! Deduplicating tables of external symbols.
//!
//! Every symbol the assembly uses but does not define is recorded once in one of four reference
//! tables. [`ReferenceTable`] is the shared implementation: an insertion-ordered map from a
//! structural key to a fixed-size row, where the position of a key is its ID. Rows are built by
//! the caller on first use, so building a row may itself intern strings and signatures.

use std::{
    hash::Hash,
    io::{Seek, Write},
};

use indexmap::IndexMap;

use crate::{
    file::writer::BinaryWriter,
    model::Version,
    tables::{TableRow, MAX_ID},
    utils::math::check_id,
    Result,
};

/// Insertion-ordered table of unique keys, each owning one row.
#[derive(Debug)]
pub struct ReferenceTable<K, R> {
    entries: IndexMap<K, R>,
    what: &'static str,
}

impl<K: Hash + Eq + Clone, R: TableRow> ReferenceTable<K, R> {
    /// Creates an empty table; `what` names the table in capacity errors.
    #[must_use]
    pub fn new(what: &'static str) -> Self {
        ReferenceTable {
            entries: IndexMap::new(),
            what,
        }
    }

    /// Returns the ID of `key`, creating its row with `make_row` on first use.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CapacityOverflow`] when the table is full, or any error produced
    /// by `make_row`. Nothing is inserted if either fails.
    pub fn get_or_create_id<F>(&mut self, key: &K, make_row: F) -> Result<u16>
    where
        F: FnOnce() -> Result<R>,
    {
        if let Some(index) = self.entries.get_index_of(key) {
            return check_id(index, MAX_ID, self.what);
        }

        let id = check_id(self.entries.len(), MAX_ID, self.what)?;
        let row = make_row()?;
        self.entries.insert(key.clone(), row);
        Ok(id)
    }

    /// Returns the ID of `key` if it has been created.
    #[must_use]
    pub fn try_get_id(&self, key: &K) -> Option<u16> {
        self.entries
            .get_index_of(key)
            .and_then(|index| u16::try_from(index).ok())
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no row has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows in ID order.
    pub fn rows(&self) -> impl Iterator<Item = &R> {
        self.entries.values()
    }

    /// Keys in ID order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Serializes every row in ID order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the sink fails.
    pub fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        for row in self.entries.values() {
            row.write(writer)?;
        }
        Ok(())
    }
}

/// A referenced assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyRefRow {
    /// String ID of the simple name
    pub name: u16,
    /// Referenced version
    pub version: Version,
}

impl TableRow for AssemblyRefRow {
    const SIZE: usize = 12;

    fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_u16(self.name)?;
        writer.write_u16(0)?;
        writer.write_u16(self.version.major)?;
        writer.write_u16(self.version.minor)?;
        writer.write_u16(self.version.build)?;
        writer.write_u16(self.version.revision)?;
        Ok(())
    }
}

/// A referenced external type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRefRow {
    /// String ID of the simple name
    pub name: u16,
    /// String ID of the namespace
    pub namespace: u16,
    /// Assembly-ref ID, or `EXTERNAL_TAG | type-ref ID` of the declaring type
    pub scope: u16,
}

impl TableRow for TypeRefRow {
    const SIZE: usize = 8;

    fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_u16(self.name)?;
        writer.write_u16(self.namespace)?;
        writer.write_u16(self.scope)?;
        writer.write_u16(0)?;
        Ok(())
    }
}

/// A referenced external field or method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRefRow {
    /// String ID of the member name
    pub name: u16,
    /// Type-ref ID of the declaring type
    pub container: u16,
    /// Signature ID
    pub signature: u16,
}

impl TableRow for MemberRefRow {
    const SIZE: usize = 8;

    fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_u16(self.name)?;
        writer.write_u16(self.container)?;
        writer.write_u16(self.signature)?;
        writer.write_u16(0)?;
        Ok(())
    }
}
