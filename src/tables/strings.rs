//! The string table.
//!
//! Strings are identified by their byte offset in the emitted table, so IDs are assigned
//! cumulatively: a new string gets `previous_id + previous_len + 1`. The empty string is
//! always present as ID 0, and strings the runtime knows (see [`crate::tables::constants`]) are
//! referred to by their constant ID instead of being stored.
//!
//! Secondary tables (for example one built for a satellite assembly) can be merged in with
//! [`StringTable::merge`]; the order in which the new strings are appended is decided by an
//! injectable [`StringSorter`].

use std::{
    collections::HashMap,
    io::{Seek, Write},
    sync::Arc,
};

use crate::{
    file::writer::BinaryWriter,
    tables::constants::{self, CONSTANT_BASE},
    utils::math::check_id,
    Result,
};

/// Decides the order in which strings are appended when merging tables.
pub trait StringSorter: Send + Sync {
    /// Reorders `strings` in place.
    fn sort(&self, strings: &mut Vec<String>);
}

/// Keeps insertion order.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentitySorter;

impl StringSorter for IdentitySorter {
    fn sort(&self, _strings: &mut Vec<String>) {}
}

/// Orders strings by their UTF-8 bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlphabeticalSorter;

impl StringSorter for AlphabeticalSorter {
    fn sort(&self, strings: &mut Vec<String>) {
        strings.sort();
    }
}

/// Interned strings with offset-based IDs.
pub struct StringTable {
    ids: HashMap<String, u16>,
    strings: Vec<String>,
    next_id: usize,
    use_constants: bool,
    sorter: Arc<dyn StringSorter>,
}

impl Default for StringTable {
    fn default() -> Self {
        StringTable::new(true, Arc::new(IdentitySorter))
    }
}

impl StringTable {
    /// Creates a table holding only the empty string.
    ///
    /// # Arguments
    ///
    /// * `use_constants` - Resolve framework names against the runtime's constant list
    /// * `sorter` - Order of strings appended by [`StringTable::merge`]
    #[must_use]
    pub fn new(use_constants: bool, sorter: Arc<dyn StringSorter>) -> Self {
        let mut ids = HashMap::new();
        ids.insert(String::new(), 0);

        StringTable {
            ids,
            strings: vec![String::new()],
            next_id: 1,
            use_constants,
            sorter,
        }
    }

    /// Returns the ID of `value`, adding it if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unsupported`] for strings containing NUL, which cannot be stored
    /// terminated, and [`crate::Error::CapacityOverflow`] once IDs reach the constant range.
    pub fn intern(&mut self, value: &str) -> Result<u16> {
        if let Some(&id) = self.ids.get(value) {
            return Ok(id);
        }

        if self.use_constants {
            if let Some(id) = constants::lookup(value) {
                return Ok(id);
            }
        }

        if value.contains('\0') {
            return Err(unsupported_error!(
                "string {:?} contains an embedded NUL",
                value
            ));
        }

        let id = check_id(self.next_id, CONSTANT_BASE, "string table offset")?;
        self.next_id += value.len() + 1;
        self.ids.insert(value.to_string(), id);
        self.strings.push(value.to_string());
        Ok(id)
    }

    /// Returns the ID of `value` without adding it.
    #[must_use]
    pub fn try_get(&self, value: &str) -> Option<u16> {
        self.ids.get(value).copied().or_else(|| {
            if self.use_constants {
                constants::lookup(value)
            } else {
                None
            }
        })
    }

    /// Number of stored strings, including the empty string.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Always `false`; the empty string is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Size of the emitted table in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.next_id
    }

    /// Iterates over `(id, string)` in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &str)> {
        self.strings
            .iter()
            .map(|s| (self.ids.get(s).copied().unwrap_or_default(), s.as_str()))
    }

    /// Appends every string of `other` that is not yet present, in the order chosen by this
    /// table's sorter. Existing IDs never change.
    ///
    /// # Returns
    ///
    /// A map from IDs of `other` to IDs in `self`, covering every string of `other`.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`StringTable::intern`].
    pub fn merge(&mut self, other: &StringTable) -> Result<HashMap<u16, u16>> {
        let mut pending: Vec<String> = other.strings.clone();
        self.sorter.sort(&mut pending);

        let mut remap = HashMap::with_capacity(pending.len());
        for value in &pending {
            let new_id = self.intern(value)?;
            if let Some(&old_id) = other.ids.get(value) {
                remap.insert(old_id, new_id);
            }
        }
        Ok(remap)
    }

    /// Writes every stored string, NUL-terminated, in ID order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the sink fails.
    pub fn write<W: Write + Seek>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        for value in &self.strings {
            writer.write_bytes(value.as_bytes())?;
            writer.write_u8(0)?;
        }
        Ok(())
    }
}
