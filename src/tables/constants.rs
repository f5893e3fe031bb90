//! Strings the runtime already knows.
//!
//! The target runtime carries a fixed list of frequently used framework names. Strings found in
//! that list are never written to an image; they are referred to by `CONSTANT_BASE | index`.
//! The list is versioned through [`STRING_TABLE_VERSION`], which is stored in the image header
//! so a runtime can reject images built against a different list.

use std::{collections::HashMap, sync::OnceLock};

/// Version of [`COMMON_STRINGS`]; bump on any change to the list.
pub const STRING_TABLE_VERSION: u16 = 1;

/// First ID of the constant string range.
pub const CONSTANT_BASE: u16 = 0x8000;

/// The strings known to the runtime, in ID order.
pub static COMMON_STRINGS: &[&str] = &[
    "System",
    "Object",
    "ValueType",
    "Enum",
    "Delegate",
    "MulticastDelegate",
    "Attribute",
    "Exception",
    "String",
    "Boolean",
    "Char",
    "SByte",
    "Byte",
    "Int16",
    "UInt16",
    "Int32",
    "UInt32",
    "Int64",
    "UInt64",
    "Single",
    "Double",
    "IntPtr",
    "UIntPtr",
    "Void",
    "Array",
    "Type",
    "DateTime",
    "TimeSpan",
    "Math",
    "Console",
    "Debug",
    "Thread",
    "Collections",
    "IEnumerable",
    "IEnumerator",
    "IDisposable",
    "ArrayList",
    "Hashtable",
    "Reflection",
    "Runtime",
    "CompilerServices",
    "Diagnostics",
    "Threading",
    "Text",
    "IO",
    ".ctor",
    ".cctor",
    "Finalize",
    "ToString",
    "Equals",
    "GetHashCode",
    "GetType",
    "Dispose",
    "Invoke",
    "BeginInvoke",
    "EndInvoke",
    "Current",
    "MoveNext",
    "Reset",
    "GetEnumerator",
    "get_Current",
    "get_Length",
    "get_Count",
    "get_Item",
    "set_Item",
    "Length",
    "Count",
    "Item",
    "Message",
    "value__",
    "value",
    "Empty",
    "Concat",
    "Format",
    "WriteLine",
    "Sleep",
    "Add",
    "Remove",
    "Clear",
    "Contains",
    "IndexOf",
    "CopyTo",
    "Clone",
    "Combine",
    "Main",
];

fn index() -> &'static HashMap<&'static str, u16> {
    static INDEX: OnceLock<HashMap<&'static str, u16>> = OnceLock::new();
    INDEX.get_or_init(|| {
        COMMON_STRINGS
            .iter()
            .enumerate()
            .filter_map(|(i, s)| u16::try_from(i).ok().map(|i| (*s, CONSTANT_BASE | i)))
            .collect()
    })
}

/// Returns the constant ID of `value`, if the runtime knows it.
#[must_use]
pub fn lookup(value: &str) -> Option<u16> {
    index().get(value).copied()
}

/// Returns the string behind a constant ID.
#[must_use]
pub fn resolve(id: u16) -> Option<&'static str> {
    if id < CONSTANT_BASE {
        return None;
    }
    COMMON_STRINGS.get(usize::from(id - CONSTANT_BASE)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_resolve() {
        let id = lookup(".ctor").unwrap();
        assert!(id >= CONSTANT_BASE);
        assert_eq!(resolve(id), Some(".ctor"));
        assert_eq!(lookup("System"), Some(CONSTANT_BASE));
        assert_eq!(lookup("NotAFrameworkName"), None);
        assert_eq!(resolve(5), None);
    }

    #[test]
    fn test_no_duplicates() {
        assert_eq!(index().len(), COMMON_STRINGS.len());
    }
}
