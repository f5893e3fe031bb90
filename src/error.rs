use thiserror::Error;

use crate::tables::TableKind;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! unsupported_error {
    ($msg:expr) => {
        crate::Error::Unsupported($msg.to_string())
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Unsupported(format!($fmt, $($arg)*))
    };
}

macro_rules! inconsistent_error {
    ($msg:expr) => {
        crate::Error::InconsistentModel($msg.to_string())
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InconsistentModel(format!($fmt, $($arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// A build either produces a complete image or fails with exactly one of these values. Errors
/// raised deep inside a table or a method body are wrapped on the way out with the name of the
/// table, method or resource that was being processed, so the outermost variant usually is one
/// of the context wrappers and the root cause is reachable via [`std::error::Error::source`].
///
/// # Error Categories
///
/// ## Input Model Errors
/// - [`Error::Unsupported`] - A construct the image format cannot express
/// - [`Error::InconsistentModel`] - A dangling symbol, dependency cycle or bad branch target
/// - [`Error::OperandMismatch`] - An operand whose kind does not match its opcode
///
/// ## Encoding Limits
/// - [`Error::CapacityOverflow`] - An ID, count or offset exceeds its fixed-width field
///
/// ## Writer Errors
/// - [`Error::PatchOverflow`] - A back-patch tried to write past its reservation
/// - [`Error::OutOfBounds`] - A bounds-checked buffer access failed
/// - [`Error::Malformed`] - An internal invariant did not hold
/// - [`Error::Io`] / [`Error::MmapFailed`] - Sink and filesystem failures
///
/// # Examples
///
/// ```rust
/// use cilpack::{build_image, model::Assembly, Error};
///
/// let assembly = Assembly::new("Empty");
/// match build_image(&assembly) {
///     Ok(bytes) => println!("image is {} bytes", bytes.len()),
///     Err(Error::CapacityOverflow { what, value, limit }) => {
///         eprintln!("{what} = {value} does not fit (limit {limit})");
///     }
///     Err(e) => eprintln!("build failed: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input uses a construct the image format has no encoding for.
    ///
    /// Examples are `calli` signatures, `fault` handlers, array-valued attribute arguments and
    /// resources with an unknown type hint.
    #[error("Unsupported construct - {0}")]
    Unsupported(String),

    /// The input model references something that does not exist.
    ///
    /// Raised for symbols that resolve in none of the output tables, branch targets that are not
    /// the start of an instruction and cyclic type dependencies.
    #[error("Inconsistent model - {0}")]
    InconsistentModel(String),

    /// A value does not fit into the fixed-width field reserved for it.
    ///
    /// # Fields
    ///
    /// * `what` - Which quantity overflowed
    /// * `value` - The offending value
    /// * `limit` - The largest value the field can hold
    #[error("Capacity overflow - {what} is {value}, limit is {limit}")]
    CapacityOverflow {
        /// Which quantity overflowed
        what: &'static str,
        /// The offending value
        value: u64,
        /// The largest representable value
        limit: u64,
    },

    /// An instruction operand does not match the operand kind of its opcode.
    #[error("Operand mismatch - {opcode} expects {expected}, found {found}")]
    OperandMismatch {
        /// Mnemonic of the instruction
        opcode: &'static str,
        /// The operand kind the opcode requires
        expected: &'static str,
        /// The operand kind that was supplied
        found: &'static str,
    },

    /// A back-patch wrote more bytes than its reservation holds.
    #[error("Patch overflow - reserved {reserved} bytes, attempted to write {attempted}")]
    PatchOverflow {
        /// Size of the reserved region
        reserved: usize,
        /// Total size the patch would have required
        attempted: usize,
    },

    /// An internal invariant was violated.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what went wrong
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted on a buffer.
    #[error("Out of Bound access would have occurred!")]
    OutOfBounds,

    /// Error from the byte sink or the filesystem.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Failed to map the output file into memory.
    #[error("Memory mapping failed - {0}")]
    MmapFailed(String),

    /// Failed to render the debug map.
    #[error("Debug map - {0}")]
    DebugMap(String),

    /// A failure while building or writing a specific table.
    #[error("Table {table:?}: {source}")]
    InTable {
        /// The table that was being processed
        table: TableKind,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// A failure while encoding a specific method.
    #[error("Method {method}: {source}")]
    InMethod {
        /// Fully qualified name of the method
        method: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// A failure while processing a specific resource.
    #[error("Resource {resource}: {source}")]
    InResource {
        /// Name of the resource
        resource: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps `self` with the table that was being processed.
    #[must_use]
    pub fn in_table(self, table: TableKind) -> Self {
        Error::InTable {
            table,
            source: Box::new(self),
        }
    }

    /// Wraps `self` with the method that was being encoded.
    #[must_use]
    pub fn in_method(self, method: impl Into<String>) -> Self {
        Error::InMethod {
            method: method.into(),
            source: Box::new(self),
        }
    }

    /// Wraps `self` with the resource that was being processed.
    #[must_use]
    pub fn in_resource(self, resource: impl Into<String>) -> Self {
        Error::InResource {
            resource: resource.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping all context wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::InTable { source, .. }
            | Error::InMethod { source, .. }
            | Error::InResource { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_context() {
        let err = inconsistent_error!("missing {}", "Foo")
            .in_method("N.T::M")
            .in_table(TableKind::ByteCode);

        assert!(matches!(err, Error::InTable { .. }));
        match err.root_cause() {
            Error::InconsistentModel(msg) => assert_eq!(msg, "missing Foo"),
            other => panic!("unexpected root cause: {other:?}"),
        }
    }

    #[test]
    fn test_display_names_context() {
        let err = unsupported_error!("fault handlers").in_method("A.B::C");
        let text = err.to_string();
        assert!(text.contains("A.B::C"));
        assert!(text.contains("fault handlers"));
    }

    #[test]
    fn test_malformed_records_location() {
        let err = malformed_error!("bad {}", 1);
        match err {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "bad 1");
                assert!(file.ends_with("error.rs"));
            }
            _ => panic!("expected Malformed"),
        }
    }
}
