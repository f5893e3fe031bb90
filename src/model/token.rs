//! Original metadata tokens.

use std::fmt;

/// A metadata token of the source assembly.
///
/// The high byte is the source table, the low 24 bits the row. Tokens are never interpreted by
/// the linker except for the debug map, which correlates them with output IDs, and for raw token
/// operands, which are passed through to the byte code unchanged.
///
/// ```rust
/// use cilpack::model::Token;
///
/// let token = Token::new(0x0600_0012);
/// assert_eq!(token.table(), 0x06);
/// assert_eq!(token.row(), 0x12);
/// assert_eq!(token.to_string(), "0x06000012");
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// Creates a token from its raw value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Token(value)
    }

    /// Builds a token from a table byte and a row number (truncated to 24 bits).
    #[must_use]
    pub const fn from_parts(table: u8, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// The raw 32-bit value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The source table byte.
    #[must_use]
    pub const fn table(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The 1-based row within the source table.
    #[must_use]
    pub const fn row(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// `true` for the nil token (row 0).
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.row() == 0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(0x{:08x})", self.0)
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts() {
        let token = Token::from_parts(0x02, 0x0000_0005);
        assert_eq!(token.value(), 0x0200_0005);
        assert_eq!(token.table(), 0x02);
        assert_eq!(token.row(), 5);
        assert!(!token.is_null());
        assert!(Token::new(0x0100_0000).is_null());
    }

    #[test]
    fn test_row_truncated() {
        let token = Token::from_parts(0x04, 0x0100_0001);
        assert_eq!(token.row(), 1);
        assert_eq!(token.table(), 0x04);
    }
}
