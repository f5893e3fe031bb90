//! Method body code generation.
//!
//! Source bodies arrive as structured instructions with symbolic operands. [`encoder`]
//! re-encodes them against the output tables and [`stack`] computes the evaluation stack
//! bound the runtime needs to size its frames.

pub mod encoder;
pub mod stack;

pub use encoder::{encode_body, EncodedBody};
pub use stack::max_stack;
