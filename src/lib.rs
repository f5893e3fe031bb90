// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # cilpack
//!
//! A linker backend that packs a fully linked .NET assembly into the compact, table-based image
//! format executed by embedded managed-code interpreters.
//!
//! The input is a read-only [`model::Assembly`]: types with their fields, methods, attributes and
//! CIL bodies, the referenced assemblies and the embedded resources. The output is a single
//! binary image: a fixed header followed by sixteen tables, each aligned to 4 bytes. Every
//! cross reference inside the image is a 16-bit ID; every name is an offset into one shared
//! string table; every method body is re-encoded with compact operands.
//!
//! ## Features
//!
//! - **Two-phase build** - All tables are built and all IDs are assigned before the first byte
//!   is written, so a build either yields a complete image or fails without output
//! - **Back-patched header** - Table offsets and CRCs are patched into reserved header slots
//! - **Either byte order** - Little- or big-endian images from the same model
//! - **Debug map** - Token to ID correlation and per-instruction offset maps, rendered as XML
//! - **Atomic output** - Images are written through a memory-mapped temporary file
//!
//! ## Quick Start
//!
//! ```rust
//! use cilpack::prelude::*;
//!
//! let mut assembly = Assembly::new("Blinky");
//! let mut program = TypeDefinition::new(TypeName::new("Blinky", "Blinky", "Program"));
//! program.methods.push(
//!     MethodDefinition::new(
//!         "Main",
//!         MethodAttributes::PUBLIC | MethodAttributes::STATIC,
//!         MethodSig::static_(TypeSig::Void, vec![]),
//!     )
//!     .with_body(MethodBody::from_instructions(vec![], vec![(OpCode::RET, Operand::None)])),
//! );
//! assembly.types.push(program);
//!
//! let image = ImageBuilder::new(&assembly, BuildOptions::default()).build()?;
//! assert_eq!(image.header.table_size(TableKind::MethodDef), 16);
//! # Ok::<(), cilpack::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`model`] - The input assembly model, opcodes and signatures
//! - [`tables`] - Construction of every output table and the symbol resolver
//! - [`codegen`] - Method body re-encoding and stack depth analysis
//! - [`image`] - Header, serialization order, checksums and the debug map
//! - [`file`] - Endian-aware writer with back-patching and file output
//! - [`utils`] - Checked narrowing and CRC helpers
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade: one `info` line per finished image, `debug` lines
//! per table and `trace` lines per method body and native stub. Install any logger to see them.

#[macro_use]
mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

pub mod codegen;
pub mod file;
pub mod image;
pub mod model;
pub mod prelude;
pub mod tables;
pub mod utils;

/// `cilpack` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `cilpack` Error type
///
/// The main error type for all operations in this crate. See [`Error`] for the full list of
/// failure categories.
pub use error::Error;

/// Builds the image of `assembly` with default options and returns its bytes.
///
/// # Errors
///
/// Returns the first failure of the build; see [`image::ImageBuilder::build`].
///
/// # Examples
///
/// ```rust
/// use cilpack::{build_image, model::Assembly};
///
/// let bytes = build_image(&Assembly::new("Empty"))?;
/// assert_eq!(&bytes[..8], b"NFMRK2\0\0");
/// # Ok::<(), cilpack::Error>(())
/// ```
pub fn build_image(assembly: &model::Assembly) -> Result<Vec<u8>> {
    image::ImageBuilder::new(assembly, image::BuildOptions::default())
        .build()
        .map(|image| image.bytes)
}
