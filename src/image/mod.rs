//! Image assembly and its side products.
//!
//! - [`builder`] - Orchestrates table construction and serialization
//! - [`header`] - The fixed header and its back-patched table directory
//! - [`native`] - Checksum binding the image to the firmware's native methods
//! - [`debugmap`] - Token to ID correlation for debuggers
//!
//! # Examples
//!
//! ```rust
//! use cilpack::{image::{BuildOptions, ImageBuilder}, model::Assembly, tables::TableKind};
//!
//! let assembly = Assembly::new("Empty");
//! let image = ImageBuilder::new(&assembly, BuildOptions::default()).build()?;
//!
//! assert_eq!(&image.bytes[..6], b"NFMRK2");
//! assert_eq!(image.header.image_len() as usize, image.bytes.len());
//! assert_eq!(image.header.table_size(TableKind::TypeDef), 0);
//! # Ok::<(), cilpack::Error>(())
//! ```

pub mod builder;
pub mod debugmap;
pub mod header;
pub mod native;

pub use builder::{BuildOptions, Image, ImageBuilder};
pub use debugmap::DebugMap;
pub use header::{ImageFlags, ImageHeader};
