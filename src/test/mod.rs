//! Sample assemblies shared by the unit tests.


pub use factories::*;
