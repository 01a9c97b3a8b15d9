//! The binary and textual formats metadata is stored in.
//!
//! Each container reads itself from a [`Section`](crate::source::Section),
//! offers typed editing operations, and implements
//! [`Container`](crate::container::Container) so its parent can embed it.

pub mod iim;
pub mod jpeg;
pub mod psir;
pub mod raw;
pub mod rdf;
pub mod tiff;
