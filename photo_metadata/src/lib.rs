//! # `photo_metadata`
//!
//! A library to read, edit, and rewrite the metadata in JPEG files, TIFF
//! files, and XMP sidecars.
//!
//! Photos tend to store the same fact in several places at once. A caption
//! might live in the EXIF `ImageDescription` tag, the EXIF `UserComment`
//! tag, the IPTC `Caption/Abstract` dataset, and two or three XMP properties.
//! This library exposes each fact once, as a semantic field (caption, creator,
//! date and time, GPS coordinates, keywords, and so on), and keeps all of
//! those places consistent when you change it.
//!
//! ## Layout
//!
//! - [`source`]: random-access byte sources and the windows over them.
//! - [`containers`]: the binary formats (JPEG segments, TIFF IFDs, Photoshop
//!   image resources, IPTC IIM datasets, and XMP's RDF) with in-place editing
//!   and byte-exact re-rendering.
//! - [`providers`]: adapters that project each container onto the semantic
//!   fields, plus the [`providers::multi::MultiProvider`] that merges them.
//! - [`handlers`]: sniff a file's format, assemble its container tree, and
//!   save it back out.
//!
//! Anything the library doesn't understand is kept byte-for-byte, and a file
//! with no edits is written back exactly as it was read.
//!
//! ## Example
//!
//! ```no_run
//! use photo_metadata::handlers::{open_path, save_to_path};
//!
//! let mut handler = open_path("photo.jpg").unwrap();
//! handler.provider_mut().set_caption("A day at the beach").unwrap();
//! save_to_path(handler.as_mut(), "photo.jpg").unwrap();
//! ```
//!
//! ## License
//!
//! This project is dual-licensed under either the Apache License 2.0 or the
//! MIT License at your option.

#![forbid(unsafe_code)]

pub mod container;
pub mod containers;
pub mod error;
pub mod handlers;
pub mod providers;
pub mod source;

/// The value types that semantic fields are expressed in.
pub mod types {
    pub use photo_metadata_types::*;
}

pub use crate::{
    container::{Container, ContainerRef, Shared},
    error::{MetadataError, StructureError},
    handlers::{FileHandler, open, open_path, save_to_path},
    providers::Provider,
    source::{ByteSource, FileSource, MemorySource, Section},
};

pub(crate) mod util {
    /// Starts a logger for tests.
    #[cfg(test)]
    pub fn logger() {
        _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::max())
            .format_file(true)
            .format_line_number(true)
            .try_init();
    }
}
