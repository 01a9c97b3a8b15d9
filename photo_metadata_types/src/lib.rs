//! # `photo_metadata_types`
//!
//! The value types behind each semantic field of `photo_metadata`.
//!
//! Every type here knows how to parse and render itself in the textual forms
//! that the various metadata standards use. For example, a [`DateTime`] can be
//! read from an EXIF `DateTimeOriginal` triplet, an IPTC `Date Created` pair,
//! or an XMP date string, and it can be written back out in any of them.
//!
//! None of these types know anything about containers or files.

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod altstring;
pub mod datetime;
pub mod error;
pub mod fixed;
pub mod gps;
pub mod hier;
pub mod location;
pub mod orientation;

pub use altstring::{AltItem, AltString};
pub use datetime::DateTime;
pub use error::ValueError;
pub use fixed::FixedFloat;
pub use gps::{ExifGps, GpsCoords, XmpGps};
pub use hier::HierValue;
pub use location::Location;
pub use orientation::Orientation;
