//! Errors shared by every layer of the crate.

use std::sync::Arc;

use crate::containers::{
    iim::error::IimError, jpeg::error::JpegError, psir::error::PsirError, rdf::error::RdfError,
    tiff::error::TiffError,
};

/// Anything that can go wrong while reading, editing, or writing metadata.
#[derive(Clone, Debug)]
pub enum MetadataError {
    /// A container is malformed.
    Structure(StructureError),

    /// A value is present, but it can't be decoded.
    ///
    /// For example, a UserComment that isn't valid UTF-16, or an RDF
    /// property with the wrong shape.
    Encoding(String),

    /// The request makes sense, but we can't carry it out.
    ///
    /// For example, adding a face region, or an XMP extension packet that
    /// duplicates properties we manage ourselves.
    Unsupported(String),

    /// A provider doesn't back the requested field.
    ///
    /// The multi-provider swallows this unless no provider backs the field.
    NotSupported,

    /// Reading the source or writing the sink failed.
    Io(Arc<std::io::Error>),

    /// A bug: the crate broke one of its own invariants.
    Logic(String),
}

impl MetadataError {
    /// Whether this is [`MetadataError::NotSupported`].
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported)
    }
}

impl PartialEq for MetadataError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Structure(a), Self::Structure(b)) => a == b,
            (Self::Encoding(a), Self::Encoding(b)) => a == b,
            (Self::Unsupported(a), Self::Unsupported(b)) => a == b,
            (Self::NotSupported, Self::NotSupported) => true,
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind(),
            (Self::Logic(a), Self::Logic(b)) => a == b,
            _ => false,
        }
    }
}

impl core::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Structure(e) => write!(f, "Malformed metadata container. err: {e}"),
            Self::Encoding(msg) => write!(f, "Couldn't decode a metadata value: {msg}"),
            Self::Unsupported(msg) => write!(f, "Unsupported: {msg}"),
            Self::NotSupported => f.write_str("This field isn't supported here."),
            Self::Io(e) => write!(f, "I/O failure. err: {e}"),
            Self::Logic(msg) => write!(f, "Internal logic error (please report this!): {msg}"),
        }
    }
}

impl core::error::Error for MetadataError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Structure(e) => Some(e),
            Self::Io(e) => Some(e.as_ref()),
            Self::Encoding(_)
            | Self::Unsupported(_)
            | Self::NotSupported
            | Self::Logic(_) => None,
        }
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<photo_metadata_types::ValueError> for MetadataError {
    fn from(value: photo_metadata_types::ValueError) -> Self {
        Self::Encoding(value.to_string())
    }
}

impl From<StructureError> for MetadataError {
    fn from(value: StructureError) -> Self {
        Self::Structure(value)
    }
}

/// A malformed container, tagged with the kind of container.
#[derive(Clone, Debug, PartialEq)]
pub enum StructureError {
    Tiff(TiffError),
    Jpeg(JpegError),
    Psir(PsirError),
    Iim(IimError),
    Rdf(RdfError),
}

impl core::fmt::Display for StructureError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Tiff(e) => write!(f, "TIFF: {e}"),
            Self::Jpeg(e) => write!(f, "JPEG: {e}"),
            Self::Psir(e) => write!(f, "Photoshop: {e}"),
            Self::Iim(e) => write!(f, "IIM: {e}"),
            Self::Rdf(e) => write!(f, "RDF: {e}"),
        }
    }
}

impl core::error::Error for StructureError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Tiff(e) => Some(e),
            Self::Jpeg(e) => Some(e),
            Self::Psir(e) => Some(e),
            Self::Iim(e) => Some(e),
            Self::Rdf(e) => Some(e),
        }
    }
}

macro_rules! structure_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for StructureError {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }

            impl From<$ty> for MetadataError {
                fn from(value: $ty) -> Self {
                    Self::Structure(StructureError::$variant(value))
                }
            }
        )*
    };
}

structure_from!(
    Tiff(TiffError),
    Jpeg(JpegError),
    Psir(PsirError),
    Iim(IimError),
    Rdf(RdfError),
);
