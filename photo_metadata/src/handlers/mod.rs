//! # File handlers
//!
//! A handler owns one file's container tree and the providers over it. It's
//! picked by sniffing the first bytes of the file, in this order:
//!
//! 1. JPEG, starting with `FF D8`;
//! 2. XMP sidecars, whose first non-blank line starts an XMP packet;
//! 3. TIFF, starting with `II*\0` or `MM\0*`.
//!
//! Saving writes the whole file, with only the edited containers re-rendered.
//! A handler with no edits writes back exactly the bytes it read.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::MetadataError,
    providers::Provider,
    source::{FileSource, Section},
};

pub use self::{jpeg::JpegHandler, tiff::TiffHandler, xmp::XmpHandler};

pub mod jpeg;
pub mod tiff;
pub mod xmp;

/// One opened file.
pub trait FileHandler: Send + Sync + core::fmt::Debug {
    /// The semantic fields of the file, merged over every container in it.
    fn provider(&self) -> &dyn Provider;

    fn provider_mut(&mut self) -> &mut dyn Provider;

    /// Whether anything was edited since the file was read.
    fn dirty(&self) -> bool;

    /// Writes the whole file to `out`, returning how many bytes were written.
    fn save(&mut self, out: &mut dyn Write) -> Result<u64, MetadataError>;
}

/// Picks a handler for `source` and reads it.
///
/// Returns `Ok(None)` for formats we don't handle. A file that looks like a
/// format we handle, but doesn't parse, is an error.
pub fn handler_for(source: Section) -> Result<Option<Box<dyn FileHandler>>, MetadataError> {
    if JpegHandler::sniff(&source)? {
        log::debug!("Reading the file as a JPEG.");
        return Ok(Some(Box::new(JpegHandler::read(source)?)));
    }
    if XmpHandler::sniff(&source)? {
        log::debug!("Reading the file as an XMP sidecar.");
        return Ok(Some(Box::new(XmpHandler::read(source)?)));
    }
    if TiffHandler::sniff(&source)? {
        log::debug!("Reading the file as a TIFF.");
        return Ok(Some(Box::new(TiffHandler::read(source)?)));
    }

    log::debug!("The file isn't in a format we handle.");
    Ok(None)
}

/// Like [`handler_for`], but an unknown format is an error too.
pub fn open(source: Section) -> Result<Box<dyn FileHandler>, MetadataError> {
    handler_for(source)?.ok_or_else(|| {
        log::error!("Can't open a file in an unknown format!");
        MetadataError::Unsupported("unknown file format".into())
    })
}

/// Opens the file at `path`.
///
/// The file is read as needed, so it has to stay in place until the handler
/// is dropped. [`save_to_path`] is fine with that.
pub fn open_path(path: impl AsRef<Path>) -> Result<Box<dyn FileHandler>, MetadataError> {
    let path = path.as_ref();
    log::trace!("Opening `{}`.", path.display());
    let source = FileSource::open(path)?;
    open(Section::new(Arc::new(source)))
}

/// Saves to `path` by way of a temporary file beside it, which is renamed
/// over `path` once it's complete.
///
/// On failure the temporary file is removed, and `path` is untouched.
pub fn save_to_path(
    handler: &mut dyn FileHandler,
    path: impl AsRef<Path>,
) -> Result<(), MetadataError> {
    let path = path.as_ref();
    let temp = temp_path(path);
    log::debug!("Saving `{}` through `{}`.", path.display(), temp.display());

    let result = write_file(handler, &temp).and_then(|()| Ok(std::fs::rename(&temp, path)?));
    if let Err(ref e) = result {
        log::error!("Couldn't save `{}`! err: {e}", path.display());
        // it may never have been created
        _ = std::fs::remove_file(&temp);
    }
    result
}

fn write_file(handler: &mut dyn FileHandler, temp: &Path) -> Result<(), MetadataError> {
    let mut out = BufWriter::new(File::create(temp)?);
    handler.save(&mut out)?;
    out.into_inner()
        .map_err(|e| MetadataError::from(e.into_error()))?
        .sync_all()?;
    Ok(())
}

/// `dir/.name.TEMP` for `dir/name`.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.TEMP"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{handler_for, open, temp_path};
    use crate::{error::MetadataError, source::Section, util::logger};

    #[test]
    fn unknown_formats_are_skipped() {
        logger();

        let png = Section::from_bytes(b"\x89PNG\r\n\x1a\n".to_vec());
        assert!(handler_for(png.clone()).unwrap().is_none());
        assert!(matches!(
            open(png).unwrap_err(),
            MetadataError::Unsupported(_)
        ));

        assert!(handler_for(Section::empty()).unwrap().is_none());
    }

    #[test]
    fn broken_files_fail_to_open() {
        logger();

        // a JPEG signature, then garbage
        let file = Section::from_bytes(vec![0xFF, 0xD8, 0x12, 0x34]);
        assert!(handler_for(file).is_err());
    }

    #[test]
    fn temp_files_sit_beside_the_target() {
        logger();

        assert_eq!(
            temp_path(Path::new("/photos/2024/beach.jpg")),
            Path::new("/photos/2024/.beach.jpg.TEMP")
        );
    }
}
