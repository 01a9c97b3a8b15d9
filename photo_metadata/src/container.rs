//! The interface every metadata container honors.

use std::{io::Write, sync::Arc};

use parking_lot::RwLock;

use crate::error::MetadataError;

/// A parsed block of metadata that can be edited in place and rendered back
/// out.
///
/// Rendering is two steps. [`Container::layout`] fixes the rendered size
/// (parents need it before they can write their own headers), then
/// [`Container::write`] emits exactly that many bytes. Writing a different
/// amount is a [`MetadataError::Logic`] error.
///
/// A container that hasn't been edited renders as the bytes it was read from.
pub trait Container: Send + Sync + core::fmt::Debug {
    /// Whether the container has nothing in it.
    ///
    /// Empty containers are dropped from the output along with whatever
    /// points at them.
    fn is_empty(&self) -> bool;

    /// Whether the container, or anything inside it, was edited.
    fn dirty(&self) -> bool;

    /// Plans the rendering and returns its size in bytes.
    fn layout(&mut self) -> Result<u64, MetadataError>;

    /// Renders the container to `out`, returning how many bytes were written.
    ///
    /// [`Container::layout`] must have been called since the last edit.
    fn write(&mut self, out: &mut dyn Write) -> Result<u64, MetadataError>;
}

/// A container that's edited from more than one place.
pub type Shared<T> = Arc<RwLock<T>>;

/// A type-erased handle to a nested container.
pub type ContainerRef = Arc<RwLock<dyn Container>>;

/// Wraps `value` for sharing.
pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

/// Writes all of `bytes`, returning the count.
pub(crate) fn write_bytes(out: &mut dyn Write, bytes: &[u8]) -> Result<u64, MetadataError> {
    out.write_all(bytes)?;
    Ok(bytes.len() as u64)
}

/// Writes `count` zero bytes.
pub(crate) fn write_zeros(out: &mut dyn Write, count: u64) -> Result<u64, MetadataError> {
    const ZEROS: [u8; 512] = [0; 512];

    let mut left = count;
    while left > 0 {
        let n = left.min(ZEROS.len() as u64) as usize;
        out.write_all(&ZEROS[..n])?;
        left -= n as u64;
    }
    Ok(count)
}

/// Fails with a logic error when a container wrote a different number of
/// bytes than its layout promised.
pub(crate) fn check_written(what: &str, planned: u64, written: u64) -> Result<(), MetadataError> {
    if planned == written {
        return Ok(());
    }

    log::error!("{what} planned `{planned}` bytes, but wrote `{written}`!");
    Err(MetadataError::Logic(format!(
        "{what}: actual size `{written}` differs from predicted size `{planned}`"
    )))
}
