//! A "container" for an opaque byte array.

use std::io::Write;

use crate::{
    container::{Container, write_bytes},
    error::MetadataError,
    source::Section,
};

/// Bytes we don't interpret, but might replace.
///
/// The Photoshop resource holding the IIM block's MD5 is one of these.
#[derive(Clone, Debug)]
pub struct Raw {
    source: Section,
    data: Option<Vec<u8>>,
    dirty: bool,
}

impl Raw {
    /// Wraps existing bytes.
    pub fn read(source: Section) -> Self {
        Self {
            source,
            data: None,
            dirty: false,
        }
    }

    /// A new block holding `data`. It counts as an edit.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            source: Section::empty(),
            data: Some(data),
            dirty: true,
        }
    }

    /// A copy of the current bytes.
    pub fn data(&self) -> Result<Vec<u8>, MetadataError> {
        match self.data {
            Some(ref data) => Ok(data.clone()),
            None => Ok(self.source.to_vec()?),
        }
    }

    /// Replaces the bytes. Setting the same bytes again isn't an edit.
    pub fn set_data(&mut self, data: &[u8]) -> Result<(), MetadataError> {
        if self.data()? == data {
            return Ok(());
        }

        log::debug!("Raw block replaced with `{}` bytes.", data.len());
        self.data = Some(data.to_vec());
        self.dirty = true;
        Ok(())
    }

    fn len(&self) -> u64 {
        match self.data {
            Some(ref data) => data.len() as u64,
            None => self.source.len(),
        }
    }
}

impl Container for Raw {
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dirty(&self) -> bool {
        self.dirty
    }

    fn layout(&mut self) -> Result<u64, MetadataError> {
        Ok(self.len())
    }

    fn write(&mut self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        match self.data {
            Some(ref data) => write_bytes(out, data),
            None => Ok(self.source.copy_to(out)?),
        }
    }
}
