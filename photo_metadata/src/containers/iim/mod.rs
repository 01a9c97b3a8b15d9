//! IPTC Information Interchange Model blocks.
//!
//! An IIM block is a stream of datasets, each a `0x1C` marker, a 2-byte ID
//! (record number, then dataset number), a length, and a body. Bodies up to
//! `0x7FFF` bytes use a 2-byte length. Longer ones set the high bit and give
//! the number of length bytes that follow.
//!
//! Photoshop resource `0x425` holds the MD5 of the block, so we keep one
//! around and push a fresh one into that resource whenever the block changes.

use std::{collections::BTreeMap, io::Write};

use md5::{Digest as _, Md5};
use winnow::{
    Parser as _,
    binary::{be_u16, u8},
    error::EmptyError,
    token::take,
};

use crate::{
    container::{Container, Shared, check_written, write_bytes},
    containers::raw::Raw,
    error::MetadataError,
    source::Section,
};

use self::error::IimError;

pub mod error;

/// Starts every dataset.
const TAG_MARKER: u8 = 0x1C;

/// Extended-length datasets claiming more than this (1 MiB) are rejected.
const MAX_EXTENDED_SIZE: u64 = 0x10_0000;

/// Bodies longer than this need the extended-length form.
const MAX_STANDARD_SIZE: usize = 0x7FFF;

/// An IPTC IIM block, as a multimap from dataset ID to bodies.
#[derive(Debug)]
pub struct Iim {
    source: Section,
    datasets: BTreeMap<u16, Vec<Vec<u8>>>,
    hash: [u8; 16],
    hash_target: Option<Shared<Raw>>,
    rendered: Option<Vec<u8>>,
    dirty: bool,
}

impl Iim {
    /// A block with no datasets.
    pub fn new() -> Self {
        Self {
            source: Section::empty(),
            datasets: BTreeMap::new(),
            hash: md5_of(&[]),
            hash_target: None,
            rendered: None,
            dirty: false,
        }
    }

    /// Parses a block.
    ///
    /// TIFF writers sometimes store IIM blocks as LONGs, leaving one or two
    /// NUL bytes at the end. Those are skipped.
    pub fn read(source: Section) -> Result<Self, MetadataError> {
        let bytes = source.to_vec()?;
        let hash = md5_of(&bytes);

        let mut datasets: BTreeMap<u16, Vec<Vec<u8>>> = BTreeMap::new();
        let input = &mut bytes.as_slice();

        loop {
            let offset = (bytes.len() - input.len()) as u64;
            if input.is_empty() || (input.len() <= 2 && input.iter().all(|&b| b == 0)) {
                if !input.is_empty() {
                    log::warn!("Skipping `{}` NUL bytes after the last dataset.", input.len());
                }
                break;
            }

            let (id, body) = parse_dataset(input, offset)?;
            log::trace!("Found dataset `{id:#06x}` with `{}` bytes.", body.len());
            datasets.entry(id).or_default().push(body);
        }

        Ok(Self {
            source,
            datasets,
            hash,
            hash_target: None,
            rendered: None,
            dirty: false,
        })
    }

    /// The bodies of every dataset with the given ID, in order.
    pub fn datasets(&self, id: u16) -> &[Vec<u8>] {
        self.datasets.get(&id).map_or(&[], Vec::as_slice)
    }

    /// The IDs present in the block, in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.datasets
            .iter()
            .filter(|(_, bodies)| !bodies.is_empty())
            .map(|(&id, _)| id)
    }

    /// Replaces every dataset with this ID with a single one.
    ///
    /// This always counts as an edit, so don't call it with the value that's
    /// already there.
    pub fn set_dataset(&mut self, id: u16, body: Vec<u8>) {
        self.set_datasets(id, vec![body]);
    }

    /// Replaces every dataset with this ID with the given list.
    ///
    /// Like [`Iim::set_dataset`], this always counts as an edit.
    pub fn set_datasets(&mut self, id: u16, bodies: Vec<Vec<u8>>) {
        log::debug!("Setting `{}` datasets with ID `{id:#06x}`.", bodies.len());
        self.datasets.insert(id, bodies);
        self.dirty = true;
    }

    /// Removes every dataset with this ID.
    pub fn remove_datasets(&mut self, id: u16) {
        if self.datasets.remove(&id).is_some() {
            log::debug!("Removed datasets with ID `{id:#06x}`.");
            self.dirty = true;
        }
    }

    /// Where a fresh MD5 goes when the block is re-rendered.
    pub fn set_hash_target(&mut self, target: Shared<Raw>) {
        self.hash_target = Some(target);
    }

    /// The MD5 of the block.
    ///
    /// Edits show up here once [`Container::layout`] has run.
    pub fn hash(&self) -> [u8; 16] {
        self.hash
    }

    fn render(&self) -> Result<Vec<u8>, MetadataError> {
        let mut out = Vec::new();
        for (&id, bodies) in &self.datasets {
            for body in bodies {
                out.push(TAG_MARKER);
                out.extend_from_slice(&id.to_be_bytes());
                if body.len() > MAX_STANDARD_SIZE {
                    let len = u32::try_from(body.len()).map_err(|_| IimError::TooLarge { id })?;
                    out.extend_from_slice(&[0x80, 0x04]);
                    out.extend_from_slice(&len.to_be_bytes());
                } else {
                    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
                }
                out.extend_from_slice(body);
            }
        }
        Ok(out)
    }
}

impl Default for Iim {
    fn default() -> Self {
        Self::new()
    }
}

/// The MD5 of `bytes`.
fn md5_of(bytes: &[u8]) -> [u8; 16] {
    let mut hash = [0; 16];
    hash.copy_from_slice(&Md5::digest(bytes));
    hash
}

/// Parses one dataset off the front of `input`.
fn parse_dataset(input: &mut &[u8], offset: u64) -> Result<(u16, Vec<u8>), IimError> {
    let truncated = |_: EmptyError| {
        log::error!("Dataset at `{offset}` runs past the end of the block!");
        IimError::Truncated { offset }
    };

    let (marker, id, size) = (u8, be_u16, be_u16).parse_next(input).map_err(truncated)?;
    if marker != TAG_MARKER {
        log::error!("Expected a tag marker at `{offset}`, but found `{marker:#04x}`!");
        return Err(IimError::BadMarker {
            offset,
            found: marker,
        });
    }

    let size = if size & 0x8000 != 0 {
        let length_size = size & 0x7FFF;
        if !(1..=8).contains(&length_size) {
            log::error!("Dataset at `{offset}` has a length size of `{length_size}`!");
            return Err(IimError::BadLengthSize {
                offset,
                length_size,
            });
        }

        let len_bytes: &[u8] = take(usize::from(length_size))
            .parse_next(input)
            .map_err(truncated)?;
        let size = len_bytes
            .iter()
            .fold(0_u64, |acc, &b| (acc << 8) | u64::from(b));
        if size > MAX_EXTENDED_SIZE {
            log::error!("Dataset at `{offset}` claims `{size}` bytes!");
            return Err(IimError::UnreasonableSize { offset, size });
        }
        size as usize
    } else {
        usize::from(size)
    };

    let body: &[u8] = take(size).parse_next(input).map_err(truncated)?;
    Ok((id, body.to_vec()))
}

impl Container for Iim {
    fn is_empty(&self) -> bool {
        self.datasets.values().all(Vec::is_empty)
    }

    fn dirty(&self) -> bool {
        self.dirty
    }

    fn layout(&mut self) -> Result<u64, MetadataError> {
        if !self.dirty {
            self.rendered = None;
            return Ok(self.source.len());
        }

        // the hash has to land in its resource before that resource is laid
        // out, so we render here instead of in `write`
        let rendered = self.render()?;
        self.hash = md5_of(&rendered);
        if let Some(ref target) = self.hash_target {
            target.write().set_data(&self.hash)?;
        }
        log::debug!("IIM block re-rendered to `{}` bytes.", rendered.len());

        let size = rendered.len() as u64;
        self.rendered = Some(rendered);
        Ok(size)
    }

    fn write(&mut self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        match self.rendered {
            Some(ref rendered) => write_bytes(out, rendered),
            None if self.dirty => Err(MetadataError::Logic("IIM written before layout".into())),
            None => {
                let count = self.source.copy_to(out)?;
                check_written("IIM block", self.source.len(), count)?;
                Ok(count)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Iim, error::IimError, md5_of};
    use crate::{
        container::{Container as _, shared},
        containers::raw::Raw,
        error::MetadataError,
        source::Section,
        util::logger,
    };

    fn render(iim: &mut Iim) -> Vec<u8> {
        let size = iim.layout().unwrap();
        let mut out = Vec::new();
        assert_eq!(iim.write(&mut out).unwrap(), size);
        out
    }

    #[test]
    fn reads_repeated_datasets_and_trailing_nuls() {
        logger();

        #[rustfmt::skip]
        let block: &[u8] = &[
            0x1C, 0x02, 0x19, 0x00, 0x03, b'k', b'w', b'1',
            0x1C, 0x01, 0x5A, 0x00, 0x03, 0x1B, 0x25, 0x47,
            0x1C, 0x02, 0x19, 0x00, 0x03, b'k', b'w', b'2',
            0x00, 0x00,
        ];
        let mut iim = Iim::read(Section::from_bytes(block)).unwrap();

        assert_eq!(iim.datasets(0x0219), [b"kw1".to_vec(), b"kw2".to_vec()]);
        assert_eq!(iim.datasets(0x015A), [vec![0x1B, 0x25, 0x47]]);
        assert!(iim.datasets(0x0278).is_empty());
        assert_eq!(iim.ids().collect::<Vec<_>>(), [0x015A, 0x0219]);

        // untouched blocks come back as they were, NULs included
        assert_eq!(render(&mut iim), block);

        // removing something that isn't there isn't an edit
        iim.remove_datasets(0x0278);
        assert!(!iim.dirty());
    }

    #[test]
    fn extended_lengths() {
        logger();

        let mut block = vec![0x1C, 0x02, 0x78, 0x80, 0x02, 0x00, 0x04];
        block.extend_from_slice(b"long");
        let iim = Iim::read(Section::from_bytes(block)).unwrap();
        assert_eq!(iim.datasets(0x0278), [b"long".to_vec()]);

        let mut iim = Iim::new();
        iim.set_dataset(0x0278, vec![b'x'; 0x8000]);
        let out = render(&mut iim);
        assert_eq!(out.len(), 0x8000 + 9);
        assert_eq!(out[..9], [0x1C, 0x02, 0x78, 0x80, 0x04, 0x00, 0x00, 0x80, 0x00]);
    }

    #[test]
    fn bad_blocks_fail() {
        logger();

        let cases: [(&[u8], IimError); 4] = [
            (
                &[0x1D, 0x02, 0x19, 0x00, 0x00],
                IimError::BadMarker {
                    offset: 0,
                    found: 0x1D,
                },
            ),
            (
                &[0x1C, 0x02, 0x19, 0x80, 0x09],
                IimError::BadLengthSize {
                    offset: 0,
                    length_size: 9,
                },
            ),
            (
                &[0x1C, 0x02, 0x19, 0x80, 0x04, 0x00, 0x20, 0x00, 0x00],
                IimError::UnreasonableSize {
                    offset: 0,
                    size: 0x20_0000,
                },
            ),
            (
                &[0x1C, 0x02, 0x19, 0x00, 0x05, b'a'],
                IimError::Truncated { offset: 0 },
            ),
        ];

        for (block, err) in cases {
            assert_eq!(
                Iim::read(Section::from_bytes(block)).unwrap_err(),
                MetadataError::from(err)
            );
        }
    }

    #[test]
    fn edits_refresh_the_hash_target() {
        logger();

        let mut iim = Iim::new();
        let target = shared(Raw::new(vec![0; 16]));
        iim.set_hash_target(target.clone());

        iim.set_datasets(0x0219, vec![b"a".to_vec(), b"b".to_vec()]);
        let rendered = render(&mut iim);
        assert_eq!(
            rendered,
            [
                0x1C, 0x02, 0x19, 0x00, 0x01, b'a', 0x1C, 0x02, 0x19, 0x00, 0x01, b'b'
            ]
        );

        let expected = md5_of(&rendered);
        assert_eq!(iim.hash(), expected);
        assert_eq!(target.read().data().unwrap(), expected);
    }
}
