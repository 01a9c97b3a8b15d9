//! TIFF-style blocks: the EXIF payload in JPEGs, and whole TIFF files.
//!
//! A block is a header, then a tree of IFDs. Editing never moves data we
//! didn't touch. When a block is rewritten, every IFD we parsed is rendered
//! afresh (into the space the parsed IFDs used to occupy, where it fits, or
//! at the end), and everything else is copied through at its old offset.

use std::io::Write;

use crate::{
    container::{Container, check_written, write_bytes, write_zeros},
    error::MetadataError,
    source::Section,
};

use self::{error::TiffError, ifd::Ifd, ranges::RangeList, tag::TagType};

pub mod error;
pub mod ifd;
pub mod ranges;
pub mod tag;

const HEADER_LE: [u8; 4] = [0x49, 0x49, 0x2A, 0x00];
const HEADER_BE: [u8; 4] = [0x4D, 0x4D, 0x00, 0x2A];

/// Byte order of a TIFF-style block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub(crate) fn winnow(self) -> winnow::binary::Endianness {
        match self {
            Self::Little => winnow::binary::Endianness::Little,
            Self::Big => winnow::binary::Endianness::Big,
        }
    }

    pub fn u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        }
    }

    pub fn u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        }
    }

    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    fn header(self) -> [u8; 4] {
        match self {
            Self::Little => HEADER_LE,
            Self::Big => HEADER_BE,
        }
    }
}

/// One hop from an IFD to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IfdStep {
    /// Follow the pointer in this tag.
    Tag(u16),

    /// Follow the next-IFD link.
    Next,
}

/// The plan made by the last layout.
#[derive(Clone, Debug)]
enum Plan {
    /// Nothing changed. Copy the source.
    Verbatim,

    /// Render parsed IFDs at their new offsets, zero the `free` space, and
    /// copy everything else.
    Relocated { end: u32, free: RangeList },
}

/// A parsed TIFF-style block.
#[derive(Debug)]
pub struct Tiff {
    source: Section,
    order: Endianness,
    ifd0: Ifd,

    /// Bytes claimed by the IFDs and tag data parsed so far.
    ranges: RangeList,

    plan: Option<Plan>,
}

impl Tiff {
    /// A block with an empty IFD0 and nothing else.
    ///
    /// It stays empty (and out of the output) until a tag is added.
    pub fn new(order: Endianness) -> Self {
        Self {
            source: Section::empty(),
            order,
            ifd0: Ifd::empty(order),
            ranges: RangeList::new(),
            plan: None,
        }
    }

    /// Parses the header and IFD0. Everything else is parsed on demand.
    pub fn read(source: Section) -> Result<Self, MetadataError> {
        let header = source.read_upto(0, 8)?;
        let order = match header.get(..4) {
            Some(magic) if magic == HEADER_LE => Endianness::Little,
            Some(magic) if magic == HEADER_BE => Endianness::Big,
            _ => {
                log::error!("Not a TIFF header: `{header:x?}`");
                return Err(TiffError::BadHeader { found: header }.into());
            }
        };
        let Some(&[a, b, c, d]) = header.get(4..8) else {
            log::error!("TIFF header has no IFD0 pointer!");
            return Err(TiffError::BadHeader { found: header }.into());
        };

        let ifd0_offset = order.u32([a, b, c, d]);
        log::trace!("Found `{order:?}` TIFF header. IFD0 is at `{ifd0_offset:#x}`.");

        let mut ranges = RangeList::new();
        let ifd0 = Ifd::read(&source, order, ifd0_offset, &mut ranges)?;

        Ok(Self {
            source,
            order,
            ifd0,
            ranges,
            plan: None,
        })
    }

    pub fn order(&self) -> Endianness {
        self.order
    }

    pub fn ifd0(&self) -> &Ifd {
        &self.ifd0
    }

    pub fn ifd0_mut(&mut self) -> &mut Ifd {
        &mut self.ifd0
    }

    /// The IFD at the end of `path`, starting from IFD0, if every hop has
    /// already been followed.
    pub fn ifd(&self, path: &[IfdStep]) -> Option<&Ifd> {
        let mut ifd = &self.ifd0;
        for step in path {
            ifd = match *step {
                IfdStep::Tag(id) => ifd.tag(id)?.ifd()?,
                IfdStep::Next => ifd.next_ifd()?,
            };
        }
        Some(ifd)
    }

    /// The IFD at the end of `path`, parsing along the way as needed.
    ///
    /// Returns `None` if some hop leads nowhere.
    pub fn ifd_mut(&mut self, path: &[IfdStep]) -> Result<Option<&mut Ifd>, MetadataError> {
        let Tiff {
            source,
            ranges,
            ifd0,
            ..
        } = self;

        let mut ifd = ifd0;
        for step in path {
            match follow(source, ranges, ifd, *step)? {
                Some(next) => ifd = next,
                None => return Ok(None),
            }
        }
        Ok(Some(ifd))
    }

    /// Like [`Tiff::ifd_mut`], but creates any missing IFDs along the way.
    pub fn ensure_ifd(&mut self, path: &[IfdStep]) -> Result<&mut Ifd, MetadataError> {
        let Tiff {
            source,
            ranges,
            ifd0,
            ..
        } = self;

        let mut ifd = ifd0;
        for step in path {
            match *step {
                IfdStep::Tag(id) => {
                    if ifd.tag(id).is_none() {
                        ifd.add_tag(id, TagType::Long).add_ifd();
                    }
                }
                IfdStep::Next => {
                    if !ifd.has_next() {
                        ifd.add_next_ifd()?;
                    }
                }
            }

            ifd = follow(source, ranges, ifd, *step)?.ok_or_else(|| {
                log::error!("Created an IFD at `{step:?}`, but couldn't find it after!");
                MetadataError::Logic(format!("missing IFD after creating `{step:?}`"))
            })?;
        }
        Ok(ifd)
    }

    fn relocate(&mut self) -> Result<Plan, MetadataError> {
        self.ifd0.prune();

        // reusable space. the copy keeps layout repeatable
        let mut free = self.ranges.clone();
        let source_len = u32::try_from(self.source.len()).map_err(|_| TiffError::TooLarge)?;
        let mut end = free.remove_trailer(source_len).max(8);

        let mut sizes = Vec::new();
        self.ifd0.visit_mut(&mut |ifd| {
            let size = u32::try_from(ifd.layout()?).map_err(|_| TiffError::TooLarge)?;
            sizes.push(size);
            Ok(())
        })?;

        // biggest first, so they get first pick of the free space
        let mut by_size: Vec<usize> = (0..sizes.len()).collect();
        by_size.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]));

        let mut offsets = vec![0_u32; sizes.len()];
        for idx in by_size {
            let size = sizes[idx];
            offsets[idx] = match free.consume(size) {
                Some(offset) => offset,
                None => {
                    end += end % 2;
                    let offset = end;
                    end = end.checked_add(size).ok_or(TiffError::TooLarge)?;
                    offset
                }
            };
        }

        let mut offsets = offsets.into_iter();
        self.ifd0.visit_mut(&mut |ifd| {
            let offset = offsets.next().ok_or_else(|| {
                MetadataError::Logic("IFD tree changed during layout".into())
            })?;
            ifd.set_offset(offset);
            Ok(())
        })?;

        log::debug!("Relocated TIFF block will take `{end}` bytes.");
        Ok(Plan::Relocated { end, free })
    }

    fn write_relocated(
        &self,
        out: &mut dyn Write,
        end: u32,
        free: &RangeList,
    ) -> Result<u64, MetadataError> {
        let mut header = [0_u8; 8];
        header[..4].copy_from_slice(&self.order.header());
        header[4..].copy_from_slice(&self.order.u32_bytes(self.ifd0.offset()));
        let mut count = write_bytes(out, &header)?;

        let mut ifds = Vec::new();
        self.ifd0.collect(&mut ifds);
        ifds.sort_by_key(|ifd| ifd.offset());
        let mut ifds = ifds.into_iter().peekable();
        let mut zeros = free.ranges().iter().copied().peekable();

        loop {
            let next_ifd = ifds.peek().map(|ifd| u64::from(ifd.offset()));
            let next_zero = zeros.peek().map(|&(start, _)| u64::from(start));

            if next_ifd == Some(count) {
                if let Some(ifd) = ifds.next() {
                    count += ifd.write(out)?;
                }
                continue;
            }
            if next_zero == Some(count) {
                if let Some((start, stop)) = zeros.next() {
                    // never past the planned end
                    count += write_zeros(out, u64::from(stop.min(end).saturating_sub(start)))?;
                }
                continue;
            }

            let next_any = match (next_ifd, next_zero) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            let target = match next_any {
                Some(target) => target,
                None if count < u64::from(end) => u64::from(end),
                None => break,
            };
            if target < count {
                log::error!("TIFF layout overlaps itself at `{target:#x}`!");
                return Err(MetadataError::Logic(format!(
                    "TIFF layout overlaps at offset `{target:#x}`"
                )));
            }

            // carry over whatever sits between the things we render
            count += self.source.copy_range_to(count, target, out)?;
            if count + 1 == target && next_any.is_some() {
                // the source ended on an odd offset, and the next IFD
                // needs an even one
                count += write_zeros(out, 1)?;
            } else if count < target {
                log::error!("Ran out of TIFF source at `{count:#x}`, needed `{target:#x}`!");
                return Err(MetadataError::Logic(format!(
                    "TIFF source ended at `{count:#x}` before offset `{target:#x}`"
                )));
            }
        }

        Ok(count)
    }
}

/// Takes one hop from `ifd`, parsing the destination if needed.
fn follow<'a>(
    source: &Section,
    ranges: &mut RangeList,
    ifd: &'a mut Ifd,
    step: IfdStep,
) -> Result<Option<&'a mut Ifd>, MetadataError> {
    match step {
        IfdStep::Tag(id) => match ifd.tag_mut(id) {
            Some(tag) => tag.resolve_ifd(source, ranges).map(Some),
            None => Ok(None),
        },
        IfdStep::Next => ifd.resolve_next(source, ranges),
    }
}

impl Container for Tiff {
    fn is_empty(&self) -> bool {
        self.ifd0.is_empty()
    }

    fn dirty(&self) -> bool {
        self.ifd0.dirty()
    }

    fn layout(&mut self) -> Result<u64, MetadataError> {
        let plan = if self.dirty() {
            self.relocate()?
        } else {
            Plan::Verbatim
        };

        let size = match plan {
            Plan::Verbatim => self.source.len(),
            Plan::Relocated { end, .. } => u64::from(end),
        };
        self.plan = Some(plan);
        Ok(size)
    }

    fn write(&mut self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        match self.plan {
            None => Err(MetadataError::Logic("TIFF written before layout".into())),
            Some(Plan::Verbatim) => {
                let count = self.source.copy_to(out)?;
                check_written("TIFF", self.source.len(), count)?;
                Ok(count)
            }
            Some(Plan::Relocated { end, ref free }) => {
                let count = self.write_relocated(out, end, free)?;
                check_written("TIFF", u64::from(end), count)?;
                Ok(count)
            }
        }
    }
}
