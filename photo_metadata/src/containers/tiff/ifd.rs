//! Image File Directories.

use std::io::Write;

use winnow::{
    Parser,
    binary::{u16, u32},
    error::EmptyError,
    token::take,
};

use crate::{
    container::{check_written, write_bytes, write_zeros},
    error::MetadataError,
    source::Section,
};

use super::{
    Endianness,
    error::TiffError,
    ranges::RangeList,
    tag::{Tag, TagType},
};

/// A directory of tags, plus a link to the next directory in its chain.
///
/// Tags are kept sorted by ID.
#[derive(Clone, Debug)]
pub struct Ifd {
    order: Endianness,
    offset: u32,
    tags: Vec<Tag>,
    next: u32,
    next_ifd: Option<Box<Ifd>>,
    size: u64,
    dirty: bool,
}

impl Ifd {
    /// A new IFD with no tags. Creating it counts as an edit.
    pub(crate) fn new(order: Endianness) -> Self {
        Self {
            order,
            offset: 0,
            tags: Vec::new(),
            next: 0,
            next_ifd: None,
            size: 0,
            dirty: true,
        }
    }

    /// An IFD0 for a block that doesn't exist yet. It isn't an edit until
    /// something is added to it.
    pub(crate) fn empty(order: Endianness) -> Self {
        Self {
            dirty: false,
            ..Self::new(order)
        }
    }

    /// Parses the IFD at `offset`, recording the bytes it occupies.
    ///
    /// Sub-IFDs and the next IFD aren't followed until they're asked for.
    pub(crate) fn read(
        source: &Section,
        order: Endianness,
        offset: u32,
        ranges: &mut RangeList,
    ) -> Result<Self, MetadataError> {
        let out_of_bounds = || {
            log::error!("The IFD at `{offset:#x}` runs past the end of the block!");
            TiffError::IfdOutOfBounds { offset }
        };

        let count_bytes = source
            .read_vec(u64::from(offset), 2)
            .map_err(|_| out_of_bounds())?;
        let count = u32::from(order.u16([count_bytes[0], count_bytes[1]]));
        log::trace!("IFD at `{offset:#x}` has `{count}` entries.");

        let entries = source
            .read_vec(u64::from(offset) + 2, u64::from(12 * count))
            .map_err(|_| out_of_bounds())?;
        let input = &mut entries.as_slice();

        // entries end here, where the next pointer should be
        let entries_end = offset
            .checked_add(12 * count + 2)
            .ok_or_else(out_of_bounds)?;
        let mut missing_next = false;
        let mut tags = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let (id, ty, n, value): (_, _, _, &[u8]) = (
                u16(order.winnow()),
                u16(order.winnow()),
                u32(order.winnow()),
                take(4_usize),
            )
                .parse_next(input)
                .map_err(|_: EmptyError| out_of_bounds())?;
            let value = [value[0], value[1], value[2], value[3]];

            let (tag, doff) = Tag::read(source, order, (id, ty, n, value), ranges)?;
            if doff == entries_end {
                // some writers leave out the next pointer. tag data sitting
                // where it should be gives that away
                log::debug!("IFD at `{offset:#x}` has no next pointer.");
                missing_next = true;
            }
            tags.push(tag);
        }

        let dir_end = if missing_next {
            entries_end
        } else {
            entries_end.checked_add(4).ok_or_else(out_of_bounds)?
        };
        ranges.add(offset, dir_end)?;
        tags.sort_by_key(Tag::id);

        let next = if missing_next {
            0
        } else {
            let bytes = source
                .read_vec(u64::from(entries_end), 4)
                .map_err(|_| out_of_bounds())?;
            order.u32([bytes[0], bytes[1], bytes[2], bytes[3]])
        };

        Ok(Self {
            order,
            offset,
            tags,
            next,
            next_ifd: None,
            size: 0,
            dirty: false,
        })
    }

    /// Where the IFD starts, relative to the TIFF header.
    ///
    /// After a layout, this is where it will be written.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub(crate) fn set_offset(&mut self, offset: u32) {
        self.offset = offset;
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Whether this IFD, or anything reachable from it, was edited.
    pub fn dirty(&self) -> bool {
        self.dirty
            || self.tags.iter().any(Tag::dirty)
            || self.next_ifd.as_ref().is_some_and(|n| n.dirty())
    }

    fn position(&self, id: u16) -> Result<usize, usize> {
        self.tags.binary_search_by_key(&id, Tag::id)
    }

    pub fn tag(&self, id: u16) -> Option<&Tag> {
        self.position(id).ok().map(|idx| &self.tags[idx])
    }

    pub fn tag_mut(&mut self, id: u16) -> Option<&mut Tag> {
        self.position(id).ok().map(|idx| &mut self.tags[idx])
    }

    /// Adds a tag with the given type, keeping the tags sorted. If the tag
    /// already exists, it's returned untouched.
    pub fn add_tag(&mut self, id: u16, ty: TagType) -> &mut Tag {
        let idx = match self.position(id) {
            Ok(idx) => idx,
            Err(idx) => {
                log::trace!("Adding tag `{id:#06x}`.");
                self.tags.insert(idx, Tag::new(id, ty, self.order));
                self.dirty = true;
                idx
            }
        };
        &mut self.tags[idx]
    }

    /// Removes a tag. Returns whether it was there.
    pub fn delete_tag(&mut self, id: u16) -> bool {
        match self.position(id) {
            Ok(idx) => {
                log::trace!("Deleting tag `{id:#06x}`.");
                self.tags.remove(idx);
                self.dirty = true;
                true
            }
            Err(_) => false,
        }
    }

    /// The next IFD in the chain, if it's been followed.
    pub fn next_ifd(&self) -> Option<&Ifd> {
        self.next_ifd.as_deref()
    }

    /// Whether there's a next IFD, followed or not.
    pub fn has_next(&self) -> bool {
        self.next != 0 || self.next_ifd.is_some()
    }

    /// Follows the next pointer, parsing the next IFD on first use.
    pub(crate) fn resolve_next(
        &mut self,
        source: &Section,
        ranges: &mut RangeList,
    ) -> Result<Option<&mut Ifd>, MetadataError> {
        if self.next_ifd.is_none() && self.next != 0 {
            log::trace!("Following the next pointer to `{:#x}`.", self.next);
            let next = Ifd::read(source, self.order, self.next, ranges)?;
            self.next_ifd = Some(Box::new(next));
        }
        Ok(self.next_ifd.as_deref_mut())
    }

    /// Adds a new, empty IFD after this one, or returns the one that's
    /// already there.
    ///
    /// A next IFD that exists but hasn't been followed can't be returned
    /// from here. Go through [`Tiff::ensure_ifd`](super::Tiff::ensure_ifd)
    /// instead.
    pub fn add_next_ifd(&mut self) -> Result<&mut Ifd, MetadataError> {
        if self.next_ifd.is_none() {
            if self.next != 0 {
                log::error!("Tried to replace an IFD that hasn't been read yet!");
                return Err(MetadataError::Logic(
                    "add_next_ifd on an IFD whose next IFD hasn't been read".into(),
                ));
            }
            log::trace!("Adding a new next IFD.");
            self.next_ifd = Some(Box::new(Ifd::new(self.order)));
            self.dirty = true;
        }

        self.next_ifd
            .as_deref_mut()
            .ok_or_else(|| MetadataError::Logic("next IFD vanished".into()))
    }

    /// Whether the IFD has no tags and leads nowhere.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && !self.has_next()
    }

    /// Drops sub-IFDs and next IFDs that ended up empty, along with tags
    /// holding containers that ended up empty.
    pub(crate) fn prune(&mut self) {
        for tag in &mut self.tags {
            if let Some(ifd) = tag.ifd_mut() {
                ifd.prune();
            }
        }
        let before = self.tags.len();
        self.tags.retain(|tag| {
            !(tag.ifd().is_some_and(Ifd::is_empty) || tag.holds_empty_container())
        });
        if self.tags.len() != before {
            log::debug!("Pruned `{}` empty tags.", before - self.tags.len());
            self.dirty = true;
        }

        if let Some(ref mut next) = self.next_ifd {
            next.prune();
            if next.is_empty() {
                log::debug!("Pruned an empty next IFD.");
                self.next_ifd = None;
                self.next = 0;
                self.dirty = true;
            }
        }
    }

    /// Runs `f` on this IFD and every followed IFD below it: first this one,
    /// then sub-IFDs in tag order, then the next IFD.
    pub(crate) fn visit_mut(
        &mut self,
        f: &mut dyn FnMut(&mut Ifd) -> Result<(), MetadataError>,
    ) -> Result<(), MetadataError> {
        f(self)?;
        for tag in &mut self.tags {
            if let Some(ifd) = tag.ifd_mut() {
                ifd.visit_mut(f)?;
            }
        }
        if let Some(ref mut next) = self.next_ifd {
            next.visit_mut(f)?;
        }
        Ok(())
    }

    /// Collects this IFD and every followed IFD below it.
    pub(crate) fn collect<'a>(&'a self, into: &mut Vec<&'a Ifd>) {
        into.push(self);
        for tag in &self.tags {
            if let Some(ifd) = tag.ifd() {
                ifd.collect(into);
            }
        }
        if let Some(ref next) = self.next_ifd {
            next.collect(into);
        }
    }

    /// Lays out nested containers and computes the rendered size, including
    /// out-of-line data.
    pub(crate) fn layout(&mut self) -> Result<u64, MetadataError> {
        let mut size = 6 + 12 * self.tags.len() as u64;
        for tag in &mut self.tags {
            tag.layout()?;
            let tag_size = tag.size();
            if tag_size > 4 {
                size += size % 2;
                size += tag_size;
            }
        }
        self.size = size;
        Ok(size)
    }

    /// Renders the directory and its out-of-line data. Sub-IFDs aren't
    /// written here.
    pub(crate) fn write(&self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        let entry_count = u16::try_from(self.tags.len()).map_err(|_| TiffError::TooLarge)?;
        let mut count = write_bytes(out, &self.order.u16_bytes(entry_count))?;

        let mut data_offset = self.offset + 12 * u32::from(entry_count) + 6;
        for tag in &self.tags {
            data_offset = tag.write_entry(out, data_offset)?;
            count += 12;
            data_offset += data_offset % 2;
        }

        let next = self.next_ifd.as_ref().map_or(self.next, |n| n.offset);
        count += write_bytes(out, &self.order.u32_bytes(next))?;

        for tag in &self.tags {
            if tag.size() > 4 && count % 2 == 1 {
                count += write_zeros(out, 1)?;
            }
            count += tag.write_data(out)?;
        }

        check_written("IFD", self.size, count)?;
        Ok(count)
    }
}
