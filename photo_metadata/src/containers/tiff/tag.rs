//! A single entry in an IFD.

use std::io::Write;

use crate::{
    container::{ContainerRef, write_bytes, write_zeros},
    error::MetadataError,
    source::Section,
};

use super::{Endianness, error::TiffError, ifd::Ifd, ranges::RangeList};

/// Tag data larger than this stays in the source until it's written.
const LARGE_TAG: u64 = 1024;

/// The data type of a tag.
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    SByte = 6,
    Undefined = 7,
    SShort = 8,
    SLong = 9,
    SRational = 10,
    Float = 11,
    Double = 12,
    Ifd = 13,
}

impl TagType {
    pub fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            1 => Self::Byte,
            2 => Self::Ascii,
            3 => Self::Short,
            4 => Self::Long,
            5 => Self::Rational,
            6 => Self::SByte,
            7 => Self::Undefined,
            8 => Self::SShort,
            9 => Self::SLong,
            10 => Self::SRational,
            11 => Self::Float,
            12 => Self::Double,
            13 => Self::Ifd,
            _ => return None,
        })
    }

    /// The size of one value of this type, in bytes.
    pub const fn unit(self) -> u32 {
        match self {
            Self::Byte | Self::Ascii | Self::SByte | Self::Undefined => 1,
            Self::Short | Self::SShort => 2,
            Self::Long | Self::SLong | Self::Float | Self::Ifd => 4,
            Self::Rational | Self::SRational | Self::Double => 8,
        }
    }
}

/// What a tag holds.
#[derive(Clone, Debug)]
pub enum TagData {
    /// Small data, or data we've replaced.
    Bytes(Vec<u8>),

    /// Large data we haven't needed to read yet.
    Section(Section),

    /// Another metadata block (XMP, IPTC, ...) that renders itself.
    Container(ContainerRef),

    /// A sub-IFD. The entry holds a pointer to it.
    Ifd(Box<Ifd>),
}

/// One entry in an IFD.
#[derive(Clone, Debug)]
pub struct Tag {
    id: u16,
    ty: TagType,
    order: Endianness,
    data: TagData,
    container_size: u64,
    dirty: bool,
}

impl Tag {
    /// A new, empty tag. Adding it counts as an edit.
    pub(crate) fn new(id: u16, ty: TagType, order: Endianness) -> Self {
        Self {
            id,
            ty,
            order,
            data: TagData::Bytes(Vec::new()),
            container_size: 0,
            dirty: true,
        }
    }

    /// Reads a tag from its raw 12-byte entry.
    ///
    /// Also returns the data offset from the entry, or zero when the data is
    /// stored inline.
    pub(crate) fn read(
        source: &Section,
        order: Endianness,
        (id, raw_ty, count, value): (u16, u16, u32, [u8; 4]),
        ranges: &mut RangeList,
    ) -> Result<(Self, u32), MetadataError> {
        let Some(ty) = TagType::from_u16(raw_ty) else {
            log::error!("Tag `{id:#06x}` has unknown type `{raw_ty}`!");
            return Err(TiffError::UnknownType { tag: id, ty: raw_ty }.into());
        };

        let size = u64::from(count) * u64::from(ty.unit());
        let mut tag = Self {
            id,
            ty,
            order,
            data: TagData::Bytes(Vec::new()),
            container_size: 0,
            dirty: false,
        };

        if size <= 4 {
            // it's small enough to fit in the entry
            tag.data = TagData::Bytes(value[..size as usize].to_vec());
            return Ok((tag, 0));
        }

        let doff = order.u32(value);
        let out_of_bounds = || {
            log::error!("Tag `{id:#06x}` data (`{size}` bytes at `{doff:#x}`) is out of bounds!");
            TiffError::DataOutOfBounds {
                tag: id,
                offset: doff,
                size,
            }
        };

        // the pad byte only counts when the source has it
        let padded = (u64::from(doff) + size + (size % 2)).min(source.len());
        let end = u32::try_from(padded.max(u64::from(doff) + size)).map_err(|_| out_of_bounds())?;
        ranges.add(doff, end)?;

        let section = source
            .slice(u64::from(doff), size)
            .map_err(|_| out_of_bounds())?;
        tag.data = if size > LARGE_TAG {
            log::trace!("Tag `{id:#06x}` is large. Deferring its `{size}` bytes.");
            TagData::Section(section)
        } else {
            TagData::Bytes(section.to_vec()?)
        };

        Ok((tag, doff))
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn ty(&self) -> TagType {
        self.ty
    }

    /// The number of values in the tag.
    pub fn count(&self) -> u32 {
        (self.size() / u64::from(self.ty.unit())) as u32
    }

    pub fn data(&self) -> &TagData {
        &self.data
    }

    /// Whether this tag, or anything it holds, was edited.
    pub fn dirty(&self) -> bool {
        self.dirty
            || match self.data {
                TagData::Container(ref c) => c.read().dirty(),
                TagData::Ifd(ref ifd) => ifd.dirty(),
                TagData::Bytes(_) | TagData::Section(_) => false,
            }
    }

    fn expect_type(&self, ty: TagType) -> Result<(), MetadataError> {
        if self.ty == ty {
            return Ok(());
        }

        log::warn!("Tag `{:#06x}` is `{:?}`, not `{ty:?}`.", self.id, self.ty);
        Err(MetadataError::Encoding(format!(
            "tag `{:#06x}` has type `{:?}`, not `{ty:?}`",
            self.id, self.ty
        )))
    }

    fn bytes(&self) -> Result<Vec<u8>, MetadataError> {
        match self.data {
            TagData::Bytes(ref bytes) => Ok(bytes.clone()),
            TagData::Section(ref section) => Ok(section.to_vec()?),
            TagData::Container(_) | TagData::Ifd(_) => Err(MetadataError::Logic(format!(
                "tag `{:#06x}` holds a structure, not plain data",
                self.id
            ))),
        }
    }

    /// The tag's data, as a window onto the input when possible.
    ///
    /// Used to hand the data to a nested container's parser.
    pub fn as_section(&self) -> Option<Section> {
        match self.data {
            TagData::Bytes(ref bytes) => Some(Section::from_bytes(bytes.clone())),
            TagData::Section(ref section) => Some(section.clone()),
            TagData::Container(_) | TagData::Ifd(_) => None,
        }
    }

    /// The contents of a `BYTE` tag.
    pub fn as_bytes(&self) -> Result<Vec<u8>, MetadataError> {
        self.expect_type(TagType::Byte)?;
        self.bytes()
    }

    /// The contents of an `UNDEFINED` tag.
    pub fn as_unknown(&self) -> Result<Vec<u8>, MetadataError> {
        self.expect_type(TagType::Undefined)?;
        self.bytes()
    }

    /// The contents of an `ASCII` tag.
    ///
    /// Trailing NULs (there may be none, or several) and surrounding
    /// whitespace are removed. Text that isn't UTF-8 is read as Latin-1.
    pub fn as_string(&self) -> Result<String, MetadataError> {
        self.expect_type(TagType::Ascii)?;
        let bytes = self.bytes()?;
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        let bytes = &bytes[..end];

        Ok(match core::str::from_utf8(bytes) {
            Ok(s) => s.trim().to_string(),
            Err(_) => {
                log::debug!("Tag `{:#06x}` isn't UTF-8. Reading it as Latin-1.", self.id);
                bytes
                    .iter()
                    .map(|&b| char::from(b))
                    .collect::<String>()
                    .trim()
                    .to_string()
            }
        })
    }

    /// The contents of a `SHORT` tag.
    pub fn as_shorts(&self) -> Result<Vec<u16>, MetadataError> {
        self.expect_type(TagType::Short)?;
        Ok(self
            .bytes()?
            .chunks_exact(2)
            .map(|c| self.order.u16([c[0], c[1]]))
            .collect())
    }

    /// The contents of a `LONG` tag.
    pub fn as_longs(&self) -> Result<Vec<u32>, MetadataError> {
        self.expect_type(TagType::Long)?;
        Ok(self.decode_u32s()?)
    }

    /// The contents of a `RATIONAL` tag, as alternating numerators and
    /// denominators.
    pub fn as_rationals(&self) -> Result<Vec<u32>, MetadataError> {
        self.expect_type(TagType::Rational)?;
        Ok(self.decode_u32s()?)
    }

    fn decode_u32s(&self) -> Result<Vec<u32>, MetadataError> {
        Ok(self
            .bytes()?
            .chunks_exact(4)
            .map(|c| self.order.u32([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// The nested container, if one was attached.
    pub fn container(&self) -> Option<&ContainerRef> {
        match self.data {
            TagData::Container(ref c) => Some(c),
            _ => None,
        }
    }

    /// The sub-IFD, if this tag's pointer has been followed.
    pub fn ifd(&self) -> Option<&Ifd> {
        match self.data {
            TagData::Ifd(ref ifd) => Some(ifd),
            _ => None,
        }
    }

    pub fn ifd_mut(&mut self) -> Option<&mut Ifd> {
        match self.data {
            TagData::Ifd(ref mut ifd) => Some(ifd),
            _ => None,
        }
    }

    fn replace(&mut self, ty: TagType, bytes: Vec<u8>) {
        log::trace!("Tag `{:#06x}` replaced with a `{ty:?}` value.", self.id);
        self.ty = ty;
        self.data = TagData::Bytes(bytes);
        self.dirty = true;
    }

    pub fn set_bytes(&mut self, bytes: &[u8]) {
        if self.as_bytes().is_ok_and(|old| old == bytes) {
            return;
        }
        self.replace(TagType::Byte, bytes.to_vec());
    }

    pub fn set_unknown(&mut self, bytes: &[u8]) {
        if self.as_unknown().is_ok_and(|old| old == bytes) {
            return;
        }
        self.replace(TagType::Undefined, bytes.to_vec());
    }

    /// Stores `s` as NUL-terminated `ASCII`.
    pub fn set_string(&mut self, s: &str) {
        if self.as_string().is_ok_and(|old| old == s) {
            return;
        }
        let mut encoded = Vec::with_capacity(s.len() + 1);
        encoded.extend_from_slice(s.as_bytes());
        encoded.push(0);
        self.replace(TagType::Ascii, encoded);
    }

    pub fn set_short(&mut self, value: u16) {
        if self.as_shorts().is_ok_and(|old| old == [value]) {
            return;
        }
        self.replace(TagType::Short, self.order.u16_bytes(value).to_vec());
    }

    pub fn set_long(&mut self, value: u32) {
        if self.as_longs().is_ok_and(|old| old == [value]) {
            return;
        }
        self.replace(TagType::Long, self.order.u32_bytes(value).to_vec());
    }

    /// Stores alternating numerators and denominators as `RATIONAL`.
    pub fn set_rationals(&mut self, values: &[u32]) -> Result<(), MetadataError> {
        if values.is_empty() || values.len() % 2 != 0 {
            log::error!("Rationals need numerator/denominator pairs. got: `{values:?}`");
            return Err(MetadataError::Logic(format!(
                "set_rationals needs a non-empty, even-length list, got `{}` values",
                values.len()
            )));
        }
        if self.as_rationals().is_ok_and(|old| old == values) {
            return Ok(());
        }

        let encoded = values
            .iter()
            .flat_map(|&v| self.order.u32_bytes(v))
            .collect();
        self.replace(TagType::Rational, encoded);
        Ok(())
    }

    /// Hands the tag's data to a nested container.
    ///
    /// This isn't an edit by itself. The container renders its original
    /// bytes until it's changed.
    pub fn set_container(&mut self, container: ContainerRef) {
        self.data = TagData::Container(container);
    }

    /// Points this tag at a new, empty sub-IFD, or returns the one it
    /// already points to.
    ///
    /// An unfollowed pointer is replaced. Use
    /// [`Tiff::ifd_mut`](super::Tiff::ifd_mut) to follow it instead.
    pub fn add_ifd(&mut self) -> &mut Ifd {
        if !matches!(self.data, TagData::Ifd(_)) {
            log::debug!("Tag `{:#06x}` now points at a new IFD.", self.id);
            self.ty = TagType::Long;
            self.data = TagData::Ifd(Box::new(Ifd::new(self.order)));
            self.dirty = true;
        }

        match self.data {
            TagData::Ifd(ref mut ifd) => ifd,
            // just set above
            _ => unreachable!(),
        }
    }

    /// Follows this tag's pointer, parsing the sub-IFD on first use.
    pub(crate) fn resolve_ifd(
        &mut self,
        source: &Section,
        ranges: &mut RangeList,
    ) -> Result<&mut Ifd, MetadataError> {
        if !matches!(self.data, TagData::Ifd(_)) {
            let offset = match (self.ty, &self.data) {
                (TagType::Long | TagType::Ifd, TagData::Bytes(b)) if b.len() == 4 => {
                    self.order.u32([b[0], b[1], b[2], b[3]])
                }
                _ => {
                    log::error!("Tag `{:#06x}` isn't a pointer to an IFD!", self.id);
                    return Err(TiffError::NotAnIfd { tag: self.id }.into());
                }
            };

            log::trace!("Following tag `{:#06x}` to an IFD at `{offset:#x}`.", self.id);
            let ifd = Ifd::read(source, self.order, offset, ranges)?;
            self.data = TagData::Ifd(Box::new(ifd));
        }

        match self.data {
            TagData::Ifd(ref mut ifd) => Ok(ifd),
            _ => unreachable!(),
        }
    }

    /// Plans any nested container. Must run before [`Tag::size`] is
    /// meaningful for containers.
    pub(crate) fn layout(&mut self) -> Result<(), MetadataError> {
        if let TagData::Container(ref c) = self.data {
            self.container_size = c.write().layout()?;
        }
        Ok(())
    }

    /// Whether this tag holds a container that ended up empty.
    pub(crate) fn holds_empty_container(&self) -> bool {
        matches!(self.data, TagData::Container(ref c) if c.read().is_empty())
    }

    /// The size of the encoded data, rounded up to a whole number of values.
    pub(crate) fn size(&self) -> u64 {
        let raw = match self.data {
            TagData::Ifd(_) => 4,
            TagData::Container(_) => self.container_size,
            TagData::Section(ref section) => section.len(),
            TagData::Bytes(ref bytes) => bytes.len() as u64,
        };
        raw.next_multiple_of(u64::from(self.ty.unit()))
    }

    /// Writes the 12-byte entry. `data_offset` is where out-of-line data
    /// will go. Returns the next free data offset.
    pub(crate) fn write_entry(
        &self,
        out: &mut dyn Write,
        data_offset: u32,
    ) -> Result<u32, MetadataError> {
        let size = self.size();
        let mut entry = [0_u8; 12];
        entry[0..2].copy_from_slice(&self.order.u16_bytes(self.id));
        entry[2..4].copy_from_slice(&self.order.u16_bytes(self.ty as u16));
        entry[4..8].copy_from_slice(&self.order.u32_bytes(self.count()));

        let mut next_offset = data_offset;
        match self.data {
            TagData::Ifd(ref ifd) => {
                entry[8..12].copy_from_slice(&self.order.u32_bytes(ifd.offset()));
            }
            _ if size <= 4 => {
                let mut inline = Vec::with_capacity(4);
                self.write_data_raw(&mut inline)?;
                entry[8..8 + inline.len().min(4)].copy_from_slice(&inline[..inline.len().min(4)]);
            }
            _ => {
                entry[8..12].copy_from_slice(&self.order.u32_bytes(data_offset));
                next_offset = u32::try_from(u64::from(data_offset) + size)
                    .map_err(|_| TiffError::TooLarge)?;
            }
        }

        write_bytes(out, &entry)?;
        Ok(next_offset)
    }

    /// Writes the out-of-line data, if there is any.
    pub(crate) fn write_data(&self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        if matches!(self.data, TagData::Ifd(_)) || self.size() <= 4 {
            return Ok(0);
        }
        self.write_data_raw(out)
    }

    fn write_data_raw(&self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        let mut count = match self.data {
            TagData::Bytes(ref bytes) => write_bytes(out, bytes)?,
            TagData::Section(ref section) => section.copy_to(out)?,
            TagData::Container(ref c) => c.write().write(out)?,
            TagData::Ifd(_) => 0,
        };

        // round up to a whole number of values
        let size = self.size();
        if count < size {
            count += write_zeros(out, size - count)?;
        }
        Ok(count)
    }
}
