//! JPEG segment streams.
//!
//! A JPEG is a run of segments (a marker, a length, and a body) up to the
//! start of scan, followed by the compressed image. We classify the segments
//! by marker and signature, merge the ones holding the same payload, and
//! leave the image data alone.
//!
//! An edited file is written as JFIF segments, then the payloads, then every
//! other segment in its original order. Fill bytes (`0xFF` runs before a
//! marker) are not kept.

use std::io::Write;

use winnow::{
    Parser as _,
    binary::{be_u16, u8},
    error::EmptyError,
};

use crate::{
    container::{Container, ContainerRef, check_written, write_bytes},
    error::MetadataError,
    source::Section,
};

use self::{
    error::JpegError,
    segment::{Group, Segment},
};

pub use self::segment::{Kind, MAX_BODY};

pub mod error;
pub mod segment;

/// Start of image.
const SOI: [u8; 2] = [0xFF, 0xD8];

/// Start of scan. Everything after it is image data.
const SOS: u8 = 0xDA;

/// How many body bytes we look at to find a signature.
const SNIFF_LEN: usize = 64;

/// Choices made while reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Treat XMP extension segments as a payload rather than as unknown
    /// segments.
    ///
    /// Off by default, since edited extension payloads can't be written
    /// back.
    pub recognize_xmp_ext: bool,
}

/// A parsed JPEG file.
#[derive(Debug)]
pub struct Jpeg {
    source: Section,
    jfif: Vec<Segment>,
    exif: Group,
    xmp: Group,
    xmp_ext: Group,
    psir: Group,
    others: Vec<Segment>,

    /// The SOS marker through the end of the file.
    scan: Section,

    size: Option<u64>,
}

impl Jpeg {
    /// Parses the segments with the default [`ReadOptions`].
    pub fn read(source: Section) -> Result<Self, MetadataError> {
        Self::read_with(source, ReadOptions::default())
    }

    pub fn read_with(source: Section, options: ReadOptions) -> Result<Self, MetadataError> {
        let mut head = [0_u8; 2];
        if source.read_at(0, &mut head).is_err() || head != SOI {
            log::error!("No SOI marker. This isn't a JPEG.");
            return Err(JpegError::NotJpeg.into());
        }

        let mut jpeg = Self {
            source: source.clone(),
            jfif: Vec::new(),
            exif: Group::new(Kind::Exif),
            xmp: Group::new(Kind::Xmp),
            xmp_ext: Group::new(Kind::XmpExt),
            psir: Group::new(Kind::Psir),
            others: Vec::new(),
            scan: Section::empty(),
            size: None,
        };

        let mut offset = 2_u64;
        loop {
            let buf = source.read_upto(offset, 4)?;
            let (marker, length) = parse_marker(&buf, offset)?;

            let Some(length) = length else {
                match marker {
                    0xFF => {
                        // fill byte
                        offset += 1;
                    }
                    SOS => {
                        log::trace!("Start of scan at offset `{offset}`.");
                        jpeg.scan = source.slice(offset, source.len() - offset)?;
                        break;
                    }
                    _ => {
                        log::trace!("Standalone marker `{marker:#04x}` at offset `{offset}`.");
                        jpeg.others.push(Segment::standalone(marker));
                        offset += 2;
                    }
                }
                continue;
            };

            let body = source
                .slice(offset + 4, u64::from(length) - 2)
                .map_err(|_| {
                    log::error!("Segment at offset `{offset}` runs past the end of the file!");
                    JpegError::Truncated { offset }
                })?;
            jpeg.classify(marker, body, &options)?;
            offset += 2 + u64::from(length);
        }

        Ok(jpeg)
    }

    fn classify(
        &mut self,
        marker: u8,
        body: Section,
        options: &ReadOptions,
    ) -> Result<(), MetadataError> {
        let head = body.read_upto(0, SNIFF_LEN)?;
        let kind = Kind::ALL
            .into_iter()
            .filter(|k| k.marker() == marker && head.starts_with(k.signature()))
            .find(|k| *k != Kind::XmpExt || options.recognize_xmp_ext);
        log::trace!(
            "Segment `{marker:#04x}` with `{}` bytes is `{kind:?}`.",
            body.len()
        );

        match kind {
            Some(Kind::Jfif | Kind::Jfxx) => self.jfif.push(Segment::with_body(marker, body)),
            Some(Kind::Exif) => self.exif.push(body)?,
            Some(Kind::Xmp) => self.xmp.push(body)?,
            Some(Kind::XmpExt) => self.xmp_ext.push(body)?,
            Some(Kind::Psir) => self.psir.push(body)?,
            None => self.others.push(Segment::with_body(marker, body)),
        }
        Ok(())
    }

    fn group(&self, kind: Kind) -> Option<&Group> {
        match kind {
            Kind::Exif => Some(&self.exif),
            Kind::Xmp => Some(&self.xmp),
            Kind::XmpExt => Some(&self.xmp_ext),
            Kind::Psir => Some(&self.psir),
            Kind::Jfif | Kind::Jfxx => None,
        }
    }

    fn group_mut(&mut self, kind: Kind) -> Option<&mut Group> {
        match kind {
            Kind::Exif => Some(&mut self.exif),
            Kind::Xmp => Some(&mut self.xmp),
            Kind::XmpExt => Some(&mut self.xmp_ext),
            Kind::Psir => Some(&mut self.psir),
            Kind::Jfif | Kind::Jfxx => None,
        }
    }

    /// The payload of one kind, glued back together from its segments.
    ///
    /// `None` if the file has no such payload, and always `None` for
    /// JFIF segments, which aren't merged.
    pub fn payload(&self, kind: Kind) -> Option<Section> {
        self.group(kind)?.payload()
    }

    /// How many physical segments a payload was read from.
    pub fn segment_count(&self, kind: Kind) -> usize {
        self.group(kind).map_or(0, Group::segment_count)
    }

    /// Hands a payload to a container. Once the container is edited, the
    /// payload is rendered from it. This isn't an edit by itself.
    ///
    /// Payloads the file didn't have are added this way too.
    pub fn set_container(&mut self, kind: Kind, container: ContainerRef) -> Result<(), MetadataError> {
        let Some(group) = self.group_mut(kind) else {
            log::error!("`{kind:?}` segments don't hold a container!");
            return Err(MetadataError::Logic(format!(
                "`{kind:?}` segments can't hold a container"
            )));
        };

        group.set_container(container);
        Ok(())
    }

    /// JFIF and JFXX segments, in file order.
    pub fn jfif(&self) -> &[Segment] {
        &self.jfif
    }

    /// Segments we don't recognize, in file order.
    pub fn others(&self) -> &[Segment] {
        &self.others
    }

    /// The compressed image, starting at the SOS marker.
    pub fn scan(&self) -> &Section {
        &self.scan
    }

    fn groups_mut(&mut self) -> [&mut Group; 4] {
        [
            &mut self.exif,
            &mut self.xmp,
            &mut self.xmp_ext,
            &mut self.psir,
        ]
    }
}

/// Parses the start of a segment: `0xFF`, the marker, and (for markers that
/// have one) the length.
///
/// The marker `0xFF` is a fill byte and comes back without a length.
fn parse_marker(buf: &[u8], offset: u64) -> Result<(u8, Option<u16>), JpegError> {
    let input = &mut &buf[..];

    let (start, marker) = (u8, u8).parse_next(input).map_err(|_: EmptyError| {
        log::error!("The file ended at offset `{offset}`, before the image data!");
        JpegError::Truncated { offset }
    })?;
    if start != 0xFF || marker == 0x00 {
        let found = if start != 0xFF { start } else { marker };
        log::error!("Expected a marker at offset `{offset}`, but found `{found:#04x}`!");
        return Err(JpegError::BadMarker { offset, found });
    }

    if marker == 0xFF || marker == 0x01 || (0xD0..=0xD9).contains(&marker) || marker == SOS {
        return Ok((marker, None));
    }

    let length = be_u16.parse_next(input).map_err(|_: EmptyError| {
        log::error!("The file ended inside the header at offset `{offset}`!");
        JpegError::Truncated { offset }
    })?;
    if length < 2 {
        log::error!("Segment at offset `{offset}` has length `{length}`!");
        return Err(JpegError::BadLength { offset, length });
    }

    Ok((marker, Some(length)))
}

impl Container for Jpeg {
    fn is_empty(&self) -> bool {
        false
    }

    fn dirty(&self) -> bool {
        [&self.exif, &self.xmp, &self.xmp_ext, &self.psir]
            .into_iter()
            .any(Group::dirty)
    }

    fn layout(&mut self) -> Result<u64, MetadataError> {
        if !self.dirty() {
            self.size = Some(self.source.len());
            return Ok(self.source.len());
        }

        let mut size = SOI.len() as u64;
        size += self.jfif.iter().map(Segment::size).sum::<u64>();
        for group in self.groups_mut() {
            size += group.layout()?;
        }
        size += self.others.iter().map(Segment::size).sum::<u64>();
        size += self.scan.len();

        log::debug!("JPEG will be rewritten with `{size}` bytes.");
        self.size = Some(size);
        Ok(size)
    }

    fn write(&mut self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        let Some(size) = self.size else {
            return Err(MetadataError::Logic("JPEG written before layout".into()));
        };

        let count = if self.dirty() {
            let mut count = write_bytes(out, &SOI)?;
            for segment in &self.jfif {
                count += segment.write(out)?;
            }
            for group in [&self.exif, &self.xmp, &self.xmp_ext, &self.psir] {
                count += group.write(out)?;
            }
            for segment in &self.others {
                count += segment.write(out)?;
            }
            count + self.scan.copy_to(out)?
        } else {
            self.source.copy_to(out)?
        };

        check_written("JPEG", size, count)?;
        Ok(count)
    }
}
