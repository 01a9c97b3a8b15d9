//! Photoshop image resource blocks.
//!
//! JPEGs carry one in their APP13 segment, and TIFFs in tag `0x8649`. The
//! resources we care about are `0x404` (an IPTC IIM block) and `0x425` (the
//! MD5 of that block). Everything else passes through untouched.

use std::io::Write;

use winnow::{
    Parser as _,
    binary::{be_u16, be_u32, u8},
    error::EmptyError,
    token::take,
};

use crate::{
    container::{Container, ContainerRef, Shared, check_written, shared, write_bytes, write_zeros},
    containers::{iim::Iim, raw::Raw},
    error::MetadataError,
    source::Section,
};

use self::error::PsirError;

pub mod error;

/// Every resource starts with this.
pub const RESOURCE_TYPE: &[u8; 4] = b"8BIM";

/// The resource holding an IPTC IIM block.
pub const ID_IIM: u16 = 0x404;

/// The resource holding the MD5 of the IIM block.
pub const ID_IIM_HASH: u16 = 0x425;

/// Resource headers are at most this long: 4-byte type, 2-byte ID, a name
/// of up to 255 bytes (plus length and padding), and a 4-byte size.
const MAX_HEADER: usize = 4 + 2 + 256 + 4;

/// A resource's payload.
#[derive(Clone, Debug)]
pub enum Body {
    /// Bytes nobody has claimed.
    Section(Section),

    /// A container that renders the payload.
    Container(ContainerRef),
}

/// One Photoshop image resource.
#[derive(Clone, Debug)]
pub struct Resource {
    id: u16,
    name: Vec<u8>,
    body: Body,
    body_size: u64,
}

impl Resource {
    pub fn id(&self) -> u16 {
        self.id
    }

    /// The resource's Pascal-string name. Usually empty.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// The payload's bytes, if no container has claimed them.
    pub fn section(&self) -> Option<&Section> {
        match self.body {
            Body::Section(ref s) => Some(s),
            Body::Container(_) => None,
        }
    }

    /// Hands the payload to a container. This isn't an edit by itself.
    pub fn set_container(&mut self, container: ContainerRef) {
        self.body = Body::Container(container);
    }

    fn dirty(&self) -> bool {
        match self.body {
            Body::Container(ref c) => c.read().dirty(),
            Body::Section(_) => false,
        }
    }

    fn is_empty(&self) -> bool {
        match self.body {
            Body::Container(ref c) => c.read().is_empty(),
            Body::Section(_) => false,
        }
    }

    /// Header bytes: type, ID, padded name, size.
    fn header_size(&self) -> u64 {
        let name = 1 + self.name.len() as u64;
        6 + name + name % 2 + 4
    }

    fn layout(&mut self) -> Result<u64, MetadataError> {
        self.body_size = match self.body {
            Body::Container(ref c) => c.write().layout()?,
            Body::Section(ref s) => s.len(),
        };
        Ok(self.header_size() + self.body_size + self.body_size % 2)
    }

    fn write(&self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        let size =
            u32::try_from(self.body_size).map_err(|_| PsirError::TooLarge { id: self.id })?;

        let mut header = Vec::with_capacity(MAX_HEADER);
        header.extend_from_slice(RESOURCE_TYPE);
        header.extend_from_slice(&self.id.to_be_bytes());
        header.push(self.name.len() as u8);
        header.extend_from_slice(&self.name);
        if header.len() % 2 == 1 {
            header.push(0);
        }
        header.extend_from_slice(&size.to_be_bytes());

        let mut count = write_bytes(out, &header)?;
        count += match self.body {
            Body::Container(ref c) => c.write().write(out)?,
            Body::Section(ref s) => s.copy_to(out)?,
        };
        if count % 2 == 1 {
            count += write_zeros(out, 1)?;
        }
        Ok(count)
    }
}

/// A sequence of Photoshop image resources.
#[derive(Debug)]
pub struct Psir {
    source: Section,
    resources: Vec<Resource>,
    dirty: bool,
    size: Option<u64>,
}

impl Psir {
    /// A sequence with no resources and no source bytes.
    pub fn new() -> Self {
        Self {
            source: Section::empty(),
            resources: Vec::new(),
            dirty: false,
            size: None,
        }
    }

    /// Parses the sequence. Resource bodies aren't read.
    pub fn read(source: Section) -> Result<Self, MetadataError> {
        let mut resources: Vec<Resource> = Vec::new();
        let mut offset = 0_u64;

        while offset < source.len() {
            let buf = source.read_upto(offset, MAX_HEADER)?;
            let (id, name, header_len) = parse_header(&buf, offset)?;

            if resources.iter().any(|r| r.id == id) {
                log::error!("Found a second resource with ID `{id:#06x}`!");
                return Err(PsirError::DuplicateId { id }.into());
            }

            let size = u32::from_be_bytes([
                buf[header_len - 4],
                buf[header_len - 3],
                buf[header_len - 2],
                buf[header_len - 1],
            ]);
            let body_offset = offset + header_len as u64;
            let body = source
                .slice(body_offset, u64::from(size))
                .map_err(|_| {
                    log::error!("Resource `{id:#06x}` body runs past the end!");
                    PsirError::IncompleteBody {
                        id,
                        offset: body_offset,
                        size,
                    }
                })?;
            log::trace!("Found resource `{id:#06x}` with `{size}` bytes.");

            resources.push(Resource {
                id,
                name,
                body: Body::Section(body),
                body_size: u64::from(size),
            });

            // resources start on even offsets
            offset = body_offset + u64::from(size);
            offset += offset % 2;
        }

        Ok(Self {
            source,
            resources,
            dirty: false,
            size: None,
        })
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, id: u16) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn resource_mut(&mut self, id: u16) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|r| r.id == id)
    }

    /// Adds a resource. It goes right after the last resource with a lower
    /// ID, so an ordered sequence stays ordered and foreign resources keep
    /// their places.
    pub fn add_psir(
        &mut self,
        id: u16,
        name: &[u8],
        container: ContainerRef,
    ) -> Result<(), MetadataError> {
        self.insert(id, name, container)?;
        self.dirty = true;
        Ok(())
    }

    /// Like [`Psir::add_psir`], but doesn't count as an edit. The resource
    /// only shows up in the output once its container has been changed.
    pub fn attach_psir(
        &mut self,
        id: u16,
        name: &[u8],
        container: ContainerRef,
    ) -> Result<(), MetadataError> {
        self.insert(id, name, container)
    }

    fn insert(&mut self, id: u16, name: &[u8], container: ContainerRef) -> Result<(), MetadataError> {
        if self.resource(id).is_some() {
            log::error!("Tried to add resource `{id:#06x}`, but it's already here!");
            return Err(MetadataError::Logic(format!(
                "resource `{id:#06x}` already exists"
            )));
        }
        if name.len() > usize::from(u8::MAX) {
            return Err(MetadataError::Logic(format!(
                "resource name is `{}` bytes long, but the limit is 255",
                name.len()
            )));
        }

        let idx = self
            .resources
            .iter()
            .rposition(|r| r.id < id)
            .map_or(0, |i| i + 1);
        log::debug!("Adding resource `{id:#06x}` at position `{idx}`.");
        self.resources.insert(
            idx,
            Resource {
                id,
                name: name.to_vec(),
                body: Body::Container(container),
                body_size: 0,
            },
        );
        Ok(())
    }

    /// Removes a resource. Returns whether it was there.
    pub fn remove_psir(&mut self, id: u16) -> bool {
        let before = self.resources.len();
        self.resources.retain(|r| r.id != id);
        let removed = self.resources.len() != before;
        if removed {
            log::debug!("Removed resource `{id:#06x}`.");
            self.dirty = true;
        }
        removed
    }

    /// Couples `iim` with resource `0x425`, so a re-rendered IIM block
    /// leaves its MD5 there.
    ///
    /// The hash resource only matters once the block has been edited. An
    /// edited block that ended up empty takes its hash along with it.
    pub fn sync_iim_hash(&mut self, iim: &Shared<Iim>) -> Result<(), MetadataError> {
        let mut iim = iim.write();
        if !iim.dirty() {
            return Ok(());
        }
        if iim.is_empty() {
            self.remove_psir(ID_IIM_HASH);
            return Ok(());
        }

        let target = match self.resource_mut(ID_IIM_HASH) {
            Some(resource) => {
                let raw = match resource.body {
                    Body::Section(ref s) => shared(Raw::read(s.clone())),
                    // already coupled
                    Body::Container(_) => return Ok(()),
                };
                resource.set_container(raw.clone());
                raw
            }
            None => {
                log::debug!("Adding a resource for the IIM block's hash.");
                let raw = shared(Raw::new(vec![0; 16]));
                self.add_psir(ID_IIM_HASH, b"", raw.clone())?;
                raw
            }
        };
        iim.set_hash_target(target);
        Ok(())
    }

    /// The resources that will be written. Those holding empty containers
    /// are dropped.
    fn kept(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|r| !r.is_empty())
    }
}

impl Default for Psir {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a resource header, returning the ID, the name, and the header's
/// length (which ends with the 4-byte body size).
fn parse_header(buf: &[u8], offset: u64) -> Result<(u16, Vec<u8>, usize), PsirError> {
    let input = &mut &buf[..];

    let (magic, id, name_len): (&[u8], u16, u8) = (take(4_usize), be_u16, u8)
        .parse_next(input)
        .map_err(|_: EmptyError| {
            log::error!("Resource header at `{offset}` is cut short!");
            PsirError::InvalidHeader { offset }
        })?;
    if magic != RESOURCE_TYPE {
        log::error!("Resource at `{offset}` has type `{magic:x?}`, not `8BIM`!");
        return Err(PsirError::InvalidHeader { offset });
    }

    let incomplete = |_: EmptyError| {
        log::error!("Resource header at `{offset}` is incomplete!");
        PsirError::IncompleteHeader { offset }
    };
    let name: &[u8] = take(usize::from(name_len))
        .parse_next(input)
        .map_err(incomplete)?;
    if name_len % 2 == 0 {
        // the length byte plus the name are padded to an even length
        take(1_usize).parse_next(input).map_err(incomplete)?;
    }
    be_u32.parse_next(input).map_err(incomplete)?;

    Ok((id, name.to_vec(), buf.len() - input.len()))
}

impl Container for Psir {
    fn is_empty(&self) -> bool {
        self.kept().next().is_none()
    }

    fn dirty(&self) -> bool {
        self.dirty || self.resources.iter().any(Resource::dirty)
    }

    fn layout(&mut self) -> Result<u64, MetadataError> {
        let size = if self.dirty() {
            // the IIM block pushes its hash into 0x425 while laying out, so
            // it goes first
            let mut size = 0;
            let (iim, rest): (Vec<_>, Vec<_>) = self
                .resources
                .iter_mut()
                .partition(|r| r.id == ID_IIM);
            for resource in iim.into_iter().chain(rest) {
                if !resource.is_empty() {
                    size += resource.layout()?;
                }
            }
            size
        } else {
            self.source.len()
        };

        self.size = Some(size);
        Ok(size)
    }

    fn write(&mut self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        let Some(size) = self.size else {
            return Err(MetadataError::Logic("resources written before layout".into()));
        };

        let count = if self.dirty() {
            let mut count = 0;
            for resource in self.kept() {
                count += resource.write(out)?;
            }
            count
        } else {
            self.source.copy_to(out)?
        };

        check_written("Photoshop resources", size, count)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::{ID_IIM, ID_IIM_HASH, Psir, error::PsirError};
    use crate::{
        container::{Container as _, shared},
        containers::{iim::Iim, raw::Raw},
        error::MetadataError,
        source::Section,
        util::logger,
    };

    #[rustfmt::skip]
    const TWO_RESOURCES: &[u8] = &[
        0x38, 0x42, 0x49, 0x4D, 0x88, 0x99,
        0x04, b'B', b'l', b'a', b'h', 0x00,
        0x00, 0x00, 0x00, 0x07,
        b'T', b'e', b's', b't', b'i', b'n', b'g', 0x00,
        0x38, 0x42, 0x49, 0x4D, 0x88, 0xAA,
        0x05, b'B', b'l', b'a', b'h', b'2',
        0x00, 0x00, 0x00, 0x08,
        b'T', b'e', b's', b't', b'i', b'n', b'g', b'2',
    ];

    fn render(psir: &mut Psir) -> Vec<u8> {
        let size = psir.layout().unwrap();
        let mut out = Vec::new();
        assert_eq!(psir.write(&mut out).unwrap(), size);
        out
    }

    #[test]
    fn reads_names_and_bodies() {
        logger();

        let psir = Psir::read(Section::from_bytes(TWO_RESOURCES)).unwrap();
        let ids: Vec<u16> = psir.resources().iter().map(|r| r.id()).collect();
        assert_eq!(ids, [0x8899, 0x88AA]);

        let first = psir.resource(0x8899).unwrap();
        assert_eq!(first.name(), b"Blah");
        assert_eq!(first.section().unwrap().to_vec().unwrap(), b"Testing");
        assert_eq!(psir.resource(0x88AA).unwrap().name(), b"Blah2");
    }

    #[test]
    fn added_resource_keeps_foreign_ones_in_place() {
        logger();

        let mut psir = Psir::read(Section::from_bytes(TWO_RESOURCES)).unwrap();
        assert_eq!(render(&mut psir), TWO_RESOURCES);

        let hash = shared(Raw::new(vec![0xAB; 3]));
        psir.add_psir(ID_IIM_HASH, b"", hash).unwrap();

        let mut expected = TWO_RESOURCES.to_vec();
        #[rustfmt::skip]
        let added: &[u8] = &[
            0x38, 0x42, 0x49, 0x4D, 0x04, 0x25,
            0x00, 0x00,
            0x00, 0x00, 0x00, 0x03,
            0xAB, 0xAB, 0xAB, 0x00,
        ];
        expected.splice(0..0, added.iter().copied());
        assert_eq!(render(&mut psir), expected);

        assert!(matches!(
            psir.add_psir(ID_IIM_HASH, b"", shared(Raw::new(Vec::new()))),
            Err(MetadataError::Logic(_))
        ));
    }

    #[test]
    fn attached_empty_resource_stays_hidden() {
        logger();

        let mut psir = Psir::new();
        psir.attach_psir(0x404, b"", shared(Raw::read(Section::empty())))
            .unwrap();
        assert!(psir.is_empty());
        assert!(!psir.dirty());
        assert_eq!(render(&mut psir), b"");
    }

    #[test]
    fn edited_iim_block_gets_a_fresh_hash() {
        logger();

        #[rustfmt::skip]
        let start: &[u8] = &[
            0x38, 0x42, 0x49, 0x4D, 0x88, 0x99,
            0x04, b'B', b'l', b'a', b'h', 0x00,
            0x00, 0x00, 0x00, 0x07,
            b'T', b'e', b's', b't', b'i', b'n', b'g', 0x00,
            0x38, 0x42, 0x49, 0x4D, 0x04, 0x04,
            0x00, 0x00,
            0x00, 0x00, 0x00, 0x10,
            0x1C, 0x01, 0x5A, 0x00, 0x03, 0x1B, 0x25, 0x47,
            0x1C, 0x02, 0x19, 0x00, 0x03, b'k', b'w', b'1',
            0x38, 0x42, 0x49, 0x4D, 0x88, 0xAA,
            0x05, b'B', b'l', b'a', b'h', b'2',
            0x00, 0x00, 0x00, 0x08,
            b'T', b'e', b's', b't', b'i', b'n', b'g', b'2',
        ];
        #[rustfmt::skip]
        let expected: &[u8] = &[
            0x38, 0x42, 0x49, 0x4D, 0x88, 0x99,
            0x04, b'B', b'l', b'a', b'h', 0x00,
            0x00, 0x00, 0x00, 0x07,
            b'T', b'e', b's', b't', b'i', b'n', b'g', 0x00,
            0x38, 0x42, 0x49, 0x4D, 0x04, 0x04,
            0x00, 0x00,
            0x00, 0x00, 0x00, 0x21,
            0x1C, 0x01, 0x5A, 0x00, 0x03, 0x1B, 0x25, 0x47,
            0x1C, 0x02, 0x05, 0x00, 0x02, b'm', b'e',
            0x1C, 0x02, 0x19, 0x00, 0x04, b'n', b'e', b'w', b'1',
            0x1C, 0x02, 0x19, 0x00, 0x04, b'n', b'e', b'w', b'2',
            0x00,
            0x38, 0x42, 0x49, 0x4D, 0x04, 0x25,
            0x00, 0x00,
            0x00, 0x00, 0x00, 0x10,
            0x24, 0xB3, 0x09, 0x1A, 0xCD, 0x57, 0x4B, 0x06,
            0x57, 0xB1, 0xA5, 0xCC, 0xB0, 0xAB, 0xF4, 0xA6,
            0x38, 0x42, 0x49, 0x4D, 0x88, 0xAA,
            0x05, b'B', b'l', b'a', b'h', b'2',
            0x00, 0x00, 0x00, 0x08,
            b'T', b'e', b's', b't', b'i', b'n', b'g', b'2',
        ];

        let mut psir = Psir::read(Section::from_bytes(start)).unwrap();
        let body = psir.resource(ID_IIM).unwrap().section().unwrap().clone();
        let iim = shared(Iim::read(body).unwrap());
        psir.resource_mut(ID_IIM)
            .unwrap()
            .set_container(iim.clone());

        // adopting the block and syncing an untouched one changes nothing
        psir.sync_iim_hash(&iim).unwrap();
        assert!(!psir.dirty());
        assert_eq!(render(&mut psir), start);

        {
            let mut iim = iim.write();
            iim.set_dataset(0x0205, b"me".to_vec());
            iim.set_datasets(0x0219, vec![b"new1".to_vec(), b"new2".to_vec()]);
        }
        psir.sync_iim_hash(&iim).unwrap();
        assert_eq!(render(&mut psir), expected);
    }

    #[test]
    fn malformed_sequences_fail() {
        logger();

        let mut bad_magic = TWO_RESOURCES.to_vec();
        bad_magic[0] = b'7';
        assert_eq!(
            Psir::read(Section::from_bytes(bad_magic)).unwrap_err(),
            MetadataError::from(PsirError::InvalidHeader { offset: 0 })
        );

        let mut duplicate = TWO_RESOURCES.to_vec();
        duplicate[0x1D] = 0x99;
        assert_eq!(
            Psir::read(Section::from_bytes(duplicate)).unwrap_err(),
            MetadataError::from(PsirError::DuplicateId { id: 0x8899 })
        );

        let truncated = TWO_RESOURCES[..TWO_RESOURCES.len() - 3].to_vec();
        assert!(Psir::read(Section::from_bytes(truncated)).is_err());
    }
}
