//! TIFF files.
//!
//! Besides IFD0 and the EXIF and GPS IFDs it points to, IFD0 can carry an
//! XMP packet, an IPTC block, and a Photoshop resource block (which has its
//! own IPTC block). Unlike in a JPEG, none of these are created when
//! missing.

use std::io::Write;

use crate::{
    container::{Container, Shared, shared},
    containers::{
        iim::Iim,
        psir::{ID_IIM, Psir},
        rdf::Packet,
        tiff::{
            Tiff,
            tag::{Tag, TagType},
        },
    },
    error::MetadataError,
    providers::{
        Provider,
        exif_ifd::{EXIF_IFD, ExifIfdProvider},
        gps_ifd::{GPS_IFD, GpsIfdProvider},
        ifd0::{Flavor, Ifd0Provider},
        iptc::IptcProvider,
        multi::MultiProvider,
        xmp::XmpProvider,
    },
    source::Section,
};

use super::FileHandler;

const SIGNATURE_LE: [u8; 4] = *b"II*\0";
const SIGNATURE_BE: [u8; 4] = *b"MM\0*";

const TAG_XMP: u16 = 0x02BC;
const TAG_IPTC: u16 = 0x83BB;
const TAG_PSIR: u16 = 0x8649;
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_GPS_IFD: u16 = 0x8825;

#[derive(Debug)]
pub struct TiffHandler {
    tiff: Shared<Tiff>,

    /// The resource block and the IPTC block inside it.
    psir: Option<(Shared<Psir>, Shared<Iim>)>,

    providers: MultiProvider,
}

impl TiffHandler {
    /// Whether the file starts with a TIFF header, in either byte order.
    pub fn sniff(source: &Section) -> Result<bool, MetadataError> {
        let head = source.read_upto(0, 4)?;
        Ok(head == SIGNATURE_LE || head == SIGNATURE_BE)
    }

    pub fn read(source: Section) -> Result<Self, MetadataError> {
        let tiff = shared(Tiff::read(source)?);

        let (rdf, iim, psir, has_exif, has_gps) = {
            let mut block = tiff.write();
            let ifd0 = block.ifd0_mut();
            let has_exif = ifd0.tag(TAG_EXIF_IFD).is_some();
            let has_gps = ifd0.tag(TAG_GPS_IFD).is_some();

            let rdf = adopt(ifd0.tag_mut(TAG_XMP), "XMP", &[TagType::Byte], Packet::read)?;
            let iim = adopt(ifd0.tag_mut(TAG_IPTC), "IPTC", &[TagType::Long], Iim::read)?;
            let psir = adopt(ifd0.tag_mut(TAG_PSIR), "Photoshop", &[TagType::Byte], Psir::read)?;
            (rdf, iim, psir, has_exif, has_gps)
        };

        let psir = match psir {
            Some(psir) => adopt_psir_iim(&psir)?.map(|iim| (psir, iim)),
            None => None,
        };

        let mut providers = MultiProvider::default();
        providers.push(Ifd0Provider::new(tiff.clone(), Flavor::Tiff)?);
        if let Some(rdf) = rdf {
            providers.push(XmpProvider::new(rdf)?);
        }
        if let Some(iim) = iim {
            providers.push(IptcProvider::new(iim)?);
        }
        if let Some((_, ref iim)) = psir {
            providers.push(IptcProvider::new(iim.clone())?);
        }
        if has_exif {
            providers.push(ExifIfdProvider::new(tiff.clone(), EXIF_IFD, false)?);
        }
        if has_gps {
            providers.push(GpsIfdProvider::new(tiff.clone(), GPS_IFD)?);
        }

        Ok(Self {
            tiff,
            psir,
            providers,
        })
    }
}

/// Parses a tag's data as a nested container and hands the tag to it.
///
/// Besides `UNDEFINED`, the tag may have any of the types in `also`.
fn adopt<C: Container + 'static>(
    tag: Option<&mut Tag>,
    what: &str,
    also: &[TagType],
    read: impl FnOnce(Section) -> Result<C, MetadataError>,
) -> Result<Option<Shared<C>>, MetadataError> {
    let Some(tag) = tag else {
        return Ok(None);
    };

    let ty = tag.ty();
    if ty != TagType::Undefined && !also.contains(&ty) {
        log::error!("The {what} tag has type `{ty:?}`!");
        return Err(MetadataError::Encoding(format!(
            "{what} tag: unexpected type `{ty:?}`"
        )));
    }
    let Some(section) = tag.as_section() else {
        return Err(MetadataError::Logic(format!("{what} tag adopted twice")));
    };

    log::trace!("Reading the {what} tag's `{}` bytes.", section.len());
    let container = shared(read(section)?);
    tag.set_container(container.clone());
    Ok(Some(container))
}

/// Hands the resource block's IPTC resource, if it has one, to an IIM block.
fn adopt_psir_iim(psir: &Shared<Psir>) -> Result<Option<Shared<Iim>>, MetadataError> {
    let mut block = psir.write();
    let Some(resource) = block.resource_mut(ID_IIM) else {
        return Ok(None);
    };
    let Some(section) = resource.section().cloned() else {
        return Err(MetadataError::Logic("IPTC resource adopted twice".into()));
    };

    let iim = shared(Iim::read(section)?);
    resource.set_container(iim.clone());
    Ok(Some(iim))
}

impl FileHandler for TiffHandler {
    fn provider(&self) -> &dyn Provider {
        &self.providers
    }

    fn provider_mut(&mut self) -> &mut dyn Provider {
        &mut self.providers
    }

    fn dirty(&self) -> bool {
        self.tiff.read().dirty()
    }

    fn save(&mut self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        if let Some((ref psir, ref iim)) = self.psir {
            psir.write().sync_iim_hash(iim)?;
        }

        let mut tiff = self.tiff.write();
        tiff.layout()?;
        tiff.write(out)
    }
}

#[cfg(test)]
mod tests {
    use super::{TAG_IPTC, TAG_XMP, TiffHandler};
    use crate::{
        container::Container as _,
        containers::tiff::{Endianness, Tiff, tag::TagType},
        handlers::FileHandler as _,
        source::Section,
        types::{DateTime, Location, Orientation},
        util::logger,
    };

    const XMP: &str = concat!(
        r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">"#,
        r#"<rdf:Description rdf:about="" xmlns:dc="http://purl.org/dc/elements/1.1/">"#,
        r#"<dc:title><rdf:Alt><rdf:li xml:lang="x-default">Harbor</rdf:li></rdf:Alt></dc:title>"#,
        r#"</rdf:Description></rdf:RDF></x:xmpmeta>"#,
    );

    /// `City` = `Oslo`, in a block that says it's UTF-8, padded the way
    /// TIFF writers do.
    #[rustfmt::skip]
    const IIM: &[u8] = &[
        0x1C, 0x01, 0x5A, 0x00, 0x03, 0x1B, 0x25, 0x47,
        0x1C, 0x02, 0x5A, 0x00, 0x04, b'O', b's', b'l', b'o',
        0x00, 0x00,
    ];

    /// A TIFF with a caption, an orientation, an XMP packet, and an IPTC
    /// block, but no EXIF or GPS IFD.
    fn sample() -> Vec<u8> {
        let mut tiff = Tiff::new(Endianness::Little);
        let ifd0 = tiff.ifd0_mut();
        ifd0.add_tag(0x10E, TagType::Ascii).set_string("A harbor at dusk");
        ifd0.add_tag(0x112, TagType::Short).set_short(6);
        ifd0.add_tag(TAG_XMP, TagType::Byte).set_bytes(XMP.as_bytes());
        ifd0.add_tag(TAG_IPTC, TagType::Undefined).set_unknown(IIM);

        let size = tiff.layout().unwrap();
        let mut out = Vec::new();
        assert_eq!(tiff.write(&mut out).unwrap(), size);
        out
    }

    fn reopen(bytes: Vec<u8>) -> TiffHandler {
        TiffHandler::read(Section::from_bytes(bytes)).unwrap()
    }

    fn save(handler: &mut TiffHandler) -> Vec<u8> {
        let mut out = Vec::new();
        let count = handler.save(&mut out).unwrap();
        assert_eq!(count, out.len() as u64);
        out
    }

    #[test]
    fn sniffs_both_byte_orders() {
        logger();

        for head in [b"II*\0", b"MM\0*"] {
            assert!(TiffHandler::sniff(&Section::from_bytes(head.to_vec())).unwrap());
        }
        assert!(!TiffHandler::sniff(&Section::from_bytes(b"MM*\0".to_vec())).unwrap());
    }

    #[test]
    fn reads_the_embedded_blocks() {
        logger();

        let handler = reopen(sample());
        let p = handler.provider();
        assert_eq!(p.caption(), "A harbor at dusk");
        assert_eq!(p.title(), "Harbor");
        assert_eq!(p.orientation(), Some(Orientation::Rotate90));
        assert_eq!(p.location().city.default_value(), "Oslo");
        assert!(!handler.dirty());
    }

    #[test]
    fn untouched_files_are_copied() {
        logger();

        let file = sample();
        let mut handler = reopen(file.clone());
        assert_eq!(save(&mut handler), file);
    }

    #[test]
    fn edits_reach_the_embedded_blocks() {
        logger();

        let mut handler = reopen(sample());
        let p = handler.provider_mut();
        p.set_title("Oslo harbor").unwrap();
        p.set_location(&Location::default()).unwrap();
        p.set_orientation(None).unwrap();
        assert!(handler.dirty());

        let handler = reopen(save(&mut handler));
        let p = handler.provider();
        assert_eq!(p.title(), "Oslo harbor");
        assert!(p.location().is_empty());
        assert_eq!(p.orientation(), None);
        assert_eq!(p.caption(), "A harbor at dusk");
    }

    #[test]
    fn missing_ifds_arent_created() {
        logger();

        let mut handler = reopen(sample());
        let labels: Vec<String> = handler
            .provider()
            .date_time_tags()
            .into_iter()
            .map(|(label, _)| label)
            .collect();
        assert!(labels.iter().all(|l| !l.starts_with("EXIF")), "{labels:?}");

        // XMP and IPTC still take it
        let when = DateTime::parse("2023-12-24T18:00:00").unwrap();
        handler.provider_mut().set_date_time(&when).unwrap();
        let handler = reopen(save(&mut handler));
        assert!(handler.provider().date_time().equivalent(&when));
        assert!(
            handler
                .provider()
                .gps_tags()
                .iter()
                .all(|(label, _)| !label.starts_with("GPS"))
        );
    }
}
