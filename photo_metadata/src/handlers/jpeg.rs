//! JPEG files.
//!
//! The EXIF payload is a TIFF block, the Photoshop payload holds the IPTC
//! block, and the XMP payload is an RDF packet. Payloads the file lacks are
//! started empty, so every field can be written. They stay out of the output
//! until something is put in them.

use std::io::Write;

use crate::{
    container::{Container as _, Shared, shared},
    containers::{
        iim::Iim,
        jpeg::{Jpeg, Kind, ReadOptions},
        psir::{ID_IIM, Psir},
        rdf::Packet,
        tiff::{Endianness, Tiff},
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
        xmp_ext::XmpExtProvider,
    },
    source::Section,
};

use super::FileHandler;

const SIGNATURE: [u8; 2] = [0xFF, 0xD8];

#[derive(Debug)]
pub struct JpegHandler {
    jpeg: Jpeg,
    psir: Shared<Psir>,
    iim: Shared<Iim>,
    providers: MultiProvider,
}

impl JpegHandler {
    /// Whether the file starts like a JPEG.
    pub fn sniff(source: &Section) -> Result<bool, MetadataError> {
        Ok(source.read_upto(0, SIGNATURE.len())? == SIGNATURE)
    }

    pub fn read(source: Section) -> Result<Self, MetadataError> {
        let options = ReadOptions {
            recognize_xmp_ext: true,
        };
        let mut jpeg = Jpeg::read_with(source, options)?;

        let tiff = shared(match jpeg.payload(Kind::Exif) {
            Some(payload) => Tiff::read(payload)?,
            None => {
                log::debug!("No EXIF payload. Starting an empty one.");
                Tiff::new(Endianness::Big)
            }
        });
        jpeg.set_container(Kind::Exif, tiff.clone())?;

        let psir = shared(match jpeg.payload(Kind::Psir) {
            Some(payload) => Psir::read(payload)?,
            None => Psir::new(),
        });
        jpeg.set_container(Kind::Psir, psir.clone())?;
        let iim = adopt_iim(&psir)?;

        let rdf = shared(match jpeg.payload(Kind::Xmp) {
            Some(payload) => Packet::read(payload)?,
            None => {
                log::debug!("No XMP payload. Starting an empty one.");
                Packet::new()
            }
        });
        jpeg.set_container(Kind::Xmp, rdf.clone())?;

        let mut providers = MultiProvider::default();
        providers.push(Ifd0Provider::new(tiff.clone(), Flavor::Jpeg)?);
        providers.push(ExifIfdProvider::new(tiff.clone(), EXIF_IFD, true)?);
        providers.push(GpsIfdProvider::new(tiff, GPS_IFD)?);
        providers.push(IptcProvider::new(iim.clone())?);
        providers.push(XmpProvider::new(rdf)?);

        // checked, never edited, and written back as it was read
        if let Some(payload) = jpeg.payload(Kind::XmpExt) {
            let ext = shared(Packet::read(payload)?);
            providers.push(XmpExtProvider::new(ext)?);
        }

        Ok(Self {
            jpeg,
            psir,
            iim,
            providers,
        })
    }
}

/// Hands resource `0x404` to an IIM block, adding an empty one if the
/// resource is missing.
fn adopt_iim(psir: &Shared<Psir>) -> Result<Shared<Iim>, MetadataError> {
    let mut block = psir.write();
    let Some(resource) = block.resource_mut(ID_IIM) else {
        log::debug!("No IPTC resource. Starting an empty one.");
        let iim = shared(Iim::new());
        block.attach_psir(ID_IIM, b"", iim.clone())?;
        return Ok(iim);
    };

    let Some(section) = resource.section().cloned() else {
        log::error!("The IPTC resource was already adopted!");
        return Err(MetadataError::Logic("IPTC resource adopted twice".into()));
    };
    let iim = shared(Iim::read(section)?);
    resource.set_container(iim.clone());
    Ok(iim)
}

impl FileHandler for JpegHandler {
    fn provider(&self) -> &dyn Provider {
        &self.providers
    }

    fn provider_mut(&mut self) -> &mut dyn Provider {
        &mut self.providers
    }

    fn dirty(&self) -> bool {
        self.jpeg.dirty()
    }

    fn save(&mut self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        self.psir.write().sync_iim_hash(&self.iim)?;
        self.jpeg.layout()?;
        self.jpeg.write(out)
    }
}

#[cfg(test)]
mod tests {
    use super::JpegHandler;
    use crate::{
        containers::jpeg::Kind,
        error::MetadataError,
        handlers::FileHandler as _,
        source::Section,
        types::{DateTime, HierValue, Orientation},
        util::logger,
    };

    fn segment(marker: u8, body: &[u8]) -> Vec<u8> {
        let len = (body.len() + 2) as u16;
        let mut out = vec![0xFF, marker];
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn signed(kind: Kind, payload: &[u8]) -> Vec<u8> {
        let mut body = kind.signature().to_vec();
        body.extend_from_slice(payload);
        segment(kind.marker(), &body)
    }

    const SCAN: &[u8] = &[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0xFF, 0xD9];

    /// A JPEG with nothing but a quantization table.
    fn bare() -> Vec<u8> {
        let mut file = vec![0xFF, 0xD8];
        file.extend(segment(0xDB, &[0; 5]));
        file.extend(SCAN);
        file
    }

    fn save(handler: &mut JpegHandler) -> Vec<u8> {
        let mut out = Vec::new();
        let count = handler.save(&mut out).unwrap();
        assert_eq!(count, out.len() as u64);
        out
    }

    fn reopen(bytes: Vec<u8>) -> JpegHandler {
        JpegHandler::read(Section::from_bytes(bytes)).unwrap()
    }

    #[test]
    fn sniffs_the_signature() {
        logger();

        assert!(JpegHandler::sniff(&Section::from_bytes(bare())).unwrap());
        assert!(!JpegHandler::sniff(&Section::from_bytes(b"II*\0".to_vec())).unwrap());
        assert!(!JpegHandler::sniff(&Section::from_bytes(vec![0xFF])).unwrap());
    }

    #[test]
    fn missing_payloads_stay_out_until_written() {
        logger();

        let file = bare();
        let mut handler = reopen(file.clone());
        assert!(!handler.dirty());
        assert_eq!(handler.provider().caption(), "");
        assert_eq!(save(&mut handler), file);
    }

    #[test]
    fn fields_land_in_every_payload() {
        logger();

        let mut handler = reopen(bare());
        let p = handler.provider_mut();
        p.set_caption("Sunset over the bay").unwrap();
        p.set_keywords(&[HierValue::split("Nature/Sky", '/')]).unwrap();
        p.set_date_time(&DateTime::parse("2024-06-01T19:30:00-07:00").unwrap())
            .unwrap();
        p.set_orientation(Some(Orientation::Rotate90)).unwrap();
        assert!(handler.dirty());

        let saved = save(&mut handler);
        let handler = reopen(saved);
        let tags = handler.provider().caption_tags();
        let labels: Vec<&str> = tags.iter().map(|(label, _)| label.as_str()).collect();
        for expected in ["IFD0 ImageDescription", "IPTC Caption/Abstract"] {
            assert!(labels.contains(&expected), "missing `{expected}` in {labels:?}");
        }
        // setting a caption only ever clears the user comment
        assert!(!labels.contains(&"EXIF UserComment"), "{labels:?}");
        assert!(labels.iter().any(|l| l.starts_with("XMP ")));
        assert!(tags.iter().all(|(_, c)| c.is_empty() || c == "Sunset over the bay"));

        let p = handler.provider();
        assert_eq!(p.caption(), "Sunset over the bay");
        // IPTC keeps only the leaf
        let kw_tags = p.keywords_tags();
        assert!(kw_tags.contains(&(
            "IPTC Keyword".to_string(),
            vec![HierValue::from_labels(["Sky"])]
        )));
        assert!(kw_tags.contains(&(
            "XMP  digiKam:TagsList".to_string(),
            vec![HierValue::split("Nature/Sky", '/')]
        )));
        assert_eq!(p.orientation(), Some(Orientation::Rotate90));
        assert!(
            p.date_time()
                .equivalent(&DateTime::parse("2024-06-01T19:30:00-07:00").unwrap())
        );
    }

    #[test]
    fn extension_packets_with_managed_properties_are_refused() {
        logger();

        let xml = concat!(
            r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">"#,
            r#"<rdf:Description rdf:about="" xmlns:dc="http://purl.org/dc/elements/1.1/">"#,
            r#"<dc:format>image/jpeg</dc:format>"#,
            r#"</rdf:Description></rdf:RDF></x:xmpmeta>"#,
        );
        // GUID, full length, and offset
        let mut payload = [b'0'; 32].to_vec();
        payload.extend_from_slice(&(xml.len() as u32).to_be_bytes());
        payload.extend_from_slice(&0_u32.to_be_bytes());
        payload.extend_from_slice(xml.as_bytes());

        let mut file = vec![0xFF, 0xD8];
        file.extend(signed(Kind::XmpExt, &payload));
        file.extend(SCAN);

        let err = JpegHandler::read(Section::from_bytes(file)).unwrap_err();
        assert!(matches!(err, MetadataError::Unsupported(_)));
    }
}
