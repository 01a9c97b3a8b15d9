//! The GPS sub-IFD, reached from IFD0 through tag `0x8825`.

use crate::{
    container::Shared,
    containers::tiff::{IfdStep, Tiff, ifd::Ifd, tag::TagType},
    error::MetadataError,
    types::{ExifGps, GpsCoords},
};

use super::{Provider, Tags, tag};

/// Where the GPS IFD hangs off IFD0.
pub const GPS_IFD: &[IfdStep] = &[IfdStep::Tag(0x8825)];

const TAG_VERSION: u16 = 0;
const TAG_LAT_REF: u16 = 1;
const TAG_LAT: u16 = 2;
const TAG_LONG_REF: u16 = 3;
const TAG_LONG: u16 = 4;
const TAG_ALT_REF: u16 = 5;
const TAG_ALT: u16 = 6;

/// Written into new GPS IFDs.
const VERSION: [u8; 4] = [2, 3, 0, 0];

#[derive(Debug)]
pub struct GpsIfdProvider {
    tiff: Shared<Tiff>,
    path: &'static [IfdStep],
    coords: GpsCoords,
}

impl GpsIfdProvider {
    /// Reads the GPS IFD at `path`, which may not exist yet.
    pub fn new(tiff: Shared<Tiff>, path: &'static [IfdStep]) -> Result<Self, MetadataError> {
        let coords = match tiff.write().ifd_mut(path)? {
            Some(ifd) => read_coords(ifd)?,
            None => GpsCoords::default(),
        };
        Ok(Self { tiff, path, coords })
    }
}

fn invalid() -> MetadataError {
    log::error!("The GPS IFD holds an incomplete or malformed position!");
    MetadataError::Encoding("invalid GPS tags".into())
}

fn read_coords(ifd: &Ifd) -> Result<GpsCoords, MetadataError> {
    let position = [TAG_LAT_REF, TAG_LAT, TAG_LONG_REF, TAG_LONG].map(|id| ifd.tag(id));
    let [Some(lat_ref), Some(lat), Some(long_ref), Some(long)] = position else {
        if position.iter().all(Option::is_none) {
            return Ok(GpsCoords::default());
        }
        return Err(invalid());
    };

    let mut exif = ExifGps {
        lat_ref: lat_ref.as_string().map_err(|_| invalid())?,
        lat: lat.as_rationals().map_err(|_| invalid())?,
        long_ref: long_ref.as_string().map_err(|_| invalid())?,
        long: long.as_rationals().map_err(|_| invalid())?,
        ..Default::default()
    };
    if exif.lat_ref.len() != 1 || exif.long_ref.len() != 1 || exif.lat.len() != 6 || exif.long.len() != 6
    {
        return Err(invalid());
    }

    if let Some(alt) = ifd.tag(TAG_ALT) {
        let alt_ref = match ifd.tag(TAG_ALT_REF) {
            Some(t) => t.as_bytes().map_err(|_| invalid())?,
            None => Vec::new(),
        };
        exif.alt = alt.as_rationals().map_err(|_| invalid())?;
        if alt_ref.len() > 1 || exif.alt.len() != 2 {
            return Err(invalid());
        }
        exif.alt_ref = alt_ref.first().copied().unwrap_or(0);
    }

    GpsCoords::parse_exif(&exif).map_err(|e| {
        log::error!("The GPS IFD's position doesn't decode! err: {e}");
        MetadataError::from(e)
    })
}

impl Provider for GpsIfdProvider {
    fn name(&self) -> &'static str {
        "GPS IFD"
    }

    fn gps(&self) -> GpsCoords {
        self.coords
    }

    fn gps_tags(&self) -> Tags<GpsCoords> {
        vec![tag("GPS  GPS*", self.coords)]
    }

    fn set_gps(&mut self, value: &GpsCoords) -> Result<(), MetadataError> {
        let mut block = self.tiff.write();

        if value.is_empty() {
            self.coords = GpsCoords::default();
            let Some(ifd) = block.ifd_mut(self.path)? else {
                return Ok(());
            };
            for id in [TAG_LAT_REF, TAG_LAT, TAG_LONG_REF, TAG_LONG, TAG_ALT_REF, TAG_ALT] {
                ifd.delete_tag(id);
            }
            // a lone version tag would keep the IFD alive
            if ifd.tags().iter().all(|t| t.id() == TAG_VERSION) {
                ifd.delete_tag(TAG_VERSION);
            }
            return Ok(());
        }
        if value.equivalent(&self.coords) {
            return Ok(());
        }

        self.coords = *value;
        let exif = value.as_exif();
        let ifd = block.ensure_ifd(self.path)?;
        if ifd.tag(TAG_VERSION).is_none() {
            ifd.add_tag(TAG_VERSION, TagType::Byte).set_bytes(&VERSION);
        }
        ifd.add_tag(TAG_LAT_REF, TagType::Ascii).set_string(&exif.lat_ref);
        ifd.add_tag(TAG_LAT, TagType::Rational).set_rationals(&exif.lat)?;
        ifd.add_tag(TAG_LONG_REF, TagType::Ascii).set_string(&exif.long_ref);
        ifd.add_tag(TAG_LONG, TagType::Rational).set_rationals(&exif.long)?;
        if exif.alt.is_empty() {
            ifd.delete_tag(TAG_ALT_REF);
            ifd.delete_tag(TAG_ALT);
        } else {
            ifd.add_tag(TAG_ALT_REF, TagType::Byte).set_bytes(&[exif.alt_ref]);
            ifd.add_tag(TAG_ALT, TagType::Rational).set_rationals(&exif.alt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{GPS_IFD, GpsIfdProvider};
    use crate::{
        container::{Container as _, shared},
        containers::tiff::{Endianness, Tiff, tag::TagType},
        error::MetadataError,
        providers::Provider,
        source::Section,
        types::GpsCoords,
        util::logger,
    };

    fn rendered(mut tiff: Tiff) -> Vec<u8> {
        tiff.layout().unwrap();
        let mut out = Vec::new();
        tiff.write(&mut out).unwrap();
        out
    }

    fn with_position() -> Tiff {
        let mut tiff = Tiff::new(Endianness::Big);
        tiff.ifd0_mut().add_tag(0x10E, TagType::Ascii).set_string("kept");
        let ifd = tiff.ensure_ifd(GPS_IFD).unwrap();
        ifd.add_tag(0, TagType::Byte).set_bytes(&[2, 2, 0, 0]);
        ifd.add_tag(1, TagType::Ascii).set_string("N");
        ifd.add_tag(2, TagType::Rational)
            .set_rationals(&[37, 1, 30, 1, 0, 1])
            .unwrap();
        ifd.add_tag(3, TagType::Ascii).set_string("W");
        ifd.add_tag(4, TagType::Rational)
            .set_rationals(&[122, 1, 0, 1, 0, 1])
            .unwrap();
        tiff
    }

    #[test]
    fn reads_a_position() {
        logger();

        let p = GpsIfdProvider::new(shared(with_position()), GPS_IFD).unwrap();
        assert_eq!(p.gps(), GpsCoords::parse("37.5, -122").unwrap());
    }

    #[test]
    fn partial_positions_fail() {
        logger();

        let mut tiff = with_position();
        tiff.ensure_ifd(GPS_IFD).unwrap().delete_tag(3);
        let err = GpsIfdProvider::new(shared(tiff), GPS_IFD).unwrap_err();
        assert!(matches!(err, MetadataError::Encoding(_)));
    }

    #[test]
    fn equivalent_position_is_not_an_edit() {
        logger();

        let bytes = rendered(with_position());
        let tiff = shared(Tiff::read(Section::from_bytes(bytes)).unwrap());
        let mut p = GpsIfdProvider::new(tiff.clone(), GPS_IFD).unwrap();

        // within a hundredth of an arc-second of what's stored
        p.set_gps(&GpsCoords::parse("37.500001, -122.000002").unwrap())
            .unwrap();
        assert!(!tiff.read().dirty());
    }

    #[test]
    fn writes_a_new_ifd() {
        logger();

        let tiff = shared(Tiff::new(Endianness::Little));
        let mut p = GpsIfdProvider::new(tiff.clone(), GPS_IFD).unwrap();
        assert!(p.gps().is_empty());

        let value = GpsCoords::parse("-33.5, 151.25, 10m").unwrap();
        p.set_gps(&value).unwrap();

        let block = tiff.read();
        let ifd = block.ifd(GPS_IFD).unwrap();
        assert_eq!(ifd.tag(0).unwrap().as_bytes().unwrap(), [2, 3, 0, 0]);
        assert_eq!(ifd.tag(1).unwrap().as_string().unwrap(), "S");
        assert_eq!(ifd.tag(3).unwrap().as_string().unwrap(), "E");
        assert_eq!(ifd.tag(5).unwrap().as_bytes().unwrap(), [0]);
        assert_eq!(ifd.tags().len(), 7);
    }

    #[test]
    fn clearing_drops_the_ifd() {
        logger();

        let bytes = rendered(with_position());
        let tiff = shared(Tiff::read(Section::from_bytes(bytes)).unwrap());
        let mut p = GpsIfdProvider::new(tiff.clone(), GPS_IFD).unwrap();
        p.set_gps(&GpsCoords::default()).unwrap();
        assert!(tiff.read().ifd(GPS_IFD).unwrap().is_empty());

        let out = rendered_shared(&tiff);
        let reread = Tiff::read(Section::from_bytes(out)).unwrap();
        assert!(reread.ifd0().tag(0x8825).is_none());
        assert_eq!(reread.ifd0().tag(0x10E).unwrap().as_string().unwrap(), "kept");
    }

    fn rendered_shared(tiff: &crate::container::Shared<Tiff>) -> Vec<u8> {
        let mut block = tiff.write();
        block.layout().unwrap();
        let mut out = Vec::new();
        block.write(&mut out).unwrap();
        out
    }
}
