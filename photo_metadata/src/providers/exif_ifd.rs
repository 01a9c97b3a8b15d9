//! The EXIF sub-IFD, reached from IFD0 through tag `0x8769`.
//!
//! It backs the caption with `UserComment` (which is only ever cleared, since
//! the other caption tags say the same thing in a friendlier encoding) and
//! the date and time with the `DateTimeOriginal` and `DateTimeDigitized`
//! groups.
//!
//! In JPEGs this provider also owns the `Orientation` tag of IFD0.

use crate::{
    container::Shared,
    containers::tiff::{Endianness, IfdStep, Tiff, ifd::Ifd, tag::TagType},
    error::MetadataError,
    types::{DateTime, Orientation},
};

use super::{
    Provider, Tags,
    ifd0::{read_orientation, write_orientation},
    tag,
};

/// Where the EXIF IFD hangs off IFD0.
pub const EXIF_IFD: &[IfdStep] = &[IfdStep::Tag(0x8769)];

const TAG_OFFSET_TIME: u16 = 0x9010;
const TAG_USER_COMMENT: u16 = 0x9286;
const TAG_SUBSEC_TIME: u16 = 0x9290;

/// The tags of one date and time group.
struct DateTimeGroup {
    date_time: u16,
    subsec: u16,
    offset: u16,
    what: &'static str,
}

const ORIGINAL: DateTimeGroup = DateTimeGroup {
    date_time: 0x9003,
    subsec: 0x9291,
    offset: 0x9011,
    what: "Original",
};

const DIGITIZED: DateTimeGroup = DateTimeGroup {
    date_time: 0x9004,
    subsec: 0x9292,
    offset: 0x9012,
    what: "Digitized",
};

const CHARSET_ASCII: &[u8; 8] = b"ASCII\0\0\0";
const CHARSET_UNICODE: &[u8; 8] = b"UNICODE\0";
const CHARSET_UNDEFINED: &[u8; 8] = &[0; 8];

#[derive(Debug)]
pub struct ExifIfdProvider {
    tiff: Shared<Tiff>,
    path: &'static [IfdStep],

    /// Whether IFD0's `Orientation` is ours to manage.
    with_orientation: bool,

    user_comment: String,
    original: DateTime,
    digitized: DateTime,
    orientation: Option<Orientation>,
}

impl ExifIfdProvider {
    /// Reads the EXIF IFD at `path`, which may not exist yet.
    pub fn new(
        tiff: Shared<Tiff>,
        path: &'static [IfdStep],
        with_orientation: bool,
    ) -> Result<Self, MetadataError> {
        let mut p = Self {
            tiff,
            path,
            with_orientation,
            user_comment: String::new(),
            original: DateTime::default(),
            digitized: DateTime::default(),
            orientation: None,
        };

        let mut block = p.tiff.write();
        let order = block.order();
        if with_orientation {
            p.orientation = read_orientation(block.ifd0())?;
        }
        if let Some(ifd) = block.ifd_mut(path)? {
            p.user_comment = read_user_comment(ifd, order)?;
            p.original = read_date_time(ifd, &ORIGINAL)?;
            p.digitized = read_date_time(ifd, &DIGITIZED)?;
        }
        drop(block);

        Ok(p)
    }

    /// Runs `f` on the EXIF IFD, if there is one.
    fn edit(&self, f: impl FnOnce(&mut Ifd)) -> Result<(), MetadataError> {
        let mut block = self.tiff.write();
        if let Some(ifd) = block.ifd_mut(self.path)? {
            f(ifd);
        }
        Ok(())
    }
}

fn read_user_comment(ifd: &Ifd, order: Endianness) -> Result<String, MetadataError> {
    let Some(t) = ifd.tag(TAG_USER_COMMENT) else {
        return Ok(String::new());
    };
    let data = t.as_unknown()?;
    let Some((charset, text)) = data.split_first_chunk::<8>() else {
        log::error!("`UserComment` is too short to hold a character set: `{}`", data.len());
        return Err(MetadataError::Encoding("UserComment: wrong length".into()));
    };

    let comment = match charset {
        CHARSET_ASCII => String::from_utf8_lossy(text).into_owned(),
        CHARSET_UNICODE => decode_utf16(text, order).ok_or_else(|| {
            log::error!("`UserComment` isn't valid UTF-16!");
            MetadataError::Encoding("UserComment: invalid UTF-16".into())
        })?,
        // often UTF-8 in practice
        CHARSET_UNDEFINED => String::from_utf8(text.to_vec()).map_err(|_| {
            log::error!("`UserComment` has an undefined character set, and isn't UTF-8!");
            MetadataError::Encoding("UserComment: unknown character set".into())
        })?,
        other => {
            log::error!("`UserComment` has an unknown character set: `{other:?}`");
            return Err(MetadataError::Encoding(
                "UserComment: unknown character set".into(),
            ));
        }
    };

    // comments are often padded with NULs, or made of nothing else
    Ok(comment.trim_end_matches('\0').to_string())
}

/// Decodes UTF-16 in `order`, unless a byte order mark says otherwise.
fn decode_utf16(data: &[u8], order: Endianness) -> Option<String> {
    if data.len() % 2 != 0 {
        return None;
    }
    let (order, data) = match data {
        [0xFE, 0xFF, rest @ ..] => (Endianness::Big, rest),
        [0xFF, 0xFE, rest @ ..] => (Endianness::Little, rest),
        _ => (order, data),
    };

    let units = data.chunks_exact(2).map(|c| order.u16([c[0], c[1]]));
    char::decode_utf16(units).collect::<Result<String, _>>().ok()
}

fn read_date_time(ifd: &Ifd, group: &DateTimeGroup) -> Result<DateTime, MetadataError> {
    let Some(t) = ifd.tag(group.date_time) else {
        return Ok(DateTime::default());
    };
    let date_time = t.as_string()?;
    let subsec = match ifd.tag(group.subsec) {
        Some(t) => t.as_string()?,
        None => String::new(),
    };
    let offset = match ifd.tag(group.offset) {
        Some(t) => t.as_string()?,
        None => String::new(),
    };

    DateTime::parse_exif(&date_time, &subsec, &offset).map_err(|e| {
        log::error!("EXIF `DateTime{}` is malformed! err: {e}", group.what);
        MetadataError::Encoding(format!("DateTime{}: {e}", group.what))
    })
}

fn delete_group(ifd: &mut Ifd, group: &DateTimeGroup) {
    ifd.delete_tag(group.date_time);
    ifd.delete_tag(group.subsec);
    ifd.delete_tag(group.offset);
}

impl Provider for ExifIfdProvider {
    fn name(&self) -> &'static str {
        "EXIF IFD"
    }

    fn caption(&self) -> String {
        self.user_comment.clone()
    }

    fn caption_tags(&self) -> Tags<String> {
        if self.user_comment.is_empty() {
            return Vec::new();
        }
        vec![tag("EXIF UserComment", self.user_comment.clone())]
    }

    /// Only ever clears `UserComment`. The caption is kept elsewhere.
    fn set_caption(&mut self, _value: &str) -> Result<(), MetadataError> {
        self.user_comment.clear();
        self.edit(|ifd| {
            ifd.delete_tag(TAG_USER_COMMENT);
        })
    }

    fn date_time(&self) -> DateTime {
        if self.original.is_empty() {
            self.digitized.clone()
        } else {
            self.original.clone()
        }
    }

    fn date_time_tags(&self) -> Tags<DateTime> {
        let mut tags = vec![tag("EXIF DateTimeOriginal*", self.original.clone())];
        if !self.digitized.is_empty() {
            tags.push(tag("EXIF DateTimeDigitized*", self.digitized.clone()));
        }
        tags
    }

    fn set_date_time(&mut self, value: &DateTime) -> Result<(), MetadataError> {
        self.digitized = DateTime::default();
        self.edit(|ifd| {
            ifd.delete_tag(TAG_SUBSEC_TIME);
            ifd.delete_tag(TAG_OFFSET_TIME);
            delete_group(ifd, &DIGITIZED);
        })?;

        if value.is_empty() {
            self.original = DateTime::default();
            return self.edit(|ifd| delete_group(ifd, &ORIGINAL));
        }
        if value.equivalent(&self.original) {
            return Ok(());
        }

        self.original = value.clone();
        let (date_time, subsec, offset) = value.as_exif();
        let mut block = self.tiff.write();
        let ifd = block.ensure_ifd(self.path)?;
        ifd.add_tag(ORIGINAL.date_time, TagType::Ascii)
            .set_string(&date_time);
        for (id, text) in [(ORIGINAL.subsec, subsec), (ORIGINAL.offset, offset)] {
            if text.is_empty() {
                ifd.delete_tag(id);
            } else {
                ifd.add_tag(id, TagType::Ascii)
                    .set_string(&text);
            }
        }
        Ok(())
    }

    fn orientation(&self) -> Option<Orientation> {
        self.orientation
    }

    fn orientation_tags(&self) -> Tags<Option<Orientation>> {
        match self.orientation {
            Some(o) if o != Orientation::Rotate0 => vec![tag("EXIF Orientation", Some(o))],
            _ => Vec::new(),
        }
    }

    fn set_orientation(&mut self, value: Option<Orientation>) -> Result<(), MetadataError> {
        if !self.with_orientation {
            return Err(MetadataError::NotSupported);
        }
        if self.orientation == value {
            return Ok(());
        }

        self.orientation = value;
        write_orientation(self.tiff.write().ifd0_mut(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{EXIF_IFD, ExifIfdProvider, decode_utf16};
    use crate::{
        container::{Container as _, shared},
        containers::tiff::{Endianness, Tiff, tag::TagType},
        error::MetadataError,
        providers::Provider,
        source::Section,
        types::{DateTime, Orientation},
        util::logger,
    };

    fn comment(body: &[u8]) -> Tiff {
        let mut tiff = Tiff::new(Endianness::Little);
        tiff.ensure_ifd(EXIF_IFD)
            .unwrap()
            .add_tag(0x9286, TagType::Undefined)
            .set_unknown(body);
        tiff
    }

    fn rendered(mut tiff: Tiff) -> Tiff {
        tiff.layout().unwrap();
        let mut out = Vec::new();
        tiff.write(&mut out).unwrap();
        Tiff::read(Section::from_bytes(out)).unwrap()
    }

    #[test]
    fn user_comment_charsets() {
        logger();

        let read = |body: &[u8]| {
            ExifIfdProvider::new(shared(comment(body)), EXIF_IFD, false).map(|p| p.caption())
        };

        assert_eq!(read(b"ASCII\0\0\0Hello\0\0\0").unwrap(), "Hello");
        assert_eq!(read(b"\0\0\0\0\0\0\0\0caf\xc3\xa9").unwrap(), "café");
        assert_eq!(read(b"UNICODE\0h\0i\0").unwrap(), "hi");
        // a byte order mark overrides the block's order
        assert_eq!(read(b"UNICODE\0\xfe\xff\0h\0i").unwrap(), "hi");
        assert_eq!(read(b"\0\0\0\0\0\0\0\0").unwrap(), "");

        assert!(matches!(read(b"ASCII"), Err(MetadataError::Encoding(_))));
        assert!(matches!(read(b"JIS\0\0\0\0\0abc"), Err(MetadataError::Encoding(_))));
        assert!(matches!(read(b"\0\0\0\0\0\0\0\0\xff"), Err(MetadataError::Encoding(_))));
    }

    #[test]
    fn utf16_rejects_lone_surrogates() {
        logger();

        assert_eq!(decode_utf16(&[0x00, 0xD8], Endianness::Little), None);
        assert_eq!(decode_utf16(&[0x41], Endianness::Little), None);
        assert_eq!(decode_utf16(&[0x41, 0x00], Endianness::Little).unwrap(), "A");
    }

    #[test]
    fn caption_only_clears() {
        logger();

        let tiff = shared(comment(b"ASCII\0\0\0Hello"));
        let mut p = ExifIfdProvider::new(tiff.clone(), EXIF_IFD, false).unwrap();
        assert_eq!(p.caption_tags().len(), 1);

        p.set_caption("Something else").unwrap();
        assert_eq!(p.caption(), "");
        assert!(tiff.read().ifd(EXIF_IFD).unwrap().tag(0x9286).is_none());
    }

    #[test]
    fn date_time_groups() {
        logger();

        let mut tiff = Tiff::new(Endianness::Big);
        let ifd = tiff.ensure_ifd(EXIF_IFD).unwrap();
        ifd.add_tag(0x9004, TagType::Ascii).set_string("2020:01:02 03:04:05");
        ifd.add_tag(0x9290, TagType::Ascii).set_string("12");
        let tiff = shared(tiff);

        let mut p = ExifIfdProvider::new(tiff.clone(), EXIF_IFD, false).unwrap();
        assert_eq!(p.date_time().date(), "2020-01-02");
        assert_eq!(p.date_time_tags().len(), 2);

        let value = DateTime::parse("2021-06-07T08:09:10.5-07:00").unwrap();
        p.set_date_time(&value).unwrap();
        assert_eq!(p.date_time(), value);

        let block = tiff.read();
        let ifd = block.ifd(EXIF_IFD).unwrap();
        assert!(ifd.tag(0x9004).is_none());
        assert!(ifd.tag(0x9290).is_none());
        assert_eq!(ifd.tag(0x9003).unwrap().as_string().unwrap(), "2021:06:07 08:09:10");
        assert_eq!(ifd.tag(0x9291).unwrap().as_string().unwrap(), "5");
        assert_eq!(ifd.tag(0x9011).unwrap().as_string().unwrap(), "-07:00");
        drop(block);

        p.set_date_time(&DateTime::default()).unwrap();
        assert!(tiff.read().ifd(EXIF_IFD).unwrap().tags().is_empty());
    }

    #[test]
    fn equivalent_date_is_not_an_edit() {
        logger();

        let mut tiff = Tiff::new(Endianness::Little);
        tiff.ensure_ifd(EXIF_IFD)
            .unwrap()
            .add_tag(0x9003, TagType::Ascii)
            .set_string("2021:06:07 08:09:10");
        let tiff = shared(rendered(tiff));

        let mut p = ExifIfdProvider::new(tiff.clone(), EXIF_IFD, false).unwrap();
        p.set_date_time(&DateTime::parse("2021-06-07T08:09:10.25").unwrap())
            .unwrap();
        assert!(!tiff.read().dirty());
    }

    #[test]
    fn missing_ifd_is_created_only_on_writes() {
        logger();

        let tiff = shared(Tiff::new(Endianness::Little));
        let mut p = ExifIfdProvider::new(tiff.clone(), EXIF_IFD, true).unwrap();
        p.set_caption("").unwrap();
        p.set_date_time(&DateTime::default()).unwrap();
        assert!(!tiff.read().dirty());
        assert!(tiff.read().ifd0().tag(0x8769).is_none());

        p.set_orientation(Some(Orientation::FlipXY)).unwrap();
        assert_eq!(tiff.read().ifd0().tag(0x112).unwrap().as_shorts().unwrap(), [3]);
        assert_eq!(p.orientation_tags().len(), 1);
    }

    #[test]
    fn orientation_belongs_to_jpegs_only() {
        logger();

        let tiff = shared(Tiff::new(Endianness::Little));
        let mut p = ExifIfdProvider::new(tiff, EXIF_IFD, false).unwrap();
        assert!(p.set_orientation(None).unwrap_err().is_not_supported());
    }
}
