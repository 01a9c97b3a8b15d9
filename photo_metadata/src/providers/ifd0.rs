//! IFD0 of a TIFF file, or of a JPEG's EXIF block.
//!
//! Both flavors back the caption with `ImageDescription` and the creator with
//! `Artist`. They differ in the details:
//!
//! - In JPEGs, `Artist` is read as a semicolon-separated list (the EXIF
//!   spelling), and `DateTime` (really the modification time) is dropped
//!   whenever the date and time are set.
//! - In TIFFs, `Artist` is a plain string, `DateTime` is only shown, and
//!   `Orientation` lives here.

use crate::{
    container::Shared,
    containers::tiff::{Tiff, ifd::Ifd, tag::TagType},
    error::MetadataError,
    types::{DateTime, Orientation},
};

use super::{Provider, Tags, tag};

const TAG_IMAGE_DESCRIPTION: u16 = 0x10E;
const TAG_ORIENTATION: u16 = 0x112;
const TAG_DATE_TIME: u16 = 0x132;
const TAG_ARTIST: u16 = 0x13B;

/// Which kind of file the IFD0 belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flavor {
    Jpeg,
    Tiff,
}

/// The fields held in IFD0.
#[derive(Debug)]
pub struct Ifd0Provider {
    tiff: Shared<Tiff>,
    flavor: Flavor,
    artist: Vec<String>,
    image_description: String,
    date_time: DateTime,
    orientation: Option<Orientation>,
}

impl Ifd0Provider {
    pub fn new(tiff: Shared<Tiff>, flavor: Flavor) -> Result<Self, MetadataError> {
        let (artist, image_description, date_time, orientation) = {
            let block = tiff.read();
            let ifd = block.ifd0();

            let artist = match (ifd.tag(TAG_ARTIST), flavor) {
                (None, _) => Vec::new(),
                (Some(t), Flavor::Jpeg) => split_artists(&t.as_string()?),
                (Some(t), Flavor::Tiff) => {
                    let artist = t.as_string()?;
                    if artist.is_empty() { Vec::new() } else { vec![artist] }
                }
            };
            let image_description = match ifd.tag(TAG_IMAGE_DESCRIPTION) {
                Some(t) => t.as_string()?,
                None => String::new(),
            };
            let date_time = match ifd.tag(TAG_DATE_TIME) {
                Some(t) => DateTime::parse_exif(&t.as_string()?, "", "").map_err(|e| {
                    log::error!("IFD0 `DateTime` is malformed! err: {e}");
                    MetadataError::from(e)
                })?,
                None => DateTime::default(),
            };
            let orientation = match flavor {
                Flavor::Tiff => read_orientation(ifd)?,
                Flavor::Jpeg => None,
            };
            (artist, image_description, date_time, orientation)
        };

        Ok(Self {
            tiff,
            flavor,
            artist,
            image_description,
            date_time,
            orientation,
        })
    }
}

/// Reads tag `0x112`, which must be a single SHORT in `1..=8`.
pub(crate) fn read_orientation(ifd: &Ifd) -> Result<Option<Orientation>, MetadataError> {
    let Some(t) = ifd.tag(TAG_ORIENTATION) else {
        return Ok(None);
    };
    match t.as_shorts()?.as_slice() {
        &[value] => Ok(Orientation::from_exif(value)?),
        other => {
            log::error!("`Orientation` should hold one value, but holds `{}`!", other.len());
            Err(MetadataError::Encoding(format!(
                "Orientation has `{}` values",
                other.len()
            )))
        }
    }
}

/// Writes (or, for `None`, deletes) tag `0x112`.
pub(crate) fn write_orientation(ifd: &mut Ifd, value: Option<Orientation>) {
    match value {
        Some(o) => ifd.add_tag(TAG_ORIENTATION, TagType::Short).set_short(o.as_exif()),
        None => {
            ifd.delete_tag(TAG_ORIENTATION);
        }
    }
}

/// Splits an EXIF `Artist` value into names.
///
/// Names are separated by semicolons. A name containing a semicolon or a
/// quote is quoted, with its quotes doubled. Quotes don't have to cover the
/// whole name, and a missing closing quote is assumed.
fn split_artists(list: &str) -> Vec<String> {
    let mut artists = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for c in list.chars() {
        match c {
            _ if escape && c != '"' => {
                escape = false;
                in_quotes = false;
                // the quote closed the section, so `c` is plain text
                if c == ';' {
                    push_artist(&mut artists, &mut buf);
                } else {
                    buf.push(c);
                }
            }
            '"' if in_quotes && escape => {
                buf.push('"');
                escape = false;
            }
            '"' if in_quotes => escape = true,
            '"' => in_quotes = true,
            ';' if !in_quotes => push_artist(&mut artists, &mut buf),
            _ => buf.push(c),
        }
    }
    push_artist(&mut artists, &mut buf);
    artists
}

fn push_artist(artists: &mut Vec<String>, buf: &mut String) {
    let artist = buf.trim();
    if !artist.is_empty() {
        artists.push(artist.to_string());
    }
    buf.clear();
}

/// Quotes a single name for an EXIF `Artist` value, when it needs it.
fn quote_artist(artist: &str) -> String {
    if artist.contains(['"', ';']) {
        format!("\"{}\"", artist.replace('"', "\"\""))
    } else {
        artist.to_string()
    }
}

impl Provider for Ifd0Provider {
    fn name(&self) -> &'static str {
        match self.flavor {
            Flavor::Jpeg => "JPEG IFD0",
            Flavor::Tiff => "TIFF IFD0",
        }
    }

    fn caption(&self) -> String {
        self.image_description.clone()
    }

    fn caption_tags(&self) -> Tags<String> {
        vec![tag("IFD0 ImageDescription", self.image_description.clone())]
    }

    fn set_caption(&mut self, value: &str) -> Result<(), MetadataError> {
        let mut block = self.tiff.write();
        if value.is_empty() {
            self.image_description.clear();
            block.ifd0_mut().delete_tag(TAG_IMAGE_DESCRIPTION);
            return Ok(());
        }
        if self.image_description == value {
            return Ok(());
        }

        self.image_description = value.to_string();
        block
            .ifd0_mut()
            .add_tag(TAG_IMAGE_DESCRIPTION, TagType::Ascii)
            .set_string(value);
        Ok(())
    }

    fn creator(&self) -> String {
        self.artist.first().cloned().unwrap_or_default()
    }

    fn creator_tags(&self) -> Tags<String> {
        if self.artist.is_empty() {
            return vec![tag("IFD0 Artist", String::new())];
        }
        self.artist
            .iter()
            .map(|a| tag("IFD0 Artist", a.clone()))
            .collect()
    }

    fn set_creator(&mut self, value: &str) -> Result<(), MetadataError> {
        let mut block = self.tiff.write();
        if value.is_empty() {
            self.artist.clear();
            block.ifd0_mut().delete_tag(TAG_ARTIST);
            return Ok(());
        }
        if self.artist == [value] {
            return Ok(());
        }

        self.artist = vec![value.to_string()];
        let encoded = match self.flavor {
            Flavor::Jpeg => quote_artist(value),
            Flavor::Tiff => value.to_string(),
        };
        block
            .ifd0_mut()
            .add_tag(TAG_ARTIST, TagType::Ascii)
            .set_string(&encoded);
        Ok(())
    }

    fn date_time(&self) -> DateTime {
        match self.flavor {
            Flavor::Jpeg => self.date_time.clone(),
            // shown, but never offered as the photo's date
            Flavor::Tiff => DateTime::default(),
        }
    }

    fn date_time_tags(&self) -> Tags<DateTime> {
        if self.date_time.is_empty() {
            return Vec::new();
        }
        vec![tag("IFD0 DateTime", self.date_time.clone())]
    }

    fn set_date_time(&mut self, _value: &DateTime) -> Result<(), MetadataError> {
        if self.flavor == Flavor::Tiff {
            return Err(MetadataError::NotSupported);
        }

        // a modification time, which no longer says anything useful
        self.date_time = DateTime::default();
        self.tiff.write().ifd0_mut().delete_tag(TAG_DATE_TIME);
        Ok(())
    }

    fn orientation(&self) -> Option<Orientation> {
        self.orientation
    }

    fn orientation_tags(&self) -> Tags<Option<Orientation>> {
        match self.flavor {
            Flavor::Tiff => vec![tag("IFD0 Orientation", self.orientation)],
            Flavor::Jpeg => Vec::new(),
        }
    }

    fn set_orientation(&mut self, value: Option<Orientation>) -> Result<(), MetadataError> {
        if self.flavor == Flavor::Jpeg {
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
