//! XMP properties, from a JPEG's APP1 packet, a TIFF's `XMP` tag, or a
//! sidecar file.
//!
//! Besides its own properties, an XMP packet often mirrors EXIF, TIFF, and
//! Photoshop fields (`exif:UserComment`, `tiff:Artist`,
//! `photoshop:DateCreated`, and so on). Those are read as fallbacks, and
//! writing a field clears them, so each field ends up with one home in the
//! packet.

use rustc_hash::FxHashSet;

use crate::{
    container::Shared,
    containers::rdf::{
        Packet,
        value::{Name, Value},
    },
    error::MetadataError,
    types::{AltString, DateTime, GpsCoords, HierValue, Location, Orientation, XmpGps},
};

use self::{
    keywords::{
        ROOT_GROUPS, ROOT_PEOPLE, ROOT_PLACES, ROOT_TOPICS, below_root, hierarchical_subject_name,
        is_group, is_other, is_person, is_place, is_topic, subject_name, tags_below_root,
        tags_list_name,
    },
    regions::{MICROSOFT, MWG},
    values::{alt_tags, get_alt, get_date_time, get_string, get_strings, label, make_seq, set_alt},
};

use super::{Provider, Tags, tag};

mod keywords;
mod location;
mod regions;
mod values;

pub const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
pub const NS_DIGIKAM: &str = "http://www.digikam.org/ns/1.0/";
pub const NS_EXIF: &str = "http://ns.adobe.com/exif/1.0/";
pub const NS_IPTC: &str = "http://iptc.org/std/Iptc4xmpExt/2008-02-29/";
pub const NS_LR: &str = "http://ns.adobe.com/lightroom/1.0/";
pub const NS_MP: &str = "http://ns.microsoft.com/photo/1.2/";
pub const NS_MPRI: &str = "http://ns.microsoft.com/photo/1.2/t/RegionInfo#";
pub const NS_MPREG: &str = "http://ns.microsoft.com/photo/1.2/t/Region#";
pub const NS_MWGRS: &str = "http://www.metadataworkinggroup.com/schemas/regions/";
pub const NS_PS: &str = "http://ns.adobe.com/photoshop/1.0/";
pub const NS_TIFF: &str = "http://ns.adobe.com/tiff/1.0/";
pub const NS_XMP: &str = "http://ns.adobe.com/xap/1.0/";

/// Every namespace this provider manages, with the prefix it writes it
/// with.
pub const NAMESPACES: &[(&str, &str)] = &[
    ("dc", NS_DC),
    ("digiKam", NS_DIGIKAM),
    ("exif", NS_EXIF),
    ("Iptc4xmpExt", NS_IPTC),
    ("lr", NS_LR),
    ("MP", NS_MP),
    ("MPRI", NS_MPRI),
    ("MPReg", NS_MPREG),
    ("mwg-rs", NS_MWGRS),
    ("photoshop", NS_PS),
    ("tiff", NS_TIFF),
    ("xmp", NS_XMP),
];

/// Date and time properties, most trusted first. Only the first is ever
/// written.
const DATE_TIMES: [(&str, &str); 7] = [
    (NS_XMP, "CreateDate"),
    (NS_PS, "DateCreated"),
    (NS_EXIF, "DateTimeOriginal"),
    (NS_XMP, "ModifyDate"),
    (NS_XMP, "MetadataDate"),
    (NS_TIFF, "DateTime"),
    (NS_EXIF, "DateTimeDigitized"),
];

/// `exif:` properties holding the position, in [`XmpGps`] field order.
const GPS: [&str; 4] = ["GPSLatitude", "GPSLongitude", "GPSAltitudeRef", "GPSAltitude"];

fn creator_name() -> Name {
    Name::new(NS_DC, "creator")
}

fn artist_name() -> Name {
    Name::new(NS_TIFF, "Artist")
}

fn description_name() -> Name {
    Name::new(NS_DC, "description")
}

fn image_description_name() -> Name {
    Name::new(NS_TIFF, "ImageDescription")
}

fn user_comment_name() -> Name {
    Name::new(NS_EXIF, "UserComment")
}

fn title_name() -> Name {
    Name::new(NS_DC, "title")
}

fn orientation_name() -> Name {
    Name::new(NS_TIFF, "Orientation")
}

#[derive(Debug)]
pub struct XmpProvider {
    rdf: Shared<Packet>,

    creator: Vec<String>,
    artist: Vec<String>,
    description: AltString,
    image_description: AltString,
    user_comment: AltString,
    title: AltString,
    /// Parallel to [`DATE_TIMES`].
    date_times: [DateTime; 7],
    gps: GpsCoords,
    orientation: Option<Orientation>,
    location_created: Location,
    locations_shown: Vec<Location>,
    tags_list: Vec<HierValue>,
    hierarchical_subject: Vec<HierValue>,
    subject: Vec<String>,
    microsoft_faces: Vec<String>,
    mwg_faces: Vec<String>,
}

impl XmpProvider {
    /// Reads the fields out of `rdf`, registering our namespace prefixes
    /// along the way.
    pub fn new(rdf: Shared<Packet>) -> Result<Self, MetadataError> {
        let mut packet = rdf.write();
        for &(prefix, namespace) in NAMESPACES {
            packet.register_namespace(prefix, namespace);
        }

        let mut date_times: [DateTime; 7] = Default::default();
        for (slot, (namespace, name)) in date_times.iter_mut().zip(DATE_TIMES) {
            *slot = get_date_time(&packet, &Name::new(namespace, name))?;
        }

        let location_created = match packet.property(&location::created_name()) {
            Some(value) => location::read(value, &location::created_name())?,
            None => Location::default(),
        };
        let locations_shown = match packet.property(&location::shown_name()) {
            Some(value) => location::read_shown(value)?,
            None => Vec::new(),
        };

        let split = |list: Vec<String>, sep: char| -> Vec<HierValue> {
            list.iter().map(|kw| HierValue::split(kw, sep)).collect()
        };

        let p = Self {
            creator: get_strings(&packet, &creator_name())?,
            artist: get_strings(&packet, &artist_name())?,
            description: get_alt(&packet, &description_name())?,
            image_description: get_alt(&packet, &image_description_name())?,
            user_comment: get_alt(&packet, &user_comment_name())?,
            title: get_alt(&packet, &title_name())?,
            date_times,
            gps: read_gps(&packet)?,
            orientation: read_orientation(&packet)?,
            location_created,
            locations_shown,
            tags_list: split(get_strings(&packet, &tags_list_name())?, '/'),
            hierarchical_subject: split(get_strings(&packet, &hierarchical_subject_name())?, '|'),
            subject: get_strings(&packet, &subject_name())?,
            microsoft_faces: MICROSOFT.read(&packet)?,
            mwg_faces: MWG.read(&packet)?,
            rdf: rdf.clone(),
        };
        drop(packet);

        Ok(p)
    }

    /// Replaces the keywords under `root` with `values`, which don't include
    /// the root label.
    fn set_under_root(&mut self, pred: keywords::Predicate, root: &str, values: &[HierValue]) {
        let kws: Vec<HierValue> = values
            .iter()
            .filter(|v| !v.is_empty())
            .map(|v| v.with_prefix(root))
            .collect();
        self.set_filtered_keywords(pred, &kws);
    }
}

fn read_gps(packet: &Packet) -> Result<GpsCoords, MetadataError> {
    let [lat, long, alt_ref, alt] = GPS.map(|field| get_string(packet, &Name::new(NS_EXIF, field)));
    let xmp = XmpGps {
        lat: lat?,
        long: long?,
        alt_ref: alt_ref?,
        alt: alt?,
    };

    GpsCoords::parse_xmp(&xmp).map_err(|e| {
        log::error!("XMP `exif:GPS*` properties don't make a position! value: `{xmp:?}`, err: {e}");
        MetadataError::Encoding(format!("exif:GPS*: {e}"))
    })
}

fn read_orientation(packet: &Packet) -> Result<Option<Orientation>, MetadataError> {
    let text = get_string(packet, &orientation_name())?;
    if text.is_empty() {
        return Ok(None);
    }

    let invalid = |detail: String| {
        log::error!("XMP `tiff:Orientation` is invalid! value: `{text}`, err: {detail}");
        MetadataError::Encoding(format!("tiff:Orientation: {detail}"))
    };
    let number = text
        .trim()
        .parse::<u16>()
        .map_err(|e| invalid(e.to_string()))?;
    Orientation::from_exif(number).map_err(|e| invalid(e.to_string()))
}

impl Provider for XmpProvider {
    fn name(&self) -> &'static str {
        "XMP"
    }

    fn caption(&self) -> String {
        [&self.description, &self.user_comment, &self.image_description]
            .into_iter()
            .map(AltString::default_value)
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string()
    }

    fn caption_tags(&self) -> Tags<String> {
        let mut tags = Vec::new();
        alt_tags(&mut tags, &label(&description_name()), &self.description, true);
        alt_tags(&mut tags, &label(&image_description_name()), &self.image_description, true);
        alt_tags(&mut tags, &label(&user_comment_name()), &self.user_comment, false);
        tags
    }

    fn set_caption(&mut self, value: &str) -> Result<(), MetadataError> {
        let mut packet = self.rdf.write();
        self.user_comment = AltString::default();
        packet.remove_property(&user_comment_name());

        set_alt(&mut packet, description_name(), &mut self.description, value);
        set_alt(&mut packet, image_description_name(), &mut self.image_description, value);
        Ok(())
    }

    fn creator(&self) -> String {
        self.creator
            .first()
            .or(self.artist.first())
            .cloned()
            .unwrap_or_default()
    }

    fn creator_tags(&self) -> Tags<String> {
        let mut tags = vec![tag(&label(&creator_name()), self.creator.join("; "))];
        if !self.artist.is_empty() {
            tags.push(tag(&label(&artist_name()), self.artist.join("; ")));
        }
        tags
    }

    fn set_creator(&mut self, value: &str) -> Result<(), MetadataError> {
        let mut packet = self.rdf.write();
        self.artist.clear();
        packet.remove_property(&artist_name());

        if value.is_empty() {
            self.creator.clear();
            packet.remove_property(&creator_name());
            return Ok(());
        }
        if self.creator == [value] {
            return Ok(());
        }

        self.creator = vec![value.to_string()];
        packet.set_property(creator_name(), make_seq(&self.creator));
        Ok(())
    }

    fn date_time(&self) -> DateTime {
        self.date_times
            .iter()
            .find(|dt| !dt.is_empty())
            .cloned()
            .unwrap_or_default()
    }

    fn date_time_tags(&self) -> Tags<DateTime> {
        DATE_TIMES
            .iter()
            .zip(&self.date_times)
            .enumerate()
            .filter(|(i, (_, dt))| *i == 0 || !dt.is_empty())
            .map(|(_, (&(namespace, name), dt))| tag(&label(&Name::new(namespace, name)), dt.clone()))
            .collect()
    }

    fn set_date_time(&mut self, value: &DateTime) -> Result<(), MetadataError> {
        let mut packet = self.rdf.write();
        for (&(namespace, name), slot) in DATE_TIMES.iter().zip(&mut self.date_times).skip(1) {
            *slot = DateTime::default();
            packet.remove_property(&Name::new(namespace, name));
        }

        let (namespace, name) = DATE_TIMES[0];
        let create_date = Name::new(namespace, name);
        if value.is_empty() {
            self.date_times[0] = DateTime::default();
            packet.remove_property(&create_date);
            return Ok(());
        }
        if value.equivalent(&self.date_times[0]) {
            return Ok(());
        }

        self.date_times[0] = value.clone();
        packet.set_property(create_date, Value::string(value.to_string()));
        Ok(())
    }

    fn faces(&self) -> Vec<String> {
        let mut faces: Vec<String> = self
            .microsoft_faces
            .iter()
            .chain(&self.mwg_faces)
            .cloned()
            .collect();
        faces.sort();
        faces.dedup();
        faces
    }

    fn faces_tags(&self) -> Tags<Vec<String>> {
        let mut tags = Vec::new();
        if !self.microsoft_faces.is_empty() {
            tags.push(tag("XMP  MP:Regions", self.microsoft_faces.clone()));
        }
        if !self.mwg_faces.is_empty() {
            tags.push(tag("XMP  mwg-rs:RegionInfo", self.mwg_faces.clone()));
        }
        tags
    }

    fn set_faces(&mut self, values: &[String]) -> Result<(), MetadataError> {
        let mut found = FxHashSet::default();
        let mut packet = self.rdf.write();
        self.microsoft_faces = MICROSOFT.prune(&mut packet, values, &mut found);
        self.mwg_faces = MWG.prune(&mut packet, values, &mut found);
        drop(packet);

        if let Some(missing) = values.iter().find(|v| !found.contains(*v)) {
            log::error!("There's no face region for `{missing}`, and we can't add one!");
            return Err(MetadataError::Unsupported("cannot add face regions".into()));
        }
        Ok(())
    }

    fn gps(&self) -> GpsCoords {
        self.gps
    }

    fn gps_tags(&self) -> Tags<GpsCoords> {
        vec![tag("XMP  exif:GPS*", self.gps)]
    }

    fn set_gps(&mut self, value: &GpsCoords) -> Result<(), MetadataError> {
        let mut packet = self.rdf.write();
        if value.is_empty() {
            self.gps = GpsCoords::default();
            for field in GPS {
                packet.remove_property(&Name::new(NS_EXIF, field));
            }
            return Ok(());
        }
        if value.equivalent(&self.gps) {
            return Ok(());
        }

        self.gps = *value;
        let xmp = value.as_xmp();
        for (field, text) in GPS.into_iter().zip([xmp.lat, xmp.long, xmp.alt_ref, xmp.alt]) {
            let name = Name::new(NS_EXIF, field);
            if text.is_empty() {
                packet.remove_property(&name);
            } else {
                packet.set_property(name, Value::string(text));
            }
        }
        Ok(())
    }

    fn groups(&self) -> Vec<HierValue> {
        self.filtered_keywords(is_group).iter().map(below_root).collect()
    }

    fn groups_tags(&self) -> Tags<Vec<HierValue>> {
        tags_below_root(self.filtered_keywords_tags(is_group), ROOT_GROUPS)
    }

    fn set_groups(&mut self, values: &[HierValue]) -> Result<(), MetadataError> {
        self.set_under_root(is_group, ROOT_GROUPS, values);
        Ok(())
    }

    fn keywords(&self) -> Vec<HierValue> {
        self.filtered_keywords(is_other)
    }

    fn keywords_tags(&self) -> Tags<Vec<HierValue>> {
        self.filtered_keywords_tags(is_other)
    }

    fn set_keywords(&mut self, values: &[HierValue]) -> Result<(), MetadataError> {
        let values: Vec<HierValue> = values.iter().filter(|v| !v.is_empty()).cloned().collect();
        self.set_filtered_keywords(is_other, &values);
        Ok(())
    }

    fn location(&self) -> Location {
        if !self.location_created.is_empty() {
            return self.location_created.clone();
        }
        self.locations_shown.first().cloned().unwrap_or_default()
    }

    fn location_tags(&self) -> Tags<Location> {
        let mut tags = vec![tag(
            &label(&location::created_name()),
            self.location_created.clone(),
        )];
        let shown = label(&location::shown_name());
        tags.extend(
            self.locations_shown
                .iter()
                .map(|location| tag(&shown, location.clone())),
        );
        tags
    }

    fn set_location(&mut self, value: &Location) -> Result<(), MetadataError> {
        let mut packet = self.rdf.write();
        self.locations_shown.clear();
        packet.remove_property(&location::shown_name());

        if value.is_empty() {
            self.location_created = Location::default();
            packet.remove_property(&location::created_name());
            return Ok(());
        }
        if *value == self.location_created {
            return Ok(());
        }

        self.location_created = value.clone();
        packet.set_property(location::created_name(), location::make(value));
        Ok(())
    }

    fn orientation(&self) -> Option<Orientation> {
        self.orientation
    }

    fn orientation_tags(&self) -> Tags<Option<Orientation>> {
        let shown = self.orientation.filter(|o| *o != Orientation::Rotate0);
        vec![tag(&label(&orientation_name()), shown)]
    }

    fn set_orientation(&mut self, value: Option<Orientation>) -> Result<(), MetadataError> {
        let mut packet = self.rdf.write();
        match value {
            None | Some(Orientation::Rotate0) => {
                self.orientation = None;
                packet.remove_property(&orientation_name());
            }
            Some(orientation) => {
                self.orientation = value;
                packet.set_property(
                    orientation_name(),
                    Value::string(orientation.as_exif().to_string()),
                );
            }
        }
        Ok(())
    }

    fn people(&self) -> Vec<String> {
        let mut people: Vec<String> = self
            .filtered_keywords(is_person)
            .iter()
            .filter_map(HierValue::last)
            .map(ToString::to_string)
            .collect();
        for face in self.microsoft_faces.iter().chain(&self.mwg_faces) {
            if !people.contains(face) {
                people.push(face.clone());
            }
        }
        people
    }

    fn people_tags(&self) -> Tags<Vec<String>> {
        self.filtered_keywords_tags(is_person)
            .into_iter()
            .map(|(label, kws)| {
                let names = kws
                    .iter()
                    .filter_map(HierValue::last)
                    .map(ToString::to_string)
                    .collect();
                (format!("{label}:{ROOT_PEOPLE}/"), names)
            })
            .collect()
    }

    /// Face regions are kept only for the people still named.
    fn set_people(&mut self, values: &[String]) -> Result<(), MetadataError> {
        let faces = self.faces();
        let mut kept_faces: Vec<String> = Vec::new();
        let mut kws = Vec::new();
        for name in values.iter().filter(|v| !v.is_empty()) {
            kws.push(HierValue::from_labels([ROOT_PEOPLE, name.as_str()]));
            if faces.contains(name) && !kept_faces.contains(name) {
                kept_faces.push(name.clone());
            }
        }

        self.set_filtered_keywords(is_person, &kws);
        self.set_faces(&kept_faces)
    }

    fn places(&self) -> Vec<HierValue> {
        self.filtered_keywords(is_place).iter().map(below_root).collect()
    }

    fn places_tags(&self) -> Tags<Vec<HierValue>> {
        tags_below_root(self.filtered_keywords_tags(is_place), ROOT_PLACES)
    }

    /// Also clears the location, unless one of the places spells it out.
    fn set_places(&mut self, values: &[HierValue]) -> Result<(), MetadataError> {
        self.set_under_root(is_place, ROOT_PLACES, values);

        let current = self.location();
        let parts = location::parts(&current);
        if parts.is_empty() || values.iter().any(|place| location::congruent(&parts, place)) {
            return Ok(());
        }
        log::debug!("No place matches the location `{current}`, so it's being cleared.");
        self.set_location(&Location::default())
    }

    fn title(&self) -> String {
        self.title.default_value().to_string()
    }

    fn title_tags(&self) -> Tags<String> {
        let mut tags = Vec::new();
        alt_tags(&mut tags, &label(&title_name()), &self.title, true);
        tags
    }

    fn set_title(&mut self, value: &str) -> Result<(), MetadataError> {
        let mut packet = self.rdf.write();
        set_alt(&mut packet, title_name(), &mut self.title, value);
        Ok(())
    }

    fn topics(&self) -> Vec<HierValue> {
        self.filtered_keywords(is_topic).iter().map(below_root).collect()
    }

    fn topics_tags(&self) -> Tags<Vec<HierValue>> {
        tags_below_root(self.filtered_keywords_tags(is_topic), ROOT_TOPICS)
    }

    fn set_topics(&mut self, values: &[HierValue]) -> Result<(), MetadataError> {
        self.set_under_root(is_topic, ROOT_TOPICS, values);
        Ok(())
    }
}
