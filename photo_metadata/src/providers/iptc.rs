//! IPTC IIM datasets, from a PSIR resource or a TIFF tag.
//!
//! Only UTF-8 blocks are accepted, and any string written marks the block as
//! UTF-8. Values longer than a dataset allows are cut short, and a cut value
//! counts as equal to the uncut one when deciding whether anything changed.

use rustc_hash::FxHashSet;

use crate::{
    container::Shared,
    containers::iim::Iim,
    error::MetadataError,
    types::{AltString, DateTime, HierValue, Location},
};

use super::{Provider, Tags, tag, truncate};

const ID_CODED_CHARACTER_SET: u16 = 0x015A;
const ID_OBJECT_NAME: u16 = 0x0205;
const ID_KEYWORD: u16 = 0x0219;
const ID_DATE_CREATED: u16 = 0x0237;
const ID_TIME_CREATED: u16 = 0x023C;
const ID_DIGITAL_CREATION_DATE: u16 = 0x023E;
const ID_DIGITAL_CREATION_TIME: u16 = 0x023F;
const ID_BYLINE: u16 = 0x0250;
const ID_CITY: u16 = 0x025A;
const ID_SUBLOCATION: u16 = 0x025C;
const ID_PROVINCE_STATE: u16 = 0x025F;
const ID_COUNTRY_CODE: u16 = 0x0264;
const ID_COUNTRY_NAME: u16 = 0x0265;
const ID_CAPTION: u16 = 0x0278;

const MAX_OBJECT_NAME: usize = 64;
const MAX_KEYWORD: usize = 64;
const MAX_BYLINE: usize = 32;
const MAX_CITY: usize = 32;
const MAX_SUBLOCATION: usize = 32;
const MAX_PROVINCE_STATE: usize = 32;
const MAX_COUNTRY_CODE: usize = 3;
const MAX_COUNTRY_NAME: usize = 64;
const MAX_CAPTION: usize = 2000;

/// The escape sequence we write to declare UTF-8.
const UTF8_ESCAPE: &[u8] = &[0x1B, 0x25, 0x47];

/// Another spelling of the same, accepted on read.
const UTF8_ESCAPE_ALT: &[u8] = &[0x1B, 0x25, 0x2F, 0x49];

#[derive(Debug)]
pub struct IptcProvider {
    iim: Shared<Iim>,

    bylines: Vec<String>,
    caption: String,
    city: String,
    country_code: String,
    country_name: String,
    created: DateTime,
    digital_created: DateTime,
    keywords: Vec<String>,
    object_name: String,
    province_state: String,
    sublocation: String,
}

impl IptcProvider {
    pub fn new(iim: Shared<Iim>) -> Result<Self, MetadataError> {
        let block = iim.read();
        check_character_set(&block)?;

        let created = read_date_time(&block, ID_DATE_CREATED, ID_TIME_CREATED, "Date/Time Created")?;
        let digital_created = read_date_time(
            &block,
            ID_DIGITAL_CREATION_DATE,
            ID_DIGITAL_CREATION_TIME,
            "Digital Creation Date/Time",
        )?;

        let p = Self {
            bylines: block.datasets(ID_BYLINE).iter().map(|b| decode(b)).collect(),
            caption: single(&block, ID_CAPTION, "Caption/Abstract")?,
            city: single(&block, ID_CITY, "City")?,
            country_code: single(&block, ID_COUNTRY_CODE, "Country/Primary Location Code")?,
            country_name: single(&block, ID_COUNTRY_NAME, "Country/Primary Location Name")?,
            created,
            digital_created,
            keywords: block.datasets(ID_KEYWORD).iter().map(|b| decode(b)).collect(),
            object_name: single(&block, ID_OBJECT_NAME, "Object Name")?,
            province_state: single(&block, ID_PROVINCE_STATE, "Province/State")?,
            sublocation: single(&block, ID_SUBLOCATION, "Sublocation")?,
            iim: iim.clone(),
        };
        drop(block);

        Ok(p)
    }
}

/// Writes (or clears) a single-valued string dataset, keeping `current` in
/// step.
fn set_single(iim: &Shared<Iim>, id: u16, max: usize, current: &mut String, value: &str) {
    let mut block = iim.write();
    if value.is_empty() {
        current.clear();
        block.remove_datasets(id);
        return;
    }

    let value = truncate(value, max);
    if current == value {
        return;
    }
    *current = value.to_string();
    block.set_dataset(id, value.as_bytes().to_vec());
    mark_utf8(&mut block);
}

fn check_character_set(block: &Iim) -> Result<(), MetadataError> {
    match block.datasets(ID_CODED_CHARACTER_SET) {
        [] => Ok(()),
        [set] if set == UTF8_ESCAPE || set == UTF8_ESCAPE_ALT => Ok(()),
        [set] => {
            log::error!("IPTC block isn't UTF-8! Coded Character Set: `{set:x?}`");
            Err(MetadataError::Encoding(
                "Coded Character Set: not UTF-8".into(),
            ))
        }
        _ => {
            log::error!("IPTC block has more than one Coded Character Set!");
            Err(MetadataError::Encoding(
                "Coded Character Set: multiple data sets".into(),
            ))
        }
    }
}

fn mark_utf8(block: &mut Iim) {
    if block.datasets(ID_CODED_CHARACTER_SET) != [UTF8_ESCAPE] {
        block.set_dataset(ID_CODED_CHARACTER_SET, UTF8_ESCAPE.to_vec());
    }
}

/// UTF-8, or failing that, Latin-1.
fn decode(body: &[u8]) -> String {
    match core::str::from_utf8(body) {
        Ok(s) => s.to_string(),
        Err(_) => body.iter().map(|&b| char::from(b)).collect(),
    }
}

/// A dataset that may appear at most once.
fn single(block: &Iim, id: u16, what: &str) -> Result<String, MetadataError> {
    match block.datasets(id) {
        [] => Ok(String::new()),
        [body] => Ok(decode(body)),
        _ => {
            log::error!("IPTC `{what}` appears more than once!");
            Err(MetadataError::Encoding(format!("{what}: multiple data sets")))
        }
    }
}

fn read_date_time(
    block: &Iim,
    date_id: u16,
    time_id: u16,
    what: &str,
) -> Result<DateTime, MetadataError> {
    let date = single(block, date_id, what)?;
    let time = if date.is_empty() {
        String::new()
    } else {
        single(block, time_id, what)?
    };

    DateTime::parse_iptc(&date, &time).map_err(|e| {
        log::error!("IPTC `{what}` is malformed! err: {e}");
        MetadataError::Encoding(format!("{what}: {e}"))
    })
}

impl Provider for IptcProvider {
    fn name(&self) -> &'static str {
        "IPTC"
    }

    fn caption(&self) -> String {
        self.caption.clone()
    }

    fn caption_tags(&self) -> Tags<String> {
        vec![tag("IPTC Caption/Abstract", self.caption.clone())]
    }

    fn set_caption(&mut self, value: &str) -> Result<(), MetadataError> {
        set_single(&self.iim, ID_CAPTION, MAX_CAPTION, &mut self.caption, value);
        Ok(())
    }

    fn creator(&self) -> String {
        self.bylines.first().cloned().unwrap_or_default()
    }

    fn creator_tags(&self) -> Tags<String> {
        if self.bylines.is_empty() {
            return vec![tag("IPTC By-line", String::new())];
        }
        self.bylines
            .iter()
            .map(|b| tag("IPTC By-line", b.clone()))
            .collect()
    }

    fn set_creator(&mut self, value: &str) -> Result<(), MetadataError> {
        let mut block = self.iim.write();
        if value.is_empty() {
            self.bylines.clear();
            block.remove_datasets(ID_BYLINE);
            return Ok(());
        }

        let value = truncate(value, MAX_BYLINE);
        if self.bylines == [value] {
            return Ok(());
        }
        self.bylines = vec![value.to_string()];
        block.set_dataset(ID_BYLINE, value.as_bytes().to_vec());
        mark_utf8(&mut block);
        Ok(())
    }

    fn date_time(&self) -> DateTime {
        if self.created.is_empty() {
            self.digital_created.clone()
        } else {
            self.created.clone()
        }
    }

    fn date_time_tags(&self) -> Tags<DateTime> {
        let mut tags = vec![tag("IPTC Date/Time Created", self.created.clone())];
        if !self.digital_created.is_empty() {
            tags.push(tag(
                "IPTC Digital Creation Date/Time",
                self.digital_created.clone(),
            ));
        }
        tags
    }

    fn set_date_time(&mut self, value: &DateTime) -> Result<(), MetadataError> {
        let mut block = self.iim.write();
        self.digital_created = DateTime::default();
        block.remove_datasets(ID_DIGITAL_CREATION_DATE);
        block.remove_datasets(ID_DIGITAL_CREATION_TIME);

        if value.is_empty() {
            self.created = DateTime::default();
            block.remove_datasets(ID_DATE_CREATED);
            block.remove_datasets(ID_TIME_CREATED);
            return Ok(());
        }
        if value.equivalent(&self.created) {
            return Ok(());
        }

        self.created = value.clone();
        let (date, time) = value.as_iptc();
        block.set_dataset(ID_DATE_CREATED, date.into_bytes());
        block.set_dataset(ID_TIME_CREATED, time.into_bytes());
        Ok(())
    }

    fn keywords(&self) -> Vec<HierValue> {
        self.keywords
            .iter()
            .map(|k| HierValue::from_labels([k.as_str()]))
            .collect()
    }

    fn keywords_tags(&self) -> Tags<Vec<HierValue>> {
        self.keywords
            .iter()
            .map(|k| tag("IPTC Keyword", vec![HierValue::from_labels([k.as_str()])]))
            .collect()
    }

    /// Stores the leaf of each value. Order doesn't count as a change.
    fn set_keywords(&mut self, values: &[HierValue]) -> Result<(), MetadataError> {
        let mut block = self.iim.write();
        if values.is_empty() {
            self.keywords.clear();
            block.remove_datasets(ID_KEYWORD);
            return Ok(());
        }

        let mut seen = FxHashSet::default();
        let keywords: Vec<String> = values
            .iter()
            .filter_map(HierValue::last)
            .map(|k| truncate(k, MAX_KEYWORD).to_string())
            .filter(|k| seen.insert(k.clone()))
            .collect();

        if keywords.is_empty() {
            self.keywords.clear();
            block.remove_datasets(ID_KEYWORD);
            return Ok(());
        }

        let old: FxHashSet<&String> = self.keywords.iter().collect();
        if old.len() == seen.len() && keywords.iter().all(|k| old.contains(k)) {
            return Ok(());
        }

        block.set_datasets(
            ID_KEYWORD,
            keywords.iter().map(|k| k.as_bytes().to_vec()).collect(),
        );
        mark_utf8(&mut block);
        self.keywords = keywords;
        Ok(())
    }

    fn location(&self) -> Location {
        Location {
            country_code: self.country_code.clone(),
            country_name: AltString::new(self.country_name.as_str()),
            state: AltString::new(self.province_state.as_str()),
            city: AltString::new(self.city.as_str()),
            sublocation: AltString::new(self.sublocation.as_str()),
        }
    }

    fn location_tags(&self) -> Tags<Location> {
        vec![tag("IPTC (location tags)", self.location())]
    }

    fn set_location(&mut self, value: &Location) -> Result<(), MetadataError> {
        let fields = [
            (ID_COUNTRY_CODE, MAX_COUNTRY_CODE, &mut self.country_code, value.country_code.as_str()),
            (ID_COUNTRY_NAME, MAX_COUNTRY_NAME, &mut self.country_name, value.country_name.default_value()),
            (ID_PROVINCE_STATE, MAX_PROVINCE_STATE, &mut self.province_state, value.state.default_value()),
            (ID_CITY, MAX_CITY, &mut self.city, value.city.default_value()),
            (ID_SUBLOCATION, MAX_SUBLOCATION, &mut self.sublocation, value.sublocation.default_value()),
        ];
        for (id, max, current, text) in fields {
            set_single(&self.iim, id, max, current, text);
        }
        Ok(())
    }

    fn title(&self) -> String {
        self.object_name.clone()
    }

    fn title_tags(&self) -> Tags<String> {
        if self.object_name.is_empty() {
            return Vec::new();
        }
        vec![tag("IPTC Object Name", self.object_name.clone())]
    }

    fn set_title(&mut self, value: &str) -> Result<(), MetadataError> {
        set_single(&self.iim, ID_OBJECT_NAME, MAX_OBJECT_NAME, &mut self.object_name, value);
        Ok(())
    }
}
