//! Dates and times, as the various metadata standards spell them.
//!
//! XMP uses an ISO 8601 flavor (`2023-04-05T06:07:08.09-07:00`). EXIF splits
//! the same thing across three tags (`2023:04:05 06:07:08`, `09`, `-07:00`).
//! IPTC uses two datasets (`20230405`, `060708-0700`).

use alloc::{
    format,
    string::{String, ToString},
};
use core::str::FromStr;

use crate::ValueError;

/// A calendar date and time of day, with optional fractional seconds and an
/// optional UTC offset.
///
/// A default `DateTime` is "empty": it has no value at all.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DateTime {
    /// `YYYY-MM-DD`, or empty.
    date: String,

    /// `HH:MM:SS`.
    time: String,

    /// Zero or more digits.
    subsec: String,

    /// Empty, `Z`, or `±HH:MM`.
    zone: String,
}

impl DateTime {
    /// Whether there's no value here.
    pub fn is_empty(&self) -> bool {
        self.date.is_empty()
    }

    /// The date, as `YYYY-MM-DD`.
    pub fn date(&self) -> &str {
        &self.date
    }

    /// The time of day, as `HH:MM:SS`.
    pub fn time(&self) -> &str {
        &self.time
    }

    /// Fractional seconds, as a string of digits.
    pub fn subsec(&self) -> &str {
        &self.subsec
    }

    /// The UTC offset: empty when unknown, `Z` for UTC, or `±HH:MM`.
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Parses the XMP (ISO 8601-ish) form.
    ///
    /// An empty string gives an empty value. A few layouts that aren't
    /// strictly legal (no seconds) are accepted since they show up in real
    /// files.
    ///
    /// ```
    /// use photo_metadata_types::DateTime;
    ///
    /// let dt = DateTime::parse("2023-04-05T06:07:08.09-07:00").unwrap();
    /// assert_eq!(dt.date(), "2023-04-05");
    /// assert_eq!(dt.subsec(), "09");
    /// assert_eq!(dt.zone(), "-07:00");
    /// ```
    pub fn parse(s: &str) -> Result<Self, ValueError> {
        let mut dt = DateTime::default();
        if s.is_empty() {
            return Ok(dt);
        }

        // date only
        if s.len() == 10 && is_date(s) {
            dt.date = s.into();
            dt.time = "00:00:00".into();
            return Ok(dt);
        }

        if s.len() < 16 || !s.is_char_boundary(10) || !is_date(&s[..10]) || &s[10..11] != "T" {
            return Err(ValueError::DateTime);
        }
        dt.date = s[..10].into();
        let mut rest = &s[11..];

        let z = rest.ends_with('Z');
        if z {
            dt.zone = "Z".into();
            rest = &rest[..rest.len() - 1];
        }

        // split off any `±HH:MM` offset
        if !z && rest.len() > 6 {
            let (head, tail) = rest.split_at(rest.len() - 6);
            if is_zone(tail) {
                dt.zone = normalize_zone(tail);
                rest = head;
            }
        }

        // HH:MM:SS[.sss] or HH:MM
        if rest.len() >= 8 && is_time(&rest[..8]) {
            dt.time = rest[..8].into();
            let frac = &rest[8..];
            if let Some(digits) = frac.strip_prefix('.') {
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ValueError::DateTime);
                }
                dt.subsec = digits.into();
            } else if !frac.is_empty() {
                return Err(ValueError::DateTime);
            }
            return Ok(dt);
        }
        if rest.len() == 5 && is_time(&format!("{rest}:00")) {
            dt.time = format!("{rest}:00");
            return Ok(dt);
        }

        Err(ValueError::DateTime)
    }

    /// Parses the EXIF triplet: `YYYY:MM:DD HH:MM:SS`, sub-second digits,
    /// and a `±HH:MM` offset.
    ///
    /// Blank and all-zero dates (which cameras write when their clock isn't
    /// set) give an empty value.
    pub fn parse_exif(datetime: &str, subsec: &str, offset: &str) -> Result<Self, ValueError> {
        let mut dt = DateTime::default();
        if datetime.is_empty()
            || datetime.trim() == ":  :     :  :"
            || datetime == "0000:00:00 00:00:00"
        {
            if !subsec.is_empty() || !offset.is_empty() {
                return Err(ValueError::DateTime);
            }
            return Ok(dt);
        }

        let b = datetime.as_bytes();
        if b.len() != 19 || b[4] != b':' || b[7] != b':' || b[10] != b' ' {
            return Err(ValueError::DateTime);
        }
        let date = format!("{}-{}-{}", &datetime[..4], &datetime[5..7], &datetime[8..10]);
        if !is_date(&date) || !is_time(&datetime[11..19]) {
            return Err(ValueError::DateTime);
        }
        dt.date = date;
        dt.time = datetime[11..19].into();

        if !subsec.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValueError::DateTime);
        }
        dt.subsec = subsec.into();

        if !offset.is_empty() {
            if !is_zone(offset) {
                return Err(ValueError::DateTime);
            }
            dt.zone = normalize_zone(offset);
        }
        Ok(dt)
    }

    /// Renders the EXIF triplet. Empty values give three empty strings.
    pub fn as_exif(&self) -> (String, String, String) {
        if self.is_empty() {
            return (String::new(), String::new(), String::new());
        }
        let datetime = format!("{} {}", self.date.replace('-', ":"), self.time);
        let offset = match self.zone.as_str() {
            "Z" => "+00:00".into(),
            other => other.into(),
        };
        (datetime, self.subsec.clone(), offset)
    }

    /// Parses the IPTC pair: `YYYYMMDD` and `HHMMSS` or `HHMMSS±HHMM`.
    pub fn parse_iptc(date: &str, time: &str) -> Result<Self, ValueError> {
        let mut dt = DateTime::default();
        if date.is_empty() || date == "00000000" {
            return Ok(dt);
        }
        if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValueError::DateTime);
        }
        let iso = format!("{}-{}-{}", &date[..4], &date[4..6], &date[6..8]);
        if !is_date(&iso) {
            return Err(ValueError::DateTime);
        }
        dt.date = iso;

        if time.is_empty() {
            dt.time = "00:00:00".into();
            return Ok(dt);
        }
        if time.len() < 6 || !time.is_char_boundary(6) || !time[..6].bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ValueError::DateTime);
        }
        let hms = format!("{}:{}:{}", &time[..2], &time[2..4], &time[4..6]);
        if !is_time(&hms) {
            return Err(ValueError::DateTime);
        }
        dt.time = hms;

        match &time[6..] {
            "" => (),
            zone if zone.len() == 5 => {
                let with_colon = format!("{}:{}", &zone[..3], &zone[3..]);
                if !is_zone(&with_colon) {
                    return Err(ValueError::DateTime);
                }
                dt.zone = normalize_zone(&with_colon);
            }
            _ => return Err(ValueError::DateTime),
        }
        Ok(dt)
    }

    /// Renders the IPTC pair. Empty values give two empty strings.
    pub fn as_iptc(&self) -> (String, String) {
        if self.is_empty() {
            return (String::new(), String::new());
        }
        let date = self.date.replace('-', "");
        let time = match self.zone.as_str() {
            "" => self.time.replace(':', ""),
            "Z" => format!("{}+0000", self.time.replace(':', "")),
            zone => format!("{}{}", self.time, zone).replace(':', ""),
        };
        (date, time)
    }

    /// Whether two values agree to the precision of the less precise one.
    ///
    /// Fractional seconds only count when both sides have them.
    pub fn equivalent(&self, other: &DateTime) -> bool {
        if self.is_empty() || other.is_empty() {
            return self.is_empty() == other.is_empty();
        }
        self.date == other.date
            && self.time == other.time
            && self.zone == other.zone
            && (self.subsec == other.subsec || self.subsec.is_empty() || other.subsec.is_empty())
    }
}

impl core::fmt::Display for DateTime {
    /// Prints the XMP form, or nothing for an empty value.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        write!(f, "{}T{}", self.date, self.time)?;
        if !self.subsec.is_empty() {
            write!(f, ".{}", self.subsec)?;
        }
        f.write_str(&self.zone)
    }
}

impl FromStr for DateTime {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// `+00:00` and `-00:00` both mean UTC.
fn normalize_zone(zone: &str) -> String {
    match zone {
        "+00:00" | "-00:00" => "Z".into(),
        other => other.to_string(),
    }
}

/// Reads `len` ASCII digits as a number.
fn digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// `YYYY-MM-DD`, with a real day of a real month.
fn is_date(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != 10 || b[4] != b'-' || b[7] != b'-' {
        return false;
    }
    let (Some(year), Some(month), Some(day)) = (digits(&s[..4]), digits(&s[5..7]), digits(&s[8..10]))
    else {
        return false;
    };
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => return false,
    };
    (1..=days).contains(&day)
}

/// `HH:MM:SS`.
fn is_time(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != 8 || b[2] != b':' || b[5] != b':' {
        return false;
    }
    matches!(
        (digits(&s[..2]), digits(&s[3..5]), digits(&s[6..8])),
        (Some(h), Some(m), Some(sec)) if h < 24 && m < 60 && sec < 60
    )
}

/// `±HH:MM`.
fn is_zone(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != 6 || !(b[0] == b'+' || b[0] == b'-') || b[3] != b':' {
        return false;
    }
    matches!(
        (digits(&s[1..3]), digits(&s[4..6])),
        (Some(h), Some(m)) if h < 24 && m < 60
    )
}
