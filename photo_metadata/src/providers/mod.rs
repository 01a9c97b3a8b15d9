//! # Providers
//!
//! A provider projects one container (or one IFD of one) onto the semantic
//! fields: caption, creator, title, date and time, GPS coordinates,
//! orientation, location, and the keyword family (keywords, groups, people,
//! places, and topics), plus face regions.
//!
//! Each field has three methods on [`Provider`]:
//!
//! - a getter (`caption`), which gives the field's value as this provider
//!   sees it, or an empty value;
//! - a tag lister (`caption_tags`), which gives each backing tag's label and
//!   contents, for display;
//! - a setter (`set_caption`), which writes every tag this provider backs
//!   the field with.
//!
//! Setters a provider doesn't implement return
//! [`MetadataError::NotSupported`]. The [`multi::MultiProvider`] fans each
//! call out over the providers of one file and merges the answers.
//!
//! Providers read their tags once, when they're built, so a malformed tag
//! fails the open rather than a later getter.

use crate::{
    error::MetadataError,
    types::{DateTime, GpsCoords, HierValue, Location, Orientation},
};

pub mod exif_ifd;
pub mod gps_ifd;
pub mod ifd0;
pub mod iptc;
pub mod multi;
pub mod xmp;
pub mod xmp_ext;

/// Labelled tag contents, as returned by the `*_tags` methods.
pub type Tags<T> = Vec<(String, T)>;

/// A view of metadata in terms of semantic fields.
pub trait Provider: Send + Sync + core::fmt::Debug {
    /// A short name, for logs and debugging.
    fn name(&self) -> &'static str;

    fn caption(&self) -> String {
        String::new()
    }
    fn caption_tags(&self) -> Tags<String> {
        Vec::new()
    }
    /// Sets the caption. An empty string clears it.
    fn set_caption(&mut self, _value: &str) -> Result<(), MetadataError> {
        Err(MetadataError::NotSupported)
    }

    fn creator(&self) -> String {
        String::new()
    }
    fn creator_tags(&self) -> Tags<String> {
        Vec::new()
    }
    /// Sets the creator. An empty string clears it.
    fn set_creator(&mut self, _value: &str) -> Result<(), MetadataError> {
        Err(MetadataError::NotSupported)
    }

    fn date_time(&self) -> DateTime {
        DateTime::default()
    }
    fn date_time_tags(&self) -> Tags<DateTime> {
        Vec::new()
    }
    /// Sets the date and time the photo was taken. An empty value clears it.
    fn set_date_time(&mut self, _value: &DateTime) -> Result<(), MetadataError> {
        Err(MetadataError::NotSupported)
    }

    /// The names of the people whose faces are marked in the image, sorted.
    fn faces(&self) -> Vec<String> {
        Vec::new()
    }
    fn faces_tags(&self) -> Tags<Vec<String>> {
        Vec::new()
    }
    /// Removes every face region whose name isn't in `values`.
    ///
    /// Face regions can't be added, so a name without a region is an
    /// [`MetadataError::Unsupported`] error.
    fn set_faces(&mut self, _values: &[String]) -> Result<(), MetadataError> {
        Err(MetadataError::NotSupported)
    }

    fn gps(&self) -> GpsCoords {
        GpsCoords::default()
    }
    fn gps_tags(&self) -> Tags<GpsCoords> {
        Vec::new()
    }
    /// Sets the GPS position. An empty value clears it.
    fn set_gps(&mut self, _value: &GpsCoords) -> Result<(), MetadataError> {
        Err(MetadataError::NotSupported)
    }

    fn groups(&self) -> Vec<HierValue> {
        Vec::new()
    }
    fn groups_tags(&self) -> Tags<Vec<HierValue>> {
        Vec::new()
    }
    fn set_groups(&mut self, _values: &[HierValue]) -> Result<(), MetadataError> {
        Err(MetadataError::NotSupported)
    }

    fn keywords(&self) -> Vec<HierValue> {
        Vec::new()
    }
    fn keywords_tags(&self) -> Tags<Vec<HierValue>> {
        Vec::new()
    }
    fn set_keywords(&mut self, _values: &[HierValue]) -> Result<(), MetadataError> {
        Err(MetadataError::NotSupported)
    }

    fn location(&self) -> Location {
        Location::default()
    }
    fn location_tags(&self) -> Tags<Location> {
        Vec::new()
    }
    /// Sets where the photo was taken. An empty value clears it.
    fn set_location(&mut self, _value: &Location) -> Result<(), MetadataError> {
        Err(MetadataError::NotSupported)
    }

    /// The orientation, or `None` when unset.
    fn orientation(&self) -> Option<Orientation> {
        None
    }
    fn orientation_tags(&self) -> Tags<Option<Orientation>> {
        Vec::new()
    }
    /// Sets the orientation. `None` clears it.
    fn set_orientation(&mut self, _value: Option<Orientation>) -> Result<(), MetadataError> {
        Err(MetadataError::NotSupported)
    }

    fn people(&self) -> Vec<String> {
        Vec::new()
    }
    fn people_tags(&self) -> Tags<Vec<String>> {
        Vec::new()
    }
    /// Sets the people in the photo. Face regions for anyone left out are
    /// removed.
    fn set_people(&mut self, _values: &[String]) -> Result<(), MetadataError> {
        Err(MetadataError::NotSupported)
    }

    fn places(&self) -> Vec<HierValue> {
        Vec::new()
    }
    fn places_tags(&self) -> Tags<Vec<HierValue>> {
        Vec::new()
    }
    fn set_places(&mut self, _values: &[HierValue]) -> Result<(), MetadataError> {
        Err(MetadataError::NotSupported)
    }

    fn title(&self) -> String {
        String::new()
    }
    fn title_tags(&self) -> Tags<String> {
        Vec::new()
    }
    /// Sets the title. An empty string clears it.
    fn set_title(&mut self, _value: &str) -> Result<(), MetadataError> {
        Err(MetadataError::NotSupported)
    }

    fn topics(&self) -> Vec<HierValue> {
        Vec::new()
    }
    fn topics_tags(&self) -> Tags<Vec<HierValue>> {
        Vec::new()
    }
    fn set_topics(&mut self, _values: &[HierValue]) -> Result<(), MetadataError> {
        Err(MetadataError::NotSupported)
    }
}

/// Labels a value for a `*_tags` list.
pub(crate) fn tag<T>(label: &str, value: T) -> (String, T) {
    (label.to_string(), value)
}

/// Truncates `s` to at most `max` bytes, without splitting a character.
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncation_keeps_characters_whole() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        // `é` is two bytes
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("héllo", 3), "hé");
    }
}
