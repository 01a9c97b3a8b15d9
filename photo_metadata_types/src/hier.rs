//! Hierarchical keywords.

use alloc::{
    string::{String, ToString},
    vec::Vec,
};
use core::str::FromStr;

use crate::ValueError;

/// A path of labels, like `["Places", "USA", "California"]`.
///
/// Each tag family joins the path differently (`/` for digiKam, `|` for
/// Lightroom), so the separator isn't part of the value.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HierValue(pub Vec<String>);

impl HierValue {
    /// Parses a `/`-separated path. Blank input gives an empty value.
    ///
    /// ```
    /// use photo_metadata_types::HierValue;
    ///
    /// let hv = HierValue::parse(" Places/USA /California").unwrap();
    /// assert_eq!(hv.to_string(), "Places / USA / California");
    /// ```
    pub fn parse(s: &str) -> Result<Self, ValueError> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }

        s.split('/')
            .map(|word| {
                let word = word.trim();
                if word.is_empty() || word.contains('|') {
                    Err(ValueError::HierValue)
                } else {
                    Ok(word.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Builds a value from its labels.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The labels, in order.
    pub fn labels(&self) -> &[String] {
        &self.0
    }

    /// Joins the labels with `sep`, with no surrounding spaces.
    pub fn join(&self, sep: &str) -> String {
        self.0.join(sep)
    }

    /// Splits a joined path without any validation beyond dropping empty
    /// labels.
    pub fn split(s: &str, sep: char) -> Self {
        Self(
            s.split(sep)
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(ToString::to_string)
                .collect(),
        )
    }

    /// Prepends `prefix` to the path.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        let mut labels = Vec::with_capacity(self.0.len() + 1);
        labels.push(prefix.to_string());
        labels.extend(self.0.iter().cloned());
        Self(labels)
    }

    /// The path without its first label, if that label is `prefix`.
    pub fn strip_prefix(&self, prefix: &str) -> Option<Self> {
        match self.0.split_first() {
            Some((first, rest)) if first == prefix => Some(Self(rest.to_vec())),
            _ => None,
        }
    }
}

impl core::fmt::Display for HierValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0.join(" / "))
    }
}

impl FromStr for HierValue {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::HierValue;

    #[test]
    fn parse_rejects_bad_labels() {
        assert!(HierValue::parse("  ").unwrap().is_empty());
        assert!(HierValue::parse("a//b").is_err());
        assert!(HierValue::parse("a/b|c").is_err());
        assert_eq!(HierValue::parse("solo").unwrap().len(), 1);
    }

    #[test]
    fn prefixes() {
        let hv = HierValue::from_labels(["People", "Alice"]);
        assert_eq!(hv.join("|"), "People|Alice");
        assert_eq!(hv.strip_prefix("People"), Some(HierValue::from_labels(["Alice"])));
        assert_eq!(hv.strip_prefix("Places"), None);
        assert_eq!(
            HierValue::from_labels(["Alice"]).with_prefix("People"),
            hv
        );
        assert_eq!(HierValue::split("People/ Alice /", '/'), hv);
    }
}
