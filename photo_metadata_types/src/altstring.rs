//! Language alternatives.

use alloc::{string::String, vec::Vec};

/// The pseudo-language for the default alternative.
pub const X_DEFAULT: &str = "x-default";

/// One language alternative.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AltItem {
    /// An RFC 3066 language tag, `x-default`, or empty when unknown.
    pub lang: String,
    pub value: String,
}

/// A string with language alternatives. The first item is the default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AltString(pub Vec<AltItem>);

impl AltString {
    /// A single default alternative, or nothing at all if `value` is empty.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            return Self::default();
        }
        Self(alloc::vec![AltItem {
            lang: X_DEFAULT.into(),
            value,
        }])
    }

    /// Whether every alternative is blank.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|item| item.value.is_empty())
    }

    /// The default alternative's text.
    pub fn default_value(&self) -> &str {
        self.0.first().map(|item| item.value.as_str()).unwrap_or_default()
    }

    /// The text for `lang`, if there is one.
    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|item| item.lang == lang)
            .map(|item| item.value.as_str())
    }

    pub fn items(&self) -> &[AltItem] {
        &self.0
    }

    /// Replaces every alternative with a single default one. An empty value
    /// clears everything.
    pub fn set_default(&mut self, value: impl Into<String>) {
        *self = Self::new(value);
    }
}

impl core::fmt::Display for AltString {
    /// Prints the default alternative.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.default_value())
    }
}

impl From<&str> for AltString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AltString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::{AltItem, AltString};

    #[test]
    fn default_is_first() {
        let alt = AltString(vec![
            AltItem {
                lang: "x-default".into(),
                value: "Hello".into(),
            },
            AltItem {
                lang: "fr".into(),
                value: "Bonjour".into(),
            },
        ]);
        assert_eq!(alt.default_value(), "Hello");
        assert_eq!(alt.get("fr"), Some("Bonjour"));
        assert_eq!(alt.get("de"), None);
        assert!(!alt.is_empty());

        assert!(AltString::new("").is_empty());
        assert_eq!(AltString::new("").items().len(), 0);
        assert_eq!(AltString::default().default_value(), "");
    }
}
