//! Textual place descriptions.

use alloc::string::String;

use crate::AltString;

/// Where a photo was taken (or what it shows), in words.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Location {
    /// ISO 3166 code, usually three letters.
    pub country_code: String,
    pub country_name: AltString,
    pub state: AltString,
    pub city: AltString,
    pub sublocation: AltString,
}

impl Location {
    /// Whether every component is blank.
    pub fn is_empty(&self) -> bool {
        self.country_code.is_empty()
            && self.country_name.is_empty()
            && self.state.is_empty()
            && self.city.is_empty()
            && self.sublocation.is_empty()
    }
}

impl core::fmt::Display for Location {
    /// Prints the non-blank components from most to least specific.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let parts = [
            self.sublocation.default_value(),
            self.city.default_value(),
            self.state.default_value(),
            self.country_name.default_value(),
            self.country_code.as_str(),
        ];
        let mut first = true;
        for part in parts.into_iter().filter(|p| !p.is_empty()) {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(part)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::Location;
    use crate::AltString;

    #[test]
    fn empty_and_display() {
        assert!(Location::default().is_empty());

        let loc = Location {
            country_code: "USA".into(),
            city: AltString::new("Cupertino"),
            state: AltString::new("California"),
            ..Default::default()
        };
        assert!(!loc.is_empty());
        assert_eq!(loc.to_string(), "Cupertino, California, USA");
    }
}
