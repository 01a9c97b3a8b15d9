//! `Iptc4xmpExt:LocationCreated` and `Iptc4xmpExt:LocationShown`.

use crate::{
    containers::rdf::value::{Name, Simple, Struct, Value},
    error::MetadataError,
    types::{AltString, HierValue, Location},
};

use super::{
    NS_IPTC,
    values::{alt_from, make_alt, wrong_type},
};

pub(super) fn created_name() -> Name {
    Name::new(NS_IPTC, "LocationCreated")
}

pub(super) fn shown_name() -> Name {
    Name::new(NS_IPTC, "LocationShown")
}

const COUNTRY_CODE: &str = "CountryCode";
const COUNTRY_NAME: &str = "CountryName";
const PROVINCE_STATE: &str = "ProvinceState";
const CITY: &str = "City";
const SUBLOCATION: &str = "Sublocation";

fn alt_field(fields: &Struct, field: &str) -> Result<AltString, MetadataError> {
    let name = Name::new(NS_IPTC, field);
    match fields.get(&name) {
        Some(value) => alt_from(value).ok_or_else(|| wrong_type(&name)),
        None => Ok(AltString::default()),
    }
}

/// Reads one location struct. `what` names it in errors.
pub(super) fn read(value: &Value, what: &Name) -> Result<Location, MetadataError> {
    let fields = value.as_struct().ok_or_else(|| wrong_type(what))?;

    let code = Name::new(NS_IPTC, COUNTRY_CODE);
    let country_code = match fields.get(&code) {
        Some(value) => value.as_str().ok_or_else(|| wrong_type(&code))?.to_string(),
        None => String::new(),
    };

    Ok(Location {
        country_code,
        country_name: alt_field(fields, COUNTRY_NAME)?,
        state: alt_field(fields, PROVINCE_STATE)?,
        city: alt_field(fields, CITY)?,
        sublocation: alt_field(fields, SUBLOCATION)?,
    })
}

/// Reads `LocationShown`, an ordered list of locations.
pub(super) fn read_shown(value: &Value) -> Result<Vec<Location>, MetadataError> {
    let name = shown_name();
    let Simple::Seq(ref items) = value.value else {
        return Err(wrong_type(&name));
    };
    items.iter().map(|item| read(item, &name)).collect()
}

/// A location struct, leaving out blank fields.
pub(super) fn make(location: &Location) -> Value {
    let mut fields = Struct::default();
    if !location.country_code.is_empty() {
        fields.insert(
            Name::new(NS_IPTC, COUNTRY_CODE),
            Value::string(&location.country_code),
        );
    }
    for (field, alt) in [
        (COUNTRY_NAME, &location.country_name),
        (PROVINCE_STATE, &location.state),
        (CITY, &location.city),
        (SUBLOCATION, &location.sublocation),
    ] {
        if !alt.is_empty() {
            fields.insert(Name::new(NS_IPTC, field), make_alt(alt));
        }
    }
    Value::new(Simple::Struct(fields))
}

/// The location's default names, from the country down, skipping blanks.
pub(super) fn parts(location: &Location) -> Vec<&str> {
    [
        &location.country_name,
        &location.state,
        &location.city,
        &location.sublocation,
    ]
    .into_iter()
    .map(AltString::default_value)
    .filter(|part| !part.is_empty())
    .collect()
}

/// Whether `place` names every part of the location, in order, with perhaps
/// other labels in between.
pub(super) fn congruent(parts: &[&str], place: &HierValue) -> bool {
    let mut parts = parts.iter().peekable();
    for label in place.labels() {
        if parts.peek().is_some_and(|part| **part == label.as_str()) {
            parts.next();
        }
    }
    parts.peek().is_none()
}

#[cfg(test)]
mod tests {
    use super::{congruent, make, parts, read};
    use crate::{
        types::{AltString, HierValue, Location},
        util::logger,
    };

    fn usa() -> Location {
        Location {
            country_code: "USA".into(),
            country_name: AltString::new("United States"),
            state: AltString::new("California"),
            city: AltString::new("Sunnyvale"),
            ..Default::default()
        }
    }

    #[test]
    fn structs_leave_out_blanks() {
        logger();

        let value = make(&usa());
        assert_eq!(value.as_struct().unwrap().len(), 4);
        assert_eq!(read(&value, &super::created_name()).unwrap(), usa());
    }

    #[test]
    fn places_match_locations_in_order() {
        logger();

        let location = usa();
        let parts = parts(&location);
        assert_eq!(parts, ["United States", "California", "Sunnyvale"]);

        let place = |p: &str| HierValue::split(p, '/');
        assert!(congruent(
            &parts,
            &place("United States/California/Santa Clara County/Sunnyvale/Murphy Park")
        ));
        assert!(!congruent(
            &parts,
            &place("United States/Sunnyvale/California")
        ));
        assert!(!congruent(&parts, &place("California/Sunnyvale")));
    }
}
