//! Conversions between RDF values and the shapes the XMP provider works in.

use crate::{
    containers::rdf::{
        NS_XML, Packet,
        value::{Name, Simple, Value},
    },
    error::MetadataError,
    types::{AltItem, AltString, DateTime},
};

use super::NAMESPACES;

/// `prefix:name`, for messages and tag labels.
pub(super) fn qualified(name: &Name) -> String {
    match NAMESPACES.iter().find(|(_, ns)| *ns == name.namespace) {
        Some((prefix, _)) => format!("{prefix}:{}", name.name),
        None => name.to_string(),
    }
}

/// The label `*_tags` lists use for a property.
pub(super) fn label(name: &Name) -> String {
    format!("XMP  {}", qualified(name))
}

pub(super) fn wrong_type(name: &Name) -> MetadataError {
    let name = qualified(name);
    log::error!("XMP property `{name}` has the wrong data type!");
    MetadataError::Encoding(format!("{name}: wrong data type"))
}

/// A language alternative of strings.
pub(super) fn alt_from(value: &Value) -> Option<AltString> {
    let Simple::Alt(ref items) = value.value else {
        return None;
    };

    items
        .iter()
        .map(|item| {
            let lang = match item.qualifiers.get(&Name::new(NS_XML, "lang")) {
                Some(lang) => lang.as_str()?.to_string(),
                None => String::new(),
            };
            Some(AltItem {
                lang,
                value: item.as_str()?.to_string(),
            })
        })
        .collect::<Option<Vec<_>>>()
        .map(AltString)
}

/// A string, or a `Seq` or `Bag` of them.
pub(super) fn strings_from(value: &Value) -> Option<Vec<String>> {
    match value.value {
        Simple::String(ref s) | Simple::Uri(ref s) => Some(vec![s.clone()]),
        Simple::Seq(ref items) | Simple::Bag(ref items) => items
            .iter()
            .map(|item| item.as_str().map(ToString::to_string))
            .collect(),
        _ => None,
    }
}

pub(super) fn get_alt(packet: &Packet, name: &Name) -> Result<AltString, MetadataError> {
    match packet.property(name) {
        Some(value) => alt_from(value).ok_or_else(|| wrong_type(name)),
        None => Ok(AltString::default()),
    }
}

pub(super) fn get_string(packet: &Packet, name: &Name) -> Result<String, MetadataError> {
    match packet.property(name) {
        Some(value) => value
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| wrong_type(name)),
        None => Ok(String::new()),
    }
}

pub(super) fn get_strings(packet: &Packet, name: &Name) -> Result<Vec<String>, MetadataError> {
    match packet.property(name) {
        Some(value) => strings_from(value).ok_or_else(|| wrong_type(name)),
        None => Ok(Vec::new()),
    }
}

pub(super) fn get_date_time(packet: &Packet, name: &Name) -> Result<DateTime, MetadataError> {
    let text = get_string(packet, name)?;
    DateTime::parse(&text).map_err(|e| {
        let name = qualified(name);
        log::error!("XMP property `{name}` isn't a date! value: `{text}`, err: {e}");
        MetadataError::Encoding(format!("{name}: {e}"))
    })
}

pub(super) fn make_alt(alt: &AltString) -> Value {
    let items = alt
        .items()
        .iter()
        .map(|item| match item.lang.as_str() {
            "" => Value::string(&item.value),
            lang => Value::with_lang(&item.value, lang),
        })
        .collect();
    Value::new(Simple::Alt(items))
}

pub(super) fn make_seq(list: &[String]) -> Value {
    Value::new(Simple::Seq(list.iter().map(Value::string).collect()))
}

pub(super) fn make_bag(list: &[String]) -> Value {
    Value::new(Simple::Bag(list.iter().map(Value::string).collect()))
}

/// Writes a single-alternative property, or removes it for an empty value.
///
/// A property that already holds exactly `value` is left alone, whatever its
/// language.
pub(super) fn set_alt(packet: &mut Packet, name: Name, current: &mut AltString, value: &str) {
    if value.is_empty() {
        *current = AltString::default();
        packet.remove_property(&name);
        return;
    }
    if matches!(current.items(), [only] if only.value == value) {
        return;
    }

    *current = AltString::new(value);
    packet.set_property(name, make_alt(current));
}

/// Labels each alternative, marking all but the first with its language.
///
/// With `always`, an empty alternative still gets a blank entry.
pub(super) fn alt_tags(tags: &mut Vec<(String, String)>, label: &str, alt: &AltString, always: bool) {
    match alt.items().split_first() {
        None if always => tags.push((label.to_string(), String::new())),
        None => (),
        Some((first, rest)) => {
            tags.push((label.to_string(), first.value.clone()));
            tags.extend(
                rest.iter()
                    .map(|item| (format!("{label}[{}]", item.lang), item.value.clone())),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{alt_from, make_alt, strings_from};
    use crate::{
        containers::rdf::value::{Simple, Value},
        types::{AltItem, AltString},
        util::logger,
    };

    #[test]
    fn alternatives_keep_their_languages() {
        logger();

        let alt = AltString(vec![
            AltItem {
                lang: "x-default".into(),
                value: "hello".into(),
            },
            AltItem {
                lang: "fr".into(),
                value: "bonjour".into(),
            },
            AltItem {
                lang: String::new(),
                value: "hi".into(),
            },
        ]);
        assert_eq!(alt_from(&make_alt(&alt)), Some(alt));

        assert_eq!(alt_from(&Value::string("plain")), None);
    }

    #[test]
    fn string_lists_take_a_lone_string() {
        logger();

        assert_eq!(strings_from(&Value::string("one")), Some(vec!["one".into()]));

        let bag = Value::new(Simple::Bag(vec![Value::string("a"), Value::string("b")]));
        assert_eq!(strings_from(&bag), Some(vec!["a".into(), "b".into()]));

        let nested = Value::new(Simple::Seq(vec![bag]));
        assert_eq!(strings_from(&nested), None);
    }
}
