//! Reads the RDF/XML subset from Part 1 of the Adobe XMP specification.

use rustc_hash::FxHashMap;
use xmltree::{AttributeName, Element, XMLNode};

use super::{
    NS_RDF, NS_X, NS_XML,
    error::RdfError,
    value::{Name, Simple, Struct, Value},
};

/// What a packet's XML boils down to.
#[derive(Debug, Default)]
pub(super) struct Decoded {
    pub properties: Struct,
    /// Namespace URI to the prefix the document last used for it.
    pub prefixes: FxHashMap<String, String>,
    pub about: String,
}

/// Parses a packet's XML.
pub(super) fn decode(xml: &[u8]) -> Result<Decoded, RdfError> {
    // packets embedded in files are often padded with NULs
    let end = xml.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    if end != xml.len() {
        log::warn!("Ignoring `{}` NUL bytes after the XMP packet.", xml.len() - end);
    }

    let document = Element::parse(&xml[..end]).inspect_err(|e| {
        log::error!("`xmltree` couldn't parse the XMP packet. err: {e}");
    })?;

    let mut decoder = Decoder::default();
    decoder.note_prefix(&document.prefix, &document.namespace);

    let rdf = if is(&document, NS_X, "xmpmeta") {
        log::trace!("Found an `x:xmpmeta` element.");
        match element_children(&document)?.as_slice() {
            [only] => *only,
            _ => {
                log::error!("`x:xmpmeta` should hold exactly one element.");
                return Err(RdfError::NoRdfElement);
            }
        }
    } else {
        &document
    };
    if !is(rdf, NS_RDF, "RDF") {
        log::error!("Couldn't find an `rdf:RDF` element in the document.");
        return Err(RdfError::NoRdfElement);
    }
    decoder.note_prefix(&rdf.prefix, &rdf.namespace);

    for child in element_children(rdf)? {
        if !is(child, NS_RDF, "Description") {
            log::error!("`rdf:RDF` holds an unexpected `{}`.", qname(child));
            return Err(RdfError::UnexpectedElement {
                element: qname(child),
                parent: qname(rdf),
            });
        }
        decoder.description(child)?;
    }

    Ok(decoder.out)
}

#[derive(Default)]
struct Decoder {
    out: Decoded,
}

impl Decoder {
    fn note_prefix(&mut self, prefix: &Option<String>, namespace: &Option<String>) {
        if let (Some(prefix), Some(namespace)) = (prefix, namespace) {
            if namespace != NS_XML {
                self.out.prefixes.insert(namespace.clone(), prefix.clone());
            }
        }
    }

    /// A top-level `rdf:Description`. Its attributes and children are all
    /// properties.
    fn description(&mut self, elm: &Element) -> Result<(), RdfError> {
        for (key, value) in &elm.attributes {
            let ns = attr_namespace(elm, key)?;
            self.note_prefix(&key.prefix, &key.namespace);

            if ns == NS_RDF && key.local_name == "about" {
                if !self.out.about.is_empty() && !value.is_empty() && self.out.about != *value {
                    log::error!("Descriptions disagree about `rdf:about`.");
                    return Err(RdfError::MismatchedAbout);
                }
                if !value.is_empty() {
                    self.out.about = value.clone();
                }
                continue;
            }
            if ns == NS_RDF || ns == NS_XML {
                return Err(unexpected_attr(elm, key));
            }

            let name = Name::new(ns, &key.local_name);
            self.insert_property(name, Value::string(value.as_str()))?;
        }

        for child in element_children(elm)? {
            let ns = elm_namespace(child)?;
            if ns == NS_RDF || ns == NS_XML {
                return Err(RdfError::UnexpectedElement {
                    element: qname(child),
                    parent: qname(elm),
                });
            }

            let name = Name::new(ns, &child.name);
            let value = self.value(child)?;
            log::trace!("Read property `{}`.", qname(child));
            self.insert_property(name, value)?;
        }

        Ok(())
    }

    fn insert_property(&mut self, name: Name, value: Value) -> Result<(), RdfError> {
        if self.out.properties.contains_key(&name) {
            log::error!("Found a second value for `{name}`.");
            return Err(RdfError::DuplicateProperty {
                name: name.to_string(),
            });
        }
        self.out.properties.insert(name, value);
        Ok(())
    }

    /// Reads the value of a property, struct field, qualifier, or array item
    /// element.
    fn value(&mut self, elm: &Element) -> Result<Value, RdfError> {
        self.note_prefix(&elm.prefix, &elm.namespace);

        let mut qualifiers = Struct::default();
        let mut resource: Option<&str> = None;
        let mut parse_resource = false;
        let mut fields = Struct::default();

        for (key, value) in &elm.attributes {
            let ns = attr_namespace(elm, key)?;
            self.note_prefix(&key.prefix, &key.namespace);

            match (ns, key.local_name.as_str()) {
                (NS_RDF, "resource") => resource = Some(value.as_str()),
                (NS_RDF, "parseType") => {
                    if value != "Resource" {
                        log::error!("`{}` has `rdf:parseType=\"{value}\"`.", qname(elm));
                        return Err(RdfError::BadParseType {
                            element: qname(elm),
                            value: value.clone(),
                        });
                    }
                    parse_resource = true;
                }
                (NS_RDF, "type") => {
                    log::error!("`{}` uses `rdf:type`.", qname(elm));
                    return Err(RdfError::RdfType {
                        element: qname(elm),
                    });
                }
                (NS_RDF, "value") => {
                    fields.insert(Name::new(NS_RDF, "value"), Value::string(value.as_str()));
                }
                (NS_RDF, _) => return Err(unexpected_attr(elm, key)),
                (NS_XML, "lang") => {
                    qualifiers.insert(Name::new(NS_XML, "lang"), Value::string(value.as_str()));
                }
                (NS_XML, _) => return Err(unexpected_attr(elm, key)),
                (ns, local) => {
                    fields.insert(Name::new(ns, local), Value::string(value.as_str()));
                }
            }
        }

        let (children, text) = contents(elm)?;
        let conflict = || {
            log::error!("`{}` has conflicting contents.", qname(elm));
            RdfError::ConflictingContent {
                element: qname(elm),
            }
        };

        let mut value = if let Some(uri) = resource {
            if parse_resource || !fields.is_empty() || !children.is_empty() || !text.trim().is_empty()
            {
                return Err(conflict());
            }
            Value::new(Simple::Uri(uri.into()))
        } else if parse_resource {
            if !fields.is_empty() || !text.trim().is_empty() {
                return Err(conflict());
            }
            Value::new(Simple::Struct(self.fields(elm, &children, Struct::default())?))
        } else if !fields.is_empty() {
            if !children.is_empty() || !text.trim().is_empty() {
                return Err(conflict());
            }
            Value::new(Simple::Struct(fields))
        } else {
            match children.as_slice() {
                [] => Value::string(text),
                [child] if is(child, NS_RDF, "Description") => self.inner_description(child)?,
                [child]
                    if is(child, NS_RDF, "Seq")
                        || is(child, NS_RDF, "Bag")
                        || is(child, NS_RDF, "Alt") =>
                {
                    Value::new(self.array(child)?)
                }
                [child] => {
                    log::error!("`{}` holds an unexpected `{}`.", qname(elm), qname(child));
                    return Err(RdfError::UnexpectedElement {
                        element: qname(child),
                        parent: qname(elm),
                    });
                }
                _ => {
                    log::error!("`{}` holds more than one value.", qname(elm));
                    return Err(RdfError::MultipleChildren {
                        element: qname(elm),
                    });
                }
            }
        };

        value = collapse_rdf_value(value);
        for (name, qualifier) in qualifiers {
            value.qualifiers.insert(name, qualifier);
        }
        Ok(value)
    }

    /// An `rdf:Description` nested in a value: a struct, or a qualified value
    /// if it has an `rdf:value` field.
    fn inner_description(&mut self, elm: &Element) -> Result<Value, RdfError> {
        self.note_prefix(&elm.prefix, &elm.namespace);

        let mut fields = Struct::default();
        for (key, value) in &elm.attributes {
            let ns = attr_namespace(elm, key)?;
            self.note_prefix(&key.prefix, &key.namespace);

            if ns == NS_XML || (ns == NS_RDF && key.local_name != "value") {
                if ns == NS_RDF && key.local_name == "type" {
                    return Err(RdfError::RdfType {
                        element: qname(elm),
                    });
                }
                return Err(unexpected_attr(elm, key));
            }
            let name = Name::new(ns, &key.local_name);
            if fields.insert(name.clone(), Value::string(value.as_str())).is_some() {
                return Err(RdfError::DuplicateProperty {
                    name: name.to_string(),
                });
            }
        }

        let children = element_children(elm)?;
        let fields = self.fields(elm, &children, fields)?;
        Ok(collapse_rdf_value(Value::new(Simple::Struct(fields))))
    }

    /// Reads struct fields from child elements, adding them to `fields`.
    fn fields(
        &mut self,
        parent: &Element,
        children: &[&Element],
        mut fields: Struct,
    ) -> Result<Struct, RdfError> {
        for &child in children {
            let ns = elm_namespace(child)?;
            if ns == NS_XML || (ns == NS_RDF && child.name != "value") {
                return Err(RdfError::UnexpectedElement {
                    element: qname(child),
                    parent: qname(parent),
                });
            }

            let name = Name::new(ns, &child.name);
            if fields.contains_key(&name) {
                log::error!("Found a second value for field `{name}`.");
                return Err(RdfError::DuplicateProperty {
                    name: name.to_string(),
                });
            }
            let value = self.value(child)?;
            fields.insert(name, value);
        }
        Ok(fields)
    }

    /// An `rdf:Seq`, `rdf:Bag`, or `rdf:Alt`.
    fn array(&mut self, elm: &Element) -> Result<Simple, RdfError> {
        self.note_prefix(&elm.prefix, &elm.namespace);
        if let Some(key) = elm.attributes.keys().next() {
            return Err(unexpected_attr(elm, key));
        }

        let mut items = Vec::new();
        for child in element_children(elm)? {
            if !is(child, NS_RDF, "li") {
                log::error!("Array `{}` holds a `{}`.", qname(elm), qname(child));
                return Err(RdfError::UnexpectedElement {
                    element: qname(child),
                    parent: qname(elm),
                });
            }
            items.push(self.value(child)?);
        }
        log::trace!("Read `{}` with `{}` items.", qname(elm), items.len());

        Ok(match elm.name.as_str() {
            "Seq" => Simple::Seq(items),
            "Bag" => Simple::Bag(items),
            _ => Simple::Alt(items),
        })
    }
}

/// A struct with an `rdf:value` field is really a qualified value: the other
/// fields are its qualifiers.
fn collapse_rdf_value(value: Value) -> Value {
    let Simple::Struct(mut fields) = value.value else {
        return value;
    };
    let Some(inner) = fields.remove(&Name::new(NS_RDF, "value")) else {
        return Value {
            qualifiers: value.qualifiers,
            value: Simple::Struct(fields),
        };
    };

    let mut qualifiers = value.qualifiers;
    qualifiers.extend(inner.qualifiers);
    qualifiers.extend(fields);
    Value {
        qualifiers,
        value: inner.value,
    }
}

fn is(elm: &Element, namespace: &str, name: &str) -> bool {
    elm.namespace.as_deref() == Some(namespace) && elm.name == name
}

/// The name as written, for messages.
fn qname(elm: &Element) -> String {
    match elm.prefix {
        Some(ref prefix) => format!("{prefix}:{}", elm.name),
        None => elm.name.clone(),
    }
}

fn elm_namespace(elm: &Element) -> Result<&str, RdfError> {
    elm.namespace.as_deref().ok_or_else(|| {
        log::error!("Element `{}` has no namespace.", elm.name);
        RdfError::NoNamespace { name: qname(elm) }
    })
}

fn attr_namespace<'a>(elm: &Element, key: &'a AttributeName) -> Result<&'a str, RdfError> {
    key.namespace.as_deref().ok_or_else(|| {
        log::error!("Attribute `{}` on `{}` has no namespace.", key.local_name, qname(elm));
        RdfError::NoNamespace {
            name: key.local_name.clone(),
        }
    })
}

fn unexpected_attr(elm: &Element, key: &AttributeName) -> RdfError {
    let attribute = match key.prefix {
        Some(ref prefix) => format!("{prefix}:{}", key.local_name),
        None => key.local_name.clone(),
    };
    log::error!("Unexpected attribute `{attribute}` on `{}`.", qname(elm));
    RdfError::UnexpectedAttribute {
        attribute,
        element: qname(elm),
    }
}

/// Splits an element's contents into child elements and text. Having both
/// (besides whitespace) is an error. Comments and processing instructions
/// are ignored.
fn contents(elm: &Element) -> Result<(Vec<&Element>, String), RdfError> {
    let mut children = Vec::new();
    let mut text = String::new();
    for node in &elm.children {
        match node {
            XMLNode::Element(child) => children.push(child),
            XMLNode::Text(t) | XMLNode::CData(t) => text.push_str(t),
            _ => (),
        }
    }

    if !children.is_empty() && !text.trim().is_empty() {
        log::error!("`{}` mixes text with elements.", qname(elm));
        return Err(RdfError::ConflictingContent {
            element: qname(elm),
        });
    }
    Ok((children, text))
}

/// Like [`contents`], but text isn't allowed at all.
fn element_children(elm: &Element) -> Result<Vec<&Element>, RdfError> {
    let (children, text) = contents(elm)?;
    if !text.trim().is_empty() {
        log::error!("`{}` holds text instead of elements.", qname(elm));
        return Err(RdfError::ConflictingContent {
            element: qname(elm),
        });
    }
    Ok(children)
}
