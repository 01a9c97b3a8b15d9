//! Renders a packet as XML.
//!
//! The output is deterministic: namespaces are declared in prefix order on
//! `rdf:RDF`, and properties and fields are written in (prefix, name) order.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use super::{
    NS_RDF, NS_X, NS_XML,
    error::RdfError,
    value::{Name, Simple, Struct, Value},
};

const PACKET_START: &str = r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>"#;
const PACKET_END: &str = r#"<?xpacket end="w"?>"#;

/// Renders `properties` as a complete XMP packet.
pub(super) fn encode(
    properties: &Struct,
    prefixes: &FxHashMap<String, String>,
    about: &str,
) -> Result<String, RdfError> {
    let encoder = Encoder { prefixes };

    // prefix -> namespace, for everything actually used
    let mut used = BTreeMap::new();
    used.insert("rdf".to_string(), NS_RDF.to_string());
    encoder.namespaces_in_struct(properties, &mut used)?;
    used.remove("xml");

    let mut out = String::new();
    out.push_str(PACKET_START);
    out.push_str("<x:xmpmeta xmlns:x=\"");
    out.push_str(NS_X);
    out.push_str("\"><rdf:RDF");
    for (prefix, namespace) in &used {
        attr(&mut out, &format!("xmlns:{prefix}"), namespace);
    }
    out.push('>');

    let mut desc = Element::new("rdf:Description");
    encoder.struct_into(&mut desc, properties)?;
    desc.attrs.push(("rdf:about".into(), about.into()));
    desc.write(&mut out);

    out.push_str("</rdf:RDF></x:xmpmeta>");
    out.push_str(PACKET_END);
    Ok(out)
}

struct Encoder<'a> {
    prefixes: &'a FxHashMap<String, String>,
}

impl Encoder<'_> {
    fn prefix(&self, namespace: &str) -> Result<&str, RdfError> {
        match namespace {
            NS_RDF => Ok("rdf"),
            NS_XML => Ok("xml"),
            _ => self.prefixes.get(namespace).map(String::as_str).ok_or_else(|| {
                log::error!("No prefix for namespace `{namespace}`!");
                RdfError::NoPrefix {
                    namespace: namespace.into(),
                }
            }),
        }
    }

    fn qname(&self, name: &Name) -> Result<String, RdfError> {
        Ok(format!("{}:{}", self.prefix(&name.namespace)?, name.name))
    }

    fn namespaces_in_struct(
        &self,
        fields: &Struct,
        used: &mut BTreeMap<String, String>,
    ) -> Result<(), RdfError> {
        for (name, value) in fields {
            let prefix = self.prefix(&name.namespace)?;
            match used.get(prefix) {
                Some(existing) if *existing != name.namespace => {
                    log::error!("Prefix `{prefix}` is claimed by two namespaces!");
                    return Err(RdfError::PrefixClash {
                        prefix: prefix.into(),
                    });
                }
                Some(_) => (),
                None => {
                    used.insert(prefix.into(), name.namespace.clone());
                }
            }
            self.namespaces_in_value(value, used)?;
        }
        Ok(())
    }

    fn namespaces_in_value(
        &self,
        value: &Value,
        used: &mut BTreeMap<String, String>,
    ) -> Result<(), RdfError> {
        self.namespaces_in_struct(&value.qualifiers, used)?;
        match value.value {
            Simple::Struct(ref fields) => self.namespaces_in_struct(fields, used),
            Simple::Seq(ref items) | Simple::Bag(ref items) | Simple::Alt(ref items) => {
                for item in items {
                    self.namespaces_in_value(item, used)?;
                }
                Ok(())
            }
            Simple::String(_) | Simple::Uri(_) => Ok(()),
        }
    }

    /// Sorts names by (prefix, local name).
    fn sorted<'s>(&self, fields: &'s Struct) -> Result<Vec<(&'s Name, &'s Value)>, RdfError> {
        let mut keyed = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            keyed.push((self.prefix(&name.namespace)?, name, value));
        }
        keyed.sort_by(|a, b| (a.0, &a.1.name).cmp(&(b.0, &b.1.name)));
        Ok(keyed.into_iter().map(|(_, n, v)| (n, v)).collect())
    }

    /// Writes every field into `elm`: simple strings as attributes, anything
    /// else as child elements.
    fn struct_into(&self, elm: &mut Element, fields: &Struct) -> Result<(), RdfError> {
        for (name, value) in self.sorted(fields)? {
            self.value_into(elm, name, value, true)?;
        }
        Ok(())
    }

    /// Writes a struct as the contents of a property element, picking the
    /// most compact form that reads back the same.
    fn struct_value(&self, elm: &mut Element, fields: &Struct) -> Result<(), RdfError> {
        let simple = fields.values().filter(|v| is_simple(v)).count();

        if fields.is_empty() || simple == 0 {
            elm.attrs
                .push(("rdf:parseType".into(), "Resource".into()));
            self.struct_into(elm, fields)
        } else if simple == fields.len() {
            self.struct_into(elm, fields)
        } else {
            let mut desc = Element::new("rdf:Description");
            self.struct_into(&mut desc, fields)?;
            elm.children.push(Node::Element(desc));
            Ok(())
        }
    }

    fn value_into(
        &self,
        parent: &mut Element,
        name: &Name,
        value: &Value,
        can_attr: bool,
    ) -> Result<(), RdfError> {
        let qname = self.qname(name)?;
        if can_attr && is_simple(value) {
            if let Some(text) = value.as_str() {
                parent.attrs.push((qname, text.into()));
                return Ok(());
            }
        }

        let mut elm = Element::new(qname);
        let mut qualifiers = value.qualifiers.clone();
        let lang_name = Name::new(NS_XML, "lang");
        if let Some(lang) = qualifiers.remove(&lang_name) {
            match (lang.qualifiers.is_empty(), &lang.value) {
                (true, Simple::String(code)) => {
                    elm.attrs.push(("xml:lang".into(), code.clone()));
                }
                _ => {
                    qualifiers.insert(lang_name, lang);
                }
            }
        }

        if !qualifiers.is_empty() {
            // qualifiers and the value itself, as a struct with `rdf:value`
            qualifiers.insert(Name::new(NS_RDF, "value"), Value::new(value.value.clone()));
            self.struct_value(&mut elm, &qualifiers)?;
            parent.children.push(Node::Element(elm));
            return Ok(());
        }

        match value.value {
            Simple::String(ref text) => elm.children.push(Node::Text(text.clone())),
            Simple::Uri(ref uri) => elm.attrs.push(("rdf:resource".into(), uri.clone())),
            Simple::Struct(ref fields) => self.struct_value(&mut elm, fields)?,
            Simple::Seq(ref items) => elm.children.push(Node::Element(self.array("rdf:Seq", items)?)),
            Simple::Bag(ref items) => elm.children.push(Node::Element(self.array("rdf:Bag", items)?)),
            Simple::Alt(ref items) => elm.children.push(Node::Element(self.array("rdf:Alt", items)?)),
        }
        parent.children.push(Node::Element(elm));
        Ok(())
    }

    fn array(&self, tag: &str, items: &[Value]) -> Result<Element, RdfError> {
        let mut array = Element::new(tag);
        let li = Name::new(NS_RDF, "li");
        for item in items {
            self.value_into(&mut array, &li, item, false)?;
        }
        Ok(array)
    }
}

/// An unqualified string.
fn is_simple(value: &Value) -> bool {
    value.qualifiers.is_empty() && matches!(value.value, Simple::String(_))
}

/// An element under construction. Attributes and children keep their order.
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (key, value) in &self.attrs {
            attr(out, key, value);
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(elm) => elm.write(out),
                Node::Text(text) => escape_into(out, text, false),
            }
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

fn attr(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    escape_into(out, value, true);
    out.push('"');
}

fn escape_into(out: &mut String, text: &str, in_attr: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            '\n' if in_attr => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            '\t' if in_attr => out.push_str("&#x9;"),
            c => out.push(c),
        }
    }
}
