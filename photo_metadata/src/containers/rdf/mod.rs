//! XMP packets: RDF documents limited to the syntax in Part 1 of the Adobe
//! XMP specification.
//!
//! A packet is a map from property [`Name`]s to [`Value`]s. Values nest:
//! structs hold more named values, and arrays hold lists of them.

use std::io::Write;

use rustc_hash::FxHashMap;

use crate::{
    container::{Container, check_written, write_bytes},
    error::MetadataError,
    source::Section,
};

use self::value::{Name, Struct, Value};

mod decode;
mod encode;
pub mod error;
pub mod value;

/// `rdf:`, the namespace of RDF's own syntax.
pub const NS_RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// `xml:`, home of `xml:lang`.
pub const NS_XML: &str = "http://www.w3.org/XML/1998/namespace";

/// `x:`, home of the `x:xmpmeta` wrapper.
pub const NS_X: &str = "adobe:ns:meta/";

/// An XMP packet.
#[derive(Debug)]
pub struct Packet {
    source: Section,
    properties: Struct,
    /// Namespace URI to prefix.
    prefixes: FxHashMap<String, String>,
    about: String,
    rendered: Option<Vec<u8>>,
    dirty: bool,
}

impl Packet {
    /// A packet with no properties.
    pub fn new() -> Self {
        Self {
            source: Section::empty(),
            properties: Struct::default(),
            prefixes: FxHashMap::default(),
            about: String::new(),
            rendered: None,
            dirty: false,
        }
    }

    /// Parses a packet.
    pub fn read(source: Section) -> Result<Self, MetadataError> {
        let xml = source.to_vec()?;
        let decoded = decode::decode(&xml)?;
        log::debug!("Read `{}` XMP properties.", decoded.properties.len());

        Ok(Self {
            source,
            properties: decoded.properties,
            prefixes: decoded.prefixes,
            about: decoded.about,
            rendered: None,
            dirty: false,
        })
    }

    /// Sets the prefix used to write `namespace`.
    ///
    /// Prefixes the packet was read with are remembered, so this only
    /// matters for namespaces the packet didn't already use.
    pub fn register_namespace(&mut self, prefix: &str, namespace: &str) {
        self.prefixes
            .entry(namespace.into())
            .or_insert_with(|| prefix.into());
    }

    /// The `rdf:about` URI. Usually empty.
    pub fn about(&self) -> &str {
        &self.about
    }

    /// Every property name, in no particular order.
    pub fn properties(&self) -> impl Iterator<Item = &Name> {
        self.properties.keys()
    }

    pub fn property(&self, name: &Name) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Sets a property. Setting the value that's already there isn't an
    /// edit.
    pub fn set_property(&mut self, name: Name, value: Value) {
        if self.properties.get(&name) == Some(&value) {
            return;
        }

        log::debug!("Setting XMP property `{name}`.");
        self.properties.insert(name, value);
        self.dirty = true;
    }

    /// Removes a property. Returns whether it was there.
    pub fn remove_property(&mut self, name: &Name) -> bool {
        let removed = self.properties.remove(name).is_some();
        if removed {
            log::debug!("Removed XMP property `{name}`.");
            self.dirty = true;
        }
        removed
    }

    /// Renders the packet's XML, edited or not.
    pub fn render(&self) -> Result<String, MetadataError> {
        Ok(encode::encode(
            &self.properties,
            &self.prefixes,
            &self.about,
        )?)
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

impl Container for Packet {
    fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    fn dirty(&self) -> bool {
        self.dirty
    }

    fn layout(&mut self) -> Result<u64, MetadataError> {
        if !self.dirty {
            self.rendered = None;
            return Ok(self.source.len());
        }

        // the size can't be known without rendering
        let rendered = self.render()?.into_bytes();
        let size = rendered.len() as u64;
        self.rendered = Some(rendered);
        Ok(size)
    }

    fn write(&mut self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        match self.rendered {
            Some(ref rendered) => write_bytes(out, rendered),
            None if self.dirty => Err(MetadataError::Logic("XMP written before layout".into())),
            None => {
                let count = self.source.copy_to(out)?;
                check_written("XMP packet", self.source.len(), count)?;
                Ok(count)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        NS_XML, Packet,
        error::RdfError,
        value::{Name, Simple, Value},
    };
    use crate::{
        container::Container as _, error::MetadataError, source::Section, util::logger,
    };

    const DC: &str = "http://purl.org/dc/elements/1.1/";
    const XMP: &str = "http://ns.adobe.com/xap/1.0/";
    const MWG_RS: &str = "http://www.metadataworkinggroup.com/schemas/regions/";

    /// The sample from Part 1 of the Adobe XMP specification, spread over
    /// several descriptions.
    const ADOBE_SAMPLE: &str = r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about="" xmlns:xmp="http://ns.adobe.com/xap/1.0/">
      <xmp:CreateDate>2002-08-15T17:10:04Z</xmp:CreateDate>
      <xmp:Rating>3</xmp:Rating>
    </rdf:Description>
    <rdf:Description rdf:about=""
        xmlns:dc="http://purl.org/dc/elements/1.1/" dc:format="image/jpeg">
      <dc:subject>
        <rdf:Bag>
          <rdf:li>XMP</rdf:li>
          <rdf:li>metadata</rdf:li>
        </rdf:Bag>
      </dc:subject>
      <dc:title>
        <rdf:Alt>
          <rdf:li xml:lang="x-default">XMP &amp; you</rdf:li>
          <rdf:li xml:lang="fr-FR">XMP et vous</rdf:li>
        </rdf:Alt>
      </dc:title>
    </rdf:Description>
    <rdf:Description rdf:about=""
        xmlns:mwg-rs="http://www.metadataworkinggroup.com/schemas/regions/">
      <mwg-rs:Regions rdf:parseType="Resource">
        <mwg-rs:RegionList>
          <rdf:Seq>
            <rdf:li rdf:parseType="Resource">
              <mwg-rs:Type>Face</mwg-rs:Type>
              <mwg-rs:Name>Dick Bloomer</mwg-rs:Name>
            </rdf:li>
          </rdf:Seq>
        </mwg-rs:RegionList>
      </mwg-rs:Regions>
    </rdf:Description>
  </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#;

    const ADOBE_RENDERED: &str = concat!(
        r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>"#,
        r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF"#,
        r#" xmlns:dc="http://purl.org/dc/elements/1.1/""#,
        r#" xmlns:mwg-rs="http://www.metadataworkinggroup.com/schemas/regions/""#,
        r#" xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#""#,
        r#" xmlns:xmp="http://ns.adobe.com/xap/1.0/">"#,
        r#"<rdf:Description dc:format="image/jpeg" xmp:CreateDate="2002-08-15T17:10:04Z""#,
        r#" xmp:Rating="3" rdf:about="">"#,
        r#"<dc:subject><rdf:Bag><rdf:li>XMP</rdf:li><rdf:li>metadata</rdf:li></rdf:Bag></dc:subject>"#,
        r#"<dc:title><rdf:Alt><rdf:li xml:lang="x-default">XMP &amp; you</rdf:li>"#,
        r#"<rdf:li xml:lang="fr-FR">XMP et vous</rdf:li></rdf:Alt></dc:title>"#,
        r#"<mwg-rs:Regions rdf:parseType="Resource"><mwg-rs:RegionList><rdf:Seq>"#,
        r#"<rdf:li mwg-rs:Name="Dick Bloomer" mwg-rs:Type="Face"/>"#,
        r#"</rdf:Seq></mwg-rs:RegionList></mwg-rs:Regions>"#,
        r#"</rdf:Description></rdf:RDF></x:xmpmeta>"#,
        r#"<?xpacket end="w"?>"#,
    );

    fn render(packet: &mut Packet) -> Vec<u8> {
        let size = packet.layout().unwrap();
        let mut out = Vec::new();
        assert_eq!(packet.write(&mut out).unwrap(), size);
        out
    }

    #[test]
    fn reads_the_adobe_sample() {
        logger();

        let packet = Packet::read(Section::from_bytes(ADOBE_SAMPLE.as_bytes())).unwrap();
        assert_eq!(packet.properties().count(), 6);
        assert_eq!(packet.about(), "");

        let subject = packet.property(&Name::new(DC, "subject")).unwrap();
        let Simple::Bag(ref items) = subject.value else {
            panic!("`dc:subject` should be a bag");
        };
        assert_eq!(items, &[Value::string("XMP"), Value::string("metadata")]);

        let title = packet.property(&Name::new(DC, "title")).unwrap();
        let alts = title.as_array().unwrap();
        assert_eq!(alts[0], Value::with_lang("XMP & you", "x-default"));
        assert_eq!(alts[1].lang(), Some("fr-FR"));

        let regions = packet.property(&Name::new(MWG_RS, "Regions")).unwrap();
        let list = regions.field(MWG_RS, "RegionList").unwrap();
        let face = &list.as_array().unwrap()[0];
        assert_eq!(
            face.field(MWG_RS, "Name").and_then(Value::as_str),
            Some("Dick Bloomer")
        );
    }

    #[test]
    fn untouched_packet_is_copied_and_rendering_is_stable() {
        logger();

        let mut packet = Packet::read(Section::from_bytes(ADOBE_SAMPLE.as_bytes())).unwrap();
        assert_eq!(render(&mut packet), ADOBE_SAMPLE.as_bytes());
        assert_eq!(packet.render().unwrap(), ADOBE_RENDERED);

        // the rendering reads back to the same properties
        let again = Packet::read(Section::from_bytes(ADOBE_RENDERED.as_bytes())).unwrap();
        assert_eq!(again.properties, packet.properties);
        assert_eq!(again.render().unwrap(), ADOBE_RENDERED);
    }

    #[test]
    fn edits_mark_the_packet_dirty() {
        logger();

        let mut packet = Packet::read(Section::from_bytes(ADOBE_SAMPLE.as_bytes())).unwrap();
        packet.set_property(Name::new(XMP, "Rating"), Value::string("3"));
        assert!(!packet.dirty());
        assert!(!packet.remove_property(&Name::new(XMP, "Label")));
        assert!(!packet.dirty());

        packet.set_property(Name::new(XMP, "Rating"), Value::string("5"));
        assert!(packet.dirty());
        let out = String::from_utf8(render(&mut packet)).unwrap();
        assert!(out.contains(r#"xmp:Rating="5""#));
    }

    #[test]
    fn qualified_values_survive() {
        logger();

        let mut packet = Packet::new();
        packet.register_namespace("dc", DC);
        packet.register_namespace("xmp", XMP);

        let mut value = Value::string("Jane");
        value
            .qualifiers
            .insert(Name::new(XMP, "Role"), Value::string("author"));
        value
            .qualifiers
            .insert(Name::new(NS_XML, "lang"), Value::string("en"));
        packet.set_property(
            Name::new(DC, "creator"),
            Value::new(Simple::Seq(vec![value])),
        );
        packet.set_property(Name::new(DC, "source"), Value::new(Simple::Uri("urn:x".into())));

        let rendered = packet.render().unwrap();
        let again = Packet::read(Section::from_bytes(rendered.into_bytes())).unwrap();
        assert_eq!(again.properties, packet.properties);
    }

    #[test]
    fn unsupported_syntax_fails() {
        logger();

        let wrap = |body: &str| {
            format!(
                r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:dc="http://purl.org/dc/elements/1.1/">{body}</rdf:RDF>"#
            )
        };

        let typed = wrap(r#"<rdf:Description><dc:x rdf:type="urn:t">a</dc:x></rdf:Description>"#);
        assert_eq!(
            Packet::read(Section::from_bytes(typed.into_bytes())).unwrap_err(),
            MetadataError::from(RdfError::RdfType {
                element: "dc:x".into()
            })
        );

        let about = wrap(
            r#"<rdf:Description rdf:about="a"/><rdf:Description rdf:about="b"/>"#,
        );
        assert_eq!(
            Packet::read(Section::from_bytes(about.into_bytes())).unwrap_err(),
            MetadataError::from(RdfError::MismatchedAbout)
        );

        let twice = wrap(
            r#"<rdf:Description dc:x="a"/><rdf:Description><dc:x>b</dc:x></rdf:Description>"#,
        );
        assert!(Packet::read(Section::from_bytes(twice.into_bytes())).is_err());

        let unbound = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><rdf:Description><zz:x>a</zz:x></rdf:Description></rdf:RDF>"#;
        assert!(Packet::read(Section::from_bytes(unbound.as_bytes())).is_err());
    }
}
