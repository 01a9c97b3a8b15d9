//! XMP sidecar files: one RDF packet, on its own.

use std::io::Write;

use crate::{
    container::{Container as _, Shared, shared},
    containers::rdf::Packet,
    error::MetadataError,
    providers::{Provider, multi::MultiProvider, xmp::XmpProvider},
    source::Section,
};

use super::FileHandler;

/// How a sidecar's first non-blank line may start.
const STARTS: [&str; 3] = ["<?xpacket", "<x:xmpmeta", "<rdf:RDF"];

/// How far into the file we look for that line.
const SNIFF_LEN: usize = 1024;

#[derive(Debug)]
pub struct XmpHandler {
    rdf: Shared<Packet>,
    providers: MultiProvider,
}

impl XmpHandler {
    /// Whether the first non-blank line of the file starts an XMP packet.
    pub fn sniff(source: &Section) -> Result<bool, MetadataError> {
        let head = source.read_upto(0, SNIFF_LEN)?;
        let head = String::from_utf8_lossy(&head);
        let Some(line) = head.lines().map(str::trim).find(|l| !l.is_empty()) else {
            return Ok(false);
        };
        Ok(STARTS.iter().any(|start| line.starts_with(start)))
    }

    pub fn read(source: Section) -> Result<Self, MetadataError> {
        let rdf = shared(Packet::read(source)?);

        let mut providers = MultiProvider::default();
        providers.push(XmpProvider::new(rdf.clone())?);

        Ok(Self { rdf, providers })
    }
}

impl FileHandler for XmpHandler {
    fn provider(&self) -> &dyn Provider {
        &self.providers
    }

    fn provider_mut(&mut self) -> &mut dyn Provider {
        &mut self.providers
    }

    fn dirty(&self) -> bool {
        self.rdf.read().dirty()
    }

    fn save(&mut self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        let mut rdf = self.rdf.write();
        rdf.layout()?;
        rdf.write(out)
    }
}

#[cfg(test)]
mod tests {
    use super::XmpHandler;
    use crate::{
        handlers::FileHandler as _, source::Section, types::HierValue, util::logger,
    };

    const SIDECAR: &str = r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    xmlns:lr="http://ns.adobe.com/lightroom/1.0/">
   <dc:subject>
    <rdf:Bag>
     <rdf:li>Alice</rdf:li>
    </rdf:Bag>
   </dc:subject>
   <lr:hierarchicalSubject>
    <rdf:Bag>
     <rdf:li>People|Alice</rdf:li>
    </rdf:Bag>
   </lr:hierarchicalSubject>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#;

    fn reopen(text: &[u8]) -> XmpHandler {
        XmpHandler::read(Section::from_bytes(text.to_vec())).unwrap()
    }

    #[test]
    fn sniffs_the_first_line() {
        logger();

        for text in [
            "<?xpacket begin=\"\"?>",
            "\n\n   <x:xmpmeta xmlns:x=\"adobe:ns:meta/\">",
            "<rdf:RDF>",
        ] {
            let source = Section::from_bytes(text.as_bytes().to_vec());
            assert!(XmpHandler::sniff(&source).unwrap(), "{text}");
        }
        for text in ["", "  \n ", "<?xml version=\"1.0\"?>\n<x:xmpmeta>", "MM\0*"] {
            let source = Section::from_bytes(text.as_bytes().to_vec());
            assert!(!XmpHandler::sniff(&source).unwrap(), "{text}");
        }
    }

    #[test]
    fn untouched_sidecar_is_copied() {
        logger();

        let mut handler = reopen(SIDECAR.as_bytes());
        assert_eq!(handler.provider().people(), ["Alice"]);
        assert!(!handler.dirty());

        let mut out = Vec::new();
        handler.save(&mut out).unwrap();
        assert_eq!(out, SIDECAR.as_bytes());
    }

    #[test]
    fn edits_are_rendered() {
        logger();

        let mut handler = reopen(SIDECAR.as_bytes());
        let p = handler.provider_mut();
        p.set_people(&["Alice".into(), "Bob".into()]).unwrap();
        p.set_topics(&[HierValue::split("Birds/Owls", '/')]).unwrap();
        assert!(handler.dirty());

        let mut out = Vec::new();
        handler.save(&mut out).unwrap();
        assert!(XmpHandler::sniff(&Section::from_bytes(out.clone())).unwrap());

        let handler = reopen(&out);
        let p = handler.provider();
        assert_eq!(p.people(), ["Alice", "Bob"]);
        assert_eq!(p.topics(), [HierValue::split("Birds/Owls", '/')]);
        assert!(p.keywords().is_empty());
    }
}
