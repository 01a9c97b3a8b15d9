//! The XMP extension packet of a JPEG.
//!
//! Nothing is read from or written to the extension. It's only checked for
//! properties the [`XmpProvider`](super::xmp::XmpProvider) manages, since
//! those would drift out of step with the main packet as soon as a field
//! was edited.

use crate::{container::Shared, containers::rdf::Packet, error::MetadataError};

use super::{Provider, xmp::NAMESPACES};

#[derive(Debug)]
pub struct XmpExtProvider {
    /// The packet, kept alive alongside the JPEG that renders it.
    _rdf: Shared<Packet>,
}

impl XmpExtProvider {
    /// Fails with [`MetadataError::Unsupported`] when the packet holds a
    /// property in a namespace we manage.
    pub fn new(rdf: Shared<Packet>) -> Result<Self, MetadataError> {
        let packet = rdf.read();
        if let Some(name) = packet
            .properties()
            .find(|name| NAMESPACES.iter().any(|(_, ns)| *ns == name.namespace))
        {
            log::error!("The XMP extension packet holds `{name}`, which belongs in the main packet!");
            return Err(MetadataError::Unsupported(
                "XMP extension packet holds managed properties".into(),
            ));
        }

        let count = packet.properties().count();
        if count > 0 {
            log::warn!("Keeping `{count}` XMP extension properties as they are.");
        }
        drop(packet);

        Ok(Self { _rdf: rdf })
    }
}

impl Provider for XmpExtProvider {
    fn name(&self) -> &'static str {
        "XMPext"
    }
}
