//! Face regions, in the Microsoft Photo and Metadata Working Group schemas.
//!
//! Only named faces count. Regions without a name (or that aren't faces)
//! are never touched.

use rustc_hash::FxHashSet;

use crate::{
    containers::rdf::{
        Packet,
        value::{Name, Simple, Struct, Value},
    },
    error::MetadataError,
};

use super::{NS_MP, NS_MPREG, NS_MPRI, NS_MWGRS, values::wrong_type};

/// Picks the face name out of a region, if it's a named face.
type FaceName = fn(&Struct) -> Result<Option<&str>, MetadataError>;

/// Where one schema keeps its list of regions.
pub(super) struct Schema {
    /// The top-level struct property.
    info: (&'static str, &'static str),
    /// The array within it.
    list: (&'static str, &'static str),
    face_name: FaceName,
}

/// `MP:RegionInfo/MPRI:Regions`. Faces have an `MPReg:Rectangle` and an
/// `MPReg:PersonDisplayName`.
pub(super) const MICROSOFT: Schema = Schema {
    info: (NS_MP, "RegionInfo"),
    list: (NS_MPRI, "Regions"),
    face_name: microsoft_face,
};

/// `mwg-rs:Regions/mwg-rs:RegionList`. Faces have an `mwg-rs:Type` of
/// `Face` and an `mwg-rs:Name`.
pub(super) const MWG: Schema = Schema {
    info: (NS_MWGRS, "Regions"),
    list: (NS_MWGRS, "RegionList"),
    face_name: mwg_face,
};

fn string_field<'a>(region: &'a Struct, name: &Name) -> Result<Option<&'a str>, MetadataError> {
    match region.get(name) {
        Some(value) => value.as_str().map(Some).ok_or_else(|| wrong_type(name)),
        None => Ok(None),
    }
}

fn microsoft_face(region: &Struct) -> Result<Option<&str>, MetadataError> {
    if !region.contains_key(&Name::new(NS_MPREG, "Rectangle")) {
        return Ok(None);
    }
    string_field(region, &Name::new(NS_MPREG, "PersonDisplayName"))
}

fn mwg_face(region: &Struct) -> Result<Option<&str>, MetadataError> {
    match string_field(region, &Name::new(NS_MWGRS, "Type"))? {
        Some("Face") => string_field(region, &Name::new(NS_MWGRS, "Name")),
        _ => Ok(None),
    }
}

impl Schema {
    fn info_name(&self) -> Name {
        Name::new(self.info.0, self.info.1)
    }

    fn list_name(&self) -> Name {
        Name::new(self.list.0, self.list.1)
    }

    /// The names of the faces, in document order.
    pub(super) fn read(&self, packet: &Packet) -> Result<Vec<String>, MetadataError> {
        let info_name = self.info_name();
        let Some(info) = packet.property(&info_name) else {
            return Ok(Vec::new());
        };
        let info = info.as_struct().ok_or_else(|| wrong_type(&info_name))?;

        let list_name = self.list_name();
        let Some(list) = info.get(&list_name) else {
            return Ok(Vec::new());
        };
        let (Simple::Bag(ref regions) | Simple::Seq(ref regions)) = list.value else {
            return Err(wrong_type(&list_name));
        };

        let mut names = Vec::new();
        for region in regions {
            let region = region.as_struct().ok_or_else(|| wrong_type(&list_name))?;
            if let Some(name) = (self.face_name)(region)? {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Drops the faces whose names aren't in `keep`, and returns the ones
    /// left. Each name found is added to `found`.
    pub(super) fn prune(
        &self,
        packet: &mut Packet,
        keep: &[String],
        found: &mut FxHashSet<String>,
    ) -> Vec<String> {
        let info_name = self.info_name();
        let Some(mut info) = packet.property(&info_name).cloned() else {
            return Vec::new();
        };
        let list_name = self.list_name();
        let Some(regions) = info
            .as_struct_mut()
            .and_then(|fields| fields.get_mut(&list_name))
            .and_then(Value::as_array_mut)
        else {
            return Vec::new();
        };

        let mut kept = Vec::new();
        regions.retain(|region| {
            let Some(Ok(Some(name))) = region.as_struct().map(self.face_name) else {
                return true;
            };
            if !keep.iter().any(|k| k == name) {
                log::debug!("Removing the face region for `{name}`.");
                return false;
            }
            found.insert(name.to_string());
            kept.push(name.to_string());
            true
        });

        // a no-op when nothing was removed
        packet.set_property(info_name, info);
        kept
    }
}
