use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::DecodeResult;
use crate::geometry::{Geometry, Texture};
use crate::primitives::{self, SideConvention};
use crate::source::{self, AssetKind, AssetSource};
use crate::xml;

/// All trile geometries of one set, keyed by trile id.
#[derive(Debug, Clone, PartialEq)]
pub struct TrileSet {
    pub name: String,
    pub triles: BTreeMap<i32, Arc<Geometry>>,
}

impl TrileSet {
    pub fn get(&self, id: i32) -> Option<&Arc<Geometry>> {
        self.triles.get(&id)
    }

    pub fn len(&self) -> usize {
        self.triles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triles.is_empty()
    }
}

/// Decodes a `TrileSet` file. A single bad entry fails the whole set.
///
/// Each trile is named `<key>_<trileName>` and shares the set texture: named after the set,
/// read from `<fileBase>.png` next to the XML file.
pub fn decode_trile_set(source: &dyn AssetSource, path: &Path, convention: SideConvention) -> DecodeResult<TrileSet> {
    debug!(path = %path.display(), "decoding trile set");
    let text = source::read_asset(source, AssetKind::TrileSet, path)?;
    let doc = xml::parse_document(&text, path)?;
    let root = xml::expect_root(&doc, "TrileSet")?;
    let set_name = xml::attr(root, "name")?.to_string();

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let texture = Texture::new_static(
        format!("{set_name}.png"),
        source.resolve(AssetKind::Texture, dir, &format!("{}.png", source::base_name(path))),
        0,
        0,
    );

    let mut triles = BTreeMap::new();
    for entry in xml::children(xml::child(root, "Triles")?, "TrileEntry") {
        let key = xml::attr_i32(entry, "key")?;
        let trile = xml::child(entry, "Trile")?;
        let trile_name = xml::attr(trile, "name")?;
        let primitives_node = xml::child(xml::child(trile, "Geometry")?, primitives::PRIMITIVES_TAG)?;

        let mut geometry = primitives::decode_geometry(primitives_node, convention)?;
        geometry.name = format!("{key}_{trile_name}");
        geometry.texture = texture.clone();
        triles.insert(key, Arc::new(geometry));
    }

    debug!(set = %set_name, triles = triles.len(), "decoded trile set");
    Ok(TrileSet { name: set_name, triles })
}
