use std::path::Path;
use tracing::debug;

use crate::error::DecodeResult;
use crate::geometry::{Geometry, Texture};
use crate::primitives::{self, SideConvention};
use crate::source::{self, AssetKind, AssetSource};
use crate::xml;

/// Decodes an `ArtObject` file into one geometry named after the file.
///
/// The texture is `<base>.png` next to the XML file. Its size is not probed.
pub fn decode_art_object(source: &dyn AssetSource, path: &Path, convention: SideConvention) -> DecodeResult<Geometry> {
    debug!(path = %path.display(), "decoding art object");
    let text = source::read_asset(source, AssetKind::ArtObject, path)?;
    let doc = xml::parse_document(&text, path)?;
    let root = xml::expect_root(&doc, "ArtObject")?;

    let base = source::base_name(path);
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let texture_name = format!("{base}.png");
    let texture_source = source.resolve(AssetKind::Texture, dir, &texture_name);

    let mut geometry = primitives::decode_geometry(xml::child(root, primitives::PRIMITIVES_TAG)?, convention)?;
    geometry.name = base;
    geometry.texture = Texture::new_static(texture_name, texture_source, 0, 0);
    Ok(geometry)
}
