use glam::Vec2;
use std::path::Path;
use tracing::debug;

use crate::error::{DecodeError, DecodeResult};
use crate::geometry::{AnimationFrame, Texture};
use crate::source::{AssetKind, AssetSource};
use crate::xml;

pub const STATIC_EXTENSION: &str = ".png";
pub const ANIMATED_EXTENSION: &str = ".ani.png";

/// Decodes texture metadata for `dir/name`.
///
/// Static textures read their size from the `<name>.png` header. Animated textures need
/// `<name>.ani.png` plus a `<name>.xml` descriptor listing the atlas frames, whose rectangles
/// are normalized by the descriptor's nominal atlas size.
pub fn decode_texture(source: &dyn AssetSource, dir: &Path, name: &str, animated: bool) -> DecodeResult<Texture> {
    let extension = if animated { ANIMATED_EXTENSION } else { STATIC_EXTENSION };
    let image_path = dir.join(format!("{name}{extension}"));
    if !source.exists(&image_path) {
        return Err(DecodeError::MissingAsset { kind: AssetKind::Texture, name: name.to_string(), path: image_path });
    }
    let texture_name = image_path.file_name().map(|leaf| leaf.to_string_lossy().into_owned()).unwrap_or_default();
    debug!(path = %image_path.display(), animated, "decoding texture");

    if !animated {
        let (width, height) = source.image_dimensions(&image_path)?;
        return Ok(Texture::new_static(texture_name, image_path, width, height));
    }

    let descriptor_path = dir.join(format!("{name}.xml"));
    if !source.exists(&descriptor_path) {
        return Err(DecodeError::MissingAsset {
            kind: AssetKind::Texture,
            name: name.to_string(),
            path: descriptor_path,
        });
    }
    let text = source.read_text(&descriptor_path)?;
    let doc = xml::parse_document(&text, &descriptor_path)?;
    let root = xml::expect_root(&doc, "AnimatedTexturePC")?;

    let actual_width = xml::attr_u32(root, "actualWidth")?;
    let actual_height = xml::attr_u32(root, "actualHeight")?;
    let atlas_width = xml::attr_u32(root, "width")?;
    let atlas_height = xml::attr_u32(root, "height")?;
    if atlas_width == 0 || atlas_height == 0 {
        return Err(DecodeError::ZeroAtlasDimension { path: descriptor_path });
    }
    let atlas = Vec2::new(atlas_width as f32, atlas_height as f32);

    let frames = xml::children(xml::child(root, "Frames")?, "FramePC")
        .map(|frame| {
            let duration = xml::attr_u32(frame, "duration")?;
            let rect = xml::child(frame, "Rectangle")?;
            let origin = Vec2::new(xml::attr_f32(rect, "x")?, xml::attr_f32(rect, "y")?) / atlas;
            let size = Vec2::new(xml::attr_f32(rect, "w")?, xml::attr_f32(rect, "h")?) / atlas;
            Ok(AnimationFrame { duration, origin, size })
        })
        .collect::<DecodeResult<Vec<_>>>()?;
    if frames.is_empty() {
        return Err(DecodeError::EmptyList { element: "Frames" });
    }

    Ok(Texture::new_animated(texture_name, image_path, actual_width, actual_height, frames))
}
