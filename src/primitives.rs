//! Decoder for `ShaderInstancedIndexedPrimitives` fragments.
//!
//! Every asset type embeds the same primitive block: a `Vertices` list whose entries carry a
//! position, a side index selecting one of six axis-aligned normals and a texture coordinate,
//! followed by an `Indices` list of raw triangle indices.

use clap::ValueEnum;
use glam::{Vec2, Vec3};
use roxmltree::Node;
use serde::Deserialize;

use crate::error::{DecodeError, DecodeResult};
use crate::geometry::{Geometry, Vertex};
use crate::xml;

pub const PRIMITIVES_TAG: &str = "ShaderInstancedIndexedPrimitives";

/// How a vertex side index maps onto a normal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum SideConvention {
    /// 0..=5 map to +X, +Y, +Z, -X, -Y, -Z.
    #[default]
    PositiveFirst,
    /// 0..=5 map to -X, -Y, -Z, +X, +Y, +Z.
    NegativeFirst,
}

impl SideConvention {
    pub fn normal(self, side: u8) -> DecodeResult<Vec3> {
        let positive = match self {
            SideConvention::PositiveFirst => side < 3,
            SideConvention::NegativeFirst => side >= 3,
        };
        let axis = match side {
            0 | 3 => Vec3::X,
            1 | 4 => Vec3::Y,
            2 | 5 => Vec3::Z,
            other => return Err(DecodeError::SideIndexOutOfRange(i64::from(other))),
        };
        Ok(if positive { axis } else { -axis })
    }

    pub fn label(self) -> &'static str {
        match self {
            SideConvention::PositiveFirst => "positive_first",
            SideConvention::NegativeFirst => "negative_first",
        }
    }
}

/// Decodes one primitive block into an unnamed [`Geometry`].
///
/// Texture coordinates are flipped vertically and shifted along u by the side index, so the
/// six faces of a trile atlas sit next to each other. The second and third index of every
/// triangle are swapped when stored.
pub fn decode_geometry(node: Node<'_, '_>, convention: SideConvention) -> DecodeResult<Geometry> {
    xml::expect_tag(node, PRIMITIVES_TAG)?;

    let vertices = decode_vertices(xml::child(node, "Vertices")?, convention)?;
    let indices = decode_indices(xml::child(node, "Indices")?)?;

    let geometry = Geometry::new(String::new(), vertices, indices);
    geometry.validate()?;
    Ok(geometry)
}

fn decode_vertices(node: Node<'_, '_>, convention: SideConvention) -> DecodeResult<Vec<Vertex>> {
    let vertices = xml::children(node, "VertexPositionNormalTextureInstance")
        .map(|entry| decode_vertex(entry, convention))
        .collect::<DecodeResult<Vec<_>>>()?;
    if vertices.is_empty() {
        return Err(DecodeError::EmptyList { element: "Vertices" });
    }
    Ok(vertices)
}

fn decode_vertex(node: Node<'_, '_>, convention: SideConvention) -> DecodeResult<Vertex> {
    let position = xml::read_vector3(node, "Position")?;

    let side: i64 = xml::text_number(xml::child(node, "Normal")?)?;
    let side = u8::try_from(side).ok().filter(|side| *side < 6).ok_or(DecodeError::SideIndexOutOfRange(side))?;
    let normal = convention.normal(side)?;

    let raw_uv = xml::read_vector2(node, "TextureCoord")?;
    let uv = Vec2::new(raw_uv.x + f32::from(side), 1.0 - raw_uv.y);

    Ok(Vertex::new(position, normal, uv))
}

fn decode_indices(node: Node<'_, '_>) -> DecodeResult<Vec<u32>> {
    let mut indices =
        xml::children(node, "Index").map(|entry| xml::text_number::<u32>(entry)).collect::<DecodeResult<Vec<_>>>()?;
    if indices.is_empty() || indices.len() % 3 != 0 {
        return Err(DecodeError::IndexCount(indices.len()));
    }
    for tri in indices.chunks_exact_mut(3) {
        tri.swap(1, 2);
    }
    Ok(indices)
}
