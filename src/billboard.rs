use glam::{Vec2, Vec3};
use serde::Deserialize;

use crate::geometry::{Geometry, Texture, Vertex};

/// Shape parameters for synthesized quads.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BillboardStyle {
    /// Half extents are `width / extent_divisor` and `height / extent_divisor`.
    #[serde(default = "BillboardStyle::default_extent_divisor")]
    pub extent_divisor: f32,
    /// Push along +Z applied to background planes.
    #[serde(default = "BillboardStyle::default_plane_offset")]
    pub plane_offset: f32,
}

impl Default for BillboardStyle {
    fn default() -> Self {
        Self { extent_divisor: Self::default_extent_divisor(), plane_offset: Self::default_plane_offset() }
    }
}

impl BillboardStyle {
    const fn default_extent_divisor() -> f32 {
        16.0
    }

    const fn default_plane_offset() -> f32 {
        0.05
    }
}

pub const BILLBOARD_INDICES: [u32; 6] = [0, 1, 2, 2, 1, 3];

/// Builds a +Z facing quad sized from the texture and mapped to its first frame.
///
/// Vertex order is top-left, bottom-left, top-right, bottom-right. Static textures map the
/// whole image. The geometry is named after the texture and flagged as a plane.
pub fn synthesize_billboard(texture: &Texture, style: &BillboardStyle, offset: f32) -> Geometry {
    let half_w = texture.width as f32 / style.extent_divisor;
    let half_h = texture.height as f32 / style.extent_divisor;
    let normal = Vec3::Z;
    let push = normal * offset;

    let (origin, size) = match texture.first_frame() {
        Some(frame) => (frame.origin, frame.size),
        None => (Vec2::ZERO, Vec2::ONE),
    };
    let far = origin + size;

    let vertices = vec![
        Vertex::new(Vec3::new(-half_w, half_h, 0.0) + push, normal, Vec2::new(origin.x, 1.0 - origin.y)),
        Vertex::new(Vec3::new(-half_w, -half_h, 0.0) + push, normal, Vec2::new(origin.x, 1.0 - far.y)),
        Vertex::new(Vec3::new(half_w, half_h, 0.0) + push, normal, Vec2::new(far.x, 1.0 - origin.y)),
        Vertex::new(Vec3::new(half_w, -half_h, 0.0) + push, normal, Vec2::new(far.x, 1.0 - far.y)),
    ];

    let mut geometry = Geometry::new(texture.name.clone(), vertices, BILLBOARD_INDICES.to_vec());
    geometry.texture = texture.clone();
    geometry.is_plane = true;
    geometry
}
