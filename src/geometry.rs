use glam::{Vec2, Vec3};
use std::path::PathBuf;

use crate::error::{DecodeError, DecodeResult};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub const fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self { position, normal, uv }
    }
}

/// One frame of an animated atlas, in UV fractions of the nominal atlas size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationFrame {
    pub duration: u32,
    pub origin: Vec2,
    pub size: Vec2,
}

/// Atlas metadata. `frames` is empty exactly when the texture is static.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Texture {
    pub name: String,
    pub source: PathBuf,
    pub animated: bool,
    pub width: u32,
    pub height: u32,
    pub frames: Vec<AnimationFrame>,
}

impl Texture {
    pub fn new_static(name: impl Into<String>, source: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self { name: name.into(), source: source.into(), animated: false, width, height, frames: Vec::new() }
    }

    pub fn new_animated(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        width: u32,
        height: u32,
        frames: Vec<AnimationFrame>,
    ) -> Self {
        Self { name: name.into(), source: source.into(), animated: true, width, height, frames }
    }

    /// First animation frame, or `None` for static textures.
    pub fn first_frame(&self) -> Option<&AnimationFrame> {
        if self.animated {
            self.frames.first()
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    pub name: String,
    pub vertices: Vec<Vertex>,
    /// Flat triangle list; every consecutive triple is one triangle.
    pub indices: Vec<u32>,
    pub texture: Texture,
    pub opacity: f32,
    pub double_sided: bool,
    pub is_plane: bool,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            name: String::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
            texture: Texture::default(),
            opacity: 1.0,
            double_sided: true,
            is_plane: false,
        }
    }
}

impl Geometry {
    pub fn new(name: impl Into<String>, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { name: name.into(), vertices, indices, ..Self::default() }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| [tri[0], tri[1], tri[2]])
    }

    /// Checks the index invariants: a positive multiple of three, all in range.
    pub fn validate(&self) -> DecodeResult<()> {
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(DecodeError::IndexCount(self.indices.len()));
        }
        let vertex_count = self.vertices.len();
        if let Some(&index) = self.indices.iter().find(|&&index| index as usize >= vertex_count) {
            return Err(DecodeError::IndexOutOfBounds { index, vertex_count });
        }
        Ok(())
    }
}
