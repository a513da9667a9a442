//! Decoded level aggregate and the placement records handed to writers.

use glam::{Mat4, Quat, Vec3};
use std::collections::BTreeMap;
use std::f32::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

use crate::error::{DecodeError, DecodeResult};
use crate::geometry::Geometry;

/// Trile id meaning "nothing placed here".
pub const EMPTY_TRILE_ID: i32 = -1;

/// Instances other than triles are positioned by their cell corner.
pub const CELL_ORIGIN_OFFSET: Vec3 = Vec3::splat(0.5);

/// Quarter-turn code of a trile, 0..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Orientation(u8);

impl Orientation {
    pub fn from_code(code: i32) -> DecodeResult<Self> {
        match code {
            0..=3 => Ok(Self(code as u8)),
            other => Err(DecodeError::OrientationOutOfRange(other)),
        }
    }

    pub fn code(self) -> u8 {
        self.0
    }

    /// Rotation about +Y: 0 faces back (half turn), 2 is the identity.
    pub fn rotation(self) -> Quat {
        let angle = match self.0 {
            0 => PI,
            1 => -FRAC_PI_2,
            2 => 0.0,
            _ => FRAC_PI_2,
        };
        Quat::from_rotation_y(angle)
    }
}

/// Translation, rotation and scale of one scene node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Placement {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE }
    }
}

impl Placement {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrileEmplacement {
    pub id: i32,
    /// Grid cell.
    pub emplacement: Vec3,
    pub position: Vec3,
    pub orientation: Orientation,
}

impl TrileEmplacement {
    pub fn is_empty(&self) -> bool {
        self.id == EMPTY_TRILE_ID
    }

    pub fn placement(&self) -> Placement {
        Placement { translation: self.position, rotation: self.orientation.rotation(), scale: Vec3::ONE }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtObjectInstance {
    pub name: String,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl ArtObjectInstance {
    pub fn placement(&self) -> Placement {
        Placement { translation: self.position - CELL_ORIGIN_OFFSET, rotation: self.rotation, scale: self.scale }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundPlane {
    /// Texture reference with forward slashes.
    pub texture_name: String,
    pub animated: bool,
    pub opacity: f32,
    pub double_sided: bool,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// Synthesized billboard.
    pub geometry: Geometry,
}

impl BackgroundPlane {
    pub fn placement(&self) -> Placement {
        Placement { translation: self.position - CELL_ORIGIN_OFFSET, rotation: self.rotation, scale: self.scale }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterAction {
    pub key: String,
    pub animation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub name: String,
    /// In document order; the first one picks the texture.
    pub actions: Vec<CharacterAction>,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub geometry: Geometry,
}

impl Character {
    pub fn initial_animation(&self) -> Option<&str> {
        self.actions.first().map(|action| action.animation.as_str())
    }

    pub fn placement(&self) -> Placement {
        Placement { translation: self.position - CELL_ORIGIN_OFFSET, rotation: self.rotation, scale: self.scale }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Level {
    pub name: String,
    pub trile_set_name: String,
    pub triles: Vec<TrileEmplacement>,
    pub trile_geometries: BTreeMap<i32, Arc<Geometry>>,
    pub art_objects: Vec<ArtObjectInstance>,
    pub art_object_geometries: BTreeMap<String, Arc<Geometry>>,
    pub background_planes: Vec<BackgroundPlane>,
    pub characters: Vec<Character>,
}

/// One placed geometry in writer order.
#[derive(Debug, Clone, Copy)]
pub struct SceneNode<'a> {
    pub name: &'a str,
    pub geometry: &'a Geometry,
    pub placement: Placement,
}

impl Level {
    /// Placed geometries: art objects, triles, background planes, then characters.
    /// Empty trile slots are left out.
    pub fn scene_nodes(&self) -> Vec<SceneNode<'_>> {
        let mut nodes = Vec::with_capacity(
            self.art_objects.len() + self.triles.len() + self.background_planes.len() + self.characters.len(),
        );
        for instance in &self.art_objects {
            if let Some(geometry) = self.art_object_geometries.get(&instance.name) {
                nodes.push(SceneNode { name: &instance.name, geometry, placement: instance.placement() });
            }
        }
        for trile in self.triles.iter().filter(|trile| !trile.is_empty()) {
            if let Some(geometry) = self.trile_geometries.get(&trile.id) {
                nodes.push(SceneNode { name: &geometry.name, geometry, placement: trile.placement() });
            }
        }
        for plane in &self.background_planes {
            nodes.push(SceneNode { name: &plane.texture_name, geometry: &plane.geometry, placement: plane.placement() });
        }
        for character in &self.characters {
            nodes.push(SceneNode { name: &character.name, geometry: &character.geometry, placement: character.placement() });
        }
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn orientation_codes_map_to_quarter_turns() {
        let forward = Vec3::Z;
        let turned: Vec<Vec3> =
            (0..4).map(|code| Orientation::from_code(code).expect("code").rotation() * forward).collect();
        assert!(approx_vec3(turned[0], -Vec3::Z));
        assert!(approx_vec3(turned[1], -Vec3::X));
        assert!(approx_vec3(turned[2], Vec3::Z));
        assert!(approx_vec3(turned[3], Vec3::X));
        assert!(matches!(Orientation::from_code(4), Err(DecodeError::OrientationOutOfRange(4))));
    }

    #[test]
    fn instance_placements_shift_to_cell_corner() {
        let instance = ArtObjectInstance {
            name: "tree".into(),
            position: Vec3::new(3.0, 1.0, 2.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(2.0),
        };
        let matrix = instance.placement().matrix();
        assert!(approx_vec3(matrix.transform_point3(Vec3::ZERO), Vec3::new(2.5, 0.5, 1.5)));
        assert!(approx_vec3(matrix.transform_point3(Vec3::X), Vec3::new(4.5, 0.5, 1.5)));

        let trile = TrileEmplacement {
            id: 4,
            emplacement: Vec3::ZERO,
            position: Vec3::new(1.0, 2.0, 3.0),
            orientation: Orientation::from_code(2).expect("code"),
        };
        assert_eq!(trile.placement().matrix().transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn scene_nodes_follow_writer_order_and_skip_empty_slots() {
        let trile = Arc::new(Geometry::new("1_grass", Vec::new(), Vec::new()));
        let tree = Arc::new(Geometry::new("tree", Vec::new(), Vec::new()));
        let mut level = Level { name: "village".into(), trile_set_name: "Village".into(), ..Level::default() };
        level.trile_geometries.insert(1, trile);
        level.art_object_geometries.insert("tree".into(), tree);
        for id in [1, EMPTY_TRILE_ID, 1] {
            level.triles.push(TrileEmplacement {
                id,
                emplacement: Vec3::ZERO,
                position: Vec3::ZERO,
                orientation: Orientation::default(),
            });
        }
        level.art_objects.push(ArtObjectInstance {
            name: "tree".into(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        });
        let names: Vec<&str> = level.scene_nodes().iter().map(|node| node.name).collect();
        assert_eq!(names, vec!["tree", "1_grass", "1_grass"]);
    }
}
