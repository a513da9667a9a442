//! Level decoding: reads a `Level` file stage by stage and resolves every asset it references.
//!
//! Stages run strictly in order and the first failure aborts the whole level. The failing stage
//! is reported through [`DecodeError::Level`]. Trile sets, art objects and textures go through
//! the shared [`AssetCache`], so sibling levels decoded on other workers reuse them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use glam::{Quat, Vec3};
use roxmltree::Node;
use tracing::{debug, trace};

use crate::art_object::decode_art_object;
use crate::billboard::{synthesize_billboard, BillboardStyle};
use crate::cache::AssetCache;
use crate::error::{DecodeError, DecodeResult};
use crate::geometry::{Geometry, Texture};
use crate::level::{
    ArtObjectInstance, BackgroundPlane, Character, CharacterAction, Level, Orientation, TrileEmplacement,
};
use crate::primitives::SideConvention;
use crate::source::{cache_key, AssetKind, AssetSource};
use crate::texture::decode_texture;
use crate::trile_set::decode_trile_set;
use crate::xml;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelStage {
    Init,
    ReadHeader,
    ReadTriles,
    ResolveTrileSet,
    ReadArtObjects,
    ResolveArtObjects,
    ReadBackgroundPlanes,
    ResolveBackgroundPlanes,
    ReadCharacters,
    ResolveCharacters,
    Assembled,
}

impl LevelStage {
    pub fn label(self) -> &'static str {
        match self {
            LevelStage::Init => "init",
            LevelStage::ReadHeader => "read header",
            LevelStage::ReadTriles => "read triles",
            LevelStage::ResolveTrileSet => "resolve trile set",
            LevelStage::ReadArtObjects => "read art objects",
            LevelStage::ResolveArtObjects => "resolve art objects",
            LevelStage::ReadBackgroundPlanes => "read background planes",
            LevelStage::ResolveBackgroundPlanes => "resolve background planes",
            LevelStage::ReadCharacters => "read characters",
            LevelStage::ResolveCharacters => "resolve characters",
            LevelStage::Assembled => "assembled",
        }
    }
}

impl fmt::Display for LevelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Knobs shared by all decoders of a run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecodeOptions {
    pub side_convention: SideConvention,
    pub billboard: BillboardStyle,
}

pub struct LevelDecoder<'a> {
    source: &'a dyn AssetSource,
    cache: &'a AssetCache,
    options: DecodeOptions,
}

impl<'a> LevelDecoder<'a> {
    pub fn new(source: &'a dyn AssetSource, cache: &'a AssetCache, options: DecodeOptions) -> Self {
        Self { source, cache, options }
    }

    pub fn decode(&self, path: &Path) -> DecodeResult<Level> {
        let mut stage = LevelStage::Init;
        self.decode_stages(path, &mut stage).map_err(|source| DecodeError::Level {
            path: path.to_path_buf(),
            stage,
            source: Box::new(source),
        })
    }

    fn decode_stages(&self, path: &Path, stage: &mut LevelStage) -> DecodeResult<Level> {
        debug!(path = %path.display(), "decoding level");
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let text = self.source.read_text(path)?;
        let doc = xml::parse_document(&text, path)?;

        enter(stage, LevelStage::ReadHeader);
        let root = xml::expect_root(&doc, "Level")?;
        let trile_set_name = xml::attr(root, "trileSetName")?.to_string();
        let name = xml::attr(root, "name")?.to_string();

        enter(stage, LevelStage::ReadTriles);
        let triles = read_triles(root)?;

        enter(stage, LevelStage::ResolveTrileSet);
        let trile_geometries = self.resolve_trile_set(dir, &trile_set_name, &triles)?;

        enter(stage, LevelStage::ReadArtObjects);
        let art_objects = read_art_objects(root)?;

        enter(stage, LevelStage::ResolveArtObjects);
        let art_object_geometries = self.resolve_art_objects(dir, &art_objects)?;

        enter(stage, LevelStage::ReadBackgroundPlanes);
        let mut background_planes = read_background_planes(root)?;

        enter(stage, LevelStage::ResolveBackgroundPlanes);
        self.resolve_background_planes(dir, &mut background_planes)?;

        enter(stage, LevelStage::ReadCharacters);
        let mut characters = read_characters(root)?;

        enter(stage, LevelStage::ResolveCharacters);
        self.resolve_characters(dir, &mut characters)?;

        enter(stage, LevelStage::Assembled);
        debug!(
            level = %name,
            triles = triles.len(),
            art_objects = art_objects.len(),
            background_planes = background_planes.len(),
            characters = characters.len(),
            "level assembled"
        );
        Ok(Level {
            name,
            trile_set_name,
            triles,
            trile_geometries,
            art_objects,
            art_object_geometries,
            background_planes,
            characters,
        })
    }

    fn resolve_trile_set(
        &self,
        dir: &Path,
        name: &str,
        triles: &[TrileEmplacement],
    ) -> DecodeResult<BTreeMap<i32, Arc<Geometry>>> {
        let path = self.source.resolve(AssetKind::TrileSet, dir, name);
        let set = self
            .cache
            .trile_sets()
            .try_get_or_insert(cache_key(&path), || {
                decode_trile_set(self.source, &path, self.options.side_convention)
            })?;

        let mut geometries = BTreeMap::new();
        for trile in triles.iter().filter(|trile| !trile.is_empty()) {
            if geometries.contains_key(&trile.id) {
                continue;
            }
            let geometry = set
                .get(trile.id)
                .ok_or_else(|| DecodeError::MissingTrile { id: trile.id, trile_set: set.name.clone() })?;
            geometries.insert(trile.id, Arc::clone(geometry));
        }
        Ok(geometries)
    }

    fn resolve_art_objects(
        &self,
        dir: &Path,
        instances: &[ArtObjectInstance],
    ) -> DecodeResult<BTreeMap<String, Arc<Geometry>>> {
        let mut geometries = BTreeMap::new();
        for instance in instances {
            if geometries.contains_key(&instance.name) {
                continue;
            }
            let path = self.source.resolve(AssetKind::ArtObject, dir, &instance.name);
            let geometry = self
                .cache
                .art_objects()
                .try_get_or_insert(cache_key(&path), || {
                    decode_art_object(self.source, &path, self.options.side_convention)
                })?;
            geometries.insert(instance.name.clone(), geometry);
        }
        Ok(geometries)
    }

    fn resolve_background_planes(&self, dir: &Path, planes: &mut [BackgroundPlane]) -> DecodeResult<()> {
        let folder = self.source.folder(AssetKind::BackgroundPlane, dir);
        let style = &self.options.billboard;
        for plane in planes.iter_mut() {
            let texture = self.cached_texture(&folder, &plane.texture_name, plane.animated)?;
            let mut geometry = synthesize_billboard(&texture, style, style.plane_offset);
            geometry.opacity = plane.opacity;
            geometry.double_sided = plane.double_sided;
            plane.geometry = geometry;
        }
        Ok(())
    }

    fn resolve_characters(&self, dir: &Path, characters: &mut [Character]) -> DecodeResult<()> {
        let folder = self.source.folder(AssetKind::CharacterAnimation, dir);
        for character in characters.iter_mut() {
            let animation = character.initial_animation().ok_or(DecodeError::EmptyList { element: "Actions" })?;
            let texture_ref = format!("{}/{}", character.name, animation);
            let texture = self.cached_texture(&folder, &texture_ref, true)?;
            character.geometry = synthesize_billboard(&texture, &self.options.billboard, 0.0);
        }
        Ok(())
    }

    fn cached_texture(&self, folder: &Path, name: &str, animated: bool) -> DecodeResult<Arc<Texture>> {
        let key = texture_cache_key(folder, name);
        self.cache
            .textures()
            .try_get_or_insert(key, || decode_texture(self.source, folder, name, animated))
    }
}

fn enter(stage: &mut LevelStage, next: LevelStage) {
    trace!(from = %stage, to = %next, "level stage");
    *stage = next;
}

fn texture_cache_key(folder: &Path, name: &str) -> String {
    cache_key(&folder.join(name))
}

fn entries<'a, 'i: 'a>(root: Node<'a, 'i>, list: &'static str) -> DecodeResult<impl Iterator<Item = Node<'a, 'i>>> {
    Ok(xml::children(xml::child(root, list)?, "Entry"))
}

fn read_triles(root: Node<'_, '_>) -> DecodeResult<Vec<TrileEmplacement>> {
    entries(root, "Triles")?
        .map(|entry| {
            let emplacement = xml::vec3_attrs(xml::child(entry, "TrileEmplacement")?)?;
            let instance = xml::child(entry, "TrileInstance")?;
            let id = xml::attr_i32(instance, "trileId")?;
            let orientation = Orientation::from_code(xml::attr_i32(instance, "orientation")?)?;
            let position = xml::read_vector3(instance, "Position")?;
            Ok(TrileEmplacement { id, emplacement, position, orientation })
        })
        .collect()
}

fn read_art_objects(root: Node<'_, '_>) -> DecodeResult<Vec<ArtObjectInstance>> {
    entries(root, "ArtObjects")?
        .map(|entry| {
            let instance = xml::child(entry, "ArtObjectInstance")?;
            Ok(ArtObjectInstance {
                name: xml::attr(instance, "name")?.to_string(),
                position: xml::read_vector3(instance, "Position")?,
                rotation: xml::read_quaternion(instance, "Rotation")?,
                scale: xml::read_vector3(instance, "Scale")?,
            })
        })
        .collect()
}

fn read_background_planes(root: Node<'_, '_>) -> DecodeResult<Vec<BackgroundPlane>> {
    entries(root, "BackgroundPlanes")?
        .map(|entry| {
            let plane = xml::child(entry, "BackgroundPlane")?;
            Ok(BackgroundPlane {
                texture_name: xml::attr(plane, "textureName")?.replace('\\', "/"),
                animated: xml::attr_bool(plane, "animated")?,
                opacity: xml::attr_f32(plane, "opacity")?,
                double_sided: xml::attr_bool(plane, "doubleSided")?,
                position: xml::read_vector3(plane, "Position")?,
                rotation: xml::read_quaternion(plane, "Rotation")?,
                scale: xml::read_vector3(plane, "Scale")?,
                geometry: Geometry::default(),
            })
        })
        .collect()
}

fn read_characters(root: Node<'_, '_>) -> DecodeResult<Vec<Character>> {
    entries(root, "NonplayerCharacters")?
        .map(|entry| {
            let npc = xml::child(entry, "NpcInstance")?;
            let name = xml::attr(npc, "name")?.to_string();
            let actions = xml::children(xml::child(npc, "Actions")?, "Action")
                .map(|action| {
                    let content = xml::child(action, "NpcActionContent")?;
                    Ok(CharacterAction {
                        key: xml::attr(action, "key")?.to_string(),
                        animation: xml::attr(content, "animationName")?.to_string(),
                    })
                })
                .collect::<DecodeResult<Vec<_>>>()?;
            if actions.is_empty() {
                return Err(DecodeError::EmptyList { element: "Actions" });
            }
            Ok(Character {
                name,
                actions,
                position: xml::read_vector3(npc, "Position")?,
                rotation: Quat::IDENTITY,
                scale: Vec3::ONE,
                geometry: Geometry::default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::source::MemoryAssetSource;

    const PRIMITIVES: &str = r#"<ShaderInstancedIndexedPrimitives><Vertices>
        <VertexPositionNormalTextureInstance><Position><Vector3 x="0" y="0" z="0"/></Position><Normal>2</Normal><TextureCoord><Vector2 x="0" y="0"/></TextureCoord></VertexPositionNormalTextureInstance>
        <VertexPositionNormalTextureInstance><Position><Vector3 x="1" y="0" z="0"/></Position><Normal>2</Normal><TextureCoord><Vector2 x="1" y="0"/></TextureCoord></VertexPositionNormalTextureInstance>
        <VertexPositionNormalTextureInstance><Position><Vector3 x="0" y="1" z="0"/></Position><Normal>2</Normal><TextureCoord><Vector2 x="0" y="1"/></TextureCoord></VertexPositionNormalTextureInstance>
      </Vertices><Indices><Index>0</Index><Index>1</Index><Index>2</Index></Indices></ShaderInstancedIndexedPrimitives>"#;

    fn trile_set(keys: &[i32]) -> String {
        let entries: String = keys
            .iter()
            .map(|key| format!(r#"<TrileEntry key="{key}"><Trile name="t{key}"><Geometry>{PRIMITIVES}</Geometry></Trile></TrileEntry>"#))
            .collect();
        format!(r#"<TrileSet name="Village"><Triles>{entries}</Triles></TrileSet>"#)
    }

    fn trile_entry(id: i32) -> String {
        format!(
            r#"<Entry><TrileEmplacement x="1" y="2" z="3"/><TrileInstance trileId="{id}" orientation="1"><Position><Vector3 x="1.5" y="2.5" z="3.5"/></Position></TrileInstance></Entry>"#
        )
    }

    const PLACEMENT: &str = r#"<Position><Vector3 x="4" y="5" z="6"/></Position><Rotation><Quaternion x="0" y="0" z="0" w="1"/></Rotation><Scale><Vector3 x="1" y="1" z="1"/></Scale>"#;

    fn level(triles: &[i32], art_objects: &[&str], planes: &str, npcs: &str) -> String {
        let triles: String = triles.iter().map(|id| trile_entry(*id)).collect();
        let art_objects: String = art_objects
            .iter()
            .map(|name| format!(r#"<Entry><ArtObjectInstance name="{name}">{PLACEMENT}</ArtObjectInstance></Entry>"#))
            .collect();
        format!(
            r#"<Level name="village" trileSetName="village_set"><Triles>{triles}</Triles><ArtObjects>{art_objects}</ArtObjects><BackgroundPlanes>{planes}</BackgroundPlanes><NonplayerCharacters>{npcs}</NonplayerCharacters></Level>"#
        )
    }

    fn source_with_assets() -> MemoryAssetSource {
        let mut source = MemoryAssetSource::new();
        source
            .insert_text("content/trile sets/village_set.xml", trile_set(&[1, 2, 3]))
            .insert_text("content/art objects/tree.xml", format!("<ArtObject>{PRIMITIVES}</ArtObject>"))
            .insert_image("content/background planes/sky/clouds.png", 64, 32)
            .insert_image("content/character animations/owl/idle.ani.png", 32, 32)
            .insert_text(
                "content/character animations/owl/idle.xml",
                r#"<AnimatedTexturePC actualWidth="32" actualHeight="32" width="64" height="64"><Frames><FramePC duration="1"><Rectangle x="16" y="0" w="16" h="32"/></FramePC></Frames></AnimatedTexturePC>"#,
            );
        source
    }

    const PLANE: &str = r#"<Entry><BackgroundPlane textureName="sky\clouds" animated="False" opacity="0.5" doubleSided="TRUE"><Position><Vector3 x="0" y="0" z="0"/></Position><Rotation><Quaternion x="0" y="0" z="0" w="1"/></Rotation><Scale><Vector3 x="2" y="2" z="2"/></Scale></BackgroundPlane></Entry>"#;
    const NPC: &str = r#"<Entry><NpcInstance name="owl"><Actions><Action key="Idle"><NpcActionContent animationName="idle"/></Action><Action key="Walk"><NpcActionContent animationName="walk"/></Action></Actions><Position><Vector3 x="7" y="8" z="9"/></Position></NpcInstance></Entry>"#;

    fn decode(source: &MemoryAssetSource, cache: &AssetCache) -> DecodeResult<Level> {
        LevelDecoder::new(source, cache, DecodeOptions::default()).decode(Path::new("content/levels/village.xml"))
    }

    #[test]
    fn assembles_full_level() {
        let mut source = source_with_assets();
        source.insert_text("content/levels/village.xml", level(&[1, 2, -1, 1], &["tree", "tree"], PLANE, NPC));
        let cache = AssetCache::new();
        let level = decode(&source, &cache).expect("level");

        assert_eq!(level.name, "village");
        assert_eq!(level.trile_set_name, "village_set");
        assert_eq!(level.triles.len(), 4);
        assert_eq!(level.trile_geometries.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(level.triles[0].orientation.code(), 1);
        assert_eq!(level.triles[0].emplacement, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(level.art_objects.len(), 2);
        assert_eq!(level.art_object_geometries.len(), 1);

        let plane = &level.background_planes[0];
        assert_eq!(plane.texture_name, "sky/clouds");
        assert!(!plane.animated && plane.double_sided);
        assert_eq!(plane.geometry.name, "clouds.png");
        assert_eq!(plane.geometry.opacity, 0.5);
        assert!(plane.geometry.is_plane);
        assert_eq!(plane.geometry.vertices[0].position, Vec3::new(-4.0, 2.0, 0.05));

        let owl = &level.characters[0];
        assert_eq!(owl.initial_animation(), Some("idle"));
        assert_eq!(owl.actions.len(), 2);
        assert_eq!(owl.geometry.name, "idle.ani.png");
        assert_eq!(owl.geometry.vertices[0].uv, glam::Vec2::new(0.25, 1.0));
        assert_eq!(owl.geometry.opacity, 1.0);
        assert!(owl.geometry.double_sided);

        assert_eq!(cache.trile_sets().len(), 1);
        assert_eq!(cache.art_objects().len(), 1);
        assert_eq!(cache.textures().len(), 2);
    }

    #[test]
    fn missing_trile_id_fails_whole_level() {
        let mut source = source_with_assets();
        source.insert_text("content/levels/village.xml", level(&[1, 7, 2], &[], "", ""));
        let err = decode(&source, &AssetCache::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Level { stage: LevelStage::ResolveTrileSet, .. }), "{err}");
        assert!(matches!(err.root_cause(), DecodeError::MissingTrile { id: 7, .. }));
        assert_eq!(err.kind(), ErrorKind::Reference);
    }

    #[test]
    fn empty_trile_slots_are_never_looked_up() {
        let mut source = MemoryAssetSource::new();
        source
            .insert_text("content/trile sets/village_set.xml", trile_set(&[]))
            .insert_text("content/levels/village.xml", level(&[-1, -1], &[], "", ""));
        let level = decode(&source, &AssetCache::new()).expect("level");
        assert!(level.trile_geometries.is_empty());
        assert_eq!(level.triles.len(), 2);
    }

    #[test]
    fn missing_art_object_fails_level() {
        let mut source = source_with_assets();
        source.insert_text("content/levels/village.xml", level(&[1], &["tree", "rock"], "", ""));
        let err = decode(&source, &AssetCache::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Level { stage: LevelStage::ResolveArtObjects, .. }));
        assert!(matches!(err.root_cause(), DecodeError::MissingAsset { kind: AssetKind::ArtObject, .. }));
    }

    #[test]
    fn invalid_plane_flag_fails_read_stage() {
        let mut source = source_with_assets();
        let plane = PLANE.replace(r#"animated="False""#, r#"animated="yes""#);
        source.insert_text("content/levels/village.xml", level(&[1], &[], &plane, ""));
        let err = decode(&source, &AssetCache::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Level { stage: LevelStage::ReadBackgroundPlanes, .. }));
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn character_without_actions_fails() {
        let mut source = source_with_assets();
        let npc = r#"<Entry><NpcInstance name="owl"><Actions/><Position><Vector3 x="0" y="0" z="0"/></Position></NpcInstance></Entry>"#;
        source.insert_text("content/levels/village.xml", level(&[], &[], "", npc));
        let err = decode(&source, &AssetCache::new()).unwrap_err();
        assert!(matches!(err.root_cause(), DecodeError::EmptyList { element: "Actions" }));
    }

    #[test]
    fn header_and_orientation_are_validated() {
        let mut source = source_with_assets();
        source.insert_text("content/levels/village.xml", r#"<Level name="village"/>"#);
        let err = decode(&source, &AssetCache::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Level { stage: LevelStage::ReadHeader, .. }));

        let text = level(&[1], &[], "", "").replace(r#"orientation="1""#, r#"orientation="5""#);
        source.insert_text("content/levels/village.xml", text);
        let err = decode(&source, &AssetCache::new()).unwrap_err();
        assert!(matches!(err.root_cause(), DecodeError::OrientationOutOfRange(5)));
    }

    #[test]
    fn shared_cache_decodes_trile_set_once() {
        let mut source = source_with_assets();
        source.insert_text("content/levels/village.xml", level(&[1, 2], &["tree"], "", ""));
        let cache = AssetCache::new();
        decode(&source, &cache).expect("first");
        decode(&source, &cache).expect("second");
        assert_eq!(source.read_count("content/trile sets/village_set.xml"), 1);
        assert_eq!(source.read_count("content/art objects/tree.xml"), 1);
        assert_eq!(source.read_count("content/levels/village.xml"), 2);
    }

    #[test]
    fn unreadable_level_fails_in_init() {
        let source = MemoryAssetSource::new();
        let err = decode(&source, &AssetCache::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Level { stage: LevelStage::Init, .. }));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
