#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

pub const PRIMITIVES: &str = r#"<ShaderInstancedIndexedPrimitives>
  <Vertices>
    <VertexPositionNormalTextureInstance><Position><Vector3 x="0" y="0" z="0"/></Position><Normal>2</Normal><TextureCoord><Vector2 x="0" y="0"/></TextureCoord></VertexPositionNormalTextureInstance>
    <VertexPositionNormalTextureInstance><Position><Vector3 x="1" y="0" z="0"/></Position><Normal>2</Normal><TextureCoord><Vector2 x="1" y="0"/></TextureCoord></VertexPositionNormalTextureInstance>
    <VertexPositionNormalTextureInstance><Position><Vector3 x="1" y="1" z="0"/></Position><Normal>2</Normal><TextureCoord><Vector2 x="1" y="1"/></TextureCoord></VertexPositionNormalTextureInstance>
    <VertexPositionNormalTextureInstance><Position><Vector3 x="0" y="1" z="0"/></Position><Normal>2</Normal><TextureCoord><Vector2 x="0" y="1"/></TextureCoord></VertexPositionNormalTextureInstance>
  </Vertices>
  <Indices><Index>0</Index><Index>1</Index><Index>2</Index><Index>0</Index><Index>2</Index><Index>3</Index></Indices>
</ShaderInstancedIndexedPrimitives>"#;

pub fn art_object_xml() -> String {
    format!("<ArtObject name=\"tree\">{PRIMITIVES}</ArtObject>")
}

pub fn trile_set_xml(name: &str, keys: &[i32]) -> String {
    let entries: String = keys
        .iter()
        .map(|key| {
            format!(r#"<TrileEntry key="{key}"><Trile name="block{key}"><Geometry>{PRIMITIVES}</Geometry></Trile></TrileEntry>"#)
        })
        .collect();
    format!(r#"<TrileSet name="{name}"><Triles>{entries}</Triles></TrileSet>"#)
}

const PLACEMENT: &str = r#"<Position><Vector3 x="2" y="1" z="2"/></Position><Rotation><Quaternion x="0" y="0" z="0" w="1"/></Rotation><Scale><Vector3 x="1" y="1" z="1"/></Scale>"#;

pub fn level_xml(name: &str, trile_set: &str, trile_ids: &[i32]) -> String {
    let triles: String = trile_ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            format!(
                r#"<Entry><TrileEmplacement x="{i}" y="0" z="0"/><TrileInstance trileId="{id}" orientation="2"><Position><Vector3 x="{i}.5" y="0.5" z="0.5"/></Position></TrileInstance></Entry>"#
            )
        })
        .collect();
    format!(
        r#"<Level name="{name}" trileSetName="{trile_set}">
  <Triles>{triles}</Triles>
  <ArtObjects>
    <Entry><ArtObjectInstance name="tree">{PLACEMENT}</ArtObjectInstance></Entry>
    <Entry><ArtObjectInstance name="tree">{PLACEMENT}</ArtObjectInstance></Entry>
  </ArtObjects>
  <BackgroundPlanes>
    <Entry><BackgroundPlane textureName="sky\clouds" animated="false" opacity="0.75" doubleSided="true">{PLACEMENT}</BackgroundPlane></Entry>
  </BackgroundPlanes>
  <NonplayerCharacters>
    <Entry><NpcInstance name="owl"><Actions><Action key="Idle"><NpcActionContent animationName="idle"/></Action></Actions><Position><Vector3 x="3" y="1" z="3"/></Position></NpcInstance></Entry>
  </NonplayerCharacters>
</Level>"#
    )
}

pub const OWL_IDLE_DESCRIPTOR: &str = r#"<AnimatedTexturePC actualWidth="32" actualHeight="16" width="64" height="16">
  <Frames>
    <FramePC duration="200"><Rectangle x="0" y="0" w="32" h="16"/></FramePC>
    <FramePC duration="200"><Rectangle x="32" y="0" w="32" h="16"/></FramePC>
  </Frames>
</AnimatedTexturePC>"#;

fn write(path: PathBuf, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

fn write_png(path: PathBuf, width: u32, height: u32, translucent: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 180, 160, 255]));
    if translucent {
        img.put_pixel(0, 0, image::Rgba([200, 180, 160, 0]));
    }
    img.save(path)?;
    Ok(())
}

/// Lays out a content tree with one level folder and its sibling asset folders.
pub fn write_content(root: &Path) -> Result<()> {
    write(root.join("levels/village.xml"), level_xml("village", "village_set", &[1, 2, -1, 1]))?;
    write(root.join("trile sets/village_set.xml"), trile_set_xml("Village", &[1, 2, 3]))?;
    write_png(root.join("trile sets/village_set.png"), 8, 8, false)?;
    write(root.join("art objects/tree.xml"), art_object_xml())?;
    write_png(root.join("art objects/tree.png"), 8, 8, false)?;
    write_png(root.join("background planes/sky/clouds.png"), 64, 32, true)?;
    write_png(root.join("character animations/owl/idle.ani.png"), 64, 16, false)?;
    write(root.join("character animations/owl/idle.xml"), OWL_IDLE_DESCRIPTOR)?;
    Ok(())
}

/// Adds a level referencing a trile id its set does not define.
pub fn write_broken_level(root: &Path, name: &str) -> Result<()> {
    write(root.join(format!("levels/{name}.xml")), level_xml(name, "village_set", &[1, 7]))
}
