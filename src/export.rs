//! Interchange output: turns decoded geometry and levels into Wavefront OBJ/MTL files.
//!
//! Writers receive finished triangle lists and placements; they never touch winding or
//! normals beyond applying the node transform.

use anyhow::{Context, Result};
use glam::{Mat3, Mat4};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::geometry::Geometry;
use crate::level::{Level, Placement, SceneNode};
use crate::trile_set::TrileSet;

/// Copy instruction for a texture used by an exported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureCopy {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportManifest {
    pub mesh_path: PathBuf,
    pub material_path: PathBuf,
    pub textures: Vec<TextureCopy>,
}

/// Consumer of decoded assets.
pub trait InterchangeWriter: Send + Sync {
    /// Writes one geometry at the origin, named after the geometry.
    fn write_geometry(&self, geometry: &Geometry) -> Result<ExportManifest>;

    /// Writes every trile of a set as its own file.
    fn write_trile_set(&self, set: &TrileSet) -> Result<Vec<ExportManifest>>;

    /// Writes every placed node of a level, named after the level.
    fn write_level(&self, level: &Level) -> Result<ExportManifest>;
}

#[derive(Debug, Clone)]
pub struct ObjWriter {
    out_dir: PathBuf,
    copy_textures: bool,
}

impl ObjWriter {
    pub fn new(out_dir: impl Into<PathBuf>, copy_textures: bool) -> Self {
        Self { out_dir: out_dir.into(), copy_textures }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn write_scene(&self, name: &str, nodes: &[SceneNode<'_>]) -> Result<ExportManifest> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("Failed to create output directory {}", self.out_dir.display()))?;
        let mesh_path = self.out_dir.join(format!("{name}.obj"));
        let material_path = self.out_dir.join(format!("{name}.mtl"));

        let plan = MaterialPlan::build(&self.out_dir, nodes);
        write_mtl(&material_path, &plan.materials)?;
        write_obj(&mesh_path, &format!("{name}.mtl"), nodes, &plan)?;

        let manifest = ExportManifest { mesh_path, material_path, textures: plan.textures };
        if self.copy_textures {
            copy_textures(&manifest)?;
        }
        debug!(
            mesh = %manifest.mesh_path.display(),
            nodes = nodes.len(),
            materials = plan.materials.len(),
            triangles = nodes.iter().map(|node| node.geometry.triangle_count()).sum::<usize>(),
            "wrote interchange file"
        );
        Ok(manifest)
    }
}

impl InterchangeWriter for ObjWriter {
    fn write_geometry(&self, geometry: &Geometry) -> Result<ExportManifest> {
        let node = SceneNode { name: &geometry.name, geometry, placement: Placement::default() };
        self.write_scene(&geometry.name, &[node])
    }

    /// Triles land in a folder named after the set and share one texture copy.
    fn write_trile_set(&self, set: &TrileSet) -> Result<Vec<ExportManifest>> {
        let writer = ObjWriter::new(self.out_dir.join(&set.name), false);
        let manifests =
            set.triles.values().map(|geometry| writer.write_geometry(geometry)).collect::<Result<Vec<_>>>()?;
        if self.copy_textures {
            if let Some(first) = manifests.first() {
                copy_textures(first)?;
            }
        }
        Ok(manifests)
    }

    fn write_level(&self, level: &Level) -> Result<ExportManifest> {
        self.write_scene(&level.name, &level.scene_nodes())
    }
}

/// Copies every listed texture, skipping sources that do not exist. Returns how many were copied.
pub fn copy_textures(manifest: &ExportManifest) -> Result<usize> {
    let mut copied = 0;
    for copy in &manifest.textures {
        if !copy.source.is_file() {
            warn!(source = %copy.source.display(), "texture source missing; not copied");
            continue;
        }
        if let Some(parent) = copy.destination.parent() {
            fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::copy(&copy.source, &copy.destination).with_context(|| {
            format!("Failed to copy {} to {}", copy.source.display(), copy.destination.display())
        })?;
        copied += 1;
    }
    Ok(copied)
}

struct Material {
    name: String,
    /// Texture file, or the geometry name for untextured geometry, before deduplication.
    base: String,
    /// Output file name of the diffuse map, relative to the material library.
    texture: Option<String>,
    opacity: f32,
    double_sided: bool,
    transparent: bool,
}

/// Materials, per-node assignments and texture copies for one output file.
///
/// Nodes share a material only when texture, opacity and sidedness all match. Textures from
/// different sources never share an output file name.
struct MaterialPlan {
    materials: Vec<Material>,
    assignments: Vec<usize>,
    textures: Vec<TextureCopy>,
}

impl MaterialPlan {
    fn build(out_dir: &Path, nodes: &[SceneNode<'_>]) -> Self {
        let mut plan =
            MaterialPlan { materials: Vec::new(), assignments: Vec::with_capacity(nodes.len()), textures: Vec::new() };
        let mut files: HashMap<&Path, String> = HashMap::new();
        let mut taken_files: HashSet<String> = HashSet::new();
        let mut taken_names: HashSet<String> = HashSet::new();
        let mut transparency: HashMap<&Path, bool> = HashMap::new();

        for node in nodes {
            let geometry = node.geometry;
            let texture = &geometry.texture;
            let file = if texture.name.is_empty() {
                None
            } else if let Some(file) = files.get(texture.source.as_path()) {
                Some(file.clone())
            } else {
                let file = unique_file_name(&texture.name, &texture.source, &taken_files);
                taken_files.insert(file.clone());
                files.insert(texture.source.as_path(), file.clone());
                plan.textures.push(TextureCopy { source: texture.source.clone(), destination: out_dir.join(&file) });
                Some(file)
            };

            let base = file.clone().unwrap_or_else(|| geometry.name.clone());
            let existing = plan.materials.iter().position(|material| {
                material.base == base
                    && material.texture == file
                    && material.opacity == geometry.opacity
                    && material.double_sided == geometry.double_sided
            });
            let index = match existing {
                Some(index) => index,
                None => {
                    let transparent = geometry.is_plane
                        && file.is_some()
                        && *transparency
                            .entry(texture.source.as_path())
                            .or_insert_with(|| has_transparency(&texture.source));
                    let name = unique_name(&base, &taken_names);
                    taken_names.insert(name.clone());
                    plan.materials.push(Material {
                        name,
                        base,
                        texture: file,
                        opacity: geometry.opacity,
                        double_sided: geometry.double_sided,
                        transparent,
                    });
                    plan.materials.len() - 1
                }
            };
            plan.assignments.push(index);
        }
        plan
    }
}

/// Keeps the texture's own name unless another source already uses it, then prefixes the
/// source folder name and finally a counter.
fn unique_file_name(name: &str, source: &Path, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    if let Some(folder) = source.parent().and_then(|parent| parent.file_name()) {
        let candidate = format!("{}_{name}", folder.to_string_lossy());
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
    (2..)
        .map(|n| format!("{n}_{name}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// True when any pixel of the image is not fully opaque. Unreadable images count as opaque.
pub fn has_transparency(path: &Path) -> bool {
    match image::open(path) {
        Ok(img) => img.to_rgba8().pixels().any(|pixel| pixel.0[3] < u8::MAX),
        Err(err) => {
            debug!(path = %path.display(), "cannot inspect texture alpha: {err}");
            false
        }
    }
}

fn write_mtl(path: &Path, materials: &[Material]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "# trile_export materials")?;
    for material in materials {
        writeln!(out)?;
        writeln!(out, "newmtl {}", material.name)?;
        writeln!(out, "Ka 0.000000 0.000000 0.000000")?;
        writeln!(out, "Kd 1.000000 1.000000 1.000000")?;
        writeln!(out, "d {:.6}", material.opacity)?;
        if material.double_sided {
            writeln!(out, "# two-sided")?;
        }
        if let Some(texture) = &material.texture {
            writeln!(out, "map_Kd {texture}")?;
            if material.transparent {
                writeln!(out, "map_d {texture}")?;
            }
        }
    }
    out.flush().with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn write_obj(path: &Path, mtl_file: &str, nodes: &[SceneNode<'_>], plan: &MaterialPlan) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "# trile_export")?;
    writeln!(out, "mtllib {mtl_file}")?;

    let mut base = 1u32;
    for (node, &material) in nodes.iter().zip(&plan.assignments) {
        let geometry = node.geometry;
        let matrix: Mat4 = node.placement.matrix();
        let normal_matrix = Mat3::from_mat4(matrix).inverse().transpose();

        writeln!(out, "o {}", node.name)?;
        for vertex in &geometry.vertices {
            let p = matrix.transform_point3(vertex.position);
            writeln!(out, "v {:.6} {:.6} {:.6}", p.x, p.y, p.z)?;
        }
        for vertex in &geometry.vertices {
            writeln!(out, "vt {:.6} {:.6}", vertex.uv.x, vertex.uv.y)?;
        }
        for vertex in &geometry.vertices {
            let n = (normal_matrix * vertex.normal).normalize_or_zero();
            writeln!(out, "vn {:.6} {:.6} {:.6}", n.x, n.y, n.z)?;
        }
        writeln!(out, "usemtl {}", plan.materials[material].name)?;
        for [a, b, c] in geometry.triangles() {
            let (a, b, c) = (a + base, b + base, c + base);
            writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
        }
        base += geometry.vertices.len() as u32;
    }
    out.flush().with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
