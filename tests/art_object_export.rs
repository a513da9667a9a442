mod common;

use anyhow::Result;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;
use trile_export::{discover_assets, BatchKind, BatchRunner, ExportConfig, FsAssetSource, ObjWriter};

fn runner(out: &std::path::Path, copy_textures: bool) -> BatchRunner {
    let mut config = ExportConfig::default();
    config.batch.workers = Some(2);
    let source = Arc::new(FsAssetSource::new(config.folders.clone()));
    let writer = Arc::new(ObjWriter::new(out, copy_textures));
    BatchRunner::new(&config, source, writer)
}

#[test]
fn exports_art_objects_and_skips_broken_files() -> Result<()> {
    let dir = tempdir()?;
    let content = dir.path().join("content");
    common::write_content(&content)?;
    let folder = content.join("art objects");
    fs::write(folder.join("broken.xml"), "<ArtObject name=\"broken\"><Vertices/></ArtObject>")?;
    fs::write(folder.join("notes.txt"), "not an asset")?;

    let out = dir.path().join("out");
    let report = runner(&out, true).run(BatchKind::ArtObjects, discover_assets(&[&folder])?);

    assert_eq!(report.exported, vec![folder.join("tree.xml")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, folder.join("broken.xml"));
    assert!(!report.stopped, "art object failures never stop a batch");

    let obj = fs::read_to_string(out.join("tree.obj"))?;
    assert!(obj.lines().any(|line| line == "o tree"));
    assert!(obj.lines().any(|line| line == "usemtl tree.png"));
    // Winding is stored with the second and third index swapped.
    let faces: Vec<&str> = obj.lines().filter(|line| line.starts_with("f ")).collect();
    assert_eq!(faces, vec!["f 1/1/1 3/3/3 2/2/2", "f 1/1/1 4/4/4 3/3/3"]);
    assert!(out.join("tree.png").is_file());
    Ok(())
}

#[test]
fn exports_each_trile_of_a_set() -> Result<()> {
    let dir = tempdir()?;
    let content = dir.path().join("content");
    common::write_content(&content)?;

    let out = dir.path().join("out");
    let report = runner(&out, true).run(BatchKind::TrileSets, discover_assets(&[content.join("trile sets")])?);

    assert!(report.is_clean(), "unexpected failures: {:?}", report.failed);
    assert_eq!(
        report.outputs,
        vec![out.join("Village/1_block1.obj"), out.join("Village/2_block2.obj"), out.join("Village/3_block3.obj")]
    );
    let mtl = fs::read_to_string(out.join("Village/2_block2.mtl"))?;
    assert!(mtl.contains("map_Kd Village.png"));
    assert!(out.join("Village/Village.png").is_file());
    Ok(())
}

#[test]
fn missing_input_path_is_reported() {
    let dir = tempdir().expect("temp dir");
    let err = discover_assets(&[dir.path().join("nowhere")]).unwrap_err();
    assert!(err.to_string().contains("does not exist"), "{err}");
}
