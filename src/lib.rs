pub mod art_object;
pub mod batch;
pub mod billboard;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod level;
pub mod level_decoder;
pub mod primitives;
pub mod source;
pub mod texture;
pub mod trile_set;
pub(crate) mod xml;

pub use batch::{discover_assets, BatchKind, BatchReport, BatchRunner};
pub use cache::AssetCache;
pub use config::ExportConfig;
pub use error::{DecodeError, DecodeResult, ErrorKind};
pub use export::{InterchangeWriter, ObjWriter};
pub use geometry::{AnimationFrame, Geometry, Texture, Vertex};
pub use level::Level;
pub use level_decoder::{DecodeOptions, LevelDecoder, LevelStage};
pub use source::{AssetKind, AssetSource, FsAssetSource, MemoryAssetSource};
