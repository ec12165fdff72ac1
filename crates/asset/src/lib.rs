//! Asset loading: scene import, post-processing and texture decoding.
//!
//! Importers turn a model file into an importer-neutral [`scene::Scene`];
//! [`postprocess`] reshapes it (triangulation, vertex joining, primitive
//! sorting, tangents) before the renderer flattens it for upload.

pub mod error;
pub mod importer;
pub mod postprocess;
pub mod scene;
pub mod texture;

pub use error::{LoadError, LoadResult};
pub use importer::{AutoImporter, SceneImporter};
pub use postprocess::PostProcess;
pub use scene::{Face, Scene, SourceMaterial, SourceMesh, TextureSlot};
pub use texture::TextureData;
