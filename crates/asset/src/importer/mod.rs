//! Scene importers. Each backend parses one family of formats into a
//! [`Scene`]; [`SceneImporter::read_file`] then runs the requested
//! post-processing.

use std::path::Path;

use crate::{
    postprocess::{self, PostProcess},
    scene::Scene,
};

mod gltf_file;
mod obj;

pub use self::gltf_file::GltfImporter;
pub use self::obj::ObjImporter;

/// A model-file parser. Errors are the importer's diagnostic text.
pub trait SceneImporter {
    /// Parse `path` without post-processing. `flags` lets a backend do a step
    /// natively (the later generic pass is then a no-op).
    fn import(&self, path: &Path, flags: PostProcess) -> Result<Scene, String>;

    /// Whether this importer handles files with extension `ext` (lowercase,
    /// without the dot).
    fn can_read(&self, ext: &str) -> bool;

    /// Parse `path` and apply `flags`.
    fn read_file(&self, path: &Path, flags: PostProcess) -> Result<Scene, String> {
        let mut scene = self.import(path, flags)?;
        postprocess::apply(&mut scene, flags);
        Ok(scene)
    }
}

/// Dispatches to a backend by file extension.
pub struct AutoImporter {
    backends: Vec<Box<dyn SceneImporter>>,
}

impl AutoImporter {
    pub fn new() -> Self {
        Self {
            backends: vec![Box::new(ObjImporter), Box::new(GltfImporter)],
        }
    }

    fn backend_for(&self, path: &Path) -> Result<&dyn SceneImporter, String> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| format!("No file extension to pick an importer: {}", path.display()))?;
        self.backends
            .iter()
            .find(|b| b.can_read(&ext))
            .map(|b| b.as_ref())
            .ok_or_else(|| format!("No suitable reader found for the file format of '.{ext}'"))
    }
}

impl Default for AutoImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneImporter for AutoImporter {
    fn import(&self, path: &Path, flags: PostProcess) -> Result<Scene, String> {
        self.backend_for(path)?.import(path, flags)
    }

    fn can_read(&self, ext: &str) -> bool {
        self.backends.iter().any(|b| b.can_read(ext))
    }
}
