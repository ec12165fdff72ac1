//! Importer-neutral in-memory scene: meshes grouped by material.

use std::collections::HashMap;

/// One polygon, point or line as a list of indices into the mesh's
/// per-vertex arrays.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Face {
    pub indices: Vec<u32>,
}

impl Face {
    pub fn new(indices: Vec<u32>) -> Self {
        Self { indices }
    }

    pub fn triangle(a: u32, b: u32, c: u32) -> Self {
        Self::new(vec![a, b, c])
    }

    #[inline]
    pub fn is_triangle(&self) -> bool {
        self.indices.len() == 3
    }
}

/// Geometry for a single material. All per-vertex arrays are indexed by the
/// same vertex index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    /// Texture coordinate channels, channel 0 first.
    pub tex_coords: Vec<Vec<[f32; 2]>>,
    pub tangents: Option<Vec<[f32; 3]>>,
    pub bitangents: Option<Vec<[f32; 3]>>,
    pub faces: Vec<Face>,
    pub material_index: usize,
}

impl SourceMesh {
    pub fn new(name: impl Into<String>, positions: Vec<[f32; 3]>, faces: Vec<Face>) -> Self {
        Self {
            name: name.into(),
            positions,
            faces,
            ..Default::default()
        }
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_tex_coords(mut self, channel: Vec<[f32; 2]>) -> Self {
        self.tex_coords.push(channel);
        self
    }

    pub fn with_material(mut self, material_index: usize) -> Self {
        self.material_index = material_index;
        self
    }

    #[inline]
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    #[inline]
    pub fn has_tex_coords(&self, channel: usize) -> bool {
        self.tex_coords.get(channel).is_some_and(|c| !c.is_empty())
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Texture slots a material can reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Diffuse,
    Ambient,
    Specular,
    Emissive,
    Normals,
}

/// Material properties as found in the source file. Absent properties stay
/// `None`; defaults are applied by the consumer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceMaterial {
    pub name: String,
    pub diffuse: Option<[f32; 4]>,
    pub ambient: Option<[f32; 4]>,
    pub specular: Option<[f32; 4]>,
    pub emissive: Option<[f32; 4]>,
    pub shininess: Option<f32>,
    textures: HashMap<TextureSlot, Vec<String>>,
}

impl SourceMaterial {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Appends a texture reference to `slot`; the first one added is index 0.
    pub fn add_texture(&mut self, slot: TextureSlot, path: impl Into<String>) {
        self.textures.entry(slot).or_default().push(path.into());
    }

    pub fn with_texture(mut self, slot: TextureSlot, path: impl Into<String>) -> Self {
        self.add_texture(slot, path);
        self
    }

    /// Texture path at `index` in `slot`, `None` once the slot is exhausted.
    pub fn texture(&self, slot: TextureSlot, index: usize) -> Option<&str> {
        self.textures
            .get(&slot)
            .and_then(|paths| paths.get(index))
            .map(String::as_str)
    }

    /// All texture paths in `slot`, in index order.
    pub fn textures(&self, slot: TextureSlot) -> impl Iterator<Item = &str> {
        (0..).map_while(move |i| self.texture(slot, i))
    }
}

/// Result of importing a model file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub meshes: Vec<SourceMesh>,
    pub materials: Vec<SourceMaterial>,
}

impl Scene {
    /// Total face count across all meshes.
    pub fn face_count(&self) -> usize {
        self.meshes.iter().map(|m| m.faces.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_enumeration_stops_at_first_gap() {
        let mat = SourceMaterial::new("m")
            .with_texture(TextureSlot::Diffuse, "a.png")
            .with_texture(TextureSlot::Diffuse, "b.png")
            .with_texture(TextureSlot::Specular, "s.png");
        assert_eq!(mat.texture(TextureSlot::Diffuse, 0), Some("a.png"));
        assert_eq!(mat.texture(TextureSlot::Diffuse, 2), None);
        assert_eq!(
            mat.textures(TextureSlot::Diffuse).collect::<Vec<_>>(),
            vec!["a.png", "b.png"]
        );
        assert_eq!(mat.textures(TextureSlot::Emissive).count(), 0);
    }

    #[test]
    fn tex_coord_channel_presence() {
        let mesh = SourceMesh::new("m", vec![[0.0; 3]], vec![]);
        assert!(!mesh.has_tex_coords(0));
        let mesh = mesh.with_tex_coords(vec![[0.5, 0.5]]);
        assert!(mesh.has_tex_coords(0));
        assert!(!mesh.has_tex_coords(1));
    }
}
