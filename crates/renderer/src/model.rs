//! Imported model: flattened vertex stream, per-mesh materials and the
//! texture table, uploaded to a [`GraphicsDevice`](crate::device::GraphicsDevice).
//!
//! Loading is split in two: [`ModelData::from_scene`] flattens an imported
//! scene on the CPU, [`Model::upload`] creates the device resources.

use std::{
    collections::BTreeMap,
    fs::File,
    mem::{offset_of, size_of},
    path::{Path, PathBuf},
};

use asset::{
    LoadError, LoadResult, PostProcess, Scene, SceneImporter, SourceMaterial, SourceMesh,
    TextureData, TextureSlot,
};
use bytemuck::{Pod, Zeroable};
use corelib::{Vec3, bounds::Aabb};

use crate::{
    device::{DeviceRef, SamplerDesc, TextureHandle, UniformLocation, VertexAttrib},
    resources::{Texture, VertexArray, VertexBuffer},
    shader::Program,
};

/// Vertex with position/normal/uv, tightly packed for upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    pub const STRIDE: u32 = size_of::<Vertex>() as u32;

    /// Position, normal and texture coordinates at attribute slots 0, 1, 2.
    pub const ATTRIBUTES: [VertexAttrib; 3] = [
        VertexAttrib {
            index: 0,
            components: 3,
            stride: Self::STRIDE,
            offset: offset_of!(Vertex, position) as u32,
        },
        VertexAttrib {
            index: 1,
            components: 3,
            stride: Self::STRIDE,
            offset: offset_of!(Vertex, normal) as u32,
        },
        VertexAttrib {
            index: 2,
            components: 2,
            stride: Self::STRIDE,
            offset: offset_of!(Vertex, tex_coords) as u32,
        },
    ];
}

/// Normal used when the source mesh has none. Not unit length.
pub const FALLBACK_NORMAL: [f32; 3] = [1.0, 1.0, 1.0];

/// Convert a V coordinate from the source convention (origin bottom-left)
/// to the sampling convention (origin top-left).
#[inline]
pub fn flip_v(v: f32) -> f32 {
    1.0 - v
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub diffuse: [f32; 4],
    pub ambient: [f32; 4],
    pub specular: [f32; 4],
    pub emissive: [f32; 4],
    pub shininess: f32,
    pub tex_count: i32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse: [0.8, 0.8, 0.8, 1.0],
            ambient: [0.2, 0.2, 0.2, 1.0],
            specular: [0.0, 0.0, 0.0, 1.0],
            emissive: [0.0, 0.0, 0.0, 1.0],
            shininess: 0.0,
            tex_count: 0,
        }
    }
}

impl Material {
    /// Copy the colors present in `src`; absent ones keep their defaults.
    pub fn from_source(src: &SourceMaterial) -> Self {
        let d = Self::default();
        Self {
            diffuse: src.diffuse.unwrap_or(d.diffuse),
            ambient: src.ambient.unwrap_or(d.ambient),
            specular: src.specular.unwrap_or(d.specular),
            emissive: src.emissive.unwrap_or(d.emissive),
            shininess: src.shininess.unwrap_or(d.shininess),
            tex_count: 0,
        }
    }
}

/// Run of the shared vertex stream drawn with one material, before upload.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    pub nb_vertices: u32,
    pub material: Material,
    /// Diffuse texture path (normalized), if the material has one.
    pub texture_path: Option<String>,
}

/// Uploaded mesh: vertex run, material and the texture to bind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mesh {
    pub nb_vertices: u32,
    pub material: Material,
    pub texture: Option<TextureHandle>,
}

/// Texture path to device texture, one entry per distinct path.
///
/// Paths are registered with an empty slot during discovery and filled by
/// [`TextureTable::upload`]. Dropping the table deletes every texture it
/// created.
#[derive(Default)]
pub struct TextureTable {
    entries: BTreeMap<String, Option<Texture>>,
}

impl TextureTable {
    /// Register every diffuse texture referenced by any material.
    pub fn discover(scene: &Scene) -> Self {
        let mut table = Self::default();
        for material in &scene.materials {
            for path in material.textures(TextureSlot::Diffuse) {
                table.register(path);
            }
        }
        table
    }

    /// Returns `true` if `path` was not registered before.
    pub fn register(&mut self, path: &str) -> bool {
        let key = normalize_texture_path(path);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, None);
        true
    }

    /// Decode and create a device texture for every registered path that has
    /// none yet. Each file is `texture_dir/<path>`.
    pub fn upload(&mut self, device: &DeviceRef, texture_dir: &Path) -> LoadResult<()> {
        if self.entries.is_empty() {
            log::debug!("No textures referenced, skipping texture upload");
            return Ok(());
        }
        for (path, slot) in self.entries.iter_mut().filter(|(_, s)| s.is_none()) {
            let data = TextureData::load(texture_dir.join(path))?;
            let texture = Texture::from_rgb8(
                device,
                data.width,
                data.height,
                &data.data,
                SamplerDesc::REPEAT_LINEAR,
            );
            log::debug!("Texture '{}' -> {}", path, texture.handle());
            *slot = Some(texture);
        }
        Ok(())
    }

    /// Device texture for `path`, if registered and uploaded.
    pub fn handle(&self, path: &str) -> Option<TextureHandle> {
        self.entries
            .get(&normalize_texture_path(path))?
            .as_ref()
            .map(Texture::handle)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key form of a material texture path: trimmed, forward slashes, no
/// leading `./`.
pub fn normalize_texture_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    match path.strip_prefix("./") {
        Some(rest) => rest.to_owned(),
        None => path,
    }
}

/// CPU-side result of flattening a scene.
#[derive(Default)]
pub struct ModelData {
    pub vertices: Vec<Vertex>,
    pub meshes: Vec<MeshData>,
    pub textures: TextureTable,
}

impl ModelData {
    /// Discover textures, then emit one vertex per triangle corner for every
    /// mesh in scene order.
    pub fn from_scene(scene: &Scene) -> LoadResult<Self> {
        let textures = TextureTable::discover(scene);

        let mut vertices = Vec::with_capacity(scene.face_count() * 3);
        let mut meshes = Vec::with_capacity(scene.meshes.len());
        for mesh in &scene.meshes {
            let start = vertices.len();
            flatten_mesh(mesh, &mut vertices)?;

            let source = scene.materials.get(mesh.material_index).ok_or_else(|| {
                LoadError::Import(format!(
                    "Mesh '{}' references material {} of {}",
                    mesh.name,
                    mesh.material_index,
                    scene.materials.len()
                ))
            })?;
            let mut material = Material::from_source(source);
            let texture_path = source
                .texture(TextureSlot::Diffuse, 0)
                .map(normalize_texture_path);
            material.tex_count = i32::from(texture_path.is_some());

            meshes.push(MeshData {
                nb_vertices: (vertices.len() - start) as u32,
                material,
                texture_path,
            });
        }

        Ok(Self {
            vertices,
            meshes,
            textures,
        })
    }
}

fn flatten_mesh(mesh: &SourceMesh, out: &mut Vec<Vertex>) -> LoadResult<()> {
    let out_of_range = |what: &str, i: usize| {
        LoadError::Import(format!("Mesh '{}': {what} index {i} out of range", mesh.name))
    };
    let uvs = mesh.tex_coords.first().filter(|c| !c.is_empty());

    for (f, face) in mesh.faces.iter().enumerate() {
        if !face.is_triangle() {
            return Err(LoadError::Import(format!(
                "Mesh '{}': face {f} has {} indices, expected a triangle",
                mesh.name,
                face.indices.len()
            )));
        }
        for &index in &face.indices {
            let i = index as usize;
            let position = *mesh.positions.get(i).ok_or_else(|| out_of_range("position", i))?;
            let tex_coords = match uvs {
                Some(channel) => {
                    let [u, v] = *channel.get(i).ok_or_else(|| out_of_range("uv", i))?;
                    [u, flip_v(v)]
                }
                None => [position[0], position[1]],
            };
            let normal = match &mesh.normals {
                Some(normals) => *normals.get(i).ok_or_else(|| out_of_range("normal", i))?,
                None => FALLBACK_NORMAL,
            };
            out.push(Vertex {
                position,
                normal,
                tex_coords,
            });
        }
    }
    Ok(())
}

/// Where model files are read from and how they are post-processed.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    /// Directory material texture paths are resolved against.
    pub texture_dir: PathBuf,
    pub post_process: PostProcess,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            texture_dir: PathBuf::from("data"),
            post_process: PostProcess::model_defaults(),
        }
    }
}

/// Material uniform locations in the active program.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MaterialUniforms {
    pub diffuse: Option<UniformLocation>,
    pub ambient: Option<UniformLocation>,
    pub specular: Option<UniformLocation>,
    pub emissive: Option<UniformLocation>,
    pub shininess: Option<UniformLocation>,
    pub tex_count: Option<UniformLocation>,
}

impl MaterialUniforms {
    /// Look up `uDiffuse`, `uAmbient`, `uSpecular`, `uEmissive`, `uShininess`
    /// and `uTexCount`. Missing names stay `None`.
    pub fn resolve(program: &Program) -> Self {
        Self {
            diffuse: program.uniform_location("uDiffuse"),
            ambient: program.uniform_location("uAmbient"),
            specular: program.uniform_location("uSpecular"),
            emissive: program.uniform_location("uEmissive"),
            shininess: program.uniform_location("uShininess"),
            tex_count: program.uniform_location("uTexCount"),
        }
    }
}

pub struct Model {
    device: DeviceRef,
    meshes: Vec<Mesh>,
    vertices: Vec<Vertex>,
    bounds: Option<Aabb>,
    uniforms: MaterialUniforms,
    // Drop order: vertex array before the buffer it reads from.
    vao: VertexArray,
    #[allow(dead_code)]
    vbo: VertexBuffer,
    textures: TextureTable,
}

impl Model {
    /// Import `path`, flatten it and upload everything to `device`.
    pub fn load(
        device: &DeviceRef,
        importer: &dyn SceneImporter,
        path: &Path,
        config: &ModelConfig,
        uniforms: MaterialUniforms,
    ) -> LoadResult<Self> {
        File::open(path).map_err(|source| LoadError::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;

        let scene = importer
            .read_file(path, config.post_process)
            .map_err(LoadError::Import)?;
        let data = ModelData::from_scene(&scene)?;
        let model = Self::upload(device, data, config, uniforms)?;

        log::info!(
            "Loaded model {}: {} meshes, {} vertices, {} textures",
            path.display(),
            model.meshes.len(),
            model.vertices.len(),
            model.textures.len()
        );
        Ok(model)
    }

    /// Upload textures, then the vertex stream as one static buffer with the
    /// [`Vertex::ATTRIBUTES`] layout.
    pub fn upload(
        device: &DeviceRef,
        data: ModelData,
        config: &ModelConfig,
        uniforms: MaterialUniforms,
    ) -> LoadResult<Self> {
        let ModelData {
            vertices,
            meshes,
            mut textures,
        } = data;

        textures.upload(device, &config.texture_dir)?;

        let meshes = meshes
            .into_iter()
            .map(|mesh| {
                let texture = mesh
                    .texture_path
                    .as_deref()
                    .and_then(|p| textures.handle(p));
                Mesh {
                    nb_vertices: mesh.nb_vertices,
                    material: Material {
                        tex_count: i32::from(texture.is_some()),
                        ..mesh.material
                    },
                    texture,
                }
            })
            .collect();

        if vertices.is_empty() {
            log::warn!("Model has no triangles");
        }
        let vbo = VertexBuffer::with_data(device, bytemuck::cast_slice(&vertices));
        let vao = VertexArray::new(device);
        vao.configure(&vbo, &Vertex::ATTRIBUTES);

        let bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from_array(v.position)));

        Ok(Self {
            device: device.clone(),
            meshes,
            vertices,
            bounds,
            uniforms,
            vao,
            vbo,
            textures,
        })
    }

    /// One draw per mesh, in order, from consecutive runs of the stream.
    /// Material uniforms are written for every mesh on every call.
    pub fn render(&self) {
        let device = &self.device;
        let u = &self.uniforms;

        self.vao.bind();
        let mut first = 0;
        for mesh in &self.meshes {
            let m = &mesh.material;
            device.bind_texture(mesh.texture);
            device.uniform_4f(u.diffuse, m.diffuse);
            device.uniform_4f(u.ambient, m.ambient);
            device.uniform_4f(u.specular, m.specular);
            device.uniform_4f(u.emissive, m.emissive);
            device.uniform_1f(u.shininess, m.shininess);
            device.uniform_1i(u.tex_count, m.tex_count);
            device.draw_arrays(first, mesh.nb_vertices);
            device.bind_texture(None);
            first += mesh.nb_vertices;
        }
        self.vao.unbind();
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn texture_table(&self) -> &TextureTable {
        &self.textures
    }

    /// Bounds of the vertex stream; `None` for an empty model.
    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

}
