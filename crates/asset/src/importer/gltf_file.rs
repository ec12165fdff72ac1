//! glTF 2.0 importer (`.gltf` and `.glb`). Each primitive becomes one mesh;
//! node transforms are not applied.

use std::path::Path;

use gltf::{Gltf, image::Source, mesh::Mode};

use super::SceneImporter;
use crate::{
    postprocess::PostProcess,
    scene::{Face, Scene, SourceMaterial, SourceMesh, TextureSlot},
};

#[derive(Clone, Copy, Debug, Default)]
pub struct GltfImporter;

impl SceneImporter for GltfImporter {
    fn import(&self, path: &Path, _flags: PostProcess) -> Result<Scene, String> {
        let Gltf { document, blob } = Gltf::open(path)
            .map_err(|e| format!("glTF parse error in {}: {e}", path.display()))?;
        let buffers = gltf::import_buffers(&document, path.parent(), blob)
            .map_err(|e| format!("glTF buffer error in {}: {e}", path.display()))?;

        let mut materials: Vec<SourceMaterial> =
            document.materials().map(|m| convert_material(&m)).collect();
        let mut default_material = None;

        let mut meshes = Vec::new();
        for mesh in document.meshes() {
            let mesh_name = mesh.name().unwrap_or("mesh").to_owned();
            for primitive in mesh.primitives() {
                let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
                let positions: Vec<[f32; 3]> = reader
                    .read_positions()
                    .ok_or_else(|| format!("Primitive of '{mesh_name}' has no positions"))?
                    .collect();
                let indices: Vec<u32> = match reader.read_indices() {
                    Some(indices) => indices.into_u32().collect(),
                    None => (0..positions.len() as u32).collect(),
                };

                let material_index = match primitive.material().index() {
                    Some(i) => i,
                    None => *default_material.get_or_insert_with(|| {
                        materials.push(SourceMaterial::new("DefaultMaterial"));
                        materials.len() - 1
                    }),
                };

                let name = format!("{mesh_name}#{}", primitive.index());
                let mut out = SourceMesh::new(name, positions, faces(primitive.mode(), &indices))
                    .with_material(material_index);
                if let Some(normals) = reader.read_normals() {
                    out = out.with_normals(normals.collect());
                }
                let mut channel = 0;
                while let Some(uvs) = reader.read_tex_coords(channel) {
                    out = out.with_tex_coords(uvs.into_f32().collect());
                    channel += 1;
                }
                meshes.push(out);
            }
        }

        if meshes.is_empty() {
            return Err(format!("glTF file {} contains no meshes", path.display()));
        }
        Ok(Scene { meshes, materials })
    }

    fn can_read(&self, ext: &str) -> bool {
        matches!(ext, "gltf" | "glb")
    }
}

/// Expand a primitive's index list into faces according to its topology.
fn faces(mode: Mode, indices: &[u32]) -> Vec<Face> {
    match mode {
        Mode::Points => indices.iter().map(|&i| Face::new(vec![i])).collect(),
        Mode::Lines => indices.chunks_exact(2).map(|l| Face::new(l.to_vec())).collect(),
        Mode::LineStrip => indices.windows(2).map(|l| Face::new(l.to_vec())).collect(),
        Mode::LineLoop => {
            let mut lines: Vec<Face> = indices.windows(2).map(|l| Face::new(l.to_vec())).collect();
            if let (Some(&first), Some(&last)) = (indices.first(), indices.last())
                && indices.len() > 2
            {
                lines.push(Face::new(vec![last, first]));
            }
            lines
        }
        Mode::Triangles => indices
            .chunks_exact(3)
            .map(|t| Face::triangle(t[0], t[1], t[2]))
            .collect(),
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, t)| {
                // Keep winding consistent on odd triangles.
                if i % 2 == 0 {
                    Face::triangle(t[0], t[1], t[2])
                } else {
                    Face::triangle(t[1], t[0], t[2])
                }
            })
            .collect(),
        Mode::TriangleFan => match indices.split_first() {
            Some((&first, rest)) => rest
                .windows(2)
                .map(|p| Face::triangle(first, p[0], p[1]))
                .collect(),
            None => Vec::new(),
        },
    }
}

fn convert_material(m: &gltf::Material) -> SourceMaterial {
    let pbr = m.pbr_metallic_roughness();
    let [er, eg, eb] = m.emissive_factor();

    let mut out = SourceMaterial::new(m.name().unwrap_or("material"));
    out.diffuse = Some(pbr.base_color_factor());
    out.emissive = Some([er, eg, eb, 1.0]);

    if let Some(info) = pbr.base_color_texture() {
        match texture_path(info.texture().source().source()) {
            Some(path) => out.add_texture(TextureSlot::Diffuse, path),
            None => log::warn!(
                "Material '{}': embedded base color texture is not supported",
                out.name
            ),
        }
    }
    if let Some(normal) = m.normal_texture()
        && let Some(path) = texture_path(normal.texture().source().source())
    {
        out.add_texture(TextureSlot::Normals, path);
    }
    out
}

/// File path of an external image, with URI percent-escapes decoded.
/// Embedded images (buffer views and `data:` URIs) have none.
fn texture_path(source: Source<'_>) -> Option<String> {
    let Source::Uri { uri, .. } = source else {
        return None;
    };
    if uri.starts_with("data:") {
        return None;
    }
    match urlencoding::decode(uri) {
        Ok(path) => Some(path.into_owned()),
        Err(e) => {
            log::warn!("Image URI '{uri}' is not valid UTF-8 once decoded ({e}), using it as is");
            Some(uri.to_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_list_faces() {
        let f = faces(Mode::Triangles, &[0, 1, 2, 2, 1, 3]);
        assert_eq!(f, vec![Face::triangle(0, 1, 2), Face::triangle(2, 1, 3)]);
    }

    #[test]
    fn strip_and_fan_faces() {
        let strip = faces(Mode::TriangleStrip, &[0, 1, 2, 3]);
        assert_eq!(strip, vec![Face::triangle(0, 1, 2), Face::triangle(2, 1, 3)]);
        let fan = faces(Mode::TriangleFan, &[0, 1, 2, 3]);
        assert_eq!(fan, vec![Face::triangle(0, 1, 2), Face::triangle(0, 2, 3)]);
    }

    #[test]
    fn line_loop_closes() {
        let f = faces(Mode::LineLoop, &[0, 1, 2]);
        assert_eq!(f.len(), 3);
        assert_eq!(f[2], Face::new(vec![2, 0]));
    }

    use base64::Engine as _;

    fn encode(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn texture_uri_is_percent_decoded() {
        let uri = Source::Uri {
            uri: "textures/my%20wood.png",
            mime_type: None,
        };
        assert_eq!(texture_path(uri).as_deref(), Some("textures/my wood.png"));
        let data = Source::Uri {
            uri: "data:image/png;base64,AAAA",
            mime_type: None,
        };
        assert_eq!(texture_path(data), None);
    }

    #[test]
    fn imports_embedded_triangle() {
        // One triangle, positions in a base64 data URI buffer.
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let bytes: Vec<u8> = positions.iter().flat_map(|f| f.to_le_bytes()).collect();
        let uri = format!("data:application/octet-stream;base64,{}", encode(&bytes));
        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "buffers": [{{ "byteLength": 36, "uri": "{uri}" }}],
  "bufferViews": [{{ "buffer": 0, "byteLength": 36 }}],
  "accessors": [{{
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0, 0, 0], "max": [1, 1, 0]
  }}],
  "materials": [{{
    "name": "red",
    "pbrMetallicRoughness": {{ "baseColorFactor": [1, 0, 0, 1] }}
  }}],
  "meshes": [{{ "name": "tri", "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "material": 0 }}] }}]
}}"#
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.gltf");
        std::fs::write(&path, json).unwrap();

        let scene = GltfImporter.read_file(&path, PostProcess::default()).unwrap();
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.meshes[0].faces, vec![Face::triangle(0, 1, 2)]);
        assert!(!scene.meshes[0].has_normals());
        assert_eq!(scene.materials[0].diffuse, Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(scene.materials[0].texture(TextureSlot::Diffuse, 0), None);
    }
}
