//! Wavefront OBJ/MTL importer backed by `tobj`.

use std::path::Path;

use super::SceneImporter;
use crate::{
    postprocess::PostProcess,
    scene::{Face, Scene, SourceMaterial, SourceMesh, TextureSlot},
};

#[derive(Clone, Copy, Debug, Default)]
pub struct ObjImporter;

impl SceneImporter for ObjImporter {
    fn import(&self, path: &Path, flags: PostProcess) -> Result<Scene, String> {
        let options = tobj::LoadOptions {
            // One index per corner so every attribute array shares indices.
            single_index: true,
            triangulate: flags.contains(PostProcess::TRIANGULATE),
            ..Default::default()
        };
        let (models, materials) = tobj::load_obj(path, &options)
            .map_err(|e| format!("OBJ parse error in {}: {e}", path.display()))?;

        let mut materials: Vec<SourceMaterial> = match materials {
            Ok(list) => list.iter().map(convert_material).collect(),
            Err(e) => {
                log::warn!("Material library for {} not loaded: {e}", path.display());
                Vec::new()
            }
        };

        let mut default_material = None;
        let mut meshes = Vec::with_capacity(models.len());
        for model in models {
            let material_index = match model.mesh.material_id {
                Some(id) if id < materials.len() => id,
                _ => *default_material.get_or_insert_with(|| {
                    materials.push(SourceMaterial::new("DefaultMaterial"));
                    materials.len() - 1
                }),
            };
            meshes.push(convert_mesh(model, material_index));
        }

        if meshes.is_empty() {
            return Err(format!("OBJ file {} contains no meshes", path.display()));
        }
        Ok(Scene { meshes, materials })
    }

    fn can_read(&self, ext: &str) -> bool {
        ext == "obj"
    }
}

fn convert_mesh(model: tobj::Model, material_index: usize) -> SourceMesh {
    let mesh = model.mesh;
    let positions = mesh.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect();

    let faces = if mesh.face_arities.is_empty() {
        mesh.indices
            .chunks_exact(3)
            .map(|t| Face::triangle(t[0], t[1], t[2]))
            .collect()
    } else {
        let mut start = 0usize;
        mesh.face_arities
            .iter()
            .map(|&arity| {
                let end = start + arity as usize;
                let face = Face::new(mesh.indices[start..end].to_vec());
                start = end;
                face
            })
            .collect()
    };

    let mut out = SourceMesh::new(model.name, positions, faces).with_material(material_index);
    if !mesh.normals.is_empty() {
        out = out.with_normals(
            mesh.normals
                .chunks_exact(3)
                .map(|n| [n[0], n[1], n[2]])
                .collect(),
        );
    }
    if !mesh.texcoords.is_empty() {
        out = out.with_tex_coords(mesh.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]).collect());
    }
    out
}

fn convert_material(m: &tobj::Material) -> SourceMaterial {
    // MTL colors are RGB; dissolve (`d`) is opacity, not color alpha.
    let rgba = |c: [f32; 3]| [c[0], c[1], c[2], 1.0];

    let mut out = SourceMaterial::new(m.name.clone());
    out.diffuse = m.diffuse.map(rgba);
    out.ambient = m.ambient.map(rgba);
    out.specular = m.specular.map(rgba);
    out.emissive = m.unknown_param.get("Ke").and_then(|v| parse_rgb(v)).map(rgba);
    out.shininess = m.shininess;

    let slots = [
        (TextureSlot::Diffuse, &m.diffuse_texture),
        (TextureSlot::Ambient, &m.ambient_texture),
        (TextureSlot::Specular, &m.specular_texture),
        (TextureSlot::Normals, &m.normal_texture),
    ];
    for (slot, path) in slots {
        if let Some(path) = path.as_deref().filter(|p| !p.is_empty()) {
            out.add_texture(slot, path);
        }
    }
    if let Some(path) = m.unknown_param.get("map_Ke") {
        out.add_texture(TextureSlot::Emissive, path.trim());
    }
    out
}

fn parse_rgb(value: &str) -> Option<[f32; 3]> {
    let mut parts = value.split_whitespace().map(|s| s.parse::<f32>());
    let r = parts.next()?.ok()?;
    // A single value means grey.
    let g = parts.next().map_or(Some(r), |v| v.ok())?;
    let b = parts.next().map_or(Some(g), |v| v.ok())?;
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MTL: &str = "\
newmtl wood
Kd 0.5 0.25 0.125
Ka 0.1 0.1 0.1
Ns 32
d 0.5
Ke 0.2
map_Kd wood.png

newmtl plain
Ks 1 1 1
";

    const OBJ: &str = "\
mtllib scene.mtl
o crate
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl wood
f 1/1/1 2/2/1 3/3/1 4/4/1
o floor
v 0 0 1
v 1 0 1
v 0 1 1
usemtl plain
f 5 6 7
";

    fn write_fixture(dir: &Path) -> std::path::PathBuf {
        fs::write(dir.join("scene.mtl"), MTL).unwrap();
        let path = dir.join("scene.obj");
        fs::write(&path, OBJ).unwrap();
        path
    }

    #[test]
    fn imports_meshes_materials_and_textures() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let scene = ObjImporter.read_file(&path, PostProcess::default()).unwrap();

        assert_eq!(scene.meshes.len(), 2);
        let quad = &scene.meshes[0];
        assert_eq!(quad.faces.len(), 2);
        assert!(quad.faces.iter().all(Face::is_triangle));
        assert!(quad.has_normals());
        assert!(quad.has_tex_coords(0));

        let wood = &scene.materials[quad.material_index];
        assert_eq!(wood.name, "wood");
        assert_eq!(wood.diffuse, Some([0.5, 0.25, 0.125, 1.0]));
        assert_eq!(wood.emissive, Some([0.2, 0.2, 0.2, 1.0]));
        assert_eq!(wood.shininess, Some(32.0));
        assert_eq!(wood.texture(TextureSlot::Diffuse, 0), Some("wood.png"));

        let floor = &scene.meshes[1];
        assert!(!floor.has_normals());
        assert!(!floor.has_tex_coords(0));
        let plain = &scene.materials[floor.material_index];
        assert_eq!(plain.diffuse, None);
        assert_eq!(plain.texture(TextureSlot::Diffuse, 0), None);
    }

    #[test]
    fn without_triangulate_polygons_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let scene = ObjImporter.import(&path, PostProcess::empty()).unwrap();
        assert_eq!(scene.meshes[0].faces.len(), 1);
        assert_eq!(scene.meshes[0].faces[0].indices.len(), 4);
    }

    #[test]
    fn dissolve_does_not_change_color_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let scene = ObjImporter.read_file(&path, PostProcess::default()).unwrap();
        let wood = &scene.materials[scene.meshes[0].material_index];
        assert_eq!(wood.diffuse.map(|c| c[3]), Some(1.0));
        assert_eq!(wood.ambient.map(|c| c[3]), Some(1.0));
    }

    #[test]
    fn faces_with_and_without_normals_in_one_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.obj");
        fs::write(
            &path,
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nv 1 0 0\nvn 0 0 1\n\
             f 1//1 2//1 3//1\nf 2 4 3\nf 5 4 3\n",
        )
        .unwrap();
        let scene = ObjImporter.read_file(&path, PostProcess::default()).unwrap();
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.faces.len(), 3);
        assert!(mesh.normals.is_none());
        let n = mesh.positions.len() as u32;
        assert!(mesh.faces.iter().flat_map(|f| &f.indices).all(|&i| i < n));
    }

    #[test]
    fn mesh_without_material_gets_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.obj");
        fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let scene = ObjImporter.read_file(&path, PostProcess::default()).unwrap();
        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.materials[0].name, "DefaultMaterial");
        assert_eq!(scene.meshes[0].material_index, 0);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ObjImporter
            .read_file(Path::new("/definitely/not/here.obj"), PostProcess::default())
            .unwrap_err();
        assert!(err.contains("here.obj"), "{err}");
    }

    #[test]
    fn rgb_parsing() {
        assert_eq!(parse_rgb("0.1 0.2 0.3"), Some([0.1, 0.2, 0.3]));
        assert_eq!(parse_rgb("0.5"), Some([0.5, 0.5, 0.5]));
        assert_eq!(parse_rgb("x"), None);
        assert_eq!(parse_rgb(""), None);
    }
}
