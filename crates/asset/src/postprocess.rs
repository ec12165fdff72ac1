//! Post-processing steps requested by importers' callers.
//!
//! Steps run in a fixed order: triangulate, sort by primitive type, tangent
//! space, join identical vertices. Tangents are computed before joining so
//! vertices that differ only in tangent stay apart.

use std::collections::HashMap;

use bitflags::bitflags;

use crate::scene::{Face, Scene, SourceMesh};

bitflags! {
    /// Post-process steps applied to an imported scene.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PostProcess: u32 {
        /// Split polygons with more than three corners into a triangle fan.
        const TRIANGULATE = 1 << 0;
        /// Merge vertices whose attributes are bit-identical.
        const JOIN_IDENTICAL_VERTICES = 1 << 1;
        /// Keep triangles only: drop point and line faces, then empty meshes.
        const SORT_BY_PRIMITIVE_TYPE = 1 << 2;
        /// Generate per-vertex tangents and bitangents from UV channel 0.
        const CALC_TANGENT_SPACE = 1 << 3;
    }
}

impl PostProcess {
    /// Flags the model loader requests.
    pub fn model_defaults() -> Self {
        Self::TRIANGULATE
            | Self::JOIN_IDENTICAL_VERTICES
            | Self::SORT_BY_PRIMITIVE_TYPE
            | Self::CALC_TANGENT_SPACE
    }
}

impl Default for PostProcess {
    fn default() -> Self {
        Self::model_defaults()
    }
}

/// Apply every step selected in `flags` to `scene`.
pub fn apply(scene: &mut Scene, flags: PostProcess) {
    scene.meshes.iter_mut().for_each(drop_mismatched_attributes);
    if flags.contains(PostProcess::TRIANGULATE) {
        scene.meshes.iter_mut().for_each(triangulate);
    }
    if flags.contains(PostProcess::SORT_BY_PRIMITIVE_TYPE) {
        sort_by_primitive_type(scene);
    }
    if flags.contains(PostProcess::CALC_TANGENT_SPACE) {
        scene.meshes.iter_mut().for_each(calc_tangent_space);
    }
    if flags.contains(PostProcess::JOIN_IDENTICAL_VERTICES) {
        scene.meshes.iter_mut().for_each(join_identical_vertices);
    }
}

/// Drop per-vertex attributes whose length differs from the position count.
/// Every later step indexes attributes by vertex.
pub fn drop_mismatched_attributes(mesh: &mut SourceMesh) {
    let n = mesh.positions.len();
    let name = &mesh.name;
    for (label, attr) in [
        ("normals", &mut mesh.normals),
        ("tangents", &mut mesh.tangents),
        ("bitangents", &mut mesh.bitangents),
    ] {
        if let Some(len) = attr.as_ref().map(Vec::len)
            && len != n
        {
            log::warn!("Mesh '{name}': {len} {label} for {n} positions, dropping {label}");
            *attr = None;
        }
    }
    let channels = mesh.tex_coords.len();
    mesh.tex_coords.retain(|uv| uv.len() == n);
    if mesh.tex_coords.len() != channels {
        log::warn!(
            "Mesh '{name}': dropped {} UV channel(s) not matching {n} positions",
            channels - mesh.tex_coords.len()
        );
    }
}

/// Fan-triangulate every face with more than three indices.
pub fn triangulate(mesh: &mut SourceMesh) {
    if mesh.faces.iter().all(|f| f.indices.len() <= 3) {
        return;
    }
    let mut faces = Vec::with_capacity(mesh.faces.len());
    for face in mesh.faces.drain(..) {
        if face.indices.len() <= 3 {
            faces.push(face);
            continue;
        }
        let first = face.indices[0];
        for pair in face.indices[1..].windows(2) {
            faces.push(Face::triangle(first, pair[0], pair[1]));
        }
    }
    mesh.faces = faces;
}

/// Drop point and line faces and any mesh left without faces.
pub fn sort_by_primitive_type(scene: &mut Scene) {
    for mesh in &mut scene.meshes {
        let before = mesh.faces.len();
        mesh.faces.retain(|f| f.indices.len() >= 3);
        let dropped = before - mesh.faces.len();
        if dropped > 0 {
            log::debug!(
                "Mesh '{}': dropped {} point/line faces",
                mesh.name,
                dropped
            );
        }
    }
    scene.meshes.retain(|m| !m.faces.is_empty());
}

/// Accumulate per-triangle tangent frames onto their vertices, then
/// orthonormalize against the normal. Needs normals and UV channel 0.
pub fn calc_tangent_space(mesh: &mut SourceMesh) {
    let (Some(normals), Some(uvs)) = (mesh.normals.as_ref(), mesh.tex_coords.first()) else {
        return;
    };
    let n = mesh.positions.len();
    if normals.len() != n || uvs.len() != n {
        log::warn!(
            "Mesh '{}': attribute count mismatch, skipping tangent space",
            mesh.name
        );
        return;
    }

    let mut tan = vec![[0.0f32; 3]; n];
    let mut bitan = vec![[0.0f32; 3]; n];
    for face in mesh.faces.iter().filter(|f| f.is_triangle()) {
        let [a, b, c] = [0, 1, 2].map(|k| face.indices[k] as usize);
        if a >= n || b >= n || c >= n {
            continue;
        }
        let e1 = sub(mesh.positions[b], mesh.positions[a]);
        let e2 = sub(mesh.positions[c], mesh.positions[a]);
        let (du1, dv1) = (uvs[b][0] - uvs[a][0], uvs[b][1] - uvs[a][1]);
        let (du2, dv2) = (uvs[c][0] - uvs[a][0], uvs[c][1] - uvs[a][1]);
        let det = du1 * dv2 - du2 * dv1;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let t = scale(sub(scale(e1, dv2), scale(e2, dv1)), r);
        let bt = scale(sub(scale(e2, du1), scale(e1, du2)), r);
        for v in [a, b, c] {
            tan[v] = add(tan[v], t);
            bitan[v] = add(bitan[v], bt);
        }
    }

    for v in 0..n {
        let normal = normals[v];
        let t = sub(tan[v], scale(normal, dot(normal, tan[v])));
        tan[v] = normalize(t).unwrap_or_else(|| any_perpendicular(normal));
        let b = cross(normal, tan[v]);
        bitan[v] = if dot(b, bitan[v]) < 0.0 { scale(b, -1.0) } else { b };
    }
    mesh.tangents = Some(tan);
    mesh.bitangents = Some(bitan);
}

/// Merge bit-identical vertices and remap face indices.
pub fn join_identical_vertices(mesh: &mut SourceMesh) {
    let n = mesh.positions.len();
    let mut seen: HashMap<Vec<u32>, u32> = HashMap::with_capacity(n);
    let mut remap = Vec::with_capacity(n);
    let mut keep = Vec::with_capacity(n);

    for v in 0..n {
        let key = vertex_key(mesh, v);
        let next = keep.len() as u32;
        let idx = *seen.entry(key).or_insert_with(|| {
            keep.push(v);
            next
        });
        remap.push(idx);
    }
    if keep.len() == n {
        return;
    }

    log::debug!("Mesh '{}': joined {} -> {} vertices", mesh.name, n, keep.len());
    fn gather<T: Copy>(src: &[T], keep: &[usize]) -> Vec<T> {
        keep.iter().map(|&i| src[i]).collect()
    }
    mesh.positions = gather(&mesh.positions, &keep);
    for attr in [&mut mesh.normals, &mut mesh.tangents, &mut mesh.bitangents] {
        if let Some(values) = attr.as_mut() {
            *values = gather(values, &keep);
        }
    }
    for channel in &mut mesh.tex_coords {
        *channel = gather(channel, &keep);
    }
    for face in &mut mesh.faces {
        for i in &mut face.indices {
            if let Some(&r) = remap.get(*i as usize) {
                *i = r;
            }
        }
    }
}

fn vertex_key(mesh: &SourceMesh, v: usize) -> Vec<u32> {
    let mut key: Vec<u32> = mesh.positions[v].iter().map(|f| f.to_bits()).collect();
    for attr in [&mesh.normals, &mesh.tangents, &mesh.bitangents]
        .into_iter()
        .flatten()
    {
        if let Some(value) = attr.get(v) {
            key.extend(value.iter().map(|f| f.to_bits()));
        }
    }
    for channel in &mesh.tex_coords {
        if let Some(uv) = channel.get(v) {
            key.extend(uv.iter().map(|f| f.to_bits()));
        }
    }
    key
}

fn add(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn scale(a: [f32; 3], s: f32) -> [f32; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(a: [f32; 3]) -> Option<[f32; 3]> {
    let len = dot(a, a).sqrt();
    (len > 1e-8).then(|| scale(a, 1.0 / len))
}

fn any_perpendicular(n: [f32; 3]) -> [f32; 3] {
    let axis = if n[0].abs() < 0.9 { [1.0, 0.0, 0.0] } else { [0.0, 1.0, 0.0] };
    normalize(cross(axis, n)).unwrap_or([1.0, 0.0, 0.0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> SourceMesh {
        SourceMesh::new(
            "quad",
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            vec![Face::new(vec![0, 1, 2, 3])],
        )
    }

    #[test]
    fn quad_becomes_two_fan_triangles() {
        let mut mesh = quad();
        triangulate(&mut mesh);
        assert_eq!(
            mesh.faces,
            vec![Face::triangle(0, 1, 2), Face::triangle(0, 2, 3)]
        );
    }

    #[test]
    fn sorting_drops_points_lines_and_empty_meshes() {
        let mut scene = Scene {
            meshes: vec![
                SourceMesh::new(
                    "mixed",
                    vec![[0.0; 3]; 3],
                    vec![
                        Face::new(vec![0]),
                        Face::new(vec![0, 1]),
                        Face::triangle(0, 1, 2),
                    ],
                ),
                SourceMesh::new("lines", vec![[0.0; 3]; 2], vec![Face::new(vec![0, 1])]),
            ],
            materials: vec![],
        };
        sort_by_primitive_type(&mut scene);
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.meshes[0].faces, vec![Face::triangle(0, 1, 2)]);
    }

    #[test]
    fn identical_vertices_are_joined() {
        let mut mesh = SourceMesh::new(
            "dup",
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 1.0, 0.0],
            ],
            vec![Face::triangle(0, 1, 2), Face::triangle(3, 5, 4)],
        );
        join_identical_vertices(&mut mesh);
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.faces[1], Face::triangle(1, 3, 2));
    }

    #[test]
    fn vertices_with_different_uvs_stay_apart() {
        let mut mesh = SourceMesh::new(
            "seam",
            vec![[0.0; 3], [0.0; 3], [1.0, 0.0, 0.0]],
            vec![Face::triangle(0, 1, 2)],
        )
        .with_tex_coords(vec![[0.0, 0.0], [1.0, 0.0], [0.5, 0.5]]);
        join_identical_vertices(&mut mesh);
        assert_eq!(mesh.positions.len(), 3);
    }

    #[test]
    fn tangents_follow_u_direction() {
        let mut mesh = quad()
            .with_normals(vec![[0.0, 0.0, 1.0]; 4])
            .with_tex_coords(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        triangulate(&mut mesh);
        calc_tangent_space(&mut mesh);
        let tangents = mesh.tangents.unwrap();
        let bitangents = mesh.bitangents.unwrap();
        for (t, b) in tangents.iter().zip(&bitangents) {
            assert!((t[0] - 1.0).abs() < 1e-5 && t[1].abs() < 1e-5);
            assert!((b[1] - 1.0).abs() < 1e-5 && b[0].abs() < 1e-5);
        }
    }

    #[test]
    fn tangent_space_needs_normals_and_uvs() {
        let mut mesh = quad();
        triangulate(&mut mesh);
        calc_tangent_space(&mut mesh);
        assert!(mesh.tangents.is_none());
    }

    #[test]
    fn short_attributes_are_dropped_before_joining() {
        // Two corners share position 2 and have no normal of their own.
        let mut scene = Scene {
            meshes: vec![
                SourceMesh::new(
                    "partial",
                    vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
                    vec![Face::triangle(0, 1, 2), Face::triangle(1, 3, 2)],
                )
                .with_normals(vec![[0.0, 0.0, 1.0]; 2])
                .with_tex_coords(vec![[0.0, 0.0]]),
            ],
            materials: vec![],
        };
        apply(&mut scene, PostProcess::model_defaults());
        let mesh = &scene.meshes[0];
        assert!(mesh.normals.is_none());
        assert!(mesh.tex_coords.is_empty());
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.faces[1], Face::triangle(1, 2, 2));
    }

    #[test]
    fn apply_runs_selected_steps_only() {
        let mut scene = Scene {
            meshes: vec![quad()],
            materials: vec![],
        };
        apply(&mut scene, PostProcess::SORT_BY_PRIMITIVE_TYPE);
        assert_eq!(scene.meshes[0].faces.len(), 1);
        apply(&mut scene, PostProcess::model_defaults());
        assert_eq!(scene.face_count(), 2);
    }
}
