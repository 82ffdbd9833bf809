//! glTF 2.0 / GLB loader built on the `gltf` crate.
//!
//! Walks the default scene (or the first one) and bakes each node's world
//! transform into its primitives, so the result is a flat list of meshes in
//! one object space. Only triangle-list primitives are kept.

use anyhow::{Context, Result};
use corelib::{Mat3, Mat4, Vec3};

use crate::{
    material::{Material, MaterialSlot},
    mesh::{MeshData, MeshVertex, SceneMesh, SceneObject},
};

/// Load a GLB (or a self-contained `.gltf`) from bytes.
pub fn load_glb_from_bytes(bytes: &[u8]) -> Result<SceneObject> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).context("Failed to parse glTF/GLB")?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .context("glTF file contains no scenes")?;

    let mut meshes = Vec::new();
    for node in scene.nodes() {
        visit_node(&node, Mat4::IDENTITY, &buffers, &mut meshes)?;
    }

    if meshes.is_empty() {
        anyhow::bail!("glTF scene contains no triangle meshes");
    }
    log::debug!(
        "glTF: {} meshes from {} nodes",
        meshes.len(),
        document.nodes().count()
    );
    Ok(SceneObject::new(meshes))
}

fn visit_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<SceneMesh>,
) -> Result<()> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let base_name = mesh.name().or(node.name()).unwrap_or("mesh");
        for primitive in mesh.primitives() {
            if !matches!(primitive.mode(), gltf::mesh::Mode::Triangles) {
                log::debug!("Skipping non-triangle primitive in '{}'", base_name);
                continue;
            }
            let data = read_primitive(&primitive, buffers, world)
                .with_context(|| format!("Bad primitive in mesh '{}'", base_name))?;
            out.push(SceneMesh {
                name: format!("{}#{}", base_name, primitive.index()),
                data,
                material: material_slot(&primitive.material()),
            });
        }
    }

    for child in node.children() {
        visit_node(&child, world, buffers, out)?;
    }
    Ok(())
}

fn read_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    world: Mat4,
) -> Result<MeshData> {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .context("Primitive has no positions")?
        .collect();
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
    let uvs: Option<Vec<[f32; 2]>> = reader.read_tex_coords(0).map(|t| t.into_f32().collect());

    let indices: Vec<u32> = match reader.read_indices() {
        Some(idx) => idx.into_u32().collect(),
        None => sequential_indices(positions.len())?,
    };
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        anyhow::bail!("Index {} out of range ({} vertices)", bad, positions.len());
    }

    let normal_matrix = normal_matrix(world);
    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let position = world.transform_point3(Vec3::from(p)).to_array();
            let normal = normals
                .as_ref()
                .and_then(|n| n.get(i))
                .map(|&n| (normal_matrix * Vec3::from(n)).normalize_or_zero().to_array())
                .unwrap_or([0.0, 0.0, 1.0]);
            let uv = uvs.as_ref().and_then(|t| t.get(i)).copied().unwrap_or([0.0, 0.0]);
            MeshVertex::new(position, normal, uv)
        })
        .collect();

    let mut data = MeshData::new(vertices, indices);
    if normals.is_none() {
        data.compute_normals();
    }
    Ok(data)
}

/// Index list for a non-indexed primitive.
fn sequential_indices(vertex_count: usize) -> Result<Vec<u32>> {
    let count = u32::try_from(vertex_count)
        .with_context(|| format!("Primitive has too many vertices ({})", vertex_count))?;
    Ok((0..count).collect())
}

/// Inverse-transpose of the upper 3x3; identity for singular transforms.
fn normal_matrix(world: Mat4) -> Mat3 {
    let m = Mat3::from_mat4(world);
    if m.determinant().abs() < f32::EPSILON {
        Mat3::IDENTITY
    } else {
        m.inverse().transpose()
    }
}

/// glTF falls back to an implicit default material when none is referenced;
/// that case is reported as missing so it gets the viewer's matte material.
fn material_slot(material: &gltf::Material) -> MaterialSlot {
    if material.index().is_none() {
        return MaterialSlot::Missing;
    }
    let pbr = material.pbr_metallic_roughness();
    MaterialSlot::Single(Material {
        name: material.name().unwrap_or("gltf_material").to_owned(),
        base_color: pbr.base_color_factor(),
        roughness: pbr.roughness_factor(),
        metalness: pbr.metallic_factor(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Assemble a GLB container around `json` and a binary chunk.
    pub(crate) fn build_glb(json: &str, bin: &[u8]) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
        let total = 12 + 8 + json.len() + 8 + bin.len();

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    pub(crate) fn triangle_glb(translation_x: f32, with_material: bool) -> Vec<u8> {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let bin: Vec<u8> = positions.iter().flat_map(|f| f.to_le_bytes()).collect();
        let (material_ref, materials) = if with_material {
            (
                r#","material":0"#,
                r#","materials":[{"name":"stone","pbrMetallicRoughness":{"baseColorFactor":[0.5,0.4,0.3,1.0],"metallicFactor":0.0,"roughnessFactor":0.8}}]"#,
            )
        } else {
            ("", "")
        };
        let json = format!(
            r#"{{"asset":{{"version":"2.0"}},"scene":0,"scenes":[{{"nodes":[0]}}],"nodes":[{{"mesh":0,"translation":[{tx},0.0,0.0]}}],"meshes":[{{"name":"tri","primitives":[{{"attributes":{{"POSITION":0}}{material_ref}}}]}}]{materials},"buffers":[{{"byteLength":36}}],"bufferViews":[{{"buffer":0,"byteOffset":0,"byteLength":36}}],"accessors":[{{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0.0,0.0,0.0],"max":[1.0,1.0,0.0]}}]}}"#,
            tx = translation_x,
        );
        build_glb(&json, &bin)
    }

    #[test]
    fn loads_triangle_with_node_transform() {
        let obj = load_glb_from_bytes(&triangle_glb(2.0, false)).expect("load glb");
        assert_eq!(obj.meshes.len(), 1);
        let mesh = &obj.meshes[0];
        assert_eq!(mesh.name, "tri#0");
        assert_eq!(mesh.data.indices, vec![0, 1, 2]);
        assert_eq!(mesh.data.vertices[1].position, [3.0, 0.0, 0.0]);
        assert_eq!(mesh.data.vertices[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(mesh.material, MaterialSlot::Missing);
    }

    #[test]
    fn reads_explicit_material() {
        let obj = load_glb_from_bytes(&triangle_glb(0.0, true)).expect("load glb");
        let m = obj.meshes[0].material.single().expect("single material");
        assert_eq!(m.name, "stone");
        assert_eq!(m.roughness, 0.8);
    }

    #[test]
    fn rejects_garbage() {
        assert!(load_glb_from_bytes(&[]).is_err());
        assert!(load_glb_from_bytes(b"glTF not really").is_err());
    }

    #[test]
    fn sequential_indices_cover_u32_range_only() {
        assert_eq!(sequential_indices(3).unwrap(), vec![0, 1, 2]);
        assert!(sequential_indices(0).unwrap().is_empty());
        #[cfg(target_pointer_width = "64")]
        assert!(sequential_indices(u32::MAX as usize + 1).is_err());
    }
}
