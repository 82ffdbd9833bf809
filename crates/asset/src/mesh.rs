//! CPU-side scene representation produced by the format loaders.

use corelib::{Vec3, bounds::Aabb, transform::Transform};

use crate::material::MaterialSlot;

/// Vertex with position/normal/uv. Values are in object space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Indexed triangle mesh with tightly-packed vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Returns `true` if both vertex and index buffers are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Replace all normals with area-weighted vertex normals.
    /// Scans often ship without normals; unlit geometry is unreadable.
    pub fn compute_normals(&mut self) {
        let mut acc = vec![Vec3::ZERO; self.vertices.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (Some(va), Some(vb), Some(vc)) = (
                self.vertices.get(a),
                self.vertices.get(b),
                self.vertices.get(c),
            ) else {
                continue;
            };
            let pa = Vec3::from(va.position);
            // Unnormalized cross product: longer for bigger triangles.
            let n = (Vec3::from(vb.position) - pa).cross(Vec3::from(vc.position) - pa);
            acc[a] += n;
            acc[b] += n;
            acc[c] += n;
        }
        for (v, n) in self.vertices.iter_mut().zip(acc) {
            v.normal = n.try_normalize().unwrap_or(Vec3::Y).to_array();
        }
    }
}

/// One drawable part of a loaded object.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneMesh {
    pub name: String,
    pub data: MeshData,
    pub material: MaterialSlot,
}

/// A loaded 3D object: meshes in a shared object space plus a root placement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneObject {
    pub transform: Transform,
    pub meshes: Vec<SceneMesh>,
}

impl SceneObject {
    pub fn new(meshes: Vec<SceneMesh>) -> Self {
        Self {
            transform: Transform::IDENTITY,
            meshes,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.data.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.data.triangle_count()).sum()
    }

    pub fn index_count(&self) -> usize {
        self.meshes.iter().map(|m| m.data.indices.len()).sum()
    }

    /// Bounds of every vertex after the root transform is applied.
    pub fn world_bounds(&self) -> Aabb {
        Aabb::from_points(self.meshes.iter().flat_map(|m| {
            m.data
                .vertices
                .iter()
                .map(|v| self.transform.transform_point(Vec3::from(v.position)))
        }))
    }
}

/// Largest merged vertex and index streams a renderer accepts in one upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeometryLimit {
    pub max_vertices: usize,
    pub max_indices: usize,
}

impl GeometryLimit {
    pub fn check(&self, object: &SceneObject) -> anyhow::Result<()> {
        let vertices = object.vertex_count();
        let indices = object.index_count();
        if vertices > self.max_vertices || indices > self.max_indices {
            anyhow::bail!(
                "Scan too large for the GPU: {} vertices / {} indices (limit {} / {})",
                vertices,
                indices,
                self.max_vertices,
                self.max_indices
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_limit_rejects_either_stream() {
        let v = MeshVertex::default();
        let object = SceneObject::new(vec![SceneMesh {
            name: "tri".into(),
            data: MeshData::new(vec![v; 3], vec![0, 1, 2, 0, 2, 1]),
            material: MaterialSlot::Missing,
        }]);
        let fits = GeometryLimit {
            max_vertices: 3,
            max_indices: 6,
        };
        assert!(fits.check(&object).is_ok());
        assert!(GeometryLimit { max_vertices: 2, ..fits }.check(&object).is_err());
        assert!(GeometryLimit { max_indices: 5, ..fits }.check(&object).is_err());
    }

    #[test]
    fn mesh_data_validity() {
        let data = MeshData::new(vec![MeshVertex::default()], vec![0]);
        assert!(data.is_valid());
        assert!(!MeshData::default().is_valid());
    }

    #[test]
    fn computed_normals_face_out_of_ccw_triangle() {
        let mut data = MeshData::new(
            vec![
                MeshVertex::new([0.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
                MeshVertex::new([1.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
                MeshVertex::new([0.0, 1.0, 0.0], [0.0; 3], [0.0; 2]),
            ],
            vec![0, 1, 2],
        );
        data.compute_normals();
        for v in &data.vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn world_bounds_follow_root_transform() {
        let mesh = SceneMesh {
            name: "m".into(),
            data: MeshData::new(
                vec![
                    MeshVertex::new([0.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
                    MeshVertex::new([2.0, 2.0, 2.0], [0.0; 3], [0.0; 2]),
                ],
                vec![0, 1, 0],
            ),
            material: MaterialSlot::Missing,
        };
        let mut obj = SceneObject::new(vec![mesh]);
        obj.transform = Transform::from_translation_scale(Vec3::splat(1.0), 0.5);
        let b = obj.world_bounds();
        assert_eq!(b.min, Vec3::splat(1.0));
        assert_eq!(b.max, Vec3::splat(2.0));
    }
}
