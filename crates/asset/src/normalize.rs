//! Prepares a loaded object for display: material repair, then centering and
//! uniform rescaling.

use crate::{
    material::{Material, MaterialSlot},
    mesh::SceneObject,
};

/// World-space length of the bounding-box diagonal after normalization.
pub const TARGET_SIZE: f32 = 1.4;

/// A scene object whose meshes all carry a single material and whose bounds
/// are centered on the origin with a diagonal of [`TARGET_SIZE`].
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedSceneObject(SceneObject);

impl NormalizedSceneObject {
    pub fn object(&self) -> &SceneObject {
        &self.0
    }

    pub fn into_inner(self) -> SceneObject {
        self.0
    }
}

pub fn normalize(mut object: SceneObject) -> NormalizedSceneObject {
    let repaired = repair_materials(&mut object);
    if repaired > 0 {
        log::debug!("Assigned default material to {} meshes", repaired);
    }
    center_and_scale(&mut object, TARGET_SIZE);
    NormalizedSceneObject(object)
}

/// Give every mesh without exactly one material the default matte material.
/// Returns how many meshes were changed.
pub fn repair_materials(object: &mut SceneObject) -> usize {
    let mut repaired = 0;
    for mesh in &mut object.meshes {
        if !matches!(mesh.material, MaterialSlot::Single(_)) {
            mesh.material = MaterialSlot::Single(Material::default_matte());
            repaired += 1;
        }
    }
    repaired
}

/// Adjust the root transform so the world bounds are centered on the origin
/// with a diagonal of `target`. Degenerate bounds count as a diagonal of 1.
pub fn center_and_scale(object: &mut SceneObject, target: f32) {
    let bounds = object.world_bounds();
    let diagonal = bounds.diagonal();
    let diagonal = if diagonal.is_finite() && diagonal > 0.0 {
        diagonal
    } else {
        1.0
    };
    let k = target / diagonal;
    let center = bounds.center();

    let t = &mut object.transform;
    // world(p) = t + R(s p); scaling by k about `center` then moving it to
    // the origin gives t' = k (t - center), s' = k s.
    t.translation = (t.translation - center) * k;
    t.scale *= k;
}
