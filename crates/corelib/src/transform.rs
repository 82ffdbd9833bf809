use crate::{Mat4, Quat, Vec3};

/// Placement of a loaded object in world space. Scale is uniform: scans are
/// only ever resized as a whole.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: 1.0,
    };

    #[inline]
    pub fn from_translation_scale(translation: Vec3, scale: f32) -> Self {
        Self {
            translation,
            rotation: Quat::IDENTITY,
            scale,
        }
    }

    /// world = T * R * S
    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), self.rotation, self.translation)
    }

    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.translation + self.rotation * (p * self.scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
