use crate::{Mat4, Vec3, vec3};

/// Perspective camera (right-handed, wgpu depth range).
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub aspect: f32,
}

impl Camera {
    /// The scan viewer's fixed starting camera: 45° vertical FOV, looking at the
    /// origin from slightly above and to the side.
    pub fn scan_viewer(aspect: f32) -> Self {
        Self {
            eye: vec3(1.8, 1.4, 2.2),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_rad: 45f32.to_radians(),
            z_near: 0.01,
            z_far: 500.0,
            aspect,
        }
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// glam's `perspective_rh` already maps depth to [0, 1].
    #[inline]
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_rad,
            self.aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }

    #[inline]
    pub fn proj_view(&self) -> Mat4 {
        self.proj() * self.view()
    }

    /// Recompute the aspect ratio from a surface size. Zero dimensions are
    /// clamped so a minimized window never yields NaN.
    #[inline]
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }
}
