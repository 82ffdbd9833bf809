//! Damped orbit controller around a fixed target.
//!
//! Input accumulates into a pending rotation delta; each `update` applies a
//! `damping` fraction of it and keeps the rest, so motion eases out over
//! several frames. Zoom is applied immediately and clamped to
//! `[min_distance, max_distance]`.

use std::f32::consts::PI;

use crate::{Vec3, camera::Camera};

const POLAR_EPS: f32 = 1e-4;
/// Dolly factor per wheel step.
const ZOOM_STEP: f32 = 0.95;

#[derive(Clone, Debug)]
pub struct OrbitController {
    pub target: Vec3,
    pub damping: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rotate_speed: f32,
    radius: f32,
    /// Azimuth around +Y, measured from +Z.
    theta: f32,
    /// Polar angle from +Y.
    phi: f32,
    pending_theta: f32,
    pending_phi: f32,
    pending_scale: f32,
}

impl OrbitController {
    /// Start orbiting `target` from `eye`, with the viewer's default limits.
    pub fn new(eye: Vec3, target: Vec3) -> Self {
        let offset = eye - target;
        let radius = offset.length().max(f32::EPSILON);
        Self {
            target,
            damping: 0.05,
            min_distance: 0.35,
            max_distance: 8.0,
            rotate_speed: 1.0,
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_scale: 1.0,
        }
    }

    pub fn for_camera(camera: &Camera) -> Self {
        Self::new(camera.eye, camera.target)
    }

    /// Pointer drag in physical pixels. A drag across the full viewport
    /// height turns the view by one full revolution.
    pub fn rotate(&mut self, dx: f32, dy: f32, viewport_height: u32) {
        let h = viewport_height.max(1) as f32;
        self.pending_theta -= 2.0 * PI * dx / h * self.rotate_speed;
        self.pending_phi -= 2.0 * PI * dy / h * self.rotate_speed;
    }

    /// Positive steps move closer.
    pub fn zoom(&mut self, steps: f32) {
        self.pending_scale *= ZOOM_STEP.powf(steps);
    }

    pub fn distance(&self) -> f32 {
        self.radius
    }

    /// Advance one frame. Returns `true` while motion is still settling.
    pub fn update(&mut self) -> bool {
        self.theta += self.pending_theta * self.damping;
        self.phi = (self.phi + self.pending_phi * self.damping).clamp(POLAR_EPS, PI - POLAR_EPS);
        self.radius = (self.radius * self.pending_scale).clamp(self.min_distance, self.max_distance);
        self.pending_scale = 1.0;

        self.pending_theta *= 1.0 - self.damping;
        self.pending_phi *= 1.0 - self.damping;
        self.pending_theta.abs() > 1e-6 || self.pending_phi.abs() > 1e-6
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        self.target
            + Vec3::new(
                self.radius * sin_phi * sin_theta,
                self.radius * cos_phi,
                self.radius * sin_phi * cos_theta,
            )
    }

    pub fn apply(&self, camera: &mut Camera) {
        camera.eye = self.eye();
        camera.target = self.target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3;
    use approx::assert_relative_eq;

    #[test]
    fn eye_round_trips_through_spherical() {
        let eye = vec3(1.8, 1.4, 2.2);
        let orbit = OrbitController::new(eye, Vec3::ZERO);
        let e = orbit.eye();
        assert_relative_eq!(e.x, eye.x, epsilon = 1e-5);
        assert_relative_eq!(e.y, eye.y, epsilon = 1e-5);
        assert_relative_eq!(e.z, eye.z, epsilon = 1e-5);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut orbit = OrbitController::new(vec3(0.0, 0.0, 2.0), Vec3::ZERO);
        orbit.zoom(500.0);
        orbit.update();
        assert_relative_eq!(orbit.distance(), 0.35);

        orbit.zoom(-500.0);
        orbit.update();
        assert_relative_eq!(orbit.distance(), 8.0);
    }

    #[test]
    fn damped_rotation_converges_to_full_delta() {
        let mut orbit = OrbitController::new(vec3(0.0, 0.0, 2.0), Vec3::ZERO);
        // Quarter of the viewport height: a quarter turn.
        orbit.rotate(-100.0, 0.0, 400);

        orbit.update();
        let first_step = orbit.theta;
        assert!(first_step > 0.0 && first_step < PI / 2.0);

        for _ in 0..2000 {
            if !orbit.update() {
                break;
            }
        }
        assert_relative_eq!(orbit.theta, PI / 2.0, epsilon = 1e-3);
        assert_relative_eq!(orbit.distance(), 2.0, epsilon = 1e-5);
    }

    #[test]
    fn polar_angle_never_flips_over_the_pole() {
        let mut orbit = OrbitController::new(vec3(0.0, 1.0, 1.0), Vec3::ZERO);
        orbit.damping = 1.0;
        orbit.rotate(0.0, 10_000.0, 100);
        orbit.update();
        assert!(orbit.phi >= POLAR_EPS);
        assert!(orbit.eye().y > 0.0);
    }
}
