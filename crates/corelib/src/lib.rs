//! Core types: math re-exports, Transform, bounds, camera and orbit control.

pub use glam::{Mat3, Mat4, Quat, Vec3, Vec4, vec3};

pub mod bounds;
pub mod camera;
pub mod orbit;
pub mod transform;
