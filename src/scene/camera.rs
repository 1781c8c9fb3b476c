//! Perspective camera and the orbit rig that drives it.
//!
//! The orbit follows the usual spherical convention: polar angle measured
//! from +Y, azimuth around +Y starting at +Z.  The reset pose sits at
//! `(0, 0, 1)` looking at the origin.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{Mat4, Vec3};

use super::ray::Ray;

pub const DEFAULT_FOV_DEG: f32 = 75.0;
pub const MIN_DISTANCE: f32 = 0.5;
pub const MAX_DISTANCE: f32 = 2.0;
pub const MAX_POLAR: f32 = FRAC_PI_2;
/// Keeps the camera off the pole where `up` and view direction coincide.
const MIN_POLAR: f32 = 1e-3;
const NEAR: f32 = 0.1;
const FAR: f32 = 100.0;

/// Pinhole camera.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_deg: f32,
    pub aspect: f32,
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_deg.to_radians(), self.aspect, NEAR, FAR)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Inverse view-projection, computed once per frame or event.
    pub fn unprojector(&self) -> Unprojector {
        Unprojector { inv_view_proj: self.view_proj().inverse() }
    }

    /// Ray through a clip-space point (`ndc_x` right, `ndc_y` up, both -1..1).
    pub fn ray_through_ndc(&self, ndc_x: f32, ndc_y: f32) -> Ray {
        self.unprojector().ray(ndc_x, ndc_y)
    }
}

/// Clip space back to world rays.
#[derive(Debug, Clone, Copy)]
pub struct Unprojector {
    inv_view_proj: Mat4,
}

impl Unprojector {
    /// Ray from the near plane towards the far plane through `(ndc_x, ndc_y)`.
    pub fn ray(&self, ndc_x: f32, ndc_y: f32) -> Ray {
        let near = self.inv_view_proj.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
        let far = self.inv_view_proj.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
        Ray::new(near, far - near)
    }
}

/// Orbit rig around a fixed target, clamped the way the viewer allows.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub target: Vec3,
    distance: f32,
    azimuth: f32,
    polar: f32,
    pub fov_y_deg: f32,
    pub aspect: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 1.0,
            azimuth: 0.0,
            polar: FRAC_PI_2,
            fov_y_deg: DEFAULT_FOV_DEG,
            aspect: 1.0,
        }
    }
}

impl OrbitCamera {
    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn polar(&self) -> f32 {
        self.polar
    }

    /// Back to the initial pose; keeps aspect.
    pub fn reset(&mut self) {
        let aspect = self.aspect;
        *self = Self { aspect, ..Self::default() };
    }

    /// Drag by `(dx, dy)` screen pixels on a viewport `viewport_height` tall.
    /// A drag across the full height turns the camera by one full revolution.
    pub fn rotate(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        if viewport_height <= 0.0 {
            return;
        }
        self.azimuth = (self.azimuth - TAU * dx / viewport_height).rem_euclid(TAU);
        self.polar = (self.polar - TAU * dy / viewport_height).clamp(MIN_POLAR, MAX_POLAR);
    }

    /// Multiply the orbit distance; `factor < 1` moves closer.
    pub fn zoom(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.distance = (self.distance * factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
        }
    }

    pub fn position(&self) -> Vec3 {
        let (sp, cp) = self.polar.sin_cos();
        let (sa, ca) = self.azimuth.sin_cos();
        self.target + Vec3::new(sp * sa, cp, sp * ca) * self.distance
    }

    pub fn camera(&self) -> Camera {
        Camera {
            position: self.position(),
            target: self.target,
            up: Vec3::Y,
            fov_y_deg: self.fov_y_deg,
            aspect: self.aspect,
        }
    }
}
