//! Screen → surface UV picking by ray/plane intersection.

use glam::Vec3;

use super::camera::Camera;
use crate::geometry::Uv;

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// `direction` is normalised on construction.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction: direction.normalize_or_zero() }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Distance along `ray` to the plane through `point` with `normal`.
/// Only front faces count: a ray travelling with the normal, or parallel
/// to the plane, misses.
pub fn ray_plane_intersection(ray: &Ray, point: Vec3, normal: Vec3) -> Option<f32> {
    let denom = -ray.direction.dot(normal);
    if denom < 1e-4 {
        return None;
    }
    let t = (ray.origin - point).dot(normal) / denom;
    if t < 0.0 { None } else { Some(t) }
}

/// Client-space rectangle the frame is drawn into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportRect {
    pub fn new(width: f32, height: f32) -> Self {
        Self { left: 0.0, top: 0.0, width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 { self.width / self.height } else { 1.0 }
    }

    /// Client coordinates → clip space (x right, y up, −1..1 inside).
    pub fn to_ndc(&self, client_x: f32, client_y: f32) -> Option<(f32, f32)> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let x = (client_x - self.left) / self.width * 2.0 - 1.0;
        let y = -((client_y - self.top) / self.height * 2.0 - 1.0);
        Some((x, y))
    }
}

/// Axis-aligned rectangle facing +Z, textured with u left→right and
/// v bottom→top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexturedPlane {
    pub center: Vec3,
    pub width: f32,
    pub height: f32,
}

impl TexturedPlane {
    pub fn new(center: Vec3, width: f32, height: f32) -> Self {
        Self { center, width, height }
    }

    /// Plane sized for an image of `aspect` (w/h): the long edge spans 1.5.
    pub fn for_aspect(aspect: f32, z: f32) -> Self {
        let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
        let (w, h) = if aspect >= 1.0 { (1.5, 1.5 / aspect) } else { (1.5 * aspect, 1.5) };
        Self::new(Vec3::new(0.0, 0.0, z), w, h)
    }

    /// Ray parameter and UV of the hit, or `None` off the quad.
    pub fn hit_uv(&self, ray: &Ray) -> Option<(f32, Uv)> {
        let t = ray_plane_intersection(ray, self.center, Vec3::Z)?;
        let p = ray.at(t);
        let u = (p.x - self.center.x) / self.width + 0.5;
        let v = (p.y - self.center.y) / self.height + 0.5;
        let uv = Uv::new(u, v);
        uv.is_inside().then_some((t, uv))
    }
}

/// Map a client-space pointer position to UV on `plane`.
pub fn screen_to_uv(client_x: f32, client_y: f32, viewport: &ViewportRect, camera: &Camera, plane: &TexturedPlane) -> Option<Uv> {
    let (nx, ny) = viewport.to_ndc(client_x, client_y)?;
    let ray = camera.ray_through_ndc(nx, ny);
    plane.hit_uv(&ray).map(|(_, uv)| uv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::camera::OrbitCamera;

    #[test]
    fn test_ray_plane_intersection_hit() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0));
        let t = ray_plane_intersection(&ray, Vec3::ZERO, Vec3::Z).unwrap();
        assert!((t - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ray_plane_intersection_parallel_and_behind() {
        let parallel = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(ray_plane_intersection(&parallel, Vec3::ZERO, Vec3::Z).is_none());
        // Plane lies behind the origin
        let away = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(ray_plane_intersection(&away, Vec3::new(0.0, 0.0, 2.0), Vec3::Z).is_none());
        // Back face
        let back = Ray::new(Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(ray_plane_intersection(&back, Vec3::ZERO, Vec3::Z).is_none());
    }

    #[test]
    fn test_screen_center_maps_to_uv_center() {
        let cam = OrbitCamera::default().camera();
        let vp = ViewportRect::new(800.0, 800.0);
        let plane = TexturedPlane::for_aspect(1.5, 0.02);
        let uv = screen_to_uv(400.0, 400.0, &vp, &cam, &plane).unwrap();
        assert!((uv.u - 0.5).abs() < 1e-4);
        assert!((uv.v - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_up_and_right_on_screen_is_up_and_right_in_uv() {
        let cam = OrbitCamera::default().camera();
        let vp = ViewportRect::new(800.0, 800.0);
        let plane = TexturedPlane::for_aspect(1.0, 0.02);
        let uv = screen_to_uv(500.0, 300.0, &vp, &cam, &plane).unwrap();
        assert!(uv.u > 0.5);
        assert!(uv.v > 0.5);
    }

    #[test]
    fn test_corner_misses_small_plane() {
        let cam = OrbitCamera::default().camera();
        let vp = ViewportRect { left: 100.0, top: 50.0, width: 400.0, height: 400.0 };
        let plane = TexturedPlane::new(Vec3::ZERO, 0.1, 0.1);
        assert!(screen_to_uv(100.0, 50.0, &vp, &cam, &plane).is_none());
        assert!(screen_to_uv(300.0, 250.0, &vp, &cam, &plane).is_some());
    }

    #[test]
    fn test_plane_for_portrait_image() {
        let p = TexturedPlane::for_aspect(0.5, 0.01);
        assert!((p.width - 0.75).abs() < 1e-6);
        assert!((p.height - 1.5).abs() < 1e-6);
        assert_eq!(p.center.z, 0.01);
    }
}
