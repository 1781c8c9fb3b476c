// ============================================================================
// SCENE — planar car scene, ray-cast frame renderer
// ============================================================================
//
// Three quads facing +Z, back to front:
//   curb backdrop (optional)  z = -0.01
//   car photo                 z =  0.01
//   decal / paint layer       z =  0.02  (same footprint as the car)
// over a flat background colour.

pub mod camera;
pub mod ray;

use std::sync::Arc;

use glam::Vec3;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::color::blend_pixel;
use crate::geometry::Uv;
use crate::ops::transform::bilinear_sample;
use crate::surface::DecalSurface;

use self::camera::Camera;
use self::ray::{Ray, TexturedPlane};

pub const DEFAULT_BACKGROUND: Rgba<u8> = Rgba([0x55, 0x55, 0x55, 0xff]);
pub const CAR_Z: f32 = 0.01;
pub const PAINT_Z: f32 = 0.02;
pub const CURB_SIZE: f32 = 2.5;
pub const CURB_CENTER: Vec3 = Vec3::new(0.0, -0.15, -0.01);

/// A quad with the image mapped onto it.
#[derive(Clone)]
pub struct ScenePlane {
    pub plane: TexturedPlane,
    pub image: Arc<RgbaImage>,
}

impl ScenePlane {
    /// Car quad sized from the image aspect ratio.
    pub fn car(image: Arc<RgbaImage>) -> Self {
        let aspect = image.width() as f32 / image.height().max(1) as f32;
        Self { plane: TexturedPlane::for_aspect(aspect, CAR_Z), image }
    }

    pub fn curb(image: Arc<RgbaImage>) -> Self {
        Self { plane: TexturedPlane::new(CURB_CENTER, CURB_SIZE, CURB_SIZE), image }
    }

    fn sample(&self, uv: Uv) -> Rgba<u8> {
        sample_uv(&self.image, uv)
    }
}

/// Bilinear lookup using the plane's UV convention (v up).
fn sample_uv(img: &RgbaImage, uv: Uv) -> Rgba<u8> {
    let x = uv.u * img.width() as f32 - 0.5;
    let y = (1.0 - uv.v) * img.height() as f32 - 0.5;
    let x = x.clamp(0.0, img.width().saturating_sub(1) as f32);
    let y = y.clamp(0.0, img.height().saturating_sub(1) as f32);
    bilinear_sample(img, x, y)
}

#[derive(Clone)]
pub struct Scene {
    pub background: Rgba<u8>,
    pub curb: Option<ScenePlane>,
    pub car: Option<ScenePlane>,
}

impl Default for Scene {
    fn default() -> Self {
        Self { background: DEFAULT_BACKGROUND, curb: None, car: None }
    }
}

impl Scene {
    /// The quad the decal surface is mapped onto.  Exists only while a car
    /// is displayed.
    pub fn paint_plane(&self) -> Option<TexturedPlane> {
        self.car.as_ref().map(|car| TexturedPlane { center: Vec3::new(car.plane.center.x, car.plane.center.y, PAINT_Z), ..car.plane })
    }

    fn shade(&self, ray: &Ray, surface: Option<&DecalSurface>) -> Rgba<u8> {
        let mut out = self.background;
        if let Some(curb) = &self.curb
            && let Some((_, uv)) = curb.plane.hit_uv(ray)
        {
            out = blend_pixel(out, curb.sample(uv), 1.0);
        }
        if let Some(car) = &self.car
            && let Some((_, uv)) = car.plane.hit_uv(ray)
        {
            out = blend_pixel(out, car.sample(uv), 1.0);
        }
        // Paint draws over the car without a depth test
        if let (Some(surface), Some(plane)) = (surface, self.paint_plane())
            && let Some((_, uv)) = plane.hit_uv(ray)
        {
            out = blend_pixel(out, sample_uv(surface.texture(), uv), 1.0);
        }
        out
    }

    /// Render a `width × height` frame seen through `camera`.
    pub fn render(&self, camera: &Camera, surface: Option<&DecalSurface>, width: u32, height: u32) -> RgbaImage {
        let width = width.max(1);
        let height = height.max(1);
        let mut frame = RgbaImage::new(width, height);
        let row_bytes = width as usize * 4;
        let raw: &mut [u8] = &mut frame;
        let unproject = camera.unprojector();

        raw.par_chunks_mut(row_bytes).enumerate().for_each(|(y, row)| {
            let ndc_y = 1.0 - (y as f32 + 0.5) / height as f32 * 2.0;
            for x in 0..width as usize {
                let ndc_x = (x as f32 + 0.5) / width as f32 * 2.0 - 1.0;
                let ray = unproject.ray(ndc_x, ndc_y);
                let px = self.shade(&ray, surface);
                row[x * 4..x * 4 + 4].copy_from_slice(&px.0);
            }
        });
        frame
    }
}
