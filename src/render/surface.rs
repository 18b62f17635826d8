//! The drawing interface renderers target.

use std::sync::Arc;

use image::RgbaImage;
use lyon::math::{Box2D, Point, Transform};
use palette::{Srgb, Srgba};

use crate::motion::MotionPose;
use crate::processing::color::ColorGrade;
use crate::processing::layout::{DrawRect, cover_rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    SourceOver,
    Screen,
}

/// Minimal 2D drawing API. Every fill is multiplied by the current global
/// alpha; the grade only affects images.
pub trait DrawSurface {
    fn size(&self) -> (u32, u32);

    fn set_global_alpha(&mut self, alpha: f32);

    /// `None` disables grading.
    fn set_grade(&mut self, grade: Option<ColorGrade>);

    fn fill_rect(&mut self, rect: Box2D, color: Srgba<u8>);

    /// Fills the triangle `apex, points[1], points[2]` after mapping it
    /// through `transform`.
    fn fill_wedge(&mut self, transform: &Transform, points: [Point; 3], color: Srgba<u8>);

    /// Strokes an arc of `width` centred on `radius`, clockwise from
    /// `start` (radians, 0 = +x, screen coordinates) through `sweep`.
    fn fill_annular_arc(
        &mut self,
        center: Point,
        radius: f32,
        width: f32,
        start: f32,
        sweep: f32,
        color: Srgba<u8>,
    );

    /// Fills the whole surface with a radial gradient from `inner` at
    /// `center` to `outer` at `radius` and beyond.
    fn fill_radial_gradient(
        &mut self,
        center: Point,
        radius: f32,
        inner: Srgba<u8>,
        outer: Srgba<u8>,
        blend: BlendMode,
    );

    /// Fills the whole surface with a linear gradient along `from -> to`.
    fn fill_linear_gradient(&mut self, from: Point, to: Point, start: Srgba<u8>, end: Srgba<u8>);

    /// Shared so a GPU-backed surface can keep the upload keyed on the
    /// bitmap's identity.
    fn draw_image(&mut self, image: &Arc<RgbaImage>, dest: DrawRect);

    /// Cover-fits `image` to the surface with the pose's zoom and pan.
    fn draw_image_cover(&mut self, image: &Arc<RgbaImage>, pose: MotionPose) {
        let (w, h) = self.size();
        let dest = cover_rect(w as f32, h as f32, image.width(), image.height(), pose);
        self.draw_image(image, dest);
    }
}

pub fn opaque(c: Srgb<u8>) -> Srgba<u8> {
    Srgba::new(c.red, c.green, c.blue, 255)
}
