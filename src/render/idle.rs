use lyon::math::{Box2D, point};
use palette::Srgba;

use crate::render::surface::DrawSurface;

const WASH_START: Srgba<u8> = Srgba::new(124, 58, 237, 64);
const WASH_END: Srgba<u8> = Srgba::new(14, 165, 233, 38);

/// Static placeholder: a faint diagonal violet-to-sky wash on black.
pub fn draw_idle<S: DrawSurface + ?Sized>(surface: &mut S) {
    let (w, h) = surface.size();
    let (w, h) = (w as f32, h as f32);
    surface.set_grade(None);
    surface.set_global_alpha(1.0);
    surface.fill_rect(
        Box2D::new(point(0.0, 0.0), point(w, h)),
        Srgba::new(0, 0, 0, 255),
    );
    surface.fill_linear_gradient(point(0.0, 0.0), point(w, h), WASH_START, WASH_END);
}
