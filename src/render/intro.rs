//! Induction kaleidoscope. Every frame is a pure function of time, size and
//! palette.

use std::f32::consts::{FRAC_PI_2, TAU};

use lyon::math::{Angle, Box2D, Point, Transform, point};
use palette::{Srgb, Srgba};

use crate::motion::clamp01;
use crate::processing::palette::FALLBACK_PALETTE;
use crate::render::surface::{BlendMode, DrawSurface, opaque};

pub const SEGMENTS: usize = 12;
/// Radians per millisecond.
const ROTATION_SPEED: f64 = 0.000_25;
const RING_WIDTH: f32 = 2.0;

const COUNTDOWN_TRACK: Srgba<u8> = Srgba::new(255, 255, 255, 38);
const COUNTDOWN_FILL: Srgba<u8> = Srgba::new(217, 70, 239, 217);

fn wedge(reach: f32, half_width: f32) -> [Point; 3] {
    [
        point(0.0, 0.0),
        point(reach, -half_width),
        point(reach, half_width),
    ]
}

pub fn draw_intro<S: DrawSurface + ?Sized>(surface: &mut S, time_ms: f64, palette: &[Srgb<u8>]) {
    let palette = if palette.is_empty() {
        &FALLBACK_PALETTE[..]
    } else {
        palette
    };
    let n = palette.len();
    let (w, h) = surface.size();
    let (w, h) = (w as f32, h as f32);
    let center = point(w / 2.0, h / 2.0);
    let short = w.min(h);
    let base_rot = (time_ms * ROTATION_SPEED) as f32;

    surface.set_grade(None);
    surface.set_global_alpha(1.0);
    surface.fill_rect(
        Box2D::new(point(0.0, 0.0), point(w, h)),
        Srgba::new(0, 0, 0, 255),
    );
    surface.fill_radial_gradient(
        center,
        w.max(h) * 0.6,
        opaque(palette[0]),
        Srgba::new(0, 0, 0, 230),
        BlendMode::SourceOver,
    );

    for i in 0..SEGMENTS {
        let a0 = TAU * i as f32 / SEGMENTS as f32 + base_rot;
        let a1 = TAU * (i + 1) as f32 / SEGMENTS as f32 + base_rot;
        let color = opaque(palette[i % n]);
        let phase = i as f64;
        let pulse = clamp01(0.45 + 0.35 * (time_ms * 0.002 + phase).sin() as f32);
        let r1 = short * (0.15 + pulse * 0.35);
        let r2 = short * (0.35 + pulse * 0.45);

        let frame = Transform::rotation(Angle::radians(a0)).then_translate(center.to_vector());
        surface.set_global_alpha(0.55);
        surface.fill_wedge(&frame, wedge(r2, r1), color);

        surface.set_global_alpha(0.22);
        surface.fill_wedge(
            &frame,
            wedge(r2 * 0.72, r1 * 0.6),
            opaque(palette[(i + 2) % n]),
        );

        let mirrored = Transform::scale(1.0, -1.0).then(&frame);
        surface.set_global_alpha(0.18);
        surface.fill_wedge(
            &mirrored,
            wedge(r2 * 0.9, r1 * 0.35),
            opaque(palette[(i + 3) % n]),
        );

        let ring = short * (0.18 + 0.08 * (time_ms * 0.001 + phase).sin() as f32);
        surface.set_global_alpha(0.06);
        surface.fill_annular_arc(center, ring, RING_WIDTH, a0, a1 - a0, color);
    }

    surface.set_global_alpha(1.0);
    surface.fill_radial_gradient(
        center,
        short * 0.35,
        Srgba::new(255, 255, 255, 64),
        Srgba::new(255, 255, 255, 0),
        BlendMode::Screen,
    );
}

/// Countdown ring over the intro: a faint full track and a bright arc that
/// grows clockwise from twelve o'clock as `progress` goes from 0 to 1.
pub fn draw_countdown<S: DrawSurface + ?Sized>(surface: &mut S, progress: f32) {
    let (w, h) = surface.size();
    let (w, h) = (w as f32, h as f32);
    let size = (w.min(h) * 0.12).clamp(32.0, 160.0);
    let radius = size * 0.42;
    let width = size * 0.08;
    let center = point(w / 2.0, h / 2.0);

    surface.set_global_alpha(1.0);
    surface.fill_annular_arc(center, radius, width, 0.0, TAU, COUNTDOWN_TRACK);
    let sweep = clamp01(progress) * TAU;
    if sweep > 0.0 {
        surface.fill_annular_arc(center, radius, width, -FRAC_PI_2, sweep, COUNTDOWN_FILL);
    }
}
