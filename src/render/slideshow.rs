//! Ken Burns slideshow with trailing cross-fades.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use lyon::math::{Box2D, point};
use palette::Srgba;

use crate::config::{Configuration, LetterboxOptions};
use crate::events::ImageItem;
use crate::motion::{MotionParams, clamp01};
use crate::processing::color::ColorGrade;
use crate::render::surface::DrawSurface;

/// Where the playhead sits within the slide sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlidePosition {
    pub index: usize,
    /// Progress through the current slice, in `[0, 1)`.
    pub local_t: f32,
    /// Weight of the next image, in `[0, 1]`.
    pub fade: f32,
}

/// Cross-fade weight: zero for most of the slice, ramping to one over its
/// final `fade_frac`.
pub fn fade(local_t: f32, fade_frac: f32) -> f32 {
    if fade_frac <= 0.0 {
        return if local_t >= 1.0 { 1.0 } else { 0.0 };
    }
    clamp01((local_t - (1.0 - fade_frac)) / fade_frac)
}

/// Splits `duration_ms` evenly over `count` slides. `None` once the movie is
/// over or when there is nothing to show.
pub fn slide_at(
    elapsed_ms: f64,
    duration_ms: f64,
    count: usize,
    fade_frac: f32,
) -> Option<SlidePosition> {
    if count == 0 || !(duration_ms > 0.0) || elapsed_ms >= duration_ms {
        return None;
    }
    let elapsed = elapsed_ms.max(0.0);
    let slice = duration_ms / count as f64;
    let index = ((elapsed / slice).floor() as usize).min(count - 1);
    let local_t = ((elapsed - index as f64 * slice) / slice) as f32;
    let local_t = local_t.clamp(0.0, 1.0);
    Some(SlidePosition {
        index,
        local_t,
        fade: fade(local_t, fade_frac),
    })
}

/// When a slide starts and when the cross-fade into it runs, relative to
/// the start of the movie.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideTiming {
    pub index: usize,
    pub start: Duration,
    pub fade_in: Option<Range<Duration>>,
}

pub fn slide_schedule(duration: Duration, count: usize, fade_frac: f32) -> Vec<SlideTiming> {
    if count == 0 {
        return Vec::new();
    }
    let slice = duration.as_secs_f64() / count as f64;
    let fade = slice * f64::from(fade_frac.clamp(0.0, 1.0));
    (0..count)
        .map(|index| {
            let start = slice * index as f64;
            SlideTiming {
                index,
                start: Duration::from_secs_f64(start),
                fade_in: (index > 0 && fade > 0.0).then(|| {
                    Duration::from_secs_f64(start - fade)..Duration::from_secs_f64(start)
                }),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct SlideshowStyle {
    pub fade_fraction: f32,
    pub letterbox: LetterboxOptions,
    pub grade: ColorGrade,
}

impl Default for SlideshowStyle {
    fn default() -> Self {
        Self {
            fade_fraction: 0.3,
            letterbox: LetterboxOptions::default(),
            grade: ColorGrade::default(),
        }
    }
}

impl From<&Configuration> for SlideshowStyle {
    fn from(cfg: &Configuration) -> Self {
        Self {
            fade_fraction: cfg.fade_fraction,
            letterbox: cfg.letterbox,
            grade: cfg.grade,
        }
    }
}

/// Inputs for one slideshow frame.
pub struct SlideshowFrame<'a> {
    pub elapsed_ms: f64,
    pub duration_ms: f64,
    pub items: &'a [ImageItem],
    pub bitmaps: &'a HashMap<String, Arc<RgbaImage>>,
    pub motions: &'a HashMap<String, MotionParams>,
}

/// Draws one frame. Returns `None`, leaving the surface untouched, when the
/// playhead is past the end; the caller should then end the movie.
pub fn draw_slideshow<S: DrawSurface + ?Sized>(
    surface: &mut S,
    frame: &SlideshowFrame<'_>,
    style: &SlideshowStyle,
) -> Option<SlidePosition> {
    let pos = slide_at(
        frame.elapsed_ms,
        frame.duration_ms,
        frame.items.len(),
        style.fade_fraction,
    )?;
    let (w, h) = surface.size();
    let (w, h) = (w as f32, h as f32);
    let black = Srgba::new(0, 0, 0, 255);

    surface.set_global_alpha(1.0);
    surface.fill_rect(Box2D::new(point(0.0, 0.0), point(w, h)), black);

    surface.set_grade(Some(style.grade));
    draw_slide(surface, frame, pos.index, pos.local_t, 1.0 - pos.fade);
    if pos.index + 1 < frame.items.len() {
        draw_slide(surface, frame, pos.index + 1, pos.local_t, pos.fade);
    }
    surface.set_grade(None);

    let bar = (h * style.letterbox.height_fraction).round();
    if bar > 0.0 {
        surface.set_global_alpha(style.letterbox.opacity);
        surface.fill_rect(Box2D::new(point(0.0, 0.0), point(w, bar)), black);
        surface.fill_rect(Box2D::new(point(0.0, h - bar), point(w, h)), black);
    }
    surface.set_global_alpha(1.0);
    Some(pos)
}

fn draw_slide<S: DrawSurface + ?Sized>(
    surface: &mut S,
    frame: &SlideshowFrame<'_>,
    index: usize,
    local_t: f32,
    alpha: f32,
) {
    if alpha <= 0.0 {
        return;
    }
    let item = &frame.items[index];
    let (Some(bitmap), Some(motion)) = (frame.bitmaps.get(&item.id), frame.motions.get(&item.id))
    else {
        return;
    };
    surface.set_global_alpha(alpha);
    surface.draw_image_cover(bitmap, motion.at(local_t));
}
