use crate::motion::MotionPose;

/// Destination rectangle, in canvas pixels, for drawing an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Scale factor that makes an image fully cover the canvas on both axes.
pub fn cover_scale(canvas_w: f32, canvas_h: f32, src_w: u32, src_h: u32) -> f32 {
    let iw = src_w.max(1) as f32;
    let ih = src_h.max(1) as f32;
    let scale = (canvas_w.max(1.0) / iw).max(canvas_h.max(1.0) / ih);
    if scale.is_finite() { scale } else { 1.0 }
}

/// Cover-fit rectangle with the pose's extra zoom and pan applied.
///
/// Pan is a fraction of the half-overscan on each axis, so `|pan| <= 1`
/// never exposes the canvas behind the image.
pub fn cover_rect(
    canvas_w: f32,
    canvas_h: f32,
    src_w: u32,
    src_h: u32,
    pose: MotionPose,
) -> DrawRect {
    let base = cover_scale(canvas_w, canvas_h, src_w, src_h);
    let zoom = pose.scale.max(1.0);
    let w = src_w.max(1) as f32 * base * zoom;
    let h = src_h.max(1) as f32 * base * zoom;
    let max_pan_x = ((w - canvas_w) / 2.0).max(0.0);
    let max_pan_y = ((h - canvas_h) / 2.0).max(0.0);
    DrawRect {
        x: (canvas_w - w) / 2.0 + pose.pan_x.clamp(-1.0, 1.0) * max_pan_x,
        y: (canvas_h - h) / 2.0 + pose.pan_y.clamp(-1.0, 1.0) * max_pan_y,
        w,
        h,
    }
}

/// Largest size with the source aspect ratio that fits in `max_dim` on both
/// axes. Never upscales.
pub fn fit_within(src_w: u32, src_h: u32, max_dim: u32) -> (u32, u32) {
    let iw = src_w.max(1) as f32;
    let ih = src_h.max(1) as f32;
    let limit = max_dim.max(1) as f32;
    let scale = (limit / iw).min(limit / ih).min(1.0);
    let w = (iw * scale).round().clamp(1.0, limit);
    let h = (ih * scale).round().clamp(1.0, limit);
    (w as u32, h as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEUTRAL: MotionPose = MotionPose {
        scale: 1.0,
        pan_x: 0.0,
        pan_y: 0.0,
    };

    #[test]
    fn cover_fills_canvas_for_wide_and_tall_sources() {
        for (cw, ch) in [(1920.0, 1080.0), (1080.0, 1920.0), (1.0, 1.0), (333.0, 777.0)] {
            for (iw, ih) in [(4000, 3000), (3000, 4000), (1, 1), (10, 2000), (2000, 10)] {
                let r = cover_rect(cw, ch, iw, ih, NEUTRAL);
                assert!(r.w >= cw - 1e-3 && r.h >= ch - 1e-3, "{cw}x{ch} / {iw}x{ih}");
            }
        }
    }

    #[test]
    fn centred_without_pan() {
        let r = cover_rect(100.0, 100.0, 200, 100, NEUTRAL);
        assert_eq!((r.w, r.h), (200.0, 100.0));
        assert_eq!((r.x, r.y), (-50.0, 0.0));
    }

    #[test]
    fn full_pan_touches_but_never_reveals_edges() {
        let pose = MotionPose {
            scale: 1.1,
            pan_x: 1.0,
            pan_y: -1.0,
        };
        let r = cover_rect(100.0, 100.0, 100, 100, pose);
        assert!(r.x <= 1e-4 && r.x + r.w >= 100.0 - 1e-4);
        assert!(r.y <= 1e-4 && r.y + r.h >= 100.0 - 1e-4);
    }

    #[test]
    fn fit_within_keeps_aspect_and_never_upscales() {
        assert_eq!(fit_within(4000, 2000, 2048), (2048, 1024));
        assert_eq!(fit_within(800, 600, 2048), (800, 600));
        assert_eq!(fit_within(1000, 4000, 1000), (250, 1000));
    }
}
