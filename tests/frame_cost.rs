use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use mind_movie::events::ImageItem;
use mind_movie::motion::derive_all;
use mind_movie::processing::palette::FALLBACK_PALETTE;
use mind_movie::render::intro::{draw_countdown, draw_intro};
use mind_movie::render::scene::Scene;
use mind_movie::render::slideshow::{SlideshowFrame, SlideshowStyle, draw_slideshow};

const FRAMES: u32 = 60;
/// A 60 Hz frame is 16.7 ms; recording has to leave most of it to the GPU,
/// even in an unoptimised build.
const BUDGET: Duration = Duration::from_millis(8);

fn intro_frame(scene: &mut Scene, t: f64) {
    scene.clear();
    draw_intro(scene, t, &FALLBACK_PALETTE);
    draw_countdown(scene, (t / 5000.0) as f32);
}

fn average(mut frame: impl FnMut(f64)) -> Duration {
    let start = Instant::now();
    for i in 0..FRAMES {
        frame(f64::from(i) * 16.0);
    }
    start.elapsed() / FRAMES
}

#[test]
fn intro_records_within_a_frame_budget_at_1080p() {
    let mut scene = Scene::new(1920, 1080);
    intro_frame(&mut scene, 0.0);
    let per_frame = average(|t| intro_frame(&mut scene, 1000.0 + t));
    assert!(per_frame < BUDGET, "intro frame took {per_frame:?}");
}

#[test]
fn intro_geometry_stays_small_at_4k() {
    let mut scene = Scene::new(3840, 2160);
    intro_frame(&mut scene, 2500.0);
    assert!(scene.vertices().len() < 4_000, "{} vertices", scene.vertices().len());
    assert!(scene.commands().len() <= 3);
}

fn slideshow_fixture() -> (Vec<ImageItem>, HashMap<String, Arc<RgbaImage>>) {
    let items: Vec<_> = (0..4)
        .map(|i| ImageItem::new(format!("p{i}"), format!("p{i}.jpg")))
        .collect();
    let bitmaps = items
        .iter()
        .map(|item| {
            (
                item.id.clone(),
                Arc::new(RgbaImage::from_pixel(1600, 1200, Rgba([90, 80, 70, 255]))),
            )
        })
        .collect();
    (items, bitmaps)
}

#[test]
fn slideshow_records_within_a_frame_budget_at_1080p() {
    let (items, bitmaps) = slideshow_fixture();
    let motions = derive_all(&items);
    let style = SlideshowStyle::default();
    let mut scene = Scene::new(1920, 1080);
    let per_frame = average(|t| {
        scene.clear();
        let frame = SlideshowFrame {
            elapsed_ms: 2000.0 + t * 40.0,
            duration_ms: 40_000.0,
            items: &items,
            bitmaps: &bitmaps,
            motions: &motions,
        };
        draw_slideshow(&mut scene, &frame, &style);
    });
    assert!(per_frame < BUDGET, "slideshow frame took {per_frame:?}");
}

#[test]
fn slideshow_work_does_not_grow_with_resolution() {
    let (items, bitmaps) = slideshow_fixture();
    let motions = derive_all(&items);
    let style = SlideshowStyle::default();
    let frame = SlideshowFrame {
        elapsed_ms: 9_500.0,
        duration_ms: 40_000.0,
        items: &items,
        bitmaps: &bitmaps,
        motions: &motions,
    };
    let mut small = Scene::new(640, 360);
    let mut large = Scene::new(3840, 2160);
    draw_slideshow(&mut small, &frame, &style).unwrap();
    draw_slideshow(&mut large, &frame, &style).unwrap();
    assert_eq!(small.vertices().len(), large.vertices().len());
    assert_eq!(small.commands().len(), large.commands().len());
}
