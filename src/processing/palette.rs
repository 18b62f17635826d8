//! Representative colours for the intro, one average per image followed by
//! farthest-point selection.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbaImage;
use palette::Srgb;
use tracing::{debug, warn};

use crate::events::ImageItem;
use crate::processing::color::sampled_average;
use crate::processing::resize::{FilterType, resize_rgba};

pub const MAX_COLORS: usize = 5;
const SAMPLE_GRID: u32 = 32;
const SAMPLE_STRIDE: usize = 4;

pub const FALLBACK_PALETTE: [Srgb<u8>; MAX_COLORS] = [
    Srgb::new(0x7c, 0x3a, 0xed),
    Srgb::new(0x06, 0xb6, 0xd4),
    Srgb::new(0xf4, 0x72, 0xb6),
    Srgb::new(0xa7, 0x8b, 0xfa),
    Srgb::new(0x38, 0xbd, 0xf8),
];

/// Builds the intro palette from the resolved bitmaps, visiting images in
/// `items` order. Never returns an empty palette.
pub fn extract_palette(
    items: &[ImageItem],
    bitmaps: &HashMap<String, Arc<RgbaImage>>,
) -> Vec<Srgb<u8>> {
    let mut samples = Vec::new();
    for item in items {
        let Some(bitmap) = bitmaps.get(&item.id) else {
            continue;
        };
        match downsample(bitmap) {
            Ok(grid) => {
                if let Some(avg) = sampled_average(&grid, SAMPLE_STRIDE) {
                    samples.push(avg);
                }
            }
            Err(err) => warn!(id = %item.id, error = ?err, "palette sampling failed"),
        }
    }

    if samples.is_empty() {
        return FALLBACK_PALETTE.to_vec();
    }

    let picked = farthest_points(&samples, MAX_COLORS);
    debug!(samples = samples.len(), picked = picked.len(), "palette computed");
    picked
        .into_iter()
        .map(|c| {
            Srgb::new(
                c.red.round().clamp(0.0, 255.0) as u8,
                c.green.round().clamp(0.0, 255.0) as u8,
                c.blue.round().clamp(0.0, 255.0) as u8,
            )
        })
        .collect()
}

/// Greedy farthest-point sampling seeded with the first sample. Ties keep
/// the earliest candidate.
pub fn farthest_points(samples: &[Srgb<f32>], limit: usize) -> Vec<Srgb<f32>> {
    let Some(first) = samples.first() else {
        return Vec::new();
    };
    let mut picked = vec![*first];
    while picked.len() < limit && picked.len() < samples.len() {
        let mut best: Option<(usize, f32)> = None;
        for (idx, s) in samples.iter().enumerate() {
            let min_dist = picked
                .iter()
                .map(|p| distance_sq(s, p))
                .fold(f32::INFINITY, f32::min);
            if best.is_none_or(|(_, score)| min_dist > score) {
                best = Some((idx, min_dist));
            }
        }
        match best {
            Some((idx, _)) => picked.push(samples[idx]),
            None => break,
        }
    }
    picked
}

fn distance_sq(a: &Srgb<f32>, b: &Srgb<f32>) -> f32 {
    let dr = a.red - b.red;
    let dg = a.green - b.green;
    let db = a.blue - b.blue;
    dr * dr + dg * dg + db * db
}

fn downsample(source: &RgbaImage) -> Result<RgbaImage> {
    resize_rgba(source, SAMPLE_GRID, SAMPLE_GRID, FilterType::Bilinear)
        .context("palette downsample failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(rgb: [u8; 3]) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(
            64,
            48,
            Rgba([rgb[0], rgb[1], rgb[2], 255]),
        ))
    }

    #[test]
    fn empty_input_uses_fallback() {
        let palette = extract_palette(&[], &HashMap::new());
        assert_eq!(palette, FALLBACK_PALETTE.to_vec());
    }

    #[test]
    fn unresolved_items_use_fallback() {
        let items = vec![ImageItem::new("a", "missing.jpg")];
        let palette = extract_palette(&items, &HashMap::new());
        assert_eq!(palette.len(), MAX_COLORS);
    }

    #[test]
    fn one_colour_per_image_up_to_five_and_first_leads() {
        let colours = [
            [10, 10, 10],
            [250, 250, 250],
            [250, 10, 10],
            [10, 250, 10],
            [10, 10, 250],
            [20, 20, 20],
            [240, 240, 240],
        ];
        let items: Vec<_> = (0..colours.len())
            .map(|i| ImageItem::new(format!("p{i}"), format!("p{i}.jpg")))
            .collect();
        let bitmaps: HashMap<_, _> = items
            .iter()
            .zip(colours)
            .map(|(item, c)| (item.id.clone(), solid(c)))
            .collect();

        let palette = extract_palette(&items, &bitmaps);
        assert_eq!(palette.len(), 5);
        assert_eq!(palette[0], Srgb::new(10, 10, 10));
        assert_eq!(palette[1], Srgb::new(250, 250, 250));
        assert!(!palette.contains(&Srgb::new(20, 20, 20)));
        assert!(!palette.contains(&Srgb::new(240, 240, 240)));
    }

    #[test]
    fn fewer_samples_than_limit_keeps_all() {
        let samples = [Srgb::new(0.0, 0.0, 0.0), Srgb::new(1.0, 1.0, 1.0)];
        assert_eq!(farthest_points(&samples, 5).len(), 2);
    }

    #[test]
    fn deterministic_for_same_bitmaps() {
        let items = vec![ImageItem::new("a", "a"), ImageItem::new("b", "b")];
        let bitmaps: HashMap<_, _> = [
            ("a".to_string(), solid([1, 2, 3])),
            ("b".to_string(), solid([200, 100, 0])),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            extract_palette(&items, &bitmaps),
            extract_palette(&items, &bitmaps)
        );
    }
}
