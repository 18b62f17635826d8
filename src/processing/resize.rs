use anyhow::{Context, Result, bail};
use fast_image_resize as fir;
use image::RgbaImage;

pub use fir::FilterType;

/// Resamples an RGBA8 bitmap to exactly `target_w` x `target_h`.
pub fn resize_rgba(
    source: &RgbaImage,
    target_w: u32,
    target_h: u32,
    filter: FilterType,
) -> Result<RgbaImage> {
    if target_w == 0 || target_h == 0 {
        bail!("resize dimensions must be positive");
    }
    if source.dimensions() == (target_w, target_h) {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(filter));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .with_context(|| format!("resize to {target_w}x{target_h} failed"))?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| anyhow::anyhow!("failed to construct resized RGBA image"))
}
