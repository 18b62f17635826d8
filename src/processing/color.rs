use image::RgbaImage;
use palette::Srgb;
use serde::Deserialize;

/// Mean colour of every `stride`-th pixel, weighted by alpha. `None` when
/// nothing visible was sampled.
pub fn sampled_average(img: &RgbaImage, stride: usize) -> Option<Srgb<f32>> {
    let mut accum = [0f64; 3];
    let mut total = 0f64;
    for pixel in img.pixels().step_by(stride.max(1)) {
        let alpha = f64::from(pixel[3]) / 255.0;
        if alpha <= 0.0 {
            continue;
        }
        total += alpha;
        for c in 0..3 {
            accum[c] += f64::from(pixel[c]) * alpha;
        }
    }
    if total <= f64::EPSILON {
        return None;
    }
    Some(Srgb::new(
        (accum[0] / total) as f32,
        (accum[1] / total) as f32,
        (accum[2] / total) as f32,
    ))
}

/// Cinematic grade: contrast, then saturation, then brightness, with the
/// same semantics as the CSS filter functions of the same names.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ColorGrade {
    pub contrast: f32,
    pub saturation: f32,
    pub brightness: f32,
}

impl Default for ColorGrade {
    fn default() -> Self {
        Self {
            contrast: 1.08,
            saturation: 1.06,
            brightness: 1.02,
        }
    }
}

impl ColorGrade {
    pub const IDENTITY: Self = Self {
        contrast: 1.0,
        saturation: 1.0,
        brightness: 1.0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Folds the three steps into one affine matrix over normalised RGB.
    pub fn matrix(&self) -> GradeMatrix {
        let c = self.contrast;
        let s = self.saturation;
        let b = self.brightness;
        let sat = [
            [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
            [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
            [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
        ];
        // contrast: x' = c*x + (0.5 - 0.5c)
        let offset = 0.5 - 0.5 * c;
        let mut m = [[0.0f32; 4]; 3];
        for (row, sat_row) in m.iter_mut().zip(sat.iter()) {
            let row_sum: f32 = sat_row.iter().sum();
            for k in 0..3 {
                row[k] = b * sat_row[k] * c;
            }
            row[3] = b * row_sum * offset;
        }
        GradeMatrix { m }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeMatrix {
    m: [[f32; 4]; 3],
}

impl GradeMatrix {
    /// Row-major affine rows over normalised RGB; the last column is the
    /// offset.
    pub fn rows(&self) -> [[f32; 4]; 3] {
        self.m
    }

    /// Applies to 0..=255 channel values and clamps back into range.
    #[inline]
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        let mut out = [0.0f32; 3];
        for (o, row) in out.iter_mut().zip(self.m.iter()) {
            let v = row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2] + row[3] * 255.0;
            *o = v.clamp(0.0, 255.0);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn average_ignores_transparent_pixels() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([200, 100, 50, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        let avg = sampled_average(&img, 1).unwrap();
        assert!((avg.red - 200.0).abs() < 1e-3);
        assert!((avg.green - 100.0).abs() < 1e-3);
    }

    #[test]
    fn fully_transparent_image_has_no_average() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 0]));
        assert!(sampled_average(&img, 4).is_none());
    }

    #[test]
    fn identity_grade_is_a_no_op() {
        let m = ColorGrade::IDENTITY.matrix();
        let out = m.apply([12.0, 128.0, 250.0]);
        assert!((out[0] - 12.0).abs() < 1e-3);
        assert!((out[1] - 128.0).abs() < 1e-3);
        assert!((out[2] - 250.0).abs() < 1e-3);
    }

    #[test]
    fn contrast_spreads_around_mid_grey() {
        let grade = ColorGrade {
            contrast: 2.0,
            ..ColorGrade::IDENTITY
        };
        let m = grade.matrix();
        let mid = m.apply([127.5, 127.5, 127.5]);
        assert!((mid[0] - 127.5).abs() < 1e-2);
        let dark = m.apply([64.0, 64.0, 64.0]);
        assert!(dark[0] < 1.0);
    }

    #[test]
    fn default_grade_brightens_grey_slightly() {
        let out = ColorGrade::default().matrix().apply([200.0, 200.0, 200.0]);
        assert!(out[0] > 200.0 && out[0] < 255.0);
    }
}
