use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;

use crate::processing::color::ColorGrade;

/// Allowed total session lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u32")]
pub enum TotalDuration {
    Thirty,
    FortyFive,
    Sixty,
}

impl TotalDuration {
    pub const ALL: [Self; 3] = [Self::Thirty, Self::FortyFive, Self::Sixty];

    pub const fn secs(self) -> u32 {
        match self {
            Self::Thirty => 30,
            Self::FortyFive => 45,
            Self::Sixty => 60,
        }
    }
}

impl TryFrom<u32> for TotalDuration {
    type Error = String;

    fn try_from(secs: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|d| d.secs() == secs)
            .ok_or_else(|| format!("total duration must be one of 30, 45, 60 seconds (got {secs})"))
    }
}

/// Allowed intro (induction) lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u32")]
pub enum IntroDuration {
    Three,
    Four,
    Five,
    Six,
    Seven,
}

impl IntroDuration {
    pub const ALL: [Self; 5] = [Self::Three, Self::Four, Self::Five, Self::Six, Self::Seven];

    pub const fn secs(self) -> u32 {
        match self {
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
        }
    }
}

impl TryFrom<u32> for IntroDuration {
    type Error = String;

    fn try_from(secs: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|d| d.secs() == secs)
            .ok_or_else(|| format!("intro duration must be between 3 and 7 seconds (got {secs})"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationConfig {
    total: TotalDuration,
    intro: IntroDuration,
}

impl DurationConfig {
    pub fn new(total: TotalDuration, intro: IntroDuration) -> Result<Self> {
        ensure!(
            intro.secs() < total.secs(),
            "intro duration ({}s) must be shorter than total duration ({}s)",
            intro.secs(),
            total.secs()
        );
        Ok(Self { total, intro })
    }

    pub fn total(&self) -> TotalDuration {
        self.total
    }

    pub fn intro(&self) -> IntroDuration {
        self.intro
    }

    pub fn intro_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.intro.secs()))
    }

    /// Slideshow length: total minus intro, floored at zero.
    pub fn mind_movie_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.total.secs()))
            .saturating_sub(self.intro_duration())
    }
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            total: TotalDuration::FortyFive,
            intro: IntroDuration::Five,
        }
    }
}

impl fmt::Display for DurationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}s total / {}s intro / {}s mind-movie",
            self.total.secs(),
            self.intro.secs(),
            self.mind_movie_duration().as_secs()
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PhotoSourceConfig {
    /// JSON photo list kept by the upload collaborator.
    pub manifest: Option<PathBuf>,
    /// Directory scanned recursively for images.
    pub directory: Option<PathBuf>,
    /// Refresh automatically when the source changes on disk.
    pub watch: bool,
    #[serde(with = "humantime_serde")]
    pub watch_debounce: Duration,
}

impl Default for PhotoSourceConfig {
    fn default() -> Self {
        Self {
            manifest: None,
            directory: None,
            watch: true,
            watch_debounce: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LetterboxOptions {
    /// Height of each bar as a fraction of the canvas height.
    pub height_fraction: f32,
    pub opacity: f32,
}

impl Default for LetterboxOptions {
    fn default() -> Self {
        Self {
            height_fraction: 0.08,
            opacity: 0.25,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    pub photo_source: PhotoSourceConfig,
    pub total_duration_sec: TotalDuration,
    pub intro_duration_sec: IntroDuration,
    /// Trailing share of each slide spent cross-fading into the next.
    pub fade_fraction: f32,
    pub letterbox: LetterboxOptions,
    pub grade: ColorGrade,
    /// Upper bound on backing-store pixels per logical pixel.
    pub max_device_pixel_ratio: f32,
    /// Maximum number of concurrent image decodes in the resolver.
    pub loader_max_concurrent_decodes: usize,
    /// Decoded bitmaps are downscaled to fit this size on both axes.
    pub max_bitmap_dim: u32,
    /// Sources larger than this are rejected before decoding.
    pub max_source_bytes: u64,
    /// Start playback as soon as the first image set resolves.
    pub autoplay: bool,
    pub fullscreen: bool,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    pub fn durations(&self) -> Result<DurationConfig> {
        DurationConfig::new(self.total_duration_sec, self.intro_duration_sec)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        match (&self.photo_source.manifest, &self.photo_source.directory) {
            (Some(_), None) | (None, Some(_)) => {}
            (Some(_), Some(_)) => {
                bail!("photo-source must set exactly one of manifest or directory, not both")
            }
            (None, None) => bail!("photo-source must set either manifest or directory"),
        }
        self.durations().context("invalid durations")?;
        ensure!(
            self.fade_fraction > 0.0 && self.fade_fraction <= 1.0,
            "fade-fraction must be in (0, 1]"
        );
        ensure!(
            (0.0..0.5).contains(&self.letterbox.height_fraction),
            "letterbox.height-fraction must be in [0, 0.5)"
        );
        ensure!(
            (0.0..=1.0).contains(&self.letterbox.opacity),
            "letterbox.opacity must be in [0, 1]"
        );
        ensure!(
            self.grade.contrast > 0.0 && self.grade.saturation >= 0.0 && self.grade.brightness > 0.0,
            "grade values must be positive"
        );
        ensure!(
            self.max_device_pixel_ratio >= 1.0,
            "max-device-pixel-ratio must be at least 1.0"
        );
        ensure!(
            self.loader_max_concurrent_decodes > 0,
            "loader-max-concurrent-decodes must be greater than zero"
        );
        ensure!(self.max_bitmap_dim >= 64, "max-bitmap-dim must be at least 64");
        ensure!(
            self.max_source_bytes > 0,
            "max-source-bytes must be greater than zero"
        );
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            photo_source: PhotoSourceConfig::default(),
            total_duration_sec: TotalDuration::FortyFive,
            intro_duration_sec: IntroDuration::Five,
            fade_fraction: 0.3,
            letterbox: LetterboxOptions::default(),
            grade: ColorGrade::default(),
            max_device_pixel_ratio: 2.0,
            loader_max_concurrent_decodes: 4,
            max_bitmap_dim: 2048,
            max_source_bytes: 10 * 1024 * 1024,
            autoplay: false,
            fullscreen: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mind_movie_is_total_minus_intro() {
        let d = DurationConfig::new(TotalDuration::Thirty, IntroDuration::Seven).unwrap();
        assert_eq!(d.mind_movie_duration(), Duration::from_secs(23));
        assert_eq!(DurationConfig::default().mind_movie_duration().as_millis(), 40_000);
    }

    #[test]
    fn every_allowed_pair_is_valid() {
        for total in TotalDuration::ALL {
            for intro in IntroDuration::ALL {
                assert!(DurationConfig::new(total, intro).is_ok());
            }
        }
    }

    #[test]
    fn rejects_off_menu_durations() {
        assert!(TotalDuration::try_from(50).is_err());
        assert!(IntroDuration::try_from(2).is_err());
        assert_eq!(IntroDuration::try_from(6), Ok(IntroDuration::Six));
    }
}
