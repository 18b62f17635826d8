use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use palette::Srgb;

use crate::motion::MotionParams;

/// One photo supplied by the photo source. Never mutated by the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageItem {
    pub id: String,
    pub source_ref: String,
}

impl ImageItem {
    pub fn new(id: impl Into<String>, source_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_ref: source_ref.into(),
        }
    }
}

/// Monotonic token identifying one image-set revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub generation: Generation,
    pub items: Arc<[ImageItem]>,
}

/// Everything derived from one image set, produced together so the viewer
/// swaps it atomically.
#[derive(Debug, Clone)]
pub struct ResolvedAssets {
    pub generation: Generation,
    pub bitmaps: HashMap<String, Arc<RgbaImage>>,
    pub motions: HashMap<String, MotionParams>,
    pub palette: Vec<Srgb<u8>>,
}

/// External control input. Start and stop both go through the toggle, the
/// same as the Space key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    TogglePlay,
    Refresh,
}
