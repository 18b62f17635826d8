use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use palette::Srgb;
use tracing::{debug, info};

use crate::config::DurationConfig;
use crate::events::{Generation, ImageItem, ResolveRequest, ResolvedAssets};
use crate::motion::MotionParams;
use crate::processing::palette::FALLBACK_PALETTE;
use crate::timeline::{IntroTimer, Phase, PhaseChange, PhaseController};

/// The current image set, its committed assets, and the phase controller.
///
/// Resolution runs elsewhere; results come back through [`Session::commit`],
/// which only accepts assets for the most recent [`Session::set_items`].
pub struct Session {
    items: Arc<[ImageItem]>,
    generation: Generation,
    assets: Option<ResolvedAssets>,
    timeline: PhaseController,
}

impl Session {
    pub fn new(durations: DurationConfig) -> Self {
        Self {
            items: Arc::from(Vec::new()),
            generation: Generation::default(),
            assets: None,
            timeline: PhaseController::new(durations),
        }
    }

    /// Replaces the image list and returns the resolution request for it.
    /// Every call starts a new generation, even if the ids are unchanged.
    /// Assets committed for the previous set are dropped with it.
    pub fn set_items(&mut self, items: Vec<ImageItem>) -> ResolveRequest {
        self.generation = self.generation.next();
        self.items = Arc::from(items);
        self.assets = None;
        info!(
            count = self.items.len(),
            generation = self.generation.0,
            "image set refreshed"
        );
        ResolveRequest {
            generation: self.generation,
            items: Arc::clone(&self.items),
        }
    }

    /// Installs resolved assets if they belong to the latest image set.
    pub fn commit(&mut self, assets: ResolvedAssets) -> bool {
        if assets.generation != self.generation {
            debug!(
                stale = assets.generation.0,
                current = self.generation.0,
                "discarding stale resolution"
            );
            return false;
        }
        info!(
            generation = assets.generation.0,
            resolved = assets.bitmaps.len(),
            of = self.items.len(),
            "image set resolved"
        );
        self.assets = Some(assets);
        true
    }

    pub fn play(&mut self, now: Instant) -> Option<IntroTimer> {
        let resolved = self.resolved_count();
        match self.timeline.play(now, resolved) {
            Some((change, timer)) => {
                log_change(change);
                Some(timer)
            }
            None => {
                debug!(resolved, phase = %self.phase(), "play ignored");
                None
            }
        }
    }

    pub fn stop(&mut self, now: Instant) -> Option<PhaseChange> {
        let change = self.timeline.stop(now);
        if let Some(change) = change {
            log_change(change);
        }
        change
    }

    /// Play from Idle/Ended, stop otherwise.
    pub fn toggle(&mut self, now: Instant) -> Option<IntroTimer> {
        if self.phase().is_animating() {
            self.stop(now);
            None
        } else {
            self.play(now)
        }
    }

    pub fn on_intro_timer(&mut self, timer: IntroTimer, now: Instant) -> Option<PhaseChange> {
        let change = self.timeline.on_intro_timer(timer, now);
        match change {
            Some(change) => log_change(change),
            None => debug!(epoch = timer.epoch, "ignoring stale intro timer"),
        }
        change
    }

    pub fn tick(&mut self, now: Instant) -> Option<PhaseChange> {
        let change = self.timeline.tick(now, self.items.len());
        if let Some(change) = change {
            log_change(change);
        }
        change
    }

    pub fn set_durations(&mut self, durations: DurationConfig) -> bool {
        self.timeline.set_durations(durations)
    }

    pub fn phase(&self) -> Phase {
        self.timeline.phase()
    }

    pub fn timeline(&self) -> &PhaseController {
        &self.timeline
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn mind_movie_duration(&self) -> Duration {
        self.timeline.mind_movie_duration()
    }

    pub fn intro_progress(&self, now: Instant) -> f32 {
        self.timeline.intro_progress(now)
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.timeline.elapsed(now)
    }

    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }

    pub fn image_count(&self) -> usize {
        self.items.len()
    }

    pub fn resolved_count(&self) -> usize {
        self.assets.as_ref().map_or(0, |a| a.bitmaps.len())
    }

    pub fn bitmaps(&self) -> Option<&HashMap<String, Arc<RgbaImage>>> {
        self.assets.as_ref().map(|a| &a.bitmaps)
    }

    pub fn motions(&self) -> Option<&HashMap<String, MotionParams>> {
        self.assets.as_ref().map(|a| &a.motions)
    }

    /// Committed palette, or the fallback before anything has resolved.
    pub fn palette(&self) -> &[Srgb<u8>] {
        match &self.assets {
            Some(assets) if !assets.palette.is_empty() => &assets.palette,
            _ => &FALLBACK_PALETTE,
        }
    }
}

fn log_change(change: PhaseChange) {
    info!(from = %change.from, to = %change.to, "phase transition");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::derive_all;
    use image::Rgba;

    fn items(ids: &[&str]) -> Vec<ImageItem> {
        ids.iter()
            .map(|id| ImageItem::new(*id, format!("{id}.png")))
            .collect()
    }

    fn assets_for(req: &ResolveRequest) -> ResolvedAssets {
        let bitmaps = req
            .items
            .iter()
            .map(|item| {
                (
                    item.id.clone(),
                    Arc::new(RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]))),
                )
            })
            .collect();
        ResolvedAssets {
            generation: req.generation,
            bitmaps,
            motions: derive_all(&req.items),
            palette: vec![Srgb::new(9, 9, 9)],
        }
    }

    #[test]
    fn reordering_bumps_generation() {
        let mut s = Session::new(DurationConfig::default());
        let a = s.set_items(items(&["x", "y"]));
        let b = s.set_items(items(&["y", "x"]));
        assert!(b.generation > a.generation);
    }

    #[test]
    fn stale_commit_is_rejected() {
        let mut s = Session::new(DurationConfig::default());
        let old = s.set_items(items(&["a"]));
        let new = s.set_items(items(&["b", "c"]));

        assert!(s.commit(assets_for(&new)));
        assert!(!s.commit(assets_for(&old)));
        let bitmaps = s.bitmaps().unwrap();
        assert!(bitmaps.contains_key("b") && !bitmaps.contains_key("a"));
        assert_eq!(s.palette(), &[Srgb::new(9, 9, 9)]);
    }

    #[test]
    fn play_needs_a_resolved_bitmap() {
        let now = Instant::now();
        let mut s = Session::new(DurationConfig::default());
        assert_eq!(s.palette(), &FALLBACK_PALETTE);
        let req = s.set_items(items(&["a"]));
        assert!(s.play(now).is_none());
        assert_eq!(s.phase(), Phase::Idle);

        s.commit(assets_for(&req));
        assert!(s.play(now).is_some());
        assert_eq!(s.phase(), Phase::IntroKaleidoscope);
    }

    #[test]
    fn toggle_stops_a_running_session() {
        let now = Instant::now();
        let mut s = Session::new(DurationConfig::default());
        let req = s.set_items(items(&["a"]));
        s.commit(assets_for(&req));
        assert!(s.toggle(now).is_some());
        assert!(s.toggle(now).is_none());
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn emptied_list_ends_the_movie() {
        let now = Instant::now();
        let mut s = Session::new(DurationConfig::default());
        let req = s.set_items(items(&["a"]));
        s.commit(assets_for(&req));
        let timer = s.play(now).unwrap();
        s.on_intro_timer(timer, timer.fire_at);
        s.set_items(Vec::new());
        assert_eq!(s.tick(timer.fire_at).map(|c| c.to), Some(Phase::Ended));
    }

    #[test]
    fn refresh_drops_assets_of_the_previous_set() {
        let now = Instant::now();
        let mut s = Session::new(DurationConfig::default());
        let req = s.set_items(items(&["a"]));
        assert!(s.commit(assets_for(&req)));
        assert_eq!(s.resolved_count(), 1);

        s.set_items(Vec::new());
        assert_eq!(s.resolved_count(), 0);
        assert!(s.bitmaps().is_none());
        assert_eq!(s.palette(), &FALLBACK_PALETTE);
        assert!(s.play(now).is_none());
        assert_eq!(s.phase(), Phase::Idle);
    }
}
