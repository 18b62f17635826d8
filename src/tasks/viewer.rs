use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::mpsc::{Receiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowAttributes};

use crate::config::Configuration;
use crate::events::{ResolveRequest, ResolvedAssets, ViewerCommand};
use crate::render::idle::draw_idle;
use crate::render::intro::{draw_countdown, draw_intro};
use crate::render::present::{PresentOutcome, Presenter};
use crate::render::slideshow::{SlideshowFrame, SlideshowStyle, draw_slideshow};
use crate::render::scene::Scene;
use crate::session::Session;
use crate::tasks::source::PhotoSource;
use crate::timeline::{IntroTimer, Phase};

#[derive(Debug)]
pub enum ViewerEvent {
    Command(ViewerCommand),
    Resolved(ResolvedAssets),
    IntroElapsed(IntroTimer),
    Cancelled,
}

/// Backing-store size for a window: its logical size times the scale
/// factor, with the scale capped at `max_dpr`.
pub fn backing_size(physical: PhysicalSize<u32>, scale_factor: f64, max_dpr: f32) -> (u32, u32) {
    let scale = if scale_factor.is_finite() && scale_factor > 0.0 {
        scale_factor
    } else {
        1.0
    };
    let dpr = scale.min(f64::from(max_dpr.max(1.0)));
    let logical_w = f64::from(physical.width) / scale;
    let logical_h = f64::from(physical.height) / scale;
    (
        ((logical_w * dpr).floor() as u32).max(1),
        ((logical_h * dpr).floor() as u32).max(1),
    )
}

struct ViewerApp {
    cancel: CancellationToken,
    proxy: EventLoopProxy<ViewerEvent>,
    session: Session,
    source: Box<dyn PhotoSource>,
    resolve_tx: UnboundedSender<ResolveRequest>,
    style: SlideshowStyle,
    max_dpr: f32,
    fullscreen: bool,
    autoplay_pending: bool,

    window: Option<Arc<Window>>,
    presenter: Option<Presenter>,
    scene: Scene,
    inert: bool,
    intro_timer: Option<JoinHandle<()>>,
    drawn_phase: Option<Phase>,
    title: String,
}

impl ViewerApp {
    fn new(
        cfg: &Configuration,
        session: Session,
        source: Box<dyn PhotoSource>,
        resolve_tx: UnboundedSender<ResolveRequest>,
        proxy: EventLoopProxy<ViewerEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cancel,
            proxy,
            session,
            source,
            resolve_tx,
            style: SlideshowStyle::from(cfg),
            max_dpr: cfg.max_device_pixel_ratio,
            fullscreen: cfg.fullscreen,
            autoplay_pending: cfg.autoplay,
            window: None,
            presenter: None,
            scene: Scene::new(1, 1),
            inert: false,
            intro_timer: None,
            drawn_phase: None,
            title: String::new(),
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let mut attrs = WindowAttributes::default().with_title("mind-movie");
        if self.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                None
            }
        }
    }

    /// Window or GPU trouble ends rendering for good; nothing retries.
    fn go_inert(&mut self, event_loop: &ActiveEventLoop) {
        self.inert = true;
        self.presenter = None;
        self.window = None;
        event_loop.exit();
    }

    fn refresh(&mut self) {
        match self.source.load() {
            Ok(items) => {
                let req = self.session.set_items(items);
                if self.resolve_tx.send(req).is_err() {
                    warn!("resolver is gone; refresh dropped");
                }
            }
            Err(err) => warn!(error = %err, "photo source refresh failed"),
        }
    }

    fn play(&mut self) {
        let now = Instant::now();
        if let Some(timer) = self.session.play(now) {
            self.arm_intro_timer(timer);
        }
        self.request_redraw();
    }

    fn toggle(&mut self) {
        match self.session.toggle(Instant::now()) {
            Some(timer) => self.arm_intro_timer(timer),
            None if !self.session.phase().is_animating() => self.disarm_intro_timer(),
            None => {}
        }
        self.request_redraw();
    }

    fn handle_command(&mut self, cmd: ViewerCommand) {
        debug!(?cmd, "viewer command");
        match cmd {
            ViewerCommand::TogglePlay => self.toggle(),
            ViewerCommand::Refresh => self.refresh(),
        }
    }

    fn arm_intro_timer(&mut self, timer: IntroTimer) {
        self.disarm_intro_timer();
        let proxy = self.proxy.clone();
        let cancel = self.cancel.clone();
        self.intro_timer = Some(tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(timer.fire_at)) => {
                    let _ = proxy.send_event(ViewerEvent::IntroElapsed(timer));
                }
            }
        }));
    }

    fn disarm_intro_timer(&mut self) {
        if let Some(task) = self.intro_timer.take() {
            task.abort();
        }
    }

    fn on_resolved(&mut self, assets: ResolvedAssets) {
        if !self.session.commit(assets) {
            return;
        }
        if self.autoplay_pending && self.session.resolved_count() > 0 {
            self.autoplay_pending = false;
            info!("autoplay");
            self.play();
        }
        self.request_redraw();
    }

    /// Matches the backing store to the window; reallocates only on change.
    fn sync_backing_store(&mut self, window: &Window) {
        let (w, h) = backing_size(window.inner_size(), window.scale_factor(), self.max_dpr);
        if self.scene.resize(w, h) {
            debug!(width = w, height = h, "backing store resized");
            self.drawn_phase = None;
        }
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        if self.inert {
            return;
        }
        let Some(window) = self.window.clone() else {
            return;
        };
        self.sync_backing_store(&window);

        let now = Instant::now();
        self.session.tick(now);
        let phase = self.session.phase();

        let redrawn = match phase {
            Phase::IntroKaleidoscope => {
                let since = self
                    .session
                    .timeline()
                    .state()
                    .phase_started_at
                    .map_or(0.0, |start| now.saturating_duration_since(start).as_secs_f64() * 1000.0);
                self.scene.clear();
                draw_intro(&mut self.scene, since, self.session.palette());
                draw_countdown(&mut self.scene, self.session.intro_progress(now));
                true
            }
            Phase::MindMovie => {
                // A refreshed set shows black slots until its assets commit.
                let no_bitmaps = HashMap::new();
                let no_motions = HashMap::new();
                let frame = SlideshowFrame {
                    elapsed_ms: self.session.elapsed(now).as_secs_f64() * 1000.0,
                    duration_ms: self.session.mind_movie_duration().as_secs_f64() * 1000.0,
                    items: self.session.items(),
                    bitmaps: self.session.bitmaps().unwrap_or(&no_bitmaps),
                    motions: self.session.motions().unwrap_or(&no_motions),
                };
                self.scene.clear();
                draw_slideshow(&mut self.scene, &frame, &self.style).is_some()
            }
            Phase::Idle if self.drawn_phase != Some(Phase::Idle) => {
                self.scene.clear();
                draw_idle(&mut self.scene);
                true
            }
            Phase::Idle => false,
            // the last movie frame stays up
            Phase::Ended => false,
        };
        self.drawn_phase = Some(phase);

        let Some(presenter) = self.presenter.as_mut() else {
            return;
        };
        if redrawn {
            presenter.render(&self.scene);
        }
        if presenter.present(&window) == PresentOutcome::Fatal {
            error!("presenter failed; rendering stopped");
            self.go_inert(event_loop);
            return;
        }

        self.update_title(&window);
        if phase.is_animating() {
            window.request_redraw();
        }
    }

    fn update_title(&mut self, window: &Window) {
        let title = format!(
            "mind-movie | phase: {} | mind-movie: {}s",
            self.session.phase(),
            self.session.mind_movie_duration().as_secs()
        );
        if title != self.title {
            window.set_title(&title);
            self.title = title;
        }
    }

    fn request_redraw(&self) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }
        if self.inert || self.presenter.is_some() {
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            self.go_inert(event_loop);
            return;
        };
        match Presenter::new(window.clone()) {
            Ok(presenter) => self.presenter = Some(presenter),
            Err(err) => {
                error!(error = ?err, "failed to initialize GPU state");
                self.go_inert(event_loop);
                return;
            }
        }
        self.sync_backing_store(&window);
        self.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(presenter) = self.presenter.as_mut() {
                    presenter.resize(size);
                }
                self.request_redraw();
            }
            WindowEvent::ScaleFactorChanged { .. } => self.request_redraw(),
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                if event.repeat {
                    return;
                }
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Space) => self.toggle(),
                    PhysicalKey::Code(KeyCode::KeyR) => self.refresh(),
                    PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => self.draw(event_loop),
            _ => {}
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Command(cmd) => self.handle_command(cmd),
            ViewerEvent::Resolved(assets) => self.on_resolved(assets),
            ViewerEvent::IntroElapsed(timer) => {
                self.intro_timer = None;
                if self.session.on_intro_timer(timer, Instant::now()).is_some() {
                    self.request_redraw();
                }
            }
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                event_loop.exit();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.disarm_intro_timer();
        self.cancel.cancel();
        self.presenter = None;
        self.window = None;
        info!("viewer shut down");
    }
}

pub fn build_event_loop() -> Result<EventLoop<ViewerEvent>> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);
    Ok(event_loop)
}

/// Runs the window on the calling thread until it closes or `cancel` fires.
/// Resolved assets and external commands are forwarded into the event loop.
pub fn run_windowed(
    event_loop: EventLoop<ViewerEvent>,
    cfg: &Configuration,
    source: Box<dyn PhotoSource>,
    resolve_tx: UnboundedSender<ResolveRequest>,
    mut resolved_rx: Receiver<ResolvedAssets>,
    mut control: Receiver<ViewerCommand>,
    cancel: CancellationToken,
) -> Result<()> {
    let durations = cfg.durations()?;
    let proxy = event_loop.create_proxy();

    let forward_task = {
        let cancel = cancel.clone();
        let proxy = proxy.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => ViewerEvent::Cancelled,
                    Some(assets) = resolved_rx.recv() => ViewerEvent::Resolved(assets),
                    Some(cmd) = control.recv() => ViewerEvent::Command(cmd),
                    else => break,
                };
                let done = matches!(event, ViewerEvent::Cancelled);
                if proxy.send_event(event).is_err() || done {
                    break;
                }
            }
        })
    };

    let mut app = ViewerApp::new(
        cfg,
        Session::new(durations),
        source,
        resolve_tx,
        proxy,
        cancel,
    );
    info!(durations = %durations, "viewer starting");
    app.refresh();
    let run_result = event_loop.run_app(&mut app);
    forward_task.abort();

    run_result.context("viewer event loop failed")
}
