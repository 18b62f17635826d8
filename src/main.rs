use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use mind_movie::config::{Configuration, IntroDuration, TotalDuration};
use mind_movie::events::{ResolveRequest, ResolvedAssets, ViewerCommand};
use mind_movie::render::slideshow::slide_schedule;
use mind_movie::tasks::resolver::{self, LocalFetcher, ResolverOptions};
use mind_movie::tasks::source::{self, PhotoSource};
use mind_movie::tasks::viewer;

#[derive(Debug, Parser)]
#[command(
    name = "mind-movie",
    version,
    about = "Induction kaleidoscope followed by a Ken Burns mind-movie"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Total session length in seconds (30, 45 or 60)
    #[arg(long, value_name = "SECONDS")]
    total: Option<u32>,
    /// Intro length in seconds (3 to 7)
    #[arg(long, value_name = "SECONDS")]
    intro: Option<u32>,
    /// Start playing as soon as the photos are decoded
    #[arg(long)]
    autoplay: bool,
    /// More logging; repeat for more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Print the phase and slide schedule for the current photos and exit
    #[arg(long = "timeline-dry-run")]
    timeline_dry_run: bool,
}

fn default_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("mind_movie={level},wgpu=warn,wgpu_core=warn,wgpu_hal=warn,naga=warn,winit=warn")
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        total,
        intro,
        autoplay,
        verbose,
        timeline_dry_run,
    } = Args::parse();

    // RUST_LOG wins over -v
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose))),
        )
        .with_target(false)
        .compact()
        .init();

    let mut cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?;
    if let Some(secs) = total {
        cfg.total_duration_sec = TotalDuration::try_from(secs).map_err(anyhow::Error::msg)?;
    }
    if let Some(secs) = intro {
        cfg.intro_duration_sec = IntroDuration::try_from(secs).map_err(anyhow::Error::msg)?;
    }
    cfg.autoplay |= autoplay;
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::debug!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    let photo_source = source::from_config(&cfg.photo_source)?;

    if timeline_dry_run {
        return run_timeline_dry_run(&cfg, photo_source.as_ref());
    }

    let (resolve_tx, resolve_rx) = mpsc::unbounded_channel::<ResolveRequest>(); // Viewer -> Resolver
    let (resolved_tx, resolved_rx) = mpsc::channel::<ResolvedAssets>(4); // Resolver -> Viewer
    let (control_tx, control_rx) = mpsc::channel::<ViewerCommand>(16); // Watcher/signals -> Viewer

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        let control = control_tx.clone();
        tokio::spawn(async move {
            match signal(SignalKind::user_defined1()) {
                Ok(mut sigusr1) => loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = sigusr1.recv() => {
                            if received.is_none() {
                                break;
                            }
                            tracing::info!("SIGUSR1 received; toggling playback");
                            if let Err(err) = control.send(ViewerCommand::TogglePlay).await {
                                tracing::warn!("failed to forward play toggle: {err}");
                                break;
                            }
                        }
                    }
                },
                Err(err) => tracing::warn!("failed to register SIGUSR1 handler: {err}"),
            }
        });
    }

    let mut tasks = JoinSet::new();

    // Resolver
    tasks.spawn({
        let fetcher = Arc::new(LocalFetcher::new(cfg.max_source_bytes));
        let opts = ResolverOptions::from(&cfg);
        let cancel = cancel.clone();
        async move {
            resolver::run(resolve_rx, resolved_tx, fetcher, opts, cancel)
                .await
                .context("resolver task failed")
        }
    });

    // Source watcher
    match photo_source.watch_target() {
        Some(target) if cfg.photo_source.watch => {
            let debounce = cfg.photo_source.watch_debounce;
            let control = control_tx.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                source::watch(target, debounce, control, cancel)
                    .await
                    .context("source watcher failed")
            });
        }
        _ => tracing::debug!("photo source watching disabled"),
    }
    drop(control_tx);

    // The window runs on the main thread and returns when it closes or on cancellation.
    let viewer_result = viewer::build_event_loop().and_then(|event_loop| {
        viewer::run_windowed(
            event_loop,
            &cfg,
            photo_source,
            resolve_tx,
            resolved_rx,
            control_rx,
            cancel.clone(),
        )
    });
    if let Err(e) = viewer_result.context("viewer failed") {
        tracing::error!("{e:?}");
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }
    tracing::info!("shutdown complete");

    Ok(())
}

fn run_timeline_dry_run(cfg: &Configuration, photo_source: &dyn PhotoSource) -> Result<()> {
    let durations = cfg.durations()?;
    let items = photo_source.load().context("failed to load photo source")?;
    let intro = durations.intro_duration();
    let movie = durations.mind_movie_duration();

    println!(
        "# timeline dry run\n# photos: {}\n# durations: {}\n# fade-fraction: {}\n",
        items.len(),
        durations,
        cfg.fade_fraction
    );
    println!("  {:>8}  intro-kaleidoscope", "0.000s");
    if items.is_empty() {
        println!("(no photos; play would be ignored)");
        return Ok(());
    }
    println!("  {:>7.3}s  mind-movie", intro.as_secs_f64());
    for slot in slide_schedule(movie, items.len(), cfg.fade_fraction) {
        let start = intro + slot.start;
        let fade = match &slot.fade_in {
            Some(window) => format!(
                "fade-in {:.3}s..{:.3}s",
                (intro + window.start).as_secs_f64(),
                (intro + window.end).as_secs_f64()
            ),
            None => "cut-in".to_string(),
        };
        println!(
            "  {:>7.3}s    slide {:>3}  {:<28} {}",
            start.as_secs_f64(),
            slot.index + 1,
            fade,
            items[slot.index].id
        );
    }
    println!("  {:>7.3}s  ended", (intro + movie).as_secs_f64());
    Ok(())
}
