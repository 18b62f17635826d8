use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use serde::Deserialize;
use tokio::sync::mpsc::{self, Sender};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::config::PhotoSourceConfig;
use crate::error::Error;
use crate::events::{ImageItem, ViewerCommand};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Produces the ordered image list on demand.
pub trait PhotoSource: Send + Sync {
    fn load(&self) -> Result<Vec<ImageItem>, Error>;

    /// Where to listen for changes, if anywhere.
    fn watch_target(&self) -> Option<WatchTarget>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoCategory {
    Past,
    Present,
    Future,
}

/// One entry of the photo manifest as written by the upload side.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPhoto {
    pub id: String,
    pub url: String,
    pub category: PhotoCategory,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
}

/// Past, then present, then future; upload order within each.
pub fn chronological(mut photos: Vec<StoredPhoto>) -> Vec<StoredPhoto> {
    photos.sort_by_key(|p| p.category);
    photos
}

/// JSON array of [`StoredPhoto`]. A missing file is an empty library.
pub struct ManifestSource {
    path: PathBuf,
}

impl ManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn resolve_url(&self, url: &str) -> String {
        if has_scheme(url) || Path::new(url).is_absolute() {
            return url.to_string();
        }
        match self.path.parent() {
            Some(dir) => dir.join(url).to_string_lossy().into_owned(),
            None => url.to_string(),
        }
    }
}

impl PhotoSource for ManifestSource {
    fn load(&self) -> Result<Vec<ImageItem>, Error> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "manifest missing; treating as empty");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        let photos: Vec<StoredPhoto> = serde_json::from_str(&text)?;
        Ok(chronological(photos)
            .into_iter()
            .map(|p| ImageItem::new(p.id, self.resolve_url(&p.url)))
            .collect())
    }

    fn watch_target(&self) -> Option<WatchTarget> {
        let file_name = self.path.file_name()?.to_os_string();
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Some(WatchTarget {
            path: dir,
            mode: RecursiveMode::NonRecursive,
            file_name: Some(file_name),
        })
    }
}

/// Every image below a directory, sorted by path.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PhotoSource for DirectorySource {
    fn load(&self) -> Result<Vec<ImageItem>, Error> {
        let root = self.root.canonicalize().map_err(|err| {
            Error::Source(format!("cannot open {}: {err}", self.root.display()))
        })?;
        let mut items = Vec::new();
        for entry in WalkDir::new(&root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if !is_image(path) {
                continue;
            }
            let id = path
                .strip_prefix(&root)
                .unwrap_or(path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            items.push(ImageItem::new(id, path.to_string_lossy()));
        }
        Ok(items)
    }

    fn watch_target(&self) -> Option<WatchTarget> {
        Some(WatchTarget {
            path: self.root.clone(),
            mode: RecursiveMode::Recursive,
            file_name: None,
        })
    }
}

pub fn from_config(cfg: &PhotoSourceConfig) -> Result<Box<dyn PhotoSource>> {
    match (&cfg.manifest, &cfg.directory) {
        (Some(manifest), None) => Ok(Box::new(ManifestSource::new(manifest))),
        (None, Some(dir)) => Ok(Box::new(DirectorySource::new(dir))),
        _ => anyhow::bail!("photo-source must set exactly one of manifest or directory"),
    }
}

#[derive(Debug, Clone)]
pub struct WatchTarget {
    pub path: PathBuf,
    pub mode: RecursiveMode,
    /// Only changes to this file name count; otherwise any image does.
    pub file_name: Option<std::ffi::OsString>,
}

impl WatchTarget {
    pub fn is_relevant(&self, event: &Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        event.paths.iter().any(|p| match &self.file_name {
            Some(name) => p.file_name() == Some(name.as_os_str()),
            None => is_image(p) || matches!(event.kind, EventKind::Remove(_)),
        })
    }
}

/// Sends [`ViewerCommand::Refresh`] whenever the source changes on disk,
/// once per burst of events.
#[instrument(skip_all, fields(path = %target.path.display()))]
pub async fn watch(
    target: WatchTarget,
    debounce: Duration,
    refresh_tx: Sender<ViewerCommand>,
    cancel: CancellationToken,
) -> Result<()> {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(128);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })?;
    watcher.watch(&target.path, target.mode)?;
    info!("photo source watcher initialized");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            res = watch_rx.recv() => match res {
                Some(Ok(event)) if target.is_relevant(&event) => {
                    debug!(kind = ?event.kind, paths = ?event.paths, "photo source changed");
                    if !settle(&mut watch_rx, debounce, &cancel).await {
                        break;
                    }
                    if refresh_tx.send(ViewerCommand::Refresh).await.is_err() {
                        break;
                    }
                }
                Some(Ok(event)) => debug!(kind = ?event.kind, "fs: ignored"),
                Some(Err(err)) => warn!(error = %err, "watch error"),
                None => break,
            }
        }
    }
    info!("photo source watcher stopped");
    Ok(())
}

/// Swallows events until `quiet` passes without one. Returns false if
/// cancelled or the channel closed.
async fn settle(
    rx: &mut mpsc::Receiver<notify::Result<Event>>,
    quiet: Duration,
    cancel: &CancellationToken,
) -> bool {
    let mut deadline = Instant::now() + quiet;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = sleep_until(deadline) => return true,
            res = rx.recv() => match res {
                Some(_) => deadline = Instant::now() + quiet,
                None => return false,
            }
        }
    }
}

#[inline]
fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if IMAGE_EXTENSIONS.contains(&e.as_str())
    )
}

/// `true` for `scheme:rest` references. Single letters are drive prefixes.
pub fn has_scheme(s: &str) -> bool {
    match s.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
