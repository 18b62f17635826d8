//! Turns image lists into decoded bitmaps, motions and a palette, dropping
//! work that a newer list has superseded.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::Engine;
use image::RgbaImage;
use tokio::select;
use tokio::sync::mpsc::{Sender, UnboundedReceiver};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::Configuration;
use crate::error::Error;
use crate::events::{ImageItem, ResolveRequest, ResolvedAssets};
use crate::motion::derive_all;
use crate::processing::layout::fit_within;
use crate::processing::palette::extract_palette;
use crate::processing::resize::{FilterType, resize_rgba};
use crate::tasks::source::has_scheme;

/// Fetches the encoded bytes behind a source reference.
pub trait ImageFetcher: Send + Sync + 'static {
    fn fetch(&self, source_ref: &str) -> impl Future<Output = Result<Vec<u8>, Error>> + Send;
}

/// Reads `data:` URIs, `file://` URLs and plain paths.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    max_bytes: u64,
}

impl LocalFetcher {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    fn check_size(&self, size: u64) -> Result<(), Error> {
        if size > self.max_bytes {
            return Err(Error::SourceTooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

impl ImageFetcher for LocalFetcher {
    async fn fetch(&self, source_ref: &str) -> Result<Vec<u8>, Error> {
        if let Some(rest) = source_ref.strip_prefix("data:") {
            let payload = data_uri_payload(rest)?;
            // base64 expands 3 bytes to 4
            self.check_size(payload.len() as u64 / 4 * 3)?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(payload.trim())
                .map_err(|err| Error::InvalidDataUri(err.to_string()))?;
            self.check_size(bytes.len() as u64)?;
            return Ok(bytes);
        }

        let path = match source_ref.strip_prefix("file://") {
            Some(path) => PathBuf::from(path),
            None if has_scheme(source_ref) => {
                return Err(Error::UnsupportedSource(source_ref.to_string()));
            }
            None => PathBuf::from(source_ref),
        };
        let meta = tokio::fs::metadata(&path).await?;
        self.check_size(meta.len())?;
        Ok(tokio::fs::read(&path).await?)
    }
}

fn data_uri_payload(rest: &str) -> Result<&str, Error> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::InvalidDataUri("missing ',' separator".into()))?;
    if !header.ends_with(";base64") {
        return Err(Error::InvalidDataUri(format!(
            "expected base64 payload, got '{header}'"
        )));
    }
    Ok(payload)
}

#[derive(Debug, Clone, Copy)]
pub struct ResolverOptions {
    pub max_concurrent: usize,
    pub max_bitmap_dim: u32,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            max_bitmap_dim: 2048,
        }
    }
}

impl From<&Configuration> for ResolverOptions {
    fn from(cfg: &Configuration) -> Self {
        Self {
            max_concurrent: cfg.loader_max_concurrent_decodes,
            max_bitmap_dim: cfg.max_bitmap_dim,
        }
    }
}

/// Decodes every item, at most `max_concurrent` at a time. Items that fail
/// are logged and left out. `None` if `cancel` fires first.
pub async fn resolve<F: ImageFetcher>(
    items: &[ImageItem],
    fetcher: Arc<F>,
    opts: ResolverOptions,
    cancel: &CancellationToken,
) -> Option<HashMap<String, Arc<RgbaImage>>> {
    let mut seen = HashSet::new();
    let mut pending = items
        .iter()
        .filter(|item| seen.insert(item.id.as_str()))
        .cloned()
        .collect::<Vec<_>>()
        .into_iter();
    let mut tasks: JoinSet<(String, Result<RgbaImage>)> = JoinSet::new();
    let mut bitmaps = HashMap::new();
    let max_in_flight = opts.max_concurrent.max(1);

    loop {
        while tasks.len() < max_in_flight {
            let Some(item) = pending.next() else { break };
            let fetcher = Arc::clone(&fetcher);
            tasks.spawn(async move {
                let res = load_bitmap(fetcher.as_ref(), &item.source_ref, opts.max_bitmap_dim).await;
                (item.id, res)
            });
        }
        if tasks.is_empty() {
            break;
        }

        select! {
            biased;
            _ = cancel.cancelled() => {
                tasks.abort_all();
                return None;
            }
            Some(joined) = tasks.join_next() => match joined {
                Ok((id, Ok(bitmap))) => {
                    debug!(%id, width = bitmap.width(), height = bitmap.height(), "decoded");
                    bitmaps.insert(id, Arc::new(bitmap));
                }
                Ok((id, Err(err))) => warn!(%id, error = %format!("{err:#}"), "image omitted"),
                Err(err) => warn!(error = %err, "decode task failed"),
            }
        }
    }

    if cancel.is_cancelled() {
        return None;
    }
    Some(bitmaps)
}

async fn load_bitmap<F: ImageFetcher>(
    fetcher: &F,
    source_ref: &str,
    max_dim: u32,
) -> Result<RgbaImage> {
    let bytes = fetcher.fetch(source_ref).await?;
    tokio::task::spawn_blocking(move || decode_rgba8(&bytes, max_dim))
        .await
        .context("decode task panicked")?
}

/// Decodes to RGBA8 and shrinks to fit `max_dim` on both axes.
pub fn decode_rgba8(bytes: &[u8], max_dim: u32) -> Result<RgbaImage> {
    let img = image::load_from_memory(bytes).map_err(Error::from)?.to_rgba8();
    let (w, h) = fit_within(img.width(), img.height(), max_dim);
    if (w, h) == img.dimensions() {
        return Ok(img);
    }
    resize_rgba(&img, w, h, FilterType::CatmullRom).context("bitmap resize failed")
}

/// Resolves one request into the full asset bundle.
pub async fn resolve_assets<F: ImageFetcher>(
    req: ResolveRequest,
    fetcher: Arc<F>,
    opts: ResolverOptions,
    cancel: CancellationToken,
) -> Option<ResolvedAssets> {
    let bitmaps = resolve(&req.items, fetcher, opts, &cancel).await?;
    let motions = derive_all(&req.items);
    let palette = {
        let items = Arc::clone(&req.items);
        let bitmaps = bitmaps.clone();
        match tokio::task::spawn_blocking(move || extract_palette(&items, &bitmaps)).await {
            Ok(palette) => palette,
            Err(err) => {
                warn!(error = %err, "palette task failed");
                return None;
            }
        }
    };
    if cancel.is_cancelled() {
        return None;
    }
    Some(ResolvedAssets {
        generation: req.generation,
        bitmaps,
        motions,
        palette,
    })
}

/// Resolver task. A new request cancels whatever is still in flight; every
/// completed resolution is forwarded to `resolved_tx`.
#[instrument(skip_all)]
pub async fn run<F: ImageFetcher>(
    mut requests: UnboundedReceiver<ResolveRequest>,
    resolved_tx: Sender<ResolvedAssets>,
    fetcher: Arc<F>,
    opts: ResolverOptions,
    cancel: CancellationToken,
) -> Result<()> {
    let mut inflight: JoinSet<Option<ResolvedAssets>> = JoinSet::new();
    let mut active: Option<CancellationToken> = None;
    let mut accepting = true;

    loop {
        if !accepting && inflight.is_empty() {
            break;
        }
        select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting resolver task");
                break;
            }
            req = requests.recv(), if accepting => match req {
                Some(req) => {
                    if let Some(prev) = active.take() {
                        debug!("superseding in-flight resolution");
                        prev.cancel();
                    }
                    debug!(generation = req.generation.0, count = req.items.len(), "resolving");
                    let token = cancel.child_token();
                    active = Some(token.clone());
                    inflight.spawn(resolve_assets(req, Arc::clone(&fetcher), opts, token));
                }
                None => accepting = false,
            },
            Some(joined) = inflight.join_next() => match joined {
                Ok(Some(assets)) => {
                    if resolved_tx.send(assets).await.is_err() {
                        break;
                    }
                }
                Ok(None) => debug!("resolution cancelled"),
                Err(err) => warn!(error = %err, "resolution task failed"),
            },
        }
    }
    inflight.abort_all();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn large_bitmaps_are_downscaled() {
        let img = RgbaImage::from_pixel(300, 100, Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let decoded = decode_rgba8(&bytes, 150).unwrap();
        assert_eq!(decoded.dimensions(), (150, 50));
        assert_eq!(decode_rgba8(&bytes, 1000).unwrap().dimensions(), (300, 100));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(decode_rgba8(b"not an image", 64).is_err());
    }

    #[tokio::test]
    async fn data_uri_requires_base64() {
        let f = LocalFetcher::new(1024);
        assert!(matches!(
            f.fetch("data:image/png,rawbytes").await,
            Err(Error::InvalidDataUri(_))
        ));
        assert!(matches!(
            f.fetch("data:image/png;base64,@@@@").await,
            Err(Error::InvalidDataUri(_))
        ));
        assert_eq!(f.fetch("data:text/plain;base64,aGk=").await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn remote_schemes_are_unsupported() {
        let f = LocalFetcher::new(1024);
        assert!(matches!(
            f.fetch("https://example.com/a.png").await,
            Err(Error::UnsupportedSource(_))
        ));
    }

    #[tokio::test]
    async fn oversized_data_uri_is_rejected() {
        let f = LocalFetcher::new(2);
        assert!(matches!(
            f.fetch("data:text/plain;base64,aGVsbG8=").await,
            Err(Error::SourceTooLarge { .. })
        ));
    }
}
