use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use image::{ImageFormat, Rgba, RgbaImage};
use mind_movie::config::DurationConfig;
use mind_movie::error::Error;
use mind_movie::events::{Generation, ImageItem, ResolveRequest, ResolvedAssets};
use mind_movie::session::Session;
use mind_movie::tasks::resolver::{
    self, ImageFetcher, LocalFetcher, ResolverOptions, resolve, resolve_assets,
};
use mind_movie::timeline::Phase;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn png(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(w, h, Rgba(rgba));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// `slow:*` never completes, `bad:*` fails, anything else is a small red PNG.
struct FakeFetcher;

impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, source_ref: &str) -> Result<Vec<u8>, Error> {
        if source_ref.starts_with("slow:") {
            std::future::pending::<()>().await;
        }
        if source_ref.starts_with("bad:") {
            return Err(Error::UnsupportedSource(source_ref.to_string()));
        }
        Ok(png(8, 6, [220, 20, 20, 255]))
    }
}

fn request(generation: u64, refs: &[(&str, &str)]) -> ResolveRequest {
    ResolveRequest {
        generation: Generation(generation),
        items: refs
            .iter()
            .map(|(id, source)| ImageItem::new(*id, *source))
            .collect::<Vec<_>>()
            .into(),
    }
}

#[tokio::test]
async fn failed_items_are_omitted_not_fatal() {
    let req = request(1, &[("ok", "mem:ok"), ("broken", "bad:broken")]);
    let cancel = CancellationToken::new();
    let assets = resolve_assets(
        req,
        Arc::new(FakeFetcher),
        ResolverOptions::default(),
        cancel,
    )
    .await
    .expect("not cancelled");

    assert_eq!(assets.generation, Generation(1));
    assert!(assets.bitmaps.contains_key("ok"));
    assert!(!assets.bitmaps.contains_key("broken"));
    assert_eq!(assets.bitmaps["ok"].dimensions(), (8, 6));
    assert_eq!(assets.motions.len(), 2);
    assert_eq!(assets.palette.len(), 1);
}

#[tokio::test]
async fn duplicate_ids_are_fetched_once() {
    let items = vec![
        ImageItem::new("a", "mem:a"),
        ImageItem::new("a", "mem:a-again"),
        ImageItem::new("b", "mem:b"),
    ];
    let bitmaps = resolve(
        &items,
        Arc::new(FakeFetcher),
        ResolverOptions {
            max_concurrent: 1,
            max_bitmap_dim: 64,
        },
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(bitmaps.len(), 2);
}

#[tokio::test]
async fn cancelled_resolution_yields_nothing() {
    let items = vec![ImageItem::new("s", "slow:s")];
    let cancel = CancellationToken::new();
    let pending = resolve(&items, Arc::new(FakeFetcher), ResolverOptions::default(), &cancel);
    cancel.cancel();
    assert!(pending.await.is_none());
}

#[tokio::test]
async fn newer_request_supersedes_in_flight_one() {
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (done_tx, mut done_rx) = mpsc::channel::<ResolvedAssets>(4);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(resolver::run(
        req_rx,
        done_tx,
        Arc::new(FakeFetcher),
        ResolverOptions::default(),
        cancel.clone(),
    ));

    req_tx.send(request(1, &[("old", "slow:old")])).unwrap();
    req_tx.send(request(2, &[("new", "mem:new")])).unwrap();
    drop(req_tx);

    let assets = done_rx.recv().await.expect("newest request resolves");
    assert_eq!(assets.generation, Generation(2));
    assert!(assets.bitmaps.contains_key("new"));

    // The superseded request never reports and the task winds down.
    assert!(done_rx.recv().await.is_none());
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn session_only_accepts_the_latest_generation() {
    let mut session = Session::new(DurationConfig::default());
    let first = session.set_items(vec![ImageItem::new("a", "mem:a")]);
    let second = session.set_items(vec![ImageItem::new("b", "mem:b")]);

    let fetcher = Arc::new(FakeFetcher);
    let opts = ResolverOptions::default();
    let cancel = CancellationToken::new();
    let late = resolve_assets(first, Arc::clone(&fetcher), opts, cancel.clone())
        .await
        .unwrap();
    let current = resolve_assets(second, fetcher, opts, cancel).await.unwrap();

    assert!(session.commit(current));
    assert!(!session.commit(late));
    assert_eq!(session.resolved_count(), 1);
    assert!(session.bitmaps().unwrap().contains_key("b"));

    assert!(session.play(Instant::now()).is_some());
    assert_eq!(session.phase(), Phase::IntroKaleidoscope);
}

#[tokio::test]
async fn cancel_stops_the_resolver_task() {
    let (_req_tx, req_rx) = mpsc::unbounded_channel::<ResolveRequest>();
    let (done_tx, _done_rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(resolver::run(
        req_rx,
        done_tx,
        Arc::new(FakeFetcher),
        ResolverOptions::default(),
        cancel.clone(),
    ));
    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn local_fetcher_reads_data_uris_and_files() {
    let bytes = png(4, 4, [10, 200, 30, 255]);
    let data_uri = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    );
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("green.png");
    std::fs::write(&path, &bytes).unwrap();

    let items = vec![
        ImageItem::new("inline", data_uri),
        ImageItem::new("file", path.to_string_lossy()),
        ImageItem::new("url", format!("file://{}", path.display())),
        ImageItem::new("missing", dir.path().join("nope.png").to_string_lossy()),
        ImageItem::new("remote", "https://example.com/x.png"),
    ];
    let bitmaps = resolve(
        &items,
        Arc::new(LocalFetcher::new(1 << 20)),
        ResolverOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let mut ids: Vec<_> = bitmaps.keys().cloned().collect();
    ids.sort();
    assert_eq!(ids, ["file", "inline", "url"]);
    assert_eq!(bitmaps["inline"].get_pixel(0, 0), &Rgba([10, 200, 30, 255]));
}
