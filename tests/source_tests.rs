use std::fs;

use mind_movie::config::PhotoSourceConfig;
use mind_movie::error::Error;
use mind_movie::tasks::source::{DirectorySource, ManifestSource, PhotoSource, from_config};

#[test]
fn manifest_is_ordered_past_present_future() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("photos.json");
    fs::write(
        &manifest,
        r#"[
            {"id": "f1", "url": "uploads/f1.jpg", "category": "future", "name": "f1.jpg"},
            {"id": "p1", "url": "uploads/p1.jpg", "category": "past", "size": 1024},
            {"id": "n1", "url": "data:image/png;base64,AAAA", "category": "present"},
            {"id": "p2", "url": "/abs/p2.jpg", "category": "past", "uploadedAt": "2024-01-01T00:00:00Z"}
        ]"#,
    )
    .unwrap();

    let items = ManifestSource::new(&manifest).load().unwrap();
    let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, ["p1", "p2", "n1", "f1"]);

    assert_eq!(
        items[0].source_ref,
        dir.path().join("uploads/p1.jpg").to_string_lossy()
    );
    assert_eq!(items[1].source_ref, "/abs/p2.jpg");
    assert_eq!(items[2].source_ref, "data:image/png;base64,AAAA");
}

#[test]
fn missing_manifest_is_an_empty_library() {
    let dir = tempfile::tempdir().unwrap();
    let items = ManifestSource::new(dir.path().join("absent.json"))
        .load()
        .unwrap();
    assert!(items.is_empty());
}

#[test]
fn malformed_manifest_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("photos.json");
    fs::write(&manifest, "{ not json").unwrap();
    assert!(matches!(
        ManifestSource::new(&manifest).load(),
        Err(Error::Json(_))
    ));
}

#[test]
fn directory_walk_is_sorted_and_filters_non_images() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("trip")).unwrap();
    fs::write(dir.path().join("b.png"), b"x").unwrap();
    fs::write(dir.path().join("a.JPG"), b"x").unwrap();
    fs::write(dir.path().join("notes.txt"), b"x").unwrap();
    fs::write(dir.path().join("trip/c.webp"), b"x").unwrap();

    let items = DirectorySource::new(dir.path()).load().unwrap();
    let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, ["a.JPG", "b.png", "trip/c.webp"]);
    assert!(items.iter().all(|i| std::path::Path::new(&i.source_ref).is_absolute()));
}

#[test]
fn missing_directory_is_a_source_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        DirectorySource::new(dir.path().join("gone")).load(),
        Err(Error::Source(_))
    ));
}

#[test]
fn config_selects_the_source_kind() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = PhotoSourceConfig {
        directory: Some(dir.path().to_path_buf()),
        ..PhotoSourceConfig::default()
    };
    let source = from_config(&cfg).unwrap();
    assert!(source.load().unwrap().is_empty());
    assert!(source.watch_target().is_some());

    assert!(from_config(&PhotoSourceConfig::default()).is_err());
}
