//! End-to-end tiling tests.
//!
//! Tests verify:
//! - Tile names, counts and edge sizes on disk
//! - Pixel content of written tiles
//! - Failure and cancellation behavior
//! - Background runs with progress events

use std::path::Path;
use std::sync::Mutex;

use wsi_tiler::error::TilingError;
use wsi_tiler::tile::{
    spawn_tiling, tile_slide_file, CancellationFlag, NoopObserver, ProgressEvent,
    ProgressObserver, RunStatus, TileRequest, TilingOptions,
};

use super::test_utils::{
    channel_distance, create_raw_tiff, create_svs, list_files, pattern_pixel, write_file,
};

/// Observer that cancels the run after a fixed number of tiles.
struct CancelAfter {
    limit: u64,
    flag: CancellationFlag,
    status: Mutex<Option<RunStatus>>,
}

impl ProgressObserver for CancelAfter {
    fn on_tile(&self, completed: u64, _total: u64, _request: &TileRequest, _path: &Path) {
        if completed >= self.limit {
            self.flag.cancel();
        }
    }

    fn on_finish(&self, status: &RunStatus) {
        *self.status.lock().unwrap() = Some(status.clone());
    }
}

fn load_png(path: &Path) -> image::RgbImage {
    image::open(path).unwrap().into_rgb8()
}

#[tokio::test]
async fn test_tiles_raw_slide() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "slide.tif", &create_raw_tiff(2500, 1800, 512));
    let output = dir.path().join("out").join("tiles");

    let summary = tile_slide_file(&input, &output, &TilingOptions::default(), &NoopObserver, None)
        .await
        .unwrap();
    assert_eq!((summary.columns, summary.rows), (3, 2));
    assert_eq!(summary.tiles_written, 6);
    assert_eq!(summary.level, 0);

    assert_eq!(
        list_files(&output),
        vec![
            "tile_00000_00000.png",
            "tile_00000_01024.png",
            "tile_01024_00000.png",
            "tile_01024_01024.png",
            "tile_02048_00000.png",
            "tile_02048_01024.png",
        ]
    );

    let corner = load_png(&output.join("tile_02048_01024.png"));
    assert_eq!(corner.dimensions(), (452, 776));
    assert_eq!(*corner.get_pixel(0, 0), pattern_pixel(2048, 1024));
    assert_eq!(*corner.get_pixel(451, 775), pattern_pixel(2499, 1799));

    let first = load_png(&output.join("tile_00000_00000.png"));
    assert_eq!(first.dimensions(), (1024, 1024));
    for &(x, y) in &[(0, 0), (511, 511), (512, 300), (1023, 1023)] {
        assert_eq!(*first.get_pixel(x, y), pattern_pixel(x, y));
    }

    assert_eq!(
        load_png(&output.join("tile_01024_00000.png")).dimensions(),
        (1024, 1024)
    );
    assert_eq!(
        load_png(&output.join("tile_00000_01024.png")).dimensions(),
        (1024, 776)
    );
}

#[tokio::test]
async fn test_single_tile_slide() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "small.tif", &create_raw_tiff(300, 200, 128));
    let output = dir.path().join("tiles");

    let options = TilingOptions::new(512, 90);
    tile_slide_file(&input, &output, &options, &NoopObserver, None)
        .await
        .unwrap();

    assert_eq!(list_files(&output), vec!["tile_00000_00000.png"]);
    let only = load_png(&output.join("tile_00000_00000.png"));
    assert_eq!(only.dimensions(), (300, 200));
    assert_eq!(*only.get_pixel(299, 199), pattern_pixel(299, 199));
}

#[tokio::test]
async fn test_missing_input_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("never");

    let failure = tile_slide_file(
        dir.path().join("missing.svs"),
        &output,
        &TilingOptions::default(),
        &NoopObserver,
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(failure.kind, TilingError::Open(_)));
    assert_eq!(failure.coordinate, None);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_invalid_options_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "slide.tif", &create_raw_tiff(64, 64, 64));
    let output = dir.path().join("tiles");

    for options in [TilingOptions::new(0, 100), TilingOptions::new(256, 0)] {
        let failure = tile_slide_file(&input, &output, &options, &NoopObserver, None)
            .await
            .unwrap_err();
        assert!(matches!(failure.kind, TilingError::InvalidArgument(_)));
    }
    assert!(!output.exists());
}

#[tokio::test]
async fn test_rerun_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "slide.tif", &create_raw_tiff(700, 500, 256));
    let output = dir.path().join("tiles");
    let options = TilingOptions::new(256, 100);

    tile_slide_file(&input, &output, &options, &NoopObserver, None)
        .await
        .unwrap();
    let first: Vec<Vec<u8>> = list_files(&output)
        .iter()
        .map(|name| std::fs::read(output.join(name)).unwrap())
        .collect();

    tile_slide_file(&input, &output, &options, &NoopObserver, None)
        .await
        .unwrap();
    let second: Vec<Vec<u8>> = list_files(&output)
        .iter()
        .map(|name| std::fs::read(output.join(name)).unwrap())
        .collect();

    assert_eq!(first.len(), 6);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_cancel_keeps_written_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "slide.tif", &create_raw_tiff(1024, 1024, 256));
    let output = dir.path().join("tiles");

    let flag = CancellationFlag::new();
    let observer = CancelAfter {
        limit: 2,
        flag: flag.clone(),
        status: Mutex::new(None),
    };

    let failure = tile_slide_file(
        &input,
        &output,
        &TilingOptions::new(256, 100),
        &observer,
        Some(&flag),
    )
    .await
    .unwrap_err();

    assert!(matches!(failure.kind, TilingError::Cancelled));
    assert_eq!(
        list_files(&output),
        vec!["tile_00000_00000.png", "tile_00256_00000.png"]
    );
    assert_eq!(*observer.status.lock().unwrap(), Some(RunStatus::Cancelled));
}

#[tokio::test]
async fn test_tiles_svs_slide() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "slide.svs", &create_svs(600, 400));
    let output = dir.path().join("tiles");

    let summary = tile_slide_file(
        &input,
        &output,
        &TilingOptions::new(256, 100),
        &NoopObserver,
        None,
    )
    .await
    .unwrap();
    assert_eq!(summary.tiles_written, 6);
    assert_eq!(list_files(&output).len(), 6);

    let tile = load_png(&output.join("tile_00256_00256.png"));
    assert_eq!(tile.dimensions(), (256, 144));
    let distance = channel_distance(*tile.get_pixel(40, 40), pattern_pixel(296, 296));
    assert!(distance <= 16, "pixel off by {}", distance);
}

#[tokio::test]
async fn test_spawned_run_streams_progress() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "slide.tif", &create_raw_tiff(512, 300, 256));
    let output = dir.path().join("tiles");

    let mut task = spawn_tiling(&input, &output, TilingOptions::new(256, 100), 4);

    let mut events = Vec::new();
    while let Some(event) = task.events.recv().await {
        events.push(event);
    }
    let summary = task.join().await.unwrap();
    assert_eq!(summary.tiles_written, 4);

    assert_eq!(events.first(), Some(&ProgressEvent::Started { total: 4 }));
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Finished(RunStatus::Completed { tiles: 4 }))
    );

    let completed: Vec<u64> = events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::Tile { completed, .. } => Some(*completed),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec![1, 2, 3, 4]);
}
