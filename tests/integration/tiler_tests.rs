//! Slide-level integration tests.
//!
//! Tests verify:
//! - Opening Aperio and Philips slides selects the right branches
//! - Tiles from every branch are standalone JPEGs
//! - Tiled pages are built once and kept in the page cache
//! - Concurrent first sparse requests synthesize a single blank tile
//! - Summaries describe the slide without reading frames

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use wsi_tiler::io::FileRangeReader;
use wsi_tiler::slide::SlideSummary;
use wsi_tiler::tile::BlankFill;
use wsi_tiler::{Branch, RangeReader, FormatError, Size, TileError, Tiler, Vendor, WhiteFill};

use super::test_utils::{
    create_aperio_slide, create_philips_slide, create_test_rgb_jpeg, decoded_dimensions,
    split_jpeg, ByteOrderType, PageBuilder, TiffBuilder, TrackingMockReader,
};

async fn open(data: Vec<u8>) -> Tiler<TrackingMockReader> {
    let reader = Arc::new(TrackingMockReader::new(data, "mock://slide"));
    Tiler::open(reader, Arc::new(WhiteFill::default()))
        .await
        .unwrap()
}

/// Fill that counts its calls and returns a fixed payload.
#[derive(Default)]
struct CountingFill {
    calls: AtomicUsize,
}

impl BlankFill for CountingFill {
    fn fill(&self, reference: &[u8]) -> Result<Bytes, TileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(20));
        Ok(Bytes::from(format!("blank:{}", reference.len())))
    }
}

// =============================================================================
// Aperio
// =============================================================================

#[tokio::test]
async fn test_open_aperio() {
    let tiler = open(create_aperio_slide()).await;

    assert_eq!(tiler.vendor(), Vendor::Aperio);
    assert_eq!(tiler.base_size(), Size::new(1024, 768));
    assert!((tiler.base_mpp().width - 0.499).abs() < 1e-9);
    assert!((tiler.base_pixel_spacing().height - 0.000499).abs() < 1e-12);

    let branches = tiler.branches();
    assert_eq!(branches.volume, 0);
    assert_eq!(branches.label, Some(2));
    assert_eq!(branches.overview, Some(3));

    // Nothing is built until it is asked for
    assert_eq!(tiler.cached_pages().await, 0);
}

#[tokio::test]
async fn test_aperio_levels() {
    let tiler = open(create_aperio_slide()).await;
    let levels = tiler.levels().await.unwrap();

    assert_eq!(levels.len(), 2);
    assert_eq!(levels[0].pyramid_index(), 0);
    assert_eq!(levels[0].tiled_size(), Size::new(4, 3));
    assert_eq!(levels[1].pyramid_index(), 1);
    assert_eq!(levels[1].image_size(), Size::new(512, 384));
    assert_eq!(levels[1].tiled_size(), Size::new(2, 2));
    assert!((levels[1].mpp().width - 0.998).abs() < 1e-9);

    let tile = tiler.get_tile(0, 1, 0, 1, 1).await.unwrap();
    assert_eq!(decoded_dimensions(&tile), (256, 256));
}

#[tokio::test]
async fn test_aperio_associated_images() {
    let tiler = open(create_aperio_slide()).await;

    let label = tiler.get_label(0, 0).await.unwrap();
    assert_eq!(label.pyramid_index(), 0);
    assert_eq!(label.tiled_size(), Size::new(1, 1));
    let tile = label.get_tile(0, 0).await.unwrap();
    assert_eq!(decoded_dimensions(&tile), (200, 100));

    // Spacing scaled by width relative to the base
    let expected = 0.000499 * 1024.0 / 200.0;
    assert!((label.pixel_spacing().width - expected).abs() < 1e-12);

    let overview = tiler.get_overview(0, 0).await.unwrap();
    let tile = overview.get_tile(0, 0).await.unwrap();
    assert_eq!(decoded_dimensions(&tile), (400, 200));

    assert_eq!(tiler.labels().await.unwrap().len(), 1);
    assert_eq!(tiler.overviews().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_aperio_sparse_tile() {
    let tiler = open(create_aperio_slide()).await;
    let level = tiler.get_level(0, 0).await.unwrap();

    // Frame 5 is (1, 1) on a 4-column grid
    let blank = level.get_tile(1, 1).await.unwrap();
    assert_eq!(decoded_dimensions(&blank), (256, 256));
    assert_eq!(blank, level.blank_tile().await.unwrap());

    let present = level.get_tile(0, 1).await.unwrap();
    assert_ne!(present, blank);
}

// =============================================================================
// Philips
// =============================================================================

#[tokio::test]
async fn test_open_philips() {
    let tiler = open(create_philips_slide(ByteOrderType::LittleEndian, false)).await;

    assert_eq!(tiler.vendor(), Vendor::Philips);
    assert_eq!(tiler.base_size(), Size::new(1024, 1024));
    assert!((tiler.base_mpp().width - 0.5).abs() < 1e-9);
    assert!((tiler.base_mpp().height - 0.25).abs() < 1e-9);

    let levels = tiler.levels().await.unwrap();
    let indices: Vec<_> = levels.iter().map(|l| l.pyramid_index()).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    let overviews = tiler.overviews().await.unwrap();
    assert_eq!(overviews.len(), 1);
    let tile = overviews[0].get_tile(0, 0).await.unwrap();
    assert_eq!(decoded_dimensions(&tile), (256, 128));

    let label = tiler.get_label(0, 0).await.unwrap();
    let tile = label.get_tile(0, 0).await.unwrap();
    assert_eq!(decoded_dimensions(&tile), (128, 128));
}

#[tokio::test]
async fn test_philips_associated_pixel_spacing() {
    let tiler = open(create_philips_slide(ByteOrderType::LittleEndian, false)).await;

    // Read from the label's own description, in micrometres
    let label = tiler.get_label(0, 0).await.unwrap();
    assert!((label.pixel_spacing().width - 0.05).abs() < 1e-12);
    assert!((label.pixel_spacing().height - 0.04).abs() < 1e-12);

    // The macro records none, so it falls back to scaling the base
    let overview = tiler.get_overview(0, 0).await.unwrap();
    assert!((overview.pixel_spacing().width - 0.0005 * 1024.0 / 256.0).abs() < 1e-12);
    assert!((overview.pixel_spacing().height - 0.00025 * 1024.0 / 256.0).abs() < 1e-12);
}

#[tokio::test]
async fn test_philips_big_endian_bigtiff() {
    let tiler = open(create_philips_slide(ByteOrderType::BigEndian, true)).await;

    let tile = tiler.get_tile(0, 1, 0, 1, 1).await.unwrap();
    assert_eq!(decoded_dimensions(&tile), (256, 256));

    let blank = tiler.get_tile(0, 0, 0, 3, 1).await.unwrap();
    assert_eq!(decoded_dimensions(&blank), (256, 256));
}

// =============================================================================
// Page Access Errors
// =============================================================================

#[tokio::test]
async fn test_page_not_found() {
    let tiler = open(create_aperio_slide()).await;

    let err = tiler.get_level(5, 0).await.unwrap_err();
    assert!(matches!(
        err,
        TileError::PageNotFound {
            series: 0,
            level: 5,
            page: 0
        }
    ));

    assert!(matches!(
        tiler.get_page(42, 0, 0).await,
        Err(TileError::PageNotFound { series: 42, .. })
    ));
    assert!(matches!(
        tiler.get_level(0, 1).await,
        Err(TileError::PageNotFound { .. })
    ));
}

#[tokio::test]
async fn test_tile_out_of_bounds() {
    let tiler = open(create_aperio_slide()).await;
    let err = tiler.get_tile(0, 0, 0, 4, 0).await.unwrap_err();
    assert!(matches!(
        err,
        TileError::OutOfBounds {
            x: 4,
            y: 0,
            columns: 4,
            rows: 3
        }
    ));
}

#[tokio::test]
async fn test_missing_branch() {
    let (tables, frame) = split_jpeg(&create_test_rgb_jpeg(256, 256, 80));
    let data = TiffBuilder::new()
        .add_page(
            PageBuilder::tiled(512, 512, 256, 256)
                .with_uniform_frames(frame)
                .with_jpeg_tables(tables)
                .with_description("Aperio Image Library v12.0.15|MPP = 0.25"),
        )
        .build();
    let tiler = open(data).await;

    assert!(matches!(
        tiler.get_label(0, 0).await,
        Err(TileError::MissingBranch(Branch::Label))
    ));
    assert!(tiler.labels().await.unwrap().is_empty());
    assert!(tiler.overviews().await.unwrap().is_empty());
    assert_eq!(tiler.levels().await.unwrap().len(), 1);
}

// =============================================================================
// Open Errors
// =============================================================================

#[tokio::test]
async fn test_open_unsupported_vendor() {
    let (tables, frame) = split_jpeg(&create_test_rgb_jpeg(256, 256, 80));
    let data = TiffBuilder::new()
        .add_page(
            PageBuilder::tiled(256, 256, 256, 256)
                .with_uniform_frames(frame)
                .with_jpeg_tables(tables)
                .with_description("Generic pyramidal TIFF"),
        )
        .build();
    let reader = Arc::new(TrackingMockReader::new(data, "mock://generic.tif"));

    let result = Tiler::open(reader, Arc::new(WhiteFill::default())).await;
    assert!(matches!(result, Err(FormatError::UnsupportedFormat { .. })));
}

#[tokio::test]
async fn test_open_without_pixel_spacing() {
    let (tables, frame) = split_jpeg(&create_test_rgb_jpeg(256, 256, 80));
    let data = TiffBuilder::new()
        .add_page(
            PageBuilder::tiled(256, 256, 256, 256)
                .with_uniform_frames(frame)
                .with_jpeg_tables(tables)
                .with_description("Aperio Image Library v12.0.15|AppMag = 20"),
        )
        .build();
    let reader = Arc::new(TrackingMockReader::new(data, "mock://no-mpp.svs"));

    let result = Tiler::open(reader, Arc::new(WhiteFill::default())).await;
    assert!(matches!(
        result,
        Err(FormatError::MissingPixelSpacing { .. })
    ));
}

#[tokio::test]
async fn test_open_not_a_tiff() {
    let reader = Arc::new(TrackingMockReader::new(vec![0u8; 64], "mock://zeros"));
    let result = Tiler::open(reader, Arc::new(WhiteFill::default())).await;
    assert!(matches!(result, Err(FormatError::Tiff(_))));
}

// =============================================================================
// Page Cache
// =============================================================================

#[tokio::test]
async fn test_pages_are_cached() {
    let tiler = open(create_aperio_slide()).await;

    let first = tiler.get_level(0, 0).await.unwrap();
    let second = tiler.get_level(0, 0).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(tiler.cached_pages().await, 1);

    tiler.get_level(1, 0).await.unwrap();
    assert_eq!(tiler.cached_pages().await, 2);
}

#[tokio::test]
async fn test_page_cache_eviction() {
    let reader = Arc::new(TrackingMockReader::new(create_aperio_slide(), "mock://slide"));
    let tiler = Tiler::with_capacity(reader, Arc::new(WhiteFill::default()), 1)
        .await
        .unwrap();

    let first = tiler.get_level(0, 0).await.unwrap();
    tiler.get_level(1, 0).await.unwrap();
    assert_eq!(tiler.cached_pages().await, 1);

    // Rebuilt after eviction, so a new handle
    let again = tiler.get_level(0, 0).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &again));
}

#[tokio::test]
async fn test_zero_capacity_keeps_one_page() {
    let reader = Arc::new(TrackingMockReader::new(create_aperio_slide(), "mock://slide"));
    let tiler = Tiler::with_capacity(reader, Arc::new(WhiteFill::default()), 0)
        .await
        .unwrap();

    tiler.get_level(0, 0).await.unwrap();
    assert_eq!(tiler.cached_pages().await, 1);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sparse_requests_fill_once() {
    let reader = Arc::new(TrackingMockReader::new(
        create_philips_slide(ByteOrderType::LittleEndian, false),
        "mock://slide",
    ));
    let fill = Arc::new(CountingFill::default());
    let tiler = Arc::new(Tiler::open(reader, fill.clone()).await.unwrap());

    let mut handles = Vec::new();
    for i in 0..16 {
        let tiler = tiler.clone();
        // Alternate between the two sparse frames of the base
        let (x, y) = if i % 2 == 0 { (0, 0) } else { (3, 1) };
        handles.push(tokio::spawn(async move {
            tiler.get_tile(0, 0, 0, x, y).await
        }));
    }

    let mut tiles = Vec::new();
    for handle in handles {
        tiles.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(fill.calls.load(Ordering::SeqCst), 1);
    assert!(tiles.iter().all(|tile| tile == &tiles[0]));
    assert!(tiles[0].starts_with(b"blank:"));
}

// =============================================================================
// Local Files
// =============================================================================

#[tokio::test]
async fn test_file_reader_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slide.svs");
    std::fs::write(&path, create_aperio_slide()).unwrap();

    let reader = Arc::new(FileRangeReader::open(&path).await.unwrap());
    let tiler = Tiler::open(reader, Arc::new(WhiteFill::default()))
        .await
        .unwrap();

    let tile = tiler.get_tile(0, 0, 0, 3, 2).await.unwrap();
    assert_eq!(decoded_dimensions(&tile), (256, 256));
    assert!(tiler.reader().identifier().ends_with("slide.svs"));
}

// =============================================================================
// Summary
// =============================================================================

#[tokio::test]
async fn test_summary() {
    let tiler = open(create_aperio_slide()).await;
    let summary = SlideSummary::from_tiler(&tiler);

    assert_eq!(summary.vendor, "Aperio SVS");
    assert_eq!(summary.identifier, "mock://slide");
    assert_eq!(summary.series.len(), 4);

    let baseline = &summary.series[0];
    assert_eq!(baseline.branch, Some(Branch::Volume));
    assert_eq!(baseline.pages.len(), 2);
    assert_eq!(baseline.pages[0].sparse_frames, 1);
    assert_eq!(baseline.pages[1].pyramid_index, Some(1));

    let thumbnail = &summary.series[1];
    assert_eq!(thumbnail.name, "Thumbnail");
    assert_eq!(thumbnail.branch, None);

    assert_eq!(summary.series[2].branch, Some(Branch::Label));
    assert_eq!(summary.series[3].branch, Some(Branch::Overview));

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["vendor"], "Aperio SVS");
    assert_eq!(json["branches"]["label"], 2);
    assert_eq!(json["series"][0]["branch"], "volume");
    assert_eq!(json["series"][0]["pages"][0]["tiled_size"]["width"], 4);

    let text = summary.to_string();
    assert!(text.contains("Aperio SVS"));
    assert!(text.contains("[label]"));

    // Summaries never touch the page cache
    assert_eq!(tiler.cached_pages().await, 0);
}
