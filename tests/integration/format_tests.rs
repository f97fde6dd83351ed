//! Format-specific integration tests.
//!
//! Tests verify:
//! - TIFF parser handles little-endian and big-endian files
//! - BigTIFF files are parsed correctly
//! - Pyramid levels are identified and ordered
//! - SVS JPEGTables handling produces decodable tiles

use wsi_tiler::format::tiff::{Compression, TiffPyramid, TileData};
use wsi_tiler::format::{
    is_abbreviated_stream, is_complete_stream, is_tiff_header, prepare_tile_jpeg,
};
use wsi_tiler::io::BytesReader;

use super::test_utils::{
    create_svs, encode_jpeg, pattern_pixel, split_jpeg_tables, ByteOrderType, LevelSpec,
    TiffBuilder, TileCodec,
};

fn three_level_tiff(byte_order: ByteOrderType, bigtiff: bool) -> Vec<u8> {
    TiffBuilder::new()
        .with_byte_order(byte_order)
        .with_bigtiff(bigtiff)
        .add_level(LevelSpec::new(1024, 768, 256, TileCodec::Raw))
        .add_level(LevelSpec::new(256, 192, 256, TileCodec::Raw))
        .add_level(LevelSpec::new(512, 384, 256, TileCodec::Raw))
        .build()
}

async fn parse(data: Vec<u8>) -> TiffPyramid {
    let reader = BytesReader::new(data, "mem://test.tif");
    TiffPyramid::parse(&reader).await.unwrap()
}

// =============================================================================
// TIFF Byte Order Tests
// =============================================================================

#[tokio::test]
async fn test_little_endian_tiff() {
    let data = three_level_tiff(ByteOrderType::LittleEndian, false);
    assert_eq!(&data[..2], b"II");
    assert!(is_tiff_header(&data));

    let pyramid = parse(data).await;
    assert!(!pyramid.header.is_bigtiff);
    assert_eq!(pyramid.levels.len(), 3);
    assert_eq!(pyramid.dimensions(), Some((1024, 768)));
}

#[tokio::test]
async fn test_big_endian_tiff() {
    let data = three_level_tiff(ByteOrderType::BigEndian, false);
    assert_eq!(&data[..2], b"MM");
    assert!(is_tiff_header(&data));

    let pyramid = parse(data).await;
    assert_eq!(pyramid.levels.len(), 3);
    assert_eq!(pyramid.levels[0].tile_width, 256);
    assert_eq!(pyramid.levels[0].compression, Compression::None);
}

#[tokio::test]
async fn test_bigtiff() {
    for byte_order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        let data = three_level_tiff(byte_order, true);
        assert!(is_tiff_header(&data));

        let pyramid = parse(data).await;
        assert!(pyramid.header.is_bigtiff);
        assert_eq!(pyramid.levels.len(), 3);
    }
}

// =============================================================================
// Pyramid Tests
// =============================================================================

#[tokio::test]
async fn test_levels_sorted_by_area() {
    let pyramid = parse(three_level_tiff(ByteOrderType::LittleEndian, false)).await;

    let dims: Vec<(u32, u32)> = pyramid.levels.iter().map(|l| (l.width, l.height)).collect();
    assert_eq!(dims, vec![(1024, 768), (512, 384), (256, 192)]);

    let downsamples: Vec<f64> = pyramid.levels.iter().map(|l| l.downsample).collect();
    assert_eq!(downsamples, vec![1.0, 2.0, 4.0]);

    // The file order is kept in ifd_index
    assert_eq!(pyramid.levels[1].ifd_index, 2);
}

#[tokio::test]
async fn test_tile_tables_loaded() {
    let data = three_level_tiff(ByteOrderType::BigEndian, false);
    let reader = BytesReader::new(data, "mem://tables.tif");
    let pyramid = TiffPyramid::parse(&reader).await.unwrap();

    let level = &pyramid.levels[0];
    let tiles = TileData::load(&reader, level, &pyramid.header).await.unwrap();
    assert_eq!(tiles.offsets.len(), 12);
    assert!(tiles.jpeg_tables.is_none());

    let (_, byte_count) = tiles.get_tile_location(11).unwrap();
    assert_eq!(byte_count, 256 * 256 * 3);
    assert!(tiles.get_tile_location(12).is_none());
}

// =============================================================================
// SVS / JPEGTables Tests
// =============================================================================

#[tokio::test]
async fn test_svs_tables_are_loaded() {
    let data = create_svs(600, 400);
    let reader = BytesReader::new(data, "mem://slide.svs");
    let pyramid = TiffPyramid::parse(&reader).await.unwrap();

    assert_eq!(pyramid.levels.len(), 2);
    assert_eq!(pyramid.levels[0].compression, Compression::Jpeg);

    let tiles = TileData::load(&reader, &pyramid.levels[0], &pyramid.header)
        .await
        .unwrap();
    let tables = tiles.jpeg_tables.expect("JPEGTables");
    assert!(is_complete_stream(&tables));
}

#[test]
fn test_abbreviated_tile_round_trip() {
    let img = image::RgbImage::from_fn(64, 64, pattern_pixel);
    let (tables, stream) = split_jpeg_tables(&encode_jpeg(&img, 95));
    assert!(is_abbreviated_stream(&stream));

    let merged = prepare_tile_jpeg(Some(&tables), &stream, false);
    let decoded = image::load_from_memory_with_format(&merged, image::ImageFormat::Jpeg)
        .unwrap()
        .into_rgb8();
    assert_eq!(decoded.dimensions(), (64, 64));
}
