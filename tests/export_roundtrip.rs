use image::{Rgba, RgbaImage};
use rasterpad::config::EngineConfig;
use rasterpad::io::{load_image, load_rpx, save_image, save_rpx};
use rasterpad::CanvasError;

fn sample() -> RgbaImage {
    RgbaImage::from_fn(5, 3, |x, y| Rgba([x as u8 * 40, y as u8 * 80, 7, (x * 50) as u8]))
}

#[test]
fn rpx_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.rpx");
    let img = sample();
    save_rpx(&img, &path).unwrap();
    assert_eq!(load_rpx(&path).unwrap(), img);
    assert_eq!(load_image(&path).unwrap(), img);
}

#[test]
fn png_file_round_trip_keeps_alpha() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.png");
    let img = sample();
    save_image(&img, &path).unwrap();
    assert_eq!(load_image(&path).unwrap(), img);
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.xyz");
    assert!(matches!(save_image(&sample(), &path), Err(CanvasError::InvalidFormat(_))));
}

#[test]
fn corrupt_rpx_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.rpx");
    std::fs::write(&path, b"definitely not a raw pixel file").unwrap();
    assert!(matches!(load_rpx(&path), Err(CanvasError::InvalidFormat(_))));
}

#[test]
fn config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("rasterpad.cfg");
    assert_eq!(EngineConfig::load_from(&path).unwrap(), EngineConfig::default());

    let cfg = EngineConfig {
        undo_levels: 7,
        tile_size: 16,
        smooth_downscale: false,
        ..EngineConfig::default()
    };
    cfg.save_to(&path).unwrap();
    assert_eq!(EngineConfig::load_from(&path).unwrap(), cfg);
}
