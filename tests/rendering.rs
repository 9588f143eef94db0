//! 软件后端的像素结果：清屏颜色、深度测试、纹理采样

use dx_practice::core::config::{GraphicsConfig, LIGHT_STEEL_BLUE};
use dx_practice::core::Color;
use dx_practice::geometry::{MeshData, TextureData, Transform};
use dx_practice::gfx::SoftwareBackend;
use dx_practice::renderer::{DrawItem, Engine, WindowInfo};

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn engine() -> Engine<SoftwareBackend> {
    let mut engine = Engine::new(SoftwareBackend::new(), &GraphicsConfig::default());
    engine.init(WindowInfo::headless(64, 64)).unwrap();
    engine
}

/// z = 0.2 的红色四边形与 z = 0.3 的蓝色四边形，完全重叠
fn overlapping(engine: &mut Engine<SoftwareBackend>) -> (DrawItem, DrawItem) {
    let near_mesh = engine.upload_mesh(&MeshData::quad(0.5, 0.2, [1.0; 4])).unwrap();
    let far_mesh = engine.upload_mesh(&MeshData::quad(0.5, 0.3, [1.0; 4])).unwrap();
    let red = engine.upload_texture(&TextureData::solid(4, 4, RED)).unwrap();
    let blue = engine.upload_texture(&TextureData::solid(4, 4, BLUE)).unwrap();

    (
        DrawItem::new(near_mesh, red, Transform::default()),
        DrawItem::new(far_mesh, blue, Transform::default()),
    )
}

fn center_pixel(engine: &Engine<SoftwareBackend>) -> [u8; 4] {
    engine.backend().presented_frame().unwrap().get_pixel(32, 32).0
}

#[test]
fn nearer_mesh_wins_when_drawn_first() {
    let mut engine = engine();
    let (near, far) = overlapping(&mut engine);

    engine.draw(&[near, far]).unwrap();
    assert_eq!(center_pixel(&engine), RED);
}

#[test]
fn nearer_mesh_wins_when_drawn_last() {
    let mut engine = engine();
    let (near, far) = overlapping(&mut engine);

    engine.draw(&[far, near]).unwrap();
    assert_eq!(center_pixel(&engine), RED);
}

#[test]
fn depth_buffer_holds_nearest_depth() {
    let mut engine = engine();
    let (near, far) = overlapping(&mut engine);

    engine.draw(&[far, near]).unwrap();
    let depth = engine.backend().depth_buffer().unwrap();
    assert!((depth.get(32, 32) - 0.2).abs() < 1e-5);
    assert_eq!(depth.get(0, 0), 1.0);
}

#[test]
fn uncovered_pixels_show_clear_color() {
    let mut engine = engine();
    let (near, _) = overlapping(&mut engine);

    engine.draw(&[near]).unwrap();
    let expected = Color::from(LIGHT_STEEL_BLUE).to_rgba8();
    assert_eq!(engine.backend().presented_frame().unwrap().get_pixel(1, 1).0, expected);
}

#[test]
fn transform_offsets_the_mesh() {
    let mut engine = engine();
    let (near, _) = overlapping(&mut engine);

    // 右移 0.5：NDC x 范围 [0, 1]，窗口左半边只剩清屏色
    let shifted = DrawItem { transform: Transform::new(0.5, 0.0, 0.0), ..near };
    engine.draw(&[shifted]).unwrap();

    let frame = engine.backend().presented_frame().unwrap();
    assert_eq!(frame.get_pixel(48, 32).0, RED);
    assert_ne!(frame.get_pixel(16, 32).0, RED);
}

#[test]
fn presented_frame_can_be_saved() {
    let mut engine = engine();
    let (near, far) = overlapping(&mut engine);
    engine.draw(&[near, far]).unwrap();

    let path = std::env::temp_dir().join(format!("dx_practice_frame_{}.png", std::process::id()));
    engine.backend().save_presented_frame(&path).unwrap();

    let saved = image::open(&path).unwrap().to_rgba8();
    assert_eq!(saved.dimensions(), (64, 64));
    assert_eq!(saved.get_pixel(32, 32).0, RED);
    let _ = std::fs::remove_file(&path);
}
