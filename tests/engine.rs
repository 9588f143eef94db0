//! Engine 的初始化顺序、帧序列与环形缓冲区行为（软件后端）

use dx_practice::core::config::GraphicsConfig;
use dx_practice::core::error::{DxPracticeError, ErrorSeverity, GraphicsError};
use dx_practice::core::InputSystem;
use dx_practice::geometry::{MeshData, TextureData, Transform};
use dx_practice::gfx::software::BarrierRecord;
use dx_practice::gfx::SoftwareBackend;
use dx_practice::renderer::{
    DrawItem, Engine, InitStage, RenderBackend, ResourceState, WindowInfo, SWAP_CHAIN_BUFFER_COUNT,
};
use winit::event::ElementState;
use winit::keyboard::KeyCode;

fn engine(width: u32, height: u32) -> Engine<SoftwareBackend> {
    let mut engine = Engine::new(SoftwareBackend::new(), &GraphicsConfig::default());
    engine.init(WindowInfo::headless(width, height)).unwrap();
    engine
}

fn scene(engine: &mut Engine<SoftwareBackend>, count: usize) -> Vec<DrawItem> {
    let mesh = engine.upload_mesh(&MeshData::default_quad()).unwrap();
    let texture = engine.upload_texture(&TextureData::checkerboard(8, 2)).unwrap();
    (0..count)
        .map(|i| DrawItem::new(mesh, texture, Transform::new(i as f32 * 0.01, 0.0, 0.0)))
        .collect()
}

#[test]
fn init_runs_every_stage() {
    let engine = engine(600, 600);
    assert!(engine.is_initialized());
    for stage in InitStage::ORDER {
        assert!(engine.backend().is_stage_complete(stage), "{} not created", stage);
    }
    assert_eq!(engine.window().width, 600);
}

#[test]
fn init_rejects_zero_sized_window() {
    let mut engine = Engine::new(SoftwareBackend::new(), &GraphicsConfig::default());
    assert!(engine.init(WindowInfo::headless(0, 600)).is_err());
    assert!(!engine.is_initialized());
}

#[test]
fn stage_out_of_order_is_missing_dependency() {
    let mut backend = SoftwareBackend::new();
    let window = WindowInfo::headless(64, 64);

    backend.run_init_stage(InitStage::Device, &window).unwrap();
    let err = backend.run_init_stage(InitStage::SwapChain, &window).unwrap_err();
    assert!(matches!(
        err,
        DxPracticeError::Graphics(GraphicsError::MissingDependency { requires: "command queue", .. })
    ));
    assert!(err.is_fatal());
    assert!(!backend.is_stage_complete(InitStage::SwapChain));
}

#[test]
fn draw_before_init_fails() {
    let mut engine = Engine::new(SoftwareBackend::new(), &GraphicsConfig::default());
    assert!(engine.draw(&[]).is_err());
}

#[test]
fn back_buffer_index_alternates() {
    let mut engine = engine(64, 64);
    let items = scene(&mut engine, 1);

    for n in 0..6u64 {
        assert_eq!(engine.frame_state().back_buffer_index, (n % 2) as usize);
        let stats = engine.draw(&items).unwrap();
        assert_eq!(stats.back_buffer, (n % 2) as usize);
        assert_eq!(stats.frame_number, n + 1);
        assert_eq!(
            engine.frame_state().back_buffer_index,
            ((n + 1) % SWAP_CHAIN_BUFFER_COUNT as u64) as usize
        );
    }
    assert_eq!(engine.backend().present_count(), 6);
}

#[test]
fn first_frame_command_sequence() {
    let mut engine = engine(600, 600);
    let items = scene(&mut engine, 1);
    engine.backend_mut().clear_barrier_log();

    let stats = engine.draw(&items).unwrap();
    assert_eq!(stats.back_buffer, 0);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(engine.frame_state().back_buffer_index, 1);

    let commands = engine.commands();
    assert_eq!(commands.barrier_count(ResourceState::Present, ResourceState::RenderTarget), 1);
    assert_eq!(commands.barrier_count(ResourceState::RenderTarget, ResourceState::Present), 1);
    assert_eq!(commands.draw_count(), 1);

    assert_eq!(
        engine.backend().barrier_log(),
        &[
            BarrierRecord {
                back_buffer: 0,
                before: ResourceState::Present,
                after: ResourceState::RenderTarget,
            },
            BarrierRecord {
                back_buffer: 0,
                before: ResourceState::RenderTarget,
                after: ResourceState::Present,
            },
        ]
    );
    assert_eq!(engine.backend().back_buffer_state(0), Some(ResourceState::Present));
}

#[test]
fn one_draw_per_item() {
    let mut engine = engine(64, 64);
    let items = scene(&mut engine, 2);

    let stats = engine.draw(&items).unwrap();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(engine.backend().draw_calls(), 2);
}

#[test]
fn cursors_reset_each_frame() {
    let mut engine = engine(64, 64);
    let items = scene(&mut engine, 3);

    engine.draw(&items).unwrap();
    let state = engine.frame_state();
    assert_eq!(state.constant_buffer_cursor, 3);
    assert_eq!(state.descriptor_table_cursor, 3);

    engine.draw(&items[..1]).unwrap();
    let state = engine.frame_state();
    assert_eq!(state.constant_buffer_cursor, 1);
    assert_eq!(state.descriptor_table_cursor, 1);
}

#[test]
fn transforms_read_back_from_their_slots() {
    let mut engine = engine(64, 64);
    let items = scene(&mut engine, 4);

    engine.draw(&items).unwrap();
    for (slot, item) in items.iter().enumerate() {
        assert_eq!(engine.read_constant(slot).unwrap(), item.transform);
    }
}

#[test]
fn overrun_is_rejected_and_recoverable() {
    let mut engine = engine(16, 16);
    let items = scene(&mut engine, 257);

    let presents = engine.backend().present_count();
    let err = engine.draw(&items).unwrap_err();
    assert!(matches!(
        err,
        DxPracticeError::Graphics(GraphicsError::RingBufferOverrun { requested: 257, capacity: 256 })
    ));
    assert_eq!(err.severity(), ErrorSeverity::Recoverable);
    assert_eq!(engine.backend().present_count(), presents);
    assert_eq!(engine.frame_state().back_buffer_index, 0);

    // 下一帧照常进行
    let stats = engine.draw(&items[..256]).unwrap();
    assert_eq!(stats.draw_calls, 256);
    assert_eq!(engine.frame_state().constant_buffer_cursor, 256);
}

#[test]
fn unknown_handles_are_rejected() {
    let mut engine = engine(16, 16);
    let items = scene(&mut engine, 1);

    let mut other = Engine::new(SoftwareBackend::new(), &GraphicsConfig::default());
    other.init(WindowInfo::headless(16, 16)).unwrap();
    other.upload_mesh(&MeshData::default_quad()).unwrap();
    let second_mesh = other.upload_mesh(&MeshData::default_quad()).unwrap();

    let bad = DrawItem::new(second_mesh, items[0].texture, Transform::default());
    assert!(engine.draw(&[bad]).is_err());
    assert!(engine.draw(&items).is_ok());
}

#[test]
fn invalid_textures_are_rejected() {
    let mut engine = engine(16, 16);

    let empty = TextureData::checkerboard(0, 8);
    assert!(matches!(
        engine.upload_texture(&empty),
        Err(DxPracticeError::TextureLoading(_))
    ));

    let short = TextureData {
        width: 2,
        height: 2,
        pixels: vec![0; 15],
    };
    let err = engine.upload_texture(&short).unwrap_err();
    assert!(matches!(err, DxPracticeError::TextureLoading(_)));
    assert!(err.is_fatal());

    // 被拒绝的纹理不影响后续绘制
    let items = scene(&mut engine, 1);
    assert_eq!(engine.draw(&items).unwrap().draw_calls, 1);
}

#[test]
fn fence_advances_once_per_frame() {
    let mut engine = engine(32, 32);
    let items = scene(&mut engine, 1);

    let mut previous = engine.draw(&items).unwrap().fence_value.value();
    for _ in 0..4 {
        let value = engine.draw(&items).unwrap().fence_value.value();
        assert_eq!(value, previous + 1);
        previous = value;
    }
    assert_eq!(engine.backend().fence_value().value(), previous);
}

#[test]
fn device_removal_is_fatal() {
    let mut engine = engine(32, 32);
    let items = scene(&mut engine, 1);
    engine.draw(&items).unwrap();

    engine.backend_mut().simulate_device_removed("driver reset");
    let err = engine.draw(&items).unwrap_err();
    assert!(matches!(err, DxPracticeError::Graphics(GraphicsError::DeviceRemoved(_))));
    assert!(err.is_fatal());
}

#[test]
fn update_moves_controlled_item() {
    let mut engine = engine(32, 32);
    let mut items = scene(&mut engine, 2);
    let base = Transform::new(0.25, 0.0, 0.0);
    engine.set_controlled_item(0, base);

    let mut input = InputSystem::new();
    input.on_keyboard_input(KeyCode::KeyW, ElementState::Pressed);

    // 第一拍是 Press，不移动
    engine.update(&mut input, 0.5, &mut items);
    assert_eq!(items[0].transform, base);

    engine.update(&mut input, 0.5, &mut items);
    let moved = items[0].transform.offset;
    assert!((moved[0] - 0.25).abs() < 1e-6);
    assert!((moved[2] - 0.5 * input.move_speed()).abs() < 1e-5);
    assert_eq!(items[1].transform, Transform::new(0.01, 0.0, 0.0));
    assert!((engine.player_position().z - moved[2]).abs() < 1e-6);

    engine.draw(&items).unwrap();
    assert_eq!(engine.read_constant(0).unwrap(), items[0].transform);
}
