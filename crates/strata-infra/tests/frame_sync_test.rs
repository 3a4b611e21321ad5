//! Frame synchronization through the null device: fences, deferred
//! deletion, ephemeral buffers and shutdown.

use strata_core::renderer::api::*;
use strata_core::renderer::shader::{MemoryShaderSource, PassthroughCompiler, ShaderLibrary};
use strata_core::renderer::{GraphicsDevice, ResourceError};
use strata_core::sync::ResourceKind;
use strata_infra::graphics::null::NullDevice;

/// Helper: a null device with `frames` slots and a ring of `ring` bytes.
fn device(frames: usize, ring: u64) -> NullDevice {
    let settings = DeviceSettings {
        swapchain: SwapchainSettings {
            frames_in_flight: frames,
            ..Default::default()
        },
        ephemeral_ring_buffer_size: ring,
        ..Default::default()
    };
    let shaders = ShaderLibrary::new(MemoryShaderSource::new(), PassthroughCompiler);
    NullDevice::new(settings, shaders).expect("null device")
}

fn empty_frame(device: &mut NullDevice) {
    device.begin_frame().unwrap();
    device.present_frame(None).unwrap();
}

fn vertex_buffer(device: &mut NullDevice) -> BufferHandle {
    device
        .create_buffer(&BufferDescriptor::new(64, BufferUsage::VERTEX), None)
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_every_presented_frame_is_submitted() {
    let mut device = device(3, 64 * 1024);

    for _ in 0..5 {
        empty_frame(&mut device);
    }

    assert_eq!(device.submissions(), 5);
    assert_eq!(device.stats().frame_number, 5);
}

#[test]
fn test_wait_idle_retires_every_outstanding_frame() {
    let mut device = device(3, 64 * 1024);
    for _ in 0..2 {
        empty_frame(&mut device);
    }
    assert_eq!(device.stats().outstanding_frames, 2);

    device.wait_idle().unwrap();

    let stats = device.stats();
    assert_eq!(stats.outstanding_frames, 0);
    assert_eq!(stats.last_synced_frame, 2);
}

#[test]
#[should_panic(expected = "still recording")]
fn test_begin_frame_twice_panics() {
    let mut device = device(2, 64 * 1024);
    device.begin_frame().unwrap();
    device.begin_frame().unwrap();
}

#[test]
fn test_invalid_settings_are_rejected() {
    let settings = DeviceSettings {
        ephemeral_ring_buffer_size: 1000,
        ..Default::default()
    };
    let shaders = ShaderLibrary::new(MemoryShaderSource::new(), PassthroughCompiler);

    let err = NullDevice::new(settings, shaders).unwrap_err();

    assert!(err.to_string().contains("ephemeral_ring_buffer_size"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Deferred deletion
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_deleted_buffer_outlives_the_frames_in_flight() {
    // ARRANGE
    let mut device = device(3, 64 * 1024);
    let buffer = vertex_buffer(&mut device);

    // ACT: delete while frame #1 records, then run the other two slots
    device.begin_frame().unwrap();
    device.delete_buffer(buffer);
    device.present_frame(None).unwrap();
    assert_eq!(device.stats().pending_deletions, 1);
    empty_frame(&mut device);
    empty_frame(&mut device);

    // ASSERT: still pending until frame #1's slot comes around again
    assert_eq!(device.released(ResourceKind::Buffer), 0);
    device.begin_frame().unwrap();
    assert_eq!(device.released(ResourceKind::Buffer), 1);
    assert_eq!(device.stats().pending_deletions, 0);
}

#[test]
fn test_deletion_between_frames_joins_the_next_frame() {
    let mut device = device(2, 64 * 1024);
    let buffer = vertex_buffer(&mut device);

    device.delete_buffer(buffer);
    assert_eq!(device.stats().staged_deletions, 1);

    device.begin_frame().unwrap();
    let stats = device.stats();
    assert_eq!(stats.staged_deletions, 0);
    assert_eq!(stats.pending_deletions, 1);
}

#[test]
fn test_deleted_handle_is_stale_immediately() {
    let mut device = device(2, 64 * 1024);
    let buffer = vertex_buffer(&mut device);

    device.delete_buffer(buffer);

    assert!(!device.is_buffer_alive(buffer));
}

#[test]
#[should_panic(expected = "stale")]
fn test_using_a_deleted_buffer_panics() {
    let mut device = device(2, 64 * 1024);
    let buffer = vertex_buffer(&mut device);
    device.delete_buffer(buffer);

    device.buffer_contents(buffer);
}

#[test]
#[should_panic(expected = "stale")]
fn test_double_delete_panics() {
    let mut device = device(2, 64 * 1024);
    let buffer = vertex_buffer(&mut device);

    device.delete_buffer(buffer);
    device.delete_buffer(buffer);
}

fn create_and_delete_unused(device: &mut NullDevice) {
    let buffer = vertex_buffer(device);
    let texture = device
        .create_texture(&TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm), None)
        .unwrap();
    let sampler = device.create_sampler(&SamplerDescriptor::default()).unwrap();
    device.delete_buffer(buffer);
    device.delete_texture(texture);
    device.delete_sampler(sampler);
}

#[test]
fn test_unused_resources_leave_ring_and_deletion_bookkeeping_intact() {
    // ARRANGE: frame #1 owns some ring space
    let mut device = device(2, 64 * 1024);
    device.begin_frame().unwrap();
    device.create_ephemeral_uniform(&[1.0f32; 4]).unwrap();
    let cursor = device.stats().ring_cursor;
    let frame_usage = device.stats().ring_frame_usage;
    assert!(cursor > 0);

    // ACT: create-then-delete inside frame #1, then between frames
    create_and_delete_unused(&mut device);
    device.present_frame(None).unwrap();
    create_and_delete_unused(&mut device);

    // ASSERT: the ring is untouched and nothing is released early
    let stats = device.stats();
    assert_eq!(stats.ring_cursor, cursor);
    assert_eq!(stats.ring_frame_usage, frame_usage);
    assert_eq!(stats.pending_deletions, 3);
    assert_eq!(stats.staged_deletions, 3);
    for kind in [ResourceKind::Buffer, ResourceKind::Texture, ResourceKind::Sampler] {
        assert_eq!(device.released(kind), 0);
    }

    // Frame #2 takes the staged batch into slot 1.
    empty_frame(&mut device);
    // Frame #3 reuses slot 0 and releases the first batch.
    device.begin_frame().unwrap();
    for kind in [ResourceKind::Buffer, ResourceKind::Texture, ResourceKind::Sampler] {
        assert_eq!(device.released(kind), 1);
    }
    device.present_frame(None).unwrap();
    device.wait_idle().unwrap();

    let stats = device.stats();
    for kind in [ResourceKind::Buffer, ResourceKind::Texture, ResourceKind::Sampler] {
        assert_eq!(device.released(kind), 2);
    }
    assert_eq!(stats.released_resources, 6);
    assert_eq!(stats.pending_deletions, 0);
    assert_eq!(stats.staged_deletions, 0);
    assert_eq!(stats.ring_cursor, cursor);
}

// ─────────────────────────────────────────────────────────────────────────────
// Ephemeral buffers
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_ephemeral_buffer_lives_until_its_slot_is_reused() {
    // ARRANGE
    let mut device = device(3, 64 * 1024);
    device.begin_frame().unwrap();
    let uniform = device.create_ephemeral_uniform(&[1.0f32, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(
        device.buffer_contents(uniform),
        bytemuck::bytes_of(&[1.0f32, 2.0, 3.0, 4.0])
    );
    device.present_frame(None).unwrap();

    // ACT
    empty_frame(&mut device);
    empty_frame(&mut device);
    let alive_before_reuse = device.is_buffer_alive(uniform);
    device.begin_frame().unwrap();

    // ASSERT
    assert!(alive_before_reuse);
    assert!(!device.is_buffer_alive(uniform));
}

#[test]
#[should_panic(expected = "inside a frame")]
fn test_ephemeral_buffer_outside_a_frame_panics() {
    let mut device = device(2, 64 * 1024);
    let _ = device.create_ephemeral_buffer(BufferUsage::VERTEX, &[0u8; 12]);
}

#[test]
#[should_panic(expected = "cannot be deleted explicitly")]
fn test_deleting_an_ephemeral_buffer_panics() {
    let mut device = device(2, 64 * 1024);
    device.begin_frame().unwrap();
    let buffer = device
        .create_ephemeral_buffer(BufferUsage::VERTEX, &[0u8; 12])
        .unwrap();

    device.delete_buffer(buffer);
}

#[test]
fn test_empty_ephemeral_contents_are_rejected() {
    let mut device = device(2, 64 * 1024);
    device.begin_frame().unwrap();

    let result = device.create_ephemeral_buffer(BufferUsage::VERTEX, &[]);

    assert!(matches!(result, Err(ResourceError::InvalidDescriptor(_))));
}

#[test]
fn test_ring_space_is_recycled_across_frames() {
    // Two 256-byte-aligned allocations per frame in a 1 KiB ring only fit
    // if retired frames hand their space back.
    let mut device = device(2, 1024);

    for frame in 0..10u32 {
        device.begin_frame().unwrap();
        device.create_ephemeral_uniform(&[frame; 4]).unwrap();
        device.create_ephemeral_uniform(&[frame + 1; 4]).unwrap();
        device.present_frame(None).unwrap();
    }

    assert_eq!(device.stats().frame_number, 10);
}

#[test]
#[should_panic(expected = "ring buffer overrun")]
fn test_ring_overrun_within_one_frame_panics() {
    let mut device = device(2, 1024);
    device.begin_frame().unwrap();

    for value in 0..5u32 {
        device.create_ephemeral_uniform(&[value; 4]).unwrap();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Swapchain recreation and shutdown
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_changing_frames_in_flight_retires_pending_work() {
    let mut device = device(3, 64 * 1024);
    let buffer = vertex_buffer(&mut device);
    device.begin_frame().unwrap();
    device.delete_buffer(buffer);
    device.present_frame(None).unwrap();

    device
        .recreate_swapchain(SwapchainSettings {
            width: 640,
            height: 480,
            frames_in_flight: 2,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(device.released(ResourceKind::Buffer), 1);
    assert_eq!(device.settings().swapchain.width, 640);
    assert_eq!(device.settings().swapchain.frames_in_flight, 2);
    empty_frame(&mut device);
    assert_eq!(device.stats().frame_number, 2);
}

#[test]
fn test_invalid_swapchain_is_rejected() {
    let mut device = device(2, 64 * 1024);

    let result = device.recreate_swapchain(SwapchainSettings {
        width: 0,
        ..Default::default()
    });

    assert!(result.is_err());
    assert_eq!(device.settings().swapchain.width, 1280);
}

#[test]
#[should_panic(expected = "while a frame is being recorded")]
fn test_recreating_the_swapchain_mid_frame_panics() {
    let mut device = device(2, 64 * 1024);
    device.begin_frame().unwrap();

    let _ = device.recreate_swapchain(SwapchainSettings::default());
}

#[test]
fn test_shutdown_releases_everything_once() {
    // ARRANGE
    let mut device = device(2, 64 * 1024);
    let kept = vertex_buffer(&mut device);
    let deleted = vertex_buffer(&mut device);
    device
        .create_texture(&TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm), None)
        .unwrap();
    device.begin_frame().unwrap();
    device.delete_buffer(deleted);
    device.present_frame(None).unwrap();

    // ACT
    device.shutdown().unwrap();
    device.shutdown().unwrap();

    // ASSERT
    assert!(!device.is_buffer_alive(kept));
    assert_eq!(device.released(ResourceKind::Buffer), 2);
    assert_eq!(device.released(ResourceKind::Texture), 1);
}

#[test]
fn test_shutdown_abandons_an_open_frame() {
    let mut device = device(2, 64 * 1024);
    device.begin_frame().unwrap();
    device
        .create_ephemeral_buffer(BufferUsage::UNIFORM, &[0u8; 16])
        .unwrap();

    assert!(device.shutdown().is_ok());
}
