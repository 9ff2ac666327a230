// Copyright 2025 the Filigree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resource sizing across frames: grow-only buffers, the descriptor pool's
//! high-water mark, and texture id assignment.

use filigree::low_level::{
    fan_indices, BufferSize, DescriptorPool, PoolAction, UniformArena,
};
use filigree::{DrawUniforms, Paint, Scissor, TextureFormat};
use filigree::low_level::TextureStore;

const UNIFORM_ALIGN: u32 = 256;

fn frame_uniform_bytes(draw_calls: usize) -> u64 {
    let mut arena = UniformArena::new(UNIFORM_ALIGN);
    let uniforms = DrawUniforms::encode(
        &Paint::default(),
        &Scissor::disabled(),
        1.0,
        1.0,
        [640.0, 480.0],
        None,
    );
    for _ in 0..draw_calls {
        arena.push(&uniforms);
    }
    arena.bytes().len() as u64
}

#[test]
fn descriptor_pool_capacity_is_the_running_maximum() {
    let mut pool = DescriptorPool::new();
    let frames = [1usize, 4, 2, 4, 9, 3, 9, 10];
    let mut running_max = 0;
    for draw_calls in frames {
        let action = pool.prepare(draw_calls);
        // Frames at or below the mark must reuse the pool.
        if draw_calls > running_max {
            assert_eq!(action, PoolAction::Recreate(draw_calls));
        } else {
            assert_eq!(action, PoolAction::Reset);
        }
        running_max = running_max.max(draw_calls);
        assert_eq!(pool.capacity(), running_max);
    }
}

#[test]
fn uniform_buffer_reallocates_only_when_a_frame_outgrows_it() {
    let mut size = BufferSize::new();
    let frames = [3usize, 1, 3, 8, 8, 2];
    let mut reallocations = Vec::new();
    for draw_calls in frames {
        reallocations.push(size.ensure(frame_uniform_bytes(draw_calls)));
    }
    assert_eq!(reallocations, vec![true, false, false, true, false, false]);
    assert_eq!(size.capacity(), frame_uniform_bytes(8));
}

#[test]
fn aligned_records_start_on_binding_boundaries() {
    let uniforms = DrawUniforms::encode(
        &Paint::default(),
        &Scissor::disabled(),
        1.0,
        1.0,
        [640.0, 480.0],
        None,
    );
    let mut arena = UniformArena::new(UNIFORM_ALIGN);
    let offsets: Vec<u64> = (0..5).map(|_| arena.push(&uniforms)).collect();
    for (i, offset) in offsets.iter().enumerate() {
        assert_eq!(*offset, i as u64 * u64::from(UNIFORM_ALIGN));
    }
}

#[test]
fn vertex_buffer_growth_is_monotone() {
    let mut size = BufferSize::new();
    let vertex_stride = 16u64;
    let mut high_water = 0;
    for count in [10u64, 600, 30, 600, 601, 4] {
        let required = count * vertex_stride;
        let reallocated = size.ensure(required);
        assert_eq!(reallocated, required > high_water);
        high_water = high_water.max(required);
        assert_eq!(size.capacity(), high_water);
    }
}

#[test]
fn fan_index_count_matches_the_fan_size() {
    for n in [3u32, 4, 6, 100] {
        let indices = fan_indices(n);
        assert_eq!(indices.len() as u32, (n - 2) * 3);
        // Every triangle starts at the fan origin.
        assert!(indices.chunks(3).all(|tri| tri[0] == 0));
        assert!(indices.iter().all(|&ix| ix < n));
    }
}

#[test]
fn texture_ids_stay_unique_across_churn() {
    let mut store = TextureStore::new();
    let mut issued = Vec::new();
    let mut live = Vec::new();
    for round in 0..20 {
        let format = if round % 3 == 0 {
            TextureFormat::Alpha8
        } else {
            TextureFormat::Rgba8
        };
        let id = store.insert(format, 4, 4);
        issued.push(id.to_raw());
        live.push(id);
        if round % 2 == 1 {
            let victim = live.remove(0);
            assert!(store.remove(victim));
        }
    }
    // Strictly increasing from 1, regardless of interleaved deletions.
    assert_eq!(issued, (1..=20).collect::<Vec<_>>());
    assert_eq!(store.len(), live.len());
    for id in live {
        assert!(store.get(id).is_some());
    }
}
