// Copyright 2025 the Filigree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sizing and suballocation policy for the per-frame GPU resources.
//!
//! The engine owns the actual `wgpu` objects; the decision logic lives here
//! so it can be exercised without a device. All three trackers share the same
//! policy: capacity only ever grows, and reallocation happens lazily at flush
//! time, sized exactly to the frame that triggered it.

use bytemuck::Pod;

/// CPU staging arena for the frame's uniform records.
///
/// Records are appended behind an alignment-aware cursor so that each one
/// starts at a valid uniform-buffer binding offset. The whole arena is
/// uploaded with a single buffer write at flush time.
pub struct UniformArena {
    data: Vec<u8>,
    align: usize,
}

impl UniformArena {
    /// `alignment` is the device's minimum uniform-buffer offset alignment
    /// and must be a power of two.
    pub fn new(alignment: u32) -> Self {
        assert!(alignment.is_power_of_two());
        Self {
            data: Vec::new(),
            align: alignment as usize,
        }
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Appends one record and returns its byte offset within the arena.
    pub fn push<T: Pod>(&mut self, record: &T) -> u64 {
        let offset = (self.data.len() + self.align - 1) & !(self.align - 1);
        self.data.resize(offset, 0);
        self.data.extend_from_slice(bytemuck::bytes_of(record));
        offset as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Grow-only capacity tracker for a GPU buffer.
#[derive(Default)]
pub struct BufferSize {
    capacity: u64,
}

impl BufferSize {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns `true` when the buffer must be reallocated to hold `required`
    /// bytes. The new capacity is exactly `required`; no headroom is added,
    /// trading occasional reallocation for simplicity.
    pub fn ensure(&mut self, required: u64) -> bool {
        if required > self.capacity {
            self.capacity = required;
            true
        } else {
            false
        }
    }
}

/// What the engine must do with its descriptor-set pool this frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PoolAction {
    /// Destroy and recreate the pool sized for this many sets.
    Recreate(usize),
    /// The pool is large enough; reset its allocations and reuse it.
    Reset,
}

/// High-water-mark tracker for the per-draw descriptor sets.
///
/// The pool is sized to the largest draw-call count seen so far; frames at or
/// below that mark reuse the existing pool.
#[derive(Default)]
pub struct DescriptorPool {
    capacity: usize,
}

impl DescriptorPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn prepare(&mut self, sets: usize) -> PoolAction {
        if sets > self.capacity {
            self.capacity = sets;
            PoolAction::Recreate(sets)
        } else {
            PoolAction::Reset
        }
    }
}

/// Index pattern expressing a triangle fan of `vertex_count` vertices as a
/// triangle list: `[0, 1, 2, 0, 2, 3, ..]`.
///
/// The target API has no fan topology, so fills are drawn through a shared
/// index buffer sized to the largest fan of the frame, with the draw's base
/// vertex selecting the fan origin.
pub fn fan_indices(vertex_count: u32) -> Vec<u32> {
    (2..vertex_count).flat_map(|i| [0, i - 1, i]).collect()
}
