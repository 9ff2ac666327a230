// Copyright 2025 the Filigree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared helpers for the integration tests.
//!
//! Everything here drives the pure core (accumulation, encoding, command
//! recording), so the tests run without a GPU.

use filigree::peniko::Color;
use filigree::{DrawUniforms, Paint, PathVertices, Scissor, TextureFormat, Vertex};
use filigree::low_level::{FrameBatch, TextureStore};

/// A fan of `count` vertices on the unit circle, the shape a tessellator
/// produces for a convex path interior.
pub fn fan_vertices(count: usize) -> Vec<Vertex> {
    (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            Vertex::new(angle.cos(), angle.sin(), 0.5, 1.0)
        })
        .collect()
}

/// A strip of `count` vertices along a horizontal edge.
pub fn strip_vertices(count: usize) -> Vec<Vertex> {
    (0..count)
        .map(|i| {
            let along = (i / 2) as f32;
            let side = (i % 2) as f32;
            Vertex::new(along, side, side, 1.0)
        })
        .collect()
}

pub fn solid_paint(r: u8, g: u8, b: u8, a: u8) -> Paint {
    Paint::color(Color::rgba8(r, g, b, a))
}

/// Encodes a draw the way the renderer does: texture format resolved from
/// the store at encode time.
pub fn encode(
    batch: &FrameBatch,
    store: &TextureStore,
    paint: &Paint,
    scissor: &Scissor,
    fringe: f32,
    stroke_width: f32,
) -> DrawUniforms {
    let format: Option<TextureFormat> = paint
        .image
        .and_then(|id| store.get(id))
        .map(|tex| tex.format());
    DrawUniforms::encode(
        paint,
        scissor,
        fringe,
        stroke_width,
        batch.view_size(),
        format,
    )
}

/// One fill submission against the batch, mirroring `Renderer::fill`.
pub fn fill(
    batch: &mut FrameBatch,
    store: &TextureStore,
    paint: &Paint,
    scissor: &Scissor,
    fringe: f32,
    paths: &[PathVertices<'_>],
    edge_aa: bool,
) {
    let uniforms = encode(batch, store, paint, scissor, fringe, fringe);
    let texture = paint.image.filter(|&id| store.get(id).is_some());
    batch.push_fill(uniforms, texture, paths, edge_aa);
}

/// One triangles submission against the batch, mirroring
/// `Renderer::triangles`.
pub fn triangles(
    batch: &mut FrameBatch,
    store: &TextureStore,
    paint: &Paint,
    scissor: &Scissor,
    vertices: &[Vertex],
) {
    let uniforms = encode(batch, store, paint, scissor, 1.0, 1.0);
    let texture = paint.image.filter(|&id| store.get(id).is_some());
    batch.push_triangles(uniforms, texture, vertices);
}
