// Copyright 2025 the Filigree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame accumulation.
//!
//! Every fill/stroke/triangles call between `start` and flush appends its
//! vertices to one shared, frame-global vertex array and records a draw call
//! holding offsets into it. Nothing is uploaded until flush; starting the
//! next frame truncates everything.

use smallvec::SmallVec;

use crate::paint::{DrawUniforms, PathVertices, Vertex};
use crate::texture::TextureId;

/// A contiguous run of vertices inside the frame's vertex array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VertexRange {
    pub offset: u32,
    pub count: u32,
}

impl VertexRange {
    pub const EMPTY: Self = Self {
        offset: 0,
        count: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Per-path vertex ranges of one draw call. Either range may be empty, in
/// which case the corresponding draw is skipped.
#[derive(Clone, Copy, Debug, Default)]
pub struct PathSegment {
    pub fill: VertexRange,
    pub stroke: VertexRange,
}

/// One deferred draw call.
///
/// Immutable once appended; the ranges it holds are valid only until the next
/// `start`.
#[derive(Debug)]
pub struct DrawCall {
    pub uniforms: DrawUniforms,
    /// Texture bound at flush time; `None` binds the dummy image.
    pub texture: Option<TextureId>,
    pub segments: SmallVec<[PathSegment; 4]>,
    /// Raw triangle-list geometry, used by the composited-quad path of the
    /// frontend (glyphs and the like).
    pub triangles: Option<VertexRange>,
}

/// Accumulates one frame's draw submissions.
#[derive(Default)]
pub struct FrameBatch {
    view_size: [f32; 2],
    vertices: Vec<Vertex>,
    calls: Vec<DrawCall>,
}

impl FrameBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a new frame, discarding any accumulated draws and recording
    /// the viewport applied to every subsequent encode.
    pub fn start(&mut self, width: u32, height: u32) {
        self.view_size = [width as f32, height as f32];
        self.vertices.clear();
        self.calls.clear();
    }

    /// Discards the accumulated draws but keeps the viewport, for reuse of
    /// the allocations after a frame has been flushed.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.calls.clear();
    }

    pub fn view_size(&self) -> [f32; 2] {
        self.view_size
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn append(&mut self, vertices: &[Vertex]) -> VertexRange {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(vertices);
        VertexRange {
            offset,
            count: vertices.len() as u32,
        }
    }

    /// Records a fill draw call: each path contributes its interior fan and,
    /// when `edge_aa` is set, the fringe strip along its border.
    pub fn push_fill(
        &mut self,
        uniforms: DrawUniforms,
        texture: Option<TextureId>,
        paths: &[PathVertices<'_>],
        edge_aa: bool,
    ) {
        let mut segments = SmallVec::with_capacity(paths.len());
        for path in paths {
            let mut segment = PathSegment {
                fill: self.append(path.fill),
                stroke: VertexRange::EMPTY,
            };
            if edge_aa && !path.stroke.is_empty() {
                segment.stroke = self.append(path.stroke);
            }
            segments.push(segment);
        }
        self.calls.push(DrawCall {
            uniforms,
            texture,
            segments,
            triangles: None,
        });
    }

    /// Records a stroke draw call from each path's stroke strip.
    pub fn push_stroke(
        &mut self,
        uniforms: DrawUniforms,
        texture: Option<TextureId>,
        paths: &[PathVertices<'_>],
    ) {
        let mut segments = SmallVec::with_capacity(paths.len());
        for path in paths {
            segments.push(PathSegment {
                fill: VertexRange::EMPTY,
                stroke: self.append(path.stroke),
            });
        }
        self.calls.push(DrawCall {
            uniforms,
            texture,
            segments,
            triangles: None,
        });
    }

    /// Records a raw triangle-list draw call.
    pub fn push_triangles(
        &mut self,
        uniforms: DrawUniforms,
        texture: Option<TextureId>,
        vertices: &[Vertex],
    ) {
        let triangles = self.append(vertices);
        self.calls.push(DrawCall {
            uniforms,
            texture,
            segments: SmallVec::new(),
            triangles: Some(triangles),
        });
    }
}
