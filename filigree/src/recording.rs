// Copyright 2025 the Filigree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording of a frame's draw commands.
//!
//! The recorder walks the accumulated draw calls in insertion order
//! (painter's algorithm; the first submission is at the bottom) and lowers
//! them to an API-agnostic command list the engine executes against its
//! pipelines. The only state it tracks is the currently bound topology, so a
//! run of same-topology draws binds its pipeline once.

use crate::batch::FrameBatch;

/// The three fixed pipeline configurations. They differ only in primitive
/// topology and share one blend state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Topology {
    /// Triangle fans covering path interiors.
    Fan,
    /// Triangle strips: stroke geometry and fill fringes.
    Strip,
    /// Raw triangle lists.
    List,
}

/// Single command inside a [`DrawList`], executed in order by an engine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DrawCommand {
    /// Bind the descriptor set of the draw call with this index.
    BindDescriptorSet(u32),
    /// Switch pipelines. Never emitted for the already-bound topology.
    BindPipeline(Topology),
    /// Draw a vertex range out of the frame's shared vertex buffer.
    Draw { first_vertex: u32, vertex_count: u32 },
}

/// List of [`DrawCommand`]s for an engine to execute in order.
#[derive(Default, Debug)]
pub struct DrawList {
    pub commands: Vec<DrawCommand>,
}

impl DrawList {
    /// Lowers a frame into draw commands.
    pub fn record(batch: &FrameBatch) -> Self {
        let mut commands = Vec::new();
        let mut bound: Option<Topology> = None;
        for (ix, call) in batch.calls().iter().enumerate() {
            commands.push(DrawCommand::BindDescriptorSet(ix as u32));
            for segment in &call.segments {
                if !segment.fill.is_empty() {
                    ensure_pipeline(&mut commands, &mut bound, Topology::Fan);
                    commands.push(DrawCommand::Draw {
                        first_vertex: segment.fill.offset,
                        vertex_count: segment.fill.count,
                    });
                }
                if !segment.stroke.is_empty() {
                    ensure_pipeline(&mut commands, &mut bound, Topology::Strip);
                    commands.push(DrawCommand::Draw {
                        first_vertex: segment.stroke.offset,
                        vertex_count: segment.stroke.count,
                    });
                }
            }
            if let Some(triangles) = call.triangles {
                if !triangles.is_empty() {
                    ensure_pipeline(&mut commands, &mut bound, Topology::List);
                    commands.push(DrawCommand::Draw {
                        first_vertex: triangles.offset,
                        vertex_count: triangles.count,
                    });
                }
            }
        }
        Self { commands }
    }

    /// Number of pipeline binds in the list, i.e. the state changes the
    /// recorder could not elide.
    pub fn pipeline_binds(&self) -> usize {
        self.commands
            .iter()
            .filter(|cmd| matches!(cmd, DrawCommand::BindPipeline(_)))
            .count()
    }
}

fn ensure_pipeline(commands: &mut Vec<DrawCommand>, bound: &mut Option<Topology>, wanted: Topology) {
    if *bound != Some(wanted) {
        commands.push(DrawCommand::BindPipeline(wanted));
        *bound = Some(wanted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::{DrawUniforms, Paint, PathVertices, Scissor, Vertex};

    fn uniforms() -> DrawUniforms {
        DrawUniforms::encode(
            &Paint::default(),
            &Scissor::disabled(),
            1.0,
            1.0,
            [800.0, 600.0],
            None,
        )
    }

    fn verts(n: usize) -> Vec<Vertex> {
        vec![Vertex::default(); n]
    }

    #[test]
    fn single_fill_binds_fan_once() {
        let mut batch = FrameBatch::new();
        batch.start(800, 600);
        let fan = verts(6);
        batch.push_fill(
            uniforms(),
            None,
            &[PathVertices {
                fill: &fan,
                stroke: &[],
            }],
            false,
        );
        let list = DrawList::record(&batch);
        assert_eq!(
            list.commands,
            vec![
                DrawCommand::BindDescriptorSet(0),
                DrawCommand::BindPipeline(Topology::Fan),
                DrawCommand::Draw {
                    first_vertex: 0,
                    vertex_count: 6
                },
            ]
        );
    }

    #[test]
    fn consecutive_same_topology_draws_share_one_bind() {
        let mut batch = FrameBatch::new();
        batch.start(800, 600);
        let fan = verts(5);
        for _ in 0..3 {
            batch.push_fill(
                uniforms(),
                None,
                &[PathVertices {
                    fill: &fan,
                    stroke: &[],
                }],
                false,
            );
        }
        let list = DrawList::record(&batch);
        assert_eq!(list.pipeline_binds(), 1);
        // Descriptor sets still rebind per draw call.
        let descriptor_binds = list
            .commands
            .iter()
            .filter(|cmd| matches!(cmd, DrawCommand::BindDescriptorSet(_)))
            .count();
        assert_eq!(descriptor_binds, 3);
    }

    #[test]
    fn fill_with_fringe_alternates_fan_and_strip_per_path() {
        let mut batch = FrameBatch::new();
        batch.start(800, 600);
        let fan = verts(4);
        let fringe = verts(8);
        let paths = [
            PathVertices {
                fill: &fan,
                stroke: &fringe,
            },
            PathVertices {
                fill: &fan,
                stroke: &fringe,
            },
        ];
        batch.push_fill(uniforms(), None, &paths, true);
        let list = DrawList::record(&batch);
        // fan, strip, fan, strip: no elision possible between paths.
        assert_eq!(list.pipeline_binds(), 4);
    }

    #[test]
    fn triangles_use_the_list_pipeline() {
        let mut batch = FrameBatch::new();
        batch.start(800, 600);
        let tris = verts(3);
        batch.push_triangles(uniforms(), None, &tris);
        let list = DrawList::record(&batch);
        assert_eq!(
            list.commands,
            vec![
                DrawCommand::BindDescriptorSet(0),
                DrawCommand::BindPipeline(Topology::List),
                DrawCommand::Draw {
                    first_vertex: 0,
                    vertex_count: 3
                },
            ]
        );
    }

    #[test]
    fn empty_ranges_emit_nothing() {
        let mut batch = FrameBatch::new();
        batch.start(800, 600);
        batch.push_fill(
            uniforms(),
            None,
            &[PathVertices {
                fill: &[],
                stroke: &[],
            }],
            true,
        );
        batch.push_triangles(uniforms(), None, &[]);
        let list = DrawList::record(&batch);
        assert_eq!(
            list.commands,
            vec![
                DrawCommand::BindDescriptorSet(0),
                DrawCommand::BindDescriptorSet(1),
            ]
        );
    }

    #[test]
    fn insertion_order_is_preserved_across_draw_calls() {
        let mut batch = FrameBatch::new();
        batch.start(800, 600);
        let fan = verts(3);
        let strip = verts(4);
        let tris = verts(6);
        batch.push_triangles(uniforms(), None, &tris);
        batch.push_fill(
            uniforms(),
            None,
            &[PathVertices {
                fill: &fan,
                stroke: &[],
            }],
            false,
        );
        batch.push_stroke(
            uniforms(),
            None,
            &[PathVertices {
                fill: &[],
                stroke: &strip,
            }],
        );
        let list = DrawList::record(&batch);
        let draws: Vec<_> = list
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCommand::Draw { first_vertex, .. } => Some(*first_vertex),
                _ => None,
            })
            .collect();
        // Offsets grow with submission order: painter's algorithm.
        assert_eq!(draws, vec![0, 6, 9]);
    }
}
