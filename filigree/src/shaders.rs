// Copyright 2025 the Filigree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The fill shader shared by all three pipelines.
//!
//! One vertex stage mapping framebuffer pixels to clip space, one fragment
//! stage switching on the draw-type tag of the uniform record. The
//! `edge_aa` pipeline-overridable constant takes the place of a
//! specialization constant: with it disabled the stroke coverage term
//! compiles out entirely.

/// WGSL source for the fill pipelines. The `DrawUniforms` struct must match
/// the layout produced by [`crate::DrawUniforms`].
pub(crate) const FILL_SHADER: &str = r#"
struct DrawUniforms {
    view_size: vec2<f32>,
    draw_type: u32,
    tex_kind: u32,
    inner_color: vec4<f32>,
    outer_color: vec4<f32>,
    // Columns 0-2 hold the inverse scissor transform, column 3 its extent
    // and edge-softening scale; the w lanes carry radius, feather and
    // stroke width.
    scissor_mat: mat4x4<f32>,
    // Same packing for the paint transform; [0].w is the stroke coverage
    // multiplier.
    paint_mat: mat4x4<f32>,
}

override edge_aa: u32 = 0u;

@group(0) @binding(0) var<uniform> uni: DrawUniforms;
@group(0) @binding(1) var tex: texture_2d<f32>;
@group(0) @binding(2) var samp: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) fpos: vec2<f32>,
    @location(1) ftcoord: vec2<f32>,
}

@vertex
fn vs_main(@location(0) pos: vec2<f32>, @location(1) uv: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.fpos = pos;
    out.ftcoord = uv;
    out.position = vec4<f32>(
        2.0 * pos.x / uni.view_size.x - 1.0,
        1.0 - 2.0 * pos.y / uni.view_size.y,
        0.0,
        1.0,
    );
    return out;
}

fn sd_round_rect(pt: vec2<f32>, ext: vec2<f32>, rad: f32) -> f32 {
    let ext2 = ext - vec2<f32>(rad, rad);
    let d = abs(pt) - ext2;
    return min(max(d.x, d.y), 0.0) + length(max(d, vec2<f32>(0.0, 0.0))) - rad;
}

fn scissor_mask(p: vec2<f32>) -> f32 {
    let inv = mat3x3<f32>(
        uni.scissor_mat[0].xyz,
        uni.scissor_mat[1].xyz,
        uni.scissor_mat[2].xyz,
    );
    let ext = uni.scissor_mat[3].xy;
    let scale = uni.scissor_mat[3].zw;
    let pt = (inv * vec3<f32>(p, 1.0)).xy;
    let sc = vec2<f32>(0.5, 0.5) - (abs(pt) - ext) * scale;
    return clamp(sc.x, 0.0, 1.0) * clamp(sc.y, 0.0, 1.0);
}

fn stroke_mask(ftcoord: vec2<f32>) -> f32 {
    let stroke_mult = uni.paint_mat[0].w;
    return min(1.0, (1.0 - abs(ftcoord.x * 2.0 - 1.0)) * stroke_mult) * min(1.0, ftcoord.y);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let scissor = scissor_mask(in.fpos);
    var stroke_alpha = 1.0;
    if edge_aa != 0u {
        stroke_alpha = stroke_mask(in.ftcoord);
    }

    let paint_inv = mat3x3<f32>(
        uni.paint_mat[0].xyz,
        uni.paint_mat[1].xyz,
        uni.paint_mat[2].xyz,
    );
    let paint_ext = uni.paint_mat[3].xy;
    let pt = (paint_inv * vec3<f32>(in.fpos, 1.0)).xy;

    var result: vec4<f32>;
    if uni.draw_type == 1u {
        result = uni.inner_color;
    } else if uni.draw_type == 2u {
        let radius = uni.scissor_mat[0].w;
        let feather = uni.scissor_mat[1].w;
        let d = clamp(
            (sd_round_rect(pt, paint_ext, radius) + feather * 0.5) / feather,
            0.0,
            1.0,
        );
        result = mix(uni.inner_color, uni.outer_color, d);
    } else {
        var color = textureSample(tex, samp, pt / paint_ext);
        if uni.tex_kind == 2u {
            color = vec4<f32>(color.x);
        }
        result = color * uni.inner_color;
    }
    return result * (stroke_alpha * scissor);
}
"#;
