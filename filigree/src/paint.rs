// Copyright 2025 the Filigree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint state and its packed per-draw GPU representation.

use bytemuck::{Pod, Zeroable};
use peniko::Color;
use peniko::kurbo::Affine;

use crate::texture::{TextureFormat, TextureId};

pub(crate) const DRAW_TYPE_COLOR: u32 = 1;
pub(crate) const DRAW_TYPE_GRADIENT: u32 = 2;
pub(crate) const DRAW_TYPE_TEXTURE: u32 = 3;

pub(crate) const TEX_KIND_NONE: u32 = 0;
pub(crate) const TEX_KIND_RGBA: u32 = 1;
pub(crate) const TEX_KIND_ALPHA: u32 = 2;

/// One tessellated vertex: position and texture coordinate.
///
/// Matches the vertex buffer layout of the fill pipelines: two `float32x2`
/// attributes, 16 byte stride.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self {
            pos: [x, y],
            uv: [u, v],
        }
    }
}

/// Caller-tessellated geometry for one path.
///
/// `fill` is the fan covering the path interior; `stroke` is the strip along
/// its border, used both for strokes and for the antialiasing fringe of a
/// fill. Either slice may be empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct PathVertices<'a> {
    pub fill: &'a [Vertex],
    pub stroke: &'a [Vertex],
}

/// Paint state for one draw call.
///
/// The one shape covers all three draw kinds: a solid color (inner and outer
/// colors equal), a rounded-box gradient between the two colors, or a texture
/// fill when `image` is set. `transform` maps paint space into screen space
/// and is inverted during encoding, so a non-invertible transform produces
/// garbage output rather than an error; that is a caller bug, not a
/// recoverable condition.
#[derive(Clone, Copy, Debug)]
pub struct Paint {
    pub transform: Affine,
    pub extent: [f32; 2],
    pub radius: f32,
    pub feather: f32,
    pub inner_color: Color,
    pub outer_color: Color,
    pub image: Option<TextureId>,
}

impl Paint {
    /// A solid-color paint.
    pub fn color(color: Color) -> Self {
        Self {
            inner_color: color,
            outer_color: color,
            ..Self::default()
        }
    }

    /// A paint sampling the given texture over `extent`.
    pub fn image(image: TextureId, extent: [f32; 2]) -> Self {
        Self {
            image: Some(image),
            extent,
            ..Self::default()
        }
    }
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            extent: [0.0, 0.0],
            radius: 0.0,
            feather: 1.0,
            inner_color: Color::rgba8(255, 255, 255, 255),
            outer_color: Color::rgba8(255, 255, 255, 255),
            image: None,
        }
    }
}

/// Scissor state for one draw call: a rotated rectangle given by a transform
/// and a half-extent.
#[derive(Clone, Copy, Debug)]
pub struct Scissor {
    pub transform: Affine,
    pub extent: [f32; 2],
}

impl Scissor {
    /// The "never clip" sentinel: any extent component below -0.5 disables
    /// scissoring for the draw.
    pub const fn disabled() -> Self {
        Self {
            transform: Affine::IDENTITY,
            extent: [-1.0, -1.0],
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.extent[0] < -0.5 || self.extent[1] < -0.5
    }
}

impl Default for Scissor {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Classification of a draw, as read back from an encoded record.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DrawKind {
    Color,
    Gradient,
    Texture,
}

/// Texture channel layout tag carried by an encoded record.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TextureKind {
    None,
    Rgba,
    Alpha,
}

/// The fixed-layout uniform record, one per draw call.
///
/// Both matrices are column-major and carry more than the inverse transform:
/// the unused lanes hold the scissor extent and edge-softening scales, the
/// paint extent, and the scalar parameters (corner radius, feather distance,
/// stroke width, stroke coverage multiplier). They are packed there purely
/// for layout reasons; the fragment stage unpacks them again.
///
/// Layout must match `DrawUniforms` in the WGSL source exactly.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct DrawUniforms {
    pub view_size: [f32; 2],
    pub draw_type: u32,
    pub tex_kind: u32,
    pub inner_color: [f32; 4],
    pub outer_color: [f32; 4],
    pub scissor_mat: [[f32; 4]; 4],
    pub paint_mat: [[f32; 4]; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<DrawUniforms>(), 176);

impl DrawUniforms {
    /// Packs one draw call's paint, scissor and stroke state.
    ///
    /// `texture` is the pixel format of the texture referenced by
    /// `paint.image`, resolved by the caller at encode time; it is not
    /// re-validated at flush time. A paint whose image id did not resolve is
    /// classified by its colors as if it had no image.
    pub fn encode(
        paint: &Paint,
        scissor: &Scissor,
        fringe: f32,
        stroke_width: f32,
        view_size: [f32; 2],
        texture: Option<TextureFormat>,
    ) -> Self {
        let (draw_type, tex_kind) = match (paint.image, texture) {
            (Some(_), Some(TextureFormat::Rgba8)) => (DRAW_TYPE_TEXTURE, TEX_KIND_RGBA),
            (Some(_), Some(TextureFormat::Alpha8)) => (DRAW_TYPE_TEXTURE, TEX_KIND_ALPHA),
            _ if paint.inner_color == paint.outer_color => (DRAW_TYPE_COLOR, TEX_KIND_NONE),
            _ => (DRAW_TYPE_GRADIENT, TEX_KIND_NONE),
        };

        let mut scissor_mat = [[0.0_f32; 4]; 4];
        if scissor.is_disabled() {
            // All-ones sentinel: a zero inverse transform with unit extent
            // and unit scale evaluates to "never clip" in the fragment stage.
            scissor_mat[3] = [1.0; 4];
        } else {
            let inv = inverse_coeffs(scissor.transform);
            scissor_mat[0][0] = inv[0];
            scissor_mat[0][1] = inv[1];
            scissor_mat[1][0] = inv[2];
            scissor_mat[1][1] = inv[3];
            scissor_mat[2][0] = inv[4];
            scissor_mat[2][1] = inv[5];
            scissor_mat[2][2] = 1.0;

            scissor_mat[3][0] = scissor.extent[0];
            scissor_mat[3][1] = scissor.extent[1];

            // Per-axis scale of the scissor transform, in fringe units, so
            // the fragment stage can soften the clip edge by one fringe
            // width in device space.
            let [a, b, c, d, _, _] = coeffs(scissor.transform);
            scissor_mat[3][2] = (a * a + c * c).sqrt() / fringe;
            scissor_mat[3][3] = (b * b + d * d).sqrt() / fringe;
        }
        scissor_mat[0][3] = paint.radius;
        scissor_mat[1][3] = paint.feather;
        scissor_mat[2][3] = stroke_width;

        let mut paint_mat = [[0.0_f32; 4]; 4];
        let inv = inverse_coeffs(paint.transform);
        paint_mat[0][0] = inv[0];
        paint_mat[0][1] = inv[1];
        paint_mat[1][0] = inv[2];
        paint_mat[1][1] = inv[3];
        paint_mat[2][0] = inv[4];
        paint_mat[2][1] = inv[5];
        paint_mat[2][2] = 1.0;

        paint_mat[3][0] = paint.extent[0];
        paint_mat[3][1] = paint.extent[1];

        // Coverage multiplier for antialiased strokes.
        paint_mat[0][3] = (stroke_width * 0.5 + fringe * 0.5) / fringe;

        Self {
            view_size,
            draw_type,
            tex_kind,
            inner_color: color_vec(paint.inner_color),
            outer_color: color_vec(paint.outer_color),
            scissor_mat,
            paint_mat,
        }
    }

    pub fn kind(&self) -> DrawKind {
        match self.draw_type {
            DRAW_TYPE_COLOR => DrawKind::Color,
            DRAW_TYPE_GRADIENT => DrawKind::Gradient,
            _ => DrawKind::Texture,
        }
    }

    pub fn texture_kind(&self) -> TextureKind {
        match self.tex_kind {
            TEX_KIND_RGBA => TextureKind::Rgba,
            TEX_KIND_ALPHA => TextureKind::Alpha,
            _ => TextureKind::None,
        }
    }
}

fn coeffs(transform: Affine) -> [f32; 6] {
    transform.as_coeffs().map(|v| v as f32)
}

fn inverse_coeffs(transform: Affine) -> [f32; 6] {
    coeffs(transform.inverse())
}

fn color_vec(color: Color) -> [f32; 4] {
    [
        f32::from(color.r) / 255.0,
        f32::from(color.g) / 255.0,
        f32::from(color.b) / 255.0,
        f32::from(color.a) / 255.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use peniko::kurbo::Vec2;

    const VIEW: [f32; 2] = [800.0, 600.0];

    fn encode(paint: &Paint, scissor: &Scissor) -> DrawUniforms {
        DrawUniforms::encode(paint, scissor, 1.0, 1.0, VIEW, None)
    }

    #[test]
    fn equal_colors_classify_as_solid() {
        let paint = Paint::color(Color::rgba8(10, 20, 30, 40));
        let uniforms = encode(&paint, &Scissor::disabled());
        assert_eq!(uniforms.kind(), DrawKind::Color);
        assert_eq!(uniforms.texture_kind(), TextureKind::None);
        assert_eq!(uniforms.view_size, VIEW);
    }

    #[test]
    fn any_differing_channel_forces_gradient() {
        let base = Color::rgba8(10, 20, 30, 40);
        for channel in 0..4 {
            let mut other = base;
            match channel {
                0 => other.r += 1,
                1 => other.g += 1,
                2 => other.b += 1,
                _ => other.a += 1,
            }
            let paint = Paint {
                inner_color: base,
                outer_color: other,
                ..Paint::default()
            };
            let uniforms = encode(&paint, &Scissor::disabled());
            assert_eq!(uniforms.kind(), DrawKind::Gradient);
        }
    }

    #[test]
    fn texture_paint_takes_its_kind_from_the_pixel_format() {
        let id = TextureId::from_raw(5).unwrap();
        let paint = Paint::image(id, [32.0, 32.0]);
        let rgba =
            DrawUniforms::encode(&paint, &Scissor::disabled(), 1.0, 1.0, VIEW, Some(TextureFormat::Rgba8));
        assert_eq!(rgba.kind(), DrawKind::Texture);
        assert_eq!(rgba.texture_kind(), TextureKind::Rgba);
        let alpha =
            DrawUniforms::encode(&paint, &Scissor::disabled(), 1.0, 1.0, VIEW, Some(TextureFormat::Alpha8));
        assert_eq!(alpha.texture_kind(), TextureKind::Alpha);
    }

    #[test]
    fn unresolved_image_falls_back_to_color_classification() {
        let id = TextureId::from_raw(9).unwrap();
        let mut paint = Paint::image(id, [8.0, 8.0]);
        let uniforms = encode(&paint, &Scissor::disabled());
        assert_eq!(uniforms.kind(), DrawKind::Color);
        paint.outer_color = Color::rgba8(0, 0, 0, 255);
        let uniforms = encode(&paint, &Scissor::disabled());
        assert_eq!(uniforms.kind(), DrawKind::Gradient);
    }

    #[test]
    fn disabled_scissor_encodes_the_sentinel_column() {
        let scissor = Scissor {
            transform: Affine::rotate(1.2) * Affine::translate(Vec2::new(40.0, 2.0)),
            extent: [-1.0, 100.0],
        };
        let uniforms = encode(&Paint::default(), &scissor);
        assert_eq!(uniforms.scissor_mat[3], [1.0; 4]);
        // The inverse-transform columns stay zeroed regardless of transform.
        assert_eq!(uniforms.scissor_mat[0][0], 0.0);
        assert_eq!(uniforms.scissor_mat[1][1], 0.0);
        assert_eq!(uniforms.scissor_mat[2][2], 0.0);
    }

    #[test]
    fn single_negative_extent_component_is_enough_to_disable() {
        let scissor = Scissor {
            transform: Affine::IDENTITY,
            extent: [100.0, -0.6],
        };
        assert!(scissor.is_disabled());
        let uniforms = encode(&Paint::default(), &scissor);
        assert_eq!(uniforms.scissor_mat[3], [1.0; 4]);
    }

    #[test]
    fn active_scissor_stores_inverse_extent_and_scale() {
        let scissor = Scissor {
            transform: Affine::translate(Vec2::new(10.0, 20.0)),
            extent: [50.0, 25.0],
        };
        let uniforms = DrawUniforms::encode(&Paint::default(), &scissor, 2.0, 1.0, VIEW, None);
        let mat = uniforms.scissor_mat;
        // Inverse of a pure translation.
        assert_eq!(mat[0][0], 1.0);
        assert_eq!(mat[1][1], 1.0);
        assert_eq!(mat[2][0], -10.0);
        assert_eq!(mat[2][1], -20.0);
        assert_eq!(mat[2][2], 1.0);
        assert_eq!(mat[3][0], 50.0);
        assert_eq!(mat[3][1], 25.0);
        // Unit basis over a fringe of 2.
        assert_eq!(mat[3][2], 0.5);
        assert_eq!(mat[3][3], 0.5);
    }

    #[test]
    fn scalar_parameters_ride_the_w_lanes() {
        let paint = Paint {
            radius: 4.0,
            feather: 8.0,
            ..Paint::default()
        };
        let uniforms = DrawUniforms::encode(&paint, &Scissor::disabled(), 1.0, 3.0, VIEW, None);
        assert_eq!(uniforms.scissor_mat[0][3], 4.0);
        assert_eq!(uniforms.scissor_mat[1][3], 8.0);
        assert_eq!(uniforms.scissor_mat[2][3], 3.0);
        // (stroke_width / 2 + fringe / 2) / fringe
        assert_eq!(uniforms.paint_mat[0][3], 2.0);
    }

    #[test]
    fn paint_matrix_inverts_a_rotation_translation() {
        let transform = Affine::translate(Vec2::new(5.0, -3.0)) * Affine::rotate(0.7);
        let paint = Paint {
            transform,
            extent: [12.0, 34.0],
            ..Paint::default()
        };
        let uniforms = encode(&paint, &Scissor::disabled());
        let m = uniforms.paint_mat;
        // Applying the packed inverse to a transformed point recovers the
        // original, which is all the shader needs from it.
        let p = transform * peniko::kurbo::Point::new(7.0, 11.0);
        let (x, y) = (p.x as f32, p.y as f32);
        let back = [
            m[0][0] * x + m[1][0] * y + m[2][0],
            m[0][1] * x + m[1][1] * y + m[2][1],
        ];
        assert!((back[0] - 7.0).abs() < 1e-3);
        assert!((back[1] - 11.0).abs() < 1e-3);
        assert_eq!(m[3][0], 12.0);
        assert_eq!(m[3][1], 34.0);
    }

    #[test]
    fn colors_are_normalized_to_unit_floats() {
        let paint = Paint {
            inner_color: Color::rgba8(255, 0, 51, 255),
            outer_color: Color::rgba8(0, 0, 0, 0),
            ..Paint::default()
        };
        let uniforms = encode(&paint, &Scissor::disabled());
        assert_eq!(uniforms.inner_color[0], 1.0);
        assert_eq!(uniforms.inner_color[1], 0.0);
        assert!((uniforms.inner_color[2] - 0.2).abs() < 1e-6);
        assert_eq!(uniforms.outer_color, [0.0; 4]);
    }
}
