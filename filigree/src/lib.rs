// Copyright 2025 the Filigree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Filigree is a deferred, batching GPU backend for immediate-mode 2d vector
//! graphics, written in Rust on top of [`wgpu`].
//!
//! A tessellating frontend (paths flattened to triangle fans and strips)
//! drives it through an immediate-mode call sequence; Filigree defers all of
//! it. Between [`Renderer::start`] and [`Renderer::flush`], every
//! fill/stroke/triangles submission is packed into one growable vertex
//! array plus a compact per-draw uniform record. Flush then sizes the GPU
//! buffers (grow-only), uploads everything in two bulk copies, and replays
//! the frame with as few pipeline switches as consecutive draw topologies
//! allow.
//!
//! ## Getting started
//!
//! ```ignore
//! let mut context = filigree::util::RenderContext::new();
//! let surface = pollster::block_on(
//!     context.create_surface(window.clone(), 800, 600, wgpu::PresentMode::AutoVsync),
//! )?;
//! let mut renderer = filigree::Renderer::for_surface(
//!     &context,
//!     surface,
//!     filigree::RendererOptions {
//!         target_format: wgpu::TextureFormat::Bgra8Unorm,
//!         edge_antialiasing: true,
//!     },
//! )?;
//!
//! renderer.start(800, 600);
//! renderer.fill(&paint, &scissor, 1.0, None, &paths);
//! renderer.flush()?;
//! ```
//!
//! Embedders that already own a wgpu context construct the renderer with
//! [`Renderer::new`] instead and replay frames into their own render pass
//! via [`Renderer::record`].

#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod batch;
mod paint;
mod pool;
mod recording;
mod shaders;
mod texture;

#[cfg(feature = "wgpu")]
pub mod util;
#[cfg(feature = "wgpu")]
mod wgpu_engine;

pub mod low_level {
    //! The pieces [`Renderer`][crate::Renderer] is assembled from.
    //!
    //! These are exposed for frontends that want to drive frame accumulation
    //! and command recording themselves, and for tests; the API surface here
    //! is less settled than the top level.

    pub use crate::batch::{DrawCall, FrameBatch, PathSegment, VertexRange};
    pub use crate::pool::{fan_indices, BufferSize, DescriptorPool, PoolAction, UniformArena};
    pub use crate::recording::{DrawCommand, DrawList, Topology};
    pub use crate::texture::TextureStore;
}

/// Styling and composition primitives.
pub use peniko;
/// 2D geometry, with a focus on curves.
pub use peniko::kurbo;

#[cfg(feature = "wgpu")]
pub use wgpu;

pub use paint::{DrawKind, DrawUniforms, Paint, PathVertices, Scissor, TextureKind, Vertex};
pub use texture::{Texture, TextureFormat, TextureId};

use thiserror::Error;

#[cfg(feature = "wgpu")]
use batch::FrameBatch;
#[cfg(feature = "wgpu")]
use recording::DrawList;
#[cfg(feature = "wgpu")]
use texture::TextureStore;

#[cfg(feature = "wgpu")]
use std::sync::Arc;

#[cfg(feature = "wgpu")]
use util::{RenderContext, RenderSurface};
#[cfg(feature = "wgpu")]
use wgpu::{Device, Queue};
#[cfg(feature = "wgpu")]
use wgpu_engine::WgpuEngine;

/// Errors that can occur in Filigree.
///
/// Texture lookup misses are deliberately not part of this: an unknown id is
/// a defined outcome reported through `bool`/`Option` returns.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// There is no available device compatible with the requested surface.
    #[cfg(feature = "wgpu")]
    #[error("couldn't find suitable device")]
    NoCompatibleDevice,
    /// Failed to create surface.
    /// See [`wgpu::CreateSurfaceError`] for more information.
    #[cfg(feature = "wgpu")]
    #[error("couldn't create wgpu surface")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    /// Surface doesn't support the required texture formats.
    /// Make sure that you have a surface which provides one of
    /// [`wgpu::TextureFormat::Rgba8Unorm`] or [`wgpu::TextureFormat::Bgra8Unorm`].
    #[cfg(feature = "wgpu")]
    #[error("couldn't find `Rgba8Unorm` or `Bgra8Unorm` texture format for surface")]
    UnsupportedSurfaceFormat,
    /// The device could not satisfy a buffer or image allocation. Fatal to
    /// the call that triggered it; there is no retry.
    #[cfg(feature = "wgpu")]
    #[error("GPU allocation failed")]
    Allocation(#[from] wgpu::Error),
    /// Failed to acquire the next swapchain image.
    #[cfg(feature = "wgpu")]
    #[error("couldn't acquire surface texture")]
    Surface(#[from] wgpu::SurfaceError),
}

#[cfg_attr(
    not(feature = "wgpu"),
    expect(dead_code, reason = "this can be unused when wgpu feature is not used")
)]
pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

/// The capability interface an immediate-mode vector-graphics API drives.
///
/// [`Renderer`] is its one implementation; an adapter translating an
/// external callback table calls straight through, so no dispatch hierarchy
/// exists behind it.
pub trait RenderBackend {
    fn create_texture(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> Result<TextureId, Error>;
    fn delete_texture(&mut self, id: TextureId) -> bool;
    fn update_texture(&mut self, id: TextureId, offset: [u32; 2], extent: [u32; 2], data: &[u8])
        -> bool;
    fn texture_size(&self, id: TextureId) -> Option<(u32, u32)>;
    fn viewport(&mut self, width: u32, height: u32);
    fn fill(
        &mut self,
        paint: &Paint,
        scissor: &Scissor,
        fringe: f32,
        bounds: Option<[f32; 4]>,
        paths: &[PathVertices<'_>],
    );
    fn stroke(
        &mut self,
        paint: &Paint,
        scissor: &Scissor,
        fringe: f32,
        stroke_width: f32,
        paths: &[PathVertices<'_>],
    );
    fn triangles(&mut self, paint: &Paint, scissor: &Scissor, vertices: &[Vertex]);
    fn cancel(&mut self);
    fn flush(&mut self) -> Result<(), Error>;
}

/// Options which are set at renderer creation time, used in [`Renderer::new`].
#[cfg(feature = "wgpu")]
#[derive(Clone, Copy, Debug)]
pub struct RendererOptions {
    /// Format of the color attachment frames are recorded against. For the
    /// managed presentation mode this must be the surface's format.
    pub target_format: wgpu::TextureFormat,
    /// Compiles the fragment stage with the edge-antialiasing branch and
    /// makes fills append their fringe geometry.
    pub edge_antialiasing: bool,
}

#[cfg(feature = "wgpu")]
enum RenderTarget {
    /// Self-managed presentation: flush acquires, renders, presents and
    /// blocks until the device has finished.
    Surface(RenderSurface<'static>),
    /// Frames are replayed into a caller-supplied render pass via
    /// [`Renderer::record`]; synchronization is the caller's contract.
    External,
}

/// The deferred renderer.
///
/// All methods must be called from one logical thread per instance; there is
/// no internal locking. Draw submissions between [`Renderer::start`] and
/// [`Renderer::flush`] reference frame-local state, so texture deletion is
/// safe at any point (backing images retire until the next blocking flush),
/// but submitting draws outside a started frame encodes against a stale
/// viewport.
#[cfg(feature = "wgpu")]
pub struct Renderer {
    options: RendererOptions,
    engine: WgpuEngine,
    batch: FrameBatch,
    textures: TextureStore,
    target: RenderTarget,
}

#[cfg(all(feature = "wgpu", not(target_arch = "wasm32")))]
static_assertions::assert_impl_all!(Renderer: Send);

#[cfg(feature = "wgpu")]
impl Renderer {
    /// Creates a renderer on top of a borrowed wgpu context.
    ///
    /// The context (instance and adapter behind `device`/`queue`) stays
    /// owned by the caller and must outlive the renderer. Frames are
    /// replayed through [`Self::record`].
    pub fn new(device: Arc<Device>, queue: Arc<Queue>, options: RendererOptions) -> Result<Self> {
        let engine = WgpuEngine::new(device, queue, &options)?;
        Ok(Self {
            options,
            engine,
            batch: FrameBatch::new(),
            textures: TextureStore::new(),
            target: RenderTarget::External,
        })
    }

    /// Creates a renderer that owns presentation on the given surface.
    ///
    /// `options.target_format` is overridden with the surface's format.
    pub fn for_surface(
        context: &RenderContext,
        surface: RenderSurface<'static>,
        options: RendererOptions,
    ) -> Result<Self> {
        let handle = context
            .devices
            .get(surface.dev_id)
            .ok_or(Error::NoCompatibleDevice)?;
        let options = RendererOptions {
            target_format: surface.format,
            ..options
        };
        let mut renderer = Self::new(handle.device.clone(), handle.queue.clone(), options)?;
        renderer.target = RenderTarget::Surface(surface);
        Ok(renderer)
    }

    /// Starts a new frame: resets all stored draw calls and sets the
    /// viewport applied to every encode until the next `start`.
    pub fn start(&mut self, width: u32, height: u32) {
        self.batch.start(width, height);
    }

    /// Discards the current frame.
    ///
    /// Deliberately a no-op: `start` already truncates the previous frame,
    /// so there is nothing to undo before then.
    pub fn cancel(&mut self) {}

    /// Fills the given paths with the given paint.
    ///
    /// `bounds` is an advisory bounding box of the filled region and is
    /// unused here.
    pub fn fill(
        &mut self,
        paint: &Paint,
        scissor: &Scissor,
        fringe: f32,
        bounds: Option<[f32; 4]>,
        paths: &[PathVertices<'_>],
    ) {
        let _ = bounds;
        let (uniforms, texture) = self.encode(paint, scissor, fringe, fringe);
        self.batch
            .push_fill(uniforms, texture, paths, self.options.edge_antialiasing);
    }

    /// Strokes the given paths with the given paint.
    pub fn stroke(
        &mut self,
        paint: &Paint,
        scissor: &Scissor,
        fringe: f32,
        stroke_width: f32,
        paths: &[PathVertices<'_>],
    ) {
        let (uniforms, texture) = self.encode(paint, scissor, fringe, stroke_width);
        self.batch.push_stroke(uniforms, texture, paths);
    }

    /// Renders the given vertices as a triangle list with the given paint.
    pub fn triangles(&mut self, paint: &Paint, scissor: &Scissor, vertices: &[Vertex]) {
        let (uniforms, texture) = self.encode(paint, scissor, 1.0, 1.0);
        self.batch.push_triangles(uniforms, texture, vertices);
    }

    fn encode(
        &self,
        paint: &Paint,
        scissor: &Scissor,
        fringe: f32,
        stroke_width: f32,
    ) -> (DrawUniforms, Option<TextureId>) {
        let format = paint
            .image
            .and_then(|id| self.textures.get(id))
            .map(Texture::format);
        if paint.image.is_some() && format.is_none() {
            log::warn!(
                "paint references unknown texture {}; drawing untextured",
                paint.image.map_or(0, TextureId::to_raw),
            );
        }
        let uniforms = DrawUniforms::encode(
            paint,
            scissor,
            fringe,
            stroke_width,
            self.batch.view_size(),
            format,
        );
        (uniforms, format.and(paint.image))
    }

    /// Flushes the current frame.
    ///
    /// In the managed presentation mode this uploads, renders onto the next
    /// swapchain image, presents, and blocks until the device has finished,
    /// after which retired textures are released. In the external mode it
    /// only stages the frame's uploads and bind groups; follow with
    /// [`Self::record`] in a render pass of the caller's command encoder.
    /// There is no rollback once uploading begins: a failed flush leaves the
    /// renderer in an undefined state that requires re-construction.
    pub fn flush(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.engine.prepare(&self.batch)?;
        let RenderTarget::Surface(surface) = &self.target else {
            return Ok(());
        };

        let list = DrawList::record(&self.batch);
        let frame = surface.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .engine
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("filigree frame"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("filigree frame"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.engine.execute(&list, &mut pass);
        }
        self.engine.queue().submit(Some(encoder.finish()));
        frame.present();
        let _ = self.engine.device().poll(wgpu::Maintain::Wait);
        self.engine.drain_retired();
        self.batch.clear();
        Ok(())
    }

    /// Records the prepared frame's draw commands into a caller-supplied
    /// render pass.
    ///
    /// [`Self::flush`] must have run for this frame so the uploads and bind
    /// groups exist; they remain valid until the next draw submission or
    /// `start`. The pass must target a color attachment in the configured
    /// `target_format`. Deciding when (or whether) to wait on the submitted
    /// work is the caller's contract, including making sure any texture
    /// deleted afterwards is no longer in flight.
    pub fn record(&self, pass: &mut wgpu::RenderPass<'_>) {
        let list = DrawList::record(&self.batch);
        self.engine.execute(&list, pass);
    }

    /// Creates a texture and returns its id.
    ///
    /// `data`, when given, seeds the full texture extent and must be tightly
    /// packed row-major pixels.
    pub fn create_texture(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> Result<TextureId> {
        if let Some(data) = data {
            let expected = width as usize * height as usize * format.bytes_per_pixel() as usize;
            assert_eq!(
                data.len(),
                expected,
                "initial pixels must be tightly packed"
            );
        }
        let id = self.textures.insert(format, width, height);
        match self.engine.create_image(id, format, width, height, data) {
            Ok(()) => Ok(id),
            Err(err) => {
                // The id stays consumed; ids are never reissued.
                self.textures.remove(id);
                Err(err)
            }
        }
    }

    /// Deletes the texture with the given id, returning `false` if it could
    /// not be found. The backing image is released after the next blocking
    /// flush, so frames already recorded against it stay valid.
    pub fn delete_texture(&mut self, id: TextureId) -> bool {
        if self.textures.remove(id) {
            self.engine.retire_image(id);
            true
        } else {
            false
        }
    }

    /// Returns the texture with the given id.
    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    /// Replaces pixel content of a texture. Returns `false` for an unknown id.
    ///
    /// `offset` and `extent` describe the dirty region, but `data` must
    /// still cover the entire texture extent: only full-extent uploads are
    /// performed. A true sub-region update is a documented limitation of
    /// this contract, not a guarantee.
    pub fn update_texture(
        &mut self,
        id: TextureId,
        offset: [u32; 2],
        extent: [u32; 2],
        data: &[u8],
    ) -> bool {
        let _ = (offset, extent);
        let Some(texture) = self.textures.get(id) else {
            return false;
        };
        assert_eq!(data.len(), texture.data_len(), "data must cover the full extent");
        self.engine
            .update_image(id, texture.format(), texture.width(), texture.height(), data)
    }
}

#[cfg(feature = "wgpu")]
impl RenderBackend for Renderer {
    fn create_texture(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> Result<TextureId, Error> {
        Self::create_texture(self, format, width, height, data)
    }

    fn delete_texture(&mut self, id: TextureId) -> bool {
        Self::delete_texture(self, id)
    }

    fn update_texture(
        &mut self,
        id: TextureId,
        offset: [u32; 2],
        extent: [u32; 2],
        data: &[u8],
    ) -> bool {
        Self::update_texture(self, id, offset, extent, data)
    }

    fn texture_size(&self, id: TextureId) -> Option<(u32, u32)> {
        self.textures.get(id).map(|tex| (tex.width(), tex.height()))
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.start(width, height);
    }

    fn fill(
        &mut self,
        paint: &Paint,
        scissor: &Scissor,
        fringe: f32,
        bounds: Option<[f32; 4]>,
        paths: &[PathVertices<'_>],
    ) {
        Self::fill(self, paint, scissor, fringe, bounds, paths);
    }

    fn stroke(
        &mut self,
        paint: &Paint,
        scissor: &Scissor,
        fringe: f32,
        stroke_width: f32,
        paths: &[PathVertices<'_>],
    ) {
        Self::stroke(self, paint, scissor, fringe, stroke_width, paths);
    }

    fn triangles(&mut self, paint: &Paint, scissor: &Scissor, vertices: &[Vertex]) {
        Self::triangles(self, paint, scissor, vertices);
    }

    fn cancel(&mut self) {
        Self::cancel(self);
    }

    fn flush(&mut self) -> Result<(), Error> {
        Self::flush(self)
    }
}
