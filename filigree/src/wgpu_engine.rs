// Copyright 2025 the Filigree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Execution of draw lists against wgpu.
//!
//! The engine owns every GPU-side resource: the three pipeline
//! configurations, the per-frame uniform and vertex buffers, the bind groups
//! standing in for descriptor sets, and the images backing the texture
//! store's ids. Everything above it deals in plain data.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use wgpu::{
    BindGroup, BindGroupLayout, Buffer, Device, PipelineCache, PipelineCompilationOptions, Queue,
    RenderPipeline, Sampler, TextureView,
};

use crate::batch::FrameBatch;
use crate::paint::{DrawUniforms, Vertex};
use crate::pool::{fan_indices, BufferSize, DescriptorPool, PoolAction, UniformArena};
use crate::recording::{DrawCommand, DrawList, Topology};
use crate::shaders::FILL_SHADER;
use crate::texture::{TextureFormat, TextureId};
use crate::util::block_on_wgpu;
use crate::{Error, RendererOptions, Result};

/// On-disk pipeline compilation cache. Purely an optimization: absence, a
/// stale blob, or an unwritable working directory never fail renderer
/// creation.
const PIPELINE_CACHE_FILE: &str = "filigree-pipeline-cache.bin";

const UNIFORM_RECORD_SIZE: u64 = std::mem::size_of::<DrawUniforms>() as u64;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

struct GpuImage {
    // Held to keep the view alive; all access goes through the view except
    // uploads, which target the texture.
    texture: wgpu::Texture,
    view: TextureView,
}

pub(crate) struct WgpuEngine {
    device: Arc<Device>,
    queue: Arc<Queue>,

    list_pipeline: RenderPipeline,
    strip_pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    sampler: Sampler,
    /// 1x1 opaque image bound whenever a draw call carries no texture.
    dummy: GpuImage,

    images: HashMap<TextureId, GpuImage>,
    /// Images removed from `images` but possibly still referenced by an
    /// in-flight frame; dropped once a flush has blocked on the device.
    retired: Vec<GpuImage>,

    arena: UniformArena,
    uniform_offsets: Vec<u64>,
    uniform_buffer: Option<Buffer>,
    uniform_size: BufferSize,
    vertex_buffer: Option<Buffer>,
    vertex_size: BufferSize,
    /// Shared fan-triangulation indices, sized to the largest fill fan seen.
    fan_index_buffer: Option<Buffer>,
    fan_capacity: u32,

    bind_groups: Vec<BindGroup>,
    descriptor_pool: DescriptorPool,
}

impl WgpuEngine {
    pub fn new(device: Arc<Device>, queue: Arc<Queue>, options: &RendererOptions) -> Result<Self> {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("filigree sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("filigree draw layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("filigree pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("filigree fill shader"),
            source: wgpu::ShaderSource::Wgsl(FILL_SHADER.into()),
        });

        let pipeline_cache = load_pipeline_cache(&device);
        let constants = HashMap::from([(
            String::from("edge_aa"),
            f64::from(u8::from(options.edge_antialiasing)),
        )]);

        let make_pipeline = |topology: wgpu::PrimitiveTopology, label: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &VERTEX_ATTRIBUTES,
                    }],
                    compilation_options: PipelineCompilationOptions {
                        constants: &constants,
                        ..Default::default()
                    },
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: options.target_format,
                        blend: Some(wgpu::BlendState {
                            color: wgpu::BlendComponent {
                                src_factor: wgpu::BlendFactor::SrcAlpha,
                                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                                operation: wgpu::BlendOperation::Add,
                            },
                            alpha: wgpu::BlendComponent {
                                src_factor: wgpu::BlendFactor::One,
                                dst_factor: wgpu::BlendFactor::Zero,
                                operation: wgpu::BlendOperation::Add,
                            },
                        }),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: PipelineCompilationOptions {
                        constants: &constants,
                        ..Default::default()
                    },
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: pipeline_cache.as_ref(),
            })
        };

        // Fans have no native topology here; they run on the list pipeline
        // through a shared index buffer, so two pipelines cover all three
        // configurations.
        let list_pipeline = make_pipeline(wgpu::PrimitiveTopology::TriangleList, "filigree list");
        let strip_pipeline =
            make_pipeline(wgpu::PrimitiveTopology::TriangleStrip, "filigree strip");

        store_pipeline_cache(pipeline_cache.as_ref());

        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment;
        let dummy = make_image(&device, &queue, TextureFormat::Rgba8, 1, 1, Some(&[0xff; 4]))?;

        Ok(Self {
            device,
            queue,
            list_pipeline,
            strip_pipeline,
            bind_group_layout,
            sampler,
            dummy,
            images: HashMap::new(),
            retired: Vec::new(),
            arena: UniformArena::new(uniform_alignment),
            uniform_offsets: Vec::new(),
            uniform_buffer: None,
            uniform_size: BufferSize::new(),
            vertex_buffer: None,
            vertex_size: BufferSize::new(),
            fan_index_buffer: None,
            fan_capacity: 0,
            bind_groups: Vec::new(),
            descriptor_pool: DescriptorPool::new(),
        })
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    /// Allocates the GPU image backing a texture id.
    pub fn create_image(
        &mut self,
        id: TextureId,
        format: TextureFormat,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> Result<()> {
        let image = make_image(&self.device, &self.queue, format, width, height, data)?;
        log::trace!("created texture {} ({width}x{height})", id.to_raw());
        self.images.insert(id, image);
        Ok(())
    }

    /// Re-uploads a texture's full pixel contents.
    pub fn update_image(
        &mut self,
        id: TextureId,
        format: TextureFormat,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> bool {
        match self.images.get(&id) {
            Some(image) => {
                write_image(&self.queue, &image.texture, format, width, height, data);
                true
            }
            None => false,
        }
    }

    /// Moves a deleted texture's image to the retired list. It is freed once
    /// a flush has blocked on the device, so a frame recorded before the
    /// deletion can still sample it.
    pub fn retire_image(&mut self, id: TextureId) {
        if let Some(image) = self.images.remove(&id) {
            self.retired.push(image);
        }
    }

    pub fn drain_retired(&mut self) {
        if !self.retired.is_empty() {
            log::trace!("releasing {} retired textures", self.retired.len());
            self.retired.clear();
        }
    }

    /// Sizes the frame's GPU buffers, uploads uniform records and vertex
    /// data (one bulk copy each), and builds one bind group per draw call.
    pub fn prepare(&mut self, batch: &FrameBatch) -> Result<()> {
        let calls = batch.calls();

        self.arena.clear();
        self.uniform_offsets.clear();
        for call in calls {
            self.uniform_offsets.push(self.arena.push(&call.uniforms));
        }
        let vertex_bytes: &[u8] = bytemuck::cast_slice(batch.vertices());

        let grow_uniform = self.uniform_size.ensure(self.arena.bytes().len() as u64);
        let grow_vertex = self.vertex_size.ensure(vertex_bytes.len() as u64);
        let max_fan = calls
            .iter()
            .flat_map(|call| call.segments.iter())
            .map(|segment| segment.fill.count)
            .max()
            .unwrap_or(0);
        let grow_fan = max_fan > self.fan_capacity;

        if grow_uniform || grow_vertex || grow_fan {
            self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
            if grow_uniform {
                log::debug!("uniform buffer grows to {} bytes", self.uniform_size.capacity());
                self.uniform_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("filigree uniforms"),
                    size: self.uniform_size.capacity(),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }));
            }
            if grow_vertex {
                log::debug!("vertex buffer grows to {} bytes", self.vertex_size.capacity());
                self.vertex_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("filigree vertices"),
                    size: self.vertex_size.capacity(),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }));
            }
            if grow_fan {
                let indices = fan_indices(max_fan);
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("filigree fan indices"),
                    size: std::mem::size_of_val(indices.as_slice()) as u64,
                    usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                self.queue
                    .write_buffer(&buffer, 0, bytemuck::cast_slice(&indices));
                self.fan_index_buffer = Some(buffer);
                self.fan_capacity = max_fan;
            }
            if let Some(error) = block_on_wgpu(&self.device, self.device.pop_error_scope()) {
                return Err(Error::Allocation(error));
            }
        }

        if !self.arena.is_empty() {
            let buffer = self
                .uniform_buffer
                .as_ref()
                .expect("uniform buffer sized above");
            self.queue.write_buffer(buffer, 0, self.arena.bytes());
        }
        if !vertex_bytes.is_empty() {
            let buffer = self
                .vertex_buffer
                .as_ref()
                .expect("vertex buffer sized above");
            self.queue.write_buffer(buffer, 0, vertex_bytes);
        }

        match self.descriptor_pool.prepare(calls.len()) {
            PoolAction::Recreate(sets) => self.bind_groups = Vec::with_capacity(sets),
            PoolAction::Reset => self.bind_groups.clear(),
        }
        for (call, &offset) in calls.iter().zip(&self.uniform_offsets) {
            let uniforms = self
                .uniform_buffer
                .as_ref()
                .expect("uniform buffer exists when draw calls do");
            let view = call
                .texture
                .and_then(|id| self.images.get(&id))
                .map_or(&self.dummy.view, |image| &image.view);
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: None,
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: uniforms,
                            offset,
                            size: NonZeroU64::new(UNIFORM_RECORD_SIZE),
                        }),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            self.bind_groups.push(bind_group);
        }
        Ok(())
    }

    /// Replays a draw list into a render pass. [`Self::prepare`] must have
    /// run for the same frame.
    pub fn execute(&self, list: &DrawList, pass: &mut wgpu::RenderPass<'_>) {
        if let Some(vertices) = &self.vertex_buffer {
            pass.set_vertex_buffer(0, vertices.slice(..));
        }
        let mut bound = None;
        for command in &list.commands {
            match *command {
                DrawCommand::BindDescriptorSet(ix) => {
                    pass.set_bind_group(0, &self.bind_groups[ix as usize], &[]);
                }
                DrawCommand::BindPipeline(topology) => {
                    match topology {
                        Topology::Fan | Topology::List => pass.set_pipeline(&self.list_pipeline),
                        Topology::Strip => pass.set_pipeline(&self.strip_pipeline),
                    }
                    if topology == Topology::Fan {
                        let indices = self
                            .fan_index_buffer
                            .as_ref()
                            .expect("fan index buffer sized during prepare");
                        pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                    }
                    bound = Some(topology);
                }
                DrawCommand::Draw {
                    first_vertex,
                    vertex_count,
                } => {
                    if bound == Some(Topology::Fan) {
                        let index_count = vertex_count.saturating_sub(2) * 3;
                        pass.draw_indexed(0..index_count, first_vertex as i32, 0..1);
                    } else {
                        pass.draw(first_vertex..first_vertex + vertex_count, 0..1);
                    }
                }
            }
        }
    }
}

fn make_image(
    device: &Device,
    queue: &Queue,
    format: TextureFormat,
    width: u32,
    height: u32,
    data: Option<&[u8]>,
) -> Result<GpuImage> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: None,
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: image_format(format),
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    if let Some(error) = block_on_wgpu(device, device.pop_error_scope()) {
        return Err(Error::Allocation(error));
    }
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    if let Some(data) = data {
        write_image(queue, &texture, format, width, height, data);
    }
    Ok(GpuImage { texture, view })
}

fn write_image(
    queue: &Queue,
    texture: &wgpu::Texture,
    format: TextureFormat,
    width: u32,
    height: u32,
    data: &[u8],
) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(width * format.bytes_per_pixel()),
            rows_per_image: None,
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

fn image_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Alpha8 => wgpu::TextureFormat::R8Unorm,
    }
}

fn load_pipeline_cache(device: &Device) -> Option<PipelineCache> {
    if !device.features().contains(wgpu::Features::PIPELINE_CACHE) {
        return None;
    }
    let data = match std::fs::read(PIPELINE_CACHE_FILE) {
        Ok(data) => {
            log::debug!("loaded pipeline cache ({} bytes)", data.len());
            Some(data)
        }
        Err(_) => None,
    };
    // SAFETY: the cache blob is only ever one this renderer wrote itself;
    // `fallback` covers blobs from a different driver version.
    let cache = unsafe {
        device.create_pipeline_cache(&wgpu::PipelineCacheDescriptor {
            label: Some("filigree pipeline cache"),
            data: data.as_deref(),
            fallback: true,
        })
    };
    Some(cache)
}

fn store_pipeline_cache(cache: Option<&PipelineCache>) {
    let Some(data) = cache.and_then(PipelineCache::get_data) else {
        return;
    };
    if let Err(err) = std::fs::write(PIPELINE_CACHE_FILE, &data) {
        log::warn!("couldn't persist pipeline cache: {err}");
    }
}
