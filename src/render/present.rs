//! GPU side of the renderer. A [`Scene`] is replayed into an offscreen
//! multisampled canvas; the resolved canvas is then stretched over the
//! window on every present, so a frame that was not redrawn stays up.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use tracing::{debug, error, info, warn};
use wgpu::SurfaceError;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::render::scene::{Scene, SceneCommand, ShapeVertex};
use crate::render::surface::{BlendMode, DrawSurface};

const SAMPLE_COUNT: u32 = 4;
/// sRGB-encoded values are stored and blended as-is, the way a 2D canvas
/// composites.
const CANVAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    pos: [f32; 2],
    uv: [f32; 2],
}

const QUAD: [Vertex; 4] = [
    Vertex {
        pos: [-1.0, -1.0],
        uv: [0.0, 1.0],
    },
    Vertex {
        pos: [1.0, -1.0],
        uv: [1.0, 1.0],
    },
    Vertex {
        pos: [-1.0, 1.0],
        uv: [0.0, 0.0],
    },
    Vertex {
        pos: [1.0, 1.0],
        uv: [1.0, 0.0],
    },
];

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ViewportUniforms {
    size: [f32; 2],
    _pad: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ImageUniforms {
    viewport: [f32; 2],
    alpha: f32,
    graded: f32,
    dest: [f32; 4],
    rows: [[f32; 4]; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Transient surface trouble; try again next frame.
    Skipped,
    /// The surface cannot be used any more.
    Fatal,
}

struct Canvas {
    _msaa: wgpu::Texture,
    msaa_view: wgpu::TextureView,
    _resolved: wgpu::Texture,
    resolved_view: wgpu::TextureView,
    blit_bind: wgpu::BindGroup,
    size: (u32, u32),
}

/// A bitmap's texture, alive while the scene keeps drawing the bitmap.
/// Holding the `Arc` keeps the pointer key from being reused.
struct CachedImage {
    _source: Arc<RgbaImage>,
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    last_frame: u64,
}

pub struct Presenter {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    view_format: wgpu::TextureFormat,
    sampler: wgpu::Sampler,

    blit_pipeline: wgpu::RenderPipeline,
    blit_layout: wgpu::BindGroupLayout,
    quad: wgpu::Buffer,

    shape_over: wgpu::RenderPipeline,
    shape_screen: wgpu::RenderPipeline,
    viewport_buf: wgpu::Buffer,
    viewport_bind: wgpu::BindGroup,

    image_pipeline: wgpu::RenderPipeline,
    image_layout: wgpu::BindGroupLayout,

    canvas: Canvas,
    images: HashMap<usize, CachedImage>,
    frame: u64,
}

impl Presenter {
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .first()
            .copied()
            .context("surface reports no texture formats")?;
        // The canvas already holds encoded values; write them through untouched.
        let view_format = format.remove_srgb_suffix();
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("mind-movie-device"),
            required_limits: adapter.limits(),
            ..Default::default()
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: if view_format == format {
                vec![]
            } else {
                vec![view_format]
            },
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            view_format = ?view_format,
            "presenter surface configured",
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("canvas-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let uniform_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit-bind-layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });
        let viewport_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("viewport-bind-layout"),
            entries: &[uniform_entry(0)],
        });
        let image_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("image-bind-layout"),
            entries: &[uniform_entry(0), texture_entry(1), sampler_entry(2)],
        });

        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("blit-quad"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let viewport_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("viewport-uniforms"),
            contents: bytemuck::bytes_of(&ViewportUniforms {
                size: [1.0, 1.0],
                _pad: [0.0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let viewport_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("viewport-bind"),
            layout: &viewport_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: viewport_buf.as_entire_binding(),
            }],
        });

        let blit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("present-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("present.wgsl").into()),
        });
        let shape_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shape-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shape.wgsl").into()),
        });
        let image_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("image-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("image.wgsl").into()),
        });

        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("present-pipeline-layout"),
            bind_group_layouts: &[&blit_layout],
            push_constant_ranges: &[],
        });
        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("present-pipeline"),
            layout: Some(&blit_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &blit_shader,
                entry_point: Some("vs"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &blit_shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: view_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let shape_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("shape-pipeline-layout"),
                bind_group_layouts: &[&viewport_layout],
                push_constant_ranges: &[],
            });
        let shape_pipeline = |label: &str, blend: wgpu::BlendState| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&shape_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shape_shader,
                    entry_point: Some("vs_shape"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<ShapeVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![
                            0 => Float32x2,
                            1 => Float32x4,
                            2 => Float32x4,
                            3 => Float32x4,
                            4 => Uint32
                        ],
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shape_shader,
                    entry_point: Some("fs_shape"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: CANVAS_FORMAT,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: canvas_multisample(),
                multiview: None,
                cache: None,
            })
        };
        let shape_over = shape_pipeline(
            "shape-over-pipeline",
            wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
        );
        let shape_screen = shape_pipeline("shape-screen-pipeline", screen_blend());

        let image_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("image-pipeline-layout"),
                bind_group_layouts: &[&image_layout],
                push_constant_ranges: &[],
            });
        let image_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("image-pipeline"),
            layout: Some(&image_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &image_shader,
                entry_point: Some("vs_image"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &image_shader,
                entry_point: Some("fs_image"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: CANVAS_FORMAT,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: canvas_multisample(),
            multiview: None,
            cache: None,
        });

        let canvas = create_canvas(&device, &blit_layout, &sampler, 1, 1);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            view_format,
            sampler,
            blit_pipeline,
            blit_layout,
            quad,
            shape_over,
            shape_screen,
            viewport_buf,
            viewport_bind,
            image_pipeline,
            image_layout,
            canvas,
            images: HashMap::new(),
            frame: 0,
        })
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.config.width = size.width.max(1);
        self.config.height = size.height.max(1);
        self.surface.configure(&self.device, &self.config);
        debug!(
            width = self.config.width,
            height = self.config.height,
            "presenter surface resized",
        );
    }

    fn ensure_canvas(&mut self, width: u32, height: u32) {
        if self.canvas.size == (width, height) {
            return;
        }
        self.canvas = create_canvas(&self.device, &self.blit_layout, &self.sampler, width, height);
        debug!(width, height, "canvas reallocated");
    }

    /// Replays `scene` into the canvas, replacing what was there.
    pub fn render(&mut self, scene: &Scene) {
        let (width, height) = scene.size();
        self.ensure_canvas(width, height);
        self.frame += 1;
        let frame = self.frame;
        let viewport = [width as f32, height as f32];
        self.queue.write_buffer(
            &self.viewport_buf,
            0,
            bytemuck::bytes_of(&ViewportUniforms {
                size: viewport,
                _pad: [0.0; 2],
            }),
        );

        let geometry = (!scene.indices().is_empty()).then(|| {
            let vertices = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("scene-vertices"),
                contents: bytemuck::cast_slice(scene.vertices()),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let indices = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("scene-indices"),
                contents: bytemuck::cast_slice(scene.indices()),
                usage: wgpu::BufferUsages::INDEX,
            });
            (vertices, indices)
        });

        let mut image_binds = Vec::new();
        for command in scene.commands() {
            let SceneCommand::Image {
                image,
                dest,
                alpha,
                grade,
            } = command
            else {
                continue;
            };
            let cached = self
                .images
                .entry(Arc::as_ptr(image) as usize)
                .or_insert_with(|| upload_image(&self.device, &self.queue, image));
            cached.last_frame = frame;
            let uniforms = ImageUniforms {
                viewport,
                alpha: *alpha,
                graded: if grade.is_some() { 1.0 } else { 0.0 },
                dest: [dest.x, dest.y, dest.w, dest.h],
                rows: grade.map_or([[0.0; 4]; 3], |g| g.rows()),
            };
            let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("image-uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            image_binds.push(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("image-bind"),
                layout: &self.image_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&cached.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            }));
        }
        let before = self.images.len();
        self.images.retain(|_, cached| cached.last_frame == frame);
        if self.images.len() != before {
            debug!(
                evicted = before - self.images.len(),
                kept = self.images.len(),
                "image textures released"
            );
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene-encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.canvas.msaa_view,
                    depth_slice: None,
                    resolve_target: Some(&self.canvas.resolved_view),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Discard,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            let mut binds = image_binds.iter();
            for command in scene.commands() {
                match command {
                    SceneCommand::Shapes { blend, indices } => {
                        let Some((vertices, index_buf)) = geometry.as_ref() else {
                            continue;
                        };
                        rpass.set_pipeline(match blend {
                            BlendMode::SourceOver => &self.shape_over,
                            BlendMode::Screen => &self.shape_screen,
                        });
                        rpass.set_bind_group(0, &self.viewport_bind, &[]);
                        rpass.set_vertex_buffer(0, vertices.slice(..));
                        rpass.set_index_buffer(index_buf.slice(..), wgpu::IndexFormat::Uint32);
                        rpass.draw_indexed(indices.clone(), 0, 0..1);
                    }
                    SceneCommand::Image { .. } => {
                        let Some(bind) = binds.next() else {
                            continue;
                        };
                        rpass.set_pipeline(&self.image_pipeline);
                        rpass.set_bind_group(0, bind, &[]);
                        rpass.draw(0..4, 0..1);
                    }
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    pub fn present(&mut self, window: &Window) -> PresentOutcome {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("presenter surface lost; reconfiguring");
                self.resize(window.inner_size());
                return PresentOutcome::Skipped;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("presenter surface out of memory");
                return PresentOutcome::Fatal;
            }
            Err(SurfaceError::Timeout) => {
                warn!("presenter surface acquisition timed out");
                return PresentOutcome::Skipped;
            }
            Err(SurfaceError::Other) => {
                warn!("presenter surface reported an unknown error; retrying");
                self.resize(window.inner_size());
                return PresentOutcome::Skipped;
            }
        };

        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(self.view_format),
            ..Default::default()
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("present-encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("present-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
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
            rpass.set_pipeline(&self.blit_pipeline);
            rpass.set_bind_group(0, &self.canvas.blit_bind, &[]);
            rpass.set_vertex_buffer(0, self.quad.slice(..));
            rpass.draw(0..4, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        window.pre_present_notify();
        frame.present();
        PresentOutcome::Presented
    }
}

fn canvas_multisample() -> wgpu::MultisampleState {
    wgpu::MultisampleState {
        count: SAMPLE_COUNT,
        mask: !0,
        alpha_to_coverage_enabled: false,
    }
}

/// `src + dst * (1 - src)` on premultiplied colour.
fn screen_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrc,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent::OVER,
    }
}

fn create_canvas(
    device: &wgpu::Device,
    blit_layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
) -> Canvas {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let msaa = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("canvas-msaa"),
        size,
        mip_level_count: 1,
        sample_count: SAMPLE_COUNT,
        dimension: wgpu::TextureDimension::D2,
        format: CANVAS_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let resolved = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("canvas"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: CANVAS_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let msaa_view = msaa.create_view(&wgpu::TextureViewDescriptor::default());
    let resolved_view = resolved.create_view(&wgpu::TextureViewDescriptor::default());
    let blit_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("blit-bind"),
        layout: blit_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&resolved_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    Canvas {
        _msaa: msaa,
        msaa_view,
        _resolved: resolved,
        resolved_view,
        blit_bind,
        size: (width, height),
    }
}

fn upload_image(device: &wgpu::Device, queue: &wgpu::Queue, image: &Arc<RgbaImage>) -> CachedImage {
    let (width, height) = image.dimensions();
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("image"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CANVAS_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        image.as_raw(),
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    debug!(width, height, "image uploaded");
    CachedImage {
        _source: Arc::clone(image),
        _texture: texture,
        view,
        last_frame: 0,
    }
}
