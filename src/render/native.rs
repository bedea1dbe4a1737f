use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::bytes_of;
use glam::{Mat4, Vec3};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::{debug, info, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::common::{FrameUniform, MarkerUniform, SkyUniform, StaticUniform};
use super::shared::{DEFAULT_CUBE_INDICES, DEFAULT_CUBE_VERTICES, MARKER_SHADER, SKYBOX_SHADER};
use super::{
    DrawSettings, FrameUniforms, ProgramSource, RenderBackend, RenderError, StaticUniforms,
};
use crate::assets::{ModelAssets, SkyboxAssets};
use crate::lights::{PointLight, MAX_POINT_LIGHTS};
use crate::model::{ModelGeometry, TextureKey, TextureRole};
use crate::obj::{SubMesh, VERTEX_STRIDE};
use crate::state::{CullMode, FilteringMode};

const MARKER_SCALE: f32 = 0.3;
const MARKER_STRIDE: usize = 6;

/// Handle to a compiled shader variant inside [`WgpuBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    samples: u32,
    cull: CullMode,
}

/// wgpu implementation of [`RenderBackend`] drawing into a winit window.
pub struct WgpuBackend {
    window: Arc<Window>,
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    msaa_samples: u32,
    targets: FrameTargets,
    layouts: Layouts,
    samplers: HashMap<FilteringMode, wgpu::Sampler>,
    programs: Vec<ProgramResources>,
    model: Option<ModelResources>,
    markers: MarkerResources,
    sky_pipelines: HashMap<u32, wgpu::RenderPipeline>,
    skybox: Option<SkyboxResources>,
    frame: Option<PendingFrame>,
}

impl WgpuBackend {
    /// Initializes the GPU for `window`, using up to `requested_samples` for MSAA.
    pub async fn new(window: Arc<Window>, requested_samples: u32) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        // SAFETY: the surface is stored next to an `Arc` of the window and
        // both are dropped together.
        let surface = unsafe { instance.create_surface(window.as_ref()) }
            .context("failed to create window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("viewer-device"),
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no supported formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|mode| {
                    matches!(
                        mode,
                        wgpu::PresentMode::Mailbox | wgpu::PresentMode::Immediate
                    )
                })
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let msaa_samples = supported_samples(&adapter, surface_format, requested_samples);
        if msaa_samples != requested_samples {
            warn!("{requested_samples}x MSAA unsupported, using {msaa_samples}x");
        }
        info!(
            "GPU ready: {} ({:?}), format {surface_format:?}, {msaa_samples}x MSAA",
            adapter.get_info().name,
            adapter.get_info().backend
        );

        let targets = FrameTargets::create(&device, &config, 1);
        let layouts = Layouts::new(&device);
        let samplers = FilteringMode::ALL
            .into_iter()
            .map(|mode| (mode, create_sampler(&device, mode)))
            .collect();
        let markers = MarkerResources::new(&device, &layouts, surface_format, msaa_samples);
        let sky_pipelines = sample_counts(msaa_samples)
            .map(|samples| {
                (
                    samples,
                    create_sky_pipeline(&device, &layouts, surface_format, samples),
                )
            })
            .collect();

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            msaa_samples,
            targets,
            layouts,
            samplers,
            programs: Vec::new(),
            model: None,
            markers,
            sky_pipelines,
            skybox: None,
            frame: None,
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Resizes the swap chain. The camera keeps its own aspect ratio.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.targets = FrameTargets::create(&self.device, &self.config, self.targets.samples);
    }

    /// Reconfigures the surface after it was lost or became outdated.
    pub fn reconfigure(&mut self) {
        self.resize(self.size);
    }

    fn program(&self, program: ProgramId) -> Option<&ProgramResources> {
        let resources = self.programs.get(program.0);
        if resources.is_none() {
            warn!("unknown shader program {program:?}");
        }
        resources
    }

    fn create_pipeline(
        &self,
        label: &str,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
        key: PipelineKey,
    ) -> wgpu::RenderPipeline {
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{label}-layout")),
                bind_group_layouts: &[
                    &self.layouts.frame,
                    &self.layouts.statics,
                    &self.layouts.textures,
                ],
                push_constant_ranges: &[],
            });
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("{label}-{}x-{}", key.samples, key.cull.name())),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: "vs_main",
                    buffers: &[model_vertex_layout()],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: match key.cull {
                        CullMode::Back => Some(wgpu::Face::Back),
                        CullMode::Disabled => None,
                    },
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: Some(depth_state(true, wgpu::CompareFunction::Less)),
                multisample: multisample(key.samples),
                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            })
    }

    fn upload_texture(&self, label: &str, image: &RgbaImage, srgb: bool) -> wgpu::TextureView {
        let levels = mip_chain(image);
        let (width, height) = image.dimensions();
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: if srgb {
                wgpu::TextureFormat::Rgba8UnormSrgb
            } else {
                wgpu::TextureFormat::Rgba8Unorm
            },
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (level, data) in levels.iter().enumerate() {
            write_layer(&self.queue, &texture, level as u32, 0, data);
        }
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn check_dimensions(&self, what: &str, width: u32, height: u32) -> Result<(), RenderError> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > limit || height > limit {
            return Err(RenderError::Upload {
                what: what.to_string(),
                message: format!("{width}x{height} is outside 1..={limit}"),
            });
        }
        Ok(())
    }
}

impl RenderBackend for WgpuBackend {
    type Program = ProgramId;

    fn compile_program(
        &mut self,
        label: &str,
        source: &ProgramSource,
    ) -> Result<ProgramId, RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{label}-vertex")),
                source: wgpu::ShaderSource::Wgsl(source.vertex.as_str().into()),
            });
        let fragment = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{label}-fragment")),
                source: wgpu::ShaderSource::Wgsl(source.fragment.as_str().into()),
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::ShaderCompile {
                label: label.to_string(),
                message: err.to_string(),
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut pipelines = HashMap::new();
        for samples in sample_counts(self.msaa_samples) {
            for cull in [CullMode::Back, CullMode::Disabled] {
                let key = PipelineKey { samples, cull };
                let pipeline = self.create_pipeline(label, &vertex, &fragment, key);
                pipelines.insert(key, pipeline);
            }
        }
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::ShaderLink {
                label: label.to_string(),
                message: err.to_string(),
            });
        }

        let (frame_buffer, frame_bind_group) = uniform_binding(
            &self.device,
            &self.layouts.frame,
            &format!("{label}-frame"),
            std::mem::size_of::<FrameUniform>() as u64,
        );
        let (static_buffer, static_bind_group) = uniform_binding(
            &self.device,
            &self.layouts.statics,
            &format!("{label}-static"),
            std::mem::size_of::<StaticUniform>() as u64,
        );
        self.programs.push(ProgramResources {
            label: label.to_string(),
            pipelines,
            frame_buffer,
            frame_bind_group,
            static_buffer,
            static_bind_group,
        });
        debug!("Compiled shader program `{label}`");
        Ok(ProgramId(self.programs.len() - 1))
    }

    fn write_static_uniforms(&mut self, program: ProgramId, uniforms: &StaticUniforms) {
        if let Some(resources) = self.program(program) {
            let uniform = StaticUniform::from(uniforms);
            self.queue
                .write_buffer(&resources.static_buffer, 0, bytes_of(&uniform));
        }
    }

    fn write_frame_uniforms(&mut self, program: ProgramId, uniforms: &FrameUniforms) {
        if let Some(resources) = self.program(program) {
            let uniform = FrameUniform::from(uniforms);
            self.queue
                .write_buffer(&resources.frame_buffer, 0, bytes_of(&uniform));
        }
    }

    fn upload_model(
        &mut self,
        geometry: &ModelGeometry,
        assets: &ModelAssets,
    ) -> Result<(), RenderError> {
        let mesh = &assets.mesh;
        if mesh.indices.is_empty() || mesh.vertices.len() % VERTEX_STRIDE != 0 {
            return Err(RenderError::Upload {
                what: "model mesh".into(),
                message: format!(
                    "{} indices over {} floats",
                    mesh.indices.len(),
                    mesh.vertices.len()
                ),
            });
        }
        let index_count = mesh.indices.len();
        if let Some(submesh) = geometry
            .submeshes()
            .iter()
            .find(|submesh| (submesh.first_index + submesh.index_count) as usize > index_count)
        {
            return Err(RenderError::Upload {
                what: "model mesh".into(),
                message: format!(
                    "sub-mesh {} ends past {index_count} indices",
                    submesh.slot
                ),
            });
        }
        let vertex = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("model-vertices"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("model-indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let mut views = HashMap::new();
        for (key, label, image) in geometry.resolve_textures(assets)? {
            let (width, height) = image.dimensions();
            self.check_dimensions(&key.to_string(), width, height)?;
            let view = self.upload_texture(label, image, key.role.is_color());
            views.insert(key, view);
        }
        let defaults: HashMap<TextureRole, wgpu::TextureView> = TextureRole::ALL
            .into_iter()
            .map(|role| {
                let image = RgbaImage::from_pixel(1, 1, image::Rgba(default_texel(role)));
                let view = self.upload_texture(
                    &format!("default-{}", role.name()),
                    &image,
                    role.is_color(),
                );
                (role, view)
            })
            .collect();

        let mut texture_groups = HashMap::new();
        for submesh in geometry.submeshes() {
            let view_for = |role: TextureRole| {
                views
                    .get(&TextureKey::new(role, submesh.slot))
                    .or_else(|| defaults.get(&role))
            };
            let (Some(diffuse), Some(normal), Some(specular)) = (
                view_for(TextureRole::Diffuse),
                view_for(TextureRole::Normal),
                view_for(TextureRole::Specular),
            ) else {
                continue;
            };
            for (mode, sampler) in &self.samplers {
                if texture_groups.contains_key(&(submesh.slot, *mode)) {
                    continue;
                }
                let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("textures-{}-{}", submesh.slot, mode.name())),
                    layout: &self.layouts.textures,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::Sampler(sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(diffuse),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(normal),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::TextureView(specular),
                        },
                    ],
                });
                texture_groups.insert((submesh.slot, *mode), group);
            }
        }

        self.model = Some(ModelResources {
            vertex,
            index,
            submeshes: geometry.submeshes().to_vec(),
            texture_groups,
        });
        Ok(())
    }

    fn upload_skybox(&mut self, assets: &SkyboxAssets) -> Result<(), RenderError> {
        let size = assets.face_size();
        self.check_dimensions("skybox", size, size)?;
        if assets.faces.len() != 6 {
            return Err(RenderError::Upload {
                what: "skybox".into(),
                message: format!("expected 6 faces, got {}", assets.faces.len()),
            });
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("skybox"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (layer, face) in assets.faces.iter().enumerate() {
            write_layer(&self.queue, &texture, 0, layer as u32, face);
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("skybox-view"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("skybox-uniform"),
            size: std::mem::size_of::<SkyUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("skybox-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("skybox-bind-group"),
            layout: &self.layouts.sky,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
            ],
        });
        self.skybox = Some(SkyboxResources {
            buffer,
            bind_group,
            scale: assets.scale,
        });
        Ok(())
    }

    fn begin_frame(&mut self, clear_color: Vec3, antialiasing: bool) -> Result<(), RenderError> {
        if self.frame.is_some() {
            warn!("begin_frame called twice; dropping the unfinished frame");
        }
        self.frame = Some(PendingFrame {
            clear_color,
            antialiasing,
            commands: Vec::new(),
        });
        Ok(())
    }

    fn draw_skybox(&mut self, sky_projection_view: Mat4) {
        let (Some(frame), Some(skybox)) = (self.frame.as_mut(), self.skybox.as_ref()) else {
            return;
        };
        let uniform = SkyUniform::new(sky_projection_view, skybox.scale);
        self.queue
            .write_buffer(&skybox.buffer, 0, bytes_of(&uniform));
        frame.commands.push(PassCommand::Skybox);
    }

    fn draw_light_marker(&mut self, index: usize, projection_view: Mat4, light: &PointLight) {
        let (Some(frame), Some(binding)) = (self.frame.as_mut(), self.markers.bindings.get(index))
        else {
            return;
        };
        let model = Mat4::from_translation(light.position())
            * Mat4::from_scale(Vec3::splat(MARKER_SCALE));
        let uniform = MarkerUniform::new(projection_view * model, light.material.color);
        self.queue
            .write_buffer(&binding.buffer, 0, bytes_of(&uniform));
        frame.commands.push(PassCommand::Marker(index));
    }

    fn draw_model(&mut self, program: ProgramId, settings: DrawSettings) {
        if self.model.is_none() || self.program(program).is_none() {
            return;
        }
        if let Some(frame) = self.frame.as_mut() {
            frame.commands.push(PassCommand::Model { program, settings });
        }
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        let Some(frame) = self.frame.take() else {
            return Err(RenderError::Device("end_frame without begin_frame".into()));
        };
        let samples = if frame.antialiasing {
            self.msaa_samples
        } else {
            1
        };
        if self.targets.samples != samples {
            self.targets = FrameTargets::create(&self.device, &self.config, samples);
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("viewer-encoder"),
            });

        let clear = frame.clear_color;
        let (color_view, resolve_target) = match &self.targets.msaa {
            Some(msaa) => (msaa, Some(&view)),
            None => (&view, None),
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("viewer-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(clear.x),
                        g: f64::from(clear.y),
                        b: f64::from(clear.z),
                        a: 1.0,
                    }),
                    store: true,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: false,
                }),
                stencil_ops: None,
            }),
        });

        for command in &frame.commands {
            match *command {
                PassCommand::Skybox => {
                    let (Some(skybox), Some(pipeline)) =
                        (self.skybox.as_ref(), self.sky_pipelines.get(&samples))
                    else {
                        continue;
                    };
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, &skybox.bind_group, &[]);
                    self.markers.cube.draw(&mut pass);
                }
                PassCommand::Marker(index) => {
                    let (Some(binding), Some(pipeline)) = (
                        self.markers.bindings.get(index),
                        self.markers.pipelines.get(&samples),
                    ) else {
                        continue;
                    };
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, &binding.bind_group, &[]);
                    self.markers.cube.draw(&mut pass);
                }
                PassCommand::Model { program, settings } => {
                    let (Some(model), Some(resources)) =
                        (self.model.as_ref(), self.programs.get(program.0))
                    else {
                        continue;
                    };
                    let key = PipelineKey {
                        samples,
                        cull: settings.culling,
                    };
                    let Some(pipeline) = resources.pipelines.get(&key) else {
                        warn!("`{}` has no pipeline for {key:?}", resources.label);
                        continue;
                    };
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, &resources.frame_bind_group, &[]);
                    pass.set_bind_group(1, &resources.static_bind_group, &[]);
                    pass.set_vertex_buffer(0, model.vertex.slice(..));
                    pass.set_index_buffer(model.index.slice(..), wgpu::IndexFormat::Uint32);
                    for submesh in &model.submeshes {
                        let Some(textures) =
                            model.texture_groups.get(&(submesh.slot, settings.filtering))
                        else {
                            continue;
                        };
                        pass.set_bind_group(2, textures, &[]);
                        let first = submesh.first_index;
                        pass.draw_indexed(first..first + submesh.index_count, 0, 0..1);
                    }
                }
            }
        }

        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

struct PendingFrame {
    clear_color: Vec3,
    antialiasing: bool,
    commands: Vec<PassCommand>,
}

#[derive(Debug, Clone, Copy)]
enum PassCommand {
    Skybox,
    Marker(usize),
    Model {
        program: ProgramId,
        settings: DrawSettings,
    },
}

struct ProgramResources {
    label: String,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    static_buffer: wgpu::Buffer,
    static_bind_group: wgpu::BindGroup,
}

struct ModelResources {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    submeshes: Vec<SubMesh>,
    texture_groups: HashMap<(u8, FilteringMode), wgpu::BindGroup>,
}

struct SkyboxResources {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    scale: f32,
}

struct UniformBinding {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct MarkerResources {
    pipelines: HashMap<u32, wgpu::RenderPipeline>,
    bindings: Vec<UniformBinding>,
    cube: MeshBuffers,
}

impl MarkerResources {
    fn new(
        device: &wgpu::Device,
        layouts: &Layouts,
        format: wgpu::TextureFormat,
        msaa_samples: u32,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("marker-shader"),
            source: wgpu::ShaderSource::Wgsl(MARKER_SHADER.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("marker-pipeline-layout"),
            bind_group_layouts: &[&layouts.marker],
            push_constant_ranges: &[],
        });
        let pipelines = sample_counts(msaa_samples)
            .map(|samples| {
                let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(&format!("marker-pipeline-{samples}x")),
                    layout: Some(&layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: "vs_main",
                        buffers: &[position_only_layout()],
                    },
                    primitive: wgpu::PrimitiveState::default(),
                    depth_stencil: Some(depth_state(true, wgpu::CompareFunction::Less)),
                    multisample: multisample(samples),
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: "fs_main",
                        targets: &[Some(format.into())],
                    }),
                    multiview: None,
                });
                (samples, pipeline)
            })
            .collect();
        let bindings = (0..MAX_POINT_LIGHTS)
            .map(|index| {
                let (buffer, bind_group) = uniform_binding(
                    device,
                    &layouts.marker,
                    &format!("marker-{index}"),
                    std::mem::size_of::<MarkerUniform>() as u64,
                );
                UniformBinding { buffer, bind_group }
            })
            .collect();
        Self {
            pipelines,
            bindings,
            cube: MeshBuffers::cube(device),
        }
    }
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn cube(device: &wgpu::Device) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube-vertices"),
            contents: bytemuck::cast_slice(DEFAULT_CUBE_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube-indices"),
            contents: bytemuck::cast_slice(DEFAULT_CUBE_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: DEFAULT_CUBE_INDICES.len() as u32,
        }
    }

    fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        pass.set_vertex_buffer(0, self.vertex.slice(..));
        pass.set_index_buffer(self.index.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

struct Layouts {
    frame: wgpu::BindGroupLayout,
    statics: wgpu::BindGroupLayout,
    textures: wgpu::BindGroupLayout,
    marker: wgpu::BindGroupLayout,
    sky: wgpu::BindGroupLayout,
}

impl Layouts {
    fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = |label: &str, size: usize| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[uniform_entry(0, size)],
            })
        };
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
        let textures = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture-bind-layout"),
            entries: &[
                sampler_entry(0),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
            ],
        });
        let sky = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sky-bind-layout"),
            entries: &[
                uniform_entry(0, std::mem::size_of::<SkyUniform>()),
                sampler_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });
        Self {
            frame: uniform_layout("frame-bind-layout", std::mem::size_of::<FrameUniform>()),
            statics: uniform_layout("static-bind-layout", std::mem::size_of::<StaticUniform>()),
            textures,
            marker: uniform_layout("marker-bind-layout", std::mem::size_of::<MarkerUniform>()),
            sky,
        }
    }
}

/// Color and depth attachments for one sample count.
struct FrameTargets {
    samples: u32,
    depth: wgpu::TextureView,
    msaa: Option<wgpu::TextureView>,
}

impl FrameTargets {
    const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration, samples: u32) -> Self {
        let attachment = |label: &str, format: wgpu::TextureFormat| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: config.width.max(1),
                        height: config.height.max(1),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: samples,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        Self {
            samples,
            depth: attachment("depth-texture", Self::DEPTH_FORMAT),
            msaa: (samples > 1).then(|| attachment("msaa-color", config.format)),
        }
    }
}

fn uniform_entry(binding: u32, size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size as u64),
        },
        count: None,
    }
}

fn uniform_binding(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    label: &str,
    size: u64,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("{label}-uniform")),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{label}-bind-group")),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    });
    (buffer, bind_group)
}

fn create_sky_pipeline(
    device: &wgpu::Device,
    layouts: &Layouts,
    format: wgpu::TextureFormat,
    samples: u32,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("skybox-shader"),
        source: wgpu::ShaderSource::Wgsl(SKYBOX_SHADER.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("skybox-pipeline-layout"),
        bind_group_layouts: &[&layouts.sky],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("skybox-pipeline-{samples}x")),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[position_only_layout()],
        },
        primitive: wgpu::PrimitiveState::default(),
        // Drawn first and never occludes anything.
        depth_stencil: Some(depth_state(false, wgpu::CompareFunction::Always)),
        multisample: multisample(samples),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[Some(format.into())],
        }),
        multiview: None,
    })
}

fn create_sampler(device: &wgpu::Device, mode: FilteringMode) -> wgpu::Sampler {
    let (filter, mipmap_filter, anisotropy_clamp) = match mode {
        FilteringMode::Point => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest, 1),
        FilteringMode::Bilinear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest, 1),
        FilteringMode::Trilinear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear, 1),
        FilteringMode::Anisotropic => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear, 16),
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(&format!("sampler-{}", mode.name())),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter,
        anisotropy_clamp,
        ..Default::default()
    })
}

fn write_layer(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    mip_level: u32,
    layer: u32,
    data: &RgbaImage,
) {
    let (width, height) = data.dimensions();
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
            aspect: wgpu::TextureAspect::All,
        },
        data.as_raw(),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

fn model_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
    wgpu::VertexBufferLayout {
        array_stride: (VERTEX_STRIDE * std::mem::size_of::<f32>()) as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

fn position_only_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
    wgpu::VertexBufferLayout {
        array_stride: (MARKER_STRIDE * std::mem::size_of::<f32>()) as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

fn depth_state(write: bool, compare: wgpu::CompareFunction) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: FrameTargets::DEPTH_FORMAT,
        depth_write_enabled: write,
        depth_compare: compare,
        stencil: Default::default(),
        bias: Default::default(),
    }
}

fn multisample(count: u32) -> wgpu::MultisampleState {
    wgpu::MultisampleState {
        count,
        ..Default::default()
    }
}

/// Sample counts that get pipelines: single sampled plus the MSAA count.
fn sample_counts(msaa_samples: u32) -> impl Iterator<Item = u32> {
    let msaa = (msaa_samples > 1).then_some(msaa_samples);
    std::iter::once(1).chain(msaa)
}

fn supported_samples(adapter: &wgpu::Adapter, format: wgpu::TextureFormat, requested: u32) -> u32 {
    let supports = |count: u32| {
        [format, FrameTargets::DEPTH_FORMAT].into_iter().all(|format| {
            adapter
                .get_texture_format_features(format)
                .flags
                .sample_count_supported(count)
        })
    };
    let mut count = requested.max(1).next_power_of_two();
    while count > 1 && !supports(count) {
        count /= 2;
    }
    count
}

fn default_texel(role: TextureRole) -> [u8; 4] {
    match role {
        TextureRole::Diffuse => [204, 204, 204, 255],
        TextureRole::Normal => [128, 128, 255, 255],
        TextureRole::Specular => [255, 255, 255, 255],
    }
}

/// Box-filtered mip levels down to 1x1, base level first.
fn mip_chain(image: &RgbaImage) -> Vec<RgbaImage> {
    let mut levels = vec![image.clone()];
    while let Some(last) = levels.last() {
        let (width, height) = last.dimensions();
        if width <= 1 && height <= 1 {
            break;
        }
        let next = imageops::resize(
            last,
            (width / 2).max(1),
            (height / 2).max(1),
            FilterType::Triangle,
        );
        levels.push(next);
    }
    levels
}
