//! wgpu renderer for the four-viewport marker scene. The instance list is
//! built exactly once per display tick; the four passes differ only in
//! their viewport rectangle and view-projection uniform.

use std::{borrow::Cow, sync::Arc};

use anyhow::{Context, Result};
use bytemuck::cast_slice;
use glam::{Mat4, Vec3, Vec4};
use wgpu::{SurfaceError, util::DeviceExt};
use winit::{dpi::PhysicalSize, window::Window};

use super::layout::{OrthoPlane, ViewportRect, split_window};
use super::mesh::{
    MeshInstance, MeshPrimitive, MeshVertex, SceneUniforms, axis_instance, build_cube,
    build_sphere, sphere_instance, view_projection_uniform,
};
use super::shaders::SCENE_SHADER_SOURCE;
use crate::camera::OrbitCamera;
use crate::session::ViewerSession;
use crate::source::FrameSource;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Fixed magnification of the three orthographic plane views.
const ORTHO_SCALE: f32 = 2.0;
/// Marker sphere radius at rho = 1; rendered radius is this over rho.
const MARKER_BASE_RADIUS: f32 = 0.012;
const AXIS_LENGTH: f32 = 0.45;
const AXIS_THICKNESS: f32 = 0.005;
const PERSPECTIVE_FOV_DEG: f32 = 45.0;
const PERSPECTIVE_DISTANCE: f32 = 1.6;

const AXIS_COLORS: [(Vec3, [f32; 3]); 3] = [
    (Vec3::X, [0.9, 0.25, 0.2]),
    (Vec3::Y, [0.25, 0.85, 0.3]),
    (Vec3::Z, [0.25, 0.45, 0.95]),
];

const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 0.015,
    g: 0.017,
    b: 0.022,
    a: 1.0,
};

/// Axis-aligned bounds of every position seen so far. Grows monotonically
/// so the normalization stays stable while frames stream in.
#[derive(Debug, Clone, Copy)]
struct SceneBounds {
    min: Vec3,
    max: Vec3,
}

impl SceneBounds {
    fn from_point(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Largest axis span, floored so a single static marker still maps to
    /// a finite scene.
    fn span(&self) -> f32 {
        let extent = self.max - self.min;
        extent.x.max(extent.y).max(extent.z).max(1e-3)
    }

    fn normalize(&self, point: Vec3) -> Vec3 {
        (point - self.center()) / self.span()
    }
}

struct PrimitiveBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

struct ViewportResources {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub struct ViewerState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    pipeline: wgpu::RenderPipeline,
    cube: PrimitiveBuffers,
    sphere: PrimitiveBuffers,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    viewports: [ViewportResources; 4],
    depth_view: wgpu::TextureView,
    bounds: Option<SceneBounds>,
}

impl ViewerState {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window)
            .context("creating wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .context("requesting wgpu adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("mocap-viewer-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("requesting wgpu device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let present_mode = surface_caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Mailbox)
            .unwrap_or(wgpu::PresentMode::Fifo);
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Opaque);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene-uniform-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<SceneUniforms>() as u64
                    ),
                },
                count: None,
            }],
        });

        let viewports = std::array::from_fn(|index| {
            let initial = view_projection_uniform(Mat4::IDENTITY);
            let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("viewport-uniform-buffer"),
                contents: cast_slice(&[initial]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(match index {
                    0 => "viewport-perspective",
                    1 => "viewport-ortho-xy",
                    2 => "viewport-ortho-yz",
                    _ => "viewport-ortho-xz",
                }),
                layout: &bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
            ViewportResources {
                uniform_buffer,
                bind_group,
            }
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene-shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(SCENE_SHADER_SOURCE)),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
        };

        let instance_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &wgpu::vertex_attr_array![
                2 => Float32x4,
                3 => Float32x4,
                4 => Float32x4,
                5 => Float32x4,
                6 => Float32x4,
            ],
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[vertex_layout, instance_layout],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: Some(wgpu::Face::Back),
                ..wgpu::PrimitiveState::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let cube = upload_primitive(&device, "scene-cube", build_cube());
        let sphere = upload_primitive(&device, "scene-sphere", build_sphere());

        let instance_capacity = 64usize;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene-instance-buffer"),
            size: (instance_capacity * std::mem::size_of::<MeshInstance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let depth_view = create_depth_view(&device, size);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            pipeline,
            cube,
            sphere,
            instance_buffer,
            instance_capacity,
            viewports,
            depth_view,
            bounds: None,
        })
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_view(&self.device, new_size);
    }

    /// Draw the current session state: one instance build, four passes.
    pub fn render<S: FrameSource>(
        &mut self,
        session: &ViewerSession<S>,
    ) -> Result<(), SurfaceError> {
        self.update_bounds(session);

        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("mocap-viewer-encoder"),
            });

        let instances = self.build_instances(session);
        self.ensure_instance_capacity(instances.len());
        self.queue
            .write_buffer(&self.instance_buffer, 0, cast_slice(&instances));
        let sphere_instances = instances.len() as u32 - AXIS_COLORS.len() as u32;

        let layout = split_window(self.config.width, self.config.height);
        let camera = session.camera();
        let uniforms = [
            view_projection_uniform(perspective_view_projection(
                camera,
                layout.perspective.aspect(),
            )),
            view_projection_uniform(ortho_view_projection(
                layout.ortho[0].0,
                layout.ortho[0].1.aspect(),
            )),
            view_projection_uniform(ortho_view_projection(
                layout.ortho[1].0,
                layout.ortho[1].1.aspect(),
            )),
            view_projection_uniform(ortho_view_projection(
                layout.ortho[2].0,
                layout.ortho[2].1.aspect(),
            )),
        ];
        for (resources, uniform) in self.viewports.iter().zip(uniforms) {
            self.queue
                .write_buffer(&resources.uniform_buffer, 0, cast_slice(&[uniform]));
        }

        let rects = [
            layout.perspective,
            layout.ortho[0].1,
            layout.ortho[1].1,
            layout.ortho[2].1,
        ];
        for (index, (resources, rect)) in self.viewports.iter().zip(rects).enumerate() {
            self.draw_viewport(
                &mut encoder,
                &view,
                resources,
                rect,
                index == 0,
                sphere_instances,
            );
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn update_bounds<S: FrameSource>(&mut self, session: &ViewerSession<S>) {
        let Some(frame) = session.last_frame() else {
            return;
        };
        for sample in &frame.points {
            let point = Vec3::from(sample.position);
            match self.bounds.as_mut() {
                Some(bounds) => bounds.expand(point),
                None => self.bounds = Some(SceneBounds::from_point(point)),
            }
        }
    }

    /// The shared scene: three axis gizmos plus one sphere per visible
    /// trail point, normalized into a unit-ish extent around the data
    /// center. Sphere radius shrinks with zoom so apparent size holds.
    fn build_instances<S: FrameSource>(&self, session: &ViewerSession<S>) -> Vec<MeshInstance> {
        let mut instances =
            Vec::with_capacity(AXIS_COLORS.len() + session.trails().total_points());
        for (axis, color) in AXIS_COLORS {
            instances.push(axis_instance(axis, AXIS_LENGTH, AXIS_THICKNESS, color));
        }

        let radius = MARKER_BASE_RADIUS / session.camera().rho;
        for (_, color, point) in session.trails().visible_points() {
            let position = match self.bounds.as_ref() {
                Some(bounds) => bounds.normalize(Vec3::from(point)),
                None => Vec3::from(point),
            };
            instances.push(sphere_instance(position.into(), radius, color));
        }
        instances
    }

    fn ensure_instance_capacity(&mut self, needed: usize) {
        if needed <= self.instance_capacity {
            return;
        }
        let mut capacity = self.instance_capacity.max(1);
        while capacity < needed {
            capacity *= 2;
        }
        self.instance_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene-instance-buffer"),
            size: (capacity * std::mem::size_of::<MeshInstance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.instance_capacity = capacity;
    }

    fn draw_viewport(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        resources: &ViewportResources,
        rect: ViewportRect,
        first: bool,
        sphere_instances: u32,
    ) {
        let color_load = if first {
            wgpu::LoadOp::Clear(BACKGROUND)
        } else {
            wgpu::LoadOp::Load
        };
        let depth_load = if first {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("viewport-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if rect.width < 1.0 || rect.height < 1.0 {
            return;
        }
        pass.set_viewport(rect.x, rect.y, rect.width, rect.height, 0.0, 1.0);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &resources.bind_group, &[]);
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));

        let axis_count = AXIS_COLORS.len() as u32;
        pass.set_vertex_buffer(0, self.cube.vertex.slice(..));
        pass.set_index_buffer(self.cube.index.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..self.cube.index_count, 0, 0..axis_count);

        if sphere_instances > 0 {
            pass.set_vertex_buffer(0, self.sphere.vertex.slice(..));
            pass.set_index_buffer(self.sphere.index.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(
                0..self.sphere.index_count,
                0,
                axis_count..axis_count + sphere_instances,
            );
        }
    }
}

fn upload_primitive(
    device: &wgpu::Device,
    label: &'static str,
    primitive: MeshPrimitive,
) -> PrimitiveBuffers {
    let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: cast_slice(&primitive.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: cast_slice(&primitive.indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    PrimitiveBuffers {
        vertex,
        index,
        index_count: primitive.indices.len() as u32,
    }
}

fn create_depth_view(device: &wgpu::Device, size: PhysicalSize<u32>) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("scene-depth-texture"),
        size: wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Perspective view: tilt by phi about X, spin by theta about Z, then scale
/// uniformly by rho so zoom magnifies the whole scene.
fn perspective_view_projection(camera: &OrbitCamera, aspect: f32) -> Mat4 {
    let projection = Mat4::perspective_rh(
        PERSPECTIVE_FOV_DEG.to_radians(),
        aspect.max(1e-3),
        0.01,
        100.0,
    );
    let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -PERSPECTIVE_DISTANCE))
        * Mat4::from_rotation_x(camera.phi.to_radians())
        * Mat4::from_rotation_z(camera.theta.to_radians())
        * Mat4::from_scale(Vec3::splat(camera.rho));
    projection * view
}

/// Fixed flat projection onto one coordinate plane at [`ORTHO_SCALE`]
/// magnification; camera state never enters here.
fn ortho_view_projection(plane: OrthoPlane, aspect: f32) -> Mat4 {
    let half = 0.5 / ORTHO_SCALE;
    let half_x = half * aspect.max(1e-3);
    let projection = Mat4::orthographic_rh(-half_x, half_x, -half, half, -2.0, 2.0);
    let basis = match plane {
        OrthoPlane::Xy => Mat4::IDENTITY,
        OrthoPlane::Yz => Mat4::from_cols(Vec4::Z, Vec4::X, Vec4::Y, Vec4::W),
        OrthoPlane::Xz => Mat4::from_cols(Vec4::X, Vec4::Z, Vec4::Y, Vec4::W),
    };
    projection * basis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ortho_projection_ignores_depth_axis_for_position() {
        let vp = ortho_view_projection(OrthoPlane::Xy, 1.0);
        let near = vp * Vec4::new(0.1, 0.1, 0.0, 1.0);
        let far = vp * Vec4::new(0.1, 0.1, 0.5, 1.0);
        assert!((near.x - far.x).abs() < 1e-6);
        assert!((near.y - far.y).abs() < 1e-6);
    }

    #[test]
    fn yz_plane_maps_y_to_screen_x_and_z_to_screen_y() {
        let vp = ortho_view_projection(OrthoPlane::Yz, 1.0);
        let along_y = vp * Vec4::new(0.0, 0.1, 0.0, 1.0);
        assert!(along_y.x > 0.0);
        assert!(along_y.y.abs() < 1e-6);

        let along_z = vp * Vec4::new(0.0, 0.0, 0.1, 1.0);
        assert!(along_z.y > 0.0);
        assert!(along_z.x.abs() < 1e-6);
    }

    #[test]
    fn xz_plane_maps_z_to_screen_y() {
        let vp = ortho_view_projection(OrthoPlane::Xz, 1.0);
        let along_z = vp * Vec4::new(0.0, 0.0, 0.1, 1.0);
        assert!(along_z.y > 0.0);
        let along_x = vp * Vec4::new(0.1, 0.0, 0.0, 1.0);
        assert!(along_x.x > 0.0);
    }

    #[test]
    fn ortho_scale_magnifies_twofold() {
        let vp = ortho_view_projection(OrthoPlane::Xy, 1.0);
        // A point at a quarter extent lands on the clip-space edge.
        let edge = vp * Vec4::new(0.25, 0.0, 0.0, 1.0);
        assert!((edge.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn perspective_rho_scales_apparent_offset() {
        let mut camera = OrbitCamera::new();
        let point = Vec4::new(0.1, 0.0, 0.0, 1.0);

        let baseline = perspective_view_projection(&camera, 1.0) * point;
        camera.rho = 2.0;
        let zoomed = perspective_view_projection(&camera, 1.0) * point;

        let baseline_x = baseline.x / baseline.w;
        let zoomed_x = zoomed.x / zoomed.w;
        assert!(zoomed_x > baseline_x * 1.5);
    }

    #[test]
    fn bounds_normalization_centers_the_data() {
        let mut bounds = SceneBounds::from_point(Vec3::new(100.0, 200.0, 300.0));
        bounds.expand(Vec3::new(300.0, 400.0, 500.0));
        let center = bounds.normalize(Vec3::new(200.0, 300.0, 400.0));
        assert!(center.length() < 1e-6);

        let corner = bounds.normalize(Vec3::new(300.0, 400.0, 500.0));
        assert!((corner.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn single_point_bounds_do_not_divide_by_zero() {
        let bounds = SceneBounds::from_point(Vec3::new(5.0, 5.0, 5.0));
        let normalized = bounds.normalize(Vec3::new(5.0, 5.0, 5.0));
        assert!(normalized.is_finite());
    }
}
