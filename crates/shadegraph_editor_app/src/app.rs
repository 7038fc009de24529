// SPDX-License-Identifier: MIT OR Apache-2.0
//! Windowed editor application setup and event loop.

use crate::config::AppConfig;
use crate::replay::ReplayError;
use crate::store::FileMaterialStore;
use crate::watcher::{MaterialWatcher, WATCH_DEBOUNCE};
use egui_wgpu::wgpu;
use shadegraph_editor_graph::node::MIN_NODE_WIDTH;
use shadegraph_editor_graph::{
    ui, EditorError, MaterialGraphEditor, NodeCategory, NodeId, NodeKind, NodeRegistry, PropertyValue,
    SurfaceCompiler, SystemClock,
};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

/// How long a status message stays visible
const STATUS_TIMEOUT: Duration = Duration::from_secs(4);

/// Application errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Window creation failed
    #[error("Failed to create window: {0}")]
    WindowCreation(String),

    /// Renderer initialization failed
    #[error("Failed to initialize renderer: {0}")]
    RendererInit(String),

    /// Event loop error
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    /// Editor error
    #[error(transparent)]
    Editor(#[from] EditorError),

    /// Replay error
    #[error(transparent)]
    Replay(#[from] ReplayError),
}

/// Result type for application operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Last status message reported by the editor
#[derive(Debug, Clone)]
struct StatusLine {
    message: String,
    is_error: bool,
    at: Instant,
}

type SharedStatus = Rc<RefCell<Option<StatusLine>>>;

/// Status sink that logs and keeps the latest message for the status bar
fn status_sink(shared: &SharedStatus) -> impl FnMut(&str, bool) + 'static {
    let shared = Rc::clone(shared);
    move |message: &str, is_error: bool| {
        if is_error {
            tracing::warn!("{message}");
        } else {
            tracing::debug!("{message}");
        }
        *shared.borrow_mut() = Some(StatusLine {
            message: message.to_string(),
            is_error,
            at: Instant::now(),
        });
    }
}

/// Graphics state for wgpu rendering
struct GraphicsState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    egui_renderer: egui_wgpu::Renderer,
}

impl GraphicsState {
    fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| AppError::RendererInit(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| AppError::RendererInit("no suitable GPU adapter".to_string()))?;

        tracing::info!("Using GPU: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("ShadeGraph Editor Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            },
            None,
        ))
        .map_err(|e| AppError::RendererInit(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(wgpu::TextureFormat::is_srgb)
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| AppError::RendererInit("surface reports no formats".to_string()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            egui_renderer,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn render(
        &mut self,
        egui_ctx: &egui::Context,
        full_output: egui::FullOutput,
        window: &Window,
    ) -> std::result::Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Editor Encoder"),
        });

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        let paint_jobs = egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Editor Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color {
                                r: 0.1,
                                g: 0.1,
                                b: 0.1,
                                a: 1.0,
                            }),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();

            self.egui_renderer.render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        Ok(())
    }
}

/// The open material and its panels
struct EditorSession {
    editor: MaterialGraphEditor,
    registry: Arc<NodeRegistry>,
    watcher: Option<MaterialWatcher>,
    status: SharedStatus,
    /// Canvas rectangle of the previous frame
    canvas: Option<egui::Rect>,
    /// Width typed or dragged in the inspector, applied when the edit settles
    pending_width: Option<(NodeId, f32)>,
    /// Name being typed in the inspector
    pending_name: Option<(NodeId, String)>,
}

impl EditorSession {
    fn open(config: &AppConfig, material: &Path) -> Result<Self> {
        let registry = Arc::new(NodeRegistry::new());
        let status = SharedStatus::default();
        let editor = MaterialGraphEditor::open(
            config.editor_settings(),
            Arc::clone(&registry),
            Box::new(FileMaterialStore::new(material)),
            Some(Box::new(SurfaceCompiler::new(Arc::clone(&registry)))),
            Box::new(status_sink(&status)),
            Rc::new(SystemClock),
        )?;

        let watcher = if config.watch_material {
            MaterialWatcher::new(material, WATCH_DEBOUNCE)
                .map_err(|e| tracing::warn!("Material watching disabled: {e}"))
                .ok()
        } else {
            None
        };

        Ok(Self {
            editor,
            registry,
            watcher,
            status,
            canvas: None,
            pending_width: None,
            pending_name: None,
        })
    }

    fn set_status(&self, message: String, is_error: bool) {
        *self.status.borrow_mut() = Some(StatusLine {
            message,
            is_error,
            at: Instant::now(),
        });
    }

    fn update(&mut self, ctx: &egui::Context) {
        if self.watcher.as_ref().is_some_and(MaterialWatcher::poll) {
            match self.editor.reload() {
                Ok(true) => self.set_status("Reloaded from disk".to_string(), false),
                Ok(false) => {}
                Err(err) => self.set_status(format!("Error reloading: {err}"), true),
            }
        }

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                self.file_menu(ui);
                self.edit_menu(ui);
            });
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| self.status_bar(ui));

        egui::SidePanel::left("palette")
            .resizable(false)
            .default_width(150.0)
            .show(ctx, |ui| self.palette(ui));

        egui::SidePanel::right("inspector")
            .default_width(240.0)
            .show(ctx, |ui| self.inspector(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::from_rgb(30, 30, 32)))
            .show(ctx, |ui| {
                let response = ui::show(ui, &mut self.editor);
                self.canvas = Some(response.rect);
            });
    }

    fn file_menu(&mut self, ui: &mut egui::Ui) {
        ui.menu_button("File", |ui| {
            if ui.button("Save").clicked() {
                if let Err(err) = self.editor.save_now() {
                    tracing::error!("Failed to save material: {err}");
                }
                ui.close_menu();
            }
            if ui.button("Reload").clicked() {
                match self.editor.reload() {
                    Ok(true) => self.set_status("Reloaded from disk".to_string(), false),
                    Ok(false) => self.set_status("Already up to date".to_string(), false),
                    Err(err) => self.set_status(format!("Error reloading: {err}"), true),
                }
                ui.close_menu();
            }
        });
    }

    fn edit_menu(&mut self, ui: &mut egui::Ui) {
        ui.menu_button("Edit", |ui| {
            if ui.add_enabled(self.editor.can_undo(), egui::Button::new("Undo")).clicked() {
                self.editor.undo();
                ui.close_menu();
            }
            if ui.add_enabled(self.editor.can_redo(), egui::Button::new("Redo")).clicked() {
                self.editor.redo();
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Reset view").clicked() {
                self.editor.controller_mut().view_mut().reset();
                ui.close_menu();
            }
        });
    }

    fn status_bar(&mut self, ui: &mut egui::Ui) {
        let status = self.status.borrow().clone();
        ui.horizontal(|ui| match status {
            Some(line) if line.is_error || line.at.elapsed() < STATUS_TIMEOUT => {
                let color = if line.is_error {
                    egui::Color32::from_rgb(230, 90, 90)
                } else {
                    egui::Color32::from_gray(170)
                };
                ui.label(egui::RichText::new(line.message).color(color));
            }
            _ => {
                ui.label(egui::RichText::new("Ready").color(egui::Color32::from_gray(120)));
            }
        });
    }

    /// World position at the center of the canvas
    fn canvas_center(&self) -> [f32; 2] {
        let center = self
            .canvas
            .map_or(egui::Pos2::new(300.0, 200.0), |rect| (rect.size() / 2.0).to_pos2());
        let world = self.editor.controller().view().screen_to_world(center);
        [world.x, world.y]
    }

    fn palette(&mut self, ui: &mut egui::Ui) {
        let categories = [
            (NodeCategory::Input, "Input"),
            (NodeCategory::Texture, "Texture"),
            (NodeCategory::Math, "Math"),
        ];
        let mut chosen: Option<NodeKind> = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for (category, title) in categories {
                ui.heading(title);
                for kind in self.registry.types_in_category(category) {
                    let schema = self.registry.describe(kind);
                    if ui.button(&schema.name).on_hover_text(&schema.description).clicked() {
                        chosen = Some(kind);
                    }
                }
                ui.add_space(8.0);
            }
        });
        if let Some(kind) = chosen {
            let position = self.canvas_center();
            self.editor.add_node(kind, position);
        }
    }

    fn inspector(&mut self, ui: &mut egui::Ui) {
        ui.heading("Properties");
        ui.separator();

        let Some(id) = self.editor.selection() else {
            ui.label("No node selected");
            return;
        };
        let Some(node) = self.editor.graph().node(id) else {
            return;
        };

        let schema = self.registry.describe(node.kind);
        ui.label(egui::RichText::new(&schema.description).italics());
        ui.add_space(4.0);

        let mut edits: Vec<(String, PropertyValue)> = Vec::new();
        let mut width_settled = None;
        let mut name_settled = None;

        egui::Grid::new("node_properties").num_columns(2).show(ui, |ui| {
            ui.label("Name");
            let name = match &self.pending_name {
                Some((pending, name)) if *pending == id => name.clone(),
                _ => self.registry.display_name(node).to_string(),
            };
            let mut buffer = name;
            let response = ui.text_edit_singleline(&mut buffer);
            if response.changed() {
                self.pending_name = Some((id, buffer.clone()));
            }
            if response.lost_focus() {
                name_settled = self.pending_name.take().filter(|(pending, _)| *pending == id).map(|(_, name)| name);
            }
            ui.end_row();

            ui.label("Width");
            let mut width = match self.pending_width {
                Some((pending, width)) if pending == id => width,
                _ => node.width,
            };
            let response = ui.add(egui::DragValue::new(&mut width).range(MIN_NODE_WIDTH..=640.0));
            if response.changed() {
                self.pending_width = Some((id, width));
            }
            if !response.dragged() && !response.has_focus() {
                width_settled = self.pending_width.take().filter(|(pending, _)| *pending == id).map(|(_, width)| width);
            }
            ui.end_row();

            for (key, value) in &node.properties {
                ui.label(key);
                let mut edited = value.clone();
                match property_widget(ui, &mut edited) {
                    Some(response) if response.changed() => edits.push((key.clone(), edited)),
                    Some(_) => {}
                    None => {
                        ui.label(egui::RichText::new("(unsupported)").weak());
                    }
                }
                ui.end_row();
            }
        });

        if let Some(name) = name_settled {
            let default_name = &schema.name;
            let name = (!name.is_empty() && name != *default_name).then_some(name);
            self.editor.rename_node(id, name);
        }
        if let Some(width) = width_settled {
            self.editor.resize_node(id, width);
        }
        for (key, value) in edits {
            self.editor.edit_property(id, &key, value);
        }

        let ctx = ui.ctx();
        if !ctx.is_using_pointer() && !ctx.wants_keyboard_input() {
            self.editor.commit_property_edit();
        }
    }

    fn close(&mut self) {
        if let Err(err) = self.editor.close() {
            tracing::error!("Failed to save material on close: {err}");
        }
    }
}

fn vector_widget<const N: usize>(ui: &mut egui::Ui, values: &mut [f32; N]) -> Option<egui::Response> {
    ui.horizontal(|ui| {
        values
            .iter_mut()
            .map(|v| ui.add(egui::DragValue::new(v).speed(0.01)))
            .reduce(|a, b| a.union(b))
    })
    .inner
}

/// Editing widget for one property value; `None` if the value isn't editable
fn property_widget(ui: &mut egui::Ui, value: &mut PropertyValue) -> Option<egui::Response> {
    match value {
        PropertyValue::Bool(v) => Some(ui.checkbox(v, "")),
        PropertyValue::Int(v) => Some(ui.add(egui::DragValue::new(v))),
        PropertyValue::Float(v) => Some(ui.add(egui::DragValue::new(v).speed(0.01))),
        PropertyValue::Vec2(v) => vector_widget(ui, v),
        PropertyValue::Vec3(v) => vector_widget(ui, v),
        PropertyValue::Vec4(v) => vector_widget(ui, v),
        PropertyValue::Color(v) => Some(ui.color_edit_button_rgba_unmultiplied(v)),
        PropertyValue::Text(v) => Some(ui.text_edit_singleline(v)),
        PropertyValue::Opaque(_) => None,
    }
}

/// Running state of the application
struct Running {
    window: Arc<Window>,
    graphics: GraphicsState,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
}

/// Windowed material graph editor
pub struct ShadeGraphApp {
    config: AppConfig,
    session: EditorSession,
    running: Option<Running>,
    error: Option<AppError>,
}

impl ShadeGraphApp {
    /// Open `material` and prepare the application
    pub fn new(config: AppConfig, material: &Path) -> Result<Self> {
        let session = EditorSession::open(&config, material)?;
        Ok(Self {
            config,
            session,
            running: None,
            error: None,
        })
    }

    /// Run the event loop until the window closes
    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Wait);
        event_loop.run_app(&mut self)?;
        self.session.close();

        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<Running> {
        let [width, height] = self.config.window_size;
        let window_attrs = Window::default_attributes()
            .with_title("ShadeGraph Editor")
            .with_inner_size(winit::dpi::LogicalSize::new(width, height))
            .with_min_inner_size(winit::dpi::LogicalSize::new(640, 400));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(|e| AppError::WindowCreation(e.to_string()))?,
        );

        let graphics = GraphicsState::new(Arc::clone(&window))?;
        let egui_ctx = egui::Context::default();
        egui_ctx.set_visuals(egui::Visuals::dark());

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &window,
            Some(window.scale_factor() as f32),
            None,
            Some(2 * 1024),
        );

        tracing::info!("Window size: {:?}", window.inner_size());
        Ok(Running {
            window,
            graphics,
            egui_ctx,
            egui_state,
        })
    }
}

impl ApplicationHandler for ShadeGraphApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }

        match self.start(event_loop) {
            Ok(running) => self.running = Some(running),
            Err(err) => {
                tracing::error!("{err}");
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(running) = &mut self.running else {
            return;
        };

        let response = running.egui_state.on_window_event(&running.window, &event);
        if response.repaint {
            running.window.request_redraw();
        }
        if response.consumed {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Close requested, exiting...");
                self.session.close();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                running.graphics.resize(new_size);
                running.window.request_redraw();
            }
            WindowEvent::RedrawRequested => {
                let raw_input = running.egui_state.take_egui_input(&running.window);
                let session = &mut self.session;
                let full_output = running.egui_ctx.run(raw_input, |ctx| session.update(ctx));

                running
                    .egui_state
                    .handle_platform_output(&running.window, full_output.platform_output.clone());

                let repaint_delay = full_output
                    .viewport_output
                    .get(&egui::ViewportId::ROOT)
                    .map(|viewport| viewport.repaint_delay);

                match running.graphics.render(&running.egui_ctx, full_output, &running.window) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = running.window.inner_size();
                        running.graphics.resize(size);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        tracing::error!("Out of GPU memory!");
                        self.session.close();
                        event_loop.exit();
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        tracing::warn!("Surface timeout");
                    }
                }

                match repaint_delay {
                    Some(delay) if delay.is_zero() => running.window.request_redraw(),
                    Some(delay) if delay < Duration::MAX => {
                        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + delay));
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let (ControlFlow::WaitUntil(deadline), Some(running)) = (event_loop.control_flow(), &self.running) {
            if Instant::now() >= deadline {
                event_loop.set_control_flow(ControlFlow::Wait);
                running.window.request_redraw();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.session.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_sink_keeps_latest_message() {
        let shared = SharedStatus::default();
        let mut sink = status_sink(&shared);
        sink("Autosaving…", false);
        sink("Error saving: disk full", true);

        let line = shared.borrow().clone().unwrap();
        assert_eq!(line.message, "Error saving: disk full");
        assert!(line.is_error);
    }

    #[test]
    fn test_session_opens_missing_material() {
        let dir = std::env::temp_dir().join(format!("shadegraph_app_{}", std::process::id()));
        let config = AppConfig {
            watch_material: false,
            ..AppConfig::default()
        };
        let mut session = EditorSession::open(&config, &dir.join("material.json")).unwrap();
        assert_eq!(session.editor.graph().node_count(), 1);
        assert!(session.watcher.is_none());

        session.close();
        let written = dir.join("material.json").exists();
        std::fs::remove_dir_all(&dir).ok();
        assert!(written);
    }
}
