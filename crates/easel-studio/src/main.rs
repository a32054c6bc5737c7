//! Easel studio: renders the demo scene on a selected backend.
//!
//! ```text
//! easel-studio [--backend canvas2d|webgl|webgl2|webgpu] [--font FILE] [--out FILE.png]
//! ```
//!
//! Without `--backend` the `EASEL_BACKEND` variable is consulted, then the
//! capability selector. The CPU backend renders one frame headless and writes
//! it to `--out`; the GPU backends open a window.

mod scene;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use easel_engine::logging::{init_logging, LoggingConfig};
use easel_engine::select::{self, forced_from_env};
use easel_engine::text::{Font, FontSystem};
use easel_engine::{
    create_renderer, BackendKind, OffscreenHost, Renderer, RendererConfig, SelectorConfig,
    WindowHost,
};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use scene::Scene;

const WIDTH: f32 = 820.0;
const HEIGHT: f32 = 560.0;

#[derive(Debug, Default)]
struct Args {
    backend: Option<BackendKind>,
    font: Option<PathBuf>,
    out: Option<PathBuf>,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = Args::default();
        let mut it = std::env::args().skip(1);

        while let Some(flag) = it.next() {
            let mut value = || it.next().with_context(|| format!("{flag} needs a value"));
            match flag.as_str() {
                "--backend" => args.backend = Some(value()?.parse()?),
                "--font" => args.font = Some(value()?.into()),
                "--out" => args.out = Some(value()?.into()),
                other => bail!("unknown argument {other:?}"),
            }
        }
        Ok(args)
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());
    let args = Args::parse()?;

    let mut fonts = FontSystem::new();
    let font = match &args.font {
        Some(path) => {
            let id = fonts
                .load_font_file(path)
                .with_context(|| format!("loading font {}", path.display()))?;
            Some(Font::new(id, 20.0))
        }
        None => None,
    };
    let config = RendererConfig::with_fonts(Arc::new(fonts));

    let forced = args.backend.or_else(forced_from_env);
    let selection = select::choose(forced, &SelectorConfig::default());
    if let Some(report) = &selection.report {
        log::info!("host: {report}");
    }

    let scene = Scene::new(font);
    match selection.backend {
        BackendKind::Canvas2d => {
            let out = args.out.unwrap_or_else(|| PathBuf::from("easel.png"));
            render_headless(&scene, config, &out)
        }
        kind => run_windowed(kind, scene, config),
    }
}

/// Renders one CPU frame and writes it to `out`.
fn render_headless(scene: &Scene, config: RendererConfig, out: &PathBuf) -> Result<()> {
    let host = Arc::new(OffscreenHost::new(WIDTH, HEIGHT));
    let mut renderer = easel_engine::backend::canvas::CanvasRenderer::new(host, config)?;
    pollster::block_on(renderer.init())?;

    scene.load(&mut renderer)?;
    scene.draw(&mut renderer, 0.0)?;

    let image = renderer
        .backend()
        .snapshot()
        .context("canvas has no backing store")?;
    image
        .save(out)
        .with_context(|| format!("writing {}", out.display()))?;
    log::info!("wrote {}", out.display());
    Ok(())
}

fn run_windowed(kind: BackendKind, scene: Scene, config: RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut studio = Studio {
        kind,
        scene,
        config,
        window: None,
        started: Instant::now(),
        failed: None,
    };

    event_loop
        .run_app(&mut studio)
        .context("winit event loop terminated with error")?;

    match studio.failed {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct StudioWindow {
    host: Arc<WindowHost>,
    renderer: Box<dyn Renderer>,
}

struct Studio {
    kind: BackendKind,
    scene: Scene,
    config: RendererConfig,
    window: Option<StudioWindow>,
    started: Instant,
    failed: Option<anyhow::Error>,
}

impl Studio {
    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<StudioWindow> {
        let attrs = Window::default_attributes()
            .with_title(format!("easel studio ({})", self.kind))
            .with_inner_size(LogicalSize::new(WIDTH as f64, HEIGHT as f64));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let host = Arc::new(WindowHost::new(window));
        let mut renderer = create_renderer(self.kind, host.clone(), self.config.clone())?;
        renderer.set_auto_resize(true);
        pollster::block_on(renderer.init())?;
        self.scene.load(renderer.as_mut())?;

        Ok(StudioWindow { host, renderer })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        log::error!("{e:#}");
        self.failed = Some(e);
        event_loop.exit();
    }
}

impl ApplicationHandler for Studio {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match self.open(event_loop) {
            Ok(window) => {
                window.host.window().request_redraw();
                self.window = Some(window);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(window) = &self.window {
            window.host.window().request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.as_mut() else { return };

        match event {
            WindowEvent::CloseRequested => {
                self.window = None;
                event_loop.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                window.host.notify_resized();
                window.host.window().request_redraw();
            }
            WindowEvent::RedrawRequested => {
                let t = self.started.elapsed().as_secs_f32();
                if let Err(e) = self.scene.draw(window.renderer.as_mut(), t) {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }
}
