//! Entry point for the SceneSwap viewer.

use anyhow::Result;
use clap::Parser;
use sceneswap_viewer::{app::App, config::Config};
use std::sync::Arc;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::info!("Starting with {:?}", config);

    let (width, height) = if config.orientation.swaps_axes() {
        (540, 960)
    } else {
        (960, 540)
    };

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("SceneSwap")
            .with_inner_size(winit::dpi::LogicalSize::new(width, height))
            .build(&event_loop)?,
    );

    let mut app = pollster::block_on(App::new(window.clone(), &config))?;

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => {
                if app.handle_event(&window, &event) {
                    return;
                }
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::KeyboardInput { event, .. }
                        if event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
                    {
                        elwt.exit()
                    }
                    // Skips are counted in the compositor's stats and shown in the HUD.
                    WindowEvent::RedrawRequested => {
                        app.render(&window);
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                app.compositor.wait_idle();
            }
            _ => {}
        }
    })?;

    Ok(())
}
