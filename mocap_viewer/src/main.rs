mod camera;
mod cli;
mod playback;
mod session;
mod source;
mod trail;
mod viewer;

use std::{path::Path, sync::Arc, thread, time::Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use winit::{
    dpi::LogicalSize,
    event::{ElementState, Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    platform::run_on_demand::EventLoopExtRunOnDemand,
    window::WindowBuilder,
};

use crate::camera::DragModifiers;
use crate::playback::PlaybackState;
use crate::session::{DispatchOutcome, InputEvent, KeyCommand, ViewerSession};
use crate::source::{C3dSource, FrameSource};
use crate::viewer::ViewerState;

fn main() -> Result<()> {
    env_logger::init();
    let args = cli::Args::parse();

    let palette = match args.palette.as_deref() {
        Some(path) => cli::load_palette_preset(path)?,
        None => Vec::new(),
    };

    let mut event_loop = EventLoop::new().context("creating event loop")?;

    // One interactive session per file, strictly in order. A file that
    // fails to open is reported and skipped; the rest still play.
    for path in &args.files {
        let source = match C3dSource::open(path) {
            Ok(source) => source,
            Err(err) => {
                warn!("failed to open {}: {err:#}", path.display());
                eprintln!("skipping {}: {err:#}", path.display());
                continue;
            }
        };
        info!(
            "{}: {} markers, {} frames at {} Hz",
            path.display(),
            source.num_markers(),
            source.frame_count(),
            source.frame_rate()
        );
        run_session(&mut event_loop, source, palette.clone(), path)?;
    }

    Ok(())
}

fn run_session(
    event_loop: &mut EventLoop<()>,
    source: C3dSource,
    palette: Vec<[f32; 3]>,
    path: &Path,
) -> Result<()> {
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(format!("mocap viewer - {}", path.display()))
            .with_inner_size(LogicalSize::new(800.0, 600.0))
            .build(event_loop)
            .context("creating viewer window")?,
    );
    let mut state = pollster::block_on(ViewerState::new(window.clone()))?;
    let mut session = ViewerSession::with_palette(source, Instant::now(), palette);

    let size = window.inner_size();
    session.dispatch(InputEvent::Resize {
        width: size.width,
        height: size.height,
    });

    let mut modifiers = DragModifiers::default();
    let mut cursor = (0.0f32, 0.0f32);

    event_loop.run_on_demand(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        match event {
            Event::WindowEvent {
                window_id,
                event: window_event,
            } if window_id == window.id() => match window_event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(new_size) => {
                    state.resize(new_size);
                    session.dispatch(InputEvent::Resize {
                        width: new_size.width,
                        height: new_size.height,
                    });
                }
                WindowEvent::ModifiersChanged(new_modifiers) => {
                    modifiers = DragModifiers {
                        ctrl: new_modifiers.state().control_key(),
                        alt: new_modifiers.state().alt_key(),
                    };
                }
                WindowEvent::CursorMoved { position, .. } => {
                    cursor = (position.x as f32, position.y as f32);
                    session.dispatch(InputEvent::MouseMove {
                        x: cursor.0,
                        y: cursor.1,
                    });
                }
                WindowEvent::MouseInput {
                    state: button_state,
                    button,
                    ..
                } => {
                    if let Some(button) = translate_mouse_button(button) {
                        session.dispatch(InputEvent::MouseButton {
                            button,
                            pressed: button_state == ElementState::Pressed,
                            modifiers,
                            x: cursor.0,
                            y: cursor.1,
                        });
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state == ElementState::Pressed {
                        if let Some(command) = translate_key(&event.logical_key) {
                            if session.dispatch(InputEvent::Key(command)) == DispatchOutcome::Quit
                            {
                                elwt.exit();
                            }
                        }
                    }
                }
                WindowEvent::RedrawRequested => match state.render(&session) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        state.resize(state.size());
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        error!("surface out of memory, closing session");
                        elwt.exit();
                    }
                    Err(err) => warn!("surface error: {err:?}"),
                },
                _ => {}
            },
            Event::AboutToWait => {
                match session.tick(Instant::now()) {
                    // Ahead of the frame cadence: block out the rest of the
                    // interval rather than spinning.
                    Ok(Some(remaining)) => thread::sleep(remaining),
                    Ok(None) => {}
                    Err(err) => {
                        error!("{}: frame source failed: {err:#}", path.display());
                        elwt.exit();
                    }
                }
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    match session.playback_state() {
        PlaybackState::Exhausted => info!(
            "{}: played all {} frames",
            path.display(),
            session.frames_advanced()
        ),
        _ => info!(
            "{}: closed after {} frames",
            path.display(),
            session.frames_advanced()
        ),
    }
    Ok(())
}

fn translate_key(key: &Key) -> Option<KeyCommand> {
    match key {
        Key::Named(named) => match named {
            NamedKey::Escape => Some(KeyCommand::Quit),
            NamedKey::Space => Some(KeyCommand::TogglePause),
            NamedKey::ArrowLeft => Some(KeyCommand::RotateLeft),
            NamedKey::ArrowRight => Some(KeyCommand::RotateRight),
            NamedKey::ArrowUp => Some(KeyCommand::TiltUp),
            NamedKey::ArrowDown => Some(KeyCommand::TiltDown),
            NamedKey::PageUp => Some(KeyCommand::ZoomIn),
            NamedKey::PageDown => Some(KeyCommand::ZoomOut),
            _ => None,
        },
        Key::Character(text) => {
            let mut chars = text.chars();
            let ch = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            match ch {
                'q' => Some(KeyCommand::Quit),
                '+' | '=' => Some(KeyCommand::GrowTrail),
                '-' => Some(KeyCommand::ShrinkTrail),
                '0'..='9' => Some(KeyCommand::ToggleMarker(ch as u8 - b'0')),
                _ => None,
            }
        }
        _ => None,
    }
}

fn translate_mouse_button(button: winit::event::MouseButton) -> Option<camera::MouseButton> {
    match button {
        winit::event::MouseButton::Left => Some(camera::MouseButton::Left),
        winit::event::MouseButton::Middle => Some(camera::MouseButton::Middle),
        winit::event::MouseButton::Right => Some(camera::MouseButton::Right),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_map_to_their_commands() {
        assert_eq!(
            translate_key(&Key::Named(NamedKey::Escape)),
            Some(KeyCommand::Quit)
        );
        assert_eq!(
            translate_key(&Key::Named(NamedKey::Space)),
            Some(KeyCommand::TogglePause)
        );
        assert_eq!(
            translate_key(&Key::Named(NamedKey::PageUp)),
            Some(KeyCommand::ZoomIn)
        );
        assert_eq!(translate_key(&Key::Named(NamedKey::Tab)), None);
    }

    #[test]
    fn character_keys_cover_digits_and_trail_controls() {
        assert_eq!(
            translate_key(&Key::Character("q".into())),
            Some(KeyCommand::Quit)
        );
        assert_eq!(
            translate_key(&Key::Character("7".into())),
            Some(KeyCommand::ToggleMarker(7))
        );
        assert_eq!(
            translate_key(&Key::Character("=".into())),
            Some(KeyCommand::GrowTrail)
        );
        assert_eq!(
            translate_key(&Key::Character("-".into())),
            Some(KeyCommand::ShrinkTrail)
        );
        assert_eq!(translate_key(&Key::Character("x".into())), None);
    }
}
