//! One viewer session: owns the trails, camera, and playback state for a
//! single input file and routes tagged input events onto their mutators.
//! The event enum is the only entry point, so tests drive a session by
//! injecting synthetic events instead of going through a window backend.

use std::time::{Duration, Instant};

use anyhow::Result;
use log::debug;

use crate::camera::{DragModifiers, MouseButton, OrbitCamera};
use crate::playback::{PlaybackScheduler, PlaybackState, TickOutcome};
use crate::source::{Frame, FrameSource};
use crate::trail::TrailSet;

/// Discrete key commands after backend translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Quit,
    TogglePause,
    ToggleMarker(u8),
    GrowTrail,
    ShrinkTrail,
    RotateLeft,
    RotateRight,
    TiltUp,
    TiltDown,
    ZoomIn,
    ZoomOut,
}

/// Tagged input event fed to [`ViewerSession::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key(KeyCommand),
    MouseButton {
        button: MouseButton,
        pressed: bool,
        modifiers: DragModifiers,
        x: f32,
        y: f32,
    },
    MouseMove {
        x: f32,
        y: f32,
    },
    Resize {
        width: u32,
        height: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Continue,
    Quit,
}

pub struct ViewerSession<S: FrameSource> {
    source: S,
    trails: TrailSet,
    camera: OrbitCamera,
    scheduler: PlaybackScheduler,
    last_frame: Option<Frame>,
    frames_advanced: u64,
    cursor: (f32, f32),
}

impl<S: FrameSource> ViewerSession<S> {
    pub fn new(source: S, start: Instant) -> Self {
        Self::with_palette(source, start, Vec::new())
    }

    pub fn with_palette(source: S, start: Instant, palette: Vec<[f32; 3]>) -> Self {
        let marker_count = source.num_markers();
        let frame_rate = source.frame_rate();
        let trails = if palette.is_empty() {
            TrailSet::new(marker_count)
        } else {
            TrailSet::with_palette(marker_count, palette)
        };
        Self {
            source,
            trails,
            camera: OrbitCamera::new(),
            scheduler: PlaybackScheduler::new(frame_rate, start),
            last_frame: None,
            frames_advanced: 0,
            cursor: (0.0, 0.0),
        }
    }

    pub fn trails(&self) -> &TrailSet {
        &self.trails
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.scheduler.state()
    }

    pub fn frames_advanced(&self) -> u64 {
        self.frames_advanced
    }

    /// The most recently received frame; retained after exhaustion so
    /// rendering keeps showing the final pose.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    /// Advance the session by one loop iteration: the camera integrates its
    /// drag velocity unconditionally, then at most one frame is pulled if
    /// due. Returns how long the loop may idle before the next frame is due.
    pub fn tick(&mut self, now: Instant) -> Result<Option<Duration>> {
        self.camera.tick();
        match self.scheduler.tick(now, &mut self.source)? {
            TickOutcome::Advanced(frame) => {
                for (marker, sample) in frame.points.iter().enumerate() {
                    self.trails.append(marker, sample.position);
                }
                self.frames_advanced += 1;
                self.last_frame = Some(frame);
                Ok(None)
            }
            TickOutcome::Idle(remaining) => Ok(Some(remaining)),
            TickOutcome::Paused | TickOutcome::Exhausted => Ok(None),
        }
    }

    /// Route one input event to the owning component. Only the quit key
    /// breaks the loop; everything else mutates session state in place.
    pub fn dispatch(&mut self, event: InputEvent) -> DispatchOutcome {
        match event {
            InputEvent::Key(command) => self.dispatch_key(command),
            InputEvent::MouseButton {
                button,
                pressed,
                modifiers,
                x,
                y,
            } => {
                self.cursor = (x, y);
                if pressed {
                    self.camera.begin_drag(button, modifiers, x, y);
                } else {
                    self.camera.end_drag();
                }
                DispatchOutcome::Continue
            }
            InputEvent::MouseMove { x, y } => {
                self.cursor = (x, y);
                if self.camera.dragging().is_some() {
                    self.camera.on_drag(x, y);
                }
                DispatchOutcome::Continue
            }
            InputEvent::Resize { width, height } => {
                self.camera.set_viewport(width as f32, height as f32);
                DispatchOutcome::Continue
            }
        }
    }

    fn dispatch_key(&mut self, command: KeyCommand) -> DispatchOutcome {
        match command {
            KeyCommand::Quit => return DispatchOutcome::Quit,
            KeyCommand::TogglePause => {
                self.scheduler.toggle_pause();
                debug!("playback state now {:?}", self.scheduler.state());
            }
            KeyCommand::ToggleMarker(index) => {
                // Digits past the marker count are silently ignored.
                self.trails.toggle_visible(index as usize);
            }
            KeyCommand::GrowTrail => {
                self.trails.grow();
                debug!("trail capacity now {}", self.trails.maxlen());
            }
            KeyCommand::ShrinkTrail => {
                self.trails.shrink();
                debug!("trail capacity now {}", self.trails.maxlen());
            }
            KeyCommand::RotateLeft => self.camera.step_theta(-1.0),
            KeyCommand::RotateRight => self.camera.step_theta(1.0),
            KeyCommand::TiltUp => self.camera.step_phi(-1.0),
            KeyCommand::TiltDown => self.camera.step_phi(1.0),
            KeyCommand::ZoomIn => self.camera.zoom_in(),
            KeyCommand::ZoomOut => self.camera.zoom_out(),
        }
        DispatchOutcome::Continue
    }
}
