//! Orbit camera with per-tick drag velocities. Angles are kept in degrees
//! and never wrapped or clamped; zoom is a positive scale factor driven
//! multiplicatively so continuous zoom compounds smoothly.

/// Physical mouse buttons as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragModifiers {
    pub ctrl: bool,
    pub alt: bool,
}

/// Virtual drag role after modifier remapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Rotate,
    Pan,
    Zoom,
}

/// Degrees per tick applied for arrow-key orientation steps.
pub const KEY_ROTATE_STEP_DEG: f32 = 5.0;
/// Zoom multiplier applied for page-up/page-down steps.
pub const KEY_ZOOM_FACTOR: f32 = 1.5;
/// Degrees per tick contributed by a rotate drag at full window offset.
const DRAG_ROTATE_SPEED_DEG: f32 = 4.0;
/// Softening divisor for the exponential continuous zoom.
const DRAG_ZOOM_SOFTEN: f32 = 1.3;

#[derive(Debug)]
pub struct OrbitCamera {
    /// Azimuth about the Z axis, degrees, unbounded.
    pub theta: f32,
    /// Elevation about the X axis, degrees, unbounded.
    pub phi: f32,
    /// Uniform zoom scale, positive.
    pub rho: f32,

    d_theta: f32,
    d_phi: f32,
    d_rho_factor: f32,

    viewport: (f32, f32),
    active_drag: Option<DragKind>,
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self {
            theta: 0.0,
            phi: 0.0,
            rho: 1.0,
            d_theta: 0.0,
            d_phi: 0.0,
            d_rho_factor: 1.0,
            viewport: (800.0, 600.0),
            active_drag: None,
        }
    }

    pub fn velocities(&self) -> (f32, f32, f32) {
        (self.d_theta, self.d_phi, self.d_rho_factor)
    }

    pub fn dragging(&self) -> Option<DragKind> {
        self.active_drag
    }

    /// Track the window size used to normalize drag offsets.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = (width.max(1.0), height.max(1.0));
    }

    /// Start a drag. Left+ctrl remaps to the pan button, left+alt to the
    /// zoom button; the remaps are mutually exclusive, checked in that
    /// order. Middle and right buttons are the pan/zoom buttons natively.
    pub fn begin_drag(&mut self, button: MouseButton, modifiers: DragModifiers, x: f32, y: f32) {
        let kind = match button {
            MouseButton::Left if modifiers.ctrl => DragKind::Pan,
            MouseButton::Left if modifiers.alt => DragKind::Zoom,
            MouseButton::Left => DragKind::Rotate,
            MouseButton::Middle => DragKind::Pan,
            MouseButton::Right => DragKind::Zoom,
        };
        self.active_drag = Some(kind);
        self.on_drag(x, y);
    }

    /// Recompute velocities from the cursor's offset from the viewport
    /// center. Rotation scales linearly with the offset fraction; zoom is
    /// an exponential factor applied multiplicatively each tick.
    pub fn on_drag(&mut self, x: f32, y: f32) {
        let Some(kind) = self.active_drag else {
            return;
        };
        let (width, height) = self.viewport;
        let dx = x - width / 2.0;
        let dy = y - height / 2.0;
        match kind {
            DragKind::Rotate => {
                self.d_theta = dx / width * DRAG_ROTATE_SPEED_DEG;
                self.d_phi = dy / height * DRAG_ROTATE_SPEED_DEG;
            }
            DragKind::Zoom => {
                self.d_rho_factor = (dy / height / DRAG_ZOOM_SOFTEN).exp();
            }
            // The camera model carries no pan offset; the pan button is
            // recognized but contributes no velocity.
            DragKind::Pan => {}
        }
    }

    /// Release the drag: rotation velocities go to zero and the zoom factor
    /// returns to its neutral value of one.
    pub fn end_drag(&mut self) {
        self.active_drag = None;
        self.d_theta = 0.0;
        self.d_phi = 0.0;
        self.d_rho_factor = 1.0;
    }

    /// Integrate one tick of drag velocity. Runs on every scheduler tick,
    /// whether or not a drag is active or playback is paused.
    pub fn tick(&mut self) {
        self.theta += self.d_theta;
        self.phi += self.d_phi;
        self.rho /= self.d_rho_factor;
    }

    pub fn step_theta(&mut self, direction: f32) {
        self.theta += direction * KEY_ROTATE_STEP_DEG;
    }

    pub fn step_phi(&mut self, direction: f32) {
        self.phi += direction * KEY_ROTATE_STEP_DEG;
    }

    pub fn zoom_in(&mut self) {
        self.rho *= KEY_ZOOM_FACTOR;
    }

    pub fn zoom_out(&mut self) {
        self.rho /= KEY_ZOOM_FACTOR;
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}
