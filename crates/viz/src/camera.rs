//! Camera system: pan/zoom state and the screen/world transform.
//!
//! The controller keeps its own `{x, y, zoom}` in screen-pixel space (y
//! grows downward, matching cursor coordinates); one system at the end of
//! the frame maps that onto the Bevy camera transform. All mutation happens
//! through the controller, never on the transform directly.

use bevy::input::mouse::MouseWheel;
use bevy::prelude::*;
use bevy::window::CursorLeft;

/// Zoom bounds; a wheel result outside this range is clamped, never dropped.
pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 5.0;

/// Per-wheel-tick zoom factors.
pub const WHEEL_ZOOM_OUT: f32 = 0.9;
pub const WHEEL_ZOOM_IN: f32 = 1.1;

/// Plugin for camera control and movement.
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraController>()
            .init_resource::<ContentSize>()
            .add_systems(Startup, setup_camera)
            .add_systems(
                Update,
                (
                    handle_mouse_input,
                    handle_keyboard_pan,
                    apply_camera_to_transform,
                )
                    .chain(),
            );
    }
}

/// Drag is a two-state machine; pointer-leave releases it so a drag can
/// never get stuck when the cursor exits the window mid-press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Dragging { last: Vec2 },
}

/// Main camera controller resource.
#[derive(Resource, Debug)]
pub struct CameraController {
    /// Screen-space translation of the world origin, in pixels.
    pub x: f32,
    pub y: f32,
    /// Zoom scalar, always within [`MIN_ZOOM`, `MAX_ZOOM`].
    pub zoom: f32,
    pub drag: DragState,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
            drag: DragState::Idle,
        }
    }
}

impl CameraController {
    /// Translates the view by a screen-space delta.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    /// Multiplies zoom by `factor`, clamping the result.
    pub fn zoom_by(&mut self, factor: f32) {
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Zooms while keeping the world point under `cursor` fixed on screen.
    pub fn zoom_at(&mut self, cursor: Vec2, factor: f32) {
        let old_zoom = self.zoom;
        self.zoom_by(factor);
        let ratio = self.zoom / old_zoom;
        // screen = world * zoom + offset; holding `cursor` fixed across the
        // zoom change gives offset' = cursor - (cursor - offset) * ratio.
        self.x = cursor.x - (cursor.x - self.x) * ratio;
        self.y = cursor.y - (cursor.y - self.y) * ratio;
    }

    /// World (y-down pixel) coordinates to screen coordinates.
    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        world * self.zoom + Vec2::new(self.x, self.y)
    }

    /// Screen coordinates back to world coordinates.
    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        (screen - Vec2::new(self.x, self.y)) / self.zoom
    }

    /// Resets zoom to 1.0 and translates so the content rect is centered in
    /// the viewport.
    pub fn center(&mut self, content_w: f32, content_h: f32, viewport_w: f32, viewport_h: f32) {
        self.zoom = 1.0;
        self.x = (viewport_w - content_w) / 2.0;
        self.y = (viewport_h - content_h) / 2.0;
    }

    /// True while a drag is in progress.
    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Dragging { .. })
    }
}

/// Pixel size of the currently loaded content, kept up to date by the map
/// renderer so Home centering knows what to frame.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct ContentSize {
    pub width: f32,
    pub height: f32,
}

/// Converts a y-down world-pixel position into a Bevy world translation.
pub fn world_to_bevy(world: Vec2, z: f32) -> Vec3 {
    Vec3::new(world.x, -world.y, z)
}

/// Marker component for the main camera.
#[derive(Component)]
pub struct MainCamera;

fn setup_camera(mut commands: Commands) {
    commands.spawn((Camera2dBundle::default(), MainCamera));
}

/// System handling drag-to-pan and wheel zoom.
fn handle_mouse_input(
    mut controller: ResMut<CameraController>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut cursor_moved: EventReader<CursorMoved>,
    mut cursor_left: EventReader<CursorLeft>,
    mut scroll: EventReader<MouseWheel>,
    windows: Query<&Window>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };

    if mouse_button.just_pressed(MouseButton::Left) {
        if let Some(cursor) = window.cursor_position() {
            controller.drag = DragState::Dragging { last: cursor };
        }
    }
    if mouse_button.just_released(MouseButton::Left) || cursor_left.read().next().is_some() {
        controller.drag = DragState::Idle;
    }

    for moved in cursor_moved.read() {
        if let DragState::Dragging { last } = controller.drag {
            let delta = moved.position - last;
            controller.pan(delta.x, delta.y);
            controller.drag = DragState::Dragging {
                last: moved.position,
            };
        }
    }

    for ev in scroll.read() {
        let factor = if ev.y < 0.0 {
            WHEEL_ZOOM_OUT
        } else {
            WHEEL_ZOOM_IN
        };
        match window.cursor_position() {
            Some(cursor) => controller.zoom_at(cursor, factor),
            None => controller.zoom_by(factor),
        }
    }
}

/// Arrow-key panning and Home to re-center on the content.
fn handle_keyboard_pan(
    mut controller: ResMut<CameraController>,
    content: Res<ContentSize>,
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    windows: Query<&Window>,
) {
    let shift_held = keyboard.pressed(KeyCode::ShiftLeft) || keyboard.pressed(KeyCode::ShiftRight);
    let speed = if shift_held { 800.0 } else { 400.0 };
    let step = speed * time.delta_seconds();

    let mut delta = Vec2::ZERO;
    if keyboard.pressed(KeyCode::ArrowLeft) {
        delta.x += step;
    }
    if keyboard.pressed(KeyCode::ArrowRight) {
        delta.x -= step;
    }
    if keyboard.pressed(KeyCode::ArrowUp) {
        delta.y += step;
    }
    if keyboard.pressed(KeyCode::ArrowDown) {
        delta.y -= step;
    }
    if delta != Vec2::ZERO {
        controller.pan(delta.x, delta.y);
    }

    if keyboard.just_pressed(KeyCode::Home) {
        if let Ok(window) = windows.get_single() {
            controller.center(
                content.width,
                content.height,
                window.width(),
                window.height(),
            );
        }
    }
}

/// Maps the controller onto the Bevy camera transform.
///
/// The controller's screen space has its origin at the window's top-left
/// with y down; the Bevy camera sits at whatever world point lands on the
/// window center.
fn apply_camera_to_transform(
    controller: Res<CameraController>,
    windows: Query<&Window>,
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };
    let center = controller.screen_to_world(Vec2::new(window.width(), window.height()) / 2.0);

    for mut transform in camera_query.iter_mut() {
        transform.translation.x = center.x;
        transform.translation.y = -center.y;
        let scale = 1.0 / controller.zoom;
        transform.scale = Vec3::new(scale, scale, 1.0);
    }
}
