#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Macroquad-backed rendering adapter for Swarasync.
//!
//! Macroquad's optional audio stack depends on native ALSA development
//! libraries, which are unavailable in the containerised CI environment.
//! To keep `cargo test` usable everywhere we depend on macroquad without its
//! default `audio` feature.
//!
//! The mandala, breath ring and nodes are painted through the shared
//! [`swarasync_rendering::render_frame`] routine; the control panel uses
//! Macroquad's immediate-mode UI, and all UI-specific calls live inside the
//! local `ui` module.

mod canvas;
mod ui;

use self::{
    canvas::MacroquadCanvas,
    ui::{draw_control_panel_ui, ControlPanelUiContext, ControlPanelUiResult},
};
use anyhow::Result;
use glam::Vec2;
use macroquad::input::{
    is_key_down, is_key_pressed, is_mouse_button_down, is_mouse_button_pressed,
    is_mouse_button_released, mouse_position, KeyCode, MouseButton,
};
use std::time::{Duration, Instant};
use swarasync_rendering::{
    render_frame, Color, FrameInput, Presentation, RenderingBackend, Scene,
};

/// Width of the control panel docked on the right edge.
const CONTROL_PANEL_WIDTH: f32 = 240.0;

/// Tracks UI-sourced interactions so they can be merged with physical input on the next frame.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ControlPanelInputState {
    pause_latched: bool,
    reset_latched: bool,
    path_latched: bool,
    export_latched: bool,
}

impl ControlPanelInputState {
    /// Returns whether the UI requested a pause toggle and clears the latch.
    pub fn take_pause_toggle(&mut self) -> bool {
        std::mem::take(&mut self.pause_latched)
    }

    /// Records that the pause button was pressed this frame.
    pub fn register_pause_toggle(&mut self) {
        self.pause_latched = true;
    }

    /// Returns whether the UI requested a reset and clears the latch.
    pub fn take_reset(&mut self) -> bool {
        std::mem::take(&mut self.reset_latched)
    }

    /// Records that the reset button was pressed this frame.
    pub fn register_reset(&mut self) {
        self.reset_latched = true;
    }

    /// Returns whether the UI requested a breath-path change and clears the latch.
    pub fn take_cycle_path(&mut self) -> bool {
        std::mem::take(&mut self.path_latched)
    }

    /// Records that the breath-path button was pressed this frame.
    pub fn register_cycle_path(&mut self) {
        self.path_latched = true;
    }

    /// Returns whether the UI requested an export and clears the latch.
    pub fn take_export(&mut self) -> bool {
        std::mem::take(&mut self.export_latched)
    }

    /// Records that the export button was pressed this frame.
    pub fn register_export(&mut self) {
        self.export_latched = true;
    }

    fn register(&mut self, result: ControlPanelUiResult) {
        if result.pause_pressed {
            self.register_pause_toggle();
        }
        if result.reset_pressed {
            self.register_reset();
        }
        if result.path_pressed {
            self.register_cycle_path();
        }
        if result.export_pressed {
            self.register_export();
        }
    }
}

/// Start and end edges of the primary press for one frame.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PressEdges {
    /// The press went down this frame.
    pub started: bool,
    /// The press went up this frame.
    pub ended: bool,
}

/// Turns Space and pointer observations into press edges.
///
/// Space is read as a level; the pointer only counts when it went down over
/// the mandala, so clicks on the control panel never start a breath.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, Default)]
pub struct PressTracker {
    pointer_held: bool,
    holding: bool,
}

impl PressTracker {
    /// Folds one frame of observations into press edges.
    pub fn update(
        &mut self,
        key_down: bool,
        pointer_pressed_in_scene: bool,
        pointer_released: bool,
    ) -> PressEdges {
        if pointer_pressed_in_scene {
            self.pointer_held = true;
        }
        let quick_click = pointer_pressed_in_scene && pointer_released;
        if pointer_released {
            self.pointer_held = false;
        }

        let down = key_down || self.pointer_held;
        let mut edges = PressEdges {
            started: down && !self.holding,
            ended: !down && self.holding,
        };
        if quick_click && !down && !self.holding {
            edges = PressEdges {
                started: true,
                ended: true,
            };
        }
        self.holding = down;
        edges
    }

    /// Whether a press is currently held.
    #[must_use]
    pub fn is_holding(&self) -> bool {
        self.holding
    }
}

/// Snapshot of edge-triggered keyboard shortcuts observed during a single frame.
#[derive(Clone, Copy, Debug, Default)]
struct KeyboardShortcuts {
    /// `Q` or `Escape` to quit the game loop.
    quit_requested: bool,
    /// Space held as the breath button.
    breath_held: bool,
    /// `P` toggles pause.
    pause_toggle: bool,
    /// `R` resets the round or session.
    reset: bool,
    /// `B` cycles the breath path.
    cycle_path: bool,
    /// `E` exports the mandala.
    export: bool,
}

impl KeyboardShortcuts {
    fn poll() -> Self {
        Self {
            quit_requested: is_key_pressed(KeyCode::Escape) || is_key_pressed(KeyCode::Q),
            breath_held: is_key_down(KeyCode::Space),
            pause_toggle: is_key_pressed(KeyCode::P),
            reset: is_key_pressed(KeyCode::R),
            cycle_path: is_key_pressed(KeyCode::B),
            export: is_key_pressed(KeyCode::E),
        }
    }
}

/// Pointer state observed during a single frame.
#[derive(Clone, Copy, Debug, Default)]
struct PointerObservation {
    position: Vec2,
    pressed: bool,
    released: bool,
}

impl PointerObservation {
    fn poll() -> Self {
        let (x, y) = mouse_position();
        Self {
            position: Vec2::new(x, y),
            pressed: is_mouse_button_pressed(MouseButton::Left),
            released: is_mouse_button_released(MouseButton::Left)
                || (!is_mouse_button_down(MouseButton::Left)
                    && !is_mouse_button_pressed(MouseButton::Left)),
        }
    }
}

/// Rendering backend implemented on top of macroquad.
#[derive(Debug, Default)]
pub struct MacroquadBackend {
    swap_interval: Option<i32>,
    show_fps: bool,
}

impl MacroquadBackend {
    /// Returns a backend that requests the platform's default swap interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the backend to request a specific swap interval from the platform.
    #[must_use]
    pub fn with_swap_interval(mut self, swap_interval: Option<i32>) -> Self {
        self.swap_interval = swap_interval;
        self
    }

    /// Configures the backend to either synchronise presentation with the display refresh rate
    /// or render as fast as possible.
    #[must_use]
    pub fn with_vsync(self, enabled: bool) -> Self {
        let swap_interval = if enabled { Some(1) } else { Some(0) };
        self.with_swap_interval(swap_interval)
    }

    /// Configures whether the backend logs frame timing once per second.
    #[must_use]
    pub fn with_show_fps(mut self, show: bool) -> Self {
        self.show_fps = show;
        self
    }
}

#[derive(Debug)]
struct FpsCounter {
    window_start: Instant,
    frames: u32,
    update_time: Duration,
    render_time: Duration,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
            update_time: Duration::ZERO,
            render_time: Duration::ZERO,
        }
    }
}

impl FpsCounter {
    fn record_frame(&mut self, update: Duration, render: Duration) {
        self.frames += 1;
        self.update_time += update;
        self.render_time += render;

        let elapsed = self.window_start.elapsed();
        if elapsed < Duration::from_secs(1) {
            return;
        }
        let frames = self.frames.max(1);
        tracing::info!(
            fps = f64::from(self.frames) / elapsed.as_secs_f64(),
            update_ms = (self.update_time / frames).as_secs_f64() * 1_000.0,
            render_ms = (self.render_time / frames).as_secs_f64() * 1_000.0,
            "frame timing"
        );
        *self = Self::default();
    }
}

impl RenderingBackend for MacroquadBackend {
    fn run<F>(self, presentation: Presentation, mut update_scene: F) -> Result<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) + 'static,
    {
        let Self {
            swap_interval,
            show_fps,
        } = self;

        let Presentation {
            window_title,
            clear_color,
            scene,
        } = presentation;

        let mut config = macroquad::window::Conf {
            window_title,
            window_width: 960 + CONTROL_PANEL_WIDTH as i32,
            window_height: 960,
            ..macroquad::window::Conf::default()
        };
        if let Some(swap_interval) = swap_interval {
            config.platform.swap_interval = Some(swap_interval);
        }

        macroquad::Window::from_config(config, async move {
            let mut scene = scene;
            let background = to_macroquad_color(clear_color);
            let panel_background = to_macroquad_color(clear_color.lighten(0.08));
            let mut fps_counter = FpsCounter::default();
            let mut control_panel_input = ControlPanelInputState::default();
            let mut press_tracker = PressTracker::default();

            loop {
                let keyboard = KeyboardShortcuts::poll();
                if keyboard.quit_requested {
                    break;
                }

                macroquad::window::clear_background(background);

                let screen_width = macroquad::window::screen_width();
                let screen_height = macroquad::window::screen_height();
                let scene_width = (screen_width - CONTROL_PANEL_WIDTH).max(0.0);

                let dt_seconds = macroquad::time::get_frame_time();
                let frame_dt = Duration::from_secs_f32(dt_seconds.max(0.0));
                let frame_input = gather_frame_input_from_observations(
                    &mut press_tracker,
                    keyboard,
                    PointerObservation::poll(),
                    scene_width,
                    &mut control_panel_input,
                );

                let update_start = Instant::now();
                update_scene(frame_dt, frame_input, &mut scene);
                let update_duration = update_start.elapsed();

                let render_start = Instant::now();
                let mut canvas = MacroquadCanvas::new(Vec2::new(scene_width, screen_height));
                let _ = render_frame(&mut canvas, &scene);

                let panel_context = ControlPanelUiContext {
                    origin: macroquad::math::Vec2::new(scene_width, 0.0),
                    size: macroquad::math::Vec2::new(CONTROL_PANEL_WIDTH, screen_height),
                    background: panel_background,
                    hud: &scene.hud,
                    path: scene.path,
                    prompt: scene.prompt(),
                };
                let mut control_panel_ui = macroquad::ui::root_ui();
                let result = draw_control_panel_ui(&mut control_panel_ui, panel_context);
                control_panel_input.register(result);
                let render_duration = render_start.elapsed();

                if show_fps {
                    fps_counter.record_frame(update_duration, render_duration);
                }

                macroquad::window::next_frame().await;
            }
        });

        Ok(())
    }
}

fn gather_frame_input_from_observations(
    press_tracker: &mut PressTracker,
    keyboard: KeyboardShortcuts,
    pointer: PointerObservation,
    scene_width: f32,
    control_panel: &mut ControlPanelInputState,
) -> FrameInput {
    let in_scene = pointer.position.x >= 0.0 && pointer.position.x < scene_width;
    let edges = press_tracker.update(
        keyboard.breath_held,
        pointer.pressed && in_scene,
        pointer.released,
    );

    FrameInput {
        press_started: edges.started,
        press_ended: edges.ended,
        pause_toggle: control_panel.take_pause_toggle() || keyboard.pause_toggle,
        reset: control_panel.take_reset() || keyboard.reset,
        cycle_path: control_panel.take_cycle_path() || keyboard.cycle_path,
        export: control_panel.take_export() || keyboard.export,
    }
}

fn to_macroquad_color(color: Color) -> macroquad::color::Color {
    macroquad::color::Color::new(color.red, color.green, color.blue, color.alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer_at(x: f32, pressed: bool, released: bool) -> PointerObservation {
        PointerObservation {
            position: Vec2::new(x, 100.0),
            pressed,
            released,
        }
    }

    #[test]
    fn panel_clicks_never_start_a_breath() {
        let mut tracker = PressTracker::default();
        let mut panel = ControlPanelInputState::default();

        let input = gather_frame_input_from_observations(
            &mut tracker,
            KeyboardShortcuts::default(),
            pointer_at(900.0, true, false),
            800.0,
            &mut panel,
        );

        assert!(!input.press_started);
        assert!(!tracker.is_holding());
    }

    #[test]
    fn scene_press_and_release_produce_edges() {
        let mut tracker = PressTracker::default();
        let mut panel = ControlPanelInputState::default();
        let idle = KeyboardShortcuts::default();

        let down = gather_frame_input_from_observations(
            &mut tracker,
            idle,
            pointer_at(100.0, true, false),
            800.0,
            &mut panel,
        );
        let held = gather_frame_input_from_observations(
            &mut tracker,
            idle,
            pointer_at(100.0, false, false),
            800.0,
            &mut panel,
        );
        let up = gather_frame_input_from_observations(
            &mut tracker,
            idle,
            pointer_at(100.0, false, true),
            800.0,
            &mut panel,
        );

        assert!(down.press_started && !down.press_ended);
        assert!(!held.press_started && !held.press_ended);
        assert!(!up.press_started && up.press_ended);
    }

    #[test]
    fn keyboard_and_latched_buttons_merge() {
        let mut tracker = PressTracker::default();
        let mut panel = ControlPanelInputState::default();
        panel.register_export();
        let keyboard = KeyboardShortcuts {
            pause_toggle: true,
            ..KeyboardShortcuts::default()
        };

        let input = gather_frame_input_from_observations(
            &mut tracker,
            keyboard,
            PointerObservation::default(),
            800.0,
            &mut panel,
        );

        assert!(input.pause_toggle);
        assert!(input.export);
        assert!(!input.reset);
        assert!(!panel.take_export());
    }

    #[test]
    fn quick_click_reports_both_edges() {
        let mut tracker = PressTracker::default();
        let edges = tracker.update(false, true, true);
        assert_eq!(
            edges,
            PressEdges {
                started: true,
                ended: true
            }
        );
        assert!(!tracker.is_holding());
    }

    #[test]
    fn space_overrides_pointer_release() {
        let mut tracker = PressTracker::default();
        assert!(tracker.update(true, false, false).started);
        assert_eq!(tracker.update(true, false, true), PressEdges::default());
        assert!(tracker.update(false, false, true).ended);
    }
}
