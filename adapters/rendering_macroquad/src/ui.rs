//! Immediate-mode UI helpers for the Macroquad rendering backend.
//!
//! This module hosts all uses of `macroquad::ui` so the rest of the adapter can
//! remain agnostic of Macroquad's UI types.

use macroquad::{
    color::{Color, WHITE},
    math::{RectOffset, Vec2},
    ui::{hash, Ui},
};
use swarasync_rendering::{BreathPath, HudPresentation};

/// Buttons pressed in the control panel during the current frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ControlPanelUiResult {
    pub(crate) pause_pressed: bool,
    pub(crate) reset_pressed: bool,
    pub(crate) path_pressed: bool,
    pub(crate) export_pressed: bool,
}

/// Snapshot of the control panel's layout and data for the current frame.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ControlPanelUiContext<'a> {
    /// Top-left corner of the panel in screen coordinates.
    pub(crate) origin: Vec2,
    /// Panel dimensions in screen space.
    pub(crate) size: Vec2,
    /// Background colour applied to the window skin.
    pub(crate) background: Color,
    pub(crate) hud: &'a HudPresentation,
    pub(crate) path: BreathPath,
    pub(crate) prompt: &'static str,
}

/// Renders the control panel's labels and buttons for the current frame.
pub(crate) fn draw_control_panel_ui(
    ui: &mut Ui,
    context: ControlPanelUiContext<'_>,
) -> ControlPanelUiResult {
    let mut skin = ui.default_skin();
    skin.margin = 0.0;

    let window_style = ui
        .style_builder()
        .color(context.background)
        .color_hovered(context.background)
        .color_clicked(context.background)
        .color_selected(context.background)
        .color_selected_hovered(context.background)
        .color_inactive(context.background)
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .margin(RectOffset::new(16.0, 16.0, 16.0, 16.0))
        .build();
    skin.window_style = window_style;

    let label_style = ui
        .style_builder()
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .margin(RectOffset::new(0.0, 0.0, 4.0, 4.0))
        .build();
    skin.label_style = label_style;

    let button_style = ui
        .style_builder()
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .color(Color::from_rgba(51, 65, 85, 255))
        .color_hovered(Color::from_rgba(71, 85, 105, 255))
        .color_clicked(Color::from_rgba(30, 41, 59, 255))
        .color_selected(Color::from_rgba(51, 65, 85, 255))
        .color_selected_hovered(Color::from_rgba(71, 85, 105, 255))
        .color_inactive(Color::from_rgba(30, 41, 59, 200))
        .margin(RectOffset::new(0.0, 0.0, 8.0, 8.0))
        .build();
    skin.button_style = button_style;

    ui.push_skin(&skin);

    let mut result = ControlPanelUiResult::default();
    let hud = context.hud;
    let _ = ui.window(hash!("control_panel"), context.origin, context.size, |ui| {
        ui.label(None, context.prompt);
        let round = format!("Round {} / {}", hud.round, hud.total_rounds);
        ui.label(None, round.as_str());
        let harmony = match hud.last_harmony {
            Some(harmony) => format!("Harmony: {harmony}"),
            None => "Harmony: -".to_string(),
        };
        ui.label(None, harmony.as_str());
        let path = format!("Path: {}", context.path.label());
        ui.label(None, path.as_str());
        ui.label(None, "Hold Space or click to breathe.");

        let pause_label = if hud.paused { "Resume (P)" } else { "Pause (P)" };
        result.pause_pressed = ui.button(None, pause_label);
        result.reset_pressed = ui.button(None, "Reset (R)");
        result.path_pressed = ui.button(None, "Breath Path (B)");
        result.export_pressed = ui.button(None, "Export Mandala (E)");
    });

    ui.pop_skin();
    result
}
