//! On-screen controls layered over the composited frame.

use sceneswap::{renderer::FrameStats, FilterKind, Orientation};

/// Values the control panel edits in place.
#[derive(Clone, Debug)]
pub struct UiState {
    pub mix: f32,
    pub filter: FilterKind,
    pub orientation: Orientation,
    pub backdrop: String,
    pub object: String,
    pub last_message: Option<String>,
}

/// Requests raised by the panel this frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UiActions {
    pub capture: bool,
    pub add_anchor: bool,
    pub clear_anchors: bool,
    pub backdrop: Option<String>,
    pub object: Option<String>,
    pub orientation: Option<Orientation>,
}

pub fn draw_hud(ctx: &egui::Context, stats: &FrameStats, anchors: usize) {
    egui::Area::new(egui::Id::new("hud"))
        .anchor(egui::Align2::LEFT_TOP, [8.0, 8.0])
        .interactable(false)
        .show(ctx, |ui| {
            ui.label(
                egui::RichText::new(format!(
                    "{:.0} fps | rendered {} | skipped {} | anchors {}",
                    stats.fps(),
                    stats.rendered,
                    stats.skipped(),
                    anchors
                ))
                .monospace()
                .color(egui::Color32::WHITE),
            );
        });
}

pub fn draw_control_panel(ctx: &egui::Context, state: &mut UiState, backdrops: &[String], objects: &[String]) -> UiActions {
    let mut actions = UiActions::default();

    egui::Window::new("Effects")
        .anchor(egui::Align2::RIGHT_TOP, [-8.0, 8.0])
        .resizable(false)
        .default_width(220.0)
        .show(ctx, |ui| {
            egui::ComboBox::from_label("Filter")
                .selected_text(state.filter.as_str())
                .show_ui(ui, |ui| {
                    for kind in FilterKind::ALL {
                        ui.selectable_value(&mut state.filter, kind, kind.as_str());
                    }
                });

            ui.add(egui::Slider::new(&mut state.mix, 0.0..=1.0).text("Mix"));

            let previous = state.orientation;
            egui::ComboBox::from_label("Orientation")
                .selected_text(state.orientation.as_str())
                .show_ui(ui, |ui| {
                    for o in Orientation::ALL {
                        ui.selectable_value(&mut state.orientation, o, o.as_str());
                    }
                });
            if state.orientation != previous {
                actions.orientation = Some(state.orientation);
            }

            if !backdrops.is_empty() {
                let mut picked = state.backdrop.clone();
                egui::ComboBox::from_label("Backdrop")
                    .selected_text(picked.as_str())
                    .show_ui(ui, |ui| {
                        for name in backdrops {
                            ui.selectable_value(&mut picked, name.clone(), name.as_str());
                        }
                    });
                if picked != state.backdrop {
                    actions.backdrop = Some(picked);
                }
            }

            if !objects.is_empty() {
                let mut picked = state.object.clone();
                egui::ComboBox::from_label("Object")
                    .selected_text(picked.as_str())
                    .show_ui(ui, |ui| {
                        for name in objects {
                            ui.selectable_value(&mut picked, name.clone(), name.as_str());
                        }
                    });
                if picked != state.object {
                    actions.object = Some(picked);
                }
            }

            ui.separator();
            ui.horizontal(|ui| {
                actions.add_anchor = ui.button("Add anchor").clicked();
                actions.clear_anchors = ui.button("Clear").clicked();
                actions.capture = ui.button("Capture").clicked();
            });

            if let Some(message) = &state.last_message {
                ui.small(message.as_str());
            }
        });

    actions
}
