// SPDX-License-Identifier: MIT OR Apache-2.0
//! egui integration for the material graph editor.
//!
//! Features:
//! - Translation of `egui::Event`s into canvas-local [`InputEvent`]s
//! - Painting of a [`DrawList`] (bezier wires, nodes, sockets, labels)
//! - Background grid and status bar
//! - A canvas widget driving a [`MaterialGraphEditor`]

use crate::editor::MaterialGraphEditor;
use crate::interaction::{InputEvent, InteractionState, Key, Modifiers, PointerButton};
use crate::render::{DrawCommand, DrawList};
use crate::view::ViewTransform;
use egui::{Color32, Pos2, Rect, Stroke, Vec2};

/// Connection visual parameters
const BEZIER_CURVATURE: f32 = 50.0;
const BEZIER_SEGMENTS: usize = 32;
const NODE_SHADOW_OFFSET: f32 = 3.0;

/// Grid parameters
const GRID_SPACING: f32 = 20.0;

/// Points per wheel notch for pixel-precise scrolling
const POINTS_PER_NOTCH: f32 = 50.0;

fn translate_modifiers(modifiers: egui::Modifiers) -> Modifiers {
    Modifiers {
        alt: modifiers.alt,
        ctrl: modifiers.ctrl,
        shift: modifiers.shift,
        command: modifiers.command || modifiers.mac_cmd,
    }
}

fn translate_button(button: egui::PointerButton) -> Option<PointerButton> {
    match button {
        egui::PointerButton::Primary => Some(PointerButton::Primary),
        egui::PointerButton::Secondary => Some(PointerButton::Secondary),
        egui::PointerButton::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}

fn translate_key(key: egui::Key) -> Option<Key> {
    match key {
        egui::Key::Z => Some(Key::Z),
        egui::Key::Y => Some(Key::Y),
        egui::Key::C => Some(Key::C),
        egui::Key::X => Some(Key::X),
        egui::Key::V => Some(Key::V),
        egui::Key::Delete => Some(Key::Delete),
        egui::Key::Backspace => Some(Key::Backspace),
        egui::Key::Escape => Some(Key::Escape),
        _ => None,
    }
}

fn command_key(key: Key) -> InputEvent {
    InputEvent::Key {
        key,
        modifiers: Modifiers {
            command: true,
            ..Modifiers::default()
        },
    }
}

/// Translate an egui event into an editor event.
///
/// `origin` is the canvas top-left in screen space; `hover` is the current
/// pointer position, used to anchor wheel and pinch zoom.
pub fn translate_event(event: &egui::Event, origin: Pos2, hover: Option<Pos2>) -> Option<InputEvent> {
    let local = |pos: Pos2| (pos - origin).to_pos2();

    match event {
        egui::Event::PointerButton {
            pos,
            button,
            pressed,
            ..
        } => {
            let button = translate_button(*button)?;
            let pos = local(*pos);
            Some(if *pressed {
                InputEvent::PointerDown { pos, button }
            } else {
                InputEvent::PointerUp { pos, button }
            })
        }
        egui::Event::PointerMoved(pos) => Some(InputEvent::PointerMove { pos: local(*pos) }),
        egui::Event::MouseWheel { unit, delta, .. } => {
            let notches = match unit {
                egui::MouseWheelUnit::Point => delta.y / POINTS_PER_NOTCH,
                egui::MouseWheelUnit::Line | egui::MouseWheelUnit::Page => delta.y,
            };
            if notches == 0.0 {
                return None;
            }
            Some(InputEvent::Wheel {
                pos: local(hover?),
                delta: notches,
            })
        }
        egui::Event::Zoom(factor) if *factor > 0.0 => Some(InputEvent::Wheel {
            pos: local(hover?),
            delta: factor.ln() / crate::interaction::WHEEL_ZOOM_STEP.ln(),
        }),
        egui::Event::Key {
            key,
            pressed: true,
            modifiers,
            ..
        } => Some(InputEvent::Key {
            key: translate_key(*key)?,
            modifiers: translate_modifiers(*modifiers),
        }),
        // Some platforms deliver clipboard shortcuts only as these events
        egui::Event::Copy => Some(command_key(Key::C)),
        egui::Event::Cut => Some(command_key(Key::X)),
        egui::Event::Paste(_) => Some(command_key(Key::V)),
        _ => None,
    }
}

fn draw_grid(painter: &egui::Painter, rect: Rect, view: &ViewTransform) {
    let spacing = GRID_SPACING * view.zoom;
    if spacing < 4.0 {
        return;
    }
    let grid_color_minor = Color32::from_rgba_unmultiplied(60, 60, 60, 100);
    let grid_color_major = Color32::from_rgba_unmultiplied(80, 80, 80, 150);

    let offset_x = view.pan.x.rem_euclid(spacing);
    let offset_y = view.pan.y.rem_euclid(spacing);
    // Index of the first visible line, so every fifth one is drawn as major
    let first_x = ((offset_x - view.pan.x) / spacing).round() as i64;
    let first_y = ((offset_y - view.pan.y) / spacing).round() as i64;

    let mut x = rect.left() + offset_x;
    let mut i = first_x;
    while x < rect.right() {
        let color = if i.rem_euclid(5) == 0 { grid_color_major } else { grid_color_minor };
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], Stroke::new(1.0, color));
        x += spacing;
        i += 1;
    }

    let mut y = rect.top() + offset_y;
    let mut j = first_y;
    while y < rect.bottom() {
        let color = if j.rem_euclid(5) == 0 { grid_color_major } else { grid_color_minor };
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], Stroke::new(1.0, color));
        y += spacing;
        j += 1;
    }
}

fn draw_bezier(painter: &egui::Painter, from: Pos2, to: Pos2, stroke: Stroke, zoom: f32) {
    let distance = (to.x - from.x).abs();
    let curvature = (BEZIER_CURVATURE * zoom).min(distance * 0.5).max(10.0 * zoom);

    let ctrl1 = Pos2::new(from.x + curvature, from.y);
    let ctrl2 = Pos2::new(to.x - curvature, to.y);

    let points = bezier_points(from, ctrl1, ctrl2, to, BEZIER_SEGMENTS);
    for pair in points.windows(2) {
        painter.line_segment([pair[0], pair[1]], stroke);
    }
}

/// Paint a draw list with its coordinates offset by `origin`
pub fn paint(painter: &egui::Painter, list: &DrawList, origin: Pos2) {
    let offset = origin.to_vec2();
    let zoom = list.view.zoom;

    draw_grid(painter, Rect::from_min_max(origin, painter.clip_rect().max), &list.view);

    for command in &list.commands {
        match command {
            DrawCommand::Wire {
                from,
                to,
                color,
                width,
                pending,
            } => {
                let color = if *pending { color.gamma_multiply(0.6) } else { *color };
                draw_bezier(painter, *from + offset, *to + offset, Stroke::new(*width, color), zoom);
            }
            DrawCommand::NodeBody {
                rect,
                header_height,
                header_color,
                title,
                rounding,
                selected,
                ..
            } => {
                let screen_rect = rect.translate(offset);
                if !screen_rect.intersects(painter.clip_rect()) {
                    continue;
                }

                let shadow_rect = screen_rect.translate(Vec2::splat(NODE_SHADOW_OFFSET));
                painter.rect_filled(shadow_rect, *rounding, Color32::from_rgba_unmultiplied(0, 0, 0, 60));

                let bg_color = if *selected {
                    Color32::from_rgb(60, 70, 90)
                } else {
                    Color32::from_rgb(45, 45, 48)
                };
                painter.rect_filled(screen_rect, *rounding, bg_color);

                let header_rect = Rect::from_min_size(screen_rect.min, Vec2::new(screen_rect.width(), *header_height));
                painter.rect_filled(
                    header_rect,
                    egui::Rounding {
                        nw: *rounding,
                        ne: *rounding,
                        sw: 0.0,
                        se: 0.0,
                    },
                    *header_color,
                );
                painter.text(
                    header_rect.center(),
                    egui::Align2::CENTER_CENTER,
                    title,
                    egui::FontId::proportional(12.0 * zoom),
                    Color32::WHITE,
                );

                if *selected {
                    painter.rect_stroke(screen_rect, *rounding, Stroke::new(2.0, Color32::from_rgb(100, 150, 255)));
                }
            }
            DrawCommand::Socket {
                center,
                radius,
                color,
                connected,
            } => {
                let center = *center + offset;
                if *connected {
                    painter.circle_filled(center, *radius, *color);
                } else {
                    painter.circle_filled(center, *radius, Color32::from_gray(30));
                    painter.circle_stroke(center, *radius, Stroke::new(1.5, *color));
                }
            }
            DrawCommand::Label { pos, text, align, size } => {
                painter.text(
                    *pos + offset,
                    *align,
                    text,
                    egui::FontId::proportional(*size),
                    Color32::from_gray(200),
                );
            }
        }
    }
}

fn draw_status_bar(painter: &egui::Painter, rect: Rect, editor: &MaterialGraphEditor) {
    let graph = editor.graph();
    painter.text(
        Pos2::new(rect.left() + 5.0, rect.bottom() - 10.0),
        egui::Align2::LEFT_CENTER,
        format!(
            "Nodes: {} | Connections: {} | Zoom: {:.0}%{}",
            graph.node_count(),
            graph.connection_count(),
            editor.controller().view().zoom * 100.0,
            if editor.has_pending_save() { " | Unsaved" } else { "" },
        ),
        egui::FontId::proportional(11.0),
        Color32::from_gray(150),
    );
}

/// Whether the canvas should see `event`.
///
/// Presses, wheel and zoom only count over the canvas. Moves and releases
/// also reach it while a gesture is underway, so a drag released outside
/// still ends.
fn forwards_pointer_event(event: &egui::Event, hovered: bool, gesture_active: bool) -> bool {
    match event {
        egui::Event::PointerButton { pressed: false, .. } | egui::Event::PointerMoved(_) => {
            hovered || gesture_active
        }
        egui::Event::PointerButton { .. } | egui::Event::MouseWheel { .. } | egui::Event::Zoom(_) => hovered,
        _ => true,
    }
}

/// Show the editor canvas filling the available space
pub fn show(ui: &mut egui::Ui, editor: &mut MaterialGraphEditor) -> egui::Response {
    let rect = ui.available_rect_before_wrap();
    let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());
    if response.clicked() || response.drag_started() {
        response.request_focus();
    }

    let focused = response.has_focus();
    let text_editing = ui.ctx().wants_keyboard_input() && !focused;
    let controller = editor.controller_mut();
    controller.set_focused(focused);
    controller.set_text_editing(text_editing);

    let (events, hover) = ui.input(|i| (i.events.clone(), i.pointer.hover_pos()));
    let hovered = response.hovered() || response.dragged();
    for event in &events {
        let gesture_active = !matches!(editor.controller().state(), InteractionState::Idle);
        if !forwards_pointer_event(event, hovered, gesture_active) {
            continue;
        }
        let Some(input) = translate_event(event, rect.min, hover) else {
            continue;
        };
        let copies = matches!(
            input,
            InputEvent::Key { key: Key::C | Key::X, modifiers } if modifiers.command_held()
        );
        editor.handle_input(&input);
        // The platform only reports a paste when its clipboard holds text
        if copies {
            if let Some(node) = editor.controller().clipboard() {
                ui.ctx().copy_text(node.kind.as_str().to_string());
            }
        }
    }

    editor.tick();
    if editor.has_pending_save() {
        ui.ctx().request_repaint_after(std::time::Duration::from_millis(100));
    }

    let painter = ui.painter_at(rect);
    if let Some(list) = editor.frame() {
        paint(&painter, list, rect.min);
    }
    draw_status_bar(&painter, rect, editor);

    response
}

/// Generate points along a cubic bezier curve
fn bezier_points(p0: Pos2, p1: Pos2, p2: Pos2, p3: Pos2, segments: usize) -> Vec<Pos2> {
    let mut points = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let t = i as f32 / segments as f32;
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = mt3 * p0.x + 3.0 * mt2 * t * p1.x + 3.0 * mt * t2 * p2.x + t3 * p3.x;
        let y = mt3 * p0.y + 3.0 * mt2 * t * p1.y + 3.0 * mt * t2 * p2.y + t3 * p3.y;

        points.push(Pos2::new(x, y));
    }
    points
}
