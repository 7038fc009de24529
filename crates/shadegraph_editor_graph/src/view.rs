// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pan/zoom view transform between screen space and world space.
//!
//! `screen = world * zoom + pan`. Pan is kept in screen pixels so panning by
//! a pointer delta needs no conversion.

use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest allowed zoom factor
pub const MIN_ZOOM: f32 = 0.1;
/// Largest allowed zoom factor
pub const MAX_ZOOM: f32 = 2.0;

/// Current pan offset and zoom level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    /// Screen-space offset of the world origin
    pub pan: Vec2,
    /// Scale from world units to screen pixels
    pub zoom: f32,
}

impl ViewTransform {
    /// Identity transform
    pub fn new() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
        }
    }

    /// Convert screen position to world position
    pub fn screen_to_world(&self, screen: Pos2) -> Pos2 {
        Pos2::new(
            (screen.x - self.pan.x) / self.zoom,
            (screen.y - self.pan.y) / self.zoom,
        )
    }

    /// Convert world position to screen position
    pub fn world_to_screen(&self, world: Pos2) -> Pos2 {
        Pos2::new(
            world.x * self.zoom + self.pan.x,
            world.y * self.zoom + self.pan.y,
        )
    }

    /// Convert a screen-space length to world space
    pub fn screen_len_to_world(&self, len: f32) -> f32 {
        len / self.zoom
    }

    /// Zoom by `factor` keeping the world point under `screen_point` fixed
    pub fn zoom_at(&mut self, screen_point: Pos2, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let anchor = self.screen_to_world(screen_point);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = Vec2::new(
            screen_point.x - anchor.x * self.zoom,
            screen_point.y - anchor.y * self.zoom,
        );
    }

    /// Pan by a screen-space delta
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Back to the identity transform
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new()
    }
}
