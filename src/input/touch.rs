//! Pointer → touch-panel emulation
//!
//! The logical panel is letterboxed into the host window (aspect ratio
//! preserved, centered). A held primary pointer button inside that region
//! maps linearly onto the panel resolution.

use super::host::PointerState;
use super::state::TouchPoint;

/// Active display region inside the host window, in window pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRegion {
    /// Largest centered region with the panel's aspect ratio
    pub fn letterbox(window: (u32, u32), panel: (u16, u16)) -> Option<Self> {
        let (window_w, window_h) = (window.0 as f32, window.1 as f32);
        let (panel_w, panel_h) = (f32::from(panel.0), f32::from(panel.1));
        if window_w <= 0.0 || window_h <= 0.0 || panel_w <= 0.0 || panel_h <= 0.0 {
            return None;
        }

        let scale = (window_w / panel_w).min(window_h / panel_h);
        let width = panel_w * scale;
        let height = panel_h * scale;

        Some(Self {
            x: (window_w - width) / 2.0,
            y: (window_h - height) / 2.0,
            width,
            height,
        })
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

/// Touch point for the current pointer, or `None` when nothing touches
pub fn touch_from_pointer(pointer: &PointerState, window: (u32, u32), panel: (u16, u16)) -> Option<TouchPoint> {
    if !pointer.primary_down {
        return None;
    }

    let region = DisplayRegion::letterbox(window, panel)?;
    if !region.contains(pointer.x, pointer.y) {
        return None;
    }

    let rel_x = (pointer.x - region.x) / region.width;
    let rel_y = (pointer.y - region.y) / region.height;
    let max_x = panel.0.saturating_sub(1);
    let max_y = panel.1.saturating_sub(1);

    Some(TouchPoint {
        x: ((rel_x * f32::from(panel.0)) as u16).min(max_x),
        y: ((rel_y * f32::from(panel.1)) as u16).min(max_y),
    })
}
