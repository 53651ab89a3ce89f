use serde::{Deserialize, Serialize};

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 3.0;
/// Scale change per wheel notch.
pub const ZOOM_STEP: f64 = 0.1;

/// Pointer buttons as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
    Back,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

/// Zoom and pan state of the displayed item.
///
/// `scale` always stays within `MIN_SCALE..=MAX_SCALE`. The offset is free.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportController {
    scale: f64,
    offset: Offset,
    /// Last pointer position while a primary-button drag is active.
    drag: Option<(f64, f64)>,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: Offset::default(),
            drag: None,
        }
    }
}

impl ViewportController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn zoom_by(&mut self, delta: f64) {
        // Round to kill float drift from repeated 0.1 steps.
        let next = ((self.scale + delta) * 1000.0).round() / 1000.0;
        self.scale = next.clamp(MIN_SCALE, MAX_SCALE);
    }

    /// Apply one wheel event. Positive direction (scrolling down) zooms out.
    pub fn zoom_at(&mut self, direction: f64) {
        let delta = if direction > 0.0 { -ZOOM_STEP } else { ZOOM_STEP };
        self.zoom_by(delta);
    }

    pub fn zoom_in(&mut self) {
        self.zoom_by(ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_by(-ZOOM_STEP);
    }

    /// Start a drag gesture. Only the primary button pans.
    pub fn begin_drag(&mut self, button: PointerButton, x: f64, y: f64) {
        if button == PointerButton::Primary {
            self.drag = Some((x, y));
        }
    }

    /// Pointer moved to `(x, y)`. Pans by the distance since the last position.
    pub fn drag_to(&mut self, x: f64, y: f64) {
        if let Some((last_x, last_y)) = self.drag {
            self.pan(x - last_x, y - last_y);
            self.drag = Some((x, y));
        }
    }

    /// Shift the offset. Ignored unless a drag is active.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        if self.drag.is_none() {
            return;
        }
        self.offset.x += dx;
        self.offset.y += dy;
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn reset_on_item_change(&mut self) {
        self.scale = 1.0;
        self.offset = Offset::default();
        self.drag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_out_stops_at_min() {
        let mut vp = ViewportController::new();
        for _ in 0..50 {
            vp.zoom_out();
        }
        assert_eq!(vp.scale(), MIN_SCALE);
        vp.zoom_by(-1.0);
        assert_eq!(vp.scale(), MIN_SCALE);
    }

    #[test]
    fn zoom_in_stops_at_max() {
        let mut vp = ViewportController::new();
        for _ in 0..50 {
            vp.zoom_in();
        }
        assert_eq!(vp.scale(), MAX_SCALE);
        vp.zoom_in();
        assert_eq!(vp.scale(), MAX_SCALE);
    }

    #[test]
    fn wheel_direction_maps_to_step() {
        let mut vp = ViewportController::new();
        vp.zoom_at(120.0);
        assert_eq!(vp.scale(), 0.9);
        vp.zoom_at(-120.0);
        vp.zoom_at(-1.0);
        assert_eq!(vp.scale(), 1.1);
        vp.zoom_at(0.0);
        assert_eq!(vp.scale(), 1.2);
    }

    #[test]
    fn pan_requires_active_drag() {
        let mut vp = ViewportController::new();
        vp.pan(10.0, 10.0);
        vp.drag_to(50.0, 50.0);
        assert_eq!(vp.offset(), Offset::default());
    }

    #[test]
    fn drag_accumulates_moves() {
        let mut vp = ViewportController::new();
        vp.begin_drag(PointerButton::Primary, 10.0, 10.0);
        vp.drag_to(15.0, 12.0);
        vp.drag_to(25.0, 2.0);
        assert_eq!(vp.offset(), Offset { x: 15.0, y: -8.0 });

        vp.end_drag();
        vp.drag_to(100.0, 100.0);
        assert_eq!(vp.offset(), Offset { x: 15.0, y: -8.0 });
    }

    #[test]
    fn non_primary_buttons_do_not_drag() {
        let mut vp = ViewportController::new();
        vp.begin_drag(PointerButton::Secondary, 0.0, 0.0);
        vp.begin_drag(PointerButton::Back, 0.0, 0.0);
        assert!(!vp.is_dragging());
    }

    #[test]
    fn item_change_resets_everything() {
        let mut vp = ViewportController::new();
        vp.zoom_in();
        vp.begin_drag(PointerButton::Primary, 0.0, 0.0);
        vp.drag_to(30.0, 40.0);
        vp.reset_on_item_change();
        assert_eq!(vp, ViewportController::default());
        assert_eq!(vp.scale(), 1.0);
    }
}
