use serde::{Deserialize, Serialize};

pub const DEFAULT_ASPECT_RATIO: f64 = 16.0 / 9.0;

/// CSS-pixel size of the canvas after fitting it to the viewport.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct LogicalSize {
    pub width: f64,
    pub height: f64,
}

impl LogicalSize {
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// On-screen bounding rectangle of the canvas element, in client coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.left
            && point.x <= self.left + self.width
            && point.y >= self.top
            && point.y <= self.top + self.height
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

/// A point in the canvas' logical pixel space, ready for the rendering context.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasPoint {
    pub x: f64,
    pub y: f64,
}

/// Fits `aspect_ratio` inside the viewport, preferring full width unless that
/// would exceed the available height.
pub fn fit_canvas(viewport_width: f64, available_height: f64, aspect_ratio: f64) -> LogicalSize {
    let viewport_width = viewport_width.max(0.0);
    let available_height = available_height.max(0.0);
    let mut width = viewport_width;
    let mut height = viewport_width / aspect_ratio;
    if height > available_height {
        height = available_height;
        width = height * aspect_ratio;
    }
    LogicalSize { width, height }
}

/// Maps a client-space point into normalized canvas coordinates.
///
/// Points outside `rect` are rejected, not clamped.
pub fn to_normalized(
    point: ScreenPoint,
    rect: ScreenRect,
    size: LogicalSize,
) -> Option<NormalizedPoint> {
    if rect.width <= 0.0 || rect.height <= 0.0 || size.is_empty() {
        return None;
    }
    if !rect.contains(point) {
        return None;
    }
    let scale_x = size.width / rect.width;
    let scale_y = size.height / rect.height;
    let canvas_x = (point.x - rect.left) * scale_x;
    let canvas_y = (point.y - rect.top) * scale_y;
    Some(NormalizedPoint {
        x: canvas_x / size.width,
        y: canvas_y / size.height,
    })
}

pub fn to_device_pixels(point: NormalizedPoint, size: LogicalSize) -> CanvasPoint {
    CanvasPoint {
        x: point.x * size.width,
        y: point.y * size.height,
    }
}

/// Backing-store dimensions for a logical size at the given device pixel ratio.
pub fn backing_store_size(size: LogicalSize, device_pixel_ratio: f64) -> (u32, u32) {
    let ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    };
    (
        (size.width.max(0.0) * ratio).round() as u32,
        (size.height.max(0.0) * ratio).round() as u32,
    )
}
