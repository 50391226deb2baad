use scribblefusion_shared::{to_device_pixels, CanvasPoint, DrawCommand, LogicalSize};

/// The rendering primitive the sync layer draws onto.
pub trait DrawingSurface {
    /// Wipes the surface back to its background.
    fn clear(&mut self);

    fn draw_line(&mut self, from: CanvasPoint, to: CanvasPoint, color: &str, width: f64);

    /// Called before a replay whenever the logical canvas size changes.
    fn resize(&mut self, _size: LogicalSize) {}
}

/// Draws `cmd` at `size`. Returns false when the command is not renderable.
pub fn render_command<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    cmd: &DrawCommand,
    size: LogicalSize,
    stroke_width: f64,
) -> bool {
    if !cmd.is_renderable() {
        return false;
    }
    let from = to_device_pixels(cmd.start(), size);
    let to = to_device_pixels(cmd.end(), size);
    surface.draw_line(from, to, &cmd.color, stroke_width);
    true
}
