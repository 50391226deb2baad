use scribblefusion_shared::{
    to_normalized, DrawCommand, LogicalSize, NormalizedPoint, ScreenPoint, ScreenRect,
};

/// Per-page input state: whether a gesture is active, where it last was, and the
/// logical canvas size every conversion uses.
pub struct DrawSession {
    touched: bool,
    last: Option<NormalizedPoint>,
    size: LogicalSize,
    color: String,
}

impl DrawSession {
    pub fn new(color: &str) -> Self {
        Self {
            touched: false,
            last: None,
            size: LogicalSize {
                width: 0.0,
                height: 0.0,
            },
            color: color.to_string(),
        }
    }

    pub fn size(&self) -> LogicalSize {
        self.size
    }

    pub fn set_size(&mut self, size: LogicalSize) {
        self.size = size;
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn set_color(&mut self, color: &str) {
        self.color = color.to_string();
    }

    pub fn is_drawing(&self) -> bool {
        self.touched
    }

    /// Starts a gesture if `point` lies on the canvas.
    pub fn pointer_down(&mut self, point: ScreenPoint, rect: ScreenRect) -> bool {
        let Some(normalized) = to_normalized(point, rect, self.size) else {
            return false;
        };
        self.touched = true;
        self.last = Some(normalized);
        true
    }

    /// Extends the active gesture. Points off the canvas are dropped and leave the
    /// last point where it was.
    pub fn pointer_move(&mut self, point: ScreenPoint, rect: ScreenRect) -> Option<DrawCommand> {
        if !self.touched {
            return None;
        }
        let normalized = to_normalized(point, rect, self.size)?;
        let previous = self.last.replace(normalized)?;
        Some(DrawCommand::segment(previous, normalized, &self.color))
    }

    pub fn pointer_up(&mut self) {
        self.touched = false;
        self.last = None;
    }
}
