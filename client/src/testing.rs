use std::collections::VecDeque;

use scribblefusion_shared::{CanvasPoint, LogicalSize};

use crate::connection::Transport;
use crate::error::TransportError;
use crate::surface::DrawingSurface;

#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    pub from: CanvasPoint,
    pub to: CanvasPoint,
    pub color: String,
    pub width: f64,
}

/// Keeps the lines currently visible plus a count of clears.
#[derive(Default, Debug)]
pub struct RecordingSurface {
    pub lines: Vec<Line>,
    pub clears: usize,
    pub sizes: Vec<LogicalSize>,
}

impl RecordingSurface {
    pub fn colors(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.color.as_str()).collect()
    }
}

impl DrawingSurface for RecordingSurface {
    fn clear(&mut self) {
        self.lines.clear();
        self.clears += 1;
    }

    fn draw_line(&mut self, from: CanvasPoint, to: CanvasPoint, color: &str, width: f64) {
        self.lines.push(Line {
            from,
            to,
            color: color.to_string(),
            width,
        });
    }

    fn resize(&mut self, size: LogicalSize) {
        self.sizes.push(size);
    }
}

#[derive(Default, Debug)]
pub struct MockTransport {
    pub opens: u32,
    pub open_results: VecDeque<Result<(), TransportError>>,
    pub sent: Vec<String>,
    pub closes: u32,
    pub fail_sends: bool,
}

impl MockTransport {
    pub fn always_failing(count: usize) -> Self {
        Self {
            open_results: (0..count)
                .map(|_| Err(TransportError::Open("connection refused".into())))
                .collect(),
            ..Self::default()
        }
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        self.opens += 1;
        self.open_results.pop_front().unwrap_or(Ok(()))
    }

    fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::Send("socket closing".into()));
        }
        self.sent.push(payload.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}
