use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coords::NormalizedPoint;

pub const FALLBACK_COLOR: &str = "black";
/// Longest color token kept; anything past it is cut off.
pub const MAX_COLOR_LEN: usize = 32;

/// One line segment between two normalized points.
///
/// Coordinates are fractions of the producing client's logical canvas width (x)
/// and height (y). The color never contains whitespace, so the wire form stays
/// five tokens long.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCommand {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub color: String,
}

impl DrawCommand {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, color: &str) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            color: sanitize_color(color),
        }
    }

    pub fn segment(from: NormalizedPoint, to: NormalizedPoint, color: &str) -> Self {
        Self::new(from.x, from.y, to.x, to.y, color)
    }

    pub fn start(&self) -> NormalizedPoint {
        NormalizedPoint {
            x: self.x1,
            y: self.y1,
        }
    }

    pub fn end(&self) -> NormalizedPoint {
        NormalizedPoint {
            x: self.x2,
            y: self.y2,
        }
    }

    /// Negative coordinates mark a segment without a starting point and are
    /// never drawn.
    pub fn is_renderable(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|value| value.is_finite() && *value >= 0.0)
    }

    pub fn encode(&self) -> String {
        encode(self)
    }
}

fn sanitize_color(color: &str) -> String {
    let color: String = color
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(MAX_COLOR_LEN)
        .collect();
    if color.is_empty() {
        FALLBACK_COLOR.to_string()
    } else {
        color
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed draw command {input:?}: {reason}")]
    MalformedCommand { input: String, reason: &'static str },
    #[error("malformed history envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),
    #[error("malformed history response: {0}")]
    MalformedHistory(#[source] serde_json::Error),
}

impl CodecError {
    fn command(input: &str, reason: &'static str) -> Self {
        let input = if input.len() <= 80 {
            input.to_string()
        } else {
            let mut end = 80;
            while !input.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &input[..end])
        };
        Self::MalformedCommand { input, reason }
    }
}

/// The structured wrapper the history endpoint puts around every encoded command.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<u64>,
}

/// `x1 y1 x2 y2 color`, space separated.
pub fn encode(cmd: &DrawCommand) -> String {
    format!(
        "{} {} {} {} {}",
        cmd.x1,
        cmd.y1,
        cmd.x2,
        cmd.y2,
        sanitize_color(&cmd.color)
    )
}

pub fn decode(input: &str) -> Result<DrawCommand, CodecError> {
    let mut tokens = input.split_whitespace();
    let mut coords = [0.0f64; 4];
    for slot in coords.iter_mut() {
        let token = tokens
            .next()
            .ok_or_else(|| CodecError::command(input, "expected four coordinates"))?;
        let value: f64 = token
            .parse()
            .map_err(|_| CodecError::command(input, "coordinate is not a number"))?;
        if !value.is_finite() {
            return Err(CodecError::command(input, "coordinate is not finite"));
        }
        *slot = value;
    }
    let color = tokens.next().unwrap_or_default();
    if tokens.next().is_some() {
        return Err(CodecError::command(input, "too many tokens"));
    }
    let [x1, y1, x2, y2] = coords;
    Ok(DrawCommand::new(x1, y1, x2, y2, color))
}

/// Unwraps one history envelope and decodes the command inside it.
pub fn decode_history_entry(raw: &str) -> Result<DrawCommand, CodecError> {
    let entry: HistoryEntry = serde_json::from_str(raw).map_err(CodecError::MalformedEnvelope)?;
    decode(&entry.data)
}

/// Splits a history response body into its envelope strings.
pub fn decode_history_body(body: &str) -> Result<Vec<String>, CodecError> {
    serde_json::from_str(body).map_err(CodecError::MalformedHistory)
}
