mod command;
mod coords;
mod protocol;

pub use command::{
    decode, decode_history_body, decode_history_entry, encode, CodecError, DrawCommand,
    HistoryEntry, FALLBACK_COLOR, MAX_COLOR_LEN,
};
pub use coords::{
    backing_store_size, fit_canvas, to_device_pixels, to_normalized, CanvasPoint, LogicalSize,
    NormalizedPoint, ScreenPoint, ScreenRect, DEFAULT_ASPECT_RATIO,
};
pub use protocol::{format_time_remaining, CommandData, PushMessage};
