use serde::{Deserialize, Serialize};

/// Envelope carried by the push channel.
///
/// Draw updates, clock ticks and clear signals all share this shape; `clear_canvas`
/// and `data` never appear together.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PushMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub clear_canvas: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CommandData>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum CommandData {
    One(String),
    Many(Vec<String>),
}

impl CommandData {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            CommandData::One(command) => vec![command],
            CommandData::Many(commands) => commands,
        }
    }
}

impl PushMessage {
    pub fn draw(data: String, time_remaining: u64) -> Self {
        Self {
            time_remaining: Some(time_remaining),
            clear_canvas: false,
            data: Some(CommandData::One(data)),
        }
    }

    pub fn tick(time_remaining: u64) -> Self {
        Self {
            time_remaining: Some(time_remaining),
            ..Self::default()
        }
    }

    pub fn clear() -> Self {
        Self {
            time_remaining: Some(0),
            clear_canvas: true,
            data: None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// `m:ss` rendering of the session clock.
pub fn format_time_remaining(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
