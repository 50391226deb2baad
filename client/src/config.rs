use std::time::Duration;

use serde::{Deserialize, Serialize};

use scribblefusion_shared::DEFAULT_ASPECT_RATIO;

use crate::connection::RetryPolicy;

pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_STROKE_WIDTH: f64 = 3.0;

/// Knobs the host page may override, usually as JSON.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub retry_interval_ms: u64,
    pub max_retries: u32,
    pub aspect_ratio: f64,
    /// Line width in logical pixels.
    pub stroke_width: f64,
    pub history_path: String,
    pub socket_path: String,
    pub background: String,
    /// Vertical space kept free below the controls bar.
    pub controls_margin: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            stroke_width: DEFAULT_STROKE_WIDTH,
            history_path: "/api/getdrawingdata".to_string(),
            socket_path: "/ws".to_string(),
            background: "#ffffff".to_string(),
            controls_margin: 20.0,
        }
    }
}

impl SyncConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(self.retry_interval_ms),
            max_retries: self.max_retries,
        }
    }
}

/// Push-channel URL on the page's own host.
pub fn socket_url(protocol: &str, host: &str, path: &str) -> String {
    let scheme = if protocol == "https:" { "wss" } else { "ws" };
    let path = path.trim_start_matches('/');
    format!("{scheme}://{host}/{path}")
}
