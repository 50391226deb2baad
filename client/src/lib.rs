mod board;
mod config;
mod connection;
mod error;
mod reconciler;
mod session;
mod surface;
#[cfg(test)]
mod testing;

#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod web;

pub use board::Board;
pub use config::{socket_url, SyncConfig};
pub use connection::{
    ChannelEvent, ConnectionManager, ConnectionState, Inbound, RetryPolicy, Transition, Transport,
};
pub use error::{FetchError, SyncError, TransportError};
pub use reconciler::{HistoryReconciler, LiveOutcome, ReplayOutcome, ReplayStats, ReplayTicket};
pub use session::DrawSession;
pub use surface::{render_command, DrawingSurface};

#[cfg(target_arch = "wasm32")]
pub use web::run;
