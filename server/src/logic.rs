use std::time::Duration;

use scribblefusion_shared::{decode, PushMessage};

use crate::state::{AppState, Tick};

/// Canonical wire form of a submitted segment, or `None` if it should not be
/// kept. The codec already cuts colors to `MAX_COLOR_LEN`.
pub fn sanitize_command(raw: &str) -> Option<String> {
    let cmd = decode(raw).ok()?;
    let in_unit = [cmd.x1, cmd.y1, cmd.x2, cmd.y2]
        .iter()
        .all(|value| *value <= 1.0);
    if !cmd.is_renderable() || !in_unit {
        return None;
    }
    Some(cmd.encode())
}

/// Records a segment from a participant and relays it to everyone, sender
/// included. Returns the envelope that went out.
pub async fn relay_command(state: &AppState, raw: &str) -> Option<String> {
    let data = sanitize_command(raw)?;
    let message = PushMessage::draw(data, state.clock.remaining());
    let envelope = match message.to_json() {
        Ok(envelope) => envelope,
        Err(error) => {
            tracing::error!("failed to serialize draw command: {error}");
            return None;
        }
    };
    let _order = state.order.lock().await;
    if let Err(error) = state.storage.append(envelope.clone()).await {
        tracing::error!("failed to record draw command: {error}");
        return None;
    }
    state.publish(&message)
}

/// One second of the session clock: either a countdown update or, on expiry,
/// an emptied history and a clear signal.
pub async fn advance_clock(state: &AppState) -> PushMessage {
    match state.clock.tick() {
        Tick::Running(remaining) => {
            let message = PushMessage::tick(remaining);
            state.publish(&message);
            message
        }
        Tick::Expired => {
            let _order = state.order.lock().await;
            if let Err(error) = state.storage.clear().await {
                tracing::error!("failed to clear history: {error}");
            }
            let message = PushMessage::clear();
            state.publish(&message);
            tracing::info!("countdown expired, canvas cleared");
            message
        }
    }
}

pub async fn run_clock(state: AppState) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        advance_clock(&state).await;
    }
}
