//! Push-channel lifecycle.
//!
//! `Idle -> Connecting -> Open -> Closed`, plus `Connecting -> Connecting` for a retry and
//! `Connecting -> Failed` once retries are exhausted. Only the initial connection is
//! retried; a drop after `Open` ends the session until the host calls `connect` again.
//!
//! The manager never sleeps. A failed attempt yields [`Transition::RetryAfter`] and the
//! host calls [`ConnectionManager::retry`] once that interval has passed.

use std::time::Duration;

use scribblefusion_shared::{decode, DrawCommand, PushMessage};

use crate::error::{SyncError, TransportError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Failed,
}

/// Fixed-interval retry schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_retries: u32,
}

/// The socket underneath the push channel.
///
/// `open` starts an attempt; its outcome is reported later through
/// [`ChannelEvent`]s unless it fails synchronously.
pub trait Transport {
    fn open(&mut self) -> Result<(), TransportError>;
    fn send(&mut self, payload: &str) -> Result<(), TransportError>;
    fn close(&mut self);
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    Opened,
    Error(String),
    Closed,
    Message(String),
}

/// A decoded push-channel update, in dispatch order.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    TimeRemaining(u64),
    Clear,
    Draw(DrawCommand),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    /// An attempt is in flight.
    Pending,
    Opened,
    RetryAfter(Duration),
    Failed { attempts: u32 },
    Closed,
    Inbound(Vec<Inbound>),
    Ignored,
}

pub struct ConnectionManager<T> {
    transport: T,
    policy: RetryPolicy,
    state: ConnectionState,
    retry_count: u32,
    awaiting_retry: bool,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            state: ConnectionState::Idle,
            retry_count: 0,
            awaiting_retry: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn connect(&mut self) -> Transition {
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Open) {
            log::debug!("connect ignored, channel is {:?}", self.state);
            return Transition::Ignored;
        }
        self.retry_count = 0;
        self.attempt()
    }

    /// Runs the attempt scheduled by a previous [`Transition::RetryAfter`].
    pub fn retry(&mut self) -> Transition {
        if self.state != ConnectionState::Connecting || !self.awaiting_retry {
            return Transition::Ignored;
        }
        self.attempt()
    }

    pub fn disconnect(&mut self) {
        if self.state != ConnectionState::Idle {
            self.transport.close();
        }
        self.awaiting_retry = false;
        self.state = ConnectionState::Closed;
    }

    pub fn handle_event(&mut self, event: ChannelEvent) -> Transition {
        let attempting = self.state == ConnectionState::Connecting && !self.awaiting_retry;
        match event {
            ChannelEvent::Opened if attempting => {
                self.mark_open();
                Transition::Opened
            }
            ChannelEvent::Error(reason) if attempting => {
                log::warn!("push channel attempt failed: {reason}");
                self.fail_attempt()
            }
            ChannelEvent::Closed if attempting => {
                log::warn!("push channel closed while connecting");
                self.fail_attempt()
            }
            ChannelEvent::Error(_) | ChannelEvent::Closed
                if self.state == ConnectionState::Open =>
            {
                log::info!("push channel closed");
                self.transport.close();
                self.state = ConnectionState::Closed;
                Transition::Closed
            }
            ChannelEvent::Message(raw) if attempting || self.state == ConnectionState::Open => {
                if attempting {
                    log::debug!("message arrived before open");
                    self.mark_open();
                }
                match self.on_message(&raw) {
                    Ok(inbound) => Transition::Inbound(inbound),
                    Err(error) => {
                        log::warn!("{error}");
                        Transition::Ignored
                    }
                }
            }
            _ => Transition::Ignored,
        }
    }

    /// Parses one push-channel payload.
    ///
    /// A clear signal ends dispatch for that message. Draw entries that fail to decode
    /// are logged and skipped.
    pub fn on_message(&self, raw: &str) -> Result<Vec<Inbound>, SyncError> {
        let message: PushMessage = serde_json::from_str(raw).map_err(SyncError::MalformedMessage)?;
        let mut inbound = Vec::new();
        if let Some(secs) = message.time_remaining {
            inbound.push(Inbound::TimeRemaining(secs));
        }
        if message.clear_canvas {
            inbound.push(Inbound::Clear);
            return Ok(inbound);
        }
        for entry in message.data.map(|data| data.into_vec()).unwrap_or_default() {
            match decode(&entry) {
                Ok(cmd) => inbound.push(Inbound::Draw(cmd)),
                Err(error) => log::warn!("skipping live command: {error}"),
            }
        }
        Ok(inbound)
    }

    /// Submits one encoded command. Nothing is queued when the channel is not open.
    pub fn send(&mut self, encoded: &str) -> Result<(), SyncError> {
        if self.state != ConnectionState::Open {
            return Err(SyncError::NotOpen(self.state));
        }
        self.transport.send(encoded)?;
        Ok(())
    }

    fn attempt(&mut self) -> Transition {
        self.state = ConnectionState::Connecting;
        self.awaiting_retry = false;
        log::debug!(
            "opening push channel (attempt {})",
            self.retry_count + 1
        );
        match self.transport.open() {
            Ok(()) => Transition::Pending,
            Err(error) => {
                log::warn!("{error}");
                self.fail_attempt()
            }
        }
    }

    fn fail_attempt(&mut self) -> Transition {
        if self.retry_count < self.policy.max_retries {
            self.retry_count += 1;
            self.awaiting_retry = true;
            log::info!(
                "push channel connection failed, retrying... ({}/{})",
                self.retry_count,
                self.policy.max_retries
            );
            Transition::RetryAfter(self.policy.interval)
        } else {
            self.state = ConnectionState::Failed;
            self.awaiting_retry = false;
            let attempts = self.retry_count + 1;
            log::error!("{}", SyncError::TransportFailure { attempts });
            Transition::Failed { attempts }
        }
    }

    fn mark_open(&mut self) {
        log::info!("push channel established");
        self.state = ConnectionState::Open;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn policy(interval_ms: u64, max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(interval_ms),
            max_retries,
        }
    }

    /// Drives retries against a virtual clock until the manager settles.
    fn run_to_completion<T: Transport>(
        manager: &mut ConnectionManager<T>,
        mut transition: Transition,
        mut on_pending: impl FnMut(&mut ConnectionManager<T>) -> Transition,
    ) -> (Transition, Duration) {
        let mut elapsed = Duration::ZERO;
        loop {
            transition = match transition {
                Transition::RetryAfter(delay) => {
                    elapsed += delay;
                    manager.retry()
                }
                Transition::Pending => on_pending(manager),
                settled => return (settled, elapsed),
            };
        }
    }

    #[test]
    fn retry_bound_against_failing_transport() {
        let mut manager = ConnectionManager::new(MockTransport::always_failing(100), policy(100, 3));
        let first = manager.connect();
        let (settled, elapsed) = run_to_completion(&mut manager, first, |_| {
            panic!("transport fails synchronously")
        });
        assert_eq!(settled, Transition::Failed { attempts: 4 });
        assert_eq!(manager.transport().opens, 4);
        assert_eq!(manager.state(), ConnectionState::Failed);
        assert!(elapsed >= Duration::from_millis(300) && elapsed <= Duration::from_millis(400));
    }

    #[test]
    fn retry_bound_with_asynchronous_errors() {
        let mut manager = ConnectionManager::new(MockTransport::default(), policy(100, 3));
        let first = manager.connect();
        let (settled, elapsed) = run_to_completion(&mut manager, first, |manager| {
            manager.handle_event(ChannelEvent::Error("refused".into()))
        });
        assert_eq!(settled, Transition::Failed { attempts: 4 });
        assert_eq!(manager.transport().opens, 4);
        assert_eq!(elapsed, Duration::from_millis(300));
    }

    #[test]
    fn error_followed_by_close_counts_once() {
        let mut manager = ConnectionManager::new(MockTransport::default(), policy(100, 3));
        assert_eq!(manager.connect(), Transition::Pending);
        assert_eq!(
            manager.handle_event(ChannelEvent::Error("refused".into())),
            Transition::RetryAfter(Duration::from_millis(100))
        );
        assert_eq!(manager.handle_event(ChannelEvent::Closed), Transition::Ignored);
        assert_eq!(manager.retry_count(), 1);
        assert_eq!(manager.retry(), Transition::Pending);
        assert_eq!(manager.retry(), Transition::Ignored);
        assert_eq!(manager.transport().opens, 2);
    }

    #[test]
    fn opens_after_a_retry() {
        let mut transport = MockTransport::always_failing(1);
        transport.open_results.push_back(Ok(()));
        let mut manager = ConnectionManager::new(transport, policy(5000, 10));
        assert_eq!(
            manager.connect(),
            Transition::RetryAfter(Duration::from_millis(5000))
        );
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(manager.retry(), Transition::Pending);
        assert_eq!(manager.handle_event(ChannelEvent::Opened), Transition::Opened);
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[test]
    fn drop_after_open_is_terminal() {
        let mut manager = ConnectionManager::new(MockTransport::default(), policy(100, 3));
        manager.connect();
        manager.handle_event(ChannelEvent::Opened);
        assert_eq!(manager.handle_event(ChannelEvent::Closed), Transition::Closed);
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(manager.retry(), Transition::Ignored);
        assert_eq!(manager.transport().opens, 1);

        assert_eq!(manager.connect(), Transition::Pending);
        assert_eq!(manager.transport().opens, 2);
    }

    #[test]
    fn send_requires_open_channel() {
        let mut manager = ConnectionManager::new(MockTransport::default(), policy(100, 3));
        let error = manager.send("0 0 1 1 red").unwrap_err();
        assert!(matches!(error, SyncError::NotOpen(ConnectionState::Idle)));

        manager.connect();
        assert!(manager.send("0 0 1 1 red").is_err());
        manager.handle_event(ChannelEvent::Opened);
        manager.send("0 0 1 1 red").unwrap();
        assert_eq!(manager.transport().sent, vec!["0 0 1 1 red".to_string()]);
    }

    #[test]
    fn transport_send_failure_is_reported() {
        let mut manager = ConnectionManager::new(MockTransport::default(), policy(100, 3));
        manager.connect();
        manager.handle_event(ChannelEvent::Opened);
        manager.transport_mut().fail_sends = true;
        assert!(matches!(
            manager.send("0 0 1 1 red"),
            Err(SyncError::Transport(TransportError::Send(_)))
        ));
    }

    #[test]
    fn clear_short_circuits_data() {
        let manager = ConnectionManager::new(MockTransport::default(), policy(100, 3));
        let inbound = manager
            .on_message(r#"{"clear_canvas": true, "time_remaining": 0, "data": "0 0 1 1 red"}"#)
            .unwrap();
        assert_eq!(inbound, vec![Inbound::TimeRemaining(0), Inbound::Clear]);
    }

    #[test]
    fn data_is_dispatched_in_order() {
        let manager = ConnectionManager::new(MockTransport::default(), policy(100, 3));
        let inbound = manager
            .on_message(r#"{"data": ["0 0 0.5 0.5 red", "bad", "0.5 0.5 1 1 blue"]}"#)
            .unwrap();
        assert_eq!(
            inbound,
            vec![
                Inbound::Draw(DrawCommand::new(0.0, 0.0, 0.5, 0.5, "red")),
                Inbound::Draw(DrawCommand::new(0.5, 0.5, 1.0, 1.0, "blue")),
            ]
        );
        let single = manager.on_message(r#"{"data": "0 0 1 1 green"}"#).unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn malformed_message_is_ignored() {
        let mut manager = ConnectionManager::new(MockTransport::default(), policy(100, 3));
        assert!(matches!(
            manager.on_message("not json"),
            Err(SyncError::MalformedMessage(_))
        ));
        manager.connect();
        manager.handle_event(ChannelEvent::Opened);
        assert_eq!(
            manager.handle_event(ChannelEvent::Message("not json".into())),
            Transition::Ignored
        );
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[test]
    fn message_before_open_promotes_channel() {
        let mut manager = ConnectionManager::new(MockTransport::default(), policy(100, 3));
        manager.connect();
        let transition =
            manager.handle_event(ChannelEvent::Message(r#"{"time_remaining": 12}"#.into()));
        assert_eq!(
            transition,
            Transition::Inbound(vec![Inbound::TimeRemaining(12)])
        );
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[test]
    fn disconnect_closes_transport() {
        let mut manager = ConnectionManager::new(MockTransport::default(), policy(100, 3));
        manager.connect();
        manager.handle_event(ChannelEvent::Opened);
        manager.disconnect();
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(manager.transport().closes, 1);
        assert_eq!(
            manager.handle_event(ChannelEvent::Message(r#"{"time_remaining": 1}"#.into())),
            Transition::Ignored
        );
    }
}
