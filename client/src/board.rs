use scribblefusion_shared::{fit_canvas, DrawCommand, LogicalSize, ScreenPoint, ScreenRect};

use crate::config::SyncConfig;
use crate::connection::{ChannelEvent, ConnectionManager, ConnectionState, Inbound, Transition, Transport};
use crate::error::{FetchError, SyncError};
use crate::reconciler::{HistoryReconciler, ReplayOutcome, ReplayTicket};
use crate::session::DrawSession;
use crate::surface::DrawingSurface;

/// One participant's view of the shared canvas.
///
/// Local segments are drawn immediately and then submitted; channel updates and
/// history replays flow through the reconciler onto the same surface.
pub struct Board<T, S> {
    config: SyncConfig,
    connection: ConnectionManager<T>,
    reconciler: HistoryReconciler,
    session: DrawSession,
    surface: S,
    time_remaining: Option<u64>,
    revealed: bool,
}

impl<T: Transport, S: DrawingSurface> Board<T, S> {
    pub fn new(config: SyncConfig, transport: T, surface: S) -> Self {
        let connection = ConnectionManager::new(transport, config.retry_policy());
        let reconciler = HistoryReconciler::new(config.stroke_width);
        Self {
            config,
            connection,
            reconciler,
            session: DrawSession::new(scribblefusion_shared::FALLBACK_COLOR),
            surface,
            time_remaining: None,
            revealed: false,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn logical_size(&self) -> LogicalSize {
        self.session.size()
    }

    pub fn time_remaining(&self) -> Option<u64> {
        self.time_remaining
    }

    pub fn set_color(&mut self, color: &str) {
        self.session.set_color(color);
    }

    pub fn connect(&mut self) -> Transition {
        self.connection.connect()
    }

    pub fn retry(&mut self) -> Transition {
        self.connection.retry()
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Feeds one transport event through the connection and applies whatever it
    /// carried.
    pub fn handle_channel_event(&mut self, event: ChannelEvent) -> Transition {
        let transition = self.connection.handle_event(event);
        if let Transition::Inbound(inbound) = &transition {
            for update in inbound {
                self.apply(update.clone());
            }
        }
        transition
    }

    /// Refits the canvas to the viewport and starts a full replay at the new size.
    /// The caller fetches history and hands the body to [`Board::finish_replay`].
    pub fn resize(&mut self, viewport_width: f64, available_height: f64) -> ReplayTicket {
        let size = fit_canvas(viewport_width, available_height, self.config.aspect_ratio);
        log::debug!("canvas resized to {}x{}", size.width, size.height);
        self.session.set_size(size);
        self.surface.resize(size);
        self.reconciler.begin_replay(size, &mut self.surface)
    }

    pub fn finish_replay(
        &mut self,
        ticket: ReplayTicket,
        body: Result<String, FetchError>,
    ) -> ReplayOutcome {
        self.reconciler
            .complete_replay(ticket, body, &mut self.surface)
    }

    pub fn pointer_down(&mut self, point: ScreenPoint, rect: ScreenRect) -> bool {
        self.session.pointer_down(point, rect)
    }

    /// Draws and submits the segment ending at `point`, if any. A segment that cannot be
    /// sent stays on this surface only.
    pub fn pointer_move(&mut self, point: ScreenPoint, rect: ScreenRect) -> Option<DrawCommand> {
        let cmd = self.session.pointer_move(point, rect)?;
        self.reconciler.draw_local(&cmd, &mut self.surface);
        if let Err(error) = self.connection.send(&cmd.encode()) {
            log::error!("dropping segment: {error}");
        }
        Some(cmd)
    }

    pub fn pointer_up(&mut self) {
        self.session.pointer_up();
    }

    /// True only the first time the channel comes up. The host reveals the page
    /// then and has to fit the canvas again, since the controls bar had no height
    /// while hidden.
    pub fn reveal(&mut self) -> bool {
        !std::mem::replace(&mut self.revealed, true)
    }

    /// Error to show the user once the channel has given up.
    pub fn failure(&self) -> Option<SyncError> {
        (self.connection.state() == ConnectionState::Failed).then(|| SyncError::TransportFailure {
            attempts: self.connection.retry_count() + 1,
        })
    }

    fn apply(&mut self, update: Inbound) {
        match update {
            Inbound::TimeRemaining(secs) => self.time_remaining = Some(secs),
            Inbound::Clear => self.reconciler.apply_clear(&mut self.surface),
            Inbound::Draw(cmd) => {
                self.reconciler.apply_live(cmd, &mut self.surface);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, RecordingSurface};
    use scribblefusion_shared::{CanvasPoint, PushMessage};

    const RECT: ScreenRect = ScreenRect {
        left: 0.0,
        top: 0.0,
        width: 1600.0,
        height: 900.0,
    };

    fn open_board() -> (Board<MockTransport, RecordingSurface>, ReplayTicket) {
        let mut board = Board::new(
            SyncConfig::default(),
            MockTransport::default(),
            RecordingSurface::default(),
        );
        let ticket = board.resize(1600.0, 1000.0);
        board.connect();
        assert_eq!(board.handle_channel_event(ChannelEvent::Opened), Transition::Opened);
        (board, ticket)
    }

    fn history(commands: &[&str]) -> Result<String, FetchError> {
        let entries: Vec<String> = commands
            .iter()
            .map(|data| PushMessage::draw(data.to_string(), 60).to_json().unwrap())
            .collect();
        Ok(serde_json::to_string(&entries).unwrap())
    }

    fn push(message: &PushMessage) -> ChannelEvent {
        ChannelEvent::Message(message.to_json().unwrap())
    }

    #[test]
    fn local_segment_is_drawn_then_submitted() {
        let (mut board, ticket) = open_board();
        board.finish_replay(ticket, history(&[]));
        board.set_color("red");
        assert!(board.pointer_down(ScreenPoint { x: 0.0, y: 0.0 }, RECT));
        let cmd = board
            .pointer_move(ScreenPoint { x: 800.0, y: 450.0 }, RECT)
            .unwrap();
        assert_eq!(board.surface().lines.len(), 1);
        assert_eq!(board.connection().transport().sent, vec![cmd.encode()]);
        assert_eq!(cmd.encode(), "0 0 0.5 0.5 red");
    }

    #[test]
    fn out_of_bounds_input_is_never_submitted() {
        let (mut board, ticket) = open_board();
        board.finish_replay(ticket, history(&[]));
        assert!(!board.pointer_down(ScreenPoint { x: -5.0, y: 10.0 }, RECT));
        assert!(board
            .pointer_move(ScreenPoint { x: 10.0, y: 10.0 }, RECT)
            .is_none());

        assert!(board.pointer_down(ScreenPoint { x: 10.0, y: 10.0 }, RECT));
        assert!(board
            .pointer_move(ScreenPoint { x: 1700.0, y: 10.0 }, RECT)
            .is_none());
        assert!(board.connection().transport().sent.is_empty());
        assert!(board.surface().lines.is_empty());
    }

    #[test]
    fn send_while_closed_keeps_local_stroke() {
        let mut board = Board::new(
            SyncConfig::default(),
            MockTransport::default(),
            RecordingSurface::default(),
        );
        let ticket = board.resize(1600.0, 1000.0);
        board.finish_replay(ticket, history(&[]));
        board.pointer_down(ScreenPoint { x: 0.0, y: 0.0 }, RECT);
        assert!(board
            .pointer_move(ScreenPoint { x: 100.0, y: 100.0 }, RECT)
            .is_some());
        assert_eq!(board.surface().lines.len(), 1);
        assert!(board.connection().transport().sent.is_empty());
    }

    #[test]
    fn remote_commands_render_in_order() {
        let (mut board, ticket) = open_board();
        board.finish_replay(ticket, history(&["0 0 0.1 0.1 a"]));
        let message = PushMessage {
            time_remaining: Some(42),
            clear_canvas: false,
            data: Some(scribblefusion_shared::CommandData::Many(vec![
                "0.1 0.1 0.2 0.2 b".into(),
                "0.2 0.2 0.3 0.3 c".into(),
            ])),
        };
        board.handle_channel_event(push(&message));
        assert_eq!(board.surface().colors(), vec!["a", "b", "c"]);
        assert_eq!(board.time_remaining(), Some(42));
    }

    #[test]
    fn own_relay_is_not_drawn_again() {
        let (mut board, ticket) = open_board();
        board.finish_replay(ticket, history(&[]));
        board.pointer_down(ScreenPoint { x: 0.0, y: 0.0 }, RECT);
        let cmd = board
            .pointer_move(ScreenPoint { x: 160.0, y: 90.0 }, RECT)
            .unwrap();
        board.handle_channel_event(push(&PushMessage::draw(cmd.encode(), 10)));
        assert_eq!(board.surface().lines.len(), 1);
    }

    #[test]
    fn clear_signal_twice_equals_once() {
        let (mut board, ticket) = open_board();
        board.finish_replay(ticket, history(&["0 0 1 1 red"]));
        board.handle_channel_event(push(&PushMessage::clear()));
        let after_one = board.surface().lines.clone();
        board.handle_channel_event(push(&PushMessage::clear()));
        assert_eq!(board.surface().lines, after_one);
        assert!(after_one.is_empty());
        assert_eq!(board.time_remaining(), Some(0));
    }

    #[test]
    fn resize_replays_at_new_size() {
        let (mut board, ticket) = open_board();
        board.finish_replay(ticket, history(&["0.5 0.5 1 1 red"]));
        assert_eq!(board.surface().lines[0].to, CanvasPoint { x: 1600.0, y: 900.0 });

        let ticket = board.resize(320.0, 1000.0);
        assert!(board.surface().lines.is_empty());
        board.finish_replay(ticket, history(&["0.5 0.5 1 1 red"]));
        assert_eq!(board.surface().lines[0].from, CanvasPoint { x: 160.0, y: 90.0 });
        assert_eq!(board.surface().lines[0].to, CanvasPoint { x: 320.0, y: 180.0 });
        assert_eq!(board.surface().sizes.len(), 2);
        assert_eq!(board.logical_size(), LogicalSize { width: 320.0, height: 180.0 });
    }

    #[test]
    fn stale_replay_after_newer_resize_is_dropped() {
        let (mut board, first) = open_board();
        let second = board.resize(320.0, 1000.0);
        assert!(matches!(
            board.finish_replay(first, history(&["0 0 1 1 old"])),
            ReplayOutcome::Superseded
        ));
        board.finish_replay(second, history(&["0 0 1 1 new"]));
        assert_eq!(board.surface().colors(), vec!["new"]);
    }

    #[test]
    fn first_reveal_refits_and_replays_once() {
        let (mut board, ticket) = open_board();
        assert!(board.reveal());
        assert!(!board.reveal());

        let refit = board.resize(1600.0, 700.0);
        assert!(matches!(
            board.finish_replay(ticket, history(&["0 0 1 1 early"])),
            ReplayOutcome::Superseded
        ));
        board.finish_replay(refit, history(&["0 0 1 1 red"]));
        assert_eq!(board.surface().colors(), vec!["red"]);
        assert!(board.logical_size().height <= 700.0);
        assert!(!board.reveal());
    }

    #[test]
    fn failure_is_reported_after_retries() {
        let config = SyncConfig {
            max_retries: 1,
            ..SyncConfig::default()
        };
        let mut board = Board::new(
            config,
            MockTransport::always_failing(2),
            RecordingSurface::default(),
        );
        assert!(matches!(board.connect(), Transition::RetryAfter(_)));
        assert!(board.failure().is_none());
        assert_eq!(board.retry(), Transition::Failed { attempts: 2 });
        assert!(matches!(
            board.failure(),
            Some(SyncError::TransportFailure { attempts: 2 })
        ));
    }
}
