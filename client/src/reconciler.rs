//! Merges the history log with live updates.
//!
//! Every replay starts from a cleared surface and redraws the whole fetched log. Replays
//! are tagged with a generation; a response that arrives after a newer replay has started
//! (or after a clear signal) is discarded. Live commands that arrive while a replay is in
//! flight are held back and drawn after the history unless the history already had them.
//!
//! The history response and the push channel race each other, so relays of commands that
//! were already in the fetched history can still arrive after a replay completes. The
//! server relays in the order it records, which makes those relays a run at the head of
//! the live stream: they are matched against what is left of the fetched history, and the
//! first live command outside it ends the run.

use std::collections::{HashMap, VecDeque};

use scribblefusion_shared::{decode_history_body, decode_history_entry, DrawCommand, LogicalSize};

use crate::error::{FetchError, SyncError};
use crate::surface::{render_command, DrawingSurface};

const ECHO_LEDGER_CAPACITY: usize = 4096;

/// Identifies one `begin_replay` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReplayTicket {
    generation: u64,
    size: LogicalSize,
}

impl ReplayTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn size(&self) -> LogicalSize {
        self.size
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub rendered: usize,
    pub malformed: usize,
    pub already_drawn: usize,
    pub live: usize,
}

#[derive(Debug)]
pub enum ReplayOutcome {
    Rendered(ReplayStats),
    /// A newer replay or a clear made this response stale.
    Superseded,
    Failed(SyncError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiveOutcome {
    Drawn,
    /// Our own segment relayed back by the server.
    Echo,
    Buffered,
    /// Already drawn from the fetched history.
    Replayed,
    NotRenderable,
}

struct PendingReplay {
    generation: u64,
    drawn_locally: Vec<String>,
    live: Vec<(String, DrawCommand)>,
}

pub struct HistoryReconciler {
    stroke_width: f64,
    size: LogicalSize,
    generation: u64,
    pending: Option<PendingReplay>,
    echoes: VecDeque<String>,
    /// Fetched history entries whose relay has not been seen yet.
    replayed: HashMap<String, usize>,
}

impl HistoryReconciler {
    pub fn new(stroke_width: f64) -> Self {
        Self {
            stroke_width,
            size: LogicalSize {
                width: 0.0,
                height: 0.0,
            },
            generation: 0,
            pending: None,
            echoes: VecDeque::new(),
            replayed: HashMap::new(),
        }
    }

    pub fn size(&self) -> LogicalSize {
        self.size
    }

    pub fn is_replaying(&self) -> bool {
        self.pending.is_some()
    }

    /// Clears the surface and starts a new replay at `size`, superseding any
    /// replay still in flight.
    pub fn begin_replay<S: DrawingSurface + ?Sized>(
        &mut self,
        size: LogicalSize,
        surface: &mut S,
    ) -> ReplayTicket {
        self.generation += 1;
        if self.pending.is_some() {
            log::debug!("replay superseded by generation {}", self.generation);
        }
        self.size = size;
        surface.clear();
        self.echoes.clear();
        self.replayed.clear();
        self.pending = Some(PendingReplay {
            generation: self.generation,
            drawn_locally: Vec::new(),
            live: Vec::new(),
        });
        ReplayTicket {
            generation: self.generation,
            size,
        }
    }

    /// Renders a fetched history body for `ticket`, or drops it if stale.
    pub fn complete_replay<S: DrawingSurface + ?Sized>(
        &mut self,
        ticket: ReplayTicket,
        body: Result<String, FetchError>,
        surface: &mut S,
    ) -> ReplayOutcome {
        let current =
            matches!(&self.pending, Some(pending) if pending.generation == ticket.generation);
        if !current {
            log::debug!("discarding stale history for generation {}", ticket.generation);
            return ReplayOutcome::Superseded;
        }
        let Some(pending) = self.pending.take() else {
            return ReplayOutcome::Superseded;
        };
        let PendingReplay {
            mut drawn_locally,
            live,
            ..
        } = pending;

        let entries = match body.and_then(|body| {
            decode_history_body(&body).map_err(|error| FetchError::Body(error.to_string()))
        }) {
            Ok(entries) => entries,
            Err(error) => {
                log::error!("history replay failed: {error}");
                for (_, cmd) in &live {
                    self.draw(cmd, surface);
                }
                return ReplayOutcome::Failed(SyncError::FetchFailure(error));
            }
        };

        let mut stats = ReplayStats::default();
        let mut history_keys: HashMap<String, usize> = HashMap::new();
        for (index, raw) in entries.iter().enumerate() {
            let cmd = match decode_history_entry(raw) {
                Ok(cmd) => cmd,
                Err(error) => {
                    log::warn!("skipping history entry {index}: {error}");
                    stats.malformed += 1;
                    continue;
                }
            };
            let key = cmd.encode();
            if let Some(position) = drawn_locally.iter().position(|drawn| *drawn == key) {
                drawn_locally.swap_remove(position);
                stats.already_drawn += 1;
            } else if self.draw(&cmd, surface) {
                stats.rendered += 1;
            }
            *history_keys.entry(key).or_default() += 1;
        }

        self.replayed = history_keys;
        for (key, cmd) in live {
            if self.consume_replayed(&key) {
                continue;
            }
            if self.draw(&cmd, surface) {
                stats.live += 1;
            }
        }

        log::info!(
            "replayed {} history commands ({} malformed, {} live)",
            stats.rendered,
            stats.malformed,
            stats.live
        );
        ReplayOutcome::Rendered(stats)
    }

    /// Draws a segment produced by this client and remembers it so the server's
    /// relay of it is not drawn a second time.
    pub fn draw_local<S: DrawingSurface + ?Sized>(&mut self, cmd: &DrawCommand, surface: &mut S) {
        if !self.draw(cmd, surface) {
            return;
        }
        let key = cmd.encode();
        if let Some(pending) = self.pending.as_mut() {
            pending.drawn_locally.push(key.clone());
        }
        if self.echoes.len() == ECHO_LEDGER_CAPACITY {
            self.echoes.pop_front();
        }
        self.echoes.push_back(key);
    }

    pub fn apply_live<S: DrawingSurface + ?Sized>(
        &mut self,
        cmd: DrawCommand,
        surface: &mut S,
    ) -> LiveOutcome {
        if !cmd.is_renderable() {
            return LiveOutcome::NotRenderable;
        }
        let key = cmd.encode();
        let replayed = self.consume_replayed(&key);
        if let Some(position) = self.echoes.iter().position(|echo| *echo == key) {
            self.echoes.remove(position);
            return LiveOutcome::Echo;
        }
        if replayed {
            return LiveOutcome::Replayed;
        }
        if let Some(pending) = self.pending.as_mut() {
            pending.live.push((key, cmd));
            return LiveOutcome::Buffered;
        }
        self.draw(&cmd, surface);
        LiveOutcome::Drawn
    }

    /// Handles the server's clear signal. Any replay in flight describes the board
    /// before the clear and is dropped.
    pub fn apply_clear<S: DrawingSurface + ?Sized>(&mut self, surface: &mut S) {
        if self.pending.take().is_some() {
            self.generation += 1;
            log::debug!("clear signal superseded pending replay");
        }
        self.echoes.clear();
        self.replayed.clear();
        surface.clear();
    }

    /// Matches a live command against the fetched history that has not been relayed
    /// yet. A miss means every such relay has gone by.
    fn consume_replayed(&mut self, key: &str) -> bool {
        match self.replayed.get_mut(key) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    self.replayed.remove(key);
                }
                true
            }
            None => {
                if !self.replayed.is_empty() {
                    log::debug!("{} history relays never arrived", self.replayed.len());
                    self.replayed.clear();
                }
                false
            }
        }
    }

    fn draw<S: DrawingSurface + ?Sized>(&self, cmd: &DrawCommand, surface: &mut S) -> bool {
        render_command(surface, cmd, self.size, self.stroke_width)
    }
}
