use std::{collections::VecDeque, time::Duration};

use swarasync_core::{Command, NodeId};

/// Inputs captured between updates, applied at the start of the next step.
#[derive(Debug, Default)]
pub struct InputQueue {
    pending: VecDeque<Command>,
}

impl InputQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a press captured at `at`.
    pub fn press(&mut self, at: Duration) {
        self.pending.push_back(Command::Press { at });
    }

    /// Records a release captured at `at`.
    pub fn release(&mut self, at: Duration) {
        self.pending.push_back(Command::Release { at });
    }

    /// Records a tap captured at `at`, optionally aimed at a specific node.
    pub fn tap(&mut self, node: Option<NodeId>, at: Duration) {
        self.pending.push_back(Command::Tap { node, at });
    }

    /// Requests a pause.
    pub fn pause(&mut self) {
        self.pending.push_back(Command::Pause);
    }

    /// Requests that a paused session resume.
    pub fn resume(&mut self) {
        self.pending.push_back(Command::Resume);
    }

    /// Requests a reset of the in-flight round.
    pub fn reset(&mut self) {
        self.pending.push_back(Command::Reset);
    }

    /// Requests a fresh session.
    pub fn start_session(&mut self) {
        self.pending.push_back(Command::StartSession);
    }

    /// Number of inputs waiting to be applied.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no inputs are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Command> + '_ {
        self.pending.drain(..)
    }
}
