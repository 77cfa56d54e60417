//! Sequencer: drives compiled command sequences one server action at a time
//! and owns the preview shadow state.
//!
//! Commands are sent optimistically; the only completion signal is a later
//! chat line, so the allocator parks between actions and is re-entered by
//! the feature router whenever a matching notification arrives. There is no
//! timeout: an action whose confirmation never arrives stalls in its
//! waiting state until the user intervenes.

use std::iter::Peekable;
use std::vec::IntoIter;

use indexmap::IndexMap;
use stat_core::{Command, PlayerAttribute, StatProfile};
use tracing::warn;

use crate::error::SessionError;
use crate::ports::SessionPorts;
use crate::screen::{ScreenSession, SessionState};

const RESET_CONFIRMATION: &str = "You successfully reset your attributes";
const ALLOCATION_CONFIRMATION: &str = "You successfully leveled up your";
const OUT_OF_POINTS_REJECTION: &str = "You do not have 1 attribute point";

/// Command-execution engine plus local preview simulation.
///
/// Exactly one allocation run may be in progress at a time; its pending
/// commands live here. While preview is enabled the allocator also carries a
/// shadow copy of the attribute snapshot and shadow spent/total counters
/// that are adjusted locally instead of talking to the server.
pub struct StatAllocator {
    sequence: Option<Peekable<IntoIter<Command>>>,
    preview: bool,
    preview_attributes: Option<IndexMap<String, PlayerAttribute>>,
    preview_spent: Option<u32>,
    preview_total: Option<u32>,
}

impl StatAllocator {
    pub fn new() -> Self {
        Self {
            sequence: None,
            preview: false,
            preview_attributes: None,
            preview_spent: None,
            preview_total: None,
        }
    }

    /// Starts executing a profile's compiled command sequence.
    ///
    /// Rejected without any state change while another run is in progress.
    /// Returns whether the first step changed attributes locally (a preview
    /// reset does).
    pub fn allocate(
        &mut self,
        profile: &StatProfile,
        screen: &mut ScreenSession,
        ports: &mut SessionPorts,
    ) -> Result<bool, SessionError> {
        if self.is_allocating() {
            return Err(SessionError::AllocationInProgress);
        }

        // A fresh request recovers an errored session.
        if matches!(
            screen.state(),
            SessionState::Failed | SessionState::CapacityExceeded
        ) {
            screen.change_state(SessionState::Idle);
        }

        self.sequence = Some(profile.compile().into_iter().peekable());
        Ok(self.step(screen, ports))
    }

    /// Executes the next pending command, if any.
    ///
    /// Called on start and re-entered after every resolved command. Parks in
    /// `WaitingForSyncId`/`WaitingForInventory` when a precondition is
    /// missing; the matching notification resumes it. Returns whether
    /// attributes changed locally.
    pub fn step(&mut self, screen: &mut ScreenSession, ports: &mut SessionPorts) -> bool {
        loop {
            let exhausted = self
                .sequence
                .as_mut()
                .is_none_or(|sequence| sequence.peek().is_none());
            if exhausted {
                self.stop(screen);
                return false;
            }

            if !Self::sync_id_ready(screen) || !Self::inventory_ready(screen) {
                return false;
            }

            let Some(command) = self.sequence.as_mut().and_then(|sequence| sequence.next()) else {
                self.stop(screen);
                return false;
            };

            match command {
                Command::Reset => return self.reset_stats(screen, ports),
                Command::Increment(name) => {
                    let Some(attribute) =
                        screen.attributes().and_then(|map| map.get(&name)).cloned()
                    else {
                        // The profile references an attribute this session
                        // does not have; skip the command, never the run.
                        warn!("attribute not found: {name}");
                        continue;
                    };

                    if self.preview {
                        warn!("sequenced increments do not support preview; stopping run");
                        self.stop(screen);
                        return false;
                    }

                    return self.adjust_stat(&attribute, attribute.cost as i32, screen, ports);
                }
            }
        }
    }

    /// Resets all attributes by activating the reallocation slot.
    ///
    /// In preview mode the shadow state is cleared locally and the server is
    /// not contacted.
    pub fn reset_stats(&mut self, screen: &mut ScreenSession, ports: &mut SessionPorts) -> bool {
        let state = screen.state();
        if state != SessionState::Idle && state != SessionState::CapacityExceeded {
            warn!("cannot reset attributes while in state {state}");
            return false;
        }

        if screen.waiting_for_screen() {
            warn!("screen is not ready; aborting reset");
            self.stop_with(screen, SessionState::Failed);
            return false;
        }

        let Some(slot) = screen.reallocation_slot() else {
            warn!("reallocation slot unknown; aborting reset");
            self.stop_with(screen, SessionState::Failed);
            return false;
        };

        if self.preview {
            return self.preview_reset(ports);
        }

        let Some(sync_id) = screen.sync_id() else {
            self.stop_with(screen, SessionState::Failed);
            return false;
        };

        // The server recreates the screen as a side effect of a reset, so
        // the current id is about to go stale.
        screen.change_state(SessionState::WaitingForReset);
        screen.invalidate_screen();
        ports.interaction.click_slot(sync_id, slot);
        false
    }

    /// Spends one point on the named attribute.
    pub fn increment_stat(
        &mut self,
        name: &str,
        screen: &mut ScreenSession,
        ports: &mut SessionPorts,
    ) -> bool {
        let Some(attribute) = self.lookup(name, screen) else {
            warn!("attribute not found: {name}");
            return false;
        };
        self.adjust_stat(&attribute, attribute.cost as i32, screen, ports)
    }

    /// Takes one point back from the named attribute.
    ///
    /// The server's click interaction can only ever add a point, so
    /// decrements exist in preview mode only.
    pub fn decrement_stat(
        &mut self,
        name: &str,
        screen: &mut ScreenSession,
        ports: &mut SessionPorts,
    ) -> bool {
        let Some(attribute) = self.lookup(name, screen) else {
            warn!("attribute not found: {name}");
            return false;
        };

        if !self.preview {
            warn!("cannot decrement {name} outside preview mode");
            ports.feedback.play_deny();
            return false;
        }

        self.adjust_stat(&attribute, -(attribute.cost as i32), screen, ports)
    }

    fn adjust_stat(
        &mut self,
        attribute: &PlayerAttribute,
        delta: i32,
        screen: &mut ScreenSession,
        ports: &mut SessionPorts,
    ) -> bool {
        if screen.state() != SessionState::Idle {
            warn!(
                "cannot adjust {} while in state {}",
                attribute.name,
                screen.state()
            );
            return false;
        }

        if screen.waiting_for_screen() {
            warn!("screen is not ready; aborting adjustment");
            self.stop_with(screen, SessionState::Failed);
            return false;
        }

        if self.preview {
            return self.preview_adjust(attribute, delta, ports);
        }

        let Some(sync_id) = screen.sync_id() else {
            self.stop_with(screen, SessionState::Failed);
            return false;
        };

        screen.change_state(SessionState::WaitingForAllocation);
        screen.invalidate_screen();
        ports.interaction.click_slot(sync_id, attribute.slot);
        false
    }

    /// Resolves an outstanding command from one line of chat text.
    ///
    /// Returns true when the message was consumed as a confirmation or
    /// rejection. Messages arriving in any other state, or not matching a
    /// recognized phrase, are ignored.
    pub fn handle_chat(
        &mut self,
        message: &str,
        screen: &mut ScreenSession,
        ports: &mut SessionPorts,
    ) -> bool {
        match screen.state() {
            SessionState::WaitingForReset if message.contains(RESET_CONFIRMATION) => {
                self.step(screen, ports);
                true
            }
            SessionState::WaitingForAllocation if message.contains(ALLOCATION_CONFIRMATION) => {
                self.step(screen, ports);
                true
            }
            SessionState::WaitingForAllocation if message.contains(OUT_OF_POINTS_REJECTION) => {
                self.stop_with(screen, SessionState::CapacityExceeded);

                // The screen is not recreated when capacity is exceeded, so
                // the current sync id is still valid.
                screen.set_dirty_sync_id(false);
                true
            }
            _ => false,
        }
    }

    /// Drops any pending commands and returns the session to `Idle`.
    pub fn stop(&mut self, screen: &mut ScreenSession) {
        self.stop_with(screen, SessionState::Idle);
    }

    fn stop_with(&mut self, screen: &mut ScreenSession, state: SessionState) {
        self.sequence = None;
        screen.change_state(state);
    }

    /// Enables or disables the local preview simulation.
    ///
    /// Enabling snapshots shadow copies of the attribute set and the
    /// spent/total counters; disabling drops them, restoring the live view
    /// untouched regardless of how many preview adjustments were made.
    pub fn set_preview(&mut self, enabled: bool, screen: &ScreenSession) {
        self.preview = enabled;

        if enabled {
            self.preview_attributes = Some(screen.attributes().cloned().unwrap_or_default());
            self.preview_spent = screen.spent_points();
            self.preview_total = screen.total_points();
        } else {
            self.preview_attributes = None;
            self.preview_spent = None;
            self.preview_total = None;
        }
    }

    pub fn is_preview(&self) -> bool {
        self.preview
    }

    pub fn is_allocating(&self) -> bool {
        self.sequence.is_some()
    }

    /// The attribute set currently shown to the user: the shadow copy while
    /// preview is enabled, the live snapshot otherwise.
    pub fn attributes<'a>(
        &'a self,
        screen: &'a ScreenSession,
    ) -> Option<&'a IndexMap<String, PlayerAttribute>> {
        if self.preview {
            self.preview_attributes.as_ref()
        } else {
            screen.attributes()
        }
    }

    pub fn spent_points(&self, screen: &ScreenSession) -> Option<u32> {
        if self.preview {
            self.preview_spent
        } else {
            screen.spent_points()
        }
    }

    pub fn available_points(&self, screen: &ScreenSession) -> Option<u32> {
        if self.preview {
            match (self.preview_total, self.preview_spent) {
                (Some(total), Some(spent)) => Some(total.saturating_sub(spent)),
                _ => None,
            }
        } else {
            screen.available_points()
        }
    }

    pub fn total_points(&self, screen: &ScreenSession) -> Option<u32> {
        if self.preview {
            self.preview_total
        } else {
            screen.total_points()
        }
    }

    fn lookup(&self, name: &str, screen: &ScreenSession) -> Option<PlayerAttribute> {
        self.attributes(screen)
            .and_then(|map| map.get(name))
            .cloned()
    }

    fn preview_reset(&mut self, ports: &mut SessionPorts) -> bool {
        self.preview_spent = Some(0);
        ports.feedback.play_confirm();

        if let Some(attributes) = self.preview_attributes.as_mut() {
            for attribute in attributes.values_mut() {
                *attribute = attribute.cleared();
            }
        }
        true
    }

    fn preview_adjust(
        &mut self,
        attribute: &PlayerAttribute,
        delta: i32,
        ports: &mut SessionPorts,
    ) -> bool {
        let (Some(spent), Some(total)) = (self.preview_spent, self.preview_total) else {
            warn!("preview counters unknown; cannot adjust {}", attribute.name);
            ports.feedback.play_deny();
            return false;
        };

        let adjusted = i64::from(spent) + i64::from(delta);
        if adjusted < 0 || adjusted > i64::from(total) {
            warn!("preview adjustment out of range for {}", attribute.name);
            ports.feedback.play_deny();
            return false;
        }

        let Some(updated) = attribute.adjust(delta) else {
            warn!("failed to adjust attribute {}", attribute.name);
            ports.feedback.play_deny();
            return false;
        };

        self.preview_spent = Some(adjusted as u32);
        ports.feedback.play_confirm();

        self.preview_attributes
            .get_or_insert_with(IndexMap::new)
            .insert(updated.name.clone(), updated);
        true
    }

    fn sync_id_ready(screen: &mut ScreenSession) -> bool {
        if screen.is_dirty_sync_id() || screen.sync_id().is_none() {
            screen.change_state(SessionState::WaitingForSyncId);
            return false;
        }
        true
    }

    fn inventory_ready(screen: &mut ScreenSession) -> bool {
        if screen.reallocation_slot().is_none() || screen.attributes().is_none() {
            screen.change_state(SessionState::WaitingForInventory);
            return false;
        }
        true
    }
}

impl Default for StatAllocator {
    fn default() -> Self {
        Self::new()
    }
}
