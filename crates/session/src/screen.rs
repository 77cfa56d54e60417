//! Session controller: correlation-id truth, snapshot truth, and the
//! waiting-state machine.
//!
//! The server is the sole source of truth for allocations. This module owns
//! everything the client knows about the server's current screen instance:
//! the correlation id (sync id) and its staleness flag, the last-received
//! attribute snapshot, the reallocation-slot index, and a state machine
//! recording what the sequencer is currently waiting for.

use indexmap::IndexMap;
use stat_core::{PlayerAttribute, parse_spent_points};
use tracing::{info, warn};

use crate::event::{GRID_SLOTS, ItemEntry};
use crate::ports::AttributeDecoder;

/// Display name of the sentinel item that resets all attributes when
/// activated.
pub const REALLOCATION_ITEM_NAME: &str = "Reallocate Attributes";

/// What the session is currently waiting for.
///
/// `Idle` is both the initial state and the resting state between commands.
/// No state is terminal: `Failed` and `CapacityExceeded` are left by
/// re-entering the screen or issuing a fresh request.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    /// A reset click is outstanding; resolved by chat confirmation.
    WaitingForReset,
    /// An increment click is outstanding; resolved by chat confirmation.
    WaitingForAllocation,
    /// The correlation id is stale or unset; resolved by a screen-opened
    /// notification.
    WaitingForSyncId,
    /// No attribute snapshot or reallocation slot yet; resolved by an
    /// inventory-contents notification.
    WaitingForInventory,
    /// The server rejected an increment for lack of points.
    CapacityExceeded,
    /// A precondition was violated at the moment of a direct user action.
    Failed,
}

/// Client-side anchor for one server screen instance.
pub struct ScreenSession {
    state: SessionState,

    /// Correlation id of the current screen. The server assigns a new one on
    /// every refresh; actions sent under a stale id are rejected.
    sync_id: Option<i32>,

    /// Set whenever the screen is expected to be recreated; cleared when a
    /// fresh id arrives.
    dirty_sync_id: bool,

    /// Title of the currently open screen, `None` once the user closes it.
    screen_title: Option<String>,

    /// Last-received attribute snapshot, keyed by display name. Replaced
    /// wholesale on every inventory notification.
    attributes: Option<IndexMap<String, PlayerAttribute>>,

    /// Slot index of the reallocation sentinel, discovered by scanning the
    /// snapshot.
    reallocation_slot: Option<usize>,

    /// Total points spent, parsed from the sentinel item's lore.
    spent_points: Option<u32>,

    /// Points still available, parsed from an attribute item's lore.
    available_points: Option<u32>,

    /// Forces the next inventory receipt to re-parse the available-points
    /// counter (set when a screen is recreated over an existing one).
    should_parse_points: bool,
}

impl ScreenSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            sync_id: None,
            dirty_sync_id: true,
            screen_title: None,
            attributes: None,
            reallocation_slot: None,
            spent_points: None,
            available_points: None,
            should_parse_points: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn change_state(&mut self, state: SessionState) {
        info!("changing session state to {state}");
        self.state = state;
    }

    pub fn sync_id(&self) -> Option<i32> {
        self.sync_id
    }

    pub fn is_dirty_sync_id(&self) -> bool {
        self.dirty_sync_id
    }

    pub fn set_dirty_sync_id(&mut self, dirty: bool) {
        self.dirty_sync_id = dirty;
    }

    /// Marks the correlation id stale ahead of an expected screen refresh.
    pub fn invalidate_screen(&mut self) {
        self.dirty_sync_id = true;
    }

    /// Anchors the session to a (re)created screen.
    ///
    /// A prior screen means the server refreshed over an existing session:
    /// the snapshot must be re-derived from the next inventory receipt and
    /// the available-points counter re-parsed.
    ///
    /// Returns true when a parked sequencer should resume.
    pub fn open_screen(&mut self, sync_id: i32, title: impl Into<String>) -> bool {
        if self.screen_title.is_some() {
            self.should_parse_points = true;
        }
        self.screen_title = Some(title.into());
        self.attributes = None;

        // Re-entering the screen recovers an errored session.
        if matches!(
            self.state,
            SessionState::Failed | SessionState::CapacityExceeded
        ) {
            self.change_state(SessionState::Idle);
        }

        self.set_sync_id(sync_id)
    }

    /// Forgets the screen reference after a user close.
    ///
    /// The correlation id, snapshot and reallocation slot are deliberately
    /// retained: re-opening must not force a full rescan unless the server
    /// also invalidates the id.
    pub fn close_screen(&mut self) {
        self.screen_title = None;
    }

    pub fn has_screen(&self) -> bool {
        self.screen_title.is_some()
    }

    pub fn screen_title(&self) -> Option<&str> {
        self.screen_title.as_deref()
    }

    /// Records a fresh correlation id, clearing the staleness flag.
    ///
    /// Returns true when a parked sequencer should resume.
    pub fn set_sync_id(&mut self, sync_id: i32) -> bool {
        self.sync_id = Some(sync_id);
        self.dirty_sync_id = false;

        if self.state == SessionState::WaitingForSyncId {
            self.change_state(SessionState::Idle);
            return true;
        }
        false
    }

    /// Readiness predicate: true while no usable screen anchor exists.
    ///
    /// Command execution must refuse to proceed while this holds.
    pub fn waiting_for_screen(&self) -> bool {
        self.dirty_sync_id || self.sync_id.is_none() || self.screen_title.is_none()
    }

    /// Ingests a full inventory-contents notification.
    ///
    /// Scans the visible grid block only. The reallocation sentinel records
    /// its slot and supplies the spent-points total; every other entry the
    /// decoder recognizes becomes part of the new snapshot (name collisions
    /// overwrite). The first decoded attribute after a screen (re)creation
    /// seeds the available-points counter. The snapshot is replaced
    /// atomically; partial updates are not supported.
    ///
    /// Returns true when a parked sequencer should resume.
    pub fn receive_inventory(&mut self, items: &[ItemEntry], decoder: &dyn AttributeDecoder) -> bool {
        let mut attributes = IndexMap::new();

        for (slot, entry) in items.iter().enumerate().take(GRID_SLOTS) {
            if entry.name == REALLOCATION_ITEM_NAME {
                self.reallocation_slot = Some(slot);
                self.parse_reallocation_item(entry);
                continue;
            }

            if let Some(attribute) = decoder.decode(entry, slot) {
                if self.available_points.is_none() || self.should_parse_points {
                    self.available_points = decoder.available_points(entry);
                    self.should_parse_points = false;
                }
                attributes.insert(attribute.name.clone(), attribute);
            }
        }

        self.attributes = Some(attributes);

        if self.state == SessionState::WaitingForInventory {
            self.change_state(SessionState::Idle);
            return true;
        }
        false
    }

    pub fn attributes(&self) -> Option<&IndexMap<String, PlayerAttribute>> {
        self.attributes.as_ref()
    }

    pub fn reallocation_slot(&self) -> Option<usize> {
        self.reallocation_slot
    }

    pub fn spent_points(&self) -> Option<u32> {
        self.spent_points
    }

    pub fn available_points(&self) -> Option<u32> {
        self.available_points
    }

    pub fn total_points(&self) -> Option<u32> {
        Some(self.available_points? + self.spent_points?)
    }

    fn parse_reallocation_item(&mut self, entry: &ItemEntry) {
        for line in &entry.lore {
            if let Some(spent) = parse_spent_points(line) {
                self.spent_points = Some(spent);
                return;
            }
        }
        warn!("no spent-points total found on the reallocation item");
    }
}

impl Default for ScreenSession {
    fn default() -> Self {
        Self::new()
    }
}
