//! Closed notification and session-event unions.
//!
//! The platform delivers exactly three inbound notification kinds (screen,
//! inventory, chat) plus screen teardown; they are modeled as one tagged
//! union rather than open-ended callback registration so routing stays
//! exhaustive and testable.

use serde::{Deserialize, Serialize};

use crate::screen::SessionState;

/// Columns of the visible allocation grid.
pub const GRID_COLUMNS: u8 = 9;

/// Rows of the visible allocation grid.
pub const GRID_ROWS: u8 = 5;

/// Number of inventory slots constituting the visible grid. Slots beyond
/// this block belong to the player inventory, not this UI, and are ignored.
pub const GRID_SLOTS: usize = GRID_COLUMNS as usize * GRID_ROWS as usize;

/// One opaque item entry from an inventory-contents notification.
///
/// Entries arrive already split into a display name and lore lines; decoding
/// them into attribute records is the [`AttributeDecoder`] collaborator's
/// job.
///
/// [`AttributeDecoder`]: crate::ports::AttributeDecoder
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEntry {
    pub name: String,
    pub lore: Vec<String>,
}

impl ItemEntry {
    pub fn new(name: impl Into<String>, lore: Vec<String>) -> Self {
        Self {
            name: name.into(),
            lore,
        }
    }

    /// An empty grid cell.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Externally delivered notification, in platform arrival order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// A screen was (re)created server-side with a fresh correlation id.
    ScreenOpened {
        sync_id: i32,
        title: String,
        columns: u8,
        rows: u8,
    },

    /// Full inventory contents for the screen identified by `sync_id`.
    InventoryReceived {
        sync_id: i32,
        items: Vec<ItemEntry>,
    },

    /// One line of plain chat text.
    ChatMessage { text: String },

    /// The user closed the screen client-side.
    ScreenClosed,
}

/// Events published by the session for UI listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session FSM moved to a new state.
    StateChanged(SessionState),

    /// The visible attribute set changed (new snapshot or preview edit).
    AttributesChanged,
}
