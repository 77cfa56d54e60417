//! Outbound trait boundaries to platform collaborators.
//!
//! These traits are the only way the session reaches the outside world:
//! slot clicks toward the server, audible cues toward the user, and tooltip
//! decoding delegated back to the platform. Implementations are injected
//! once and owned by the session for its lifetime.

use stat_core::PlayerAttribute;

use crate::event::ItemEntry;
use crate::repository::ProfileRepository;

/// Fire-and-forget slot activation against the server.
///
/// A click carries the correlation id it was generated under; the server
/// rejects mismatched ids. There is no return value: outcome arrives later
/// as chat and inventory notifications.
pub trait InteractionPort: Send {
    fn click_slot(&mut self, sync_id: i32, slot: usize);
}

/// Audible feedback cues for interactive preview adjustments.
pub trait FeedbackPort: Send {
    /// Played when a preview adjustment is applied.
    fn play_confirm(&mut self);

    /// Played when a preview adjustment is rejected.
    fn play_deny(&mut self);
}

/// Decodes opaque item entries into attribute records.
///
/// Tooltip formats are a platform concern; the session only recognizes the
/// reallocation sentinel itself and otherwise consumes whatever the decoder
/// produces.
pub trait AttributeDecoder: Send {
    /// Decodes an entry into an attribute record, or `None` when the entry
    /// is not an attribute item.
    fn decode(&self, entry: &ItemEntry, slot: usize) -> Option<PlayerAttribute>;

    /// Extracts the available-points counter from an attribute item's
    /// descriptive text.
    fn available_points(&self, entry: &ItemEntry) -> Option<u32>;
}

/// Aggregates the outbound ports so session entry points take one handle.
///
/// Profile persistence rides along here as well: the session never reads or
/// writes storage directly, only through the injected
/// [`ProfileRepository`].
pub struct SessionPorts {
    pub interaction: Box<dyn InteractionPort>,
    pub feedback: Box<dyn FeedbackPort>,
    pub decoder: Box<dyn AttributeDecoder>,
    pub profiles: Box<dyn ProfileRepository>,
}

impl SessionPorts {
    pub fn new(
        interaction: impl InteractionPort + 'static,
        feedback: impl FeedbackPort + 'static,
        decoder: impl AttributeDecoder + 'static,
        profiles: impl ProfileRepository + 'static,
    ) -> Self {
        Self {
            interaction: Box::new(interaction),
            feedback: Box::new(feedback),
            decoder: Box::new(decoder),
            profiles: Box::new(profiles),
        }
    }
}
