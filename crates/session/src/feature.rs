//! Feature-level routing and the user-facing session surface.
//!
//! `StatScreenFeature` is the context object embedders own: it gates raw
//! platform notifications (only the allocation screen is interesting),
//! bridges the session controller and the sequencer, and publishes
//! coarse-grained events for UI listeners.

use std::env;
use std::str::FromStr;

use indexmap::IndexMap;
use stat_core::{PlayerAttribute, StatProfile};
use tokio::sync::broadcast;
use tracing::debug;

use crate::allocator::StatAllocator;
use crate::error::SessionError;
use crate::event::{GRID_COLUMNS, GRID_ROWS, Notification, SessionEvent};
use crate::ports::SessionPorts;
use crate::repository::StoreError;
use crate::screen::{ScreenSession, SessionState};

const EVENT_CAPACITY: usize = 64;

/// Configuration for the allocation-screen feature.
#[derive(Clone, Debug)]
pub struct FeatureConfig {
    /// Master toggle; a disabled feature ignores every notification.
    pub enabled: bool,

    /// Title of the server screen this feature anchors to.
    pub screen_title: String,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            screen_title: "Talents".to_string(),
        }
    }
}

impl FeatureConfig {
    /// Construct configuration from process environment variables.
    ///
    /// - `STAT_FEATURE_ENABLED`
    /// - `STAT_SCREEN_TITLE`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(enabled) = read_env::<bool>("STAT_FEATURE_ENABLED") {
            config.enabled = enabled;
        }

        if let Ok(title) = env::var("STAT_SCREEN_TITLE")
            && !title.is_empty()
        {
            config.screen_title = title;
        }

        config
    }
}

fn read_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

/// Owns the session controller, the sequencer, and the outbound ports.
pub struct StatScreenFeature {
    config: FeatureConfig,
    screen: ScreenSession,
    allocator: StatAllocator,
    ports: SessionPorts,
    events: broadcast::Sender<SessionEvent>,
}

impl StatScreenFeature {
    pub fn new(config: FeatureConfig, ports: SessionPorts) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            screen: ScreenSession::new(),
            allocator: StatAllocator::new(),
            ports,
            events,
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_channel(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Routes one externally delivered notification.
    ///
    /// Returns true when the notification was consumed by this feature.
    /// Screen-opened events are gated on the configured title and the 9x5
    /// grid shape; inventory events on the currently expected sync id.
    pub fn handle_notification(&mut self, notification: Notification) -> bool {
        if !self.config.enabled {
            return false;
        }

        match notification {
            Notification::ScreenOpened {
                sync_id,
                title,
                columns,
                rows,
            } => {
                if columns != GRID_COLUMNS || rows != GRID_ROWS {
                    return false;
                }
                if title != self.config.screen_title {
                    return false;
                }

                let before = self.screen.state();
                if self.screen.open_screen(sync_id, title) {
                    self.allocator.step(&mut self.screen, &mut self.ports);
                }
                self.publish_state_delta(before);
                true
            }

            Notification::InventoryReceived { sync_id, items } => {
                if self.screen.sync_id() != Some(sync_id) {
                    return false;
                }

                let before = self.screen.state();
                let resume = self
                    .screen
                    .receive_inventory(&items, self.ports.decoder.as_ref());
                self.notify_attributes_changed();
                if resume {
                    self.allocator.step(&mut self.screen, &mut self.ports);
                }
                self.publish_state_delta(before);
                true
            }

            Notification::ChatMessage { text } => {
                let before = self.screen.state();
                let consumed =
                    self.allocator
                        .handle_chat(&text, &mut self.screen, &mut self.ports);
                self.publish_state_delta(before);
                consumed
            }

            Notification::ScreenClosed => {
                self.screen.close_screen();
                true
            }
        }
    }

    /// Starts executing a profile against the server.
    pub fn allocate(&mut self, profile: &StatProfile) -> Result<(), SessionError> {
        let before = self.screen.state();
        let changed = self
            .allocator
            .allocate(profile, &mut self.screen, &mut self.ports)?;
        if changed {
            self.notify_attributes_changed();
        }
        self.publish_state_delta(before);
        Ok(())
    }

    /// Spends one point on the named attribute.
    pub fn increment_stat(&mut self, name: &str) {
        let before = self.screen.state();
        let changed = self
            .allocator
            .increment_stat(name, &mut self.screen, &mut self.ports);
        if changed {
            self.notify_attributes_changed();
        }
        self.publish_state_delta(before);
    }

    /// Takes one point back from the named attribute (preview only).
    pub fn decrement_stat(&mut self, name: &str) {
        let before = self.screen.state();
        let changed = self
            .allocator
            .decrement_stat(name, &mut self.screen, &mut self.ports);
        if changed {
            self.notify_attributes_changed();
        }
        self.publish_state_delta(before);
    }

    /// Resets all attributes.
    pub fn reset_stats(&mut self) {
        let before = self.screen.state();
        let changed = self.allocator.reset_stats(&mut self.screen, &mut self.ports);
        if changed {
            self.notify_attributes_changed();
        }
        self.publish_state_delta(before);
    }

    /// Drops any in-progress run and returns the session to idle.
    pub fn stop(&mut self) {
        let before = self.screen.state();
        self.allocator.stop(&mut self.screen);
        self.publish_state_delta(before);
    }

    /// Enables or disables preview mode.
    pub fn set_preview(&mut self, enabled: bool) {
        self.allocator.set_preview(enabled, &self.screen);
        self.notify_attributes_changed();
    }

    pub fn is_preview(&self) -> bool {
        self.allocator.is_preview()
    }

    pub fn is_allocating(&self) -> bool {
        self.allocator.is_allocating()
    }

    pub fn state(&self) -> SessionState {
        self.screen.state()
    }

    /// Read access to the session controller (sync id, readiness, snapshot).
    pub fn screen(&self) -> &ScreenSession {
        &self.screen
    }

    /// The attribute set currently shown to the user.
    pub fn attributes(&self) -> Option<&IndexMap<String, PlayerAttribute>> {
        self.allocator.attributes(&self.screen)
    }

    pub fn spent_points(&self) -> Option<u32> {
        self.allocator.spent_points(&self.screen)
    }

    pub fn available_points(&self) -> Option<u32> {
        self.allocator.available_points(&self.screen)
    }

    pub fn total_points(&self) -> Option<u32> {
        self.allocator.total_points(&self.screen)
    }

    /// Captures the currently shown allocation as a savable profile.
    pub fn snapshot_profile(&self, name: impl Into<String>) -> Option<StatProfile> {
        self.attributes()
            .map(|attributes| StatProfile::from_attributes(name, attributes))
    }

    /// Persists a profile through the injected repository.
    pub fn save_profile(&self, profile: &StatProfile) -> Result<(), StoreError> {
        self.ports.profiles.save(profile)
    }

    /// Removes a saved profile by name.
    pub fn remove_profile(&self, name: &str) -> Result<(), StoreError> {
        self.ports.profiles.remove(name)
    }

    /// Lists every saved profile.
    pub fn saved_profiles(&self) -> Result<Vec<StatProfile>, StoreError> {
        self.ports.profiles.list()
    }

    fn publish_state_delta(&self, before: SessionState) {
        let after = self.screen.state();
        if after != before && self.events.send(SessionEvent::StateChanged(after)).is_err() {
            debug!("no session event subscribers");
        }
    }

    fn notify_attributes_changed(&self) {
        if self.events.send(SessionEvent::AttributesChanged).is_err() {
            debug!("no session event subscribers");
        }
    }
}
