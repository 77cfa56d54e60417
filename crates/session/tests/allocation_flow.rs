//! End-to-end allocation scenarios driven through the feature router.
//!
//! The server side is played by hand: notifications are delivered in the
//! order the platform would deliver them, and outbound clicks/cues are
//! recorded through fake ports.

use std::sync::{Arc, Mutex};

use stat_core::{AttributeCategory, PlayerAttribute, StatProfile};
use stat_session::{
    AttributeDecoder, FeatureConfig, FeedbackPort, GRID_SLOTS, InMemoryProfileRepo,
    InteractionPort, ItemEntry, Notification, REALLOCATION_ITEM_NAME, SessionError, SessionEvent,
    SessionPorts, SessionState, SessionWorker, StatScreenFeature,
};

// ----------------------------------------------------------------------------
// Fake ports
// ----------------------------------------------------------------------------

#[derive(Clone, Default)]
struct ClickLog(Arc<Mutex<Vec<(i32, usize)>>>);

impl ClickLog {
    fn clicks(&self) -> Vec<(i32, usize)> {
        self.0.lock().unwrap().clone()
    }
}

struct RecordingInteraction(ClickLog);

impl InteractionPort for RecordingInteraction {
    fn click_slot(&mut self, sync_id: i32, slot: usize) {
        self.0.0.lock().unwrap().push((sync_id, slot));
    }
}

#[derive(Clone, Default)]
struct CueLog(Arc<Mutex<Vec<&'static str>>>);

impl CueLog {
    fn cues(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

struct RecordingFeedback(CueLog);

impl FeedbackPort for RecordingFeedback {
    fn play_confirm(&mut self) {
        self.0.0.lock().unwrap().push("confirm");
    }

    fn play_deny(&mut self) {
        self.0.0.lock().unwrap().push("deny");
    }
}

/// Decoder over a compact lore format used only by tests:
/// `spent <n>/<max> cost <c>` marks an attribute item and `points <n>`
/// carries the available counter.
struct LoreDecoder;

impl AttributeDecoder for LoreDecoder {
    fn decode(&self, entry: &ItemEntry, slot: usize) -> Option<PlayerAttribute> {
        let line = entry.lore.iter().find(|l| l.starts_with("spent "))?;
        let (spent, rest) = line.strip_prefix("spent ")?.split_once('/')?;
        let (max, cost) = rest.split_once(" cost ")?;
        Some(PlayerAttribute::new(
            entry.name.clone(),
            AttributeCategory::Other,
            spent.parse().ok()?,
            max.parse().ok()?,
            cost.parse().ok()?,
            slot,
        ))
    }

    fn available_points(&self, entry: &ItemEntry) -> Option<u32> {
        entry
            .lore
            .iter()
            .find_map(|l| l.strip_prefix("points ")?.parse().ok())
    }
}

// ----------------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------------

const FEROCITY_SLOT: usize = 3;
const SENTINEL_SLOT: usize = 8;

fn new_feature() -> (StatScreenFeature, ClickLog, CueLog) {
    let clicks = ClickLog::default();
    let cues = CueLog::default();
    let ports = SessionPorts::new(
        RecordingInteraction(clicks.clone()),
        RecordingFeedback(cues.clone()),
        LoreDecoder,
        InMemoryProfileRepo::new(),
    );
    (
        StatScreenFeature::new(FeatureConfig::default(), ports),
        clicks,
        cues,
    )
}

fn open_screen(feature: &mut StatScreenFeature, sync_id: i32) -> bool {
    feature.handle_notification(Notification::ScreenOpened {
        sync_id,
        title: "Talents".to_string(),
        columns: 9,
        rows: 5,
    })
}

/// A 45-slot grid holding the reallocation sentinel plus one attribute.
fn grid(spent: u32, available: u32) -> Vec<ItemEntry> {
    let mut items = vec![ItemEntry::empty(); GRID_SLOTS];
    items[SENTINEL_SLOT] = ItemEntry::new(
        REALLOCATION_ITEM_NAME,
        vec![format!("You have spent a total of {spent} attributes.")],
    );
    items[FEROCITY_SLOT] = ItemEntry::new(
        "Ferocity",
        vec![
            format!("spent {spent}/5 cost 1"),
            format!("points {available}"),
        ],
    );
    items
}

fn deliver_inventory(feature: &mut StatScreenFeature, sync_id: i32, items: Vec<ItemEntry>) -> bool {
    feature.handle_notification(Notification::InventoryReceived { sync_id, items })
}

fn deliver_chat(feature: &mut StatScreenFeature, text: &str) -> bool {
    feature.handle_notification(Notification::ChatMessage {
        text: text.to_string(),
    })
}

fn anchored_feature(sync_id: i32, spent: u32, available: u32) -> (StatScreenFeature, ClickLog, CueLog)
{
    let (mut feature, clicks, cues) = new_feature();
    open_screen(&mut feature, sync_id);
    deliver_inventory(&mut feature, sync_id, grid(spent, available));
    (feature, clicks, cues)
}

// ----------------------------------------------------------------------------
// Interactive single-step scenarios
// ----------------------------------------------------------------------------

#[test]
fn interactive_increment_clicks_and_waits() {
    let (mut feature, clicks, _) = anchored_feature(7, 0, 5);
    assert_eq!(feature.state(), SessionState::Idle);

    feature.increment_stat("Ferocity");

    assert_eq!(feature.state(), SessionState::WaitingForAllocation);
    assert!(feature.screen().is_dirty_sync_id());
    assert_eq!(clicks.clicks(), vec![(7, FEROCITY_SLOT)]);

    let consumed = deliver_chat(&mut feature, "You successfully leveled up your Ferocity");
    assert!(consumed);
    assert_eq!(feature.state(), SessionState::Idle);
}

#[test]
fn capacity_rejection_clears_the_dirty_flag() {
    let (mut feature, _, _) = anchored_feature(7, 0, 5);
    feature.increment_stat("Ferocity");
    assert!(feature.screen().is_dirty_sync_id());

    let consumed = deliver_chat(&mut feature, "You do not have 1 attribute point");
    assert!(consumed);
    assert_eq!(feature.state(), SessionState::CapacityExceeded);
    assert!(!feature.screen().is_dirty_sync_id());
}

#[test]
fn unrelated_chat_is_ignored() {
    let (mut feature, _, _) = anchored_feature(7, 0, 5);
    feature.increment_stat("Ferocity");

    assert!(!deliver_chat(&mut feature, "Welcome to the server!"));
    assert_eq!(feature.state(), SessionState::WaitingForAllocation);

    // Confirmations outside a waiting state are also ignored.
    let (mut idle_feature, _, _) = anchored_feature(7, 0, 5);
    assert!(!deliver_chat(
        &mut idle_feature,
        "You successfully leveled up your Ferocity"
    ));
    assert_eq!(idle_feature.state(), SessionState::Idle);
}

#[test]
fn increment_refused_while_an_action_is_outstanding() {
    let (mut feature, clicks, _) = anchored_feature(7, 0, 5);
    feature.increment_stat("Ferocity");
    feature.increment_stat("Ferocity");

    // The second request is refused, not queued.
    assert_eq!(clicks.clicks().len(), 1);
    assert_eq!(feature.state(), SessionState::WaitingForAllocation);
}

#[test]
fn decrement_outside_preview_is_refused() {
    let (mut feature, clicks, cues) = anchored_feature(7, 2, 3);

    feature.decrement_stat("Ferocity");

    assert!(clicks.clicks().is_empty());
    assert_eq!(cues.cues(), vec!["deny"]);
    assert_eq!(feature.state(), SessionState::Idle);
}

// ----------------------------------------------------------------------------
// Sequenced allocation
// ----------------------------------------------------------------------------

#[test]
fn allocate_parks_until_the_session_is_anchored() {
    let (mut feature, clicks, _) = new_feature();

    let mut profile = StatProfile::new("dps");
    profile.set("Ferocity", 2);
    feature.allocate(&profile).unwrap();

    // No sync id yet: the run parks without issuing any click.
    assert_eq!(feature.state(), SessionState::WaitingForSyncId);
    assert!(feature.is_allocating());
    assert!(clicks.clicks().is_empty());

    // The id arrives but the snapshot is still missing.
    open_screen(&mut feature, 7);
    assert_eq!(feature.state(), SessionState::WaitingForInventory);
    assert!(clicks.clicks().is_empty());

    // Once anchored, exactly one click fires: the reset, not the increments.
    deliver_inventory(&mut feature, 7, grid(0, 5));
    assert_eq!(clicks.clicks(), vec![(7, SENTINEL_SLOT)]);
    assert_eq!(feature.state(), SessionState::WaitingForReset);
}

#[test]
fn second_allocate_is_rejected_without_disturbing_the_run() {
    let (mut feature, _, _) = new_feature();

    let mut profile = StatProfile::new("dps");
    profile.set("Ferocity", 1);
    feature.allocate(&profile).unwrap();

    let rejected = feature.allocate(&profile);
    assert_eq!(rejected, Err(SessionError::AllocationInProgress));
    assert!(feature.is_allocating());
    assert_eq!(feature.state(), SessionState::WaitingForSyncId);
}

#[test]
fn allocation_drives_reset_then_increments_to_completion() {
    let (mut feature, clicks, _) = anchored_feature(7, 0, 5);

    let mut profile = StatProfile::new("dps");
    profile.set("Ferocity", 2);
    feature.allocate(&profile).unwrap();

    // Reset goes out first under the anchored id.
    assert_eq!(clicks.clicks(), vec![(7, SENTINEL_SLOT)]);
    assert_eq!(feature.state(), SessionState::WaitingForReset);

    // The server resets, recreates the screen, and resends the inventory.
    deliver_chat(&mut feature, "You successfully reset your attributes.");
    assert_eq!(feature.state(), SessionState::WaitingForSyncId);
    open_screen(&mut feature, 8);
    deliver_inventory(&mut feature, 8, grid(0, 5));
    assert_eq!(clicks.clicks(), vec![(7, SENTINEL_SLOT), (8, FEROCITY_SLOT)]);
    assert_eq!(feature.state(), SessionState::WaitingForAllocation);

    // First increment confirmed; the screen refreshes again.
    deliver_chat(&mut feature, "You successfully leveled up your Ferocity");
    open_screen(&mut feature, 9);
    deliver_inventory(&mut feature, 9, grid(1, 4));
    assert_eq!(
        clicks.clicks(),
        vec![(7, SENTINEL_SLOT), (8, FEROCITY_SLOT), (9, FEROCITY_SLOT)]
    );

    // Second increment confirmed: the sequence is exhausted.
    deliver_chat(&mut feature, "You successfully leveled up your Ferocity");
    assert_eq!(feature.state(), SessionState::Idle);
    assert!(!feature.is_allocating());
}

#[test]
fn unknown_attribute_keys_are_skipped_not_fatal() {
    let (mut feature, clicks, _) = anchored_feature(7, 0, 5);

    let mut profile = StatProfile::new("imported");
    profile.set("Bloodlust", 1); // not present on this server
    profile.set("Ferocity", 1);
    feature.allocate(&profile).unwrap();

    deliver_chat(&mut feature, "You successfully reset your attributes.");
    open_screen(&mut feature, 8);
    deliver_inventory(&mut feature, 8, grid(0, 5));

    // The unknown key was skipped; the click targets Ferocity directly.
    assert_eq!(clicks.clicks(), vec![(7, SENTINEL_SLOT), (8, FEROCITY_SLOT)]);

    deliver_chat(&mut feature, "You successfully leveled up your Ferocity");
    assert_eq!(feature.state(), SessionState::Idle);
    assert!(!feature.is_allocating());
}

#[test]
fn capacity_rejection_aborts_a_sequenced_run() {
    let (mut feature, _, _) = anchored_feature(7, 0, 5);

    let mut profile = StatProfile::new("greedy");
    profile.set("Ferocity", 5);
    feature.allocate(&profile).unwrap();

    deliver_chat(&mut feature, "You successfully reset your attributes.");
    open_screen(&mut feature, 8);
    deliver_inventory(&mut feature, 8, grid(0, 5));
    assert_eq!(feature.state(), SessionState::WaitingForAllocation);

    deliver_chat(&mut feature, "You do not have 1 attribute point");
    assert_eq!(feature.state(), SessionState::CapacityExceeded);
    assert!(!feature.is_allocating());
    assert!(!feature.screen().is_dirty_sync_id());

    // CapacityExceeded is recoverable: a fresh allocate starts over.
    feature.allocate(&profile).unwrap();
    assert!(feature.is_allocating());
}

#[test]
fn reset_without_a_ready_screen_hard_aborts() {
    let (mut feature, clicks, _) = anchored_feature(7, 0, 5);
    feature.handle_notification(Notification::ScreenClosed);

    let mut profile = StatProfile::new("dps");
    profile.set("Ferocity", 1);
    feature.allocate(&profile).unwrap();

    assert_eq!(feature.state(), SessionState::Failed);
    assert!(!feature.is_allocating());
    assert!(clicks.clicks().is_empty());
}

#[test]
fn failed_state_recovers_on_screen_reopen() {
    let (mut feature, clicks, _) = anchored_feature(7, 0, 5);
    feature.handle_notification(Notification::ScreenClosed);

    // Acting without a screen is a hard abort.
    feature.increment_stat("Ferocity");
    assert_eq!(feature.state(), SessionState::Failed);
    assert!(clicks.clicks().is_empty());

    // Re-entering the screen recovers the session.
    open_screen(&mut feature, 8);
    assert_eq!(feature.state(), SessionState::Idle);
    deliver_inventory(&mut feature, 8, grid(0, 5));

    feature.increment_stat("Ferocity");
    assert_eq!(clicks.clicks(), vec![(8, FEROCITY_SLOT)]);
}

#[test]
fn stop_drops_the_run_and_returns_to_idle() {
    let (mut feature, _, _) = new_feature();

    let mut profile = StatProfile::new("dps");
    profile.set("Ferocity", 1);
    feature.allocate(&profile).unwrap();
    assert!(feature.is_allocating());

    feature.stop();
    assert!(!feature.is_allocating());
    assert_eq!(feature.state(), SessionState::Idle);
}

// ----------------------------------------------------------------------------
// Preview mode
// ----------------------------------------------------------------------------

#[test]
fn preview_adjustments_stay_local_and_respect_bounds() {
    let (mut feature, clicks, cues) = anchored_feature(7, 0, 2);

    feature.set_preview(true);
    feature.increment_stat("Ferocity");
    feature.increment_stat("Ferocity");

    assert_eq!(feature.spent_points(), Some(2));
    assert_eq!(feature.available_points(), Some(0));
    assert!(clicks.clicks().is_empty());
    assert_eq!(cues.cues(), vec!["confirm", "confirm"]);

    // A third point would exceed the total: rejected, snapshot untouched.
    let before = feature.attributes().cloned();
    feature.increment_stat("Ferocity");
    assert_eq!(feature.attributes().cloned(), before);
    assert_eq!(feature.spent_points(), Some(2));
    assert_eq!(cues.cues(), vec!["confirm", "confirm", "deny"]);

    // Below zero is rejected the same way.
    feature.decrement_stat("Ferocity");
    feature.decrement_stat("Ferocity");
    feature.decrement_stat("Ferocity");
    assert_eq!(feature.spent_points(), Some(0));
    assert_eq!(cues.cues().last(), Some(&"deny"));
}

#[test]
fn toggling_preview_off_restores_the_live_counters() {
    let (mut feature, _, _) = anchored_feature(7, 1, 4);

    let live_attributes = feature.attributes().cloned();
    feature.set_preview(true);
    feature.increment_stat("Ferocity");
    feature.increment_stat("Ferocity");
    assert_eq!(feature.spent_points(), Some(3));

    feature.set_preview(false);
    assert_eq!(feature.spent_points(), Some(1));
    assert_eq!(feature.available_points(), Some(4));
    assert_eq!(feature.total_points(), Some(5));
    assert_eq!(feature.attributes().cloned(), live_attributes);
}

#[test]
fn preview_reset_clears_shadow_state_without_contacting_the_server() {
    let (mut feature, clicks, cues) = anchored_feature(7, 2, 3);

    feature.set_preview(true);
    feature.reset_stats();

    assert_eq!(feature.spent_points(), Some(0));
    assert_eq!(feature.attributes().unwrap()["Ferocity"].spent, 0);
    assert!(clicks.clicks().is_empty());
    assert_eq!(cues.cues(), vec!["confirm"]);
    assert_eq!(feature.state(), SessionState::Idle);

    // The live snapshot is untouched underneath.
    feature.set_preview(false);
    assert_eq!(feature.spent_points(), Some(2));
    assert_eq!(feature.attributes().unwrap()["Ferocity"].spent, 2);
}

#[test]
fn sequenced_run_in_preview_applies_the_reset_and_goes_no_further() {
    let (mut feature, clicks, cues) = anchored_feature(7, 2, 3);

    feature.set_preview(true);

    let mut profile = StatProfile::new("dps");
    profile.set("Ferocity", 2);
    feature.allocate(&profile).unwrap();

    // The reset was simulated locally; nothing reached the server and the
    // iterator does not advance on its own.
    assert_eq!(feature.spent_points(), Some(0));
    assert!(clicks.clicks().is_empty());
    assert_eq!(cues.cues(), vec!["confirm"]);
    assert_eq!(feature.state(), SessionState::Idle);
    assert!(feature.is_allocating());
}

// ----------------------------------------------------------------------------
// Router gating
// ----------------------------------------------------------------------------

#[test]
fn foreign_screens_are_not_consumed() {
    let (mut feature, _, _) = new_feature();

    let wrong_title = Notification::ScreenOpened {
        sync_id: 3,
        title: "Bank Vault".to_string(),
        columns: 9,
        rows: 5,
    };
    assert!(!feature.handle_notification(wrong_title));

    let wrong_shape = Notification::ScreenOpened {
        sync_id: 3,
        title: "Talents".to_string(),
        columns: 9,
        rows: 3,
    };
    assert!(!feature.handle_notification(wrong_shape));

    assert_eq!(feature.screen().sync_id(), None);
}

#[test]
fn inventory_for_a_stale_sync_id_is_ignored() {
    let (mut feature, _, _) = new_feature();
    open_screen(&mut feature, 7);

    assert!(!deliver_inventory(&mut feature, 6, grid(0, 5)));
    assert!(feature.screen().attributes().is_none());

    assert!(deliver_inventory(&mut feature, 7, grid(0, 5)));
    assert!(feature.screen().attributes().is_some());
}

#[test]
fn disabled_feature_ignores_every_notification() {
    let clicks = ClickLog::default();
    let ports = SessionPorts::new(
        RecordingInteraction(clicks.clone()),
        RecordingFeedback(CueLog::default()),
        LoreDecoder,
        InMemoryProfileRepo::new(),
    );
    let config = FeatureConfig {
        enabled: false,
        ..FeatureConfig::default()
    };
    let mut feature = StatScreenFeature::new(config, ports);

    assert!(!open_screen(&mut feature, 7));
    assert!(!deliver_inventory(&mut feature, 7, grid(0, 5)));
    assert_eq!(feature.screen().sync_id(), None);
}

#[test]
fn snapshot_profile_captures_the_current_allocation() {
    let (mut feature, _, _) = anchored_feature(7, 2, 3);

    let profile = feature.snapshot_profile("current").unwrap();
    assert_eq!(profile.get("Ferocity"), 2);

    // Preview edits are captured from the shadow view.
    feature.set_preview(true);
    feature.increment_stat("Ferocity");
    let preview_profile = feature.snapshot_profile("preview").unwrap();
    assert_eq!(preview_profile.get("Ferocity"), 3);
}

#[test]
fn profiles_persist_through_the_repository_port() {
    let (mut feature, _, _) = anchored_feature(7, 2, 3);

    let profile = feature.snapshot_profile("current").unwrap();
    feature.save_profile(&profile).unwrap();

    let saved = feature.saved_profiles().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].compile(), profile.compile());

    feature.remove_profile("current").unwrap();
    assert!(feature.saved_profiles().unwrap().is_empty());
}

// ----------------------------------------------------------------------------
// Worker actor
// ----------------------------------------------------------------------------

#[tokio::test]
async fn worker_serializes_entry_points() {
    let clicks = ClickLog::default();
    let ports = SessionPorts::new(
        RecordingInteraction(clicks.clone()),
        RecordingFeedback(CueLog::default()),
        LoreDecoder,
        InMemoryProfileRepo::new(),
    );
    let (handle, join) = SessionWorker::spawn(FeatureConfig::default(), ports);

    handle
        .notify(Notification::ScreenOpened {
            sync_id: 7,
            title: "Talents".to_string(),
            columns: 9,
            rows: 5,
        })
        .await
        .unwrap();
    handle
        .notify(Notification::InventoryReceived {
            sync_id: 7,
            items: grid(2, 3),
        })
        .await
        .unwrap();

    assert_eq!(handle.state().await.unwrap(), SessionState::Idle);

    let points = handle.points().await.unwrap();
    assert_eq!(points.spent, Some(2));
    assert_eq!(points.total, Some(5));

    let snapshot = handle.snapshot_profile("current").await.unwrap().unwrap();
    assert_eq!(snapshot.get("Ferocity"), 2);

    handle.save_profile(snapshot).await.unwrap();
    assert_eq!(handle.saved_profiles().await.unwrap().len(), 1);

    let mut events = handle.subscribe_events();

    let mut profile = StatProfile::new("dps");
    profile.set("Ferocity", 3);
    handle.allocate(profile.clone()).await.unwrap();
    assert_eq!(clicks.clicks(), vec![(7, SENTINEL_SLOT)]);

    // The run is in progress; a racing allocate is rejected.
    assert_eq!(
        handle.allocate(profile).await,
        Err(SessionError::AllocationInProgress)
    );

    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::StateChanged(SessionState::WaitingForReset)
    );

    drop(handle);
    join.await.unwrap();
}
