//! Session actor: serializes every entry point onto one tokio task.
//!
//! The allocation core assumes all notifications and requests arrive on one
//! logical thread. Embedders with a concurrent runtime get that guarantee by
//! driving the feature through [`SessionWorker`]: a background task owning
//! the [`StatScreenFeature`], fed commands over an mpsc channel and queried
//! through the cloneable [`SessionHandle`] façade.

use indexmap::IndexMap;
use stat_core::{PlayerAttribute, StatProfile};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::SessionError;
use crate::event::{Notification, SessionEvent};
use crate::feature::{FeatureConfig, StatScreenFeature};
use crate::ports::SessionPorts;
use crate::repository::StoreError;
use crate::screen::SessionState;

const COMMAND_BUFFER_SIZE: usize = 32;

/// Point counters as currently shown to the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointsSummary {
    pub spent: Option<u32>,
    pub available: Option<u32>,
    pub total: Option<u32>,
}

/// Commands that can be sent to the session worker.
pub enum SessionCommand {
    /// Deliver an external notification (screen/inventory/chat).
    Notify(Notification),
    /// Start executing a profile.
    Allocate {
        profile: StatProfile,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Spend one point on an attribute.
    IncrementStat { attribute: String },
    /// Take one point back from an attribute (preview only).
    DecrementStat { attribute: String },
    /// Reset all attributes.
    ResetStats,
    /// Drop any in-progress run.
    Stop,
    /// Toggle preview mode.
    SetPreview { enabled: bool },
    /// Query the session state (read-only).
    QueryState { reply: oneshot::Sender<SessionState> },
    /// Query the currently shown attribute set (read-only).
    QueryAttributes {
        reply: oneshot::Sender<Option<IndexMap<String, PlayerAttribute>>>,
    },
    /// Query the point counters (read-only).
    QueryPoints { reply: oneshot::Sender<PointsSummary> },
    /// Capture the currently shown allocation as a savable profile.
    SnapshotProfile {
        name: String,
        reply: oneshot::Sender<Option<StatProfile>>,
    },
    /// Persist a profile through the repository port.
    SaveProfile {
        profile: StatProfile,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    /// Remove a saved profile by name.
    RemoveProfile {
        name: String,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    /// List every saved profile.
    ListProfiles {
        reply: oneshot::Sender<Result<Vec<StatProfile>, StoreError>>,
    },
}

/// Background task that processes session commands.
pub struct SessionWorker {
    feature: StatScreenFeature,
    command_rx: mpsc::Receiver<SessionCommand>,
}

impl SessionWorker {
    /// Builds a worker plus its handle without spawning.
    pub fn new(config: FeatureConfig, ports: SessionPorts) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let feature = StatScreenFeature::new(config, ports);
        let handle = SessionHandle {
            command_tx,
            event_tx: feature.event_channel(),
        };

        (
            Self {
                feature,
                command_rx,
            },
            handle,
        )
    }

    /// Spawns the worker onto the current tokio runtime.
    pub fn spawn(config: FeatureConfig, ports: SessionPorts) -> (SessionHandle, JoinHandle<()>) {
        let (worker, handle) = Self::new(config, ports);
        (handle, tokio::spawn(worker.run()))
    }

    /// Main worker loop; exits when every handle is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(command) = self.command_rx.recv() => {
                    self.handle_command(command);
                }
                else => break,
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Notify(notification) => {
                self.feature.handle_notification(notification);
            }
            SessionCommand::Allocate { profile, reply } => {
                let result = self.feature.allocate(&profile);
                if reply.send(result).is_err() {
                    debug!("Allocate reply channel closed (caller dropped)");
                }
            }
            SessionCommand::IncrementStat { attribute } => {
                self.feature.increment_stat(&attribute);
            }
            SessionCommand::DecrementStat { attribute } => {
                self.feature.decrement_stat(&attribute);
            }
            SessionCommand::ResetStats => {
                self.feature.reset_stats();
            }
            SessionCommand::Stop => {
                self.feature.stop();
            }
            SessionCommand::SetPreview { enabled } => {
                self.feature.set_preview(enabled);
            }
            SessionCommand::QueryState { reply } => {
                if reply.send(self.feature.state()).is_err() {
                    debug!("QueryState reply channel closed (caller dropped)");
                }
            }
            SessionCommand::QueryAttributes { reply } => {
                if reply.send(self.feature.attributes().cloned()).is_err() {
                    debug!("QueryAttributes reply channel closed (caller dropped)");
                }
            }
            SessionCommand::QueryPoints { reply } => {
                let summary = PointsSummary {
                    spent: self.feature.spent_points(),
                    available: self.feature.available_points(),
                    total: self.feature.total_points(),
                };
                if reply.send(summary).is_err() {
                    debug!("QueryPoints reply channel closed (caller dropped)");
                }
            }
            SessionCommand::SnapshotProfile { name, reply } => {
                if reply.send(self.feature.snapshot_profile(name)).is_err() {
                    debug!("SnapshotProfile reply channel closed (caller dropped)");
                }
            }
            SessionCommand::SaveProfile { profile, reply } => {
                if reply.send(self.feature.save_profile(&profile)).is_err() {
                    debug!("SaveProfile reply channel closed (caller dropped)");
                }
            }
            SessionCommand::RemoveProfile { name, reply } => {
                if reply.send(self.feature.remove_profile(&name)).is_err() {
                    debug!("RemoveProfile reply channel closed (caller dropped)");
                }
            }
            SessionCommand::ListProfiles { reply } => {
                if reply.send(self.feature.saved_profiles()).is_err() {
                    debug!("ListProfiles reply channel closed (caller dropped)");
                }
            }
        }
    }
}

/// Client-facing handle to interact with the session worker.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Deliver an external notification.
    pub async fn notify(&self, notification: Notification) -> Result<(), SessionError> {
        self.send(SessionCommand::Notify(notification)).await
    }

    /// Start executing a profile.
    pub async fn allocate(&self, profile: StatProfile) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Allocate {
            profile,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| SessionError::WorkerClosed)?
    }

    /// Spend one point on an attribute.
    pub async fn increment_stat(&self, attribute: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::IncrementStat {
            attribute: attribute.into(),
        })
        .await
    }

    /// Take one point back from an attribute (preview only).
    pub async fn decrement_stat(&self, attribute: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::DecrementStat {
            attribute: attribute.into(),
        })
        .await
    }

    /// Reset all attributes.
    pub async fn reset_stats(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::ResetStats).await
    }

    /// Drop any in-progress run.
    pub async fn stop(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Stop).await
    }

    /// Toggle preview mode.
    pub async fn set_preview(&self, enabled: bool) -> Result<(), SessionError> {
        self.send(SessionCommand::SetPreview { enabled }).await
    }

    /// Query the session state.
    pub async fn state(&self) -> Result<SessionState, SessionError> {
        self.query(|reply| SessionCommand::QueryState { reply }).await
    }

    /// Query the currently shown attribute set.
    pub async fn attributes(
        &self,
    ) -> Result<Option<IndexMap<String, PlayerAttribute>>, SessionError> {
        self.query(|reply| SessionCommand::QueryAttributes { reply })
            .await
    }

    /// Query the point counters.
    pub async fn points(&self) -> Result<PointsSummary, SessionError> {
        self.query(|reply| SessionCommand::QueryPoints { reply }).await
    }

    /// Capture the currently shown allocation as a savable profile.
    pub async fn snapshot_profile(
        &self,
        name: impl Into<String>,
    ) -> Result<Option<StatProfile>, SessionError> {
        let name = name.into();
        self.query(|reply| SessionCommand::SnapshotProfile { name, reply })
            .await
    }

    /// Persist a profile through the repository port.
    pub async fn save_profile(&self, profile: StatProfile) -> Result<(), SessionError> {
        self.query(|reply| SessionCommand::SaveProfile { profile, reply })
            .await?
            .map_err(|e| SessionError::Store(e.to_string()))
    }

    /// Remove a saved profile by name.
    pub async fn remove_profile(&self, name: impl Into<String>) -> Result<(), SessionError> {
        let name = name.into();
        self.query(|reply| SessionCommand::RemoveProfile { name, reply })
            .await?
            .map_err(|e| SessionError::Store(e.to_string()))
    }

    /// List every saved profile.
    pub async fn saved_profiles(&self) -> Result<Vec<StatProfile>, SessionError> {
        self.query(|reply| SessionCommand::ListProfiles { reply })
            .await?
            .map_err(|e| SessionError::Store(e.to_string()))
    }

    /// Subscribe to session events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SessionError::WorkerClosed)
    }

    async fn query<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(command(reply_tx)).await?;
        reply_rx.await.map_err(|_| SessionError::WorkerClosed)
    }
}
