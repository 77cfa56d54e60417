//! Stateful session layer for server-driven attribute allocation.
//!
//! This crate wires the pure allocation types from `stat-core` to the
//! outside world: it ingests screen/inventory/chat notifications, drives
//! compiled command sequences one server action at a time, and absorbs every
//! asynchronous failure into an observable session state instead of throwing
//! across the event boundary.
//!
//! Modules are organized by responsibility:
//! - [`screen`] owns correlation-id and snapshot truth (the session FSM)
//! - [`allocator`] owns sequence progress and preview truth
//! - [`feature`] routes notifications and exposes the user-facing operations
//! - [`event`] defines the closed notification/event unions
//! - [`ports`] declares the outbound collaborator traits
//! - [`repository`] persists named profiles
//! - [`worker`] serializes all entry points onto one tokio task
pub mod allocator;
pub mod error;
pub mod event;
pub mod feature;
pub mod ports;
pub mod repository;
pub mod screen;
pub mod worker;

pub use allocator::StatAllocator;
pub use error::SessionError;
pub use event::{GRID_COLUMNS, GRID_ROWS, GRID_SLOTS, ItemEntry, Notification, SessionEvent};
pub use feature::{FeatureConfig, StatScreenFeature};
pub use ports::{AttributeDecoder, FeedbackPort, InteractionPort, SessionPorts};
pub use repository::{FileProfileRepo, InMemoryProfileRepo, ProfileRepository, StoreError};
pub use screen::{REALLOCATION_ITEM_NAME, ScreenSession, SessionState};
pub use worker::{PointsSummary, SessionHandle, SessionWorker};
