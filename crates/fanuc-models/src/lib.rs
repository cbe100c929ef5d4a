//! Core data models for the Fanuc client bot.
//!
//! This crate provides the fundamental data types shared by every layer of
//! the bot: typed identifiers, saved Kafka targets and Fanuc services, the
//! remote machine DTOs, and the per-user session record that carries the
//! wizard state machine.

pub mod ids;
pub mod machine;
pub mod service;
pub mod session;
pub mod target;

// Re-export main types
pub use ids::{KeyId, MachineId, ServiceId, TargetId, UserId};
pub use machine::{ConnectionRequest, Machine, MachineMode, MachineStatus};
pub use service::{FanucService, NewService};
pub use session::{
    ConnectionDraft, Draft, NewKeyDraft, PollingDraft, ServiceDraft, State, TargetDraft,
    UserSession, WizardKind,
};
pub use target::{MonitoringKey, MonitoringTarget, NewTarget};
