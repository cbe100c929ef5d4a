//! Interaction engine for the Fanuc client bot.
//!
//! This crate is transport-agnostic. Inbound user actions arrive through
//! [`Dispatcher`], which routes them to:
//!
//! - the [`WizardEngine`], a per-user state machine that collects
//!   multi-step input and materialises it into targets, services, or remote
//!   calls;
//! - the [`LiveSessionManager`], which keeps at most one refresh loop per
//!   user streaming the newest Kafka record into a single chat message;
//! - plain screens built by [`views`].
//!
//! Output goes through a per-interaction [`Renderer`] supplied by the
//! transport.

pub mod action;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod format;
pub mod live;
pub mod monitoring;
pub mod registry;
pub mod render;
pub mod views;
pub mod wizard;

pub use action::{Action, ParseActionError};
pub use config::LiveConfig;
pub use dispatch::{Backends, Dispatcher};
pub use engine::{Screen, StepOutcome, WizardEngine, WizardStart};
pub use error::{CoreError, Result};
pub use live::LiveSessionManager;
pub use monitoring::Monitoring;
pub use registry::{CancelToken, SessionId, SessionRegistry};
pub use render::{Button, Controls, RenderError, Renderer, View};
