//! Persistence layer for the Fanuc client bot.
//!
//! Store capabilities are defined as async traits ([`StateStore`],
//! [`TargetStore`], [`ServiceStore`]). [`JsonStore`] implements all three
//! on top of a single JSON document written with atomic file operations
//! (write to temp file, then rename).
//!
//! # Example
//!
//! ```no_run
//! use fanuc_persistence::{JsonStore, TargetStore};
//! use fanuc_models::{NewTarget, UserId};
//!
//! # async fn demo() -> fanuc_persistence::Result<()> {
//! let store = JsonStore::open("/home/user/.fanuc-bot/store.json")?;
//!
//! let id = store
//!     .add_target(NewTarget {
//!         user_id: UserId(7),
//!         name: "CNC1".into(),
//!         broker: "10.0.0.5:9092".into(),
//!         topic: "telemetry".into(),
//!         key: String::new(),
//!     })
//!     .await?;
//! let target = store.get_target(id).await?;
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod error;
pub mod json_store;
pub mod traits;

pub use error::{PersistenceError, Result};
pub use json_store::JsonStore;
pub use traits::{ServiceStore, StateStore, TargetStore};
