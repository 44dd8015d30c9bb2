//! Runtime core: supervision, cleanup and the supervisor directory.
//!
//! The public API from this module is [`Supervisor`], [`SupervisorBuilder`],
//! [`Directory`], [`Config`] and [`Silence`].
//!
//! Internal modules:
//! - [`registry`]: category → task → handle map with identity-guarded removal;
//! - [`runner`]: drives one body to its terminal state, catching errors and panics;
//! - [`cleanup`]: per-task cleanup watcher and the per-supervisor kill watcher;
//! - [`supervisor`]: create/cancel/kill and the coordinator lock;
//! - [`directory`]: one live supervisor per manager id, ordered `kill_all`.

mod builder;
mod cleanup;
mod config;
mod directory;
mod registry;
mod runner;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::{Config, Silence};
pub use directory::Directory;
pub(crate) use registry::Registry;
pub use supervisor::{KillHandle, Supervisor};
