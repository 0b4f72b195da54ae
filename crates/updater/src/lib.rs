//! Update orchestration for the Lorecast desktop shell.
//!
//! Ties the release feed, the binary installer, and the process
//! supervisor together: the startup flow (install when missing, offer
//! upgrades, auto-start) and the user-triggered explicit check, plus the
//! persistent installed-version slot.

mod coordinator;
mod store;

pub use coordinator::{
    ConfirmFuture, InstallPrompt, StartupOutcome, UpdateConfig, UpdateCoordinator, UpdateEvent,
};
pub use store::{StoreError, VersionStore};
