//! Server process supervision for the Lorecast desktop shell.
//!
//! Owns the single `lorecast-server` child process: spawning with the
//! standard launch flags, forced stop, crash observation, and the log
//! relay fed by the child's output streams.

mod launch;
mod relay;
mod supervisor;

pub use launch::LaunchArgs;
pub use relay::{DEFAULT_LOG_CAPACITY, LogRelay};
pub use supervisor::{ExitReason, RunState, ServerEvent, StartError, StopError, Supervisor};
