//! System tray interface for the Lorecast desktop shell.
//!
//! Provides the tray menu model and the channel-based handle the shell
//! core uses to drive it:
//! - [`TrayEvent`]: events from tray to core (e.g. start server, quit)
//! - [`TrayUpdate`]: updates from core to tray (e.g. running state change)
//!
//! # Platform notes
//! - Linux: Uses StatusNotifierItem (Wayland) or X11 tray protocol
//! - Windows: Uses Win32 Shell_NotifyIcon
//! - The tray event loop must run on the main thread on some platforms

mod menu;
mod tray;

pub use menu::{MenuAction, MenuItem, MenuState};
pub use tray::{TrayConfig, TrayEvent, TrayHandle, TrayUpdate};
