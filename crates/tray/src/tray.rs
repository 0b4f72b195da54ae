//! Tray handle, events, and update types.
//!
//! The actual system tray rendering depends on GUI crates with
//! platform-specific system libraries. This module defines the
//! channel-based interface the shell core uses to talk to the tray,
//! independent of the GUI backend.

use std::sync::mpsc;

use tracing::debug;

use crate::menu::MenuState;

/// Configuration for the system tray.
#[derive(Debug, Clone)]
pub struct TrayConfig {
    /// Display name shown in the tray tooltip.
    pub app_name: String,
    /// Optional icon data (PNG bytes).
    pub icon_data: Option<Vec<u8>>,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            app_name: "Lorecast".into(),
            icon_data: None,
        }
    }
}

/// Events emitted by the tray to the shell core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayEvent {
    /// User clicked "Start server".
    StartRequested,
    /// User clicked "Stop server".
    StopRequested,
    /// User clicked "Open web app".
    OpenWebAppRequested,
    /// User clicked "Server logs".
    ShowLogsRequested,
    /// User clicked "Check for updates".
    CheckUpdatesRequested,
    /// User clicked "Quit".
    QuitRequested,
}

/// Updates sent from the shell core to the tray.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayUpdate {
    /// Server running state changed.
    RunningStateChanged(bool),
    /// Installed server version changed.
    InstalledVersionChanged(String),
    /// Show a notification balloon.
    Notification { title: String, body: String },
    /// Request tray shutdown.
    Shutdown,
}

/// Handle for communicating with the system tray from the shell core.
///
/// The tray event loop runs on the main thread of the GUI backend and
/// talks to the core over the channel pair returned by [`TrayHandle::new`].
pub struct TrayHandle {
    /// Send updates to the tray.
    update_tx: mpsc::Sender<TrayUpdate>,
    /// Receive events from the tray.
    event_rx: mpsc::Receiver<TrayEvent>,
    /// Current menu state (for tracking).
    state: MenuState,
}

impl TrayHandle {
    /// Creates a new tray handle with its channel pair.
    ///
    /// Returns `(handle, event_sender, update_receiver)`; the
    /// sender/receiver pair is given to the tray event loop.
    pub fn new(config: TrayConfig) -> (Self, mpsc::Sender<TrayEvent>, mpsc::Receiver<TrayUpdate>) {
        debug!(app = %config.app_name, "creating tray handle");
        let (update_tx, update_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let handle = Self {
            update_tx,
            event_rx,
            state: MenuState::default(),
        };

        (handle, event_tx, update_rx)
    }

    /// Updates the server running state.
    pub fn set_running(&mut self, running: bool) {
        self.state.server_running = running;
        let _ = self.update_tx.send(TrayUpdate::RunningStateChanged(running));
    }

    /// Updates the installed server version.
    pub fn set_installed_version(&mut self, version: String) {
        self.state.installed_version = Some(version.clone());
        let _ = self
            .update_tx
            .send(TrayUpdate::InstalledVersionChanged(version));
    }

    /// Shows a notification balloon.
    pub fn notify(&self, title: impl Into<String>, body: impl Into<String>) {
        let _ = self.update_tx.send(TrayUpdate::Notification {
            title: title.into(),
            body: body.into(),
        });
    }

    /// Requests the tray to shut down.
    pub fn shutdown(&self) {
        let _ = self.update_tx.send(TrayUpdate::Shutdown);
    }

    /// Tries to receive a tray event (non-blocking).
    pub fn try_recv_event(&self) -> Option<TrayEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Returns the current menu state.
    pub fn state(&self) -> &MenuState {
        &self.state
    }
}
