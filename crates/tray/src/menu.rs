//! Dynamic context menu for the system tray.

/// Actions that can be triggered from the tray context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// Start the server.
    Start,
    /// Stop the server.
    Stop,
    /// Open the web app in the default browser.
    OpenWebApp,
    /// Show the server log viewer.
    ShowLogs,
    /// Run an update check now.
    CheckUpdates,
    /// Quit the application.
    Quit,
}

/// A single menu item.
#[derive(Debug, Clone)]
pub struct MenuItem {
    /// Display text.
    pub label: String,
    /// Whether the item is enabled (clickable).
    pub enabled: bool,
    /// Optional action triggered on click.
    pub action: Option<MenuAction>,
}

/// Current state used to build the context menu.
#[derive(Debug, Clone, Default)]
pub struct MenuState {
    /// Whether the server process is running.
    pub server_running: bool,
    /// Installed server version tag, if any.
    pub installed_version: Option<String>,
}

impl MenuState {
    /// Builds the menu items from the current state.
    ///
    /// Start is enabled only when a server is installed and not running;
    /// stop and open only while running. Check-for-updates stays enabled
    /// always, since it is the recovery path when nothing is installed.
    pub fn build_menu(&self) -> Vec<MenuItem> {
        let mut items = Vec::new();

        // Header: product + status.
        let status = if self.server_running {
            "Running"
        } else if self.installed_version.is_some() {
            "Stopped"
        } else {
            "Not installed"
        };
        let header = match &self.installed_version {
            Some(version) => format!("Lorecast Server {version} ({status})"),
            None => format!("Lorecast Server ({status})"),
        };
        items.push(MenuItem {
            label: header,
            enabled: false,
            action: None,
        });

        // Separator (represented as disabled empty item).
        items.push(MenuItem {
            label: String::new(),
            enabled: false,
            action: None,
        });

        items.push(MenuItem {
            label: "Start server".into(),
            enabled: self.installed_version.is_some() && !self.server_running,
            action: Some(MenuAction::Start),
        });
        items.push(MenuItem {
            label: "Stop server".into(),
            enabled: self.server_running,
            action: Some(MenuAction::Stop),
        });
        items.push(MenuItem {
            label: "Open web app".into(),
            enabled: self.server_running,
            action: Some(MenuAction::OpenWebApp),
        });
        items.push(MenuItem {
            label: "Server logs".into(),
            enabled: true,
            action: Some(MenuAction::ShowLogs),
        });
        items.push(MenuItem {
            label: "Check for updates".into(),
            enabled: true,
            action: Some(MenuAction::CheckUpdates),
        });

        // Separator.
        items.push(MenuItem {
            label: String::new(),
            enabled: false,
            action: None,
        });

        items.push(MenuItem {
            label: "Quit".into(),
            enabled: true,
            action: Some(MenuAction::Quit),
        });

        items
    }
}
