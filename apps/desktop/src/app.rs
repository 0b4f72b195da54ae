//! Application orchestrator that wires the shell components together.

use std::sync::Arc;
use std::time::Duration;

use lorecast_installer::BinaryInstaller;
use lorecast_release_feed::{FeedClient, platform_tag};
use lorecast_supervisor::{ExitReason, LaunchArgs, LogRelay, ServerEvent, Supervisor};
use lorecast_tray::{TrayConfig, TrayEvent, TrayHandle};
use lorecast_updater::{
    ConfirmFuture, InstallPrompt, StartupOutcome, UpdateConfig, UpdateCoordinator, UpdateEvent,
    VersionStore,
};
use tokio_util::sync::CancellationToken;

use crate::browser;
use crate::config::Config;

/// Port the managed server listens on.
const SERVER_PORT: u16 = 12850;

/// GitHub coordinates of the server release feed.
const FEED_OWNER: &str = "lorecast-app";
const FEED_REPO: &str = "lorecast-server";

/// How often the tray event queue is polled.
const TRAY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs the shell until quit is requested.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let layout = config.data_layout();
    layout.ensure()?;
    tracing::info!(root = %layout.root.display(), "server data directory ready");

    // -- Supervisor --
    let relay = Arc::new(LogRelay::new(config.log_capacity));
    let supervisor = Arc::new(Supervisor::new(layout.server_binary(), Arc::clone(&relay)));

    let launch = LaunchArgs {
        port: SERVER_PORT,
        config_dir: layout.config_dir(),
        metadata_dir: layout.metadata_dir(),
        source: platform_tag().to_string(),
    };

    // -- Updater --
    let store = Arc::new(VersionStore::open(layout.settings_path()));
    let coordinator = Arc::new(UpdateCoordinator::new(UpdateConfig {
        feed: FeedClient::new(FEED_OWNER, FEED_REPO)?,
        installer: BinaryInstaller::new()?,
        store: Arc::clone(&store),
        supervisor: Arc::clone(&supervisor),
        prompt: Arc::new(ConfigPrompt {
            auto_install: config.auto_install,
        }),
        server_path: layout.server_binary(),
        launch: launch.clone(),
    }));

    // -- Tray --
    let tray_config = TrayConfig {
        app_name: "Lorecast".into(),
        ..TrayConfig::default()
    };
    let (mut tray, _event_tx, _update_rx) = TrayHandle::new(tray_config);
    if let Some(installed) = store.installed_version() {
        tray.set_installed_version(installed);
    }

    // Take the event receivers before the flows start emitting.
    let Some(mut server_events) = supervisor.take_events().await else {
        anyhow::bail!("server events already taken");
    };
    let Some(mut update_events) = coordinator.take_events().await else {
        anyhow::bail!("update events already taken");
    };

    // -- Startup flow --
    match coordinator.init().await {
        StartupOutcome::Ready { installed } => {
            tracing::info!(version = %installed, "server ready");
        }
        StartupOutcome::ServerUnavailable => {
            tracing::error!("no server available; lifecycle actions disabled");
        }
    }

    tracing::info!("shell ready");

    // -- Main loop --
    let mut tray_poll = tokio::time::interval(TRAY_POLL_INTERVAL);
    'main: loop {
        tokio::select! {
            Some(event) = server_events.recv() => {
                handle_server_event(event, &mut tray);
            }
            Some(event) = update_events.recv() => {
                handle_update_event(event, &mut tray);
            }
            _ = tray_poll.tick() => {
                while let Some(event) = tray.try_recv_event() {
                    if !handle_tray_event(event, &supervisor, &coordinator, &launch, &tray).await {
                        break 'main;
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("shutdown signal received");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("SIGINT received, shutting down");
                break;
            }
        }
    }

    // -- Graceful shutdown: a quit must not leave the server orphaned --
    tracing::info!("stopping services...");
    if let Err(e) = supervisor.stop().await {
        tracing::warn!("failed to stop server during shutdown: {e}");
    }
    tray.shutdown();

    Ok(())
}

/// Applies a supervisor event to the tray.
fn handle_server_event(event: ServerEvent, tray: &mut TrayHandle) {
    match event {
        ServerEvent::Started { pid } => {
            tracing::info!(pid, "server started");
            tray.set_running(true);
            tray.notify(
                "Lorecast",
                format!("Server started at http://localhost:{SERVER_PORT}/"),
            );
        }
        ServerEvent::Stopped {
            reason: ExitReason::Requested,
        } => {
            tracing::info!("server stopped");
            tray.set_running(false);
            tray.notify("Lorecast", "Server stopped");
        }
        ServerEvent::Stopped {
            reason: ExitReason::Unexpected { code },
        } => {
            tracing::warn!(?code, "server exited unexpectedly");
            tray.set_running(false);
            let body = match code {
                Some(c) => format!("Server stopped unexpectedly (exit code {c})"),
                None => "Server stopped unexpectedly".into(),
            };
            tray.notify("Lorecast", body);
        }
    }
}

/// Applies an updater event to the tray.
fn handle_update_event(event: UpdateEvent, tray: &mut TrayHandle) {
    match event {
        UpdateEvent::Checking => tracing::info!("checking for server updates"),
        UpdateEvent::UpToDate { tag } => {
            tracing::info!(%tag, "server is up to date");
        }
        UpdateEvent::UpdateAvailable { tag } => {
            tray.notify("Lorecast", format!("Server update {tag} is available"));
        }
        UpdateEvent::Installing { tag } => {
            tracing::info!(%tag, "installing server");
        }
        UpdateEvent::Installed { tag } => {
            tray.set_installed_version(tag.clone());
            tray.notify("Lorecast", format!("Server {tag} installed"));
        }
        UpdateEvent::DeclinedUpdate { tag } => {
            tracing::info!(%tag, "update declined");
        }
        UpdateEvent::NoReleaseForPlatform => {
            tracing::warn!("no server release published for this platform");
        }
        UpdateEvent::FeedUnavailable { reason } => {
            tracing::warn!(%reason, "update check failed");
        }
        UpdateEvent::InstallFailed { tag, reason } => {
            tracing::error!(%tag, %reason, "server install failed");
            tray.notify("Lorecast", format!("Installing server {tag} failed"));
        }
        UpdateEvent::ServerUnavailable => {
            tray.notify(
                "Lorecast",
                "No server is installed and none could be downloaded",
            );
        }
    }
}

/// Handles one tray menu action. Returns `false` when quit was chosen.
async fn handle_tray_event(
    event: TrayEvent,
    supervisor: &Arc<Supervisor>,
    coordinator: &Arc<UpdateCoordinator>,
    launch: &LaunchArgs,
    tray: &TrayHandle,
) -> bool {
    match event {
        TrayEvent::StartRequested => {
            if let Err(e) = supervisor.start(launch.clone()).await {
                tracing::warn!("start request failed: {e}");
                tray.notify("Lorecast", format!("Couldn't start the server: {e}"));
            }
            true
        }
        TrayEvent::StopRequested => {
            if let Err(e) = supervisor.stop().await {
                tracing::warn!("stop request failed: {e}");
                tray.notify("Lorecast", format!("Couldn't stop the server: {e}"));
            }
            true
        }
        TrayEvent::OpenWebAppRequested => {
            if supervisor.is_running().await {
                let url = format!("http://localhost:{SERVER_PORT}/");
                if let Err(e) = browser::open_url(&url) {
                    tracing::warn!("failed to open browser: {e}");
                    tray.notify("Lorecast", format!("Open {url} in your browser"));
                }
            } else {
                tray.notify("Lorecast", "Start the server to open the web app");
            }
            true
        }
        TrayEvent::ShowLogsRequested => {
            // A windowed build opens a log viewer; until then the buffered
            // history goes to stdout.
            for line in supervisor.relay().snapshot() {
                println!("{line}");
            }
            true
        }
        TrayEvent::CheckUpdatesRequested => {
            // Run off the main loop so events keep flowing to the tray
            // while the check or install is in progress.
            let coordinator = Arc::clone(coordinator);
            tokio::spawn(async move {
                coordinator.check_now().await;
            });
            true
        }
        TrayEvent::QuitRequested => {
            tracing::info!("quit requested via tray");
            false
        }
    }
}

/// Install consent backed by the `auto_install` setting.
///
/// The headless shell has no dialog surface; upgrades are either taken
/// automatically or announced and left alone.
struct ConfigPrompt {
    auto_install: bool,
}

impl InstallPrompt for ConfigPrompt {
    fn confirm_install(&self, tag: &str) -> ConfirmFuture<'_> {
        let accept = self.auto_install;
        tracing::debug!(tag, accept, "install consent");
        Box::pin(async move { accept })
    }
}
