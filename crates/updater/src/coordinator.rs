//! Startup and user-triggered update orchestration.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

use lorecast_installer::BinaryInstaller;
use lorecast_release_feed::{FeedClient, FetchError, RemoteRelease};
use lorecast_supervisor::{LaunchArgs, Supervisor};

use crate::store::VersionStore;

/// Event channel size; events are dropped, not blocked on, when full.
const EVENT_CHANNEL_SIZE: usize = 64;

/// Future returned by [`InstallPrompt::confirm_install`].
pub type ConfirmFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Asks the user whether to replace the installed server with a newer
/// release.
///
/// Only consulted for upgrades; a first install never prompts. The
/// orchestration suspends until the answer arrives.
pub trait InstallPrompt: Send + Sync {
    /// Returns `true` to install the release tagged `tag`.
    fn confirm_install(&self, tag: &str) -> ConfirmFuture<'_>;
}

/// Progress and outcome events emitted to the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// A feed check started.
    Checking,
    /// The installed version matches the feed.
    UpToDate { tag: String },
    /// A newer release is available; the user is being asked.
    UpdateAvailable { tag: String },
    /// An install began.
    Installing { tag: String },
    /// An install finished and the version slot was updated.
    Installed { tag: String },
    /// The user declined the offered update.
    DeclinedUpdate { tag: String },
    /// The feed has no binary published for this platform.
    NoReleaseForPlatform,
    /// The feed could not be checked; an installed server is unaffected.
    FeedUnavailable { reason: String },
    /// An install failed; the previous binary and version are untouched.
    InstallFailed { tag: String, reason: String },
    /// Nothing is installed and nothing could be obtained; server actions
    /// stay disabled.
    ServerUnavailable,
}

/// What the startup flow resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// A server binary is installed; start/open actions are usable.
    Ready { installed: String },
    /// Nothing installed and no release obtainable; actions disabled.
    ServerUnavailable,
}

/// Decision derived from the installed version and a feed answer.
#[derive(Debug, Clone, PartialEq)]
enum Decision {
    /// Nothing installed, release available: install without prompting.
    Install(RemoteRelease),
    /// Installed version differs from the feed: offer the upgrade.
    OfferUpgrade(RemoteRelease),
    /// Installed version matches the feed.
    UpToDate { tag: String },
    /// Check produced nothing to install; keep the installed binary.
    KeepInstalled(CheckMiss),
    /// Nothing installed and nothing obtainable.
    Unavailable(CheckMiss),
}

/// Why a check produced nothing installable.
#[derive(Debug, Clone, PartialEq)]
enum CheckMiss {
    FeedError(String),
    NoRelease,
}

fn classify(
    installed: Option<String>,
    fetched: Result<Option<RemoteRelease>, FetchError>,
) -> Decision {
    match (installed, fetched) {
        (None, Err(e)) => Decision::Unavailable(CheckMiss::FeedError(e.to_string())),
        (None, Ok(None)) => Decision::Unavailable(CheckMiss::NoRelease),
        (None, Ok(Some(release))) => Decision::Install(release),
        (Some(_), Err(e)) => Decision::KeepInstalled(CheckMiss::FeedError(e.to_string())),
        (Some(_), Ok(None)) => Decision::KeepInstalled(CheckMiss::NoRelease),
        (Some(tag), Ok(Some(release))) if release.tag == tag => Decision::UpToDate { tag },
        (Some(_), Ok(Some(release))) => Decision::OfferUpgrade(release),
    }
}

/// Everything the coordinator needs to run checks and installs.
pub struct UpdateConfig {
    pub feed: FeedClient,
    pub installer: BinaryInstaller,
    pub store: Arc<VersionStore>,
    pub supervisor: Arc<Supervisor>,
    pub prompt: Arc<dyn InstallPrompt>,
    /// Where the server binary is installed.
    pub server_path: PathBuf,
    /// Arguments used when the startup flow auto-starts the server.
    pub launch: LaunchArgs,
}

/// Orchestrates the startup flow and explicit update checks.
///
/// Sequences feed checks, confirmation, supervisor stop, install, and
/// auto-start. Only one flow runs at a time; a check arriving while
/// another flow is in progress waits for it. There is no automatic
/// retry anywhere: a failed check or install waits for the user to
/// trigger the explicit check again.
pub struct UpdateCoordinator {
    feed: FeedClient,
    installer: BinaryInstaller,
    store: Arc<VersionStore>,
    supervisor: Arc<Supervisor>,
    prompt: Arc<dyn InstallPrompt>,
    server_path: PathBuf,
    launch: LaunchArgs,
    flow_lock: Mutex<()>,
    events_tx: mpsc::Sender<UpdateEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<UpdateEvent>>>,
}

impl UpdateCoordinator {
    pub fn new(cfg: UpdateConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        Self {
            feed: cfg.feed,
            installer: cfg.installer,
            store: cfg.store,
            supervisor: cfg.supervisor,
            prompt: cfg.prompt,
            server_path: cfg.server_path,
            launch: cfg.launch,
            flow_lock: Mutex::new(()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<UpdateEvent>> {
        self.events_rx.lock().await.take()
    }

    /// Runs the startup flow.
    ///
    /// Installs unconditionally when nothing is installed yet, offers an
    /// upgrade when the feed is ahead, and auto-starts the server whenever
    /// the flow ends with a usable binary. A feed failure with an existing
    /// install degrades to running what is installed.
    pub async fn init(&self) -> StartupOutcome {
        let _flow = self.flow_lock.lock().await;
        match self.check().await {
            Decision::Install(release) => {
                let tag = release.tag.clone();
                if self.try_install(&release).await {
                    self.auto_start().await;
                    StartupOutcome::Ready { installed: tag }
                } else {
                    self.emit(UpdateEvent::ServerUnavailable);
                    StartupOutcome::ServerUnavailable
                }
            }
            Decision::OfferUpgrade(release) => {
                let offered = release.tag.clone();
                self.emit(UpdateEvent::UpdateAvailable {
                    tag: offered.clone(),
                });
                if self.prompt.confirm_install(&offered).await {
                    // Failure falls back to the binary already in place.
                    self.try_install(&release).await;
                } else {
                    info!(tag = %offered, "user declined update");
                    self.emit(UpdateEvent::DeclinedUpdate { tag: offered });
                }
                self.auto_start().await;
                self.ready_with_current()
            }
            Decision::UpToDate { tag } => {
                self.emit(UpdateEvent::UpToDate { tag: tag.clone() });
                self.auto_start().await;
                StartupOutcome::Ready { installed: tag }
            }
            Decision::KeepInstalled(miss) => {
                self.emit_miss(miss);
                self.auto_start().await;
                self.ready_with_current()
            }
            Decision::Unavailable(miss) => {
                self.emit_miss(miss);
                self.emit(UpdateEvent::ServerUnavailable);
                StartupOutcome::ServerUnavailable
            }
        }
    }

    /// Runs the user-triggered update check.
    ///
    /// Same decision logic as startup, but never starts or restarts the
    /// server: a fresh install or an applied upgrade leaves it stopped for
    /// the user to start.
    pub async fn check_now(&self) {
        let _flow = self.flow_lock.lock().await;
        match self.check().await {
            Decision::Install(release) => {
                self.try_install(&release).await;
            }
            Decision::OfferUpgrade(release) => {
                let offered = release.tag.clone();
                self.emit(UpdateEvent::UpdateAvailable {
                    tag: offered.clone(),
                });
                if self.prompt.confirm_install(&offered).await {
                    self.try_install(&release).await;
                } else {
                    info!(tag = %offered, "user declined update");
                    self.emit(UpdateEvent::DeclinedUpdate { tag: offered });
                }
            }
            Decision::UpToDate { tag } => {
                self.emit(UpdateEvent::UpToDate { tag });
            }
            Decision::KeepInstalled(miss) => self.emit_miss(miss),
            Decision::Unavailable(miss) => {
                self.emit_miss(miss);
                self.emit(UpdateEvent::ServerUnavailable);
            }
        }
    }

    /// Reads the version slot and asks the feed, then classifies.
    async fn check(&self) -> Decision {
        self.emit(UpdateEvent::Checking);
        let installed = self.store.installed_version();
        let fetched = self.feed.fetch_latest().await;
        if let Err(e) = &fetched {
            warn!(error = %e, "release feed check failed");
        }
        classify(installed, fetched)
    }

    /// Stops a running server, downloads and installs `release`, and
    /// records the new version. Returns whether the install landed; a
    /// failure leaves the previous binary and version in place and is
    /// reported through [`UpdateEvent::InstallFailed`].
    async fn try_install(&self, release: &RemoteRelease) -> bool {
        let tag = release.tag.clone();
        if self.supervisor.is_running().await {
            if let Err(e) = self.supervisor.stop().await {
                warn!(error = %e, "could not stop server before install");
                self.emit(UpdateEvent::InstallFailed {
                    tag,
                    reason: e.to_string(),
                });
                return false;
            }
        }

        self.emit(UpdateEvent::Installing { tag: tag.clone() });
        if let Err(e) = self.installer.install(release, &self.server_path).await {
            warn!(%tag, error = %e, "install failed");
            self.emit(UpdateEvent::InstallFailed {
                tag,
                reason: e.to_string(),
            });
            return false;
        }
        if let Err(e) = self.store.set_installed_version(&tag) {
            warn!(error = %e, "could not record installed version");
            self.emit(UpdateEvent::InstallFailed {
                tag,
                reason: e.to_string(),
            });
            return false;
        }

        info!(%tag, "update installed");
        self.emit(UpdateEvent::Installed { tag });
        true
    }

    /// Startup-flow auto-start. Best-effort from here; a failure shows up
    /// in the log and in the absence of a `Started` event.
    async fn auto_start(&self) {
        if let Err(e) = self.supervisor.start(self.launch.clone()).await {
            warn!(error = %e, "auto-start failed");
        }
    }

    fn ready_with_current(&self) -> StartupOutcome {
        match self.store.installed_version() {
            Some(installed) => StartupOutcome::Ready { installed },
            None => StartupOutcome::ServerUnavailable,
        }
    }

    fn emit_miss(&self, miss: CheckMiss) {
        match miss {
            CheckMiss::FeedError(reason) => self.emit(UpdateEvent::FeedUnavailable { reason }),
            CheckMiss::NoRelease => self.emit(UpdateEvent::NoReleaseForPlatform),
        }
    }

    fn emit(&self, event: UpdateEvent) {
        let _ = self.events_tx.try_send(event);
    }
}
