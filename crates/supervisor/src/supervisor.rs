//! Child process lifecycle management.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::launch::LaunchArgs;
use crate::relay::LogRelay;

/// Poll interval for the child exit watcher.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Event channel size; events are dropped, not blocked on, when full.
const EVENT_CHANNEL_SIZE: usize = 64;

/// Errors from [`Supervisor::start`].
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// A server process is already running.
    #[error("server is already running")]
    AlreadyRunning,

    /// Spawning the server binary failed.
    #[error("failed to spawn server: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors from [`Supervisor::stop`].
#[derive(Debug, thiserror::Error)]
pub enum StopError {
    /// Killing the server process failed.
    #[error("failed to kill server: {0}")]
    Kill(#[source] std::io::Error),
}

/// Why a server process stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// [`Supervisor::stop`] was called.
    Requested,
    /// The process exited on its own.
    Unexpected { code: Option<i32> },
}

/// Lifecycle events emitted to the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// The server process is up.
    Started { pid: u32 },
    /// The server process is gone.
    Stopped { reason: ExitReason },
}

/// Current lifecycle state of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Supervises the single server child process.
///
/// At most one process handle exists at any time. `start` and `stop`
/// serialize on the internal state lock, so a `start` racing an in-flight
/// `stop` waits until the handle is cleared. Stopping is a forced kill;
/// there is no graceful-shutdown handshake with the server.
///
/// Output lines land in the [`LogRelay`] passed at construction, which
/// survives stop/start cycles for the lifetime of the supervisor.
pub struct Supervisor {
    inner: Arc<Mutex<ProcState>>,
    relay: Arc<LogRelay>,
    binary: PathBuf,
    events_tx: mpsc::Sender<ServerEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<ServerEvent>>>,
}

#[derive(Default)]
struct ProcState {
    proc: Option<RunningProc>,
    state: RunState,
}

struct RunningProc {
    pid: u32,
    child: tokio::process::Child,
    watcher_cancel: CancellationToken,
}

impl Supervisor {
    /// Creates a supervisor for the server binary at `binary`.
    pub fn new(binary: PathBuf, relay: Arc<LogRelay>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        Self {
            inner: Arc::new(Mutex::new(ProcState::default())),
            relay,
            binary,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<ServerEvent>> {
        self.events_rx.lock().await.take()
    }

    /// The relay holding the server's output lines.
    pub fn relay(&self) -> Arc<LogRelay> {
        self.relay.clone()
    }

    /// Whether a server process is currently supervised.
    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.proc.is_some()
    }

    /// Current lifecycle state.
    pub async fn run_state(&self) -> RunState {
        self.inner.lock().await.state
    }

    /// Starts the server process.
    ///
    /// Fails with [`StartError::AlreadyRunning`] if a process handle
    /// exists. On success the child's stdout and stderr are relayed
    /// line-by-line and a [`ServerEvent::Started`] is emitted.
    pub async fn start(&self, args: LaunchArgs) -> Result<(), StartError> {
        let mut st = self.inner.lock().await;
        if st.proc.is_some() {
            return Err(StartError::AlreadyRunning);
        }
        st.state = RunState::Starting;
        info!(binary = %self.binary.display(), port = args.port, "starting server");

        let mut child = match args.command(&self.binary).spawn() {
            Ok(child) => child,
            Err(e) => {
                st.state = RunState::Stopped;
                return Err(StartError::Spawn(e));
            }
        };
        let pid = child.id().unwrap_or(0);

        if let Some(stdout) = child.stdout.take() {
            spawn_reader("stdout", stdout, self.relay.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader("stderr", stderr, self.relay.clone());
        }

        let watcher_cancel = CancellationToken::new();
        spawn_exit_watcher(
            self.inner.clone(),
            self.events_tx.clone(),
            pid,
            watcher_cancel.clone(),
        );

        st.proc = Some(RunningProc {
            pid,
            child,
            watcher_cancel,
        });
        st.state = RunState::Running;
        let _ = self.events_tx.try_send(ServerEvent::Started { pid });
        info!(pid, "server running");
        Ok(())
    }

    /// Stops the server process with a forced kill.
    ///
    /// No-op success when nothing is running. Emits a
    /// [`ServerEvent::Stopped`] with [`ExitReason::Requested`].
    pub async fn stop(&self) -> Result<(), StopError> {
        let mut st = self.inner.lock().await;
        let Some(mut proc) = st.proc.take() else {
            debug!("stop requested with no server running");
            return Ok(());
        };
        st.state = RunState::Stopping;
        proc.watcher_cancel.cancel();
        info!(pid = proc.pid, "stopping server");

        let killed = proc.child.kill().await;
        st.state = RunState::Stopped;
        if let Err(e) = killed {
            warn!(pid = proc.pid, error = %e, "kill failed");
            return Err(StopError::Kill(e));
        }
        let _ = self.events_tx.try_send(ServerEvent::Stopped {
            reason: ExitReason::Requested,
        });
        Ok(())
    }
}

/// Relays one output stream into the log buffer, line by line.
///
/// Runs until stream EOF, which arrives when the child exits or is
/// killed. Empty lines are dropped.
fn spawn_reader<R>(stream: &'static str, reader: R, relay: Arc<LogRelay>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let text = line.trim_end();
                    if text.is_empty() {
                        continue;
                    }
                    relay.append(text.to_string());
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(stream, error = %e, "output stream closed");
                    break;
                }
            }
        }
        debug!(stream, "output reader finished");
    });
}

/// Watches for the child exiting on its own.
///
/// Polls `try_wait` under the state lock so an observed exit and a
/// concurrent `stop()` cannot both claim the same process. A watcher
/// whose pid no longer matches the stored handle is stale and exits.
fn spawn_exit_watcher(
    inner: Arc<Mutex<ProcState>>,
    events_tx: mpsc::Sender<ServerEvent>,
    pid: u32,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EXIT_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let mut st = inner.lock().await;
            let Some(proc) = st.proc.as_mut().filter(|p| p.pid == pid) else {
                break;
            };
            match proc.child.try_wait() {
                Ok(Some(status)) => {
                    let code = status.code();
                    st.proc = None;
                    st.state = RunState::Stopped;
                    warn!(pid, ?code, "server exited unexpectedly");
                    let _ = events_tx.try_send(ServerEvent::Stopped {
                        reason: ExitReason::Unexpected { code },
                    });
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(pid, error = %e, "exit poll failed");
                }
            }
        }
    });
}
