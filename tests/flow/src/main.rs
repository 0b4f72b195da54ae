fn main() {
    println!("Run `cargo test -p flow-tests` to execute the shell flow tests.");
}

// The fake servers are shell scripts, so the whole suite is Unix-only.
#[cfg(all(test, unix))]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    use lorecast_installer::{BinaryInstaller, server_binary_name};
    use lorecast_release_feed::{FeedClient, server_asset_name};
    use lorecast_supervisor::{LaunchArgs, LogRelay, ServerEvent, Supervisor};
    use lorecast_updater::{
        ConfirmFuture, InstallPrompt, StartupOutcome, UpdateConfig, UpdateCoordinator,
        UpdateEvent, VersionStore,
    };

    const SERVER_PORT: u16 = 12850;

    /// Shell script that reports a version line and stays up.
    fn server_script(version: &str) -> Vec<u8> {
        format!("#!/bin/sh\necho \"{version} online\"\nsleep 30\n").into_bytes()
    }

    fn write_executable(path: &Path, bytes: &[u8]) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    struct FixedPrompt(bool);

    impl InstallPrompt for FixedPrompt {
        fn confirm_install(&self, _tag: &str) -> ConfirmFuture<'_> {
            let answer = self.0;
            Box::pin(async move { answer })
        }
    }

    /// Serves a release listing and its binary asset from a local port.
    /// Requests to `/repos/...` get the listing; anything else gets the
    /// payload bytes.
    async fn serve_feed(tag: &str, payload: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let listing = serde_json::json!([{
            "tag_name": tag,
            "html_url": format!("https://example.com/releases/{tag}"),
            "assets": [{
                "name": server_asset_name(),
                "browser_download_url": format!("http://{addr}/dl/{}", server_asset_name()),
            }]
        }])
        .to_string();

        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    break;
                };
                let listing = listing.clone();
                let payload = payload.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = sock.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).into_owned();
                    let (content_type, body) = if request.contains("/repos/") {
                        ("application/json", listing.into_bytes())
                    } else {
                        ("application/octet-stream", payload)
                    };
                    let header = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = sock.write_all(header.as_bytes()).await;
                    let _ = sock.write_all(&body).await;
                    let _ = sock.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    /// Full shell wiring over a temporary data directory.
    struct Shell {
        coordinator: Arc<UpdateCoordinator>,
        supervisor: Arc<Supervisor>,
        relay: Arc<LogRelay>,
        store: Arc<VersionStore>,
        launch: LaunchArgs,
        update_events: mpsc::Receiver<UpdateEvent>,
        server_events: mpsc::Receiver<ServerEvent>,
        binary: PathBuf,
    }

    async fn shell(base: &str, root: &Path, accept_upgrades: bool) -> Shell {
        let binary = root.join(server_binary_name());
        let relay = Arc::new(LogRelay::new(200));
        let supervisor = Arc::new(Supervisor::new(binary.clone(), Arc::clone(&relay)));
        let store = Arc::new(VersionStore::open(root.join("settings.json")));
        std::fs::create_dir_all(root.join("config")).unwrap();
        std::fs::create_dir_all(root.join("metadata")).unwrap();

        let launch = LaunchArgs {
            port: SERVER_PORT,
            config_dir: root.join("config"),
            metadata_dir: root.join("metadata"),
            source: "linux".into(),
        };

        let coordinator = Arc::new(UpdateCoordinator::new(UpdateConfig {
            feed: FeedClient::with_base_url("lorecast-app", "lorecast-server", base).unwrap(),
            installer: BinaryInstaller::new().unwrap(),
            store: Arc::clone(&store),
            supervisor: Arc::clone(&supervisor),
            prompt: Arc::new(FixedPrompt(accept_upgrades)),
            server_path: binary.clone(),
            launch: launch.clone(),
        }));

        let server_events = supervisor.take_events().await.unwrap();
        let update_events = coordinator.take_events().await.unwrap();

        Shell {
            coordinator,
            supervisor,
            relay,
            store,
            launch,
            update_events,
            server_events,
            binary,
        }
    }

    async fn wait_for_line(relay: &LogRelay, needle: &str) {
        for _ in 0..100 {
            if relay.snapshot().iter().any(|l| l.contains(needle)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("log line containing {needle:?} never arrived");
    }

    fn drain(rx: &mut mpsc::Receiver<UpdateEvent>) -> Vec<UpdateEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn first_run_installs_starts_and_streams_logs() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_feed("v1.0.0", server_script("v1.0.0")).await;
        let mut shell = shell(&base, dir.path(), true).await;

        let outcome = shell.coordinator.init().await;
        assert_eq!(
            outcome,
            StartupOutcome::Ready {
                installed: "v1.0.0".into()
            }
        );

        assert!(shell.supervisor.is_running().await);
        assert_eq!(shell.store.installed_version().as_deref(), Some("v1.0.0"));
        assert!(shell.binary.exists());

        wait_for_line(&shell.relay, "v1.0.0 online").await;

        let events = drain(&mut shell.update_events);
        assert_eq!(
            events,
            vec![
                UpdateEvent::Checking,
                UpdateEvent::Installing {
                    tag: "v1.0.0".into()
                },
                UpdateEvent::Installed {
                    tag: "v1.0.0".into()
                },
            ]
        );

        let event = shell.server_events.recv().await.unwrap();
        assert!(matches!(event, ServerEvent::Started { .. }));

        shell.supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn accepted_upgrade_installs_and_boots_new_version() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_feed("v2.0.0", server_script("v2.0.0")).await;
        let mut shell = shell(&base, dir.path(), true).await;

        write_executable(&shell.binary, &server_script("v1.0.0"));
        shell.store.set_installed_version("v1.0.0").unwrap();

        let outcome = shell.coordinator.init().await;
        assert_eq!(
            outcome,
            StartupOutcome::Ready {
                installed: "v2.0.0".into()
            }
        );

        assert!(shell.supervisor.is_running().await);
        wait_for_line(&shell.relay, "v2.0.0 online").await;
        assert_eq!(shell.store.installed_version().as_deref(), Some("v2.0.0"));

        let events = drain(&mut shell.update_events);
        assert!(events.contains(&UpdateEvent::UpdateAvailable {
            tag: "v2.0.0".into()
        }));
        assert!(events.contains(&UpdateEvent::Installed {
            tag: "v2.0.0".into()
        }));

        shell.supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn declined_upgrade_boots_the_installed_server() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_feed("v2.0.0", server_script("v2.0.0")).await;
        let mut shell = shell(&base, dir.path(), false).await;

        write_executable(&shell.binary, &server_script("v1.0.0"));
        shell.store.set_installed_version("v1.0.0").unwrap();

        let outcome = shell.coordinator.init().await;
        assert_eq!(
            outcome,
            StartupOutcome::Ready {
                installed: "v1.0.0".into()
            }
        );

        assert!(shell.supervisor.is_running().await);
        wait_for_line(&shell.relay, "v1.0.0 online").await;
        assert_eq!(shell.store.installed_version().as_deref(), Some("v1.0.0"));

        let events = drain(&mut shell.update_events);
        assert!(events.contains(&UpdateEvent::DeclinedUpdate {
            tag: "v2.0.0".into()
        }));

        shell.supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn explicit_check_applies_update_and_leaves_server_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_feed("v2.0.0", server_script("v2.0.0")).await;
        let mut shell = shell(&base, dir.path(), true).await;

        write_executable(&shell.binary, &server_script("v1.0.0"));
        shell.store.set_installed_version("v1.0.0").unwrap();

        shell.supervisor.start(shell.launch.clone()).await.unwrap();
        wait_for_line(&shell.relay, "v1.0.0 online").await;

        shell.coordinator.check_now().await;

        assert!(!shell.supervisor.is_running().await);
        assert_eq!(shell.store.installed_version().as_deref(), Some("v2.0.0"));

        let events = drain(&mut shell.update_events);
        assert!(events.contains(&UpdateEvent::Installed {
            tag: "v2.0.0".into()
        }));

        // The server saw a start and then the requested stop, nothing else.
        let mut seen = Vec::new();
        while let Ok(event) = shell.server_events.try_recv() {
            seen.push(event);
        }
        assert!(matches!(seen.first(), Some(ServerEvent::Started { .. })));
        assert!(matches!(seen.last(), Some(ServerEvent::Stopped { .. })));
    }
}
