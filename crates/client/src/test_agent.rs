// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process agent for client tests

use std::sync::Arc;
use std::time::Duration;

use fa_core::{Paths, TokenSet, TokenSource};
use fa_daemon::{Backends, DaemonError, FakeEngine, FakePeers, ServeOptions};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::transport::default_transport;

pub(crate) struct TestAgent {
    pub dir: TempDir,
    pub paths: Paths,
    pub engine: FakeEngine,
    pub cancel: CancellationToken,
    pub task: JoinHandle<Result<(), DaemonError>>,
}

impl TestAgent {
    pub async fn start(engine: FakeEngine) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let version = semver::Version::new(0, 2, 0);
        let (cancel, task) = spawn_agent(&paths, engine.clone(), version, false);
        wait_for_agent(&paths).await;
        Self { dir, paths, engine, cancel, task }
    }

    pub fn client(&self) -> Client {
        Client::new(default_transport(&self.paths))
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), self.task).await;
        result.unwrap().unwrap().unwrap();
    }
}

/// Serve an agent under `paths` on the current runtime.
pub(crate) fn spawn_agent(
    paths: &Paths,
    engine: FakeEngine,
    version: semver::Version,
    background: bool,
) -> (CancellationToken, JoinHandle<Result<(), DaemonError>>) {
    let cancel = CancellationToken::new();
    let backends = Backends {
        engine: Arc::new(engine),
        peers: Arc::new(FakePeers::new()),
        tokens: Arc::new(Mutex::new(TokenSet::parse("fo1_agent", TokenSource::Env))),
    };
    let options = ServeOptions::new(version).background(background);
    let task = {
        let paths = paths.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { fa_daemon::run(&paths, options, backends, cancel).await })
    };
    (cancel, task)
}

pub(crate) async fn wait_for_agent(paths: &Paths) {
    for _ in 0..500 {
        if tokio::net::UnixStream::connect(&paths.socket_path).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("agent never listened on {}", paths.socket_path.display());
}
