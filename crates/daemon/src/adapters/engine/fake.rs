// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake tunnel engine for testing

use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fa_core::{TokenSet, TunnelConfig, TunnelKey, TunnelState};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{EngineError, PingSocket, Tunnel, TunnelEngine, TunnelStream};

#[derive(Default)]
struct Records {
    txt: HashMap<String, Vec<String>>,
    aaaa: HashMap<String, Vec<Ipv6Addr>>,
}

#[derive(Default)]
struct FakeEngineState {
    negotiations: Vec<(TunnelKey, bool)>,
    tokens_seen: Vec<TokenSet>,
    tunnels: Vec<Arc<FakeTunnel>>,
    error: Option<String>,
    delay: Option<Duration>,
}

/// Engine whose tunnels answer from scripted DNS records.
///
/// Dialed streams echo what they receive; the ping socket echoes each
/// probe back from its destination.
#[derive(Clone, Default)]
pub struct FakeEngine {
    inner: Arc<Mutex<FakeEngineState>>,
    records: Arc<Mutex<Records>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn txt(self, name: &str, values: &[&str]) -> Self {
        self.records
            .lock()
            .txt
            .insert(name.to_string(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn aaaa(self, name: &str, addrs: &[Ipv6Addr]) -> Self {
        self.records.lock().aaaa.insert(name.to_string(), addrs.to_vec());
        self
    }

    /// Hold each negotiation for `delay` before completing it.
    pub fn slow(self, delay: Duration) -> Self {
        self.inner.lock().delay = Some(delay);
        self
    }

    pub fn fail(&self, message: &str) {
        self.inner.lock().error = Some(message.to_string());
    }

    /// Every negotiation so far, with its recycle flag
    pub fn negotiations(&self) -> Vec<(TunnelKey, bool)> {
        self.inner.lock().negotiations.clone()
    }

    pub fn tokens_seen(&self) -> Vec<TokenSet> {
        self.inner.lock().tokens_seen.clone()
    }

    pub fn tunnels(&self) -> Vec<Arc<FakeTunnel>> {
        self.inner.lock().tunnels.clone()
    }
}

#[async_trait]
impl TunnelEngine for FakeEngine {
    async fn negotiate(
        &self,
        tokens: &TokenSet,
        key: &TunnelKey,
        recycle: bool,
    ) -> Result<Arc<dyn Tunnel>, EngineError> {
        let (delay, error, serial) = {
            let mut inner = self.inner.lock();
            inner.negotiations.push((key.clone(), recycle));
            inner.tokens_seen.push(tokens.clone());
            (inner.delay, inner.error.clone(), inner.negotiations.len())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = error {
            return Err(EngineError::Negotiate(message));
        }

        let tunnel = Arc::new(FakeTunnel::new(key, serial, Arc::clone(&self.records)));
        self.inner.lock().tunnels.push(Arc::clone(&tunnel));
        Ok(tunnel)
    }
}

/// Tunnel handed out by [`FakeEngine`]
pub struct FakeTunnel {
    state: TunnelState,
    config: TunnelConfig,
    records: Arc<Mutex<Records>>,
    closed: AtomicBool,
}

impl FakeTunnel {
    fn new(key: &TunnelKey, serial: usize, records: Arc<Mutex<Records>>) -> Self {
        let state = TunnelState {
            org: key.org.clone(),
            network: key.network.clone(),
            name: format!("agent-{serial}"),
            region: "ord".to_string(),
            local_public: format!("pub-{serial}"),
            ..TunnelState::default()
        };
        let config = TunnelConfig {
            local_network: format!("fdaa:0:{serial:x}::2/120"),
            dns_server: "fdaa::3".to_string(),
            ..TunnelConfig::default()
        };
        Self { state, config, records, closed: AtomicBool::new(false) }
    }

    pub fn key(&self) -> TunnelKey {
        self.state.key()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tunnel for FakeTunnel {
    fn state(&self) -> &TunnelState {
        &self.state
    }

    fn config(&self) -> &TunnelConfig {
        &self.config
    }

    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, EngineError> {
        Ok(self.records.lock().txt.get(name).cloned().unwrap_or_default())
    }

    async fn lookup_aaaa(&self, name: &str) -> Result<Vec<Ipv6Addr>, EngineError> {
        Ok(self.records.lock().aaaa.get(name).cloned().unwrap_or_default())
    }

    async fn dial(&self, addr: &str) -> Result<Box<dyn TunnelStream>, EngineError> {
        if self.is_closed() {
            return Err(EngineError::Closed);
        }
        if addr.ends_with(":0") {
            return Err(EngineError::Dial {
                addr: addr.to_string(),
                message: "connection refused".to_string(),
            });
        }
        let (local, mut remote) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(&mut remote);
            let _ = tokio::io::copy(&mut reader, &mut writer).await;
        });
        Ok(Box::new(local))
    }

    async fn listen_ping(&self) -> Result<Arc<dyn PingSocket>, EngineError> {
        Ok(Arc::new(EchoPingSocket::new()))
    }

    async fn close(&self) -> Result<(), EngineError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        Ok(())
    }
}

/// Answers every probe with the same payload from the probed address
struct EchoPingSocket {
    tx: mpsc::UnboundedSender<(Vec<u8>, Ipv6Addr)>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Vec<u8>, Ipv6Addr)>>,
}

impl EchoPingSocket {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: tokio::sync::Mutex::new(rx) }
    }
}

#[async_trait]
impl PingSocket for EchoPingSocket {
    async fn send_to(&self, payload: &[u8], addr: Ipv6Addr) -> Result<(), EngineError> {
        self.tx.send((payload.to_vec(), addr)).map_err(|_| EngineError::Closed)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, Ipv6Addr), EngineError> {
        let Some((payload, addr)) = self.rx.lock().await.recv().await else {
            return Err(EngineError::Closed);
        };
        let n = payload.len().min(buf.len());
        buf[..n].copy_from_slice(&payload[..n]);
        Ok((n, addr))
    }
}
