// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::Ipv6Addr;
use std::time::Duration;

use fa_core::{ConfigFile, TokenSource};
use fa_daemon::FakeEngine;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;

use super::*;
use crate::test_agent::TestAgent;
use crate::transport::UnixTransport;

const ADDR: Ipv6Addr = Ipv6Addr::new(0xfdaa, 0, 0x12, 0xa7b, 0, 0, 0, 2);

/// A listener that answers each connection with canned frames, recording
/// the frames it receives.
struct ScriptedAgent {
    _dir: tempfile::TempDir,
    transport: Arc<dyn Transport>,
    received: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl ScriptedAgent {
    /// `script` maps each received verb to the reply frame body, or `None`
    /// to close the connection.
    fn start(script: fn(&str) -> Option<&'static str>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fly-agent.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let received = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log = Arc::clone(&received);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    while let Ok(frame) = read_frame(&mut stream).await {
                        let text = String::from_utf8_lossy(&frame).into_owned();
                        let verb = text.split(' ').next().unwrap_or_default().to_string();
                        log.lock().push(text);
                        let Some(reply) = script(&verb) else { return };
                        let (verb, rest) = reply.split_once(' ').unwrap_or((reply, ""));
                        let args: Vec<&str> = if rest.is_empty() { vec![] } else { vec![rest] };
                        if write_frame(&mut stream, verb, &args).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });
        Self { _dir: dir, transport: Arc::new(UnixTransport::new(path)), received }
    }

    fn client(&self) -> Client {
        Client::new(Arc::clone(&self.transport))
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}

#[tokio::test]
async fn ping_decodes_the_agent_response() {
    let agent =
        ScriptedAgent::start(|_| Some(r#"ok {"PID":1234,"Version":"1.0.0","Background":true}"#));

    let response = agent.client().ping(&CancellationToken::new()).await.unwrap();

    assert_eq!(response.pid, 1234);
    assert_eq!(response.version, semver::Version::new(1, 0, 0));
    assert!(response.background);
}

#[tokio::test]
async fn unrecognized_replies_are_invalid_responses() {
    let agent = ScriptedAgent::start(|_| Some("pong 1234"));

    let result = agent.client().ping(&CancellationToken::new()).await;

    match result {
        Err(ClientError::Protocol(ProtocolError::InvalidResponse(raw))) => {
            assert_eq!(raw, b"pong 1234");
        }
        other => panic!("expected an invalid response, got {other:?}"),
    }
}

#[tokio::test]
async fn bare_ok_resolve_is_no_such_host() {
    let agent = ScriptedAgent::start(|_| Some("ok"));

    let cancel = CancellationToken::new();
    let result = agent.client().resolve(&cancel, "slug", "host", Some("net")).await;

    assert!(matches!(result, Err(ClientError::NoSuchHost)));
    assert_eq!(agent.received(), vec!["resolve slug host net".to_string()]);
}

#[yare::parameterized(
    unavailable = { "tunnel unavailable" },
    no_host = { "no such host" },
    other = { "no such organization" },
)]
fn err_replies_decode_by_message(message: &str) {
    let err = ClientError::from_agent(message.to_string());

    assert_eq!(err.to_string(), message);
    match message {
        "tunnel unavailable" => assert!(matches!(err, ClientError::TunnelUnavailable)),
        "no such host" => assert!(matches!(err, ClientError::NoSuchHost)),
        _ => assert!(matches!(err, ClientError::Agent(_))),
    }
}

#[tokio::test]
async fn probe_surfaces_typed_agent_errors() {
    let agent = ScriptedAgent::start(|_| Some("err tunnel unavailable"));

    let result = agent.client().probe(&CancellationToken::new(), "personal", None).await;

    assert!(matches!(result, Err(ClientError::TunnelUnavailable)));
}

#[tokio::test]
async fn hands_over_file_tokens_before_each_command() {
    let agent = ScriptedAgent::start(|_| Some("ok"));
    let tokens = TokenSet::parse("fo1_user", TokenSource::File("/tmp/fly/config.toml".into()));
    let client = agent.client().with_tokens(&tokens);

    client.probe(&CancellationToken::new(), "personal", None).await.unwrap();

    assert_eq!(
        agent.received(),
        vec!["set-token cfg /tmp/fly/config.toml".to_string(), "probe personal".to_string()]
    );
}

#[tokio::test]
async fn refused_tokens_fall_back_once_and_stay_off() {
    let agent = ScriptedAgent::start(|verb| match verb {
        "set-token" => Some("err malformed set-token command"),
        _ => Some("ok"),
    });
    let tokens = TokenSet::parse("fm2_org,fo1_user", TokenSource::Env);
    let client = agent.client().with_tokens(&tokens);
    let cancel = CancellationToken::new();

    client.probe(&cancel, "personal", None).await.unwrap();
    client.probe(&cancel, "personal", None).await.unwrap();

    assert_eq!(
        agent.received(),
        vec![
            "set-token str fm2_org,fo1_user".to_string(),
            "probe personal".to_string(),
            "probe personal".to_string(),
        ]
    );
}

#[tokio::test]
async fn empty_tokens_skip_the_handshake() {
    let agent = ScriptedAgent::start(|_| Some("ok"));
    let client = agent.client().with_tokens(&TokenSet::empty());

    client.probe(&CancellationToken::new(), "personal", None).await.unwrap();

    assert_eq!(agent.received(), vec!["probe personal".to_string()]);
}

#[tokio::test]
async fn kill_tolerates_the_agent_hanging_up() {
    let agent = ScriptedAgent::start(|_| None);

    agent.client().kill(&CancellationToken::new()).await.unwrap();

    assert_eq!(agent.received(), vec!["kill".to_string()]);
}

#[tokio::test]
async fn cancellation_closes_a_pending_request() {
    // Never replies
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fly-agent.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_frame(&mut stream).await.unwrap();
        let mut buf = [0u8; 1];
        let n = stream.read(&mut buf).await.unwrap_or(0);
        let _ = closed_tx.send(n);
    });
    let client = Client::new(Arc::new(UnixTransport::new(path)));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = client.establish(&cancel, "personal", None).await;

    assert!(matches!(result, Err(ClientError::Cancelled)));
    assert_eq!(closed_rx.await.unwrap(), 0);
}

#[tokio::test]
async fn not_running_when_nothing_listens() {
    let dir = tempfile::tempdir().unwrap();
    let client = Client::new(Arc::new(UnixTransport::new(dir.path().join("fly-agent.sock"))));

    let result = client.ping(&CancellationToken::new()).await;

    assert!(matches!(result, Err(ClientError::NotRunning)));
}

#[tokio::test]
async fn establish_and_probe_against_a_live_agent() {
    let agent = TestAgent::start(FakeEngine::new()).await;
    let client = agent.client();
    let cancel = CancellationToken::new();

    assert!(matches!(
        client.probe(&cancel, "personal", None).await,
        Err(ClientError::TunnelUnavailable)
    ));
    let first = client.establish(&cancel, "personal", None).await.unwrap();
    let again = client.establish(&cancel, "personal", None).await.unwrap();
    let fresh = client.reestablish(&cancel, "personal", None).await.unwrap();
    client.probe(&cancel, "personal", None).await.unwrap();

    assert_eq!(first.state.name, again.state.name);
    assert_ne!(first.state.name, fresh.state.name);
    agent.stop().await;
}

#[tokio::test]
async fn session_tokens_reach_the_engine() {
    let agent = TestAgent::start(FakeEngine::new()).await;
    let config = agent.paths.config_file();
    config.set_access_token("fm2_org,fo1_user").unwrap();
    let tokens = TokenSet::from_file(&config).unwrap();

    agent
        .client()
        .with_tokens(&tokens)
        .establish(&CancellationToken::new(), "personal", None)
        .await
        .unwrap();

    assert_eq!(agent.engine.tokens_seen(), vec![tokens]);
    agent.stop().await;
}

#[tokio::test]
async fn resolve_and_lookup_through_a_live_agent() {
    let engine = FakeEngine::new()
        .aaaa("web.internal", &[ADDR])
        .txt("_apps.internal", &["web"]);
    let agent = TestAgent::start(engine).await;
    let client = agent.client();
    let cancel = CancellationToken::new();
    client.establish(&cancel, "personal", None).await.unwrap();

    let addr = client.resolve(&cancel, "personal", "web.internal:80", None).await.unwrap();
    let missing = client.resolve(&cancel, "personal", "db.internal", None).await;
    let txt = client.lookup_txt(&cancel, "personal", "_apps.internal", None).await.unwrap();

    assert_eq!(addr, format!("[{ADDR}]:80"));
    assert!(matches!(missing, Err(ClientError::NoSuchHost)));
    assert_eq!(txt, vec!["web".to_string()]);
    agent.stop().await;
}

#[tokio::test]
async fn wait_for_dns_gives_up_with_no_such_host() {
    let agent = TestAgent::start(FakeEngine::new()).await;
    let waits =
        WaitOptions { interval: Duration::from_millis(10), deadline: Duration::from_millis(100) };
    let client = agent.client().with_waits(waits);
    let cancel = CancellationToken::new();
    client.establish(&cancel, "personal", None).await.unwrap();

    let result = client.wait_for_dns(&cancel, "personal", "db.internal", None).await;

    assert!(matches!(result, Err(ClientError::NoSuchHost)));
    agent.stop().await;
}

#[tokio::test]
async fn dialer_streams_through_the_tunnel() {
    let agent = TestAgent::start(FakeEngine::new()).await;
    let cancel = CancellationToken::new();
    let dialer = agent
        .client()
        .connect_to_tunnel(&cancel, "personal", None)
        .await
        .unwrap()
        .with_timeout(Duration::from_secs(1));

    assert_eq!(dialer.state().name, "agent-1");
    let mut conn = dialer.dial(&cancel, &format!("[{ADDR}]:22")).await.unwrap();
    conn.write_all(b"ssh").await.unwrap();
    let mut echoed = [0u8; 3];
    conn.read_exact(&mut echoed).await.unwrap();

    assert_eq!(&echoed, b"ssh");
    drop(conn);
    agent.stop().await;
}

#[tokio::test]
async fn dial_failures_come_back_as_agent_errors() {
    let agent = TestAgent::start(FakeEngine::new()).await;
    let cancel = CancellationToken::new();
    let dialer = agent.client().dialer(&cancel, "personal", None).await.unwrap();

    let refused = dialer.dial(&cancel, "[fdaa::9]:0").await;
    let missing = dialer.dial(&cancel, "db.internal:5432").await;

    assert!(matches!(refused, Err(ClientError::Agent(ref m)) if m.contains("connection refused")));
    assert!(matches!(missing, Err(ClientError::NoSuchHost)));
    agent.stop().await;
}

#[tokio::test]
async fn connect_to_tunnel_reports_negotiation_failures() {
    let agent = TestAgent::start(FakeEngine::new()).await;
    agent.engine.fail("engine offline");

    let result = agent
        .client()
        .connect_to_tunnel(&CancellationToken::new(), "personal", None)
        .await;

    let Err(err) = result else { panic!("expected an error") };
    assert!(err.to_string().contains("engine offline"), "{err}");
    agent.stop().await;
}

#[tokio::test]
async fn wait_for_tunnel_names_the_organization_on_timeout() {
    let agent = TestAgent::start(FakeEngine::new()).await;
    let waits =
        WaitOptions { interval: Duration::from_millis(10), deadline: Duration::from_millis(50) };
    let client = agent.client().with_waits(waits);
    let cancel = CancellationToken::new();

    let err = client.wait_for_tunnel(&cancel, "personal", None).await.unwrap_err();
    assert!(matches!(err, ClientError::TunnelUnavailable));

    let wrapped = err.context("tunnel unavailable for organization personal");
    assert!(matches!(wrapped.root(), ClientError::TunnelUnavailable));
    agent.stop().await;
}

#[tokio::test]
async fn pinger_relays_through_a_live_agent() {
    let agent = TestAgent::start(FakeEngine::new()).await;
    let cancel = CancellationToken::new();
    let mut pinger = agent.client().pinger(&cancel, "personal", None).await.unwrap();

    pinger.write_to(b"icmp", std::net::IpAddr::V6(ADDR)).await.unwrap();
    let mut buf = [0u8; 64];
    let (n, from) = pinger.read_from(&mut buf, Some(Duration::from_secs(5))).await.unwrap();

    assert_eq!(&buf[..n], b"icmp");
    assert_eq!(from, ADDR);
    pinger.close().await;
    agent.stop().await;
}

#[tokio::test]
async fn file_tokens_written_by_another_process_are_read_by_the_agent() {
    let agent = TestAgent::start(FakeEngine::new()).await;
    let other = agent.dir.path().join("elsewhere").join("config.toml");
    ConfigFile::at(&other).set_access_token("fo1_elsewhere").unwrap();
    let tokens = TokenSet::from_file(&ConfigFile::at(&other)).unwrap();

    agent
        .client()
        .with_tokens(&tokens)
        .establish(&CancellationToken::new(), "personal", None)
        .await
        .unwrap();

    assert_eq!(agent.engine.tokens_seen()[0].user_token(), Some("fo1_elsewhere"));
    agent.stop().await;
}

#[tokio::test]
async fn config_paths_with_spaces_still_hand_over_tokens() {
    let agent = TestAgent::start(FakeEngine::new()).await;
    let config = ConfigFile::at(agent.dir.path().join("My Dir").join("config.toml"));
    config.set_access_token("fm2_org,fo1_user").unwrap();
    let tokens = TokenSet::from_file(&config).unwrap();

    agent
        .client()
        .with_tokens(&tokens)
        .establish(&CancellationToken::new(), "personal", None)
        .await
        .unwrap();

    let seen = agent.engine.tokens_seen();
    assert_eq!(seen[0].macaroons(), ["fm2_org"]);
    assert_eq!(seen[0].user_token(), Some("fo1_user"));
    agent.stop().await;
}
