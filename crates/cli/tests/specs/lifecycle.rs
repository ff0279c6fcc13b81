// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle specs
//!
//! Start a real background agent by re-executing `fly`, then drive it
//! with `ping`, `logs`, `restart` and `stop`.

use crate::prelude::*;

fn agent_answers(home: &FlyHome) -> bool {
    home.fly().args(&["agent", "ping"]).output().status.success()
}

#[test]
fn start_launches_a_background_agent() {
    let home = FlyHome::new();

    home.fly().args(&["agent", "start"]).passes().stdout_has("Agent running");

    home.fly()
        .args(&["agent", "ping"])
        .passes()
        .stdout_has(&format!("Version: {}", env!("CARGO_PKG_VERSION")))
        .stdout_has("Background: true");
}

#[test]
fn start_reuses_a_running_agent() {
    let home = FlyHome::new();
    home.fly().args(&["agent", "start"]).passes();
    let first = home.fly().args(&["agent", "ping", "-o", "json"]).passes().stdout();

    home.fly().args(&["agent", "start"]).passes();

    let second = home.fly().args(&["agent", "ping", "-o", "json"]).passes().stdout();
    assert_eq!(first, second, "a second start must not replace the agent");
}

#[test]
fn ping_json_uses_the_wire_field_names() {
    let home = FlyHome::new();
    home.fly().args(&["agent", "start"]).passes();

    home.fly()
        .args(&["agent", "ping", "-o", "json"])
        .passes()
        .stdout_has("\"PID\"")
        .stdout_has("\"Version\"")
        .stdout_has("\"Background\": true");
}

#[test]
fn agent_logs_its_ready_line() {
    let home = FlyHome::new();
    home.fly().args(&["agent", "start"]).passes();
    assert!(wait_for(SPEC_WAIT_MAX_MS, || home.agent_log().contains("OK ")));

    home.fly().args(&["agent", "logs"]).passes().stdout_has("OK ");
}

#[test]
fn stop_shuts_the_agent_down() {
    let home = FlyHome::new();
    home.fly().args(&["agent", "start"]).passes();

    home.fly().args(&["agent", "stop"]).passes().stdout_has("Agent stopped");

    let stopped = wait_for(SPEC_WAIT_MAX_MS, || !agent_answers(&home));
    if !stopped {
        eprintln!("=== AGENT LOG ===\n{}\n=== END LOG ===", home.agent_log());
    }
    assert!(stopped, "agent should stop answering after stop");
    let quit = wait_for(SPEC_WAIT_MAX_MS, || home.agent_log().contains("QUIT"));
    assert!(quit, "agent should log QUIT on the way out");
}

#[test]
fn restart_replaces_the_agent() {
    let home = FlyHome::new();
    home.fly().args(&["agent", "start"]).passes();
    let before = home.fly().args(&["agent", "ping", "-o", "json"]).passes().stdout();

    home.fly().args(&["agent", "restart"]).passes().stdout_has("Agent running");

    let after = home.fly().args(&["agent", "ping", "-o", "json"]).passes().stdout();
    assert_ne!(before, after, "restart should start a new agent process");
}

#[test]
fn foreground_agent_reports_itself_as_foreground() {
    let home = FlyHome::new();
    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("fly"))
        .args(["agent", "run"])
        .env("FLY_CONFIG_DIR", home.path())
        .env_remove("FLY_API_TOKEN")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .unwrap();

    let ready = wait_for(SPEC_WAIT_MAX_MS, || agent_answers(&home));
    let ping = home.fly().args(&["agent", "ping"]).output();
    let _ = child.kill();
    let _ = child.wait();

    assert!(ready, "foreground agent never answered");
    assert!(String::from_utf8_lossy(&ping.stdout).contains("Background: false"));
}
