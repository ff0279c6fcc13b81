// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Help, version and commands that need no running agent

use crate::prelude::*;

#[test]
fn fly_help_lists_agent() {
    cli().args(&["--help"]).passes().stdout_has("Usage:").stdout_has("agent");
}

#[test]
fn fly_agent_help_shows_subcommands() {
    cli()
        .args(&["agent", "--help"])
        .passes()
        .stdout_has("run")
        .stdout_has("start")
        .stdout_has("stop")
        .stdout_has("restart")
        .stdout_has("ping")
        .stdout_has("logs");
}

#[test]
fn fly_version_includes_the_package_version() {
    cli().args(&["--version"]).passes().stdout_has(env!("CARGO_PKG_VERSION"));
}

#[test]
fn ping_without_an_agent_exits_one() {
    let home = FlyHome::new();

    home.fly().args(&["agent", "ping"]).fails().code_is(1).stderr_has("Agent not running");
}

#[test]
fn stop_without_an_agent_reports_it() {
    let home = FlyHome::new();

    home.fly().args(&["agent", "stop"]).passes().stdout_has("Agent not running");
}

#[test]
fn stop_json_reports_nothing_stopped() {
    let home = FlyHome::new();

    home.fly()
        .args(&["agent", "stop", "-o", "json"])
        .passes()
        .stdout_has("\"stopped\": false");
}

#[test]
fn logs_without_any_agent_logs() {
    let home = FlyHome::new();

    home.fly().args(&["agent", "logs"]).passes().stdout_has("No agent logs found");
}

#[test]
fn logs_show_the_latest_log() {
    let home = FlyHome::new();
    let dir = home.path().join("agent-logs");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("20260101T000000.000-1.log"), "first line\nsecond line\n").unwrap();

    home.fly()
        .args(&["agent", "logs", "-n", "1"])
        .passes()
        .stdout_has("second line");
}
