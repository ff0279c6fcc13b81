// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs::File;
use std::time::Duration;
use tempfile::tempdir;

fn bump_mtime(path: &std::path::Path, by: Duration) {
    let file = File::options().write(true).open(path).unwrap();
    let mtime = file.metadata().unwrap().modified().unwrap();
    file.set_modified(mtime + by).unwrap();
}

#[test]
fn unchanged_file_is_not_a_change() {
    let dir = tempdir().unwrap();
    let config = ConfigFile::at(dir.path().join("config.toml"));
    config.set_access_token("fm2_a").unwrap();
    let watch = ConfigWatch::new(config).unwrap();

    assert!(!watch.changed().unwrap());
}

#[test]
fn newer_mtime_is_a_change_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let config = ConfigFile::at(&path);
    config.set_access_token("fm2_a").unwrap();
    let watch = ConfigWatch::new(config).unwrap();

    bump_mtime(&path, Duration::from_secs(10));

    assert!(watch.changed().unwrap());
    assert!(!watch.changed().unwrap());
}

#[test]
fn older_mtime_is_not_a_change() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let config = ConfigFile::at(&path);
    config.set_access_token("fm2_a").unwrap();
    bump_mtime(&path, Duration::from_secs(60));
    let watch = ConfigWatch::new(config).unwrap();

    let file = File::options().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1)).unwrap();

    assert!(!watch.changed().unwrap());
}

#[test]
fn missing_then_created_is_a_change() {
    let dir = tempdir().unwrap();
    let config = ConfigFile::at(dir.path().join("config.toml"));
    let watch = ConfigWatch::new(config.clone()).unwrap();

    assert!(!watch.changed().unwrap());
    config.set_access_token("fm2_a").unwrap();

    assert!(watch.changed().unwrap());
}
