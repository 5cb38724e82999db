//! Shared test utilities for laodong-cli integration tests.

#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;

/// A `laodong` command isolated from the caller's environment.
///
/// `HOME` points at `home` so `~/.laodong/config.yaml` is never the real one.
#[allow(deprecated)]
pub fn laodong_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("laodong").expect("laodong binary should exist");
    cmd.env("HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("LAODONG_CONFIG")
        .env_remove("LAODONG_CORPUS")
        .env_remove("LAODONG_VERBOSE")
        .env_remove("RUST_LOG");
    cmd
}

/// Write `~/.laodong/config.yaml` under `home`.
pub fn write_config(home: &Path, yaml: &str) -> std::path::PathBuf {
    let dir = home.join(".laodong");
    std::fs::create_dir_all(&dir).expect("create config dir");
    let path = dir.join("config.yaml");
    std::fs::write(&path, yaml).expect("write config");
    path
}
