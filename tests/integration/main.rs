//! Integration tests driving the `kuby` binary.

mod config_file;
mod fetch_files;
mod follow;
mod kubectl_stub;
mod options_cli;

use std::path::Path;

use assert_cmd::Command;

/// `kuby` isolated in `home`: no user config, options stored under `home`.
#[allow(deprecated)]
pub fn kuby(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kuby").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env_remove("RUST_LOG")
        .arg("--color=never")
        .arg("--timezone=utc");
    cmd
}

/// Write `<dir>/<name>.log`.
pub fn write_log(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(format!("{name}.log")), content).unwrap();
}
