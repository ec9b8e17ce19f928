//! Virtualenv creation and dependency installation.
//!
//! Child processes receive the virtualenv explicitly (`VIRTUAL_ENV` plus a
//! venv-first `PATH`) instead of this process activating anything; no ambient
//! environment mutation happens here.

use crate::{SetupConfig, SetupError, SetupResult};
use std::env;
use std::ffi::OsString;
use std::process::Command;
use tracing::{debug, info};

/// What `ensure_venv` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenvOutcome {
    /// A new virtualenv was created.
    Created,
    /// An existing virtualenv was reused.
    Reused,
}

/// Create the virtualenv if it does not already exist.
pub fn ensure_venv(config: &SetupConfig) -> SetupResult<VenvOutcome> {
    let venv = config.venv_path();
    if venv.exists() {
        debug!(path = %venv.display(), "virtualenv present, reusing");
        return Ok(VenvOutcome::Reused);
    }

    info!(path = %venv.display(), python = %config.python, "creating virtualenv");
    let status = Command::new(&config.python)
        .arg("-m")
        .arg("venv")
        .arg(&venv)
        .current_dir(&config.project_root)
        .status()
        .map_err(|e| SetupError::VenvCreateFailed {
            path: venv.clone(),
            reason: e.to_string(),
        })?;

    if !status.success() {
        return Err(SetupError::VenvCreateFailed {
            path: venv,
            reason: format!("`{} -m venv` exited with status {}", config.python, exit_code(status)),
        });
    }

    Ok(VenvOutcome::Created)
}

/// Environment handed to every child process that must see the virtualenv.
pub fn venv_env(config: &SetupConfig) -> Vec<(OsString, OsString)> {
    let bin = config.venv_bin();
    let path = match env::var_os("PATH") {
        Some(existing) => {
            let mut joined = bin.as_os_str().to_os_string();
            joined.push(if cfg!(windows) { ";" } else { ":" });
            joined.push(existing);
            joined
        }
        None => bin.as_os_str().to_os_string(),
    };
    vec![
        (OsString::from("VIRTUAL_ENV"), config.venv_path().into_os_string()),
        (OsString::from("PATH"), path),
    ]
}

/// Upgrade pip inside the virtualenv.
pub fn upgrade_pip(config: &SetupConfig) -> SetupResult<()> {
    run_pip(config, &["install", "--upgrade", "pip"])
}

/// Install every dependency declared in the manifest.
pub fn install_requirements(config: &SetupConfig) -> SetupResult<()> {
    let manifest = config.manifest.clone();
    run_pip(config, &["install", "-r", &manifest])
}

fn run_pip(config: &SetupConfig, args: &[&str]) -> SetupResult<()> {
    let pip = config.venv_pip();
    let command = format!("{} {}", pip.display(), args.join(" "));
    info!(%command, "running pip");

    let mut cmd = Command::new(&pip);
    cmd.args(args).current_dir(&config.project_root);
    for (key, value) in venv_env(config) {
        cmd.env(key, value);
    }

    let status = cmd.status().map_err(|e| SetupError::InstallFailed {
        command: command.clone(),
        status: e.raw_os_error().unwrap_or(-1),
    })?;

    if !status.success() {
        return Err(SetupError::InstallFailed {
            command,
            status: exit_code(status),
        });
    }
    Ok(())
}

pub(crate) fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
