//! Hand-off to the project initializer script.

use crate::venv::{exit_code, venv_env};
use crate::{SetupConfig, SetupError, SetupResult};
use std::process::Command;
use tracing::info;

/// Run the project initializer with the virtualenv's interpreter.
///
/// The initializer is an external collaborator (it seeds the database and
/// checks the backend's own configuration); its exit status is checked
/// explicitly and a non-zero exit is fatal.
pub fn run_initializer(config: &SetupConfig) -> SetupResult<()> {
    let script = config.initializer_path();
    info!(script = %script.display(), "running project initializer");

    let mut cmd = Command::new(config.venv_python());
    cmd.arg(&config.initializer).current_dir(&config.project_root);
    for (key, value) in venv_env(config) {
        cmd.env(key, value);
    }

    let status = cmd.status().map_err(|e| SetupError::InitializerFailed {
        script: script.clone(),
        status: e.raw_os_error().unwrap_or(-1),
    })?;

    if !status.success() {
        return Err(SetupError::InitializerFailed {
            script,
            status: exit_code(status),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn stub_venv_python(config: &SetupConfig, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        fs::create_dir_all(config.venv_bin()).unwrap();
        fs::write(config.venv_python(), body).unwrap();
        fs::set_permissions(config.venv_python(), fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_initializer_success() {
        let dir = TempDir::new().unwrap();
        let config = SetupConfig::new(dir.path());
        stub_venv_python(&config, "#!/bin/sh\nexit 0\n");

        assert!(run_initializer(&config).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_initializer_failure_carries_status() {
        let dir = TempDir::new().unwrap();
        let config = SetupConfig::new(dir.path());
        stub_venv_python(&config, "#!/bin/sh\nexit 7\n");

        match run_initializer(&config) {
            Err(SetupError::InitializerFailed { status, .. }) => assert_eq!(status, 7),
            other => panic!("expected InitializerFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_initializer_missing_interpreter() {
        let dir = TempDir::new().unwrap();
        let config = SetupConfig::new(dir.path());

        let result = run_initializer(&config);
        assert!(matches!(result, Err(SetupError::InitializerFailed { .. })));
    }
}
