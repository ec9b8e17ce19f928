//! The setup pipeline: strictly linear, fail-fast, idempotent on re-run.

use crate::envfile::{missing_required_keys, seed_env_file, EnvSeedOutcome};
use crate::initializer::run_initializer;
use crate::venv::{ensure_venv, install_requirements, upgrade_pip, VenvOutcome};
use crate::{SetupConfig, SetupError, SetupResult};
use tracing::warn;

/// Knobs for a single pipeline run.
#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    /// Skip the final initializer hand-off (useful when the database is not
    /// reachable yet).
    pub skip_init: bool,
}

/// What a pipeline run actually did, so idempotency is observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupReport {
    pub venv: VenvOutcome,
    pub env_file: EnvSeedOutcome,
    /// Required keys still blank in the env file after seeding.
    pub missing_keys: Vec<&'static str>,
    pub initializer_ran: bool,
}

/// Run the whole setup flow.
///
/// Order is fixed: manifest precondition, virtualenv, pip upgrade, dependency
/// install, env seeding, initializer. The first failure aborts the run; no
/// step is retried. Interrupted runs leave partial state that the next run
/// repairs, since every step is idempotent.
pub fn run_setup(config: &SetupConfig, options: &SetupOptions) -> SetupResult<SetupReport> {
    config
        .validate()
        .map_err(SetupError::InvalidConfig)?;

    // Precondition: nothing else runs without the dependency manifest.
    let manifest = config.manifest_path();
    if !manifest.exists() {
        return Err(SetupError::MissingManifest { path: manifest });
    }

    let venv = ensure_venv(config)?;
    match venv {
        VenvOutcome::Created => println!("✓ Virtualenv created at {}", config.venv_path().display()),
        VenvOutcome::Reused => println!("✓ Virtualenv already exists, reusing"),
    }

    upgrade_pip(config)?;
    install_requirements(config)?;
    println!("✓ Dependencies installed from {}", config.manifest);

    let env_file = seed_env_file(&config.env_path(), &config.env_template_path())?;
    match env_file {
        EnvSeedOutcome::Seeded => {
            println!("✓ {} created from {}", config.env_file, config.env_template)
        }
        EnvSeedOutcome::Kept => println!("✓ {} already exists, keeping", config.env_file),
    }

    let missing_keys = missing_required_keys(&config.env_path())?;
    if !missing_keys.is_empty() {
        warn!(?missing_keys, "required configuration keys are blank");
        println!(
            "! Edit {} and fill in: {}",
            config.env_file,
            missing_keys.join(", ")
        );
    }

    let initializer_ran = if options.skip_init {
        println!("! Skipping project initializer");
        false
    } else {
        run_initializer(config)?;
        println!("✓ Project initialized successfully");
        true
    };

    Ok(SetupReport {
        venv,
        env_file,
        missing_keys,
        initializer_ran,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_manifest_fails_before_anything_else() {
        let dir = TempDir::new().unwrap();
        let config = SetupConfig::new(dir.path());

        let result = run_setup(&config, &SetupOptions::default());
        assert!(matches!(result, Err(SetupError::MissingManifest { .. })));
        // Fail-fast: the virtualenv must not have been created.
        assert!(!config.venv_path().exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = SetupConfig::new(dir.path());
        config.manifest = String::new();

        let result = run_setup(&config, &SetupOptions::default());
        assert!(matches!(result, Err(SetupError::InvalidConfig(_))));
    }
}
