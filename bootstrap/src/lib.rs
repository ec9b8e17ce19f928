//! Local setup pipeline for the TecnoJuy backend.
//!
//! Prepares a runnable checkout end to end: virtualenv creation, dependency
//! installation, `.env` seeding from the checked-in template, and a final
//! hand-off to the project initializer script. Every step is idempotent and
//! every failure is fatal; a second run repairs whatever an interrupted run
//! left behind.

use std::path::PathBuf;
use thiserror::Error;

pub mod config;
pub mod envfile;
pub mod initializer;
pub mod pipeline;
pub mod venv;

pub use config::SetupConfig;
pub use envfile::{missing_required_keys, seed_env_file, EnvSeedOutcome, REQUIRED_ENV_KEYS};
pub use initializer::run_initializer;
pub use pipeline::{run_setup, SetupOptions, SetupReport};
pub use venv::{ensure_venv, install_requirements, upgrade_pip, VenvOutcome};

/// Errors raised by the setup pipeline.
///
/// Each variant carries enough context for the operator to act; none are
/// retried and none are swallowed.
#[derive(Error, Debug)]
pub enum SetupError {
    /// Required dependency manifest is absent.
    #[error(
        "dependency manifest '{path}' not found. Run setup from the backend \
         checkout (the directory containing requirements.txt)."
    )]
    MissingManifest { path: PathBuf },

    /// Neither the env file nor its template exist, so no configuration is possible.
    #[error(
        "'{env_file}' is missing and there is no '{template}' to seed it from. \
         Restore env.example from version control or create .env by hand."
    )]
    MissingEnvTemplate { env_file: PathBuf, template: PathBuf },

    /// Virtualenv creation failed.
    #[error("failed to create virtualenv at '{path}': {reason}")]
    VenvCreateFailed { path: PathBuf, reason: String },

    /// A pip invocation exited non-zero.
    #[error("dependency installation failed: `{command}` exited with status {status}")]
    InstallFailed { command: String, status: i32 },

    /// The project initializer exited non-zero.
    #[error("project initializer '{script}' exited with status {status}")]
    InitializerFailed { script: PathBuf, status: i32 },

    /// The setup configuration itself is unusable.
    #[error("invalid setup configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SetupResult<T> = Result<T, SetupError>;
