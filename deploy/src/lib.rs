//! Container image definition and runtime integration for the TecnoJuy backend.
//!
//! One parameterized image definition replaces the repository's historical
//! pile of near-identical Dockerfiles; the only real difference between them
//! (whether database migrations run at container start) is an explicit
//! [`MigrationPolicy`] flag. The `runtime` module drives podman or docker to
//! build and run the resulting image.

use std::path::PathBuf;
use thiserror::Error;

pub mod containerfile;
pub mod manifest;
pub mod runtime;
pub mod spec;

pub use containerfile::render;
pub use manifest::DeployManifest;
pub use runtime::{
    detect_runtime, ContainerHandle, ContainerRuntime, ContainerState, RunOptions,
};
pub use spec::{ImageSpec, MigrationPolicy};

/// Errors related to image definition, build, and run.
#[derive(Error, Debug)]
pub enum DeployError {
    /// No container runtime is installed.
    #[error("no container runtime available. Install podman or docker to build and run images.")]
    NoRuntimeAvailable,

    /// The image spec fails validation.
    #[error("invalid image spec: {0}")]
    InvalidSpec(String),

    /// The deploy manifest could not be read or parsed.
    #[error("failed to load deploy manifest '{path}': {reason}")]
    ManifestLoad { path: PathBuf, reason: String },

    /// The image build exited non-zero.
    #[error("image build failed for '{tag}': {reason}")]
    BuildFailed { tag: String, reason: String },

    /// The container could not be started.
    #[error("failed to start container '{name}': {reason}")]
    ContainerStartFailed { name: String, reason: String },

    /// The service never became ready within the allotted time.
    #[error("container '{name}' was not ready at {url} after {timeout}s")]
    ReadinessTimeout {
        name: String,
        url: String,
        timeout: u64,
    },

    /// `inspect` failed or returned unparseable output.
    #[error("failed to inspect container '{name}': {reason}")]
    InspectFailed { name: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DeployResult<T> = Result<T, DeployError>;
