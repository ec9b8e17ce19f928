//! Container runtime integration: build, run, readiness, inspection.

use crate::containerfile::render;
use crate::spec::ImageSpec;
use crate::{DeployError, DeployResult};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Container runtime types supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    Podman,
    Docker,
    /// No container runtime available.
    None,
}

impl ContainerRuntime {
    /// Get the command name for this runtime.
    pub fn command(&self) -> &'static str {
        match self {
            ContainerRuntime::Podman => "podman",
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::None => "",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ContainerRuntime::Podman | ContainerRuntime::Docker)
    }
}

/// Detect an available runtime, podman preferred for rootless operation.
pub fn detect_runtime() -> ContainerRuntime {
    for (candidate, runtime) in [
        ("podman", ContainerRuntime::Podman),
        ("docker", ContainerRuntime::Docker),
    ] {
        let available = Command::new(candidate)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success());
        if available {
            return runtime;
        }
    }
    ContainerRuntime::None
}

/// Options for starting a container from a built image.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Name for the container instance.
    pub name: String,
    /// Host port mapped to the container port.
    pub host_port: u16,
    /// Extra `KEY=VALUE` environment for the container.
    pub env: Vec<(String, String)>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            name: "tecnojuy-backend".to_string(),
            host_port: 8000,
            env: Vec::new(),
        }
    }
}

/// Handle for a running container. Dropping the handle force-removes the
/// container unless [`ContainerHandle::release`] was called.
#[derive(Debug)]
pub struct ContainerHandle {
    pub name: String,
    pub runtime: ContainerRuntime,
    pub host_port: u16,
    needs_cleanup: bool,
}

impl ContainerHandle {
    /// Leave the container running after the handle is dropped.
    pub fn release(&mut self) {
        self.needs_cleanup = false;
    }

    pub fn docs_url(&self) -> String {
        format!("http://localhost:{}/docs", self.host_port)
    }
}

impl Drop for ContainerHandle {
    fn drop(&mut self) {
        if self.needs_cleanup && self.runtime.is_available() {
            let _ = Command::new(self.runtime.command())
                .args(["rm", "-f", &self.name])
                .output();
        }
    }
}

/// Observed state of a container, from `inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub running: bool,
    /// Effective user the process runs as, when the runtime reports one.
    pub user: Option<String>,
}

/// Build the image for a spec.
///
/// The Containerfile is rendered in-process and fed to the runtime on stdin,
/// so the build context stays exactly the application checkout. A failing
/// dependency install fails the build; the error carries the runtime's
/// stderr.
pub fn build_image(
    runtime: ContainerRuntime,
    spec: &ImageSpec,
    context: &Path,
) -> DeployResult<()> {
    if !runtime.is_available() {
        return Err(DeployError::NoRuntimeAvailable);
    }
    spec.validate().map_err(DeployError::InvalidSpec)?;

    info!(tag = %spec.tag, context = %context.display(), "building image");
    let mut child = Command::new(runtime.command())
        .args(["build", "-t", &spec.tag, "-f", "-"])
        .arg(context)
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| DeployError::BuildFailed {
            tag: spec.tag.clone(),
            reason: e.to_string(),
        })?;

    // stdin is piped above, so take() cannot return None.
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(render(spec).as_bytes())?;
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(DeployError::BuildFailed {
            tag: spec.tag.clone(),
            reason: format!(
                "{} build exited with status {}",
                runtime.command(),
                status.code().unwrap_or(-1)
            ),
        });
    }

    println!("✓ Built image {}", spec.tag);
    Ok(())
}

/// Start a container from a built image.
pub fn start_container(
    runtime: ContainerRuntime,
    spec: &ImageSpec,
    options: &RunOptions,
) -> DeployResult<ContainerHandle> {
    if !runtime.is_available() {
        return Err(DeployError::NoRuntimeAvailable);
    }

    // Replace any stale instance with the same name.
    let _ = Command::new(runtime.command())
        .args(["rm", "-f", &options.name])
        .output();

    let mut cmd = Command::new(runtime.command());
    cmd.args(["run", "-d", "--rm", "--name", &options.name]);
    cmd.args(["-p", &format!("{}:{}", options.host_port, spec.port)]);
    cmd.args(["-e", &format!("PORT={}", spec.port)]);
    for (key, value) in &options.env {
        cmd.args(["-e", &format!("{}={}", key, value)]);
    }
    cmd.arg(&spec.tag);

    info!(name = %options.name, tag = %spec.tag, "starting container");
    let output = cmd.output().map_err(|e| DeployError::ContainerStartFailed {
        name: options.name.clone(),
        reason: e.to_string(),
    })?;

    if !output.status.success() {
        return Err(DeployError::ContainerStartFailed {
            name: options.name.clone(),
            reason: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(ContainerHandle {
        name: options.name.clone(),
        runtime,
        host_port: options.host_port,
        needs_cleanup: true,
    })
}

/// Poll the served HTTP surface until it responds or the timeout elapses.
///
/// With the `always` migration policy a failed migration means the server
/// never binds, so this is also how a bad rollout surfaces.
pub async fn wait_ready(handle: &ContainerHandle, timeout: Duration) -> DeployResult<()> {
    let url = handle.docs_url();
    let client = reqwest::Client::new();
    let start = std::time::Instant::now();

    loop {
        match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(%url, "service ready");
                return Ok(());
            }
            Ok(response) => {
                debug!(%url, status = %response.status(), "service not ready yet");
            }
            Err(e) => {
                debug!(%url, error = %e, "service not reachable yet");
            }
        }

        if start.elapsed() >= timeout {
            return Err(DeployError::ReadinessTimeout {
                name: handle.name.clone(),
                url,
                timeout: timeout.as_secs(),
            });
        }
        sleep(Duration::from_secs(2)).await;
    }
}

/// Inspect a container's running state and effective user.
pub fn container_state(handle: &ContainerHandle) -> DeployResult<ContainerState> {
    let output = Command::new(handle.runtime.command())
        .args(["inspect", &handle.name])
        .output()
        .map_err(|e| DeployError::InspectFailed {
            name: handle.name.clone(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(DeployError::InspectFailed {
            name: handle.name.clone(),
            reason: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    parse_inspect_output(&output.stdout).map_err(|reason| DeployError::InspectFailed {
        name: handle.name.clone(),
        reason,
    })
}

/// `inspect` returns a JSON array with one object per container.
fn parse_inspect_output(stdout: &[u8]) -> Result<ContainerState, String> {
    let parsed: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|e| e.to_string())?;
    let entry = parsed
        .as_array()
        .and_then(|entries| entries.first())
        .ok_or_else(|| "inspect returned no entries".to_string())?;

    let running = entry
        .pointer("/State/Running")
        .and_then(serde_json::Value::as_bool)
        .ok_or_else(|| "inspect output missing State.Running".to_string())?;
    let user = entry
        .pointer("/Config/User")
        .and_then(serde_json::Value::as_str)
        .filter(|u| !u.is_empty())
        .map(str::to_string);

    Ok(ContainerState { running, user })
}
