//! The image specification and the migration-timing policy flag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// When database migrations run relative to server startup.
///
/// This single flag replaces three forked Dockerfiles that differed only
/// here. `Never` and `External` render the same start command; they differ in
/// documented operator intent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum MigrationPolicy {
    /// Chain the migration command before the server: `migrate && serve`.
    /// A failing migration short-circuits and the server never starts.
    #[default]
    Always,
    /// Start the server only; this image's lifecycle does not involve
    /// migrations.
    Never,
    /// Start the server only; an operator applies migrations out-of-band
    /// before rollout.
    External,
}

impl FromStr for MigrationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "true"/"false" accepted as spellings of the on-start flag.
        match s.to_ascii_lowercase().as_str() {
            "always" | "true" => Ok(MigrationPolicy::Always),
            "never" | "false" => Ok(MigrationPolicy::Never),
            "external" => Ok(MigrationPolicy::External),
            other => Err(format!(
                "unknown migration policy '{}' (expected always, never, or external)",
                other
            )),
        }
    }
}

// Deserialization goes through FromStr so the manifest accepts the same
// spellings as the CLI, true/false included.
impl TryFrom<String> for MigrationPolicy {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for MigrationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationPolicy::Always => write!(f, "always"),
            MigrationPolicy::Never => write!(f, "never"),
            MigrationPolicy::External => write!(f, "external"),
        }
    }
}

/// Everything needed to render and build the backend image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSpec {
    /// Base image, pinned to an exact runtime version.
    pub base_image: String,
    /// OS packages needed to build native extensions of the dependencies.
    pub build_packages: Vec<String>,
    /// Dependency manifest file inside the build context.
    pub manifest: String,
    /// Non-root account the server runs as.
    pub app_user: String,
    /// Port the server binds and the image exposes (overridable at runtime
    /// via `PORT`).
    pub port: u16,
    /// ASGI application module, `package.module:attribute`.
    pub server_module: String,
    /// Migration command chained per policy.
    pub migration_command: String,
    /// Migration timing policy.
    pub migrations: MigrationPolicy,
    /// Tag the built image is labeled with.
    pub tag: String,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            base_image: "python:3.11-slim".to_string(),
            build_packages: vec!["gcc".to_string(), "libpq-dev".to_string()],
            manifest: "requirements.txt".to_string(),
            app_user: "appuser".to_string(),
            port: 8000,
            server_module: "app.main:app".to_string(),
            migration_command: "alembic upgrade head".to_string(),
            migrations: MigrationPolicy::Always,
            tag: "tecnojuy-backend:latest".to_string(),
        }
    }
}

impl ImageSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_migrations(mut self, policy: MigrationPolicy) -> Self {
        self.migrations = policy;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_base_image(mut self, base_image: impl Into<String>) -> Self {
        self.base_image = base_image.into();
        self
    }

    /// The uvicorn invocation, honoring a runtime `PORT` override.
    pub fn server_command(&self) -> String {
        format!(
            "uvicorn {} --host 0.0.0.0 --port ${{PORT:-{}}}",
            self.server_module, self.port
        )
    }

    /// The full start command per the migration policy. The `&&` chain makes
    /// a failing migration abort before the server ever starts.
    pub fn start_command(&self) -> String {
        match self.migrations {
            MigrationPolicy::Always => {
                format!("{} && {}", self.migration_command, self.server_command())
            }
            MigrationPolicy::Never | MigrationPolicy::External => self.server_command(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let (_, version) = self
            .base_image
            .rsplit_once(':')
            .ok_or_else(|| format!("base image '{}' must pin a version tag", self.base_image))?;
        if version.is_empty() || version == "latest" {
            return Err(format!(
                "base image '{}' must pin an exact version, not latest",
                self.base_image
            ));
        }
        if self.port == 0 {
            return Err("port cannot be 0".to_string());
        }
        if self.app_user.is_empty() || self.app_user == "root" {
            return Err("app user must be a dedicated non-root account".to_string());
        }
        if self.manifest.is_empty() {
            return Err("manifest file name cannot be empty".to_string());
        }
        if !self.server_module.contains(':') {
            return Err(format!(
                "server module '{}' must be of the form package.module:attribute",
                self.server_module
            ));
        }
        if self.migration_command.is_empty() {
            return Err("migration command cannot be empty".to_string());
        }
        if self.tag.is_empty() {
            return Err("image tag cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec_is_valid() {
        let spec = ImageSpec::default();
        assert!(spec.validate().is_ok());
        assert_eq!(spec.port, 8000);
        assert_eq!(spec.migrations, MigrationPolicy::Always);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("always".parse(), Ok(MigrationPolicy::Always));
        assert_eq!("true".parse(), Ok(MigrationPolicy::Always));
        assert_eq!("never".parse(), Ok(MigrationPolicy::Never));
        assert_eq!("false".parse(), Ok(MigrationPolicy::Never));
        assert_eq!("External".parse(), Ok(MigrationPolicy::External));
        assert!("sometimes".parse::<MigrationPolicy>().is_err());
    }

    #[test]
    fn test_policy_display_round_trips() {
        for policy in [
            MigrationPolicy::Always,
            MigrationPolicy::Never,
            MigrationPolicy::External,
        ] {
            assert_eq!(policy.to_string().parse(), Ok(policy));
        }
    }

    #[test]
    fn test_start_command_chains_migrations_only_for_always() {
        let spec = ImageSpec::default().with_migrations(MigrationPolicy::Always);
        assert_eq!(
            spec.start_command(),
            "alembic upgrade head && uvicorn app.main:app --host 0.0.0.0 --port ${PORT:-8000}"
        );

        let spec = ImageSpec::default().with_migrations(MigrationPolicy::Never);
        assert!(!spec.start_command().contains("alembic"));

        let spec = ImageSpec::default().with_migrations(MigrationPolicy::External);
        assert_eq!(
            spec.start_command(),
            ImageSpec::default()
                .with_migrations(MigrationPolicy::Never)
                .start_command()
        );
    }

    #[test]
    fn test_validate_rejects_unpinned_base_image() {
        let spec = ImageSpec::default().with_base_image("python");
        assert!(spec.validate().is_err());

        let spec = ImageSpec::default().with_base_image("python:latest");
        assert!(spec.validate().is_err());

        let spec = ImageSpec::default().with_base_image("python:3.11-slim");
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_root_user_and_port_zero() {
        let mut spec = ImageSpec::default();
        spec.app_user = "root".to_string();
        assert!(spec.validate().is_err());

        let spec = ImageSpec::default().with_port(0);
        assert!(spec.validate().is_err());
    }
}
