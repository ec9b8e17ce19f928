//! The checked-in `deploy.toml` manifest.
//!
//! Deployments configure the one image definition here instead of forking
//! Dockerfiles. Loading validates the spec, so a bad manifest fails at load
//! time rather than at build time.

use crate::spec::ImageSpec;
use crate::{DeployError, DeployResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_MANIFEST_NAME: &str = "deploy.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployManifest {
    #[serde(default)]
    pub image: ImageSpec,
}

impl DeployManifest {
    /// Load and validate a manifest from disk.
    pub fn load(path: &Path) -> DeployResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| DeployError::ManifestLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&contents).map_err(|reason| DeployError::ManifestLoad {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Load the manifest if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> DeployResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn parse(contents: &str) -> Result<Self, String> {
        let manifest: DeployManifest =
            toml::from_str(contents).map_err(|e| e.to_string())?;
        manifest.image.validate()?;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::MigrationPolicy;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_manifest() {
        let manifest = DeployManifest::parse(
            r#"
            [image]
            base_image = "python:3.12-slim"
            build_packages = ["gcc", "libpq-dev"]
            port = 9000
            migrations = "external"
            tag = "tecnojuy-backend:2024-06"
            "#,
        )
        .unwrap();

        assert_eq!(manifest.image.base_image, "python:3.12-slim");
        assert_eq!(manifest.image.port, 9000);
        assert_eq!(manifest.image.migrations, MigrationPolicy::External);
        assert_eq!(manifest.image.tag, "tecnojuy-backend:2024-06");
        // Unset fields take defaults.
        assert_eq!(manifest.image.server_module, "app.main:app");
    }

    #[test]
    fn test_parse_accepts_true_false_policy_spellings() {
        let manifest = DeployManifest::parse("[image]\nmigrations = \"true\"\n").unwrap();
        assert_eq!(manifest.image.migrations, MigrationPolicy::Always);

        let manifest = DeployManifest::parse("[image]\nmigrations = \"false\"\n").unwrap();
        assert_eq!(manifest.image.migrations, MigrationPolicy::Never);
    }

    #[test]
    fn test_parse_rejects_unknown_policy() {
        let result = DeployManifest::parse(
            r#"
            [image]
            migrations = "sometimes"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_invalid_spec() {
        let result = DeployManifest::parse(
            r#"
            [image]
            base_image = "python:latest"
            "#,
        );
        assert!(result.unwrap_err().contains("pin an exact version"));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let manifest = DeployManifest::load_or_default(&dir.path().join("deploy.toml")).unwrap();
        assert_eq!(manifest.image.tag, ImageSpec::default().tag);
    }

    #[test]
    fn test_load_reports_path_on_bad_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deploy.toml");
        fs::write(&path, "not toml [").unwrap();

        match DeployManifest::load(&path) {
            Err(DeployError::ManifestLoad { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected ManifestLoad, got {:?}", other),
        }
    }
}
