use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the local setup pipeline.
///
/// All file names resolve relative to `project_root`. The defaults match the
/// backend checkout layout; builders exist for the few knobs worth turning
/// (alternate interpreter, alternate venv directory).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Backend checkout to operate on.
    pub project_root: PathBuf,
    /// Virtualenv directory name.
    pub venv_dir: String,
    /// Dependency manifest file name.
    pub manifest: String,
    /// Environment configuration file name.
    pub env_file: String,
    /// Checked-in template the env file is seeded from.
    pub env_template: String,
    /// Project initializer script, run as the final step.
    pub initializer: String,
    /// Interpreter used to create the virtualenv.
    pub python: String,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            venv_dir: ".venv".to_string(),
            manifest: "requirements.txt".to_string(),
            env_file: ".env".to_string(),
            env_template: "env.example".to_string(),
            initializer: "init_project.py".to_string(),
            python: "python3".to_string(),
        }
    }
}

impl SetupConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    pub fn with_venv_dir(mut self, venv_dir: impl Into<String>) -> Self {
        self.venv_dir = venv_dir.into();
        self
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    pub fn with_initializer(mut self, initializer: impl Into<String>) -> Self {
        self.initializer = initializer.into();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.project_root.as_os_str().is_empty() {
            return Err("project root cannot be empty".to_string());
        }
        if self.venv_dir.is_empty() {
            return Err("virtualenv directory cannot be empty".to_string());
        }
        if self.manifest.is_empty() {
            return Err("manifest file name cannot be empty".to_string());
        }
        if self.env_file.is_empty() || self.env_template.is_empty() {
            return Err("env file and template names cannot be empty".to_string());
        }
        if self.python.is_empty() {
            return Err("python interpreter cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.project_root.join(&self.manifest)
    }

    pub fn venv_path(&self) -> PathBuf {
        self.project_root.join(&self.venv_dir)
    }

    pub fn env_path(&self) -> PathBuf {
        self.project_root.join(&self.env_file)
    }

    pub fn env_template_path(&self) -> PathBuf {
        self.project_root.join(&self.env_template)
    }

    pub fn initializer_path(&self) -> PathBuf {
        self.project_root.join(&self.initializer)
    }

    /// Executable directory inside the virtualenv.
    pub fn venv_bin(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv_path().join("Scripts")
        } else {
            self.venv_path().join("bin")
        }
    }

    pub fn venv_python(&self) -> PathBuf {
        self.venv_bin().join(exe_name("python"))
    }

    pub fn venv_pip(&self) -> PathBuf {
        self.venv_bin().join(exe_name("pip"))
    }
}

fn exe_name(base: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", base)
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_default_config() {
        let config = SetupConfig::default();
        assert_eq!(config.venv_dir, ".venv");
        assert_eq!(config.manifest, "requirements.txt");
        assert_eq!(config.env_template, "env.example");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_paths_resolve_under_root() {
        let config = SetupConfig::new("/srv/backend");
        assert_eq!(
            config.manifest_path(),
            Path::new("/srv/backend/requirements.txt")
        );
        assert_eq!(config.env_path(), Path::new("/srv/backend/.env"));
        assert!(config.venv_pip().starts_with("/srv/backend/.venv"));
    }

    #[test]
    fn test_builder() {
        let config = SetupConfig::new("/tmp/x")
            .with_venv_dir("venv")
            .with_python("python3.11");
        assert_eq!(config.venv_dir, "venv");
        assert_eq!(config.python, "python3.11");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut config = SetupConfig::default();
        config.manifest = String::new();
        assert!(config.validate().is_err());

        let mut config = SetupConfig::default();
        config.python = String::new();
        assert!(config.validate().is_err());
    }
}
