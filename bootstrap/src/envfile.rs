//! `.env` seeding and inspection.
//!
//! The env file is created exactly once by copying the checked-in template;
//! after that it belongs to the operator and is never touched again.

use crate::{SetupError, SetupResult};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Keys the backend refuses to start without. Mirrors the checks the project
/// initializer performs on its side.
pub const REQUIRED_ENV_KEYS: &[&str] = &[
    "DATABASE_URL",
    "SECRET_KEY",
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
];

/// What `seed_env_file` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvSeedOutcome {
    /// The env file already existed and was left alone.
    Kept,
    /// The env file was created from the template.
    Seeded,
}

/// Ensure the env file exists, copying it from the template if needed.
///
/// An existing env file is never overwritten. If both the env file and the
/// template are missing there is nothing to configure from and the error is
/// fatal.
pub fn seed_env_file(env_file: &Path, template: &Path) -> SetupResult<EnvSeedOutcome> {
    if env_file.exists() {
        debug!(path = %env_file.display(), "env file present, keeping");
        return Ok(EnvSeedOutcome::Kept);
    }

    if !template.exists() {
        return Err(SetupError::MissingEnvTemplate {
            env_file: env_file.to_path_buf(),
            template: template.to_path_buf(),
        });
    }

    fs::copy(template, env_file)?;
    debug!(
        from = %template.display(),
        to = %env_file.display(),
        "seeded env file from template"
    );
    Ok(EnvSeedOutcome::Seeded)
}

/// Parse a KEY=VALUE env file. Comments (`#`) and blank lines are skipped;
/// values may be wrapped in single or double quotes.
pub fn parse_env_file(path: &Path) -> SetupResult<HashMap<String, String>> {
    let contents = fs::read_to_string(path)?;
    let mut vars = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let value = line_value(value);
            vars.insert(key.to_string(), value.to_string());
        }
    }

    Ok(vars)
}

fn line_value(raw: &str) -> &str {
    let value = raw.trim();
    let stripped = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')));
    stripped.unwrap_or(value)
}

/// Required keys that are absent or blank in the env file.
///
/// This is advisory: the setup pipeline warns about them but does not fail,
/// since a freshly seeded file is expected to need manual completion.
pub fn missing_required_keys(path: &Path) -> SetupResult<Vec<&'static str>> {
    let vars = parse_env_file(path)?;
    let missing = REQUIRED_ENV_KEYS
        .iter()
        .filter(|key| vars.get(**key).map_or(true, |v| v.is_empty()))
        .copied()
        .collect();
    Ok(missing)
}
