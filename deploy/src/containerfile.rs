//! Containerfile rendering.
//!
//! Rendering is a pure function of the [`ImageSpec`]: same spec, same bytes.
//! Layer order is deliberate: the dependency manifest is copied and installed
//! before the application code so code-only changes reuse the dependency
//! layer from the build cache.

use crate::spec::{ImageSpec, MigrationPolicy};

/// Render the spec into a Containerfile.
pub fn render(spec: &ImageSpec) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "# Generated by opsctl render; migration policy: {}\n",
        spec.migrations
    ));
    if spec.migrations == MigrationPolicy::External {
        out.push_str(
            "# Migrations are applied out-of-band by an operator before rollout.\n",
        );
    }
    out.push_str(&format!("FROM {}\n\n", spec.base_image));

    // Toolchain for native-extension builds, with the package list cleaned up
    // in the same layer to keep the image small.
    if !spec.build_packages.is_empty() {
        out.push_str("RUN apt-get update \\\n");
        out.push_str(&format!(
            "    && apt-get install -y --no-install-recommends {} \\\n",
            spec.build_packages.join(" ")
        ));
        out.push_str("    && rm -rf /var/lib/apt/lists/*\n\n");
    }

    out.push_str("WORKDIR /app\n\n");

    out.push_str(&format!("COPY {} .\n", spec.manifest));
    out.push_str(&format!(
        "RUN pip install --no-cache-dir -r {}\n\n",
        spec.manifest
    ));

    out.push_str("COPY . .\n\n");

    // The server never runs as root.
    out.push_str(&format!(
        "RUN useradd --create-home {user} \\\n    && chown -R {user}:{user} /app\n",
        user = spec.app_user
    ));
    out.push_str(&format!("USER {}\n\n", spec.app_user));

    out.push_str(&format!("ENV PORT={}\n", spec.port));
    out.push_str(&format!("EXPOSE {}\n\n", spec.port));

    out.push_str(&format!(
        "CMD [\"sh\", \"-c\", \"{}\"]\n",
        spec.start_command()
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_deterministic() {
        let spec = ImageSpec::default();
        assert_eq!(render(&spec), render(&spec));
    }

    #[test]
    fn test_always_policy_chains_migration_in_cmd() {
        let spec = ImageSpec::default().with_migrations(MigrationPolicy::Always);
        let rendered = render(&spec);
        assert!(rendered.contains("alembic upgrade head && uvicorn"));
    }

    #[test]
    fn test_never_and_external_render_same_cmd() {
        let never = render(&ImageSpec::default().with_migrations(MigrationPolicy::Never));
        let external = render(&ImageSpec::default().with_migrations(MigrationPolicy::External));

        let cmd = |s: &str| {
            s.lines()
                .find(|l| l.starts_with("CMD"))
                .map(str::to_string)
                .unwrap()
        };
        assert_eq!(cmd(&never), cmd(&external));
        assert!(!cmd(&never).contains("alembic"));
        // External documents the operator's responsibility.
        assert!(external.contains("out-of-band"));
    }

    #[test]
    fn test_manifest_installed_before_app_copy() {
        let rendered = render(&ImageSpec::default());
        let manifest_copy = rendered.find("COPY requirements.txt").unwrap();
        let pip_install = rendered.find("pip install").unwrap();
        let app_copy = rendered.find("COPY . .").unwrap();
        assert!(manifest_copy < pip_install);
        assert!(pip_install < app_copy);
    }

    #[test]
    fn test_user_switched_before_cmd() {
        let rendered = render(&ImageSpec::default());
        let user = rendered.find("USER appuser").unwrap();
        let cmd = rendered.find("CMD [").unwrap();
        assert!(user < cmd);
        assert!(rendered.contains("useradd --create-home appuser"));
    }

    #[test]
    fn test_base_image_pinned_and_port_declared() {
        let rendered = render(&ImageSpec::default());
        assert!(rendered.starts_with("# Generated by opsctl render"));
        assert!(rendered.contains("FROM python:3.11-slim\n"));
        assert!(rendered.contains("EXPOSE 8000\n"));
        assert!(rendered.contains("ENV PORT=8000\n"));
        assert!(rendered.contains("--port ${PORT:-8000}"));
    }

    #[test]
    fn test_toolchain_cleanup_in_same_layer() {
        let rendered = render(&ImageSpec::default());
        let run_line = rendered
            .split("\n\n")
            .find(|block| block.contains("apt-get install"))
            .unwrap();
        assert!(run_line.contains("gcc libpq-dev"));
        assert!(run_line.contains("rm -rf /var/lib/apt/lists/*"));
    }

    #[test]
    fn test_no_build_packages_skips_apt_layer() {
        let mut spec = ImageSpec::default();
        spec.build_packages.clear();
        let rendered = render(&spec);
        assert!(!rendered.contains("apt-get"));
    }
}
