use bootstrap::{run_setup, SetupConfig, SetupOptions};
use clap::{Parser, Subcommand};
use deploy::manifest::DEFAULT_MANIFEST_NAME;
use deploy::{
    containerfile, detect_runtime, runtime, DeployError, DeployManifest, ImageSpec,
    MigrationPolicy, RunOptions,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;

#[derive(Parser)]
#[command(name = "opsctl")]
#[command(about = "Setup and deployment tooling for the TecnoJuy backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare a local development environment
    Setup {
        /// Backend checkout to operate on
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Skip the project initializer hand-off
        #[arg(long)]
        skip_init: bool,
        /// Python interpreter used to create the virtualenv
        #[arg(long, default_value = "python3")]
        python: String,
    },
    /// Render the Containerfile for the configured image
    Render {
        /// Deploy manifest to read the image spec from
        #[arg(long, default_value = DEFAULT_MANIFEST_NAME)]
        manifest: PathBuf,
        /// Override the migration policy (always, never, external)
        #[arg(long)]
        policy: Option<MigrationPolicy>,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Build the backend image with the detected container runtime
    Build {
        #[arg(long, default_value = DEFAULT_MANIFEST_NAME)]
        manifest: PathBuf,
        #[arg(long)]
        policy: Option<MigrationPolicy>,
        /// Override the image tag
        #[arg(long)]
        tag: Option<String>,
        /// Build context directory
        #[arg(long, default_value = ".")]
        context: PathBuf,
    },
    /// Run the built image and wait for the HTTP surface to come up
    Run {
        #[arg(long, default_value = DEFAULT_MANIFEST_NAME)]
        manifest: PathBuf,
        #[arg(long)]
        tag: Option<String>,
        /// Host port to bind (falls back to $PORT, then 8000)
        #[arg(long)]
        port: Option<u16>,
        /// Container instance name
        #[arg(long, default_value = "tecnojuy-backend")]
        name: String,
        /// Seconds to wait for readiness before giving up
        #[arg(long, default_value = "60")]
        wait_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Setup {
            root,
            skip_init,
            python,
        } => cmd_setup(root, skip_init, python),
        Commands::Render {
            manifest,
            policy,
            out,
        } => cmd_render(manifest, policy, out),
        Commands::Build {
            manifest,
            policy,
            tag,
            context,
        } => cmd_build(manifest, policy, tag, context),
        Commands::Run {
            manifest,
            tag,
            port,
            name,
            wait_secs,
        } => cmd_run(manifest, tag, port, name, wait_secs).await,
    };

    if let Err(e) = result {
        println!("✗ {}", e);
        error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_setup(
    root: PathBuf,
    skip_init: bool,
    python: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = SetupConfig::new(root).with_python(python);
    let options = SetupOptions { skip_init };
    let report = run_setup(&config, &options)?;

    if report.initializer_ran {
        println!("✓ Setup complete. Start the server with: uvicorn app.main:app --reload");
    } else {
        println!("✓ Environment prepared (initializer not run)");
    }
    Ok(())
}

fn load_spec(
    manifest: &PathBuf,
    policy: Option<MigrationPolicy>,
    tag: Option<String>,
) -> Result<ImageSpec, DeployError> {
    let mut spec = DeployManifest::load_or_default(manifest)?.image;
    if let Some(policy) = policy {
        spec = spec.with_migrations(policy);
    }
    if let Some(tag) = tag {
        spec = spec.with_tag(tag);
    }
    spec.validate().map_err(DeployError::InvalidSpec)?;
    Ok(spec)
}

fn cmd_render(
    manifest: PathBuf,
    policy: Option<MigrationPolicy>,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = load_spec(&manifest, policy, None)?;
    let rendered = containerfile::render(&spec);

    match out {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            println!("✓ Containerfile written to {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn cmd_build(
    manifest: PathBuf,
    policy: Option<MigrationPolicy>,
    tag: Option<String>,
    context: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = load_spec(&manifest, policy, tag)?;
    let rt = detect_runtime();
    runtime::build_image(rt, &spec, &context)?;
    Ok(())
}

async fn cmd_run(
    manifest: PathBuf,
    tag: Option<String>,
    port: Option<u16>,
    name: String,
    wait_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = load_spec(&manifest, None, tag)?;
    let host_port = resolve_host_port(port, std::env::var("PORT").ok().as_deref(), spec.port);

    let rt = detect_runtime();
    let options = RunOptions {
        name,
        host_port,
        env: Vec::new(),
    };

    let mut handle = runtime::start_container(rt, &spec, &options)?;
    println!("✓ Container {} started", handle.name);

    runtime::wait_ready(&handle, Duration::from_secs(wait_secs)).await?;

    let state = runtime::container_state(&handle)?;
    if let Some(user) = &state.user {
        println!("✓ Running as {}", user);
    }

    println!("✓ Backend ready: {}", handle.docs_url());
    handle.release();
    Ok(())
}

/// Host port precedence: `--port` flag, then a valid `$PORT`, then the
/// spec's port.
fn resolve_host_port(flag: Option<u16>, env_port: Option<&str>, default: u16) -> u16 {
    flag.or_else(|| env_port.and_then(|raw| raw.parse().ok()))
        .unwrap_or(default)
}
