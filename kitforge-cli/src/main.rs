//! Kitforge - keeps generated UI components in step with their file registry
//!
//! Main entry point: argument parsing, logging setup and command dispatch

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use kitforge_core::catalog::JsonFileCatalog;
use kitforge_core::config::KitforgeConfig;
use kitforge_core::naming;
use kitforge_core::registry::{Registry, RegistryHandle};
use kitforge_core::service::{ComponentService, Limiters};

mod component_cli;
mod registry_cli;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "kitforge",
    about = "Manage generated UI components and the registry built from them",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON on stderr
    #[clap(long, global = true)]
    json_logs: bool,

    /// Project root containing .kitforge/ and the registry directory
    #[clap(long, default_value = ".", global = true)]
    project_dir: PathBuf,

    /// Override the configuration file path
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Identity counted against the mutation rate limit
    #[clap(long, default_value = "local", global = true)]
    caller: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the registry directory, placeholder index and empty manifest
    Init,

    /// Operate on registry files directly, bypassing the catalog
    Registry {
        #[clap(subcommand)]
        command: registry_cli::RegistryCommand,
    },

    /// Create, change and inspect catalog components
    Component {
        #[clap(subcommand)]
        command: component_cli::ComponentCommand,
    },

    /// Convert between slugs and export names
    Name {
        #[clap(subcommand)]
        command: NameCommand,
    },
}

#[derive(Subcommand, Debug)]
enum NameCommand {
    /// PascalCase export name for a slug
    FromSlug { slug: String },

    /// Kebab-case slug for an export name
    ToSlug { name: String },

    /// Validate a slug and report naming hazards
    Check { slug: String },
}

/// Initialize tracing with CLI flags
///
/// Logs always go to stderr so command output on stdout stays parseable.
fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Everything a command needs, built from the project config
pub(crate) struct App {
    pub config: KitforgeConfig,
    pub registry: Registry,
    pub catalog_path: PathBuf,
}

impl App {
    fn load(project_dir: &Path, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => KitforgeConfig::load_from_path(path),
            None => KitforgeConfig::load_or_default(project_dir),
        }
        .context("Failed to load configuration")?;

        let registry = Registry::new(config.registry_layout(project_dir));
        let catalog_path = config.catalog_path(project_dir);
        debug!(
            "Registry at {}, catalog at {}",
            registry.layout().root.display(),
            catalog_path.display()
        );

        Ok(Self {
            config,
            registry,
            catalog_path,
        })
    }

    /// Start the registry task and wire the service over the JSON catalog
    pub fn service(&self) -> Result<(ComponentService, RegistryHandle)> {
        self.registry
            .init()
            .context("Failed to initialize registry")?;

        let limiters = Limiters::from_settings(&self.config.rate_limits)?;
        let catalog = Arc::new(JsonFileCatalog::new(&self.catalog_path));
        let (handle, _join) = RegistryHandle::spawn(self.registry.clone());
        let service = ComponentService::new(catalog, handle.clone(), limiters);
        Ok((service, handle))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.json_logs);

    let load = || App::load(&cli.project_dir, cli.config.as_deref());

    match cli.command {
        Command::Init => {
            let app = load()?;
            app.registry.init()?;
            println!(
                "Initialized registry at {}",
                app.registry.layout().root.display()
            );
            Ok(())
        }
        Command::Registry { command } => command.execute(&load()?).await,
        Command::Component { command } => command.execute(&load()?, &cli.caller).await,
        Command::Name { command } => name_command(command),
    }
}

fn name_command(command: NameCommand) -> Result<()> {
    match command {
        NameCommand::FromSlug { slug } => {
            naming::validate_slug(&slug)?;
            println!("{}", naming::slug_to_name(&slug));
        }
        NameCommand::ToSlug { name } => {
            naming::validate_name(&name)?;
            println!("{}", naming::name_to_slug(&name));
        }
        NameCommand::Check { slug } => {
            naming::validate_slug(&slug)?;
            let warnings = naming::naming_warnings(&slug);
            if warnings.is_empty() {
                println!("{slug} -> {}", naming::slug_to_name(&slug));
            } else {
                for warning in warnings {
                    println!("Warning: {warning}");
                }
            }
        }
    }
    Ok(())
}
