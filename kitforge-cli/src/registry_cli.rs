//! Registry commands that work on the files without the catalog
//!
//! Useful for repairing drift by hand. Normal changes go through the
//! component commands so the catalog stays authoritative.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::io::Read;
use std::path::{Path, PathBuf};

use kitforge_core::component::Variants;
use kitforge_core::naming;
use kitforge_core::registry::WriteRequest;

use crate::App;

#[derive(Subcommand, Debug)]
pub enum RegistryCommand {
    /// Write a component's source, export line and manifest entry
    Write {
        /// Component slug (kebab-case)
        slug: String,

        /// File holding the component source ("-" reads stdin)
        #[clap(long)]
        code_file: PathBuf,

        /// Export name (defaults to the PascalCase form of the slug)
        #[clap(long)]
        name: Option<String>,

        /// Variant axes as JSON, e.g. '{"size":["sm","lg"]}'
        #[clap(long)]
        variants: Option<String>,
    },

    /// Remove everything the registry holds for a slug
    Remove {
        /// Component slug
        slug: String,
    },

    /// Show which slugs each registry artifact contains
    Status {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },
}

impl RegistryCommand {
    pub async fn execute(self, app: &App) -> Result<()> {
        match self {
            RegistryCommand::Write {
                slug,
                code_file,
                name,
                variants,
            } => {
                let code = read_code(&code_file)?;
                let name = name.unwrap_or_else(|| naming::slug_to_name(&slug));
                let variants = parse_variants(variants.as_deref())?;

                app.registry.init()?;
                let report = app
                    .registry
                    .write(&WriteRequest::new(&slug, code, name).with_variants(variants))?;
                for warning in &report.warnings {
                    eprintln!("Warning: {warning}");
                }
                println!("Wrote {} to {}", report.slug, report.source_path.display());
                Ok(())
            }
            RegistryCommand::Remove { slug } => {
                let report = app.registry.remove(&slug)?;
                println!("{}", report.summary());
                for (step, reason) in &report.failed {
                    eprintln!("  {step}: {reason}");
                }
                if !report.is_complete() {
                    anyhow::bail!("registry still holds artifacts for '{slug}'");
                }
                Ok(())
            }
            RegistryCommand::Status { json } => {
                let status = app.registry.status()?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&status)?);
                    return Ok(());
                }

                println!("Registry: {}", app.registry.layout().root.display());
                for slug in status.all_slugs() {
                    let mark = |present: bool| if present { "x" } else { "-" };
                    println!(
                        "  [{}{}{}] {slug}",
                        mark(status.source_slugs.contains(&slug)),
                        mark(status.index_slugs.contains(&slug)),
                        mark(status.manifest_slugs.contains(&slug)),
                    );
                }
                if status.is_consistent() {
                    println!("All artifacts agree.");
                } else {
                    println!("Artifacts disagree ([source index manifest]).");
                }
                Ok(())
            }
        }
    }
}

/// Read component source from a file, or stdin for "-"
pub(crate) fn read_code(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read component source from stdin")?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read component source from {}", path.display()))
}

pub(crate) fn parse_variants(raw: Option<&str>) -> Result<Variants> {
    match raw {
        None => Ok(Variants::default()),
        Some(raw) => {
            let value: serde_json::Value =
                serde_json::from_str(raw).context("--variants must be a JSON object")?;
            Ok(Variants::from_json(&value)?)
        }
    }
}
