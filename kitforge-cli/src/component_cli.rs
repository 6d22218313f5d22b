//! Component commands: catalog changes mirrored into the registry

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use kitforge_core::component::{
    props_from_json, ComponentDraft, ComponentPatch, ComponentRecord, Props,
};
use kitforge_core::service::{ComponentService, Drift};

use crate::registry_cli::{parse_variants, read_code};
use crate::App;

#[derive(Subcommand, Debug)]
pub enum ComponentCommand {
    /// Create a component from a JSON draft or from a source file
    Create {
        /// Component slug (required unless --from is given)
        #[clap(required_unless_present = "from")]
        slug: Option<String>,

        /// File holding the component source ("-" reads stdin)
        #[clap(long, required_unless_present = "from")]
        code_file: Option<PathBuf>,

        /// Full draft as a JSON file
        #[clap(long, conflicts_with_all = ["slug", "code_file"])]
        from: Option<PathBuf>,

        /// Export name (extracted from the source when omitted)
        #[clap(long)]
        name: Option<String>,

        #[clap(long)]
        description: Option<String>,

        #[clap(long)]
        category: Option<String>,

        /// Variant axes as JSON, e.g. '{"size":["sm","lg"]}'
        #[clap(long)]
        variants: Option<String>,

        /// Prop descriptors as JSON
        #[clap(long)]
        props: Option<String>,

        /// Output the created record as JSON
        #[clap(long)]
        json: bool,
    },

    /// Change an existing component
    Update {
        /// Component id or slug
        component: String,

        /// New slug; the old slug's registry entry is removed
        #[clap(long)]
        slug: Option<String>,

        /// File holding the new source ("-" reads stdin)
        #[clap(long)]
        code_file: Option<PathBuf>,

        #[clap(long)]
        name: Option<String>,

        #[clap(long)]
        description: Option<String>,

        #[clap(long)]
        category: Option<String>,

        #[clap(long)]
        variants: Option<String>,

        #[clap(long)]
        props: Option<String>,

        #[clap(long)]
        json: bool,
    },

    /// Delete a component and clean its registry entry
    Delete {
        /// Component id or slug
        component: String,
    },

    /// List catalog components
    List {
        #[clap(long)]
        json: bool,
    },

    /// Show one component
    Show {
        /// Component id or slug
        component: String,

        #[clap(long)]
        json: bool,
    },

    /// Compare the catalog with the registry files
    Drift {
        #[clap(long)]
        json: bool,
    },
}

/// Table row for component listings
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Slug")]
    slug: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Variants")]
    variants: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<&ComponentRecord> for ComponentRow {
    fn from(record: &ComponentRecord) -> Self {
        Self {
            slug: record.slug.clone(),
            name: record.name.clone(),
            category: record.category.clone(),
            variants: record
                .variants
                .axes()
                .map(|(axis, values)| format!("{axis}: {}", values.join("/")))
                .collect::<Vec<_>>()
                .join(", "),
            updated: record.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

impl ComponentCommand {
    pub async fn execute(self, app: &App, caller: &str) -> Result<()> {
        let (service, handle) = app.service()?;
        let _sweepers = service
            .limiters()
            .spawn_sweepers(&app.config.rate_limits);
        let result = self.run(&service, caller).await;
        handle.shutdown().await?;
        result
    }

    async fn run(self, service: &ComponentService, caller: &str) -> Result<()> {
        match self {
            ComponentCommand::Create {
                slug,
                code_file,
                from,
                name,
                description,
                category,
                variants,
                props,
                json,
            } => {
                let mut draft = match from {
                    Some(path) => {
                        let content = std::fs::read_to_string(&path)
                            .with_context(|| format!("Failed to read {}", path.display()))?;
                        serde_json::from_str::<ComponentDraft>(&content)
                            .with_context(|| format!("Invalid draft in {}", path.display()))?
                    }
                    None => {
                        let slug = slug.context("a slug is required")?;
                        let code_file = code_file.context("--code-file is required")?;
                        ComponentDraft::new(slug, read_code(&code_file)?)
                    }
                };
                if name.is_some() {
                    draft.name = name;
                }
                if let Some(description) = description {
                    draft.description = description;
                }
                if let Some(category) = category {
                    draft.category = category;
                }
                if variants.is_some() {
                    draft.variants = parse_variants(variants.as_deref())?;
                }
                if let Some(props) = parse_props(props.as_deref())? {
                    draft.props = props;
                }

                let outcome = service.create(caller, draft).await?;
                for warning in &outcome.warnings {
                    eprintln!("Warning: {warning}");
                }
                print_record(&outcome.record, json, "Created")
            }
            ComponentCommand::Update {
                component,
                slug,
                code_file,
                name,
                description,
                category,
                variants,
                props,
                json,
            } => {
                let record = resolve(service, &component).await?;
                let patch = ComponentPatch {
                    slug,
                    name,
                    description,
                    category,
                    code: code_file.as_deref().map(read_code).transpose()?,
                    variants: variants
                        .as_deref()
                        .map(|raw| parse_variants(Some(raw)))
                        .transpose()?,
                    props: parse_props(props.as_deref())?,
                    installation: None,
                };

                let outcome = service.update(caller, &record.id, patch).await?;
                for warning in &outcome.warnings {
                    eprintln!("Warning: {warning}");
                }
                print_record(&outcome.record, json, "Updated")
            }
            ComponentCommand::Delete { component } => {
                let record = resolve(service, &component).await?;
                let outcome = service.delete(caller, &record.id).await?;
                println!("Deleted {} ({})", outcome.record.slug, outcome.record.id);
                match &outcome.cleanup {
                    Some(report) if report.is_complete() => {}
                    Some(report) => {
                        eprintln!("Warning: {}", report.summary());
                        for (step, reason) in &report.failed {
                            eprintln!("  {step}: {reason}");
                        }
                    }
                    None => eprintln!("Warning: registry cleanup did not run"),
                }
                Ok(())
            }
            ComponentCommand::List { json } => {
                let records = service.list().await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&records)?);
                } else if records.is_empty() {
                    println!("No components.");
                } else {
                    let rows: Vec<ComponentRow> = records.iter().map(ComponentRow::from).collect();
                    let table = Table::new(&rows)
                        .with(Style::rounded())
                        .with(Modify::new(Rows::first()).with(Alignment::center()))
                        .to_string();
                    println!("{table}");
                }
                Ok(())
            }
            ComponentCommand::Show { component, json } => {
                let record = resolve(service, &component).await?;
                print_record(&record, json, "Component")
            }
            ComponentCommand::Drift { json } => {
                let drift = service.drift().await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&drift)?);
                    return Ok(());
                }
                if drift.is_empty() {
                    println!("Catalog and registry agree.");
                }
                for entry in &drift {
                    match entry {
                        Drift::MissingArtifacts { slug, missing } => {
                            println!("{slug}: in catalog, missing {}", missing.join(", "))
                        }
                        Drift::Orphaned { slug, present } => {
                            println!("{slug}: not in catalog, left in {}", present.join(", "))
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

/// Look a component up by id, falling back to slug
async fn resolve(service: &ComponentService, key: &str) -> Result<ComponentRecord> {
    match service.get(key).await {
        Ok(record) => Ok(record),
        Err(kitforge_core::KitforgeError::NotFound(_)) => Ok(service.get_by_slug(key).await?),
        Err(e) => Err(e.into()),
    }
}

fn parse_props(raw: Option<&str>) -> Result<Option<Props>> {
    raw.map(|raw| -> Result<Props> {
        let value: serde_json::Value =
            serde_json::from_str(raw).context("--props must be a JSON object")?;
        Ok(props_from_json(&value)?)
    })
    .transpose()
}

fn print_record(record: &ComponentRecord, json: bool, label: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }
    println!("{label} {} ({})", record.slug, record.id);
    println!("  Name:     {}", record.name);
    if !record.category.is_empty() {
        println!("  Category: {}", record.category);
    }
    if !record.description.is_empty() {
        println!("  About:    {}", record.description);
    }
    for (axis, values) in record.variants.axes() {
        println!("  Variant {axis}: {}", values.join(", "));
    }
    for (prop, descriptor) in &record.props {
        let required = if descriptor.required { " (required)" } else { "" };
        println!("  Prop {prop}{required}");
    }
    Ok(())
}
