//! `chart-builder` command line

use anyhow::{Context, Result};
use ccb_bridge::SandboxDocument;
use ccb_core::{filter_columns, AuthProvider, BuilderConfig, DatasetCatalog, LuzmoClient, StaticAuth};
use ccb_query::{is_ready, missing_required, Query};
use ccb_slots::{load_manifest, Slot};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Command::new("chart-builder")
        .version(ccb_core::VERSION)
        .about("Custom chart builder: manifest checks, local queries and dataset browsing")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file (TOML)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("validate-manifest")
                .about("Validate a chart manifest's slot definitions")
                .arg(
                    Arg::new("manifest")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to manifest.json"),
                ),
        )
        .subcommand(
            Command::new("build-query")
                .about("Build the host-side query for a slot assignment")
                .arg(
                    Arg::new("manifest")
                        .long("manifest")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to manifest.json"),
                )
                .arg(
                    Arg::new("slots")
                        .long("slots")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON file with the slots array"),
                ),
        )
        .subcommand(
            Command::new("document")
                .about("Print the sandbox document for a chart bundle")
                .arg(
                    Arg::new("script")
                        .long("script")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Chart script (index.js)"),
                )
                .arg(
                    Arg::new("style")
                        .long("style")
                        .value_parser(value_parser!(PathBuf))
                        .help("Chart stylesheet (index.css)"),
                ),
        )
        .subcommand(
            Command::new("datasets")
                .about("List datasets, or the columns of one dataset")
                .arg(
                    Arg::new("dataset")
                        .long("dataset")
                        .help("Dataset id whose columns to list"),
                )
                .arg(
                    Arg::new("search")
                        .long("search")
                        .default_value("")
                        .help("Filter columns by label"),
                ),
        );

    let matches = cli.get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => BuilderConfig::load(path)?,
        None => BuilderConfig::default().with_env_overrides(|name| std::env::var(name).ok()),
    };

    match matches.subcommand() {
        Some(("validate-manifest", args)) => validate_manifest(args),
        Some(("build-query", args)) => build_query(args, &config),
        Some(("document", args)) => document(args),
        Some(("datasets", args)) => datasets(args, &config).await,
        _ => Ok(()),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn path_arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a PathBuf> {
    args.get_one::<PathBuf>(name)
        .with_context(|| format!("missing --{name}"))
}

fn read(path: &PathBuf) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn validate_manifest(args: &ArgMatches) -> Result<()> {
    for line in manifest_summary(&read(path_arg(args, "manifest")?)?)? {
        println!("{line}");
    }
    Ok(())
}

/// One `name: type` line per slot, or the validation error
fn manifest_summary(text: &str) -> Result<Vec<String>> {
    let manifest = load_manifest(text);
    if let Some(error) = manifest.error {
        anyhow::bail!("invalid manifest:\n{error}");
    }

    Ok(manifest
        .configs
        .iter()
        .map(|config| {
            let required = if config.is_required { " (required)" } else { "" };
            format!("{}: {}{required}", config.name, config.slot_type)
        })
        .collect())
}

fn build_query(args: &ArgMatches, config: &BuilderConfig) -> Result<()> {
    let manifest = load_manifest(&read(path_arg(args, "manifest")?)?);
    if let Some(error) = manifest.error {
        anyhow::bail!("invalid manifest: {error}");
    }
    let slots: Vec<Slot> = serde_json::from_str(&read(path_arg(args, "slots")?)?)
        .context("slots file must hold a JSON array of slots")?;

    if !is_ready(&slots, &manifest.configs) {
        let missing = missing_required(&slots, &manifest.configs);
        println!("not ready, required slots empty: {}", missing.join(", "));
        return Ok(());
    }

    let query: Query = config.query.local_builder().build(&slots, &manifest.configs)?;
    println!("{}", serde_json::to_string_pretty(&query)?);
    Ok(())
}

fn document(args: &ArgMatches) -> Result<()> {
    let script = read(path_arg(args, "script")?)?;
    let style = match args.get_one::<PathBuf>("style") {
        Some(path) => read(path)?,
        None => String::new(),
    };
    println!("{}", SandboxDocument::new(&script, &style).into_html());
    Ok(())
}

async fn datasets(args: &ArgMatches, config: &BuilderConfig) -> Result<()> {
    let client = LuzmoClient::new(&config.api)?;
    let auth = StaticAuth::from_client(client.clone());
    if !auth.is_authenticated() {
        anyhow::bail!(
            "no API credentials; set api.key / api.token or {} / {}",
            ccb_core::ENV_API_KEY,
            ccb_core::ENV_API_TOKEN
        );
    }
    match auth.get_or_load_user().await? {
        Some(user) => tracing::info!(user = %user.id, "authenticated"),
        None => anyhow::bail!("credentials do not belong to a user with an organization"),
    }
    let catalog = DatasetCatalog::new(Arc::new(client));

    if let Some(dataset_id) = args.get_one::<String>("dataset") {
        let search = args.get_one::<String>("search").map_or("", String::as_str);
        let columns = catalog.columns(dataset_id).await?;
        for column in filter_columns(&columns, search) {
            println!(
                "{}\t{}\t{}",
                column.column_id,
                column.column_type,
                column.label.as_ref().map(ToString::to_string).unwrap_or_default()
            );
        }
        return Ok(());
    }

    for dataset in catalog.datasets().await? {
        println!("{}\t{}", dataset.id, dataset.name);
    }
    Ok(())
}
