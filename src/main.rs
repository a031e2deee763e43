mod cli;

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;
use url::Url;
use xt_transform::config::{
    ALLOW_DTD_CONFIG, NAME_CONFLICT_RESOLUTION_CONFIG, PACKAGE_CONFIG, REROUTE_TOPIC_CONFIG,
    SCHEMA_PATH_CONFIG, STRICT_CHECK_CONFIG, VERBOSE_CONFIG,
};
use xt_transform::{Data, FromXml, Record, Side, Transformation};

/// Topic of the record the input document is wrapped in.
const CLI_TOPIC: &str = "cli";

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let settings = settings(&cli)?;
    debug!(?settings, "configuring transform");
    let side = Side::from(cli.side);
    let mut transform = FromXml::new(side);
    transform
        .configure(&settings)
        .context("failed to configure the transform")?;

    if cli.print_shapes {
        if let Some(schema) = transform.schema() {
            for shape in schema.shapes() {
                println!("{shape}");
            }
        }
    }

    let payload = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let record = match side {
        Side::Key => Record::new(CLI_TOPIC, payload, Data::Null),
        Side::Value => Record::new(CLI_TOPIC, Data::Null, payload),
    };
    let converted = transform.apply(&record);
    transform.close();

    println!("{}", serde_json::to_string_pretty(&converted?)?);
    Ok(())
}

fn settings(cli: &cli::Cli) -> Result<HashMap<String, String>> {
    let urls = cli
        .schemas
        .iter()
        .map(|schema| schema_url(schema).map(String::from))
        .collect::<Result<Vec<_>>>()?;

    let mut settings = HashMap::from([
        (SCHEMA_PATH_CONFIG.to_string(), urls.join(",")),
        (STRICT_CHECK_CONFIG.to_string(), cli.strict.to_string()),
        (
            NAME_CONFLICT_RESOLUTION_CONFIG.to_string(),
            cli.resolve_name_conflicts.to_string(),
        ),
        (ALLOW_DTD_CONFIG.to_string(), cli.allow_dtd.to_string()),
        (VERBOSE_CONFIG.to_string(), (cli.verbose > 0).to_string()),
    ]);
    if let Some(package) = &cli.package {
        settings.insert(PACKAGE_CONFIG.to_string(), package.clone());
    }
    if let Some(topic) = &cli.reroute_topic {
        settings.insert(REROUTE_TOPIC_CONFIG.to_string(), topic.clone());
    }
    Ok(settings)
}

/// URLs are taken as is; anything else is a path to a local file.
fn schema_url(schema: &str) -> Result<Url> {
    match Url::parse(schema) {
        // A single letter scheme is a Windows drive.
        Ok(url) if url.scheme().len() > 1 => Ok(url),
        _ => {
            let path = std::fs::canonicalize(schema)
                .with_context(|| format!("schema file {schema} not found"))?;
            Url::from_file_path(&path)
                .map_err(|()| anyhow!("{} cannot be expressed as a file URL", path.display()))
        }
    }
}
