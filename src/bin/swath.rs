//! Swath Extract command line
//!
//! # Usage
//!
//! ```bash
//! # Extract observation times and winds between two instants
//! swath extract a.json b.json \
//!     --filter '{"time": {"min": "2018-10-01T00:00:00Z", "max": "2018-10-01T06:00:00Z"}}' \
//!     --fields observation=time,mie_HLOS_wind_speed
//!
//! # Materialize every field of a product into an optimized cache
//! swath optimize a.json
//!
//! # Append two fields to an existing cache
//! swath optimize a.json --update --allow time --allow measurement_time
//!
//! # Show the effective configuration
//! swath check-config
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use swath_extract::{
    cache::{optimize, OptimizeAction, OptimizeOptions},
    catalog::{products, FieldCatalog},
    config::Config,
    extract::{ExtractRequest, Extractor},
    store::{JsonStoreOpener, ProductStore, StoreGuard, StoreOpener},
    types::Filters,
};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "swath")]
#[command(version)]
#[command(about = "Filtered extraction and caching for multi-level satellite products", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (overrides SWATH_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract filtered fields from time-ordered product files
    Extract {
        /// Product files, in time order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Filters as a JSON object: {"field": {"min": .., "max": ..}}
        #[arg(short, long)]
        filter: Option<String>,

        /// Requested fields as level=field1,field2 (repeatable)
        #[arg(long = "fields", value_name = "LEVEL=FIELDS")]
        fields: Vec<String>,

        /// Emit plain per-record values
        #[arg(long)]
        plain: bool,

        /// Read fields from the configured optimized caches when present
        #[arg(long)]
        use_cache: bool,
    },

    /// Materialize a product's fields into an optimized cache
    Optimize {
        /// Product file
        file: PathBuf,

        /// Output cache directory (default: from configuration)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Extend an existing cache instead of creating a new one
        #[arg(long)]
        update: bool,

        /// Existing field that may be appended in update mode (repeatable)
        #[arg(long = "allow", value_name = "FIELD")]
        allow: Vec<String>,
    },

    /// Validate and print the effective configuration
    CheckConfig,
}

fn load_config(cli: &Cli) -> Result<Config, String> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var("SWATH_CONFIG").ok().map(PathBuf::from));
    let config = match path {
        Some(path) => Config::from_file_with_env(&path.to_string_lossy())?,
        None => Config::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);
    if config.logging.structured {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Catalog matching the product type of `file`
fn detect_catalog(opener: &JsonStoreOpener, file: &Path) -> Result<FieldCatalog, Box<dyn std::error::Error>> {
    let mut guard = StoreGuard::new(opener.open(file)?, file);
    let product_type = guard
        .store()
        .map(|s| s.product_type_name().to_string())
        .unwrap_or_default();
    guard.release()?;
    debug!(file = %file.display(), product_type = %product_type, "Product type detected");
    Ok(products::for_product_type(&product_type)?)
}

/// Parse `level=field1,field2`
fn parse_field_list(arg: &str) -> Result<(String, Vec<String>), String> {
    let (level, fields) = arg
        .split_once('=')
        .ok_or_else(|| format!("Invalid field list '{}', expected level=field1,field2", arg))?;
    let fields: Vec<String> = fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect();
    if level.trim().is_empty() || fields.is_empty() {
        return Err(format!("Invalid field list '{}', expected level=field1,field2", arg));
    }
    Ok((level.trim().to_string(), fields))
}

fn cmd_extract(
    config: &Config,
    files: &[PathBuf],
    filter: Option<&str>,
    field_lists: &[String],
    plain: bool,
    use_cache: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let opener = JsonStoreOpener;
    let catalog = detect_catalog(&opener, &files[0])?;

    let mut request = ExtractRequest::new(files.iter().cloned())
        .plain_arrays(plain || config.extraction.plain_arrays)
        .verify_checksums(config.cache.verify_checksums);
    if let Some(filter) = filter {
        request.filters = serde_json::from_str::<Filters>(filter)?;
    }
    for arg in field_lists {
        let (level, fields) = parse_field_list(arg)?;
        request.fields.entry(level).or_default().extend(fields);
    }
    if use_cache {
        for file in files {
            let cache = config.cache_path_for(catalog.product_type(), file);
            if cache.exists() {
                request = request.with_cache(file.clone(), cache);
            } else {
                debug!(file = %file.display(), cache = %cache.display(), "No optimized cache");
            }
        }
    }

    let extractor = Extractor::new(&opener, &catalog);
    let mut failed = 0usize;
    let mut fatal = None;
    for item in extractor.extract(request)? {
        match item {
            Ok(result) => println!("{}", serde_json::to_string(&result)?),
            Err(e) if e.is_fatal() => fatal = Some(e),
            Err(e) => {
                warn!(error = %e, "Product skipped");
                failed += 1;
            },
        }
    }
    if let Some(e) = fatal {
        return Err(e.into());
    }
    info!(files = files.len(), skipped = failed, "Extraction finished");
    Ok(())
}

fn cmd_optimize(
    config: &Config,
    file: &Path,
    output: Option<PathBuf>,
    update: bool,
    allow: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let opener = JsonStoreOpener;
    let catalog = detect_catalog(&opener, file)?;
    let output = output.unwrap_or_else(|| config.cache_path_for(catalog.product_type(), file));
    let options = if update {
        OptimizeOptions::update(allow.iter().cloned())
    } else {
        OptimizeOptions::create()
    };

    let mut written = 0usize;
    let mut skipped = 0usize;
    for event in optimize(&opener, file, &catalog, &output, options)? {
        let event = event?;
        match event.action {
            OptimizeAction::Created | OptimizeAction::Appended => written += 1,
            OptimizeAction::Skipped(_) => skipped += 1,
        }
        println!("{}/{}: {:?}", event.level, event.field, event.action);
    }
    info!(
        output = %output.display(),
        written = written,
        skipped = skipped,
        "Optimized cache ready"
    );
    Ok(())
}

fn cmd_check_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", toml::to_string_pretty(config)?);
    println!("# supported product types: {}", products::supported_product_types().join(", "));
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config);

    match &cli.command {
        Commands::Extract {
            files,
            filter,
            fields,
            plain,
            use_cache,
        } => cmd_extract(&config, files, filter.as_deref(), fields, *plain, *use_cache),
        Commands::Optimize {
            file,
            output,
            update,
            allow,
        } => cmd_optimize(&config, file, output.clone(), *update, allow),
        Commands::CheckConfig => cmd_check_config(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_list() {
        let (level, fields) = parse_field_list("observation=time, mie_altitude").unwrap();
        assert_eq!(level, "observation");
        assert_eq!(fields, vec!["time", "mie_altitude"]);
    }

    #[test]
    fn test_parse_field_list_rejects_malformed() {
        assert!(parse_field_list("observation").is_err());
        assert!(parse_field_list("observation=").is_err());
        assert!(parse_field_list("=time").is_err());
    }

    #[test]
    fn test_cli_parses_optimize() {
        let cli = Cli::try_parse_from(["swath", "optimize", "a.json", "--update", "--allow", "time"]).unwrap();
        match cli.command {
            Commands::Optimize { update, allow, .. } => {
                assert!(update);
                assert_eq!(allow, vec!["time"]);
            },
            _ => panic!("expected optimize"),
        }
    }
}
