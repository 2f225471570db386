//! Dollar CLI - resolve, read and validate dynamic configs

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::Value;
use std::fs;
use tracing_subscriber::EnvFilter;

use dollar_config::error::{DollarError, FixSuggestion};
use dollar_config::{loader, Config, DynamicValidator};

#[derive(Parser)]
#[command(name = "dollar")]
#[command(about = "Dollar - dynamic values for configuration trees")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a config with the given params, keeping residual nodes
    Build {
        /// Path to a .yaml or .json config
        file: String,

        /// Params as inline JSON, or @path to a JSON/YAML file
        #[arg(short, long)]
        params: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Bind a config and read one path
    Get {
        /// Path to a .yaml or .json config
        file: String,

        /// Dot-path to read (e.g. server.port, hosts[0])
        path: String,

        /// Params as inline JSON, or @path to a JSON/YAML file
        #[arg(short, long)]
        params: Option<String>,
    },

    /// Validate a config against a schema using the `dynamic` keyword
    Validate {
        /// Path to a .yaml or .json config
        file: String,

        /// Path to the JSON Schema (JSON or YAML)
        #[arg(short, long)]
        schema: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing (RUST_LOG wins over -v)
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Build {
            file,
            params,
            format,
        } => build_config(&file, params.as_deref(), format),
        Commands::Get { file, path, params } => get_value(&file, &path, params.as_deref()),
        Commands::Validate { file, schema } => validate_config(&file, &schema),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

/// Inline JSON, or `@file` holding JSON or YAML
fn read_params(params: Option<&str>) -> Result<Value, DollarError> {
    match params {
        None => Ok(Value::Object(Default::default())),
        Some(arg) => match arg.strip_prefix('@') {
            Some(file) => loader::parse_document(&fs::read_to_string(file)?),
            None => Ok(serde_json::from_str(arg)?),
        },
    }
}

fn build_config(file: &str, params: Option<&str>, format: Format) -> Result<(), DollarError> {
    let config = Config::from_file(file)?;
    let params = read_params(params)?;
    let output = config.build(&params).unwrap_or(Value::Null);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        Format::Yaml => print!("{}", serde_yaml::to_string(&output)?),
    }
    Ok(())
}

fn get_value(file: &str, path: &str, params: Option<&str>) -> Result<(), DollarError> {
    let config = Config::from_file(file)?;
    let params = read_params(params)?;

    match config.get(path, &params)? {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => eprintln!("{} '{}' is undefined", "→".cyan(), path),
    }
    Ok(())
}

fn validate_config(file: &str, schema: &str) -> Result<(), DollarError> {
    let document = loader::load_config(file)?;
    let schema = loader::parse_document(&fs::read_to_string(schema)?)?;

    let validator = DynamicValidator::new(&schema)?;
    validator.validate(&document)?;

    println!("{} Config '{}' is valid", "✓".green(), file);
    println!("  Dynamic fragments: {}", validator.refs().len());
    Ok(())
}
