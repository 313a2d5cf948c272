use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::{builder::BoolishValueParser, Parser, Subcommand};
use river::{config, Config, Object, River, TracingObserver};
use tracing::{error, info, span, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "river", version, about = "Path-safe S3 object access")]
struct Cli {
    /// Bucket used when a command does not name one.
    #[arg(long, global = true, env = config::DEFAULT_BUCKET_VAR)]
    bucket: Option<String>,

    #[arg(long, global = true, env = config::ENDPOINT_URL_VAR)]
    endpoint_url: Option<String>,

    #[arg(long, global = true, env = config::REGION_VAR)]
    region: Option<String>,

    /// Address buckets as `endpoint/bucket` (MinIO, LocalStack)
    #[arg(
        long,
        global = true,
        env = config::FORCE_PATH_STYLE_VAR,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    force_path_style: Option<bool>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List keys under a prefix
    Ls {
        #[arg(default_value = "")]
        prefix: String,
        #[arg(short, long)]
        recursive: bool,
        /// Print full keys instead of names relative to the prefix
        #[arg(long)]
        full: bool,
    },
    /// Exit with 0 when the key exists, 1 otherwise
    Exists { path: String },
    /// Server-side copy
    Cp {
        source: String,
        dest: String,
        #[arg(long)]
        dest_bucket: Option<String>,
    },
    /// Delete a key, or everything under a prefix with --recursive
    Rm {
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Download an object as-is
    Get { path: String, local: PathBuf },
    /// Upload a local file as-is
    Put { local: PathBuf, path: String },
    /// Decode an object and print it
    Cat {
        path: String,
        /// Skip key validation
        #[arg(long = "unsafe")]
        unsafe_read: bool,
        /// Format token used instead of the key's extension (with --unsafe)
        #[arg(long, requires = "unsafe_read")]
        format: Option<String>,
    },
    /// List supported format tokens
    Formats,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let span = span!(Level::INFO, "main", context = "main");
    let _e = span.enter();
    info!("called");

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!(error_message = %err, error_group = "main");
            eprintln!("river: {}", err);
            ExitCode::FAILURE
        }
    }
}

/// Flags win over the `RV_*` environment variables already in `config`.
fn apply_flags(mut config: Config, cli: &Cli) -> Config {
    if let Some(bucket) = &cli.bucket {
        config = config.with_default_bucket(bucket.as_str());
    }
    if let Some(endpoint_url) = &cli.endpoint_url {
        config = config.with_endpoint_url(endpoint_url.as_str());
    }
    if let Some(region) = &cli.region {
        config = config.with_region(region.as_str());
    }
    if let Some(force_path_style) = cli.force_path_style {
        config = config.with_force_path_style(force_path_style);
    }
    config
}

fn run(cli: Cli) -> river::Result<ExitCode> {
    let config = apply_flags(Config::from_env()?, &cli);
    info!(
        default_bucket = ?config.default_bucket,
        endpoint_url = ?config.endpoint_url,
        "config"
    );

    let river = River::from_config(config)?.with_progress(Arc::new(TracingObserver::new()));

    match cli.command {
        Command::Ls {
            prefix,
            recursive,
            full,
        } => {
            for key in river.list_objects(&prefix, None, full, recursive)? {
                println!("{}", key);
            }
        }
        Command::Exists { path } => {
            if !river.exists(&path, None)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Cp {
            source,
            dest,
            dest_bucket,
        } => {
            println!("{}", river.copy(&source, &dest, None, dest_bucket.as_deref())?);
        }
        Command::Rm { path, recursive } => {
            for key in river.delete(&path, None, recursive)? {
                println!("deleted {}", key);
            }
        }
        Command::Get { path, local } => river.download_file(&path, None, &local)?,
        Command::Put { local, path } => river.upload_file(&local, &path, None)?,
        Command::Cat {
            path,
            unsafe_read,
            format,
        } => {
            let object = if unsafe_read {
                river.read_unsafe(&path, None, format.as_deref(), None)?
            } else {
                river.read(&path, None)?
            };
            print_object(&object)?;
        }
        Command::Formats => {
            for token in river.supported_formats() {
                println!("{}", token);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_object(object: &Object) -> river::Result<()> {
    match object {
        Object::Table(batch) => {
            println!("{}", arrow::util::pretty::pretty_format_batches(&[batch.clone()])?);
        }
        Object::Value(value) => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}
