//! labkit CLI - read GitLab resources by ID or name.
//!
//! Prints `[success, payload]` as JSON on stdout; logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use labkit_core::{
    CollectionAccessor, Config, ConnectionParams, Error, Locator, Outcome, QueryParams,
};
use labkit_gitlab::ConnectionFactory;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "labkit")]
#[command(author, version, about = "labkit - read GitLab resources by ID or name", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for values from the config file.
#[derive(Args)]
struct ConnectionArgs {
    /// GitLab base URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Private access token (highest precedence)
    #[arg(long, global = true)]
    private_token: Option<String>,

    /// OAuth token
    #[arg(long, global = true)]
    oauth_token: Option<String>,

    /// CI job token (lowest precedence)
    #[arg(long, global = true)]
    job_token: Option<String>,

    /// Items per page (1-100)
    #[arg(long, global = true)]
    per_page: Option<u32>,

    /// Seconds per HTTP round trip
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    no_ssl_verify: bool,

    /// Retry 500/502/503/504/52x responses
    #[arg(long, global = true)]
    retry_transient_errors: bool,

    /// Retry ceiling for transient errors
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Get one resource by numeric ID or name
    Get {
        /// Collection path, e.g. `projects` or `groups`
        collection: String,

        /// Numeric ID or name to resolve
        locator: String,
    },

    /// List a collection, draining every page
    List {
        /// Collection path, e.g. `issues` or `projects/42/merge_requests`
        collection: String,

        /// Filter as key=value; the value is parsed as JSON when possible
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,

        /// Echo the submitted filters next to the result
        #[arg(long)]
        return_payload: bool,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set a value, e.g. `gitlab.url https://gitlab.example.com`
    Set { key: String, value: String },

    /// Print a single value
    Get { key: String },

    /// Show current configuration (tokens masked)
    Show,
}

/// Parse `key=value`. `null` marks the filter as unset.
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid filter '{}', expected key=value", raw))?;
    if key.is_empty() {
        return Err(format!("invalid filter '{}', empty key", raw));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn load_config(path: Option<&Path>) -> labkit_core::Result<(Config, PathBuf)> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };
    let config = Config::load_from(&path)?;
    Ok((config, path))
}

impl ConnectionArgs {
    /// Flags win over the config file, field by field.
    fn apply(&self, mut params: ConnectionParams) -> ConnectionParams {
        if let Some(url) = &self.url {
            params.url = Some(url.clone());
        }
        if let Some(token) = &self.private_token {
            params.private_token = Some(token.clone());
        }
        if let Some(token) = &self.oauth_token {
            params.oauth_token = Some(token.clone());
        }
        if let Some(token) = &self.job_token {
            params.job_token = Some(token.clone());
        }
        if let Some(per_page) = self.per_page {
            params.per_page = per_page;
        }
        if let Some(timeout) = self.timeout {
            params.timeout = timeout;
        }
        if self.no_ssl_verify {
            params.ssl_verify = false;
        }
        if self.retry_transient_errors {
            params.retry_transient_errors = true;
        }
        if let Some(max_retries) = self.max_retries {
            params.max_retries = max_retries;
        }
        params
    }
}

async fn run_get(params: &ConnectionParams, collection: &str, locator: &str) -> (bool, Value) {
    let client = match ConnectionFactory::build(params) {
        Ok(client) => client,
        Err(e) => return Outcome::Failure(Error::from(e).record()).into_pair(),
    };

    let accessor = CollectionAccessor::new(&client);
    accessor
        .get_outcome(collection, &Locator::parse(locator))
        .await
        .into_pair()
}

async fn run_list(
    params: &ConnectionParams,
    collection: &str,
    filters: QueryParams,
    return_payload: bool,
) -> (bool, Value) {
    let outcome = match ConnectionFactory::build(params) {
        Ok(client) => {
            CollectionAccessor::new(&client)
                .list_outcome(collection, &filters)
                .await
        }
        Err(e) => Outcome::Failure(Error::from(e).record()),
    };

    if return_payload {
        outcome.into_pair_with_params(&filters.compact())
    } else {
        outcome.into_pair()
    }
}

fn run_config(command: ConfigCommands, path: Option<&Path>) -> anyhow::Result<()> {
    let (mut config, path) = load_config(path)?;

    match command {
        ConfigCommands::Set { key, value } => {
            config.set(&key, &value)?;
            config.save_to(&path)?;
            tracing::info!("Set {}", key);
        }
        ConfigCommands::Get { key } => match config.get(&key)? {
            Some(value) => println!("{}", value),
            None => println!("(not set)"),
        },
        ConfigCommands::Show => {
            if let Some(params) = config.gitlab.as_mut() {
                for token in [
                    &mut params.private_token,
                    &mut params.oauth_token,
                    &mut params.job_token,
                ] {
                    if token.is_some() {
                        *token = Some("********".to_string());
                    }
                }
            }
            println!("# {}", path.display());
            print!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to render config")?
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (success, payload) = match cli.command {
        Commands::Config { command } => return run_config(command, cli.config.as_deref()),
        Commands::Get {
            collection,
            locator,
        } => {
            let (config, _) = load_config(cli.config.as_deref())?;
            let params = cli.connection.apply(config.connection());
            run_get(&params, &collection, &locator).await
        }
        Commands::List {
            collection,
            params: filters,
            return_payload,
        } => {
            let (config, _) = load_config(cli.config.as_deref())?;
            let params = cli.connection.apply(config.connection());
            let filters: QueryParams = filters.into_iter().collect();
            run_list(&params, &collection, filters, return_payload).await
        }
    };

    println!("{}", serde_json::to_string_pretty(&(success, payload))?);

    if !success {
        std::process::exit(1);
    }

    Ok(())
}
