use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use xmlassert_core::config::Config;
use xmlassert_core::message::Message;
use xmlassert_core::validation::{XmlMessageValidator, XmlValidationContext};

#[derive(Parser)]
#[command(name = "xmlassert")]
#[command(about = "Validate XML messages against control messages, schemas and XPath expectations")]
struct Cli {
    /// Log validation steps to stderr (RUST_LOG takes precedence).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a received message with a control message.
    Validate {
        #[arg(long)]
        received: PathBuf,
        #[arg(long)]
        control: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Received header fragment, repeatable.
        #[arg(long)]
        header: Vec<PathBuf>,
        /// Control header fragment, repeatable.
        #[arg(long)]
        control_header: Vec<PathBuf>,
        /// Additional ignore expression, repeatable.
        #[arg(long)]
        ignore: Vec<String>,
        #[arg(long)]
        no_schema: bool,
    },
    /// Check values selected by XPath expressions or dotted node paths.
    Xpath {
        #[arg(long)]
        received: PathBuf,
        /// `EXPRESSION=EXPECTED`, split at the last `=`.
        #[arg(long, required = true)]
        expression: Vec<String>,
        /// `PREFIX=URI` binding for the expressions.
        #[arg(long)]
        namespace: Vec<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "xmlassert_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn split_expression(pair: &str) -> Result<(&str, &str)> {
    match pair.rsplit_once('=') {
        Some((expression, expected)) if !expression.is_empty() => Ok((expression, expected)),
        _ => bail!("invalid expression '{pair}', expected KEY=VALUE"),
    }
}

fn split_namespace(binding: &str) -> Result<(&str, &str)> {
    binding
        .split_once('=')
        .with_context(|| format!("invalid namespace '{binding}', expected KEY=VALUE"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Validate {
            received,
            control,
            config,
            header,
            control_header,
            ignore,
            no_schema,
        } => {
            let config = load_config(config.as_deref())?;
            let validator = XmlMessageValidator::new(config.schema_registry()?);

            let mut received_message = Message::new(read(&received)?);
            for fragment in &header {
                received_message = received_message.with_header_data(read(fragment)?);
            }
            let control_message = match &control {
                Some(path) => {
                    let mut message = Message::new(read(path)?);
                    for fragment in &control_header {
                        message = message.with_header_data(read(fragment)?);
                    }
                    Some(message)
                }
                None => None,
            };

            let mut builder = config.validation_builder().ignore_all(ignore);
            if no_schema {
                builder = builder.schema_validation(false);
            }
            let context = config.test_context();
            let validation = builder
                .build_with(context.matchers())
                .context("invalid validation profile")?;

            validator
                .validate_message(&received_message, control_message.as_ref(), &context, &validation)
                .with_context(|| format!("validation of {} failed", received.display()))?;
            info!(received = %received.display(), "Message is valid");
            println!("OK");
        }
        Commands::Xpath {
            received,
            expression,
            namespace,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let mut builder = XmlValidationContext::builder().schema_validation(false);
            for binding in &namespace {
                let (prefix, uri) = split_namespace(binding)?;
                builder = builder.namespace(prefix, uri);
            }
            for check in &expression {
                let (path, expected) = split_expression(check)?;
                builder = builder.xpath(path, expected);
            }

            let context = config.test_context();
            let validation = builder
                .build_with(context.matchers())
                .context("invalid XPath expectation")?;

            XmlMessageValidator::default()
                .validate_message(&Message::new(read(&received)?), None, &context, &validation)
                .with_context(|| format!("XPath validation of {} failed", received.display()))?;
            println!("OK");
        }
    }

    Ok(())
}
