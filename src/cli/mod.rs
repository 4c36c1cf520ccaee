// CLI module - Command-line entry points

mod output;

use crate::bootstrap::{self, ServiceIdentity};
use crate::config::ServiceConfig;
use crate::error::{HaikuError, Result};
use crate::haiku::{get_haiku_dataset, HaikuGenerator};
use crate::process;
use crate::server;
use crate::service;
use crate::shutdown;
use crate::telemetry;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;

/// Haiku - Completes haiku from their first line, over HTTP and Telegram
#[derive(Parser)]
#[command(name = "haiku")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, global = true, env = "HAIKU_CONFIG")]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap, then run the entry command and relay its output
    Launch {
        /// Extra environment variables (KEY=VALUE format)
        #[arg(short, long)]
        env: Vec<String>,

        /// Entry command replacing the configured one
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Bootstrap, then serve the HTTP API (and Telegram when configured)
    Serve {
        /// Port overriding the configured one
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not poll Telegram even when a token is set
        #[arg(long)]
        no_telegram: bool,
    },

    /// Train the model and save its artifacts
    Train {
        /// JSON corpus of [line, line, line] entries
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Directory to write artifacts into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Complete a haiku from a saved model
    Generate {
        /// First line of the haiku
        first_line: String,

        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f64>,
    },

    /// Run the startup checks without starting anything
    Check,
}

impl Cli {
    /// Parse arguments and run; returns the process exit code
    pub async fn run() -> Result<i32> {
        let cli = Cli::parse();
        telemetry::init_logging(&cli.log_level)?;
        cli.execute().await
    }

    async fn execute(self) -> Result<i32> {
        let mut config = ServiceConfig::load(self.config.as_deref())?;

        match self.command {
            Commands::Launch { env, command } => {
                config.entry.env.extend(parse_env_vars(&env)?);
                if let Some((program, args)) = command.split_first() {
                    config.entry.program = PathBuf::from(program);
                    config.entry.args = args.to_vec();
                }
                launch(&config).await
            }

            Commands::Serve { port, no_telegram } => {
                if let Some(port) = port {
                    config.port = port;
                    config.validate()?;
                }
                if no_telegram {
                    config.telegram.token = None;
                }
                serve(&config).await?;
                Ok(0)
            }

            Commands::Train { corpus, output } => {
                if corpus.is_some() {
                    config.model.corpus = corpus;
                }
                if output.is_some() {
                    config.model.dir = output;
                }
                train(&config).await?;
                Ok(0)
            }

            Commands::Generate {
                first_line,
                temperature,
            } => {
                generate(&config, &first_line, temperature).await?;
                Ok(0)
            }

            Commands::Check => {
                check(&config)?;
                Ok(0)
            }
        }
    }
}

/// Bootstrap and run the entry command as the service account
async fn launch(config: &ServiceConfig) -> Result<i32> {
    let report = bootstrap::prepare(config)?;
    output::print_bootstrap_report(&report);

    // The child switches accounts itself; we stay privileged to signal it
    let run_as = bootstrap::is_root().then_some(report.identity);

    let shutdown = shutdown::listen_for_signals();
    process::launch(config, &report.logs_dir, run_as, None, shutdown).await
}

/// Bootstrap, drop privileges, and serve until SIGTERM/SIGINT
async fn serve(config: &ServiceConfig) -> Result<()> {
    let report = bootstrap::prepare(config)?;
    output::print_bootstrap_report(&report);

    if bootstrap::enter_service_identity(report.identity)? {
        output::print_info(&format!("Running as {}", ServiceIdentity::current()));
    }

    let listener = server::bind(&config.listen_addr()).await?;
    let shutdown = shutdown::listen_for_signals();
    service::run(config, listener, shutdown).await
}

async fn train(config: &ServiceConfig) -> Result<()> {
    let dir = config.model_dir();
    let corpus = config.model.corpus.clone();
    let order = config.model.order;

    let pb = output::create_progress_bar("Training model...");
    let trained = tokio::task::spawn_blocking(move || {
        let dataset = get_haiku_dataset(corpus.as_deref())?;
        let mut generator = HaikuGenerator::new(order);
        let summary = generator.train(&dataset)?;
        generator.save(&dir)?;
        Ok::<_, HaikuError>(summary)
    })
    .await
    .map_err(|e| HaikuError::TrainingError(e.to_string()))?;

    match trained {
        Ok(summary) => {
            output::finish_progress_success(
                pb,
                &format!(
                    "Trained on {} haiku ({} pairs, vocabulary {})",
                    summary.haiku, summary.pairs, summary.vocab_size
                ),
            );
            output::print_success_msg(&format!(
                "Saved model to {}",
                config.model_dir().display()
            ));
            Ok(())
        }
        Err(e) => {
            output::finish_progress_error(pb, "Training failed");
            Err(e)
        }
    }
}

async fn generate(config: &ServiceConfig, first_line: &str, temperature: Option<f64>) -> Result<()> {
    let dir = config.model_dir();
    if !HaikuGenerator::artifacts_exist(&dir) {
        return Err(HaikuError::ModelNotReady(format!(
            "no saved model in {}, run `haiku train` first",
            dir.display()
        )));
    }

    let generator = tokio::task::spawn_blocking(move || HaikuGenerator::load(&dir))
        .await
        .map_err(|e| HaikuError::ModelLoadError(e.to_string()))??;

    let first_line = first_line.trim();
    let completion = generator.generate_haiku_completion(
        first_line,
        config.model.max_length,
        temperature.unwrap_or(config.model.temperature),
    )?;
    if completion.trim().is_empty() {
        return Err(HaikuError::GenerationError(
            "the model produced nothing for this line".to_string(),
        ));
    }

    output::print_haiku(first_line, &completion);
    Ok(())
}

/// Report what startup would find, failing on the same conditions it would
fn check(config: &ServiceConfig) -> Result<()> {
    let identity = ServiceIdentity::from(&config.identity);
    let manifest = bootstrap::preflight(config);
    let logs = bootstrap::check_logs_dir(&config.logs_path());

    let rows = vec![
        output::CheckRow::new("Working directory", config.workdir.is_dir(), config.workdir.display()),
        output::CheckRow::new(
            "Manifest",
            manifest.is_ok(),
            match &manifest {
                Ok(status) => output::describe_manifest(status),
                Err(e) => e.to_string(),
            },
        ),
        output::CheckRow::new(
            "Logs directory",
            logs.is_ok(),
            match &logs {
                Ok(()) => config.logs_path().display().to_string(),
                Err(e) => e.to_string(),
            },
        ),
        output::CheckRow::new("Service account", identity.uid != 0, identity),
        output::CheckRow::new(
            "Model",
            HaikuGenerator::artifacts_exist(&config.model_dir()),
            config.model_dir().display(),
        ),
        output::CheckRow::new(
            "Telegram",
            config.telegram.token.is_some(),
            if config.telegram.token.is_some() {
                "token configured"
            } else {
                "disabled"
            },
        ),
        output::CheckRow::new("Listen address", true, config.listen_addr()),
    ];
    output::print_check_table(&rows);

    manifest?;
    logs
}

/// Parse environment variables from KEY=VALUE format
fn parse_env_vars(env_vars: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();

    for env_str in env_vars {
        match env_str.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                map.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(HaikuError::ConfigError(format!(
                    "Invalid environment variable format: '{}'. Expected KEY=VALUE",
                    env_str
                )))
            }
        }
    }

    Ok(map)
}
