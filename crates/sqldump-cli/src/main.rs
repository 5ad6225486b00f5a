//! sqldump CLI - logical dumps of MySQL/MariaDB databases.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sqldump::{Config, DumpError, DumpReport, Orchestrator};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "sqldump")]
#[command(about = "Logical dumps of MySQL/MariaDB databases")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "sqldump.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the configured databases (or one table) to SQL scripts
    Dump {
        /// Output file, `-` for stdout [default: <database>.sql].
        /// Must be an existing directory when several databases are dumped
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dump only this table (no preamble or postamble)
        #[arg(short, long)]
        table: Option<String>,

        /// Dump only this configured database
        #[arg(long)]
        database: Option<String>,
    },

    /// List the tables a dump would cover
    ListTables {
        /// Only this configured database
        #[arg(long)]
        database: Option<String>,
    },

    /// Test the source connection
    HealthCheck {
        /// Only this configured database
        #[arg(long)]
        database: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<u8, DumpError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Dump {
            output,
            table,
            database,
        } => {
            let configs = config.select_databases(database.as_deref())?;
            let several = configs.len() > 1;
            if several && table.is_some() {
                return Err(DumpError::Config(
                    "--table needs --database when several databases are configured".to_string(),
                ));
            }

            // Resolve every output before connecting anywhere
            let jobs = configs
                .into_iter()
                .map(|config| {
                    let path = output_path(output.as_deref(), &config.source.database, several)?;
                    Ok((config, path))
                })
                .collect::<Result<Vec<_>, DumpError>>()?;

            let cancel_token = setup_signal_handler()?;
            let mut reports = Vec::new();
            let mut exit_code = 0;

            for (config, path) in jobs {
                let database = config.source.database.clone();
                match dump_database(config, &path, table.as_deref(), cancel_token.clone()).await {
                    Ok(report) => {
                        exit_code = exit_code.max(report.exit_code());
                        if !cli.output_json {
                            eprintln!(
                                "Dump {} of {}: {} tables, {} rows in {:.1}s -> {}",
                                report.status,
                                database,
                                report.tables_success,
                                report.rows_dumped,
                                report.duration_seconds,
                                path.display()
                            );
                            for (name, err) in report.failed_tables() {
                                eprintln!("  FAILED {}: {}", name, err);
                            }
                        }
                        reports.push(report);
                    }
                    // With several databases one failure does not stop the others
                    Err(e) if several && !matches!(e, DumpError::Cancelled) => {
                        error!("Dump of {} failed: {}", database, e);
                        eprintln!("{}", e.format_detailed());
                        exit_code = exit_code.max(e.exit_code());
                    }
                    Err(e) => return Err(e),
                }
                if cancel_token.is_cancelled() {
                    break;
                }
            }

            if cli.output_json {
                if several {
                    println!("{}", serde_json::to_string_pretty(&reports)?);
                } else if let Some(report) = reports.first() {
                    println!("{}", report.to_json()?);
                }
            }

            Ok(exit_code)
        }

        Commands::ListTables { database } => {
            let configs = config.select_databases(database.as_deref())?;
            let several = configs.len() > 1;
            let mut names = Vec::new();

            for config in configs {
                let database = config.source.database.clone();
                let orchestrator = Orchestrator::connect(config).await?;
                let tables = orchestrator.list_tables().await;
                orchestrator.close().await;
                for table in tables? {
                    if several {
                        names.push(format!("{}.{}", database, table.name));
                    } else {
                        names.push(table.name);
                    }
                }
            }

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else {
                for name in &names {
                    println!("{}", name);
                }
            }
            Ok(0)
        }

        Commands::HealthCheck { database } => {
            let mut results = Vec::new();
            for config in config.select_databases(database.as_deref())? {
                let orchestrator = Orchestrator::connect(config).await?;
                results.push(orchestrator.health_check().await);
                orchestrator.close().await;
            }

            if cli.output_json {
                if let [result] = results.as_slice() {
                    println!("{}", serde_json::to_string_pretty(result)?);
                } else {
                    println!("{}", serde_json::to_string_pretty(&results)?);
                }
            } else {
                println!("Health Check Results:");
                for result in &results {
                    println!(
                        "  Source ({}, {}): {} ({}ms)",
                        result.db_type,
                        result.database,
                        if result.healthy { "OK" } else { "FAILED" },
                        result.latency_ms
                    );
                    if let Some(ref err) = result.error {
                        println!("    Error: {}", err);
                    }
                }
            }

            if results.iter().any(|r| !r.healthy) {
                return Err(DumpError::Connection("Health check failed".to_string()));
            }
            Ok(0)
        }
    }
}

/// Where the dump of `database` goes.
///
/// No `--output` means `<database>.sql`; an existing directory receives
/// `<database>.sql` inside it. Several databases need a directory.
fn output_path(output: Option<&Path>, database: &str, several: bool) -> Result<PathBuf, DumpError> {
    let file_name = format!("{}.sql", database);
    match output {
        None => Ok(PathBuf::from(file_name)),
        Some(dir) if dir.is_dir() => Ok(dir.join(file_name)),
        Some(path) if several => Err(DumpError::Config(format!(
            "--output must be an existing directory when several databases are dumped, got {}",
            path.display()
        ))),
        Some(path) => Ok(path.to_path_buf()),
    }
}

async fn dump_database(
    config: Config,
    output: &Path,
    table: Option<&str>,
    cancel_token: CancellationToken,
) -> Result<DumpReport, DumpError> {
    let orchestrator = Orchestrator::connect(config)
        .await?
        .with_cancellation(cancel_token);

    let result = match open_sink(output).await {
        Ok(mut sink) => dump_into(&orchestrator, &mut *sink, table).await,
        Err(e) => Err(e),
    };
    orchestrator.close().await;
    result
}

/// Run the dump and flush the sink whatever the outcome, so a failed
/// table's partial statement and abort comment are not lost in the buffer.
async fn dump_into<W>(
    orchestrator: &Orchestrator,
    sink: &mut W,
    table: Option<&str>,
) -> Result<DumpReport, DumpError>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let result = match table {
        Some(name) => orchestrator.dump_table(sink, name).await,
        None => orchestrator.dump_all(sink).await,
    };
    let flushed = sink.flush().await.map_err(DumpError::Sink);
    let report = result?;
    flushed?;
    Ok(report)
}

/// Open the output sink; `-` is stdout.
async fn open_sink(path: &Path) -> Result<Box<dyn AsyncWrite + Unpin + Send>, DumpError> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufWriter::new(tokio::io::stdout())));
    }
    let file = tokio::fs::File::create(path)
        .await
        .map_err(DumpError::Sink)?;
    info!("Writing dump to {}", path.display());
    Ok(Box::new(BufWriter::new(file)))
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so `--output -` and `--output-json` stay clean
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// The run stops before the next table once the token is cancelled.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, DumpError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        warn!("Received {}. Stopping after the current table...", name);
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, DumpError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C. Stopping after the current table...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
