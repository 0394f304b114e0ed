// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use petition_filer::utils::logging::{
    format_error, format_info, format_step, format_success, format_warning,
};
use petition_filer::{
    AuditExporter, BatchEvent, Config, FilingService, LegalMailClient, LocalStorage, LogLevel,
    MemoryStore, ObjectStorage, OperationTimer, PdfScanner, ProgressBus, StoredFile, Validator,
    group, parse, storage::scanner::file_sha256, unique_file_name, verify_batch,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "petition_filer")]
#[command(version = "0.1.0")]
#[command(about = "Batch filing of court petitions over the LegalMail API", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a directory of PDFs and preview the process grouping without filing
    Parse {
        dir: PathBuf,
    },

    /// Ingest a directory of PDFs and protocol every identified process
    Send {
        dir: PathBuf,

        /// Signing certificate id registered in the workspace
        #[arg(long)]
        certificate: i64,

        #[arg(long, value_name = "ID", default_value_t = 1)]
        batch_id: i64,

        /// Export the audit trail to this directory when the run finishes
        #[arg(long, value_name = "DIR")]
        export: Option<PathBuf>,
    },

    /// Check protocol status of petitions (verification only, never refiles)
    Status {
        petition_ids: Vec<i64>,
    },

    /// List the configured court registry
    Courts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    petition_filer::utils::logging::init_logger(cli.color, cli.verbose);

    info!("Loading configuration from: {}", cli.config.display());
    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    match cli.command {
        Commands::Parse { dir } => {
            cmd_parse(&config, &dir)?;
        }
        Commands::Send {
            dir,
            certificate,
            batch_id,
            export,
        } => {
            cmd_send(&config, &dir, certificate, batch_id, export).await?;
        }
        Commands::Status { petition_ids } => {
            cmd_status(&config, &petition_ids).await?;
        }
        Commands::Courts => {
            cmd_courts(&config);
        }
    }

    Ok(())
}

fn cmd_parse(config: &Config, dir: &PathBuf) -> Result<()> {
    Validator::validate_directory(dir)?;

    let scanner = PdfScanner::new(config.pipeline.max_file_size_mb);
    let files = scanner.scan_directory(dir)?;
    if files.is_empty() {
        bail!("no PDF files found in {}", dir.display());
    }

    let descriptors: Vec<_> = files.iter().map(|f| parse(&f.file_name)).collect();
    let groups = group(&descriptors);

    println!("\n{} file(s), {} process(es)\n", descriptors.len(), groups.len());

    for (index, g) in groups.iter().enumerate() {
        println!(
            "{}",
            format_step(
                index + 1,
                groups.len(),
                &format!("{} (court {}, {} file(s))", g.cnj, g.court_code, g.file_count())
            )
        );
        match &g.principal {
            Some(principal) => {
                println!("  principal: {}", principal.original_name);
            }
            None => {
                println!("  {}", format_warning("no principal document identified"));
            }
        }
        for attachment in &g.attachments {
            let marker = if attachment.has_code_pair() { "" } else { " (no code pair)" };
            println!("  attachment: {}{}", attachment.original_name, marker);
        }
        println!();
    }

    let invalid: Vec<_> = descriptors.iter().filter(|d| !d.is_valid).collect();
    if !invalid.is_empty() {
        println!("{}", format_warning(&format!("{} file(s) excluded:", invalid.len())));
        for descriptor in invalid {
            println!(
                "  {} ({})",
                descriptor.original_name,
                descriptor.error_message.as_deref().unwrap_or("unknown")
            );
        }
    }

    Ok(())
}

async fn cmd_send(
    config: &Config,
    dir: &PathBuf,
    certificate: i64,
    batch_id: i64,
    export: Option<PathBuf>,
) -> Result<()> {
    Validator::validate_directory(dir)?;
    Validator::validate_certificate_id(certificate)?;

    let api_key = config
        .api
        .api_key
        .clone()
        .context("api.api_key is not configured (set PETITION_FILER__API__API_KEY)")?;

    let scanner = PdfScanner::new(config.pipeline.max_file_size_mb);
    let files = scanner.scan_directory(dir)?;
    Validator::validate_batch_size(files.len())?;

    let storage = Arc::new(LocalStorage::new(&config.storage.uploads_dir));
    let store = Arc::new(MemoryStore::with_courts(&config.courts));
    let bus = Arc::new(ProgressBus::new(config.pipeline.event_channel_capacity));

    // ingest: store every scanned PDF and register it with the batch
    let ingest_timer = OperationTimer::new("ingest");
    info!("Ingesting {} file(s) into batch {}", files.len(), batch_id);
    for file in &files {
        let bytes = tokio::fs::read(&file.path).await?;
        Validator::validate_content_not_empty(&bytes)?;

        let sha256 = file_sha256(&file.path).ok();
        let key = format!("batches/{}/{}", batch_id, unique_file_name(&file.file_name));
        storage.put(&key, &bytes, "application/pdf").await?;

        store.register_file(
            batch_id,
            StoredFile {
                original_name: file.file_name.clone(),
                storage_key: key,
                size_bytes: file.size,
                sha256,
            },
        );
    }

    ingest_timer.finish_with_count(files.len());

    let api = Arc::new(LegalMailClient::new(config.api.base_url.as_str(), api_key));
    let service = FilingService::new(
        api,
        storage,
        store.clone(),
        bus,
        &config.storage.archive_prefix,
        Duration::from_secs(config.pipeline.close_grace_secs),
    );

    let mut events = service.subscribe_progress(batch_id);
    service.start_batch(batch_id, certificate);

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("Failed to create progress bar template")
            .progress_chars("█▓▒░"),
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                bar.println(format_warning("Stop requested, finishing the current process..."));
                service.request_stop(batch_id);
            }
            event = events.recv() => {
                match event {
                    Ok(BatchEvent::Log { level, message, .. }) => {
                        let line = match level {
                            LogLevel::Info => format_info(&message),
                            LogLevel::Success => format_success(&message),
                            LogLevel::Warning => format_warning(&message),
                            LogLevel::Error => format_error(&message),
                        };
                        bar.println(line);
                    }
                    Ok(BatchEvent::Progress { current, total, current_process, .. }) => {
                        bar.set_length(total as u64);
                        bar.set_position(current.saturating_sub(1) as u64);
                        bar.set_message(current_process);
                    }
                    Ok(BatchEvent::Complete { success_count, error_count, warning_count }) => {
                        bar.finish_and_clear();
                        println!(
                            "\n{}",
                            format_success(&format!(
                                "Batch complete: {} succeeded, {} failed, {} warning(s)",
                                success_count, error_count, warning_count
                            ))
                        );
                        break;
                    }
                    Ok(BatchEvent::Stopped { message }) => {
                        bar.finish_and_clear();
                        println!("\n{}", format_warning(&message));
                        break;
                    }
                    Ok(BatchEvent::Error { message }) => {
                        bar.finish_and_clear();
                        println!("\n{}", format_error(&message));
                        break;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("progress feed lagged, {} event(s) skipped", skipped);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    for record in store.process_records(batch_id) {
        println!(
            "{}",
            format_success(&format!(
                "{} -> protocol {} ({} attachment(s))",
                record.cnj, record.protocol_number, record.attachment_count
            ))
        );
    }

    if let Some(export_dir) = export {
        let exporter = AuditExporter::new(export_dir)?;
        let manifest = exporter.export_batch(store.as_ref(), batch_id, true).await?;
        println!(
            "{}",
            format_info(&format!(
                "Audit trail exported: {} record(s) -> {}",
                manifest.total_records, manifest.file
            ))
        );
    }

    Ok(())
}

async fn cmd_status(config: &Config, petition_ids: &[i64]) -> Result<()> {
    if petition_ids.is_empty() {
        bail!("at least one petition id is required");
    }

    let api_key = config
        .api
        .api_key
        .clone()
        .context("api.api_key is not configured (set PETITION_FILER__API__API_KEY)")?;
    let api = LegalMailClient::new(config.api.base_url.as_str(), api_key);

    println!("Checking {} petition(s)...\n", petition_ids.len());
    let outcomes = verify_batch(&api, petition_ids).await;

    for outcome in outcomes {
        let line = format!(
            "petition {}: {}{}",
            outcome.petition_id,
            outcome.status,
            outcome
                .protocol_number
                .map(|protocol| format!(" (protocol {})", protocol))
                .unwrap_or_default()
        );
        match outcome.error_message {
            Some(err) => println!("{} - {}", format_error(&line), err),
            None => println!("{}", format_info(&line)),
        }
    }

    Ok(())
}

fn cmd_courts(config: &Config) {
    if config.courts.is_empty() {
        println!("{}", format_warning("no courts configured"));
        return;
    }

    println!("\n{} configured court(s)\n", config.courts.len());
    for court in &config.courts {
        let piece_type = court
            .default_piece_type
            .map(|code| code.to_string())
            .unwrap_or_else(|| "not set".to_string());
        println!(
            "  {}  {}  (default piece type: {})",
            court.code, court.name, piece_type
        );
    }
}
