//! Command dispatcher: routes parsed CLI commands to their handlers.
//!
//! Files are parsed concurrently on the blocking pool; parsing itself is
//! synchronous and shares nothing but the read-only alias tables.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use ledger_ingest::commit::{CommitBatch, CommitSink, InMemoryLedger};
use ledger_ingest::config::Config;
use ledger_ingest::dedup::CrossSourceDeduplicator;
use ledger_ingest::importers::{import_file, ImportHints, ParseOptions};
use ledger_ingest::models::{ParseResult, Source, SourceType};

use crate::cli::formatters::{
    format_duplicates_json, format_duplicates_table, format_file_report, format_reports_json,
    FileReport,
};
use crate::cli::Commands;

/// Route a parsed command to its handler
pub async fn dispatch_command(command: Commands, config: Config, json_output: bool) -> Result<()> {
    match command {
        Commands::Parse {
            files,
            source,
            source_type,
            all,
        } => {
            let hints = parse_hints(source.as_deref(), source_type.as_deref())?;
            dispatch_parse(files, hints, config, json_output, all).await
        }
        Commands::Dedup { files } => dispatch_dedup(files, config, json_output).await,
    }
}

fn parse_hints(source: Option<&str>, source_type: Option<&str>) -> Result<ImportHints> {
    let source = source
        .map(|s| {
            Source::from_str(s).map_err(|_| {
                anyhow!("Unknown source '{}'. Expected one of: alipay, ccb, cmb, bocom", s)
            })
        })
        .transpose()?;
    let source_type = source_type
        .map(|t| {
            SourceType::from_str(t)
                .map_err(|_| anyhow!("Unknown type '{}'. Expected one of: csv, xls, pdf", t))
        })
        .transpose()?;
    Ok(ImportHints::new(source, source_type))
}

/// Parse every file on the blocking pool; results come back in input order
async fn parse_all(
    files: Vec<PathBuf>,
    hints: ImportHints,
    options: ParseOptions,
) -> Result<Vec<(PathBuf, Result<ParseResult>)>> {
    let handles: Vec<_> = files
        .into_iter()
        .map(|path| {
            let options = options.clone();
            let task_path = path.clone();
            let handle = tokio::task::spawn_blocking(move || {
                import_file(&task_path, &hints, &options)
                    .with_context(|| format!("Failed to import {}", task_path.display()))
            });
            (path, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (path, handle) in handles {
        let result = handle.await.context("Parser task panicked")?;
        results.push((path, result));
    }
    Ok(results)
}

async fn dispatch_parse(
    files: Vec<PathBuf>,
    hints: ImportHints,
    config: Config,
    json_output: bool,
    show_all: bool,
) -> Result<()> {
    let total = files.len();
    info!("Parsing {} file(s)", total);

    let ledger = InMemoryLedger::new();
    let mut reports = Vec::with_capacity(total);
    let mut failures = 0;

    for (path, outcome) in parse_all(files, hints, config.parsing).await? {
        let file = path.display().to_string();
        match outcome {
            Ok(result) => {
                let file_size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                let commit = ledger.commit(CommitBatch {
                    drafts: result.drafts.clone(),
                    warning_count: result.warnings.len(),
                    file_name: file.clone(),
                    file_size,
                })?;
                reports.push(FileReport {
                    file,
                    result: Some(result),
                    commit: Some(commit),
                    error: None,
                });
            }
            Err(e) => {
                failures += 1;
                reports.push(FileReport {
                    file,
                    result: None,
                    commit: None,
                    error: Some(format!("{:#}", e)),
                });
            }
        }
    }

    if json_output {
        println!("{}", format_reports_json(&reports));
    } else {
        for report in &reports {
            print!("{}", format_file_report(report, show_all));
        }
    }

    if failures > 0 {
        return Err(anyhow!("{} of {} file(s) could not be parsed", failures, total));
    }
    Ok(())
}

async fn dispatch_dedup(files: Vec<PathBuf>, config: Config, json_output: bool) -> Result<()> {
    let mut drafts = Vec::new();
    for (path, outcome) in parse_all(files, ImportHints::default(), config.parsing).await? {
        let result = outcome?;
        info!("{}: {} drafts", path.display(), result.row_count);
        drafts.extend(result.drafts);
    }

    let flags = CrossSourceDeduplicator::new(config.dedup).find_duplicates(&drafts);

    if json_output {
        println!("{}", format_duplicates_json(&flags));
    } else {
        print!("{}", format_duplicates_table(&flags, &drafts));
    }
    Ok(())
}
