use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "ledger-ingest")]
#[command(
    version,
    about = "Parse bank and payment-platform statements into canonical transactions"
)]
#[command(
    long_about = "Reads Alipay CSV, China Construction Bank XLS/XLSX, China Merchants Bank PDF and Bank of Communications PDF exports, normalizes them into transaction drafts, and flags bank rows that duplicate payment-platform rows."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Config file (default: <config dir>/ledger-ingest/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse statement files into transaction drafts (auto-detects format)
    Parse {
        /// Statement files (.csv, .xls, .xlsx, .pdf)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Institution: alipay, ccb, cmb, bocom (or 支付宝, 建设银行, 招商银行, 交通银行)
        #[arg(short, long)]
        source: Option<String>,

        /// Container type: csv, xls, pdf
        #[arg(short = 't', long = "type")]
        source_type: Option<String>,

        /// Show every draft instead of the first 10
        #[arg(short, long)]
        all: bool,
    },

    /// Flag bank rows that duplicate payment-platform rows across files
    Dedup {
        /// Statement files from the bank(s) and the payment platform
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}
