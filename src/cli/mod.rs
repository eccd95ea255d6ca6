//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trigger")]
#[command(author, version, about = "Condition-order trigger engine")]
pub struct Cli {
    /// Configuration file path (defaults and TRIGGER__* environment when omitted)
    #[arg(short, long, env = "TRIGGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (overrides the configured level)
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay recorded quotes through the rules against a paper account
    Replay(ReplayArgs),
    /// List rules with their consumed status
    Rules(RulesArgs),
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct ReplayArgs {
    /// Rule file (CSV); defaults to paths.rules
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Quote file (CSV)
    #[arg(short, long)]
    pub quotes: PathBuf,

    /// Holdings file (CSV); defaults to paths.holdings
    #[arg(long)]
    pub holdings: Option<PathBuf>,

    /// Initial cash; defaults to paper.initial_cash
    #[arg(long)]
    pub cash: Option<Decimal>,

    /// Keep consumed marks in memory instead of the journal
    #[arg(long)]
    pub no_persist: bool,

    /// Feed quotes through per-symbol channels instead of timestamp batches
    #[arg(long)]
    pub push: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub output: String,
}

#[derive(clap::Args)]
pub struct RulesArgs {
    /// Rule file (CSV); defaults to paths.rules
    #[arg(short, long)]
    pub rules: Option<PathBuf>,
}
