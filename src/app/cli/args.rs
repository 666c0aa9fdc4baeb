//! Command line arguments

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "bundlesync")]
#[command(about = "Analyse a project directory against a remote static-analysis service")]
#[command(version)]
pub struct Args {
    /// Project directory to analyse
    #[arg(value_name = "PROJECT_DIR")]
    pub project_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Analysis service base URL
    #[arg(short = 'u', long = "api-url", value_name = "URL")]
    pub api_url: Option<String>,

    /// Organisation name sent with every request
    #[arg(long = "org", value_name = "NAME")]
    pub org: Option<String>,

    /// Session token (defaults to BUNDLESYNC_TOKEN)
    #[arg(short = 't', long = "token", value_name = "TOKEN")]
    pub token: Option<String>,

    /// Lowest severity to report (1 = info, 2 = warning, 3 = error)
    #[arg(short = 's', long = "min-severity", value_name = "LEVEL")]
    pub min_severity: Option<u8>,

    /// Analysis timeout in seconds
    #[arg(short = 'T', long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Force coloured output
    #[arg(short = 'g', long = "color", conflicts_with = "no_color")]
    pub color: bool,

    /// Disable coloured output
    #[arg(long = "no-color", conflicts_with = "color")]
    pub no_color: bool,

    /// Findings output format
    #[arg(short = 'o', long = "output", value_name = "FORMAT", value_parser = ["text", "json"])]
    pub output: Option<String>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Colour choice from the flags, `None` when neither was given
    pub fn color_override(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}
