use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "statusrelay")]
#[command(version, about = "i3bar relay: wraps i3status, injects plugin segments and keeps the clock ticking")]
pub struct Cli {
    /// Path to the i3status config file
    #[arg(short = 'c', value_name = "PATH")]
    pub generator_config: Option<PathBuf>,

    /// Disable integrated transformations (clock refresh)
    #[arg(short = 'd')]
    pub disable_transform: bool,

    /// Plugin manifest directory
    #[arg(short = 'i', value_name = "DIR")]
    pub plugin_dir: Option<PathBuf>,

    /// Update interval in seconds (default 1 sec)
    #[arg(short = 'n', value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Default injection cache timeout in seconds (default 60 sec)
    #[arg(short = 't', value_name = "SECONDS")]
    pub cache_timeout: Option<u64>,

    /// Generator program to run instead of `i3status` from PATH
    #[arg(long, value_name = "PATH")]
    pub generator: Option<PathBuf>,

    /// Seconds a command plugin may run before it is killed
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub plugin_timeout: Option<u64>,

    /// Insert plugin segments even when they lack `name` or `full_text`
    #[arg(long)]
    pub permissive_plugins: bool,

    /// Relay settings file (TOML)
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log filter, e.g. `info` or `statusrelay=debug` (RUST_LOG wins)
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,
}

/// Exit status for a command line clap rejects
pub const USAGE_EXIT_CODE: u8 = 1;

impl Cli {
    /// Parse the process arguments; help and version requests come back as errors too
    pub fn parse_args() -> Result<Self, clap::Error> {
        Self::try_parse()
    }

    /// `None` when `err` is a help or version request that should exit normally
    pub fn usage_exit_code(err: &clap::Error) -> Option<u8> {
        match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => None,
            _ => Some(USAGE_EXIT_CODE),
        }
    }
}
