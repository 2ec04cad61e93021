use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    version,
    about = "Live stream health monitor event replayer",
    long_about = "Replays a recorded log of media element and decoder events through the\n\
                  stream health monitor using simulated time, delivers the resulting external\n\
                  alerts, and prints the final panel state as JSON.\n\
                  \n\
                  Each line of the event log is a JSON object such as\n\
                  {\"at_ms\": 1500, \"kind\": \"media\", \"event\": \"waiting\"}."
)]
pub struct CliArgs {
    /// JSON-lines event log to replay
    #[arg(required = true, help = "Path to the JSON-lines event log")]
    pub events: PathBuf,

    /// Panel configuration
    #[arg(
        short,
        long,
        help = "TOML file with a [panel] table and optional [[series]] entries"
    )]
    pub config: Option<PathBuf>,

    /// Override the fallback stream URL
    #[arg(short, long, help = "Fallback stream URL, overrides the configuration file")]
    pub url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Also write logs to a file
    #[arg(long, help = "Write logs to this file in addition to stderr")]
    pub log_file: Option<PathBuf>,

    /// Do not contact external channels
    #[arg(long, help = "Evaluate alerts without sending webhook or mail notifications")]
    pub dry_run: bool,

    /// Disable the terminal bell
    #[arg(long, help = "Do not ring the terminal bell when an alert fires")]
    pub no_bell: bool,
}
