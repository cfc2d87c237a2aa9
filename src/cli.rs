// 命令行参数解析
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sftp-stress")]
#[command(about = "A multi-threaded SFTP upload stress-test tool")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// SFTP server hostname or IP address
    #[arg(short = 'H', long)]
    pub host: String,

    /// SFTP server port
    #[arg(short, long, default_value = "22")]
    pub port: u16,

    /// SSH username
    #[arg(short, long)]
    pub username: String,

    /// SSH password (if not provided, will prompt for input)
    #[arg(short = 'P', long, env = "SFTP_STRESS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// SSH private key file path
    #[arg(short, long)]
    pub key_file: Option<PathBuf>,

    /// Use SSH agent for authentication
    #[arg(long)]
    pub use_agent: bool,

    /// Remote directory to upload into
    #[arg(short = 'd', long)]
    pub remote_dir: String,

    /// Number of concurrent connections (1-100)
    #[arg(short, long, default_value = "10")]
    pub connections: usize,

    /// Treat the source as a directory and upload every file in it per connection
    #[arg(short, long)]
    pub multi_file: bool,

    /// Resource monitor sampling interval in milliseconds
    #[arg(long, default_value = "500")]
    pub monitor_interval_ms: u64,

    /// Connect / transfer timeout in seconds (unbounded when omitted)
    #[arg(short, long)]
    pub timeout_secs: Option<u64>,

    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Print every event as a JSON line instead of progress bars
    #[arg(long, conflicts_with = "json")]
    pub events_json: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Local file (or directory with --multi-file) to upload
    pub source: PathBuf,
}
