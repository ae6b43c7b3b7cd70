use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file path
    #[arg(short, long, env = "PROXMOX_CLOUD_CONFIG")]
    pub config: Option<String>,

    /// What to run: the Telegram bot, the REST API, or both
    #[arg(short, long, value_enum, env = "PROXMOX_CLOUD_MODE", default_value_t = RunMode::All)]
    pub mode: RunMode,

    /// Proxmox Host (e.g., 192.168.1.10)
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Proxmox Port (default: 8006)
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Proxmox node that hosts new guests (e.g., pve)
    #[arg(short = 'N', long)]
    pub node: Option<String>,

    /// API Token ID (e.g., root@pam!cloud)
    #[arg(long, requires = "token_secret")]
    pub token_id: Option<String>,

    /// API Token Secret (UUID)
    #[arg(long, requires = "token_id")]
    pub token_secret: Option<String>,

    /// Disable SSL verification (for self-signed certs)
    #[arg(short = 'k', long, default_value_t = false)]
    pub no_verify_ssl: bool,

    /// Telegram bot token
    #[arg(long)]
    pub telegram_token: Option<String>,

    /// Telegram user ids allowed to use the bot (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub admin_ids: Vec<u64>,

    /// SQLite database path
    #[arg(long)]
    pub database_path: Option<String>,

    /// Signing key for REST API tokens
    #[arg(long)]
    pub secret_key: Option<String>,

    /// HTTP Host for the REST API
    #[arg(long)]
    pub http_host: Option<String>,

    /// HTTP Port for the REST API
    #[arg(short = 'l', long)]
    pub http_port: Option<u16>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'L', long, env = "PROXMOX_CLOUD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Enable logging to a file
    #[arg(long, env = "PROXMOX_CLOUD_LOG_FILE_ENABLE", default_value_t = false)]
    pub log_file_enable: bool,

    /// Log file directory
    #[arg(long, env = "PROXMOX_CLOUD_LOG_DIR", default_value = ".")]
    pub log_dir: String,

    /// Log filename prefix
    #[arg(
        long,
        env = "PROXMOX_CLOUD_LOG_FILENAME",
        default_value = "proxmox-cloud-rs.log"
    )]
    pub log_filename: String,

    /// Log rotation strategy (daily, hourly, never)
    #[arg(long, env = "PROXMOX_CLOUD_LOG_ROTATE", default_value = "daily")]
    pub log_rotate: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    Bot,
    Api,
    All,
}

impl RunMode {
    pub fn runs_bot(self) -> bool {
        matches!(self, RunMode::Bot | RunMode::All)
    }

    pub fn runs_api(self) -> bool {
        matches!(self, RunMode::Api | RunMode::All)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate shell completion scripts
    Completions {
        /// The shell to generate the script for
        #[arg(value_enum)]
        shell: Shell,
    },
}
