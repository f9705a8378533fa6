use app::qr::QrMode;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use utils::app_config::AppConfig;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "audio-qr", version)]
#[command(about = "List audio files in a COS bucket and generate QR codes for them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set the logging level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Application configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Settings file holding credentials, bucket, region and output directory
    #[arg(short, long, global = true, value_name = "FILE", default_value = app::settings::DEFAULT_SETTINGS_FILE)]
    pub settings: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Test the connection to the bucket, then list its audio files
    Connect,

    /// List audio files in the bucket
    List {
        /// Print descriptors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate QR codes for selected files or the whole listing
    Generate {
        /// Display names (or full keys) of the files to generate
        #[arg(short, long = "name", value_name = "NAME", required_unless_present = "all")]
        names: Vec<String>,

        /// Generate for every audio file in the bucket
        #[arg(short, long, conflicts_with = "names")]
        all: bool,

        /// QR content mode: direct, player or wechat
        #[arg(short, long, default_value = "wechat", value_parser = parse_mode)]
        mode: QrMode,

        /// Output directory, overrides the saved setting
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Skip the confirmation required by --all
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the QR content for a single file
    Url {
        /// Display name (or full key) of the file
        name: String,

        /// QR content mode: direct, player or wechat
        #[arg(short, long, default_value = "direct", value_parser = parse_mode)]
        mode: QrMode,
    },

    /// Show or update the saved settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the current settings with secrets masked
    Show,

    /// Update and persist settings
    Save(SettingsArgs),
}

#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    #[arg(long)]
    pub secret_id: Option<String>,

    #[arg(long)]
    pub secret_key: Option<String>,

    #[arg(long = "bucket")]
    pub bucket_name: Option<String>,

    #[arg(long)]
    pub region: Option<String>,

    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

fn parse_mode(value: &str) -> Result<QrMode, String> {
    value.parse().map_err(|e: utils::error::Error| e.to_string())
}

/// 在初始化日志之前应用命令行对配置的覆盖
pub fn apply_overrides(cli: &Cli) -> utils::error::Result<()> {
    AppConfig::merge_config(cli.config.as_deref())?;

    if let Some(level) = &cli.log_level {
        AppConfig::set("log.level", level)?;
    }

    Ok(())
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub async fn run(cli: Cli) -> utils::error::Result<()> {
    let settings_path: &Path = &cli.settings;

    match cli.command {
        Commands::Connect => commands::connect_cmd(settings_path).await?,
        Commands::List { json } => commands::list_cmd(settings_path, json).await?,
        Commands::Generate {
            names,
            all,
            mode,
            output_dir,
            yes,
        } => commands::generate_cmd(settings_path, names, all, mode, output_dir, yes).await?,
        Commands::Url { name, mode } => commands::url_cmd(settings_path, name, mode).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show_cmd(settings_path)?,
            ConfigAction::Save(args) => commands::config_save_cmd(settings_path, args)?,
        },
    }

    Ok(())
}
