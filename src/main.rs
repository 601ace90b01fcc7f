mod app;
mod cmd;
mod config;
mod error;
mod harvest;
mod out;
mod shutdown;
mod tg;

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tgharvest",
    version,
    about = "Download every video from Telegram channels on command"
)]
pub struct Cli {
    /// Store directory for the session and default config (default: ~/.tgharvest)
    #[arg(long, global = true, default_value = "~/.tgharvest")]
    pub store: String,

    /// Config file (default: <store>/config.json)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output mode: text (default), json, or none
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub output: out::OutputMode,

    #[command(subcommand)]
    pub command: cmd::Command,
}

impl Cli {
    pub fn store_dir(&self) -> String {
        expand_home(&self.store)
    }

    pub fn config_path(&self) -> PathBuf {
        match &self.config {
            Some(path) => PathBuf::from(expand_home(path)),
            None => PathBuf::from(self.store_dir()).join("config.json"),
        }
    }
}

fn expand_home(s: &str) -> String {
    if s.starts_with("~/") {
        if let Some(home) = dirs_home() {
            return format!("{}{}", home, &s[1..]);
        }
    }
    s.to_string()
}

fn dirs_home() -> Option<String> {
    std::env::var("HOME").ok()
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let shutdown = shutdown::ShutdownController::new();
    shutdown.listen_for_ctrl_c();

    if let Err(e) = cmd::run(cli, shutdown.clone()).await {
        // Don't report error if we're shutting down gracefully
        if shutdown.is_triggered() {
            std::process::exit(0);
        }
        let msg = format!("{e:#}");
        eprintln!("Error: {msg}");
        std::process::exit(1);
    }
}
