pub mod auth;
pub mod completions;
pub mod crawl;
pub mod run;

use crate::shutdown::ShutdownController;
use crate::Cli;
use clap::Subcommand;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authenticate with Telegram
    Auth(auth::AuthArgs),
    /// Watch Saved Messages for "download <channel>" commands
    Run(run::RunArgs),
    /// Download every video from one channel, then exit
    Crawl(crawl::CrawlArgs),
    /// Show version info
    Version,
    /// Generate shell completions
    Completions {
        /// Shell type to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub async fn run(cli: Cli, shutdown: ShutdownController) -> anyhow::Result<()> {
    match &cli.command {
        Command::Auth(args) => auth::run(&cli, args).await,
        Command::Run(args) => run::run(&cli, args, &shutdown).await,
        Command::Crawl(args) => crawl::run(&cli, args, &shutdown).await,
        Command::Version => {
            if cli.output.is_json() {
                crate::out::write_json(&serde_json::json!({
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                }))
            } else {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
        Command::Completions { shell } => completions::run(*shell),
    }
}
