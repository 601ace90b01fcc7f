use crate::app::App;
use crate::harvest::crawl::Crawler;
use crate::harvest::notify::CompletionNotifier;
use crate::harvest::poller::CommandPoller;
use crate::harvest::tasks::TaskPool;
use crate::shutdown::ShutdownController;
use crate::Cli;
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Also act on commands already in Saved Messages at startup
    #[arg(long, default_value_t = false)]
    pub replay: bool,

    /// Seconds between Saved Messages polls (overrides the config)
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
}

pub async fn run(cli: &Cli, args: &RunArgs, shutdown: &ShutdownController) -> Result<()> {
    let app = App::new(cli).await?;
    let config = &app.config;

    let mut poll = config.poll.clone();
    if args.replay {
        poll.seed_from_history = false;
    }
    if let Some(interval) = args.interval {
        if interval == 0 {
            anyhow::bail!("--interval must be at least 1");
        }
        poll.interval_secs = interval;
    }

    let videos_dir = config.videos_dir();
    std::fs::create_dir_all(&videos_dir)?;
    log::info!("Saving videos under {}", videos_dir.display());

    let crawler = Crawler::new(app.tg.clone(), &config.crawl, videos_dir);
    let notifier = CompletionNotifier::new(&config.completion);
    let pool = TaskPool::new(crawler, notifier, shutdown.token().child_token());

    CommandPoller::new(poll, pool, shutdown.token()).run().await;
    log::info!("Stopped.");
    Ok(())
}
