use crate::app::App;
use crate::harvest::crawl::{CrawlReport, Crawler};
use crate::out;
use crate::shutdown::ShutdownController;
use crate::Cli;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Channel handle or link (e.g. @foo, t.me/foo, https://t.me/foo)
    pub reference: String,

    /// Output directory (overrides videos_dir from the config)
    #[arg(long, value_name = "DIR")]
    pub out: Option<String>,
}

pub async fn run(cli: &Cli, args: &CrawlArgs, shutdown: &ShutdownController) -> Result<()> {
    let app = App::new(cli).await?;

    let videos_dir = args
        .out
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| app.config.videos_dir());
    std::fs::create_dir_all(&videos_dir)?;

    let crawler = Crawler::new(app.tg.clone(), &app.config.crawl, videos_dir);
    let report = crawler.crawl(&args.reference, &shutdown.token()).await?;

    if cli.output.is_json() {
        out::write_json(&report)?;
    } else if !cli.output.is_none() {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &CrawlReport) {
    println!(
        "{} (@{}): {} page(s), {} video(s) seen",
        out::truncate(&report.title, 60),
        report.handle,
        report.pages,
        report.videos_seen
    );
    for file in &report.downloaded {
        println!("  #{:<8} {:>12} B  {}", file.message_id, file.bytes, file.path.display());
    }
    if !report.failed.is_empty() {
        let ids: Vec<String> = report.failed.iter().map(|id| id.to_string()).collect();
        println!("  failed: {}", ids.join(", "));
    }
    println!(
        "Saved {} video(s), {} bytes, to {}",
        report.downloaded.len(),
        report.bytes_downloaded(),
        report.output_dir.display()
    );
}
