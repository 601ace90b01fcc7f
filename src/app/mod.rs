use crate::config::Config;
use crate::error::TgErrorContext;
use crate::tg::TgClient;
use crate::Cli;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

pub struct App {
    pub tg: Arc<TgClient>,
    pub config: Config,
    pub session_path: PathBuf,
}

impl App {
    pub async fn new(cli: &Cli) -> Result<Self> {
        let app = Self::new_unauthed(cli).await?;

        if !app.tg.client.is_authorized().await.context_auth_check()? {
            anyhow::bail!("Session expired or not authenticated. Run `tgharvest auth` first.");
        }

        Ok(app)
    }

    /// Create App without requiring authorization (for auth command).
    pub async fn new_unauthed(cli: &Cli) -> Result<Self> {
        let config = Config::load(&cli.config_path())?;
        config.require_credentials()?;

        let store_dir = cli.store_dir();
        std::fs::create_dir_all(&store_dir)?;

        // SqliteSession::open creates the file if it doesn't exist
        let session_path = config.session_path(&store_dir);
        if let Some(parent) = session_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tg = TgClient::connect(&session_path, config.api_id)?;

        Ok(App {
            tg: Arc::new(tg),
            config,
            session_path,
        })
    }
}
