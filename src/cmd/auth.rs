use crate::app::App;
use crate::config::Config;
use crate::error::TgErrorContext;
use crate::out;
use crate::Cli;
use anyhow::Result;
use clap::Args;
use grammers_client::SignInError;
use std::io::{self, Write};

#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    /// Phone number in international format (default: phone_number from the config)
    #[arg(long)]
    pub phone: Option<String>,

    #[command(subcommand)]
    pub cmd: Option<AuthCommand>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// Check authentication status
    Status,
    /// Sign out and remove the session file
    Logout,
}

pub async fn run(cli: &Cli, args: &AuthArgs) -> Result<()> {
    match &args.cmd {
        Some(AuthCommand::Status) => status(cli).await,
        Some(AuthCommand::Logout) => logout(cli).await,
        None => interactive_auth(cli, args).await,
    }
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn interactive_auth(cli: &Cli, args: &AuthArgs) -> Result<()> {
    let app = App::new_unauthed(cli).await?;
    let client = &app.tg.client;

    if client.is_authorized().await.context_auth_check()? {
        report_authenticated(cli, None)?;
        return Ok(());
    }

    eprintln!("Starting Telegram authentication…");

    let phone = match args.phone.clone().or_else(|| app.config.phone_number.clone()) {
        Some(phone) => phone,
        None => prompt("Phone number (international format, e.g. +34612345678): ")?,
    };
    if phone.is_empty() {
        anyhow::bail!("Phone number is required");
    }

    let token = client
        .request_login_code(&phone, &app.config.api_hash)
        .await
        .context_login_code(&phone)?;
    eprintln!("Login code sent via Telegram.");

    let code = prompt("Enter the code: ")?;

    let user = match client.sign_in(&token, &code).await {
        Ok(user) => user,
        Err(SignInError::PasswordRequired(password_token)) => {
            eprintln!("Two-factor authentication required.");
            if let Some(hint) = password_token.hint().filter(|h| !h.is_empty()) {
                eprintln!("Password hint: {}", hint);
            }
            let password = rpassword::prompt_password("Enter 2FA password: ")?;
            client
                .check_password(password_token, password.as_bytes().to_vec())
                .await
                .context_2fa()?
        }
        Err(e) => anyhow::bail!("Sign in failed: {}", e),
    };

    let name = user.first_name().map(|s| s.to_string()).unwrap_or_default();
    report_authenticated(cli, Some(&name))
}

fn report_authenticated(cli: &Cli, name: Option<&str>) -> Result<()> {
    if cli.output.is_json() {
        out::write_json(&serde_json::json!({
            "authenticated": true,
            "user": name,
        }))?;
    } else if !cli.output.is_none() {
        match name {
            Some(name) => eprintln!("Authenticated as {}.", name),
            None => eprintln!("Already authenticated."),
        }
    }
    Ok(())
}

/// Session file location without connecting.
fn session_path(cli: &Cli) -> Result<std::path::PathBuf> {
    let config = Config::load(&cli.config_path())?;
    Ok(config.session_path(&cli.store_dir()))
}

async fn status(cli: &Cli) -> Result<()> {
    if !session_path(cli)?.exists() {
        if cli.output.is_json() {
            out::write_json(&serde_json::json!({
                "authenticated": false,
            }))?;
        } else {
            println!("Not authenticated. Run `tgharvest auth`.");
        }
        return Ok(());
    }

    match App::new_unauthed(cli).await {
        Ok(app) => {
            let authed = app.tg.client.is_authorized().await.context_auth_check()?;
            if cli.output.is_json() {
                out::write_json(&serde_json::json!({
                    "authenticated": authed,
                    "session": app.session_path,
                }))?;
            } else if authed {
                println!("Authenticated ({}).", app.session_path.display());
            } else {
                println!("Session exists but not authenticated. Run `tgharvest auth`.");
            }
        }
        Err(e) => {
            log::debug!("Status check failed: {:#}", e);
            if cli.output.is_json() {
                out::write_json(&serde_json::json!({
                    "authenticated": false,
                    "error": format!("{:#}", e),
                }))?;
            } else {
                println!("Session exists but failed to connect. Try `tgharvest auth`.");
            }
        }
    }

    Ok(())
}

async fn logout(cli: &Cli) -> Result<()> {
    let session_path = session_path(cli)?;
    if !session_path.exists() {
        anyhow::bail!("No session found. Nothing to logout from.");
    }

    let app = App::new_unauthed(cli).await?;
    app.tg.client.sign_out().await.context_sign_out()?;
    drop(app);
    if let Err(e) = std::fs::remove_file(&session_path) {
        log::warn!("Could not remove {}: {}", session_path.display(), e);
    }

    if cli.output.is_json() {
        out::write_json(&serde_json::json!({ "logged_out": true }))?;
    } else {
        println!("Logged out.");
    }
    Ok(())
}
