// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::io::{BufRead, Write};
use std::path::Path;

use clap::Parser;
use cli::{Cli, Commands};
use sso_core::auth::jwt::TokenCodec;
use sso_core::auth::password::hash_password_with_cost;
use sso_core::config::{AuthConfig, generate_secret};

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    let args = Cli::parse();
    logging::init(args.verbose)?;

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::GenSecret { output } => gen_secret(output.as_deref())?,
        Commands::HashPassword { password, cost } => {
            let password = match password {
                Some(p) => p,
                None => read_stdin_line()?,
            };
            if password.is_empty() {
                return Err(Error::Custom("password must not be empty".into()));
            }
            println!("{}", hash_password_with_cost(&password, cost)?);
        }
        Commands::IssueToken {
            subject,
            secret,
            access_ttl_minutes,
            refresh_ttl_minutes,
        } => {
            let config = AuthConfig {
                access_token_ttl_minutes: access_ttl_minutes,
                refresh_token_ttl_minutes: refresh_ttl_minutes,
                ..AuthConfig::with_secret(secret)
            };
            let codec = TokenCodec::from_config(&config);
            let pair = codec.issue(subject)?;
            log::info!("issued token pair for subject {subject}");
            let out = serde_json::json!({
                "access_token": pair.access_token,
                "refresh_token": pair.refresh_token,
                "access_jti": pair.access_uuid,
                "refresh_jti": pair.refresh_uuid,
                "access_expires_at": pair.access_expires_at.to_rfc3339(),
                "refresh_expires_at": pair.refresh_expires_at.to_rfc3339(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::VerifyToken { token, secret } => {
            let codec = TokenCodec::from_config(&AuthConfig::with_secret(secret));
            let claims = codec.verify(token.trim())?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
    }

    Ok(())
}

fn gen_secret(output: Option<&Path>) -> Result<()> {
    let secret = generate_secret();
    match output {
        None => println!("{secret}"),
        Some(path) => {
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)?;
            file.write_all(secret.as_bytes())?;
            log::info!("wrote signing secret to {}", path.display());
        }
    }
    Ok(())
}

fn read_stdin_line() -> Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
