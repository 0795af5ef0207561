use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "sso-cli", about = "Operator utilities for the SSO server", version)]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the CLI version.
    Version,

    /// Generate a signing secret.
    GenSecret {
        /// Write the secret to this file instead of stdout. Refuses to overwrite.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Hash a password with bcrypt for seeding the users table.
    HashPassword {
        /// Password to hash. Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,

        /// bcrypt cost factor.
        #[arg(long, default_value_t = 12)]
        cost: u32,
    },

    /// Mint an access/refresh pair for a subject.
    IssueToken {
        /// Subject id.
        #[arg(long)]
        subject: i64,

        /// Signing secret.
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,

        /// Access token lifetime in minutes.
        #[arg(long, default_value_t = 15)]
        access_ttl_minutes: i64,

        /// Refresh token lifetime in minutes.
        #[arg(long, default_value_t = 10080)]
        refresh_ttl_minutes: i64,
    },

    /// Verify a token and print its claims.
    VerifyToken {
        /// The token to verify.
        token: String,

        /// Signing secret.
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,
    },
}
